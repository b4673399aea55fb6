//! Upload body stream that enforces the announced `content-length`.
//!
//! A report file can still be growing while it is uploaded. The PUT announces
//! the size read before the transfer started, so a body that yields more or
//! fewer bytes would be cut off or left short by the server. This wrapper
//! turns that into a stream error, which fails the attempt and lets the retry
//! policy re-read the file.

use bytes::Bytes;
use futures_util::Stream;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Passes chunks through and errors once the byte count departs from `expected`
pub struct LengthCheckedStream<S> {
    inner: S,
    expected: u64,
    seen: u64,
    failed: bool,
}

impl<S> LengthCheckedStream<S>
where
    S: Stream<Item = Result<Bytes, io::Error>>,
{
    pub fn new(inner: S, expected: u64) -> Self {
        Self {
            inner,
            expected,
            seen: 0,
            failed: false,
        }
    }

    pub fn bytes_seen(&self) -> u64 {
        self.seen
    }

    fn mismatch(&mut self) -> io::Error {
        self.failed = true;
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "file size changed during upload: expected {} bytes, read {}",
                self.expected, self.seen
            ),
        )
    }
}

impl<S> Stream for LengthCheckedStream<S>
where
    S: Stream<Item = Result<Bytes, io::Error>> + Unpin,
{
    type Item = Result<Bytes, io::Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.failed {
            return Poll::Ready(None);
        }

        match Pin::new(&mut self.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(bytes))) => {
                self.seen += bytes.len() as u64;
                if self.seen > self.expected {
                    return Poll::Ready(Some(Err(self.mismatch())));
                }
                Poll::Ready(Some(Ok(bytes)))
            }
            Poll::Ready(None) if self.seen != self.expected => {
                Poll::Ready(Some(Err(self.mismatch())))
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{stream, StreamExt};

    fn chunks(parts: &[&'static str]) -> impl Stream<Item = Result<Bytes, io::Error>> + Unpin {
        stream::iter(
            parts
                .iter()
                .map(|p| Ok(Bytes::from_static(p.as_bytes())))
                .collect::<Vec<_>>(),
        )
    }

    async fn drain<S>(mut body: LengthCheckedStream<S>) -> (Vec<Result<Bytes, io::Error>>, u64)
    where
        S: Stream<Item = Result<Bytes, io::Error>> + Unpin,
    {
        let mut items = Vec::new();
        while let Some(item) = body.next().await {
            items.push(item);
        }
        (items, body.bytes_seen())
    }

    #[tokio::test]
    async fn test_exact_length_passes_through() {
        let (items, seen) =
            drain(LengthCheckedStream::new(chunks(&["hello ", "world"]), 11)).await;

        assert_eq!(seen, 11);
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| i.is_ok()));
    }

    #[tokio::test]
    async fn test_short_body_fails_at_end() {
        let (items, seen) = drain(LengthCheckedStream::new(chunks(&["hello"]), 11)).await;

        assert_eq!(seen, 5);
        assert_eq!(items.len(), 2);
        let err = items[1].as_ref().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn test_grown_file_fails_and_stops() {
        let (items, _) = drain(LengthCheckedStream::new(
            chunks(&["hello ", "world", "more"]),
            6,
        ))
        .await;

        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(items[1].is_err());
    }
}

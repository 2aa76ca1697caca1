//! Line framing for upstream byte streams
//!
//! All three wire formats are line oriented, so the HTTP body is first cut
//! into lines and each decoder decides which lines it cares about.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;
use thiserror::Error;

/// Default upper bound for one upstream line
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Failure while framing lines
#[derive(Debug, Error)]
pub enum LineError<E> {
    /// The underlying byte stream failed
    #[error("{0}")]
    Source(E),

    /// A line grew past the limit without a terminating `\n`
    #[error("upstream line exceeds {limit} bytes")]
    TooLong {
        /// Configured limit in bytes
        limit: usize,
    },
}

/// Stream wrapper that yields complete text lines from a byte stream
///
/// Bytes are buffered until a `\n` arrives, so a chunk boundary inside a
/// multi-byte character never corrupts it. A trailing `\r` is stripped and an
/// unterminated final line is flushed when the inner stream ends. A line longer
/// than the limit ends the stream with [`LineError::TooLong`].
pub struct LineStream<S> {
    inner: S,
    buffer: Vec<u8>,
    // bytes of `buffer` already known to hold no newline
    scanned: usize,
    max_line: usize,
    pending: VecDeque<String>,
    overflowed: bool,
    finished: bool,
}

impl<S> LineStream<S> {
    /// Wrap a byte stream
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            buffer: Vec::new(),
            scanned: 0,
            max_line: MAX_LINE_BYTES,
            pending: VecDeque::new(),
            overflowed: false,
            finished: false,
        }
    }

    /// Override the line length limit
    #[must_use]
    pub fn with_max_line(mut self, max_line: usize) -> Self {
        self.max_line = max_line.max(1);
        self
    }

    fn split_buffer(&mut self) {
        while let Some(offset) = self.buffer[self.scanned..].iter().position(|&b| b == b'\n') {
            let pos = self.scanned + offset;
            if pos > self.max_line {
                self.overflowed = true;
                return;
            }
            let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.scanned = 0;
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            self.pending
                .push_back(String::from_utf8_lossy(&line).into_owned());
        }
        self.scanned = self.buffer.len();
        if self.buffer.len() > self.max_line {
            self.overflowed = true;
        }
    }
}

impl<S, E> Stream for LineStream<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    type Item = Result<String, LineError<E>>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;

        loop {
            if let Some(line) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(line)));
            }
            if this.finished {
                return Poll::Ready(None);
            }
            if this.overflowed {
                this.finished = true;
                this.buffer = Vec::new();
                return Poll::Ready(Some(Err(LineError::TooLong {
                    limit: this.max_line,
                })));
            }

            match Pin::new(&mut this.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    this.buffer.extend_from_slice(&bytes);
                    this.split_buffer();
                }
                Poll::Ready(Some(Err(e))) => return Poll::Ready(Some(Err(LineError::Source(e)))),
                Poll::Ready(None) => {
                    this.finished = true;
                    if !this.buffer.is_empty() {
                        let rest = std::mem::take(&mut this.buffer);
                        let rest = rest.strip_suffix(b"\r").unwrap_or(&rest);
                        this.pending
                            .push_back(String::from_utf8_lossy(rest).into_owned());
                    }
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

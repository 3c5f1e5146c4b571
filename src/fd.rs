//! Readiness adapter: how a descriptor runs a non-blocking splice under the
//! reactor's "wait until ready" guard.

use std::fs::File;
use std::io;
use std::os::unix::io::AsRawFd;
use std::task::{ready, Context, Poll};

use tokio::io::unix::AsyncFd;
use tokio::io::Interest;
use tokio::net::{TcpStream, UnixStream};

use crate::sys;

/// A borrowed source or destination of a splice transfer.
///
/// `poll_splice` attempts `op` against the descriptor. When `op` reports
/// `WouldBlock`, the implementation clears its readiness for `interest` and
/// returns `Poll::Pending` with the waker registered, so the caller is parked
/// until the descriptor is ready and then retried. Any other outcome of `op`
/// is returned as is.
pub trait SpliceFd: AsRawFd {
    fn poll_splice(
        &self,
        cx: &mut Context<'_>,
        interest: Interest,
        op: &mut dyn FnMut() -> io::Result<usize>,
    ) -> Poll<io::Result<usize>>;

    /// Signals end of stream to the peer once a transfer into this descriptor
    /// is complete. Descriptors without a write half keep the default no-op.
    fn shutdown_write(&self) -> io::Result<()> {
        Ok(())
    }
}

macro_rules! impl_splice_fd_for_stream {
    ($($t:ty)*) => ($(impl SpliceFd for $t {
        fn poll_splice(
            &self,
            cx: &mut Context<'_>,
            interest: Interest,
            op: &mut dyn FnMut() -> io::Result<usize>,
        ) -> Poll<io::Result<usize>> {
            loop {
                if interest.is_writable() {
                    ready!(self.poll_write_ready(cx))?;
                } else {
                    ready!(self.poll_read_ready(cx))?;
                }
                match self.try_io(interest, &mut *op) {
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                    res => return Poll::Ready(res),
                }
            }
        }

        fn shutdown_write(&self) -> io::Result<()> {
            sys::shutdown_write(self.as_raw_fd())
        }
    })*)
}

impl_splice_fd_for_stream! { TcpStream UnixStream }

impl<T: AsRawFd> SpliceFd for AsyncFd<T> {
    fn poll_splice(
        &self,
        cx: &mut Context<'_>,
        interest: Interest,
        op: &mut dyn FnMut() -> io::Result<usize>,
    ) -> Poll<io::Result<usize>> {
        loop {
            let attempt = if interest.is_writable() {
                ready!(self.poll_write_ready(cx))?.try_io(|_| op())
            } else {
                ready!(self.poll_read_ready(cx))?.try_io(|_| op())
            };
            match attempt {
                Ok(res) => return Poll::Ready(res),
                Err(_would_block) => continue,
            }
        }
    }
}

/// Regular files are always ready; `op` runs once and its result is final.
///
/// Only hand regular files to this impl. A non-blocking socket or pipe
/// wrapped in a `File` would turn its would-block condition into an error.
impl SpliceFd for File {
    fn poll_splice(
        &self,
        _cx: &mut Context<'_>,
        _interest: Interest,
        op: &mut dyn FnMut() -> io::Result<usize>,
    ) -> Poll<io::Result<usize>> {
        Poll::Ready(op())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::poll_fn;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn stream_waits_for_readiness_then_retries() {
        let (reader, mut writer) = UnixStream::pair().unwrap();
        let mut attempts = 0;
        let mut op = || -> io::Result<usize> {
            attempts += 1;
            if attempts < 3 {
                Err(io::Error::from(io::ErrorKind::WouldBlock))
            } else {
                Ok(7)
            }
        };

        // Each write raises a fresh readiness edge for the parked reader.
        let poke = tokio::spawn(async move {
            loop {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                writer.write_all(b"x").await.unwrap();
            }
        });

        let n = poll_fn(|cx| reader.poll_splice(cx, Interest::READABLE, &mut op))
            .await
            .unwrap();
        poke.abort();
        assert_eq!(n, 7);
        drop(op);
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn hard_errors_pass_through() {
        let (stream, _peer) = UnixStream::pair().unwrap();
        let mut op = || -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        };
        let err = poll_fn(|cx| stream.poll_splice(cx, Interest::WRITABLE, &mut op))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[tokio::test]
    async fn file_runs_op_once() {
        let file = tempfile::tempfile().unwrap();
        let mut calls = 0;
        let mut op = || -> io::Result<usize> {
            calls += 1;
            Err(io::Error::from(io::ErrorKind::WouldBlock))
        };
        let err = poll_fn(|cx| file.poll_splice(cx, Interest::READABLE, &mut op))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
        drop(op);
        assert_eq!(calls, 1);
    }
}

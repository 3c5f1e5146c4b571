use std::future::poll_fn;
use std::io;
use std::os::unix::io::RawFd;

use tokio::io::Interest;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::fd::SpliceFd;
use crate::options::{Options, ProgressHandler};
use crate::pipe::SplicePipe;
use crate::sys;

/// Where the pump is between two splice calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Pipe is empty; pull the next chunk out of the source.
    DrainSource,
    /// `pending` bytes sit in the pipe and must reach the destination first.
    DrainPipe { pending: usize },
}

/// A prepared single-use transfer: its own pipe, already sized.
///
/// ```no_run
/// # async fn demo(dst: tokio::net::TcpStream, src: tokio::net::TcpStream) -> fdsplice::Result<()> {
/// let transfer = fdsplice::Transfer::prepare(fdsplice::Options::new().with_pipe_capacity(1 << 20))?;
/// println!("relaying through a {} byte pipe", transfer.pipe_capacity());
/// let copied = transfer.run(&dst, &src).await?;
/// # let _ = copied;
/// # Ok(())
/// # }
/// ```
pub struct Transfer {
    pipe: SplicePipe,
    progress: Option<ProgressHandler>,
}

impl Transfer {
    pub fn prepare(options: Options) -> Result<Self> {
        let (hint, progress) = options.into_parts();
        let pipe = SplicePipe::new(hint)?;
        Ok(Transfer { pipe, progress })
    }

    /// Upper bound of every splice call, as granted by the kernel.
    pub fn pipe_capacity(&self) -> usize {
        self.pipe.capacity()
    }

    /// Pumps `src` into `dst` until `src` reaches end of stream.
    ///
    /// Returns the number of bytes the destination accepted. On failure the
    /// error carries the same count; bytes still held in the pipe at that
    /// point are discarded with it.
    pub async fn run<D, S>(mut self, dst: &D, src: &S) -> Result<u64>
    where
        D: SpliceFd + ?Sized,
        S: SpliceFd + ?Sized,
    {
        let capacity = self.pipe.capacity();
        let (src_fd, dst_fd) = (src.as_raw_fd(), dst.as_raw_fd());
        let (pipe_rd, pipe_wr) = (self.pipe.read_fd(), self.pipe.write_fd());

        let mut written: u64 = 0;
        let mut state = State::DrainSource;
        loop {
            state = match state {
                State::DrainSource => {
                    let mut fill = || splice_uninterrupted(src_fd, pipe_wr, capacity);
                    let moved = poll_fn(|cx| src.poll_splice(cx, Interest::READABLE, &mut fill))
                        .await
                        .map_err(|e| fail(written, e))?;
                    if moved == 0 {
                        debug!(src_fd, dst_fd, written, "source reached end of stream");
                        return Ok(written);
                    }
                    trace!(src_fd, moved, "spliced source into pipe");
                    if let Some(progress) = self.progress.as_mut() {
                        progress(moved as u64);
                    }
                    State::DrainPipe { pending: moved }
                }
                State::DrainPipe { pending } => {
                    let len = pending.min(capacity);
                    let mut drain = || splice_uninterrupted(pipe_rd, dst_fd, len);
                    let n = poll_fn(|cx| dst.poll_splice(cx, Interest::WRITABLE, &mut drain))
                        .await
                        .map_err(|e| fail(written, e))?;
                    if n == 0 {
                        let e = io::Error::new(
                            io::ErrorKind::WriteZero,
                            "destination accepted no bytes from the splice pipe",
                        );
                        return Err(fail(written, e));
                    }
                    written += n as u64;
                    trace!(dst_fd, n, remaining = pending - n, "spliced pipe into destination");
                    match pending - n {
                        0 => State::DrainSource,
                        pending => State::DrainPipe { pending },
                    }
                }
            };
        }
    }
}

fn fail(written: u64, source: io::Error) -> Error {
    debug!(written, error = %source, "splice transfer failed");
    Error::transfer(written, source)
}

fn splice_uninterrupted(fd_in: RawFd, fd_out: RawFd, len: usize) -> io::Result<usize> {
    retry_interrupted(|| sys::splice(fd_in, fd_out, len))
}

/// A call interrupted by a signal moved nothing; repeat it as is.
fn retry_interrupted(mut op: impl FnMut() -> io::Result<usize>) -> io::Result<usize> {
    loop {
        match op() {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                trace!("splice interrupted, retrying");
            }
            res => return res,
        }
    }
}

/// Copies everything `src` yields into `dst` through a fresh splice pipe.
///
/// Neither descriptor is closed. The returned count is what `dst` accepted;
/// see [`Error::bytes_transferred`] for the count on failure.
pub async fn copy<D, S>(dst: &D, src: &S, options: Options) -> Result<u64>
where
    D: SpliceFd + ?Sized,
    S: SpliceFd + ?Sized,
{
    Transfer::prepare(options)?.run(dst, src).await
}

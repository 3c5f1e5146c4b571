use std::num::NonZeroUsize;
use std::os::unix::io::{AsRawFd, OwnedFd, RawFd};

use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::sys;

/// The kernel pipe every splice transfer relays through.
///
/// Both ends are closed when the value is dropped, whichever way the
/// transfer ends.
#[derive(Debug)]
pub struct SplicePipe {
    reader: OwnedFd,
    writer: OwnedFd,
    capacity: usize,
}

impl SplicePipe {
    /// Creates the pipe and sizes it.
    ///
    /// Without a hint the system default capacity is kept. With one, the
    /// kernel may round it up; [`capacity`](Self::capacity) reports the value
    /// actually granted.
    pub fn new(hint: Option<NonZeroUsize>) -> Result<Self> {
        let (reader, writer) = sys::pipe().map_err(Error::Setup)?;
        let capacity = match hint {
            Some(size) => sys::set_pipe_capacity(reader.as_raw_fd(), size.get()),
            None => sys::pipe_capacity(reader.as_raw_fd()),
        }
        .map_err(Error::Capacity)?;

        debug!(
            read_fd = reader.as_raw_fd(),
            write_fd = writer.as_raw_fd(),
            requested = hint.map(NonZeroUsize::get),
            capacity,
            "created splice pipe"
        );

        Ok(SplicePipe {
            reader,
            writer,
            capacity,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn read_fd(&self) -> RawFd {
        self.reader.as_raw_fd()
    }

    pub(crate) fn write_fd(&self) -> RawFd {
        self.writer.as_raw_fd()
    }
}

impl Drop for SplicePipe {
    fn drop(&mut self) {
        trace!(
            read_fd = self.reader.as_raw_fd(),
            write_fd = self.writer.as_raw_fd(),
            "releasing splice pipe"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_capacity_matches_kernel_default() {
        let pipe = SplicePipe::new(None).unwrap();
        assert!(pipe.capacity() > 0);
        assert_eq!(sys::pipe_capacity(pipe.read_fd()).unwrap(), pipe.capacity());
    }

    #[test]
    fn hint_is_rounded_up() {
        let pipe = SplicePipe::new(NonZeroUsize::new(100_000)).unwrap();
        assert!(pipe.capacity() >= 100_000);
    }

    #[test]
    fn absurd_hint_is_a_capacity_error() {
        let err = SplicePipe::new(NonZeroUsize::new(usize::MAX)).unwrap_err();
        assert!(matches!(err, Error::Capacity(_)));
        assert_eq!(err.bytes_transferred(), 0);
    }
}

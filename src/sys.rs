//! Thin checked wrappers over the libc calls the transfer needs.

use std::io;
use std::os::unix::io::{FromRawFd, OwnedFd, RawFd};

use libc;

const SPLICE_FLAGS: libc::c_uint = libc::SPLICE_F_NONBLOCK | libc::SPLICE_F_MOVE;

pub trait IsMinusOne {
    fn is_minus_one(&self) -> bool;
}

macro_rules! impl_is_minus_one {
    ($($t:ident)*) => ($(impl IsMinusOne for $t {
        fn is_minus_one(&self) -> bool {
            *self == -1
        }
    })*)
}

impl_is_minus_one! { i32 i64 isize }

pub fn cvt<T: IsMinusOne>(t: T) -> io::Result<T> {
    if t.is_minus_one() {
        Err(io::Error::last_os_error())
    } else {
        Ok(t)
    }
}

/// One non-blocking `splice(2)` of at most `len` bytes. Both offsets are null,
/// so seekable descriptors advance their own file position.
pub fn splice(fd_in: RawFd, fd_out: RawFd, len: usize) -> io::Result<usize> {
    let n = cvt(unsafe {
        libc::splice(
            fd_in,
            std::ptr::null_mut::<libc::loff_t>(),
            fd_out,
            std::ptr::null_mut::<libc::loff_t>(),
            len,
            SPLICE_FLAGS,
        )
    })?;
    Ok(n as usize)
}

/// Creates a non-blocking, close-on-exec pipe and returns `(read, write)`.
pub fn pipe() -> io::Result<(OwnedFd, OwnedFd)> {
    let mut fds: [libc::c_int; 2] = [0; 2];
    cvt(unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC | libc::O_NONBLOCK) })?;
    // SAFETY: pipe2 succeeded, both descriptors are fresh and owned by nobody else.
    unsafe { Ok((OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1]))) }
}

pub fn pipe_capacity(fd: RawFd) -> io::Result<usize> {
    let size = cvt(unsafe { libc::fcntl(fd, libc::F_GETPIPE_SZ) })?;
    Ok(size as usize)
}

/// Asks the kernel for a pipe buffer of `size` bytes and returns what it
/// actually granted (rounded up to a power-of-two number of pages).
pub fn set_pipe_capacity(fd: RawFd, size: usize) -> io::Result<usize> {
    let size = libc::c_int::try_from(size).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            "pipe capacity does not fit in a c_int",
        )
    })?;
    let granted = cvt(unsafe { libc::fcntl(fd, libc::F_SETPIPE_SZ, size) })?;
    Ok(granted as usize)
}

/// Half-closes a socket for writing. Peers that already went away are not an error.
pub fn shutdown_write(fd: RawFd) -> io::Result<()> {
    match cvt(unsafe { libc::shutdown(fd, libc::SHUT_WR) }) {
        Ok(_) => Ok(()),
        Err(e) if e.raw_os_error() == Some(libc::ENOTCONN) => Ok(()),
        Err(e) => Err(e),
    }
}

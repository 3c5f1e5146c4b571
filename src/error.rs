//! Error types for splice transfers.

use std::io;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal outcomes of a transfer.
///
/// Interrupted and would-block conditions are retried internally and never
/// show up here. End of stream is a success, not an error.
#[derive(Error, Debug)]
pub enum Error {
    /// The intermediate pipe could not be created. Nothing was moved.
    #[error("failed to create splice pipe: {0}")]
    Setup(#[source] io::Error),

    /// Querying or setting the pipe capacity failed. Nothing was moved.
    #[error("failed to get/set splice pipe capacity: {0}")]
    Capacity(#[source] io::Error),

    /// A splice call failed mid-transfer. `written` bytes had already reached
    /// the destination and are not rolled back.
    #[error("splice failed after {written} bytes: {source}")]
    Transfer {
        written: u64,
        #[source]
        source: io::Error,
    },
}

impl Error {
    pub(crate) fn transfer(written: u64, source: io::Error) -> Self {
        Error::Transfer { written, source }
    }

    /// Bytes that reached the destination before the failure.
    pub fn bytes_transferred(&self) -> u64 {
        match self {
            Error::Setup(_) | Error::Capacity(_) => 0,
            Error::Transfer { written, .. } => *written,
        }
    }

    /// The underlying OS error.
    pub fn io_error(&self) -> &io::Error {
        match self {
            Error::Setup(e) | Error::Capacity(e) => e,
            Error::Transfer { source, .. } => source,
        }
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        let kind = err.io_error().kind();
        io::Error::new(kind, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_errors_report_zero_bytes() {
        let err = Error::Setup(io::Error::from_raw_os_error(libc::EMFILE));
        assert_eq!(err.bytes_transferred(), 0);
        assert!(err.to_string().contains("create splice pipe"));
    }

    #[test]
    fn transfer_error_keeps_partial_count() {
        let err = Error::transfer(42, io::Error::from(io::ErrorKind::BrokenPipe));
        assert_eq!(err.bytes_transferred(), 42);
        assert!(err.to_string().contains("after 42 bytes"));
    }

    #[test]
    fn io_conversion_preserves_kind() {
        let err = Error::transfer(1, io::Error::from(io::ErrorKind::BrokenPipe));
        let io_err: io::Error = err.into();
        assert_eq!(io_err.kind(), io::ErrorKind::BrokenPipe);
    }
}

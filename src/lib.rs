//! Zero-copy descriptor to descriptor transfers on Linux.
//!
//! `splice(2)` only moves bytes when one side is a pipe, so every transfer
//! relays through a private kernel pipe: the source is spliced into the pipe,
//! then the pipe is drained into the destination, and the two steps alternate
//! until the source reports end of stream. The bytes never enter user space.
//!
//! ```no_run
//! use tokio::net::TcpStream;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let src = TcpStream::connect("127.0.0.1:20000").await?;
//! let dst = TcpStream::connect("127.0.0.1:20001").await?;
//!
//! let options = fdsplice::Options::new()
//!     .with_pipe_capacity(1 << 20)
//!     .with_progress(|n| println!("pulled {n} bytes"));
//!
//! match fdsplice::copy(&dst, &src, options).await {
//!     Ok(n) => println!("copied {n} bytes"),
//!     Err(e) => println!("{} bytes made it before: {e}", e.bytes_transferred()),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Descriptors are borrowed, never closed. Anything implementing [`SpliceFd`]
//! can take part: tokio TCP and Unix streams, [`tokio::io::unix::AsyncFd`]
//! wrappers, and regular [`std::fs::File`]s.

#[cfg(not(target_os = "linux"))]
compile_error!("fdsplice requires Linux splice(2)");

mod bidirectional;
mod error;
mod fd;
mod options;
mod pipe;
mod sys;
mod transfer;

pub use bidirectional::{copy_bidirectional, copy_bidirectional_with};
pub use error::{Error, Result};
pub use fd::SpliceFd;
pub use options::{Options, ProgressHandler};
pub use pipe::SplicePipe;
pub use transfer::{copy, Transfer};


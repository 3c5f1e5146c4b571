use std::error::Error;
use std::fs::File;
use std::io;
use std::os::unix::io::{AsFd, AsRawFd, RawFd};
use std::process::ExitCode;
use std::task::{Context, Poll};

use clap::Parser;
use fdsplice::{Options, SpliceFd, Transfer};
use tokio::io::unix::AsyncFd;
use tokio::io::Interest;
use tracing::{debug, info, Level};

/// Copy bytes between files, pipes and sockets with splice(2)
#[derive(Parser)]
#[command(name = "fdsplice")]
#[command(version)]
struct Cli {
    /// Source path, or - for stdin
    src: String,

    /// Destination path, or - for stdout
    dst: String,

    /// Requested intermediate pipe capacity in bytes (0 keeps the system default)
    #[arg(long, default_value = "0")]
    pipe_capacity: usize,

    /// Print a running byte count to stderr for every chunk
    #[arg(long)]
    progress: bool,

    /// Log verbosity: trace, debug, info, warn, error
    #[arg(long, default_value = "warn")]
    verbosity: Level,
}

/// A descriptor the CLI hands to the transfer.
///
/// Regular files never block and cannot be registered with epoll, so they
/// are spliced directly. Everything else goes through the reactor.
enum Endpoint {
    Ready(File),
    Polled {
        fd: AsyncFd<File>,
        restore_flags: Option<libc::c_int>,
    },
}

impl Endpoint {
    fn new(file: File) -> io::Result<Self> {
        if file.metadata()?.is_file() {
            return Ok(Endpoint::Ready(file));
        }

        // Register before touching the flags: stdin/stdout share their file
        // description with the parent, so a refused fd must stay untouched.
        let fd = match AsyncFd::new(file.try_clone()?) {
            Ok(fd) => fd,
            // Character devices such as /dev/null refuse epoll but never block.
            Err(e) if e.raw_os_error() == Some(libc::EPERM) => {
                debug!(fd = file.as_raw_fd(), "descriptor cannot be polled, splicing directly");
                return Ok(Endpoint::Ready(file));
            }
            Err(e) => return Err(e),
        };
        let restore_flags = set_nonblocking(fd.as_raw_fd())?;
        Ok(Endpoint::Polled { fd, restore_flags })
    }
}

impl AsRawFd for Endpoint {
    fn as_raw_fd(&self) -> RawFd {
        match self {
            Endpoint::Ready(file) => file.as_raw_fd(),
            Endpoint::Polled { fd, .. } => fd.as_raw_fd(),
        }
    }
}

impl SpliceFd for Endpoint {
    fn poll_splice(
        &self,
        cx: &mut Context<'_>,
        interest: Interest,
        op: &mut dyn FnMut() -> io::Result<usize>,
    ) -> Poll<io::Result<usize>> {
        match self {
            Endpoint::Ready(file) => file.poll_splice(cx, interest, op),
            Endpoint::Polled { fd, .. } => fd.poll_splice(cx, interest, op),
        }
    }
}

impl Drop for Endpoint {
    fn drop(&mut self) {
        if let Endpoint::Polled {
            fd,
            restore_flags: Some(flags),
        } = self
        {
            unsafe { libc::fcntl(fd.as_raw_fd(), libc::F_SETFL, *flags) };
        }
    }
}

/// Switches `fd` to non-blocking mode and returns the flags to put back, if
/// anything changed.
fn set_nonblocking(fd: RawFd) -> io::Result<Option<libc::c_int>> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags == -1 {
        return Err(io::Error::last_os_error());
    }
    if flags & libc::O_NONBLOCK != 0 {
        return Ok(None);
    }
    if unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) } == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(Some(flags))
}

fn open_source(path: &str) -> io::Result<File> {
    if path == "-" {
        return Ok(File::from(io::stdin().as_fd().try_clone_to_owned()?));
    }
    File::open(path)
}

fn open_destination(path: &str) -> io::Result<File> {
    if path == "-" {
        return Ok(File::from(io::stdout().as_fd().try_clone_to_owned()?));
    }
    File::create(path)
}

async fn run(cli: Cli) -> Result<u64, Box<dyn Error>> {
    let src = Endpoint::new(open_source(&cli.src)?)?;
    let dst = Endpoint::new(open_destination(&cli.dst)?)?;

    let mut options = Options::new().with_pipe_capacity(cli.pipe_capacity);
    if cli.progress {
        let mut total = 0u64;
        options = options.with_progress(move |n| {
            total += n;
            eprintln!("{} bytes", total);
        });
    }

    let transfer = Transfer::prepare(options)?;
    debug!(
        src = %cli.src,
        dst = %cli.dst,
        pipe_capacity = transfer.pipe_capacity(),
        "starting transfer"
    );
    match transfer.run(&dst, &src).await {
        Ok(copied) => Ok(copied),
        Err(e) => Err(format!("{} (copied {} bytes)", e, e.bytes_transferred()).into()),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    match run(cli).await {
        Ok(copied) => {
            info!(bytes = copied, "copy complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

use std::net::SocketAddr;

use clap::Parser;
use fdsplice::{copy_bidirectional_with, Options};
use listenfd::ListenFd;
use tokio::{io, net::TcpListener, net::TcpStream};
use tracing::{debug, info, warn, Level};

/// Forward TCP connections to an upstream with zero-copy splice relays
#[derive(Parser)]
#[command(name = "splice-proxy")]
#[command(version)]
struct Cli {
    /// Address to bind when no socket is passed in through LISTEN_FDS
    #[arg(long, default_value = "127.0.0.1:20000")]
    listen: SocketAddr,

    /// Address every accepted connection is forwarded to
    #[arg(long, default_value = "127.0.0.1:20001")]
    upstream: String,

    /// Requested pipe capacity per direction in bytes (0 keeps the system default)
    #[arg(long, default_value = "0")]
    pipe_capacity: usize,

    /// Log verbosity: trace, debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: Level,
}

fn listener(addr: SocketAddr) -> io::Result<TcpListener> {
    let mut listenfd = ListenFd::from_env();
    let lis = match listenfd.take_tcp_listener(0)? {
        Some(lis) => {
            info!("using listener passed in by the service manager");
            lis
        }
        None => std::net::TcpListener::bind(addr)?,
    };
    lis.set_nonblocking(true)?;
    TcpListener::from_std(lis)
}

async fn proxy(eyeball: TcpStream, upstream: &str, pipe_capacity: usize) -> io::Result<()> {
    let origin = TcpStream::connect(upstream).await?;
    let options = || Options::new().with_pipe_capacity(pipe_capacity);
    let (up, down) = copy_bidirectional_with(&eyeball, &origin, options(), options()).await?;
    debug!(up, down, "connection closed");
    Ok(())
}

#[tokio::main]
async fn main() -> io::Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let lis = listener(cli.listen)?;
    info!(addr = %lis.local_addr()?, upstream = %cli.upstream, "proxy listening");

    loop {
        let (eyeball, peer) = match lis.accept().await {
            Ok(conn) => conn,
            Err(err) => {
                warn!(error = %err, "accept error");
                continue;
            }
        };
        let upstream = cli.upstream.clone();
        let pipe_capacity = cli.pipe_capacity;
        tokio::spawn(async move {
            if let Err(err) = proxy(eyeball, &upstream, pipe_capacity).await {
                warn!(%peer, error = %err, "connection failed");
            }
        });
    }
}

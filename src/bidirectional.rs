use tracing::debug;

use crate::error::{Error, Result};
use crate::fd::SpliceFd;
use crate::options::Options;
use crate::transfer::copy;

/// Relays `a` and `b` in both directions until each side has sent end of
/// stream, with default [`Options`] for both directions.
///
/// Returns `(a_to_b, b_to_a)`.
pub async fn copy_bidirectional<A, B>(a: &A, b: &B) -> Result<(u64, u64)>
where
    A: SpliceFd + ?Sized,
    B: SpliceFd + ?Sized,
{
    copy_bidirectional_with(a, b, Options::new(), Options::new()).await
}

/// Like [`copy_bidirectional`], with separate options per direction.
///
/// Each direction gets its own pipe. When one direction finishes, the write
/// side of its destination is shut down so the peer sees end of stream. The
/// first error aborts both directions.
pub async fn copy_bidirectional_with<A, B>(
    a: &A,
    b: &B,
    a_to_b: Options,
    b_to_a: Options,
) -> Result<(u64, u64)>
where
    A: SpliceFd + ?Sized,
    B: SpliceFd + ?Sized,
{
    let forward = half(b, a, a_to_b);
    let backward = half(a, b, b_to_a);
    let (sent, received) = tokio::try_join!(forward, backward)?;
    debug!(
        a_fd = a.as_raw_fd(),
        b_fd = b.as_raw_fd(),
        a_to_b = sent,
        b_to_a = received,
        "bidirectional relay finished"
    );
    Ok((sent, received))
}

async fn half<D, S>(dst: &D, src: &S, options: Options) -> Result<u64>
where
    D: SpliceFd + ?Sized,
    S: SpliceFd + ?Sized,
{
    let n = copy(dst, src, options).await?;
    dst.shutdown_write().map_err(|e| Error::transfer(n, e))?;
    Ok(n)
}

use std::fmt;
use std::num::NonZeroUsize;

/// Callback fed the byte count of every chunk pulled into the pipe.
pub type ProgressHandler = Box<dyn FnMut(u64) + Send>;

/// Settings for a single transfer.
///
/// ```
/// let seen = std::sync::Arc::new(std::sync::atomic::AtomicU64::new(0));
/// let counter = seen.clone();
/// let options = fdsplice::Options::new()
///     .with_pipe_capacity(256 * 1024)
///     .with_progress(move |n| {
///         counter.fetch_add(n, std::sync::atomic::Ordering::Relaxed);
///     });
/// assert_eq!(options.pipe_capacity(), Some(256 * 1024));
/// ```
#[derive(Default)]
pub struct Options {
    pipe_capacity: Option<NonZeroUsize>,
    progress: Option<ProgressHandler>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requested capacity of the intermediate pipe. Zero keeps the system default.
    pub fn with_pipe_capacity(mut self, bytes: usize) -> Self {
        self.pipe_capacity = NonZeroUsize::new(bytes);
        self
    }

    /// Called synchronously on the transfer task, once per chunk moved out of
    /// the source. A slow handler stalls the transfer.
    pub fn with_progress<F>(mut self, handler: F) -> Self
    where
        F: FnMut(u64) + Send + 'static,
    {
        self.progress = Some(Box::new(handler));
        self
    }

    pub fn pipe_capacity(&self) -> Option<usize> {
        self.pipe_capacity.map(NonZeroUsize::get)
    }

    pub(crate) fn into_parts(self) -> (Option<NonZeroUsize>, Option<ProgressHandler>) {
        (self.pipe_capacity, self.progress)
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("pipe_capacity", &self.pipe_capacity)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_leave_everything_unset() {
        let options = Options::new();
        assert_eq!(options.pipe_capacity(), None);
        let (hint, progress) = options.into_parts();
        assert!(hint.is_none());
        assert!(progress.is_none());
    }

    #[test]
    fn zero_capacity_means_default() {
        let options = Options::new().with_pipe_capacity(4096).with_pipe_capacity(0);
        assert_eq!(options.pipe_capacity(), None);
    }

    #[test]
    fn debug_hides_the_handler() {
        let options = Options::new().with_progress(|_| {});
        assert_eq!(
            format!("{:?}", options),
            "Options { pipe_capacity: None, progress: true }"
        );
    }
}

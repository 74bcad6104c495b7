//! Progress reporting and cooperative cancellation.
//!
//! Scanning and duplicate detection narrate what they are doing through a
//! [`ProgressSink`] and poll a [`CancelCheck`] between units of work. Both are
//! bundled in a [`Progress`] handle that is cheap to clone and safe to share
//! with worker threads.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio_util::sync::CancellationToken;

/// Receiver of progress messages.
///
/// Reports are fire-and-forget. Implementations must not block: a slow sink
/// stalls the scan that is calling it.
pub trait ProgressSink: Send + Sync {
    /// Report a message with a completion fraction in `0.0..=1.0`.
    fn report(&self, message: &str, fraction: f64);
}

impl<F> ProgressSink for F
where
    F: Fn(&str, f64) + Send + Sync,
{
    fn report(&self, message: &str, fraction: f64) {
        self(message, fraction)
    }
}

/// Sink that discards every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn report(&self, _message: &str, _fraction: f64) {}
}

/// Sink that forwards messages to `tracing` at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn report(&self, message: &str, fraction: f64) {
        tracing::debug!(target: "dupetree::progress", fraction, "{message}");
    }
}

/// Side-effect-free cancellation predicate. Once true it stays true.
pub trait CancelCheck: Send + Sync {
    fn is_cancelled(&self) -> bool;
}

/// Shared flag that can be flipped from another thread.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Create a flag that is not yet cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl CancelCheck for CancelFlag {
    fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl CancelCheck for CancellationToken {
    fn is_cancelled(&self) -> bool {
        CancellationToken::is_cancelled(self)
    }
}

/// Never cancels.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverCancel;

impl CancelCheck for NeverCancel {
    fn is_cancelled(&self) -> bool {
        false
    }
}

struct FnCancel<F>(F);

impl<F> CancelCheck for FnCancel<F>
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_cancelled(&self) -> bool {
        (self.0)()
    }
}

/// A progress sink paired with a cancellation check.
#[derive(Clone)]
pub struct Progress {
    sink: Arc<dyn ProgressSink>,
    cancel: Arc<dyn CancelCheck>,
    /// Bits of the last fraction passed to [`Progress::report`], shared by clones.
    last_fraction: Arc<AtomicU64>,
}

impl Progress {
    /// Report through `sink`; never cancelled.
    pub fn new(sink: impl ProgressSink + 'static) -> Self {
        Self {
            sink: Arc::new(sink),
            cancel: Arc::new(NeverCancel),
            last_fraction: Arc::new(AtomicU64::new(0.0f64.to_bits())),
        }
    }

    /// No reporting, no cancellation.
    pub fn silent() -> Self {
        Self::new(NullSink)
    }

    /// Replace the cancellation check.
    pub fn with_cancel(mut self, cancel: impl CancelCheck + 'static) -> Self {
        self.cancel = Arc::new(cancel);
        self
    }

    /// Use a closure as the cancellation check.
    pub fn with_cancel_fn<F>(self, cancel: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.with_cancel(FnCancel(cancel))
    }

    /// Forward a message to the sink. The fraction is clamped to `0.0..=1.0`.
    pub fn report(&self, message: &str, fraction: f64) {
        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.last_fraction.store(fraction.to_bits(), Ordering::Relaxed);
        self.sink.report(message, fraction);
    }

    /// Forward a message without moving the fraction: the sink sees the
    /// value of the latest [`Progress::report`].
    pub fn note(&self, message: &str) {
        self.sink.report(message, self.last_fraction());
    }

    /// Fraction most recently reported through this handle or a clone of it.
    pub fn last_fraction(&self) -> f64 {
        f64::from_bits(self.last_fraction.load(Ordering::Relaxed))
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::silent()
    }
}

impl fmt::Debug for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Progress")
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_closure_sink_receives_messages() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        let progress = Progress::new(move |msg: &str, fraction: f64| {
            sink_seen.lock().unwrap().push((msg.to_string(), fraction));
        });

        progress.report("hashing", 0.5);
        progress.report("overshoot", 7.0);

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0], ("hashing".to_string(), 0.5));
        assert_eq!(seen[1].1, 1.0);
    }

    #[test]
    fn test_note_keeps_last_fraction() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        let progress = Progress::new(move |msg: &str, fraction: f64| {
            sink_seen.lock().unwrap().push((msg.to_string(), fraction));
        });
        let worker_view = progress.clone();

        progress.note("before anything");
        progress.report("hashing", 0.6);
        worker_view.note("cannot read /x");

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].1, 0.0);
        assert_eq!(seen[2], ("cannot read /x".to_string(), 0.6));
        assert_eq!(progress.last_fraction(), 0.6);
    }

    #[test]
    fn test_cancel_flag_is_shared() {
        let flag = CancelFlag::new();
        let progress = Progress::silent().with_cancel(flag.clone());
        let worker_view = progress.clone();

        assert!(!worker_view.is_cancelled());
        flag.cancel();
        assert!(worker_view.is_cancelled());
    }

    #[test]
    fn test_cancellation_token() {
        let token = CancellationToken::new();
        let progress = Progress::silent().with_cancel(token.clone());

        assert!(!progress.is_cancelled());
        token.cancel();
        assert!(progress.is_cancelled());
    }

    #[test]
    fn test_cancel_fn() {
        let progress = Progress::silent().with_cancel_fn(|| true);
        assert!(progress.is_cancelled());
        assert!(!Progress::silent().is_cancelled());
    }
}

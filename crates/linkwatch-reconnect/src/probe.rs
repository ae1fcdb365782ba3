//! The connectivity probe seam.

use linkwatch_core::BoxError;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// What a single probe observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeOutcome {
    /// Whether the remote end was reachable.
    pub success: bool,
    /// Round-trip time of the probe.
    pub latency: Duration,
}

impl ProbeOutcome {
    /// A successful probe with the given round-trip time.
    pub fn reachable(latency: Duration) -> Self {
        Self {
            success: true,
            latency,
        }
    }

    /// A probe that completed but found the remote end unreachable.
    pub fn unreachable(latency: Duration) -> Self {
        Self {
            success: false,
            latency,
        }
    }
}

/// Checks whether the connection is usable.
///
/// Implemented for any `Fn(Duration) -> impl Future` closure, so most
/// callers never implement it by hand:
///
/// ```
/// use linkwatch_reconnect::{BoxError, ConnectionProbe, ProbeOutcome};
/// use std::time::Duration;
///
/// fn assert_probe<P: ConnectionProbe>(_: &P) {}
///
/// let probe = |_timeout: Duration| async move {
///     Ok::<_, BoxError>(ProbeOutcome::reachable(Duration::from_millis(20)))
/// };
/// assert_probe(&probe);
/// ```
///
/// The `timeout` argument is advisory: the manager enforces it regardless,
/// and a probe that overruns it counts as failed.
pub trait ConnectionProbe: Send + Sync {
    /// Runs one probe.
    fn probe(
        &self,
        timeout: Duration,
    ) -> impl Future<Output = Result<ProbeOutcome, BoxError>> + Send;
}

impl<F, Fut> ConnectionProbe for F
where
    F: Fn(Duration) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ProbeOutcome, BoxError>> + Send,
{
    fn probe(
        &self,
        timeout: Duration,
    ) -> impl Future<Output = Result<ProbeOutcome, BoxError>> + Send {
        self(timeout)
    }
}

/// Why a probe counted as failed.
///
/// All variants are handled the same way by the reconnection logic; the
/// distinction only shows up in events and logs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    /// The probe completed and reported the remote end unreachable.
    #[error("remote end unreachable")]
    Unreachable,

    /// The probe returned an error.
    #[error("probe failed: {0}")]
    Failed(String),

    /// The probe did not finish within the probe timeout.
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),

    /// The probe panicked.
    #[error("probe panicked")]
    Panicked,
}

impl From<BoxError> for ProbeError {
    fn from(error: BoxError) -> Self {
        ProbeError::Failed(error.to_string())
    }
}

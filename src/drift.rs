//! Clock-drift warnings.
//!
//! A worker whose origin timestamps deviate from local receive time by more
//! than the configured threshold probably has an unsynchronized clock. The
//! warning is emitted at most once per hostname; the memo is shared by every
//! aggregator in the process and holds [`DRIFT_MEMO_CAPACITY`] hostnames.

use std::sync::OnceLock;

use parking_lot::Mutex;
use tracing::warn;

use crate::lru::LruMap;
use crate::models::constants::DRIFT_MEMO_CAPACITY;

/// A detected drift between origin and ingress clocks.
#[derive(Debug, Clone, PartialEq)]
pub struct DriftWarning {
    pub hostname: String,
    /// Absolute difference in seconds.
    pub drift: f64,
    pub timestamp: f64,
    pub local_received: f64,
}

/// Receiver for drift warnings.
pub type DriftSink = Box<dyn Fn(&DriftWarning) + Send + Sync>;

fn memo() -> &'static Mutex<LruMap<String, ()>> {
    static MEMO: OnceLock<Mutex<LruMap<String, ()>>> = OnceLock::new();
    MEMO.get_or_init(|| Mutex::new(LruMap::new(DRIFT_MEMO_CAPACITY)))
}

fn sink() -> &'static Mutex<Option<DriftSink>> {
    static SINK: OnceLock<Mutex<Option<DriftSink>>> = OnceLock::new();
    SINK.get_or_init(|| Mutex::new(None))
}

fn log_drift(warning: &DriftWarning) {
    warn!(
        hostname = %warning.hostname,
        drift = warning.drift,
        timestamp = warning.timestamp,
        local_received = warning.local_received,
        "substantial drift from {} may mean clocks are out of sync",
        warning.hostname,
    );
}

/// Route drift warnings to `f` instead of the log.
pub fn set_sink(f: DriftSink) {
    *sink().lock() = Some(f);
}

/// Forget every warned hostname and restore the logging sink.
pub fn reset() {
    memo().lock().clear();
    *sink().lock() = None;
}

/// Report a heartbeat's timing. Emits a warning if the drift exceeds
/// `drift_max` and this hostname has not been warned about yet.
///
/// Returns `true` iff a warning was emitted.
pub fn report(hostname: &str, timestamp: f64, local_received: f64, drift_max: f64) -> bool {
    let drift = (local_received - timestamp).abs();
    if drift <= drift_max {
        return false;
    }

    {
        let mut warned = memo().lock();
        if warned.contains(hostname) {
            return false;
        }
        warned.put(hostname.to_string(), ());
    }

    let warning = DriftWarning {
        hostname: hostname.to_string(),
        drift,
        timestamp,
        local_received,
    };
    match sink().lock().as_ref() {
        Some(f) => f(&warning),
        None => log_drift(&warning),
    }
    true
}

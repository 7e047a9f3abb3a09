//! Concurrent scan workers and their coordination.
//!
//! A bounded pool ([`pool::WorkerPool`]) hands out exclusive leases on
//! [`scan_worker::ScanWorker`] handles. Each handle fronts a dedicated tokio
//! task executing scan requests; requests and replies are correlated through
//! cookies ([`protocol`]).

pub mod pool;
pub mod protocol;
pub mod scan_worker;

pub use pool::WorkerPool;
pub use protocol::{CallOptions, Cookie, ScanProgress, DEFAULT_RPC_TIMEOUT};
pub use scan_worker::{ScanOutcome, ScanWorker};

/// Type tag selecting a worker flavor inside the pool.
///
/// A single flavor exists today; the pool keeps one handle list per tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerKind {
    /// Line-separator scanning and counting.
    Scanner,
}

/// Lifecycle state of a worker handle.
///
/// `Occupied` is an exclusive lease: the pool never hands one handle to two
/// concurrent owners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Occupied,
    Destroyed,
}

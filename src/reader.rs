//! Random-access line readers over a [`ByteSource`].
//!
//! Both reader flavors share the same pipeline: a [`ChunkedIndexBuilder`]
//! walks the source once and produces a global [`LineIndex`]; the index then
//! drives either fragment-grouped decoding ([`FragmentReader`]) or direct
//! range decoding ([`LineRangeReader`]). Loading runs on a spawned task;
//! callers observe it through a load state watch and a broadcast event
//! stream.

pub mod factory;
pub mod fragment;
pub mod index;
pub mod line_range;

pub use factory::ReaderFactory;
pub use fragment::{Fragment, FragmentReader, FragmentStatus, DEFAULT_FRAGMENT_LINES};
pub use index::{ChunkedIndexBuilder, LineIndex, DEFAULT_CHUNK_SIZE};
pub use line_range::{LineRangeReader, ReadLines};

use crate::error::{LineSeekError, Result};
use crate::source::ByteSource;
use crate::worker::WorkerPool;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::sync::{broadcast, watch};

/// Load state of a reader's line index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading,
    Loaded,
}

/// Events published while a reader indexes its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderEvent {
    /// One chunk finished scanning; `loaded` bytes of `total` are indexed.
    LoadProgress { loaded: u64, total: u64 },
    /// Indexing completed. Published exactly once per reader.
    Loaded { loaded: u64, total: u64 },
}

/// Tuning knobs shared by both reader flavors.
#[derive(Debug, Clone)]
pub struct ReaderOptions {
    /// Lines per fragment (fragment reader only).
    pub fragment_lines: u64,
    /// Bytes scanned per indexing round trip.
    pub chunk_size: usize,
    /// Deadline for each worker RPC issued by the reader.
    pub rpc_timeout: Duration,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            fragment_lines: DEFAULT_FRAGMENT_LINES,
            chunk_size: DEFAULT_CHUNK_SIZE,
            rpc_timeout: crate::worker::DEFAULT_RPC_TIMEOUT,
        }
    }
}

/// Surface common to both reader flavors.
#[async_trait]
pub trait LineReader: Send + Sync {
    /// Resolves once the index is built; immediately when already built.
    /// Never resolves if indexing failed.
    async fn loaded(&self);

    fn state(&self) -> LoadState;

    /// Total indexed lines. Fails with `NotLoaded` until loading completes.
    fn total_lines(&self) -> Result<u64>;

    fn source_size(&self) -> u64;

    /// Subscribe to load events. Events published before the call are not
    /// replayed.
    fn subscribe(&self) -> broadcast::Receiver<ReaderEvent>;
}

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// State shared between a reader handle and its background load task.
pub(crate) struct ReaderCore {
    source: ByteSource,
    pool: Arc<WorkerPool>,
    rpc_timeout: Duration,
    index: OnceLock<LineIndex>,
    state: watch::Receiver<LoadState>,
    events: broadcast::Sender<ReaderEvent>,
}

impl ReaderCore {
    /// Create the shared core and spawn the load task. The watch sender
    /// lives inside the task: if indexing fails the task exits without ever
    /// sending `Loaded`, and the reader stays in `Loading` for good.
    pub(crate) fn spawn_load(
        source: ByteSource,
        pool: Arc<WorkerPool>,
        options: &ReaderOptions,
    ) -> Arc<Self> {
        let (state_tx, state_rx) = watch::channel(LoadState::Idle);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let core = Arc::new(Self {
            source,
            pool,
            rpc_timeout: options.rpc_timeout,
            index: OnceLock::new(),
            state: state_rx,
            events,
        });

        let _ = state_tx.send(LoadState::Loading);
        let chunk_size = options.chunk_size;
        let task_core = Arc::clone(&core);
        tokio::spawn(load_task(task_core, state_tx, chunk_size));

        core
    }

    pub(crate) fn source(&self) -> &ByteSource {
        &self.source
    }

    pub(crate) fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    pub(crate) fn rpc_timeout(&self) -> Duration {
        self.rpc_timeout
    }

    pub(crate) fn index(&self) -> Result<&LineIndex> {
        self.index.get().ok_or(LineSeekError::NotLoaded)
    }

    pub(crate) fn state(&self) -> LoadState {
        *self.state.borrow()
    }

    pub(crate) async fn loaded(&self) {
        let mut state = self.state.clone();
        if state
            .wait_for(|s| *s == LoadState::Loaded)
            .await
            .is_err()
        {
            // Sender gone without reaching Loaded: indexing failed and the
            // reader stays in Loading. Callers of `loaded` wait forever.
            futures::future::pending::<()>().await;
        }
    }

    pub(crate) fn total_lines(&self) -> Result<u64> {
        Ok(self.index()?.line_count())
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<ReaderEvent> {
        self.events.subscribe()
    }
}

async fn load_task(core: Arc<ReaderCore>, state_tx: watch::Sender<LoadState>, chunk_size: usize) {
    let builder = ChunkedIndexBuilder::new(Arc::clone(core.pool()))
        .with_chunk_size(chunk_size)
        .with_rpc_timeout(core.rpc_timeout());

    let total = core.source.len();
    let events = core.events.clone();
    let built = builder
        .build(&core.source, |loaded, total| {
            let _ = events.send(ReaderEvent::LoadProgress { loaded, total });
        })
        .await;

    match built {
        Ok(index) => {
            log::debug!(
                "indexed {} lines over {} bytes",
                index.line_count(),
                total
            );
            let _ = core.index.set(index);
            let _ = state_tx.send(LoadState::Loaded);
            let _ = core.events.send(ReaderEvent::Loaded {
                loaded: total,
                total,
            });
        }
        Err(err) => {
            log::error!("indexing failed, reader stays unloaded: {err}");
        }
    }
}

/// Decode consecutive line ranges of `bytes` into strings.
///
/// `local_ends` holds each line's last byte offset relative to `bytes`, in
/// increasing order. Lines keep their trailing separator bytes, so
/// concatenating the result reproduces `bytes` exactly. Invalid UTF-8 is
/// replaced, never an error.
pub(crate) fn decode_lines(bytes: &[u8], local_ends: &[u64]) -> Vec<String> {
    let mut lines = Vec::with_capacity(local_ends.len());
    let mut start = 0usize;
    for &end in local_ends {
        let end = (end as usize + 1).min(bytes.len());
        lines.push(String::from_utf8_lossy(&bytes[start..end]).into_owned());
        start = end;
    }
    lines
}

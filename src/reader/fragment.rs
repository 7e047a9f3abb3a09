//! Fragment-grouped line access with per-fragment decode caching.
//!
//! The global index is partitioned into fixed-size line groups. Each
//! fragment decodes its own byte slice lazily and caches the result; the
//! cache cell sits behind an async mutex, so concurrent callers of an
//! undecoded fragment join one in-flight decode instead of duplicating it.

use crate::error::Result;
use crate::reader::{
    decode_lines, LineIndex, LineReader, LoadState, ReaderCore, ReaderEvent, ReaderOptions,
};
use crate::scanner::SeparatorKind;
use crate::source::ByteSource;
use crate::worker::{CallOptions, WorkerKind, WorkerPool};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

/// Default lines per fragment.
pub const DEFAULT_FRAGMENT_LINES: u64 = 48;

/// Decode lifecycle of one fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentStatus {
    Idle,
    ArrayLoading,
    ArrayLoaded,
    Decoding,
    Complete,
}

#[derive(Debug, Default)]
struct FragmentCell {
    text: Option<Arc<Vec<String>>>,
    load_duration: Duration,
    decode_duration: Duration,
}

/// A fixed group of consecutive lines with its own lazy decode cache.
///
/// Position metadata (ordinal, first line, line count) is immutable; the
/// decoded text is cached on first access and discarded by [`clear`].
///
/// [`clear`]: Fragment::clear
#[derive(Debug)]
pub struct Fragment {
    ordinal: u64,
    first_line: u64,
    line_count: u64,
    slice: ByteSource,
    kind: Option<SeparatorKind>,
    pool: Arc<WorkerPool>,
    rpc_timeout: Duration,
    status: parking_lot::Mutex<FragmentStatus>,
    cell: tokio::sync::Mutex<FragmentCell>,
    decode_starts: AtomicU64,
}

impl Fragment {
    pub fn ordinal(&self) -> u64 {
        self.ordinal
    }

    /// Global line number of this fragment's first line.
    pub fn first_line(&self) -> u64 {
        self.first_line
    }

    pub fn line_count(&self) -> u64 {
        self.line_count
    }

    pub fn status(&self) -> FragmentStatus {
        *self.status.lock()
    }

    /// How many decodes have started on this fragment. Stays at one under
    /// concurrent access; grows only when a cleared or failed fragment is
    /// decoded again.
    pub fn decode_starts(&self) -> u64 {
        self.decode_starts.load(Ordering::Relaxed)
    }

    /// Elapsed times of the last completed decode (slice load, text decode).
    pub async fn durations(&self) -> (Duration, Duration) {
        let cell = self.cell.lock().await;
        (cell.load_duration, cell.decode_duration)
    }

    /// The fragment's decoded lines, separators included.
    ///
    /// Returns the cached array when present. Otherwise runs the decode while
    /// holding the cache lock: concurrent callers queue behind it and find
    /// the cache filled, so the work runs once. A failure resets the status
    /// to `Idle` and leaves the cache empty; the next call retries from
    /// scratch.
    pub async fn text_lines(&self) -> Result<Arc<Vec<String>>> {
        let mut cell = self.cell.lock().await;
        if let Some(text) = &cell.text {
            return Ok(Arc::clone(text));
        }

        self.decode_starts.fetch_add(1, Ordering::Relaxed);
        match self.decode(&mut cell).await {
            Ok(text) => Ok(text),
            Err(err) => {
                *self.status.lock() = FragmentStatus::Idle;
                Err(err)
            }
        }
    }

    async fn decode(&self, cell: &mut FragmentCell) -> Result<Arc<Vec<String>>> {
        *self.status.lock() = FragmentStatus::ArrayLoading;
        let load_started = Instant::now();
        let bytes = self.slice.as_bytes().to_vec();
        cell.load_duration = load_started.elapsed();
        *self.status.lock() = FragmentStatus::ArrayLoaded;

        *self.status.lock() = FragmentStatus::Decoding;
        let decode_started = Instant::now();
        let worker = self.pool.acquire(WorkerKind::Scanner)?;
        let scanned = worker
            .scan_all(
                self.slice.clone(),
                self.slice.len(),
                self.slice.len() as usize,
                self.kind,
                None,
                CallOptions {
                    cookie: None,
                    timeout: self.rpc_timeout,
                },
            )
            .await;
        self.pool.release(&worker);

        let mut local_ends = scanned?.offsets;
        // The last fragment of a source without a trailing separator has a
        // synthetic final line; give it the same tail entry the index does.
        if (local_ends.len() as u64) < self.line_count && !self.slice.is_empty() {
            let tail = self.slice.len() - 1;
            if local_ends.last() != Some(&tail) {
                local_ends.push(tail);
            }
        }

        let text = Arc::new(decode_lines(&bytes, &local_ends));
        cell.decode_duration = decode_started.elapsed();
        cell.text = Some(Arc::clone(&text));
        *self.status.lock() = FragmentStatus::Complete;
        Ok(text)
    }

    /// Discard cached text and reset to `Idle`. Position metadata survives;
    /// the next `text_lines` call recomputes from scratch.
    pub async fn clear(&self) {
        let mut cell = self.cell.lock().await;
        cell.text = None;
        cell.load_duration = Duration::ZERO;
        cell.decode_duration = Duration::ZERO;
        *self.status.lock() = FragmentStatus::Idle;
    }
}

/// Reader that serves lines through cacheable fragments.
pub struct FragmentReader {
    core: Arc<ReaderCore>,
    fragment_lines: u64,
    fragments: OnceLock<Vec<Arc<Fragment>>>,
}

impl FragmentReader {
    /// Open a reader over `source` and start indexing in the background.
    pub fn open(source: ByteSource, pool: Arc<WorkerPool>, options: &ReaderOptions) -> Arc<Self> {
        let core = ReaderCore::spawn_load(source, pool, options);
        Arc::new(Self {
            core,
            fragment_lines: options.fragment_lines.max(1),
            fragments: OnceLock::new(),
        })
    }

    /// Fragments covering the whole source. `NotLoaded` until indexing
    /// completes.
    pub fn fragment_count(&self) -> Result<u64> {
        Ok(self.fragment_list()?.len() as u64)
    }

    /// The fragment at `ordinal`, not yet decoded. `None` when out of range;
    /// `NotLoaded` before indexing completes.
    pub fn request_fragment(&self, ordinal: u64) -> Result<Option<Arc<Fragment>>> {
        Ok(self.fragment_list()?.get(ordinal as usize).cloned())
    }

    fn fragment_list(&self) -> Result<&Vec<Arc<Fragment>>> {
        let index = self.core.index()?;
        Ok(self
            .fragments
            .get_or_init(|| self.partition(index)))
    }

    /// Split the index into groups of `fragment_lines`; the last group takes
    /// the remainder. Each fragment's slice spans from the end of the
    /// previous fragment's last line to the end of its own last line.
    fn partition(&self, index: &LineIndex) -> Vec<Arc<Fragment>> {
        let total = index.line_count();
        let count = total.div_ceil(self.fragment_lines);
        let mut fragments = Vec::with_capacity(count as usize);

        for ordinal in 0..count {
            let first_line = ordinal * self.fragment_lines;
            let end_line = (first_line + self.fragment_lines).min(total);
            let span = index
                .range_span(first_line, end_line)
                .unwrap_or(0..0);
            fragments.push(Arc::new(Fragment {
                ordinal,
                first_line,
                line_count: end_line - first_line,
                slice: self.core.source().slice(span),
                kind: index.separator_kind(),
                pool: Arc::clone(self.core.pool()),
                rpc_timeout: self.core.rpc_timeout(),
                status: parking_lot::Mutex::new(FragmentStatus::Idle),
                cell: tokio::sync::Mutex::new(FragmentCell::default()),
                decode_starts: AtomicU64::new(0),
            }));
        }

        fragments
    }
}

#[async_trait]
impl LineReader for FragmentReader {
    async fn loaded(&self) {
        self.core.loaded().await;
    }

    fn state(&self) -> LoadState {
        self.core.state()
    }

    fn total_lines(&self) -> Result<u64> {
        self.core.total_lines()
    }

    fn source_size(&self) -> u64 {
        self.core.source().len()
    }

    fn subscribe(&self) -> broadcast::Receiver<ReaderEvent> {
        self.core.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LineSeekError;
    use std::time::Duration;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    fn options(fragment_lines: u64) -> ReaderOptions {
        ReaderOptions {
            fragment_lines,
            chunk_size: 8,
            ..ReaderOptions::default()
        }
    }

    fn numbered_lines(n: usize) -> Vec<u8> {
        (0..n)
            .map(|i| format!("line {i}\n"))
            .collect::<String>()
            .into_bytes()
    }

    async fn open_loaded(content: Vec<u8>, fragment_lines: u64) -> (Arc<WorkerPool>, Arc<FragmentReader>) {
        let pool = Arc::new(WorkerPool::with_max_workers(2));
        let reader = FragmentReader::open(
            ByteSource::from_bytes(content),
            Arc::clone(&pool),
            &options(fragment_lines),
        );
        timeout(WAIT, reader.loaded()).await.expect("load timed out");
        (pool, reader)
    }

    #[tokio::test]
    async fn partitions_into_ceil_groups() {
        let (pool, reader) = open_loaded(numbered_lines(10), 4).await;

        assert_eq!(reader.total_lines().unwrap(), 10);
        assert_eq!(reader.fragment_count().unwrap(), 3);

        let last = reader.request_fragment(2).unwrap().unwrap();
        assert_eq!(last.first_line(), 8);
        assert_eq!(last.line_count(), 2);
        assert!(reader.request_fragment(3).unwrap().is_none());

        pool.shutdown().await;
    }

    #[tokio::test]
    async fn decodes_fragment_text() {
        let (pool, reader) = open_loaded(numbered_lines(10), 4).await;

        let fragment = reader.request_fragment(1).unwrap().unwrap();
        assert_eq!(fragment.status(), FragmentStatus::Idle);

        let lines = timeout(WAIT, fragment.text_lines())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            *lines,
            vec!["line 4\n", "line 5\n", "line 6\n", "line 7\n"]
        );
        assert_eq!(fragment.status(), FragmentStatus::Complete);

        pool.shutdown().await;
    }

    #[tokio::test]
    async fn concurrent_calls_decode_once() {
        let (pool, reader) = open_loaded(numbered_lines(6), 6).await;
        let fragment = reader.request_fragment(0).unwrap().unwrap();

        let (a, b) = tokio::join!(fragment.text_lines(), fragment.text_lines());
        let (a, b) = (a.unwrap(), b.unwrap());
        assert!(Arc::ptr_eq(&a, &b) || *a == *b);
        assert_eq!(fragment.decode_starts(), 1);

        pool.shutdown().await;
    }

    #[tokio::test]
    async fn clear_resets_and_redecodes() {
        let (pool, reader) = open_loaded(numbered_lines(6), 6).await;
        let fragment = reader.request_fragment(0).unwrap().unwrap();

        let before = timeout(WAIT, fragment.text_lines()).await.unwrap().unwrap();
        fragment.clear().await;
        assert_eq!(fragment.status(), FragmentStatus::Idle);

        let after = timeout(WAIT, fragment.text_lines()).await.unwrap().unwrap();
        assert_eq!(*before, *after);
        assert_eq!(fragment.decode_starts(), 2);

        pool.shutdown().await;
    }

    #[tokio::test]
    async fn trailing_partial_line_is_decoded() {
        let (pool, reader) = open_loaded(b"first\nsecond".to_vec(), 48).await;

        let fragment = reader.request_fragment(0).unwrap().unwrap();
        let lines = timeout(WAIT, fragment.text_lines()).await.unwrap().unwrap();
        assert_eq!(*lines, vec!["first\n", "second"]);

        pool.shutdown().await;
    }

    #[tokio::test]
    async fn access_before_loaded_fails() {
        // A pool with no free worker keeps indexing from ever starting.
        let pool = Arc::new(WorkerPool::with_max_workers(1));
        let held = pool.acquire(WorkerKind::Scanner).unwrap();

        let reader = FragmentReader::open(
            ByteSource::from_bytes(numbered_lines(4)),
            Arc::clone(&pool),
            &options(4),
        );
        tokio::task::yield_now().await;

        assert_eq!(reader.state(), LoadState::Loading);
        assert!(matches!(
            reader.total_lines(),
            Err(LineSeekError::NotLoaded)
        ));
        assert!(matches!(
            reader.request_fragment(0),
            Err(LineSeekError::NotLoaded)
        ));

        pool.release(&held);
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn publishes_progress_and_loaded_events() {
        let pool = Arc::new(WorkerPool::with_max_workers(1));
        let reader = FragmentReader::open(
            ByteSource::from_bytes(numbered_lines(4)),
            Arc::clone(&pool),
            &options(4),
        );
        let mut events = reader.subscribe();
        timeout(WAIT, reader.loaded()).await.expect("load timed out");

        let mut saw_progress = false;
        loop {
            match events.try_recv() {
                Ok(ReaderEvent::LoadProgress { loaded, total }) => {
                    assert!(loaded <= total);
                    saw_progress = true;
                }
                Ok(ReaderEvent::Loaded { loaded, total }) => {
                    assert_eq!(loaded, total);
                    break;
                }
                Err(_) => panic!("loaded event missing"),
            }
        }
        assert!(saw_progress);

        pool.shutdown().await;
    }
}

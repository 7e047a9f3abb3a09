//! Explicit construction point for readers sharing one worker pool.

use crate::error::Result;
use crate::reader::{FragmentReader, LineRangeReader, ReaderOptions};
use crate::source::ByteSource;
use crate::worker::WorkerPool;
use std::path::Path;
use std::sync::Arc;

/// Hands out readers wired to a shared [`WorkerPool`].
///
/// Callers that want readers to share workers hold one factory (or clone its
/// pool handle); nothing is process-global.
pub struct ReaderFactory {
    pool: Arc<WorkerPool>,
    options: ReaderOptions,
}

impl ReaderFactory {
    /// A factory with its own pool, bounded by host parallelism.
    pub fn new() -> Self {
        Self::with_pool(Arc::new(WorkerPool::new()))
    }

    /// A factory over an existing pool.
    pub fn with_pool(pool: Arc<WorkerPool>) -> Self {
        Self {
            pool,
            options: ReaderOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ReaderOptions) -> Self {
        self.options = options;
        self
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }

    /// A fragment reader over in-memory or mapped bytes; indexing starts
    /// immediately.
    pub fn fragment_reader(&self, source: ByteSource) -> Arc<FragmentReader> {
        FragmentReader::open(source, Arc::clone(&self.pool), &self.options)
    }

    /// A fragment reader over a memory-mapped file.
    pub fn fragment_reader_from_path(&self, path: impl AsRef<Path>) -> Result<Arc<FragmentReader>> {
        Ok(self.fragment_reader(ByteSource::from_path(path)?))
    }

    /// A line-range reader over in-memory or mapped bytes.
    pub fn line_range_reader(&self, source: ByteSource) -> Arc<LineRangeReader> {
        LineRangeReader::open(source, Arc::clone(&self.pool), &self.options)
    }

    /// A line-range reader over a memory-mapped file.
    pub fn line_range_reader_from_path(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<Arc<LineRangeReader>> {
        Ok(self.line_range_reader(ByteSource::from_path(path)?))
    }

    /// Terminate the shared pool. Readers created earlier keep their index
    /// but can no longer decode fragments.
    pub async fn shutdown(&self) {
        self.pool.shutdown().await;
    }
}

impl Default for ReaderFactory {
    fn default() -> Self {
        Self::new()
    }
}

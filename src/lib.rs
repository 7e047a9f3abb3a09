//! # lineseek - Random-Access Line Reading for Huge Files
//!
//! Treats an arbitrarily large binary source (a file, potentially gigabytes,
//! never fully materialized) as a random-access sequence of text lines,
//! scanning and decoding no more than what is requested.
//!
//! ## Features
//!
//! - **Large File Support**: Memory-mapped byte sources with zero-copy slicing
//! - **Chunked Indexing**: One sequential pass in fixed-size chunks builds a
//!   global line index without holding more than one chunk in flight
//! - **Separator Auto-Detection**: LF, CR, and CRLF handled uniformly,
//!   including separators straddling chunk boundaries
//! - **Bounded Concurrency**: Scanning runs on a bounded pool of worker tasks
//!   behind a correlated request/response protocol with timeouts
//! - **Two Access Modes**: Cacheable fixed-size line fragments with
//!   single-flight decoding, or lean on-demand line-range reads
//!
//! ## Architecture
//!
//! The library is organized into focused modules following modern Rust patterns:
//!
//! - [`error`] - Centralized error types and handling
//! - [`scanner`] - Pure line-separator scanning over byte ranges
//! - [`source`] - Byte source abstraction with memory mapping
//! - [`worker`] - Worker pool and correlated scan RPC
//! - [`reader`] - Line index construction and both reader flavors

// Core modules
pub mod error;
pub mod scanner;
pub mod source;

// Concurrency layer
pub mod worker;

// Reader surface
pub mod reader;

// Re-export commonly used types for convenience
pub use error::{LineSeekError, Result};

// Public API surface for external usage
pub use reader::{
    Fragment, FragmentReader, LineRangeReader, LineReader, ReaderEvent, ReaderFactory,
    ReaderOptions,
};
pub use scanner::SeparatorKind;
pub use source::ByteSource;
pub use worker::WorkerPool;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

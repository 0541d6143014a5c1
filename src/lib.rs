//! Ariadne: Wikipedia dump extraction into a sharded JSONL document store
//!
//! This crate turns a Wikipedia XML dump (plain or bz2-compressed) into a
//! self-describing directory of structured documents:
//!
//! 1. **Extraction** -- Stream pages out of the dump, structure the wikitext
//!    (lead, infobox, section tree, table of contents, deduplicated
//!    references, redirect target) on a parallel worker pool, and append one
//!    JSON document per line to size-rotated shard files
//! 2. **Indexing** -- Persist a hash-partitioned title index next to the data
//!    so a single title resolves by opening exactly one index shard and
//!    reading exactly one line of one data file
//! 3. **Lookup** -- Resolve titles against a finished store, optionally
//!    following redirect chains with cycle detection
//!
//! # Architecture
//!
//! - **Streaming XML parsing** -- Never loads the dump into memory; pages are
//!    pulled one at a time off an event-based reader
//! - **Parallel structuring** -- Uses rayon to transform pages concurrently;
//!    a bounded queue feeds a single sequential writer, so shard files and
//!    the index need no locking
//! - **Resumable extraction** -- The persisted index doubles as a checkpoint:
//!    a rerun reloads it, skips every title already stored, truncates a
//!    partial trailing line, and appends where the last run stopped
//!
//! # Key Modules
//!
//! - [`parser`] -- Streaming XML page reader with BZ2 decompression
//! - [`structure`] -- Pure wikitext-to-document transform
//! - [`segment`] -- Heading and template segmentation primitives
//! - [`extract`] -- Parallel extraction with shard rotation and resume
//! - [`index`] -- SHA-256-partitioned persistent title index
//! - [`lookup`] -- Title resolution with redirect following
//! - [`models`] -- Core data types (PageRecord, StructuredDocument, Progress)
//! - [`stats`] -- Thread-safe counters for extraction runs
//! - [`config`] -- Rotation and pool constants
//!
//! # Example Usage
//!
//! ```bash
//! # Extract a dump into a store directory
//! ariadne extract enwiki-latest-pages-articles.xml.bz2 -o store/
//!
//! # Resolve a title, following redirects
//! ariadne lookup store/ "Ada Lovelace"
//!
//! # Time the structuring transform against dump reading
//! ariadne benchmark enwiki-latest-pages-articles.xml.bz2 --seconds 10
//! ```

pub mod config;
pub mod extract;
pub mod index;
pub mod lookup;
pub mod models;
pub mod parser;
pub mod segment;
pub mod stats;
pub mod structure;

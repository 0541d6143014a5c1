//! End-to-end extraction: streams pages from the dump, structures them on a
//! fixed-size worker pool, and appends the results through a single writer
//! that owns the shard files, the title index and the rotation counters.
//!
//! The writer is the only component touching the open file and the in-memory
//! index table, so no locking is involved; workers are pure and deliver
//! results through a bounded queue, which also provides backpressure against
//! a fast reader. Finalization (persisting the index with the rotation
//! checkpoint embedded) runs whether the pipeline completed or failed, so the
//! on-disk state always describes a consistent prefix of the work done.

use crate::config::{ExtractOptions, RESULT_QUEUE_CAPACITY};
use crate::index::{self, IndexTable};
use crate::models::{PageRecord, Progress, StorageLocation, StructuredDocument};
use crate::parser::{open_stream, DumpReader};
use crate::stats::ExtractionStats;
use crate::structure::structure;
use anyhow::{Context, Result};
use indicatif::ProgressBar;
use once_cell::sync::Lazy;
use rayon::iter::{ParallelBridge, ParallelIterator};
use rustc_hash::FxHashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

static TEXT_BYTES_REGEX: Lazy<regex::bytes::Regex> =
    Lazy::new(|| regex::bytes::Regex::new(r#"<text [^>]*?bytes="(\d+)""#).unwrap());

/// Cheap page-count estimate: scans the raw byte stream for revision text
/// markers with a non-zero length attribute, without parsing any structure.
/// Markers split across chunk boundaries are missed; the result only sizes
/// the progress bar.
pub fn estimate_total_count(input: &Path) -> Result<u64> {
    let mut stream = open_stream(input)?;
    let mut buf = vec![0u8; 1 << 20];
    let mut total = 0u64;
    loop {
        let n = stream.read(&mut buf).context("failed to scan dump")?;
        if n == 0 {
            break;
        }
        for caps in TEXT_BYTES_REGEX.captures_iter(&buf[..n]) {
            let nonzero = std::str::from_utf8(&caps[1])
                .ok()
                .and_then(|digits| digits.parse::<u64>().ok())
                .is_some_and(|bytes| bytes > 0);
            if nonzero {
                total += 1;
            }
        }
    }
    Ok(total)
}

fn shard_dir(dest: &Path, dir_id: u32) -> PathBuf {
    dest.join(format!("{dir_id:02x}"))
}

fn shard_file(dest: &Path, dir_id: u32, file_id: u32) -> PathBuf {
    shard_dir(dest, dir_id).join(format!("{file_id}.jsonl"))
}

/// Sequential owner of the current shard file, the title index and the
/// rotation counters. Exactly one of these exists per run.
struct ShardWriter<'a> {
    dest: &'a Path,
    opts: &'a ExtractOptions,
    file: File,
    table: IndexTable,
    progress: Progress,
}

impl<'a> ShardWriter<'a> {
    /// Reopens the checkpointed shard file in append mode, truncating it back
    /// to the checkpointed byte size first. A crash can leave an unterminated
    /// partial line past the checkpoint; anything beyond it is unindexed, and
    /// keeping it would misalign every subsequent line number.
    fn open(
        dest: &'a Path,
        opts: &'a ExtractOptions,
        table: IndexTable,
        progress: Progress,
    ) -> Result<Self> {
        let dir = shard_dir(dest, progress.dir_id);
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create shard directory: {}", dir.display()))?;
        let path = shard_file(dest, progress.dir_id, progress.file_id);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open shard file: {}", path.display()))?;
        file.set_len(progress.byte_size)
            .with_context(|| format!("failed to truncate shard file: {}", path.display()))?;
        Ok(Self {
            dest,
            opts,
            file,
            table,
            progress,
        })
    }

    /// Appends one serialized record (newline included) and indexes it. The
    /// index entry is created only after the bytes are written, so the index
    /// never references a record that is not fully on disk.
    fn append(&mut self, title: String, data: &[u8]) -> Result<()> {
        if self.progress.byte_size > 0
            && self.progress.byte_size + data.len() as u64 > self.opts.max_shard_bytes
        {
            self.rotate()?;
        }
        self.file.write_all(data).with_context(|| {
            format!(
                "failed to append to shard {}",
                shard_file(self.dest, self.progress.dir_id, self.progress.file_id).display()
            )
        })?;
        self.table.insert(
            title,
            StorageLocation {
                dir_id: self.progress.dir_id,
                file_id: self.progress.file_id,
                line: self.progress.line_count,
            },
        );
        self.progress.byte_size += data.len() as u64;
        self.progress.line_count += 1;
        Ok(())
    }

    fn rotate(&mut self) -> Result<()> {
        self.progress.file_id += 1;
        self.progress.byte_size = 0;
        self.progress.line_count = 0;
        if self.progress.file_id >= self.opts.max_files_per_dir {
            self.progress.file_id = 0;
            self.progress.dir_id += 1;
        }
        let dir = shard_dir(self.dest, self.progress.dir_id);
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create shard directory: {}", dir.display()))?;
        let path = shard_file(self.dest, self.progress.dir_id, self.progress.file_id);
        self.file = File::create(&path)
            .with_context(|| format!("failed to open shard file: {}", path.display()))?;
        Ok(())
    }

    fn into_parts(self) -> (IndexTable, Progress) {
        (self.table, self.progress)
    }
}

/// Structures and serializes one page on a worker thread. Any failure inside
/// the transform (including a panic) skips the page with a warning instead of
/// taking down the run.
fn encode_page(page: PageRecord) -> Option<(String, Vec<u8>)> {
    let PageRecord {
        title,
        timestamp,
        source,
    } = page;
    let body = match catch_unwind(AssertUnwindSafe(|| structure(&source))) {
        Ok(body) => body,
        Err(_) => {
            warn!(title = %title, "structuring failed, page skipped");
            return None;
        }
    };
    let document = StructuredDocument {
        title: title.clone(),
        timestamp,
        body,
    };
    match serde_json::to_vec(&document) {
        Ok(mut data) => {
            data.push(b'\n');
            Some((title, data))
        }
        Err(e) => {
            warn!(title = %title, error = %e, "failed to serialize record, page skipped");
            None
        }
    }
}

/// Drives a full extraction run from `input` into `dest`.
///
/// If `dest` already holds root metadata, the previous index is loaded and
/// already-extracted titles are skipped before dispatch, continuing exactly
/// where the checkpoint left off. The index (with the rotation checkpoint
/// embedded) is persisted even when the pipeline fails partway.
pub fn run_extraction(input: &Path, dest: &Path, opts: &ExtractOptions) -> Result<ExtractionStats> {
    fs::create_dir_all(dest)
        .with_context(|| format!("failed to create destination: {}", dest.display()))?;

    let total = estimate_total_count(input)?;
    info!(estimated_pages = total, "estimated page count");

    let (table, progress) = if index::metadata_path(dest).is_file() {
        let metadata = index::read_metadata(dest)?;
        let table = index::load_all(dest)?;
        info!(pages = table.len(), "resuming previous extraction");
        (table, metadata.progress)
    } else {
        (IndexTable::default(), Progress::default())
    };
    let known_titles: FxHashSet<String> = table.keys().cloned().collect();

    let reader = DumpReader::open(input)?;
    let mut writer = ShardWriter::open(dest, opts, table, progress)?;
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(opts.workers)
        .build()
        .context("failed to build worker pool")?;
    let stats = ExtractionStats::new();
    let pb = ProgressBar::new(total);
    let (tx, rx) = mpsc::sync_channel::<(String, Vec<u8>)>(RESULT_QUEUE_CAPACITY);

    let write_error: Option<anyhow::Error> = std::thread::scope(|scope| {
        let stats = &stats;
        let pb = &pb;
        let known_titles = &known_titles;
        let pool = &pool;
        // Joined implicitly when the scope closes, after the channel drops.
        let _producer = scope.spawn(move || {
            // A send failure means the writer stopped; workers just wind down.
            let _ = pool.install(|| {
                reader
                    .filter(|page| {
                        if known_titles.contains(&page.title) {
                            stats.inc_skipped();
                            pb.inc(1);
                            false
                        } else {
                            true
                        }
                    })
                    .par_bridge()
                    .try_for_each_with(tx, |tx, page| match encode_page(page) {
                        Some(result) => tx.send(result).map_err(|_| ()),
                        None => {
                            stats.inc_failed();
                            pb.inc(1);
                            Ok(())
                        }
                    })
            });
        });

        let mut failure = None;
        while let Ok((title, data)) = rx.recv() {
            let len = data.len() as u64;
            if let Err(e) = writer.append(title, &data) {
                failure = Some(e);
                break;
            }
            stats.inc_written(len);
            pb.inc(1);
        }
        // Unblocks any worker still waiting on a full queue.
        drop(rx);
        failure
    });

    pb.finish_and_clear();

    let (table, progress) = writer.into_parts();
    index::build(dest, &table, opts.dir_length, progress).context("failed to persist index")?;
    info!(
        written = stats.written(),
        skipped = stats.skipped(),
        failed = stats.failed(),
        "extraction finalized"
    );

    match write_error {
        Some(e) => Err(e.context("extraction aborted by write failure")),
        None => Ok(stats),
    }
}

#[derive(Debug)]
pub struct BenchmarkReport {
    pub pages: u64,
    pub chars: u64,
    pub structure_secs: f64,
    pub read_secs: f64,
}

/// Times the structuring transform against dump reading for up to
/// `max_seconds`, mirroring what one extraction worker does.
pub fn run_benchmark(input: &Path, max_seconds: f64) -> Result<BenchmarkReport> {
    let begin = Instant::now();
    let mut in_structure = Duration::ZERO;
    let (mut pages, mut chars) = (0u64, 0u64);
    for page in DumpReader::open(input)? {
        pages += 1;
        chars += page.source.chars().count() as u64;
        let start = Instant::now();
        let _ = structure(&page.source);
        in_structure += start.elapsed();
        if begin.elapsed().as_secs_f64() >= max_seconds {
            break;
        }
    }
    let total = begin.elapsed();
    Ok(BenchmarkReport {
        pages,
        chars,
        structure_secs: in_structure.as_secs_f64(),
        read_secs: (total - in_structure).as_secs_f64(),
    })
}

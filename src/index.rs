//! Hash-partitioned persistent title index. Every title maps to the exact
//! line of the shard file holding its record; the partition is the first
//! `dir_length` hex characters of the title's SHA-256 digest, so a point
//! lookup opens exactly one shard file.

use crate::models::{Progress, StorageLocation};
use anyhow::{Context, Result};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::info;

/// Subdirectory of the destination holding the index shard files.
pub const INDEX_DIR: &str = "index";

/// Root metadata file marking a directory as an extraction destination.
pub const ROOT_METADATA: &str = "index.json";

pub type IndexTable = FxHashMap<String, StorageLocation>;

#[derive(Serialize, Deserialize)]
pub struct RootMetadata {
    pub index_path: String,
    pub dir_length: usize,
    #[serde(rename = "_progress")]
    pub progress: Progress,
}

pub fn metadata_path(dest: &Path) -> PathBuf {
    dest.join(ROOT_METADATA)
}

/// Shard key for a title: leading hex characters of its SHA-256 digest.
/// Deterministic across runs and platforms.
pub fn shard_key(title: &str, dir_length: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..dir_length].to_string()
}

fn shard_file_name(idx: usize, dir_length: usize) -> String {
    format!("{:0width$x}.json", idx, width = dir_length)
}

/// Writes the full index: one file per shard key under `index/`, then the
/// root metadata recording the shard directory, key length and the rotation
/// checkpoint.
pub fn build(dest: &Path, table: &IndexTable, dir_length: usize, progress: Progress) -> Result<()> {
    let index_dir = dest.join(INDEX_DIR);
    fs::create_dir_all(&index_dir)
        .with_context(|| format!("failed to create index directory: {}", index_dir.display()))?;

    let shard_count = 1usize << (dir_length * 4);
    let mut shards: Vec<FxHashMap<&str, StorageLocation>> = vec![FxHashMap::default(); shard_count];
    for (title, loc) in table {
        let idx = usize::from_str_radix(&shard_key(title, dir_length), 16)
            .expect("shard key is valid hex");
        shards[idx].insert(title.as_str(), *loc);
    }

    for (idx, shard) in shards.iter().enumerate() {
        let path = index_dir.join(shard_file_name(idx, dir_length));
        let file = File::create(&path)
            .with_context(|| format!("failed to create index shard: {}", path.display()))?;
        serde_json::to_writer(BufWriter::new(file), shard)
            .with_context(|| format!("failed to write index shard: {}", path.display()))?;
    }

    let metadata = RootMetadata {
        index_path: INDEX_DIR.to_string(),
        dir_length,
        progress,
    };
    let path = metadata_path(dest);
    let file = File::create(&path)
        .with_context(|| format!("failed to create root metadata: {}", path.display()))?;
    serde_json::to_writer(BufWriter::new(file), &metadata)
        .with_context(|| format!("failed to write root metadata: {}", path.display()))?;

    info!(entries = table.len(), shards = shard_count, "index written");
    Ok(())
}

pub fn read_metadata(dest: &Path) -> Result<RootMetadata> {
    let path = metadata_path(dest);
    let file = File::open(&path)
        .with_context(|| format!("failed to open root metadata: {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("failed to parse root metadata: {}", path.display()))
}

/// Reads and merges every shard into one in-memory table. Used on resume.
pub fn load_all(dest: &Path) -> Result<IndexTable> {
    let metadata = read_metadata(dest)?;
    let index_dir = dest.join(&metadata.index_path);
    let mut table = IndexTable::default();
    for idx in 0..(1usize << (metadata.dir_length * 4)) {
        let path = index_dir.join(shard_file_name(idx, metadata.dir_length));
        let file = File::open(&path)
            .with_context(|| format!("failed to open index shard: {}", path.display()))?;
        let shard: FxHashMap<String, StorageLocation> =
            serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("failed to parse index shard: {}", path.display()))?;
        table.extend(shard);
    }
    Ok(table)
}

/// Point lookup: opens only the one shard file the title hashes into.
/// Equivalent to `load_all()?.get(title)` for any store written by [`build`].
pub fn lookup_one(dest: &Path, title: &str) -> Result<Option<StorageLocation>> {
    let metadata = read_metadata(dest)?;
    let key = shard_key(title, metadata.dir_length);
    let path = dest.join(&metadata.index_path).join(format!("{key}.json"));
    let file = File::open(&path)
        .with_context(|| format!("failed to open index shard: {}", path.display()))?;
    let shard: FxHashMap<String, StorageLocation> = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("failed to parse index shard: {}", path.display()))?;
    Ok(shard.get(title).copied())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn loc(dir_id: u32, file_id: u32, line: u64) -> StorageLocation {
        StorageLocation {
            dir_id,
            file_id,
            line,
        }
    }

    fn sample_table() -> IndexTable {
        let mut table = IndexTable::default();
        table.insert("Rust (programming language)".to_string(), loc(0, 0, 0));
        table.insert("Python (programming language)".to_string(), loc(0, 0, 1));
        table.insert("Ada Lovelace".to_string(), loc(0, 1, 0));
        table.insert("Über".to_string(), loc(1, 0, 7));
        table
    }

    #[test]
    fn shard_key_is_deterministic() {
        assert_eq!(shard_key("Rust", 2), shard_key("Rust", 2));
        assert_eq!(shard_key("Rust", 1), shard_key("Rust", 2)[..1]);
        assert_eq!(shard_key("Rust", 2).len(), 2);
        assert!(shard_key("Rust", 2).chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn build_then_load_all_roundtrips() {
        let dest = TempDir::new().unwrap();
        let table = sample_table();
        build(dest.path(), &table, 2, Progress::default()).unwrap();

        let loaded = load_all(dest.path()).unwrap();
        assert_eq!(loaded.len(), table.len());
        for (title, location) in &table {
            assert_eq!(loaded.get(title), Some(location));
        }
    }

    #[test]
    fn lookup_one_matches_load_all() {
        let dest = TempDir::new().unwrap();
        let table = sample_table();
        build(dest.path(), &table, 2, Progress::default()).unwrap();

        let loaded = load_all(dest.path()).unwrap();
        for title in table.keys() {
            assert_eq!(
                lookup_one(dest.path(), title).unwrap(),
                loaded.get(title).copied()
            );
        }
    }

    #[test]
    fn lookup_one_absent_title_is_none() {
        let dest = TempDir::new().unwrap();
        build(dest.path(), &sample_table(), 2, Progress::default()).unwrap();
        assert_eq!(lookup_one(dest.path(), "Nope").unwrap(), None);
    }

    #[test]
    fn metadata_embeds_progress() {
        let dest = TempDir::new().unwrap();
        let progress = Progress {
            dir_id: 1,
            file_id: 9,
            byte_size: 1234,
            line_count: 56,
        };
        build(dest.path(), &sample_table(), 2, progress).unwrap();

        let metadata = read_metadata(dest.path()).unwrap();
        assert_eq!(metadata.progress, progress);
        assert_eq!(metadata.dir_length, 2);
        assert_eq!(metadata.index_path, INDEX_DIR);
    }

    #[test]
    fn single_hex_char_sharding_works() {
        let dest = TempDir::new().unwrap();
        let table = sample_table();
        build(dest.path(), &table, 1, Progress::default()).unwrap();

        // 16 shard files, one hex char each
        let entries = fs::read_dir(dest.path().join(INDEX_DIR)).unwrap().count();
        assert_eq!(entries, 16);
        for title in table.keys() {
            assert_eq!(
                lookup_one(dest.path(), title).unwrap(),
                table.get(title).copied()
            );
        }
    }

    #[test]
    fn read_metadata_fails_on_empty_directory() {
        let dest = TempDir::new().unwrap();
        assert!(read_metadata(dest.path()).is_err());
    }
}

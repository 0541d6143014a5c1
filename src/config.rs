/// Rotation cap for a single shard file, in bytes
pub const SINGLE_FILE_MAXSIZE: u64 = 1 << 20;

/// Shard files per hex-named data directory before the directory id advances
pub const MAX_FILES_PER_DIRECTORY: u32 = 512;

/// Hex characters of the title digest used as the index shard key
pub const INDEX_DIR_LENGTH: usize = 2;

/// Bounded capacity of the worker-to-writer result queue
pub const RESULT_QUEUE_CAPACITY: usize = 256;

/// Deepest heading level the section decomposition will recurse into
pub const MAX_HEADING_LEVEL: usize = 6;

/// Tunables for one extraction run, passed into the coordinator and index.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Worker threads for the structuring pool; 0 means one per core
    pub workers: usize,
    pub max_shard_bytes: u64,
    pub max_files_per_dir: u32,
    pub dir_length: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            workers: 0,
            max_shard_bytes: SINGLE_FILE_MAXSIZE,
            max_files_per_dir: MAX_FILES_PER_DIRECTORY,
            dir_length: INDEX_DIR_LENGTH,
        }
    }
}

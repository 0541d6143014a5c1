//! Read path: title to structured record, following redirect chains with an
//! explicit visited set so a cyclic store can never loop or recurse
//! unboundedly. Lookups are read-only and safe to run from many callers at
//! once, as long as no extraction is writing the same destination.

use crate::index;
use crate::models::{StorageLocation, StructuredDocument};
use anyhow::{anyhow, Context, Result};
use rustc_hash::FxHashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("not a dump extraction destination: {0}")]
    NotADestination(PathBuf),
    #[error("title {0:?} not found")]
    TitleNotFound(String),
    #[error("circular redirect detected starting from {0:?}")]
    CircularRedirect(String),
}

/// Resolves `title` to its stored record. With `follow_redirects`, walks the
/// redirect chain to the final target; a repeated title along the chain is a
/// [`LookupError::CircularRedirect`].
pub fn resolve(dest: &Path, title: &str, follow_redirects: bool) -> Result<StructuredDocument> {
    if !index::metadata_path(dest).is_file() {
        return Err(LookupError::NotADestination(dest.to_path_buf()).into());
    }

    let mut visited: FxHashSet<String> = FxHashSet::default();
    let mut current = title.to_string();
    loop {
        if !visited.insert(current.clone()) {
            return Err(LookupError::CircularRedirect(title.to_string()).into());
        }
        let location = index::lookup_one(dest, &current)?
            .ok_or_else(|| LookupError::TitleNotFound(current.clone()))?;
        let document = read_document(dest, location)?;
        match &document.body.redirected_to {
            Some(target) if follow_redirects => current = target.clone(),
            _ => return Ok(document),
        }
    }
}

/// Reads the exact line a [`StorageLocation`] points at and deserializes it.
pub fn read_document(dest: &Path, location: StorageLocation) -> Result<StructuredDocument> {
    let path = dest
        .join(format!("{:02x}", location.dir_id))
        .join(format!("{}.jsonl", location.file_id));
    let file = File::open(&path)
        .with_context(|| format!("failed to open shard file: {}", path.display()))?;
    let line = BufReader::new(file)
        .lines()
        .nth(location.line as usize)
        .ok_or_else(|| anyhow!("line {} missing in {}", location.line, path.display()))?
        .with_context(|| format!("failed to read shard file: {}", path.display()))?;
    serde_json::from_str(&line)
        .with_context(|| format!("corrupt record at line {} of {}", location.line, path.display()))
}

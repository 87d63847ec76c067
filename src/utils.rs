//! Small filesystem and encoding helpers shared across modules. Mirrors the
//! grab-bag `utils` module every component here reaches into (teacher's
//! `foundry_compilers_core::utils`): path canonicalization, JSON
//! read/write, content hashing.

use crate::error::{BuildError, Result};
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Canonicalizes a path, platform-agnostic (`dunce` avoids the `\\?\` UNC
/// prefix on Windows so paths remain comparable/displayable).
pub fn canonicalize(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    dunce::canonicalize(path).map_err(|e| BuildError::configuration(format!("{}: {e}", path.display())))
}

/// Reads and deserializes a JSON file.
pub fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path).map_err(BuildError::Io)?;
    serde_json::from_slice(&bytes).map_err(BuildError::Json)
}

/// Serializes `value` to JSON and writes it to `path`, creating parent
/// directories as needed. Pretty-printed with sorted map keys where the
/// value's `Serialize` impl uses `BTreeMap`/`BTreeSet`, so the bytes are
/// stable across runs (spec.md §4.4: "the encoding must be deterministic").
pub fn write_json_file<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(BuildError::Io)?;
    }
    let file = fs::File::create(path).map_err(BuildError::Io)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value).map_err(BuildError::Json)?;
    writer.flush().map_err(BuildError::Io)
}

/// A stable content fingerprint, used by the staleness oracle and
/// dependency-discovery cache keys when mtime alone isn't trusted (e.g. a
/// checkout that resets mtimes).
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

pub fn hash_file(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(BuildError::Io)?;
    Ok(content_hash(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_hash_is_stable() {
        assert_eq!(content_hash(b"hello"), content_hash(b"hello"));
        assert_ne!(content_hash(b"hello"), content_hash(b"world"));
    }

    #[test]
    fn json_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("record.json");
        let value = vec!["a".to_string(), "b".to_string()];
        write_json_file(&value, &path).unwrap();
        let read: Vec<String> = read_json_file(&path).unwrap();
        assert_eq!(read, value);
    }
}

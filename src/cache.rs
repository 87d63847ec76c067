//! Persistent key/value cache (C4): per-target fingerprints plus a global
//! header that invalidates everything at once when the build's own inputs
//! change. Grounded on the teacher's `SolFilesCache`/`CacheEntry`: a single
//! versioned JSON document, read/written with `serde_json` through the
//! same `read_json_file`/`write_json_file` shape as [`crate::utils`].
//!
//! One file per `(LinkType, BuildType)` pair (spec.md §6), so a debug build
//! never looks at — or invalidates — a release build's cache.

use crate::error::{BuildError, Result};
use crate::options::{OptionGroup, OptionSet, ProcessorKind};
use crate::types::{BuildType, LinkType};
use crate::utils::{content_hash, read_json_file, write_json_file};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info, instrument, trace};

/// Identifies this crate's on-disk cache format. Bumped on any
/// incompatible change to [`CacheRecord`] or [`GlobalHeader`]'s shape.
pub const FORMAT_VERSION: &str = "crucible-build-cache-1";

/// How a dependency's identity is pinned for staleness comparison.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Fingerprint {
    Mtime(u64),
    ContentHash(String),
}

impl Fingerprint {
    pub fn mtime_of(path: &Path) -> Result<Self> {
        let metadata = std::fs::metadata(path).map_err(crate::error::BuildError::Io)?;
        let mtime = metadata
            .modified()
            .map_err(crate::error::BuildError::Io)?
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        Ok(Self::Mtime(mtime))
    }

    pub fn content_hash_of(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(crate::error::BuildError::Io)?;
        Ok(Self::ContentHash(content_hash(&bytes)))
    }
}

/// One dependency of a cached target, with the fingerprint it had the last
/// time the target was built.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DependencyFingerprint {
    pub path: PathBuf,
    pub fingerprint: Fingerprint,
}

/// The per-target persistent record, spec.md §3. Field-wise equality
/// against the freshly computed record is what the staleness oracle (C5)
/// uses for rules 4–6.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CacheRecord {
    pub output_path: PathBuf,
    /// Order-sensitive for linker input lists (I8), order-insensitive
    /// comparison is done by the oracle for plain object dependency sets.
    pub dependencies: Vec<DependencyFingerprint>,
    pub options: OptionGroup,
    pub tool_path: PathBuf,
    pub no_header_deps: bool,
}

/// The single record keyed `__globals__`: source/output roots, tool paths,
/// and the eight canonical OptionSets. Any mismatch invalidates the whole
/// store (spec.md §4.4, "deliberately conservative").
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct GlobalHeader {
    pub source_root: PathBuf,
    pub output_root: PathBuf,
    pub cc_path: PathBuf,
    pub cxx_path: PathBuf,
    /// One entry per [`ProcessorKind`], sorted by kind for deterministic
    /// encoding (spec.md invariant I2).
    pub option_sets: Vec<OptionSet>,
}

impl GlobalHeader {
    pub fn new(
        source_root: PathBuf,
        output_root: PathBuf,
        cc_path: PathBuf,
        cxx_path: PathBuf,
        group: &OptionGroup,
    ) -> Self {
        let kinds = [
            ProcessorKind::Cpp,
            ProcessorKind::Cc,
            ProcessorKind::Cxx,
            ProcessorKind::As,
            ProcessorKind::LdCcLib,
            ProcessorKind::LdCxxLib,
            ProcessorKind::LdCcExec,
            ProcessorKind::LdCxxExec,
        ];
        let option_sets = kinds.into_iter().map(|k| group.set(k).clone()).collect();
        Self { source_root, output_root, cc_path, cxx_path, option_sets }
    }
}

#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
struct CacheDocument {
    format: String,
    global: Option<GlobalHeader>,
    targets: BTreeMap<PathBuf, CacheRecord>,
}

/// The on-disk store for one `(LinkType, BuildType)` pair.
#[derive(Debug)]
pub struct CacheStore {
    path: PathBuf,
    doc: CacheDocument,
}

impl CacheStore {
    /// Opens the store at `{output_root}/{link_type}_{build_type}.json`.
    /// Missing file: empty store, not an error (spec.md §4.4, "on first
    /// open, empty").
    #[instrument(skip_all, fields(build_type = %build_type, link_type = %link_type))]
    pub fn open(output_root: &Path, link_type: LinkType, build_type: BuildType) -> Result<Self> {
        let path = output_root.join(format!("{link_type}_{build_type}.json"));
        if !path.exists() {
            trace!(?path, "no existing cache file");
            return Ok(Self { path, doc: CacheDocument { format: FORMAT_VERSION.to_string(), ..Default::default() } });
        }
        let doc: CacheDocument = match read_json_file(&path) {
            Ok(doc) => doc,
            Err(err) => {
                let corrupt = BuildError::CorruptCacheRecord { key: path.display().to_string(), reason: err.to_string() };
                debug!(?path, %corrupt, "cache file unreadable, starting empty");
                CacheDocument { format: FORMAT_VERSION.to_string(), ..Default::default() }
            }
        };
        trace!(?path, targets = doc.targets.len(), "opened cache");
        Ok(Self { path, doc })
    }

    /// Validates the stored global header against `current`. If it
    /// differs (or is absent), clears every target record — spec.md §4.4:
    /// "options changes are assumed to affect every artifact."
    #[instrument(skip_all)]
    pub fn validate_globals(&mut self, current: GlobalHeader) {
        let stale = self.doc.global.as_ref() != Some(&current);
        if stale {
            if self.doc.global.is_some() {
                info!("global header changed, invalidating entire cache");
            }
            self.doc.targets.clear();
        }
        self.doc.global = Some(current);
    }

    pub fn get(&self, output_path: &Path) -> Option<&CacheRecord> {
        self.doc.targets.get(output_path)
    }

    /// Stores `record` and immediately flushes to disk: a build that
    /// aborts partway still leaves every successfully built target's
    /// record durable (spec.md §4.4, §7).
    pub fn put(&mut self, record: CacheRecord) -> Result<()> {
        self.doc.targets.insert(record.output_path.clone(), record);
        self.flush()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CacheRecord> {
        self.doc.targets.values()
    }

    pub fn len(&self) -> usize {
        self.doc.targets.len()
    }

    fn flush(&self) -> Result<()> {
        write_json_file(&self.doc, &self.path)
    }

    /// Flushes and drops the store. Idempotent with repeated `put` flushes;
    /// kept for symmetry with `open` and the teacher's own explicit
    /// close-on-drop convention.
    pub fn close(self) -> Result<()> {
        self.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::OptionGroup;

    fn header(output_root: &Path, group: &OptionGroup) -> GlobalHeader {
        GlobalHeader::new(
            PathBuf::from("/src"),
            output_root.to_path_buf(),
            PathBuf::from("cc"),
            PathBuf::from("c++"),
            group,
        )
    }

    #[test]
    fn reopening_with_unchanged_globals_keeps_records() {
        let dir = tempfile::tempdir().unwrap();
        let group = OptionGroup::new(BuildType::Debug);
        let mut store = CacheStore::open(dir.path(), LinkType::Dynamic, BuildType::Debug).unwrap();
        store.validate_globals(header(dir.path(), &group));
        store
            .put(CacheRecord {
                output_path: PathBuf::from("/out/main.o"),
                dependencies: vec![],
                options: group.clone(),
                tool_path: PathBuf::from("cc"),
                no_header_deps: false,
            })
            .unwrap();
        drop(store);

        let mut reopened = CacheStore::open(dir.path(), LinkType::Dynamic, BuildType::Debug).unwrap();
        reopened.validate_globals(header(dir.path(), &group));
        assert!(reopened.get(Path::new("/out/main.o")).is_some());
    }

    #[test]
    fn changed_global_header_clears_all_records() {
        let dir = tempfile::tempdir().unwrap();
        let group = OptionGroup::new(BuildType::Debug);
        let mut store = CacheStore::open(dir.path(), LinkType::Dynamic, BuildType::Debug).unwrap();
        store.validate_globals(header(dir.path(), &group));
        store
            .put(CacheRecord {
                output_path: PathBuf::from("/out/main.o"),
                dependencies: vec![],
                options: group.clone(),
                tool_path: PathBuf::from("cc"),
                no_header_deps: false,
            })
            .unwrap();
        drop(store);

        let mut reopened = CacheStore::open(dir.path(), LinkType::Dynamic, BuildType::Debug).unwrap();
        let mut changed_group = OptionGroup::new(BuildType::Debug);
        changed_group.add(ProcessorKind::Cc, crate::options::parse(ProcessorKind::Cc, &["-O2"]).unwrap().remove(0), false).unwrap();
        reopened.validate_globals(header(dir.path(), &changed_group));
        assert!(reopened.get(Path::new("/out/main.o")).is_none());
    }

    #[test]
    fn missing_cache_file_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::open(dir.path(), LinkType::Static, BuildType::Release).unwrap();
        assert_eq!(store.len(), 0);
    }
}

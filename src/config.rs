//! Project path configuration: source root, output root, include/exclude
//! search roots, and tool paths. Grounded on the teacher's
//! `ProjectPathsConfig` (reconstructed from its call sites in `cache.rs`:
//! `paths.root`, `paths.cache`, `paths.artifacts`) — a plain struct built
//! through a builder, not a derive-heavy config-file format, since this
//! crate's paths come from the project declaration (C2's external
//! collaborator), not a TOML/YAML file of their own.

use std::path::{Path, PathBuf};

/// Where a project's files live and where its outputs go.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProjectPaths {
    /// Root directory sources are resolved relative to.
    pub source_root: PathBuf,
    /// Root directory build artifacts (objects, libraries, executables,
    /// the cache file) are written under.
    pub output_root: PathBuf,
    /// Directories searched, in order, when resolving a bundle's declared
    /// file names to paths on disk.
    pub include_roots: Vec<PathBuf>,
    /// Subtrees excluded from that search.
    pub exclude_roots: Vec<PathBuf>,
    pub cc_path: PathBuf,
    pub cxx_path: PathBuf,
}

impl ProjectPaths {
    pub fn builder(source_root: impl Into<PathBuf>, output_root: impl Into<PathBuf>) -> ProjectPathsBuilder {
        ProjectPathsBuilder {
            source_root: source_root.into(),
            output_root: output_root.into(),
            include_roots: Vec::new(),
            exclude_roots: Vec::new(),
            cc_path: PathBuf::from("cc"),
            cxx_path: PathBuf::from("c++"),
        }
    }

    /// The cache file path for a given (link type, build type) pair,
    /// spec.md §6: `{link_type}_{build_type}.json` under the output root.
    pub fn cache_path(&self, link_type: crate::types::LinkType, build_type: crate::types::BuildType) -> PathBuf {
        self.output_root.join(format!("{link_type}_{build_type}.json"))
    }

    /// Whether `path` falls under one of the configured exclude roots.
    pub fn is_excluded(&self, path: &Path) -> bool {
        self.exclude_roots.iter().any(|root| path.starts_with(root))
    }

    /// Resolves a bundle-declared file name to an on-disk path by
    /// searching the include roots in order, honoring excludes.
    pub fn resolve_source(&self, file_name: &str) -> Option<PathBuf> {
        for root in &self.include_roots {
            let candidate = root.join(file_name);
            if self.is_excluded(&candidate) {
                continue;
            }
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        None
    }
}

pub struct ProjectPathsBuilder {
    source_root: PathBuf,
    output_root: PathBuf,
    include_roots: Vec<PathBuf>,
    exclude_roots: Vec<PathBuf>,
    cc_path: PathBuf,
    cxx_path: PathBuf,
}

impl ProjectPathsBuilder {
    pub fn include(mut self, root: impl Into<PathBuf>) -> Self {
        self.include_roots.push(root.into());
        self
    }

    pub fn exclude(mut self, root: impl Into<PathBuf>) -> Self {
        self.exclude_roots.push(root.into());
        self
    }

    pub fn cc_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cc_path = path.into();
        self
    }

    pub fn cxx_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cxx_path = path.into();
        self
    }

    pub fn build(self) -> ProjectPaths {
        let include_roots = if self.include_roots.is_empty() {
            vec![self.source_root.clone()]
        } else {
            self.include_roots
        };
        ProjectPaths {
            source_root: self.source_root,
            output_root: self.output_root,
            include_roots,
            exclude_roots: self.exclude_roots,
            cc_path: self.cc_path,
            cxx_path: self.cxx_path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BuildType, LinkType};

    #[test]
    fn cache_path_encodes_link_and_build_type() {
        let paths = ProjectPaths::builder("/src", "/out").build();
        assert_eq!(
            paths.cache_path(LinkType::Dynamic, BuildType::Debug),
            PathBuf::from("/out/dynamic_debug.json")
        );
    }

    #[test]
    fn defaults_include_roots_to_source_root() {
        let paths = ProjectPaths::builder("/src", "/out").build();
        assert_eq!(paths.include_roots, vec![PathBuf::from("/src")]);
    }

    #[test]
    fn resolve_source_honors_excludes() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("vendor");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("skip.c"), "").unwrap();
        let paths = ProjectPaths::builder(dir.path(), dir.path().join("out"))
            .include(dir.path())
            .exclude(nested)
            .build();
        assert!(paths.resolve_source("vendor/skip.c").is_none());
    }
}

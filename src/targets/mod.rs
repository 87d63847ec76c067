//! The build DAG's node types (C2): sources, generated sources, objects,
//! static/shared libraries, executables. See [`graph`] for the arena that
//! owns them and validates the graph's shape.

mod graph;

pub use graph::TargetGraph;

use crate::options::{OptionGroup, ProcessorKind};
use std::path::{Path, PathBuf};

/// An index into a [`TargetGraph`]'s arena. Not persisted: the cache keys
/// targets by their absolute output path (spec.md §4.4), not by id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(pub(crate) u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Language {
    C,
    Cxx,
    Asm,
}

/// The node kind. Every variant also carries the common [`Target`] fields
/// (output path, dependency ids, optional local options, `rebuilt` flag).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TargetKind {
    /// A user file on disk. Terminal: no build command.
    Source,
    /// Produced by an auxiliary command. `generator` is the tool invoked;
    /// `args` its argv (the generator's own input paths are listed in the
    /// owning [`Target::dependencies`]).
    GeneratedSource { generator: PathBuf, args: Vec<String> },
    /// Depends on exactly one compilable source (`dependencies[0]`, an
    /// invariant [`TargetGraph`] enforces at construction) plus 0..n
    /// discovered header files.
    Object { language: Language },
    StaticLibrary,
    /// `version`, if set, is embedded in the artifact name (spec.md §6:
    /// "version-bearing shared libraries embed `X.Y.Z`"). `linker` is the
    /// driver (`LdCcLib` or `LdCxxLib`) the declaring bundle named as
    /// "which driver (cc or cxx) performs the link" (spec.md §3: "a
    /// Library/Executable is linked by exactly one driver (cc or cxx)").
    SharedLibrary { version: Option<semver::Version>, linker: ProcessorKind },
    /// `linker` is `LdCcExec` or `LdCxxExec`, per the bundle's declared
    /// driver.
    Executable { linker: ProcessorKind },
}

impl TargetKind {
    pub fn is_buildable(&self) -> bool {
        !matches!(self, Self::Source)
    }

    pub fn is_library(&self) -> bool {
        matches!(self, Self::StaticLibrary | Self::SharedLibrary { .. })
    }
}

/// One node in the build DAG.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Target {
    pub id: TargetId,
    pub kind: TargetKind,
    pub output_path: PathBuf,
    /// Other targets this one depends on, in declaration/link order
    /// (spec.md invariant I8 relies on this order being preserved when an
    /// Executable or SharedLibrary's dependencies are objects and
    /// libraries, in the order the project declared them).
    pub dependencies: Vec<TargetId>,
    /// Header files discovered by C3 for an `Object` target. Not other
    /// graph nodes unless the header is itself a `GeneratedSource`, in
    /// which case its producer is also added to `dependencies`.
    pub headers: Vec<PathBuf>,
    /// Per-target override applied on top of the global [`OptionGroup`].
    pub local_options: Option<OptionGroup>,
    /// Set by the scheduler once this target's build command (if any) has
    /// run successfully this invocation. Cleared at the start of every run.
    pub rebuilt: bool,
}

impl Target {
    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// The compilable source feeding an `Object` target, by the
    /// `dependencies[0]` convention [`TargetGraph`] enforces.
    pub fn source_dependency(&self) -> Option<TargetId> {
        match self.kind {
            TargetKind::Object { .. } => self.dependencies.first().copied(),
            _ => None,
        }
    }
}

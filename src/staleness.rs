//! The staleness oracle (C5): a pure decision over a [`Target`], its
//! [`CacheRecord`], and filesystem mtimes. Grounded on the teacher's
//! `ArtifactsCacheInner::is_dirty_impl`: a short chain of independently
//! testable predicates with early returns and a `trace!` at each branch,
//! here driven through an [`FsProbe`] trait object so the seven rules are
//! unit-testable without touching a real filesystem.

use crate::cache::{CacheRecord, DependencyFingerprint, Fingerprint};
use crate::targets::Target;
use std::collections::HashSet;
use std::path::Path;
use tracing::trace;

/// Filesystem facts the oracle needs, abstracted so tests can fake mtimes
/// and existence without touching disk.
pub trait FsProbe {
    fn exists(&self, path: &Path) -> bool;
    fn mtime_secs(&self, path: &Path) -> Option<u64>;
}

/// Reads straight through to `std::fs`.
#[derive(Clone, Copy, Debug, Default)]
pub struct RealFs;

impl FsProbe for RealFs {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn mtime_secs(&self, path: &Path) -> Option<u64> {
        let metadata = std::fs::metadata(path).ok()?;
        let modified = metadata.modified().ok()?;
        modified.duration_since(std::time::UNIX_EPOCH).ok().map(|d| d.as_secs())
    }
}

/// Why the oracle decided a target was stale, per spec.md §4.5's rule
/// list. The oracle attributes exactly one of these to each stale target.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StaleReason {
    OutputMissing,
    NoCacheRecord,
    DependencyMissingOrNewer(std::path::PathBuf),
    OptionsChanged,
    DependencySetChanged,
    ToolPathChanged,
    GeneratorNewerThanOutput,
    /// Propagated from a stale predecessor (rule implied by I4: staleness
    /// monotonicity). Not one of the seven primary rules, but the reason
    /// attributed to a consumer whose own inputs are otherwise unchanged.
    PredecessorStale,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Staleness {
    UpToDate,
    Stale(StaleReason),
}

impl Staleness {
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::Stale(_))
    }
}

/// Decides whether `target` must rebuild. `record` is the prior run's
/// [`CacheRecord`] for this target's output path, if any. `current` is the
/// freshly computed record this run would write on success — the oracle
/// compares it field-wise against `record` for rules 4–6.
pub fn evaluate(target: &Target, record: Option<&CacheRecord>, current: &CacheRecord, fs: &dyn FsProbe) -> Staleness {
    let output = target.output_path();

    if !fs.exists(output) {
        trace!(target = %output.display(), "stale: output missing");
        return Staleness::Stale(StaleReason::OutputMissing);
    }

    let Some(record) = record else {
        trace!(target = %output.display(), "stale: no cache record");
        return Staleness::Stale(StaleReason::NoCacheRecord);
    };

    let output_mtime = fs.mtime_secs(output);
    for dep in &record.dependencies {
        if !fs.exists(&dep.path) {
            trace!(target = %output.display(), dep = %dep.path.display(), "stale: dependency missing");
            return Staleness::Stale(StaleReason::DependencyMissingOrNewer(dep.path.clone()));
        }
        if let Some(dep_mtime) = fs.mtime_secs(&dep.path) {
            if let Some(out_mtime) = output_mtime {
                if dep_mtime > out_mtime {
                    trace!(target = %output.display(), dep = %dep.path.display(), "stale: dependency newer than output");
                    return Staleness::Stale(StaleReason::DependencyMissingOrNewer(dep.path.clone()));
                }
            }
        }
    }

    if record.options != current.options {
        trace!(target = %output.display(), "stale: options changed");
        return Staleness::Stale(StaleReason::OptionsChanged);
    }

    if !dependency_sets_match(&record.dependencies, &current.dependencies, is_order_sensitive(target)) {
        trace!(target = %output.display(), "stale: dependency set changed");
        return Staleness::Stale(StaleReason::DependencySetChanged);
    }

    if record.tool_path != current.tool_path {
        trace!(target = %output.display(), "stale: tool path changed");
        return Staleness::Stale(StaleReason::ToolPathChanged);
    }

    if let crate::targets::TargetKind::GeneratedSource { generator, .. } = &target.kind {
        if let (Some(gen_mtime), Some(out_mtime)) = (fs.mtime_secs(generator), output_mtime) {
            if gen_mtime > out_mtime {
                trace!(target = %output.display(), "stale: generator newer than generated output");
                return Staleness::Stale(StaleReason::GeneratorNewerThanOutput);
            }
        }
    }

    Staleness::UpToDate
}

/// Link input lists (Executable/SharedLibrary dependencies) are
/// order-sensitive (I8); plain object-dependency sets (StaticLibrary, or
/// an Object's header list) are compared as sets.
fn is_order_sensitive(target: &Target) -> bool {
    matches!(
        target.kind,
        crate::targets::TargetKind::Executable { .. } | crate::targets::TargetKind::SharedLibrary { .. }
    )
}

fn dependency_sets_match(a: &[DependencyFingerprint], b: &[DependencyFingerprint], order_sensitive: bool) -> bool {
    if order_sensitive {
        return a == b;
    }
    let as_set = |deps: &[DependencyFingerprint]| -> HashSet<&Path> { deps.iter().map(|d| d.path.as_path()).collect() };
    as_set(a) == as_set(b)
}

/// Propagates rule 4.5-implicit monotonicity: if any predecessor (by
/// target id) of `target` is in `stale`, `target` is stale too, regardless
/// of what [`evaluate`] concluded on its own.
pub fn propagate(
    graph: &crate::targets::TargetGraph,
    stale: &mut HashSet<crate::targets::TargetId>,
) {
    // Fixed-point iteration: a target becomes stale as soon as any
    // dependency is marked stale; repeat until no new marks appear. The
    // DAG's depth bounds the number of passes needed.
    loop {
        let mut changed = false;
        for target in graph.iter() {
            if stale.contains(&target.id) {
                continue;
            }
            if target.dependencies.iter().any(|dep| stale.contains(dep)) {
                stale.insert(target.id);
                changed = true;
                trace!(target = %target.output_path().display(), "stale: predecessor stale");
            }
        }
        if !changed {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{OptionGroup, ProcessorKind};
    use crate::targets::{Language, TargetGraph};
    use crate::types::BuildType;
    use std::collections::HashMap;
    use std::path::PathBuf;

    struct FakeFs {
        existing: HashMap<PathBuf, u64>,
    }

    impl FsProbe for FakeFs {
        fn exists(&self, path: &Path) -> bool {
            self.existing.contains_key(path)
        }

        fn mtime_secs(&self, path: &Path) -> Option<u64> {
            self.existing.get(path).copied()
        }
    }

    fn record(output_path: &str, deps: Vec<(&str, u64)>, options: OptionGroup) -> CacheRecord {
        CacheRecord {
            output_path: PathBuf::from(output_path),
            dependencies: deps
                .into_iter()
                .map(|(p, m)| DependencyFingerprint { path: PathBuf::from(p), fingerprint: Fingerprint::Mtime(m) })
                .collect(),
            options,
            tool_path: PathBuf::from("cc"),
            no_header_deps: false,
        }
    }

    #[test]
    fn missing_output_is_stale() {
        let mut graph = TargetGraph::new();
        let src = graph.add_source(PathBuf::from("main.c")).unwrap();
        let obj = graph.add_object(PathBuf::from("main.o"), Language::C, src).unwrap();
        let fs = FakeFs { existing: HashMap::new() };
        let group = OptionGroup::new(BuildType::Debug);
        let rec = record("main.o", vec![], group);
        let result = evaluate(graph.get(obj), None, &rec, &fs);
        assert_eq!(result, Staleness::Stale(StaleReason::OutputMissing));
    }

    #[test]
    fn up_to_date_when_nothing_changed() {
        let mut graph = TargetGraph::new();
        let src = graph.add_source(PathBuf::from("main.c")).unwrap();
        let obj = graph.add_object(PathBuf::from("main.o"), Language::C, src).unwrap();
        let mut existing = HashMap::new();
        existing.insert(PathBuf::from("main.o"), 200);
        existing.insert(PathBuf::from("main.c"), 100);
        let fs = FakeFs { existing };
        let group = OptionGroup::new(BuildType::Debug);
        let rec = record("main.o", vec![("main.c", 100)], group);
        let result = evaluate(graph.get(obj), Some(&rec), &rec, &fs);
        assert_eq!(result, Staleness::UpToDate);
    }

    #[test]
    fn newer_dependency_triggers_rebuild() {
        let mut graph = TargetGraph::new();
        let src = graph.add_source(PathBuf::from("main.c")).unwrap();
        let obj = graph.add_object(PathBuf::from("main.o"), Language::C, src).unwrap();
        let mut existing = HashMap::new();
        existing.insert(PathBuf::from("main.o"), 100);
        existing.insert(PathBuf::from("header.h"), 500);
        let fs = FakeFs { existing };
        let group = OptionGroup::new(BuildType::Debug);
        let rec = record("main.o", vec![("header.h", 500)], group);
        let result = evaluate(graph.get(obj), Some(&rec), &rec, &fs);
        assert_eq!(result, Staleness::Stale(StaleReason::DependencyMissingOrNewer(PathBuf::from("header.h"))));
    }

    #[test]
    fn changed_options_trigger_rebuild() {
        let mut graph = TargetGraph::new();
        let src = graph.add_source(PathBuf::from("main.c")).unwrap();
        let obj = graph.add_object(PathBuf::from("main.o"), Language::C, src).unwrap();
        let mut existing = HashMap::new();
        existing.insert(PathBuf::from("main.o"), 200);
        existing.insert(PathBuf::from("main.c"), 100);
        let fs = FakeFs { existing };
        let old = record("main.o", vec![("main.c", 100)], OptionGroup::new(BuildType::Debug));
        let new = record("main.o", vec![("main.c", 100)], OptionGroup::new(BuildType::Optimized));
        let result = evaluate(graph.get(obj), Some(&old), &new, &fs);
        assert_eq!(result, Staleness::Stale(StaleReason::OptionsChanged));
    }

    #[test]
    fn staleness_propagates_to_consumers() {
        let mut graph = TargetGraph::new();
        let src = graph.add_source(PathBuf::from("planet.c")).unwrap();
        let obj = graph.add_object(PathBuf::from("planet.o"), Language::C, src).unwrap();
        let lib = graph
            .add_shared_library(PathBuf::from("libplanet.so"), None, vec![obj], ProcessorKind::LdCcLib)
            .unwrap();
        let mut stale = HashSet::new();
        stale.insert(obj);
        propagate(&graph, &mut stale);
        assert!(stale.contains(&lib));
    }
}

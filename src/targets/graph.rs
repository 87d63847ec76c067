//! The arena that owns every [`Target`] and enforces spec.md §3's DAG
//! invariants: unique output paths, one compilable input per Object, no
//! cycles except among shared libraries (which are recorded, not rejected).

use super::{Language, Target, TargetId, TargetKind};
use crate::error::{BuildError, Result};
use crate::options::OptionGroup;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Default)]
pub struct TargetGraph {
    nodes: Vec<Target>,
    by_output_path: HashMap<PathBuf, TargetId>,
    /// Cycles found among `SharedLibrary` nodes during [`Self::validate`].
    /// Recorded per spec.md §4.2 ("recorded but not topologically
    /// ordered") and §9's open question on cycle policy.
    library_cycles: Vec<Vec<TargetId>>,
}

impl TargetGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: TargetId) -> &Target {
        &self.nodes[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: TargetId) -> &mut Target {
        &mut self.nodes[id.0 as usize]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Target> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn by_output_path(&self, path: &Path) -> Option<TargetId> {
        self.by_output_path.get(path).copied()
    }

    pub fn library_cycles(&self) -> &[Vec<TargetId>] {
        &self.library_cycles
    }

    fn insert(&mut self, kind: TargetKind, output_path: PathBuf, dependencies: Vec<TargetId>) -> Result<TargetId> {
        if let Some(existing) = self.by_output_path.get(&output_path) {
            return Err(BuildError::configuration(format!(
                "output path collision: {} is already target {:?}",
                output_path.display(),
                existing
            )));
        }
        let id = TargetId(self.nodes.len() as u32);
        self.by_output_path.insert(output_path.clone(), id);
        self.nodes.push(Target {
            id,
            kind,
            output_path,
            dependencies,
            headers: Vec::new(),
            local_options: None,
            rebuilt: false,
        });
        Ok(id)
    }

    pub fn add_source(&mut self, path: PathBuf) -> Result<TargetId> {
        self.insert(TargetKind::Source, path, Vec::new())
    }

    pub fn add_generated_source(
        &mut self,
        output_path: PathBuf,
        generator: PathBuf,
        args: Vec<String>,
        inputs: Vec<TargetId>,
    ) -> Result<TargetId> {
        let mut dependencies = inputs;
        if let Some(script) = self.by_output_path.get(&generator).copied() {
            dependencies.push(script);
        }
        self.insert(TargetKind::GeneratedSource { generator, args }, output_path, dependencies)
    }

    /// `source` must already be a `Source` or `GeneratedSource` target.
    /// `headers` are discovered separately by C3 via [`Target::headers`].
    pub fn add_object(&mut self, output_path: PathBuf, language: Language, source: TargetId) -> Result<TargetId> {
        match self.get(source).kind {
            TargetKind::Source | TargetKind::GeneratedSource { .. } => {}
            _ => {
                return Err(BuildError::configuration(format!(
                    "object {} must compile a Source or GeneratedSource, not {:?}",
                    output_path.display(),
                    self.get(source).kind
                )))
            }
        }
        self.insert(TargetKind::Object { language }, output_path, vec![source])
    }

    pub fn add_static_library(&mut self, output_path: PathBuf, objects: Vec<TargetId>) -> Result<TargetId> {
        self.check_objects_only(&objects)?;
        self.insert(TargetKind::StaticLibrary, output_path, objects)
    }

    pub fn add_shared_library(
        &mut self,
        output_path: PathBuf,
        version: Option<semver::Version>,
        members: Vec<TargetId>,
        linker: crate::options::ProcessorKind,
    ) -> Result<TargetId> {
        self.check_no_executable_dependency(&members)?;
        self.insert(TargetKind::SharedLibrary { version, linker }, output_path, members)
    }

    pub fn add_executable(
        &mut self,
        output_path: PathBuf,
        members: Vec<TargetId>,
        linker: crate::options::ProcessorKind,
    ) -> Result<TargetId> {
        self.check_no_executable_dependency(&members)?;
        self.insert(TargetKind::Executable { linker }, output_path, members)
    }

    pub fn set_local_options(&mut self, id: TargetId, options: OptionGroup) {
        self.get_mut(id).local_options = Some(options);
    }

    fn check_objects_only(&self, ids: &[TargetId]) -> Result<()> {
        for &id in ids {
            if !matches!(self.get(id).kind, TargetKind::Object { .. }) {
                return Err(BuildError::configuration(format!(
                    "a static library may only archive Objects, got {:?}",
                    self.get(id).kind
                )));
            }
        }
        Ok(())
    }

    fn check_no_executable_dependency(&self, ids: &[TargetId]) -> Result<()> {
        for &id in ids {
            if matches!(self.get(id).kind, TargetKind::Executable { .. }) {
                return Err(BuildError::configuration(
                    "an Executable cannot be depended on by anything".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Validates the graph's shape: detects cycles, classifying each as a
    /// permitted library-only cycle (recorded in [`Self::library_cycles`])
    /// or a hard DAG violation.
    pub fn validate(&mut self) -> Result<()> {
        let cycles = self.find_cycles();
        let mut library_cycles = Vec::new();
        for cycle in cycles {
            let all_libraries = cycle.iter().all(|id| self.get(*id).kind.is_library());
            if all_libraries {
                warn!(?cycle, "recording cycle among shared libraries, not topologically ordering it");
                library_cycles.push(cycle);
            } else {
                return Err(BuildError::configuration(format!(
                    "dependency cycle outside of shared libraries: {cycle:?}"
                )));
            }
        }
        self.library_cycles = library_cycles;

        for target in &self.nodes {
            if let TargetKind::Object { .. } = target.kind {
                if target.dependencies.is_empty() {
                    return Err(BuildError::configuration(format!(
                        "object {} has no compilable source",
                        target.output_path.display()
                    )));
                }
            }
        }
        debug!(targets = self.nodes.len(), "target graph validated");
        Ok(())
    }

    /// Tarjan-free cycle finder: plain DFS with a recursion-stack set,
    /// adequate at this graph's scale (bundles are tens to low hundreds of
    /// targets, not the sizes that would need Tarjan's linear guarantee).
    fn find_cycles(&self) -> Vec<Vec<TargetId>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            InProgress,
            Done,
        }
        let mut mark = vec![Mark::Unvisited; self.nodes.len()];
        let mut stack = Vec::new();
        let mut cycles = Vec::new();

        fn visit(
            id: TargetId,
            nodes: &[Target],
            mark: &mut [Mark],
            stack: &mut Vec<TargetId>,
            cycles: &mut Vec<Vec<TargetId>>,
        ) {
            mark[id.0 as usize] = Mark::InProgress;
            stack.push(id);
            for &dep in &nodes[id.0 as usize].dependencies {
                match mark[dep.0 as usize] {
                    Mark::Unvisited => visit(dep, nodes, mark, stack, cycles),
                    Mark::InProgress => {
                        let start = stack.iter().position(|&s| s == dep).unwrap_or(0);
                        cycles.push(stack[start..].to_vec());
                    }
                    Mark::Done => {}
                }
            }
            stack.pop();
            mark[id.0 as usize] = Mark::Done;
        }

        for id in (0..self.nodes.len()).map(|i| TargetId(i as u32)) {
            if mark[id.0 as usize] == Mark::Unvisited {
                visit(id, &self.nodes, &mut mark, &mut stack, &mut cycles);
            }
        }
        cycles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::ProcessorKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn rejects_output_path_collision() {
        let mut graph = TargetGraph::new();
        graph.add_source(PathBuf::from("a.c")).unwrap();
        let err = graph.add_source(PathBuf::from("a.c")).unwrap_err();
        assert!(err.to_string().contains("collision"));
    }

    #[test]
    fn object_requires_source_or_generated_input() {
        let mut graph = TargetGraph::new();
        let lib = graph.add_static_library(PathBuf::from("libx.a"), vec![]).unwrap();
        let err = graph.add_object(PathBuf::from("x.o"), Language::C, lib).unwrap_err();
        assert!(err.to_string().contains("must compile"));
    }

    #[test]
    fn executable_cannot_be_depended_on() {
        let mut graph = TargetGraph::new();
        let src = graph.add_source(PathBuf::from("main.c")).unwrap();
        let obj = graph.add_object(PathBuf::from("main.o"), Language::C, src).unwrap();
        let exe = graph.add_executable(PathBuf::from("hello"), vec![obj], ProcessorKind::LdCcExec).unwrap();
        let err = graph.add_executable(PathBuf::from("hello2"), vec![exe], ProcessorKind::LdCcExec).unwrap_err();
        assert!(err.to_string().contains("cannot be depended on"));
    }

    #[test]
    fn validate_detects_and_rejects_non_library_cycle() {
        let mut graph = TargetGraph::new();
        let src = graph.add_source(PathBuf::from("a.c")).unwrap();
        let obj = graph.add_object(PathBuf::from("a.o"), Language::C, src).unwrap();
        // Force an artificial cycle for the test: an object depending on itself
        // transitively through a fabricated edge (normally impossible to
        // construct through the public API, so we poke it directly here).
        graph.get_mut(obj).dependencies.push(obj);
        let err = graph.validate().unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn validate_records_but_permits_library_only_cycles() {
        let mut graph = TargetGraph::new();
        let liba = graph.add_static_library(PathBuf::from("liba.a"), vec![]).unwrap();
        let libb = graph.add_static_library(PathBuf::from("libb.a"), vec![]).unwrap();
        graph.get_mut(liba).dependencies.push(libb);
        graph.get_mut(libb).dependencies.push(liba);
        graph.validate().unwrap();
        assert_eq!(graph.library_cycles().len(), 1);
    }

    #[test]
    fn hello_world_graph_shape() {
        let mut graph = TargetGraph::new();
        let planet_src = graph.add_source(PathBuf::from("src/planet.c")).unwrap();
        let planet_obj = graph.add_object(PathBuf::from("out/planet_debug.o"), Language::C, planet_src).unwrap();
        let lib_planet = graph
            .add_shared_library(PathBuf::from("out/libPlanet_debug.so"), None, vec![planet_obj], ProcessorKind::LdCcLib)
            .unwrap();
        let main_src = graph.add_source(PathBuf::from("src/main.C")).unwrap();
        let main_obj = graph.add_object(PathBuf::from("out/main_debug.o"), Language::Cxx, main_src).unwrap();
        let hello = graph
            .add_executable(PathBuf::from("out/hello_debug"), vec![main_obj, lib_planet], ProcessorKind::LdCxxExec)
            .unwrap();
        graph.validate().unwrap();
        assert_eq!(graph.len(), 6);
        assert_eq!(graph.get(hello).dependencies, vec![main_obj, lib_planet]);
    }
}

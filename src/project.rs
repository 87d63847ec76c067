//! The project-description interface (spec.md §6): the narrow set of
//! operations an external front end (out of scope per spec.md §1) calls to
//! describe libraries, executables, and per-target option overrides.
//! Grounded on the teacher's `Project`/`ProjectPathsConfig` builder
//! pattern — `add_library`/`add_executable` are narrow constructors that
//! validate as they build the [`TargetGraph`], rather than accepting a
//! whole pre-built graph to check after the fact.

use crate::config::ProjectPaths;
use crate::error::{BuildError, Result};
use crate::options::{CompilerOption, OptionGroup, ProcessorKind};
use crate::targets::{Language, TargetGraph, TargetId};
use crate::types::{BuildType, LinkType};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, instrument};

/// One library or executable bundle as declared by the front end: a name,
/// its member source files, the libraries it links against, and which
/// driver (cc or cxx) performs the link.
#[derive(Clone, Debug)]
pub struct Bundle {
    pub name: String,
    pub files: Vec<String>,
    pub libs: Vec<String>,
    pub linker: ProcessorKind,
}

/// The operations the core exposes to a project description (spec.md
/// §6): `set_globals`, `add_library`, `add_executable`,
/// `add_target_options`, `delete_target_options`, `register_generated_source`.
pub trait ProjectDeclaration {
    fn set_globals(&mut self, kind: ProcessorKind, options: Vec<CompilerOption>) -> Result<()>;
    fn add_library(&mut self, bundle: Bundle, link_type: LinkType) -> Result<TargetId>;
    fn add_executable(&mut self, bundle: Bundle) -> Result<TargetId>;
    fn add_target_options(&mut self, target: TargetId, kind: ProcessorKind, options: Vec<CompilerOption>) -> Result<()>;
    fn delete_target_options(&mut self, target: TargetId, kind: ProcessorKind, names: &[&str]) -> Result<()>;
    fn register_generated_source(
        &mut self,
        output_path: PathBuf,
        generator: PathBuf,
        args: Vec<String>,
        inputs: Vec<TargetId>,
    ) -> Result<TargetId>;
}

/// The in-memory project: paths, the fixed build/link type, the global
/// option group, and the target graph being built up from bundle
/// declarations.
pub struct Project {
    pub paths: ProjectPaths,
    pub build_type: BuildType,
    pub link_type: LinkType,
    pub globals: OptionGroup,
    pub graph: TargetGraph,
    sources_by_path: HashMap<PathBuf, TargetId>,
    libraries_by_name: HashMap<String, TargetId>,
}

impl Project {
    pub fn new(paths: ProjectPaths, build_type: BuildType, link_type: LinkType) -> Self {
        Self {
            paths,
            build_type,
            link_type,
            globals: OptionGroup::new(build_type),
            graph: TargetGraph::new(),
            sources_by_path: HashMap::new(),
            libraries_by_name: HashMap::new(),
        }
    }

    fn object_suffix(&self) -> String {
        format!("_{}", self.build_type)
    }

    /// Resolves a bundle-declared file name to a `Source` target,
    /// creating it on first use (so two bundles sharing a file share one
    /// `Object`... no: spec.md has one Object per listed file per bundle,
    /// but the underlying `Source` is shared).
    fn source_target(&mut self, file_name: &str) -> Result<TargetId> {
        let path = self
            .paths
            .resolve_source(file_name)
            .ok_or_else(|| BuildError::configuration(format!("source not found under include roots: {file_name}")))?;
        if let Some(&id) = self.sources_by_path.get(&path) {
            return Ok(id);
        }
        let id = self.graph.add_source(path.clone())?;
        self.sources_by_path.insert(path, id);
        Ok(id)
    }

    fn language_for(file_name: &str) -> Result<Language> {
        match std::path::Path::new(file_name).extension().and_then(|e| e.to_str()) {
            Some("c") => Ok(Language::C),
            Some("cc") | Some("cpp") | Some("cxx") | Some("C") => Ok(Language::Cxx),
            Some("s") | Some("S") => Ok(Language::Asm),
            other => Err(BuildError::configuration(format!("cannot infer language from extension: {other:?}"))),
        }
    }

    fn object_path(&self, file_name: &str) -> PathBuf {
        let stem = std::path::Path::new(file_name).file_stem().and_then(|s| s.to_str()).unwrap_or(file_name);
        self.paths.output_root.join(format!("{stem}{}.o", self.object_suffix()))
    }

    fn build_objects(&mut self, files: &[String]) -> Result<Vec<TargetId>> {
        let mut objects = Vec::with_capacity(files.len());
        for file in files {
            let language = Self::language_for(file)?;
            let source = self.source_target(file)?;
            let object = self.graph.add_object(self.object_path(file), language, source)?;
            objects.push(object);
        }
        Ok(objects)
    }

    fn resolve_libs(&self, libs: &[String]) -> Result<Vec<TargetId>> {
        libs.iter()
            .map(|name| {
                self.libraries_by_name
                    .get(name)
                    .copied()
                    .ok_or_else(|| BuildError::configuration(format!("unknown library: {name}")))
            })
            .collect()
    }
}

impl ProjectDeclaration for Project {
    #[instrument(skip(self, options))]
    fn set_globals(&mut self, kind: ProcessorKind, options: Vec<CompilerOption>) -> Result<()> {
        for opt in options {
            self.globals.add(kind, opt, false)?;
        }
        Ok(())
    }

    #[instrument(skip(self, bundle))]
    fn add_library(&mut self, bundle: Bundle, link_type: LinkType) -> Result<TargetId> {
        let objects = self.build_objects(&bundle.files)?;
        let libs = self.resolve_libs(&bundle.libs)?;
        let mut members = objects;
        members.extend(libs);

        let suffix = self.object_suffix();
        let id = match link_type {
            LinkType::Static => {
                let path = self.paths.output_root.join(format!("lib{}{suffix}.a", bundle.name));
                self.graph.add_static_library(path, members)?
            }
            LinkType::Dynamic => {
                let path = self.paths.output_root.join(format!("lib{}{suffix}.so", bundle.name));
                self.graph.add_shared_library(path, None, members, bundle.linker)?
            }
        };
        debug!(name = %bundle.name, ?id, "library declared");
        self.libraries_by_name.insert(bundle.name, id);
        Ok(id)
    }

    #[instrument(skip(self, bundle))]
    fn add_executable(&mut self, bundle: Bundle) -> Result<TargetId> {
        let objects = self.build_objects(&bundle.files)?;
        let libs = self.resolve_libs(&bundle.libs)?;
        let mut members = objects;
        members.extend(libs);

        let suffix = self.object_suffix();
        let path = self.paths.output_root.join(format!("{}{suffix}", bundle.name));
        let id = self.graph.add_executable(path, members, bundle.linker)?;
        debug!(name = %bundle.name, ?id, "executable declared");
        Ok(id)
    }

    fn add_target_options(&mut self, target: TargetId, kind: ProcessorKind, options: Vec<CompilerOption>) -> Result<()> {
        let node = self.graph.get_mut(target);
        let mut group = node.local_options.take().unwrap_or_else(|| self.globals.clone());
        for opt in options {
            group.add(kind, opt, true)?;
        }
        node.local_options = Some(group);
        Ok(())
    }

    fn delete_target_options(&mut self, target: TargetId, kind: ProcessorKind, names: &[&str]) -> Result<()> {
        let node = self.graph.get_mut(target);
        let mut group = node.local_options.take().unwrap_or_else(|| self.globals.clone());
        group.retain(kind, |opt| !names.contains(&opt.name.as_str()));
        node.local_options = Some(group);
        Ok(())
    }

    fn register_generated_source(
        &mut self,
        output_path: PathBuf,
        generator: PathBuf,
        args: Vec<String>,
        inputs: Vec<TargetId>,
    ) -> Result<TargetId> {
        let id = self.graph.add_generated_source(output_path.clone(), generator, args, inputs)?;
        self.sources_by_path.insert(output_path, id);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project_with_sources(dir: &std::path::Path) -> Project {
        std::fs::write(dir.join("planet.c"), "").unwrap();
        std::fs::write(dir.join("main.C"), "").unwrap();
        let paths =
            ProjectPaths::builder(dir, dir.join("out")).include(dir).build();
        Project::new(paths, BuildType::Debug, LinkType::Dynamic)
    }

    #[test]
    fn hello_world_bundle_declaration() {
        let dir = tempfile::tempdir().unwrap();
        let mut project = project_with_sources(dir.path());

        let lib_planet = project
            .add_library(
                Bundle {
                    name: "Planet".to_string(),
                    files: vec!["planet.c".to_string()],
                    libs: vec![],
                    linker: ProcessorKind::LdCcLib,
                },
                LinkType::Dynamic,
            )
            .unwrap();

        let hello = project
            .add_executable(Bundle {
                name: "hello".to_string(),
                files: vec!["main.C".to_string()],
                libs: vec!["Planet".to_string()],
                linker: ProcessorKind::LdCxxExec,
            })
            .unwrap();

        project.graph.validate().unwrap();
        assert_eq!(project.graph.len(), 6);
        assert!(project.graph.get(hello).dependencies.contains(&lib_planet));
    }

    #[test]
    fn unknown_library_reference_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut project = project_with_sources(dir.path());
        let err = project
            .add_executable(Bundle {
                name: "hello".to_string(),
                files: vec!["main.C".to_string()],
                libs: vec!["Nonexistent".to_string()],
                linker: ProcessorKind::LdCxxExec,
            })
            .unwrap_err();
        assert!(err.to_string().contains("unknown library"));
    }
}

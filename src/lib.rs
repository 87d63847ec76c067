#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

//! A parallel build orchestrator core for C/C++/assembler projects: an
//! option model, a target dependency graph, header-dependency discovery,
//! a persistent staleness cache, and a fail-fast parallel scheduler,
//! fronted by a narrow project-declaration interface. Argument parsing,
//! a CLI, and a concrete project-file format are out of scope — a front
//! end drives this crate through [`project::ProjectDeclaration`].

#[macro_use]
extern crate tracing;

pub mod error;
pub use error::{BuildError, Result};

pub mod types;
pub use types::{BuildType, LinkType};

pub mod utils;

pub mod options;
pub use options::{CompilerOption, OptionGroup, OptionSet, ProcessorKind};

pub mod targets;
pub use targets::{Target, TargetGraph, TargetId, TargetKind};

pub mod host;
pub use host::HostProbe;

pub mod config;
pub use config::ProjectPaths;

pub mod cache;
pub use cache::{CacheRecord, CacheStore};

pub mod staleness;
pub use staleness::{StaleReason, Staleness};

pub mod discovery;

pub mod scheduler;
pub use scheduler::Scheduler;

pub mod driver;
pub use driver::{build, BuildReport};

pub mod project;
pub use project::{Bundle, Project, ProjectDeclaration};

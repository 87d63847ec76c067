//! Ordered, conflict-checked collections of [`CompilerOption`]s.
//!
//! [`OptionSet`] owns the options for a single [`ProcessorKind`]; linker
//! kinds split their options into a pre- and post-object-list sequence since
//! `-l`/`-L`/`-Wl,...` ordering relative to the object files matters
//! (spec.md §8, invariant I8). [`OptionGroup`] is the per-target bundle of
//! one `OptionSet` per processor kind plus the fixed [`BuildType`] that
//! gates which flags are even legal.

use super::{CompilerOption, ParamKind, ProcessorKind};
use crate::error::{BuildError, Result};
use crate::types::BuildType;
use tracing::{debug, trace};

/// Names whose second occurrence in a set is a conflict (replace evicts the
/// first, otherwise it's an error) rather than something that just appends.
fn is_define_or_undef(opt: &CompilerOption) -> bool {
    matches!(opt.name.as_str(), "-D" | "-U")
}

fn is_warning(opt: &CompilerOption) -> bool {
    opt.name == "-W"
}

fn is_opt_level(opt: &CompilerOption) -> bool {
    opt.name == "-O"
}

fn is_single_valued(opt: &CompilerOption) -> bool {
    matches!(opt.name.as_str(), "-install_name" | "-compatibility_version" | "-current_version" | "-m")
}

/// Whether two *different* (non field-equal) options occupy the same
/// "conflict slot" and so cannot both be present in a set.
fn conflicts(existing: &CompilerOption, incoming: &CompilerOption) -> bool {
    if is_define_or_undef(existing) && is_define_or_undef(incoming) {
        return existing.conflict_key() == incoming.conflict_key();
    }
    if is_warning(existing) && is_warning(incoming) {
        return existing.conflict_key() == incoming.conflict_key();
    }
    if is_opt_level(existing) && is_opt_level(incoming) {
        return true;
    }
    if is_single_valued(existing) && is_single_valued(incoming) {
        return existing.name == incoming.name;
    }
    false
}

/// Linker flags that belong after the object-file list rather than before
/// it: library search and link-time passthrough.
fn is_post_object_class(opt: &CompilerOption) -> bool {
    matches!(opt.name.as_str(), "-l" | "-L" | "-Wl," | "-Wl,-rpath" | "-Wl,-soname" | "-framework")
}

/// An ordered, duplicate/conflict-checked set of options for one processor.
///
/// For non-linker kinds every option lives in `pre` and `post` stays empty.
/// For linker kinds, `add` routes each option into `pre` (driver flags,
/// ahead of the object list) or `post` (`-l`/`-L`/`-Wl,...`/`-framework`,
/// after it) by [`is_post_object_class`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct OptionSet {
    kind: Option<ProcessorKind>,
    pre: Vec<CompilerOption>,
    post: Vec<CompilerOption>,
}

impl OptionSet {
    pub fn new(kind: ProcessorKind) -> Self {
        Self { kind: Some(kind), pre: Vec::new(), post: Vec::new() }
    }

    pub fn kind(&self) -> Option<ProcessorKind> {
        self.kind
    }

    pub fn is_empty(&self) -> bool {
        self.pre.is_empty() && self.post.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pre.len() + self.post.len()
    }

    fn list_for_mut(&mut self, opt: &CompilerOption) -> &mut Vec<CompilerOption> {
        let linker = self.kind.map(ProcessorKind::is_linker).unwrap_or(false);
        if linker && is_post_object_class(opt) {
            &mut self.post
        } else {
            &mut self.pre
        }
    }

    /// Adds `opt`, applying spec.md §4.1's duplicate/conflict rules:
    ///
    /// - an exact field-for-field duplicate: with `replace` it's a no-op
    ///   (the existing option is kept), without `replace` it's an error.
    /// - a define/undefine of the same symbol with opposite polarity, a
    ///   `-Wfoo`/`-Wno-foo` pair, a second `-O`, or a second single-valued
    ///   flag (`-install_name`, `-compatibility_version`,
    ///   `-current_version`, `-m`): with `replace` the existing option is
    ///   evicted and the new one appended, without `replace` it's an error.
    /// - anything else: appended.
    pub fn add(&mut self, opt: CompilerOption, replace: bool) -> Result<()> {
        let list = self.list_for_mut(&opt);
        if let Some(pos) = list.iter().position(|existing| *existing == opt) {
            if replace {
                trace!(option = %opt, "duplicate option, keeping existing");
                return Ok(());
            }
            return Err(BuildError::configuration(format!("duplicate option: {}", list[pos])));
        }
        if let Some(pos) = list.iter().position(|existing| conflicts(existing, &opt)) {
            if replace {
                debug!(existing = %list[pos], incoming = %opt, "replacing conflicting option");
                list.remove(pos);
                list.push(opt);
                return Ok(());
            }
            return Err(BuildError::configuration(format!("conflicting options: {} vs {opt}", list[pos])));
        }
        list.push(opt);
        Ok(())
    }

    /// The options in argv order: `pre`, then (for linker kinds) `post`.
    /// Callers that need the object-file list spliced in between use
    /// [`Self::pre_tokens`] and [`Self::post_tokens`] directly.
    pub fn tokens(&self) -> Vec<String> {
        self.pre_tokens().into_iter().chain(self.post_tokens()).collect()
    }

    pub fn pre_tokens(&self) -> Vec<String> {
        self.pre.iter().flat_map(CompilerOption::tokens).collect()
    }

    pub fn post_tokens(&self) -> Vec<String> {
        self.post.iter().flat_map(CompilerOption::tokens).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompilerOption> {
        self.pre.iter().chain(self.post.iter())
    }

    /// Drops every option for which `keep` returns `false`, from both the
    /// pre- and post-object sequences.
    pub fn retain(&mut self, mut keep: impl FnMut(&CompilerOption) -> bool) {
        self.pre.retain(|opt| keep(opt));
        self.post.retain(|opt| keep(opt));
    }
}

/// Per-processor-kind option sets for one target, bound to a fixed
/// [`BuildType`]. The build type gates which flags are legal at all: debug
/// builds forbid optimization-class `-f` flags and positive `-O` levels
/// (without an explicit override), release builds forbid `-O0` and `-g` and
/// require `-s`.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct OptionGroup {
    build_type: Option<BuildType>,
    allow_debug_optimization: bool,
    cpp: OptionSet,
    cc: OptionSet,
    cxx: OptionSet,
    asm: OptionSet,
    ld_cc_lib: OptionSet,
    ld_cxx_lib: OptionSet,
    ld_cc_exec: OptionSet,
    ld_cxx_exec: OptionSet,
}

impl OptionGroup {
    pub fn new(build_type: BuildType) -> Self {
        Self {
            build_type: Some(build_type),
            allow_debug_optimization: false,
            cpp: OptionSet::new(ProcessorKind::Cpp),
            cc: OptionSet::new(ProcessorKind::Cc),
            cxx: OptionSet::new(ProcessorKind::Cxx),
            asm: OptionSet::new(ProcessorKind::As),
            ld_cc_lib: OptionSet::new(ProcessorKind::LdCcLib),
            ld_cxx_lib: OptionSet::new(ProcessorKind::LdCxxLib),
            ld_cc_exec: OptionSet::new(ProcessorKind::LdCcExec),
            ld_cxx_exec: OptionSet::new(ProcessorKind::LdCxxExec),
        }
    }

    /// Lifts an explicit override allowing positive `-O` levels on a debug
    /// build. Without it, a debug build rejects any `-O` above `-O0`.
    pub fn allow_debug_optimization(mut self, allow: bool) -> Self {
        self.allow_debug_optimization = allow;
        self
    }

    pub fn build_type(&self) -> Option<BuildType> {
        self.build_type
    }

    fn set_for(&mut self, kind: ProcessorKind) -> &mut OptionSet {
        match kind {
            ProcessorKind::Cpp => &mut self.cpp,
            ProcessorKind::Cc => &mut self.cc,
            ProcessorKind::Cxx => &mut self.cxx,
            ProcessorKind::As => &mut self.asm,
            ProcessorKind::LdCcLib => &mut self.ld_cc_lib,
            ProcessorKind::LdCxxLib => &mut self.ld_cxx_lib,
            ProcessorKind::LdCcExec => &mut self.ld_cc_exec,
            ProcessorKind::LdCxxExec => &mut self.ld_cxx_exec,
        }
    }

    /// Returns the independent `OptionSet` bound to `kind`. Each of the
    /// eight processor kinds — including all four linker kinds — owns its
    /// own set; none alias (spec.md §3: "OptionSet ... bound to a
    /// processor kind", "OptionGroup — mapping from processor kind to
    /// OptionSet").
    pub fn set(&self, kind: ProcessorKind) -> &OptionSet {
        match kind {
            ProcessorKind::Cpp => &self.cpp,
            ProcessorKind::Cc => &self.cc,
            ProcessorKind::Cxx => &self.cxx,
            ProcessorKind::As => &self.asm,
            ProcessorKind::LdCcLib => &self.ld_cc_lib,
            ProcessorKind::LdCxxLib => &self.ld_cxx_lib,
            ProcessorKind::LdCcExec => &self.ld_cc_exec,
            ProcessorKind::LdCxxExec => &self.ld_cxx_exec,
        }
    }

    /// Validates `opt` against the group's build type, then delegates to
    /// the matching [`OptionSet::add`].
    pub fn add(&mut self, kind: ProcessorKind, opt: CompilerOption, replace: bool) -> Result<()> {
        self.check_build_type(&opt)?;
        self.set_for(kind).add(opt, replace)
    }

    /// Drops options matching `keep` from the `kind` processor's set
    /// (spec.md §6's `delete_target_options`).
    pub fn retain(&mut self, kind: ProcessorKind, keep: impl FnMut(&CompilerOption) -> bool) {
        self.set_for(kind).retain(keep);
    }

    fn check_build_type(&self, opt: &CompilerOption) -> Result<()> {
        let Some(build_type) = self.build_type else { return Ok(()) };
        if opt.name == "-f" && super::parse::is_optimization_class_f(opt.param.as_deref().unwrap_or_default()) {
            if build_type == BuildType::Debug {
                return Err(BuildError::configuration(format!(
                    "optimization flag {opt} is not allowed in a debug build"
                )));
            }
        }
        if opt.name == "-O" {
            let level = opt.param.as_deref().unwrap_or_default();
            let is_zero = level == "0";
            match build_type {
                BuildType::Debug if !is_zero && !self.allow_debug_optimization => {
                    return Err(BuildError::configuration(format!(
                        "optimization level {opt} is not allowed in a debug build"
                    )));
                }
                BuildType::Release if is_zero => {
                    return Err(BuildError::configuration("-O0 is not allowed in a release build".to_string()));
                }
                _ => {}
            }
        }
        if opt.name == "-g" && opt.param_kind == ParamKind::None && build_type == BuildType::Release {
            return Err(BuildError::configuration("-g is not allowed in a release build".to_string()));
        }
        if opt.name == "-s" && opt.param_kind == ParamKind::None && build_type != BuildType::Release {
            return Err(BuildError::configuration(format!(
                "-s is only allowed in a release build, not {build_type}"
            )));
        }
        Ok(())
    }
}

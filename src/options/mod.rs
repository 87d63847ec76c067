//! Typed representation of every compiler/assembler/linker flag (C1).
//!
//! An [`CompilerOption`] is a value object: two options with the same field
//! tuple compare and hash equal regardless of where they came from. This is
//! the contract [`crate::cache`] relies on to detect "options changed".

mod parse;
mod render;
mod set;

pub use parse::parse;
pub use set::{OptionGroup, OptionSet};

use std::fmt;

/// Which processor a flag belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub enum ProcessorKind {
    Cpp,
    Cc,
    Cxx,
    As,
    LdCcLib,
    LdCxxLib,
    LdCcExec,
    LdCxxExec,
}

impl ProcessorKind {
    /// Whether this processor kind produces a linked artifact (as opposed
    /// to compiling a translation unit).
    pub fn is_linker(self) -> bool {
        matches!(self, Self::LdCcLib | Self::LdCxxLib | Self::LdCcExec | Self::LdCxxExec)
    }
}

impl fmt::Display for ProcessorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Cpp => "cpp",
            Self::Cc => "cc",
            Self::Cxx => "cxx",
            Self::As => "as",
            Self::LdCcLib => "ld-cc-lib",
            Self::LdCxxLib => "ld-cxx-lib",
            Self::LdCcExec => "ld-cc-exec",
            Self::LdCxxExec => "ld-cxx-exec",
        };
        f.write_str(s)
    }
}

/// The kind of parameter a flag takes, per spec.md §3.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ParamKind {
    None,
    Required,
    Optional,
}

/// How the flag's name and param are joined when rendered to argv.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Separator {
    /// `-Ipath`, `-DFOO=1`
    None,
    /// `-std=c++20`
    Equals,
    /// `--param key=val`
    Space,
}

/// One flag, fully typed. Value-object semantics: equality and hashing are
/// by field tuple, matching spec.md's "Options are value objects".
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct CompilerOption {
    /// Name including leading hyphens, e.g. `-D`, `-Wl,-rpath`, `-std`.
    pub name: String,
    pub kind: ProcessorKind,
    pub param_kind: ParamKind,
    pub param: Option<String>,
    /// Whether a `no-` segment was present (`-Wno-shadow`, `-fno-common`).
    pub negation: bool,
    pub separator: Separator,
    /// For `k=v` style params (`-DFOO=1`, `--param max-inline=4`).
    pub key: Option<String>,
    pub value: Option<String>,
}

impl CompilerOption {
    /// Constructs an option with no parameter, e.g. `-shared`, `-nostdlib`.
    pub fn flag(name: impl Into<String>, kind: ProcessorKind) -> Self {
        Self {
            name: name.into(),
            kind,
            param_kind: ParamKind::None,
            param: None,
            negation: false,
            separator: Separator::None,
            key: None,
            value: None,
        }
    }

    /// Constructs an option with a required parameter and the given
    /// separator, e.g. `-std=c++20` (`Separator::Equals`) or
    /// `--param key=val` (`Separator::Space`).
    pub fn with_param(
        name: impl Into<String>,
        kind: ProcessorKind,
        param: impl Into<String>,
        separator: Separator,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            param_kind: ParamKind::Required,
            param: Some(param.into()),
            negation: false,
            separator,
            key: None,
            value: None,
        }
    }

    /// Constructs a `k=v` style option (`-DFOO=1`, `--param max=4`).
    pub fn with_key_value(
        name: impl Into<String>,
        kind: ProcessorKind,
        key: impl Into<String>,
        value: Option<String>,
        separator: Separator,
    ) -> Self {
        let key = key.into();
        let param = match &value {
            Some(v) => format!("{key}={v}"),
            None => key.clone(),
        };
        Self {
            name: name.into(),
            kind,
            param_kind: ParamKind::Required,
            param: Some(param),
            negation: false,
            separator,
            key: Some(key),
            value,
        }
    }

    pub fn negated(mut self, negation: bool) -> Self {
        self.negation = negation;
        self
    }

    /// The "identity" two options conflict on: same name, ignoring the
    /// negation bit and the value. Used for define/undef and `-Wfoo`/
    /// `-Wno-foo` conflict detection.
    pub fn conflict_key(&self) -> &str {
        self.key.as_deref().unwrap_or(&self.name)
    }
}

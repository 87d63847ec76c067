//! Dependency discovery (C3): run the preprocessor in depfile-emitting
//! mode and parse its GCC-style `.d` output to enumerate header
//! dependencies. Grounded jointly on the teacher's `resolver::parse`
//! (parse once, cache by fingerprint) for the overall shape, and on
//! `megaton-hammer`'s `builder.rs::are_deps_up_to_date` for treating a
//! dependency list as one path per line compared against the target's
//! mtime — generalized here to the concrete GCC/Clang `-M`/`-MF` depfile
//! format, since spec.md §4.3 leaves the wire format unspecified and this
//! is the corpus's universal choice.

use crate::error::{BuildError, Result};
use crate::host::HostProbe;
use crate::targets::TargetId;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, trace};

/// Headers discovered for one Object, already split into user headers
/// (new dependency edges) and the targets that generate any of them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DiscoveryResult {
    pub user_headers: Vec<PathBuf>,
    pub generated_producers: Vec<TargetId>,
}

/// Maps a generated header's path to the [`TargetId`] that produces it, so
/// discovery can add a producer→consumer edge (spec.md §4.3).
pub struct GeneratedIndex<'a> {
    by_path: &'a HashMap<PathBuf, TargetId>,
}

impl<'a> GeneratedIndex<'a> {
    pub fn new(by_path: &'a HashMap<PathBuf, TargetId>) -> Self {
        Self { by_path }
    }

    fn producer_of(&self, path: &Path) -> Option<TargetId> {
        self.by_path.get(path).copied()
    }
}

/// Runs `tool -M -MF <scratch> <preprocessor argv> <source>` and parses
/// the resulting Makefile-rule depfile. System headers (per `host`) are
/// excluded; everything else becomes a dependency edge, with generated
/// headers additionally recorded as producer edges via `generated`.
pub fn discover(
    tool_path: &Path,
    preprocessor_argv: &[String],
    source: &Path,
    host: &HostProbe,
    generated: &GeneratedIndex<'_>,
) -> Result<DiscoveryResult> {
    let scratch = tempfile::NamedTempFile::new().map_err(|e| BuildError::discovery(source, e))?;

    let mut cmd = Command::new(tool_path);
    cmd.args(preprocessor_argv)
        .arg("-M")
        .arg("-MF")
        .arg(scratch.path())
        .arg(source)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    trace!(?cmd, "running preprocessor for dependency discovery");

    let output = cmd.output().map_err(|e| BuildError::discovery(source, e))?;
    if !output.status.success() {
        return Err(BuildError::discovery(
            source,
            format!("preprocessor exited with {}: {}", output.status, String::from_utf8_lossy(&output.stderr)),
        ));
    }

    let depfile = std::fs::read_to_string(scratch.path()).map_err(|e| BuildError::discovery(source, e))?;
    let paths = parse_depfile(&depfile)?;

    let mut result = DiscoveryResult::default();
    for path in paths {
        if path == source {
            continue;
        }
        if host.is_system_header(&path) {
            continue;
        }
        if let Some(producer) = generated.producer_of(&path) {
            result.generated_producers.push(producer);
        }
        result.user_headers.push(path);
    }
    debug!(source = %source.display(), headers = result.user_headers.len(), "discovery complete");
    Ok(result)
}

/// Parses a Makefile-rule depfile of the form:
/// ```text
/// main.o: main.c header1.h \
///   header2.h
/// ```
/// into the list of paths on the right of the first `:`. Backslash-newline
/// continuations are joined before splitting on whitespace.
fn parse_depfile(contents: &str) -> Result<Vec<PathBuf>> {
    let joined = contents.replace("\\\n", " ");
    let Some((_, rest)) = joined.split_once(':') else {
        return Err(BuildError::configuration("depfile missing ':' rule separator"));
    };
    Ok(rest.split_whitespace().map(PathBuf::from).collect())
}

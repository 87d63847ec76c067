//! One-time host probe: resolves tool paths, the system header search
//! path, and scheduling defaults. An external collaborator per spec.md §1
//! ("probing the host for installed compilers/headers"); this module keeps
//! that probe to a single narrow surface so the rest of the crate never
//! shells out to discover the host itself.

use crate::error::{BuildError, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, trace};

/// Resolved facts about the build host, gathered once at driver startup
/// (spec.md §4.7 step (i)) and threaded through the rest of the run.
#[derive(Clone, Debug)]
pub struct HostProbe {
    pub cc_path: PathBuf,
    pub cxx_path: PathBuf,
    /// Directories the compiler searches for `#include <...>` headers.
    /// Discovery excludes anything under these from the dependency edges
    /// it records (spec.md §4.3).
    pub system_include_dirs: Vec<PathBuf>,
    pub worker_count: usize,
}

impl HostProbe {
    /// Runs `cc -E -Wp,-v -xc /dev/null` and scans its stderr for the
    /// bracketed `#include <...> search starts here:` block: the standard
    /// GCC-family idiom for discovering the system include search path.
    pub fn probe(cc_path: impl Into<PathBuf>, cxx_path: impl Into<PathBuf>) -> Result<Self> {
        let cc_path = cc_path.into();
        let cxx_path = cxx_path.into();
        let system_include_dirs = Self::probe_system_includes(&cc_path)?;
        let worker_count = num_cpus::get();
        debug!(?cc_path, ?cxx_path, dirs = system_include_dirs.len(), worker_count, "host probed");
        Ok(Self { cc_path, cxx_path, system_include_dirs, worker_count })
    }

    fn probe_system_includes(cc_path: &Path) -> Result<Vec<PathBuf>> {
        let mut cmd = Command::new(cc_path);
        cmd.args(["-E", "-Wp,-v", "-xc", "/dev/null"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        trace!(?cmd, "probing system include search path");
        let output =
            cmd.output().map_err(|e| BuildError::host_probe(cc_path, format!("failed to run: {e}")))?;
        let stderr = String::from_utf8_lossy(&output.stderr);
        parse_include_search_path(&stderr)
            .ok_or_else(|| BuildError::host_probe(cc_path, "could not find include search path block in -v output"))
    }

    pub fn is_system_header(&self, path: &Path) -> bool {
        self.system_include_dirs.iter().any(|dir| path.starts_with(dir))
    }
}

/// Parses the block:
/// ```text
/// #include <...> search starts here:
///  /usr/include
///  /usr/local/include
/// End of search list.
/// ```
fn parse_include_search_path(stderr: &str) -> Option<Vec<PathBuf>> {
    let start = stderr.find("#include <...> search starts here:")?;
    let after_start = &stderr[start..];
    let body_start = after_start.find('\n').map(|i| i + 1)?;
    let body = &after_start[body_start..];
    let end = body.find("End of search list.")?;
    let dirs = body[..end]
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(PathBuf::from)
        .collect();
    Some(dirs)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
ignoring nonexistent directory \"/usr/local/include\"
#include \"...\" search starts here:
#include <...> search starts here:
 /usr/lib/gcc/x86_64-linux-gnu/12/include
 /usr/local/include
 /usr/include/x86_64-linux-gnu
 /usr/include
End of search list.
";

    #[test]
    fn parses_system_include_dirs_from_verbose_output() {
        let dirs = parse_include_search_path(SAMPLE).unwrap();
        assert_eq!(
            dirs,
            vec![
                PathBuf::from("/usr/lib/gcc/x86_64-linux-gnu/12/include"),
                PathBuf::from("/usr/local/include"),
                PathBuf::from("/usr/include/x86_64-linux-gnu"),
                PathBuf::from("/usr/include"),
            ]
        );
    }

    #[test]
    fn missing_block_returns_none() {
        assert!(parse_include_search_path("nothing useful here").is_none());
    }

    #[test]
    fn is_system_header_matches_subpaths() {
        let probe = HostProbe {
            cc_path: PathBuf::from("cc"),
            cxx_path: PathBuf::from("c++"),
            system_include_dirs: vec![PathBuf::from("/usr/include")],
            worker_count: 4,
        };
        assert!(probe.is_system_header(Path::new("/usr/include/stdio.h")));
        assert!(!probe.is_system_header(Path::new("/home/me/project/include/foo.h")));
    }
}

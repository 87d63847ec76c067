//! Deterministic rendering back to argv tokens. `render(opt)` is the
//! left-inverse of [`super::parse::parse`]: `parse(render(opt)) == opt` is
//! invariant I1 from spec.md §8.

use super::{CompilerOption, Separator};
use std::fmt;

impl CompilerOption {
    /// Renders this option as the one or two argv tokens a subprocess
    /// invocation would see. Two tokens only for the space-separated forms
    /// (`--param k=v`, `-install_name <n>`, `-Wl,-rpath -Wl,<path>`,
    /// `-Wl,-soname -Wl,<name>`).
    pub fn tokens(&self) -> Vec<String> {
        if self.name == "-Wl,-rpath" || self.name == "-Wl,-soname" {
            let value = self.param.as_deref().unwrap_or_default();
            return vec![self.name.clone(), format!("-Wl,{value}")];
        }
        match self.separator {
            Separator::Space => {
                let param = self.param.clone().unwrap_or_default();
                vec![self.name.clone(), param]
            }
            Separator::Equals => {
                let param = self.param.as_deref().unwrap_or_default();
                vec![format!("{}={param}", self.name)]
            }
            Separator::None => vec![self.render_single_token()],
        }
    }

    fn render_single_token(&self) -> String {
        let negation_segment = if self.negation { "no-" } else { "" };
        match self.name.as_str() {
            "-W" => {
                let key = self.key.as_deref().unwrap_or_default();
                match &self.value {
                    Some(v) => format!("-W{negation_segment}{key}={v}"),
                    None => format!("-W{negation_segment}{key}"),
                }
            }
            "-f" => {
                let param = self.param.as_deref().unwrap_or_default();
                format!("-f{negation_segment}{param}")
            }
            "-D" => {
                let key = self.key.as_deref().unwrap_or_default();
                match &self.value {
                    Some(v) => format!("-D{key}={v}"),
                    None => format!("-D{key}"),
                }
            }
            _ => {
                let param = self.param.as_deref().unwrap_or_default();
                format!("{}{param}", self.name)
            }
        }
    }
}

impl fmt::Display for CompilerOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tokens().join(" "))
    }
}

/// Renders a single option to its canonical string form.
pub fn render(opt: &CompilerOption) -> String {
    opt.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{parse, ProcessorKind};
    use pretty_assertions::assert_eq;

    fn round_trip(kind: ProcessorKind, tokens: &[&str]) {
        let opts = parse(kind, tokens).unwrap();
        assert_eq!(opts.len(), 1, "expected a single logical option from {tokens:?}");
        let rendered = opts[0].tokens();
        assert_eq!(rendered, tokens, "render(parse(x)) != x for {tokens:?}");
        let reparsed = parse(kind, &rendered).unwrap();
        assert_eq!(reparsed, opts, "parse(render(opt)) != opt for {tokens:?}");
    }

    #[test]
    fn round_trips_define_with_value() {
        round_trip(ProcessorKind::Cpp, &["-DFOO=1"]);
    }

    #[test]
    fn round_trips_define_without_value() {
        round_trip(ProcessorKind::Cpp, &["-DFOO"]);
    }

    #[test]
    fn round_trips_undef() {
        round_trip(ProcessorKind::Cpp, &["-UFOO"]);
    }

    #[test]
    fn round_trips_include() {
        round_trip(ProcessorKind::Cpp, &["-I/usr/local/include"]);
    }

    #[test]
    fn round_trips_negated_warning() {
        round_trip(ProcessorKind::Cc, &["-Wno-shadow"]);
    }

    #[test]
    fn round_trips_warning_with_value() {
        round_trip(ProcessorKind::Cc, &["-Wstrict-overflow=3"]);
    }

    #[test]
    fn round_trips_f_flag() {
        round_trip(ProcessorKind::Cc, &["-fno-common"]);
    }

    #[test]
    fn round_trips_std() {
        round_trip(ProcessorKind::Cxx, &["-std=c++20"]);
    }

    #[test]
    fn round_trips_opt_level() {
        round_trip(ProcessorKind::Cc, &["-O2"]);
    }

    #[test]
    fn round_trips_param_pair() {
        round_trip(ProcessorKind::Cc, &["--param", "max-inline-insns-auto=40"]);
    }

    #[test]
    fn round_trips_rpath_pair() {
        round_trip(ProcessorKind::LdCcExec, &["-Wl,-rpath", "-Wl,/opt/lib"]);
    }

    #[test]
    fn round_trips_soname_pair() {
        round_trip(ProcessorKind::LdCxxLib, &["-Wl,-soname", "-Wl,libfoo.so.1"]);
    }

    #[test]
    fn round_trips_lib_and_libpath() {
        round_trip(ProcessorKind::LdCcExec, &["-lfoo"]);
        round_trip(ProcessorKind::LdCcExec, &["-L/usr/lib"]);
    }

    #[test]
    fn round_trips_install_name() {
        round_trip(ProcessorKind::LdCcLib, &["-install_name", "libfoo.dylib"]);
    }
}

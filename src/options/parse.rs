//! `parse(kind, strings) -> [CompilerOption]`, per spec.md §4.1.
//!
//! Each rule below mirrors one bullet of the spec's parsing table. Anything
//! not matching a rule for the processor kind it was parsed under is a
//! configuration error (spec.md §7).

use super::{CompilerOption, ParamKind, ProcessorKind, Separator};
use crate::error::{BuildError, Result};

/// Warning names accepted after `-W`/`-Wno-`. A closed allow-list per
/// spec.md §4.1 ("Name must be drawn from an enumerated allow-list").
const WARNING_NAMES: &[&str] = &[
    "all",
    "extra",
    "error",
    "shadow",
    "unused",
    "uninitialized",
    "maybe-uninitialized",
    "conversion",
    "sign-compare",
    "cast-align",
    "pedantic",
    "switch",
    "overflow",
    "strict-overflow",
    "format",
];

/// `-f<name>` compiler options, per spec.md §4.1.
const F_NAMES: &[&str] = &[
    "PIC",
    "lto",
    "signed-char",
    "unsigned-char",
    "no-common",
    "inline-functions",
    "strict-aliasing",
    "diagnostics-show-option",
];

/// `-f<name>` flags that belong to the optimization class and are therefore
/// forbidden in debug builds (enforced by [`crate::options::OptionGroup`],
/// which knows the active `BuildType`; this module only classifies).
const F_OPTIMIZATION_CLASS: &[&str] =
    &["lto", "inline-functions", "strict-aliasing"];

/// `-m<param>` machine flags, per spec.md §4.1.
const M_PARAMS: &[&str] = &["64", "32", "arch=native", "tune=generic", "avx2", "sse4.2"];

/// `-std=<dialect>` dialects, per spec.md §4.1.
const STD_DIALECTS: &[&str] = &["c11", "c17", "c++17", "c++20", "gnu11", "gnu++17", "gnu++20"];

/// `--param <key>=<val>` tuning keys, per spec.md §4.1.
const PARAM_KEYS: &[&str] =
    &["max-inline-insns-auto", "inline-unit-growth", "large-function-growth", "min-vect-loop-bound"];

pub fn is_optimization_class_f(name: &str) -> bool {
    F_OPTIMIZATION_CLASS.contains(&name)
}

/// Parses a sequence of command-line tokens into typed options for the
/// given processor kind. Consumes extra tokens from the stream for the
/// two-token forms (`--param k=v`, `-install_name <n>`, `-Wl,-rpath
/// -Wl,<path>`, ...).
pub fn parse<S: AsRef<str>>(kind: ProcessorKind, strings: &[S]) -> Result<Vec<CompilerOption>> {
    let tokens: Vec<&str> = strings.iter().map(|s| s.as_ref()).collect();
    let mut out = Vec::with_capacity(tokens.len());
    let mut i = 0;
    while i < tokens.len() {
        let tok = tokens[i];
        let (opt, consumed) = parse_one(kind, &tokens, i)?;
        out.push(opt);
        i += consumed;
        let _ = tok;
    }
    Ok(out)
}

/// Parses a single logical option starting at `tokens[i]`. Returns the
/// option and how many tokens it consumed (1 or 2).
fn parse_one(kind: ProcessorKind, tokens: &[&str], i: usize) -> Result<(CompilerOption, usize)> {
    let tok = tokens[i];

    if let Some(rest) = tok.strip_prefix("-D") {
        let (key, value) = split_kv(rest);
        return Ok((
            CompilerOption::with_key_value("-D", kind, key, value, Separator::None),
            1,
        ));
    }
    if let Some(sym) = tok.strip_prefix("-U") {
        return Ok((
            CompilerOption::with_param("-U", kind, sym, Separator::None),
            1,
        ));
    }
    if let Some(path) = tok.strip_prefix("-I") {
        return Ok((
            CompilerOption::with_param("-I", kind, path, Separator::None),
            1,
        ));
    }

    if let Some(rest) = tok.strip_prefix("-Wa,") {
        return Ok((
            CompilerOption::with_param("-Wa,", kind, rest, Separator::None),
            1,
        ));
    }
    if let Some(rest) = tok.strip_prefix("-Wl,") {
        return parse_wl(kind, rest, tokens, i);
    }
    if let Some(rest) = tok.strip_prefix("-W") {
        return parse_warning(kind, rest);
    }

    if let Some(rest) = tok.strip_prefix("-f") {
        return parse_f(kind, rest);
    }
    if let Some(rest) = tok.strip_prefix("-m") {
        if !M_PARAMS.contains(&rest) {
            return Err(BuildError::configuration(format!("unknown -m parameter: {rest}")));
        }
        return Ok((
            CompilerOption::with_param("-m", kind, rest, Separator::None),
            1,
        ));
    }
    if let Some(dialect) = tok.strip_prefix("-std=") {
        if !STD_DIALECTS.contains(&dialect) {
            return Err(BuildError::configuration(format!("unknown -std dialect: {dialect}")));
        }
        return Ok((
            CompilerOption::with_param("-std", kind, dialect, Separator::Equals),
            1,
        ));
    }
    if let Some(level) = tok.strip_prefix("-O") {
        if !["0", "1", "2", "3", "s", "fast"].contains(&level) {
            return Err(BuildError::configuration(format!("unknown -O level: {level}")));
        }
        return Ok((
            CompilerOption::with_param("-O", kind, level, Separator::None),
            1,
        ));
    }
    if tok == "-g" {
        return Ok((CompilerOption::flag("-g", kind), 1));
    }
    if tok == "-s" {
        return Ok((CompilerOption::flag("-s", kind), 1));
    }
    if tok == "--param" {
        let Some(kv) = tokens.get(i + 1) else {
            return Err(BuildError::configuration("--param requires a key=val argument"));
        };
        let (key, value) = split_kv(kv);
        let Some(value) = value else {
            return Err(BuildError::configuration(format!("--param {kv} is missing a value")));
        };
        if !PARAM_KEYS.contains(&key.as_str()) {
            return Err(BuildError::configuration(format!("unknown --param key: {key}")));
        }
        return Ok((
            CompilerOption::with_key_value(
                "--param",
                kind,
                key,
                Some(value),
                Separator::Space,
            ),
            2,
        ));
    }

    if let Some(lib) = tok.strip_prefix("-l") {
        return Ok((
            CompilerOption::with_param("-l", kind, lib, Separator::None),
            1,
        ));
    }
    if let Some(dir) = tok.strip_prefix("-L") {
        return Ok((
            CompilerOption::with_param("-L", kind, dir, Separator::None),
            1,
        ));
    }

    if !kind.is_linker() {
        return Err(BuildError::configuration(format!(
            "unrecognized option for {kind}: {tok}"
        )));
    }

    match tok {
        "-shared" | "-static" | "-nostdlib" | "-dynamiclib" => {
            Ok((CompilerOption::flag(tok, kind), 1))
        }
        "-install_name" | "-compatibility_version" | "-current_version" | "-framework" => {
            let Some(arg) = tokens.get(i + 1) else {
                return Err(BuildError::configuration(format!("{tok} requires an argument")));
            };
            Ok((
                CompilerOption::with_param(tok, kind, *arg, Separator::Space),
                2,
            ))
        }
        _ => Err(BuildError::configuration(format!(
            "unrecognized linker option: {tok}"
        ))),
    }
}

fn parse_warning(kind: ProcessorKind, rest: &str) -> Result<(CompilerOption, usize)> {
    let (negation, rest) = match rest.strip_prefix("no-") {
        Some(r) => (true, r),
        None => (false, rest),
    };
    let (name, value) = split_kv(rest);

    if !WARNING_NAMES.contains(&name.as_str()) {
        return Err(BuildError::configuration(format!("unknown warning: -W{rest}")));
    }
    if name == "strict-overflow" {
        if let Some(v) = &value {
            let n: u32 = v
                .parse()
                .map_err(|_| BuildError::configuration(format!("invalid -Wstrict-overflow value: {v}")))?;
            if !(1..=5).contains(&n) {
                return Err(BuildError::configuration(format!(
                    "-Wstrict-overflow={n} out of range 1..5"
                )));
            }
        }
    }
    if name == "format" {
        if let Some(v) = &value {
            if v != "2" {
                return Err(BuildError::configuration("only -Wformat=2 is accepted".to_string()));
            }
        }
    }

    let mut opt = CompilerOption::with_key_value("-W", kind, name, value, Separator::None);
    opt.negation = negation;
    Ok((opt, 1))
}

fn parse_f(kind: ProcessorKind, rest: &str) -> Result<(CompilerOption, usize)> {
    let (negation, name) = match rest.strip_prefix("no-") {
        Some(r) => (true, r),
        None => (false, rest),
    };
    if !F_NAMES.contains(&name) {
        return Err(BuildError::configuration(format!("unknown -f option: -f{rest}")));
    }
    let mut opt = CompilerOption::with_param("-f", kind, name, Separator::None);
    opt.negation = negation;
    Ok((opt, 1))
}

/// Handles `-Wl,<tok>` including the two logical two-token pairs
/// `-Wl,-rpath -Wl,<path>` and `-Wl,-soname -Wl,<name>`. A tiny explicit
/// state machine: `idle -> seen-rpath/seen-soname -> emit-pair -> idle`.
fn parse_wl(
    kind: ProcessorKind,
    rest: &str,
    tokens: &[&str],
    i: usize,
) -> Result<(CompilerOption, usize)> {
    if rest == "-rpath" || rest == "-soname" {
        let Some(next) = tokens.get(i + 1) else {
            return Err(BuildError::configuration(format!(
                "-Wl,{rest} must be followed by -Wl,<value>"
            )));
        };
        let Some(value) = next.strip_prefix("-Wl,") else {
            return Err(BuildError::configuration(format!(
                "-Wl,{rest} must be followed by -Wl,<value>, got {next}"
            )));
        };
        let name = if rest == "-rpath" { "-Wl,-rpath" } else { "-Wl,-soname" };
        return Ok((
            CompilerOption::with_param(name, kind, value, Separator::Space),
            2,
        ));
    }
    Ok((
        CompilerOption::with_param("-Wl,", kind, rest, Separator::None),
        1,
    ))
}

fn split_kv(s: &str) -> (String, Option<String>) {
    match s.split_once('=') {
        Some((k, v)) => (k.to_string(), Some(v.to_string())),
        None => (s.to_string(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_define_with_value() {
        let opts = parse(ProcessorKind::Cpp, &["-DFOO=1"]).unwrap();
        assert_eq!(opts.len(), 1);
        assert_eq!(opts[0].key.as_deref(), Some("FOO"));
        assert_eq!(opts[0].value.as_deref(), Some("1"));
    }

    #[test]
    fn parses_define_without_value() {
        let opts = parse(ProcessorKind::Cpp, &["-DFOO"]).unwrap();
        assert_eq!(opts[0].key.as_deref(), Some("FOO"));
        assert_eq!(opts[0].value, None);
    }

    #[test]
    fn rejects_unknown_warning() {
        assert!(parse(ProcessorKind::Cc, &["-Wbogus"]).is_err());
    }

    #[test]
    fn parses_negated_warning() {
        let opts = parse(ProcessorKind::Cc, &["-Wno-shadow"]).unwrap();
        assert!(opts[0].negation);
        assert_eq!(opts[0].conflict_key(), "shadow");
    }

    #[test]
    fn rejects_strict_overflow_out_of_range() {
        assert!(parse(ProcessorKind::Cc, &["-Wstrict-overflow=9"]).is_err());
    }

    #[test]
    fn accepts_strict_overflow_in_range() {
        assert!(parse(ProcessorKind::Cc, &["-Wstrict-overflow=3"]).is_ok());
    }

    #[test]
    fn parses_param_pair() {
        let opts = parse(ProcessorKind::Cc, &["--param", "max-inline-insns-auto=40"]).unwrap();
        assert_eq!(opts.len(), 1);
        assert_eq!(opts[0].key.as_deref(), Some("max-inline-insns-auto"));
        assert_eq!(opts[0].value.as_deref(), Some("40"));
    }

    #[test]
    fn parses_rpath_pair() {
        let opts = parse(ProcessorKind::LdCcExec, &["-Wl,-rpath", "-Wl,/opt/lib"]).unwrap();
        assert_eq!(opts.len(), 1);
        assert_eq!(opts[0].name, "-Wl,-rpath");
        assert_eq!(opts[0].param.as_deref(), Some("/opt/lib"));
    }

    #[test]
    fn rejects_rpath_without_pair() {
        assert!(parse(ProcessorKind::LdCcExec, &["-Wl,-rpath"]).is_err());
    }

    #[test]
    fn parses_linker_only_flags() {
        let opts = parse(ProcessorKind::LdCcExec, &["-shared", "-lfoo", "-L/usr/lib"]).unwrap();
        assert_eq!(opts.len(), 3);
        assert_eq!(opts[1].param.as_deref(), Some("foo"));
        assert_eq!(opts[2].param.as_deref(), Some("/usr/lib"));
    }

    #[test]
    fn rejects_linker_flag_for_compiler_kind() {
        assert!(parse(ProcessorKind::Cc, &["-shared"]).is_err());
    }

    #[test]
    fn parse_is_deterministic_round_trip_capable() {
        // I1: parse(render(opt)) == opt, exercised end-to-end in render.rs.
        let opts = parse(ProcessorKind::Cc, &["-O2", "-g", "-fPIC"]).unwrap();
        assert_eq!(opts.len(), 3);
    }
}

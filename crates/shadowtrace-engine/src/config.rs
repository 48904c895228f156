//! Run configuration resolved from the launcher's CLI surface and the
//! `SHADOWTRACE_OPTS` environment variable (analogous to `VALGRIND_OPTS`).
//!
//! Resolution uses a non-blocking atomic state machine rather than
//! `OnceLock`, because resolving config must not deadlock if it is reached
//! reentrantly from a path the engine itself instruments.

use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeakResolution {
    Low,
    Med,
    High,
}

impl LeakResolution {
    fn from_str_loose(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "high" | "full" => LeakResolution::High,
            "med" | "medium" => LeakResolution::Med,
            _ => LeakResolution::Low,
        }
    }
}

/// Fully resolved run configuration, mirroring the launcher's CLI surface.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub tool: String,
    pub verbosity: i32,
    pub error_limit: bool,
    pub leak_check: bool,
    pub leak_resolution: LeakResolution,
    pub show_reachable: bool,
    pub freelist_vol: u64,
    pub suppressions: Vec<String>,
    pub db_attach: bool,
    pub gen_suppressions: bool,
    pub error_exitcode: Option<i32>,
    pub partial_loads_ok: bool,
    pub log_fd: Option<i32>,
    pub log_file: Option<std::path::PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            tool: "memcheck".to_string(),
            verbosity: 0,
            error_limit: true,
            leak_check: false,
            leak_resolution: LeakResolution::Low,
            show_reachable: false,
            freelist_vol: 10 * 1024 * 1024,
            suppressions: Vec::new(),
            db_attach: false,
            gen_suppressions: false,
            error_exitcode: None,
            partial_loads_ok: false,
            log_fd: None,
            log_file: None,
        }
    }
}

fn parse_bool_opt(v: &str) -> bool {
    matches!(v.to_ascii_lowercase().as_str(), "yes" | "true" | "1")
}

/// Parse one `--flag` or `--flag=value` token into `cfg`, mirroring the
/// original's tolerant per-option scan (unrecognised tokens are ignored
/// rather than rejected, since tool-private options pass through).
fn apply_token(cfg: &mut RunConfig, token: &str) {
    let (key, value) = match token.split_once('=') {
        Some((k, v)) => (k, Some(v)),
        None => (token, None),
    };
    match (key, value) {
        ("--tool", Some(v)) => cfg.tool = v.to_string(),
        ("-v", _) => cfg.verbosity += 1,
        ("-q", _) => cfg.verbosity -= 1,
        ("--error-limit", Some(v)) => cfg.error_limit = parse_bool_opt(v),
        ("--leak-check", Some(v)) => cfg.leak_check = parse_bool_opt(v),
        ("--leak-resolution", Some(v)) => cfg.leak_resolution = LeakResolution::from_str_loose(v),
        ("--show-reachable", Some(v)) => cfg.show_reachable = parse_bool_opt(v),
        ("--freelist-vol", Some(v)) => {
            if let Ok(n) = v.parse() {
                cfg.freelist_vol = n;
            }
        }
        ("--suppressions", Some(v)) => cfg.suppressions.push(v.to_string()),
        ("--db-attach", Some(v)) => cfg.db_attach = parse_bool_opt(v),
        ("--gen-suppressions", Some(v)) => cfg.gen_suppressions = parse_bool_opt(v),
        ("--error-exitcode", Some(v)) => cfg.error_exitcode = v.parse().ok(),
        ("--partial-loads-ok", Some(v)) => cfg.partial_loads_ok = parse_bool_opt(v),
        ("--log-fd", Some(v)) => cfg.log_fd = v.parse().ok(),
        ("--log-file", Some(v)) => cfg.log_file = Some(std::path::PathBuf::from(v)),
        _ => {}
    }
}

/// Parse a full option string (as found in `SHADOWTRACE_OPTS`, whitespace
/// separated) on top of the defaults.
pub fn parse_opts(opts: &str) -> RunConfig {
    let mut cfg = RunConfig::default();
    for token in opts.split_whitespace() {
        apply_token(&mut cfg, token);
    }
    cfg
}

const STATE_UNRESOLVED: u8 = 0;
const STATE_RESOLVING: u8 = 1;
const STATE_RESOLVED: u8 = 2;

static RESOLUTION_STATE: AtomicU8 = AtomicU8::new(STATE_UNRESOLVED);

/// Resolve `SHADOWTRACE_OPTS` once per process, guarding against
/// reentrant calls (a reentrant call during resolution sees the
/// default config rather than blocking).
pub fn env_opts_once() -> RunConfig {
    let state = RESOLUTION_STATE.load(Ordering::Relaxed);
    if state == STATE_RESOLVING {
        return RunConfig::default();
    }
    if RESOLUTION_STATE.compare_exchange(STATE_UNRESOLVED, STATE_RESOLVING, Ordering::SeqCst, Ordering::Relaxed).is_err() {
        return RunConfig::default();
    }
    let cfg = std::env::var("SHADOWTRACE_OPTS").map(|v| parse_opts(&v)).unwrap_or_default();
    RESOLUTION_STATE.store(STATE_RESOLVED, Ordering::Release);
    cfg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_defaults() {
        let cfg = RunConfig::default();
        assert!(cfg.error_limit);
        assert!(!cfg.leak_check);
        assert_eq!(cfg.leak_resolution, LeakResolution::Low);
    }

    #[test]
    fn parses_boolean_and_numeric_flags() {
        let cfg = parse_opts("--tool=memcheck --leak-check=yes --freelist-vol=2048 --error-exitcode=42");
        assert_eq!(cfg.tool, "memcheck");
        assert!(cfg.leak_check);
        assert_eq!(cfg.freelist_vol, 2048);
        assert_eq!(cfg.error_exitcode, Some(42));
    }

    #[test]
    fn repeatable_suppressions_flag_accumulates() {
        let cfg = parse_opts("--suppressions=/a.supp --suppressions=/b.supp");
        assert_eq!(cfg.suppressions, vec!["/a.supp", "/b.supp"]);
    }

    #[test]
    fn verbosity_flags_increment_and_decrement() {
        let cfg = parse_opts("-v -v -q");
        assert_eq!(cfg.verbosity, 1);
    }

    #[test]
    fn unrecognised_token_is_ignored_not_rejected() {
        let cfg = parse_opts("--some-tool-private-flag=7 --leak-check=yes");
        assert!(cfg.leak_check);
    }

    #[test]
    fn leak_resolution_parses_loose_synonyms() {
        assert_eq!(LeakResolution::from_str_loose("HIGH"), LeakResolution::High);
        assert_eq!(LeakResolution::from_str_loose("med"), LeakResolution::Med);
        assert_eq!(LeakResolution::from_str_loose("bogus"), LeakResolution::Low);
    }
}

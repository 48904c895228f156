//! Launcher binary — parses the CLI surface, resolves `SHADOWTRACE_OPTS`,
//! loads suppression files, and constructs the [`Engine`] before any guest
//! code runs.
//!
//! Front-end concerns (actually launching and translating a guest binary)
//! remain outside this crate's scope; this binary's job ends at "engine
//! constructed, ready for a front-end to drive it".

use std::path::PathBuf;

use clap::Parser;
use shadowtrace_engine::{Engine, LeakResolution, RunConfig, Tool, ToolDetails};
use shadowtrace_errors::{parse_suppressions, Suppression};
use shadowtrace_ucode::UCodeBlock;

/// A dynamic binary instrumentation core.
#[derive(Debug, Parser)]
#[command(name = "shadowtrace")]
#[command(about = "Shadow-memory instrumentation core launcher")]
struct Cli {
    /// Selects the tool (skin) to run; tool plugins are registered by
    /// the front-end that links against this core.
    #[arg(long, default_value = "memcheck")]
    tool: String,

    #[arg(short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,

    #[arg(short = 'q', action = clap::ArgAction::Count)]
    quiet: u8,

    #[arg(long, default_value = "yes")]
    error_limit: String,

    #[arg(long, default_value = "no")]
    leak_check: String,

    #[arg(long, default_value = "low")]
    leak_resolution: String,

    #[arg(long, default_value = "no")]
    show_reachable: String,

    #[arg(long, default_value_t = 10 * 1024 * 1024)]
    freelist_vol: u64,

    #[arg(long = "suppressions")]
    suppressions: Vec<PathBuf>,

    #[arg(long, default_value = "no")]
    db_attach: String,

    #[arg(long, default_value = "no")]
    gen_suppressions: String,

    #[arg(long)]
    log_fd: Option<i32>,

    #[arg(long)]
    log_file: Option<PathBuf>,

    #[arg(long)]
    error_exitcode: Option<i32>,

    #[arg(long, default_value = "no")]
    partial_loads_ok: String,
}

fn yes(s: &str) -> bool {
    matches!(s.to_ascii_lowercase().as_str(), "yes" | "true" | "1")
}

impl Cli {
    fn into_run_config(self) -> RunConfig {
        let mut cfg = RunConfig {
            tool: self.tool,
            verbosity: self.verbose as i32 - self.quiet as i32,
            error_limit: yes(&self.error_limit),
            leak_check: yes(&self.leak_check),
            leak_resolution: match self.leak_resolution.to_ascii_lowercase().as_str() {
                "high" | "full" => LeakResolution::High,
                "med" | "medium" => LeakResolution::Med,
                _ => LeakResolution::Low,
            },
            show_reachable: yes(&self.show_reachable),
            freelist_vol: self.freelist_vol,
            suppressions: self.suppressions.iter().map(|p| p.display().to_string()).collect(),
            db_attach: yes(&self.db_attach),
            gen_suppressions: yes(&self.gen_suppressions),
            error_exitcode: self.error_exitcode,
            partial_loads_ok: yes(&self.partial_loads_ok),
            log_fd: self.log_fd,
            log_file: self.log_file,
        };
        // SHADOWTRACE_OPTS (VALGRIND_OPTS-analogue) layers on top of explicit
        // flags rather than replacing them; both sources are honoured.
        if let Ok(extra) = std::env::var("SHADOWTRACE_OPTS") {
            let from_env = shadowtrace_engine::parse_opts(&extra);
            cfg.suppressions.extend(from_env.suppressions);
        }
        cfg
    }
}

/// No-op passthrough tool used when the front-end hasn't linked a real
/// skin; every instrumented block passes through unchanged. A real
/// deployment replaces this with a tool implementing memcheck-equivalent
/// semantics, supplied externally.
struct PassthroughTool;

impl Tool for PassthroughTool {
    fn details(&self) -> ToolDetails {
        ToolDetails { name: "passthrough".into(), version: env!("CARGO_PKG_VERSION").into(), avg_translation_expansion: 1.0 }
    }
    fn pre_init(&mut self) {}
    fn post_init(&mut self) {}
    fn instrument(&mut self, block: &UCodeBlock) -> UCodeBlock {
        block.clone()
    }
    fn finalize(&mut self) {}
}

fn load_suppressions(paths: &[String], running_tool: &str) -> Vec<Suppression> {
    let mut all = Vec::new();
    for path in paths {
        match std::fs::read_to_string(path) {
            Ok(text) => match parse_suppressions(&text, running_tool) {
                Ok(mut parsed) => all.append(&mut parsed),
                Err(e) => eprintln!("shadowtrace: warning: {path}: {e}"),
            },
            Err(e) => eprintln!("shadowtrace: warning: could not read {path}: {e}"),
        }
    }
    all
}

fn main() {
    let cli = Cli::parse();
    let config = cli.into_run_config();
    let suppressions = load_suppressions(&config.suppressions, &config.tool);

    let engine = Engine::new(config, suppressions, Box::new(PassthroughTool));

    // The actual guest-driving loop (translation, scheduling, signal
    // delivery) is owned by the front-end/back-end decoders, supplied
    // externally; this binary's contract ends at handing back a
    // constructed, ready engine.
    engine.finalize();
    std::process::exit(engine.exit_code(0));
}

//! The `Engine` handle: a single instance created by the launcher, passed
//! by shared reference into every helper, and destroyed at process exit.
//!
//! It owns every core-level singleton (shadow map, context store, error
//! recorder, event table, translation cache, thread table) so none of
//! them depend on a `static`/`OnceLock` for construction order.

use parking_lot::Mutex;
use shadowtrace_client::{dispatch, ClientRequest, DispatchResult, IgnoredRequests};
use shadowtrace_context::{ContextHandle, ContextStore, Resolution};
use shadowtrace_errors::{Caps, ErrorKind, ErrorRecord, ErrorRecorder, FrameName, Payload, RecordOutcome, Suppression};
use shadowtrace_events::TrackEvents;
use shadowtrace_runtime::{RunLock, ThreadId, ThreadTable};
use shadowtrace_shadowmap::ShadowMap;
use shadowtrace_ucode::UCodeBlock;

use crate::config::RunConfig;
use crate::log::{LogLevel, Logger};
use crate::tool::Tool;
use crate::translation_cache::TranslationCache;

fn resolution_from_config(cfg: &RunConfig) -> Resolution {
    match cfg.leak_resolution {
        crate::config::LeakResolution::Low => Resolution::Low,
        crate::config::LeakResolution::Med => Resolution::Med,
        crate::config::LeakResolution::High => Resolution::High,
    }
}

/// Process-wide handle tying every core component together. Constructed
/// explicitly by the launcher before any guest code runs.
pub struct Engine {
    pub config: RunConfig,
    pub shadow: ShadowMap,
    pub context: ContextStore,
    pub events: Mutex<TrackEvents>,
    pub recorder: Mutex<ErrorRecorder>,
    pub threads: Mutex<ThreadTable>,
    pub run_lock: RunLock,
    pub translations: Mutex<TranslationCache>,
    pub ignored_requests: IgnoredRequests,
    pub logger: Option<Mutex<Logger>>,
    pub tool: Mutex<Box<dyn Tool + Send>>,
}

impl Engine {
    pub fn new(config: RunConfig, suppressions: Vec<Suppression>, tool: Box<dyn Tool + Send>) -> Self {
        let caps = Caps {
            hard_cap: 1000,
            soft_cap: if config.error_limit { 300 } else { usize::MAX },
        };
        let resolution = resolution_from_config(&config);
        let logger = config.log_file.as_ref().and_then(|p| Logger::to_file(p).ok()).map(Mutex::new);
        Engine {
            shadow: ShadowMap::new(true),
            context: ContextStore::new(),
            events: Mutex::new(TrackEvents::new()),
            recorder: Mutex::new(ErrorRecorder::new(suppressions, resolution, caps)),
            threads: Mutex::new(ThreadTable::new()),
            run_lock: RunLock::new(),
            translations: Mutex::new(TranslationCache::new()),
            ignored_requests: IgnoredRequests::new(),
            logger,
            tool: Mutex::new(tool),
            config,
        }
    }

    /// Instrument one UCode block through the registered tool.
    pub fn instrument(&self, block: &UCodeBlock) -> UCodeBlock {
        self.tool.lock().instrument(block)
    }

    /// Intern a captured call-site fingerprint.
    pub fn intern_context(&self, fp: shadowtrace_context::Fingerprint) -> ContextHandle {
        self.context.intern(fp)
    }

    /// Route one detected error through the recorder, honouring the
    /// tool's veto hook and suppression matching.
    pub fn maybe_record_error(
        &self,
        kind: ErrorKind,
        fingerprint: ContextHandle,
        addr: Option<u32>,
        string: Option<String>,
        payload: Payload,
        frames: &[FrameName],
    ) -> RecordOutcome {
        if !self.tool.lock().on_error(&kind, frames) {
            return RecordOutcome::Suppressed;
        }
        let outcome = self.recorder.lock().maybe_record_error(&self.context, kind, fingerprint, addr, string, payload, frames);
        if let Some(logger) = &self.logger {
            if matches!(outcome, RecordOutcome::NewlyPrinted) {
                let _ = logger.lock().log(0, LogLevel::Error, "error_recorded", None);
            }
        }
        outcome
    }

    /// Dispatch one client request, first giving the tool a chance to
    /// claim it if the core doesn't recognise the code.
    pub fn dispatch_client_request(&self, req: ClientRequest, self_tid: ThreadId) -> DispatchResult {
        if let ClientRequest::Unknown(_) = req {
            if let Some(result) = self.tool.lock().on_client_request(&req) {
                return result;
            }
        }
        let mut events = self.events.lock();
        dispatch(req, &self.shadow, &mut events, &self.ignored_requests, self_tid)
    }

    /// Invalidate cached translations intersecting `[addr, addr+len)`.
    pub fn discard_translations(&self, addr: u32, len: u32) -> Vec<(u32, u32)> {
        self.translations.lock().discard(addr, len)
    }

    pub fn errors(&self) -> Vec<ErrorRecord> {
        self.recorder.lock().records().to_vec()
    }

    /// Exit code the launcher should use: the guest's own, unless
    /// `--error-exitcode` is set and at least one error was recorded.
    pub fn exit_code(&self, guest_exit_code: i32) -> i32 {
        let had_errors = !self.recorder.lock().is_empty();
        match self.config.error_exitcode {
            Some(code) if had_errors => code,
            _ => guest_exit_code,
        }
    }

    pub fn finalize(&self) {
        self.tool.lock().finalize();
        if let Some(logger) = &self.logger {
            let _ = logger.lock().flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::ToolDetails;
    use shadowtrace_context::Fingerprint;

    struct StubTool {
        vetoes: bool,
    }

    impl Tool for StubTool {
        fn details(&self) -> ToolDetails {
            ToolDetails { name: "stub".into(), version: "0".into(), avg_translation_expansion: 1.0 }
        }
        fn pre_init(&mut self) {}
        fn post_init(&mut self) {}
        fn instrument(&mut self, block: &UCodeBlock) -> UCodeBlock {
            block.clone()
        }
        fn finalize(&mut self) {}
        fn on_error(&mut self, _kind: &ErrorKind, _frames: &[FrameName]) -> bool {
            !self.vetoes
        }
    }

    fn engine_with(vetoes: bool) -> Engine {
        Engine::new(RunConfig::default(), Vec::new(), Box::new(StubTool { vetoes }))
    }

    #[test]
    fn repeat_of_same_error_increments_count_not_list_length() {
        let engine = engine_with(false);
        let fp = engine.intern_context(Fingerprint::capture([0x1000], shadowtrace_context::DEFAULT_MAX_FRAMES));
        engine.maybe_record_error(ErrorKind::AddressError, fp, Some(0x2000), None, Payload::None, &[]);
        let outcome = engine.maybe_record_error(ErrorKind::AddressError, fp, Some(0x2000), None, Payload::None, &[]);
        assert_eq!(outcome, RecordOutcome::Repeated);
        assert_eq!(engine.errors().len(), 1);
        assert_eq!(engine.errors()[0].count, 2);
    }

    #[test]
    fn tool_veto_suppresses_without_touching_recorder() {
        let engine = engine_with(true);
        let fp = engine.intern_context(Fingerprint::capture([0x1000], shadowtrace_context::DEFAULT_MAX_FRAMES));
        let outcome = engine.maybe_record_error(ErrorKind::AddressError, fp, None, None, Payload::None, &[]);
        assert_eq!(outcome, RecordOutcome::Suppressed);
        assert!(engine.errors().is_empty());
    }

    #[test]
    fn exit_code_overridden_only_when_error_exitcode_set_and_errors_exist() {
        let mut cfg = RunConfig::default();
        cfg.error_exitcode = Some(99);
        let engine = Engine::new(cfg, Vec::new(), Box::new(StubTool { vetoes: false }));
        assert_eq!(engine.exit_code(0), 0);
        let fp = engine.intern_context(Fingerprint::capture([0x1000], shadowtrace_context::DEFAULT_MAX_FRAMES));
        engine.maybe_record_error(ErrorKind::AddressError, fp, None, None, Payload::None, &[]);
        assert_eq!(engine.exit_code(0), 99);
    }

    #[test]
    fn discard_translations_forwards_to_cache() {
        let engine = engine_with(false);
        engine.translations.lock().note_translated(0x4000_0000, 0x1000);
        let removed = engine.discard_translations(0x4000_0000, 0x1000);
        assert_eq!(removed, vec![(0x4000_0000, 0x4000_1000)]);
    }
}

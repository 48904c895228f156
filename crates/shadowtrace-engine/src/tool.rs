//! Tool registration trait.
//!
//! A tool that doesn't override a hook gets a documented no-op default.
//! The trait's required hooks mirror a four-stage lifecycle
//! (pre-init/post-init/instrument/finalize); everything past those four is
//! opt-in.

use shadowtrace_client::{ClientRequest, DispatchResult};
use shadowtrace_errors::{ErrorKind, FrameName, Suppression};
use shadowtrace_ucode::UCodeBlock;

/// Sizing/identity metadata a tool publishes during registration, used
/// by the engine to size the translation cache (an average
/// translation-expansion estimate).
#[derive(Debug, Clone)]
pub struct ToolDetails {
    pub name: String,
    pub version: String,
    pub avg_translation_expansion: f32,
}

/// The seam every tool ("skin") plugs into. Required hooks have no
/// default; optional hooks default to a documented no-op.
pub trait Tool {
    fn details(&self) -> ToolDetails;

    fn pre_init(&mut self);
    fn post_init(&mut self);

    /// Instrument one UCode block. The default identity instrumentation
    /// is never provided — every tool cares about at least some memory
    /// accesses, so this is required, not optional.
    fn instrument(&mut self, block: &UCodeBlock) -> UCodeBlock;

    fn finalize(&mut self);

    /// Called once per newly-observed (kind, fingerprint) pair before it
    /// is recorded; returning `false` vetoes recording entirely (distinct
    /// from suppression, which still counts). Default: always record.
    fn on_error(&mut self, _kind: &ErrorKind, _frames: &[FrameName]) -> bool {
        true
    }

    /// Extra suppressions the tool wants pre-loaded beyond the user's
    /// `--suppressions` files. Default: none.
    fn builtin_suppressions(&self) -> Vec<Suppression> {
        Vec::new()
    }

    /// Handle a client request the core's generic dispatcher didn't
    /// recognise (a tool-private request code). Default: not handled.
    fn on_client_request(&mut self, _req: &ClientRequest) -> Option<DispatchResult> {
        None
    }

    /// Wrap a syscall's observed effect on the shadow map (e.g. marking
    /// an output buffer defined after a successful `read`). Default: no
    /// extra wrapping.
    fn wrap_syscall(&mut self, _syscall_nr: u32) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopTool;

    impl Tool for NoopTool {
        fn details(&self) -> ToolDetails {
            ToolDetails { name: "noop".into(), version: "0.1".into(), avg_translation_expansion: 1.0 }
        }
        fn pre_init(&mut self) {}
        fn post_init(&mut self) {}
        fn instrument(&mut self, block: &UCodeBlock) -> UCodeBlock {
            block.clone()
        }
        fn finalize(&mut self) {}
    }

    #[test]
    fn default_hooks_are_permissive_noops() {
        let mut tool = NoopTool;
        assert!(tool.on_error(&ErrorKind::AddressError, &[]));
        assert!(tool.builtin_suppressions().is_empty());
        assert!(tool.on_client_request(&ClientRequest::DoLeakCheck).is_none());
    }

    #[test]
    fn instrument_default_impl_is_identity_for_noop_tool() {
        let mut tool = NoopTool;
        let block: UCodeBlock = Vec::new();
        assert_eq!(tool.instrument(&block), block);
    }
}

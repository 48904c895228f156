//! Error deduplication and reporting.
//!
//! An MRU-ordered error list with soft/hard caps and suppressed-error
//! linkage. Cap bookkeeping uses a small `AtomicU64`-driven state machine
//! rather than a fancier controller, since the cap policy here is fixed
//! rather than adaptive.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use shadowtrace_context::{ContextHandle, ContextStore, Resolution};

use crate::kind::ErrorKind;
use crate::record::{ErrorRecord, Payload};
use crate::suppression::{find_match, FrameName, Suppression};

/// Outcome of `maybe_record_error`, telling the caller whether (and how) to
/// print something.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// First occurrence of a new, unsuppressed error: print it.
    NewlyPrinted,
    /// First occurrence, but a suppression silenced it.
    Suppressed,
    /// A repeat of an already-recorded error: count bumped, nothing printed.
    Repeated,
    /// The hard cap was already reached before this call; dropped entirely.
    DroppedAtHardCap,
}

/// Configurable caps bounding report volume on pathological inputs.
#[derive(Debug, Clone, Copy)]
pub struct Caps {
    /// Above this many distinct errors, `resolution` is forced to `Low`.
    pub soft_cap: usize,
    /// Above this many distinct errors, no further ones are recorded.
    pub hard_cap: usize,
}

impl Default for Caps {
    fn default() -> Self {
        // Mirrors the original's defaults of a few hundred/thousand.
        Self { soft_cap: 300, hard_cap: 1000 }
    }
}

#[derive(Default)]
struct CapState {
    soft_warned: AtomicBool,
    hard_warned: AtomicBool,
}

/// The error recorder: a flat arena of records with an index-based MRU
/// order, plus the suppression list consulted on first occurrence.
pub struct ErrorRecorder {
    records: Vec<ErrorRecord>,
    /// Index order, most-recently-hit first. A flat `Vec` rather than an
    /// owned linked list, so repeat hits just move an index instead of
    /// relinking nodes.
    mru: Vec<usize>,
    suppressions: Vec<Suppression>,
    resolution: Resolution,
    caps: Caps,
    cap_state: CapState,
    slow_mode: AtomicBool,
    total_errors: AtomicU64,
}

impl ErrorRecorder {
    pub fn new(suppressions: Vec<Suppression>, resolution: Resolution, caps: Caps) -> Self {
        Self {
            records: Vec::new(),
            mru: Vec::new(),
            suppressions,
            resolution,
            caps,
            cap_state: CapState::default(),
            slow_mode: AtomicBool::new(false),
            total_errors: AtomicU64::new(0),
        }
    }

    fn effective_resolution(&self) -> Resolution {
        if self.records.len() >= self.caps.soft_cap {
            if !self.cap_state.soft_warned.swap(true, Ordering::Relaxed) {
                // Caller is expected to surface this; we only flip state once.
            }
            Resolution::Low
        } else {
            self.resolution
        }
    }

    /// Did this call cross the soft cap for the first time? Used by callers
    /// that want to print the one-time warning themselves.
    pub fn just_crossed_soft_cap(&self) -> bool {
        self.records.len() >= self.caps.soft_cap && self.cap_state.soft_warned.load(Ordering::Relaxed)
    }

    pub fn just_crossed_hard_cap(&self) -> bool {
        self.records.len() >= self.caps.hard_cap && self.cap_state.hard_warned.load(Ordering::Relaxed)
    }

    fn find_existing(&self, context: &ContextStore, kind: &ErrorKind, fingerprint: ContextHandle) -> Option<usize> {
        let resolution = self.effective_resolution();
        self.mru
            .iter()
            .copied()
            .find(|&idx| self.records[idx].kind == *kind && context.equal(self.records[idx].fingerprint, fingerprint, resolution))
    }

    fn promote(&mut self, idx: usize) {
        self.mru.retain(|&i| i != idx);
        self.mru.insert(0, idx);
    }

    /// Record (or recognise a repeat of) an error. `frames` resolves the
    /// fingerprint's raw addresses to function/object names for suppression
    /// matching; the caller (engine) owns symbol resolution.
    #[allow(clippy::too_many_arguments)]
    pub fn maybe_record_error(
        &mut self,
        context: &ContextStore,
        kind: ErrorKind,
        fingerprint: ContextHandle,
        addr: Option<u32>,
        string: Option<String>,
        payload: Payload,
        frames: &[FrameName],
    ) -> RecordOutcome {
        if let Some(idx) = self.find_existing(context, &kind, fingerprint) {
            self.records[idx].count += 1;
            self.promote(idx);
            self.total_errors.fetch_add(1, Ordering::Relaxed);
            return RecordOutcome::Repeated;
        }

        if self.records.len() >= self.caps.hard_cap {
            self.cap_state.hard_warned.store(true, Ordering::Relaxed);
            return RecordOutcome::DroppedAtHardCap;
        }
        if self.records.len() >= self.caps.soft_cap {
            self.cap_state.soft_warned.store(true, Ordering::Relaxed);
        }

        self.total_errors.fetch_add(1, Ordering::Relaxed);
        let suppressed = find_match(&self.suppressions, &kind, frames).is_some();
        let mut record = ErrorRecord::new(kind, fingerprint, addr, string, payload);
        if suppressed {
            record.suppression = Some(0);
        }
        let idx = self.records.len();
        self.records.push(record);
        self.mru.insert(0, idx);

        if suppressed {
            RecordOutcome::Suppressed
        } else if self.slow_mode.load(Ordering::Relaxed) {
            RecordOutcome::Repeated
        } else {
            RecordOutcome::NewlyPrinted
        }
    }

    /// Enter slow-reduction mode: further first-occurrence errors are only
    /// counted, not printed. Engages automatically once the engine decides
    /// the hard cap is close (the decision itself lives in the engine; this
    /// crate only exposes the toggle).
    pub fn enter_slow_mode(&mut self) {
        self.slow_mode.store(true, Ordering::Relaxed);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[ErrorRecord] {
        &self.records
    }

    pub fn suppressions(&self) -> &[Suppression] {
        &self.suppressions
    }

    /// Records sorted by ascending occurrence count, for the run-end
    /// summary, mirroring `VG_(show_all_errors)`'s ordering.
    pub fn sorted_by_count(&self) -> Vec<&ErrorRecord> {
        let mut v: Vec<&ErrorRecord> = self.records.iter().collect();
        v.sort_by_key(|r| r.count);
        v
    }

    /// `"N errors from M contexts"` summary line.
    pub fn summary_line(&self) -> String {
        let unsuppressed: Vec<&ErrorRecord> = self.records.iter().filter(|r| r.suppression.is_none()).collect();
        let total: u64 = unsuppressed.iter().map(|r| r.count).sum();
        format!("{} errors from {} contexts", total, unsuppressed.len())
    }

    pub fn non_zero_suppression_counters(&self) -> Vec<(&str, u64)> {
        self.suppressions
            .iter()
            .map(|s| (s.name.as_str(), s.counter.load(Ordering::Relaxed)))
            .filter(|(_, c)| *c > 0)
            .collect()
    }
}

/// Render the textual suppression-template format for a given error, for
/// `--gen-suppressions=yes`.
pub fn render_suppression_template(kind: &ErrorKind, tool: &str, funs: &[&str]) -> String {
    let mut out = String::new();
    out.push_str("{\n");
    out.push_str("   <insert_a_suppression_name_here>\n");
    out.push_str(&format!("   {}:{}\n", tool, kind.suppression_key()));
    for f in funs {
        out.push_str(&format!("   fun:{f}\n"));
    }
    out.push_str("}\n");
    out
}

//! Error deduplication/reporting and suppression-file matching.

mod kind;
mod record;
mod recorder;
mod suppression;

pub use kind::ErrorKind;
pub use record::{ErrorRecord, Payload};
pub use recorder::{render_suppression_template, Caps, ErrorRecorder, RecordOutcome};
pub use suppression::{
    find_match, glob_match, parse_suppressions, CallerPattern, CallerPatternKind, FrameName, Suppression,
    SuppressionParseError, MAX_SUPP_CALLERS,
};

//! In-band client requests: guest-injected requests to mark memory, check
//! it, and announce allocator/mempool lifecycle events.

#![deny(unsafe_code)]

mod dispatch;
mod request;

pub use dispatch::{dispatch, DispatchResult, IgnoredRequests, MAX_UNKNOWN_WARNINGS, UNKNOWN_REQUEST_SENTINEL};
pub use request::{code, decode, ClientRequest};

//! Client for the enrollment backend.
//!
//! Registration of captured batches, student lookup, monitoring reports and
//! status, and wiping enrollment data.

mod client;
mod report;
mod retry;

pub use client::{ApiMessage, DEFAULT_BASE_URL, DEFAULT_TIMEOUT, EnrollClient, EnrollError};
pub use report::reports_to_csv;
pub use retry::{
    DEFAULT_BACKOFF_BASE, DEFAULT_BACKOFF_MAX, DEFAULT_MAX_RETRIES, calculate_backoff,
    is_transient_network_error, is_transient_status,
};

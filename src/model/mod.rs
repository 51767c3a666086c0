//! Data model shared by the collector, analysis engine, and store.
//!
//! See `spec.md` §3 for the authoritative field list and invariants.

mod alert;
mod fingerprint;
mod sample;

pub use alert::{Alert, Severity};
pub use fingerprint::{Baseline, Fingerprint, Phase, RegressionFinding};
pub use sample::{Agent, FdRecord, FdType, NetConnection, ProcessSample, StatusRecord};

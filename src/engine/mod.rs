//! Scanning engine.
//!
//! - [`differ`] and [`alert_evaluator`] are pure functions.
//! - [`orchestrator`] runs one scan end to end.
//! - [`scheduler`] owns per-store timers and the in-flight exclusion.
//! - [`dispatcher`] delivers alerts to webhook registrations.
//! - [`retry`] holds the fetch backoff and delivery retry policies.

pub mod alert_evaluator;
pub mod differ;
pub mod dispatcher;
pub mod orchestrator;
pub mod retry;
pub mod scheduler;

#[cfg(test)]
pub(crate) mod test_support;

pub use dispatcher::{DeliveryReport, NotificationDispatcher};
pub use orchestrator::{CancelFlag, ScanOrchestrator, ScanSettings, ScanStorage};
pub use retry::{DeliveryPolicy, RetryPolicy};
pub use scheduler::{LastOutcome, ScanDiagnostics, ScanScheduler, TriggerOutcome};

//! # stockwatch
//!
//! Scheduled inventory scanning and change detection for Shopify
//! storefronts, with alerting through signed webhooks.
//!
//! Every monitored store gets its own recurring timer. Each tick fetches
//! the store's public catalog, compares it against the last known
//! snapshot, turns the differences into typed change events, evaluates
//! alert rules against them, and delivers the resulting alerts to the
//! registered webhook endpoints. At most one scan per store is ever in
//! flight; a tick that arrives while one is running is dropped.
//!
//! ## Architecture
//!
//! ```text
//! Operators (HTTP)                Timers (per store)
//!     │                                │
//!     ├── REST Handlers (api/)         │
//!     ├── MonitorService (service/)    │
//!     │                                │
//!     └──────────► ScanScheduler (engine/) ◄──┘
//!                      │
//!                 ScanOrchestrator ── Fetcher (fetch/) ── storefront
//!                      │
//!          ┌───────────┼────────────────┐
//!        Differ   AlertEvaluator   NotificationDispatcher ── WebhookSender (notify/)
//!                      │
//!          SnapshotStore / ScanHistory (persistence/: memory or PostgreSQL)
//!                      │
//!                  EventBus (domain/)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod notify;
pub mod persistence;
pub mod service;

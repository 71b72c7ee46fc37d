//! Data Transfer Objects for REST request/response serialization.
//!
//! Domain types that are already plain data (`ScanRecord`, `Alert`,
//! `ChangeEvent`, `ProductRecord`, `LoggedAlert`, `StockObservation`) are
//! embedded as-is; stores and webhooks get their own shapes so internal
//! fields such as secrets and soft-delete markers never leave the service.

pub mod alert_dto;
pub mod common_dto;
pub mod scan_dto;
pub mod store_dto;
pub mod webhook_dto;

pub use alert_dto::*;
pub use common_dto::*;
pub use scan_dto::*;
pub use store_dto::*;
pub use webhook_dto::*;

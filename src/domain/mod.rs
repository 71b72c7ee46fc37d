//! Domain layer: identifiers, inventory model, alerts, and the event bus.
//!
//! Everything in here is plain data plus pure helpers. The engine
//! (`crate::engine`) owns the behavior that moves these values around.

pub mod alert;
pub mod change_event;
pub mod event_bus;
pub mod ids;
pub mod monitor_event;
pub mod scan;
pub mod snapshot;
pub mod stock_history;
pub mod store;
pub mod webhook;

pub use alert::{Alert, AlertFilter, AlertKind, AlertRule, LoggedAlert};
pub use change_event::{ChangeEvent, ChangeKind};
pub use event_bus::{EventBus, StoreEvents};
pub use ids::{AlertId, ScanId, StoreId, WebhookId};
pub use monitor_event::{MonitorEvent, SkipReason};
pub use scan::{ScanRecord, ScanResult, ScanTrigger};
pub use snapshot::{InventorySnapshot, ProductRecord};
pub use stock_history::{ObservationFilter, StockChange, StockObservation};
pub use store::{MonitoredStore, StoreUpdate};
pub use webhook::{DeliveryOutcome, DeliveryStatus, WebhookRegistration};

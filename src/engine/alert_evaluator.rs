//! Maps change events and alert rules to alerts.
//!
//! Evaluation is stateless per call. Edge-triggering comes from the
//! differ: a low-stock alert needs a `StockDecreased` event whose `before`
//! is above the threshold, so a quantity that stays low across scans
//! produces no further events and no further alerts.

use chrono::{DateTime, Utc};

use crate::domain::{Alert, AlertId, AlertKind, AlertRule, ChangeEvent, StoreId};

/// Raises alerts for `events` according to `rules`.
///
/// Alerts follow event order (SKU ascending). `raised_at` is the snapshot
/// time so that alert dedup keys are stable for a given scan.
#[must_use]
pub fn evaluate(
    store_id: StoreId,
    events: &[ChangeEvent],
    rules: &[AlertRule],
    raised_at: DateTime<Utc>,
) -> Vec<Alert> {
    let mut alerts = Vec::new();
    for event in events {
        for rule in rules.iter().filter(|r| r.store_id == store_id) {
            if fires(rule, event) {
                let (before, after) = event.quantity_transition().unwrap_or_default();
                alerts.push(Alert {
                    id: AlertId::new(),
                    store_id,
                    sku: event.sku().to_string(),
                    title: event.title().to_string(),
                    kind: rule.kind,
                    before,
                    after,
                    threshold: rule.threshold,
                    raised_at,
                });
            }
        }
    }
    alerts
}

/// Returns `true` if `rule` fires on `event`.
fn fires(rule: &AlertRule, event: &ChangeEvent) -> bool {
    match (rule.kind, event) {
        (AlertKind::LowStock, ChangeEvent::StockDecreased { before, after, .. }) => {
            *before > rule.threshold && *after <= rule.threshold
        }
        (AlertKind::OutOfStock, ChangeEvent::OutOfStock { .. })
        | (AlertKind::BackInStock, ChangeEvent::BackInStock { .. }) => true,
        _ => false,
    }
}

//! Snapshot differ.
//!
//! A pure function from (previous snapshot or empty baseline, new snapshot)
//! to an ordered list of [`ChangeEvent`]s. Both snapshots are already sorted
//! by SKU, so the diff is a single merge-join pass and the output is ordered
//! by SKU ascending. For one SKU the stock event precedes the price event.

use std::cmp::Ordering;

use crate::domain::{ChangeEvent, InventorySnapshot, ProductRecord};

/// Computes the changes from `previous` to `current`.
///
/// `None` is the empty baseline of a store's first scan: every product in
/// `current` yields exactly one `NewProduct` event.
#[must_use]
pub fn diff(previous: Option<&InventorySnapshot>, current: &InventorySnapshot) -> Vec<ChangeEvent> {
    let old = previous.map_or(&[][..], InventorySnapshot::products);
    let new = current.products();

    let mut events = Vec::new();
    let mut old_iter = old.iter().peekable();
    let mut new_iter = new.iter().peekable();

    loop {
        let order = match (old_iter.peek(), new_iter.peek()) {
            (None, None) => break,
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (Some(o), Some(n)) => o.sku.cmp(&n.sku),
        };
        match order {
            Ordering::Less => {
                if let Some(o) = old_iter.next() {
                    events.push(removed(o));
                }
            }
            Ordering::Greater => {
                if let Some(n) = new_iter.next() {
                    events.push(added(n));
                }
            }
            Ordering::Equal => {
                if let (Some(o), Some(n)) = (old_iter.next(), new_iter.next()) {
                    compare(o, n, &mut events);
                }
            }
        }
    }

    events
}

fn added(record: &ProductRecord) -> ChangeEvent {
    ChangeEvent::NewProduct {
        sku: record.sku.clone(),
        title: record.title.clone(),
        quantity: record.quantity,
        price_cents: record.price_cents,
    }
}

fn removed(record: &ProductRecord) -> ChangeEvent {
    ChangeEvent::ProductRemoved {
        sku: record.sku.clone(),
        title: record.title.clone(),
        last_quantity: record.quantity,
        last_price_cents: record.price_cents,
    }
}

fn compare(old: &ProductRecord, new: &ProductRecord, events: &mut Vec<ChangeEvent>) {
    let sku = new.sku.clone();
    let title = new.title.clone();
    let (before, after) = (old.quantity, new.quantity);

    let stock = match before.cmp(&after) {
        Ordering::Equal => None,
        // Recovery from zero takes precedence over a plain increase.
        Ordering::Less if before == 0 => Some(ChangeEvent::BackInStock {
            sku: sku.clone(),
            title: title.clone(),
            before,
            after,
        }),
        Ordering::Less => Some(ChangeEvent::StockIncreased {
            sku: sku.clone(),
            title: title.clone(),
            before,
            after,
        }),
        Ordering::Greater if after == 0 => Some(ChangeEvent::OutOfStock {
            sku: sku.clone(),
            title: title.clone(),
            before,
            after,
        }),
        Ordering::Greater => Some(ChangeEvent::StockDecreased {
            sku: sku.clone(),
            title: title.clone(),
            before,
            after,
        }),
    };
    events.extend(stock);

    if old.price_cents != new.price_cents {
        events.push(ChangeEvent::PriceChanged {
            sku,
            title,
            before_cents: old.price_cents,
            after_cents: new.price_cents,
        });
    }
}

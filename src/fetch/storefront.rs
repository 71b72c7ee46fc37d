//! Shopify storefront catalog format.
//!
//! Parses the public `/products.json` payload into [`ProductRecord`]s:
//!
//! ```json
//! { "products": [ { "id": 1, "title": "Shirt", "variants": [
//!     { "id": 11, "title": "M", "sku": "SH-M", "price": "19.99",
//!       "available": true, "inventory_quantity": 4 } ] } ] }
//! ```

use serde::Deserialize;

use crate::domain::ProductRecord;
use crate::error::ScanError;

/// Variant title Shopify uses for single-variant products.
const DEFAULT_VARIANT_TITLE: &str = "Default Title";

/// Builds the URL of one catalog page.
#[must_use]
pub fn products_page_url(store_url: &str, limit: usize, page: u32) -> String {
    format!(
        "{}/products.json?limit={limit}&page={page}",
        store_url.trim_end_matches('/')
    )
}

/// Records parsed from one catalog page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageParse {
    /// One record per variant.
    pub records: Vec<ProductRecord>,
    /// Number of products on the page, used to detect the last page.
    pub product_count: usize,
}

#[derive(Debug, Deserialize)]
struct CatalogPage {
    #[serde(default)]
    products: Vec<RawProduct>,
}

#[derive(Debug, Deserialize)]
struct RawProduct {
    id: serde_json::Value,
    title: String,
    #[serde(default)]
    variants: Vec<RawVariant>,
}

#[derive(Debug, Deserialize)]
struct RawVariant {
    id: serde_json::Value,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    sku: Option<String>,
    #[serde(default)]
    price: Option<serde_json::Value>,
    #[serde(default)]
    available: Option<bool>,
    #[serde(default)]
    inventory_quantity: Option<i64>,
}

/// Parses one `/products.json` page.
///
/// # Errors
///
/// Returns [`ScanError::Parse`] if the body is not a catalog document or a
/// variant carries an unparseable price.
pub fn parse_products_page(body: &[u8]) -> Result<PageParse, ScanError> {
    let page: CatalogPage = serde_json::from_slice(body)
        .map_err(|e| ScanError::Parse(format!("invalid catalog payload: {e}")))?;

    let product_count = page.products.len();
    let mut records = Vec::new();
    for product in page.products {
        for variant in &product.variants {
            records.push(to_record(&product, variant)?);
        }
    }
    Ok(PageParse {
        records,
        product_count,
    })
}

fn to_record(product: &RawProduct, variant: &RawVariant) -> Result<ProductRecord, ScanError> {
    let variant_id = id_string(&variant.id);
    let sku = variant
        .sku
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map_or_else(|| format!("variant-{variant_id}"), str::to_string);

    let title = match variant.title.as_deref() {
        None | Some(DEFAULT_VARIANT_TITLE) | Some("") => product.title.clone(),
        Some(variant_title) => format!("{} - {variant_title}", product.title),
    };

    let price_cents = match &variant.price {
        None | Some(serde_json::Value::Null) => 0,
        Some(value) => parse_price(value).ok_or_else(|| {
            ScanError::Parse(format!(
                "invalid price {value} for variant {variant_id} of product {}",
                id_string(&product.id)
            ))
        })?,
    };

    let available = variant.available.unwrap_or(false);
    let quantity = match variant.inventory_quantity {
        Some(qty) => u64::try_from(qty).unwrap_or(0),
        None => u64::from(available),
    };

    Ok(ProductRecord {
        sku,
        title,
        variant_id,
        quantity,
        price_cents,
        available,
    })
}

/// Renders a JSON id (number or string) without quotes.
fn id_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Parses a decimal price (`"19.99"`, `"20"`, `19.5`) into minor units.
fn parse_price(value: &serde_json::Value) -> Option<u64> {
    match value {
        serde_json::Value::String(s) => parse_decimal_cents(s.trim()),
        serde_json::Value::Number(n) => {
            let as_float = n.as_f64()?;
            if !as_float.is_finite() || as_float < 0.0 {
                return None;
            }
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let cents = (as_float * 100.0).round() as u64;
            Some(cents)
        }
        _ => None,
    }
}

fn parse_decimal_cents(text: &str) -> Option<u64> {
    let (whole, fraction) = text.split_once('.').unwrap_or((text, ""));
    if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if fraction.len() > 2 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let units: u64 = whole.parse().ok()?;
    let cents: u64 = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<u64>().ok()? * 10,
        _ => fraction.parse().ok()?,
    };
    units.checked_mul(100)?.checked_add(cents)
}

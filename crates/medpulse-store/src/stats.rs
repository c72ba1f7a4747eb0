//! Read-side views used by the administrative surface.

use std::collections::BTreeMap;

use medpulse_common::PublishedItem;
use serde::Serialize;

/// Totals per localized category label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub total: usize,
    pub categories: BTreeMap<String, usize>,
}

impl StoreStats {
    pub fn from_items(items: &[PublishedItem]) -> Self {
        let mut categories = BTreeMap::new();
        for item in items {
            let label = if item.category_zh.is_empty() {
                item.category.label_zh().to_string()
            } else {
                item.category_zh.clone()
            };
            *categories.entry(label).or_insert(0) += 1;
        }
        Self { total: items.len(), categories }
    }
}

/// `{ total, categories, news }`, the listing shape the admin page reads.
#[derive(Debug, Serialize)]
pub struct AdminSnapshot<'a> {
    #[serde(flatten)]
    pub stats: StoreStats,
    pub news: &'a [PublishedItem],
}

impl<'a> AdminSnapshot<'a> {
    pub fn new(items: &'a [PublishedItem]) -> Self {
        Self { stats: StoreStats::from_items(items), news: items }
    }
}

//! Partner-fleet lookup: order number → partner fleet name.

use std::collections::HashMap;

use fleetreport_engine::Dataset;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerMapping {
    by_order: HashMap<String, String>,
}

impl PartnerMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a partner file; rows without an order number or partner are skipped
    pub fn from_dataset(dataset: &Dataset) -> Self {
        let mut mapping = Self::new();
        let (Some(order_col), Some(partner_col)) =
            (dataset.column_containing("номер заказа"), dataset.column_containing("партнер"))
        else {
            log::warn!("partner file lacks order or partner column; no mappings read");
            return mapping;
        };
        for row in dataset.rows() {
            let order = row.text(order_col);
            let partner = row.text(partner_col);
            if !order.trim().is_empty() && !partner.trim().is_empty() {
                mapping.insert(order, partner);
            }
        }
        mapping
    }

    pub fn insert(&mut self, order: impl Into<String>, partner: impl Into<String>) {
        self.by_order.insert(order.into().trim().to_string(), partner.into().trim().to_string());
    }

    pub fn get(&self, order: &str) -> Option<&str> {
        self.by_order.get(order.trim()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_order.is_empty()
    }

    /// Combine sources in order; a later source overwrites earlier entries
    pub fn combine<'a, I>(sources: I) -> Self
    where
        I: IntoIterator<Item = &'a PartnerMapping>,
    {
        let mut combined = Self::new();
        for source in sources {
            for (order, partner) in &source.by_order {
                if let Some(previous) = combined.by_order.insert(order.clone(), partner.clone()) {
                    if previous != *partner {
                        log::debug!("partner for order {order}: {previous} replaced by {partner}");
                    }
                }
            }
        }
        combined
    }
}

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use warnet_core::CoreResult;

/// Venue metadata supplied by the catalog collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Venue {
    pub id: String,
    pub name: String,
    pub total_pcs: u32,
    pub regular_price_per_hour: i64,
    pub member_price_per_hour: i64,
}

impl Venue {
    pub fn has_pc(&self, pc_number: u32) -> bool {
        (1..=self.total_pcs).contains(&pc_number)
    }
}

#[async_trait]
pub trait VenueCatalog: Send + Sync {
    async fn get_venue(&self, venue_id: &str) -> CoreResult<Option<Venue>>;

    async fn list_venues(&self) -> CoreResult<Vec<Venue>>;
}

/// Catalog seeded once from configuration.
#[derive(Debug, Default, Clone)]
pub struct StaticVenueCatalog {
    venues: HashMap<String, Venue>,
}

impl StaticVenueCatalog {
    pub fn new(venues: Vec<Venue>) -> Self {
        Self {
            venues: venues.into_iter().map(|v| (v.id.clone(), v)).collect(),
        }
    }
}

#[async_trait]
impl VenueCatalog for StaticVenueCatalog {
    async fn get_venue(&self, venue_id: &str) -> CoreResult<Option<Venue>> {
        Ok(self.venues.get(venue_id).cloned())
    }

    async fn list_venues(&self) -> CoreResult<Vec<Venue>> {
        let mut venues: Vec<Venue> = self.venues.values().cloned().collect();
        venues.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(venues)
    }
}

//! Last-known-location cache
//!
//! Passive store: the router fans updates out after calling `update`.

use crate::core::model::{Coordinates, LocationRecord};
use chrono::Utc;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct LocationStore {
    records: HashMap<String, LocationRecord>,
}

impl LocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `coordinates` for `actor_id`, stamped with the receipt time
    pub fn update(&mut self, actor_id: &str, coordinates: Coordinates) -> &LocationRecord {
        let record = LocationRecord {
            actor_id: actor_id.to_string(),
            lat: coordinates.lat,
            lng: coordinates.lng,
            timestamp: Utc::now(),
        };
        self.records.insert(actor_id.to_string(), record);
        &self.records[actor_id]
    }

    pub fn get(&self, actor_id: &str) -> Option<&LocationRecord> {
        self.records.get(actor_id)
    }

    pub fn remove(&mut self, actor_id: &str) -> Option<LocationRecord> {
        self.records.remove(actor_id)
    }

    /// Every cached record, ordered by actor id
    pub fn all_latest(&self) -> Vec<LocationRecord> {
        let mut records: Vec<_> = self.records.values().cloned().collect();
        records.sort_by(|a, b| a.actor_id.cmp(&b.actor_id));
        records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

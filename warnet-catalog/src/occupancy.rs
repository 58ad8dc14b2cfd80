use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;
use warnet_core::clock::elapsed_minutes;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlotStatus {
    Available,
    Occupied,
}

/// One physical PC at a venue.
///
/// `remaining_minutes`, `session_start`, `duration_minutes` and `booking_id`
/// are only set while the slot is `Occupied`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PcSlot {
    pub venue_id: String,
    pub number: u32,
    pub status: SlotStatus,
    pub remaining_minutes: Option<f64>,
    pub session_start: Option<DateTime<Utc>>,
    pub duration_minutes: Option<f64>,
    pub booking_id: Option<Uuid>,
}

impl PcSlot {
    fn available(venue_id: &str, number: u32) -> Self {
        Self {
            venue_id: venue_id.to_string(),
            number,
            status: SlotStatus::Available,
            remaining_minutes: None,
            session_start: None,
            duration_minutes: None,
            booking_id: None,
        }
    }

    pub fn is_occupied(&self) -> bool {
        self.status == SlotStatus::Occupied
    }

    fn clear(&mut self) {
        self.status = SlotStatus::Available;
        self.remaining_minutes = None;
        self.session_start = None;
        self.duration_minutes = None;
        self.booking_id = None;
    }

    /// Recomputes from the original duration so repeated ticks never compound.
    fn recompute(&mut self, now: DateTime<Utc>) {
        if let (Some(start), Some(duration)) = (self.session_start, self.duration_minutes) {
            self.remaining_minutes = Some((duration - elapsed_minutes(start, now)).max(0.0));
        }
    }
}

/// Per-venue grid of PC slots.
pub struct OccupancyTracker {
    venues: HashMap<String, Vec<PcSlot>>,
}

impl OccupancyTracker {
    pub fn new() -> Self {
        Self {
            venues: HashMap::new(),
        }
    }

    /// Creates `total_pcs` available slots unless the venue already has slots.
    /// Returns whether slots were created.
    pub fn initialize(&mut self, venue_id: &str, total_pcs: u32) -> bool {
        if self.venues.contains_key(venue_id) {
            return false;
        }

        let slots = (1..=total_pcs).map(|n| PcSlot::available(venue_id, n)).collect();
        self.venues.insert(venue_id.to_string(), slots);
        tracing::info!("Initialized {} PC slots for venue {}", total_pcs, venue_id);
        true
    }

    pub fn is_initialized(&self, venue_id: &str) -> bool {
        self.venues.contains_key(venue_id)
    }

    /// Marks a slot occupied. Fails fast if someone is already on it.
    pub fn assign(
        &mut self,
        venue_id: &str,
        pc_number: u32,
        duration_minutes: f64,
        booking_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<&PcSlot, OccupancyError> {
        if !duration_minutes.is_finite() || duration_minutes < 0.0 {
            return Err(OccupancyError::InvalidDuration(duration_minutes));
        }

        let slot = self.slot_mut(venue_id, pc_number)?;
        if slot.is_occupied() {
            return Err(OccupancyError::AlreadyOccupied {
                venue_id: venue_id.to_string(),
                pc_number,
            });
        }

        slot.status = SlotStatus::Occupied;
        slot.remaining_minutes = Some(duration_minutes);
        slot.session_start = Some(now);
        slot.duration_minutes = Some(duration_minutes);
        slot.booking_id = booking_id;

        Ok(slot)
    }

    /// Frees a slot. Releasing an available slot is a no-op.
    pub fn release(&mut self, venue_id: &str, pc_number: u32) -> Result<(), OccupancyError> {
        let slot = self.slot_mut(venue_id, pc_number)?;
        slot.clear();
        Ok(())
    }

    /// Refreshes `remaining_minutes` on every occupied slot of the venue.
    /// Never releases a slot, even at zero.
    pub fn tick(&mut self, venue_id: &str, now: DateTime<Utc>) {
        if let Some(slots) = self.venues.get_mut(venue_id) {
            for slot in slots.iter_mut().filter(|s| s.is_occupied()) {
                slot.recompute(now);
            }
        }
    }

    pub fn tick_all(&mut self, now: DateTime<Utc>) {
        for slots in self.venues.values_mut() {
            for slot in slots.iter_mut().filter(|s| s.is_occupied()) {
                slot.recompute(now);
            }
        }
    }

    /// Snapshot of a venue's slots; empty if the venue was never initialized.
    pub fn query(&self, venue_id: &str) -> Vec<PcSlot> {
        self.venues.get(venue_id).cloned().unwrap_or_default()
    }

    pub fn slot(&self, venue_id: &str, pc_number: u32) -> Option<&PcSlot> {
        self.venues
            .get(venue_id)
            .and_then(|slots| slots.get(pc_number.checked_sub(1)? as usize))
    }

    pub fn available_pcs(&self, venue_id: &str) -> Vec<u32> {
        self.venues
            .get(venue_id)
            .map(|slots| slots.iter().filter(|s| !s.is_occupied()).map(|s| s.number).collect())
            .unwrap_or_default()
    }

    /// Fraction of the venue's PCs currently occupied.
    pub fn utilization(&self, venue_id: &str) -> Option<f64> {
        self.venues.get(venue_id).map(|slots| {
            if slots.is_empty() {
                0.0
            } else {
                slots.iter().filter(|s| s.is_occupied()).count() as f64 / slots.len() as f64
            }
        })
    }

    /// Writes a slot record as-is. Used when loading persisted state and when
    /// merging remote snapshots; grows the venue grid if needed.
    pub fn restore(&mut self, slot: PcSlot) {
        if slot.number == 0 {
            return;
        }

        let venue_id = slot.venue_id.clone();
        let slots = self.venues.entry(venue_id.clone()).or_default();
        while (slots.len() as u32) < slot.number {
            let next = slots.len() as u32 + 1;
            slots.push(PcSlot::available(&venue_id, next));
        }
        let idx = (slot.number - 1) as usize;
        slots[idx] = slot;
    }

    pub fn venues(&self) -> impl Iterator<Item = &str> {
        self.venues.keys().map(|k| k.as_str())
    }

    fn slot_mut(&mut self, venue_id: &str, pc_number: u32) -> Result<&mut PcSlot, OccupancyError> {
        let slots = self
            .venues
            .get_mut(venue_id)
            .ok_or_else(|| OccupancyError::NotInitialized(venue_id.to_string()))?;

        pc_number
            .checked_sub(1)
            .and_then(|idx| slots.get_mut(idx as usize))
            .ok_or_else(|| OccupancyError::UnknownSlot {
                venue_id: venue_id.to_string(),
                pc_number,
            })
    }
}

impl Default for OccupancyTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OccupancyError {
    #[error("Venue has no PC slots yet: {0}")]
    NotInitialized(String),

    #[error("PC {pc_number} does not exist at venue {venue_id}")]
    UnknownSlot {
        venue_id: String,
        pc_number: u32,
    },

    #[error("PC {pc_number} at venue {venue_id} is already occupied")]
    AlreadyOccupied {
        venue_id: String,
        pc_number: u32,
    },

    #[error("Invalid session duration: {0} minutes")]
    InvalidDuration(f64),
}

use crate::ledger::{WalletEntry, WalletLedger};
use crate::manager::{BookingManager, BookingPolicy};
use crate::models::{Booking, BookingStatus, LifecycleState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use warnet_catalog::{OccupancyTracker, PcSlot, PricingEngine};

/// Flat records of all three stores, as persisted or as received from the
/// remote source of truth.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WarnetSnapshot {
    pub bookings: Vec<Booking>,
    pub wallets: Vec<WalletEntry>,
    pub slots: Vec<PcSlot>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    pub bookings_inserted: usize,
    pub bookings_updated: usize,
    pub wallets_updated: usize,
    pub slots_updated: usize,
}

/// The three subsystem stores, owned together so every transition sees a
/// consistent view.
pub struct WarnetState {
    pub bookings: BookingManager,
    pub ledger: WalletLedger,
    pub tracker: OccupancyTracker,
}

impl WarnetState {
    pub fn new(policy: BookingPolicy, pricing: PricingEngine) -> Self {
        Self {
            bookings: BookingManager::new(policy, pricing),
            ledger: WalletLedger::new(),
            tracker: OccupancyTracker::new(),
        }
    }

    /// Loads persisted records verbatim.
    pub fn restore(&mut self, snapshot: WarnetSnapshot) {
        for booking in snapshot.bookings {
            self.bookings.restore(booking);
        }
        for wallet in snapshot.wallets {
            self.ledger.restore(wallet);
        }
        for slot in snapshot.slots {
            self.tracker.restore(slot);
        }
    }

    pub fn snapshot(&self) -> WarnetSnapshot {
        let mut slots = Vec::new();
        let mut venues: Vec<&str> = self.tracker.venues().collect();
        venues.sort();
        for venue in venues {
            slots.extend(self.tracker.query(venue));
        }

        WarnetSnapshot {
            bookings: self.bookings.all().cloned().collect(),
            wallets: self.ledger.all().cloned().collect(),
            slots,
        }
    }

    /// Recomputes every countdown from stored timestamps.
    pub fn tick(&mut self, now: DateTime<Utc>) {
        self.ledger.tick_all(now);
        self.tracker.tick_all(now);
        self.bookings.tick(&self.ledger, now);
    }

    /// Merges an authoritative remote snapshot without resetting countdowns
    /// that are running locally.
    ///
    /// Bookings: terminal local records are final; a terminal remote record
    /// ends the local one (freeing its PC and wallet countdown); otherwise the
    /// record further along the lifecycle wins, and two active copies keep the
    /// local session start. Wallets and slots with a local countdown in flight
    /// are kept; idle ones take the remote values. Slots for unknown venues
    /// or PC numbers beyond a venue's grid are ignored.
    pub fn reconcile(&mut self, remote: WarnetSnapshot, now: DateTime<Utc>) -> ReconcileSummary {
        let mut summary = ReconcileSummary::default();

        for incoming in remote.bookings {
            let Some(local) = self.bookings.get(&incoming.id).cloned() else {
                self.bookings.restore(incoming);
                summary.bookings_inserted += 1;
                continue;
            };

            let local_state = local.lifecycle();
            let remote_state = incoming.lifecycle();
            if local_state.is_terminal() || remote_state == local_state {
                continue;
            }

            if remote_state.is_terminal() {
                if local_state == LifecycleState::Active {
                    self.end_local_session(&local, now);
                }
                self.bookings.restore(incoming);
                summary.bookings_updated += 1;
            } else if remote_state > local_state {
                self.bookings.restore(incoming);
                summary.bookings_updated += 1;
            }
        }

        for incoming in remote.wallets {
            let keep_local = self
                .ledger
                .entry(&incoming.venue_id, &incoming.user_id)
                .map(|local| local.is_active || *local == incoming)
                .unwrap_or(false);
            if !keep_local {
                self.ledger.restore(incoming);
                summary.wallets_updated += 1;
            }
        }

        for incoming in remote.slots {
            // Remote slots may only update PCs of an already known grid
            let Some(local) = self.tracker.slot(&incoming.venue_id, incoming.number) else {
                tracing::warn!(
                    "Ignoring remote PC {}#{} outside the known grid",
                    incoming.venue_id, incoming.number
                );
                continue;
            };
            let keep_local = local.is_occupied() || *local == incoming;
            if !keep_local {
                self.tracker.restore(incoming);
                summary.slots_updated += 1;
            }
        }

        if summary != ReconcileSummary::default() {
            tracing::info!("Reconciled remote snapshot: {:?}", summary);
        }
        summary
    }

    fn end_local_session(&mut self, local: &Booking, now: DateTime<Utc>) {
        if local.is_member_booking {
            if let Err(e) = self.ledger.deactivate(&local.venue_id, &local.user_id, now) {
                tracing::warn!("Reconcile could not stop wallet for booking {}: {}", local.id, e);
            }
        }

        let bound = self
            .tracker
            .slot(&local.venue_id, local.pc_number)
            .map(|s| s.booking_id == Some(local.id))
            .unwrap_or(false);
        if bound {
            if let Err(e) = self.tracker.release(&local.venue_id, local.pc_number) {
                tracing::warn!("Reconcile could not release PC for booking {}: {}", local.id, e);
            }
        }
    }

    /// Every Active booking references an occupied slot bound to it.
    pub fn active_bookings_hold_slots(&self) -> bool {
        self.bookings
            .all()
            .filter(|b| b.status == BookingStatus::Active)
            .all(|b| {
                self.tracker
                    .slot(&b.venue_id, b.pc_number)
                    .map(|s| s.is_occupied() && s.booking_id == Some(b.id))
                    .unwrap_or(false)
            })
    }
}

impl Default for WarnetState {
    fn default() -> Self {
        Self::new(BookingPolicy::default(), PricingEngine::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BookingRequest, PaymentStatus, ScheduledAt};
    use chrono::{Duration, NaiveDate, NaiveTime};
    use warnet_catalog::{SlotStatus, Venue};
    use warnet_core::PaymentMethod;

    fn venue() -> Venue {
        Venue {
            id: "v".to_string(),
            name: "V".to_string(),
            total_pcs: 4,
            regular_price_per_hour: 5_000,
            member_price_per_hour: 4_000,
        }
    }

    fn request(member: bool) -> BookingRequest {
        BookingRequest {
            user_id: "u".to_string(),
            venue_id: "v".to_string(),
            pc_number: 1,
            scheduled_at: ScheduledAt {
                date: NaiveDate::from_ymd_opt(2026, 10, 18).unwrap(),
                time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            },
            duration_hours: 2.0,
            is_member_booking: member,
        }
    }

    fn active_member_state(now: DateTime<Utc>) -> (WarnetState, Booking) {
        let mut state = WarnetState::default();
        state.tracker.initialize("v", 4);
        let booking = state.bookings.create(request(true), &venue(), &state.ledger, now).unwrap();
        state.bookings
            .confirm_payment(&booking.id, PaymentMethod::Cash, None, &mut state.ledger, now)
            .unwrap();
        let active = state.bookings
            .start_session(&booking.id, &mut state.ledger, &mut state.tracker, now)
            .unwrap();
        (state, active)
    }

    #[test]
    fn test_reconcile_keeps_running_countdown() {
        let now = Utc::now();
        let (mut state, active) = active_member_state(now);
        state.tick(now + Duration::minutes(10));

        // Stale remote copy from before the session started
        let mut remote = state.snapshot();
        for w in remote.wallets.iter_mut() {
            w.is_active = false;
            w.remaining_millis = 120 * 60_000;
        }
        for b in remote.bookings.iter_mut() {
            b.status = BookingStatus::Pending;
        }

        let summary = state.reconcile(remote, now + Duration::minutes(10));
        assert_eq!(summary.wallets_updated, 0);
        assert_eq!(summary.bookings_updated, 0);
        assert_eq!(state.bookings.get(&active.id).unwrap().status, BookingStatus::Active);
        assert_eq!(state.ledger.entry("v", "u").unwrap().remaining_millis, 110 * 60_000);
        assert!(state.active_bookings_hold_slots());
    }

    #[test]
    fn test_reconcile_remote_completion_frees_resources() {
        let now = Utc::now();
        let (mut state, active) = active_member_state(now);

        let mut finished = active.clone();
        finished.status = BookingStatus::Completed;
        finished.session_end = Some(now + Duration::minutes(5));
        let remote = WarnetSnapshot {
            bookings: vec![finished],
            ..Default::default()
        };

        let summary = state.reconcile(remote, now + Duration::minutes(5));
        assert_eq!(summary.bookings_updated, 1);
        assert_eq!(state.bookings.get(&active.id).unwrap().status, BookingStatus::Completed);
        assert!(!state.tracker.slot("v", 1).unwrap().is_occupied());
        let wallet = state.ledger.entry("v", "u").unwrap();
        assert!(!wallet.is_active);
        assert_eq!(wallet.remaining_millis, 115 * 60_000);
    }

    #[test]
    fn test_reconcile_inserts_unknown_and_advances_lifecycle() {
        let now = Utc::now();
        let mut state = WarnetState::default();
        state.tracker.initialize("v", 4);
        let local = state.bookings.create(request(false), &venue(), &state.ledger, now).unwrap();

        let mut paid_remotely = local.clone();
        paid_remotely.payment_status = PaymentStatus::Paid;
        let mut other = local.clone();
        other.id = uuid::Uuid::new_v4();

        let summary = state.reconcile(
            WarnetSnapshot { bookings: vec![paid_remotely, other], ..Default::default() },
            now,
        );
        assert_eq!(summary.bookings_inserted, 1);
        assert_eq!(summary.bookings_updated, 1);
        assert_eq!(state.bookings.get(&local.id).unwrap().lifecycle(), LifecycleState::Paid);
    }

    #[test]
    fn test_snapshot_restore_round_trip() {
        let now = Utc::now();
        let (state, active) = active_member_state(now);
        let snapshot = state.snapshot();
        assert_eq!(snapshot.slots.len(), 4);

        let mut restored = WarnetState::default();
        restored.restore(snapshot);
        assert_eq!(restored.bookings.get(&active.id).unwrap().status, BookingStatus::Active);
        assert!(restored.ledger.entry("v", "u").unwrap().is_active);
        assert!(restored.active_bookings_hold_slots());
    }

    fn free_slot(venue_id: &str, number: u32) -> PcSlot {
        PcSlot {
            venue_id: venue_id.to_string(),
            number,
            status: SlotStatus::Available,
            remaining_minutes: None,
            session_start: None,
            duration_minutes: None,
            booking_id: None,
        }
    }

    #[test]
    fn test_reconcile_ignores_slots_outside_grid() {
        let now = Utc::now();
        let mut state = WarnetState::default();
        state.tracker.initialize("v", 4);

        let mut free_two = free_slot("v", 2);
        free_two.remaining_minutes = Some(5.0);
        let remote = WarnetSnapshot {
            slots: vec![
                free_slot("v", 4_000_000_000),
                free_slot("v", 5),
                free_slot("elsewhere", 1),
                free_two.clone(),
            ],
            ..Default::default()
        };

        let summary = state.reconcile(remote, now);
        assert_eq!(summary.slots_updated, 1);
        assert_eq!(state.tracker.query("v").len(), 4);
        assert!(state.tracker.slot("v", 5).is_none());
        assert!(!state.tracker.is_initialized("elsewhere"));
        assert_eq!(state.tracker.slot("v", 2), Some(&free_two));
    }
}

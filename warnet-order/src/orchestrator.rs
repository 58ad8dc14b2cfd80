use crate::ledger::WalletEntry;
use crate::manager::{BookingError, BookingPolicy, SessionReport};
use crate::models::{Booking, BookingRequest, LifecycleState};
use crate::repository::SnapshotRepository;
use crate::state::{ReconcileSummary, WarnetSnapshot, WarnetState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;
use warnet_catalog::{OccupancyError, PcSlot, PricingEngine, Venue, VenueCatalog};
use warnet_core::{Clock, CoreError, EventPublisher, PaymentMethod};
use warnet_shared::models::events::{
    BookingCancelledEvent, BookingPaidEvent, PcReleasedEvent, ReassignmentRequiredEvent,
    SessionCompletedEvent, SessionStartedEvent,
};
use warnet_shared::models::DomainEvent;
use warnet_shared::Masked;

/// A customer sat down at a venue PC and the operator logged them in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueLogin {
    pub venue_id: String,
    pub user_id: String,
    pub booking_id: Option<Uuid>,
}

/// Operator logout or a client-side timeout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueLogout {
    pub venue_id: String,
    pub user_id: String,
    pub booking_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickSummary {
    pub sessions_completed: usize,
    pub bookings_expired: usize,
}

/// Records touched by one operation, written back before the lock is released.
#[derive(Default)]
struct Changes {
    bookings: Vec<Booking>,
    wallets: Vec<WalletEntry>,
    slots: Vec<(String, Vec<PcSlot>)>,
}

impl Changes {
    fn booking(&mut self, booking: &Booking) {
        self.bookings.push(booking.clone());
    }

    fn wallet(&mut self, state: &WarnetState, venue_id: &str, user_id: &str) {
        if let Some(entry) = state.ledger.entry(venue_id, user_id) {
            self.wallets.push(entry.clone());
        }
    }

    fn venue_slots(&mut self, state: &WarnetState, venue_id: &str) {
        self.slots.retain(|(v, _)| v != venue_id);
        self.slots.push((venue_id.to_string(), state.tracker.query(venue_id)));
    }

    fn is_empty(&self) -> bool {
        self.bookings.is_empty() && self.wallets.is_empty() && self.slots.is_empty()
    }
}

/// Single entry point for login/logout, payments and the periodic tick.
/// Owns the three stores behind one lock so no operation can advance one
/// subsystem without the others.
pub struct SessionOrchestrator {
    state: Mutex<WarnetState>,
    repo: Arc<dyn SnapshotRepository>,
    catalog: Arc<dyn VenueCatalog>,
    publisher: Arc<dyn EventPublisher>,
    clock: Arc<dyn Clock>,
}

impl SessionOrchestrator {
    pub fn new(
        policy: BookingPolicy,
        pricing: PricingEngine,
        repo: Arc<dyn SnapshotRepository>,
        catalog: Arc<dyn VenueCatalog>,
        publisher: Arc<dyn EventPublisher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            state: Mutex::new(WarnetState::new(policy, pricing)),
            repo,
            catalog,
            publisher,
            clock,
        }
    }

    /// Restores persisted state and makes sure every catalog venue has its slot grid.
    pub async fn load(&self) -> Result<WarnetSnapshot, SessionError> {
        let snapshot = self.repo.load_snapshot().await?;
        let venues = self.catalog.list_venues().await?;

        let mut state = self.state.lock().await;
        state.restore(snapshot);

        let mut changes = Changes::default();
        for venue in venues {
            if state.tracker.initialize(&venue.id, venue.total_pcs) {
                changes.venue_slots(&state, &venue.id);
            }
        }
        self.persist(changes).await?;

        let loaded = state.snapshot();
        tracing::info!(
            "Loaded {} bookings, {} wallets, {} PC slots",
            loaded.bookings.len(),
            loaded.wallets.len(),
            loaded.slots.len()
        );
        Ok(loaded)
    }

    pub async fn create_booking(&self, request: BookingRequest) -> Result<Booking, SessionError> {
        let venue = self.venue(&request.venue_id).await?;
        let now = self.clock.now();

        let mut state = self.state.lock().await;
        let mut changes = Changes::default();
        if state.tracker.initialize(&venue.id, venue.total_pcs) {
            changes.venue_slots(&state, &venue.id);
        }

        let state = &mut *state;
        let booking = state.bookings.create(request, &venue, &state.ledger, now)?;
        changes.booking(&booking);
        self.persist(changes).await?;
        Ok(booking)
    }

    /// Records a settled payment. The payment collaborator has already accepted it.
    pub async fn confirm_payment(
        &self,
        booking_id: Uuid,
        method: PaymentMethod,
        proof_of_payment: Option<Masked<String>>,
    ) -> Result<Booking, SessionError> {
        let now = self.clock.now();
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let booking = state
            .bookings
            .confirm_payment(&booking_id, method, proof_of_payment, &mut state.ledger, now)?;

        let mut changes = Changes::default();
        changes.booking(&booking);
        if booking.wallet_adjustment.is_some() {
            changes.wallet(state, &booking.venue_id, &booking.user_id);
        }
        self.persist(changes).await?;
        drop(guard);

        let event = DomainEvent::BookingPaid(BookingPaidEvent {
            booking_id: booking.id,
            user_id: booking.user_id.clone(),
            venue_id: booking.venue_id.clone(),
            pc_number: booking.pc_number,
            payment_method: method.as_str().to_string(),
            total_price: booking.total_price,
            currency: booking.currency.clone(),
            cancel_window_ends_at: booking.cancel_window_ends_at.map(|t| t.timestamp_millis()).unwrap_or_default(),
            timestamp: now.timestamp_millis(),
        });
        self.publish(vec![event]).await;
        Ok(booking)
    }

    pub async fn cancel(&self, booking_id: Uuid) -> Result<Booking, SessionError> {
        let now = self.clock.now();
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let booking = match state.bookings.cancel(&booking_id, &mut state.ledger, &mut state.tracker, now) {
            Ok(booking) => booking,
            Err(e @ BookingError::WindowExpired { .. }) => {
                tracing::debug!("Cancellation refused: {}", e);
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        };

        let mut changes = Changes::default();
        changes.booking(&booking);
        if booking.wallet_adjustment.is_some() {
            changes.wallet(state, &booking.venue_id, &booking.user_id);
        }
        changes.venue_slots(state, &booking.venue_id);
        self.persist(changes).await?;
        drop(guard);

        let event = DomainEvent::BookingCancelled(BookingCancelledEvent {
            booking_id: booking.id,
            user_id: booking.user_id.clone(),
            venue_id: booking.venue_id.clone(),
            reason: "user".to_string(),
            timestamp: now.timestamp_millis(),
        });
        self.publish(vec![event]).await;
        Ok(booking)
    }

    /// Venue login: occupies the PC, starts the wallet countdown for members
    /// and persists only if both succeeded.
    pub async fn login(&self, login: VenueLogin) -> Result<Booking, SessionError> {
        let venue = self.venue(&login.venue_id).await?;
        let now = self.clock.now();

        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let mut changes = Changes::default();
        if state.tracker.initialize(&venue.id, venue.total_pcs) {
            changes.venue_slots(state, &venue.id);
        }

        let booking_id = match login.booking_id {
            Some(id) => id,
            None => state
                .bookings
                .login_candidate(&login.user_id, &venue.id)
                .ok_or_else(|| SessionError::NoBookingForLogin {
                    user_id: login.user_id.clone(),
                    venue_id: venue.id.clone(),
                })?,
        };

        let existing = state
            .bookings
            .get(&booking_id)
            .ok_or(BookingError::NotFound(booking_id))?;
        if existing.user_id != login.user_id || existing.venue_id != venue.id {
            return Err(BookingError::Validation(format!(
                "booking {} does not belong to {} at {}",
                booking_id, login.user_id, venue.id
            ))
            .into());
        }
        let was_active = existing.lifecycle() == LifecycleState::Active;

        let booking = match state
            .bookings
            .start_session(&booking_id, &mut state.ledger, &mut state.tracker, now)
        {
            Ok(booking) => booking,
            Err(BookingError::Occupancy(OccupancyError::AlreadyOccupied { venue_id, pc_number })) => {
                let available_pcs = state.tracker.available_pcs(&venue_id);
                tracing::warn!(
                    "PC {} at {} is occupied; booking {} needs reassignment ({} PCs free)",
                    pc_number, venue_id, booking_id, available_pcs.len()
                );
                self.persist(changes).await?;
                drop(guard);
                self.publish(vec![DomainEvent::ReassignmentRequired(ReassignmentRequiredEvent {
                    booking_id,
                    venue_id: venue_id.clone(),
                    pc_number,
                    available_pcs,
                    timestamp: now.timestamp_millis(),
                })])
                .await;
                return Err(BookingError::Occupancy(OccupancyError::AlreadyOccupied { venue_id, pc_number }).into());
            }
            Err(e) => return Err(e.into()),
        };

        if was_active {
            return Ok(booking);
        }

        changes.booking(&booking);
        if booking.is_member_booking {
            changes.wallet(state, &booking.venue_id, &booking.user_id);
        }
        changes.venue_slots(state, &booking.venue_id);
        self.persist(changes).await?;
        drop(guard);

        let event = DomainEvent::SessionStarted(SessionStartedEvent {
            booking_id: booking.id,
            user_id: booking.user_id.clone(),
            venue_id: booking.venue_id.clone(),
            pc_number: booking.pc_number,
            duration_minutes: booking.remaining_minutes.unwrap_or_default(),
            is_member_booking: booking.is_member_booking,
            timestamp: now.timestamp_millis(),
        });
        self.publish(vec![event]).await;
        Ok(booking)
    }

    /// Venue logout: stops both countdowns and reports billable time.
    pub async fn logout(&self, logout: VenueLogout) -> Result<SessionReport, SessionError> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;

        let booking_id = match logout.booking_id {
            Some(id) => id,
            None => state
                .bookings
                .active_for(&logout.user_id, &logout.venue_id)
                .ok_or_else(|| SessionError::NoActiveSession {
                    user_id: logout.user_id.clone(),
                    venue_id: logout.venue_id.clone(),
                })?,
        };

        let existing = state
            .bookings
            .get(&booking_id)
            .ok_or(BookingError::NotFound(booking_id))?;
        if existing.user_id != logout.user_id || existing.venue_id != logout.venue_id {
            return Err(BookingError::Validation(format!(
                "booking {} does not belong to {} at {}",
                booking_id, logout.user_id, logout.venue_id
            ))
            .into());
        }

        let (report, changes, events) = complete(&mut state, booking_id, now, "logout")?;
        self.persist(changes).await?;
        drop(state);

        self.publish(events).await;
        Ok(report)
    }

    /// Operator confirmation that a queued booking moves to another PC.
    pub async fn reassign(&self, booking_id: Uuid, pc_number: u32) -> Result<Booking, SessionError> {
        let now = self.clock.now();
        let venue_id = {
            let state = self.state.lock().await;
            state
                .bookings
                .get(&booking_id)
                .map(|b| b.venue_id.clone())
                .ok_or(BookingError::NotFound(booking_id))?
        };
        let venue = self.venue(&venue_id).await?;

        let mut state = self.state.lock().await;
        let booking = state.bookings.reassign(&booking_id, pc_number, &venue, now)?;

        let mut changes = Changes::default();
        changes.booking(&booking);
        self.persist(changes).await?;
        Ok(booking)
    }

    /// Adds banked minutes outside of a booking (operator top-up, goodwill refund).
    pub async fn top_up(&self, user_id: &str, venue_id: &str, amount_minutes: f64) -> Result<WalletEntry, SessionError> {
        let venue = self.venue(venue_id).await?;
        let now = self.clock.now();

        let mut state = self.state.lock().await;
        state
            .ledger
            .credit(&venue.id, user_id, amount_minutes, now)
            .map_err(BookingError::from)?;

        let mut changes = Changes::default();
        changes.wallet(&state, &venue.id, user_id);
        let entry = changes.wallets.first().cloned().ok_or_else(|| {
            CoreError::Unavailable(format!("wallet for {} at {} vanished after credit", user_id, venue.id))
        })?;
        self.persist(changes).await?;
        Ok(entry)
    }

    /// One beat of the periodic tick source: recompute every countdown,
    /// complete sessions whose time ran out, expire unpaid bookings.
    pub async fn tick(&self) -> Result<TickSummary, SessionError> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        state.tick(now);

        let mut summary = TickSummary::default();
        let mut changes = Changes::default();
        let mut events = Vec::new();

        let exhausted = state.bookings.exhausted(&state.ledger, now);
        for booking_id in exhausted {
            match complete(&mut state, booking_id, now, "exhausted") {
                Ok((report, c, e)) => {
                    if report.changed {
                        summary.sessions_completed += 1;
                    }
                    changes.bookings.extend(c.bookings);
                    changes.wallets.extend(c.wallets);
                    for (venue_id, _) in c.slots {
                        changes.venue_slots(&state, &venue_id);
                    }
                    events.extend(e);
                }
                Err(e) => tracing::error!("Failed to complete exhausted booking {}: {}", booking_id, e),
            }
        }

        for booking in state.bookings.expire_unpaid(now) {
            summary.bookings_expired += 1;
            events.push(DomainEvent::BookingExpired(BookingCancelledEvent {
                booking_id: booking.id,
                user_id: booking.user_id.clone(),
                venue_id: booking.venue_id.clone(),
                reason: "expired".to_string(),
                timestamp: now.timestamp_millis(),
            }));
            changes.booking(&booking);
        }

        self.persist(changes).await?;
        drop(state);

        self.publish(events).await;
        Ok(summary)
    }

    /// Merges an authoritative remote snapshot into the local stores.
    pub async fn reconcile(&self, remote: WarnetSnapshot) -> Result<ReconcileSummary, SessionError> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        let summary = state.reconcile(remote, now);

        if summary != ReconcileSummary::default() {
            let merged = state.snapshot();
            let mut changes = Changes {
                bookings: merged.bookings,
                wallets: merged.wallets,
                slots: Vec::new(),
            };
            let mut venues: Vec<String> = merged.slots.iter().map(|s| s.venue_id.clone()).collect();
            venues.dedup();
            for venue_id in venues {
                changes.venue_slots(&state, &venue_id);
            }
            self.persist(changes).await?;
        }
        Ok(summary)
    }

    pub async fn booking(&self, booking_id: Uuid) -> Option<Booking> {
        self.state.lock().await.bookings.get(&booking_id).cloned()
    }

    pub async fn bookings_for_user(&self, user_id: &str) -> Vec<Booking> {
        self.state.lock().await.bookings.bookings_for_user(user_id)
    }

    /// Wallet entries with balances projected to the current instant.
    pub async fn wallets_for_user(&self, user_id: &str) -> Vec<WalletEntry> {
        let now = self.clock.now();
        let state = self.state.lock().await;
        state
            .ledger
            .entries_for_user(user_id)
            .into_iter()
            .map(|mut entry| {
                entry.remaining_millis = entry.projected_millis(now);
                entry
            })
            .collect()
    }

    pub async fn wallet(&self, user_id: &str, venue_id: &str) -> Option<WalletEntry> {
        let now = self.clock.now();
        let state = self.state.lock().await;
        state.ledger.entry(venue_id, user_id).cloned().map(|mut entry| {
            entry.remaining_millis = entry.projected_millis(now);
            entry
        })
    }

    pub async fn pcs(&self, venue_id: &str) -> Vec<PcSlot> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        state.tracker.tick(venue_id, now);
        state.tracker.query(venue_id)
    }

    pub async fn snapshot(&self) -> WarnetSnapshot {
        self.state.lock().await.snapshot()
    }

    async fn venue(&self, venue_id: &str) -> Result<Venue, SessionError> {
        self.catalog
            .get_venue(venue_id)
            .await?
            .ok_or_else(|| SessionError::VenueNotFound(venue_id.to_string()))
    }

    async fn persist(&self, changes: Changes) -> Result<(), SessionError> {
        if changes.is_empty() {
            return Ok(());
        }

        for booking in &changes.bookings {
            self.repo.save_booking(booking).await.map_err(|e| {
                tracing::error!("Failed to persist booking {}: {}", booking.id, e);
                e
            })?;
        }
        for wallet in &changes.wallets {
            self.repo.save_wallet(wallet).await.map_err(|e| {
                tracing::error!("Failed to persist wallet {}@{}: {}", wallet.user_id, wallet.venue_id, e);
                e
            })?;
        }
        for (venue_id, slots) in &changes.slots {
            self.repo.save_slots(venue_id, slots).await.map_err(|e| {
                tracing::error!("Failed to persist PC slots for {}: {}", venue_id, e);
                e
            })?;
        }
        Ok(())
    }

    async fn publish(&self, events: Vec<DomainEvent>) {
        for event in events {
            if let Err(e) = self.publisher.publish(&event).await {
                tracing::error!("Failed to publish {}: {}", event.topic(), e);
            }
        }
    }
}

/// Shared by logout and time exhaustion.
fn complete(
    state: &mut WarnetState,
    booking_id: Uuid,
    now: DateTime<Utc>,
    trigger: &str,
) -> Result<(SessionReport, Changes, Vec<DomainEvent>), SessionError> {
    let report = state
        .bookings
        .complete_session(&booking_id, &mut state.ledger, &mut state.tracker, now)?;

    let mut changes = Changes::default();
    let mut events = Vec::new();
    if !report.changed {
        return Ok((report, changes, events));
    }

    let booking = &report.booking;
    changes.booking(booking);
    if booking.is_member_booking {
        changes.wallet(state, &booking.venue_id, &booking.user_id);
    }
    changes.venue_slots(state, &booking.venue_id);

    events.push(DomainEvent::SessionCompleted(SessionCompletedEvent {
        booking_id: booking.id,
        user_id: booking.user_id.clone(),
        venue_id: booking.venue_id.clone(),
        pc_number: booking.pc_number,
        elapsed_minutes: report.elapsed_minutes,
        billable_minutes: report.billable_minutes,
        wallet_minutes_consumed: report.wallet_minutes_consumed,
        trigger: trigger.to_string(),
        timestamp: now.timestamp_millis(),
    }));
    events.push(DomainEvent::PcReleased(PcReleasedEvent {
        venue_id: booking.venue_id.clone(),
        pc_number: booking.pc_number,
        queued_bookings: state.bookings.queued_for(&booking.venue_id, booking.pc_number),
        timestamp: now.timestamp_millis(),
    }));

    tracing::info!(
        "Booking {} completed ({}): {:.2} billable minutes",
        booking.id,
        trigger,
        report.billable_minutes
    );
    Ok((report, changes, events))
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Booking(#[from] BookingError),

    #[error("Venue not found: {0}")]
    VenueNotFound(String),

    #[error("No paid booking for user {user_id} at venue {venue_id}")]
    NoBookingForLogin {
        user_id: String,
        venue_id: String,
    },

    #[error("No active session for user {user_id} at venue {venue_id}")]
    NoActiveSession {
        user_id: String,
        venue_id: String,
    },

    #[error(transparent)]
    Collaborator(#[from] CoreError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BookingStatus, ScheduledAt};
    use crate::repository::InMemoryRepository;
    use chrono::{Duration, NaiveDate, NaiveTime};
    use warnet_catalog::StaticVenueCatalog;
    use warnet_core::{BroadcastPublisher, ManualClock};

    struct Harness {
        orchestrator: SessionOrchestrator,
        clock: Arc<ManualClock>,
        repo: Arc<InMemoryRepository>,
        events: tokio::sync::broadcast::Receiver<DomainEvent>,
    }

    async fn harness() -> Harness {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let repo = Arc::new(InMemoryRepository::new());
        let publisher = BroadcastPublisher::new(64);
        let events = publisher.subscribe();
        let catalog = StaticVenueCatalog::new(vec![Venue {
            id: "net-1".to_string(),
            name: "Net One".to_string(),
            total_pcs: 6,
            regular_price_per_hour: 10_000,
            member_price_per_hour: 7_000,
        }]);

        let orchestrator = SessionOrchestrator::new(
            BookingPolicy::default(),
            PricingEngine::default(),
            repo.clone(),
            Arc::new(catalog),
            Arc::new(publisher),
            clock.clone(),
        );
        orchestrator.load().await.unwrap();
        Harness { orchestrator, clock, repo, events }
    }

    fn request(user: &str, pc: u32, hours: f64, member: bool) -> BookingRequest {
        BookingRequest {
            user_id: user.to_string(),
            venue_id: "net-1".to_string(),
            pc_number: pc,
            scheduled_at: ScheduledAt {
                date: NaiveDate::from_ymd_opt(2026, 10, 18).unwrap(),
                time: NaiveTime::from_hms_opt(21, 0, 0).unwrap(),
            },
            duration_hours: hours,
            is_member_booking: member,
        }
    }

    fn drain(rx: &mut tokio::sync::broadcast::Receiver<DomainEvent>) -> Vec<&'static str> {
        let mut topics = Vec::new();
        while let Ok(event) = rx.try_recv() {
            topics.push(event.topic());
        }
        topics
    }

    #[tokio::test]
    async fn test_load_initializes_catalog_venues() {
        let h = harness().await;
        assert_eq!(h.orchestrator.pcs("net-1").await.len(), 6);
        assert_eq!(h.repo.list_slots().await.unwrap().len(), 6);
        assert!(h.orchestrator.pcs("unknown").await.is_empty());
    }

    #[tokio::test]
    async fn test_member_login_logout_flow() {
        let mut h = harness().await;
        let booking = h.orchestrator.create_booking(request("ani", 2, 2.0, true)).await.unwrap();
        h.orchestrator
            .confirm_payment(booking.id, PaymentMethod::Qris, None)
            .await
            .unwrap();

        h.clock.advance(Duration::minutes(10));
        let active = h.orchestrator
            .login(VenueLogin { venue_id: "net-1".to_string(), user_id: "ani".to_string(), booking_id: None })
            .await
            .unwrap();
        assert_eq!(active.status, BookingStatus::Active);

        let stored_wallet = h.repo.get_wallet("ani", "net-1").await.unwrap().unwrap();
        assert!(stored_wallet.is_active);
        let pcs = h.orchestrator.pcs("net-1").await;
        assert!(pcs[1].is_occupied());

        h.clock.advance(Duration::minutes(45));
        h.orchestrator.tick().await.unwrap();
        let wallets = h.orchestrator.wallets_for_user("ani").await;
        assert!((wallets[0].remaining_minutes() - 75.0).abs() < 1e-9);

        let report = h.orchestrator
            .logout(VenueLogout { venue_id: "net-1".to_string(), user_id: "ani".to_string(), booking_id: None })
            .await
            .unwrap();
        assert_eq!(report.wallet_minutes_consumed, Some(45.0));
        assert_eq!(report.booking.status, BookingStatus::Completed);
        assert!(!h.orchestrator.pcs("net-1").await[1].is_occupied());

        let stored = h.repo.get_booking(booking.id).await.unwrap().unwrap();
        assert_eq!(stored.status, BookingStatus::Completed);

        assert_eq!(
            drain(&mut h.events),
            vec!["booking.paid", "session.started", "session.completed", "pc.released"]
        );
    }

    #[tokio::test]
    async fn test_login_on_busy_pc_requires_reassignment() {
        let mut h = harness().await;
        let first = h.orchestrator.create_booking(request("budi", 3, 1.0, false)).await.unwrap();
        let queued = h.orchestrator.create_booking(request("citra", 3, 1.0, false)).await.unwrap();
        for id in [first.id, queued.id] {
            h.orchestrator.confirm_payment(id, PaymentMethod::Cash, None).await.unwrap();
        }
        h.orchestrator
            .login(VenueLogin { venue_id: "net-1".to_string(), user_id: "budi".to_string(), booking_id: None })
            .await
            .unwrap();
        drain(&mut h.events);

        let err = h.orchestrator
            .login(VenueLogin { venue_id: "net-1".to_string(), user_id: "citra".to_string(), booking_id: None })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::Booking(BookingError::Occupancy(OccupancyError::AlreadyOccupied { pc_number: 3, .. }))
        ));
        assert_eq!(drain(&mut h.events), vec!["session.reassignment_required"]);
        assert_eq!(h.orchestrator.booking(queued.id).await.unwrap().lifecycle(), LifecycleState::Paid);

        h.orchestrator.reassign(queued.id, 4).await.unwrap();
        let active = h.orchestrator
            .login(VenueLogin { venue_id: "net-1".to_string(), user_id: "citra".to_string(), booking_id: None })
            .await
            .unwrap();
        assert_eq!(active.pc_number, 4);
    }

    #[tokio::test]
    async fn test_release_announces_queued_bookings() {
        let mut h = harness().await;
        let first = h.orchestrator.create_booking(request("budi", 5, 1.0, false)).await.unwrap();
        let queued = h.orchestrator.create_booking(request("citra", 5, 1.0, false)).await.unwrap();
        h.orchestrator.confirm_payment(first.id, PaymentMethod::Cash, None).await.unwrap();
        h.orchestrator
            .login(VenueLogin { venue_id: "net-1".to_string(), user_id: "budi".to_string(), booking_id: Some(first.id) })
            .await
            .unwrap();
        drain(&mut h.events);

        h.orchestrator
            .logout(VenueLogout { venue_id: "net-1".to_string(), user_id: "budi".to_string(), booking_id: None })
            .await
            .unwrap();

        let mut released = None;
        while let Ok(event) = h.events.try_recv() {
            if let DomainEvent::PcReleased(e) = event {
                released = Some(e);
            }
        }
        let released = released.expect("pc.released published");
        assert_eq!(released.pc_number, 5);
        assert_eq!(released.queued_bookings, vec![queued.id]);
        // Nothing was auto-activated
        assert_eq!(h.orchestrator.booking(queued.id).await.unwrap().lifecycle(), LifecycleState::Pending);
    }

    #[tokio::test]
    async fn test_tick_completes_exhausted_regular_session() {
        let mut h = harness().await;
        let booking = h.orchestrator.create_booking(request("dedi", 1, 0.5, false)).await.unwrap();
        h.orchestrator.confirm_payment(booking.id, PaymentMethod::Cash, None).await.unwrap();
        h.orchestrator
            .login(VenueLogin { venue_id: "net-1".to_string(), user_id: "dedi".to_string(), booking_id: None })
            .await
            .unwrap();
        drain(&mut h.events);

        h.clock.advance(Duration::minutes(29));
        assert_eq!(h.orchestrator.tick().await.unwrap(), TickSummary::default());

        h.clock.advance(Duration::minutes(1));
        let summary = h.orchestrator.tick().await.unwrap();
        assert_eq!(summary.sessions_completed, 1);
        assert_eq!(h.orchestrator.booking(booking.id).await.unwrap().status, BookingStatus::Completed);
        assert!(!h.orchestrator.pcs("net-1").await[0].is_occupied());
        assert_eq!(drain(&mut h.events), vec!["session.completed", "pc.released"]);
    }

    #[tokio::test]
    async fn test_tick_expires_unpaid_bookings() {
        let h = harness().await;
        let booking = h.orchestrator.create_booking(request("eka", 1, 1.0, false)).await.unwrap();
        h.clock.advance(Duration::minutes(16));

        let summary = h.orchestrator.tick().await.unwrap();
        assert_eq!(summary.bookings_expired, 1);
        let stored = h.repo.get_booking(booking.id).await.unwrap().unwrap();
        assert_eq!(stored.status, BookingStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_cancel_within_window_through_orchestrator() {
        let h = harness().await;
        let booking = h.orchestrator.create_booking(request("fajar", 2, 2.0, true)).await.unwrap();
        h.orchestrator.confirm_payment(booking.id, PaymentMethod::Cash, None).await.unwrap();
        assert_eq!(h.repo.get_wallet("fajar", "net-1").await.unwrap().unwrap().remaining_minutes(), 120.0);

        h.clock.advance(Duration::seconds(60));
        h.orchestrator.cancel(booking.id).await.unwrap();
        assert_eq!(h.repo.get_wallet("fajar", "net-1").await.unwrap().unwrap().remaining_millis, 0);

        let late = h.orchestrator.create_booking(request("fajar", 2, 2.0, true)).await.unwrap();
        h.orchestrator.confirm_payment(late.id, PaymentMethod::Cash, None).await.unwrap();
        h.clock.advance(Duration::seconds(120));
        let err = h.orchestrator.cancel(late.id).await.unwrap_err();
        assert!(matches!(err, SessionError::Booking(BookingError::WindowExpired { .. })));
    }

    #[tokio::test]
    async fn test_login_without_booking_and_unknown_venue() {
        let h = harness().await;
        let err = h.orchestrator
            .login(VenueLogin { venue_id: "net-1".to_string(), user_id: "ghost".to_string(), booking_id: None })
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::NoBookingForLogin { .. }));

        let err = h.orchestrator
            .login(VenueLogin { venue_id: "nowhere".to_string(), user_id: "ghost".to_string(), booking_id: None })
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::VenueNotFound(_)));

        let err = h.orchestrator
            .logout(VenueLogout { venue_id: "net-1".to_string(), user_id: "ghost".to_string(), booking_id: None })
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::NoActiveSession { .. }));
    }

    #[tokio::test]
    async fn test_top_up_and_reload() {
        let h = harness().await;
        let entry = h.orchestrator.top_up("gita", "net-1", 90.0).await.unwrap();
        assert_eq!(entry.remaining_minutes(), 90.0);

        let reloaded = SessionOrchestrator::new(
            BookingPolicy::default(),
            PricingEngine::default(),
            h.repo.clone(),
            Arc::new(StaticVenueCatalog::default()),
            Arc::new(BroadcastPublisher::new(4)),
            h.clock.clone(),
        );
        let snapshot = reloaded.load().await.unwrap();
        assert_eq!(snapshot.wallets.len(), 1);
        assert_eq!(reloaded.wallets_for_user("gita").await[0].remaining_minutes(), 90.0);
    }

    #[tokio::test]
    async fn test_logout_rejects_foreign_booking() {
        let h = harness().await;
        let booking = h.orchestrator.create_booking(request("ani", 3, 1.0, false)).await.unwrap();
        h.orchestrator
            .confirm_payment(booking.id, PaymentMethod::Cash, None)
            .await
            .unwrap();
        h.orchestrator
            .login(VenueLogin { venue_id: "net-1".to_string(), user_id: "ani".to_string(), booking_id: None })
            .await
            .unwrap();

        for (user, venue) in [("budi", "net-1"), ("ani", "net-2")] {
            let err = h.orchestrator
                .logout(VenueLogout {
                    venue_id: venue.to_string(),
                    user_id: user.to_string(),
                    booking_id: Some(booking.id),
                })
                .await
                .unwrap_err();
            assert!(matches!(err, SessionError::Booking(BookingError::Validation(_))));
        }

        assert_eq!(h.orchestrator.booking(booking.id).await.unwrap().status, BookingStatus::Active);
        assert!(h.orchestrator.pcs("net-1").await[2].is_occupied());

        let report = h.orchestrator
            .logout(VenueLogout {
                venue_id: "net-1".to_string(),
                user_id: "ani".to_string(),
                booking_id: Some(booking.id),
            })
            .await
            .unwrap();
        assert_eq!(report.booking.status, BookingStatus::Completed);
    }
}

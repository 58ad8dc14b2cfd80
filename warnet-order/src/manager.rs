use crate::ledger::{LedgerError, WalletLedger};
use crate::models::{
    Booking, BookingRequest, BookingStatus, LifecycleState, PaymentStatus, WalletAdjustment,
    MAX_DURATION_HOURS,
};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use uuid::Uuid;
use warnet_catalog::{OccupancyError, OccupancyTracker, PricingEngine, Venue};
use warnet_core::clock::elapsed_minutes;
use warnet_core::PaymentMethod;
use warnet_shared::{minutes, Masked};

/// Business rules the state machine enforces.
#[derive(Debug, Clone)]
pub struct BookingPolicy {
    pub cancel_window: Duration,
    pub first_member_min_hours: f64,
    pub max_duration_hours: f64,
    pub unpaid_ttl: Duration,
    pub session_grace: Duration,
    pub currency: String,
}

impl Default for BookingPolicy {
    fn default() -> Self {
        Self {
            cancel_window: Duration::seconds(120),
            first_member_min_hours: 2.0,
            max_duration_hours: MAX_DURATION_HOURS,
            unpaid_ttl: Duration::minutes(15),
            session_grace: Duration::zero(),
            currency: "IDR".to_string(),
        }
    }
}

/// Billing summary produced when a session ends.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SessionReport {
    pub booking: Booking,
    pub elapsed_minutes: f64,
    pub billable_minutes: f64,
    pub wallet_minutes_consumed: Option<f64>,
    /// False when the booking was already completed (duplicate operator action).
    pub changed: bool,
}

/// Drives bookings through Pending → Paid → Active → Completed, with
/// Paid → Cancelled inside the cancellation window.
pub struct BookingManager {
    bookings: HashMap<Uuid, Booking>,
    policy: BookingPolicy,
    pricing: PricingEngine,
}

impl BookingManager {
    pub fn new(policy: BookingPolicy, pricing: PricingEngine) -> Self {
        Self {
            bookings: HashMap::new(),
            policy,
            pricing,
        }
    }

    pub fn policy(&self) -> &BookingPolicy {
        &self.policy
    }

    pub fn get(&self, booking_id: &Uuid) -> Option<&Booking> {
        self.bookings.get(booking_id)
    }

    pub fn all(&self) -> impl Iterator<Item = &Booking> {
        self.bookings.values()
    }

    pub fn bookings_for_user(&self, user_id: &str) -> Vec<Booking> {
        let mut bookings: Vec<Booking> = self
            .bookings
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        bookings.sort_by_key(|b| b.booked_at);
        bookings
    }

    /// Validates and prices a request, storing it as Pending.
    pub fn create(
        &mut self,
        request: BookingRequest,
        venue: &Venue,
        ledger: &WalletLedger,
        now: DateTime<Utc>,
    ) -> Result<Booking, BookingError> {
        if request.user_id.trim().is_empty() {
            return Err(BookingError::Validation("user_id is required".to_string()));
        }
        if request.venue_id != venue.id {
            return Err(BookingError::Validation(format!(
                "booking targets venue {} but catalog entry is {}",
                request.venue_id, venue.id
            )));
        }
        if !request.duration_hours.is_finite() || request.duration_hours <= 0.0 {
            return Err(BookingError::Validation("duration_hours must be positive".to_string()));
        }
        if request.duration_hours > self.policy.max_duration_hours {
            return Err(BookingError::Validation(format!(
                "duration_hours must not exceed {}",
                self.policy.max_duration_hours
            )));
        }
        if !venue.has_pc(request.pc_number) {
            return Err(BookingError::Validation(format!(
                "PC {} does not exist at {} (1..={})",
                request.pc_number, venue.id, venue.total_pcs
            )));
        }

        if request.is_member_booking
            && request.duration_hours < self.policy.first_member_min_hours
            && self.is_first_member_booking(&request.user_id, &venue.id, ledger)
        {
            return Err(BookingError::Validation(format!(
                "first member booking at a venue requires at least {} hours",
                self.policy.first_member_min_hours
            )));
        }

        let total_price = self
            .pricing
            .total_price(venue, request.is_member_booking, request.duration_hours);
        let booking = Booking::new(request, total_price, self.policy.currency.clone(), now);

        tracing::info!(
            "Booking {} created for {} at {} PC {} ({}h, {})",
            booking.id, booking.user_id, booking.venue_id, booking.pc_number, booking.duration_hours, booking.total_price
        );
        self.bookings.insert(booking.id, booking.clone());
        Ok(booking)
    }

    /// Transition: Pending → Paid. Opens the cancellation window and moves
    /// wallet time when the booking buys or spends banked minutes.
    pub fn confirm_payment(
        &mut self,
        booking_id: &Uuid,
        method: PaymentMethod,
        proof_of_payment: Option<Masked<String>>,
        ledger: &mut WalletLedger,
        now: DateTime<Utc>,
    ) -> Result<Booking, BookingError> {
        let cancel_window = self.policy.cancel_window;
        let booking = self.get_booking_mut(booking_id)?;

        if booking.lifecycle() != LifecycleState::Pending {
            return Err(BookingError::InvalidTransition {
                from: booking.lifecycle(),
                to: LifecycleState::Paid,
            });
        }

        let adjustment = if booking.is_member_booking {
            if method.is_member_wallet() {
                return Err(BookingError::Validation(
                    "member time purchases cannot be paid from the member wallet".to_string(),
                ));
            }
            let millis = booking.duration_millis();
            ledger.credit_millis(&booking.venue_id, &booking.user_id, millis, now);
            Some(WalletAdjustment::Credited { millis })
        } else if method.is_member_wallet() {
            let millis = booking.duration_millis();
            ledger.debit_millis(&booking.venue_id, &booking.user_id, millis, now)?;
            Some(WalletAdjustment::Debited { millis })
        } else {
            None
        };

        booking.payment_status = PaymentStatus::Paid;
        booking.payment_method = Some(method);
        booking.proof_of_payment = proof_of_payment;
        booking.cancel_window_ends_at = Some(now + cancel_window);
        booking.wallet_adjustment = adjustment;
        booking.touch(now);

        tracing::info!("Booking {} paid via {}", booking.id, method.as_str());
        Ok(booking.clone())
    }

    /// Transition: Paid → Cancelled, only while `now < cancel_window_ends_at`.
    /// Reverses the payment-time wallet movement and frees any slot bound to the booking.
    pub fn cancel(
        &mut self,
        booking_id: &Uuid,
        ledger: &mut WalletLedger,
        tracker: &mut OccupancyTracker,
        now: DateTime<Utc>,
    ) -> Result<Booking, BookingError> {
        let booking = self.get_booking_mut(booking_id)?;

        if booking.lifecycle() != LifecycleState::Paid {
            return Err(BookingError::InvalidTransition {
                from: booking.lifecycle(),
                to: LifecycleState::Cancelled,
            });
        }

        let ends_at = booking.cancel_window_ends_at.unwrap_or(booking.updated_at);
        if now >= ends_at {
            return Err(BookingError::WindowExpired {
                booking_id: booking.id,
                ends_at,
            });
        }

        match booking.wallet_adjustment {
            Some(WalletAdjustment::Credited { millis }) => {
                ledger.debit_millis(&booking.venue_id, &booking.user_id, millis, now)?;
            }
            Some(WalletAdjustment::Debited { millis }) => {
                ledger.credit_millis(&booking.venue_id, &booking.user_id, millis, now);
            }
            None => {}
        }

        let bound_to_booking = tracker
            .slot(&booking.venue_id, booking.pc_number)
            .map(|slot| slot.booking_id == Some(booking.id))
            .unwrap_or(false);
        if bound_to_booking {
            tracker.release(&booking.venue_id, booking.pc_number)?;
        }

        booking.status = BookingStatus::Cancelled;
        booking.touch(now);

        tracing::info!("Booking {} cancelled by user", booking.id);
        Ok(booking.clone())
    }

    /// Transition: Paid → Active. Occupies the PC first, then starts the
    /// wallet countdown for member bookings; a wallet failure frees the PC again.
    pub fn start_session(
        &mut self,
        booking_id: &Uuid,
        ledger: &mut WalletLedger,
        tracker: &mut OccupancyTracker,
        now: DateTime<Utc>,
    ) -> Result<Booking, BookingError> {
        let booking = self.get_booking_mut(booking_id)?;

        match booking.lifecycle() {
            LifecycleState::Active => return Ok(booking.clone()),
            LifecycleState::Paid => {}
            other => {
                return Err(BookingError::InvalidTransition {
                    from: other,
                    to: LifecycleState::Active,
                })
            }
        }

        let duration_minutes = if booking.is_member_booking {
            let balance = ledger
                .entry(&booking.venue_id, &booking.user_id)
                .map(|e| e.projected_millis(now))
                .unwrap_or(0);
            if balance <= 0 {
                return Err(LedgerError::NoBalance {
                    venue_id: booking.venue_id.clone(),
                    user_id: booking.user_id.clone(),
                }
                .into());
            }
            minutes::to_minutes(balance)
        } else {
            booking.duration_minutes()
        };

        tracker.assign(&booking.venue_id, booking.pc_number, duration_minutes, Some(booking.id), now)?;

        if booking.is_member_booking {
            if let Err(e) = ledger.activate(&booking.venue_id, &booking.user_id, now) {
                tracker.release(&booking.venue_id, booking.pc_number)?;
                tracing::warn!("Wallet activation failed for booking {}, PC released: {}", booking.id, e);
                return Err(e.into());
            }
        }

        booking.status = BookingStatus::Active;
        booking.session_start = Some(now);
        booking.remaining_minutes = Some(duration_minutes);
        booking.touch(now);

        tracing::info!("Session started for booking {} on PC {}", booking.id, booking.pc_number);
        Ok(booking.clone())
    }

    /// Transition: Active → Completed. Stops the wallet countdown and frees the PC.
    pub fn complete_session(
        &mut self,
        booking_id: &Uuid,
        ledger: &mut WalletLedger,
        tracker: &mut OccupancyTracker,
        now: DateTime<Utc>,
    ) -> Result<SessionReport, BookingError> {
        let booking = self.get_booking_mut(booking_id)?;

        match booking.lifecycle() {
            LifecycleState::Completed => {
                let elapsed = match (booking.session_start, booking.session_end) {
                    (Some(start), Some(end)) => elapsed_minutes(start, end).max(0.0),
                    _ => 0.0,
                };
                return Ok(SessionReport {
                    booking: booking.clone(),
                    elapsed_minutes: elapsed,
                    billable_minutes: 0.0,
                    wallet_minutes_consumed: None,
                    changed: false,
                });
            }
            LifecycleState::Active => {}
            other => {
                return Err(BookingError::InvalidTransition {
                    from: other,
                    to: LifecycleState::Completed,
                })
            }
        }

        // Both steps below must succeed together; check the slot before touching the wallet.
        if tracker.slot(&booking.venue_id, booking.pc_number).is_none() {
            return Err(OccupancyError::UnknownSlot {
                venue_id: booking.venue_id.clone(),
                pc_number: booking.pc_number,
            }
            .into());
        }

        let wallet_minutes_consumed = if booking.is_member_booking {
            Some(ledger.deactivate(&booking.venue_id, &booking.user_id, now)?)
        } else {
            None
        };

        let bound_to_booking = tracker
            .slot(&booking.venue_id, booking.pc_number)
            .map(|slot| slot.booking_id == Some(booking.id) || slot.booking_id.is_none())
            .unwrap_or(false);
        if bound_to_booking {
            tracker.release(&booking.venue_id, booking.pc_number)?;
        }

        let start = booking.session_start.unwrap_or(now);
        let elapsed = elapsed_minutes(start, now).max(0.0);
        let billable = match wallet_minutes_consumed {
            Some(consumed) => consumed,
            None => elapsed.min(booking.duration_minutes()),
        };

        booking.status = BookingStatus::Completed;
        booking.session_end = Some(now);
        booking.remaining_minutes = Some(match wallet_minutes_consumed {
            Some(_) => ledger
                .entry(&booking.venue_id, &booking.user_id)
                .map(|e| e.remaining_minutes())
                .unwrap_or(0.0),
            None => (booking.duration_minutes() - elapsed).max(0.0),
        });
        booking.touch(now);

        tracing::info!(
            "Session completed for booking {}: {:.2} min elapsed, {:.2} min billable",
            booking.id, elapsed, billable
        );
        Ok(SessionReport {
            booking: booking.clone(),
            elapsed_minutes: elapsed,
            billable_minutes: billable,
            wallet_minutes_consumed,
            changed: true,
        })
    }

    /// Refreshes the display countdown of every active booking. Never transitions.
    pub fn tick(&mut self, ledger: &WalletLedger, now: DateTime<Utc>) {
        for booking in self.bookings.values_mut().filter(|b| b.status == BookingStatus::Active) {
            let remaining = if booking.is_member_booking {
                ledger
                    .entry(&booking.venue_id, &booking.user_id)
                    .map(|e| minutes::to_minutes(e.projected_millis(now)))
                    .unwrap_or(0.0)
            } else {
                let start = booking.session_start.unwrap_or(now);
                (booking.duration_minutes() - elapsed_minutes(start, now)).max(0.0)
            };
            booking.remaining_minutes = Some(remaining);
        }
    }

    /// Active bookings whose time ran out more than the grace period ago.
    pub fn exhausted(&self, ledger: &WalletLedger, now: DateTime<Utc>) -> Vec<Uuid> {
        let grace = self.policy.session_grace;
        let mut ids: Vec<(DateTime<Utc>, Uuid)> = self
            .bookings
            .values()
            .filter(|b| b.status == BookingStatus::Active)
            .filter_map(|b| {
                let ran_out_at = if b.is_member_booking {
                    let entry = ledger.entry(&b.venue_id, &b.user_id)?;
                    if entry.projected_millis(now) > 0 {
                        return None;
                    }
                    match entry.exhausted_at {
                        Some(at) => at,
                        None => entry
                            .last_updated
                            .checked_add_signed(Duration::try_milliseconds(entry.remaining_millis)?)?,
                    }
                } else {
                    b.session_start?
                        .checked_add_signed(Duration::try_milliseconds(b.duration_millis())?)?
                };
                // Unrepresentable deadlines never fire
                let deadline = ran_out_at.checked_add_signed(grace)?;
                (now >= deadline).then_some((ran_out_at, b.id))
            })
            .collect();
        ids.sort();
        ids.into_iter().map(|(_, id)| id).collect()
    }

    /// Cancels bookings that were never paid within the configured TTL.
    pub fn expire_unpaid(&mut self, now: DateTime<Utc>) -> Vec<Booking> {
        let ttl = self.policy.unpaid_ttl;
        let mut expired = Vec::new();

        for booking in self.bookings.values_mut() {
            if booking.lifecycle() == LifecycleState::Pending && booking.booked_at + ttl <= now {
                booking.status = BookingStatus::Cancelled;
                booking.touch(now);
                tracing::info!("Booking {} expired without payment", booking.id);
                expired.push(booking.clone());
            }
        }
        expired
    }

    /// Moves a not-yet-started booking to another PC. Operator action for
    /// queued bookings whose PC is still busy.
    pub fn reassign(
        &mut self,
        booking_id: &Uuid,
        pc_number: u32,
        venue: &Venue,
        now: DateTime<Utc>,
    ) -> Result<Booking, BookingError> {
        if !venue.has_pc(pc_number) {
            return Err(BookingError::Validation(format!(
                "PC {} does not exist at {}",
                pc_number, venue.id
            )));
        }

        let booking = self.get_booking_mut(booking_id)?;
        if booking.venue_id != venue.id {
            return Err(BookingError::Validation("booking belongs to another venue".to_string()));
        }
        if !matches!(booking.lifecycle(), LifecycleState::Pending | LifecycleState::Paid) {
            return Err(BookingError::Validation(format!(
                "booking {} is {:?} and can no longer be reassigned",
                booking.id,
                booking.lifecycle()
            )));
        }

        tracing::info!("Booking {} reassigned from PC {} to PC {}", booking.id, booking.pc_number, pc_number);
        booking.pc_number = pc_number;
        booking.touch(now);
        Ok(booking.clone())
    }

    /// Bookings waiting on a PC, oldest first.
    pub fn queued_for(&self, venue_id: &str, pc_number: u32) -> Vec<Uuid> {
        let mut queued: Vec<&Booking> = self
            .bookings
            .values()
            .filter(|b| b.venue_id == venue_id && b.pc_number == pc_number)
            .filter(|b| matches!(b.lifecycle(), LifecycleState::Pending | LifecycleState::Paid))
            .collect();
        queued.sort_by_key(|b| b.booked_at);
        queued.into_iter().map(|b| b.id).collect()
    }

    /// The booking a venue login should act on: an already active session,
    /// otherwise the oldest paid booking.
    pub fn login_candidate(&self, user_id: &str, venue_id: &str) -> Option<Uuid> {
        let mine = || {
            self.bookings
                .values()
                .filter(move |b| b.user_id == user_id && b.venue_id == venue_id)
        };

        if let Some(active) = mine().find(|b| b.status == BookingStatus::Active) {
            return Some(active.id);
        }
        mine()
            .filter(|b| b.lifecycle() == LifecycleState::Paid)
            .min_by_key(|b| b.booked_at)
            .map(|b| b.id)
    }

    pub fn active_for(&self, user_id: &str, venue_id: &str) -> Option<Uuid> {
        self.bookings
            .values()
            .find(|b| b.user_id == user_id && b.venue_id == venue_id && b.status == BookingStatus::Active)
            .map(|b| b.id)
    }

    /// Writes a record as-is (persistence load, reconcile).
    pub fn restore(&mut self, booking: Booking) {
        self.bookings.insert(booking.id, booking);
    }

    fn is_first_member_booking(&self, user_id: &str, venue_id: &str, ledger: &WalletLedger) -> bool {
        let has_history = self.bookings.values().any(|b| {
            b.user_id == user_id
                && b.venue_id == venue_id
                && b.is_member_booking
                && b.payment_status == PaymentStatus::Paid
                && b.status != BookingStatus::Cancelled
        });
        let has_balance = ledger
            .entry(venue_id, user_id)
            .map(|e| e.spendable_millis() > 0)
            .unwrap_or(false);
        !has_history && !has_balance
    }

    fn get_booking_mut(&mut self, booking_id: &Uuid) -> Result<&mut Booking, BookingError> {
        self.bookings
            .get_mut(booking_id)
            .ok_or(BookingError::NotFound(*booking_id))
    }
}

impl Default for BookingManager {
    fn default() -> Self {
        Self::new(BookingPolicy::default(), PricingEngine::default())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BookingError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Booking not found: {0}")]
    NotFound(Uuid),

    #[error("Invalid state transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: LifecycleState,
        to: LifecycleState,
    },

    #[error("Cancellation window for booking {booking_id} closed at {ends_at}")]
    WindowExpired {
        booking_id: Uuid,
        ends_at: DateTime<Utc>,
    },

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Occupancy(#[from] OccupancyError),
}

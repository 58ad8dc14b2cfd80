//! Remote record shapes as the backend sends them.
//!
//! Field names vary between backend versions (`pcNumber`, `pc_number`, `pc`;
//! `remaining_time`, `remainingMinutes` ...). They are accepted here through
//! serde aliases and converted once into the canonical entities, so nothing
//! past this module sees more than one spelling.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use uuid::Uuid;
use warnet_catalog::{PcSlot, SlotStatus};
use warnet_core::{CoreError, CoreResult, PaymentMethod};
use warnet_order::models::{WalletAdjustment, MAX_DURATION_HOURS};
use warnet_order::{Booking, BookingStatus, PaymentStatus, ScheduledAt, WalletEntry, WarnetSnapshot};
use warnet_shared::{minutes, Masked};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteSnapshot {
    #[serde(default)]
    pub bookings: Vec<RemoteBooking>,
    #[serde(default, alias = "wallet", alias = "walletEntries")]
    pub wallets: Vec<RemoteWallet>,
    #[serde(default, alias = "pcs", alias = "pcSlots")]
    pub slots: Vec<RemotePc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteBooking {
    #[serde(alias = "bookingId", alias = "_id")]
    pub id: Uuid,
    #[serde(alias = "userId")]
    pub user_id: String,
    #[serde(alias = "venueId", alias = "warnetId", alias = "warnet_id")]
    pub venue_id: String,
    #[serde(alias = "pcNumber", alias = "pc")]
    pub pc_number: u32,
    #[serde(alias = "scheduledDate")]
    pub date: NaiveDate,
    #[serde(alias = "scheduledTime")]
    pub time: String,
    #[serde(alias = "durationHours", alias = "duration")]
    pub duration_hours: f64,
    pub status: String,
    #[serde(alias = "paymentStatus")]
    pub payment_status: String,
    #[serde(default, alias = "paymentMethod")]
    pub payment_method: Option<String>,
    #[serde(default, alias = "proofOfPayment")]
    pub proof_of_payment: Option<String>,
    #[serde(alias = "bookedAt", alias = "createdAt")]
    pub booked_at: DateTime<Utc>,
    #[serde(default, alias = "cancelWindowEndsAt", alias = "cancellationDeadline")]
    pub cancel_window_ends_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "sessionStart", alias = "startTime")]
    pub session_start: Option<DateTime<Utc>>,
    #[serde(default, alias = "sessionEnd", alias = "endTime")]
    pub session_end: Option<DateTime<Utc>>,
    #[serde(default, alias = "remainingMinutes", alias = "remaining_time", alias = "remainingTime")]
    pub remaining_minutes: Option<f64>,
    #[serde(default, alias = "isMemberBooking", alias = "isMember")]
    pub is_member_booking: bool,
    #[serde(default, alias = "totalPrice", alias = "price")]
    pub total_price: f64,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default, alias = "updatedAt")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteWallet {
    #[serde(alias = "userId")]
    pub user_id: String,
    #[serde(alias = "venueId", alias = "warnetId", alias = "warnet_id")]
    pub venue_id: String,
    #[serde(
        rename = "remaining_minutes",
        alias = "remainingMinutes",
        alias = "remaining_time",
        alias = "remainingTime",
        with = "minutes"
    )]
    pub remaining_millis: i64,
    #[serde(default, alias = "isActive")]
    pub is_active: bool,
    #[serde(alias = "lastUpdated", alias = "updatedAt")]
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemotePc {
    #[serde(alias = "venueId", alias = "warnetId", alias = "warnet_id")]
    pub venue_id: String,
    #[serde(alias = "pcNumber", alias = "pc_number", alias = "pc")]
    pub number: u32,
    pub status: String,
    #[serde(default, alias = "remainingMinutes", alias = "remaining_time", alias = "remainingTime")]
    pub remaining_minutes: Option<f64>,
    #[serde(default, alias = "sessionStart", alias = "startTime")]
    pub session_start: Option<DateTime<Utc>>,
    #[serde(default, alias = "durationMinutes", alias = "duration")]
    pub duration_minutes: Option<f64>,
    #[serde(default, alias = "bookingId")]
    pub booking_id: Option<Uuid>,
}

/// Lowercase, trimmed, `-` and spaces folded into `_`.
fn normalize(raw: &str) -> String {
    raw.trim().to_lowercase().replace(['-', ' '], "_")
}

fn parse_time(raw: &str) -> CoreResult<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw.trim(), "%H:%M"))
        .map_err(|e| CoreError::ValidationError(format!("invalid time {:?}: {}", raw, e)))
}

fn parse_payment_method(raw: &str) -> CoreResult<PaymentMethod> {
    let method = match normalize(raw).as_str() {
        "cash" => PaymentMethod::Cash,
        "bank_transfer" | "transfer" | "bank" => PaymentMethod::BankTransfer,
        "qris" => PaymentMethod::Qris,
        "e_wallet" | "ewallet" => PaymentMethod::EWallet,
        "member_wallet" | "wallet" | "member" => PaymentMethod::MemberWallet,
        other => return Err(CoreError::ValidationError(format!("unknown payment method {:?}", other))),
    };
    Ok(method)
}

impl TryFrom<RemoteBooking> for Booking {
    type Error = CoreError;

    fn try_from(remote: RemoteBooking) -> CoreResult<Self> {
        let status = match normalize(&remote.status).as_str() {
            "pending" | "booked" => BookingStatus::Pending,
            "active" | "in_progress" | "ongoing" => BookingStatus::Active,
            "completed" | "done" | "finished" => BookingStatus::Completed,
            "cancelled" | "canceled" | "expired" => BookingStatus::Cancelled,
            other => return Err(CoreError::ValidationError(format!("unknown booking status {:?}", other))),
        };
        let payment_status = match normalize(&remote.payment_status).as_str() {
            "paid" | "settled" | "confirmed" => PaymentStatus::Paid,
            "pending" | "unpaid" => PaymentStatus::Pending,
            other => return Err(CoreError::ValidationError(format!("unknown payment status {:?}", other))),
        };
        if !remote.duration_hours.is_finite()
            || remote.duration_hours <= 0.0
            || remote.duration_hours > MAX_DURATION_HOURS
        {
            return Err(CoreError::ValidationError(format!(
                "booking {} has invalid duration {}",
                remote.id, remote.duration_hours
            )));
        }

        let payment_method = remote.payment_method.as_deref().map(parse_payment_method).transpose()?;
        let duration_millis = minutes::to_millis(remote.duration_hours * 60.0);

        // Same wallet movement confirm_payment would have made locally
        let wallet_adjustment = match (payment_status, remote.is_member_booking, payment_method) {
            (PaymentStatus::Paid, true, _) => Some(WalletAdjustment::Credited { millis: duration_millis }),
            (PaymentStatus::Paid, false, Some(PaymentMethod::MemberWallet)) => {
                Some(WalletAdjustment::Debited { millis: duration_millis })
            }
            _ => None,
        };

        Ok(Booking {
            id: remote.id,
            user_id: remote.user_id,
            venue_id: remote.venue_id,
            pc_number: remote.pc_number,
            scheduled_at: ScheduledAt {
                date: remote.date,
                time: parse_time(&remote.time)?,
            },
            duration_hours: remote.duration_hours,
            status,
            payment_status,
            payment_method,
            proof_of_payment: remote.proof_of_payment.map(Masked::new),
            booked_at: remote.booked_at,
            cancel_window_ends_at: remote.cancel_window_ends_at,
            session_start: remote.session_start,
            session_end: remote.session_end,
            remaining_minutes: remote.remaining_minutes,
            is_member_booking: remote.is_member_booking,
            total_price: remote.total_price.round() as i64,
            currency: remote.currency.unwrap_or_else(|| "IDR".to_string()),
            wallet_adjustment,
            updated_at: remote.updated_at.unwrap_or(remote.booked_at),
        })
    }
}

impl From<RemoteWallet> for WalletEntry {
    fn from(remote: RemoteWallet) -> Self {
        WalletEntry {
            user_id: remote.user_id,
            venue_id: remote.venue_id,
            remaining_millis: remote.remaining_millis,
            is_active: remote.is_active,
            last_updated: remote.last_updated,
            queued_credit_millis: 0,
            active_since: remote.is_active.then_some(remote.last_updated),
            consumed_millis: 0,
            exhausted_at: None,
        }
    }
}

impl TryFrom<RemotePc> for PcSlot {
    type Error = CoreError;

    fn try_from(remote: RemotePc) -> CoreResult<Self> {
        if remote.number == 0 {
            return Err(CoreError::ValidationError(format!("PC number 0 at {}", remote.venue_id)));
        }
        let status = match normalize(&remote.status).as_str() {
            "available" | "free" | "idle" => SlotStatus::Available,
            "occupied" | "in_use" | "busy" => SlotStatus::Occupied,
            other => return Err(CoreError::ValidationError(format!("unknown PC status {:?}", other))),
        };

        let occupied = status == SlotStatus::Occupied;
        Ok(PcSlot {
            venue_id: remote.venue_id,
            number: remote.number,
            status,
            remaining_minutes: remote.remaining_minutes.filter(|_| occupied),
            session_start: remote.session_start.filter(|_| occupied),
            duration_minutes: remote.duration_minutes.filter(|_| occupied),
            booking_id: remote.booking_id.filter(|_| occupied),
        })
    }
}

impl RemoteSnapshot {
    /// Converts every record; malformed ones are logged and skipped.
    pub fn into_snapshot(self) -> WarnetSnapshot {
        let bookings = self
            .bookings
            .into_iter()
            .filter_map(|b| {
                let id = b.id;
                Booking::try_from(b)
                    .map_err(|e| tracing::warn!("Skipping remote booking {}: {}", id, e))
                    .ok()
            })
            .collect();

        let slots = self
            .slots
            .into_iter()
            .filter_map(|p| {
                let label = format!("{}#{}", p.venue_id, p.number);
                PcSlot::try_from(p)
                    .map_err(|e| tracing::warn!("Skipping remote PC {}: {}", label, e))
                    .ok()
            })
            .collect();

        WarnetSnapshot {
            bookings,
            wallets: self.wallets.into_iter().map(WalletEntry::from).collect(),
            slots,
        }
    }
}

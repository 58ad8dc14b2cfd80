use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use warnet_core::PaymentMethod;
use warnet_shared::{minutes, Masked};

/// Longest single booking accepted, local or remote.
pub const MAX_DURATION_HOURS: f64 = 24.0;

/// Booking status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Active,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Paid,
}

/// The combined view of `status` and `payment_status` the state machine reasons about.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleState {
    Pending,
    Paid,
    Active,
    Completed,
    Cancelled,
}

impl LifecycleState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecycleState::Completed | LifecycleState::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduledAt {
    pub date: NaiveDate,
    pub time: NaiveTime,
}

/// Wallet movement performed at payment time, kept so cancellation can reverse it exactly.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WalletAdjustment {
    Credited {
        #[serde(rename = "minutes", with = "minutes")]
        millis: i64,
    },
    Debited {
        #[serde(rename = "minutes", with = "minutes")]
        millis: i64,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRequest {
    pub user_id: String,
    pub venue_id: String,
    pub pc_number: u32,
    pub scheduled_at: ScheduledAt,
    pub duration_hours: f64,
    #[serde(default)]
    pub is_member_booking: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub user_id: String,
    pub venue_id: String,
    pub pc_number: u32,
    pub scheduled_at: ScheduledAt,
    pub duration_hours: f64,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: Option<PaymentMethod>,
    pub proof_of_payment: Option<Masked<String>>,
    pub booked_at: DateTime<Utc>,
    pub cancel_window_ends_at: Option<DateTime<Utc>>,
    pub session_start: Option<DateTime<Utc>>,
    pub session_end: Option<DateTime<Utc>>,
    /// Display countdown while active; refreshed by tick.
    pub remaining_minutes: Option<f64>,
    pub is_member_booking: bool,
    pub total_price: i64,
    pub currency: String,
    pub wallet_adjustment: Option<WalletAdjustment>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn new(request: BookingRequest, total_price: i64, currency: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: request.user_id,
            venue_id: request.venue_id,
            pc_number: request.pc_number,
            scheduled_at: request.scheduled_at,
            duration_hours: request.duration_hours,
            status: BookingStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_method: None,
            proof_of_payment: None,
            booked_at: now,
            cancel_window_ends_at: None,
            session_start: None,
            session_end: None,
            remaining_minutes: None,
            is_member_booking: request.is_member_booking,
            total_price,
            currency,
            wallet_adjustment: None,
            updated_at: now,
        }
    }

    pub fn lifecycle(&self) -> LifecycleState {
        match (self.status, self.payment_status) {
            (BookingStatus::Pending, PaymentStatus::Pending) => LifecycleState::Pending,
            (BookingStatus::Pending, PaymentStatus::Paid) => LifecycleState::Paid,
            (BookingStatus::Active, _) => LifecycleState::Active,
            (BookingStatus::Completed, _) => LifecycleState::Completed,
            (BookingStatus::Cancelled, _) => LifecycleState::Cancelled,
        }
    }

    pub fn duration_minutes(&self) -> f64 {
        self.duration_hours * 60.0
    }

    pub fn duration_millis(&self) -> i64 {
        minutes::to_millis(self.duration_minutes())
    }

    pub fn is_terminal(&self) -> bool {
        self.lifecycle().is_terminal()
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> BookingRequest {
        BookingRequest {
            user_id: "user-1".to_string(),
            venue_id: "venue-1".to_string(),
            pc_number: 3,
            scheduled_at: ScheduledAt {
                date: NaiveDate::from_ymd_opt(2026, 10, 18).unwrap(),
                time: NaiveTime::from_hms_opt(19, 30, 0).unwrap(),
            },
            duration_hours: 1.5,
            is_member_booking: false,
        }
    }

    #[test]
    fn test_lifecycle_mapping() {
        let mut booking = Booking::new(request(), 12_000, "IDR".to_string(), Utc::now());
        assert_eq!(booking.lifecycle(), LifecycleState::Pending);

        booking.payment_status = PaymentStatus::Paid;
        assert_eq!(booking.lifecycle(), LifecycleState::Paid);

        booking.status = BookingStatus::Active;
        assert_eq!(booking.lifecycle(), LifecycleState::Active);

        booking.status = BookingStatus::Cancelled;
        assert!(booking.is_terminal());
        assert_eq!(booking.duration_millis(), 5_400_000);
    }

    #[test]
    fn test_request_deserialization() {
        let json = r#"
            {
                "user_id": "u",
                "venue_id": "v",
                "pc_number": 2,
                "scheduled_at": { "date": "2026-10-18", "time": "20:00:00" },
                "duration_hours": 2
            }
        "#;
        let req: BookingRequest = serde_json::from_str(json).expect("Failed to deserialize");
        assert!(!req.is_member_booking);
        assert_eq!(req.scheduled_at.time, NaiveTime::from_hms_opt(20, 0, 0).unwrap());
    }

    #[test]
    fn test_wallet_adjustment_wire_shape() {
        let adj = WalletAdjustment::Credited { millis: 7_200_000 };
        let json = serde_json::to_value(adj).unwrap();
        assert_eq!(json["kind"], "credited");
        assert_eq!(json["minutes"], 120.0);
    }
}

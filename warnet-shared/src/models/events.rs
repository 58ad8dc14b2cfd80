use uuid::Uuid;

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct BookingPaidEvent {
    pub booking_id: Uuid,
    pub user_id: String,
    pub venue_id: String,
    pub pc_number: u32,
    pub payment_method: String,
    pub total_price: i64,
    pub currency: String,
    pub cancel_window_ends_at: i64,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct BookingCancelledEvent {
    pub booking_id: Uuid,
    pub user_id: String,
    pub venue_id: String,
    pub reason: String, // "user" or "expired"
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct SessionStartedEvent {
    pub booking_id: Uuid,
    pub user_id: String,
    pub venue_id: String,
    pub pc_number: u32,
    pub duration_minutes: f64,
    pub is_member_booking: bool,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct SessionCompletedEvent {
    pub booking_id: Uuid,
    pub user_id: String,
    pub venue_id: String,
    pub pc_number: u32,
    pub elapsed_minutes: f64,
    pub billable_minutes: f64,
    pub wallet_minutes_consumed: Option<f64>,
    pub trigger: String, // "logout" or "exhausted"
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct ReassignmentRequiredEvent {
    pub booking_id: Uuid,
    pub venue_id: String,
    pub pc_number: u32,
    pub available_pcs: Vec<u32>,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct PcReleasedEvent {
    pub venue_id: String,
    pub pc_number: u32,
    pub queued_bookings: Vec<Uuid>,
    pub timestamp: i64,
}

/// Everything the presentation layer can subscribe to.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum DomainEvent {
    #[serde(rename = "booking.paid")]
    BookingPaid(BookingPaidEvent),
    #[serde(rename = "booking.cancelled")]
    BookingCancelled(BookingCancelledEvent),
    #[serde(rename = "booking.expired")]
    BookingExpired(BookingCancelledEvent),
    #[serde(rename = "session.started")]
    SessionStarted(SessionStartedEvent),
    #[serde(rename = "session.completed")]
    SessionCompleted(SessionCompletedEvent),
    #[serde(rename = "session.reassignment_required")]
    ReassignmentRequired(ReassignmentRequiredEvent),
    #[serde(rename = "pc.released")]
    PcReleased(PcReleasedEvent),
}

impl DomainEvent {
    pub fn topic(&self) -> &'static str {
        match self {
            DomainEvent::BookingPaid(_) => "booking.paid",
            DomainEvent::BookingCancelled(_) => "booking.cancelled",
            DomainEvent::BookingExpired(_) => "booking.expired",
            DomainEvent::SessionStarted(_) => "session.started",
            DomainEvent::SessionCompleted(_) => "session.completed",
            DomainEvent::ReassignmentRequired(_) => "session.reassignment_required",
            DomainEvent::PcReleased(_) => "pc.released",
        }
    }

    /// Venue the event belongs to, used for per-venue stream filtering.
    pub fn venue_id(&self) -> &str {
        match self {
            DomainEvent::BookingPaid(e) => &e.venue_id,
            DomainEvent::BookingCancelled(e) | DomainEvent::BookingExpired(e) => &e.venue_id,
            DomainEvent::SessionStarted(e) => &e.venue_id,
            DomainEvent::SessionCompleted(e) => &e.venue_id,
            DomainEvent::ReassignmentRequired(e) => &e.venue_id,
            DomainEvent::PcReleased(e) => &e.venue_id,
        }
    }
}

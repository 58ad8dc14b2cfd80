pub mod models;
pub mod ledger;
pub mod manager;
pub mod state;
pub mod repository;
pub mod orchestrator;

pub use models::{Booking, BookingRequest, BookingStatus, LifecycleState, PaymentStatus, ScheduledAt};
pub use ledger::{LedgerError, WalletEntry, WalletLedger};
pub use manager::{BookingError, BookingManager, BookingPolicy, SessionReport};
pub use state::{ReconcileSummary, WarnetSnapshot, WarnetState};
pub use repository::{InMemoryRepository, RemoteSource, SnapshotRepository};
pub use orchestrator::{SessionError, SessionOrchestrator, TickSummary, VenueLogin, VenueLogout};

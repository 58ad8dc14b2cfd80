pub mod venue;
pub mod pricing;
pub mod occupancy;

pub use venue::{StaticVenueCatalog, Venue, VenueCatalog};
pub use pricing::{PricingConfig, PricingEngine};
pub use occupancy::{OccupancyError, OccupancyTracker, PcSlot, SlotStatus};

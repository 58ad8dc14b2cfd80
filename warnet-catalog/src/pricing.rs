use serde::{Deserialize, Serialize};
use crate::venue::Venue;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Totals are rounded to a multiple of this unit (e.g. 100 for rupiah coins).
    pub rounding_unit: i64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self { rounding_unit: 1 }
    }
}

/// Hourly pricing, split by membership.
pub struct PricingEngine {
    config: PricingConfig,
}

impl PricingEngine {
    pub fn new(config: PricingConfig) -> Self {
        Self { config }
    }

    pub fn price_per_hour(&self, venue: &Venue, is_member_booking: bool) -> i64 {
        if is_member_booking {
            venue.member_price_per_hour
        } else {
            venue.regular_price_per_hour
        }
    }

    /// `price_per_hour * duration_hours`, rounded half-up to the configured unit.
    pub fn total_price(&self, venue: &Venue, is_member_booking: bool, duration_hours: f64) -> i64 {
        // The float-to-int cast saturates, so absurd durations clamp instead of wrapping
        let raw = (self.price_per_hour(venue, is_member_booking) as f64 * duration_hours).round() as i64;

        let unit = self.config.rounding_unit.max(1);
        let remainder = raw % unit;
        if remainder >= unit - remainder {
            raw.saturating_add(unit - remainder)
        } else {
            raw - remainder
        }
    }
}

impl Default for PricingEngine {
    fn default() -> Self {
        Self::new(PricingConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn venue() -> Venue {
        Venue {
            id: "v1".to_string(),
            name: "Venue".to_string(),
            total_pcs: 5,
            regular_price_per_hour: 7_500,
            member_price_per_hour: 5_000,
        }
    }

    #[test]
    fn test_member_and_regular_rates() {
        let engine = PricingEngine::default();
        assert_eq!(engine.total_price(&venue(), true, 2.0), 10_000);
        assert_eq!(engine.total_price(&venue(), false, 1.5), 11_250);
    }

    #[test]
    fn test_rounding_unit() {
        let engine = PricingEngine::new(PricingConfig { rounding_unit: 1_000 });
        // 7_500 * 1.5 = 11_250 -> 11_000
        assert_eq!(engine.total_price(&venue(), false, 1.5), 11_000);
        // 5_000 * 0.75 = 3_750 -> 4_000
        assert_eq!(engine.total_price(&venue(), true, 0.75), 4_000);
    }

    #[test]
    fn test_huge_durations_clamp() {
        let engine = PricingEngine::new(PricingConfig { rounding_unit: 1_000 });
        assert_eq!(engine.total_price(&venue(), false, 1e300), i64::MAX);
        assert_eq!(engine.total_price(&venue(), false, f64::INFINITY), i64::MAX);

        let coarse = PricingEngine::new(PricingConfig { rounding_unit: i64::MAX });
        assert_eq!(coarse.total_price(&venue(), true, 2.0), 0);
    }
}

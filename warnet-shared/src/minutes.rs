//! Serde helper for balances kept as integer milliseconds but exchanged as
//! fractional minutes in flat JSON records.

use serde::de::Error;
use serde::{Deserialize, Deserializer, Serializer};

pub const MILLIS_PER_MINUTE: i64 = 60_000;

pub fn to_minutes(millis: i64) -> f64 {
    millis as f64 / MILLIS_PER_MINUTE as f64
}

/// Rounds to the nearest millisecond.
pub fn to_millis(minutes: f64) -> i64 {
    (minutes * MILLIS_PER_MINUTE as f64).round() as i64
}

pub fn serialize<S>(value: &i64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_f64(to_minutes(*value))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum MinutesInput {
        String(String),
        Number(f64),
    }

    let minutes = match MinutesInput::deserialize(deserializer)? {
        MinutesInput::String(raw) => raw.trim().parse::<f64>().map_err(D::Error::custom)?,
        MinutesInput::Number(value) => value,
    };

    if !minutes.is_finite() || minutes < 0.0 {
        return Err(D::Error::custom(format!("invalid minute balance: {}", minutes)));
    }
    Ok(to_millis(minutes))
}

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use warnet_shared::minutes;

/// Banked play time of one user at one venue.
///
/// Balances are kept in whole milliseconds so that repeated ticks and
/// credit/debit round-trips never drift; they travel as fractional minutes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WalletEntry {
    pub user_id: String,
    pub venue_id: String,
    #[serde(rename = "remaining_minutes", with = "minutes")]
    pub remaining_millis: i64,
    pub is_active: bool,
    pub last_updated: DateTime<Utc>,
    /// Credits received while the countdown was running, applied on deactivation.
    #[serde(rename = "queued_credit_minutes", with = "minutes", default)]
    pub queued_credit_millis: i64,
    #[serde(default)]
    pub active_since: Option<DateTime<Utc>>,
    #[serde(rename = "consumed_minutes", with = "minutes", default)]
    pub consumed_millis: i64,
    /// Moment the balance hit zero during the current activation.
    #[serde(default)]
    pub exhausted_at: Option<DateTime<Utc>>,
}

impl WalletEntry {
    fn empty(user_id: &str, venue_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            venue_id: venue_id.to_string(),
            remaining_millis: 0,
            is_active: false,
            last_updated: now,
            queued_credit_millis: 0,
            active_since: None,
            consumed_millis: 0,
            exhausted_at: None,
        }
    }

    pub fn remaining_minutes(&self) -> f64 {
        minutes::to_minutes(self.remaining_millis)
    }

    /// Balance available to debits: settled balance plus queued credits.
    pub fn spendable_millis(&self) -> i64 {
        self.remaining_millis.saturating_add(self.queued_credit_millis)
    }

    /// Balance as of `now` without mutating the entry.
    pub fn projected_millis(&self, now: DateTime<Utc>) -> i64 {
        if !self.is_active {
            return self.remaining_millis;
        }
        let elapsed = (now - self.last_updated).num_milliseconds().max(0);
        (self.remaining_millis - elapsed).max(0)
    }

    fn settle(&mut self, now: DateTime<Utc>) {
        if !self.is_active || now <= self.last_updated {
            return;
        }

        let elapsed = (now - self.last_updated).num_milliseconds();
        let deducted = elapsed.min(self.remaining_millis);
        if deducted < elapsed && self.exhausted_at.is_none() {
            self.exhausted_at = Duration::try_milliseconds(self.remaining_millis)
                .and_then(|left| self.last_updated.checked_add_signed(left));
        }

        self.remaining_millis -= deducted;
        self.consumed_millis = self.consumed_millis.saturating_add(deducted);
        self.last_updated = now;
    }
}

type WalletKey = (String, String);

/// Per-user, per-venue minute balances.
pub struct WalletLedger {
    entries: HashMap<WalletKey, WalletEntry>,
}

impl WalletLedger {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn entry(&self, venue_id: &str, user_id: &str) -> Option<&WalletEntry> {
        self.entries.get(&key(venue_id, user_id))
    }

    pub fn entries_for_user(&self, user_id: &str) -> Vec<WalletEntry> {
        let mut entries: Vec<WalletEntry> = self
            .entries
            .values()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.venue_id.cmp(&b.venue_id));
        entries
    }

    pub fn all(&self) -> impl Iterator<Item = &WalletEntry> {
        self.entries.values()
    }

    /// Starts the countdown. Fails if there is nothing to count down.
    /// Activating an already active entry only settles it.
    pub fn activate(&mut self, venue_id: &str, user_id: &str, now: DateTime<Utc>) -> Result<(), LedgerError> {
        let entry = self
            .entries
            .get_mut(&key(venue_id, user_id))
            .ok_or_else(|| LedgerError::NoBalance {
                venue_id: venue_id.to_string(),
                user_id: user_id.to_string(),
            })?;

        if entry.is_active {
            entry.settle(now);
            return Ok(());
        }

        if entry.remaining_millis <= 0 {
            return Err(LedgerError::NoBalance {
                venue_id: venue_id.to_string(),
                user_id: user_id.to_string(),
            });
        }

        entry.is_active = true;
        entry.last_updated = now;
        entry.active_since = Some(now);
        entry.consumed_millis = 0;
        entry.exhausted_at = None;
        tracing::info!("Wallet countdown started for {} at {} ({:.2} min)", user_id, venue_id, entry.remaining_minutes());
        Ok(())
    }

    /// Stops the countdown, applies queued credits and returns the minutes
    /// consumed since activation. Deactivating an idle entry returns 0.
    pub fn deactivate(&mut self, venue_id: &str, user_id: &str, now: DateTime<Utc>) -> Result<f64, LedgerError> {
        let entry = self
            .entries
            .get_mut(&key(venue_id, user_id))
            .ok_or_else(|| LedgerError::NotFound {
                venue_id: venue_id.to_string(),
                user_id: user_id.to_string(),
            })?;

        if !entry.is_active {
            return Ok(0.0);
        }

        entry.settle(now);
        let consumed = minutes::to_minutes(entry.consumed_millis);

        entry.is_active = false;
        entry.remaining_millis = entry.remaining_millis.saturating_add(entry.queued_credit_millis);
        entry.queued_credit_millis = 0;
        entry.active_since = None;
        entry.consumed_millis = 0;
        entry.exhausted_at = None;
        entry.last_updated = now.max(entry.last_updated);

        tracing::info!("Wallet countdown stopped for {} at {}: consumed {:.2} min", user_id, venue_id, consumed);
        Ok(consumed)
    }

    /// Recomputes an active balance from the stored `last_updated`.
    /// Safe at any cadence; elapsed time is never counted twice.
    pub fn tick(&mut self, venue_id: &str, user_id: &str, now: DateTime<Utc>) {
        if let Some(entry) = self.entries.get_mut(&key(venue_id, user_id)) {
            entry.settle(now);
        }
    }

    pub fn tick_all(&mut self, now: DateTime<Utc>) {
        for entry in self.entries.values_mut() {
            entry.settle(now);
        }
    }

    /// Adds minutes (top-up, refund). While the entry is active the credit is
    /// queued until deactivation.
    pub fn credit(&mut self, venue_id: &str, user_id: &str, amount_minutes: f64, now: DateTime<Utc>) -> Result<(), LedgerError> {
        let millis = checked_millis(amount_minutes)?;
        self.credit_millis(venue_id, user_id, millis, now);
        Ok(())
    }

    pub fn credit_millis(&mut self, venue_id: &str, user_id: &str, millis: i64, now: DateTime<Utc>) {
        let entry = self
            .entries
            .entry(key(venue_id, user_id))
            .or_insert_with(|| WalletEntry::empty(user_id, venue_id, now));

        // Balances pin at i64::MAX rather than wrap
        if entry.is_active {
            entry.queued_credit_millis = entry.queued_credit_millis.saturating_add(millis);
        } else {
            entry.remaining_millis = entry.remaining_millis.saturating_add(millis);
            entry.last_updated = now.max(entry.last_updated);
        }
    }

    /// Removes minutes, e.g. when a cancellation reclaims a purchase.
    pub fn debit(&mut self, venue_id: &str, user_id: &str, amount_minutes: f64, now: DateTime<Utc>) -> Result<(), LedgerError> {
        let millis = checked_millis(amount_minutes)?;
        self.debit_millis(venue_id, user_id, millis, now)
    }

    pub fn debit_millis(&mut self, venue_id: &str, user_id: &str, millis: i64, now: DateTime<Utc>) -> Result<(), LedgerError> {
        let available = self
            .entry(venue_id, user_id)
            .map(|e| e.projected_millis(now).saturating_add(e.queued_credit_millis))
            .unwrap_or(0);

        if millis > available {
            return Err(LedgerError::InsufficientBalance {
                requested_minutes: minutes::to_minutes(millis),
                available_minutes: minutes::to_minutes(available),
            });
        }
        if millis == 0 {
            return Ok(());
        }

        // available > 0 here, so the entry exists
        if let Some(entry) = self.entries.get_mut(&key(venue_id, user_id)) {
            entry.settle(now);
            let from_queue = millis.min(entry.queued_credit_millis);
            entry.queued_credit_millis -= from_queue;
            entry.remaining_millis -= millis - from_queue;
            if !entry.is_active {
                entry.last_updated = now.max(entry.last_updated);
            }
        }
        Ok(())
    }

    /// Writes a record as-is (persistence load, reconcile).
    pub fn restore(&mut self, entry: WalletEntry) {
        self.entries.insert(key(&entry.venue_id, &entry.user_id), entry);
    }
}

impl Default for WalletLedger {
    fn default() -> Self {
        Self::new()
    }
}

fn key(venue_id: &str, user_id: &str) -> WalletKey {
    (user_id.to_string(), venue_id.to_string())
}

fn checked_millis(amount_minutes: f64) -> Result<i64, LedgerError> {
    if !amount_minutes.is_finite() || amount_minutes < 0.0 {
        return Err(LedgerError::InvalidAmount(amount_minutes));
    }
    Ok(minutes::to_millis(amount_minutes))
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LedgerError {
    #[error("No banked time for user {user_id} at venue {venue_id}")]
    NoBalance {
        venue_id: String,
        user_id: String,
    },

    #[error("Insufficient balance: requested {requested_minutes:.2} min, available {available_minutes:.2} min")]
    InsufficientBalance {
        requested_minutes: f64,
        available_minutes: f64,
    },

    #[error("Wallet not found for user {user_id} at venue {venue_id}")]
    NotFound {
        venue_id: String,
        user_id: String,
    },

    #[error("Invalid minute amount: {0}")]
    InvalidAmount(f64),
}

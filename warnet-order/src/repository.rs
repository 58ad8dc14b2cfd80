use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;
use warnet_catalog::PcSlot;
use warnet_core::CoreResult;

use crate::ledger::WalletEntry;
use crate::models::Booking;
use crate::state::WarnetSnapshot;

/// Durable storage for the three stores. Get/set/list with last-write-wins.
#[async_trait]
pub trait SnapshotRepository: Send + Sync {
    async fn save_booking(&self, booking: &Booking) -> CoreResult<()>;

    async fn get_booking(&self, id: Uuid) -> CoreResult<Option<Booking>>;

    async fn list_bookings(&self) -> CoreResult<Vec<Booking>>;

    async fn save_wallet(&self, entry: &WalletEntry) -> CoreResult<()>;

    async fn get_wallet(&self, user_id: &str, venue_id: &str) -> CoreResult<Option<WalletEntry>>;

    async fn list_wallets(&self) -> CoreResult<Vec<WalletEntry>>;

    /// Overwrites the full slot grid of a venue.
    async fn save_slots(&self, venue_id: &str, slots: &[PcSlot]) -> CoreResult<()>;

    async fn list_slots(&self) -> CoreResult<Vec<PcSlot>>;

    async fn load_snapshot(&self) -> CoreResult<WarnetSnapshot> {
        Ok(WarnetSnapshot {
            bookings: self.list_bookings().await?,
            wallets: self.list_wallets().await?,
            slots: self.list_slots().await?,
        })
    }
}

/// Source of authoritative remote snapshots, polled by the reconcile worker.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    async fn fetch_snapshot(&self) -> CoreResult<WarnetSnapshot>;
}

/// Process-local repository for development runs and tests.
#[derive(Default)]
pub struct InMemoryRepository {
    bookings: RwLock<HashMap<Uuid, Booking>>,
    wallets: RwLock<HashMap<(String, String), WalletEntry>>,
    slots: RwLock<HashMap<String, Vec<PcSlot>>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotRepository for InMemoryRepository {
    async fn save_booking(&self, booking: &Booking) -> CoreResult<()> {
        self.bookings.write().await.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn get_booking(&self, id: Uuid) -> CoreResult<Option<Booking>> {
        Ok(self.bookings.read().await.get(&id).cloned())
    }

    async fn list_bookings(&self) -> CoreResult<Vec<Booking>> {
        Ok(self.bookings.read().await.values().cloned().collect())
    }

    async fn save_wallet(&self, entry: &WalletEntry) -> CoreResult<()> {
        self.wallets
            .write()
            .await
            .insert((entry.user_id.clone(), entry.venue_id.clone()), entry.clone());
        Ok(())
    }

    async fn get_wallet(&self, user_id: &str, venue_id: &str) -> CoreResult<Option<WalletEntry>> {
        Ok(self
            .wallets
            .read()
            .await
            .get(&(user_id.to_string(), venue_id.to_string()))
            .cloned())
    }

    async fn list_wallets(&self) -> CoreResult<Vec<WalletEntry>> {
        Ok(self.wallets.read().await.values().cloned().collect())
    }

    async fn save_slots(&self, venue_id: &str, slots: &[PcSlot]) -> CoreResult<()> {
        self.slots.write().await.insert(venue_id.to_string(), slots.to_vec());
        Ok(())
    }

    async fn list_slots(&self) -> CoreResult<Vec<PcSlot>> {
        Ok(self.slots.read().await.values().flatten().cloned().collect())
    }
}

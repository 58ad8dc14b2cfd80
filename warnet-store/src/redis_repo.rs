use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::{debug, info};
use uuid::Uuid;
use warnet_catalog::PcSlot;
use warnet_core::{CoreError, CoreResult};
use warnet_order::{Booking, RemoteSource, SnapshotRepository, WalletEntry, WarnetSnapshot};

use crate::payload::RemoteSnapshot;

fn unavailable(e: redis::RedisError) -> CoreError {
    CoreError::Unavailable(format!("redis: {}", e))
}

/// Flat JSON records in three Redis hashes:
/// `{prefix}:bookings` (by id), `{prefix}:wallets` (by `user|venue`) and
/// `{prefix}:slots` (one JSON array per venue). Plain HSET, last write wins.
#[derive(Clone)]
pub struct RedisRepository {
    client: redis::Client,
    prefix: String,
}

impl RedisRepository {
    pub fn new(connection_string: &str, prefix: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        info!("Redis repository configured with prefix {}", prefix);
        Ok(Self {
            client,
            prefix: prefix.to_string(),
        })
    }

    fn key(&self, name: &str) -> String {
        format!("{}:{}", self.prefix, name)
    }

    fn wallet_field(user_id: &str, venue_id: &str) -> String {
        format!("{}|{}", user_id, venue_id)
    }

    async fn connection(&self) -> CoreResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(unavailable)
    }

    async fn hset_json<T: serde::Serialize + Sync>(&self, hash: &str, field: &str, value: &T) -> CoreResult<()> {
        let payload = serde_json::to_string(value)?;
        let mut conn = self.connection().await?;
        conn.hset::<_, _, _, ()>(self.key(hash), field, payload)
            .await
            .map_err(unavailable)
    }

    async fn hget_json<T: serde::de::DeserializeOwned>(&self, hash: &str, field: &str) -> CoreResult<Option<T>> {
        let mut conn = self.connection().await?;
        let raw: Option<String> = conn.hget(self.key(hash), field).await.map_err(unavailable)?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn hvals_json<T: serde::de::DeserializeOwned>(&self, hash: &str) -> CoreResult<Vec<T>> {
        let mut conn = self.connection().await?;
        let raw: Vec<String> = conn.hvals(self.key(hash)).await.map_err(unavailable)?;
        raw.iter()
            .map(|r| serde_json::from_str(r).map_err(CoreError::from))
            .collect()
    }
}

#[async_trait]
impl SnapshotRepository for RedisRepository {
    async fn save_booking(&self, booking: &Booking) -> CoreResult<()> {
        self.hset_json("bookings", &booking.id.to_string(), booking).await?;
        debug!("Booking {} saved", booking.id);
        Ok(())
    }

    async fn get_booking(&self, id: Uuid) -> CoreResult<Option<Booking>> {
        self.hget_json("bookings", &id.to_string()).await
    }

    async fn list_bookings(&self) -> CoreResult<Vec<Booking>> {
        self.hvals_json("bookings").await
    }

    async fn save_wallet(&self, entry: &WalletEntry) -> CoreResult<()> {
        let field = Self::wallet_field(&entry.user_id, &entry.venue_id);
        self.hset_json("wallets", &field, entry).await
    }

    async fn get_wallet(&self, user_id: &str, venue_id: &str) -> CoreResult<Option<WalletEntry>> {
        self.hget_json("wallets", &Self::wallet_field(user_id, venue_id)).await
    }

    async fn list_wallets(&self) -> CoreResult<Vec<WalletEntry>> {
        self.hvals_json("wallets").await
    }

    async fn save_slots(&self, venue_id: &str, slots: &[PcSlot]) -> CoreResult<()> {
        self.hset_json("slots", venue_id, &slots).await
    }

    async fn list_slots(&self) -> CoreResult<Vec<PcSlot>> {
        let grids: Vec<Vec<PcSlot>> = self.hvals_json("slots").await?;
        let mut slots: Vec<PcSlot> = grids.into_iter().flatten().collect();
        slots.sort_by(|a, b| a.venue_id.cmp(&b.venue_id).then(a.number.cmp(&b.number)));
        Ok(slots)
    }
}

/// Reads the snapshot the backend publishes under a single Redis key.
#[derive(Clone)]
pub struct RedisRemoteSource {
    client: redis::Client,
    key: String,
}

impl RedisRemoteSource {
    pub fn new(connection_string: &str, key: &str) -> Result<Self, redis::RedisError> {
        Ok(Self {
            client: redis::Client::open(connection_string)?,
            key: key.to_string(),
        })
    }
}

#[async_trait]
impl RemoteSource for RedisRemoteSource {
    async fn fetch_snapshot(&self) -> CoreResult<WarnetSnapshot> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(unavailable)?;
        let raw: Option<String> = conn.get(&self.key).await.map_err(unavailable)?;

        let Some(raw) = raw else {
            debug!("No remote snapshot under {}", self.key);
            return Ok(WarnetSnapshot::default());
        };
        let remote: RemoteSnapshot = serde_json::from_str(&raw)?;
        Ok(remote.into_snapshot())
    }
}

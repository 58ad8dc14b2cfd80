pub mod app_config;
pub mod redis_repo;
pub mod events;
pub mod payload;

pub use app_config::{BusinessRules, Config};
pub use redis_repo::{RedisRemoteSource, RedisRepository};
pub use events::EventProducer;
pub use payload::RemoteSnapshot;

pub mod app_config;
pub mod database;
pub mod memory;
pub mod pg;
pub mod redis_repo;

pub use database::DbClient;
pub use memory::{MemoryNotificationStore, MemoryRideStore};
pub use pg::{PgNotificationStore, PgRideStore};
pub use redis_repo::RedisClient;

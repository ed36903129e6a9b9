pub mod app_config;
pub mod catalog_repo;
pub mod database;
pub mod events;
pub mod order_repo;
pub mod redis_repo;

pub use app_config::Config;
pub use catalog_repo::PgCatalogRepository;
pub use database::DbClient;
pub use events::{EventProducer, KafkaNotifier};
pub use order_repo::PgOrderRepository;
pub use redis_repo::RedisClient;

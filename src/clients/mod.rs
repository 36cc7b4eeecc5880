mod cluster;
mod factory;
pub(crate) mod pubsub;
mod redis;
mod sentinel;

pub use cluster::ClusterConnection;
pub use factory::{ConnectionFactory, ConnectionFactoryBuilder};
pub use pubsub::Subscription;
pub use redis::RedisConnection;
pub use sentinel::SentinelConnection;

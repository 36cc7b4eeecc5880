#![cfg_attr(docsrs, deny(rustdoc::broken_intra_doc_links))]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(docsrs, allow(unused_attributes))]

//! Conduit
//! =======
//!
//! Connection management for [Redis](https://redis.io/) on top of a pluggable driver: pooled or shared connections,
//! pipelines, transactions, pub/sub, and a cluster mode that routes by hash slot and emulates multi-key commands whose
//! keys live on different nodes.
//!
//! ## Examples
//!
//! ```rust edition2018 no_run
//! use conduit::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), RedisError> {
//!   let config = ClientConfig::from_url("redis://127.0.0.1:6379")?;
//!   let factory = ConnectionFactory::new(config)?;
//!   let connection = factory.get_connection()?;
//!
//!   let _: () = connection.set("foo", "bar", None, None, false).await?;
//!   let foo: Option<String> = connection.get("foo").await?;
//!   assert_eq!(foo, Some("bar".into()));
//!
//!   // queue commands locally and flush them together
//!   connection.open_pipeline().await?;
//!   let _: RedisValue = connection.incr("a").await?;
//!   let _: RedisValue = connection.incr("a").await?;
//!   let results = connection.close_pipeline().await?;
//!   assert_eq!(results, vec![RedisValue::Integer(1), RedisValue::Integer(2)]);
//!
//!   connection.close().await;
//!   factory.destroy().await;
//!   Ok(())
//! }
//! ```
pub extern crate bytes;
pub extern crate bytes_utils;

#[macro_use]
extern crate async_trait;
#[macro_use]
extern crate log;
#[cfg(feature = "enable-native-tls")]
extern crate native_tls;
#[cfg(feature = "enable-native-tls")]
extern crate tokio_native_tls;

#[macro_use]
mod macros;

mod commands;
mod utils;

/// Connection handles and the factory that creates them.
pub mod clients;
/// Cluster topology, slot routing and the executor that runs commands on specific nodes.
pub mod cluster;
/// Connection providers and the per-connection mode state machine.
pub mod connection;
/// The contract with the low level driver, plus the TCP and cluster drivers.
pub mod driver;
/// Error structs returned by Redis commands.
pub mod error;
/// Traits that implement portions of the Redis interface.
pub mod interfaces;
/// An in-memory driver for tests.
#[cfg(feature = "mocks")]
#[cfg_attr(docsrs, doc(cfg(feature = "mocks")))]
pub mod mocks;
/// Commands, the reply-shape registry and the RESP2 codec.
pub mod protocol;
/// The structs and enums used by the Redis client.
pub mod types;

/// Utility functions used by the client that may also be useful to callers.
pub mod util {
  pub use redis_protocol::redis_keyslot;

  pub use crate::utils::{f64_to_redis_string, redis_string_to_f64, static_bytes, static_str};

  /// Calculate the SHA1 hash output as a hex string. This is provided for clients that use the Lua interface to
  /// manage their own script caches.
  #[cfg(feature = "sha-1")]
  #[cfg_attr(docsrs, doc(cfg(feature = "sha-1")))]
  pub fn sha1_hash(input: &str) -> String {
    use sha1::Digest;

    let mut hasher = sha1::Sha1::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
  }
}

/// Convenience module to import the connection factory, the connection types, all possible interfaces, error types,
/// and common argument or return value types.
pub mod prelude {
  pub use crate::{
    clients::{ClusterConnection, ConnectionFactory, ConnectionFactoryBuilder, RedisConnection, Subscription},
    connection::ConnectionMode,
    error::{RedisError, RedisErrorKind},
    interfaces::*,
    types::{
      ClientConfig,
      ClusterNode,
      Expiration,
      FromRedis,
      MultiNodeResult,
      PoolConfig,
      RedisKey,
      RedisMap,
      RedisValue,
      RedisValueKind,
      ScanOptions,
      ScanPage,
      ScanType,
      ServerConfig,
      SetOptions,
    },
  };
}

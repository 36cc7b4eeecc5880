#![allow(unused_macros)]
#![allow(dead_code)]

use conduit::{
  clients::{ClusterConnection, ConnectionFactory, RedisConnection},
  error::RedisError,
  interfaces::*,
  mocks::MockDriver,
  types::{ClientConfig, PoolConfig, ServerConfig},
};
use std::{future::Future, sync::Arc, time::Duration};

const CLUSTER_PRIMARIES: usize = 3;

/// The factory and driver behind the connection handed to a test.
#[derive(Clone)]
pub struct TestContext {
  pub factory: ConnectionFactory,
  pub driver:  MockDriver,
}

impl TestContext {
  /// Create another factory on the same simulated servers, with a different config.
  pub fn factory_with(&self, config: ClientConfig) -> ConnectionFactory {
    create_factory(&self.driver, config)
  }
}

pub fn create_config(driver: &MockDriver, clustered: bool, shared: bool) -> ClientConfig {
  let mut servers = driver.servers();
  let server = if clustered {
    ServerConfig::Clustered { hosts: servers }
  } else {
    ServerConfig::Centralized {
      server: servers.remove(0),
    }
  };

  ClientConfig {
    server,
    share_native_connection: shared,
    command_timeout: Duration::from_secs(5),
    pool: Some(PoolConfig {
      max_total: 4,
      max_idle:  4,
      max_wait:  Duration::from_millis(500),
    }),
    ..ClientConfig::default()
  }
}

pub fn create_factory(driver: &MockDriver, config: ClientConfig) -> ConnectionFactory {
  ConnectionFactory::builder(config)
    .driver(Arc::new(driver.clone()))
    .build()
    .expect("Failed to build factory")
}

fn create_context(driver: MockDriver, clustered: bool, shared: bool) -> TestContext {
  let config = create_config(&driver, clustered, shared);
  let factory = create_factory(&driver, config);

  TestContext { factory, driver }
}

pub async fn run_centralized<F, Fut>(func: F, shared: bool)
where
  F: Fn(RedisConnection, TestContext) -> Fut,
  Fut: Future<Output = Result<(), RedisError>>,
{
  let context = create_context(MockDriver::standalone(), false, shared);
  let factory = context.factory.clone();
  factory.init().await.expect("Failed to initialize factory");

  let client = factory.get_connection().expect("Failed to create connection");
  let _client = client.clone();
  func(_client, context).await.expect("Failed to run test");
  client.close().await;
  factory.destroy().await;
}

pub async fn run_cluster<F, Fut>(func: F, shared: bool)
where
  F: Fn(ClusterConnection, TestContext) -> Fut,
  Fut: Future<Output = Result<(), RedisError>>,
{
  let context = create_context(MockDriver::cluster(CLUSTER_PRIMARIES), true, shared);
  let factory = context.factory.clone();
  factory.init().await.expect("Failed to initialize factory");

  let client = factory
    .get_cluster_connection()
    .expect("Failed to create cluster connection");
  let _client = client.clone();
  func(_client, context).await.expect("Failed to run test");
  client.close().await;
  factory.destroy().await;
}

macro_rules! centralized_test_panic(
  ($module:tt, $name:tt) => {
    mod $name {
      #[tokio::test]
      #[should_panic]
      async fn shared() {
        let _ = pretty_env_logger::try_init();
        crate::utils::run_centralized(crate::$module::$name, true).await;
      }

      #[tokio::test]
      #[should_panic]
      async fn dedicated() {
        let _ = pretty_env_logger::try_init();
        crate::utils::run_centralized(crate::$module::$name, false).await;
      }
    }
  }
);

macro_rules! cluster_test_panic(
  ($module:tt, $name:tt) => {
    mod $name {
      #[tokio::test]
      #[should_panic]
      async fn shared() {
        let _ = pretty_env_logger::try_init();
        crate::utils::run_cluster(crate::$module::$name, true).await;
      }

      #[tokio::test]
      #[should_panic]
      async fn dedicated() {
        let _ = pretty_env_logger::try_init();
        crate::utils::run_cluster(crate::$module::$name, false).await;
      }
    }
  }
);

macro_rules! centralized_test(
  ($module:tt, $name:tt) => {
    mod $name {
      #[tokio::test]
      async fn shared() {
        let _ = pretty_env_logger::try_init();
        crate::utils::run_centralized(crate::$module::$name, true).await;
      }

      #[tokio::test]
      async fn dedicated() {
        let _ = pretty_env_logger::try_init();
        crate::utils::run_centralized(crate::$module::$name, false).await;
      }
    }
  }
);

macro_rules! cluster_test(
  ($module:tt, $name:tt) => {
    mod $name {
      #[tokio::test]
      async fn shared() {
        let _ = pretty_env_logger::try_init();
        crate::utils::run_cluster(crate::$module::$name, true).await;
      }

      #[tokio::test]
      async fn dedicated() {
        let _ = pretty_env_logger::try_init();
        crate::utils::run_cluster(crate::$module::$name, false).await;
      }
    }
  }
);

macro_rules! check_null(
  ($client:ident, $arg:expr) => {{
    let foo: conduit::types::RedisValue = $client.get($arg).await?;
    if !foo.is_null() {
      panic!("expected {} to be null", $arg);
    }
  }}
);

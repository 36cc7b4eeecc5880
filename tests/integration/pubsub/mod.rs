use crate::utils::TestContext;
use conduit::{error::RedisError, interfaces::*, types::RedisValue};
use futures::StreamExt;
use std::{collections::HashMap, time::Duration};
use tokio::time::timeout;

const CHANNEL1: &str = "foo";
const CHANNEL2: &str = "bar";
const FAKE_MESSAGE: &str = "wibble";
const NUM_MESSAGES: i64 = 20;

pub async fn should_publish_and_recv_messages<C>(client: C, _: TestContext) -> Result<(), RedisError>
where
  C: PubsubInterface,
{
  let subscription = client.subscribe(CHANNEL1).await?;
  assert!(client.is_subscribed());
  let mut messages = Box::pin(subscription.messages());

  for idx in 0 .. NUM_MESSAGES {
    let receivers: i64 = client.publish(CHANNEL1, format!("{}-{}", FAKE_MESSAGE, idx)).await?;
    assert_eq!(receivers, 1);
  }

  for idx in 0 .. NUM_MESSAGES {
    let message = timeout(Duration::from_secs(1), messages.next())
      .await
      .expect("Timed out waiting for message")
      .expect("Subscription closed");

    assert_eq!(&*message.channel, CHANNEL1);
    assert!(message.pattern.is_none());
    assert_eq!(message.value, RedisValue::from(format!("{}-{}", FAKE_MESSAGE, idx)));
  }

  subscription.close().await;
  assert!(!subscription.is_alive());
  Ok(())
}

pub async fn should_psubscribe_and_recv_messages<C>(client: C, _: TestContext) -> Result<(), RedisError>
where
  C: PubsubInterface,
{
  let subscription = client.psubscribe("ba*").await?;
  let mut messages = Box::pin(subscription.messages());

  let receivers: i64 = client.publish(CHANNEL1, FAKE_MESSAGE).await?;
  assert_eq!(receivers, 0);
  let receivers: i64 = client.publish(CHANNEL2, FAKE_MESSAGE).await?;
  assert_eq!(receivers, 1);

  let message = timeout(Duration::from_secs(1), messages.next())
    .await
    .expect("Timed out waiting for message")
    .expect("Subscription closed");
  assert_eq!(&*message.channel, CHANNEL2);
  assert_eq!(message.pattern.as_deref(), Some("ba*"));
  assert_eq!(message.value, RedisValue::from(FAKE_MESSAGE));

  subscription.close().await;
  Ok(())
}

pub async fn should_track_channels_and_patterns<C>(client: C, _: TestContext) -> Result<(), RedisError>
where
  C: PubsubInterface,
{
  let subscription = client.subscribe(vec![CHANNEL1, CHANNEL2]).await?;
  subscription.psubscribe("baz*").await?;
  assert_eq!(subscription.channels().len(), 2);
  assert_eq!(subscription.patterns().len(), 1);

  let counts: HashMap<String, i64> = client.pubsub_numsub(vec![CHANNEL1, "missing"]).await?;
  assert_eq!(counts.get(CHANNEL1), Some(&1));
  assert_eq!(counts.get("missing"), Some(&0));
  assert_eq!(client.pubsub_numpat::<i64>().await?, 1);

  subscription.unsubscribe(CHANNEL1).await?;
  assert_eq!(subscription.channels().len(), 1);
  let channels: Vec<String> = client.pubsub_channels(None).await?;
  assert_eq!(channels, vec![CHANNEL2.to_owned()]);

  subscription.close().await;
  let channels: Vec<String> = client.pubsub_channels(None).await?;
  assert!(channels.is_empty());
  Ok(())
}

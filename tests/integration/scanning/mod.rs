use crate::utils::TestContext;
use conduit::{
  clients::{ClusterConnection, RedisConnection},
  error::{RedisError, RedisErrorKind},
  interfaces::*,
  types::{RedisKey, ScanOptions, ScanType},
};
use futures::TryStreamExt;
use std::collections::{BTreeSet, HashMap};

const KEY_COUNT: usize = 40;

async fn create_keys<C: StringsInterface>(client: &C, prefix: &str) -> Result<BTreeSet<String>, RedisError> {
  let mut keys = BTreeSet::new();
  for idx in 0 .. KEY_COUNT {
    let key = format!("{}{}", prefix, idx);
    let _: () = client.set(key.as_str(), idx as i64, None, None, false).await?;
    keys.insert(key);
  }

  Ok(keys)
}

fn key_names(keys: Vec<RedisKey>) -> Vec<String> {
  keys.iter().map(|key| key.as_str_lossy().to_string()).collect()
}

pub async fn should_scan_keys_by_page<C>(client: C, _: TestContext) -> Result<(), RedisError>
where
  C: KeysInterface + StringsInterface + SetsInterface,
{
  let expected = create_keys(&client, "{scan}key").await?;
  let _: () = client.sadd("{scan}set", vec!["a", "b"]).await?;

  let mut found = BTreeSet::new();
  let mut cursor = 0;
  let mut pages = 0;
  loop {
    let options = ScanOptions::matching("{scan}key*").with_count(10);
    let page = client.scan_page(cursor, options).await?;
    found.extend(key_names(page.results.clone()));
    pages += 1;

    if page.is_finished() {
      break;
    }
    cursor = page.cursor;
  }
  assert!(pages > 1);
  assert_eq!(found, expected);

  let options = ScanOptions::matching("{scan}*").with_type(ScanType::Set).with_count(100);
  let page = client.scan_page(0, options).await?;
  assert!(page.is_finished());
  assert_eq!(key_names(page.results), vec!["{scan}set".to_owned()]);

  Ok(())
}

pub async fn should_scan_hash_set_and_sorted_set_pages<C>(client: C, _: TestContext) -> Result<(), RedisError>
where
  C: HashesInterface + SetsInterface + SortedSetsInterface,
{
  let fields: Vec<(String, i64)> = (0 .. 20).map(|idx| (format!("f{}", idx), idx)).collect();
  let _: () = client.hset("hash", fields).await?;
  let members: Vec<String> = (0 .. 20).map(|idx| format!("m{}", idx)).collect();
  let _: () = client.sadd("set", members.clone()).await?;
  let scores: Vec<(f64, String)> = members.iter().enumerate().map(|(i, m)| (i as f64, m.clone())).collect();
  let _: () = client.zadd("zset", None, None, false, false, scores).await?;

  let mut hash = HashMap::new();
  let mut cursor = 0;
  loop {
    let page = client.hscan_page("hash", cursor, ScanOptions::default().with_count(7)).await?;
    for (field, value) in page.results.iter() {
      hash.insert(field.as_str_lossy().to_string(), value.as_i64().unwrap_or(-1));
    }
    if page.is_finished() {
      break;
    }
    cursor = page.cursor;
  }
  assert_eq!(hash.len(), 20);
  assert_eq!(hash.get("f13"), Some(&13));

  let page = client
    .sscan_page("set", 0, ScanOptions::matching("m1*").with_count(100))
    .await?;
  assert!(page.is_finished());
  // m1 and m10 to m19
  assert_eq!(page.results.len(), 11);

  let page = client
    .zscan_page("zset", 0, ScanOptions::matching("m5").with_count(100))
    .await?;
  assert_eq!(page.results.len(), 1);
  assert_eq!(page.results[0].1, 5.0);

  let page = client.sscan_page("missing", 0, ScanOptions::default()).await?;
  assert!(page.is_finished());
  assert!(page.results.is_empty());

  Ok(())
}

pub async fn should_scan_every_key_with_a_stream(client: RedisConnection, _: TestContext) -> Result<(), RedisError> {
  let expected = create_keys(&client, "key").await?;

  let pages: Vec<_> = client
    .scan(ScanOptions::matching("key*").with_count(8))
    .try_collect()
    .await?;
  assert!(pages.len() > 1);
  assert!(pages.last().map(|page| page.is_finished()).unwrap_or(false));

  let found: BTreeSet<String> = pages.into_iter().flat_map(|page| key_names(page.results)).collect();
  assert_eq!(found, expected);

  Ok(())
}

pub async fn should_stream_value_scans(client: RedisConnection, _: TestContext) -> Result<(), RedisError> {
  let fields: Vec<(String, i64)> = (0 .. 30).map(|idx| (format!("f{}", idx), idx)).collect();
  let _: () = client.hset("hash", fields).await?;

  let fields: Vec<(RedisKey, _)> = client
    .hscan("hash", ScanOptions::default().with_count(4))
    .map_ok(|page| futures::stream::iter(page.results.into_iter().map(Ok::<_, RedisError>)))
    .try_flatten()
    .try_collect()
    .await?;
  assert_eq!(fields.len(), 30);

  let pages: Vec<_> = client.zscan("missing", ScanOptions::default()).try_collect().await?;
  assert_eq!(pages.len(), 1);
  assert!(pages[0].results.is_empty());

  Ok(())
}

pub async fn should_error_scan_during_pipeline(client: RedisConnection, _: TestContext) -> Result<(), RedisError> {
  client.open_pipeline().await?;
  let error = client.scan_page(0, ScanOptions::default()).await.unwrap_err();
  assert_eq!(*error.kind(), RedisErrorKind::InvalidCommand);
  let _ = client.close_pipeline().await?;

  // surfaces as a panic through the test harness
  Err(error)
}

pub async fn should_scan_every_primary(client: ClusterConnection, _: TestContext) -> Result<(), RedisError> {
  let expected = create_keys(&client, "key").await?;

  let pages: Vec<_> = client
    .scan(ScanOptions::matching("key*").with_count(5))
    .try_collect()
    .await?;
  let found: BTreeSet<String> = pages.into_iter().flat_map(|page| key_names(page.results)).collect();
  assert_eq!(found, expected);

  let mut by_node = BTreeSet::new();
  for node in client.cluster_primaries().await?.iter() {
    let mut cursor = 0;
    loop {
      let page = client
        .scan_node(node, cursor, ScanOptions::matching("key*").with_count(100))
        .await?;
      by_node.extend(key_names(page.results.clone()));
      if page.is_finished() {
        break;
      }
      cursor = page.cursor;
    }
  }
  assert_eq!(by_node, expected);

  Ok(())
}

pub async fn should_scan_one_node_with_a_hash_tag(client: ClusterConnection, _: TestContext) -> Result<(), RedisError> {
  let tagged = create_keys(&client, "{user}:").await?;
  let _ = create_keys(&client, "other").await?;

  let pages: Vec<_> = client
    .scan(ScanOptions::matching("{user}:*").with_count(10))
    .try_collect()
    .await?;
  let found: BTreeSet<String> = pages.into_iter().flat_map(|page| key_names(page.results)).collect();
  assert_eq!(found, tagged);

  Ok(())
}

pub async fn should_error_cluster_scan_page_without_hash_tag(
  client: ClusterConnection,
  _: TestContext,
) -> Result<(), RedisError> {
  let error = client.scan_page(0, ScanOptions::matching("key*")).await.unwrap_err();
  assert_eq!(*error.kind(), RedisErrorKind::InvalidCommand);

  Err(error)
}

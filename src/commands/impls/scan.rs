use super::*;
use crate::{
  connection::ConnectionMode,
  types::{ClusterNode, ScanOptions, ScanPage, STARTING_CURSOR},
};
use futures::stream::{self, Stream};
use std::{collections::VecDeque, future::Future};

/// Every page reply carries the cursor for the next call, so the reply must be read before the next page is requested.
fn check_mode<C: ClientLike>(client: &C, operation: &str) -> Result<(), RedisError> {
  match client.inner().mode() {
    ConnectionMode::Pipelined | ConnectionMode::Queueing => Err(RedisError::new(
      RedisErrorKind::InvalidCommand,
      format!("{} is not supported in pipeline / transaction mode.", operation),
    )),
    _ => Ok(()),
  }
}

fn key_scan_args(cursor: u64, options: ScanOptions) -> Vec<RedisValue> {
  let mut args = Vec::with_capacity(7);
  args.push(cursor.to_string().into());
  options.into_args(&mut args, true);
  args
}

fn value_scan_args(key: RedisKey, cursor: u64, options: ScanOptions) -> Vec<RedisValue> {
  let mut args = Vec::with_capacity(6);
  args.push(key.into());
  args.push(cursor.to_string().into());
  options.into_args(&mut args, false);
  args
}

async fn scan_value_page<C: ClientLike>(
  client: &C,
  kind: RedisCommandKind,
  key: RedisKey,
  cursor: u64,
  options: ScanOptions,
) -> Result<ScanPage<Vec<RedisValue>>, RedisError> {
  check_mode(client, kind.cmd_str())?;
  let response = args_value_cmd(client, kind, value_scan_args(key, cursor, options)).await?;
  ScanPage::from_value(response)
}

/// Read one page of keys.
///
/// In a cluster the pattern must contain a hash tag, since a cursor is only meaningful on the node that issued it.
pub async fn scan_page<C: ClientLike>(
  client: &C,
  cursor: u64,
  options: ScanOptions,
) -> Result<ScanPage<Vec<RedisKey>>, RedisError> {
  check_mode(client, "SCAN")?;
  let slot = options.hash_tag_slot();
  let mut command = RedisCommand::new(RedisCommandKind::Scan, key_scan_args(cursor, options));

  if client.inner().is_clustered() {
    match slot {
      Some(slot) => command = command.with_hash_slot(slot),
      None => {
        return Err(RedisError::new(
          RedisErrorKind::InvalidCommand,
          "SCAN in a cluster requires a pattern with a hash tag. Use scan_node or scan to read every primary.",
        ))
      },
    }
  }

  ScanPage::from_value(request(client, command).await?)?.into_keys()
}

/// Read one page of keys from a specific cluster node.
pub async fn scan_node<C: ClientLike>(
  client: &C,
  node: &ClusterNode,
  cursor: u64,
  options: ScanOptions,
) -> Result<ScanPage<Vec<RedisKey>>, RedisError> {
  let executor = emulation_executor(client, "SCAN")?;
  let command = RedisCommand::new(RedisCommandKind::Scan, key_scan_args(cursor, options));

  ScanPage::from_value(executor.run_on_node(node, command).await?)?.into_keys()
}

pub async fn hscan_page<C: ClientLike>(
  client: &C,
  key: RedisKey,
  cursor: u64,
  options: ScanOptions,
) -> Result<ScanPage<Vec<(RedisKey, RedisValue)>>, RedisError> {
  scan_value_page(client, RedisCommandKind::HScan, key, cursor, options)
    .await?
    .into_pairs()
}

pub async fn sscan_page<C: ClientLike>(
  client: &C,
  key: RedisKey,
  cursor: u64,
  options: ScanOptions,
) -> Result<ScanPage<Vec<RedisValue>>, RedisError> {
  scan_value_page(client, RedisCommandKind::SScan, key, cursor, options).await
}

pub async fn zscan_page<C: ClientLike>(
  client: &C,
  key: RedisKey,
  cursor: u64,
  options: ScanOptions,
) -> Result<ScanPage<Vec<(RedisValue, f64)>>, RedisError> {
  scan_value_page(client, RedisCommandKind::ZScan, key, cursor, options)
    .await?
    .into_scores()
}

/// Read the primaries a cluster wide key scan visits, in order.
async fn scan_targets<C: ClientLike>(client: &C, options: &ScanOptions) -> Result<VecDeque<ClusterNode>, RedisError> {
  let executor = emulation_executor(client, "SCAN")?;

  match options.hash_tag_slot() {
    Some(slot) => {
      let node = super::cluster::cluster_node_for_slot(client, slot).await?;
      Ok(VecDeque::from(vec![node]))
    },
    None => Ok(executor.topology().await?.primaries().into_iter().cloned().collect()),
  }
}

struct KeyScan<C> {
  client:  C,
  options: ScanOptions,
  cursor:  u64,
  /// The nodes left to scan in a cluster, starting with the current one. Read when the first page is requested.
  nodes:   Option<VecDeque<ClusterNode>>,
  done:    bool,
}

async fn next_key_page<C: ClientLike>(
  mut state: KeyScan<C>,
) -> Result<Option<(ScanPage<Vec<RedisKey>>, KeyScan<C>)>, RedisError> {
  if state.done {
    return Ok(None);
  }

  let page = if state.client.inner().is_clustered() {
    if state.nodes.is_none() {
      state.nodes = Some(scan_targets(&state.client, &state.options).await?);
    }
    let nodes = match state.nodes.as_mut() {
      Some(nodes) => nodes,
      None => return Ok(None),
    };
    let node = match nodes.front() {
      Some(node) => node.clone(),
      None => return Ok(None),
    };

    _trace!(state.client.inner(), "Scanning {} from cursor {}", node.server, state.cursor);
    let page = scan_node(&state.client, &node, state.cursor, state.options.clone()).await?;
    if page.is_finished() {
      nodes.pop_front();
    }
    state.done = nodes.is_empty();
    page
  } else {
    let page = scan_page(&state.client, state.cursor, state.options.clone()).await?;
    state.done = page.is_finished();
    page
  };

  state.cursor = page.cursor;
  Ok(Some((page, state)))
}

/// Scan every key, one page at a time.
///
/// In a cluster each primary is scanned in turn, or only the node serving the hash tag in the pattern. Each page
/// carries the cursor on the node that produced it.
pub fn scan<C: ClientLike + Clone>(
  client: &C,
  options: ScanOptions,
) -> impl Stream<Item = Result<ScanPage<Vec<RedisKey>>, RedisError>> {
  let state = KeyScan {
    client: client.clone(),
    options,
    cursor: STARTING_CURSOR,
    nodes: None,
    done: false,
  };

  stream::try_unfold(state, next_key_page)
}

struct ValueScan<C> {
  client:  C,
  key:     RedisKey,
  options: ScanOptions,
  cursor:  u64,
  done:    bool,
}

async fn next_value_page<C, T, F, Fut>(
  read_page: F,
  mut state: ValueScan<C>,
) -> Result<Option<(ScanPage<T>, ValueScan<C>)>, RedisError>
where
  C: ClientLike + Clone,
  F: Fn(C, RedisKey, u64, ScanOptions) -> Fut,
  Fut: Future<Output = Result<ScanPage<T>, RedisError>>,
{
  if state.done {
    return Ok(None);
  }

  let page = read_page(
    state.client.clone(),
    state.key.clone(),
    state.cursor,
    state.options.clone(),
  )
  .await?;
  state.cursor = page.cursor;
  state.done = page.is_finished();
  Ok(Some((page, state)))
}

/// Iterate the pages of a value scan until the server returns the starting cursor.
fn value_stream<C, T, F, Fut>(
  client: &C,
  key: RedisKey,
  options: ScanOptions,
  read_page: F,
) -> impl Stream<Item = Result<ScanPage<T>, RedisError>>
where
  C: ClientLike + Clone,
  F: Fn(C, RedisKey, u64, ScanOptions) -> Fut + Copy,
  Fut: Future<Output = Result<ScanPage<T>, RedisError>>,
{
  let state = ValueScan {
    client: client.clone(),
    key,
    options,
    cursor: STARTING_CURSOR,
    done: false,
  };

  stream::try_unfold(state, move |state| next_value_page(read_page, state))
}

/// Scan the fields and values of a hash, one page at a time.
pub fn hscan<C: ClientLike + Clone>(
  client: &C,
  key: RedisKey,
  options: ScanOptions,
) -> impl Stream<Item = Result<ScanPage<Vec<(RedisKey, RedisValue)>>, RedisError>> {
  value_stream(client, key, options, |client: C, key, cursor, options| async move {
    hscan_page(&client, key, cursor, options).await
  })
}

/// Scan the members of a set, one page at a time.
pub fn sscan<C: ClientLike + Clone>(
  client: &C,
  key: RedisKey,
  options: ScanOptions,
) -> impl Stream<Item = Result<ScanPage<Vec<RedisValue>>, RedisError>> {
  value_stream(client, key, options, |client: C, key, cursor, options| async move {
    sscan_page(&client, key, cursor, options).await
  })
}

/// Scan the members and scores of a sorted set, one page at a time.
pub fn zscan<C: ClientLike + Clone>(
  client: &C,
  key: RedisKey,
  options: ScanOptions,
) -> impl Stream<Item = Result<ScanPage<Vec<(RedisValue, f64)>>, RedisError>> {
  value_stream(client, key, options, |client: C, key, cursor, options| async move {
    zscan_page(&client, key, cursor, options).await
  })
}

#[cfg(test)]
mod tests {
  use super::super::test_utils::{cluster_connection, standalone_connection};
  use crate::{
    error::RedisErrorKind,
    interfaces::*,
    mocks::MockDriver,
    types::{RedisKey, RedisValue, ScanOptions, ScanType, STARTING_CURSOR},
  };
  use futures::TryStreamExt;
  use std::collections::HashSet;

  #[tokio::test]
  async fn should_page_through_standalone_keys() {
    let connection = standalone_connection(&MockDriver::standalone());
    for idx in 0 .. 25 {
      let _: () = connection.set(format!("key{}", idx), idx, None, None, false).await.unwrap();
    }
    let _: i64 = connection.sadd("set", "a").await.unwrap();

    let page = connection
      .scan_page(STARTING_CURSOR, ScanOptions::matching("key*").with_count(10))
      .await
      .unwrap();
    assert_eq!(page.results.len(), 10);
    assert!(!page.is_finished());

    let pages: Vec<_> = connection
      .scan(ScanOptions::default().with_count(10).with_type(ScanType::String))
      .try_collect()
      .await
      .unwrap();
    let keys: HashSet<RedisKey> = pages.into_iter().flat_map(|page| page.results).collect();
    assert_eq!(keys.len(), 25);
    assert!(!keys.contains(&RedisKey::from("set")));
  }

  #[tokio::test]
  async fn should_scan_every_primary_in_a_cluster() {
    let driver = MockDriver::cluster(3);
    let connection = cluster_connection(&driver);
    for idx in 0 .. 30 {
      let _: () = connection.set(format!("key{}", idx), idx, None, None, false).await.unwrap();
    }

    let pages: Vec<_> = connection
      .scan(ScanOptions::matching("key*").with_count(5))
      .try_collect()
      .await
      .unwrap();
    let keys: HashSet<RedisKey> = pages.into_iter().flat_map(|page| page.results).collect();
    assert_eq!(keys.len(), 30);
    for server in driver.servers() {
      assert!(driver.commands_on(&server).contains(&"SCAN".to_owned()));
    }
  }

  #[tokio::test]
  async fn should_require_hash_tag_for_cluster_scan_pages() {
    let driver = MockDriver::cluster(3);
    let connection = cluster_connection(&driver);
    let _: () = connection.set("{user1}:name", "a", None, None, false).await.unwrap();
    let _: () = connection.set("{user1}:email", "b", None, None, false).await.unwrap();

    let error = connection
      .scan_page(STARTING_CURSOR, ScanOptions::matching("user*"))
      .await
      .unwrap_err();
    assert_eq!(*error.kind(), RedisErrorKind::InvalidCommand);

    let page = connection
      .scan_page(STARTING_CURSOR, ScanOptions::matching("{user1}:*"))
      .await
      .unwrap();
    assert!(page.is_finished());
    assert_eq!(page.results.len(), 2);

    let owner = connection.cluster_node_for_key("{user1}").await.unwrap();
    let page = connection
      .scan_node(&owner, STARTING_CURSOR, ScanOptions::default())
      .await
      .unwrap();
    assert_eq!(page.results.len(), 2);
  }

  #[tokio::test]
  async fn should_scan_hashes_sets_and_sorted_sets() {
    let connection = cluster_connection(&MockDriver::cluster(3));
    let fields: Vec<(String, i64)> = (0 .. 12).map(|idx| (format!("field{}", idx), idx)).collect();
    let _: i64 = connection.hset("hash", fields).await.unwrap();
    let _: i64 = connection.sadd("set", vec!["a", "b", "c"]).await.unwrap();
    let _: i64 = connection
      .zadd("zset", None, None, false, false, vec![(1.5, "a"), (2.0, "b")])
      .await
      .unwrap();

    let pages: Vec<_> = connection
      .hscan("hash", ScanOptions::default().with_count(5))
      .try_collect()
      .await
      .unwrap();
    assert_eq!(pages.len(), 3);
    assert_eq!(pages.iter().map(|page| page.results.len()).sum::<usize>(), 12);

    let page = connection
      .sscan_page("set", STARTING_CURSOR, ScanOptions::matching("[ab]"))
      .await
      .unwrap();
    assert_eq!(page.results.len(), 2);

    let pages: Vec<_> = connection.zscan("zset", ScanOptions::default()).try_collect().await.unwrap();
    assert_eq!(pages[0].results, vec![(RedisValue::from("a"), 1.5), (RedisValue::from("b"), 2.0)]);
  }

  #[tokio::test]
  async fn should_reject_scans_in_pipelines() {
    let connection = standalone_connection(&MockDriver::standalone());
    connection.open_pipeline().await.unwrap();

    let error = connection
      .scan_page(STARTING_CURSOR, ScanOptions::default())
      .await
      .unwrap_err();
    assert_eq!(*error.kind(), RedisErrorKind::InvalidCommand);
  }
}

mod args;
mod cluster;
mod config;
mod from_redis;
mod misc;
mod multi_node;
mod scan;
mod sentinel;

pub use args::*;
pub use cluster::*;
pub use config::*;
pub use from_redis::{FromRedis, FromRedisKey};
pub use misc::*;
pub use multi_node::*;
pub use scan::*;
pub use sentinel::*;

pub use redis_protocol::resp2::types::Frame as Resp2Frame;

/// A tuple of `(offset, count)` values for commands that allow paging through results.
pub type Limit = (i64, i64);

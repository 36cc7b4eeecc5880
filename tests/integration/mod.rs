#[macro_use]
pub mod utils;

mod cluster;
mod hashes;
mod keys;
mod lists;
mod lua;
mod multi;
mod pipeline;
mod pool;
mod pubsub;
mod scanning;
mod server;
mod sets;
mod sorted_sets;

pub mod centralized;
pub mod clustered;

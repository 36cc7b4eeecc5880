pub mod cluster;
pub mod geo;
pub mod hashes;
pub mod keys;
pub mod lists;
pub mod lua;
pub mod pubsub;
pub mod server;
pub mod sets;
pub mod sorted_sets;
pub mod streams;
pub mod strings;
pub mod transactions;

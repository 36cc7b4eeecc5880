pub mod cluster;
pub mod codec;
pub mod command;
pub mod utils;

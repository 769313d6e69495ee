//! Gateway layer
//!
//! Thin HTTP surface plus the shard fan-out transport. The interesting work
//! lives in [`crate::cluster`] and [`crate::merge`]; this module wires them
//! to the network.

pub mod fanout;
pub mod http;
pub mod server;

pub use fanout::{fan_out, HttpShardClient, PartialQuery, Point, ShardClient};
pub use server::Gateway;

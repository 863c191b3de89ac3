//! TraCI wire protocol
//!
//! Big-endian, length-prefixed messages of one or more commands over TCP.

mod client;
pub mod codec;
pub mod constants;

pub use client::TraciClient;

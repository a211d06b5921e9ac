//! Coordinator connection management
//!
//! [`Connection`] is one socket with its I/O task; [`Link`] supervises
//! connections for the app: bounded retry, subscribe on connect, and the
//! reconnect cycle after a drop.

mod client;
mod link;

pub use client::Connection;
pub use link::{Link, LinkEvent, LinkStatus};

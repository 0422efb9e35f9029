//! rwhoisd-rs - an RWhois (RFC 2167-style) directory service daemon.
//!
//! Clients open a TCP connection, receive a capability banner, and issue
//! query lines or `-directive` lines until they quit or the connection
//! goes idle. See [`session`] for the per-connection loop, [`store`] for
//! the on-disk record layout, and [`referral`] for how a miss is turned
//! into a pointer at another authority.

pub mod config;
mod context;
pub mod error;
pub mod listener;
pub mod model;
pub mod referral;
pub mod register;
pub mod session;
pub mod store;
pub mod wire;
pub mod xfer;

pub use error::{Error, Result};

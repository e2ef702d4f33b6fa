//! # Syncwire Worlds
//!
//! The per-tick orchestration layer: holds the entity tables on each side
//! of the connection and drives the per-entity encode/decode contract from
//! `syncwire-replication` through the packet framing in
//! `syncwire-protocol`.
//!
//! Everything here is single-threaded and tick-driven. A world never
//! blocks and never suspends: the transport hands it complete packets and
//! each handler runs to completion. Malformed or hostile input is dropped
//! and logged, never a panic.

pub mod client;
pub mod link;
pub mod server;

pub use client::*;
pub use link::*;
pub use server::*;

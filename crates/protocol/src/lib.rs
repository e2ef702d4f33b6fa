//! # Syncwire Wire Protocol
//!
//! Framing for the replication protocol: a one-byte opcode followed by a
//! bit-packed body. Bodies are built with [`syncwire_bits::BitBuffer`] and
//! carried between peers as whole byte packets.
//!
//! ## Packet layout
//!
//! ```text
//! [u8 opcode][body bits, padded to a byte boundary]
//! ```
//!
//! The per-entity property encoding inside `Update` and `EntityCreated`
//! bodies is owned by `syncwire-replication`; this crate frames the
//! envelope around it (opcodes, ticks, entity-list terminators, the
//! connect-time schema handshake).

pub mod frames;
pub mod handshake;
pub mod opcode;
pub mod wire;

pub use frames::*;
pub use handshake::*;
pub use opcode::*;
pub use wire::*;

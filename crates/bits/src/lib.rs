//! # Syncwire Bit Buffer
//!
//! The bit-addressable wire primitive behind every syncwire message.
//!
//! ## Layout rules
//!
//! - Fixed-size integers (`write_u8`..`write_u64`) are written in network
//!   byte order.
//! - Arbitrary-width integers (`write_uint`/`write_int`, width 1..=32) are
//!   written left-aligned within their occupied bits: the most significant
//!   of the `width` bits goes on the wire first. Reads sign-extend when the
//!   width is below 32 and the top bit is set.
//! - Floats are bit-reinterpreted IEEE-754 (`f32::to_bits`), bit-exact on
//!   round trip.
//! - Strings are raw bytes followed by a NUL terminator.
//!
//! ## Fail-soft reads
//!
//! Reading past the logical end of a buffer never fails: it yields zero
//! values and raises the buffer's sticky [`BitBuffer::overrun`] flag.
//! Decoders of untrusted input run to completion and then consult the flag.
//! See the type-level docs for the trade-off this policy carries.

mod buffer;

pub use buffer::BitBuffer;

//! # Syncwire Replication
//!
//! Typed, change-tracked properties and the per-entity synchronization
//! contract built on them.
//!
//! ## Architecture
//!
//! ### 1. Properties ([`property`])
//! A [`Property`] is one typed, flag-tagged, wire-serializable value with a
//! monotonic change tick. The value lives in a tagged union
//! ([`PropertyValue`]), so cross-type access is a checked error rather than
//! a silently wrong read.
//!
//! ### 2. Templates ([`template`])
//! A [`Template`] is the shared, read-only schema a class of entities is
//! instantiated from: ordered property definitions with defaults, flags and
//! bit widths. Property ORDER is the entire wire contract — no names or tags
//! are ever transmitted — which is why templates carry a positional
//! [schema hash](Template::schema_hash) checked at connect time.
//!
//! ### 3. Entities ([`entity`], [`client`], [`server`])
//! [`Entity`] holds the ordered property set and the snapshot/delta
//! encoding shared by both sides. [`ClientEntity`] adds dead-reckoning
//! prediction against a [`CollisionQuery`]; [`ServerEntity`] enforces the
//! owner-authority boundary in both directions.
//!
//! ## Authority model
//!
//! - `UNLOCKED` properties may be written by the entity's owning client;
//!   they are the only properties a client-side delta carries, and the only
//!   ones the server will store from one.
//! - `OWNER_UPDATES` properties flow server → clients, but are suppressed
//!   toward the owning client when the owner itself originated the change —
//!   the owner already advanced them locally, and echoing them back would
//!   fight its prediction. A server-side correction to the same property IS
//!   sent to the owner.

pub mod client;
pub mod entity;
pub mod observer;
pub mod property;
pub mod server;
pub mod template;

pub use client::*;
pub use entity::*;
pub use observer::*;
pub use property::*;
pub use server::*;
pub use template::*;

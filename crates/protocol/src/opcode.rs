//! Packet opcode definitions
//!
//! Every packet starts with a one-byte opcode. Bodies are bit-packed
//! (see [`crate::frames`]); the formats below document the body layout
//! in field order.

/// Packet type enumeration
///
/// # Opcode IDs
///
/// IDs are stable wire values; renumbering breaks compatibility with
/// deployed peers, so new opcodes are appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    //=== Session ===//
    /// Client signals it has finished processing `InitialData` and is
    /// ready to receive entity traffic
    ///
    /// # Packet Format
    /// ```text
    /// {0}
    /// ```
    Ready = 0,

    /// First server packet after connect
    ///
    /// # Packet Format
    /// ```text
    /// {1}{u16 client_id}{u32 tick}{u32 schema_digest}
    /// ```
    ///
    /// # Fields
    /// - `client_id`: the id assigned to the connecting peer
    /// - `tick`: the server's current logical tick
    /// - `schema_digest`: digest of the server's template registry; the
    ///   client rejects the session on mismatch
    InitialData = 1,

    /// Server moves the session to a different map
    ///
    /// # Packet Format
    /// ```text
    /// {2}{cstring map_name}
    /// ```
    MapChange = 2,

    //=== Entity lifecycle ===//
    /// Server announces a new entity with its full state
    ///
    /// # Packet Format
    /// ```text
    /// {3}{u16 id}{u16 owner}{cstring template_name}{SNAPSHOT}
    /// ```
    ///
    /// `SNAPSHOT` is one bit per property ("differs from template
    /// default") followed by the value when the bit is set, in template
    /// order.
    EntityCreated = 3,

    /// Server removes an entity
    ///
    /// # Packet Format
    /// ```text
    /// {4}{u16 id}
    /// ```
    EntityDeleted = 4,

    /// Entity resumes participating in delta updates
    ///
    /// # Packet Format
    /// ```text
    /// {5}{u16 id}
    /// ```
    ActivateEntity = 5,

    /// Entity stops participating in delta updates without being
    /// destroyed (out of interest range, level unloaded)
    ///
    /// # Packet Format
    /// ```text
    /// {6}{u16 id}
    /// ```
    DeactivateEntity = 6,

    //=== Owner input ===//
    /// Owning client reports its facing angle
    ///
    /// # Packet Format
    /// ```text
    /// {7}{u16 id}{f32 radians}
    /// ```
    Rotation = 7,

    /// Owning client reports its held-key bitmask
    ///
    /// # Packet Format
    /// ```text
    /// {8}{u16 id}{u8 keys}
    /// ```
    Keys = 8,

    //=== State sync ===//
    /// Delta update for one or more entities
    ///
    /// # Packet Format
    /// ```text
    /// {9}{u32 tick}[server→client only: {u32 owner_latency_ticks}]
    ///    { {u16 id+1}{per property: 1-bit changed + value-if-set} }...
    ///    {u16 0}
    /// ```
    ///
    /// Entity ids are sent as `id + 1` so a zero id can terminate the
    /// list. Property blocks follow template order; the bitmap position
    /// is the entire synchronization contract.
    Update = 9,

    /// Peer acknowledges the newest update tick it has applied
    ///
    /// # Packet Format
    /// ```text
    /// {10}{u32 tick}
    /// ```
    UpdateReceived = 10,
}

impl Opcode {
    /// Parse an opcode byte, `None` for unknown values
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Opcode::Ready),
            1 => Some(Opcode::InitialData),
            2 => Some(Opcode::MapChange),
            3 => Some(Opcode::EntityCreated),
            4 => Some(Opcode::EntityDeleted),
            5 => Some(Opcode::ActivateEntity),
            6 => Some(Opcode::DeactivateEntity),
            7 => Some(Opcode::Rotation),
            8 => Some(Opcode::Keys),
            9 => Some(Opcode::Update),
            10 => Some(Opcode::UpdateReceived),
            _ => None,
        }
    }

    #[inline]
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }
}

//! Typed, change-tracked replicable properties

use serde::{Deserialize, Serialize};
use syncwire_bits::BitBuffer;
use syncwire_core::{Result, SyncError, Tick, Vec2f, Vec2i};

/// Property type tag
///
/// Fixed at template-load time; both peers must agree on the kind at each
/// template position for the positional wire format to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyKind {
    /// Signed integer, `bit_width` bits on the wire
    Int,
    /// 32-bit IEEE-754 float
    Float,
    /// Two 32-bit floats
    Vec2F,
    /// Two signed integers, `bit_width` bits each
    Vec2I,
    /// Single bit
    Bool,
    /// NUL-terminated byte string
    String,
}

impl PropertyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyKind::Int => "Int",
            PropertyKind::Float => "Float",
            PropertyKind::Vec2F => "Vec2F",
            PropertyKind::Vec2I => "Vec2I",
            PropertyKind::Bool => "Bool",
            PropertyKind::String => "String",
        }
    }

    /// Stable code used in the schema hash
    pub(crate) fn code(&self) -> u8 {
        match self {
            PropertyKind::Int => 0,
            PropertyKind::Float => 1,
            PropertyKind::Vec2F => 2,
            PropertyKind::Vec2I => 3,
            PropertyKind::Bool => 4,
            PropertyKind::String => 5,
        }
    }
}

/// A property value, tagged by kind
///
/// The tagged union is what makes a cross-type access a checked
/// `TypeMismatch` instead of a logged warning and a zero-ish value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum PropertyValue {
    Int(i32),
    Float(f32),
    Vec2F(Vec2f),
    Vec2I(Vec2i),
    Bool(bool),
    String(String),
}

impl PropertyValue {
    pub fn kind(&self) -> PropertyKind {
        match self {
            PropertyValue::Int(_) => PropertyKind::Int,
            PropertyValue::Float(_) => PropertyKind::Float,
            PropertyValue::Vec2F(_) => PropertyKind::Vec2F,
            PropertyValue::Vec2I(_) => PropertyKind::Vec2I,
            PropertyValue::Bool(_) => PropertyKind::Bool,
            PropertyValue::String(_) => PropertyKind::String,
        }
    }
}

/// Property behaviour flags
///
/// Stored as a bit set; the bits are part of the schema hash, so both peers
/// must load identical flags for each template position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PropertyFlags(u8);

impl PropertyFlags {
    pub const NONE: PropertyFlags = PropertyFlags(0);
    /// Client-side dead reckoning applies to this property
    pub const PREDICT: PropertyFlags = PropertyFlags(1 << 0);
    /// Included in server->client deltas, suppressed toward the owner
    /// while the owner itself originated the change
    pub const OWNER_UPDATES: PropertyFlags = PropertyFlags(1 << 1);
    /// Writable by the owning client; carried in client->server deltas
    pub const UNLOCKED: PropertyFlags = PropertyFlags(1 << 2);

    pub const fn bits(&self) -> u8 {
        self.0
    }

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn contains(&self, other: PropertyFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for PropertyFlags {
    type Output = PropertyFlags;

    fn bitor(self, rhs: PropertyFlags) -> PropertyFlags {
        PropertyFlags(self.0 | rhs.0)
    }
}

/// Named flag as it appears in template data files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyFlag {
    Predict,
    OwnerUpdates,
    Unlocked,
}

impl PropertyFlag {
    pub fn as_flags(&self) -> PropertyFlags {
        match self {
            PropertyFlag::Predict => PropertyFlags::PREDICT,
            PropertyFlag::OwnerUpdates => PropertyFlags::OWNER_UPDATES,
            PropertyFlag::Unlocked => PropertyFlags::UNLOCKED,
        }
    }
}

/// Where a property's last change came from
///
/// The server uses this to tell an owner-originated change (already applied
/// locally by the owning client, never echoed back to it) from a
/// server-side correction (always sent, even to the owner).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChangeSource {
    /// Changed by the local simulation / authoritative logic
    #[default]
    Authority,
    /// Changed by applying the owning client's update
    Owner,
}

/// One typed, wire-serializable, change-tracked value
///
/// The change tick is the sole staleness signal: there is no dirty flag,
/// and staleness is always computed against a caller-supplied reference
/// tick.
#[derive(Debug, Clone)]
pub struct Property {
    value: PropertyValue,
    default: PropertyValue,
    flags: PropertyFlags,
    bit_width: u8,
    changed_at: Tick,
    origin: ChangeSource,
}

impl Property {
    /// Instantiate from a template definition's default
    pub fn from_default(default: PropertyValue, flags: PropertyFlags, bit_width: u8) -> Self {
        Self {
            value: default.clone(),
            default,
            flags,
            bit_width,
            changed_at: Tick::ZERO,
            origin: ChangeSource::Authority,
        }
    }

    pub fn kind(&self) -> PropertyKind {
        self.value.kind()
    }

    pub fn flags(&self) -> PropertyFlags {
        self.flags
    }

    pub fn bit_width(&self) -> u8 {
        self.bit_width
    }

    pub fn value(&self) -> &PropertyValue {
        &self.value
    }

    pub fn changed_at(&self) -> Tick {
        self.changed_at
    }

    pub fn origin(&self) -> ChangeSource {
        self.origin
    }

    /// True if this property changed after `since`
    pub fn changed_since(&self, since: Tick) -> bool {
        self.changed_at > since
    }

    /// Raw value comparison against the template default
    pub fn differs_from_default(&self) -> bool {
        self.value != self.default
    }

    /// Set the value, recording the change tick and its source
    ///
    /// The change tick only ever increases, so replaying an older tick
    /// cannot roll staleness back. Setting a value of the wrong kind is a
    /// `TypeMismatch` and leaves the property untouched.
    pub fn set(&mut self, value: PropertyValue, tick: Tick, origin: ChangeSource) -> Result<()> {
        if value.kind() != self.value.kind() {
            return Err(SyncError::TypeMismatch {
                expected: self.value.kind().as_str(),
                found: value.kind().as_str(),
            });
        }
        self.value = value;
        self.changed_at = self.changed_at.max(tick);
        self.origin = origin;
        Ok(())
    }

    // === Typed accessors ===

    pub fn as_int(&self) -> Option<i32> {
        match self.value {
            PropertyValue::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self.value {
            PropertyValue::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_vec2f(&self) -> Option<Vec2f> {
        match self.value {
            PropertyValue::Vec2F(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_vec2i(&self) -> Option<Vec2i> {
        match self.value {
            PropertyValue::Vec2I(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.value {
            PropertyValue::Bool(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            PropertyValue::String(v) => Some(v),
            _ => None,
        }
    }

    // === Wire encoding ===

    /// Serialize exactly one value
    ///
    /// # Format
    /// - `Int`: `bit_width` bits, two's complement
    /// - `Float`: 32 bits, IEEE-754
    /// - `Vec2F`: two 32-bit floats, x then y
    /// - `Vec2I`: two `bit_width`-bit signed integers, x then y
    /// - `Bool`: 1 bit
    /// - `String`: bytes + NUL
    pub fn write(&self, out: &mut BitBuffer) {
        match &self.value {
            PropertyValue::Int(v) => out.write_int(*v, self.bit_width),
            PropertyValue::Float(v) => out.write_f32(*v),
            PropertyValue::Vec2F(v) => {
                out.write_f32(v.x);
                out.write_f32(v.y);
            }
            PropertyValue::Vec2I(v) => {
                out.write_int(v.x, self.bit_width);
                out.write_int(v.y, self.bit_width);
            }
            PropertyValue::Bool(v) => out.write_bit(*v),
            PropertyValue::String(v) => out.write_str(v),
        }
    }

    /// Decode one value of `kind` from the cursor
    ///
    /// Used both to store an accepted value and to consume a rejected one:
    /// the stream must advance either way to stay positionally in sync.
    pub fn decode(kind: PropertyKind, bit_width: u8, buf: &mut BitBuffer) -> PropertyValue {
        match kind {
            PropertyKind::Int => PropertyValue::Int(buf.read_int(bit_width)),
            PropertyKind::Float => PropertyValue::Float(buf.read_f32()),
            PropertyKind::Vec2F => {
                let x = buf.read_f32();
                let y = buf.read_f32();
                PropertyValue::Vec2F(Vec2f::new(x, y))
            }
            PropertyKind::Vec2I => {
                let x = buf.read_int(bit_width);
                let y = buf.read_int(bit_width);
                PropertyValue::Vec2I(Vec2i::new(x, y))
            }
            PropertyKind::Bool => PropertyValue::Bool(buf.read_bit()),
            PropertyKind::String => PropertyValue::String(buf.read_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_prop(v: i32, width: u8) -> Property {
        Property::from_default(PropertyValue::Int(v), PropertyFlags::NONE, width)
    }

    #[test]
    fn test_typed_access() {
        let prop = int_prop(42, 16);
        assert_eq!(prop.as_int(), Some(42));
        assert_eq!(prop.as_float(), None);
        assert_eq!(prop.as_str(), None);
    }

    #[test]
    fn test_set_rejects_cross_type() {
        let mut prop = int_prop(0, 16);
        let err = prop
            .set(PropertyValue::Bool(true), Tick::new(1), ChangeSource::Authority)
            .unwrap_err();
        assert!(matches!(
            err,
            SyncError::TypeMismatch {
                expected: "Int",
                found: "Bool"
            }
        ));
        // Value and change tick untouched
        assert_eq!(prop.as_int(), Some(0));
        assert_eq!(prop.changed_at(), Tick::ZERO);
    }

    #[test]
    fn test_change_tick_is_monotonic() {
        let mut prop = int_prop(0, 16);
        prop.set(PropertyValue::Int(1), Tick::new(10), ChangeSource::Authority)
            .unwrap();
        assert_eq!(prop.changed_at(), Tick::new(10));

        // An older caller tick cannot roll the change time back
        prop.set(PropertyValue::Int(2), Tick::new(5), ChangeSource::Authority)
            .unwrap();
        assert_eq!(prop.changed_at(), Tick::new(10));
        assert_eq!(prop.as_int(), Some(2));
    }

    #[test]
    fn test_changed_since() {
        let mut prop = int_prop(0, 16);
        assert!(!prop.changed_since(Tick::ZERO));

        prop.set(PropertyValue::Int(7), Tick::new(3), ChangeSource::Authority)
            .unwrap();
        assert!(prop.changed_since(Tick::new(2)));
        assert!(!prop.changed_since(Tick::new(3)));
    }

    #[test]
    fn test_differs_from_default() {
        let mut prop = int_prop(5, 16);
        assert!(!prop.differs_from_default());
        prop.set(PropertyValue::Int(6), Tick::new(1), ChangeSource::Authority)
            .unwrap();
        assert!(prop.differs_from_default());
        prop.set(PropertyValue::Int(5), Tick::new(2), ChangeSource::Authority)
            .unwrap();
        assert!(!prop.differs_from_default());
    }

    #[test]
    fn test_roundtrip_every_kind() {
        let cases = [
            (PropertyValue::Int(-1234), 14u8),
            (PropertyValue::Float(3.25), 32),
            (PropertyValue::Vec2F(Vec2f::new(-1.5, 2.5)), 32),
            (PropertyValue::Vec2I(Vec2i::new(-40, 77)), 9),
            (PropertyValue::Bool(true), 1),
            (PropertyValue::String("grok".into()), 32),
        ];

        for (value, width) in cases {
            let prop = Property::from_default(value.clone(), PropertyFlags::NONE, width);
            let mut buf = BitBuffer::new();
            prop.write(&mut buf);
            buf.set_position(0);
            assert_eq!(Property::decode(value.kind(), width, &mut buf), value);
            assert!(!buf.overrun());
        }
    }

    #[test]
    fn test_flags() {
        let flags = PropertyFlags::PREDICT | PropertyFlags::UNLOCKED;
        assert!(flags.contains(PropertyFlags::PREDICT));
        assert!(flags.contains(PropertyFlags::UNLOCKED));
        assert!(!flags.contains(PropertyFlags::OWNER_UPDATES));
        assert_eq!(PropertyFlags::from_bits(flags.bits()), flags);
    }
}

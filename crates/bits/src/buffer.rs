//! Growable bit-addressable buffer

/// Growable, bit-addressable byte buffer
///
/// Owns a byte region and a bit-granular cursor used for both reading and
/// writing. The cursor always satisfies `0 <= position <= len() * 8`.
/// Writes grow the region on demand and never truncate; writes into the
/// middle of the buffer preserve the bits on either side of the target
/// range.
///
/// # Overrun policy
///
/// Reads past the logical end return zero values instead of failing, so a
/// truncated frame decodes to defaults rather than aborting mid-packet.
/// The sticky [`overrun`](BitBuffer::overrun) flag records that it
/// happened, which is the only way to distinguish "legitimately zero" from
/// "frame was short" — callers that care must check it after a decode pass.
#[derive(Debug, Clone, Default)]
pub struct BitBuffer {
    data: Vec<u8>,
    /// Cursor in bits
    pos: usize,
    /// Set once any read runs past the end; never cleared by reads
    overrun: bool,
}

impl BitBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap received bytes for decoding, cursor at bit 0
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self {
            data,
            pos: 0,
            overrun: false,
        }
    }

    /// Size in whole bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Cursor position in bits
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Move the cursor, clamped into `[0, len() * 8]`
    pub fn set_position(&mut self, bits: usize) {
        self.pos = bits.min(self.data.len() * 8);
    }

    /// True once any read has run past the logical end
    pub fn overrun(&self) -> bool {
        self.overrun
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    // === Bit-level primitives ===

    /// Write a single bit at the cursor, growing the buffer if needed
    pub fn write_bit(&mut self, bit: bool) {
        let byte = self.pos / 8;
        if byte == self.data.len() {
            self.data.push(0);
        }
        let mask = 0x80 >> (self.pos % 8);
        if bit {
            self.data[byte] |= mask;
        } else {
            self.data[byte] &= !mask;
        }
        self.pos += 1;
    }

    /// Read a single bit; past the end, returns `false` and sets `overrun`
    pub fn read_bit(&mut self) -> bool {
        let byte = self.pos / 8;
        if byte >= self.data.len() {
            self.overrun = true;
            return false;
        }
        let mask = 0x80 >> (self.pos % 8);
        self.pos += 1;
        self.data[byte] & mask != 0
    }

    // === Arbitrary-width integers ===

    /// Write the low `width` bits of `value`, most significant first
    ///
    /// # Panics
    /// Panics if `width` is 0 or above 32. Widths come from validated
    /// templates, never from the wire.
    pub fn write_uint(&mut self, value: u32, width: u8) {
        assert!((1..=32).contains(&width), "bit width must be 1..=32");
        for i in (0..width).rev() {
            self.write_bit(value >> i & 1 != 0);
        }
    }

    /// Read `width` bits into the low end of a `u32`
    ///
    /// # Panics
    /// Panics if `width` is 0 or above 32.
    pub fn read_uint(&mut self, width: u8) -> u32 {
        assert!((1..=32).contains(&width), "bit width must be 1..=32");
        let mut value = 0u32;
        for _ in 0..width {
            value <<= 1;
            if self.read_bit() {
                value |= 1;
            }
        }
        value
    }

    /// Write a signed integer in two's complement within `width` bits
    pub fn write_int(&mut self, value: i32, width: u8) {
        self.write_uint(value as u32, width);
    }

    /// Read a signed integer, sign-extending when `width < 32` and the top
    /// bit is set
    pub fn read_int(&mut self, width: u8) -> i32 {
        let raw = self.read_uint(width);
        if width == 32 {
            return raw as i32;
        }
        let shift = 32 - width as u32;
        ((raw << shift) as i32) >> shift
    }

    // === Fixed-size integers, network byte order ===

    pub fn write_u8(&mut self, value: u8) {
        self.write_uint(value as u32, 8);
    }

    pub fn read_u8(&mut self) -> u8 {
        self.read_uint(8) as u8
    }

    pub fn write_u16(&mut self, value: u16) {
        self.write_uint(value as u32, 16);
    }

    pub fn read_u16(&mut self) -> u16 {
        self.read_uint(16) as u16
    }

    pub fn write_u32(&mut self, value: u32) {
        self.write_uint(value, 32);
    }

    pub fn read_u32(&mut self) -> u32 {
        self.read_uint(32)
    }

    pub fn write_u64(&mut self, value: u64) {
        self.write_u32((value >> 32) as u32);
        self.write_u32(value as u32);
    }

    pub fn read_u64(&mut self) -> u64 {
        let hi = self.read_u32() as u64;
        let lo = self.read_u32() as u64;
        hi << 32 | lo
    }

    // === Floats ===

    /// Write an `f32` bit-reinterpreted as IEEE-754
    pub fn write_f32(&mut self, value: f32) {
        self.write_u32(value.to_bits());
    }

    /// Read an `f32`, bit-exact with what was written
    pub fn read_f32(&mut self) -> f32 {
        f32::from_bits(self.read_u32())
    }

    // === Strings ===

    /// Write raw string bytes followed by a NUL terminator
    ///
    /// Interior NUL bytes would terminate the string early on read; the
    /// replication layer never produces them.
    pub fn write_str(&mut self, value: &str) {
        for &b in value.as_bytes() {
            self.write_u8(b);
        }
        self.write_u8(0);
    }

    /// Read bytes until a NUL terminator or the end of the buffer
    ///
    /// Invalid UTF-8 from the wire is replaced, not rejected; a missing
    /// terminator sets `overrun`.
    pub fn read_str(&mut self) -> String {
        let mut bytes = Vec::new();
        loop {
            let b = self.read_u8();
            if b == 0 {
                break;
            }
            bytes.push(b);
        }
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

/// Byte-aligned raw append: `other`'s bytes are appended after this
/// buffer's last byte and the cursor moves to the new end
impl std::ops::AddAssign<&BitBuffer> for BitBuffer {
    fn add_assign(&mut self, other: &BitBuffer) {
        self.data.extend_from_slice(&other.data);
        self.pos = self.data.len() * 8;
    }
}

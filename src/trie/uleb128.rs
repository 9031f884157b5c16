// ULEB128 variable-length integer encoding as used by dyld.
//
// Base-128, little-endian: least-significant group first.
// Each byte carries 7 value bits; bit 7 set means "more bytes follow".
// This is the integer format of every size, flag and offset field in
// the exports-trie payload.

/// Maximum encoded length for a 64-bit value (ceil(64/7) = 10).
pub const MAX_VARINT_LEN: usize = 10;

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decode a `u64` from the front of `data`.
/// Returns `(value, bytes_consumed)` or an error.
pub fn read_u64(data: &[u8]) -> Result<(u64, usize), VarIntError> {
    let mut val: u64 = 0;
    let mut shift: u32 = 0;
    for (i, &byte) in data.iter().enumerate() {
        let group = u64::from(byte & 0x7F);
        if shift >= 64 || (shift == 63 && group > 1) {
            return Err(VarIntError::Overflow);
        }
        val |= group << shift;
        if byte & 0x80 == 0 {
            return Ok((val, i + 1));
        }
        shift += 7;
    }
    Err(VarIntError::Underflow)
}

/// Decode a `u32` from the front of `data`.
pub fn read_u32(data: &[u8]) -> Result<(u32, usize), VarIntError> {
    let mut val: u32 = 0;
    let mut shift: u32 = 0;
    for (i, &byte) in data.iter().enumerate() {
        let group = u32::from(byte & 0x7F);
        if shift >= 32 || (shift == 28 && group > 0x0F) {
            return Err(VarIntError::Overflow);
        }
        val |= group << shift;
        if byte & 0x80 == 0 {
            return Ok((val, i + 1));
        }
        shift += 7;
    }
    Err(VarIntError::Underflow)
}

/// Decode a `usize` from the front of `data`.
pub fn read_usize(data: &[u8]) -> Result<(usize, usize), VarIntError> {
    // Use u64 internally, then narrow with overflow check.
    let (val, len) = read_u64(data)?;
    let val = usize::try_from(val).map_err(|_| VarIntError::Overflow)?;
    Ok((val, len))
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Append the minimal ULEB128 encoding of `value` to `out`.
pub fn write_u64(mut value: u64, out: &mut Vec<u8>) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if value == 0 {
            break;
        }
    }
}

/// Append the minimal ULEB128 encoding of a `u32`.
pub fn write_u32(value: u32, out: &mut Vec<u8>) {
    write_u64(u64::from(value), out);
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Return the encoded byte-length of a `u64` value.
///
/// Used by the encoder's offset fixed-point pass: varint child offsets
/// change width as node offsets move.
#[inline]
pub fn encoded_len_u64(value: u64) -> usize {
    let bits = 64 - value.leading_zeros();
    (bits.max(1).div_ceil(7) as usize).min(MAX_VARINT_LEN)
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarIntError {
    /// Not enough input bytes to complete the integer.
    Underflow,
    /// Value would overflow the target integer type.
    Overflow,
}

impl VarIntError {
    /// Short reason string carried into `TrieError::MalformedVarInt`.
    pub fn reason(self) -> &'static str {
        match self {
            VarIntError::Underflow => "truncated",
            VarIntError::Overflow => "overflow",
        }
    }
}

impl std::fmt::Display for VarIntError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VarIntError::Underflow => write!(f, "varint underflow (truncated input)"),
            VarIntError::Overflow => write!(f, "varint overflow"),
        }
    }
}

impl std::error::Error for VarIntError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_u64() {
        let cases: &[u64] = &[
            0,
            1,
            127,
            128,
            255,
            256,
            16383,
            16384,
            u32::MAX as u64,
            u64::MAX,
        ];
        for &val in cases {
            let mut buf = Vec::new();
            write_u64(val, &mut buf);
            let (decoded, consumed) = read_u64(&buf).unwrap();
            assert_eq!(decoded, val, "roundtrip failed for {val}");
            assert_eq!(consumed, buf.len(), "length mismatch for {val}");
            assert_eq!(encoded_len_u64(val), buf.len(), "sizeof mismatch for {val}");
        }
    }

    #[test]
    fn encoding_is_little_endian() {
        // 128 = two groups: (0000000) then (0000001) => 0x80 0x01
        let mut buf = Vec::new();
        write_u64(128, &mut buf);
        assert_eq!(buf, vec![0x80, 0x01]);

        buf.clear();
        write_u64(16256, &mut buf);
        assert_eq!(buf, vec![0x80, 0x7F]);
    }

    #[test]
    fn single_byte_values() {
        for val in 0..=127u64 {
            let mut buf = Vec::new();
            write_u64(val, &mut buf);
            assert_eq!(buf, vec![val as u8]);
        }
    }

    #[test]
    fn overflow_detection_u32() {
        // Encode u64::MAX and try to decode as u32 -- must fail.
        let mut buf = Vec::new();
        write_u64(u64::MAX, &mut buf);
        assert_eq!(read_u32(&buf), Err(VarIntError::Overflow));
    }

    #[test]
    fn overflow_detection_u64() {
        // 11 continuation groups exceed 64 bits.
        let data = [0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x01];
        assert_eq!(read_u64(&data), Err(VarIntError::Overflow));
    }

    #[test]
    fn non_minimal_top_group_overflows_u64() {
        // Tenth byte may only carry the single remaining bit.
        let data = [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x02];
        assert_eq!(read_u64(&data), Err(VarIntError::Overflow));
    }

    #[test]
    fn underflow_detection() {
        // Truncated: all continuation bytes, no terminator.
        let data = [0x80, 0x80, 0x80];
        assert_eq!(read_u64(&data), Err(VarIntError::Underflow));
        assert_eq!(read_u64(&[]), Err(VarIntError::Underflow));
    }
}

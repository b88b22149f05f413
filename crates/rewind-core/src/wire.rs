//! Versioned binary wire format shared by all payload records.
//!
//! All integers and floats are little-endian. Strings are length-prefixed
//! with a `u32`. Collections are count-prefixed with a `u32`. There is no
//! self-describing schema: the session header carries the
//! [`WireVersion`] and every record reads field by field according to it.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::WireError;

/// Largest pre-allocation honoured for a count read off the wire.
///
/// Counts come from untrusted payloads; anything above this grows the
/// vector incrementally instead of reserving up front.
const MAX_PREALLOC: usize = 1024;

/// Version of the payload wire format.
///
/// History:
/// - v1: entity snapshots carry position, rotation and linear velocity
/// - v2: entity snapshots also carry angular velocity
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WireVersion(pub u16);

impl WireVersion {
    /// Oldest version this build can read.
    pub const MIN_SUPPORTED: Self = Self(1);
    /// Version written by this build.
    pub const CURRENT: Self = Self(2);

    /// Whether payloads of this version can be decoded.
    pub fn is_supported(self) -> bool {
        (Self::MIN_SUPPORTED..=Self::CURRENT).contains(&self)
    }

    /// Whether entity snapshots carry angular velocity.
    pub fn has_angular_velocity(self) -> bool {
        self >= Self(2)
    }
}

impl Default for WireVersion {
    fn default() -> Self {
        Self::CURRENT
    }
}

/// A record with an explicit, versioned, field-by-field encoding.
pub trait WireRecord: Sized {
    /// Write the record's fields in wire order.
    fn write_to<W: Write>(&self, w: &mut W, version: WireVersion) -> Result<(), WireError>;

    /// Read the record's fields in wire order.
    fn read_from<R: Read>(r: &mut R, version: WireVersion) -> Result<Self, WireError>;

    /// Encode into a fresh byte vector.
    fn to_bytes(&self, version: WireVersion) -> Result<Vec<u8>, WireError> {
        let mut buf = Vec::new();
        self.write_to(&mut buf, version)?;
        Ok(buf)
    }

    /// Decode from a complete byte slice. Trailing bytes are ignored.
    fn from_bytes(mut data: &[u8], version: WireVersion) -> Result<Self, WireError> {
        Self::read_from(&mut data, version)
    }
}

// ── Primitive writers ───────────────────────────────────────────

/// Write a length-prefixed UTF-8 string.
pub fn write_str<W: Write>(w: &mut W, s: &str) -> Result<(), WireError> {
    write_count(w, s.len())?;
    w.write_all(s.as_bytes())?;
    Ok(())
}

/// Write a collection count. Counts past `u32::MAX` are rejected.
pub fn write_count<W: Write>(w: &mut W, n: usize) -> Result<(), WireError> {
    let n = u32::try_from(n).map_err(|_| WireError::LengthOverflow { len: n })?;
    w.write_u32::<LittleEndian>(n)?;
    Ok(())
}

/// Write a fixed-size array of `f64`s.
pub fn write_f64s<W: Write, const N: usize>(w: &mut W, v: &[f64; N]) -> Result<(), WireError> {
    for &x in v {
        w.write_f64::<LittleEndian>(x)?;
    }
    Ok(())
}

/// Write a boolean as a single byte.
pub fn write_bool<W: Write>(w: &mut W, v: bool) -> Result<(), WireError> {
    w.write_u8(u8::from(v))?;
    Ok(())
}

// ── Primitive readers ───────────────────────────────────────────

/// Read a length-prefixed UTF-8 string.
pub fn read_str<R: Read>(r: &mut R) -> Result<String, WireError> {
    let len = r.read_u32::<LittleEndian>()? as usize;
    let mut buf = Vec::with_capacity(len.min(MAX_PREALLOC));
    Read::take(&mut *r, len as u64).read_to_end(&mut buf)?;
    if buf.len() != len {
        return Err(WireError::Truncated);
    }
    String::from_utf8(buf).map_err(|_| WireError::InvalidUtf8)
}

/// Read a collection count, returning it with a safe pre-allocation size.
pub fn read_count<R: Read>(r: &mut R) -> Result<(usize, usize), WireError> {
    let n = r.read_u32::<LittleEndian>()? as usize;
    Ok((n, n.min(MAX_PREALLOC)))
}

/// Read a fixed-size array of `f64`s.
pub fn read_f64s<R: Read, const N: usize>(r: &mut R) -> Result<[f64; N], WireError> {
    let mut out = [0.0; N];
    for slot in &mut out {
        *slot = r.read_f64::<LittleEndian>()?;
    }
    Ok(out)
}

/// Read a boolean byte. Any non-zero value is `true`.
pub fn read_bool<R: Read>(r: &mut R) -> Result<bool, WireError> {
    Ok(r.read_u8()? != 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_support_window() {
        assert!(WireVersion(1).is_supported());
        assert!(WireVersion::CURRENT.is_supported());
        assert!(!WireVersion(0).is_supported());
        assert!(!WireVersion(WireVersion::CURRENT.0 + 1).is_supported());
        assert!(!WireVersion(1).has_angular_velocity());
        assert!(WireVersion(2).has_angular_velocity());
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn oversized_count_is_rejected() {
        let mut buf = Vec::new();
        let err = write_count(&mut buf, u32::MAX as usize + 1).unwrap_err();
        assert!(matches!(err, WireError::LengthOverflow { len } if len == 1 << 32));
        assert!(buf.is_empty());
        write_count(&mut buf, u32::MAX as usize).unwrap();
        assert_eq!(buf, [0xff; 4]);
    }

    #[test]
    fn string_roundtrip() {
        let mut buf = Vec::new();
        write_str(&mut buf, "broadphase").unwrap();
        let s = read_str(&mut buf.as_slice()).unwrap();
        assert_eq!(s, "broadphase");
    }

    #[test]
    fn string_with_lying_length_is_truncated() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&100u32.to_le_bytes());
        buf.extend_from_slice(b"short");
        assert!(matches!(
            read_str(&mut buf.as_slice()),
            Err(WireError::Truncated)
        ));
    }

    #[test]
    fn invalid_utf8_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&2u32.to_le_bytes());
        buf.extend_from_slice(&[0xff, 0xfe]);
        assert!(matches!(
            read_str(&mut buf.as_slice()),
            Err(WireError::InvalidUtf8)
        ));
    }

    #[test]
    fn huge_count_does_not_preallocate() {
        let buf = u32::MAX.to_le_bytes();
        let (n, prealloc) = read_count(&mut buf.as_slice()).unwrap();
        assert_eq!(n, u32::MAX as usize);
        assert_eq!(prealloc, MAX_PREALLOC);
    }
}

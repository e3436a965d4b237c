//! Big-endian cursor primitives shared by every packet codec.

use thiserror::Error;

/// Reasons a device packet can be rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Total length does not match the fixed size of the packet type.
    #[error("{packet}: expected {expected} bytes, got {actual}")]
    Length {
        packet: &'static str,
        expected: usize,
        actual: usize,
    },
    /// A declared element count disagrees with the bytes that follow it.
    #[error("{packet}: declared count {count} needs {expected} bytes, {actual} remain")]
    CountMismatch {
        packet: &'static str,
        count: u8,
        expected: usize,
        actual: usize,
    },
    /// A field holds a value outside its allowed domain.
    #[error("{packet}: invalid {field}")]
    InvalidField {
        packet: &'static str,
        field: &'static str,
    },
    /// More than 255 elements were supplied for a u8-counted section.
    #[error("{packet}: {count} entries exceed the 255 entry limit")]
    TooManyEntries { packet: &'static str, count: usize },
}

/// Reads big-endian integers from a byte slice, tracking the offset.
pub(crate) struct Reader<'a> {
    packet: &'static str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(packet: &'static str, bytes: &'a [u8]) -> Self {
        Self {
            packet,
            bytes,
            pos: 0,
        }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], ProtocolError> {
        let end = self.pos + N;
        let chunk = self.bytes.get(self.pos..end).ok_or(ProtocolError::Length {
            packet: self.packet,
            expected: end,
            actual: self.bytes.len(),
        })?;
        self.pos = end;
        let mut out = [0u8; N];
        out.copy_from_slice(chunk);
        Ok(out)
    }

    pub(crate) fn u8(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.take::<1>()?[0])
    }

    pub(crate) fn u32(&mut self) -> Result<u32, ProtocolError> {
        Ok(u32::from_be_bytes(self.take::<4>()?))
    }

    pub(crate) fn i32(&mut self) -> Result<i32, ProtocolError> {
        Ok(i32::from_be_bytes(self.take::<4>()?))
    }

    pub(crate) fn u64(&mut self) -> Result<u64, ProtocolError> {
        Ok(u64::from_be_bytes(self.take::<8>()?))
    }

    pub(crate) fn bytes(&mut self, len: usize) -> Result<&'a [u8], ProtocolError> {
        let end = self.pos + len;
        let chunk = self.bytes.get(self.pos..end).ok_or(ProtocolError::Length {
            packet: self.packet,
            expected: end,
            actual: self.bytes.len(),
        })?;
        self.pos = end;
        Ok(chunk)
    }

    /// Reads a count byte and checks that at least `count * stride` bytes follow.
    ///
    /// With `exact` set the section must consume every remaining byte.
    pub(crate) fn counted(&mut self, stride: usize, exact: bool) -> Result<u8, ProtocolError> {
        let count = self.u8()?;
        let expected = usize::from(count) * stride;
        let actual = self.remaining();
        if actual < expected || (exact && actual != expected) {
            return Err(ProtocolError::CountMismatch {
                packet: self.packet,
                count,
                expected,
                actual,
            });
        }
        Ok(count)
    }

    /// Fails unless every byte has been consumed.
    pub(crate) fn finish(self) -> Result<(), ProtocolError> {
        if self.pos != self.bytes.len() {
            return Err(ProtocolError::Length {
                packet: self.packet,
                expected: self.pos,
                actual: self.bytes.len(),
            });
        }
        Ok(())
    }

    pub(crate) fn packet(&self) -> &'static str {
        self.packet
    }
}

/// Checks a fixed-size packet before any field is read.
pub(crate) fn expect_len(
    packet: &'static str,
    bytes: &[u8],
    expected: usize,
) -> Result<(), ProtocolError> {
    if bytes.len() != expected {
        return Err(ProtocolError::Length {
            packet,
            expected,
            actual: bytes.len(),
        });
    }
    Ok(())
}

/// Converts an element count to the u8 used on the wire.
pub(crate) fn wire_count(packet: &'static str, count: usize) -> Result<u8, ProtocolError> {
    u8::try_from(count).map_err(|_| ProtocolError::TooManyEntries { packet, count })
}

/// Writes `text` into a NUL-padded fixed-width field, truncating on a char boundary.
pub(crate) fn put_fixed_str(out: &mut Vec<u8>, text: &str, width: usize) {
    let mut end = text.len().min(width);
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    out.extend_from_slice(&text.as_bytes()[..end]);
    out.resize(out.len() + (width - end), 0);
}

/// Reads a NUL-padded fixed-width ASCII field.
pub(crate) fn get_fixed_str(
    reader: &mut Reader<'_>,
    width: usize,
    field: &'static str,
) -> Result<String, ProtocolError> {
    let packet = reader.packet();
    let raw = reader.bytes(width)?;
    let end = raw.iter().position(|&b| b == 0).unwrap_or(width);
    ascii(packet, field, &raw[..end])
}

pub(crate) fn ascii(
    packet: &'static str,
    field: &'static str,
    raw: &[u8],
) -> Result<String, ProtocolError> {
    if !raw.is_ascii() {
        return Err(ProtocolError::InvalidField { packet, field });
    }
    Ok(raw.iter().map(|&b| char::from(b)).collect())
}

/// Saturates a wide value into the i32 range used by every power field.
pub fn saturate_i32(value: i64) -> i32 {
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

// Copyright (c) 2026 Faro Project Developers. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use byteorder::{BigEndian, WriteBytesExt};
use std::io::Write;

use crate::utils::{validate_two_bytes_data, StringError};
use crate::{ByteArray, DecodeError, DecodePacket, EncodeError, EncodePacket};

/// Binary Data is represented by a big-endian two byte length followed by
/// that many bytes, 0..=65535.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct BinaryData(Vec<u8>);

impl BinaryData {
    /// Create an empty binary data.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Convert byte slice into binary data.
    ///
    /// # Errors
    ///
    /// Returns error if slice is longer than 65535 bytes.
    pub fn from_slice(data: &[u8]) -> Result<Self, StringError> {
        validate_two_bytes_data(data)?;
        Ok(Self(data.to_vec()))
    }

    /// Get byte length in packet.
    #[must_use]
    pub fn bytes(&self) -> usize {
        2 + self.0.len()
    }

    /// Returns true if data is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get length of inner data.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Consume and return the inner bytes.
    #[must_use]
    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }
}

impl AsRef<[u8]> for BinaryData {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl DecodePacket for BinaryData {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let len = ba.read_u16()?;
        let bytes = ba.read_bytes(len as usize)?;
        Ok(Self(bytes.to_vec()))
    }
}

impl EncodePacket for BinaryData {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        #[allow(clippy::cast_possible_truncation)]
        let len = self.0.len() as u16;
        buf.write_u16::<BigEndian>(len)?;
        buf.write_all(&self.0)?;
        Ok(self.bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let data = BinaryData::from_slice(&[0xde, 0xad]).unwrap();
        let mut buf = Vec::new();
        assert_eq!(data.encode(&mut buf).unwrap(), 4);
        let mut ba = ByteArray::new(&buf);
        assert_eq!(BinaryData::decode(&mut ba).unwrap(), data);
    }
}

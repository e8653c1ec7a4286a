// Copyright (c) 2026 Faro Project Developers. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use byteorder::{BigEndian, WriteBytesExt};
use std::fmt;
use std::io::Write;

use crate::utils::{validate_utf8_string, StringError};
use crate::{ByteArray, DecodeError, DecodePacket, EncodeError, EncodePacket};

/// Text fields within MQTT control packets are encoded as UTF-8 strings,
/// prefixed with a big-endian two byte length:
///
/// ```text
/// +-------------------+
/// | String Length     |
/// |                   |
/// +-------------------+
/// | String bytes ...  |
/// +-------------------+
/// ```
///
/// Length is therefore limited to 0..=65535 bytes, and the character data
/// must satisfy MQTT-1.5.4 (no U+0000, no control characters, no
/// non-characters).
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct StringData(String);

impl StringData {
    /// Create an empty string data.
    #[must_use]
    pub const fn new() -> Self {
        Self(String::new())
    }

    /// Convert string slice into string data.
    ///
    /// # Errors
    ///
    /// Returns error if string slice is too long or contains invalid chars.
    pub fn from(s: &str) -> Result<Self, StringError> {
        validate_utf8_string(s)?;
        Ok(Self(s.to_string()))
    }

    /// Get byte length in packet.
    #[must_use]
    pub fn bytes(&self) -> usize {
        2 + self.0.len()
    }

    /// Returns true if string data is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consume and return the inner string.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for StringData {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for StringData {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl DecodePacket for StringData {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let len = ba.read_u16()?;
        let s = ba.read_string(len as usize)?;
        Ok(Self(s))
    }
}

impl EncodePacket for StringData {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        #[allow(clippy::cast_possible_truncation)]
        let len = self.0.len() as u16;
        buf.write_u16::<BigEndian>(len)?;
        buf.write_all(self.0.as_bytes())?;
        Ok(self.bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let s = StringData::from("faro").unwrap();
        let mut buf = Vec::new();
        assert_eq!(s.encode(&mut buf).unwrap(), 6);
        assert_eq!(&buf, &[0x00, 0x04, b'f', b'a', b'r', b'o']);

        let mut ba = ByteArray::new(&buf);
        assert_eq!(StringData::decode(&mut ba).unwrap(), s);
    }

    #[test]
    fn test_decode_rejects_nul() {
        let buf = [0x00, 0x01, 0x00];
        let mut ba = ByteArray::new(&buf);
        assert!(StringData::decode(&mut ba).is_err());
    }
}

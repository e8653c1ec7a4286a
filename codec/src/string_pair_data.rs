// Copyright (c) 2026 Faro Project Developers. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use crate::utils::StringError;
use crate::{ByteArray, DecodeError, DecodePacket, EncodeError, EncodePacket, StringData};

/// A UTF-8 String Pair consists of two UTF-8 encoded strings, used to hold a
/// name-value pair. The name is allowed to repeat across pairs.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct StringPairData {
    name: StringData,
    value: StringData,
}

impl StringPairData {
    /// Create a new string pair.
    ///
    /// # Errors
    ///
    /// Returns error if either string is invalid.
    pub fn from(name: &str, value: &str) -> Result<Self, StringError> {
        Ok(Self {
            name: StringData::from(name)?,
            value: StringData::from(value)?,
        })
    }

    /// Get byte length in packet.
    #[must_use]
    pub fn bytes(&self) -> usize {
        self.name.bytes() + self.value.bytes()
    }

    /// Get name part.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_ref()
    }

    /// Get value part.
    #[must_use]
    pub fn value(&self) -> &str {
        self.value.as_ref()
    }
}

impl DecodePacket for StringPairData {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let name = StringData::decode(ba)?;
        let value = StringData::decode(ba)?;
        Ok(Self { name, value })
    }
}

impl EncodePacket for StringPairData {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        let n = self.name.encode(buf)?;
        let v = self.value.encode(buf)?;
        Ok(n + v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let pair = StringPairData::from("region", "es").unwrap();
        let mut buf = Vec::new();
        assert_eq!(pair.encode(&mut buf).unwrap(), pair.bytes());
        let mut ba = ByteArray::new(&buf);
        assert_eq!(StringPairData::decode(&mut ba).unwrap(), pair);
    }
}

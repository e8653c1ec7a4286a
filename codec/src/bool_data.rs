// Copyright (c) 2026 Faro Project Developers. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use crate::{ByteArray, DecodeError, DecodePacket, EncodeError, EncodePacket};

/// A single byte holding 0 or 1. Any other value is a protocol error.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct BoolData(bool);

impl BoolData {
    #[must_use]
    pub const fn new(value: bool) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn value(&self) -> bool {
        self.0
    }

    /// Get byte length used in packet.
    #[must_use]
    pub const fn bytes() -> usize {
        1
    }
}

impl DecodePacket for BoolData {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        match ba.read_byte()? {
            0 => Ok(Self(false)),
            1 => Ok(Self(true)),
            _ => Err(DecodeError::InvalidPropertyValue),
        }
    }
}

impl EncodePacket for BoolData {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        buf.push(u8::from(self.0));
        Ok(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode() {
        let buf = [0x01, 0x00, 0x02];
        let mut ba = ByteArray::new(&buf);
        assert_eq!(BoolData::decode(&mut ba).unwrap().value(), true);
        assert_eq!(BoolData::decode(&mut ba).unwrap().value(), false);
        assert_eq!(
            BoolData::decode(&mut ba),
            Err(DecodeError::InvalidPropertyValue)
        );
    }
}

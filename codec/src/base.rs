// Copyright (c) 2026 Faro Project Developers. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use serde::{Deserialize, Serialize};
use std::convert::TryFrom;

use crate::{ByteArray, DecodeError, EncodeError};

/// Parse object from byte stream.
pub trait DecodePacket: Sized {
    /// Parse packet from byte array.
    ///
    /// # Errors
    ///
    /// Returns error if byte array is malformed.
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError>;
}

/// Serialize object to byte stream.
pub trait EncodePacket {
    /// Append packet bytes to buffer.
    ///
    /// Returns number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns error if packet contains invalid data.
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError>;
}

/// Quality of service level of message delivery.
#[repr(u8)]
#[derive(
    Clone, Copy, Debug, Default, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum QoS {
    /// At most once delivery.
    #[default]
    AtMostOnce = 0,

    /// At least once delivery.
    AtLeastOnce = 1,

    /// Exactly once delivery.
    ExactOnce = 2,
}

impl QoS {
    /// Get byte length used in packet.
    #[must_use]
    pub const fn bytes() -> usize {
        1
    }
}

impl TryFrom<u8> for QoS {
    type Error = DecodeError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Self::AtMostOnce),
            1 => Ok(Self::AtLeastOnce),
            2 => Ok(Self::ExactOnce),
            _ => Err(DecodeError::InvalidQoS),
        }
    }
}

impl DecodePacket for QoS {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let byte = ba.read_byte()?;
        Self::try_from(byte)
    }
}

impl EncodePacket for QoS {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        buf.push(*self as u8);
        Ok(1)
    }
}

/// Protocol version used by a connection.
///
/// The version byte in CONNECT may carry bit 0x80 to mark a bridge client;
/// that bit is stripped before mapping to a level and reported separately.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum ProtocolLevel {
    /// MQTT 3.1, protocol name "MQIsdp".
    V31 = 3,

    /// MQTT 3.1.1, protocol name "MQTT".
    #[default]
    V311 = 4,

    /// MQTT 5.0, protocol name "MQTT".
    V5 = 5,
}

impl ProtocolLevel {
    /// Get byte length used in packet.
    #[must_use]
    pub const fn bytes() -> usize {
        1
    }

    /// Protocol name string announced in the CONNECT variable header.
    #[must_use]
    pub const fn protocol_name(self) -> &'static str {
        match self {
            Self::V31 => "MQIsdp",
            Self::V311 | Self::V5 => "MQTT",
        }
    }
}

impl TryFrom<u8> for ProtocolLevel {
    type Error = DecodeError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            3 => Ok(Self::V31),
            4 => Ok(Self::V311),
            5 => Ok(Self::V5),
            _ => Err(DecodeError::InvalidProtocolLevel),
        }
    }
}

impl ProtocolLevel {
    /// Peek the protocol level of a raw CONNECT packet without parsing the
    /// whole packet, so the caller can pick the v3 or v5 parser.
    ///
    /// # Errors
    ///
    /// Returns error if the buffer is not a CONNECT packet prefix with a
    /// known protocol name and level.
    pub fn peek(buf: &[u8]) -> Result<Self, DecodeError> {
        use crate::{FixedHeader, PacketType, StringData};

        let mut ba = ByteArray::new(buf);
        let fixed_header = FixedHeader::decode(&mut ba)?;
        if fixed_header.packet_type() != PacketType::Connect {
            return Err(DecodeError::InvalidPacketType);
        }
        let protocol_name = StringData::decode(&mut ba)?;
        let level_byte = ba.read_byte()?;
        let level = Self::try_from(level_byte & 0x7f)?;
        if protocol_name.as_ref() != level.protocol_name() {
            return Err(DecodeError::InvalidProtocolName);
        }
        Ok(level)
    }
}

impl EncodePacket for ProtocolLevel {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        buf.push(*self as u8);
        Ok(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qos_try_from() {
        assert_eq!(QoS::try_from(0), Ok(QoS::AtMostOnce));
        assert_eq!(QoS::try_from(2), Ok(QoS::ExactOnce));
        assert_eq!(QoS::try_from(3), Err(DecodeError::InvalidQoS));
    }

    #[test]
    fn test_protocol_name() {
        assert_eq!(ProtocolLevel::V31.protocol_name(), "MQIsdp");
        assert_eq!(ProtocolLevel::V5.protocol_name(), "MQTT");
    }
}

// Copyright (c) 2026 Faro Project Developers. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use super::property::check_property_type_list;
use super::{FixedHeader, Packet, PacketType, Properties, PropertyType, ReasonCode};
use crate::{
    ByteArray, DecodeError, DecodePacket, EncodeError, EncodePacket, PacketId, VarIntError,
};

/// Properties allowed in a PUBACK packet.
pub const PUBLISH_ACK_PROPERTIES: &[PropertyType] =
    &[PropertyType::ReasonString, PropertyType::UserProperty];

/// Reason codes allowed in a PUBACK packet.
pub const PUBLISH_ACK_REASONS: &[ReasonCode] = &[
    ReasonCode::Success,
    ReasonCode::NoMatchingSubscribers,
    ReasonCode::UnspecifiedError,
    ReasonCode::ImplementationSpecificError,
    ReasonCode::NotAuthorized,
    ReasonCode::TopicNameInvalid,
    ReasonCode::PacketIdentifierInUse,
    ReasonCode::QuotaExceeded,
    ReasonCode::PayloadFormatInvalid,
];

/// MQTT 5.0 PUBACK packet, the response to a `QoS` 1 PUBLISH.
///
/// The reason code and the property length can be omitted on the wire when
/// the reason is 0x00 and there are no properties.
#[allow(clippy::module_name_repetitions)]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PublishAckPacket {
    packet_id: PacketId,
    reason_code: ReasonCode,
    properties: Properties,
}

impl PublishAckPacket {
    #[must_use]
    pub fn new(packet_id: PacketId) -> Self {
        Self {
            packet_id,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_reason(packet_id: PacketId, reason_code: ReasonCode) -> Self {
        Self {
            packet_id,
            reason_code,
            properties: Properties::new(),
        }
    }

    #[must_use]
    pub const fn packet_id(&self) -> PacketId {
        self.packet_id
    }

    #[must_use]
    pub const fn reason_code(&self) -> ReasonCode {
        self.reason_code
    }

    pub fn properties_mut(&mut self) -> &mut Properties {
        &mut self.properties
    }

    #[must_use]
    pub const fn properties(&self) -> &Properties {
        &self.properties
    }

    fn get_fixed_header(&self) -> Result<FixedHeader, VarIntError> {
        let remaining_length =
            if self.reason_code == ReasonCode::Success && self.properties.is_empty() {
                PacketId::bytes()
            } else {
                PacketId::bytes() + ReasonCode::bytes() + self.properties.bytes()
            };
        FixedHeader::new(PacketType::PublishAck, remaining_length)
    }
}

impl EncodePacket for PublishAckPacket {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        let old_len = buf.len();
        let fixed_header = self.get_fixed_header()?;
        fixed_header.encode(buf)?;

        self.packet_id.encode(buf)?;
        if self.reason_code != ReasonCode::Success || !self.properties.is_empty() {
            self.reason_code.encode(buf)?;
            self.properties.encode(buf)?;
        }
        Ok(buf.len() - old_len)
    }
}

impl DecodePacket for PublishAckPacket {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let fixed_header = FixedHeader::decode(ba)?;
        if fixed_header.packet_type() != PacketType::PublishAck {
            return Err(DecodeError::InvalidPacketType);
        }

        let packet_id = PacketId::decode(ba)?;

        let remaining = fixed_header.remaining_length();
        let (reason_code, properties) = if remaining == PacketId::bytes() {
            (ReasonCode::Success, Properties::new())
        } else {
            let reason_code = ReasonCode::decode(ba)?;
            let properties = if remaining > PacketId::bytes() + ReasonCode::bytes() {
                let properties = Properties::decode(ba)?;
                check_property_type_list(properties.props(), PUBLISH_ACK_PROPERTIES)?;
                properties
            } else {
                Properties::new()
            };
            (reason_code, properties)
        };

        if !PUBLISH_ACK_REASONS.contains(&reason_code) {
            return Err(DecodeError::InvalidReasonCode);
        }

        Ok(Self {
            packet_id,
            reason_code,
            properties,
        })
    }
}

impl Packet for PublishAckPacket {
    fn packet_type(&self) -> PacketType {
        PacketType::PublishAck
    }

    fn bytes(&self) -> Result<usize, VarIntError> {
        let fixed_header = self.get_fixed_header()?;
        Ok(fixed_header.bytes() + fixed_header.remaining_length())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_form() {
        let packet = PublishAckPacket::new(PacketId::new(0x1234));
        let mut buf = Vec::new();
        packet.encode(&mut buf).unwrap();
        assert_eq!(&buf, &[0x40, 0x02, 0x12, 0x34]);
        let mut ba = ByteArray::new(&buf);
        let decoded = PublishAckPacket::decode(&mut ba).unwrap();
        assert_eq!(decoded.reason_code(), ReasonCode::Success);
    }

    #[test]
    fn test_with_reason() {
        let packet =
            PublishAckPacket::with_reason(PacketId::new(5), ReasonCode::NoMatchingSubscribers);
        let mut buf = Vec::new();
        packet.encode(&mut buf).unwrap();
        let mut ba = ByteArray::new(&buf);
        let decoded = PublishAckPacket::decode(&mut ba).unwrap();
        assert_eq!(decoded.reason_code(), ReasonCode::NoMatchingSubscribers);
    }

    #[test]
    fn test_decode_rejects_foreign_reason() {
        // SessionTakenOver is not a PUBACK reason.
        let buf = [0x40, 0x03, 0x00, 0x05, 0x8e];
        let mut ba = ByteArray::new(&buf);
        assert_eq!(
            PublishAckPacket::decode(&mut ba),
            Err(DecodeError::InvalidReasonCode)
        );
    }
}

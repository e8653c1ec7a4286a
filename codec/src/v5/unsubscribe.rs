// Copyright (c) 2026 Faro Project Developers. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use super::property::check_property_type_list;
use super::{FixedHeader, Packet, PacketType, Properties, PropertyType};
use crate::{
    ByteArray, DecodeError, DecodePacket, EncodeError, EncodePacket, PacketId, SubTopic,
    VarIntError,
};

/// Properties allowed in an UNSUBSCRIBE packet.
pub const UNSUBSCRIBE_PROPERTIES: &[PropertyType] = &[PropertyType::UserProperty];

/// MQTT 5.0 UNSUBSCRIBE packet.
#[allow(clippy::module_name_repetitions)]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UnsubscribePacket {
    packet_id: PacketId,

    properties: Properties,

    /// At least one topic filter must be present [MQTT-3.10.3-2].
    topics: Vec<SubTopic>,
}

impl UnsubscribePacket {
    /// Create an unsubscribe packet with one topic filter.
    ///
    /// # Errors
    ///
    /// Returns error if `topic` is an invalid filter.
    pub fn new(topic: &str, packet_id: PacketId) -> Result<Self, EncodeError> {
        let topic = SubTopic::new(topic)?;
        Ok(Self {
            packet_id,
            properties: Properties::new(),
            topics: vec![topic],
        })
    }

    #[must_use]
    pub const fn with_topics(packet_id: PacketId, topics: Vec<SubTopic>) -> Self {
        Self {
            packet_id,
            properties: Properties::new(),
            topics,
        }
    }

    #[must_use]
    pub const fn packet_id(&self) -> PacketId {
        self.packet_id
    }

    pub fn properties_mut(&mut self) -> &mut Properties {
        &mut self.properties
    }

    #[must_use]
    pub const fn properties(&self) -> &Properties {
        &self.properties
    }

    #[must_use]
    pub fn topics(&self) -> &[SubTopic] {
        &self.topics
    }
}

impl EncodePacket for UnsubscribePacket {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        let old_len = buf.len();
        let topics_bytes: usize = self.topics.iter().map(SubTopic::bytes).sum();
        let remaining_length = PacketId::bytes() + self.properties.bytes() + topics_bytes;
        let fixed_header = FixedHeader::new(PacketType::Unsubscribe, remaining_length)?;
        fixed_header.encode(buf)?;

        self.packet_id.encode(buf)?;
        self.properties.encode(buf)?;
        for topic in &self.topics {
            topic.encode(buf)?;
        }
        Ok(buf.len() - old_len)
    }
}

impl DecodePacket for UnsubscribePacket {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let fixed_header = FixedHeader::decode(ba)?;
        if fixed_header.packet_type() != PacketType::Unsubscribe {
            return Err(DecodeError::InvalidPacketType);
        }

        let start_offset = ba.offset();
        let packet_id = PacketId::decode(ba)?;
        if packet_id.value() == 0 {
            return Err(DecodeError::InvalidPacketId);
        }

        let properties = Properties::decode(ba)?;
        check_property_type_list(properties.props(), UNSUBSCRIBE_PROPERTIES)?;

        let consumed = ba.offset() - start_offset;
        let mut remaining = fixed_header
            .remaining_length()
            .checked_sub(consumed)
            .ok_or(DecodeError::InvalidRemainingLength)?;
        let mut topics = Vec::new();
        while remaining > 0 {
            let topic = SubTopic::decode(ba)?;
            remaining = remaining
                .checked_sub(topic.bytes())
                .ok_or(DecodeError::InvalidRemainingLength)?;
            topics.push(topic);
        }

        if topics.is_empty() {
            return Err(DecodeError::EmptyTopicFilter);
        }

        Ok(Self {
            packet_id,
            properties,
            topics,
        })
    }
}

impl Packet for UnsubscribePacket {
    fn packet_type(&self) -> PacketType {
        PacketType::Unsubscribe
    }

    fn bytes(&self) -> Result<usize, VarIntError> {
        let topics_bytes: usize = self.topics.iter().map(SubTopic::bytes).sum();
        let fixed_header = FixedHeader::new(
            PacketType::Unsubscribe,
            PacketId::bytes() + self.properties.bytes() + topics_bytes,
        )?;
        Ok(fixed_header.bytes() + fixed_header.remaining_length())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let packet = UnsubscribePacket::new("tank/+/level", PacketId::new(30)).unwrap();
        let mut buf = Vec::new();
        packet.encode(&mut buf).unwrap();
        let mut ba = ByteArray::new(&buf);
        assert_eq!(UnsubscribePacket::decode(&mut ba).unwrap(), packet);
    }
}

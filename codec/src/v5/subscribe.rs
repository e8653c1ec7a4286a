// Copyright (c) 2026 Faro Project Developers. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use std::convert::TryFrom;

use super::property::{check_multiple_subscription_identifiers, check_property_type_list};
use super::{FixedHeader, Packet, PacketType, Properties, PropertyType};
use crate::{
    ByteArray, DecodeError, DecodePacket, EncodeError, EncodePacket, PacketId, QoS, SubTopic,
    VarIntError,
};

/// Properties allowed in a SUBSCRIBE packet.
pub const SUBSCRIBE_PROPERTIES: &[PropertyType] = &[
    PropertyType::SubscriptionIdentifier,
    PropertyType::UserProperty,
];

/// Retain Handling subscription option, bits 4 and 5 of the subscription
/// options byte.
#[repr(u8)]
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    serde::Serialize,
    serde::Deserialize,
)]
pub enum RetainHandling {
    /// Send retained messages at the time of the subscribe.
    #[default]
    Send = 0,

    /// Send retained messages only if the subscription does not currently
    /// exist.
    SendFirst = 1,

    /// Do not send retained messages at the time of the subscribe.
    NoSend = 2,
}

impl TryFrom<u8> for RetainHandling {
    type Error = DecodeError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Self::Send),
            1 => Ok(Self::SendFirst),
            2 => Ok(Self::NoSend),
            _ => Err(DecodeError::InvalidPacketFlags),
        }
    }
}

/// Topic filter plus subscription options requested in a SUBSCRIBE packet.
#[allow(clippy::module_name_repetitions)]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubscribeTopic {
    topic: SubTopic,

    /// Bits 0 and 1, maximum `QoS` the server may use for this filter.
    /// Value 3 is a protocol error.
    qos: QoS,

    /// Bit 2; if set, messages must not be forwarded to a connection with a
    /// client id equal to the publisher's [MQTT-3.8.3-3].
    no_local: bool,

    /// Bit 3; if set, forwarded messages keep the RETAIN flag they were
    /// published with.
    retain_as_published: bool,

    /// Bits 4 and 5.
    retain_handling: RetainHandling,
}

impl SubscribeTopic {
    /// Create a new subscribe topic.
    ///
    /// # Errors
    ///
    /// Returns error if `topic` is an invalid filter.
    pub fn new(topic: &str, qos: QoS) -> Result<Self, EncodeError> {
        let topic = SubTopic::new(topic)?;
        Ok(Self {
            topic,
            qos,
            ..Self::default()
        })
    }

    #[must_use]
    pub fn topic(&self) -> &str {
        self.topic.as_ref()
    }

    pub fn set_qos(&mut self, qos: QoS) -> &mut Self {
        self.qos = qos;
        self
    }

    #[must_use]
    pub const fn qos(&self) -> QoS {
        self.qos
    }

    pub fn set_no_local(&mut self, no_local: bool) -> &mut Self {
        self.no_local = no_local;
        self
    }

    #[must_use]
    pub const fn no_local(&self) -> bool {
        self.no_local
    }

    pub fn set_retain_as_published(&mut self, retain_as_published: bool) -> &mut Self {
        self.retain_as_published = retain_as_published;
        self
    }

    #[must_use]
    pub const fn retain_as_published(&self) -> bool {
        self.retain_as_published
    }

    pub fn set_retain_handling(&mut self, retain_handling: RetainHandling) -> &mut Self {
        self.retain_handling = retain_handling;
        self
    }

    #[must_use]
    pub const fn retain_handling(&self) -> RetainHandling {
        self.retain_handling
    }

    #[must_use]
    pub fn bytes(&self) -> usize {
        self.topic.bytes() + 1
    }
}

impl EncodePacket for SubscribeTopic {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        self.topic.encode(buf)?;
        let mut flag: u8 = self.qos as u8;
        if self.no_local {
            flag |= 0b0000_0100;
        }
        if self.retain_as_published {
            flag |= 0b0000_1000;
        }
        flag |= (self.retain_handling as u8) << 4;
        buf.push(flag);

        Ok(self.bytes())
    }
}

impl DecodePacket for SubscribeTopic {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let topic = SubTopic::decode(ba)?;

        let flag = ba.read_byte()?;
        // Bits 6 and 7 of the subscription options byte are reserved for
        // future use and MUST be set to 0 [MQTT-3.8.3-5].
        if flag & 0b1100_0000 != 0 {
            return Err(DecodeError::InvalidPacketFlags);
        }

        let qos = QoS::try_from(flag & 0b0000_0011)?;
        let no_local = (flag & 0b0000_0100) == 0b0000_0100;
        let retain_as_published = (flag & 0b0000_1000) == 0b0000_1000;
        let retain_handling = RetainHandling::try_from((flag & 0b0011_0000) >> 4)?;

        Ok(Self {
            topic,
            qos,
            no_local,
            retain_as_published,
            retain_handling,
        })
    }
}

/// MQTT 5.0 SUBSCRIBE packet.
#[allow(clippy::module_name_repetitions)]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SubscribePacket {
    packet_id: PacketId,

    properties: Properties,

    /// At least one topic filter must be present [MQTT-3.8.3-2].
    topics: Vec<SubscribeTopic>,
}

impl SubscribePacket {
    /// Create a subscribe packet with one topic filter.
    ///
    /// # Errors
    ///
    /// Returns error if `topic` is an invalid filter.
    pub fn new(topic: &str, qos: QoS, packet_id: PacketId) -> Result<Self, EncodeError> {
        let topic = SubscribeTopic::new(topic, qos)?;
        Ok(Self {
            packet_id,
            properties: Properties::new(),
            topics: vec![topic],
        })
    }

    #[must_use]
    pub const fn with_topics(packet_id: PacketId, topics: Vec<SubscribeTopic>) -> Self {
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
    pub fn topics(&self) -> &[SubscribeTopic] {
        &self.topics
    }
}

impl EncodePacket for SubscribePacket {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        let old_len = buf.len();

        let topics_bytes: usize = self.topics.iter().map(SubscribeTopic::bytes).sum();
        let remaining_length = PacketId::bytes() + self.properties.bytes() + topics_bytes;
        let fixed_header = FixedHeader::new(PacketType::Subscribe, remaining_length)?;
        fixed_header.encode(buf)?;

        self.packet_id.encode(buf)?;
        self.properties.encode(buf)?;
        for topic in &self.topics {
            topic.encode(buf)?;
        }

        Ok(buf.len() - old_len)
    }
}

impl DecodePacket for SubscribePacket {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let fixed_header = FixedHeader::decode(ba)?;
        if fixed_header.packet_type() != PacketType::Subscribe {
            return Err(DecodeError::InvalidPacketType);
        }

        let start_offset = ba.offset();

        let packet_id = PacketId::decode(ba)?;
        if packet_id.value() == 0 {
            return Err(DecodeError::InvalidPacketId);
        }

        let properties = Properties::decode(ba)?;
        check_property_type_list(properties.props(), SUBSCRIBE_PROPERTIES)?;
        check_multiple_subscription_identifiers(properties.props())?;

        let consumed = ba.offset() - start_offset;
        let mut remaining = fixed_header
            .remaining_length()
            .checked_sub(consumed)
            .ok_or(DecodeError::InvalidRemainingLength)?;
        let mut topics = Vec::new();
        while remaining > 0 {
            let topic = SubscribeTopic::decode(ba)?;
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

impl Packet for SubscribePacket {
    fn packet_type(&self) -> PacketType {
        PacketType::Subscribe
    }

    fn bytes(&self) -> Result<usize, VarIntError> {
        let topics_bytes: usize = self.topics.iter().map(SubscribeTopic::bytes).sum();
        let fixed_header = FixedHeader::new(
            PacketType::Subscribe,
            PacketId::bytes() + self.properties.bytes() + topics_bytes,
        )?;
        Ok(fixed_header.bytes() + fixed_header.remaining_length())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::v5::Property;
    use crate::VarInt;

    #[test]
    fn test_round_trip() {
        let mut topic = SubscribeTopic::new("tank/+/level", QoS::ExactOnce).unwrap();
        topic
            .set_no_local(true)
            .set_retain_handling(RetainHandling::SendFirst);
        let mut packet = SubscribePacket::with_topics(PacketId::new(17), vec![topic]);
        packet
            .properties_mut()
            .push(Property::SubscriptionIdentifier(VarInt::from(9).unwrap()));

        let mut buf = Vec::new();
        packet.encode(&mut buf).unwrap();
        let mut ba = ByteArray::new(&buf);
        let decoded = SubscribePacket::decode(&mut ba).unwrap();
        assert_eq!(decoded, packet);
        assert_eq!(decoded.properties().subscription_identifier(), Some(9));
    }

    #[test]
    fn test_decode_rejects_reserved_option_bits() {
        let buf = [
            0x82, 0x09, 0x00, 0x01, 0x00, 0x00, 0x01, b'a', 0b0100_0000,
        ];
        let mut ba = ByteArray::new(&buf);
        assert_eq!(
            SubscribePacket::decode(&mut ba),
            Err(DecodeError::InvalidPacketFlags)
        );
    }

    #[test]
    fn test_decode_rejects_retain_handling_3() {
        let buf = [
            0x82, 0x09, 0x00, 0x01, 0x00, 0x00, 0x01, b'a', 0b0011_0000,
        ];
        let mut ba = ByteArray::new(&buf);
        assert_eq!(
            SubscribePacket::decode(&mut ba),
            Err(DecodeError::InvalidPacketFlags)
        );
    }
}

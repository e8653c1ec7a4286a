// Copyright (c) 2026 Faro Project Developers. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use std::io::Write;

use super::property::check_property_type_list;
use super::{FixedHeader, Packet, PacketType, Properties, PropertyType};
use crate::{
    ByteArray, DecodeError, DecodePacket, EncodeError, EncodePacket, PacketId, PubTopic, QoS,
    StringData, VarIntError,
};

/// Properties allowed in a PUBLISH packet.
pub const PUBLISH_PROPERTIES: &[PropertyType] = &[
    PropertyType::PayloadFormatIndicator,
    PropertyType::MessageExpiryInterval,
    PropertyType::TopicAlias,
    PropertyType::ResponseTopic,
    PropertyType::CorrelationData,
    PropertyType::UserProperty,
    PropertyType::SubscriptionIdentifier,
    PropertyType::ContentType,
];

/// MQTT 5.0 PUBLISH packet.
///
/// The topic name may be empty when a `topic-alias` property carries a
/// previously established alias; it is a protocol error if the topic is
/// empty and there is no alias.
#[allow(clippy::module_name_repetitions)]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PublishPacket {
    /// The DUP flag MUST be set to 0 for all QoS 0 messages [MQTT-3.3.1-2].
    dup: bool,

    qos: QoS,

    retain: bool,

    /// Empty together with a `topic-alias` property.
    topic: Option<PubTopic>,

    packet_id: PacketId,

    properties: Properties,

    msg: Vec<u8>,
}

impl PublishPacket {
    /// Create a new publish packet.
    ///
    /// # Errors
    ///
    /// Returns error if `topic` is invalid.
    pub fn new(topic: &str, qos: QoS, msg: &[u8]) -> Result<Self, EncodeError> {
        let topic = PubTopic::new(topic)?;
        Ok(Self {
            qos,
            topic: Some(topic),
            msg: msg.to_vec(),
            ..Self::default()
        })
    }

    pub fn set_retain(&mut self, retain: bool) -> &mut Self {
        self.retain = retain;
        self
    }

    #[must_use]
    pub const fn retain(&self) -> bool {
        self.retain
    }

    /// Update `dup` flag.
    ///
    /// # Errors
    ///
    /// Returns error if `dup` flag is set on a `QoS` 0 packet.
    pub fn set_dup(&mut self, dup: bool) -> Result<&mut Self, EncodeError> {
        if dup && self.qos == QoS::AtMostOnce {
            return Err(EncodeError::InvalidPacketType);
        }
        self.dup = dup;
        Ok(self)
    }

    #[must_use]
    pub const fn dup(&self) -> bool {
        self.dup
    }

    pub fn set_qos(&mut self, qos: QoS) -> &mut Self {
        if qos == QoS::AtMostOnce {
            self.packet_id = PacketId::new(0);
        }
        self.qos = qos;
        self
    }

    #[must_use]
    pub const fn qos(&self) -> QoS {
        self.qos
    }

    pub fn set_packet_id(&mut self, packet_id: PacketId) -> &mut Self {
        self.packet_id = packet_id;
        self
    }

    #[must_use]
    pub const fn packet_id(&self) -> PacketId {
        self.packet_id
    }

    /// Update topic value.
    ///
    /// # Errors
    ///
    /// Returns error if `topic` is invalid.
    pub fn set_topic(&mut self, topic: &str) -> Result<&mut Self, EncodeError> {
        if topic.is_empty() {
            self.topic = None;
        } else {
            self.topic = Some(PubTopic::new(topic)?);
        }
        Ok(self)
    }

    /// Topic name, empty when only a topic alias is carried.
    #[must_use]
    pub fn topic(&self) -> &str {
        self.topic.as_ref().map_or("", AsRef::as_ref)
    }

    pub fn properties_mut(&mut self) -> &mut Properties {
        &mut self.properties
    }

    #[must_use]
    pub const fn properties(&self) -> &Properties {
        &self.properties
    }

    #[must_use]
    pub fn message(&self) -> &[u8] {
        &self.msg
    }

    fn topic_bytes(&self) -> usize {
        self.topic.as_ref().map_or(2, PubTopic::bytes)
    }

    fn get_fixed_header(&self) -> Result<FixedHeader, VarIntError> {
        let mut remaining_length =
            self.topic_bytes() + self.properties.bytes() + self.msg.len();
        if self.qos != QoS::AtMostOnce {
            remaining_length += PacketId::bytes();
        }

        let packet_type = PacketType::Publish {
            dup: self.dup,
            retain: self.retain,
            qos: self.qos,
        };
        FixedHeader::new(packet_type, remaining_length)
    }
}

impl DecodePacket for PublishPacket {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let fixed_header = FixedHeader::decode(ba)?;

        let PacketType::Publish { dup, qos, retain } = fixed_header.packet_type() else {
            return Err(DecodeError::InvalidPacketType);
        };

        // The DUP flag MUST be set to 0 for all QoS 0 messages [MQTT-3.3.1-2].
        if dup && qos == QoS::AtMostOnce {
            return Err(DecodeError::InvalidPacketFlags);
        }

        let start_offset = ba.offset();

        // Zero-length topic is tolerated here; the alias check below
        // requires a topic-alias property in that case.
        let topic_data = StringData::decode(ba)?;
        let topic = if topic_data.is_empty() {
            None
        } else {
            Some(PubTopic::new(topic_data.as_ref())?)
        };

        let packet_id = if qos == QoS::AtMostOnce {
            PacketId::new(0)
        } else {
            let packet_id = PacketId::decode(ba)?;
            if packet_id.value() == 0 {
                return Err(DecodeError::InvalidPacketId);
            }
            packet_id
        };

        let properties = Properties::decode(ba)?;
        check_property_type_list(properties.props(), PUBLISH_PROPERTIES)?;

        // It is a Protocol Error if the Topic Name is zero length and there
        // is no Topic Alias.
        if topic.is_none() && properties.topic_alias().is_none() {
            return Err(DecodeError::InvalidTopic);
        }

        let header_part = ba.offset() - start_offset;
        let msg_len = fixed_header
            .remaining_length()
            .checked_sub(header_part)
            .ok_or(DecodeError::InvalidRemainingLength)?;
        let msg = ba.read_bytes(msg_len)?.to_vec();

        Ok(Self {
            dup,
            qos,
            retain,
            topic,
            packet_id,
            properties,
            msg,
        })
    }
}

impl EncodePacket for PublishPacket {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        let old_len = buf.len();

        let fixed_header = self.get_fixed_header()?;
        fixed_header.encode(buf)?;

        match &self.topic {
            Some(topic) => {
                topic.encode(buf)?;
            }
            None => {
                StringData::new().encode(buf)?;
            }
        }

        if self.qos != QoS::AtMostOnce {
            self.packet_id.encode(buf)?;
        }

        self.properties.encode(buf)?;
        buf.write_all(&self.msg)?;

        Ok(buf.len() - old_len)
    }
}

impl Packet for PublishPacket {
    fn packet_type(&self) -> PacketType {
        PacketType::Publish {
            dup: self.dup,
            retain: self.retain,
            qos: self.qos,
        }
    }

    fn bytes(&self) -> Result<usize, VarIntError> {
        let fixed_header = self.get_fixed_header()?;
        Ok(fixed_header.bytes() + fixed_header.remaining_length())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::v5::Property;
    use crate::{U16Data, U32Data};

    #[test]
    fn test_round_trip() {
        let mut packet = PublishPacket::new("metrics/cpu", QoS::AtLeastOnce, b"42").unwrap();
        packet.set_packet_id(PacketId::new(11));
        packet
            .properties_mut()
            .push(Property::MessageExpiryInterval(U32Data::new(60)));

        let mut buf = Vec::new();
        packet.encode(&mut buf).unwrap();
        let mut ba = ByteArray::new(&buf);
        let decoded = PublishPacket::decode(&mut ba).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn test_decode_alias_only() {
        let mut packet = PublishPacket::new("metrics/cpu", QoS::AtMostOnce, b"42").unwrap();
        packet
            .properties_mut()
            .push(Property::TopicAlias(U16Data::new(3)));
        packet.set_topic("").unwrap();

        let mut buf = Vec::new();
        packet.encode(&mut buf).unwrap();
        let mut ba = ByteArray::new(&buf);
        let decoded = PublishPacket::decode(&mut ba).unwrap();
        assert_eq!(decoded.topic(), "");
        assert_eq!(decoded.properties().topic_alias(), Some(3));
    }

    #[test]
    fn test_decode_empty_topic_without_alias() {
        let packet = {
            let mut packet = PublishPacket::new("x", QoS::AtMostOnce, b"42").unwrap();
            packet.set_topic("").unwrap();
            packet
        };
        let mut buf = Vec::new();
        packet.encode(&mut buf).unwrap();
        let mut ba = ByteArray::new(&buf);
        assert_eq!(
            PublishPacket::decode(&mut ba),
            Err(DecodeError::InvalidTopic)
        );
    }
}

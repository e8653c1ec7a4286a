// Copyright (c) 2026 Faro Project Developers. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use std::convert::TryFrom;

use super::property::check_property_type_list;
use super::{FixedHeader, Packet, PacketType, Properties, PropertyType};
use crate::{
    BinaryData, ByteArray, ConnectFlags, DecodeError, DecodePacket, EncodeError, EncodePacket,
    ProtocolLevel, PubTopic, StringData, U16Data, VarIntError,
};

/// Properties allowed in the CONNECT variable header.
pub const CONNECT_PROPERTIES: &[PropertyType] = &[
    PropertyType::SessionExpiryInterval,
    PropertyType::ReceiveMaximum,
    PropertyType::MaximumPacketSize,
    PropertyType::TopicAliasMaximum,
    PropertyType::RequestResponseInformation,
    PropertyType::RequestProblemInformation,
    PropertyType::UserProperty,
    PropertyType::AuthenticationMethod,
    PropertyType::AuthenticationData,
];

/// Properties allowed in the Will property set inside the CONNECT payload.
pub const WILL_PROPERTIES: &[PropertyType] = &[
    PropertyType::WillDelayInterval,
    PropertyType::PayloadFormatIndicator,
    PropertyType::MessageExpiryInterval,
    PropertyType::ContentType,
    PropertyType::ResponseTopic,
    PropertyType::CorrelationData,
    PropertyType::UserProperty,
];

/// MQTT 5.0 `ConnectPacket`.
///
/// Differs from the 3.1.1 layout by a property set in the variable header
/// and a second property set preceding the will topic in the payload:
///
/// ```txt
///  7                          0
/// +----------------------------+
/// | Fixed header               |
/// |                            |
/// +----------------------------+
/// | "MQTT"                     |
/// +----------------------------+
/// | Level (5)                  |
/// +----------------------------+
/// | Connect flags              |
/// +----------------------------+
/// | Keep alive                 |
/// |                            |
/// +----------------------------+
/// | Properties ...             |
/// +----------------------------+
/// | Client id ...              |
/// +----------------------------+
/// | Will properties ...        |
/// +----------------------------+
/// | Will topic ...             |
/// +----------------------------+
/// | Will payload ...           |
/// +----------------------------+
/// | Username ...               |
/// +----------------------------+
/// | Password ...               |
/// +----------------------------+
/// ```
#[allow(clippy::module_name_repetitions)]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConnectPacket {
    /// Level byte had bit 0x80 set; the peer is another broker.
    is_bridge: bool,

    connect_flags: ConnectFlags,

    keep_alive: U16Data,

    properties: Properties,

    /// A zero-length id asks the server to assign one; the server echoes the
    /// assigned id back in `assigned-client-identifier`.
    client_id: StringData,

    will_properties: Properties,

    will_topic: Option<PubTopic>,

    will_message: BinaryData,

    username: StringData,

    password: BinaryData,
}

impl ConnectPacket {
    /// Create a new v5 connect packet with `client_id`.
    ///
    /// # Errors
    ///
    /// Returns error if `client_id` is invalid.
    pub fn new(client_id: &str) -> Result<Self, EncodeError> {
        let client_id = StringData::from(client_id)?;
        Ok(Self {
            keep_alive: U16Data::new(60),
            client_id,
            ..Self::default()
        })
    }

    #[must_use]
    #[inline]
    pub const fn is_bridge(&self) -> bool {
        self.is_bridge
    }

    pub fn set_connect_flags(&mut self, flags: ConnectFlags) -> &mut Self {
        self.connect_flags = flags;
        self
    }

    #[must_use]
    #[inline]
    pub const fn connect_flags(&self) -> &ConnectFlags {
        &self.connect_flags
    }

    pub fn set_keep_alive(&mut self, keep_alive: u16) -> &mut Self {
        self.keep_alive = U16Data::new(keep_alive);
        self
    }

    #[must_use]
    #[inline]
    pub const fn keep_alive(&self) -> u16 {
        self.keep_alive.value()
    }

    pub fn properties_mut(&mut self) -> &mut Properties {
        &mut self.properties
    }

    #[must_use]
    pub const fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn will_properties_mut(&mut self) -> &mut Properties {
        &mut self.will_properties
    }

    #[must_use]
    pub const fn will_properties(&self) -> &Properties {
        &self.will_properties
    }

    /// Update client id.
    ///
    /// # Errors
    ///
    /// Returns error if `client_id` is invalid.
    pub fn set_client_id(&mut self, client_id: &str) -> Result<&mut Self, EncodeError> {
        self.client_id = StringData::from(client_id)?;
        Ok(self)
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        self.client_id.as_ref()
    }

    /// Update username value.
    ///
    /// # Errors
    ///
    /// Returns error if `username` contains invalid chars or is too long.
    pub fn set_username(&mut self, username: &str) -> Result<&mut Self, EncodeError> {
        self.username = StringData::from(username)?;
        Ok(self)
    }

    #[must_use]
    pub fn username(&self) -> &str {
        self.username.as_ref()
    }

    /// Update password value.
    ///
    /// # Errors
    ///
    /// Returns error if `password` is too long.
    pub fn set_password(&mut self, password: &[u8]) -> Result<&mut Self, EncodeError> {
        self.password = BinaryData::from_slice(password)?;
        Ok(self)
    }

    #[must_use]
    pub fn password(&self) -> &[u8] {
        self.password.as_ref()
    }

    /// Update will-topic.
    ///
    /// # Errors
    ///
    /// Returns error if `topic` is invalid.
    pub fn set_will_topic(&mut self, topic: &str) -> Result<&mut Self, EncodeError> {
        if topic.is_empty() {
            self.will_topic = None;
        } else {
            self.will_topic = Some(PubTopic::new(topic)?);
        }
        Ok(self)
    }

    #[must_use]
    pub fn will_topic(&self) -> Option<&str> {
        self.will_topic.as_ref().map(AsRef::as_ref)
    }

    /// Update will-message.
    ///
    /// # Errors
    ///
    /// Returns error if `message` is too long.
    pub fn set_will_message(&mut self, message: &[u8]) -> Result<&mut Self, EncodeError> {
        self.will_message = BinaryData::from_slice(message)?;
        Ok(self)
    }

    #[must_use]
    pub fn will_message(&self) -> &[u8] {
        self.will_message.as_ref()
    }

    fn get_fixed_header(&self) -> Result<FixedHeader, VarIntError> {
        let protocol_name_bytes = 2 + ProtocolLevel::V5.protocol_name().len();
        let mut remaining_length = protocol_name_bytes
            + ProtocolLevel::bytes()
            + ConnectFlags::bytes()
            + U16Data::bytes()
            + self.properties.bytes()
            + self.client_id.bytes();

        if self.connect_flags.will() {
            remaining_length += self.will_properties.bytes();
            if let Some(will_topic) = &self.will_topic {
                remaining_length += will_topic.bytes();
            }
            remaining_length += self.will_message.bytes();
        }
        if self.connect_flags.has_username() {
            remaining_length += self.username.bytes();
        }
        if self.connect_flags.has_password() {
            remaining_length += self.password.bytes();
        }
        FixedHeader::new(PacketType::Connect, remaining_length)
    }
}

impl EncodePacket for ConnectPacket {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        let old_len = buf.len();

        let fixed_header = self.get_fixed_header()?;
        fixed_header.encode(buf)?;

        StringData::from(ProtocolLevel::V5.protocol_name())?.encode(buf)?;
        ProtocolLevel::V5.encode(buf)?;
        self.connect_flags.encode(buf)?;
        self.keep_alive.encode(buf)?;
        self.properties.encode(buf)?;

        self.client_id.encode(buf)?;
        if self.connect_flags.will() {
            self.will_properties.encode(buf)?;
            if let Some(will_topic) = &self.will_topic {
                will_topic.encode(buf)?;
            }
            self.will_message.encode(buf)?;
        }
        if self.connect_flags.has_username() {
            self.username.encode(buf)?;
        }
        if self.connect_flags.has_password() {
            self.password.encode(buf)?;
        }

        Ok(buf.len() - old_len)
    }
}

impl DecodePacket for ConnectPacket {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let fixed_header = FixedHeader::decode(ba)?;
        if fixed_header.packet_type() != PacketType::Connect {
            return Err(DecodeError::InvalidPacketType);
        }

        let protocol_name = StringData::decode(ba)?;
        if protocol_name.as_ref() != ProtocolLevel::V5.protocol_name() {
            return Err(DecodeError::InvalidProtocolName);
        }

        let level_byte = ba.read_byte()?;
        let is_bridge = (level_byte & 0x80) == 0x80;
        let protocol_level = ProtocolLevel::try_from(level_byte & 0x7f)?;
        if protocol_level != ProtocolLevel::V5 {
            return Err(DecodeError::InvalidProtocolLevel);
        }

        let connect_flags = ConnectFlags::decode(ba)?;
        // The reserved flag MUST be zero [MQTT-3.1.2-3].
        if connect_flags.reserved() {
            return Err(DecodeError::InvalidConnectFlags);
        }

        let keep_alive = U16Data::decode(ba)?;

        let properties = Properties::decode(ba)?;
        check_property_type_list(properties.props(), CONNECT_PROPERTIES)?;
        // Authentication data without a method is a protocol error.
        if properties.authentication_data().is_some()
            && properties.authentication_method().is_none()
        {
            return Err(DecodeError::InvalidPropertyValue);
        }

        let client_id = StringData::decode(ba).map_err(|_err| DecodeError::InvalidClientId)?;

        let (will_properties, will_topic, will_message) = if connect_flags.will() {
            let will_properties = Properties::decode(ba)?;
            check_property_type_list(will_properties.props(), WILL_PROPERTIES)?;
            let will_topic = PubTopic::decode(ba)?;
            let will_message = BinaryData::decode(ba)?;
            (will_properties, Some(will_topic), will_message)
        } else {
            (Properties::new(), None, BinaryData::new())
        };

        let username = if connect_flags.has_username() {
            StringData::decode(ba)?
        } else {
            StringData::new()
        };
        let password = if connect_flags.has_password() {
            BinaryData::decode(ba)?
        } else {
            BinaryData::new()
        };

        Ok(Self {
            is_bridge,
            connect_flags,
            keep_alive,
            properties,
            client_id,
            will_properties,
            will_topic,
            will_message,
            username,
            password,
        })
    }
}

impl Packet for ConnectPacket {
    fn packet_type(&self) -> PacketType {
        PacketType::Connect
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
    use crate::U32Data;

    #[test]
    fn test_round_trip() {
        let mut packet = ConnectPacket::new("tank-3").unwrap();
        packet.set_keep_alive(15);
        packet
            .properties_mut()
            .push(Property::SessionExpiryInterval(U32Data::new(300)));
        packet
            .properties_mut()
            .push(Property::ReceiveMaximum(U16Data::new(10)));

        let mut buf = Vec::new();
        packet.encode(&mut buf).unwrap();
        let mut ba = ByteArray::new(&buf);
        let decoded = ConnectPacket::decode(&mut ba).unwrap();
        assert_eq!(decoded, packet);
        assert_eq!(decoded.properties().session_expiry_interval(), Some(300));
    }

    #[test]
    fn test_decode_duplicate_property() {
        let mut packet = ConnectPacket::new("tank-3").unwrap();
        packet
            .properties_mut()
            .push(Property::SessionExpiryInterval(U32Data::new(1)));
        packet
            .properties_mut()
            .push(Property::SessionExpiryInterval(U32Data::new(2)));

        let mut buf = Vec::new();
        packet.encode(&mut buf).unwrap();
        let mut ba = ByteArray::new(&buf);
        assert_eq!(
            ConnectPacket::decode(&mut ba),
            Err(DecodeError::DuplicateProperty)
        );
    }

    #[test]
    fn test_decode_will() {
        let mut packet = ConnectPacket::new("tank-3").unwrap();
        let mut flags = ConnectFlags::default();
        flags.set_will(true).set_will_qos(crate::QoS::AtLeastOnce);
        packet.set_connect_flags(flags);
        packet.set_will_topic("dev/offline").unwrap();
        packet.set_will_message(b"bye").unwrap();
        packet
            .will_properties_mut()
            .push(Property::WillDelayInterval(U32Data::new(5)));

        let mut buf = Vec::new();
        packet.encode(&mut buf).unwrap();
        let mut ba = ByteArray::new(&buf);
        let decoded = ConnectPacket::decode(&mut ba).unwrap();
        assert_eq!(decoded.will_topic(), Some("dev/offline"));
        assert_eq!(decoded.will_properties().will_delay_interval(), Some(5));
    }
}

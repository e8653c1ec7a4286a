// Copyright (c) 2026 Faro Project Developers. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use std::convert::TryFrom;

use super::{FixedHeader, Packet, PacketType};
use crate::{
    BinaryData, ByteArray, ConnectFlags, DecodeError, DecodePacket, EncodeError, EncodePacket,
    ProtocolLevel, PubTopic, StringData, U16Data, VarIntError,
};

/// `ConnectPacket` is the first packet sent from client to server.
///
/// Basic structure of the packet:
/// ```txt
///  7                          0
/// +----------------------------+
/// | Fixed header               |
/// |                            |
/// +----------------------------+
/// | Protocol name              |
/// |                            |
/// +----------------------------+
/// | Protocol level             |
/// +----------------------------+
/// | Connect flags              |
/// +----------------------------+
/// | Keep alive                 |
/// |                            |
/// +----------------------------+
/// | Client id ...              |
/// +----------------------------+
/// | Will topic ...             |
/// +----------------------------+
/// | Will message ...           |
/// +----------------------------+
/// | Username ...               |
/// +----------------------------+
/// | Password ...               |
/// +----------------------------+
/// ```
///
/// The protocol name is `MQIsdp` for level 3 (MQTT 3.1) and `MQTT` for
/// level 4 (MQTT 3.1.1). Bit 0x80 of the level byte marks a bridge client
/// and is not part of the level itself.
#[allow(clippy::module_name_repetitions)]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConnectPacket {
    protocol_level: ProtocolLevel,

    /// Level byte had bit 0x80 set; the peer is another broker.
    is_bridge: bool,

    connect_flags: ConnectFlags,

    /// Time interval between two packets in seconds.
    ///
    /// Client must send a PINGREQ packet before this interval expires. If
    /// this value is non-zero and no packet arrives within 1.5 times the
    /// interval, the server disconnects the network [MQTT-3.1.2-24].
    keep_alive: U16Data,

    /// `client_id` identifies the session in the server. A zero-length id
    /// asks the server to assign one [MQTT-3.1.3-6].
    client_id: StringData,

    /// Present when the `will` flag is set; topic of the Will Message.
    will_topic: Option<PubTopic>,

    /// Present when the `will` flag is set; payload of the Will Message.
    will_message: BinaryData,

    username: StringData,

    password: BinaryData,
}

impl ConnectPacket {
    /// Create a new 3.1.1 connect packet with `client_id`.
    ///
    /// # Errors
    ///
    /// Returns error if `client_id` is invalid.
    pub fn new(client_id: &str) -> Result<Self, EncodeError> {
        let client_id = StringData::from(client_id)?;
        Ok(Self {
            protocol_level: ProtocolLevel::V311,
            keep_alive: U16Data::new(60),
            client_id,
            ..Self::default()
        })
    }

    pub fn set_protocol_level(&mut self, level: ProtocolLevel) -> &mut Self {
        self.protocol_level = level;
        self
    }

    #[must_use]
    #[inline]
    pub const fn protocol_level(&self) -> ProtocolLevel {
        self.protocol_level
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

    fn protocol_name(&self) -> Result<StringData, EncodeError> {
        Ok(StringData::from(self.protocol_level.protocol_name())?)
    }

    fn get_fixed_header(&self) -> Result<FixedHeader, VarIntError> {
        let protocol_name_bytes = 2 + self.protocol_level.protocol_name().len();
        let mut remaining_length = protocol_name_bytes
            + ProtocolLevel::bytes()
            + ConnectFlags::bytes()
            + U16Data::bytes()
            + self.client_id.bytes();

        if self.connect_flags.will() {
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

        self.protocol_name()?.encode(buf)?;
        self.protocol_level.encode(buf)?;
        self.connect_flags.encode(buf)?;
        self.keep_alive.encode(buf)?;

        self.client_id.encode(buf)?;
        if self.connect_flags.will() {
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

        let level_byte = ba.read_byte()?;
        let is_bridge = (level_byte & 0x80) == 0x80;
        let protocol_level = ProtocolLevel::try_from(level_byte & 0x7f)?;

        // The protocol name is bound to the level: "MQIsdp" for 3.1 and
        // "MQTT" for 3.1.1 [MQTT-3.1.2-1].
        if protocol_name.as_ref() != protocol_level.protocol_name() {
            return Err(DecodeError::InvalidProtocolName);
        }
        if protocol_level == ProtocolLevel::V5 {
            return Err(DecodeError::InvalidProtocolLevel);
        }

        let connect_flags = ConnectFlags::decode(ba)?;
        // The server MUST validate that the reserved flag is zero and
        // disconnect if not [MQTT-3.1.2-3]. MQTT 3.1 clients are exempt.
        if protocol_level != ProtocolLevel::V31 && connect_flags.reserved() {
            return Err(DecodeError::InvalidConnectFlags);
        }

        let keep_alive = U16Data::decode(ba)?;

        let client_id = StringData::decode(ba).map_err(|_err| DecodeError::InvalidClientId)?;

        // If the Client supplies a zero-byte ClientId with CleanSession set
        // to 0, the Server MUST respond with CONNACK return code 0x02 and
        // close the network connection [MQTT-3.1.3-8].
        if client_id.is_empty() && !connect_flags.clean_session() {
            return Err(DecodeError::InvalidClientId);
        }

        let will_topic = if connect_flags.will() {
            Some(PubTopic::decode(ba)?)
        } else {
            None
        };
        let will_message = if connect_flags.will() {
            BinaryData::decode(ba)?
        } else {
            BinaryData::new()
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
            protocol_level,
            is_bridge,
            connect_flags,
            keep_alive,
            client_id,
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

    #[test]
    fn test_decode_v311() {
        let buf: Vec<u8> = vec![
            0x10, 0x10, 0x00, 0x04, b'M', b'Q', b'T', b'T', 0x04, 0x02, 0x00, 0x3c, 0x00, 0x04,
            b't', b'e', b's', b't',
        ];
        let mut ba = ByteArray::new(&buf);
        let packet = ConnectPacket::decode(&mut ba).unwrap();
        assert_eq!(packet.protocol_level(), ProtocolLevel::V311);
        assert_eq!(packet.client_id(), "test");
        assert_eq!(packet.keep_alive(), 60);
        assert!(packet.connect_flags().clean_session());
        assert!(!packet.is_bridge());
    }

    #[test]
    fn test_decode_v31_legacy_name() {
        let buf: Vec<u8> = vec![
            0x10, 0x14, 0x00, 0x06, b'M', b'Q', b'I', b's', b'd', b'p', 0x03, 0x02, 0x00, 0x3c,
            0x00, 0x04, b't', b'e', b's', b't',
        ];
        let mut ba = ByteArray::new(&buf);
        let packet = ConnectPacket::decode(&mut ba).unwrap();
        assert_eq!(packet.protocol_level(), ProtocolLevel::V31);
    }

    #[test]
    fn test_decode_bridge_bit() {
        let buf: Vec<u8> = vec![
            0x10, 0x10, 0x00, 0x04, b'M', b'Q', b'T', b'T', 0x84, 0x02, 0x00, 0x3c, 0x00, 0x04,
            b't', b'e', b's', b't',
        ];
        let mut ba = ByteArray::new(&buf);
        let packet = ConnectPacket::decode(&mut ba).unwrap();
        assert!(packet.is_bridge());
        assert_eq!(packet.protocol_level(), ProtocolLevel::V311);
    }

    #[test]
    fn test_decode_empty_client_id_without_clean_session() {
        let buf: Vec<u8> = vec![
            0x10, 0x0c, 0x00, 0x04, b'M', b'Q', b'T', b'T', 0x04, 0x00, 0x00, 0x3c, 0x00, 0x00,
        ];
        let mut ba = ByteArray::new(&buf);
        assert_eq!(
            ConnectPacket::decode(&mut ba),
            Err(DecodeError::InvalidClientId)
        );
    }

    #[test]
    fn test_round_trip() {
        let mut packet = ConnectPacket::new("sensor-1").unwrap();
        packet.set_keep_alive(30);
        let mut flags = ConnectFlags::default();
        flags.set_will(true).set_will_qos(crate::QoS::AtLeastOnce);
        packet.set_connect_flags(flags);
        packet.set_will_topic("dev/last-will").unwrap();
        packet.set_will_message(b"gone").unwrap();

        let mut buf = Vec::new();
        packet.encode(&mut buf).unwrap();
        let mut ba = ByteArray::new(&buf);
        let decoded = ConnectPacket::decode(&mut ba).unwrap();
        assert_eq!(decoded, packet);
    }
}

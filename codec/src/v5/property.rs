// Copyright (c) 2026 Faro Project Developers. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use std::convert::TryFrom;

use crate::{
    BinaryData, BoolData, ByteArray, DecodeError, DecodePacket, EncodeError, EncodePacket,
    PubTopic, QoS, StringData, StringPairData, U16Data, U32Data, VarInt,
};

/// Properties allowed to appear more than once in a property list.
///
/// `SubscriptionIdentifier` repeats only in outbound PUBLISH packets when a
/// message matched several identified subscriptions; the CONNECT/SUBSCRIBE
/// parsers additionally reject repeats of it.
pub const MULTIPLE_PROPERTIES: &[PropertyType] = &[
    PropertyType::UserProperty,
    PropertyType::SubscriptionIdentifier,
];

/// Validate a decoded property list against the set allowed for one packet
/// type.
///
/// # Errors
///
/// Returns `InvalidPropertyType` if a property is not allowed on this packet
/// kind, `DuplicateProperty` if a non-repeatable property appears twice.
pub fn check_property_type_list(
    properties: &[Property],
    types: &[PropertyType],
) -> Result<(), DecodeError> {
    for property in properties {
        if !types.contains(&property.property_type()) {
            log::error!(
                "property: type {:?} cannot be used in this packet",
                property.property_type()
            );
            return Err(DecodeError::InvalidPropertyType);
        }
    }

    for property_type in types {
        let count = properties
            .iter()
            .filter(|p| p.property_type() == *property_type)
            .count();
        if count > 1 && !MULTIPLE_PROPERTIES.contains(property_type) {
            log::error!("property: type {property_type:?} appears {count} times");
            return Err(DecodeError::DuplicateProperty);
        }
    }

    Ok(())
}

/// Reject repeated subscription identifiers, for packets where only the
/// single-occurrence form is legal.
///
/// # Errors
///
/// Returns `DuplicateProperty` if more than one subscription identifier is
/// present.
pub fn check_multiple_subscription_identifiers(
    properties: &[Property],
) -> Result<(), DecodeError> {
    let count = properties
        .iter()
        .filter(|p| p.property_type() == PropertyType::SubscriptionIdentifier)
        .count();
    if count > 1 {
        return Err(DecodeError::DuplicateProperty);
    }
    Ok(())
}

/// Property identifier byte.
#[allow(clippy::module_name_repetitions)]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyType {
    PayloadFormatIndicator = 0x01,
    MessageExpiryInterval = 0x02,
    ContentType = 0x03,
    ResponseTopic = 0x08,
    CorrelationData = 0x09,
    SubscriptionIdentifier = 0x0b,
    SessionExpiryInterval = 0x11,
    AssignedClientIdentifier = 0x12,
    ServerKeepAlive = 0x13,
    AuthenticationMethod = 0x15,
    AuthenticationData = 0x16,
    RequestProblemInformation = 0x17,
    WillDelayInterval = 0x18,
    RequestResponseInformation = 0x19,
    ResponseInformation = 0x1a,
    ServerReference = 0x1c,
    ReasonString = 0x1f,
    ReceiveMaximum = 0x21,
    TopicAliasMaximum = 0x22,
    TopicAlias = 0x23,
    MaximumQoS = 0x24,
    RetainAvailable = 0x25,
    UserProperty = 0x26,
    MaximumPacketSize = 0x27,
    WildcardSubscriptionAvailable = 0x28,
    SubscriptionIdentifierAvailable = 0x29,
    SharedSubscriptionAvailable = 0x2a,
}

impl PropertyType {
    /// Get byte length used in packet.
    ///
    /// Identifiers are Variable Byte Integers on the wire, but every defined
    /// identifier fits in a single byte.
    #[must_use]
    pub const fn bytes() -> usize {
        1
    }
}

impl TryFrom<u8> for PropertyType {
    type Error = DecodeError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0x01 => Ok(Self::PayloadFormatIndicator),
            0x02 => Ok(Self::MessageExpiryInterval),
            0x03 => Ok(Self::ContentType),
            0x08 => Ok(Self::ResponseTopic),
            0x09 => Ok(Self::CorrelationData),
            0x0b => Ok(Self::SubscriptionIdentifier),
            0x11 => Ok(Self::SessionExpiryInterval),
            0x12 => Ok(Self::AssignedClientIdentifier),
            0x13 => Ok(Self::ServerKeepAlive),
            0x15 => Ok(Self::AuthenticationMethod),
            0x16 => Ok(Self::AuthenticationData),
            0x17 => Ok(Self::RequestProblemInformation),
            0x18 => Ok(Self::WillDelayInterval),
            0x19 => Ok(Self::RequestResponseInformation),
            0x1a => Ok(Self::ResponseInformation),
            0x1c => Ok(Self::ServerReference),
            0x1f => Ok(Self::ReasonString),
            0x21 => Ok(Self::ReceiveMaximum),
            0x22 => Ok(Self::TopicAliasMaximum),
            0x23 => Ok(Self::TopicAlias),
            0x24 => Ok(Self::MaximumQoS),
            0x25 => Ok(Self::RetainAvailable),
            0x26 => Ok(Self::UserProperty),
            0x27 => Ok(Self::MaximumPacketSize),
            0x28 => Ok(Self::WildcardSubscriptionAvailable),
            0x29 => Ok(Self::SubscriptionIdentifierAvailable),
            0x2a => Ok(Self::SharedSubscriptionAvailable),
            _ => Err(DecodeError::InvalidPropertyType),
        }
    }
}

/// A property consists of an identifier and a typed value.
///
/// Which identifiers may appear on which packet kinds is defined per packet
/// file as a `*_PROPERTIES` constant; [`check_property_type_list`] enforces
/// the mapping after decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Property {
    /// Byte, 0 or 1. Used in PUBLISH, Will properties.
    PayloadFormatIndicator(BoolData),

    /// Lifetime of the message in seconds. Used in PUBLISH, Will properties.
    MessageExpiryInterval(U32Data),

    /// Used in PUBLISH, Will properties.
    ContentType(StringData),

    /// Topic name for a response message. Used in PUBLISH, Will properties.
    ResponseTopic(PubTopic),

    /// Used in PUBLISH, Will properties.
    CorrelationData(BinaryData),

    /// 1..=268,435,455; zero is a protocol error. Used in PUBLISH and
    /// SUBSCRIBE.
    SubscriptionIdentifier(VarInt),

    /// Seconds; 0xFFFF_FFFF means the session does not expire. Used in
    /// CONNECT, CONNACK, DISCONNECT.
    SessionExpiryInterval(U32Data),

    /// Client id picked by the server for a zero-length client id CONNECT.
    /// Used in CONNACK.
    AssignedClientIdentifier(StringData),

    /// Overrides the keepalive requested in CONNECT. Used in CONNACK.
    ServerKeepAlive(U16Data),

    /// Name of the extended authentication method. Used in CONNECT, CONNACK,
    /// AUTH.
    AuthenticationMethod(StringData),

    /// Used in CONNECT, CONNACK, AUTH.
    AuthenticationData(BinaryData),

    /// Byte, 0 or 1. Used in CONNECT.
    RequestProblemInformation(BoolData),

    /// Seconds to delay publishing the Will Message. Used in Will
    /// properties.
    WillDelayInterval(U32Data),

    /// Byte, 0 or 1. Used in CONNECT.
    RequestResponseInformation(BoolData),

    /// Used in CONNACK.
    ResponseInformation(StringData),

    /// Used in CONNACK, DISCONNECT.
    ServerReference(StringData),

    /// Human readable diagnostic. Used in every ack packet.
    ReasonString(StringData),

    /// Maximum number of concurrent QoS 1/2 deliveries the sender will
    /// process; zero is a protocol error. Used in CONNECT, CONNACK.
    ReceiveMaximum(U16Data),

    /// Highest topic alias accepted from the peer. Used in CONNECT, CONNACK.
    TopicAliasMaximum(U16Data),

    /// Alias standing in for the topic name; zero is a protocol error.
    /// Used in PUBLISH.
    TopicAlias(U16Data),

    /// 0 or 1; absence means QoS 2 is supported. Used in CONNACK.
    MaximumQoS(QoS),

    /// Byte, 0 or 1. Used in CONNACK.
    RetainAvailable(BoolData),

    /// Free-form name/value pair; may repeat. Used everywhere.
    UserProperty(StringPairData),

    /// Largest whole packet the sender accepts; zero is a protocol error.
    /// Used in CONNECT, CONNACK.
    MaximumPacketSize(U32Data),

    /// Byte, 0 or 1. Used in CONNACK.
    WildcardSubscriptionAvailable(BoolData),

    /// Byte, 0 or 1. Used in CONNACK.
    SubscriptionIdentifierAvailable(BoolData),

    /// Byte, 0 or 1. Used in CONNACK.
    SharedSubscriptionAvailable(BoolData),
}

impl Property {
    /// Get type of the property.
    #[must_use]
    pub const fn property_type(&self) -> PropertyType {
        match self {
            Self::PayloadFormatIndicator(_) => PropertyType::PayloadFormatIndicator,
            Self::MessageExpiryInterval(_) => PropertyType::MessageExpiryInterval,
            Self::ContentType(_) => PropertyType::ContentType,
            Self::ResponseTopic(_) => PropertyType::ResponseTopic,
            Self::CorrelationData(_) => PropertyType::CorrelationData,
            Self::SubscriptionIdentifier(_) => PropertyType::SubscriptionIdentifier,
            Self::SessionExpiryInterval(_) => PropertyType::SessionExpiryInterval,
            Self::AssignedClientIdentifier(_) => PropertyType::AssignedClientIdentifier,
            Self::ServerKeepAlive(_) => PropertyType::ServerKeepAlive,
            Self::AuthenticationMethod(_) => PropertyType::AuthenticationMethod,
            Self::AuthenticationData(_) => PropertyType::AuthenticationData,
            Self::RequestProblemInformation(_) => PropertyType::RequestProblemInformation,
            Self::WillDelayInterval(_) => PropertyType::WillDelayInterval,
            Self::RequestResponseInformation(_) => PropertyType::RequestResponseInformation,
            Self::ResponseInformation(_) => PropertyType::ResponseInformation,
            Self::ServerReference(_) => PropertyType::ServerReference,
            Self::ReasonString(_) => PropertyType::ReasonString,
            Self::ReceiveMaximum(_) => PropertyType::ReceiveMaximum,
            Self::TopicAliasMaximum(_) => PropertyType::TopicAliasMaximum,
            Self::TopicAlias(_) => PropertyType::TopicAlias,
            Self::MaximumQoS(_) => PropertyType::MaximumQoS,
            Self::RetainAvailable(_) => PropertyType::RetainAvailable,
            Self::UserProperty(_) => PropertyType::UserProperty,
            Self::MaximumPacketSize(_) => PropertyType::MaximumPacketSize,
            Self::WildcardSubscriptionAvailable(_) => PropertyType::WildcardSubscriptionAvailable,
            Self::SubscriptionIdentifierAvailable(_) => {
                PropertyType::SubscriptionIdentifierAvailable
            }
            Self::SharedSubscriptionAvailable(_) => PropertyType::SharedSubscriptionAvailable,
        }
    }

    /// Get byte length used in packets, identifier included.
    #[allow(clippy::match_same_arms)]
    #[must_use]
    pub fn bytes(&self) -> usize {
        let value_bytes = match self {
            Self::AssignedClientIdentifier(value) => value.bytes(),
            Self::AuthenticationData(value) => value.bytes(),
            Self::AuthenticationMethod(value) => value.bytes(),
            Self::ContentType(value) => value.bytes(),
            Self::CorrelationData(value) => value.bytes(),
            Self::MaximumPacketSize(..) => U32Data::bytes(),
            Self::MaximumQoS(..) => QoS::bytes(),
            Self::MessageExpiryInterval(..) => U32Data::bytes(),
            Self::PayloadFormatIndicator(..) => BoolData::bytes(),
            Self::ReasonString(value) => value.bytes(),
            Self::ReceiveMaximum(..) => U16Data::bytes(),
            Self::RequestProblemInformation(..) => BoolData::bytes(),
            Self::RequestResponseInformation(..) => BoolData::bytes(),
            Self::ResponseInformation(value) => value.bytes(),
            Self::ResponseTopic(value) => value.bytes(),
            Self::RetainAvailable(..) => BoolData::bytes(),
            Self::ServerKeepAlive(..) => U16Data::bytes(),
            Self::ServerReference(value) => value.bytes(),
            Self::SessionExpiryInterval(..) => U32Data::bytes(),
            Self::SharedSubscriptionAvailable(..) => BoolData::bytes(),
            Self::SubscriptionIdentifier(value) => value.bytes(),
            Self::SubscriptionIdentifierAvailable(..) => BoolData::bytes(),
            Self::TopicAlias(..) => U16Data::bytes(),
            Self::TopicAliasMaximum(..) => U16Data::bytes(),
            Self::UserProperty(value) => value.bytes(),
            Self::WildcardSubscriptionAvailable(..) => BoolData::bytes(),
            Self::WillDelayInterval(..) => U32Data::bytes(),
        };

        PropertyType::bytes() + value_bytes
    }
}

impl DecodePacket for Property {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let id = VarInt::decode(ba)?;
        let id = u8::try_from(id.value()).map_err(|_err| DecodeError::InvalidPropertyType)?;
        let property_type = PropertyType::try_from(id)?;

        let property = match property_type {
            PropertyType::PayloadFormatIndicator => {
                Self::PayloadFormatIndicator(BoolData::decode(ba)?)
            }
            PropertyType::MessageExpiryInterval => {
                Self::MessageExpiryInterval(U32Data::decode(ba)?)
            }
            PropertyType::ContentType => Self::ContentType(StringData::decode(ba)?),
            PropertyType::ResponseTopic => Self::ResponseTopic(PubTopic::decode(ba)?),
            PropertyType::CorrelationData => Self::CorrelationData(BinaryData::decode(ba)?),
            PropertyType::SubscriptionIdentifier => {
                let value = VarInt::decode(ba)?;
                // The Subscription Identifier can have the value of 1 to
                // 268,435,455; 0 is a protocol error.
                if value.is_empty() {
                    return Err(DecodeError::InvalidPropertyValue);
                }
                Self::SubscriptionIdentifier(value)
            }
            PropertyType::SessionExpiryInterval => {
                Self::SessionExpiryInterval(U32Data::decode(ba)?)
            }
            PropertyType::AssignedClientIdentifier => {
                Self::AssignedClientIdentifier(StringData::decode(ba)?)
            }
            PropertyType::ServerKeepAlive => Self::ServerKeepAlive(U16Data::decode(ba)?),
            PropertyType::AuthenticationMethod => {
                Self::AuthenticationMethod(StringData::decode(ba)?)
            }
            PropertyType::AuthenticationData => Self::AuthenticationData(BinaryData::decode(ba)?),
            PropertyType::RequestProblemInformation => {
                Self::RequestProblemInformation(BoolData::decode(ba)?)
            }
            PropertyType::WillDelayInterval => Self::WillDelayInterval(U32Data::decode(ba)?),
            PropertyType::RequestResponseInformation => {
                Self::RequestResponseInformation(BoolData::decode(ba)?)
            }
            PropertyType::ResponseInformation => {
                Self::ResponseInformation(StringData::decode(ba)?)
            }
            PropertyType::ServerReference => Self::ServerReference(StringData::decode(ba)?),
            PropertyType::ReasonString => Self::ReasonString(StringData::decode(ba)?),
            PropertyType::ReceiveMaximum => {
                let value = U16Data::decode(ba)?;
                // It is a Protocol Error for receive-maximum to be 0.
                if value.value() == 0 {
                    return Err(DecodeError::InvalidPropertyValue);
                }
                Self::ReceiveMaximum(value)
            }
            PropertyType::TopicAliasMaximum => Self::TopicAliasMaximum(U16Data::decode(ba)?),
            PropertyType::TopicAlias => {
                let value = U16Data::decode(ba)?;
                // A Topic Alias of 0 is not permitted [MQTT-3.3.2-8].
                if value.value() == 0 {
                    return Err(DecodeError::InvalidPropertyValue);
                }
                Self::TopicAlias(value)
            }
            PropertyType::MaximumQoS => {
                let byte = ba.read_byte()?;
                // Only 0 and 1 are legal values for maximum-qos.
                if byte > 1 {
                    return Err(DecodeError::InvalidPropertyValue);
                }
                Self::MaximumQoS(QoS::try_from(byte)?)
            }
            PropertyType::RetainAvailable => Self::RetainAvailable(BoolData::decode(ba)?),
            PropertyType::UserProperty => Self::UserProperty(StringPairData::decode(ba)?),
            PropertyType::MaximumPacketSize => {
                let value = U32Data::decode(ba)?;
                // It is a Protocol Error for maximum-packet-size to be 0.
                if value.value() == 0 {
                    return Err(DecodeError::InvalidPropertyValue);
                }
                Self::MaximumPacketSize(value)
            }
            PropertyType::WildcardSubscriptionAvailable => {
                Self::WildcardSubscriptionAvailable(BoolData::decode(ba)?)
            }
            PropertyType::SubscriptionIdentifierAvailable => {
                Self::SubscriptionIdentifierAvailable(BoolData::decode(ba)?)
            }
            PropertyType::SharedSubscriptionAvailable => {
                Self::SharedSubscriptionAvailable(BoolData::decode(ba)?)
            }
        };

        Ok(property)
    }
}

impl EncodePacket for Property {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        buf.push(self.property_type() as u8);
        let value_bytes = match self {
            Self::PayloadFormatIndicator(value)
            | Self::RequestProblemInformation(value)
            | Self::RequestResponseInformation(value)
            | Self::RetainAvailable(value)
            | Self::WildcardSubscriptionAvailable(value)
            | Self::SubscriptionIdentifierAvailable(value)
            | Self::SharedSubscriptionAvailable(value) => value.encode(buf)?,
            Self::MessageExpiryInterval(value)
            | Self::SessionExpiryInterval(value)
            | Self::WillDelayInterval(value)
            | Self::MaximumPacketSize(value) => value.encode(buf)?,
            Self::ContentType(value)
            | Self::AssignedClientIdentifier(value)
            | Self::AuthenticationMethod(value)
            | Self::ResponseInformation(value)
            | Self::ServerReference(value)
            | Self::ReasonString(value) => value.encode(buf)?,
            Self::ResponseTopic(value) => value.encode(buf)?,
            Self::CorrelationData(value) | Self::AuthenticationData(value) => value.encode(buf)?,
            Self::SubscriptionIdentifier(value) => value.encode(buf)?,
            Self::ServerKeepAlive(value)
            | Self::ReceiveMaximum(value)
            | Self::TopicAliasMaximum(value)
            | Self::TopicAlias(value) => value.encode(buf)?,
            Self::MaximumQoS(value) => value.encode(buf)?,
            Self::UserProperty(value) => value.encode(buf)?,
        };
        Ok(PropertyType::bytes() + value_bytes)
    }
}

/// Property list of one packet, preceded on the wire by its byte length as a
/// Variable Byte Integer.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Properties(Vec<Property>);

impl AsRef<[Property]> for Properties {
    fn as_ref(&self) -> &[Property] {
        self.0.as_ref()
    }
}

impl Properties {
    /// Create a new empty property list.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Get byte length of property list in packet, length prefix included.
    #[must_use]
    pub fn bytes(&self) -> usize {
        let data_bytes = self.data_bytes();
        // Sum of property bytes always fits a VarInt when each field
        // respects its own 64k cap.
        let len = VarInt::from(data_bytes).unwrap_or_default();
        len.bytes() + data_bytes
    }

    fn data_bytes(&self) -> usize {
        self.0.iter().map(Property::bytes).sum()
    }

    /// Get number of properties in list.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check whether property list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get a reference to property list.
    #[must_use]
    pub fn props(&self) -> &[Property] {
        &self.0
    }

    /// Clear property list.
    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Push a property to the back of the list.
    pub fn push(&mut self, property: Property) {
        self.0.push(property);
    }

    /// Remove all properties of `property_type` from the list.
    pub fn remove(&mut self, property_type: PropertyType) {
        self.0.retain(|p| p.property_type() != property_type);
    }

    fn find(&self, property_type: PropertyType) -> Option<&Property> {
        self.0.iter().find(|p| p.property_type() == property_type)
    }

    #[must_use]
    pub fn session_expiry_interval(&self) -> Option<u32> {
        match self.find(PropertyType::SessionExpiryInterval) {
            Some(Property::SessionExpiryInterval(v)) => Some(v.value()),
            _ => None,
        }
    }

    #[must_use]
    pub fn message_expiry_interval(&self) -> Option<u32> {
        match self.find(PropertyType::MessageExpiryInterval) {
            Some(Property::MessageExpiryInterval(v)) => Some(v.value()),
            _ => None,
        }
    }

    #[must_use]
    pub fn will_delay_interval(&self) -> Option<u32> {
        match self.find(PropertyType::WillDelayInterval) {
            Some(Property::WillDelayInterval(v)) => Some(v.value()),
            _ => None,
        }
    }

    #[must_use]
    pub fn receive_maximum(&self) -> Option<u16> {
        match self.find(PropertyType::ReceiveMaximum) {
            Some(Property::ReceiveMaximum(v)) => Some(v.value()),
            _ => None,
        }
    }

    #[must_use]
    pub fn maximum_packet_size(&self) -> Option<u32> {
        match self.find(PropertyType::MaximumPacketSize) {
            Some(Property::MaximumPacketSize(v)) => Some(v.value()),
            _ => None,
        }
    }

    #[must_use]
    pub fn topic_alias_maximum(&self) -> Option<u16> {
        match self.find(PropertyType::TopicAliasMaximum) {
            Some(Property::TopicAliasMaximum(v)) => Some(v.value()),
            _ => None,
        }
    }

    #[must_use]
    pub fn topic_alias(&self) -> Option<u16> {
        match self.find(PropertyType::TopicAlias) {
            Some(Property::TopicAlias(v)) => Some(v.value()),
            _ => None,
        }
    }

    #[must_use]
    pub fn subscription_identifier(&self) -> Option<usize> {
        match self.find(PropertyType::SubscriptionIdentifier) {
            Some(Property::SubscriptionIdentifier(v)) => Some(v.value()),
            _ => None,
        }
    }

    #[must_use]
    pub fn authentication_method(&self) -> Option<&str> {
        match self.find(PropertyType::AuthenticationMethod) {
            Some(Property::AuthenticationMethod(v)) => Some(v.as_ref()),
            _ => None,
        }
    }

    #[must_use]
    pub fn authentication_data(&self) -> Option<&[u8]> {
        match self.find(PropertyType::AuthenticationData) {
            Some(Property::AuthenticationData(v)) => Some(v.as_ref()),
            _ => None,
        }
    }

    #[must_use]
    pub fn request_response_information(&self) -> Option<bool> {
        match self.find(PropertyType::RequestResponseInformation) {
            Some(Property::RequestResponseInformation(v)) => Some(v.value()),
            _ => None,
        }
    }

    #[must_use]
    pub fn request_problem_information(&self) -> Option<bool> {
        match self.find(PropertyType::RequestProblemInformation) {
            Some(Property::RequestProblemInformation(v)) => Some(v.value()),
            _ => None,
        }
    }

    #[must_use]
    pub fn payload_format_indicator(&self) -> Option<bool> {
        match self.find(PropertyType::PayloadFormatIndicator) {
            Some(Property::PayloadFormatIndicator(v)) => Some(v.value()),
            _ => None,
        }
    }

    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        match self.find(PropertyType::ContentType) {
            Some(Property::ContentType(v)) => Some(v.as_ref()),
            _ => None,
        }
    }

    #[must_use]
    pub fn response_topic(&self) -> Option<&str> {
        match self.find(PropertyType::ResponseTopic) {
            Some(Property::ResponseTopic(v)) => Some(v.as_ref()),
            _ => None,
        }
    }

    #[must_use]
    pub fn correlation_data(&self) -> Option<&[u8]> {
        match self.find(PropertyType::CorrelationData) {
            Some(Property::CorrelationData(v)) => Some(v.as_ref()),
            _ => None,
        }
    }

    /// All user-property pairs, in wire order.
    #[must_use]
    pub fn user_properties(&self) -> Vec<(&str, &str)> {
        self.0
            .iter()
            .filter_map(|p| match p {
                Property::UserProperty(pair) => Some((pair.name(), pair.value())),
                _ => None,
            })
            .collect()
    }
}

impl DecodePacket for Properties {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let property_length = VarInt::decode(ba)?;
        let end_offset = ba
            .offset()
            .checked_add(property_length.value())
            .ok_or(DecodeError::InvalidRemainingLength)?;

        let mut properties = Vec::new();
        while ba.offset() < end_offset {
            let property = Property::decode(ba)?;
            properties.push(property);
        }
        if ba.offset() != end_offset {
            return Err(DecodeError::InvalidRemainingLength);
        }

        Ok(Self(properties))
    }
}

impl EncodePacket for Properties {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        let data_bytes = self.data_bytes();
        let len = VarInt::from(data_bytes)?;
        let mut bytes_written = len.bytes();
        len.encode(buf)?;
        for property in &self.0 {
            bytes_written += property.encode(buf)?;
        }

        Ok(bytes_written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let mut properties = Properties::new();
        properties.push(Property::SessionExpiryInterval(U32Data::new(120)));
        properties.push(Property::ReceiveMaximum(U16Data::new(64)));
        properties.push(Property::UserProperty(
            StringPairData::from("site", "lighthouse").unwrap(),
        ));

        let mut buf = Vec::new();
        let written = properties.encode(&mut buf).unwrap();
        assert_eq!(written, properties.bytes());

        let mut ba = ByteArray::new(&buf);
        let decoded = Properties::decode(&mut ba).unwrap();
        assert_eq!(decoded, properties);
        assert_eq!(decoded.session_expiry_interval(), Some(120));
        assert_eq!(decoded.receive_maximum(), Some(64));
    }

    #[test]
    fn test_decode_rejects_zero_receive_maximum() {
        let buf = [0x03, 0x21, 0x00, 0x00];
        let mut ba = ByteArray::new(&buf);
        assert_eq!(
            Properties::decode(&mut ba),
            Err(DecodeError::InvalidPropertyValue)
        );
    }

    #[test]
    fn test_decode_rejects_zero_topic_alias() {
        let buf = [0x03, 0x23, 0x00, 0x00];
        let mut ba = ByteArray::new(&buf);
        assert_eq!(
            Properties::decode(&mut ba),
            Err(DecodeError::InvalidPropertyValue)
        );
    }

    #[test]
    fn test_check_duplicate_property() {
        let mut properties = Properties::new();
        properties.push(Property::SessionExpiryInterval(U32Data::new(1)));
        properties.push(Property::SessionExpiryInterval(U32Data::new(2)));
        assert_eq!(
            check_property_type_list(
                properties.props(),
                &[PropertyType::SessionExpiryInterval]
            ),
            Err(DecodeError::DuplicateProperty)
        );
    }

    #[test]
    fn test_check_not_allowed_property() {
        let mut properties = Properties::new();
        properties.push(Property::TopicAlias(U16Data::new(4)));
        assert_eq!(
            check_property_type_list(properties.props(), &[PropertyType::UserProperty]),
            Err(DecodeError::InvalidPropertyType)
        );
    }

    #[test]
    fn test_user_property_may_repeat() {
        let mut properties = Properties::new();
        properties.push(Property::UserProperty(
            StringPairData::from("a", "1").unwrap(),
        ));
        properties.push(Property::UserProperty(
            StringPairData::from("a", "2").unwrap(),
        ));
        assert!(
            check_property_type_list(properties.props(), &[PropertyType::UserProperty]).is_ok()
        );
    }
}

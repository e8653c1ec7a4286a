// Copyright (c) 2026 Faro Project Developers. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use super::property::check_property_type_list;
use super::{FixedHeader, Packet, PacketType, Properties, PropertyType, ReasonCode};
use crate::{ByteArray, DecodeError, DecodePacket, EncodeError, EncodePacket, VarIntError};

/// Properties allowed in an AUTH packet.
pub const AUTH_PROPERTIES: &[PropertyType] = &[
    PropertyType::AuthenticationMethod,
    PropertyType::AuthenticationData,
    PropertyType::ReasonString,
    PropertyType::UserProperty,
];

/// Reason codes allowed in an AUTH packet.
pub const AUTH_REASONS: &[ReasonCode] = &[
    ReasonCode::Success,
    ReasonCode::ContinueAuthentication,
    ReasonCode::ReAuthenticate,
];

/// MQTT 5.0 AUTH packet, used for extended authentication exchanges.
///
/// Bits 3,2,1,0 of the fixed header are reserved and MUST all be 0
/// [MQTT-3.15.1-1]. A remaining length of 0 stands for reason code 0x00
/// with no properties.
#[allow(clippy::module_name_repetitions)]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AuthPacket {
    reason_code: ReasonCode,
    properties: Properties,
}

impl AuthPacket {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_reason(reason_code: ReasonCode) -> Self {
        Self {
            reason_code,
            properties: Properties::new(),
        }
    }

    #[must_use]
    pub const fn reason_code(&self) -> ReasonCode {
        self.reason_code
    }

    pub fn set_reason_code(&mut self, reason_code: ReasonCode) -> &mut Self {
        self.reason_code = reason_code;
        self
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
                0
            } else {
                ReasonCode::bytes() + self.properties.bytes()
            };
        FixedHeader::new(PacketType::Auth, remaining_length)
    }
}

impl EncodePacket for AuthPacket {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        let old_len = buf.len();
        let fixed_header = self.get_fixed_header()?;
        fixed_header.encode(buf)?;

        if self.reason_code != ReasonCode::Success || !self.properties.is_empty() {
            self.reason_code.encode(buf)?;
            self.properties.encode(buf)?;
        }
        Ok(buf.len() - old_len)
    }
}

impl DecodePacket for AuthPacket {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let fixed_header = FixedHeader::decode(ba)?;
        if fixed_header.packet_type() != PacketType::Auth {
            return Err(DecodeError::InvalidPacketType);
        }

        let remaining = fixed_header.remaining_length();
        let (reason_code, properties) = if remaining == 0 {
            (ReasonCode::Success, Properties::new())
        } else {
            let reason_code = ReasonCode::decode(ba)?;
            let properties = if remaining > ReasonCode::bytes() {
                let properties = Properties::decode(ba)?;
                check_property_type_list(properties.props(), AUTH_PROPERTIES)?;
                properties
            } else {
                Properties::new()
            };
            (reason_code, properties)
        };

        if !AUTH_REASONS.contains(&reason_code) {
            return Err(DecodeError::InvalidReasonCode);
        }

        Ok(Self {
            reason_code,
            properties,
        })
    }
}

impl Packet for AuthPacket {
    fn packet_type(&self) -> PacketType {
        PacketType::Auth
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
    use crate::StringData;

    #[test]
    fn test_round_trip() {
        let mut packet = AuthPacket::with_reason(ReasonCode::ContinueAuthentication);
        packet.properties_mut().push(Property::AuthenticationMethod(
            StringData::from("SCRAM-SHA-1").unwrap(),
        ));

        let mut buf = Vec::new();
        packet.encode(&mut buf).unwrap();
        let mut ba = ByteArray::new(&buf);
        let decoded = AuthPacket::decode(&mut ba).unwrap();
        assert_eq!(decoded, packet);
        assert_eq!(
            decoded.properties().authentication_method(),
            Some("SCRAM-SHA-1")
        );
    }
}

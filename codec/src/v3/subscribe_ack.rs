// Copyright (c) 2026 Faro Project Developers. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use super::{FixedHeader, Packet, PacketType};
use crate::{
    ByteArray, DecodeError, DecodePacket, EncodeError, EncodePacket, PacketId, QoS, VarIntError,
};

/// Result of one subscription request inside a SUBACK packet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubscribeAck {
    /// Subscription accepted with this granted maximum `QoS`.
    QoS(QoS),

    /// Subscription rejected.
    Failed,
}

impl SubscribeAck {
    #[must_use]
    pub const fn bytes() -> usize {
        1
    }
}

impl From<SubscribeAck> for u8 {
    fn from(ack: SubscribeAck) -> Self {
        match ack {
            SubscribeAck::QoS(qos) => qos as Self,
            SubscribeAck::Failed => 0x80,
        }
    }
}

impl TryFrom<u8> for SubscribeAck {
    type Error = DecodeError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0x80 => Ok(Self::Failed),
            v => QoS::try_from(v).map(Self::QoS),
        }
    }
}

/// `SubscribeAckPacket` is sent by the server to confirm a SUBSCRIBE packet,
/// carrying one return code per requested filter, in request order
/// [MQTT-3.9.3-1].
#[allow(clippy::module_name_repetitions)]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubscribeAckPacket {
    packet_id: PacketId,
    acks: Vec<SubscribeAck>,
}

impl SubscribeAckPacket {
    #[must_use]
    pub fn new(packet_id: PacketId, ack: SubscribeAck) -> Self {
        Self {
            packet_id,
            acks: vec![ack],
        }
    }

    #[must_use]
    pub const fn with_acks(packet_id: PacketId, acks: Vec<SubscribeAck>) -> Self {
        Self { packet_id, acks }
    }

    #[must_use]
    pub const fn packet_id(&self) -> PacketId {
        self.packet_id
    }

    #[must_use]
    pub fn acks(&self) -> &[SubscribeAck] {
        &self.acks
    }
}

impl EncodePacket for SubscribeAckPacket {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        let old_len = buf.len();
        let remaining_length = PacketId::bytes() + self.acks.len() * SubscribeAck::bytes();
        let fixed_header = FixedHeader::new(PacketType::SubscribeAck, remaining_length)?;
        fixed_header.encode(buf)?;

        self.packet_id.encode(buf)?;
        for ack in &self.acks {
            buf.push(u8::from(*ack));
        }
        Ok(buf.len() - old_len)
    }
}

impl DecodePacket for SubscribeAckPacket {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let fixed_header = FixedHeader::decode(ba)?;
        if fixed_header.packet_type() != PacketType::SubscribeAck {
            return Err(DecodeError::InvalidPacketType);
        }

        let packet_id = PacketId::decode(ba)?;
        let mut remaining = fixed_header
            .remaining_length()
            .checked_sub(PacketId::bytes())
            .ok_or(DecodeError::InvalidRemainingLength)?;
        let mut acks = Vec::new();
        while remaining > 0 {
            acks.push(SubscribeAck::try_from(ba.read_byte()?)?);
            remaining -= SubscribeAck::bytes();
        }

        Ok(Self { packet_id, acks })
    }
}

impl Packet for SubscribeAckPacket {
    fn packet_type(&self) -> PacketType {
        PacketType::SubscribeAck
    }

    fn bytes(&self) -> Result<usize, VarIntError> {
        let remaining_length = PacketId::bytes() + self.acks.len() * SubscribeAck::bytes();
        let fixed_header = FixedHeader::new(PacketType::SubscribeAck, remaining_length)?;
        Ok(fixed_header.bytes() + fixed_header.remaining_length())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let packet = SubscribeAckPacket::with_acks(
            PacketId::new(4),
            vec![SubscribeAck::QoS(QoS::ExactOnce), SubscribeAck::Failed],
        );
        let mut buf = Vec::new();
        packet.encode(&mut buf).unwrap();
        assert_eq!(&buf, &[0x90, 0x04, 0x00, 0x04, 0x02, 0x80]);
        let mut ba = ByteArray::new(&buf);
        assert_eq!(SubscribeAckPacket::decode(&mut ba).unwrap(), packet);
    }
}

// Copyright (c) 2026 Faro Project Developers. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use super::{FixedHeader, Packet, PacketType};
use crate::{ByteArray, DecodeError, DecodePacket, EncodeError, EncodePacket, VarIntError};

/// `PingRequestPacket` is sent from client to server to keep the connection
/// alive and to probe that the server is responsive. It has no variable
/// header and no payload.
#[allow(clippy::module_name_repetitions)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PingRequestPacket {}

impl PingRequestPacket {
    #[must_use]
    pub const fn new() -> Self {
        Self {}
    }
}

impl EncodePacket for PingRequestPacket {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        let fixed_header = FixedHeader::new(PacketType::PingRequest, 0)?;
        fixed_header.encode(buf)
    }
}

impl DecodePacket for PingRequestPacket {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let fixed_header = FixedHeader::decode(ba)?;
        if fixed_header.packet_type() != PacketType::PingRequest {
            return Err(DecodeError::InvalidPacketType);
        }
        // PINGREQ carries no body.
        if fixed_header.remaining_length() != 0 {
            return Err(DecodeError::InvalidRemainingLength);
        }
        Ok(Self {})
    }
}

impl Packet for PingRequestPacket {
    fn packet_type(&self) -> PacketType {
        PacketType::PingRequest
    }

    fn bytes(&self) -> Result<usize, VarIntError> {
        Ok(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let packet = PingRequestPacket::new();
        let mut buf = Vec::new();
        packet.encode(&mut buf).unwrap();
        assert_eq!(&buf, &[0xc0, 0x00]);
        let mut ba = ByteArray::new(&buf);
        assert!(PingRequestPacket::decode(&mut ba).is_ok());
    }

    #[test]
    fn test_decode_rejects_nonzero_length() {
        let buf = [0xc0, 0x01, 0x00];
        let mut ba = ByteArray::new(&buf);
        assert_eq!(
            PingRequestPacket::decode(&mut ba),
            Err(DecodeError::InvalidRemainingLength)
        );
    }
}

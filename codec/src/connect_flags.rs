// Copyright (c) 2026 Faro Project Developers. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use std::convert::TryFrom;

use crate::{ByteArray, DecodeError, DecodePacket, EncodeError, EncodePacket, QoS};

/// Structure of `ConnectFlags` is:
/// ```txt
///         7               6              5          4-3          2            1             0
/// +---------------+---------------+-------------+----------+-----------+---------------+----------+
/// | Username Flag | Password Flag | Will Retain | Will QoS | Will Flag | Clean Session | Reserved |
/// +---------------+---------------+-------------+----------+-----------+---------------+----------+
/// ```
///
/// The reserved bit must be 0 in MQTT 3.1.1 and 5.0; 3.1 clients are allowed
/// to set it, so validation of that bit is left to the CONNECT parser which
/// knows the protocol level.
#[allow(clippy::struct_excessive_bools)]
#[allow(clippy::module_name_repetitions)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectFlags {
    has_username: bool,

    /// If `has_username` is false, this flag shall be false too in v3.
    has_password: bool,

    /// Whether the Will Message is published with the retain bit.
    /// Must be false when `will` is false.
    will_retain: bool,

    /// `QoS` level to be used in the Will Message.
    will_qos: QoS,

    /// If set, a Will Message is stored on the server side when the client
    /// connects, and published when the connection closes abnormally.
    will: bool,

    /// Request that no prior session state is inherited.
    /// Named Clean Start in MQTT 5.0.
    clean_session: bool,

    /// Raw value of bit 0.
    reserved: bool,
}

impl ConnectFlags {
    /// Get byte length in packet.
    #[must_use]
    #[inline]
    pub const fn bytes() -> usize {
        1
    }

    pub const fn set_has_username(&mut self, has_username: bool) -> &mut Self {
        self.has_username = has_username;
        self
    }

    #[must_use]
    #[inline]
    pub const fn has_username(&self) -> bool {
        self.has_username
    }

    pub const fn set_has_password(&mut self, has_password: bool) -> &mut Self {
        self.has_password = has_password;
        self
    }

    #[must_use]
    #[inline]
    pub const fn has_password(&self) -> bool {
        self.has_password
    }

    pub const fn set_will_retain(&mut self, will_retain: bool) -> &mut Self {
        self.will_retain = will_retain;
        self
    }

    #[must_use]
    #[inline]
    pub const fn will_retain(&self) -> bool {
        self.will_retain
    }

    pub const fn set_will_qos(&mut self, qos: QoS) -> &mut Self {
        self.will_qos = qos;
        self
    }

    #[must_use]
    #[inline]
    pub const fn will_qos(&self) -> QoS {
        self.will_qos
    }

    pub const fn set_will(&mut self, will: bool) -> &mut Self {
        if !will {
            self.will_qos = QoS::AtMostOnce;
            self.will_retain = false;
        }
        self.will = will;
        self
    }

    #[must_use]
    #[inline]
    pub const fn will(&self) -> bool {
        self.will
    }

    pub const fn set_clean_session(&mut self, clean_session: bool) -> &mut Self {
        self.clean_session = clean_session;
        self
    }

    #[must_use]
    #[inline]
    pub const fn clean_session(&self) -> bool {
        self.clean_session
    }

    /// Value of the reserved bit 0.
    #[must_use]
    #[inline]
    pub const fn reserved(&self) -> bool {
        self.reserved
    }
}

impl Default for ConnectFlags {
    fn default() -> Self {
        Self {
            has_username: false,
            has_password: false,
            will_retain: false,
            will_qos: QoS::AtMostOnce,
            will: false,
            clean_session: true,
            reserved: false,
        }
    }
}

impl EncodePacket for ConnectFlags {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        let mut flags: u8 = 0;
        if self.has_username {
            flags |= 0b1000_0000;
        }
        if self.has_password {
            flags |= 0b0100_0000;
        }
        if self.will_retain {
            flags |= 0b0010_0000;
        }
        flags |= match self.will_qos {
            QoS::AtMostOnce => 0b0000_0000,
            QoS::AtLeastOnce => 0b0000_1000,
            QoS::ExactOnce => 0b0001_0000,
        };
        if self.will {
            flags |= 0b0000_0100;
        }
        if self.clean_session {
            flags |= 0b0000_0010;
        }
        buf.push(flags);

        Ok(Self::bytes())
    }
}

impl DecodePacket for ConnectFlags {
    fn decode(ba: &mut ByteArray) -> Result<Self, DecodeError> {
        let flags = ba.read_byte()?;

        let has_username = (flags & 0b1000_0000) == 0b1000_0000;
        let has_password = (flags & 0b0100_0000) == 0b0100_0000;
        let will_retain = (flags & 0b0010_0000) == 0b0010_0000;
        // The Will QoS MUST NOT be 3 [MQTT-3.1.2-14].
        let will_qos = QoS::try_from((flags & 0b0001_1000) >> 3)
            .map_err(|_err| DecodeError::InvalidConnectFlags)?;
        let will = (flags & 0b0000_0100) == 0b0000_0100;
        let clean_session = (flags & 0b0000_0010) == 0b0000_0010;
        let reserved = (flags & 0b0000_0001) == 0b0000_0001;

        // If the Will Flag is set to 0 the Will QoS MUST be 0 and Will Retain
        // MUST be 0 [MQTT-3.1.2-11], [MQTT-3.1.2-13].
        if !will && (will_qos != QoS::AtMostOnce || will_retain) {
            return Err(DecodeError::InvalidConnectFlags);
        }

        // If the User Name Flag is set to 0, the Password Flag MUST be
        // set to 0 [MQTT-3.1.2-22].
        if !has_username && has_password {
            return Err(DecodeError::InvalidConnectFlags);
        }

        Ok(Self {
            has_username,
            has_password,
            will_retain,
            will_qos,
            will,
            clean_session,
            reserved,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode() {
        let buf = [0b1100_0110];
        let mut ba = ByteArray::new(&buf);
        let flags = ConnectFlags::decode(&mut ba).unwrap();
        assert!(flags.has_username());
        assert!(flags.has_password());
        assert!(flags.will());
        assert!(flags.clean_session());
        assert!(!flags.will_retain());
    }

    #[test]
    fn test_decode_rejects_will_qos3() {
        let buf = [0b0001_1100];
        let mut ba = ByteArray::new(&buf);
        assert_eq!(
            ConnectFlags::decode(&mut ba),
            Err(DecodeError::InvalidConnectFlags)
        );
    }

    #[test]
    fn test_decode_rejects_password_without_username() {
        let buf = [0b0100_0010];
        let mut ba = ByteArray::new(&buf);
        assert_eq!(
            ConnectFlags::decode(&mut ba),
            Err(DecodeError::InvalidConnectFlags)
        );
    }
}

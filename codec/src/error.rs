// Copyright (c) 2026 Faro Project Developers. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use std::io;

use crate::byte_array::ByteArrayError;
use crate::topic::TopicError;
use crate::utils::StringError;
use crate::var_int::VarIntError;

/// Errors returned while parsing a control packet from a byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Not enough bytes available in buffer.
    OutOfData,

    /// Variable Byte Integer is overlong, or uses more than 4 bytes.
    BadVarInt,

    /// Packet type nibble is 0 or unknown within the protocol level.
    InvalidPacketType,

    /// Reserved flag bits do not match the value required for the packet type.
    InvalidPacketFlags,

    /// Declared remaining length disagrees with the bytes present.
    InvalidRemainingLength,

    /// Whole packet exceeds the negotiated maximum packet size.
    PacketTooLarge,

    /// Payload exceeds the 268,435,455 byte protocol limit.
    PayloadTooLarge,

    /// Ill-formed UTF-8 string data.
    InvalidString,

    /// Protocol name is neither "MQTT" nor "MQIsdp".
    InvalidProtocolName,

    /// Protocol level is not 3.1, 3.1.1 or 5.0.
    InvalidProtocolLevel,

    /// QoS value out of 0..=2.
    InvalidQoS,

    /// Packet identifier is zero where a non-zero value is required.
    InvalidPacketId,

    InvalidClientId,

    /// Topic name or topic filter violates MQTT chapter 4.7 rules.
    InvalidTopic,

    /// SUBSCRIBE or UNSUBSCRIBE carries no topic filter.
    EmptyTopicFilter,

    /// Property identifier unknown, or not allowed on this packet type.
    InvalidPropertyType,

    /// Property carries a forbidden value, e.g. receive-maximum of 0.
    InvalidPropertyValue,

    /// Property other than user-property appears twice.
    DuplicateProperty,

    /// Reason code unknown, or not allowed on this packet type.
    InvalidReasonCode,

    /// Connect flags violate the protocol, e.g. password without username.
    InvalidConnectFlags,
}

/// Errors returned while serializing a control packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeError {
    IoError,

    /// Field value cannot be represented on the wire.
    InvalidData,

    /// Total length over the Variable Byte Integer range.
    TooManyData,

    /// Encoded packet would exceed the peer maximum packet size.
    /// Nothing has been written to the output buffer.
    PacketTooLarge,

    /// Operation not valid for this packet type, e.g. dup on QoS 0.
    InvalidPacketType,
}

impl From<ByteArrayError> for DecodeError {
    fn from(err: ByteArrayError) -> Self {
        match err {
            ByteArrayError::OutOfRange => Self::OutOfData,
            ByteArrayError::InvalidString(_) => Self::InvalidString,
        }
    }
}

impl From<StringError> for DecodeError {
    fn from(_err: StringError) -> Self {
        Self::InvalidString
    }
}

impl From<TopicError> for DecodeError {
    fn from(_err: TopicError) -> Self {
        Self::InvalidTopic
    }
}

impl From<VarIntError> for DecodeError {
    fn from(_err: VarIntError) -> Self {
        Self::BadVarInt
    }
}

impl From<std::string::FromUtf8Error> for DecodeError {
    fn from(_err: std::string::FromUtf8Error) -> Self {
        Self::InvalidString
    }
}

impl From<io::Error> for EncodeError {
    fn from(_err: io::Error) -> Self {
        Self::IoError
    }
}

impl From<StringError> for EncodeError {
    fn from(_err: StringError) -> Self {
        Self::InvalidData
    }
}

impl From<TopicError> for EncodeError {
    fn from(_err: TopicError) -> Self {
        Self::InvalidData
    }
}

impl From<VarIntError> for EncodeError {
    fn from(_err: VarIntError) -> Self {
        Self::TooManyData
    }
}

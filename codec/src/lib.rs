// Copyright (c) 2026 Faro Project Developers. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Wire codec for MQTT 3.1, 3.1.1 and 5.0 control packets.
//!
//! Packet structs live in [`v3`] and [`v5`]; this root module holds the
//! primitive field types shared by both protocol generations.

#![deny(clippy::all, clippy::cargo, clippy::nursery, clippy::pedantic)]
#![allow(clippy::multiple_crate_versions)]

mod base;
mod binary_data;
mod bool_data;
mod byte_array;
mod connect_flags;
mod error;
mod header;
mod packet_id;
mod string_data;
mod string_pair_data;
pub mod topic;
mod u16_data;
mod u32_data;
pub mod utils;
mod var_int;

pub mod v3;
pub mod v5;

pub use base::{DecodePacket, EncodePacket, ProtocolLevel, QoS};
pub use binary_data::BinaryData;
pub use bool_data::BoolData;
pub use byte_array::{ByteArray, ByteArrayError};
pub use connect_flags::ConnectFlags;
pub use error::{DecodeError, EncodeError};
pub use header::{FixedHeader, Packet, PacketType};
pub use packet_id::PacketId;
pub use string_data::StringData;
pub use string_pair_data::StringPairData;
pub use topic::{PubTopic, SubTopic, TopicError, TopicFilter};
pub use u16_data::U16Data;
pub use u32_data::U32Data;
pub use var_int::{VarInt, VarIntError, MAX_VAR_INT};

/// Hard protocol ceiling on PUBLISH payload size, 256MB - 1.
pub const MAX_PAYLOAD: usize = 268_435_455;

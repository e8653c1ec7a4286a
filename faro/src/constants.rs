// Copyright (c) 2026 Faro Project Developers. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

/// Hard ceiling on PUBLISH payload size imposed by the protocol, 256MB - 1.
pub const MAX_PAYLOAD_SIZE: usize = codec::MAX_PAYLOAD;

/// Seconds from transport open to a complete CONNECT packet.
pub const DEFAULT_HANDSHAKE_TIMEOUT: u64 = 5;

/// Seconds to flush pending writes after a disconnect intent.
pub const DEFAULT_CLOSE_TIMEOUT: u64 = 3;

/// Engine-side ping interval in seconds; zero or below disables it.
pub const DEFAULT_PING_INTERVAL: u64 = 50;

/// Keepalive cut-off factor: a session is dropped after 1.5 times the
/// negotiated keepalive without inbound traffic [MQTT-3.1.2-24].
pub const KEEPALIVE_FACTOR: f64 = 1.5;

pub const DEFAULT_MAX_INFLIGHT_MESSAGES: usize = 20;

pub const DEFAULT_MAX_QUEUED_MESSAGES: usize = 1000;

pub const DEFAULT_MAX_KEEPALIVE: u16 = 65535;

pub const DEFAULT_MAX_TOPIC_ALIAS: u16 = 10;

/// PBKDF2 iteration floor for freshly hashed credentials.
pub const PW_MIN_ITERATIONS: u32 = 101;

/// Salt length of stored credentials, in bytes.
pub const PW_SALT_LEN: usize = 12;

// Copyright (c) 2026 Faro Project Developers. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use codec::QoS;

use crate::config::{Config, Queues};

/// Per-session view of the broker configuration, plus the negotiated
/// keepalive.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Negotiated keepalive in seconds, 0 while no CONNECT was seen or when
    /// the client disabled it.
    keep_alive: u64,

    connect_timeout: u64,

    close_timeout: u64,

    max_keepalive: u16,

    allow_empty_client_id: bool,

    use_username_as_clientid: bool,

    max_qos: QoS,

    retain_available: bool,

    max_topic_alias: u16,

    max_packet_size: usize,

    payload_limit: usize,

    send_disconnect_on_error: bool,

    queues: Queues,
}

impl SessionConfig {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            keep_alive: 0,
            connect_timeout: config.general.timeout_handshake,
            close_timeout: config.general.timeout_close,
            max_keepalive: config.general.max_keepalive,
            allow_empty_client_id: config.security.allow_zero_length_clientid,
            use_username_as_clientid: config.security.use_username_as_clientid,
            max_qos: config.general.max_qos(),
            retain_available: config.general.retain_available,
            max_topic_alias: config.general.max_topic_alias,
            max_packet_size: config.general.max_packet_size,
            payload_limit: config.general.payload_limit(),
            send_disconnect_on_error: config.general.send_disconnect_on_error,
            queues: config.queues.clone(),
        }
    }

    pub fn set_keep_alive(&mut self, keep_alive: u64) {
        self.keep_alive = keep_alive;
    }

    #[inline]
    #[must_use]
    pub const fn keep_alive(&self) -> u64 {
        self.keep_alive
    }

    #[inline]
    #[must_use]
    pub const fn connect_timeout(&self) -> u64 {
        self.connect_timeout
    }

    #[inline]
    #[must_use]
    pub const fn close_timeout(&self) -> u64 {
        self.close_timeout
    }

    #[inline]
    #[must_use]
    pub const fn max_keepalive(&self) -> u16 {
        self.max_keepalive
    }

    #[inline]
    #[must_use]
    pub const fn allow_empty_client_id(&self) -> bool {
        self.allow_empty_client_id
    }

    #[inline]
    #[must_use]
    pub const fn use_username_as_clientid(&self) -> bool {
        self.use_username_as_clientid
    }

    #[inline]
    #[must_use]
    pub const fn max_qos(&self) -> QoS {
        self.max_qos
    }

    #[inline]
    #[must_use]
    pub const fn retain_available(&self) -> bool {
        self.retain_available
    }

    #[inline]
    #[must_use]
    pub const fn max_topic_alias(&self) -> u16 {
        self.max_topic_alias
    }

    #[inline]
    #[must_use]
    pub const fn max_packet_size(&self) -> usize {
        self.max_packet_size
    }

    #[inline]
    #[must_use]
    pub const fn payload_limit(&self) -> usize {
        self.payload_limit
    }

    #[inline]
    #[must_use]
    pub const fn send_disconnect_on_error(&self) -> bool {
        self.send_disconnect_on_error
    }

    #[inline]
    #[must_use]
    pub const fn queues(&self) -> &Queues {
        &self.queues
    }
}

// Copyright (c) 2026 Faro Project Developers. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use codec::v5::RetainHandling;
use codec::QoS;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Engine-local identifier of one connection.
pub type SessionId = u64;

/// User-visible properties carried through from a v5 PUBLISH or will
/// property set to the subscriber side.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageProps {
    pub payload_format_indicator: Option<bool>,
    pub content_type: Option<String>,
    pub response_topic: Option<String>,
    pub correlation_data: Option<Vec<u8>>,
    pub user_properties: Vec<(String, String)>,
}

impl MessageProps {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payload_format_indicator.is_none()
            && self.content_type.is_none()
            && self.response_topic.is_none()
            && self.correlation_data.is_none()
            && self.user_properties.is_empty()
    }
}

/// A publish-equivalent application message owned by the broker.
///
/// The router stores one per inbound PUBLISH; every matched subscriber gets
/// its own deep copy so source and targets can be freed independently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
    pub retain: bool,
    pub source_client_id: String,
    pub source_username: Option<String>,
    /// Packet id on the publisher side, 0 for `QoS` 0.
    pub source_mid: u16,
    pub received_at: Instant,
    /// `message-expiry-interval` in seconds, v5 only.
    pub expiry_interval: Option<u32>,
    pub props: MessageProps,
}

impl StoredMessage {
    #[must_use]
    pub fn new(topic: &str, payload: Vec<u8>, qos: QoS, retain: bool) -> Self {
        Self {
            topic: topic.to_string(),
            payload,
            qos,
            retain,
            source_client_id: String::new(),
            source_username: None,
            source_mid: 0,
            received_at: Instant::now(),
            expiry_interval: None,
            props: MessageProps::default(),
        }
    }

    /// A message past its expiry deadline is silently dropped from queues.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expiry_interval
            .is_some_and(|interval| self.received_at.elapsed().as_secs() >= u64::from(interval))
    }

    /// Expiry interval minus the seconds the message has waited in the
    /// server, re-advertised on outbound v5 PUBLISH [MQTT-3.3.2-6].
    #[must_use]
    pub fn remaining_expiry(&self) -> Option<u32> {
        self.expiry_interval.map(|interval| {
            let waited = u32::try_from(self.received_at.elapsed().as_secs()).unwrap_or(u32::MAX);
            interval.saturating_sub(waited)
        })
    }
}

/// One subscription entry of a client, keyed by topic filter in the tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Granted maximum `QoS`.
    pub qos: QoS,

    /// Do not forward messages published by the same client id.
    pub no_local: bool,

    /// Keep the RETAIN flag of the original PUBLISH when forwarding.
    pub retain_as_published: bool,

    pub retain_handling: RetainHandling,

    /// Non-zero v5 subscription identifier, echoed in matched deliveries.
    pub subscription_identifier: Option<usize>,
}

impl Default for Subscription {
    fn default() -> Self {
        Self {
            qos: QoS::AtMostOnce,
            no_local: false,
            retain_as_published: false,
            retain_handling: RetainHandling::Send,
            subscription_identifier: None,
        }
    }
}

/// Direction of a delivery queue entry relative to this broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

/// Delivery state of one queue entry.
///
/// Outbound entries walk publish-qos* to wait-for-* chains; `Queued` holds
/// entries above the inflight window until an earlier one completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageState {
    PublishQos0,
    PublishQos1,
    WaitForPuback,
    PublishQos2,
    WaitForPubrec,
    WaitForPubrel,
    WaitForPubcomp,
    ResendPubrel,
    Queued,
}

/// Delivery queue entry of one session.
#[derive(Debug, Clone)]
pub struct ClientMessage {
    pub msg: StoredMessage,

    /// Outbound packet id; never 0 for `QoS` 1/2 entries.
    pub mid: u16,

    /// Effective `QoS` after downgrade to the subscription and broker caps.
    pub qos: QoS,

    /// RETAIN flag as forwarded.
    pub retain: bool,

    pub dup: bool,

    pub direction: Direction,

    pub state: MessageState,

    pub timestamp: Instant,

    pub subscription_identifier: Option<usize>,
}

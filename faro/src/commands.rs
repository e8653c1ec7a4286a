// Copyright (c) 2026 Faro Project Developers. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Typed commands exchanged between sessions, the dispatcher, device
//! adapters and the control plane over mpsc channels.

use codec::v5::ReasonCode;
use codec::ProtocolLevel;
use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot};

use crate::control::{CommandReply, ControlCommand};
use crate::types::{ClientMessage, MessageProps, SessionId, StoredMessage, Subscription};

/// Will message captured at CONNECT time, published on abnormal close.
#[derive(Debug, Clone)]
pub struct WillMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: codec::QoS,
    pub retain: bool,
    /// Seconds to wait before the will is published.
    pub delay_interval: u32,
    pub expiry_interval: Option<u32>,
    pub props: MessageProps,
}

/// Fully parsed and locally validated CONNECT, forwarded to the dispatcher
/// for authentication and registry admission.
#[derive(Debug, Clone)]
pub struct ConnectRequest {
    pub client_id: String,

    /// Client id was generated by the broker for a zero-length id.
    pub assigned_id: bool,

    pub clean_start: bool,

    pub protocol_level: ProtocolLevel,

    pub is_bridge: bool,

    /// Negotiated keepalive in seconds, after the `max_keepalive` clamp.
    pub keep_alive: u16,

    /// Seconds; `0xFFFF_FFFF` marks a pre-v5 persistent session.
    pub session_expiry_interval: u32,

    pub username: Option<String>,

    pub password: Option<Vec<u8>>,

    pub will: Option<WillMessage>,
}

/// Session state restored from the registry when a persistent session is
/// resumed.
#[derive(Debug, Clone, Default)]
pub struct SavedSession {
    pub last_mid: u16,
    pub subscriptions: HashMap<String, Subscription>,
    /// Unfinished outbound deliveries, retransmitted with `dup` set.
    pub pending_out: Vec<ClientMessage>,
}

/// Dispatcher verdict on a CONNECT.
#[derive(Debug, Clone)]
pub enum ConnectDecision {
    Accept {
        session_present: bool,
        saved: Option<SavedSession>,
    },
    /// v5 reason; sessions map it onto the v3 return code set when needed.
    Reject { reason: ReasonCode },
}

/// Subscription filters requested in one SUBSCRIBE packet.
#[derive(Debug, Clone)]
pub struct SubscribeRequest {
    pub packet_id: u16,
    pub filters: Vec<(String, Subscription)>,
}

/// Dispatcher response to a SUBSCRIBE, plus retained messages owed to the
/// new subscriptions.
#[derive(Debug, Clone)]
pub struct SubscribeReply {
    pub packet_id: u16,
    /// Granted QoS (Success/GrantedQoS1/GrantedQoS2) or an error code, one
    /// per filter in request order.
    pub acks: Vec<ReasonCode>,
    pub retained: Vec<(StoredMessage, Subscription)>,
}

/// Commands sent from a session task to the dispatcher.
#[derive(Debug)]
pub enum SessionToDispatcherCmd {
    /// Announce the session task and hand over its command sender.
    Register(SessionId, mpsc::Sender<DispatcherToSessionCmd>),

    Connect(SessionId, ConnectRequest),

    /// An application message released by the inbound QoS pipeline.
    Publish(SessionId, StoredMessage),

    Subscribe(SessionId, SubscribeRequest),

    Unsubscribe {
        session_id: SessionId,
        packet_id: u16,
        filters: Vec<String>,
    },

    /// Session is going away. `publish_will` is false after a clean
    /// DISCONNECT without reason 0x04.
    Disconnect {
        session_id: SessionId,
        publish_will: bool,
        session_expiry_interval: Option<u32>,
        saved: Option<SavedSession>,
    },
}

/// Commands sent from the dispatcher to one session task.
#[derive(Debug)]
pub enum DispatcherToSessionCmd {
    ConnectAck(ConnectDecision),

    /// Fan-out delivery; the session queues it through its delivery engine.
    Publish(StoredMessage, Subscription),

    SubscribeAck(SubscribeReply),

    UnsubscribeAck {
        packet_id: u16,
        reasons: Vec<ReasonCode>,
    },

    /// Router outcome of a QoS 1 client publish, keyed by the
    /// publisher-side packet id. Used for the v5 `NoMatchingSubscribers`
    /// PUBACK reason; not emitted for other QoS levels.
    PublishResult { source_mid: u16, matched: usize },

    /// Another connection took over this client id; close immediately.
    Takeover,

    Stop,
}

/// Commands sent from a device adapter to the dispatcher.
#[derive(Debug)]
pub enum DeviceToDispatcherCmd {
    /// A sample synthesized as a QoS 0, non-retained publish.
    Publish {
        source: String,
        topic: String,
        payload: Vec<u8>,
    },

    /// Register command-topic subscriptions for this adapter.
    Subscribe {
        source: String,
        filters: Vec<String>,
        sender: mpsc::Sender<DispatcherToDeviceCmd>,
    },
}

/// Commands sent from the dispatcher to one device adapter.
#[derive(Debug, Clone)]
pub enum DispatcherToDeviceCmd {
    /// A publish matched one of the adapter's command-topic filters.
    SendMessage { topic: String, payload: Vec<u8> },

    /// A client session was opened on the broker.
    SessionOpened { client_id: String },
}

/// Control plane request with a oneshot reply channel.
#[derive(Debug)]
pub struct ControlRequest {
    pub command: ControlCommand,
    pub reply: oneshot::Sender<CommandReply>,
}

/// Dispatcher inbox, merging every producer.
#[derive(Debug)]
pub enum DispatcherCmd {
    Session(SessionToDispatcherCmd),

    Device(DeviceToDispatcherCmd),

    Control(ControlRequest),

    /// Fires when a will-delay-interval elapses; `epoch` guards against the
    /// client having reconnected meanwhile.
    DelayedWill { client_id: String, epoch: u64 },
}

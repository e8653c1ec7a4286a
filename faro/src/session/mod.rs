// Copyright (c) 2026 Faro Project Developers. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Per-connection state machine.
//!
//! One session task exists per transport connection. It owns the frame
//! accumulator, the protocol-version selection, the QoS delivery queues and
//! the inbound topic-alias table, and talks to the dispatcher over typed
//! commands.

use codec::v5::ReasonCode;
use codec::{DecodeError, EncodePacket, Packet, ProtocolLevel, v3, v5};
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use crate::commands::{
    ConnectDecision, DispatcherCmd, DispatcherToSessionCmd, SavedSession, SessionToDispatcherCmd,
};
use crate::constants::KEEPALIVE_FACTOR;
use crate::error::{Error, ErrorKind};
use crate::store::TopicAliasMap;
use crate::stream::Stream;
use crate::types::{ClientMessage, MessageState, SessionId};

mod client;
mod client_v5;
mod config;
mod frame;
mod inflight;

pub use config::SessionConfig;
pub use frame::FrameAccumulator;
pub use inflight::{InboundOutcome, InboundQueue, OutboundQueue, PubrecOutcome, PushOutcome};

/// Connection status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Transport is open, no CONNECT seen yet.
    Invalid,

    /// CONNECT forwarded to the dispatcher, waiting for its verdict.
    Connecting,

    Connected,

    Disconnecting,

    Disconnected,
}

/// Per-connection state machine.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    config: SessionConfig,
    stream: Stream,

    status: Status,
    protocol_level: ProtocolLevel,
    is_bridge: bool,
    client_id: String,
    username: Option<String>,
    assigned_id: bool,
    clean_start: bool,
    session_expiry_interval: u32,

    /// Clamped keepalive advertised back to v5 clients.
    server_keep_alive: Option<u16>,

    /// Whole-packet limit advertised by the peer in CONNECT; 0 = none.
    peer_max_packet_size: usize,

    /// Last inbound packet.
    instant: Instant,
    opened_at: Instant,

    frame: FrameAccumulator,
    aliases: TopicAliasMap,
    outbound: OutboundQueue,
    inbound: InboundQueue,

    /// v5 QoS 1 publishes whose PUBACK waits for the router verdict.
    pending_puback: HashSet<u16>,

    /// Publish the will on close; cleared by a clean DISCONNECT.
    publish_will: bool,

    /// Session expiry override from a v5 DISCONNECT.
    disconnect_expiry: Option<u32>,

    sender: mpsc::Sender<DispatcherCmd>,
    receiver: mpsc::Receiver<DispatcherToSessionCmd>,
}

impl Session {
    #[must_use]
    pub fn new(
        id: SessionId,
        config: SessionConfig,
        stream: Stream,
        sender: mpsc::Sender<DispatcherCmd>,
        receiver: mpsc::Receiver<DispatcherToSessionCmd>,
    ) -> Self {
        let max_packet_size = config.max_packet_size();
        let max_topic_alias = config.max_topic_alias();
        let queues = config.queues().clone();
        Self {
            id,
            config,
            stream,

            status: Status::Invalid,
            protocol_level: ProtocolLevel::V311,
            is_bridge: false,
            client_id: String::new(),
            username: None,
            assigned_id: false,
            clean_start: true,
            session_expiry_interval: 0,
            server_keep_alive: None,
            peer_max_packet_size: 0,

            instant: Instant::now(),
            opened_at: Instant::now(),

            frame: FrameAccumulator::new(max_packet_size),
            aliases: TopicAliasMap::new(max_topic_alias),
            outbound: OutboundQueue::new(queues),
            inbound: InboundQueue::new(),

            pending_puback: HashSet::new(),
            publish_will: true,
            disconnect_expiry: None,

            sender,
            receiver,
        }
    }

    /// Drive the session until the transport closes or a fatal error.
    pub async fn run_loop(mut self) {
        let mut buf = Vec::with_capacity(4096);

        loop {
            if self.status == Status::Disconnected {
                break;
            }

            tokio::select! {
                ret = self.stream.read_buf(&mut buf) => match ret {
                    Ok(0) => {
                        log::info!("session: {} transport closed by peer", self.id);
                        break;
                    }
                    Ok(_n) => {
                        self.frame.feed(&buf);
                        buf.clear();
                        if let Err(err) = self.process_frames().await {
                            log::error!("session: {} error: {err}", self.id);
                            break;
                        }
                    }
                    Err(err) => {
                        log::error!("session: {} read error: {err}", self.id);
                        break;
                    }
                },
                cmd = self.receiver.recv() => match cmd {
                    Some(cmd) => {
                        if let Err(err) = self.handle_dispatcher_cmd(cmd).await {
                            log::error!("session: {} error: {err}", self.id);
                            break;
                        }
                    }
                    None => break,
                },
                () = tokio::time::sleep(Duration::from_secs(1)) => {
                    self.check_timers().await;
                }
            }
        }

        self.teardown().await;
    }

    /// Reset the keepalive reference on inbound packets.
    fn reset_instant(&mut self) {
        self.instant = Instant::now();
    }

    fn close(&mut self) {
        self.status = Status::Disconnected;
    }

    async fn process_frames(&mut self) -> Result<(), Error> {
        loop {
            // Pipelined packets between CONNECT and its verdict stay
            // buffered; on_connect_accepted drains them afterwards.
            if self.status == Status::Connecting {
                return Ok(());
            }
            match self.frame.next_frame() {
                Ok(Some(frame)) => {
                    self.reset_instant();
                    self.handle_client_frame(&frame).await?;
                    if self.status == Status::Disconnected {
                        return Ok(());
                    }
                }
                Ok(None) => return Ok(()),
                Err(err) => {
                    log::error!("session: {} malformed stream: {err:?}", self.id);
                    return self.close_with_error(map_decode_error(err)).await;
                }
            }
        }
    }

    /// Close after a protocol violation. Established v5 sessions get a
    /// DISCONNECT with the mapped reason first, unless the operator turned
    /// that off; 3.x clients observe a bare close [MQTT-4.8].
    pub(super) async fn close_with_error(&mut self, reason: ReasonCode) -> Result<(), Error> {
        if self.protocol_level == ProtocolLevel::V5
            && self.status == Status::Connected
            && self.config.send_disconnect_on_error()
        {
            let packet = v5::DisconnectPacket::with_reason(reason);
            let _sent = self.try_send(&packet).await;
        }
        self.close();
        Ok(())
    }

    /// Encode and transmit a packet; an oversize packet is an error.
    pub(super) async fn send<P: Packet + EncodePacket>(&mut self, packet: P) -> Result<(), Error> {
        if self.try_send(&packet).await? {
            Ok(())
        } else {
            Err(Error::new(
                ErrorKind::EncodeError,
                "session: Packet exceeds peer maximum packet size",
            ))
        }
    }

    /// Encode and transmit a packet.
    ///
    /// Returns `Ok(false)` when the encoded size would exceed the peer
    /// maximum packet size; nothing is written in that case and the caller
    /// behaves as if the transmission completed [MQTT-3.1.2-25].
    pub(super) async fn try_send<P: Packet + EncodePacket>(
        &mut self,
        packet: &P,
    ) -> Result<bool, Error> {
        if self.peer_max_packet_size > 0 {
            let total = packet.bytes().map_err(|_err| {
                Error::new(ErrorKind::EncodeError, "session: Packet size out of range")
            })?;
            if total > self.peer_max_packet_size {
                log::debug!(
                    "session: {} withholding {:?} of {total} bytes, peer limit {}",
                    self.id,
                    packet.packet_type(),
                    self.peer_max_packet_size
                );
                return Ok(false);
            }
        }

        let mut buf = Vec::new();
        packet.encode(&mut buf)?;
        self.stream.write_all(&buf).await?;
        Ok(true)
    }

    async fn handle_dispatcher_cmd(&mut self, cmd: DispatcherToSessionCmd) -> Result<(), Error> {
        match cmd {
            DispatcherToSessionCmd::ConnectAck(decision) => match decision {
                ConnectDecision::Accept {
                    session_present,
                    saved,
                } => self.on_connect_accepted(session_present, saved).await,
                ConnectDecision::Reject { reason } => self.on_connect_rejected(reason).await,
            },
            DispatcherToSessionCmd::Publish(msg, subscription) => {
                let outcome =
                    self.outbound
                        .push(msg, &subscription, self.config.max_qos(), false);
                self.handle_push_outcome(outcome).await
            }
            DispatcherToSessionCmd::SubscribeAck(reply) => self.on_subscribe_reply(reply).await,
            DispatcherToSessionCmd::UnsubscribeAck { packet_id, reasons } => {
                self.on_unsubscribe_reply(packet_id, &reasons).await
            }
            DispatcherToSessionCmd::PublishResult {
                source_mid,
                matched,
            } => self.on_publish_result(source_mid, matched).await,
            DispatcherToSessionCmd::Takeover => {
                log::info!(
                    "session: {} taken over by a new connection of {}",
                    self.id,
                    self.client_id
                );
                if self.protocol_level == ProtocolLevel::V5 && self.status == Status::Connected {
                    let packet = v5::DisconnectPacket::with_reason(ReasonCode::SessionTakenOver);
                    let _sent = self.try_send(&packet).await;
                }
                self.close();
                Ok(())
            }
            DispatcherToSessionCmd::Stop => {
                self.close();
                Ok(())
            }
        }
    }

    async fn on_connect_accepted(
        &mut self,
        session_present: bool,
        saved: Option<SavedSession>,
    ) -> Result<(), Error> {
        if self.status != Status::Connecting {
            log::warn!("session: {} unexpected ConnectAck in {:?}", self.id, self.status);
            return Ok(());
        }
        self.status = Status::Connected;

        if let Some(saved) = saved {
            self.outbound.set_last_mid(saved.last_mid);
            self.outbound.restore(saved.pending_out);
        }

        if self.protocol_level == ProtocolLevel::V5 {
            self.send_connect_ack_v5(session_present).await?;
        } else {
            let packet =
                v3::ConnectAckPacket::new(session_present, v3::ConnectReturnCode::Accepted);
            self.send(packet).await?;
        }

        // Replay unfinished QoS 1/2 deliveries of the resumed session.
        let resend = self.outbound.on_resume();
        self.emit_messages(resend).await?;

        // Drain packets the client pipelined behind its CONNECT.
        self.process_frames().await
    }

    async fn on_connect_rejected(&mut self, reason: ReasonCode) -> Result<(), Error> {
        if self.protocol_level == ProtocolLevel::V5 {
            let packet = v5::ConnectAckPacket::new(false, reason);
            self.send(packet).await?;
        } else {
            let packet = v3::ConnectAckPacket::new(false, v3_return_code(reason));
            self.send(packet).await?;
        }
        self.close();
        Ok(())
    }

    /// Finish a deferred v5 QoS 1 acknowledgment with the router verdict.
    ///
    /// Only QoS 1 publishes park their mid here; the QoS 2 exchange
    /// completes with a plain PUBCOMP since that packet has no
    /// no-matching-subscribers reason.
    async fn on_publish_result(&mut self, source_mid: u16, matched: usize) -> Result<(), Error> {
        if !self.pending_puback.remove(&source_mid) {
            return Ok(());
        }
        let reason = if matched == 0 {
            ReasonCode::NoMatchingSubscribers
        } else {
            ReasonCode::Success
        };
        let packet =
            v5::PublishAckPacket::with_reason(codec::PacketId::new(source_mid), reason);
        self.send(packet).await
    }

    async fn handle_push_outcome(&mut self, outcome: PushOutcome) -> Result<(), Error> {
        match outcome {
            PushOutcome::Send(entry) => self.emit_messages(vec![entry]).await,
            PushOutcome::Queued | PushOutcome::Dropped | PushOutcome::Expired => Ok(()),
        }
    }

    /// Transmit a batch of ready deliveries, following up on entries freed
    /// by oversize discards.
    pub(super) async fn emit_messages(
        &mut self,
        entries: Vec<ClientMessage>,
    ) -> Result<(), Error> {
        let mut work: std::collections::VecDeque<ClientMessage> = entries.into();
        while let Some(entry) = work.pop_front() {
            let sent = self.emit_one(&entry).await?;
            if sent {
                if entry.qos != codec::QoS::AtMostOnce {
                    self.outbound.mark_sent(entry.mid);
                }
            } else if entry.qos != codec::QoS::AtMostOnce {
                work.extend(self.outbound.discard(entry.mid));
            }
        }
        Ok(())
    }

    async fn emit_one(&mut self, entry: &ClientMessage) -> Result<bool, Error> {
        if entry.state == MessageState::ResendPubrel {
            return if self.protocol_level == ProtocolLevel::V5 {
                let packet = v5::PublishReleasePacket::new(codec::PacketId::new(entry.mid));
                self.try_send(&packet).await
            } else {
                let packet = v3::PublishReleasePacket::new(codec::PacketId::new(entry.mid));
                self.try_send(&packet).await
            };
        }

        if self.protocol_level == ProtocolLevel::V5 {
            let packet = self.build_publish_v5(entry)?;
            self.try_send(&packet).await
        } else {
            let packet = build_publish_v3(entry)?;
            self.try_send(&packet).await
        }
    }

    async fn check_timers(&mut self) {
        if self.status == Status::Invalid
            && self.config.connect_timeout() > 0
            && self.opened_at.elapsed().as_secs() > self.config.connect_timeout()
        {
            log::info!("session: {} handshake timeout", self.id);
            self.close();
            return;
        }

        let keep_alive = self.config.keep_alive();
        if self.status == Status::Connected && keep_alive > 0 {
            #[allow(clippy::cast_precision_loss)]
            #[allow(clippy::cast_possible_truncation)]
            #[allow(clippy::cast_sign_loss)]
            let cutoff = (keep_alive as f64 * KEEPALIVE_FACTOR) as u64;
            if self.instant.elapsed().as_secs() > cutoff {
                log::warn!(
                    "session: {} keepalive timeout for client {}",
                    self.id,
                    self.client_id
                );
                let _ret = self.close_with_error(ReasonCode::KeepAliveTimeout).await;
            }
        }
    }

    async fn teardown(&mut self) {
        let close_timeout = Duration::from_secs(self.config.close_timeout());
        let _flushed = tokio::time::timeout(close_timeout, self.stream.shutdown()).await;

        let session_expiry_interval = self
            .disconnect_expiry
            .unwrap_or(self.session_expiry_interval);
        let persistent = session_expiry_interval > 0 && !self.client_id.is_empty();
        log::debug!(
            "session: {} closing, client {:?}, clean_start={}, persistent={persistent}",
            self.id,
            self.client_id,
            self.clean_start
        );
        let saved = persistent.then(|| SavedSession {
            last_mid: self.outbound.last_mid(),
            subscriptions: HashMap::new(),
            pending_out: self.outbound.save(),
        });

        let cmd = SessionToDispatcherCmd::Disconnect {
            session_id: self.id,
            publish_will: self.publish_will,
            session_expiry_interval: Some(session_expiry_interval),
            saved,
        };
        if let Err(err) = self.sender.send(DispatcherCmd::Session(cmd)).await {
            log::error!("session: {} failed to notify dispatcher: {err}", self.id);
        }
    }

    pub(super) async fn send_to_dispatcher(
        &mut self,
        cmd: SessionToDispatcherCmd,
    ) -> Result<(), Error> {
        self.sender.send(DispatcherCmd::Session(cmd)).await?;
        Ok(())
    }
}

/// Map a wire-level decode failure onto the v5 reason taxonomy.
pub(super) const fn map_decode_error(err: DecodeError) -> ReasonCode {
    match err {
        DecodeError::PacketTooLarge | DecodeError::PayloadTooLarge => ReasonCode::PacketTooLarge,
        DecodeError::InvalidTopic => ReasonCode::TopicNameInvalid,
        DecodeError::InvalidProtocolName | DecodeError::InvalidProtocolLevel => {
            ReasonCode::UnsupportedProtocolVersion
        }
        DecodeError::InvalidClientId => ReasonCode::ClientIdentifierNotValid,
        DecodeError::InvalidPacketType
        | DecodeError::InvalidPropertyType
        | DecodeError::InvalidReasonCode
        | DecodeError::EmptyTopicFilter => ReasonCode::ProtocolError,
        _ => ReasonCode::MalformedPacket,
    }
}

/// Map a v5 connect-reject reason onto the 3.x return code set.
pub(super) const fn v3_return_code(reason: ReasonCode) -> v3::ConnectReturnCode {
    match reason {
        ReasonCode::UnsupportedProtocolVersion => v3::ConnectReturnCode::UnacceptedProtocol,
        ReasonCode::ClientIdentifierNotValid => v3::ConnectReturnCode::IdentifierRejected,
        ReasonCode::BadUserNameOrPassword => v3::ConnectReturnCode::BadUserNameOrPassword,
        ReasonCode::ServerUnavailable | ReasonCode::ServerBusy => {
            v3::ConnectReturnCode::ServerUnavailable
        }
        _ => v3::ConnectReturnCode::NotAuthorized,
    }
}

/// Build a 3.x PUBLISH from a delivery queue entry.
fn build_publish_v3(entry: &ClientMessage) -> Result<v3::PublishPacket, Error> {
    let mut packet =
        v3::PublishPacket::new(&entry.msg.topic, entry.qos, &entry.msg.payload)?;
    packet.set_retain(entry.retain);
    if entry.qos != codec::QoS::AtMostOnce {
        packet.set_packet_id(codec::PacketId::new(entry.mid));
        if entry.dup {
            packet.set_dup(true)?;
        }
    }
    Ok(packet)
}

// Copyright (c) 2026 Faro Project Developers. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Inbound packet dispatch and the MQTT 3.1/3.1.1 handlers.

use codec::utils::random_client_id;
use codec::v5::ReasonCode;
use codec::{v3, v5, ByteArray, DecodeError, DecodePacket, PacketId, PacketType, ProtocolLevel, QoS};
use std::convert::TryFrom;

use super::{map_decode_error, InboundOutcome, PubrecOutcome, Session, Status};
use crate::commands::{
    ConnectRequest, SessionToDispatcherCmd, SubscribeReply, SubscribeRequest, WillMessage,
};
use crate::error::Error;
use crate::store::SESSION_NEVER_EXPIRES;
use crate::types::{MessageProps, StoredMessage, Subscription};

impl Session {
    pub(super) async fn handle_client_frame(&mut self, buf: &[u8]) -> Result<(), Error> {
        let Some(first) = buf.first().copied() else {
            return Ok(());
        };
        let packet_type = match PacketType::try_from(first) {
            Ok(packet_type) => packet_type,
            Err(err) => return self.close_with_error(map_decode_error(err)).await,
        };

        // Before CONNECT completes only CONNECT itself is legal.
        if self.status != Status::Connected && packet_type != PacketType::Connect {
            log::error!(
                "session: {} got {packet_type:?} before session establishment",
                self.id
            );
            self.close();
            return Ok(());
        }

        match packet_type {
            PacketType::Connect => self.on_client_connect(buf).await,
            PacketType::Publish { .. } => self.on_client_publish(buf).await,
            PacketType::PublishAck => self.on_client_publish_ack(buf).await,
            PacketType::PublishReceived => self.on_client_publish_received(buf).await,
            PacketType::PublishRelease => self.on_client_publish_release(buf).await,
            PacketType::PublishComplete => self.on_client_publish_complete(buf).await,
            PacketType::Subscribe => self.on_client_subscribe(buf).await,
            PacketType::Unsubscribe => self.on_client_unsubscribe(buf).await,
            PacketType::PingRequest => self.on_client_ping(buf).await,
            PacketType::PingResponse => self.on_client_ping_response(buf).await,
            PacketType::Disconnect => self.on_client_disconnect(buf).await,
            PacketType::Auth => {
                if self.protocol_level == ProtocolLevel::V5 {
                    self.on_client_auth(buf).await
                } else {
                    self.close_with_error(ReasonCode::ProtocolError).await
                }
            }
            // Server-to-client packet kinds are never legal inbound.
            PacketType::ConnectAck | PacketType::SubscribeAck | PacketType::UnsubscribeAck => {
                self.close_with_error(ReasonCode::ProtocolError).await
            }
        }
    }

    async fn on_client_connect(&mut self, buf: &[u8]) -> Result<(), Error> {
        // The server MUST treat a second CONNECT as a protocol violation
        // [MQTT-3.1.0-2]; the dispatch gate routes non-CONNECT packets
        // away, so status here is always Invalid.
        if self.status != Status::Invalid {
            return self.close_with_error(ReasonCode::ProtocolError).await;
        }

        match ProtocolLevel::peek(buf) {
            Ok(ProtocolLevel::V5) => {
                self.protocol_level = ProtocolLevel::V5;
                self.on_client_connect_v5(buf).await
            }
            Ok(level) => {
                self.protocol_level = level;
                self.on_client_connect_v3(buf).await
            }
            Err(DecodeError::InvalidProtocolName | DecodeError::InvalidProtocolLevel) => {
                // The server MUST respond with return code 0x01 and close
                // [MQTT-3.1.2-2].
                let packet =
                    v3::ConnectAckPacket::new(false, v3::ConnectReturnCode::UnacceptedProtocol);
                let _sent = self.try_send(&packet).await;
                self.close();
                Ok(())
            }
            Err(_err) => {
                // Malformed CONNECT: close without a CONNACK [MQTT-3.1.4-1].
                self.close();
                Ok(())
            }
        }
    }

    pub(super) async fn reject_client_id(&mut self) -> Result<(), Error> {
        if self.protocol_level == ProtocolLevel::V5 {
            let packet = v5::ConnectAckPacket::new(false, ReasonCode::ClientIdentifierNotValid);
            self.send(packet).await?;
        } else {
            // A non-zero return code clears Session Present [MQTT-3.2.2-4].
            let packet =
                v3::ConnectAckPacket::new(false, v3::ConnectReturnCode::IdentifierRejected);
            self.send(packet).await?;
        }
        self.close();
        Ok(())
    }

    async fn on_client_connect_v3(&mut self, buf: &[u8]) -> Result<(), Error> {
        let mut ba = ByteArray::new(buf);
        let packet = match v3::ConnectPacket::decode(&mut ba) {
            Ok(packet) => packet,
            Err(DecodeError::InvalidClientId) => {
                return self.reject_client_id().await;
            }
            Err(DecodeError::InvalidConnectFlags) => {
                // Reserved flag bit set, or inconsistent will/credential
                // flags.
                let packet = v3::ConnectAckPacket::new(
                    false,
                    v3::ConnectReturnCode::UnacceptedProtocol,
                );
                let _sent = self.try_send(&packet).await;
                self.close();
                return Ok(());
            }
            Err(err) => {
                // Close without a CONNACK [MQTT-3.1.4-1].
                log::error!("session: {} malformed CONNECT: {err:?}", self.id);
                self.close();
                return Ok(());
            }
        };

        self.is_bridge = packet.is_bridge();

        // v3 has no server-keep-alive property; out-of-range keepalives
        // are refused with the identifier-rejected return code.
        let keep_alive = packet.keep_alive();
        let max_keepalive = self.config.max_keepalive();
        if max_keepalive > 0 && (keep_alive == 0 || keep_alive > max_keepalive) {
            return self.reject_client_id().await;
        }
        self.config.set_keep_alive(u64::from(keep_alive));

        let mut client_id = packet.client_id().to_string();
        let mut assigned_id = false;
        if client_id.is_empty() {
            // 3.1 has no server-assigned ids at all.
            if self.protocol_level == ProtocolLevel::V31 || !self.config.allow_empty_client_id() {
                return self.reject_client_id().await;
            }
            client_id = random_client_id();
            assigned_id = true;
        }

        let username = packet
            .connect_flags()
            .has_username()
            .then(|| packet.username().to_string());
        let password = packet
            .connect_flags()
            .has_password()
            .then(|| packet.password().to_vec());

        if self.config.use_username_as_clientid() {
            if let Some(username) = &username {
                client_id.clone_from(username);
                assigned_id = false;
            } else {
                let packet =
                    v3::ConnectAckPacket::new(false, v3::ConnectReturnCode::NotAuthorized);
                let _sent = self.try_send(&packet).await;
                self.close();
                return Ok(());
            }
        }

        let will = packet.connect_flags().will().then(|| WillMessage {
            topic: packet.will_topic().unwrap_or_default().to_string(),
            payload: packet.will_message().to_vec(),
            qos: packet.connect_flags().will_qos(),
            retain: packet.connect_flags().will_retain(),
            delay_interval: 0,
            expiry_interval: None,
            props: MessageProps::default(),
        });

        let clean_start = packet.connect_flags().clean_session();
        // Pre-v5 persistent sessions never expire on their own.
        let session_expiry_interval = if clean_start { 0 } else { SESSION_NEVER_EXPIRES };

        let request = ConnectRequest {
            client_id: client_id.clone(),
            assigned_id,
            clean_start,
            protocol_level: self.protocol_level,
            is_bridge: packet.is_bridge(),
            keep_alive,
            session_expiry_interval,
            username: username.clone(),
            password,
            will,
        };

        self.client_id = client_id;
        self.username = username;
        self.assigned_id = assigned_id;
        self.clean_start = clean_start;
        self.session_expiry_interval = session_expiry_interval;
        self.status = Status::Connecting;

        self.send_to_dispatcher(SessionToDispatcherCmd::Connect(self.id, request))
            .await
    }

    async fn on_client_publish(&mut self, buf: &[u8]) -> Result<(), Error> {
        if self.protocol_level == ProtocolLevel::V5 {
            return self.on_client_publish_v5(buf).await;
        }

        let mut ba = ByteArray::new(buf);
        let packet = match v3::PublishPacket::decode(&mut ba) {
            Ok(packet) => packet,
            Err(err) => return self.close_with_error(map_decode_error(err)).await,
        };

        let mut msg = StoredMessage::new(
            packet.topic(),
            packet.message().to_vec(),
            packet.qos(),
            packet.retain(),
        );
        msg.source_client_id.clone_from(&self.client_id);
        msg.source_username.clone_from(&self.username);
        msg.source_mid = packet.packet_id().value();

        self.handle_publish_message(packet.packet_id().value(), packet.qos(), msg)
            .await
    }

    /// Common inbound-publish pipeline of both protocol generations,
    /// entered after decode and topic-alias resolution.
    pub(super) async fn handle_publish_message(
        &mut self,
        mid: u16,
        qos: QoS,
        msg: StoredMessage,
    ) -> Result<(), Error> {
        if qos > self.config.max_qos() {
            log::error!("session: {} publish QoS {qos:?} above broker maximum", self.id);
            return self.close_with_error(ReasonCode::QoSNotSupported).await;
        }
        if msg.retain && !self.config.retain_available() {
            return self.close_with_error(ReasonCode::RetainNotSupported).await;
        }

        if msg.payload.len() > self.config.payload_limit() {
            log::warn!(
                "session: {} dropping oversized publish of {} bytes on {}",
                self.id,
                msg.payload.len(),
                msg.topic
            );
            // The QoS flow still completes, the message is not forwarded.
            match qos {
                QoS::AtMostOnce => {}
                QoS::AtLeastOnce => {
                    if self.protocol_level == ProtocolLevel::V5 {
                        let packet = v5::PublishAckPacket::with_reason(
                            PacketId::new(mid),
                            ReasonCode::ImplementationSpecificError,
                        );
                        self.send(packet).await?;
                    } else {
                        let packet = v3::PublishAckPacket::new(PacketId::new(mid));
                        self.send(packet).await?;
                    }
                }
                QoS::ExactOnce => {
                    if self.protocol_level == ProtocolLevel::V5 {
                        let packet = v5::PublishReceivedPacket::with_reason(
                            PacketId::new(mid),
                            ReasonCode::ImplementationSpecificError,
                        );
                        self.send(packet).await?;
                    } else {
                        let packet = v3::PublishReceivedPacket::new(PacketId::new(mid));
                        self.send(packet).await?;
                    }
                }
            }
            return Ok(());
        }

        match qos {
            QoS::AtMostOnce => {
                self.send_to_dispatcher(SessionToDispatcherCmd::Publish(self.id, msg))
                    .await
            }
            QoS::AtLeastOnce => {
                self.send_to_dispatcher(SessionToDispatcherCmd::Publish(self.id, msg))
                    .await?;
                if self.protocol_level == ProtocolLevel::V5 {
                    // PUBACK goes out once the router reports the match
                    // count, so the no-matching-subscribers reason is
                    // accurate.
                    self.pending_puback.insert(mid);
                    Ok(())
                } else {
                    let packet = v3::PublishAckPacket::new(PacketId::new(mid));
                    self.send(packet).await
                }
            }
            QoS::ExactOnce => match self.inbound.on_publish(mid, msg) {
                InboundOutcome::Stored | InboundOutcome::Duplicate | InboundOutcome::MidReuse => {
                    if self.protocol_level == ProtocolLevel::V5 {
                        let packet = v5::PublishReceivedPacket::new(PacketId::new(mid));
                        self.send(packet).await
                    } else {
                        let packet = v3::PublishReceivedPacket::new(PacketId::new(mid));
                        self.send(packet).await
                    }
                }
            },
        }
    }

    async fn on_client_publish_ack(&mut self, buf: &[u8]) -> Result<(), Error> {
        let mut ba = ByteArray::new(buf);
        let mid = if self.protocol_level == ProtocolLevel::V5 {
            match v5::PublishAckPacket::decode(&mut ba) {
                Ok(packet) => packet.packet_id().value(),
                Err(err) => return self.close_with_error(map_decode_error(err)).await,
            }
        } else {
            match v3::PublishAckPacket::decode(&mut ba) {
                Ok(packet) => packet.packet_id().value(),
                Err(err) => return self.close_with_error(map_decode_error(err)).await,
            }
        };

        let ready = self.outbound.on_puback(mid);
        self.emit_messages(ready).await
    }

    async fn on_client_publish_received(&mut self, buf: &[u8]) -> Result<(), Error> {
        let mut ba = ByteArray::new(buf);
        let (mid, error) = if self.protocol_level == ProtocolLevel::V5 {
            match v5::PublishReceivedPacket::decode(&mut ba) {
                Ok(packet) => (packet.packet_id().value(), packet.reason_code().is_error()),
                Err(err) => return self.close_with_error(map_decode_error(err)).await,
            }
        } else {
            match v3::PublishReceivedPacket::decode(&mut ba) {
                Ok(packet) => (packet.packet_id().value(), false),
                Err(err) => return self.close_with_error(map_decode_error(err)).await,
            }
        };

        match self.outbound.on_pubrec(mid, error) {
            PubrecOutcome::SendPubrel => {
                if self.protocol_level == ProtocolLevel::V5 {
                    let packet = v5::PublishReleasePacket::new(PacketId::new(mid));
                    self.send(packet).await?;
                } else {
                    let packet = v3::PublishReleasePacket::new(PacketId::new(mid));
                    self.send(packet).await?;
                }
                self.outbound.mark_sent(mid);
                Ok(())
            }
            PubrecOutcome::Terminated | PubrecOutcome::Unknown => Ok(()),
        }
    }

    async fn on_client_publish_release(&mut self, buf: &[u8]) -> Result<(), Error> {
        let mut ba = ByteArray::new(buf);
        let mid = if self.protocol_level == ProtocolLevel::V5 {
            match v5::PublishReleasePacket::decode(&mut ba) {
                Ok(packet) => packet.packet_id().value(),
                Err(err) => return self.close_with_error(map_decode_error(err)).await,
            }
        } else {
            match v3::PublishReleasePacket::decode(&mut ba) {
                Ok(packet) => packet.packet_id().value(),
                Err(err) => return self.close_with_error(map_decode_error(err)).await,
            }
        };

        match self.inbound.on_pubrel(mid) {
            Some(msg) => {
                self.send_to_dispatcher(SessionToDispatcherCmd::Publish(self.id, msg))
                    .await?;
                if self.protocol_level == ProtocolLevel::V5 {
                    let packet = v5::PublishCompletePacket::new(PacketId::new(mid));
                    self.send(packet).await
                } else {
                    let packet = v3::PublishCompletePacket::new(PacketId::new(mid));
                    self.send(packet).await
                }
            }
            None => {
                // Unknown release ids still get a PUBCOMP so a replaying
                // peer can make progress.
                log::debug!("session: {} PUBREL for unknown mid {mid}", self.id);
                if self.protocol_level == ProtocolLevel::V5 {
                    let packet = v5::PublishCompletePacket::with_reason(
                        PacketId::new(mid),
                        ReasonCode::PacketIdentifierNotFound,
                    );
                    self.send(packet).await
                } else {
                    let packet = v3::PublishCompletePacket::new(PacketId::new(mid));
                    self.send(packet).await
                }
            }
        }
    }

    async fn on_client_publish_complete(&mut self, buf: &[u8]) -> Result<(), Error> {
        let mut ba = ByteArray::new(buf);
        let mid = if self.protocol_level == ProtocolLevel::V5 {
            match v5::PublishCompletePacket::decode(&mut ba) {
                Ok(packet) => packet.packet_id().value(),
                Err(err) => return self.close_with_error(map_decode_error(err)).await,
            }
        } else {
            match v3::PublishCompletePacket::decode(&mut ba) {
                Ok(packet) => packet.packet_id().value(),
                Err(err) => return self.close_with_error(map_decode_error(err)).await,
            }
        };

        let ready = self.outbound.on_pubcomp(mid);
        self.emit_messages(ready).await
    }

    async fn on_client_subscribe(&mut self, buf: &[u8]) -> Result<(), Error> {
        if self.protocol_level == ProtocolLevel::V5 {
            return self.on_client_subscribe_v5(buf).await;
        }

        let mut ba = ByteArray::new(buf);
        let packet = match v3::SubscribePacket::decode(&mut ba) {
            Ok(packet) => packet,
            Err(err) => return self.close_with_error(map_decode_error(err)).await,
        };

        let filters = packet
            .topics()
            .iter()
            .map(|topic| {
                (
                    topic.topic().to_string(),
                    Subscription {
                        qos: topic.qos(),
                        ..Subscription::default()
                    },
                )
            })
            .collect();
        let request = SubscribeRequest {
            packet_id: packet.packet_id().value(),
            filters,
        };
        self.send_to_dispatcher(SessionToDispatcherCmd::Subscribe(self.id, request))
            .await
    }

    async fn on_client_unsubscribe(&mut self, buf: &[u8]) -> Result<(), Error> {
        let mut ba = ByteArray::new(buf);
        let (packet_id, filters) = if self.protocol_level == ProtocolLevel::V5 {
            match v5::UnsubscribePacket::decode(&mut ba) {
                Ok(packet) => (
                    packet.packet_id().value(),
                    packet
                        .topics()
                        .iter()
                        .map(|topic| topic.as_ref().to_string())
                        .collect(),
                ),
                Err(err) => return self.close_with_error(map_decode_error(err)).await,
            }
        } else {
            match v3::UnsubscribePacket::decode(&mut ba) {
                Ok(packet) => (
                    packet.packet_id().value(),
                    packet
                        .topics()
                        .iter()
                        .map(|topic| topic.as_ref().to_string())
                        .collect(),
                ),
                Err(err) => return self.close_with_error(map_decode_error(err)).await,
            }
        };

        self.send_to_dispatcher(SessionToDispatcherCmd::Unsubscribe {
            session_id: self.id,
            packet_id,
            filters,
        })
        .await
    }

    async fn on_client_ping(&mut self, buf: &[u8]) -> Result<(), Error> {
        let mut ba = ByteArray::new(buf);
        if self.protocol_level == ProtocolLevel::V5 {
            if let Err(err) = v5::PingRequestPacket::decode(&mut ba) {
                return self.close_with_error(map_decode_error(err)).await;
            }
            self.send(v5::PingResponsePacket::new()).await
        } else {
            if let Err(err) = v3::PingRequestPacket::decode(&mut ba) {
                return self.close_with_error(map_decode_error(err)).await;
            }
            self.send(v3::PingResponsePacket::new()).await
        }
    }

    async fn on_client_ping_response(&mut self, buf: &[u8]) -> Result<(), Error> {
        let mut ba = ByteArray::new(buf);
        let decode_err = if self.protocol_level == ProtocolLevel::V5 {
            v5::PingResponsePacket::decode(&mut ba).err()
        } else {
            v3::PingResponsePacket::decode(&mut ba).err()
        };
        if let Some(err) = decode_err {
            return self.close_with_error(map_decode_error(err)).await;
        }

        // Only bridges receive PINGRESP; a plain client sending one is
        // violating the protocol.
        if self.is_bridge {
            Ok(())
        } else {
            log::error!("session: {} got PINGRESP from non-bridge client", self.id);
            self.close_with_error(ReasonCode::ProtocolError).await
        }
    }

    async fn on_client_disconnect(&mut self, buf: &[u8]) -> Result<(), Error> {
        if self.protocol_level == ProtocolLevel::V5 {
            return self.on_client_disconnect_v5(buf).await;
        }

        let mut ba = ByteArray::new(buf);
        if let Err(err) = v3::DisconnectPacket::decode(&mut ba) {
            return self.close_with_error(map_decode_error(err)).await;
        }

        // A clean disconnect discards the will [MQTT-3.14.4-3].
        self.publish_will = false;
        self.status = Status::Disconnecting;
        self.close();
        Ok(())
    }

    pub(super) async fn on_subscribe_reply(&mut self, reply: SubscribeReply) -> Result<(), Error> {
        if self.protocol_level == ProtocolLevel::V5 {
            let packet = v5::SubscribeAckPacket::with_reasons(
                PacketId::new(reply.packet_id),
                reply.acks.clone(),
            );
            self.send(packet).await?;
        } else {
            let acks = reply
                .acks
                .iter()
                .map(|reason| match reason {
                    ReasonCode::Success => v3::SubscribeAck::QoS(QoS::AtMostOnce),
                    ReasonCode::GrantedQoS1 => v3::SubscribeAck::QoS(QoS::AtLeastOnce),
                    ReasonCode::GrantedQoS2 => v3::SubscribeAck::QoS(QoS::ExactOnce),
                    _ => v3::SubscribeAck::Failed,
                })
                .collect();
            let packet = v3::SubscribeAckPacket::with_acks(PacketId::new(reply.packet_id), acks);
            self.send(packet).await?;
        }

        // Retained messages owed to the fresh subscriptions are delivered
        // with the RETAIN flag set.
        for (msg, subscription) in reply.retained {
            let max_qos = self.config.max_qos();
            let outcome = self.outbound.push(msg, &subscription, max_qos, true);
            self.handle_push_outcome(outcome).await?;
        }
        Ok(())
    }

    pub(super) async fn on_unsubscribe_reply(
        &mut self,
        packet_id: u16,
        reasons: &[ReasonCode],
    ) -> Result<(), Error> {
        if self.protocol_level == ProtocolLevel::V5 {
            let packet =
                v5::UnsubscribeAckPacket::with_reasons(PacketId::new(packet_id), reasons.to_vec());
            self.send(packet).await
        } else {
            let packet = v3::UnsubscribeAckPacket::new(PacketId::new(packet_id));
            self.send(packet).await
        }
    }
}

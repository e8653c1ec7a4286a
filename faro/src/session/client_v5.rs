// Copyright (c) 2026 Faro Project Developers. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! MQTT 5.0 specific handlers: CONNECT property application, topic
//! aliases, DISCONNECT reason handling and the AUTH stub.

use codec::utils::random_client_id;
use codec::v5::{Properties, Property, ReasonCode};
use codec::{
    v5, BinaryData, BoolData, ByteArray, DecodePacket, PacketId, PubTopic, QoS, StringData,
    StringPairData, U16Data, U32Data, VarInt,
};

use super::{map_decode_error, Session, Status};
use crate::commands::{ConnectRequest, SessionToDispatcherCmd, SubscribeRequest, WillMessage};
use crate::error::{Error, ErrorKind};
use crate::types::{ClientMessage, MessageProps, StoredMessage, Subscription};

/// Pull the user-visible message properties out of a PUBLISH or will
/// property set.
fn extract_message_props(properties: &Properties) -> MessageProps {
    MessageProps {
        payload_format_indicator: properties.payload_format_indicator(),
        content_type: properties.content_type().map(ToString::to_string),
        response_topic: properties.response_topic().map(ToString::to_string),
        correlation_data: properties.correlation_data().map(<[u8]>::to_vec),
        user_properties: properties
            .user_properties()
            .into_iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect(),
    }
}

impl Session {
    pub(super) async fn on_client_connect_v5(&mut self, buf: &[u8]) -> Result<(), Error> {
        let mut ba = ByteArray::new(buf);
        let packet = match v5::ConnectPacket::decode(&mut ba) {
            Ok(packet) => packet,
            Err(err) => {
                // In v5 every CONNECT failure is answered with a CONNACK
                // carrying the mapped reason before the close.
                let packet = v5::ConnectAckPacket::new(false, map_decode_error(err));
                let _sent = self.try_send(&packet).await;
                self.close();
                return Ok(());
            }
        };

        self.is_bridge = packet.is_bridge();

        // Extended authentication is not wired to any method; announce that
        // instead of pretending.
        if packet.properties().authentication_method().is_some() {
            let packet = v5::ConnectAckPacket::new(false, ReasonCode::BadAuthenticationMethod);
            self.send(packet).await?;
            self.close();
            return Ok(());
        }

        self.session_expiry_interval =
            packet.properties().session_expiry_interval().unwrap_or(0);
        if let Some(receive_maximum) = packet.properties().receive_maximum() {
            self.outbound.clamp_inflight(receive_maximum);
        }
        if let Some(maximum_packet_size) = packet.properties().maximum_packet_size() {
            self.peer_max_packet_size = maximum_packet_size as usize;
        }

        // Clamp the keepalive and advertise the server value back.
        let mut keep_alive = packet.keep_alive();
        let max_keepalive = self.config.max_keepalive();
        if max_keepalive > 0 && (keep_alive == 0 || keep_alive > max_keepalive) {
            keep_alive = max_keepalive;
            self.server_keep_alive = Some(max_keepalive);
        }
        self.config.set_keep_alive(u64::from(keep_alive));

        let mut client_id = packet.client_id().to_string();
        let mut assigned_id = false;
        if client_id.is_empty() {
            if !self.config.allow_empty_client_id() {
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
                let packet = v5::ConnectAckPacket::new(false, ReasonCode::NotAuthorized);
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
            delay_interval: packet.will_properties().will_delay_interval().unwrap_or(0),
            expiry_interval: packet.will_properties().message_expiry_interval(),
            props: extract_message_props(packet.will_properties()),
        });

        let clean_start = packet.connect_flags().clean_session();
        let request = ConnectRequest {
            client_id: client_id.clone(),
            assigned_id,
            clean_start,
            protocol_level: self.protocol_level,
            is_bridge: packet.is_bridge(),
            keep_alive,
            session_expiry_interval: self.session_expiry_interval,
            username: username.clone(),
            password,
            will,
        };

        self.client_id = client_id;
        self.username = username;
        self.assigned_id = assigned_id;
        self.clean_start = clean_start;
        self.status = Status::Connecting;

        self.send_to_dispatcher(SessionToDispatcherCmd::Connect(self.id, request))
            .await
    }

    pub(super) async fn send_connect_ack_v5(&mut self, session_present: bool) -> Result<(), Error> {
        let mut packet = v5::ConnectAckPacket::new(session_present, ReasonCode::Success);
        let config_max_qos = self.config.max_qos();
        let max_packet_size = self.config.max_packet_size();
        let max_inflight = self.config.queues().max_inflight_messages;
        let props = packet.properties_mut();

        if !self.config.retain_available() {
            props.push(Property::RetainAvailable(BoolData::new(false)));
        }
        if max_packet_size > 0 {
            let advertised = u32::try_from(max_packet_size).unwrap_or(u32::MAX);
            props.push(Property::MaximumPacketSize(U32Data::new(advertised)));
        }
        if max_inflight > 0 && max_inflight < usize::from(u16::MAX) {
            #[allow(clippy::cast_possible_truncation)]
            props.push(Property::ReceiveMaximum(U16Data::new(max_inflight as u16)));
        }
        if config_max_qos != QoS::ExactOnce {
            props.push(Property::MaximumQoS(config_max_qos));
        }
        props.push(Property::TopicAliasMaximum(U16Data::new(
            self.config.max_topic_alias(),
        )));
        if let Some(server_keep_alive) = self.server_keep_alive {
            props.push(Property::ServerKeepAlive(U16Data::new(server_keep_alive)));
        }
        if self.assigned_id {
            let assigned = StringData::from(&self.client_id).map_err(|_err| {
                Error::new(ErrorKind::EncodeError, "session: Invalid assigned client id")
            })?;
            props.push(Property::AssignedClientIdentifier(assigned));
        }

        self.send(packet).await
    }

    pub(super) async fn on_client_publish_v5(&mut self, buf: &[u8]) -> Result<(), Error> {
        let mut ba = ByteArray::new(buf);
        let packet = match v5::PublishPacket::decode(&mut ba) {
            Ok(packet) => packet,
            Err(err) => return self.close_with_error(map_decode_error(err)).await,
        };

        // Resolve and learn topic aliases before anything else sees the
        // message.
        let mut topic = packet.topic().to_string();
        if let Some(alias) = packet.properties().topic_alias() {
            if alias > self.config.max_topic_alias() {
                log::error!(
                    "session: {} topic alias {alias} above maximum {}",
                    self.id,
                    self.config.max_topic_alias()
                );
                return self.close_with_error(ReasonCode::TopicAliasInvalid).await;
            }
            if topic.is_empty() {
                match self.aliases.lookup(alias) {
                    Some(known) => topic = known.to_string(),
                    None => {
                        return self.close_with_error(ReasonCode::TopicAliasInvalid).await;
                    }
                }
            } else if !self.aliases.set(alias, &topic) {
                return self.close_with_error(ReasonCode::TopicAliasInvalid).await;
            }
        }

        let mut msg = StoredMessage::new(
            &topic,
            packet.message().to_vec(),
            packet.qos(),
            packet.retain(),
        );
        msg.source_client_id.clone_from(&self.client_id);
        msg.source_username.clone_from(&self.username);
        msg.source_mid = packet.packet_id().value();
        msg.expiry_interval = packet.properties().message_expiry_interval();
        msg.props = extract_message_props(packet.properties());

        self.handle_publish_message(packet.packet_id().value(), packet.qos(), msg)
            .await
    }

    pub(super) async fn on_client_subscribe_v5(&mut self, buf: &[u8]) -> Result<(), Error> {
        let mut ba = ByteArray::new(buf);
        let packet = match v5::SubscribePacket::decode(&mut ba) {
            Ok(packet) => packet,
            Err(err) => return self.close_with_error(map_decode_error(err)).await,
        };

        let subscription_identifier = packet.properties().subscription_identifier();
        let filters = packet
            .topics()
            .iter()
            .map(|topic| {
                (
                    topic.topic().to_string(),
                    Subscription {
                        qos: topic.qos(),
                        no_local: topic.no_local(),
                        retain_as_published: topic.retain_as_published(),
                        retain_handling: topic.retain_handling(),
                        subscription_identifier,
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

    pub(super) async fn on_client_disconnect_v5(&mut self, buf: &[u8]) -> Result<(), Error> {
        let mut ba = ByteArray::new(buf);
        let packet = match v5::DisconnectPacket::decode(&mut ba) {
            Ok(packet) => packet,
            Err(err) => return self.close_with_error(map_decode_error(err)).await,
        };

        // Reason 0x04 asks for the will to be published anyway; every other
        // reason discards it.
        self.publish_will = packet.reason_code() == ReasonCode::DisconnectWithWillMessage;

        if let Some(new_expiry) = packet.properties().session_expiry_interval() {
            // Raising a zero expiry after the fact is forbidden
            // [MQTT-3.1.2-23].
            if self.session_expiry_interval == 0 && new_expiry != 0 {
                return self.close_with_error(ReasonCode::ProtocolError).await;
            }
            self.disconnect_expiry = Some(new_expiry);
        }

        self.status = Status::Disconnecting;
        self.close();
        Ok(())
    }

    pub(super) async fn on_client_auth(&mut self, buf: &[u8]) -> Result<(), Error> {
        let mut ba = ByteArray::new(buf);
        if let Err(err) = v5::AuthPacket::decode(&mut ba) {
            return self.close_with_error(map_decode_error(err)).await;
        }

        // No extended authentication method is registered; CONNECTs that
        // announce one are already refused, so any AUTH here is a stray.
        log::warn!("session: {} AUTH without negotiated method", self.id);
        self.close_with_error(ReasonCode::BadAuthenticationMethod).await
    }

    /// Build a v5 PUBLISH from a delivery queue entry, properties included.
    pub(super) fn build_publish_v5(
        &self,
        entry: &ClientMessage,
    ) -> Result<v5::PublishPacket, Error> {
        let mut packet = v5::PublishPacket::new(&entry.msg.topic, entry.qos, &entry.msg.payload)?;
        packet.set_retain(entry.retain);
        if entry.qos != QoS::AtMostOnce {
            packet.set_packet_id(PacketId::new(entry.mid));
            if entry.dup {
                packet.set_dup(true)?;
            }
        }

        let props = packet.properties_mut();
        // Re-advertise what is left of the expiry interval [MQTT-3.3.2-6].
        if let Some(remaining) = entry.msg.remaining_expiry() {
            props.push(Property::MessageExpiryInterval(U32Data::new(remaining)));
        }
        if let Some(indicator) = entry.msg.props.payload_format_indicator {
            props.push(Property::PayloadFormatIndicator(BoolData::new(indicator)));
        }
        if let Some(content_type) = &entry.msg.props.content_type {
            let value = StringData::from(content_type).map_err(|_err| {
                Error::new(ErrorKind::EncodeError, "session: Invalid content type")
            })?;
            props.push(Property::ContentType(value));
        }
        if let Some(response_topic) = &entry.msg.props.response_topic {
            let value = PubTopic::new(response_topic).map_err(|_err| {
                Error::new(ErrorKind::EncodeError, "session: Invalid response topic")
            })?;
            props.push(Property::ResponseTopic(value));
        }
        if let Some(correlation_data) = &entry.msg.props.correlation_data {
            let value = BinaryData::from_slice(correlation_data).map_err(|_err| {
                Error::new(ErrorKind::EncodeError, "session: Invalid correlation data")
            })?;
            props.push(Property::CorrelationData(value));
        }
        for (name, value) in &entry.msg.props.user_properties {
            let pair = StringPairData::from(name, value).map_err(|_err| {
                Error::new(ErrorKind::EncodeError, "session: Invalid user property")
            })?;
            props.push(Property::UserProperty(pair));
        }
        if let Some(subscription_identifier) = entry.subscription_identifier {
            let value = VarInt::from(subscription_identifier).map_err(|_err| {
                Error::new(ErrorKind::EncodeError, "session: Subscription id out of range")
            })?;
            props.push(Property::SubscriptionIdentifier(value));
        }

        Ok(packet)
    }
}

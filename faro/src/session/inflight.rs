// Copyright (c) 2026 Faro Project Developers. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Per-session QoS 1/2 delivery engines.
//!
//! The outbound queue drives the publisher-side state machine towards a
//! subscriber; the inbound queue deduplicates the receiver side of QoS 2
//! exchanges by publisher packet id.

use codec::QoS;
use std::collections::{HashMap, VecDeque};
use std::time::Instant;

use crate::config::Queues;
use crate::types::{ClientMessage, Direction, MessageState, StoredMessage, Subscription};

/// What happened to a message handed to the outbound queue.
#[derive(Debug, Clone)]
pub enum PushOutcome {
    /// Transmit now; `mark_sent` must be called after the write.
    Send(ClientMessage),

    /// Inflight window is full, the message waits in the backlog.
    Queued,

    /// Backlog caps exceeded, the message was silently dropped.
    Dropped,

    /// Message expired before transmission.
    Expired,
}

/// Result of a PUBREC for an outbound QoS 2 message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PubrecOutcome {
    /// Reply with PUBREL.
    SendPubrel,

    /// Peer refused the message with an error reason; the exchange is over
    /// and no PUBREL is sent.
    Terminated,

    /// No matching outbound entry; logged and ignored.
    Unknown,
}

/// Outbound delivery engine of one session.
#[derive(Debug)]
pub struct OutboundQueue {
    config: Queues,

    last_mid: u16,

    inflight: HashMap<u16, ClientMessage>,
    inflight_bytes: usize,

    queued: VecDeque<ClientMessage>,
    queued_bytes: usize,
}

impl OutboundQueue {
    #[must_use]
    pub fn new(config: Queues) -> Self {
        Self {
            config,
            last_mid: 0,
            inflight: HashMap::new(),
            inflight_bytes: 0,
            queued: VecDeque::new(),
            queued_bytes: 0,
        }
    }

    /// Cap the inflight window further, e.g. to the peer receive-maximum.
    pub fn clamp_inflight(&mut self, receive_maximum: u16) {
        let peer_max = receive_maximum as usize;
        if self.config.max_inflight_messages == 0 || peer_max < self.config.max_inflight_messages {
            self.config.max_inflight_messages = peer_max;
        }
    }

    #[must_use]
    pub const fn last_mid(&self) -> u16 {
        self.last_mid
    }

    /// Restore the packet id counter of a resumed session.
    pub fn set_last_mid(&mut self, last_mid: u16) {
        self.last_mid = last_mid;
    }

    #[must_use]
    pub fn inflight_len(&self) -> usize {
        self.inflight.len()
    }

    #[must_use]
    pub fn queued_len(&self) -> usize {
        self.queued.len()
    }

    /// Allocate the next packet id, wrapping at 65535 and skipping both 0
    /// and ids still in flight.
    fn next_mid(&mut self) -> u16 {
        loop {
            self.last_mid = self.last_mid.wrapping_add(1);
            if self.last_mid == 0 {
                continue;
            }
            if !self.inflight.contains_key(&self.last_mid) {
                return self.last_mid;
            }
        }
    }

    fn inflight_full(&self) -> bool {
        if self.config.max_inflight_messages > 0
            && self.inflight.len() >= self.config.max_inflight_messages
        {
            return true;
        }
        if self.config.max_inflight_bytes > 0
            && self.inflight_bytes >= self.config.max_inflight_bytes
        {
            return true;
        }
        false
    }

    fn backlog_full(&self, payload_len: usize) -> bool {
        if self.config.max_queued_messages > 0
            && self.queued.len() >= self.config.max_queued_messages
        {
            return true;
        }
        if self.config.max_queued_bytes > 0
            && self.queued_bytes + payload_len > self.config.max_queued_bytes
        {
            return true;
        }
        false
    }

    /// Hand a routed message to the queue.
    ///
    /// `retain_as_stored` forces the RETAIN bit, used for retained messages
    /// replayed at subscribe time; otherwise the bit follows the
    /// subscription's retain-as-published option.
    pub fn push(
        &mut self,
        msg: StoredMessage,
        subscription: &Subscription,
        max_qos: QoS,
        retain_as_stored: bool,
    ) -> PushOutcome {
        if msg.is_expired() {
            return PushOutcome::Expired;
        }

        let qos = msg.qos.min(subscription.qos).min(max_qos);
        let retain = if retain_as_stored {
            true
        } else {
            subscription.retain_as_published && msg.retain
        };
        let payload_len = msg.payload.len();

        let state = match qos {
            QoS::AtMostOnce => MessageState::PublishQos0,
            QoS::AtLeastOnce => MessageState::PublishQos1,
            QoS::ExactOnce => MessageState::PublishQos2,
        };

        let mut entry = ClientMessage {
            msg,
            mid: 0,
            qos,
            retain,
            dup: false,
            direction: Direction::Out,
            state,
            timestamp: Instant::now(),
            subscription_identifier: subscription.subscription_identifier,
        };

        // QoS 0 is transmit-and-forget, it never occupies the window.
        if qos == QoS::AtMostOnce {
            return PushOutcome::Send(entry);
        }

        if self.inflight_full() {
            if self.backlog_full(payload_len) {
                log::debug!(
                    "inflight: Backlog full, dropping message for topic {}",
                    entry.msg.topic
                );
                return PushOutcome::Dropped;
            }
            entry.state = MessageState::Queued;
            self.queued_bytes += payload_len;
            self.queued.push_back(entry);
            return PushOutcome::Queued;
        }

        entry.mid = self.next_mid();
        self.inflight_bytes += payload_len;
        let clone = entry.clone();
        self.inflight.insert(entry.mid, entry);
        PushOutcome::Send(clone)
    }

    /// Advance the state machine after the PUBLISH/PUBREL write completed.
    pub fn mark_sent(&mut self, mid: u16) {
        if let Some(entry) = self.inflight.get_mut(&mid) {
            entry.state = match entry.state {
                MessageState::PublishQos1 => MessageState::WaitForPuback,
                MessageState::PublishQos2 => MessageState::WaitForPubrec,
                MessageState::ResendPubrel => MessageState::WaitForPubcomp,
                other => other,
            };
        }
    }

    /// Complete a QoS 1 delivery.
    ///
    /// Unknown ids are legal after a reconnect replay and are ignored.
    pub fn on_puback(&mut self, mid: u16) -> Vec<ClientMessage> {
        match self.inflight.get(&mid).map(|entry| entry.state) {
            Some(MessageState::WaitForPuback | MessageState::PublishQos1) => {
                self.remove_inflight(mid);
            }
            Some(state) => {
                log::warn!("inflight: PUBACK for mid {mid} in state {state:?}");
            }
            None => {
                log::debug!("inflight: PUBACK for unknown mid {mid}");
            }
        }
        self.pop_ready()
    }

    /// First ack of a QoS 2 delivery.
    pub fn on_pubrec(&mut self, mid: u16, error: bool) -> PubrecOutcome {
        match self.inflight.get(&mid).map(|entry| entry.state) {
            Some(MessageState::WaitForPubrec | MessageState::PublishQos2) => {
                if error {
                    // A PUBREC reason of 0x80 or above ends the exchange.
                    self.remove_inflight(mid);
                    return PubrecOutcome::Terminated;
                }
                if let Some(entry) = self.inflight.get_mut(&mid) {
                    entry.state = MessageState::ResendPubrel;
                }
                PubrecOutcome::SendPubrel
            }
            Some(state) => {
                log::warn!("inflight: PUBREC for mid {mid} in state {state:?}");
                PubrecOutcome::Unknown
            }
            None => {
                log::debug!("inflight: PUBREC for unknown mid {mid}");
                PubrecOutcome::Unknown
            }
        }
    }

    /// Final ack of a QoS 2 delivery.
    ///
    /// Unknown ids are legal after a reconnect replay and are ignored.
    pub fn on_pubcomp(&mut self, mid: u16) -> Vec<ClientMessage> {
        match self.inflight.get(&mid).map(|entry| entry.state) {
            Some(MessageState::WaitForPubcomp | MessageState::ResendPubrel) => {
                self.remove_inflight(mid);
            }
            Some(state) => {
                log::warn!("inflight: PUBCOMP for mid {mid} in state {state:?}");
            }
            None => {
                log::debug!("inflight: PUBCOMP for unknown mid {mid}");
            }
        }
        self.pop_ready()
    }

    /// Drop an inflight entry that cannot be transmitted, e.g. because it
    /// exceeds the peer maximum packet size, and behave as if the delivery
    /// had completed [MQTT-3.1.2-25].
    pub fn discard(&mut self, mid: u16) -> Vec<ClientMessage> {
        self.remove_inflight(mid);
        self.pop_ready()
    }

    fn remove_inflight(&mut self, mid: u16) {
        if let Some(entry) = self.inflight.remove(&mid) {
            self.inflight_bytes = self.inflight_bytes.saturating_sub(entry.msg.payload.len());
        }
    }

    /// Promote queued entries into the freed inflight window, in FIFO
    /// order. Expired entries are discarded on the way.
    fn pop_ready(&mut self) -> Vec<ClientMessage> {
        let mut ready = Vec::new();
        while !self.inflight_full() {
            let Some(mut entry) = self.queued.pop_front() else {
                break;
            };
            self.queued_bytes = self.queued_bytes.saturating_sub(entry.msg.payload.len());
            if entry.msg.is_expired() {
                log::debug!(
                    "inflight: Dropping expired queued message for topic {}",
                    entry.msg.topic
                );
                continue;
            }
            if entry.qos == QoS::AtMostOnce {
                entry.state = MessageState::PublishQos0;
                ready.push(entry);
                continue;
            }
            entry.state = match entry.qos {
                QoS::AtLeastOnce => MessageState::PublishQos1,
                _ => MessageState::PublishQos2,
            };
            entry.mid = self.next_mid();
            self.inflight_bytes += entry.msg.payload.len();
            self.inflight.insert(entry.mid, entry.clone());
            ready.push(entry);
        }
        ready
    }

    /// Entries to retransmit after a session resume, with `dup` set.
    ///
    /// QoS 2 messages already acknowledged by PUBREC re-emit PUBREL rather
    /// than the PUBLISH.
    pub fn on_resume(&mut self) -> Vec<ClientMessage> {
        let mut mids: Vec<u16> = self.inflight.keys().copied().collect();
        mids.sort_unstable();

        let mut resend = Vec::new();
        for mid in mids {
            let Some(entry) = self.inflight.get_mut(&mid) else {
                continue;
            };
            if entry.msg.is_expired() {
                let payload_len = entry.msg.payload.len();
                self.inflight.remove(&mid);
                self.inflight_bytes = self.inflight_bytes.saturating_sub(payload_len);
                continue;
            }
            entry.dup = true;
            entry.state = match entry.state {
                MessageState::WaitForPuback | MessageState::PublishQos1 => {
                    MessageState::PublishQos1
                }
                MessageState::WaitForPubrec | MessageState::PublishQos2 => {
                    MessageState::PublishQos2
                }
                MessageState::WaitForPubcomp | MessageState::ResendPubrel => {
                    MessageState::ResendPubrel
                }
                other => other,
            };
            resend.push(entry.clone());
        }
        resend.extend(self.pop_ready());
        resend
    }

    /// Drain every pending entry for persistence at session close.
    pub fn save(&mut self) -> Vec<ClientMessage> {
        let mut saved: Vec<ClientMessage> = self.inflight.drain().map(|(_mid, m)| m).collect();
        saved.sort_unstable_by_key(|m| m.mid);
        saved.extend(self.queued.drain(..));
        self.inflight_bytes = 0;
        self.queued_bytes = 0;
        saved
    }

    /// Reload entries saved by a previous incarnation of this session.
    pub fn restore(&mut self, entries: Vec<ClientMessage>) {
        for entry in entries {
            let payload_len = entry.msg.payload.len();
            if entry.state == MessageState::Queued {
                self.queued_bytes += payload_len;
                self.queued.push_back(entry);
            } else {
                self.inflight_bytes += payload_len;
                self.inflight.insert(entry.mid, entry);
            }
        }
    }
}

/// What happened to an inbound QoS 2 PUBLISH.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundOutcome {
    /// Stored; acknowledge with PUBREC and deliver at PUBREL.
    Stored,

    /// Same packet id and payload seen again before release; acknowledge
    /// again without a second delivery.
    Duplicate,

    /// Same packet id with a different payload; the old message is dropped
    /// and the new one stored.
    MidReuse,
}

/// Receiver-side QoS 2 store of one session, keyed by publisher packet id.
#[derive(Debug, Default)]
pub struct InboundQueue {
    store: HashMap<u16, StoredMessage>,
}

impl InboundQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Store an inbound QoS 2 message until its PUBREL arrives.
    pub fn on_publish(&mut self, mid: u16, msg: StoredMessage) -> InboundOutcome {
        match self.store.get(&mid) {
            Some(existing) if existing.payload == msg.payload => InboundOutcome::Duplicate,
            Some(_existing) => {
                log::warn!("inflight: mid {mid} reused with different payload, dropping old");
                self.store.insert(mid, msg);
                InboundOutcome::MidReuse
            }
            None => {
                self.store.insert(mid, msg);
                InboundOutcome::Stored
            }
        }
    }

    /// Release a stored message on PUBREL. `None` for unknown ids; the
    /// caller still acknowledges with PUBCOMP for idempotency on reconnect.
    pub fn on_pubrel(&mut self, mid: u16) -> Option<StoredMessage> {
        self.store.remove(&mid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queues(max_inflight: usize, max_queued: usize) -> Queues {
        Queues {
            max_inflight_bytes: 0,
            max_inflight_messages: max_inflight,
            max_queued_bytes: 0,
            max_queued_messages: max_queued,
        }
    }

    fn sub(qos: QoS) -> Subscription {
        Subscription {
            qos,
            ..Subscription::default()
        }
    }

    fn msg(qos: QoS) -> StoredMessage {
        StoredMessage::new("t", b"payload".to_vec(), qos, false)
    }

    #[test]
    fn test_qos0_passthrough() {
        let mut queue = OutboundQueue::new(queues(1, 10));
        let outcome = queue.push(msg(QoS::AtMostOnce), &sub(QoS::ExactOnce), QoS::ExactOnce, false);
        let PushOutcome::Send(entry) = outcome else {
            panic!("expected Send");
        };
        assert_eq!(entry.state, MessageState::PublishQos0);
        assert_eq!(entry.mid, 0);
        assert_eq!(queue.inflight_len(), 0);
    }

    #[test]
    fn test_qos_downgrade() {
        let mut queue = OutboundQueue::new(queues(10, 10));
        let outcome = queue.push(msg(QoS::ExactOnce), &sub(QoS::AtLeastOnce), QoS::ExactOnce, false);
        let PushOutcome::Send(entry) = outcome else {
            panic!("expected Send");
        };
        assert_eq!(entry.qos, QoS::AtLeastOnce);
    }

    #[test]
    fn test_inflight_cap_and_fifo_release() {
        let mut queue = OutboundQueue::new(queues(1, 10));

        let PushOutcome::Send(first) =
            queue.push(msg(QoS::AtLeastOnce), &sub(QoS::ExactOnce), QoS::ExactOnce, false)
        else {
            panic!("expected Send");
        };
        queue.mark_sent(first.mid);

        assert!(matches!(
            queue.push(msg(QoS::AtLeastOnce), &sub(QoS::ExactOnce), QoS::ExactOnce, false),
            PushOutcome::Queued
        ));
        assert_eq!(queue.queued_len(), 1);

        let ready = queue.on_puback(first.mid);
        assert_eq!(ready.len(), 1);
        assert_eq!(queue.inflight_len(), 1);
        assert_eq!(queue.queued_len(), 0);
    }

    #[test]
    fn test_backlog_overflow_drops() {
        let mut queue = OutboundQueue::new(queues(1, 1));
        let _first = queue.push(msg(QoS::AtLeastOnce), &sub(QoS::ExactOnce), QoS::ExactOnce, false);
        let _queued = queue.push(msg(QoS::AtLeastOnce), &sub(QoS::ExactOnce), QoS::ExactOnce, false);
        assert!(matches!(
            queue.push(msg(QoS::AtLeastOnce), &sub(QoS::ExactOnce), QoS::ExactOnce, false),
            PushOutcome::Dropped
        ));
    }

    #[test]
    fn test_qos2_state_walk() {
        let mut queue = OutboundQueue::new(queues(10, 10));
        let PushOutcome::Send(entry) =
            queue.push(msg(QoS::ExactOnce), &sub(QoS::ExactOnce), QoS::ExactOnce, false)
        else {
            panic!("expected Send");
        };
        assert_eq!(entry.state, MessageState::PublishQos2);

        queue.mark_sent(entry.mid);
        assert_eq!(queue.on_pubrec(entry.mid, false), PubrecOutcome::SendPubrel);
        queue.mark_sent(entry.mid);
        let _ready = queue.on_pubcomp(entry.mid);
        assert_eq!(queue.inflight_len(), 0);
    }

    #[test]
    fn test_qos2_terminated_by_error_reason() {
        let mut queue = OutboundQueue::new(queues(10, 10));
        let PushOutcome::Send(entry) =
            queue.push(msg(QoS::ExactOnce), &sub(QoS::ExactOnce), QoS::ExactOnce, false)
        else {
            panic!("expected Send");
        };
        queue.mark_sent(entry.mid);
        assert_eq!(queue.on_pubrec(entry.mid, true), PubrecOutcome::Terminated);
        assert_eq!(queue.inflight_len(), 0);
    }

    #[test]
    fn test_mid_wraps_and_skips_zero() {
        let mut queue = OutboundQueue::new(queues(10, 10));
        queue.set_last_mid(65534);
        let PushOutcome::Send(first) =
            queue.push(msg(QoS::AtLeastOnce), &sub(QoS::ExactOnce), QoS::ExactOnce, false)
        else {
            panic!("expected Send");
        };
        assert_eq!(first.mid, 65535);
        let PushOutcome::Send(second) =
            queue.push(msg(QoS::AtLeastOnce), &sub(QoS::ExactOnce), QoS::ExactOnce, false)
        else {
            panic!("expected Send");
        };
        assert_eq!(second.mid, 1);
    }

    #[test]
    fn test_resume_sets_dup_and_pubrel_state() {
        let mut queue = OutboundQueue::new(queues(10, 10));
        let PushOutcome::Send(qos1) =
            queue.push(msg(QoS::AtLeastOnce), &sub(QoS::ExactOnce), QoS::ExactOnce, false)
        else {
            panic!("expected Send");
        };
        queue.mark_sent(qos1.mid);
        let PushOutcome::Send(qos2) =
            queue.push(msg(QoS::ExactOnce), &sub(QoS::ExactOnce), QoS::ExactOnce, false)
        else {
            panic!("expected Send");
        };
        queue.mark_sent(qos2.mid);
        queue.on_pubrec(qos2.mid, false);
        queue.mark_sent(qos2.mid);

        let resend = queue.on_resume();
        assert_eq!(resend.len(), 2);
        assert!(resend.iter().all(|m| m.dup));
        assert!(resend
            .iter()
            .any(|m| m.state == MessageState::ResendPubrel && m.mid == qos2.mid));
    }

    #[test]
    fn test_inbound_dedup() {
        let mut queue = InboundQueue::new();
        assert_eq!(
            queue.on_publish(7, msg(QoS::ExactOnce)),
            InboundOutcome::Stored
        );
        assert_eq!(
            queue.on_publish(7, msg(QoS::ExactOnce)),
            InboundOutcome::Duplicate
        );
        assert!(queue.on_pubrel(7).is_some());
        assert!(queue.on_pubrel(7).is_none());
    }

    #[test]
    fn test_inbound_mid_reuse() {
        let mut queue = InboundQueue::new();
        let _ = queue.on_publish(9, msg(QoS::ExactOnce));
        let other = StoredMessage::new("t", b"other".to_vec(), QoS::ExactOnce, false);
        assert_eq!(queue.on_publish(9, other), InboundOutcome::MidReuse);
        assert_eq!(queue.len(), 1);
    }
}

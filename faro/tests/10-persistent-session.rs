// Copyright (c) 2026 Faro Project Developers. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Persistent session resume: subscriptions and queued QoS 1 deliveries
//! survive a disconnect.

mod common;

use codec::{ByteArray, ConnectFlags, DecodePacket, EncodePacket, PacketId, QoS};
use common::{start_broker, test_config, TestClient};

fn connect_no_clean(client_id: &str) -> Vec<u8> {
    let mut packet = codec::v3::ConnectPacket::new(client_id).expect("packet");
    let mut flags = ConnectFlags::default();
    flags.set_clean_session(false);
    packet.set_connect_flags(flags);
    let mut buf = Vec::new();
    packet.encode(&mut buf).expect("encode");
    buf
}

fn publish_qos1(topic: &str, payload: &[u8], mid: u16) -> Vec<u8> {
    let mut packet =
        codec::v3::PublishPacket::new(topic, QoS::AtLeastOnce, payload).expect("packet");
    packet.set_packet_id(PacketId::new(mid));
    let mut buf = Vec::new();
    packet.encode(&mut buf).expect("encode");
    buf
}

#[tokio::test]
async fn test_queued_delivery_after_resume() {
    let broker = start_broker(test_config());

    // First incarnation: persistent session with a QoS 1 subscription.
    let mut first = TestClient::attach(&broker).await;
    first.send(&connect_no_clean("meter")).await;
    let connack = first.expect_frame().await;
    assert_eq!(connack, vec![0x20, 0x02, 0x00, 0x00]);
    first.subscribe_v311("grid/load", QoS::AtLeastOnce, 1).await;
    drop(first);

    // Give the broker a beat to notice the closed transport.
    tokio::time::sleep(std::time::Duration::from_millis(300)).await;

    // Publish while the subscriber is offline.
    let mut publisher = TestClient::attach(&broker).await;
    publisher.connect_v311("feeder").await;
    publisher.send(&publish_qos1("grid/load", b"1500", 9)).await;
    let puback = publisher.expect_frame().await;
    assert_eq!(puback, vec![0x40, 0x02, 0x00, 0x09]);

    // Second incarnation resumes the session.
    let mut second = TestClient::attach(&broker).await;
    second.send(&connect_no_clean("meter")).await;
    let connack = second.expect_frame().await;
    // Session present flag is set.
    assert_eq!(connack, vec![0x20, 0x02, 0x01, 0x00]);

    let delivery = second.expect_frame().await;
    let mut ba = ByteArray::new(&delivery);
    let packet = codec::v3::PublishPacket::decode(&mut ba).expect("publish");
    assert_eq!(packet.topic(), "grid/load");
    assert_eq!(packet.message(), b"1500");
    assert_eq!(packet.qos(), QoS::AtLeastOnce);

    // Acknowledge; nothing else is owed.
    let mut puback = Vec::new();
    codec::v3::PublishAckPacket::new(packet.packet_id())
        .encode(&mut puback)
        .expect("encode");
    second.send(&puback).await;
    second.expect_silence().await;
}

#[tokio::test]
async fn test_clean_session_drops_state() {
    let broker = start_broker(test_config());

    let mut first = TestClient::attach(&broker).await;
    first.send(&connect_no_clean("gauge")).await;
    let _connack = first.expect_frame().await;
    first.subscribe_v311("grid/load", QoS::AtLeastOnce, 1).await;
    drop(first);

    tokio::time::sleep(std::time::Duration::from_millis(300)).await;

    // Clean start wipes subscriptions and queues.
    let mut second = TestClient::attach(&broker).await;
    second.connect_v311("gauge").await;

    let mut publisher = TestClient::attach(&broker).await;
    publisher.connect_v311("feeder2").await;
    publisher.send(&publish_qos1("grid/load", b"X", 3)).await;
    let _puback = publisher.expect_frame().await;

    second.expect_silence().await;
}

// Copyright (c) 2026 Faro Project Developers. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Retained message replay and the empty-payload tombstone.

mod common;

use codec::{ByteArray, DecodePacket, EncodePacket, QoS};
use common::{start_broker, test_config, TestClient};

fn publish_retained(topic: &str, payload: &[u8]) -> Vec<u8> {
    let mut packet = codec::v3::PublishPacket::new(topic, QoS::AtMostOnce, payload).expect("packet");
    packet.set_retain(true);
    let mut buf = Vec::new();
    packet.encode(&mut buf).expect("encode");
    buf
}

#[tokio::test]
async fn test_retained_replayed_to_new_subscriber() {
    let broker = start_broker(test_config());

    let mut publisher = TestClient::attach(&broker).await;
    publisher.connect_v311("pub").await;
    publisher.send(&publish_retained("t", b"state")).await;
    publisher.ping_roundtrip().await;

    let mut subscriber = TestClient::attach(&broker).await;
    subscriber.connect_v311("sub").await;
    subscriber.subscribe_v311("t", QoS::AtMostOnce, 1).await;

    let delivery = subscriber.expect_frame().await;
    let mut ba = ByteArray::new(&delivery);
    let packet = codec::v3::PublishPacket::decode(&mut ba).expect("publish");
    assert_eq!(packet.topic(), "t");
    assert_eq!(packet.message(), b"state");
    // Replayed retained messages carry the RETAIN flag.
    assert!(packet.retain());
}

#[tokio::test]
async fn test_retained_tombstone() {
    let broker = start_broker(test_config());

    let mut publisher = TestClient::attach(&broker).await;
    publisher.connect_v311("pub2").await;
    publisher.send(&publish_retained("t", b"state")).await;
    // Empty retained payload deletes the stored message.
    publisher.send(&publish_retained("t", b"")).await;
    publisher.ping_roundtrip().await;

    let mut subscriber = TestClient::attach(&broker).await;
    subscriber.connect_v311("sub2").await;
    subscriber.subscribe_v311("t", QoS::AtMostOnce, 1).await;

    // No retained delivery follows the SUBACK.
    subscriber.expect_silence().await;
}

#[tokio::test]
async fn test_retain_not_stored_when_disabled() {
    let mut config = test_config();
    config.general.retain_available = false;
    let broker = start_broker(config);

    let mut publisher = TestClient::attach(&broker).await;
    publisher.connect_v311("pub3").await;
    // With retain unavailable the publish is a protocol violation and the
    // connection is dropped.
    publisher.send(&publish_retained("t", b"state")).await;
    publisher.expect_closed().await;
}

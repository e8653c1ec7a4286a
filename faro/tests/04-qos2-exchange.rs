// Copyright (c) 2026 Faro Project Developers. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Full QoS 2 exchange on both sides of the broker, with exactly one
//! downstream delivery.

mod common;

use codec::{ByteArray, DecodePacket, EncodePacket, PacketId, QoS};
use common::{start_broker, test_config, TestClient};

fn publish_qos2(topic: &str, payload: &[u8], mid: u16) -> Vec<u8> {
    let mut packet = codec::v3::PublishPacket::new(topic, QoS::ExactOnce, payload).expect("packet");
    packet.set_packet_id(PacketId::new(mid));
    let mut buf = Vec::new();
    packet.encode(&mut buf).expect("encode");
    buf
}

#[tokio::test]
async fn test_qos2_exchange() {
    let broker = start_broker(test_config());

    let mut subscriber = TestClient::attach(&broker).await;
    subscriber.connect_v311("c").await;
    subscriber.subscribe_v311("x", QoS::ExactOnce, 1).await;

    let mut publisher = TestClient::attach(&broker).await;
    publisher.connect_v311("p").await;

    // Publisher half: PUBLISH -> PUBREC -> PUBREL -> PUBCOMP, mid 0x1234.
    publisher.send(&publish_qos2("x", b"exact", 0x1234)).await;
    let pubrec = publisher.expect_frame().await;
    assert_eq!(pubrec, vec![0x50, 0x02, 0x12, 0x34]);

    publisher.send(&[0x62, 0x02, 0x12, 0x34]).await;
    let pubcomp = publisher.expect_frame().await;
    assert_eq!(pubcomp, vec![0x70, 0x02, 0x12, 0x34]);

    // Subscriber half: PUBLISH(qos2) -> PUBREC -> PUBREL -> PUBCOMP.
    let delivery = subscriber.expect_frame().await;
    let mut ba = ByteArray::new(&delivery);
    let packet = codec::v3::PublishPacket::decode(&mut ba).expect("publish");
    assert_eq!(packet.topic(), "x");
    assert_eq!(packet.qos(), QoS::ExactOnce);
    assert_eq!(packet.message(), b"exact");
    let mid = packet.packet_id().value();
    assert_ne!(mid, 0);

    let pubrec = {
        let packet = codec::v3::PublishReceivedPacket::new(PacketId::new(mid));
        let mut buf = Vec::new();
        packet.encode(&mut buf).expect("encode");
        buf
    };
    subscriber.send(&pubrec).await;

    let pubrel = subscriber.expect_frame().await;
    assert_eq!(pubrel[0], 0x62);
    assert_eq!(u16::from(pubrel[2]) << 8 | u16::from(pubrel[3]), mid);

    let pubcomp = {
        let packet = codec::v3::PublishCompletePacket::new(PacketId::new(mid));
        let mut buf = Vec::new();
        packet.encode(&mut buf).expect("encode");
        buf
    };
    subscriber.send(&pubcomp).await;

    // One and only one delivery.
    subscriber.expect_silence().await;
}

#[tokio::test]
async fn test_qos2_duplicate_publish_single_delivery() {
    let broker = start_broker(test_config());

    let mut subscriber = TestClient::attach(&broker).await;
    subscriber.connect_v311("c2").await;
    subscriber.subscribe_v311("y", QoS::AtMostOnce, 1).await;

    let mut publisher = TestClient::attach(&broker).await;
    publisher.connect_v311("p2").await;

    // The same QoS 2 PUBLISH twice before PUBREL: broker stores once,
    // acknowledges twice.
    publisher.send(&publish_qos2("y", b"once", 7)).await;
    let first = publisher.expect_frame().await;
    assert_eq!(first, vec![0x50, 0x02, 0x00, 0x07]);

    publisher.send(&publish_qos2("y", b"once", 7)).await;
    let second = publisher.expect_frame().await;
    assert_eq!(second, vec![0x50, 0x02, 0x00, 0x07]);

    publisher.send(&[0x62, 0x02, 0x00, 0x07]).await;
    let pubcomp = publisher.expect_frame().await;
    assert_eq!(pubcomp, vec![0x70, 0x02, 0x00, 0x07]);

    // Exactly one downstream delivery at the subscriber.
    let delivery = subscriber.expect_frame().await;
    assert_eq!(delivery[0] >> 4, 3);
    subscriber.expect_silence().await;
}

// Copyright (c) 2026 Faro Project Developers. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Peer maximum-packet-size enforcement on the outbound path.

mod common;

use codec::v5::{Property, ReasonCode};
use codec::{ByteArray, DecodePacket, EncodePacket, QoS, U32Data};
use common::{start_broker, test_config, TestClient};

#[tokio::test]
async fn test_oversize_outbound_publish_is_withheld() {
    let broker = start_broker(test_config());

    // v5 subscriber advertising a 128 byte packet limit.
    let mut subscriber = TestClient::attach(&broker).await;
    let mut connect = codec::v5::ConnectPacket::new("small").expect("packet");
    connect
        .properties_mut()
        .push(Property::MaximumPacketSize(U32Data::new(128)));
    let mut buf = Vec::new();
    connect.encode(&mut buf).expect("encode");
    subscriber.send(&buf).await;
    let connack = subscriber.expect_frame().await;
    let mut ba = ByteArray::new(&connack);
    let connack = codec::v5::ConnectAckPacket::decode(&mut ba).expect("connack");
    assert_eq!(connack.reason_code(), ReasonCode::Success);

    let mut subscribe = Vec::new();
    codec::v5::SubscribePacket::new("big", QoS::AtMostOnce, codec::PacketId::new(1))
        .expect("subscribe")
        .encode(&mut subscribe)
        .expect("encode");
    subscriber.send(&subscribe).await;
    let suback = subscriber.expect_frame().await;
    assert_eq!(suback[0], 0x90);

    let mut publisher = TestClient::attach(&broker).await;
    publisher.connect_v311("big-sender").await;

    // 200 byte payload: encoded PUBLISH exceeds the subscriber limit and
    // is silently withheld; the broker survives.
    let large = vec![0x61u8; 200];
    let mut publish = Vec::new();
    codec::v3::PublishPacket::new("big", QoS::AtMostOnce, &large)
        .expect("publish")
        .encode(&mut publish)
        .expect("encode");
    publisher.send(&publish).await;
    subscriber.expect_silence().await;

    // A small message still flows.
    let mut publish = Vec::new();
    codec::v3::PublishPacket::new("big", QoS::AtMostOnce, b"ok")
        .expect("publish")
        .encode(&mut publish)
        .expect("encode");
    publisher.send(&publish).await;

    let delivery = subscriber.expect_frame().await;
    let mut ba = ByteArray::new(&delivery);
    let packet = codec::v5::PublishPacket::decode(&mut ba).expect("publish");
    assert_eq!(packet.message(), b"ok");
}

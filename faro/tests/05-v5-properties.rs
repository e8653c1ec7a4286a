// Copyright (c) 2026 Faro Project Developers. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! v5 property handling at CONNECT time.

mod common;

use codec::v5::{Property, ReasonCode};
use codec::{ByteArray, DecodePacket, EncodePacket, U32Data};
use common::{start_broker, test_config, TestClient};

#[tokio::test]
async fn test_duplicate_connect_property_rejected() {
    let broker = start_broker(test_config());
    let mut client = TestClient::attach(&broker).await;

    let mut packet = codec::v5::ConnectPacket::new("dup").expect("packet");
    packet
        .properties_mut()
        .push(Property::SessionExpiryInterval(U32Data::new(60)));
    packet
        .properties_mut()
        .push(Property::SessionExpiryInterval(U32Data::new(120)));
    let mut buf = Vec::new();
    packet.encode(&mut buf).expect("encode");

    client.send(&buf).await;
    let connack = client.expect_frame().await;
    let mut ba = ByteArray::new(&connack);
    let connack = codec::v5::ConnectAckPacket::decode(&mut ba).expect("connack");
    assert_eq!(connack.reason_code(), ReasonCode::MalformedPacket);
    assert!(!connack.session_present());
    client.expect_closed().await;
}

#[tokio::test]
async fn test_connack_advertises_topic_alias_maximum() {
    let broker = start_broker(test_config());
    let mut client = TestClient::attach(&broker).await;

    let connack = client.connect_v5("props").await;
    let mut ba = ByteArray::new(&connack);
    let connack = codec::v5::ConnectAckPacket::decode(&mut ba).expect("connack");
    assert_eq!(connack.properties().topic_alias_maximum(), Some(10));
}

#[tokio::test]
async fn test_auth_method_stub_rejected() {
    let broker = start_broker(test_config());
    let mut client = TestClient::attach(&broker).await;

    let mut packet = codec::v5::ConnectPacket::new("authy").expect("packet");
    packet.properties_mut().push(Property::AuthenticationMethod(
        codec::StringData::from("SCRAM-SHA-256").expect("method"),
    ));
    let mut buf = Vec::new();
    packet.encode(&mut buf).expect("encode");

    client.send(&buf).await;
    let connack = client.expect_frame().await;
    let mut ba = ByteArray::new(&connack);
    let connack = codec::v5::ConnectAckPacket::decode(&mut ba).expect("connack");
    assert_eq!(connack.reason_code(), ReasonCode::BadAuthenticationMethod);
    client.expect_closed().await;
}

#[tokio::test]
async fn test_v5_keepalive_clamped() {
    let mut config = test_config();
    config.general.max_keepalive = 30;
    let broker = start_broker(config);
    let mut client = TestClient::attach(&broker).await;

    let mut packet = codec::v5::ConnectPacket::new("ka").expect("packet");
    packet.set_keep_alive(7200);
    let mut buf = Vec::new();
    packet.encode(&mut buf).expect("encode");
    client.send(&buf).await;

    let connack = client.expect_frame().await;
    let mut ba = ByteArray::new(&connack);
    let connack = codec::v5::ConnectAckPacket::decode(&mut ba).expect("connack");
    assert_eq!(connack.reason_code(), ReasonCode::Success);

    let server_keep_alive = connack
        .properties()
        .props()
        .iter()
        .find_map(|p| match p {
            Property::ServerKeepAlive(v) => Some(v.value()),
            _ => None,
        });
    assert_eq!(server_keep_alive, Some(30));
}

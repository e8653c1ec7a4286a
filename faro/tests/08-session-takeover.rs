// Copyright (c) 2026 Faro Project Developers. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Duplicate CONNECT with the same client id cancels the older session.

mod common;

use codec::{ByteArray, DecodePacket, QoS};
use common::{start_broker, test_config, TestClient};

#[tokio::test]
async fn test_duplicate_connect_takes_over() {
    let broker = start_broker(test_config());

    let mut first = TestClient::attach(&broker).await;
    first.connect_v311("twin").await;

    let mut second = TestClient::attach(&broker).await;
    second.connect_v311("twin").await;

    // The older connection is closed; the newer one stays usable.
    first.expect_closed().await;
    second.ping_roundtrip().await;
}

#[tokio::test]
async fn test_takeover_keeps_exactly_one_live_session() {
    let broker = start_broker(test_config());

    let mut watcher = TestClient::attach(&broker).await;
    watcher.connect_v311("watcher").await;
    watcher.subscribe_v311("news", QoS::AtMostOnce, 1).await;

    let mut first = TestClient::attach(&broker).await;
    first.connect_v311("twin").await;
    let mut second = TestClient::attach(&broker).await;
    second.connect_v311("twin").await;
    first.expect_closed().await;

    // A publish from the survivor is routed normally.
    let publish = [
        0x30, 0x08, 0x00, 0x04, b'n', b'e', b'w', b's', b'h', b'i',
    ];
    second.send(&publish).await;

    let delivery = watcher.expect_frame().await;
    let mut ba = ByteArray::new(&delivery);
    let packet = codec::v3::PublishPacket::decode(&mut ba).expect("publish");
    assert_eq!(packet.topic(), "news");
    assert_eq!(packet.message(), b"hi");
}

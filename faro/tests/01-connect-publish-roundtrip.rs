// Copyright (c) 2026 Faro Project Developers. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Minimal v3.1.1 connect and QoS 0 publish round trip.

mod common;

use common::{start_broker, test_config, TestClient};

// Literal wire bytes: CONNECT with client id "test", keepalive 60, clean
// session; then PUBLISH on "a/b" with payload "hi".
const CONNECT: &[u8] = &[
    0x10, 0x10, 0x00, 0x04, 0x4d, 0x51, 0x54, 0x54, 0x04, 0x02, 0x00, 0x3c, 0x00, 0x04, 0x74,
    0x65, 0x73, 0x74,
];
const PUBLISH_QOS0: &[u8] = &[0x30, 0x08, 0x00, 0x03, 0x61, 0x2f, 0x62, 0x68, 0x69];

#[tokio::test]
async fn test_connect_publish_roundtrip() {
    let broker = start_broker(test_config());

    let mut subscriber = TestClient::attach(&broker).await;
    subscriber.connect_v311("watcher").await;
    subscriber
        .subscribe_v311("a/b", codec::QoS::AtMostOnce, 1)
        .await;

    let mut publisher = TestClient::attach(&broker).await;
    publisher.send(CONNECT).await;
    let connack = publisher.expect_frame().await;
    assert_eq!(connack, vec![0x20, 0x02, 0x00, 0x00]);

    publisher.send(PUBLISH_QOS0).await;
    // QoS 0 gets no acknowledgment.
    publisher.expect_silence().await;

    // The router delivered exactly one copy to the subscriber.
    let delivery = subscriber.expect_frame().await;
    assert_eq!(delivery, PUBLISH_QOS0.to_vec());
    subscriber.expect_silence().await;
}

#[tokio::test]
async fn test_publish_before_connect_closes() {
    let broker = start_broker(test_config());

    let mut client = TestClient::attach(&broker).await;
    client.send(PUBLISH_QOS0).await;
    client.expect_closed().await;
}

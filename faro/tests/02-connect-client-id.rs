// Copyright (c) 2026 Faro Project Developers. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Client id rules at CONNECT time.

mod common;

use common::{start_broker, test_config, TestClient};

// v3.1.1 CONNECT with a zero-length client id and clean session 0.
const CONNECT_EMPTY_ID_NO_CLEAN: &[u8] = &[
    0x10, 0x0c, 0x00, 0x04, 0x4d, 0x51, 0x54, 0x54, 0x04, 0x00, 0x00, 0x3c, 0x00, 0x00,
];

// Same but with clean session set.
const CONNECT_EMPTY_ID_CLEAN: &[u8] = &[
    0x10, 0x0c, 0x00, 0x04, 0x4d, 0x51, 0x54, 0x54, 0x04, 0x02, 0x00, 0x3c, 0x00, 0x00,
];

#[tokio::test]
async fn test_empty_client_id_without_clean_session_rejected() {
    let broker = start_broker(test_config());

    let mut client = TestClient::attach(&broker).await;
    client.send(CONNECT_EMPTY_ID_NO_CLEAN).await;
    let connack = client.expect_frame().await;
    // Identifier rejected, then close.
    assert_eq!(connack, vec![0x20, 0x02, 0x00, 0x02]);
    client.expect_closed().await;
}

#[tokio::test]
async fn test_empty_client_id_disallowed_by_default() {
    let broker = start_broker(test_config());

    let mut client = TestClient::attach(&broker).await;
    client.send(CONNECT_EMPTY_ID_CLEAN).await;
    let connack = client.expect_frame().await;
    assert_eq!(connack, vec![0x20, 0x02, 0x00, 0x02]);
    client.expect_closed().await;
}

#[tokio::test]
async fn test_empty_client_id_assigned_when_allowed() {
    let mut config = test_config();
    config.security.allow_zero_length_clientid = true;
    let broker = start_broker(config);

    let mut client = TestClient::attach(&broker).await;
    client.send(CONNECT_EMPTY_ID_CLEAN).await;
    let connack = client.expect_frame().await;
    assert_eq!(connack, vec![0x20, 0x02, 0x00, 0x00]);
}

// Copyright (c) 2026 Faro Project Developers. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Credential checks with `allow_anonymous` off.

mod common;

use codec::EncodePacket;
use common::{start_broker, test_config, TestClient};
use faro::control::{CommandReply, ControlCommand};

fn connect_with_credentials(client_id: &str, username: &str, password: &[u8]) -> Vec<u8> {
    let mut packet = codec::v3::ConnectPacket::new(client_id).expect("packet");
    let mut flags = codec::ConnectFlags::default();
    flags.set_has_username(true).set_has_password(true);
    packet.set_connect_flags(flags);
    packet.set_username(username).expect("username");
    packet.set_password(password).expect("password");
    let mut buf = Vec::new();
    packet.encode(&mut buf).expect("encode");
    buf
}

#[tokio::test]
async fn test_anonymous_rejected() {
    let mut config = test_config();
    config.security.allow_anonymous = false;
    let broker = start_broker(config);

    let mut client = TestClient::attach(&broker).await;
    let packet = {
        let packet = codec::v3::ConnectPacket::new("anon").expect("packet");
        let mut buf = Vec::new();
        packet.encode(&mut buf).expect("encode");
        buf
    };
    client.send(&packet).await;

    let connack = client.expect_frame().await;
    // Exactly one CONNACK with not-authorized, then close.
    assert_eq!(connack, vec![0x20, 0x02, 0x00, 0x05]);
    client.expect_closed().await;
}

#[tokio::test]
async fn test_known_user_accepted_wrong_password_rejected() {
    let mut config = test_config();
    config.security.allow_anonymous = false;
    let broker = start_broker(config);

    let control = broker.control_plane();
    let reply = control
        .execute(ControlCommand::CreateUser {
            username: "anna".to_string(),
            password: "hunter2".to_string(),
        })
        .await
        .expect("control");
    assert_eq!(reply.status, 0);

    let mut good = TestClient::attach(&broker).await;
    good.send(&connect_with_credentials("dev-1", "anna", b"hunter2"))
        .await;
    let connack = good.expect_frame().await;
    assert_eq!(connack, vec![0x20, 0x02, 0x00, 0x00]);

    let mut bad = TestClient::attach(&broker).await;
    bad.send(&connect_with_credentials("dev-2", "anna", b"wrong"))
        .await;
    let connack = bad.expect_frame().await;
    assert_eq!(connack, vec![0x20, 0x02, 0x00, 0x05]);
    bad.expect_closed().await;
}

#[tokio::test]
async fn test_list_users() {
    let broker = start_broker(test_config());
    let control = broker.control_plane();

    let reply = control
        .execute(ControlCommand::CreateUser {
            username: "bob".to_string(),
            password: "pw".to_string(),
        })
        .await
        .expect("control");
    assert_eq!(reply.status, 0);

    let reply: CommandReply = control
        .execute(ControlCommand::ListUsers)
        .await
        .expect("control");
    assert_eq!(reply.status, 0);
    let users = reply.data.get("users").unwrap().as_array().unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0], "bob");
}

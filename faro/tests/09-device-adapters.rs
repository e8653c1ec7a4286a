// Copyright (c) 2026 Faro Project Developers. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Device adapter boundary: samples in, command topics out.

mod common;

use codec::{ByteArray, DecodePacket, QoS};
use common::{start_broker, test_config, TestClient};
use faro::commands::DispatcherToDeviceCmd;

#[tokio::test]
async fn test_device_sample_routed_to_subscriber() {
    let broker = start_broker(test_config());

    let mut subscriber = TestClient::attach(&broker).await;
    subscriber.connect_v311("scada").await;
    subscriber
        .subscribe_v311("plant/+/level", QoS::AtMostOnce, 1)
        .await;

    let device = broker.device_handle("modbus-1");
    device
        .publish("plant/tank3/level", b"77.5".to_vec())
        .await
        .expect("device publish");

    let delivery = subscriber.expect_frame().await;
    let mut ba = ByteArray::new(&delivery);
    let packet = codec::v3::PublishPacket::decode(&mut ba).expect("publish");
    assert_eq!(packet.topic(), "plant/tank3/level");
    assert_eq!(packet.message(), b"77.5");
    assert_eq!(packet.qos(), QoS::AtMostOnce);
    assert!(!packet.retain());
}

#[tokio::test]
async fn test_device_receives_command_topic() {
    let broker = start_broker(test_config());

    let mut device = broker.device_handle("gps-1");
    device
        .subscribe(vec!["cmd/gps/#".to_string()])
        .await
        .expect("device subscribe");

    // Give the dispatcher a beat to register the filter.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let mut operator = TestClient::attach(&broker).await;
    operator.connect_v311("op").await;
    let publish = [
        0x30, 0x0f, 0x00, 0x0b, b'c', b'm', b'd', b'/', b'g', b'p', b's', b'/', b'r', b's', b't',
        b'g', b'o',
    ];
    operator.send(&publish).await;

    // Session-opened events may precede the routed message.
    loop {
        let cmd = tokio::time::timeout(common::RECV_TIMEOUT, device.recv())
            .await
            .expect("timed out")
            .expect("device channel closed");
        match cmd {
            DispatcherToDeviceCmd::SessionOpened { client_id } => {
                assert_eq!(client_id, "op");
            }
            DispatcherToDeviceCmd::SendMessage { topic, payload } => {
                assert_eq!(topic, "cmd/gps/rst");
                assert_eq!(payload, b"go");
                break;
            }
        }
    }
}

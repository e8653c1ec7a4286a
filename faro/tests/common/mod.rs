// Copyright (c) 2026 Faro Project Developers. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Shared test harness: an in-memory client speaking raw MQTT bytes to a
//! broker over a duplex pipe.

#![allow(dead_code)]

use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

use faro::config::Config;
use faro::session::FrameAccumulator;
use faro::stream::Stream;
use faro::Broker;

pub const RECV_TIMEOUT: Duration = Duration::from_secs(3);
pub const SILENCE_TIMEOUT: Duration = Duration::from_millis(300);

/// Start a broker with `config`, leaking the dispatcher task for the test
/// lifetime.
pub fn start_broker(config: Config) -> Broker {
    let (broker, _dispatcher) = Broker::start(config).expect("broker start");
    broker
}

/// Config with persistence off, suitable for tests.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.storage.persistence = false;
    config
}

/// Raw-bytes MQTT client attached to the broker through an in-memory pipe.
pub struct TestClient {
    stream: DuplexStream,
    acc: FrameAccumulator,
}

impl TestClient {
    pub async fn attach(broker: &Broker) -> Self {
        let (client_end, broker_end) = tokio::io::duplex(1 << 16);
        broker
            .attach_stream(Stream::from(broker_end))
            .await
            .expect("attach stream");
        Self {
            stream: client_end,
            acc: FrameAccumulator::new(0),
        }
    }

    pub async fn send(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.expect("write");
    }

    /// Read one complete MQTT frame, waiting up to [`RECV_TIMEOUT`].
    pub async fn expect_frame(&mut self) -> Vec<u8> {
        self.try_recv_frame(RECV_TIMEOUT)
            .await
            .expect("expected a frame, connection closed or timed out")
    }

    /// Expect the broker to stay silent for [`SILENCE_TIMEOUT`].
    pub async fn expect_silence(&mut self) {
        assert!(
            self.try_recv_frame(SILENCE_TIMEOUT).await.is_none(),
            "expected silence but a frame arrived"
        );
    }

    /// Expect the broker side to close the connection.
    pub async fn expect_closed(&mut self) {
        let mut buf = [0u8; 256];
        let deadline = tokio::time::Instant::now() + RECV_TIMEOUT;
        loop {
            let read = tokio::time::timeout_at(deadline, self.stream.read(&mut buf))
                .await
                .expect("expected close, timed out");
            match read {
                Ok(0) | Err(_) => return,
                Ok(_n) => {}
            }
        }
    }

    async fn try_recv_frame(&mut self, timeout: Duration) -> Option<Vec<u8>> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Ok(Some(frame)) = self.acc.next_frame() {
                return Some(frame);
            }
            let mut buf = [0u8; 4096];
            let read = tokio::time::timeout_at(deadline, self.stream.read(&mut buf))
                .await
                .ok()?;
            match read {
                Ok(0) | Err(_) => return None,
                Ok(n) => self.acc.feed(&buf[..n]),
            }
        }
    }

    /// Minimal v3.1.1 CONNECT with clean session; asserts the accepted
    /// CONNACK.
    pub async fn connect_v311(&mut self, client_id: &str) {
        let packet = {
            use codec::EncodePacket;
            let packet = codec::v3::ConnectPacket::new(client_id).expect("connect packet");
            let mut buf = Vec::new();
            packet.encode(&mut buf).expect("encode");
            buf
        };
        self.send(&packet).await;
        let connack = self.expect_frame().await;
        assert_eq!(connack, vec![0x20, 0x02, 0x00, 0x00]);
    }

    /// Minimal v5 CONNECT with clean start; asserts the success CONNACK and
    /// returns the raw frame.
    pub async fn connect_v5(&mut self, client_id: &str) -> Vec<u8> {
        let packet = {
            use codec::EncodePacket;
            let packet = codec::v5::ConnectPacket::new(client_id).expect("connect packet");
            let mut buf = Vec::new();
            packet.encode(&mut buf).expect("encode");
            buf
        };
        self.send(&packet).await;
        let connack = self.expect_frame().await;
        assert_eq!(connack[0], 0x20, "expected CONNACK");
        assert_eq!(connack[3], 0x00, "expected success reason");
        connack
    }

    /// PINGREQ/PINGRESP round trip, used as a barrier: once the response
    /// arrives, every earlier frame of this client has been processed and
    /// forwarded to the dispatcher.
    pub async fn ping_roundtrip(&mut self) {
        self.send(&[0xc0, 0x00]).await;
        let pingresp = self.expect_frame().await;
        assert_eq!(pingresp, vec![0xd0, 0x00]);
    }

    /// Subscribe with one filter and assert the SUBACK grant.
    pub async fn subscribe_v311(&mut self, filter: &str, qos: codec::QoS, packet_id: u16) {
        use codec::EncodePacket;
        let packet =
            codec::v3::SubscribePacket::new(filter, qos, codec::PacketId::new(packet_id))
                .expect("subscribe packet");
        let mut buf = Vec::new();
        packet.encode(&mut buf).expect("encode");
        self.send(&buf).await;

        let suback = self.expect_frame().await;
        assert_eq!(suback[0], 0x90, "expected SUBACK");
        assert_eq!(
            u16::from(suback[2]) << 8 | u16::from(suback[3]),
            packet_id,
            "SUBACK packet id"
        );
    }
}

// Copyright (c) 2026 Faro Project Developers. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Broker assembly: one dispatcher task plus a session task per attached
//! transport.

use std::sync::atomic::{AtomicU64, Ordering};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::adapters::DeviceHandle;
use crate::commands::{DispatcherCmd, SessionToDispatcherCmd};
use crate::config::Config;
use crate::control::ControlPlane;
use crate::dispatcher::Dispatcher;
use crate::error::Error;
use crate::session::{Session, SessionConfig};
use crate::stream::Stream;
use crate::types::SessionId;

const DISPATCHER_CHANNEL_CAPACITY: usize = 64;
const SESSION_CHANNEL_CAPACITY: usize = 64;

/// Running broker engine.
///
/// Transport setup stays outside the engine; anything that can be turned
/// into a [`Stream`] can be attached as a session.
pub struct Broker {
    config: Config,
    sender: mpsc::Sender<DispatcherCmd>,
    next_session_id: AtomicU64,
}

impl Broker {
    /// Spawn the dispatcher task and return the broker handle.
    ///
    /// # Errors
    ///
    /// Returns error if a persisted store cannot be loaded.
    pub fn start(config: Config) -> Result<(Self, JoinHandle<()>), Error> {
        let (sender, receiver) = mpsc::channel(DISPATCHER_CHANNEL_CAPACITY);
        let dispatcher = Dispatcher::new(config.clone(), receiver, sender.clone())?;
        let handle = tokio::spawn(dispatcher.run_loop());
        Ok((
            Self {
                config,
                sender,
                next_session_id: AtomicU64::new(1),
            },
            handle,
        ))
    }

    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Client handle of the administrative command plane.
    #[must_use]
    pub fn control_plane(&self) -> ControlPlane {
        ControlPlane::new(self.sender.clone())
    }

    /// Connect a device adapter to the router.
    #[must_use]
    pub fn device_handle(&self, name: &str) -> DeviceHandle {
        DeviceHandle::new(name, self.sender.clone())
    }

    /// Attach a transport as a new session and spawn its task.
    ///
    /// # Errors
    ///
    /// Returns error if the dispatcher is gone.
    pub async fn attach_stream(&self, stream: Stream) -> Result<SessionId, Error> {
        let session_id = self.next_session_id.fetch_add(1, Ordering::SeqCst);
        let (sender, receiver) = mpsc::channel(SESSION_CHANNEL_CAPACITY);

        // Register before the session task can say anything, so its
        // commands always find the sender on the dispatcher side.
        self.sender
            .send(DispatcherCmd::Session(SessionToDispatcherCmd::Register(
                session_id, sender,
            )))
            .await?;

        let session = Session::new(
            session_id,
            SessionConfig::new(&self.config),
            stream,
            self.sender.clone(),
            receiver,
        );
        tokio::spawn(session.run_loop());
        Ok(session_id)
    }

    /// Accept TCP connections forever on the configured listen address.
    ///
    /// # Errors
    ///
    /// Returns error if the listener cannot be bound or the dispatcher is
    /// gone.
    pub async fn run_tcp(&self) -> Result<(), Error> {
        let listener = TcpListener::bind(&self.config.general.listen_address).await?;
        log::info!(
            "server: Listening on {}",
            self.config.general.listen_address
        );
        loop {
            let (socket, peer) = listener.accept().await?;
            log::info!("server: Accepted connection from {peer}");
            self.attach_stream(Stream::from(socket)).await?;
        }
    }
}

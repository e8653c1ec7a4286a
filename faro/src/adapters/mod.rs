// Copyright (c) 2026 Faro Project Developers. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Boundary for non-MQTT device collaborators.
//!
//! A Modbus master, a CAN shim or a GPS driver runs as its own task and
//! talks to the router through a [`DeviceHandle`]: samples go in as
//! synthesized QoS 0 publishes, and command topics subscribed by the
//! adapter come back as [`DispatcherToDeviceCmd::SendMessage`] events. The
//! drivers themselves live outside this crate.

use tokio::sync::mpsc;

use crate::commands::{DeviceToDispatcherCmd, DispatcherCmd, DispatcherToDeviceCmd};
use crate::error::Error;

/// Connection of one device adapter to the dispatcher.
#[derive(Debug)]
pub struct DeviceHandle {
    name: String,
    dispatcher: mpsc::Sender<DispatcherCmd>,
    sender: mpsc::Sender<DispatcherToDeviceCmd>,
    receiver: mpsc::Receiver<DispatcherToDeviceCmd>,
}

impl DeviceHandle {
    #[must_use]
    pub fn new(name: &str, dispatcher: mpsc::Sender<DispatcherCmd>) -> Self {
        let (sender, receiver) = mpsc::channel(16);
        Self {
            name: name.to_string(),
            dispatcher,
            sender,
            receiver,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Feed one sample into the router as a QoS 0, non-retained publish.
    ///
    /// # Errors
    ///
    /// Returns error if the dispatcher is gone.
    pub async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), Error> {
        self.dispatcher
            .send(DispatcherCmd::Device(DeviceToDispatcherCmd::Publish {
                source: self.name.clone(),
                topic: topic.to_string(),
                payload,
            }))
            .await?;
        Ok(())
    }

    /// Register command-topic subscriptions; matching publishes arrive via
    /// [`DeviceHandle::recv`].
    ///
    /// # Errors
    ///
    /// Returns error if the dispatcher is gone.
    pub async fn subscribe(&self, filters: Vec<String>) -> Result<(), Error> {
        self.dispatcher
            .send(DispatcherCmd::Device(DeviceToDispatcherCmd::Subscribe {
                source: self.name.clone(),
                filters,
                sender: self.sender.clone(),
            }))
            .await?;
        Ok(())
    }

    /// Wait for the next command-topic message.
    pub async fn recv(&mut self) -> Option<DispatcherToDeviceCmd> {
        self.receiver.recv().await
    }
}

/// A device-side collaborator that produces samples.
pub trait DeviceSource {
    fn name(&self) -> &str;

    /// Next sample as `(topic, payload)`; `None` when the device is done.
    fn next_sample(&mut self) -> impl std::future::Future<Output = Option<(String, Vec<u8>)>> + Send;
}

/// Pump a device source into the router until it runs dry.
pub async fn run_device<S: DeviceSource>(mut source: S, handle: DeviceHandle) {
    while let Some((topic, payload)) = source.next_sample().await {
        if let Err(err) = handle.publish(&topic, payload).await {
            log::error!("adapters: {} lost dispatcher: {err}", source.name());
            break;
        }
    }
    log::info!("adapters: Device {} finished", handle.name());
}

// Copyright (c) 2026 Faro Project Developers. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Faro is an MQTT 3.1/3.1.1/5.0 broker engine for IoT runtimes.
//!
//! The engine core is transport-agnostic: sessions run over an opaque
//! [`stream::Stream`], device adapters feed the router through the
//! [`adapters`] boundary, and all shared state lives behind the single
//! dispatcher task.

#![deny(clippy::all, clippy::cargo, clippy::nursery, clippy::pedantic)]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::module_name_repetitions)]

pub mod adapters;
pub mod auth;
pub mod commands;
pub mod config;
pub mod constants;
pub mod control;
pub mod dispatcher;
pub mod error;
pub mod log;
pub mod server;
pub mod session;
pub mod store;
pub mod stream;
pub mod types;

pub use error::Error;
pub use server::Broker;

// Copyright (c) 2026 Faro Project Developers. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Broker-side state stores: client registry, credentials, retained
//! messages and per-session topic aliases.

mod client_registry;
mod credentials;
mod retained;
mod topic_alias;

pub use client_registry::{ClientRecord, ClientRegistry, SESSION_NEVER_EXPIRES};
pub use credentials::{Credential, CredentialData, CredentialRecord, CredentialStore, SecretData};
pub use retained::{MemoryRetainedStore, RetainedStore};
pub use topic_alias::TopicAliasMap;

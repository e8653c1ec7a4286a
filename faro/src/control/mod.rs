// Copyright (c) 2026 Faro Project Developers. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Administrative command plane.
//!
//! Commands run inside the dispatcher task against its stores; callers talk
//! to it through [`ControlPlane`] with a oneshot reply per command. This is
//! the surface the daemon wires to whatever front end hosts it, and what
//! `faro-passwd` reuses for user management.

use serde_json::json;
use tokio::sync::{mpsc, oneshot};

use crate::commands::{ControlRequest, DispatcherCmd};
use crate::error::{Error, ErrorKind};

/// Administrative command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    Help { command: Option<String> },
    Authzs,
    ListTopics,
    ListClients,
    ListUsers,
    CreateUser { username: String, password: String },
}

impl ControlCommand {
    /// Parse a command line of the form `name [arg ...]`.
    ///
    /// # Errors
    ///
    /// Returns error on unknown commands or missing arguments.
    pub fn parse(line: &str) -> Result<Self, Error> {
        let mut parts = line.split_whitespace();
        let name = parts.next().unwrap_or("");
        match name {
            "help" => Ok(Self::Help {
                command: parts.next().map(ToString::to_string),
            }),
            "authzs" => Ok(Self::Authzs),
            "list-topics" => Ok(Self::ListTopics),
            "list-clients" => Ok(Self::ListClients),
            "list-users" => Ok(Self::ListUsers),
            "create-user" => {
                let username = parts.next().ok_or_else(|| {
                    Error::new(ErrorKind::FormatError, "create-user: Missing username")
                })?;
                let password = parts.next().ok_or_else(|| {
                    Error::new(ErrorKind::FormatError, "create-user: Missing password")
                })?;
                Ok(Self::CreateUser {
                    username: username.to_string(),
                    password: password.to_string(),
                })
            }
            other => Err(Error::from_string(
                ErrorKind::FormatError,
                format!("Unknown command {other:?}"),
            )),
        }
    }
}

/// Structured command response: an integer status plus a data object.
/// Status 0 means success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReply {
    pub status: i32,
    pub data: serde_json::Value,
}

impl CommandReply {
    #[must_use]
    pub fn ok(data: serde_json::Value) -> Self {
        Self { status: 0, data }
    }

    #[must_use]
    pub fn error(message: &str) -> Self {
        Self {
            status: -1,
            data: json!({ "message": message }),
        }
    }
}

/// Help text shown by the `help` command.
pub const COMMAND_HELP: &[(&str, &str)] = &[
    ("help", "Command's help"),
    ("authzs", "List authorizations"),
    ("list-topics", "List topics"),
    ("list-clients", "List clients"),
    ("list-users", "List users"),
    ("create-user", "Create user {username} {password}"),
];

/// Build the reply of the `help` command.
#[must_use]
pub fn help_reply(command: Option<&str>) -> CommandReply {
    command.map_or_else(
        || {
            let commands: Vec<serde_json::Value> = COMMAND_HELP
                .iter()
                .map(|(name, description)| json!({ "command": name, "description": description }))
                .collect();
            CommandReply::ok(json!({ "commands": commands }))
        },
        |name| {
            COMMAND_HELP
                .iter()
                .find(|(candidate, _)| *candidate == name)
                .map_or_else(
                    || CommandReply::error(&format!("Unknown command {name:?}")),
                    |(name, description)| {
                        CommandReply::ok(json!({ "command": name, "description": description }))
                    },
                )
        },
    )
}

/// Client handle of the command plane.
#[derive(Debug, Clone)]
pub struct ControlPlane {
    sender: mpsc::Sender<DispatcherCmd>,
}

impl ControlPlane {
    #[must_use]
    pub const fn new(sender: mpsc::Sender<DispatcherCmd>) -> Self {
        Self { sender }
    }

    /// Execute one command and wait for its reply.
    ///
    /// # Errors
    ///
    /// Returns error if the dispatcher is gone.
    pub async fn execute(&self, command: ControlCommand) -> Result<CommandReply, Error> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(DispatcherCmd::Control(ControlRequest {
                command,
                reply: reply_tx,
            }))
            .await?;
        reply_rx.await.map_err(|_err| {
            Error::new(ErrorKind::ChannelError, "control: Dispatcher dropped reply")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(ControlCommand::parse("list-users").unwrap(), ControlCommand::ListUsers);
        assert_eq!(
            ControlCommand::parse("create-user anna pw").unwrap(),
            ControlCommand::CreateUser {
                username: "anna".to_string(),
                password: "pw".to_string(),
            }
        );
        assert!(ControlCommand::parse("create-user anna").is_err());
        assert!(ControlCommand::parse("frobnicate").is_err());
    }

    #[test]
    fn test_help_reply() {
        let reply = help_reply(None);
        assert_eq!(reply.status, 0);
        let commands = reply.data.get("commands").unwrap().as_array().unwrap();
        assert_eq!(commands.len(), COMMAND_HELP.len());

        let reply = help_reply(Some("list-topics"));
        assert_eq!(reply.status, 0);

        let reply = help_reply(Some("nope"));
        assert_eq!(reply.status, -1);
    }
}

// Copyright (c) 2026 Faro Project Developers. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Credential file utility: create and inspect broker users without a
//! running daemon.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use faro::auth::pwd;
use faro::store::{CredentialRecord, CredentialStore};
use faro::Error;

#[derive(Debug, Parser)]
#[command(name = "faro-passwd", about = "Manage faro credential files")]
struct Args {
    /// Credential store file.
    #[arg(short, long, default_value = "/var/lib/faro/users.json")]
    file: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Add a user to the credential file.
    Add {
        username: String,
        password: String,

        /// Digest algorithm, sha512 or sha256.
        #[arg(long, default_value = "sha512")]
        algorithm: String,

        /// PBKDF2 iteration count, floor 101.
        #[arg(long, default_value_t = 101)]
        iterations: u32,
    },

    /// List usernames in the credential file.
    List,

    /// Verify a password against the credential file.
    Check { username: String, password: String },
}

fn main() -> Result<(), Error> {
    env_logger::init();
    let args = Args::parse();

    let mut store = CredentialStore::new(true, &args.file);
    store.load()?;

    match args.command {
        Command::Add {
            username,
            password,
            algorithm,
            iterations,
        } => {
            let credential = pwd::hash_password(password.as_bytes(), &algorithm, iterations)?;
            store.create(
                &username,
                CredentialRecord {
                    credentials: vec![credential],
                },
            )?;
            store.flush()?;
            println!("Added user {username}");
        }
        Command::List => {
            for username in store.list() {
                println!("{username}");
            }
        }
        Command::Check { username, password } => {
            let verified = store
                .get(&username)
                .and_then(CredentialRecord::password_credential)
                .is_some_and(|credential| {
                    pwd::verify_credential(password.as_bytes(), credential)
                });
            if verified {
                println!("ok");
            } else {
                println!("verification failed");
                std::process::exit(1);
            }
        }
    }
    Ok(())
}

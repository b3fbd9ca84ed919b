// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{crate_version, Parser, Subcommand};

use mslot::config;
use mslot::controller::{keyboard, Controller};
use mslot::error::Error as EngineError;
use mslot::player::Player;
use mslot::session::Session;
use mslot::snapshot::SessionSnapshot;
use mslot::store::{FsStore, Store};

const SYSTEMD_SERVICE: &str = r#"
[Unit]
Description=multi-slot transport engine

[Service]
Type=simple
Restart=on-failure
EnvironmentFile=-/etc/default/mslot
ExecStart=/usr/local/bin/mslot start "$MSLOT_CONFIG"
ExecReload=/bin/kill -HUP $MAINPID

[Install]
WantedBy=multi-user.target
Alias=mslot.service
"#;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A multi-slot synchronized transport engine."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start will start the transport engine with a keyboard controller.
    Start {
        /// The path to the engine config.
        config_path: String,
        /// The session to load. A new session is created if it doesn't exist.
        #[arg(short, long)]
        session: Option<String>,
    },
    /// Lists the sessions saved in the configured store.
    Sessions {
        /// The path to the engine config.
        config_path: String,
        /// Print each session as JSON instead of a summary.
        #[arg(long)]
        json: bool,
    },
    /// Prints a systemd service definition to stdout.
    Systemd {},
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start {
            config_path,
            session,
        } => {
            let engine = config::parse_engine(&PathBuf::from(config_path))?;
            let store = Arc::new(FsStore::new(engine.sessions()));

            let session = match session {
                Some(id) => match store.load(&id) {
                    Ok(session) => session,
                    Err(EngineError::SessionNotFound(_)) => Session::new(&id, engine.slots()),
                    Err(e) => return Err(e.into()),
                },
                None => Session::new("default", engine.slots()),
            };

            let player = Arc::new(Player::new(session, store));
            let _snapshots = player.start_monitoring(engine.tick_interval()?);

            let driver = Arc::new(keyboard::Driver::new(engine.song_library()?));
            let mut controller = Controller::new(player.clone(), driver)?;
            controller.join().await?;
            player.stop_monitoring();
        }
        Commands::Sessions { config_path, json } => {
            let engine = config::parse_engine(&PathBuf::from(config_path))?;
            let store = FsStore::new(engine.sessions());

            let ids = store.list()?;
            if ids.is_empty() {
                println!("No sessions found.");
                return Ok(());
            }

            for id in ids {
                let session = store.load(&id)?;
                if json {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&SessionSnapshot::capture(&session))?
                    );
                } else {
                    println!("{}", session);
                }
            }
        }
        Commands::Systemd {} => {
            println!("{}", SYSTEMD_SERVICE)
        }
    }

    Ok(())
}

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
use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{info, span, warn, Level};

use crate::song::Song;
use crate::sync::PlaybackMode;

use super::Event;

const HELP: &str = "Commands: assign <slot> <song>, remove <slot>, on <slot>, off <slot>, \
play <slot>, stop <slot>, toggle <slot>, tempo <slot> <bpm>, volume <slot> <v>, \
mute <slot>, solo <slot>, loop <slot> on|off, seek <slot> <beats>, master, start, \
stopall, mvolume <v>, multiplier <m>, mode <independent|locked|ratio>, reference <bpm>, \
new <id>, load <id>, save, delete <id>";

/// A controller that drives the player from stdin line commands.
pub struct Driver {
    /// The song library available to the assign command.
    library: HashMap<String, Arc<Song>>,
}

impl Driver {
    pub fn new(library: HashMap<String, Arc<Song>>) -> Driver {
        Driver { library }
    }

    /// Parses one line of input into an event. Returns None for unrecognized
    /// or malformed input.
    fn parse(&self, input: &str) -> Option<Event> {
        let mut parts = input.split_whitespace();
        let command = parts.next()?.to_lowercase();
        let rest: Vec<&str> = parts.collect();

        let slot_arg = |args: &[&str]| args.first().and_then(|s| s.parse::<usize>().ok());
        let float_arg =
            |args: &[&str], index: usize| args.get(index).and_then(|s| s.parse::<f64>().ok());

        match command.as_str() {
            "assign" => {
                let slot = slot_arg(&rest)?;
                let name = rest.get(1..)?.join(" ");
                match self.library.get(&name) {
                    Some(song) => Some(Event::AssignSong {
                        song: song.clone(),
                        slot,
                    }),
                    None => {
                        warn!(song = name, "Song not found in the library.");
                        None
                    }
                }
            }
            "remove" => Some(Event::RemoveSong { slot: slot_arg(&rest)? }),
            "on" => Some(Event::ActivateSlot { slot: slot_arg(&rest)? }),
            "off" => Some(Event::DeactivateSlot { slot: slot_arg(&rest)? }),
            "play" => Some(Event::PlaySlot { slot: slot_arg(&rest)? }),
            "stop" => Some(Event::StopSlot { slot: slot_arg(&rest)? }),
            "toggle" => Some(Event::TogglePlaySlot { slot: slot_arg(&rest)? }),
            "tempo" => Some(Event::SetTempo {
                tempo_bpm: float_arg(&rest, 1)?,
                slot: slot_arg(&rest)?,
            }),
            "volume" => Some(Event::SetVolume {
                volume: float_arg(&rest, 1)?,
                slot: slot_arg(&rest)?,
            }),
            "mute" => Some(Event::ToggleMute { slot: slot_arg(&rest)? }),
            "solo" => Some(Event::ToggleSolo { slot: slot_arg(&rest)? }),
            "loop" => {
                let looped = match *rest.get(1)? {
                    "on" => true,
                    "off" => false,
                    _ => return None,
                };
                Some(Event::SetLooped {
                    looped,
                    slot: slot_arg(&rest)?,
                })
            }
            "seek" => Some(Event::SeekTo {
                position_beats: float_arg(&rest, 1)?,
                slot: slot_arg(&rest)?,
            }),
            "master" => Some(Event::ToggleMasterPlay),
            "start" => Some(Event::StartMaster),
            "stopall" => Some(Event::StopMaster),
            "mvolume" => Some(Event::SetMasterVolume(float_arg(&rest, 0)?)),
            "multiplier" => Some(Event::SetTempoMultiplier(float_arg(&rest, 0)?)),
            "mode" => match *rest.first()? {
                "independent" => Some(Event::SetPlaybackMode(PlaybackMode::Independent)),
                "locked" => Some(Event::SetPlaybackMode(PlaybackMode::Locked)),
                "ratio" => Some(Event::SetPlaybackMode(PlaybackMode::Ratio)),
                _ => None,
            },
            "reference" => Some(Event::SetReferenceTempo(float_arg(&rest, 0)?)),
            "new" => Some(Event::CreateSession(rest.first()?.to_string())),
            "load" => Some(Event::LoadSession(rest.first()?.to_string())),
            "save" => Some(Event::SaveSession),
            "delete" => Some(Event::DeleteSession(rest.first()?.to_string())),
            _ => None,
        }
    }

    fn monitor_io<R, W>(
        &self,
        events_tx: &Sender<Event>,
        mut reader: R,
        mut writer: W,
    ) -> Result<(), io::Error>
    where
        R: io::BufRead,
        W: io::Write,
    {
        write!(writer, "> ")?;
        writer.flush()?;
        let mut input: String = String::default();
        reader.read_line(&mut input)?;

        match self.parse(input.trim()) {
            Some(event) => events_tx
                .blocking_send(event)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?,
            None => {
                warn!(input = input.trim(), "Unrecognized input");
                writeln!(writer, "{}", HELP)?;
            }
        }
        Ok(())
    }
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
        let driver = Driver {
            library: self.library.clone(),
        };
        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "keyboard driver");
            let _enter = span.enter();

            info!("Keyboard driver started.");

            loop {
                driver.monitor_io(&events_tx, io::stdin().lock(), io::stdout())?;
            }
        })
    }
}

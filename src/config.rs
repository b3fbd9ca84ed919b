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
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use duration_string::DurationString;
use serde::{Deserialize, Serialize};

use crate::error;
use crate::session;
use crate::song;
use crate::sync::PlaybackMode;

/// The default monitor tick interval.
const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(10);

/// The configuration for the engine.
#[derive(Deserialize)]
pub struct Engine {
    /// The number of slots in a session. Defaults to 6.
    slots: Option<usize>,
    /// The monitor tick interval as a duration string, e.g. "10ms".
    tick_interval: Option<String>,
    /// The directory holding saved sessions.
    sessions: PathBuf,
    /// The song library available for slot assignment.
    #[serde(default)]
    songs: Vec<Song>,
}

impl Engine {
    /// The number of slots in a session.
    pub fn slots(&self) -> usize {
        self.slots.unwrap_or(session::DEFAULT_CAPACITY)
    }

    /// The monitor tick interval.
    pub fn tick_interval(&self) -> Result<Duration, Box<dyn std::error::Error>> {
        match &self.tick_interval {
            Some(interval) => Ok(DurationString::from_string(interval.clone())?.into()),
            None => Ok(DEFAULT_TICK_INTERVAL),
        }
    }

    /// The directory holding saved sessions.
    pub fn sessions(&self) -> &Path {
        &self.sessions
    }

    /// The song library, keyed by name.
    pub fn song_library(&self) -> Result<HashMap<String, Arc<song::Song>>, error::Error> {
        let mut library = HashMap::new();
        for song in self.songs.iter() {
            library.insert(song.name.clone(), Arc::new(song.to_song()?));
        }
        Ok(library)
    }
}

/// Parses the engine configuration from a YAML file.
pub fn parse_engine(file: &PathBuf) -> Result<Engine, Box<dyn std::error::Error>> {
    let engine: Engine = serde_yml::from_str(&fs::read_to_string(file)?)
        .map_err(|e| format!("error parsing file {}: {}", file.display(), e))?;
    Ok(engine)
}

/// A song reference in configuration or in a persisted session.
#[derive(Serialize, Deserialize, Clone)]
pub struct Song {
    /// The name of the song.
    pub name: String,
    /// The nominal tempo in beats per minute.
    pub tempo_bpm: f64,
    /// The length in beats.
    pub length_beats: f64,
}

impl Song {
    fn to_song(&self) -> Result<song::Song, error::Error> {
        song::Song::new(&self.name, self.tempo_bpm, self.length_beats)
    }

    fn from_song(song: &song::Song) -> Song {
        Song {
            name: song.name().to_string(),
            tempo_bpm: song.tempo_bpm(),
            length_beats: song.length_beats(),
        }
    }
}

/// The persisted mix settings of a slot. Playback state (position, playing)
/// is runtime-only: a loaded session comes back stopped at position zero.
#[derive(Serialize, Deserialize, Default)]
pub struct SlotSettings {
    pub tempo_bpm: f64,
    pub volume: f64,
    pub muted: bool,
    pub solo: bool,
    pub looped: bool,
}

/// A persisted slot.
#[derive(Serialize, Deserialize, Default)]
pub struct Slot {
    #[serde(default)]
    pub song: Option<Song>,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub settings: Option<SlotSettings>,
}

/// The persisted master transport.
#[derive(Serialize, Deserialize)]
pub struct Master {
    pub volume: f64,
    pub tempo_multiplier: f64,
    pub mode: PlaybackMode,
    pub reference_tempo: f64,
}

/// The on-disk form of a session. Conversion back to the domain type goes
/// through the session's own operations so every persisted value is validated
/// the same way control input is.
#[derive(Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub slots: Vec<Slot>,
    pub master: Master,
}

impl Session {
    /// Captures the persistable parts of a session.
    pub fn from_session(session: &session::Session) -> Session {
        Session {
            id: session.id().to_string(),
            slots: session
                .slots()
                .iter()
                .map(|slot| Slot {
                    song: slot.song().map(|song| Song::from_song(song.as_ref())),
                    active: slot.is_active(),
                    settings: slot.transport().map(|transport| SlotSettings {
                        tempo_bpm: transport.tempo_bpm,
                        volume: transport.volume,
                        muted: transport.is_muted,
                        solo: transport.is_solo,
                        looped: transport.looped,
                    }),
                })
                .collect(),
            master: Master {
                volume: session.master().master_volume,
                tempo_multiplier: session.master().tempo_multiplier,
                mode: session.master().mode,
                reference_tempo: session.master().reference_tempo,
            },
        }
    }

    /// Rebuilds the domain session, rejecting malformed values.
    pub fn to_session(&self) -> Result<session::Session, error::Error> {
        let mut session = session::Session::new(&self.id, self.slots.len());

        for (index, slot) in self.slots.iter().enumerate() {
            if let Some(song) = &slot.song {
                session.assign(Arc::new(song.to_song()?), index)?;
                if let Some(settings) = &slot.settings {
                    session.set_tempo(settings.tempo_bpm, index)?;
                    session.set_volume(settings.volume, index)?;
                    session.set_looped(settings.looped, index)?;
                    if settings.muted {
                        session.toggle_mute(index)?;
                    }
                    if settings.solo {
                        session.toggle_solo(index)?;
                    }
                }
            }
            if slot.active {
                session.activate(index)?;
            }
        }

        session.set_reference_tempo(self.master.reference_tempo)?;
        session.set_tempo_multiplier(self.master.tempo_multiplier)?;
        session.set_master_volume(self.master.volume)?;
        session.set_playback_mode(self.master.mode);
        Ok(session)
    }
}

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
use std::fmt;

use crate::error::Error;

/// A song reference for slot playback. The engine only cares about the timing
/// metadata: the nominal tempo used by ratio synchronization and the length in
/// beats used for looping and seek clamping. The actual audio content lives
/// with the rendering collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct Song {
    /// The name of the song.
    name: String,
    /// The nominal tempo of the song in beats per minute.
    tempo_bpm: f64,
    /// The length of the song in beats.
    length_beats: f64,
}

impl Song {
    /// Creates a new song reference, validating the timing metadata.
    pub fn new(name: &str, tempo_bpm: f64, length_beats: f64) -> Result<Song, Error> {
        if !tempo_bpm.is_finite() || tempo_bpm <= 0.0 {
            return Err(Error::InvalidParameter(format!(
                "song tempo must be a positive number, got {}",
                tempo_bpm
            )));
        }
        if !length_beats.is_finite() || length_beats <= 0.0 {
            return Err(Error::InvalidParameter(format!(
                "song length must be a positive number of beats, got {}",
                length_beats
            )));
        }

        Ok(Song {
            name: name.to_string(),
            tempo_bpm,
            length_beats,
        })
    }

    /// The name of the song.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The nominal tempo in beats per minute.
    pub fn tempo_bpm(&self) -> f64 {
        self.tempo_bpm
    }

    /// The length in beats.
    pub fn length_beats(&self) -> f64 {
        self.length_beats
    }
}

impl fmt::Display for Song {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} BPM, {} beats)",
            self.name, self.tempo_bpm, self.length_beats
        )
    }
}

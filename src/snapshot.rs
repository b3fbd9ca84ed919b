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
use serde::Serialize;

use crate::mix;
use crate::session::Session;
use crate::sync;

/// A read-only view of one slot, captured at tick cadence. The rendering
/// collaborator must treat the positions and audibility here as the
/// authoritative transport decision.
#[derive(Debug, Clone, Serialize)]
pub struct SlotSnapshot {
    /// The slot index.
    pub index: usize,
    /// The assigned song's name, if any.
    pub song: Option<String>,
    /// Whether the slot participates in playback.
    pub active: bool,
    /// Whether the slot is advancing.
    pub playing: bool,
    /// Whether the slot is muted.
    pub muted: bool,
    /// Whether the slot is soloed.
    pub solo: bool,
    /// Whether the slot loops at the end of its song.
    pub looped: bool,
    /// The slot volume.
    pub volume: f64,
    /// The playback position in beats.
    pub position_beats: f64,
    /// The rate applied to advance this slot, after sync-mode resolution.
    pub effective_tempo: Option<f64>,
    /// Whether this slot's output belongs in the mix.
    pub audible: bool,
}

/// A read-only view of the master transport.
#[derive(Debug, Clone, Serialize)]
pub struct MasterSnapshot {
    pub playing: bool,
    pub volume: f64,
    pub tempo_multiplier: f64,
    pub mode: String,
    pub reference_tempo: f64,
}

/// A consistent view of the whole session, captured under the session lock.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub id: String,
    pub master: MasterSnapshot,
    pub slots: Vec<SlotSnapshot>,
}

impl SessionSnapshot {
    /// Captures a snapshot of the session.
    pub fn capture(session: &Session) -> SessionSnapshot {
        let master = session.master();
        SessionSnapshot {
            id: session.id().to_string(),
            master: MasterSnapshot {
                playing: master.is_playing,
                volume: master.master_volume,
                tempo_multiplier: master.tempo_multiplier,
                mode: master.mode.to_string(),
                reference_tempo: master.reference_tempo,
            },
            slots: session
                .slots()
                .iter()
                .map(|slot| {
                    let transport = slot.transport().cloned().unwrap_or_default();
                    SlotSnapshot {
                        index: slot.index(),
                        song: slot.song().map(|song| song.name().to_string()),
                        active: slot.is_active(),
                        playing: transport.is_playing,
                        muted: transport.is_muted,
                        solo: transport.is_solo,
                        looped: transport.looped,
                        volume: transport.volume,
                        position_beats: transport.position_beats,
                        effective_tempo: sync::effective_tempo(master, slot),
                        audible: mix::audible(session, slot),
                    }
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::SessionSnapshot;
    use crate::session::Session;
    use crate::song::Song;
    use crate::sync::PlaybackMode;

    #[test]
    fn test_snapshot_capture() {
        let mut session = Session::new("gig", 3);
        let song = Arc::new(Song::new("Song 1", 90.0, 16.0).expect("valid song"));
        session.assign(song, 1).expect("assign should succeed");
        session.activate(1).expect("activate should succeed");
        session.play_slot(1).expect("play should succeed");
        session.set_playback_mode(PlaybackMode::Locked);
        session
            .set_tempo_multiplier(2.0)
            .expect("set should succeed");

        let snapshot = SessionSnapshot::capture(&session);
        assert_eq!("gig", snapshot.id);
        assert_eq!(3, snapshot.slots.len());
        assert_eq!("locked", snapshot.master.mode);

        let slot = &snapshot.slots[1];
        assert_eq!(Some("Song 1".to_string()), slot.song);
        assert!(slot.playing);
        assert!(slot.audible);
        assert_eq!(Some(240.0), slot.effective_tempo);

        let empty = &snapshot.slots[0];
        assert!(empty.song.is_none());
        assert!(empty.effective_tempo.is_none());
        assert!(!empty.audible);
    }
}

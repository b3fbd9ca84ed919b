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

use serde::{Deserialize, Serialize};

use crate::session::{MasterTransport, Slot};

/// How slot tempi relate to the master transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackMode {
    /// Each slot advances at its own tempo; the master multiplier has no
    /// effect.
    Independent,
    /// Every active slot advances at the reference tempo times the
    /// multiplier, an identical rate across slots.
    Locked,
    /// Every active slot keeps its nominal tempo ratio to the reference while
    /// the multiplier scales all slots together.
    Ratio,
}

impl fmt::Display for PlaybackMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackMode::Independent => write!(f, "independent"),
            PlaybackMode::Locked => write!(f, "locked"),
            PlaybackMode::Ratio => write!(f, "ratio"),
        }
    }
}

/// Computes the beats-per-minute rate actually applied to advance the slot's
/// position. Returns None for an empty slot. A mode switch changes only the
/// result of this computation going forward; it never touches positions.
pub fn effective_tempo(master: &MasterTransport, slot: &Slot) -> Option<f64> {
    let transport = slot.transport()?;

    Some(match master.mode {
        PlaybackMode::Independent => transport.tempo_bpm,
        PlaybackMode::Locked => master.reference_tempo * master.tempo_multiplier,
        PlaybackMode::Ratio => {
            master.reference_tempo
                * master.tempo_multiplier
                * (transport.tempo_bpm / master.reference_tempo)
        }
    })
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::{effective_tempo, PlaybackMode};
    use crate::session::Session;
    use crate::song::Song;

    fn session_with_tempi(tempi: &[f64]) -> Session {
        let mut session = Session::new("test", tempi.len() + 1);
        for (index, tempo) in tempi.iter().enumerate() {
            let song = Arc::new(
                Song::new(&format!("Song {}", index), *tempo, 64.0).expect("valid song"),
            );
            session.assign(song, index).expect("assign should succeed");
            session.activate(index).expect("activate should succeed");
        }
        session
    }

    fn tempo_of(session: &Session, index: usize) -> f64 {
        effective_tempo(session.master(), session.slot(index).expect("slot"))
            .expect("slot should have a tempo")
    }

    #[test]
    fn test_independent_uses_slot_tempo() {
        let mut session = session_with_tempi(&[120.0, 90.0]);
        session.set_playback_mode(PlaybackMode::Independent);
        session
            .set_tempo_multiplier(2.0)
            .expect("set should succeed");

        // The multiplier has no effect in independent mode.
        assert_eq!(120.0, tempo_of(&session, 0));
        assert_eq!(90.0, tempo_of(&session, 1));

        session.set_tempo(100.0, 0).expect("set should succeed");
        assert_eq!(100.0, tempo_of(&session, 0));
    }

    #[test]
    fn test_locked_is_uniform() {
        let mut session = session_with_tempi(&[120.0, 90.0, 73.0]);
        session.set_playback_mode(PlaybackMode::Locked);
        session
            .set_reference_tempo(110.0)
            .expect("set should succeed");
        session
            .set_tempo_multiplier(1.5)
            .expect("set should succeed");

        for index in 0..3 {
            assert_eq!(110.0 * 1.5, tempo_of(&session, index));
        }
    }

    #[test]
    fn test_ratio_preserves_ratios() {
        // Scenario: slot0 at 120 BPM, slot1 at 90 BPM, slot2 empty.
        let mut session = session_with_tempi(&[120.0, 90.0]);
        session.set_playback_mode(PlaybackMode::Ratio);
        session
            .set_reference_tempo(120.0)
            .expect("set should succeed");

        assert_eq!(120.0, tempo_of(&session, 0));
        assert_eq!(90.0, tempo_of(&session, 1));

        session
            .set_tempo_multiplier(1.2)
            .expect("set should succeed");
        let tempo0 = tempo_of(&session, 0);
        let tempo1 = tempo_of(&session, 1);
        assert!((tempo0 - 144.0).abs() < 1e-9);
        assert!((tempo1 - 108.0).abs() < 1e-9);
        assert!((tempo0 / tempo1 - 120.0 / 90.0).abs() < 1e-9);

        // The empty slot has no effective tempo.
        assert!(effective_tempo(session.master(), session.slot(2).expect("slot")).is_none());
    }

    #[test]
    fn test_ratio_uses_recorded_nominal_tempo() {
        // Assignment records the song's nominal tempo, but set_tempo
        // re-records it and the ratio computation follows.
        let mut session = session_with_tempi(&[120.0]);
        session.set_playback_mode(PlaybackMode::Ratio);
        session
            .set_reference_tempo(120.0)
            .expect("set should succeed");

        assert_eq!(120.0, tempo_of(&session, 0));
        session.set_tempo(90.0, 0).expect("set should succeed");
        assert!((tempo_of(&session, 0) - 90.0).abs() < 1e-9);

        session
            .set_tempo_multiplier(1.2)
            .expect("set should succeed");
        assert!((tempo_of(&session, 0) - 108.0).abs() < 1e-9);
    }

    #[test]
    fn test_mode_parses_from_config() {
        let mode: PlaybackMode = serde_yml::from_str("ratio").expect("mode should parse");
        assert_eq!(PlaybackMode::Ratio, mode);
        assert!(serde_yml::from_str::<PlaybackMode>("sideways").is_err());
    }
}

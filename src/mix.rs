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
use crate::session::{Session, Slot};

/// Decides whether a slot's output belongs in the mix. Recomputed from the
/// current flags on every call; there is no memory of past state.
///
/// A slot is audible when it is active, has a song assigned, is not muted,
/// and either no slot is soloed or this slot is part of the solo group. Mute
/// always overrides solo.
pub fn audible(session: &Session, slot: &Slot) -> bool {
    let transport = match slot.transport() {
        Some(transport) => transport,
        None => return false,
    };

    slot.is_active() && !transport.is_muted && (!session.any_solo() || transport.is_solo)
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::audible;
    use crate::session::Session;
    use crate::song::Song;

    fn session_with_slots(count: usize) -> Session {
        let mut session = Session::new("test", count);
        for index in 0..count {
            let song =
                Arc::new(Song::new(&format!("Song {}", index), 120.0, 16.0).expect("valid song"));
            session.assign(song, index).expect("assign should succeed");
            session.activate(index).expect("activate should succeed");
        }
        session
    }

    #[test]
    fn test_mute_solo_table() {
        // Exhaustive table over {muted, soloed} x {another slot soloed}.
        // Slot 0 is the slot under test, slot 1 provides the external solo.
        let cases = [
            // (muted, soloed, other_soloed, expected)
            (false, false, false, true),
            (false, false, true, false),
            (false, true, false, true),
            (false, true, true, true),
            (true, false, false, false),
            (true, false, true, false),
            (true, true, false, false),
            (true, true, true, false),
        ];

        for (muted, soloed, other_soloed, expected) in cases {
            let mut session = session_with_slots(2);
            if muted {
                session.toggle_mute(0).expect("mute should succeed");
            }
            if soloed {
                session.toggle_solo(0).expect("solo should succeed");
            }
            if other_soloed {
                session.toggle_solo(1).expect("solo should succeed");
            }

            assert_eq!(
                expected,
                audible(&session, session.slot(0).expect("slot")),
                "muted={} soloed={} other_soloed={}",
                muted,
                soloed,
                other_soloed,
            );
        }
    }

    #[test]
    fn test_solo_group_is_additive() {
        let mut session = session_with_slots(3);
        session.toggle_solo(0).expect("solo should succeed");
        session.toggle_solo(1).expect("solo should succeed");

        assert!(audible(&session, session.slot(0).expect("slot")));
        assert!(audible(&session, session.slot(1).expect("slot")));
        assert!(!audible(&session, session.slot(2).expect("slot")));
    }

    #[test]
    fn test_empty_and_inactive_slots_are_silent() {
        let mut session = session_with_slots(2);
        session.deactivate(0).expect("deactivate should succeed");
        assert!(!audible(&session, session.slot(0).expect("slot")));

        session.remove(1).expect("remove should succeed");
        assert!(!audible(&session, session.slot(1).expect("slot")));
    }
}

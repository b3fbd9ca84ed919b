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
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use tracing::{info, span, Level, Span};

use crate::clock::Monitor;
use crate::error::Error;
use crate::session::Session;
use crate::snapshot::SessionSnapshot;
use crate::song::Song;
use crate::store::Store;
use crate::sync::PlaybackMode;

/// The master transport controller: the single control surface over one
/// shared session. Control operations take short, bounded critical sections
/// over the session; the monitor's tick loop reads a consistent view once per
/// tick, so every mutation here is visible at the next tick boundary at the
/// latest.
pub struct Player {
    /// The shared session. The sole shared mutable resource.
    session: Arc<Mutex<Session>>,
    /// A fault recorded by the clock, surfaced on the next control call.
    fault: Arc<Mutex<Option<Error>>>,
    /// The persistence collaborator for session lifecycle operations.
    store: Arc<dyn Store>,
    /// The running monitor, if any.
    monitor: Mutex<Option<Monitor>>,
    /// The logging span.
    span: Span,
}

impl Player {
    /// Creates a new player over the given session.
    pub fn new(session: Session, store: Arc<dyn Store>) -> Player {
        Player {
            session: Arc::new(Mutex::new(session)),
            fault: Arc::new(Mutex::new(None)),
            store,
            monitor: Mutex::new(None),
            span: span!(Level::INFO, "player"),
        }
    }

    /// Surfaces a pending tick fault, if one was recorded. Every control
    /// operation calls this before touching any state.
    fn check_fault(&self) -> Result<(), Error> {
        match self.fault.lock().take() {
            Some(fault) => Err(fault),
            None => Ok(()),
        }
    }

    /// Replaces the current session with an empty one of the same capacity.
    pub fn create_session(&self, id: &str) -> Result<(), Error> {
        self.check_fault()?;
        let _enter = self.span.enter();

        let mut session = self.session.lock();
        info!(id = id, "Creating empty session.");
        *session = Session::new(id, session.capacity());
        Ok(())
    }

    /// Loads a session from the store, replacing the current one.
    pub fn load_session(&self, id: &str) -> Result<(), Error> {
        self.check_fault()?;
        let _enter = self.span.enter();

        let loaded = self.store.load(id)?;
        info!(id = id, "Loaded session.");
        *self.session.lock() = loaded;
        Ok(())
    }

    /// Saves the current session to the store.
    pub fn save_session(&self) -> Result<(), Error> {
        self.check_fault()?;
        let _enter = self.span.enter();

        let session = self.session.lock();
        info!(id = session.id(), "Saving session.");
        self.store.save(&session)
    }

    /// Deletes a session from the store. The in-memory session is untouched.
    pub fn delete_session(&self, id: &str) -> Result<(), Error> {
        self.check_fault()?;
        self.store.delete(id)
    }

    /// Assigns a song to a slot.
    pub fn assign_song(&self, song: Arc<Song>, index: usize) -> Result<(), Error> {
        self.check_fault()?;
        self.session.lock().assign(song, index)
    }

    /// Removes the song from a slot, deactivating it.
    pub fn remove_song(&self, index: usize) -> Result<(), Error> {
        self.check_fault()?;
        let _enter = self.span.enter();
        info!(slot = index, "Removing song from slot.");
        self.session.lock().remove(index)
    }

    /// Activates a slot.
    pub fn activate_slot(&self, index: usize) -> Result<(), Error> {
        self.check_fault()?;
        self.session.lock().activate(index)
    }

    /// Deactivates a slot, stopping it synchronously so it never contributes
    /// to the next tick.
    pub fn deactivate_slot(&self, index: usize) -> Result<(), Error> {
        self.check_fault()?;
        self.session.lock().deactivate(index)
    }

    /// Starts playback of a slot.
    pub fn play_slot(&self, index: usize) -> Result<(), Error> {
        self.check_fault()?;
        self.session.lock().play_slot(index)
    }

    /// Stops a slot and resets its position to zero.
    pub fn stop_slot(&self, index: usize) -> Result<(), Error> {
        self.check_fault()?;
        self.session.lock().stop_slot(index)
    }

    /// Toggles playback of a slot.
    pub fn toggle_play_slot(&self, index: usize) -> Result<(), Error> {
        self.check_fault()?;
        self.session.lock().toggle_play_slot(index)
    }

    /// Sets a slot's tempo.
    pub fn set_tempo(&self, tempo_bpm: f64, index: usize) -> Result<(), Error> {
        self.check_fault()?;
        self.session.lock().set_tempo(tempo_bpm, index)
    }

    /// Sets a slot's volume, clamped into [0, 1].
    pub fn set_volume(&self, volume: f64, index: usize) -> Result<(), Error> {
        self.check_fault()?;
        self.session.lock().set_volume(volume, index)
    }

    /// Toggles a slot's mute flag.
    pub fn toggle_mute(&self, index: usize) -> Result<(), Error> {
        self.check_fault()?;
        self.session.lock().toggle_mute(index)
    }

    /// Toggles a slot's solo flag.
    pub fn toggle_solo(&self, index: usize) -> Result<(), Error> {
        self.check_fault()?;
        self.session.lock().toggle_solo(index)
    }

    /// Sets a slot's loop flag.
    pub fn set_looped(&self, looped: bool, index: usize) -> Result<(), Error> {
        self.check_fault()?;
        self.session.lock().set_looped(looped, index)
    }

    /// Seeks a slot to the given position in beats.
    pub fn seek_to(&self, position_beats: f64, index: usize) -> Result<(), Error> {
        self.check_fault()?;
        self.session.lock().seek_to(position_beats, index)
    }

    /// Toggles the master transport between playing and paused.
    pub fn toggle_master_play(&self) -> Result<(), Error> {
        self.check_fault()?;
        let _enter = self.span.enter();

        let mut session = self.session.lock();
        session.toggle_master_play();
        info!(playing = session.master().is_playing, "Toggled master play.");
        Ok(())
    }

    /// Starts the master transport.
    pub fn start_master(&self) -> Result<(), Error> {
        self.check_fault()?;
        self.session.lock().start_master();
        Ok(())
    }

    /// Stops the master transport and resets every slot's position to zero.
    pub fn stop_master(&self) -> Result<(), Error> {
        self.check_fault()?;
        self.session.lock().stop_master();
        Ok(())
    }

    /// Sets the master volume, clamped into [0, 1].
    pub fn set_master_volume(&self, volume: f64) -> Result<(), Error> {
        self.check_fault()?;
        self.session.lock().set_master_volume(volume)
    }

    /// Sets the tempo multiplier, clamped to a positive value.
    pub fn set_tempo_multiplier(&self, multiplier: f64) -> Result<(), Error> {
        self.check_fault()?;
        self.session.lock().set_tempo_multiplier(multiplier)
    }

    /// Sets the synchronization mode. Takes effect at the next tick boundary
    /// and never moves positions.
    pub fn set_playback_mode(&self, mode: PlaybackMode) -> Result<(), Error> {
        self.check_fault()?;
        self.session.lock().set_playback_mode(mode);
        Ok(())
    }

    /// Sets the anchor tempo for locked and ratio modes.
    pub fn set_reference_tempo(&self, tempo_bpm: f64) -> Result<(), Error> {
        self.check_fault()?;
        self.session.lock().set_reference_tempo(tempo_bpm)
    }

    /// Overwrites a slot's position from the rendering collaborator's report.
    /// The renderer is the authoritative position source; the wall-clock tick
    /// only fills the gaps between these reports.
    pub fn report_rendered_position(&self, position_beats: f64, index: usize) -> Result<(), Error> {
        self.session.lock().seek_to(position_beats, index)
    }

    /// Captures a read-only snapshot of the session.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot::capture(&self.session.lock())
    }

    /// Starts the wall-clock monitor at the given cadence, returning the
    /// tick-cadence snapshot feed. A running monitor is stopped first.
    pub fn start_monitoring(&self, interval: Duration) -> Receiver<SessionSnapshot> {
        let _enter = self.span.enter();

        let mut monitor = self.monitor.lock();
        if let Some(mut running) = monitor.take() {
            running.stop();
        }

        let (running, snapshots) = Monitor::start(
            Arc::clone(&self.session),
            Arc::clone(&self.fault),
            interval,
        );
        *monitor = Some(running);
        snapshots
    }

    /// Stops the wall-clock monitor. Immediate and idempotent.
    pub fn stop_monitoring(&self) {
        if let Some(mut running) = self.monitor.lock().take() {
            running.stop();
        }
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.stop_monitoring();
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;
    use std::time::Duration;

    use super::Player;
    use crate::error::Error;
    use crate::session::Session;
    use crate::song::Song;
    use crate::store::MemoryStore;
    use crate::sync::PlaybackMode;
    use crate::test::eventually;

    fn song(name: &str, tempo: f64, length: f64) -> Arc<Song> {
        Arc::new(Song::new(name, tempo, length).expect("song should be valid"))
    }

    fn player_with_slots() -> Player {
        let player = Player::new(Session::new("gig", 3), Arc::new(MemoryStore::new()));
        player
            .assign_song(song("Song 1", 120.0, 6400.0), 0)
            .expect("assign should succeed");
        player
            .assign_song(song("Song 2", 90.0, 6400.0), 1)
            .expect("assign should succeed");
        player.activate_slot(0).expect("activate should succeed");
        player.activate_slot(1).expect("activate should succeed");
        player
    }

    #[test]
    fn test_master_overlay_contract() {
        let player = player_with_slots();

        player
            .toggle_master_play()
            .expect("toggle should succeed");
        let snapshot = player.snapshot();
        assert!(snapshot.master.playing);
        assert!(snapshot.slots[0].playing);
        assert!(snapshot.slots[1].playing);
        assert!(!snapshot.slots[2].playing);

        // A manually stopped slot stays stopped; the master overlay does not
        // auto-resume it.
        player.stop_slot(1).expect("stop should succeed");
        assert!(!player.snapshot().slots[1].playing);

        // Pause keeps positions, stop zeroes them.
        player.seek_to(8.0, 0).expect("seek should succeed");
        player
            .toggle_master_play()
            .expect("toggle should succeed");
        let snapshot = player.snapshot();
        assert!(!snapshot.master.playing);
        assert_eq!(8.0, snapshot.slots[0].position_beats);

        player.stop_master().expect("stop should succeed");
        assert_eq!(0.0, player.snapshot().slots[0].position_beats);
    }

    #[test]
    fn test_monitoring_lifecycle() {
        let player = player_with_slots();
        player.start_master().expect("start should succeed");

        let snapshots = player.start_monitoring(Duration::from_millis(5));
        eventually(
            || player.snapshot().slots[0].position_beats > 0.0,
            "Position never advanced",
        );
        eventually(
            || snapshots.try_recv().is_ok(),
            "No snapshot was ever published",
        );

        player.stop_monitoring();
        let position = player.snapshot().slots[0].position_beats;
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(position, player.snapshot().slots[0].position_beats);

        // Idempotent.
        player.stop_monitoring();
    }

    #[test]
    fn test_tick_fault_surfaces_on_next_control_call() {
        let player = player_with_slots();
        player.play_slot(0).expect("play should succeed");

        // Drive the locked tempo computation to infinity so the clock faults.
        player
            .set_reference_tempo(f64::MAX / 2.0)
            .expect("set should succeed");
        player
            .set_tempo_multiplier(f64::MAX)
            .expect("set should succeed");
        player
            .set_playback_mode(PlaybackMode::Locked)
            .expect("set should succeed");

        let _snapshots = player.start_monitoring(Duration::from_millis(5));
        eventually(
            || {
                matches!(
                    player.set_master_volume(0.8),
                    Err(Error::EngineFault(_))
                )
            },
            "Fault was never surfaced",
        );
        player.stop_monitoring();

        // The faulting tick was skipped entirely.
        assert_eq!(0.0, player.snapshot().slots[0].position_beats);
    }

    #[test]
    fn test_rendered_position_report_is_authoritative() {
        let player = player_with_slots();
        player.seek_to(4.0, 0).expect("seek should succeed");
        player
            .report_rendered_position(12.5, 0)
            .expect("report should succeed");
        assert_eq!(12.5, player.snapshot().slots[0].position_beats);

        assert!(matches!(
            player.report_rendered_position(-1.0, 0),
            Err(Error::InvalidParameter(_))
        ));
        assert!(matches!(
            player.report_rendered_position(1.0, 2),
            Err(Error::SlotEmpty(2))
        ));
    }

    #[test]
    fn test_session_lifecycle() {
        let store = Arc::new(MemoryStore::new());
        let player = Player::new(Session::new("gig", 3), store);

        player
            .assign_song(song("Song 1", 120.0, 16.0), 0)
            .expect("assign should succeed");
        player.activate_slot(0).expect("activate should succeed");
        player.save_session().expect("save should succeed");

        // A new empty session, then reload the saved one.
        player
            .create_session("scratch")
            .expect("create should succeed");
        let snapshot = player.snapshot();
        assert_eq!("scratch", snapshot.id);
        assert!(snapshot.slots.iter().all(|slot| slot.song.is_none()));

        player.load_session("gig").expect("load should succeed");
        let snapshot = player.snapshot();
        assert_eq!("gig", snapshot.id);
        assert_eq!(Some("Song 1".to_string()), snapshot.slots[0].song);
        assert!(snapshot.slots[0].active);

        assert_eq!(
            Err(Error::SessionNotFound("missing".to_string())),
            player.load_session("missing")
        );

        player.delete_session("gig").expect("delete should succeed");
        assert_eq!(
            Err(Error::SessionNotFound("gig".to_string())),
            player.load_session("gig")
        );
    }
}

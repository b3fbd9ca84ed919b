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
use std::io;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{error, info, span, Level};

use crate::player::Player;
use crate::song::Song;
use crate::sync::PlaybackMode;

pub mod keyboard;

/// Controller events that will trigger behavior in the player.
#[derive(Debug, PartialEq)]
pub enum Event {
    /// Assigns a song to a slot.
    AssignSong { song: Arc<Song>, slot: usize },

    /// Removes the song from a slot.
    RemoveSong { slot: usize },

    /// Activates a slot.
    ActivateSlot { slot: usize },

    /// Deactivates a slot, stopping it immediately.
    DeactivateSlot { slot: usize },

    /// Starts playback of a slot.
    PlaySlot { slot: usize },

    /// Stops a slot and resets its position.
    StopSlot { slot: usize },

    /// Toggles playback of a slot.
    TogglePlaySlot { slot: usize },

    /// Sets a slot's tempo.
    SetTempo { tempo_bpm: f64, slot: usize },

    /// Sets a slot's volume.
    SetVolume { volume: f64, slot: usize },

    /// Toggles a slot's mute flag.
    ToggleMute { slot: usize },

    /// Toggles a slot's solo flag.
    ToggleSolo { slot: usize },

    /// Sets a slot's loop flag.
    SetLooped { looped: bool, slot: usize },

    /// Seeks a slot to a position in beats.
    SeekTo { position_beats: f64, slot: usize },

    /// Toggles the master transport between playing and paused.
    ToggleMasterPlay,

    /// Starts the master transport.
    StartMaster,

    /// Stops the master transport and zeroes every position.
    StopMaster,

    /// Sets the master volume.
    SetMasterVolume(f64),

    /// Sets the tempo multiplier.
    SetTempoMultiplier(f64),

    /// Sets the synchronization mode.
    SetPlaybackMode(PlaybackMode),

    /// Sets the anchor tempo for locked and ratio modes.
    SetReferenceTempo(f64),

    /// Replaces the current session with an empty one.
    CreateSession(String),

    /// Loads a session from the store.
    LoadSession(String),

    /// Saves the current session to the store.
    SaveSession,

    /// Deletes a session from the store.
    DeleteSession(String),
}

pub trait Driver: Send + Sync + 'static {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>>;
}

/// Translates driver events into player operations.
pub struct Controller {
    handle: JoinHandle<()>,
}

impl Controller {
    /// Creates a new controller with the given driver.
    pub fn new(player: Arc<Player>, driver: Arc<dyn Driver>) -> Result<Controller, Box<dyn Error>> {
        Ok(Controller {
            handle: tokio::spawn(async move { Controller::trigger_events(player, driver).await }),
        })
    }

    /// Join will block until the controller finishes.
    pub async fn join(&mut self) -> Result<(), JoinError> {
        (&mut self.handle).await
    }

    /// Triggers player operations by watching the driver and getting events
    /// from it.
    async fn trigger_events(player: Arc<Player>, driver: Arc<dyn Driver>) {
        let span = span!(Level::INFO, "controller");
        let _enter = span.enter();

        let (events_tx, mut events_rx) = mpsc::channel(1);
        let join_handle = driver.monitor_events(events_tx);

        info!("Controller started.");

        loop {
            if let Some(event) = events_rx.recv().await {
                info!(event = format!("{:?}", event), "Received event.");

                if let Err(e) = match event {
                    Event::AssignSong { song, slot } => player.assign_song(song, slot),
                    Event::RemoveSong { slot } => player.remove_song(slot),
                    Event::ActivateSlot { slot } => player.activate_slot(slot),
                    Event::DeactivateSlot { slot } => player.deactivate_slot(slot),
                    Event::PlaySlot { slot } => player.play_slot(slot),
                    Event::StopSlot { slot } => player.stop_slot(slot),
                    Event::TogglePlaySlot { slot } => player.toggle_play_slot(slot),
                    Event::SetTempo { tempo_bpm, slot } => player.set_tempo(tempo_bpm, slot),
                    Event::SetVolume { volume, slot } => player.set_volume(volume, slot),
                    Event::ToggleMute { slot } => player.toggle_mute(slot),
                    Event::ToggleSolo { slot } => player.toggle_solo(slot),
                    Event::SetLooped { looped, slot } => player.set_looped(looped, slot),
                    Event::SeekTo {
                        position_beats,
                        slot,
                    } => player.seek_to(position_beats, slot),
                    Event::ToggleMasterPlay => player.toggle_master_play(),
                    Event::StartMaster => player.start_master(),
                    Event::StopMaster => player.stop_master(),
                    Event::SetMasterVolume(volume) => player.set_master_volume(volume),
                    Event::SetTempoMultiplier(multiplier) => {
                        player.set_tempo_multiplier(multiplier)
                    }
                    Event::SetPlaybackMode(mode) => player.set_playback_mode(mode),
                    Event::SetReferenceTempo(tempo_bpm) => player.set_reference_tempo(tempo_bpm),
                    Event::CreateSession(id) => player.create_session(&id),
                    Event::LoadSession(id) => player.load_session(&id),
                    Event::SaveSession => player.save_session(),
                    Event::DeleteSession(id) => player.delete_session(&id),
                } {
                    error!("Error talking to player: {}", e);
                }
            } else {
                info!("Controller closing.");
                if let Err(e) = join_handle.await {
                    error!("Error waiting for event monitor to stop: {}", e);
                }
                return;
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::{error::Error, io, sync::Arc, time::Duration};

    use tokio::{sync::mpsc::Sender, task::JoinHandle};

    use crate::{
        player::Player, session::Session, song::Song, store::MemoryStore, sync::PlaybackMode,
        test::eventually,
    };

    use super::{Driver, Event};

    /// A driver that plays back a scripted sequence of events and closes.
    struct ScriptDriver {
        script: std::sync::Mutex<Option<Vec<Event>>>,
    }

    impl ScriptDriver {
        fn new(script: Vec<Event>) -> ScriptDriver {
            ScriptDriver {
                script: std::sync::Mutex::new(Some(script)),
            }
        }
    }

    impl Driver for ScriptDriver {
        fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
            let script = self
                .script
                .lock()
                .expect("failed to get lock")
                .take()
                .expect("script should only be consumed once");
            tokio::task::spawn_blocking(move || {
                for event in script {
                    events_tx
                        .blocking_send(event)
                        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
                }
                Ok(())
            })
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_controller() -> Result<(), Box<dyn Error>> {
        let player = Arc::new(Player::new(
            Session::new("gig", 3),
            Arc::new(MemoryStore::new()),
        ));
        let song = Arc::new(Song::new("Song 1", 120.0, 16.0)?);

        let driver = Arc::new(ScriptDriver::new(vec![
            Event::AssignSong {
                song: song.clone(),
                slot: 0,
            },
            Event::ActivateSlot { slot: 0 },
            Event::SetVolume {
                volume: 0.5,
                slot: 0,
            },
            Event::ToggleMute { slot: 0 },
            Event::SetPlaybackMode(PlaybackMode::Locked),
            Event::ToggleMasterPlay,
            // Errors are logged, not fatal to the controller.
            Event::PlaySlot { slot: 9 },
            Event::SeekTo {
                position_beats: 4.0,
                slot: 0,
            },
        ]));

        let mut controller = super::Controller::new(player.clone(), driver)?;

        eventually(
            || {
                let snapshot = player.snapshot();
                let slot = &snapshot.slots[0];
                snapshot.master.playing
                    && slot.playing
                    && slot.muted
                    && slot.volume == 0.5
                    && slot.position_beats == 4.0
                    && snapshot.master.mode == "locked"
            },
            "Player never reached the scripted state",
        );

        // The driver script is exhausted, so the controller closes.
        tokio::time::timeout(Duration::from_secs(3), controller.join())
            .await?
            .expect("controller should close cleanly");
        Ok(())
    }
}

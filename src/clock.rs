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
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{info, span, warn, Level};

use crate::error::Error;
use crate::playsync::CancelHandle;
use crate::session::Session;
use crate::snapshot::SessionSnapshot;
use crate::sync;

/// How many tick-cadence snapshots may queue up before the oldest are
/// dropped. Observers only ever care about the latest state.
const SNAPSHOT_BACKLOG: usize = 16;

/// Advances every playing slot by the elapsed wall time. All slots share the
/// same delta and the master tempo/mode group resolved at the start of the
/// tick, so control mutations issued mid-tick apply from the next tick.
///
/// This is a control-plane approximation of time that keeps positions moving
/// between authoritative reports from the rendering collaborator. On a fault
/// the whole tick is skipped and no state changes.
pub fn tick(session: &mut Session, elapsed: Duration) -> Result<(), Error> {
    let master = session.master().clone();
    let elapsed_secs = elapsed.as_secs_f64();

    // Resolve every advance before applying any of them: a fault must leave
    // the session untouched.
    let mut advances: Vec<(usize, f64, bool)> = Vec::new();
    for slot in session.slots() {
        if !slot.is_active() {
            continue;
        }
        let (song, transport) = match (slot.song(), slot.transport()) {
            (Some(song), Some(transport)) => (song, transport),
            _ => continue,
        };
        if !transport.is_playing {
            continue;
        }

        let tempo = match sync::effective_tempo(&master, slot) {
            Some(tempo) => tempo,
            None => continue,
        };
        let position = transport.position_beats + elapsed_secs * tempo / 60.0;
        if !tempo.is_finite() || !position.is_finite() {
            return Err(Error::EngineFault(format!(
                "slot {} resolved to a non-finite position (tempo {}, position {})",
                slot.index(),
                tempo,
                position
            )));
        }

        let length = song.length_beats();
        if position >= length {
            if transport.looped {
                advances.push((slot.index(), position % length, true));
            } else {
                advances.push((slot.index(), length, false));
            }
        } else {
            advances.push((slot.index(), position, true));
        }
    }

    for (index, position_beats, is_playing) in advances {
        let transport = session.transport_mut(index)?;
        transport.position_beats = position_beats;
        transport.is_playing = is_playing;
    }
    Ok(())
}

/// Drives the wall-clock tick loop on a dedicated thread and publishes a
/// snapshot per tick. The audio-rendering collaborator remains the
/// authoritative position source; this loop only fills the gaps between its
/// reports.
pub struct Monitor {
    cancel: CancelHandle,
    join: Option<JoinHandle<()>>,
}

impl Monitor {
    /// Starts monitoring the session at the given cadence. Tick faults are
    /// recorded in the shared fault cell instead of being fatal.
    pub fn start(
        session: Arc<Mutex<Session>>,
        fault: Arc<Mutex<Option<Error>>>,
        interval: Duration,
    ) -> (Monitor, crossbeam_channel::Receiver<SessionSnapshot>) {
        let cancel = CancelHandle::new();
        let (snapshots_tx, snapshots_rx) = crossbeam_channel::bounded(SNAPSHOT_BACKLOG);

        let join = {
            let cancel = cancel.clone();
            thread::spawn(move || {
                let span = span!(Level::INFO, "monitor");
                let _enter = span.enter();
                info!(interval = ?interval, "Monitor started.");

                let mut last = Instant::now();
                loop {
                    if cancel.wait_timeout(interval) {
                        info!("Monitor stopped.");
                        return;
                    }

                    let now = Instant::now();
                    let elapsed = now - last;
                    last = now;

                    let snapshot = {
                        let mut session = session.lock();
                        if let Err(e) = tick(&mut session, elapsed) {
                            warn!(err = %e, "Skipping tick due to fault.");
                            *fault.lock() = Some(e);
                            continue;
                        }
                        SessionSnapshot::capture(&session)
                    };

                    // Observers lagging behind just miss stale snapshots.
                    let _unused = snapshots_tx.try_send(snapshot);
                }
            })
        };

        (
            Monitor {
                cancel,
                join: Some(join),
            },
            snapshots_rx,
        )
    }

    /// Returns true if the monitor has been stopped.
    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Stops the monitor. Immediate and idempotent; no tick fires after this
    /// returns and the loop thread is joined.
    pub fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                warn!("Error waiting for the monitor thread to stop.");
            }
        }
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.stop();
    }
}

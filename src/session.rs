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
use std::sync::Arc;

use tracing::info;

use crate::error::Error;
use crate::song::Song;
use crate::sync::PlaybackMode;

/// The default number of slots in a session.
pub const DEFAULT_CAPACITY: usize = 6;

/// The default slot tempo in beats per minute.
pub const DEFAULT_TEMPO_BPM: f64 = 120.0;

/// The default slot and master volume.
pub const DEFAULT_VOLUME: f64 = 0.8;

/// The smallest tempo multiplier the master transport will clamp to. The
/// multiplier lives in an open interval above zero, so saturating inputs
/// need a concrete floor.
pub const MIN_TEMPO_MULTIPLIER: f64 = 0.001;

/// The smallest tempo, in beats per minute, a slot or the reference will
/// clamp to.
pub const MIN_TEMPO_BPM: f64 = 0.001;

/// The per-slot transport state.
#[derive(Debug, Clone, PartialEq)]
pub struct Transport {
    /// Whether the slot is currently advancing.
    pub is_playing: bool,
    /// The slot's own tempo in beats per minute. Used directly in independent
    /// mode and recorded as the nominal tempo for ratio mode.
    pub tempo_bpm: f64,
    /// The slot volume, in [0, 1].
    pub volume: f64,
    /// Whether the slot is muted. Mute always overrides solo.
    pub is_muted: bool,
    /// Whether the slot is soloed.
    pub is_solo: bool,
    /// Whether the slot loops when it reaches the end of its song.
    pub looped: bool,
    /// The playback position in beats. Never negative.
    pub position_beats: f64,
}

impl Default for Transport {
    fn default() -> Transport {
        Transport {
            is_playing: false,
            tempo_bpm: DEFAULT_TEMPO_BPM,
            volume: DEFAULT_VOLUME,
            is_muted: false,
            is_solo: false,
            looped: false,
            position_beats: 0.0,
        }
    }
}

/// The contents of a slot. An empty slot has no transport: operations that
/// need one fail with SlotEmpty rather than mutating a placeholder.
#[derive(Debug, Clone)]
pub enum SlotContent {
    /// No song assigned.
    Empty,
    /// A song with its own transport state.
    Assigned {
        song: Arc<Song>,
        transport: Transport,
    },
}

/// A fixed playback channel holding at most one song.
#[derive(Debug, Clone)]
pub struct Slot {
    /// The stable index of this slot within the session.
    index: usize,
    /// The slot contents.
    content: SlotContent,
    /// Whether the slot participates in playback at all. Inactive slots never
    /// advance and are never audible.
    active: bool,
}

impl Slot {
    fn new(index: usize) -> Slot {
        Slot {
            index,
            content: SlotContent::Empty,
            active: false,
        }
    }

    /// The stable index of this slot.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Whether this slot is active.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// The slot contents.
    pub fn content(&self) -> &SlotContent {
        &self.content
    }

    /// The assigned song, if any.
    pub fn song(&self) -> Option<&Arc<Song>> {
        match &self.content {
            SlotContent::Empty => None,
            SlotContent::Assigned { song, .. } => Some(song),
        }
    }

    /// The transport state, if a song is assigned.
    pub fn transport(&self) -> Option<&Transport> {
        match &self.content {
            SlotContent::Empty => None,
            SlotContent::Assigned { transport, .. } => Some(transport),
        }
    }

    pub(crate) fn transport_mut(&mut self) -> Option<&mut Transport> {
        match &mut self.content {
            SlotContent::Empty => None,
            SlotContent::Assigned { transport, .. } => Some(transport),
        }
    }
}

/// The master transport overlaid on the slots.
#[derive(Debug, Clone, PartialEq)]
pub struct MasterTransport {
    /// Whether the master transport is playing.
    pub is_playing: bool,
    /// The master volume, in [0, 1].
    pub master_volume: f64,
    /// The tempo multiplier applied in locked and ratio modes. Always positive.
    pub tempo_multiplier: f64,
    /// The synchronization mode.
    pub mode: PlaybackMode,
    /// The anchor tempo for locked and ratio modes. Only ever changed by an
    /// explicit operation, never recomputed.
    pub reference_tempo: f64,
}

impl Default for MasterTransport {
    fn default() -> MasterTransport {
        MasterTransport {
            is_playing: false,
            master_volume: DEFAULT_VOLUME,
            tempo_multiplier: 1.0,
            mode: PlaybackMode::Independent,
            reference_tempo: DEFAULT_TEMPO_BPM,
        }
    }
}

/// The complete in-memory aggregate: a fixed set of slots plus the master
/// transport. All state transitions go through the methods here; the player
/// wraps this in a lock and adds fault surfacing on top.
pub struct Session {
    /// The session id, as known to the store.
    id: String,
    /// The slots. Every index in 0..capacity maps to exactly one slot.
    slots: Vec<Slot>,
    /// The master transport.
    master: MasterTransport,
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Session {:?} ({} slots):", self.id, self.slots.len())?;
        for slot in self.slots.iter() {
            match slot.song() {
                Some(song) => writeln!(f, "  {}: {}", slot.index, song)?,
                None => writeln!(f, "  {}: (empty)", slot.index)?,
            }
        }
        Ok(())
    }
}

impl Session {
    /// Creates a new empty session with the given capacity.
    pub fn new(id: &str, capacity: usize) -> Session {
        Session {
            id: id.to_string(),
            slots: (0..capacity).map(Slot::new).collect(),
            master: MasterTransport::default(),
        }
    }

    /// The session id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// All slots, in index order.
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// The master transport.
    pub fn master(&self) -> &MasterTransport {
        &self.master
    }

    /// Returns the slot at the given index, or InvalidSlotIndex.
    pub fn slot(&self, index: usize) -> Result<&Slot, Error> {
        self.slots.get(index).ok_or(Error::InvalidSlotIndex {
            index,
            capacity: self.slots.len(),
        })
    }

    fn slot_mut(&mut self, index: usize) -> Result<&mut Slot, Error> {
        let capacity = self.slots.len();
        self.slots
            .get_mut(index)
            .ok_or(Error::InvalidSlotIndex { index, capacity })
    }

    /// Returns the transport of the slot at the given index, failing with
    /// InvalidSlotIndex then SlotEmpty, in that order.
    pub(crate) fn transport_mut(&mut self, index: usize) -> Result<&mut Transport, Error> {
        self.slot_mut(index)?
            .transport_mut()
            .ok_or(Error::SlotEmpty(index))
    }

    /// Assigns a song to the slot. The slot's tempo is set to the song's
    /// nominal tempo and the position resets to zero; activation state and the
    /// remaining transport settings are untouched.
    pub fn assign(&mut self, song: Arc<Song>, index: usize) -> Result<(), Error> {
        let slot = self.slot_mut(index)?;
        let mut transport = match &slot.content {
            SlotContent::Empty => Transport::default(),
            SlotContent::Assigned { transport, .. } => transport.clone(),
        };
        transport.tempo_bpm = song.tempo_bpm();
        transport.position_beats = 0.0;

        info!(slot = index, song = song.name(), "Assigned song to slot.");
        slot.content = SlotContent::Assigned { song, transport };
        Ok(())
    }

    /// Removes the song from the slot, deactivating it and resetting its
    /// transport to defaults. Idempotent.
    pub fn remove(&mut self, index: usize) -> Result<(), Error> {
        let slot = self.slot_mut(index)?;
        slot.content = SlotContent::Empty;
        slot.active = false;
        Ok(())
    }

    /// Marks the slot as participating in playback.
    pub fn activate(&mut self, index: usize) -> Result<(), Error> {
        self.slot_mut(index)?.active = true;
        Ok(())
    }

    /// Marks the slot as not participating in playback. Playback stops
    /// synchronously so a deactivated slot never contributes to the next tick.
    pub fn deactivate(&mut self, index: usize) -> Result<(), Error> {
        let slot = self.slot_mut(index)?;
        slot.active = false;
        if let Some(transport) = slot.transport_mut() {
            transport.is_playing = false;
        }
        Ok(())
    }

    /// Sets the anchor tempo for locked and ratio modes, clamped to a
    /// positive value.
    pub fn set_reference_tempo(&mut self, tempo_bpm: f64) -> Result<(), Error> {
        if tempo_bpm.is_nan() {
            return Err(Error::InvalidParameter(
                "reference tempo must be a number".to_string(),
            ));
        }
        self.master.reference_tempo = tempo_bpm.max(MIN_TEMPO_BPM);
        Ok(())
    }

    /// Sets the master volume, clamped into [0, 1].
    pub fn set_master_volume(&mut self, volume: f64) -> Result<(), Error> {
        self.master.master_volume = clamp_volume(volume)?;
        Ok(())
    }

    /// Sets the tempo multiplier, clamped to a positive value.
    pub fn set_tempo_multiplier(&mut self, multiplier: f64) -> Result<(), Error> {
        if multiplier.is_nan() {
            return Err(Error::InvalidParameter(
                "tempo multiplier must be a number".to_string(),
            ));
        }
        self.master.tempo_multiplier = multiplier.max(MIN_TEMPO_MULTIPLIER);
        Ok(())
    }

    /// Sets the synchronization mode. Positions are untouched; the new rate
    /// takes effect at the next tick boundary.
    pub fn set_playback_mode(&mut self, mode: PlaybackMode) {
        info!(mode = %mode, "Switching playback mode.");
        self.master.mode = mode;
    }

    /// Starts the master transport: every active slot with an assigned song
    /// starts playing. Mute state is untouched so muted slots play silently
    /// and can be unmuted live.
    pub fn start_master(&mut self) {
        self.master.is_playing = true;
        for slot in self.slots.iter_mut() {
            if !slot.active {
                continue;
            }
            if let Some(transport) = slot.transport_mut() {
                transport.is_playing = true;
            }
        }
    }

    /// Pauses the master transport: every slot stops playing, positions are
    /// kept.
    pub fn pause_master(&mut self) {
        self.master.is_playing = false;
        for slot in self.slots.iter_mut() {
            if let Some(transport) = slot.transport_mut() {
                transport.is_playing = false;
            }
        }
    }

    /// Stops the master transport: as pause, but every slot's position is
    /// also reset to zero.
    pub fn stop_master(&mut self) {
        self.pause_master();
        for slot in self.slots.iter_mut() {
            if let Some(transport) = slot.transport_mut() {
                transport.position_beats = 0.0;
            }
        }
    }

    /// Toggles the master transport between playing and paused.
    pub fn toggle_master_play(&mut self) {
        if self.master.is_playing {
            self.pause_master();
        } else {
            self.start_master();
        }
    }

    /// Starts playback of a single slot.
    pub fn play_slot(&mut self, index: usize) -> Result<(), Error> {
        self.transport_mut(index)?.is_playing = true;
        Ok(())
    }

    /// Stops playback of a single slot and resets its position. Idempotent.
    pub fn stop_slot(&mut self, index: usize) -> Result<(), Error> {
        let transport = self.transport_mut(index)?;
        transport.is_playing = false;
        transport.position_beats = 0.0;
        Ok(())
    }

    /// Toggles playback of a single slot. Stopping keeps the position, like a
    /// pause, so toggling twice resumes where the slot left off.
    pub fn toggle_play_slot(&mut self, index: usize) -> Result<(), Error> {
        let transport = self.transport_mut(index)?;
        transport.is_playing = !transport.is_playing;
        Ok(())
    }

    /// Sets a slot's own tempo, clamped to a positive value. In independent
    /// mode this changes the rate directly; in locked and ratio modes it
    /// records the nominal tempo used for the ratio computation.
    pub fn set_tempo(&mut self, tempo_bpm: f64, index: usize) -> Result<(), Error> {
        let transport = self.transport_mut(index)?;
        if tempo_bpm.is_nan() {
            return Err(Error::InvalidParameter(
                "slot tempo must be a number".to_string(),
            ));
        }
        transport.tempo_bpm = tempo_bpm.max(MIN_TEMPO_BPM);
        Ok(())
    }

    /// Sets a slot's volume, clamped into [0, 1].
    pub fn set_volume(&mut self, volume: f64, index: usize) -> Result<(), Error> {
        let transport = self.transport_mut(index)?;
        transport.volume = clamp_volume(volume)?;
        Ok(())
    }

    /// Toggles a slot's mute flag.
    pub fn toggle_mute(&mut self, index: usize) -> Result<(), Error> {
        let transport = self.transport_mut(index)?;
        transport.is_muted = !transport.is_muted;
        Ok(())
    }

    /// Toggles a slot's solo flag.
    pub fn toggle_solo(&mut self, index: usize) -> Result<(), Error> {
        let transport = self.transport_mut(index)?;
        transport.is_solo = !transport.is_solo;
        Ok(())
    }

    /// Sets a slot's loop flag.
    pub fn set_looped(&mut self, looped: bool, index: usize) -> Result<(), Error> {
        self.transport_mut(index)?.looped = looped;
        Ok(())
    }

    /// Seeks a slot to the given position in beats, clamped to the song
    /// length. Negative positions are rejected.
    pub fn seek_to(&mut self, position_beats: f64, index: usize) -> Result<(), Error> {
        let length_beats = self
            .slot(index)?
            .song()
            .ok_or(Error::SlotEmpty(index))?
            .length_beats();
        if !position_beats.is_finite() || position_beats < 0.0 {
            return Err(Error::InvalidParameter(format!(
                "seek position must be a non-negative number of beats, got {}",
                position_beats
            )));
        }
        self.transport_mut(index)?.position_beats = position_beats.min(length_beats);
        Ok(())
    }

    /// Returns true if any slot in the session is soloed.
    pub fn any_solo(&self) -> bool {
        self.slots
            .iter()
            .any(|slot| slot.transport().is_some_and(|t| t.is_solo))
    }
}

/// Clamps a volume into [0, 1], rejecting NaN.
fn clamp_volume(volume: f64) -> Result<f64, Error> {
    if volume.is_nan() {
        return Err(Error::InvalidParameter(
            "volume must be a number".to_string(),
        ));
    }
    Ok(volume.clamp(0.0, 1.0))
}

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

/// Typed errors for the control surface. Every control operation validates its
/// inputs synchronously and fails with one of these before mutating any state.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// The slot index is outside the session's fixed capacity.
    #[error("slot index {index} is out of range (session has {capacity} slots)")]
    InvalidSlotIndex { index: usize, capacity: usize },

    /// The operation needs an assigned song, but the slot is empty.
    #[error("slot {0} has no song assigned")]
    SlotEmpty(usize),

    /// Malformed input that clamping does not cover (NaN, negative-where-disallowed).
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The session id is unknown to the store.
    #[error("session {0:?} not found")]
    SessionNotFound(String),

    /// A fault detected during a clock tick, surfaced on the next control call.
    #[error("engine fault: {0}")]
    EngineFault(String),
}

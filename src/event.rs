// src/event.rs

use crate::parameter::ParamId;

/// An event sent from the control thread to the audio thread.
///
/// These events:
/// - are Copy and never allocate
/// - are applied at the next block boundary
/// - are dispatched by the engine exactly once
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Event {
    NoteOn { note: u8, velocity: f32 },

    NoteOff { note: u8 },

    SetParam { param: ParamId, value: f32 },

    /// Polyphonic key pressure (0-1) for a held note.
    Aftertouch { note: u8, pressure: f32 },

    /// Release every sounding voice.
    AllNotesOff,
}

// src/voice_allocator.rs

use crate::parameter::ParamId;
use crate::voice::{JunoVoice, VoiceId};

/// Allocates and manages polyphonic voices.
///
/// Responsibilities:
/// - map notes to voices
/// - steal the quietest voice when all are busy
/// - fan parameter changes out to every voice
///
/// Does NOT allocate after construction.
pub struct VoiceAllocator {
    voices: Vec<JunoVoice>,
}

impl VoiceAllocator {
    pub fn new(max_voices: usize, sample_rate: f32) -> Self {
        let voices = (0..max_voices)
            .map(|id| JunoVoice::new(id, sample_rate))
            .collect();
        Self { voices }
    }

    /// Allocate a voice for a note-on event.
    ///
    /// Returns the allocated voice id, or `None` when there are no voices.
    pub fn note_on(&mut self, note: u8, velocity: f32) -> Option<VoiceId> {
        let id = self.free_voice().or_else(|| self.quietest_voice())?;
        self.voices[id].note_on(note, velocity);
        Some(id)
    }

    /// Release every gated voice holding `note`.
    pub fn note_off(&mut self, note: u8) -> usize {
        self.voices
            .iter_mut()
            .map(|v| v.note_off(note))
            .filter(|released| *released)
            .count()
    }

    /// Apply key pressure to every gated voice holding `note`.
    pub fn aftertouch(&mut self, note: u8, pressure: f32) -> usize {
        self.voices
            .iter_mut()
            .map(|v| v.aftertouch(note, pressure))
            .filter(|applied| *applied)
            .count()
    }

    pub fn release_all(&mut self) {
        for voice in &mut self.voices {
            voice.release();
        }
    }

    pub fn set_param(&mut self, id: ParamId, value: f32) {
        for voice in &mut self.voices {
            voice.set_param(id, value);
        }
    }

    pub fn reset(&mut self) {
        for voice in &mut self.voices {
            voice.reset();
        }
    }

    /// Sum every voice into one mono sample.
    #[inline]
    pub fn process(&mut self) -> f32 {
        self.voices.iter_mut().map(JunoVoice::process).sum()
    }

    pub fn voices(&self) -> &[JunoVoice] {
        &self.voices
    }

    /// Number of currently active voices.
    pub fn active_count(&self) -> usize {
        self.voices.iter().filter(|v| v.is_active()).count()
    }

    pub fn capacity(&self) -> usize {
        self.voices.len()
    }

    fn free_voice(&self) -> Option<VoiceId> {
        self.voices.iter().position(|v| !v.is_active())
    }

    /// Lowest envelope level wins; ties go to the lowest index.
    fn quietest_voice(&self) -> Option<VoiceId> {
        self.voices
            .iter()
            .enumerate()
            .fold(None, |best: Option<(VoiceId, f32)>, (id, v)| {
                let level = v.envelope_level();
                match best {
                    Some((_, best_level)) if best_level <= level => best,
                    _ => Some((id, level)),
                }
            })
            .map(|(id, _)| id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 48_000.0;

    fn run(alloc: &mut VoiceAllocator, frames: usize) {
        for _ in 0..frames {
            alloc.process();
        }
    }

    #[test]
    fn uses_free_voices_first() {
        let mut alloc = VoiceAllocator::new(4, SR);
        assert_eq!(alloc.note_on(60, 1.0), Some(0));
        assert_eq!(alloc.note_on(64, 1.0), Some(1));
        assert_eq!(alloc.note_on(67, 1.0), Some(2));
        assert_eq!(alloc.active_count(), 3);
    }

    #[test]
    fn steals_the_quietest_voice() {
        let mut alloc = VoiceAllocator::new(2, SR);
        alloc.set_param(ParamId::Attack, 0.001);
        alloc.set_param(ParamId::Release, 1.0);

        alloc.note_on(60, 1.0);
        alloc.note_on(64, 1.0);
        run(&mut alloc, 480);

        // Voice 0 releases and decays below voice 1
        alloc.note_off(60);
        run(&mut alloc, 4_800);
        assert_eq!(alloc.active_count(), 2);

        assert_eq!(alloc.note_on(67, 1.0), Some(0));
        assert_eq!(alloc.voices()[0].note(), Some(67));
        assert_eq!(alloc.voices()[1].note(), Some(64));
    }

    #[test]
    fn steal_ties_go_to_lowest_index() {
        let mut alloc = VoiceAllocator::new(3, SR);
        alloc.note_on(60, 1.0);
        alloc.note_on(62, 1.0);
        alloc.note_on(64, 1.0);
        // All at level zero: nothing processed yet
        assert_eq!(alloc.note_on(65, 1.0), Some(0));
    }

    #[test]
    fn note_off_releases_all_matching_voices() {
        let mut alloc = VoiceAllocator::new(4, SR);
        alloc.note_on(60, 1.0);
        alloc.note_on(60, 0.5);
        alloc.note_on(62, 0.5);
        assert_eq!(alloc.note_off(60), 2);
        assert_eq!(alloc.note_off(60), 0);
    }

    #[test]
    fn aftertouch_follows_held_notes() {
        let mut alloc = VoiceAllocator::new(4, SR);
        alloc.note_on(60, 1.0);
        alloc.note_on(60, 1.0);
        alloc.note_on(64, 1.0);
        assert_eq!(alloc.aftertouch(60, 0.7), 2);
        assert_eq!(alloc.aftertouch(67, 0.7), 0);
        alloc.note_off(64);
        assert_eq!(alloc.aftertouch(64, 0.7), 0);
    }

    #[test]
    fn no_voices_means_no_allocation() {
        let mut alloc = VoiceAllocator::new(0, SR);
        assert_eq!(alloc.note_on(60, 1.0), None);
        assert_eq!(alloc.process(), 0.0);
    }

    #[test]
    fn released_voices_become_free() {
        let mut alloc = VoiceAllocator::new(1, SR);
        alloc.set_param(ParamId::Release, 0.001);
        alloc.note_on(60, 1.0);
        run(&mut alloc, 960);
        alloc.release_all();
        run(&mut alloc, 960);
        assert_eq!(alloc.active_count(), 0);
    }
}

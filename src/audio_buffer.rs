// src/audio_buffer.rs

/// Planar stereo output borrowed from the host callback.
#[derive(Debug)]
pub struct StereoBuffer<'a> {
    pub left: &'a mut [f32],
    pub right: &'a mut [f32],
}

impl<'a> StereoBuffer<'a> {
    /// Wrap two channel slices. Only the common length is rendered.
    #[inline]
    pub fn new(left: &'a mut [f32], right: &'a mut [f32]) -> Self {
        Self { left, right }
    }

    #[inline]
    pub fn frames(&self) -> usize {
        self.left.len().min(self.right.len())
    }

    #[inline]
    pub fn clear(&mut self) {
        self.left.fill(0.0);
        self.right.fill(0.0);
    }

    #[inline]
    pub fn write(&mut self, frame: usize, left: f32, right: f32) {
        self.left[frame] = left;
        self.right[frame] = right;
    }

    /// Absolute peak per channel.
    pub fn peaks(&self) -> [f32; 2] {
        let frames = self.frames();
        let peak = |ch: &[f32]| ch[..frames].iter().fold(0.0_f32, |p, s| p.max(s.abs()));
        [peak(&self.left[..]), peak(&self.right[..])]
    }

    /// Copy into `[L0, R0, L1, R1, ...]`.
    pub fn interleave_into(&self, output: &mut [f32]) {
        let frames = self.frames().min(output.len() / 2);
        for i in 0..frames {
            output[i * 2] = self.left[i];
            output[i * 2 + 1] = self.right[i];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peaks_and_interleave() {
        let mut l = [0.1, -0.5, 0.2];
        let mut r = [0.0, 0.3, -0.9];
        let buf = StereoBuffer::new(&mut l, &mut r);
        assert_eq!(buf.peaks(), [0.5, 0.9]);

        let mut out = [0.0; 6];
        buf.interleave_into(&mut out);
        assert_eq!(out, [0.1, 0.0, -0.5, 0.3, 0.2, -0.9]);
    }

    #[test]
    fn mismatched_lengths_use_shorter_channel() {
        let mut l = [1.0; 4];
        let mut r = [1.0; 2];
        let mut buf = StereoBuffer::new(&mut l, &mut r);
        assert_eq!(buf.frames(), 2);
        buf.clear();
        assert_eq!(buf.peaks(), [0.0, 0.0]);
    }
}

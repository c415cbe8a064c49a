//! Signal summing and channel fan-out.

/*
Summing
=======

The output bus adds every source together at equal level:

    output[i] = a[i] + b[i] + ...

No weighting is applied, so two full-scale sources can clip. The tone and
playback paths both sit well below full scale (gain 0.1), which leaves
plenty of headroom.

Channel fan-out
---------------

The bus renders mono. Devices want interleaved frames, so each mono sample
is copied to every channel of its frame:

    mono:        [a, b, c]
    stereo out:  [a, a, b, b, c, c]
*/

/// Add `input` into `out` sample-by-sample.
#[inline]
pub fn sum_into(out: &mut [f32], input: &[f32]) {
    debug_assert_eq!(out.len(), input.len());

    for (o, &s) in out.iter_mut().zip(input.iter()) {
        *o += s;
    }
}

/// Copy a mono block into an interleaved buffer with `channels` channels.
///
/// `interleaved` must hold at least `mono.len() * channels` samples.
#[inline]
pub fn fan_out(mono: &[f32], interleaved: &mut [f32], channels: usize) {
    debug_assert!(interleaved.len() >= mono.len() * channels);

    for (frame, &sample) in interleaved.chunks_exact_mut(channels).zip(mono.iter()) {
        frame.fill(sample);
    }
}

/// Peak absolute amplitude of a block.
#[inline]
pub fn peak(buffer: &[f32]) -> f32 {
    buffer.iter().fold(0.0f32, |acc, &x| acc.max(x.abs()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sums_sources() {
        let mut out = [0.1, 0.2, -0.3];
        sum_into(&mut out, &[0.1, -0.2, 0.3]);
        assert_eq!(out, [0.2, 0.0, 0.0]);
    }

    #[test]
    fn fans_mono_to_stereo() {
        let mut out = [0.0f32; 6];
        fan_out(&[1.0, 2.0, 3.0], &mut out, 2);
        assert_eq!(out, [1.0, 1.0, 2.0, 2.0, 3.0, 3.0]);
    }

    #[test]
    fn peak_ignores_sign() {
        assert_eq!(peak(&[0.1, -0.4, 0.3]), 0.4);
        assert_eq!(peak(&[]), 0.0);
    }
}

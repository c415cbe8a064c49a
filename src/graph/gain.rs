use crate::{
    dsp::amplify::apply_gain,
    graph::node::{GraphNode, RenderCtx},
};

/// Fixed gain stage, processed in place after its source.
pub struct GainNode {
    gain: f32,
}

impl GainNode {
    pub fn new(gain: f32) -> Self {
        Self {
            gain: gain.max(0.0),
        }
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }
}

impl GraphNode for GainNode {
    fn render_block(&mut self, out: &mut [f32], _ctx: &RenderCtx) {
        apply_gain(out, self.gain);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scales_in_place() {
        let mut node = GainNode::new(0.1);
        let mut buffer = [1.0, -1.0, 0.5];
        node.render_block(&mut buffer, &RenderCtx::new(48_000.0));

        assert!((buffer[0] - 0.1).abs() < 1e-7);
        assert!((buffer[1] + 0.1).abs() < 1e-7);
        assert!((buffer[2] - 0.05).abs() < 1e-7);
    }

    #[test]
    fn negative_gain_is_clamped() {
        assert_eq!(GainNode::new(-2.0).gain(), 0.0);
    }
}

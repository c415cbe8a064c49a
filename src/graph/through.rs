use crate::graph::node::{GraphNode, RenderCtx};

/*
Serial Signal Chain (Through)
=============================

Through connects two nodes in series, passing the output of the first (source)
into the second (effect).

How It Works:
-------------
1. Render the source into the output buffer
2. Pass that buffer through the effect (in-place processing)

  Source renders:  [1.0, 1.0, -1.0, -1.0, ...]   (square wave)
  Gain processes:  ×0.1
  Final output:    [0.1, 0.1, -0.1, -0.1, ...]

Signal Flow Diagram:
--------------------
  Through: [Source] ──→ [Effect] ──→ output

The tone path is exactly one Through: OscNode::square().through(GainNode).
*/

pub struct Through<S, F> {
    source: S,
    filter: F,
}

impl<S, F> Through<S, F> {
    pub fn new(source: S, filter: F) -> Self {
        Self { source, filter }
    }
}

impl<S: GraphNode, F: GraphNode> GraphNode for Through<S, F> {
    fn render_block(&mut self, out: &mut [f32], ctx: &RenderCtx) {
        self.source.render_block(out, ctx);
        self.filter.render_block(out, ctx);
    }

    fn is_active(&self) -> bool {
        self.source.is_active()
    }
}

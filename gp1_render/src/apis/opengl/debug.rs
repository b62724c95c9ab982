use super::context::{GlContext, GlObject};
use crate::resources::{DebugBatch, DebugQueue, DebugRenderer};
use gp1_pointers::SharedHandle;
use std::cell::{Ref, RefCell};

pub struct GlDebugRenderer {
    queue: DebugQueue,
    vbo: GlObject,
    last_batch: RefCell<DebugBatch>,
}

impl GlDebugRenderer {
    pub(crate) fn new(context: &SharedHandle<GlContext>) -> Self {
        Self {
            queue: DebugQueue::default(),
            vbo: GlObject::new(context),
            last_batch: RefCell::default(),
        }
    }

    /// Uploads and draws the queued lines and points. Returns the number of
    /// vertices drawn.
    pub(crate) fn flush(&self) -> usize {
        let batch = self.queue.flush();
        let count = batch.vertex_count();
        if count > 0 {
            let bytes: &[u8] = bytemuck::cast_slice(batch.lines.as_slice());
            let point_bytes: &[u8] = bytemuck::cast_slice(batch.points.as_slice());
            self.vbo.upload(bytes.len() + point_bytes.len());
        }
        *self.last_batch.borrow_mut() = batch;
        count
    }

    /// What the last frame drew.
    pub fn last_batch(&self) -> Ref<'_, DebugBatch> {
        self.last_batch.borrow()
    }
}

impl DebugRenderer for GlDebugRenderer {
    fn queue(&self) -> &DebugQueue {
        &self.queue
    }
}

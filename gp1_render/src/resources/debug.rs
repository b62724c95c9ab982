use bytemuck::{Pod, Zeroable};
use nalgebra::Point3;
use static_assertions::const_assert_eq;
use std::any::Any;
use std::cell::{Cell, RefCell};

#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct DebugVertex {
    pub position: [f32; 3],
    pub color: [f32; 4],
}

const_assert_eq!(size_of::<DebugVertex>(), 28);

#[derive(Debug, Copy, Clone, PartialEq)]
struct Queued<const N: usize> {
    positions: [Point3<f32>; N],
    color: [f32; 4],
    frames_left: u32,
}

impl<const N: usize> Queued<N> {
    fn vertices(&self) -> impl Iterator<Item = DebugVertex> + '_ {
        self.positions.iter().map(|p| DebugVertex {
            position: [p.x, p.y, p.z],
            color: self.color,
        })
    }
}

/// Vertices produced by one [`DebugQueue::flush`].
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DebugBatch {
    /// Pairs of vertices, one pair per line.
    pub lines: Vec<DebugVertex>,
    pub points: Vec<DebugVertex>,
}

impl DebugBatch {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty() && self.points.is_empty()
    }

    pub fn vertex_count(&self) -> usize {
        self.lines.len() + self.points.len()
    }
}

/// Debug lines and points waiting to be drawn. Each entry stays queued for
/// a number of frames.
pub struct DebugQueue {
    lines: RefCell<Vec<Queued<2>>>,
    points: RefCell<Vec<Queued<1>>>,
    default_frames: Cell<u32>,
}

impl Default for DebugQueue {
    fn default() -> Self {
        Self::new(1)
    }
}

impl DebugQueue {
    pub fn new(default_frames: u32) -> Self {
        Self {
            lines: RefCell::default(),
            points: RefCell::default(),
            default_frames: Cell::new(default_frames.max(1)),
        }
    }

    pub fn default_frames(&self) -> u32 {
        self.default_frames.get()
    }

    pub fn set_default_frames(&self, frames: u32) {
        self.default_frames.set(frames.max(1));
    }

    pub fn line(&self, from: Point3<f32>, to: Point3<f32>, color: [f32; 4]) {
        self.line_for(from, to, color, self.default_frames.get());
    }

    /// Queues a line drawn for the next `frames` frames. Zero frames queue
    /// nothing.
    pub fn line_for(&self, from: Point3<f32>, to: Point3<f32>, color: [f32; 4], frames: u32) {
        if frames == 0 {
            return;
        }
        self.lines.borrow_mut().push(Queued {
            positions: [from, to],
            color,
            frames_left: frames,
        });
    }

    pub fn point(&self, at: Point3<f32>, color: [f32; 4]) {
        self.point_for(at, color, self.default_frames.get());
    }

    pub fn point_for(&self, at: Point3<f32>, color: [f32; 4], frames: u32) {
        if frames == 0 {
            return;
        }
        self.points.borrow_mut().push(Queued {
            positions: [at],
            color,
            frames_left: frames,
        });
    }

    /// The twelve edges of the box spanned by `min` and `max`.
    pub fn aabb(&self, min: Point3<f32>, max: Point3<f32>, color: [f32; 4]) {
        let corner = |x: bool, y: bool, z: bool| {
            Point3::new(
                if x { max.x } else { min.x },
                if y { max.y } else { min.y },
                if z { max.z } else { min.z },
            )
        };

        for a in [false, true] {
            for b in [false, true] {
                self.line(corner(false, a, b), corner(true, a, b), color);
                self.line(corner(a, false, b), corner(a, true, b), color);
                self.line(corner(a, b, false), corner(a, b, true), color);
            }
        }
    }

    pub fn line_count(&self) -> usize {
        self.lines.borrow().len()
    }

    pub fn point_count(&self) -> usize {
        self.points.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.line_count() == 0 && self.point_count() == 0
    }

    /// Returns everything queued for this frame and ages the queue by one
    /// frame, dropping expired entries.
    pub fn flush(&self) -> DebugBatch {
        let mut batch = DebugBatch::default();

        let mut lines = self.lines.borrow_mut();
        batch.lines.extend(lines.iter().flat_map(|entry| entry.vertices()));
        age(&mut lines);

        let mut points = self.points.borrow_mut();
        batch.points.extend(points.iter().flat_map(|entry| entry.vertices()));
        age(&mut points);

        batch
    }

    pub fn clear(&self) {
        self.lines.borrow_mut().clear();
        self.points.borrow_mut().clear();
    }
}

fn age<const N: usize>(queue: &mut Vec<Queued<N>>) {
    queue.retain_mut(|entry| {
        entry.frames_left -= 1;
        entry.frames_left > 0
    });
}

pub trait DebugRenderer: Any {
    fn queue(&self) -> &DebugQueue;
}

impl dyn DebugRenderer {
    pub fn line(&self, from: Point3<f32>, to: Point3<f32>, color: [f32; 4]) {
        self.queue().line(from, to, color);
    }

    pub fn point(&self, at: Point3<f32>, color: [f32; 4]) {
        self.queue().point(at, color);
    }

    pub fn aabb(&self, min: Point3<f32>, max: Point3<f32>, color: [f32; 4]) {
        self.queue().aabb(min, max, color);
    }
}

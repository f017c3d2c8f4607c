// src/models.rs
// GPU-side shapes. Every shape is one instance of a six-vertex quad whose
// corners `shapes.wgsl` derives from `vertex_index`, so no vertex buffer
// besides the instances is bound. Instances are drawn in buffer order, which
// keeps the canvas call order for blending.
use bytemuck::{Pod, Zeroable};

/// What an instance's `start`/`end`/`extent` mean.
#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ShapeKind {
    /// `start` and `end` are opposite corners. `extent` is unused.
    Rect = 0,
    /// `start` is the center, `extent` the radius. `end` is unused.
    Circle = 1,
    /// Segment from `start` to `end`, `extent` is half the stroke width.
    Line = 2,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct ShapeInstance {
    pub start: [f32; 2],
    pub end: [f32; 2],
    pub color: [f32; 4], // linear RGBA, straight alpha
    pub extent: f32,
    pub kind: u32,
}

impl ShapeInstance {
    const ATTRIBUTES: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
        0 => Float32x2,
        1 => Float32x2,
        2 => Float32x4,
        3 => Float32,
        4 => Uint32,
    ];

    /// Vertices emitted per instance (two triangles).
    pub const VERTICES: u32 = 6;

    pub fn rect(min: [f32; 2], max: [f32; 2], color: [f32; 4]) -> Self {
        Self { start: min, end: max, color, extent: 0.0, kind: ShapeKind::Rect as u32 }
    }

    pub fn circle(center: [f32; 2], radius: f32, color: [f32; 4]) -> Self {
        Self { start: center, end: center, color, extent: radius, kind: ShapeKind::Circle as u32 }
    }

    pub fn line(from: [f32; 2], to: [f32; 2], width: f32, color: [f32; 4]) -> Self {
        Self { start: from, end: to, color, extent: width * 0.5, kind: ShapeKind::Line as u32 }
    }

    pub fn kind(&self) -> Option<ShapeKind> {
        match self.kind {
            0 => Some(ShapeKind::Rect),
            1 => Some(ShapeKind::Circle),
            2 => Some(ShapeKind::Line),
            _ => None,
        }
    }

    pub fn layout<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

// src/canvas.rs
use bevy_color::Srgba;
use glam::Vec2;

/// A 2D drawing surface in pixel coordinates, origin top-left, y down.
///
/// Colors carry their own alpha and are composited over whatever the
/// surface already holds; nothing here clears the surface.
pub trait Canvas {
    /// Fills the axis-aligned rectangle spanned by `min` and `max`.
    fn fill_rect(&mut self, min: Vec2, max: Vec2, color: Srgba);

    fn fill_circle(&mut self, center: Vec2, radius: f32, color: Srgba);

    /// Strokes a straight segment `width` pixels wide.
    fn stroke_line(&mut self, from: Vec2, to: Vec2, width: f32, color: Srgba);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DrawCommand {
    FillRect { min: Vec2, max: Vec2, color: Srgba },
    FillCircle { center: Vec2, radius: f32, color: Srgba },
    StrokeLine { from: Vec2, to: Vec2, width: f32, color: Srgba },
}

/// Canvas that only remembers what it was asked to draw.
#[derive(Debug, Default, Clone)]
pub struct CommandRecorder {
    pub commands: Vec<DrawCommand>,
}

impl CommandRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    pub fn lines(&self) -> impl Iterator<Item = &DrawCommand> {
        self.commands
            .iter()
            .filter(|command| matches!(command, DrawCommand::StrokeLine { .. }))
    }

    pub fn circles(&self) -> impl Iterator<Item = &DrawCommand> {
        self.commands
            .iter()
            .filter(|command| matches!(command, DrawCommand::FillCircle { .. }))
    }
}

impl Canvas for CommandRecorder {
    fn fill_rect(&mut self, min: Vec2, max: Vec2, color: Srgba) {
        self.commands.push(DrawCommand::FillRect { min, max, color });
    }

    fn fill_circle(&mut self, center: Vec2, radius: f32, color: Srgba) {
        self.commands.push(DrawCommand::FillCircle { center, radius, color });
    }

    fn stroke_line(&mut self, from: Vec2, to: Vec2, width: f32, color: Srgba) {
        self.commands.push(DrawCommand::StrokeLine { from, to, width, color });
    }
}

// src/batch.rs
use bevy_color::{ColorToComponents, LinearRgba, Srgba};
use glam::Vec2;

use crate::canvas::Canvas;
use crate::models::ShapeInstance;

/// Narrowest stroke that rasterizes reliably. Thinner strokes are drawn at
/// this width with their alpha scaled down to the same coverage.
const MIN_STROKE_WIDTH: f32 = 1.0;

/// GPU-ready shapes for one frame, filled through [`Canvas`].
///
/// Shapes are kept in call order and drawn in that order, so blending matches
/// the sequence the field issued them in.
#[derive(Debug, Default)]
pub struct FrameBatch {
    pub shapes: Vec<ShapeInstance>,
}

impl FrameBatch {
    pub fn with_capacity(circles: usize, lines: usize) -> Self {
        Self {
            shapes: Vec::with_capacity(circles + lines + 1),
        }
    }

    pub fn clear(&mut self) {
        self.shapes.clear();
    }
}

fn linear(color: Srgba) -> [f32; 4] {
    LinearRgba::from(color).to_f32_array()
}

impl Canvas for FrameBatch {
    fn fill_rect(&mut self, min: Vec2, max: Vec2, color: Srgba) {
        self.shapes
            .push(ShapeInstance::rect(min.to_array(), max.to_array(), linear(color)));
    }

    fn fill_circle(&mut self, center: Vec2, radius: f32, color: Srgba) {
        self.shapes
            .push(ShapeInstance::circle(center.to_array(), radius, linear(color)));
    }

    fn stroke_line(&mut self, from: Vec2, to: Vec2, width: f32, color: Srgba) {
        if from.distance_squared(to) < f32::EPSILON || width <= 0.0 || color.alpha <= 0.0 {
            return;
        }

        let coverage = (width / MIN_STROKE_WIDTH).min(1.0);
        let mut rgba = linear(color);
        rgba[3] *= coverage;

        self.shapes.push(ShapeInstance::line(
            from.to_array(),
            to.to_array(),
            width.max(MIN_STROKE_WIDTH),
            rgba,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ShapeKind;

    fn accent(alpha: f32) -> Srgba {
        Srgba {
            alpha,
            ..Srgba::rgb_u8(205, 164, 94)
        }
    }

    #[test]
    fn rect_keeps_its_corners() {
        let mut batch = FrameBatch::default();
        batch.fill_rect(Vec2::ZERO, Vec2::new(800.0, 600.0), accent(0.1));
        assert_eq!(batch.shapes.len(), 1);
        let rect = batch.shapes[0];
        assert_eq!(rect.kind(), Some(ShapeKind::Rect));
        assert_eq!(rect.end, [800.0, 600.0]);
        assert!((rect.color[3] - 0.1).abs() < 1e-6);
    }

    #[test]
    fn thin_lines_trade_width_for_alpha() {
        let mut batch = FrameBatch::default();
        batch.stroke_line(Vec2::ZERO, Vec2::new(10.0, 0.0), 0.4, accent(0.15));

        let line = batch.shapes[0];
        assert_eq!(line.kind(), Some(ShapeKind::Line));
        assert!((line.extent - MIN_STROKE_WIDTH * 0.5).abs() < 1e-6);
        assert!((line.color[3] - 0.06).abs() < 1e-6);
    }

    #[test]
    fn degenerate_lines_are_dropped() {
        let mut batch = FrameBatch::default();
        batch.stroke_line(Vec2::ONE, Vec2::ONE, 0.8, accent(0.15));
        batch.stroke_line(Vec2::ZERO, Vec2::ONE, 0.0, accent(0.15));
        assert!(batch.shapes.is_empty());
    }

    #[test]
    fn shapes_keep_call_order() {
        let mut batch = FrameBatch::default();
        batch.fill_rect(Vec2::ZERO, Vec2::splat(100.0), accent(0.1));
        batch.fill_circle(Vec2::splat(10.0), 3.0, accent(0.6));
        batch.stroke_line(Vec2::splat(10.0), Vec2::splat(50.0), 0.8, accent(0.15));
        batch.fill_circle(Vec2::splat(50.0), 3.0, accent(0.6));

        let kinds: Vec<_> = batch.shapes.iter().filter_map(ShapeInstance::kind).collect();
        assert_eq!(
            kinds,
            vec![ShapeKind::Rect, ShapeKind::Circle, ShapeKind::Line, ShapeKind::Circle]
        );
    }

    #[test]
    fn circles_keep_color_in_linear_space() {
        let mut batch = FrameBatch::default();
        batch.fill_circle(Vec2::new(3.0, 4.0), 2.5, accent(0.6));
        let instance = batch.shapes[0];
        assert_eq!(instance.start, [3.0, 4.0]);
        assert_eq!(instance.extent, 2.5);
        assert!(instance.color[0] < 205.0 / 255.0);
        assert!((instance.color[3] - 0.6).abs() < 1e-6);

        batch.clear();
        assert!(batch.shapes.is_empty());
    }
}

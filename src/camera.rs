// src/camera.rs
// Logical-pixel projection: (0, 0) is the top-left corner of the surface, y grows
// downwards, and one unit is one CSS / logical pixel whatever the display density.
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2};

// Uniform shared by every pipeline that draws into the trail texture.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct CameraUniform {
    pub view_proj: [[f32; 4]; 4],
    pub needs_srgb_output_conversion: u32, // 0 for false, 1 for true
    pub _padding: [u32; 3],                // pad to a 16 byte boundary, 80 bytes total
}

#[derive(Debug)]
pub struct Camera {
    /// Surface size in physical pixels.
    pub viewport_size: Vec2,
    /// Physical pixels per logical pixel.
    pub scale_factor: f32,
}

impl Camera {
    pub fn new(viewport_width: u32, viewport_height: u32) -> Self {
        Self {
            viewport_size: Vec2::new(viewport_width as f32, viewport_height as f32),
            scale_factor: 1.0,
        }
    }

    /// Call when the surface changes size. Zero-sized viewports are ignored.
    pub fn update_viewport(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.viewport_size = Vec2::new(width as f32, height as f32);
        }
    }

    /// Non-positive or non-finite factors are ignored.
    pub fn set_scale_factor(&mut self, scale_factor: f64) {
        if scale_factor.is_finite() && scale_factor > 0.0 {
            self.scale_factor = scale_factor as f32;
        }
    }

    /// The surface measured in logical pixels.
    pub fn logical_size(&self) -> Vec2 {
        (self.viewport_size / self.scale_factor).max(Vec2::ONE)
    }

    pub fn uniform(&self, needs_srgb_output_conversion: bool) -> CameraUniform {
        CameraUniform {
            view_proj: self.build_view_projection_matrix().to_cols_array_2d(),
            needs_srgb_output_conversion: needs_srgb_output_conversion as u32,
            _padding: [0; 3],
        }
    }

    /// Maps logical pixels to normalized device coordinates.
    pub fn build_view_projection_matrix(&self) -> Mat4 {
        let size = self.logical_size();
        // top = 0 and bottom = height flips y so that screen-down is NDC-down.
        Mat4::orthographic_rh(0.0, size.x, size.y, 0.0, -1.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec4, Vec4Swizzles};

    impl Camera {
        fn screen_to_ndc(&self, screen: Vec2) -> Vec2 {
            let clip = self.build_view_projection_matrix() * Vec4::new(screen.x, screen.y, 0.0, 1.0);
            clip.xy() / clip.w
        }
    }

    fn assert_close(a: Vec2, b: Vec2) {
        assert!(a.abs_diff_eq(b, 1e-5), "{a} != {b}");
    }

    #[test]
    fn corners_map_to_ndc_corners() {
        let camera = Camera::new(800, 600);
        assert_close(camera.screen_to_ndc(Vec2::ZERO), Vec2::new(-1.0, 1.0));
        assert_close(camera.screen_to_ndc(Vec2::new(800.0, 600.0)), Vec2::new(1.0, -1.0));
        assert_close(camera.screen_to_ndc(Vec2::new(400.0, 300.0)), Vec2::ZERO);
    }

    #[test]
    fn logical_corner_maps_to_ndc_corner_on_dense_displays() {
        let mut camera = Camera::new(1600, 1200);
        camera.set_scale_factor(2.0);
        assert_eq!(camera.logical_size(), Vec2::new(800.0, 600.0));
        assert_close(camera.screen_to_ndc(Vec2::new(800.0, 600.0)), Vec2::new(1.0, -1.0));
        assert_close(camera.screen_to_ndc(Vec2::new(400.0, 300.0)), Vec2::ZERO);

        camera.set_scale_factor(0.0);
        assert_eq!(camera.scale_factor, 2.0);
    }

    #[test]
    fn zero_resize_keeps_previous_viewport() {
        let mut camera = Camera::new(800, 600);
        camera.update_viewport(0, 300);
        assert_eq!(camera.viewport_size, Vec2::new(800.0, 600.0));
        camera.update_viewport(1024, 768);
        assert_eq!(camera.viewport_size, Vec2::new(1024.0, 768.0));
    }

    #[test]
    fn uniform_is_eighty_bytes() {
        assert_eq!(std::mem::size_of::<CameraUniform>(), 80);
        assert_eq!(Camera::new(2, 2).uniform(true).needs_srgb_output_conversion, 1);
    }
}

// src/host.rs
use std::sync::Arc;

use winit::dpi::PhysicalSize;
use winit::window::Window;

/// Converts a physical surface size to the logical (CSS) pixels the field
/// lives in, rounding to the nearest pixel.
pub fn logical_extent(physical: PhysicalSize<u32>, scale_factor: f64) -> (u32, u32) {
    let logical = physical.to_logical::<f64>(scale_factor);
    (logical.width.round() as u32, logical.height.round() as u32)
}

/// Handle to one armed per-frame callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameTicket(pub u64);

/// What the animator needs from the environment it is mounted in.
pub trait FrameHost {
    /// Arms the next per-frame callback.
    fn request_frame(&mut self) -> FrameTicket;

    /// Disarms a callback armed by `request_frame`. Unknown tickets are ignored.
    fn cancel_frame(&mut self, ticket: FrameTicket);

    /// Stops delivering resize notifications.
    fn detach_resize_listener(&mut self);
}

/// `FrameHost` backed by a winit window: frames are redraw requests.
#[derive(Debug, Default)]
pub struct WindowHost {
    window: Option<Arc<Window>>,
    armed: Option<FrameTicket>,
    issued: u64,
    listening_for_resize: bool,
}

impl WindowHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds the host to `window` and starts listening for resizes.
    pub fn attach(&mut self, window: Arc<Window>) {
        self.window = Some(window);
        self.listening_for_resize = true;
    }

    pub fn is_listening_for_resize(&self) -> bool {
        self.listening_for_resize
    }

    /// Consumes the armed ticket, if any. Called when a redraw arrives; a
    /// redraw without an armed ticket must not step the animation.
    pub fn take_armed_frame(&mut self) -> Option<FrameTicket> {
        self.armed.take()
    }

    fn next_ticket(&mut self) -> FrameTicket {
        self.issued += 1;
        FrameTicket(self.issued)
    }
}

impl FrameHost for WindowHost {
    fn request_frame(&mut self) -> FrameTicket {
        let ticket = self.next_ticket();
        self.armed = Some(ticket);
        if let Some(window) = &self.window {
            window.request_redraw();
        }
        ticket
    }

    fn cancel_frame(&mut self, ticket: FrameTicket) {
        if self.armed == Some(ticket) {
            self.armed = None;
        }
    }

    fn detach_resize_listener(&mut self) {
        self.listening_for_resize = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FieldConfig;
    use crate::field::NeuronField;
    use glam::Vec2;
    use rand::{SeedableRng, rngs::StdRng};

    #[test]
    fn dense_displays_report_logical_bounds() {
        assert_eq!(logical_extent(PhysicalSize::new(2560, 1440), 2.0), (1280, 720));
        assert_eq!(logical_extent(PhysicalSize::new(1001, 751), 1.5), (667, 501));
        assert_eq!(logical_extent(PhysicalSize::new(800, 600), 1.0), (800, 600));

        let mut rng = StdRng::seed_from_u64(3);
        let (width, height) = logical_extent(PhysicalSize::new(2560, 1440), 2.0);
        let field = NeuronField::seeded(FieldConfig::default(), width, height, &mut rng);
        assert_eq!(field.bounds(), Vec2::new(1280.0, 720.0));
        assert!(field.nodes().iter().all(|node| {
            node.position.x < 1280.0 && node.position.y < 720.0
        }));
    }

    #[test]
    fn cancel_disarms_only_the_matching_ticket() {
        let mut host = WindowHost::new();
        let stale = host.request_frame();
        let current = host.request_frame();
        assert_ne!(stale, current);

        host.cancel_frame(stale);
        assert_eq!(host.take_armed_frame(), Some(current));
        assert_eq!(host.take_armed_frame(), None);

        let ticket = host.request_frame();
        host.cancel_frame(ticket);
        assert_eq!(host.take_armed_frame(), None);
    }

    #[test]
    fn detaching_stops_resize_delivery() {
        let mut host = WindowHost::new();
        host.listening_for_resize = true;
        host.detach_resize_listener();
        assert!(!host.is_listening_for_resize());
    }
}

// src/animator.rs
use crate::canvas::Canvas;
use crate::field::NeuronField;
use crate::host::{FrameHost, FrameTicket};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimatorState {
    Running,
    Stopped,
}

/// Drives a [`NeuronField`] from host frame callbacks until torn down.
#[derive(Debug)]
pub struct Animator {
    field: NeuronField,
    state: AnimatorState,
    pending_frame: Option<FrameTicket>,
    frames: u64,
}

impl Animator {
    /// Takes ownership of `field` and arms the first frame.
    pub fn mount(field: NeuronField, host: &mut impl FrameHost) -> Self {
        let bounds = field.bounds();
        log::info!(
            "Mounted neuron field: {} nodes on a {}x{} surface",
            field.len(),
            bounds.x,
            bounds.y
        );

        Self {
            field,
            state: AnimatorState::Running,
            pending_frame: Some(host.request_frame()),
            frames: 0,
        }
    }

    pub fn state(&self) -> AnimatorState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == AnimatorState::Running
    }

    pub fn field(&self) -> &NeuronField {
        &self.field
    }

    /// Frames stepped since mount.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn pending_frame(&self) -> Option<FrameTicket> {
        self.pending_frame
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if !self.is_running() {
            log::warn!("Ignoring resize to {width}x{height} after teardown");
            return;
        }
        log::debug!("Neuron field resized to {width}x{height}");
        self.field.resize(width, height);
    }

    /// Per-frame callback. Steps and draws the field, then re-arms itself.
    /// Returns `false` without touching anything once stopped.
    pub fn frame(&mut self, canvas: &mut impl Canvas, host: &mut impl FrameHost) -> bool {
        if !self.is_running() {
            return false;
        }
        self.field.step(canvas);
        self.frames += 1;
        log::trace!("Stepped frame {}", self.frames);

        self.pending_frame = Some(host.request_frame());
        true
    }

    pub fn teardown(&mut self, host: &mut impl FrameHost) {
        if !self.is_running() {
            log::warn!("Neuron field already torn down");
            return;
        }
        self.state = AnimatorState::Stopped;
        if let Some(ticket) = self.pending_frame.take() {
            host.cancel_frame(ticket);
        }
        host.detach_resize_listener();
        log::info!("Neuron field torn down after {} frames", self.frames);
    }
}

//! The simulated field of pulsing neurons and the signal lines between them.

pub mod topology;

use std::f32::consts::TAU;

use glam::Vec2;
use rand::Rng;

use crate::canvas::Canvas;
use crate::config::FieldConfig;

/// Position of a node in its field's arena.
pub type NodeIndex = usize;

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub position: Vec2,
    pub velocity: Vec2,
    /// Base draw radius before pulsing.
    pub radius: f32,
    /// Pulse accumulator in radians. Never wrapped, only fed to `sin`.
    pub phase: f32,
    /// Nearest nodes at mount time, closest first. Fixed for the node's lifetime.
    pub neighbors: Vec<NodeIndex>,
}

impl Node {
    pub fn new(position: Vec2, velocity: Vec2, radius: f32, phase: f32) -> Self {
        Self {
            position,
            velocity,
            radius,
            phase,
            neighbors: Vec::new(),
        }
    }

    fn random(rng: &mut impl Rng, bounds: Vec2, config: &FieldConfig) -> Self {
        let speed = config.max_speed;
        Self::new(
            Vec2::new(sample(rng, 0.0, bounds.x), sample(rng, 0.0, bounds.y)),
            Vec2::new(sample(rng, -speed, speed), sample(rng, -speed, speed)),
            sample(rng, config.radius_min, config.radius_max),
            sample(rng, 0.0, TAU),
        )
    }

    /// Scale applied to `radius` when drawing, in [0.5, 1.5].
    pub fn pulse(&self) -> f32 {
        self.phase.sin() * 0.5 + 1.0
    }

    fn advance(&mut self, phase_step: f32) {
        self.position += self.velocity;
        self.phase += phase_step;
    }

    /// Turns the node around on any axis where it left `[0, bounds]`.
    /// The position is left as is; the next advance brings it back.
    fn reflect(&mut self, bounds: Vec2) {
        if self.position.x < 0.0 || self.position.x > bounds.x {
            self.velocity.x = -self.velocity.x;
        }
        if self.position.y < 0.0 || self.position.y > bounds.y {
            self.velocity.y = -self.velocity.y;
        }
    }
}

/// Uniform sample from `[low, high)`, or `low` when the range is empty.
fn sample(rng: &mut impl Rng, low: f32, high: f32) -> f32 {
    if high > low {
        rng.random_range(low..high)
    } else {
        low
    }
}

/// Strength in [0, 1] of the pulse travelling along a link of length `distance`.
pub fn signal_strength(phase: f32, distance: f32, wavelength: f32) -> f32 {
    (phase - distance / wavelength).sin() * 0.5 + 0.5
}

#[derive(Debug, Clone)]
pub struct NeuronField {
    nodes: Vec<Node>,
    bounds: Vec2,
    config: FieldConfig,
}

impl NeuronField {
    /// Scatters `config.node_count` nodes over a `width` x `height` surface
    /// and links each to its nearest neighbors.
    pub fn seeded(config: FieldConfig, width: u32, height: u32, rng: &mut impl Rng) -> Self {
        let bounds = Vec2::new(width as f32, height as f32);
        let nodes = (0..config.node_count)
            .map(|_| Node::random(rng, bounds, &config))
            .collect();
        Self::from_nodes(config, nodes, width, height)
    }

    /// Builds a field from explicit nodes. Any existing neighbor lists are replaced.
    pub fn from_nodes(config: FieldConfig, mut nodes: Vec<Node>, width: u32, height: u32) -> Self {
        let positions: Vec<Vec2> = nodes.iter().map(|node| node.position).collect();
        let adjacency = topology::nearest_neighbors(&positions, config.max_neighbors);
        for (node, neighbors) in nodes.iter_mut().zip(adjacency) {
            node.neighbors = neighbors;
        }

        Self {
            nodes,
            bounds: Vec2::new(width as f32, height as f32),
            config,
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Current surface size used for reflection and the fade fill.
    pub fn bounds(&self) -> Vec2 {
        self.bounds
    }

    pub fn config(&self) -> &FieldConfig {
        &self.config
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.bounds = Vec2::new(width as f32, height as f32);
    }

    /// Advances every node by one frame and draws the result onto `canvas`.
    pub fn step(&mut self, canvas: &mut impl Canvas) {
        let palette = &self.config.palette;
        canvas.fill_rect(Vec2::ZERO, self.bounds, palette.fade());

        for node in &mut self.nodes {
            node.advance(self.config.phase_step);
            node.reflect(self.bounds);
        }

        let node_color = palette.node();
        for node in &self.nodes {
            canvas.fill_circle(node.position, node.radius * node.pulse(), node_color);

            for &neighbor in &node.neighbors {
                let other = self.nodes[neighbor].position;
                let distance = node.position.distance(other);
                if distance >= self.config.link_range {
                    continue;
                }

                let signal = signal_strength(node.phase, distance, self.config.signal_wavelength);
                canvas.stroke_line(
                    node.position,
                    other,
                    palette.link_width * signal,
                    palette.link(signal),
                );
            }
        }
    }
}

use neuronfield::FieldConfig;
use neuronfield::animator::{Animator, AnimatorState};
use neuronfield::canvas::{CommandRecorder, DrawCommand};
use neuronfield::field::NeuronField;
use neuronfield::host::{FrameHost, FrameTicket};
use rand::SeedableRng;
use rand::rngs::StdRng;

/// Host that arms frames on request and runs them when told to.
#[derive(Default)]
struct ManualHost {
    armed: Option<FrameTicket>,
    issued: u64,
    resize_listener: bool,
}

impl ManualHost {
    fn listening() -> Self {
        Self {
            resize_listener: true,
            ..Self::default()
        }
    }

    /// Delivers the armed frame, if any. Returns whether one was delivered.
    fn tick(&mut self, animator: &mut Animator, canvas: &mut CommandRecorder) -> bool {
        if self.armed.take().is_none() {
            return false;
        }
        animator.frame(canvas, self)
    }
}

impl FrameHost for ManualHost {
    fn request_frame(&mut self) -> FrameTicket {
        self.issued += 1;
        let ticket = FrameTicket(self.issued);
        self.armed = Some(ticket);
        ticket
    }

    fn cancel_frame(&mut self, ticket: FrameTicket) {
        if self.armed == Some(ticket) {
            self.armed = None;
        }
    }

    fn detach_resize_listener(&mut self) {
        self.resize_listener = false;
    }
}

fn mount(seed: u64, width: u32, height: u32, host: &mut ManualHost) -> Animator {
    let mut rng = StdRng::seed_from_u64(seed);
    let field = NeuronField::seeded(FieldConfig::default(), width, height, &mut rng);
    Animator::mount(field, host)
}

#[test]
fn hundred_frames_stay_on_the_surface() {
    let (width, height) = (800.0, 600.0);
    let mut host = ManualHost::listening();
    let mut animator = mount(2024, 800, 600, &mut host);
    let mut canvas = CommandRecorder::new();

    for _ in 0..100 {
        assert!(host.tick(&mut animator, &mut canvas));
        for node in animator.field().nodes() {
            let p = node.position;
            assert!(p.is_finite());
            assert!((-1.0..=width + 1.0).contains(&p.x), "x out of range: {p}");
            assert!((-1.0..=height + 1.0).contains(&p.y), "y out of range: {p}");
        }
    }

    assert_eq!(animator.frames(), 100);
    assert_eq!(animator.field().len(), 30);
    // One fade fill and one circle per node each frame.
    let fills = canvas
        .commands
        .iter()
        .filter(|c| matches!(c, DrawCommand::FillRect { .. }))
        .count();
    assert_eq!(fills, 100);
    assert_eq!(canvas.circles().count(), 100 * 30);
}

#[test]
fn same_seed_same_animation() {
    let mut first_host = ManualHost::listening();
    let mut second_host = ManualHost::listening();
    let mut first = mount(99, 1024, 768, &mut first_host);
    let mut second = mount(99, 1024, 768, &mut second_host);
    let mut first_canvas = CommandRecorder::new();
    let mut second_canvas = CommandRecorder::new();

    for _ in 0..20 {
        first_host.tick(&mut first, &mut first_canvas);
        second_host.tick(&mut second, &mut second_canvas);
    }
    assert_eq!(first_canvas.commands, second_canvas.commands);
}

#[test]
fn nodes_stranded_by_a_shrink_hold_their_ground() {
    let mut host = ManualHost::listening();
    let mut animator = mount(17, 800, 600, &mut host);
    let mut canvas = CommandRecorder::new();
    host.tick(&mut animator, &mut canvas);

    animator.resize(400, 300);
    let before: Vec<f32> = animator
        .field()
        .nodes()
        .iter()
        .map(|node| node.position.x)
        .collect();
    for _ in 0..50 {
        host.tick(&mut animator, &mut canvas);
    }

    // Flip-only reflection: a node outside the new bounds turns around every
    // frame, so it jitters in place instead of drifting away.
    let stranded = before.iter().filter(|x| **x > 401.0).count();
    assert!(stranded > 0, "seed should leave some nodes outside");
    for (x, node) in before.iter().zip(animator.field().nodes()) {
        if *x > 401.0 {
            assert!((node.position.x - x).abs() <= 0.5 + 1e-3);
        }
    }
}

#[test]
fn teardown_stops_the_loop() {
    let mut host = ManualHost::listening();
    let mut animator = mount(5, 800, 600, &mut host);
    let mut canvas = CommandRecorder::new();
    host.tick(&mut animator, &mut canvas);

    animator.teardown(&mut host);
    assert_eq!(animator.state(), AnimatorState::Stopped);
    assert!(!host.resize_listener);

    let nodes = animator.field().nodes().to_vec();
    let issued = host.issued;
    canvas.clear();

    // The armed frame was cancelled, so nothing is delivered.
    assert!(!host.tick(&mut animator, &mut canvas));
    // A stray callback does nothing either.
    assert!(!animator.frame(&mut canvas, &mut host));

    assert_eq!(animator.field().nodes(), nodes.as_slice());
    assert_eq!(host.issued, issued);
    assert!(canvas.commands.is_empty());
}

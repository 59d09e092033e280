use std::cell::RefCell;
use std::rc::Rc;

use approx::assert_abs_diff_eq;
use glam::{DVec2, Vec2};

use stardrift::config::{FlightConfig, TimestepPolicy};
use stardrift::controller::{
    Control, FrameRequest, FrameScheduler, InputEvent, InputState, LoopError, LoopState, SceneRenderer, SimulationLoop,
};
use stardrift::model::{Pose, Scene};
use stardrift::view::RenderError;

#[derive(Default)]
struct ManualScheduler {
    requests: usize,
}

impl FrameScheduler for ManualScheduler {
    fn request_frame(&mut self) {
        self.requests += 1;
    }
}

/// Remembers where the craft visual was on each render.
#[derive(Default)]
struct RecordingRenderer {
    renders: usize,
    craft_positions: Vec<Vec2>,
    fail_on: Option<usize>,
}

impl SceneRenderer for RecordingRenderer {
    fn render(&mut self, scene: &Scene) -> Result<(), RenderError> {
        if self.fail_on == Some(self.renders) {
            return Err(RenderError::Surface(wgpu::SurfaceError::OutOfMemory));
        }
        self.renders += 1;
        if let Some(craft) = scene.craft_visual() {
            self.craft_positions.push(craft.position);
        }
        Ok(())
    }
}

type TestLoop = SimulationLoop<RecordingRenderer, ManualScheduler>;

fn seeded_config() -> FlightConfig {
    FlightConfig { star_seed: Some(7), ..FlightConfig::default() }
}

fn new_loop(config: FlightConfig) -> (TestLoop, Rc<RefCell<InputState>>) {
    let input = Rc::new(RefCell::new(InputState::new()));
    let sim = SimulationLoop::new(config, input.clone(), RecordingRenderer::default(), ManualScheduler::default());
    (sim, input)
}

fn started_loop() -> (TestLoop, Rc<RefCell<InputState>>) {
    let (mut sim, input) = new_loop(seeded_config());
    sim.start().expect("start");
    (sim, input)
}

#[test]
fn start_builds_scene_and_schedules_once() {
    let (sim, _) = started_loop();
    assert_eq!(sim.state(), LoopState::Running);
    assert_eq!(sim.scheduler().requests, 1);
    assert_eq!(sim.scene().stars().len(), 1500);
    assert_eq!(sim.scene().walls().len(), 4);
    assert!(sim.scene().craft_visual().is_some());
    assert_eq!(sim.renderer().renders, 0);
}

#[test]
fn starting_twice_is_an_error() {
    let (mut sim, _) = started_loop();
    assert!(matches!(sim.start(), Err(LoopError::AlreadyStarted)));
    assert_eq!(sim.scheduler().requests, 1);
}

#[test]
fn frame_before_start_does_nothing() {
    let (mut sim, _) = new_loop(seeded_config());
    assert!(sim.frame(0.0).expect("frame").is_none());
    assert_eq!(sim.scheduler().requests, 0);
    assert_eq!(sim.renderer().renders, 0);
}

#[test]
fn each_frame_renders_and_reschedules_once() {
    let (mut sim, _) = started_loop();
    for i in 0..10 {
        let stats = sim.frame(i as f64 / 60.0).expect("frame").expect("running");
        assert_eq!(stats.frame, i + 1);
        assert_eq!(stats.steps, 1);
    }
    assert_eq!(sim.renderer().renders, 10);
    assert_eq!(sim.scheduler().requests, 11);
    assert_eq!(sim.frames(), 10);
}

#[test]
fn one_thrust_frame_moves_the_craft_up() {
    let (mut sim, input) = started_loop();
    input.borrow_mut().set_control(Control::Thrust, true);

    let stats = sim.frame(0.0).expect("frame").expect("running");

    let craft = sim.physics().craft();
    assert_abs_diff_eq!(craft.velocity.x, 0.0, epsilon = 1e-9);
    assert_abs_diff_eq!(craft.velocity.y, -100.0 / 60.0, epsilon = 1e-9);
    assert_abs_diff_eq!(craft.velocity.y, -1.6667, epsilon = 1e-4);
    assert_abs_diff_eq!(stats.pose.position.x, 640.0, epsilon = 1e-6);
    assert_abs_diff_eq!(stats.pose.position.y, 359.97222, epsilon = 1e-5);
    assert_abs_diff_eq!(stats.pose.position.y, 360.0 - 100.0 / 3600.0, epsilon = 1e-9);
    assert_eq!(craft.force, DVec2::ZERO);
}

#[test]
fn rendered_visual_follows_the_physics_pose() {
    let (mut sim, input) = started_loop();
    input.borrow_mut().process_event(&InputEvent::KeyDown("w".to_string()));
    input.borrow_mut().process_event(&InputEvent::KeyDown("d".to_string()));

    for i in 0..30 {
        sim.frame(i as f64 / 60.0).expect("frame");
    }

    let pose = sim.physics().pose();
    let visual = sim.scene().craft_visual().expect("craft visual");
    assert_eq!(visual.position, pose.position.as_vec2());
    assert_eq!(visual.rotation, pose.angle as f32);
    assert_eq!(sim.renderer().craft_positions.last(), Some(&pose.position.as_vec2()));

    // turning right for 30 steps at 2 rad/s
    assert_abs_diff_eq!(pose.angle, 1.0, epsilon = 1e-9);
}

#[test]
fn idle_frames_do_not_drift() {
    let (mut sim, _) = started_loop();
    for i in 0..1000 {
        sim.frame(i as f64 / 60.0).expect("frame");
    }
    assert_eq!(sim.physics().pose(), Pose::new(DVec2::new(640.0, 360.0), 0.0));
}

#[test]
fn controls_are_read_every_frame() {
    let (mut sim, input) = started_loop();
    input.borrow_mut().set_control(Control::Thrust, true);
    sim.frame(0.0).expect("frame");
    input.borrow_mut().process_event(&InputEvent::FocusLost);
    sim.frame(1.0 / 60.0).expect("frame");

    // one thrust step, then coasting at the same velocity
    assert_abs_diff_eq!(sim.physics().craft().velocity.y, -100.0 / 60.0, epsilon = 1e-9);
}

#[test]
fn stop_halts_scheduling() {
    let (mut sim, _) = started_loop();
    sim.frame(0.0).expect("frame");
    sim.stop();

    assert_eq!(sim.state(), LoopState::Stopped);
    assert!(sim.frame(1.0).expect("frame").is_none());
    assert_eq!(sim.scheduler().requests, 2);
    assert_eq!(sim.renderer().renders, 1);
}

#[test]
fn render_failure_stops_the_loop() {
    let input = Rc::new(RefCell::new(InputState::new()));
    let renderer = RecordingRenderer { fail_on: Some(2), ..RecordingRenderer::default() };
    let mut sim = SimulationLoop::new(seeded_config(), input, renderer, ManualScheduler::default());
    sim.start().expect("start");

    sim.frame(0.0).expect("first frame");
    sim.frame(0.1).expect("second frame");
    let err = sim.frame(0.2).expect_err("third frame fails");

    assert!(matches!(err, LoopError::Render(RenderError::Surface(wgpu::SurfaceError::OutOfMemory))));
    assert_eq!(sim.state(), LoopState::Stopped);
    // start + two successful frames
    assert_eq!(sim.scheduler().requests, 3);
    assert!(sim.frame(0.3).expect("after failure").is_none());
}

#[test]
fn same_seed_same_starfield() {
    let (a, _) = started_loop();
    let (b, _) = started_loop();
    assert_eq!(a.scene().stars(), b.scene().stars());
}

#[test]
fn accumulated_policy_steps_by_elapsed_time() {
    let config = FlightConfig { timestep: TimestepPolicy::Accumulated, ..seeded_config() };
    let (mut sim, input) = new_loop(config);
    sim.start().expect("start");
    input.borrow_mut().set_control(Control::Thrust, true);

    // first callback only establishes the time base
    assert_eq!(sim.frame(1.0).expect("frame").expect("running").steps, 0);
    // 55ms of real time
    assert_eq!(sim.frame(1.055).expect("frame").expect("running").steps, 3);
    // a long stall is clamped and capped
    assert_eq!(sim.frame(10.0).expect("frame").expect("running").steps, 5);

    // thrust is re-applied before every sub-step
    assert_abs_diff_eq!(sim.physics().craft().velocity.y, -100.0 / 60.0 * 8.0, epsilon = 1e-9);
    assert_eq!(sim.renderer().renders, 3);
}

/// Sets a flag instead of redrawing, the way the native window host does.
struct FlaggingScheduler {
    pending: FrameRequest,
    requests: usize,
}

impl FrameScheduler for FlaggingScheduler {
    fn request_frame(&mut self) {
        self.pending.set();
        self.requests += 1;
    }
}

/// Event-loop side of the native host: a pending request arms one redraw per
/// iteration, and any other redraw only repaints.
struct WindowHost {
    sim: SimulationLoop<RecordingRenderer, FlaggingScheduler>,
    pending: FrameRequest,
    armed: bool,
}

impl WindowHost {
    fn new() -> (Self, Rc<RefCell<InputState>>) {
        let pending = FrameRequest::new();
        let input = Rc::new(RefCell::new(InputState::new()));
        let scheduler = FlaggingScheduler { pending: pending.clone(), requests: 0 };
        let mut sim = SimulationLoop::new(seeded_config(), input.clone(), RecordingRenderer::default(), scheduler);
        sim.start().expect("start");
        (Self { sim, pending, armed: false }, input)
    }

    fn about_to_wait(&mut self) {
        if self.pending.take() {
            self.armed = true;
        }
    }

    fn redraw(&mut self, now: f64) {
        if std::mem::take(&mut self.armed) {
            self.sim.frame(now).expect("frame");
        } else {
            self.sim.repaint().expect("repaint");
        }
    }
}

#[test]
fn unscheduled_redraws_repaint_without_stepping() {
    let (mut host, input) = WindowHost::new();
    input.borrow_mut().set_control(Control::Thrust, true);

    host.about_to_wait();
    host.redraw(0.0);
    let after_one = host.sim.physics().pose();
    let velocity = host.sim.physics().craft().velocity;

    // resize and expose redraws within the same iteration
    for i in 1..5 {
        host.redraw(0.001 * i as f64);
    }

    assert_eq!(host.sim.physics().pose(), after_one);
    assert_eq!(host.sim.physics().craft().velocity, velocity);
    assert_eq!(host.sim.frames(), 1);
    assert_eq!(host.sim.renderer().renders, 5);
    assert_eq!(host.sim.scheduler().requests, 2);
    assert!(host.pending.is_pending());

    // the next iteration delivers the requested frame
    host.about_to_wait();
    host.redraw(1.0 / 60.0);
    assert_eq!(host.sim.frames(), 2);
    assert!(host.sim.physics().pose().position.y < after_one.position.y);
}

#[test]
fn redraw_without_a_request_does_not_step() {
    let (mut host, _) = WindowHost::new();
    host.redraw(0.0);
    assert_eq!(host.sim.frames(), 0);
    assert_eq!(host.sim.renderer().renders, 1);
    // the request from start is still waiting for its iteration
    assert_eq!(host.sim.scheduler().requests, 1);
    assert!(host.pending.is_pending());
}

#[test]
fn repaint_on_stopped_loop_does_nothing() {
    let (mut sim, _) = started_loop();
    sim.stop();
    sim.repaint().expect("repaint");
    assert_eq!(sim.renderer().renders, 0);
}

#[test]
fn before_render_sees_this_frames_physics() {
    let (mut sim, input) = started_loop();
    input.borrow_mut().set_control(Control::Thrust, true);

    let mut seen = None;
    let stats = sim
        .frame_with(0.0, |physics, renderer| {
            seen = Some((physics.pose(), physics.craft().velocity, renderer.renders));
        })
        .expect("frame")
        .expect("running");

    let (pose, velocity, renders_before) = seen.expect("hook ran");
    assert_eq!(pose, stats.pose);
    assert_abs_diff_eq!(velocity.y, -100.0 / 60.0, epsilon = 1e-9);
    assert_eq!(renders_before, 0);
    assert_eq!(sim.renderer().renders, 1);
}

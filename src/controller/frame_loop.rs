use std::cell::{Cell, RefCell};
use std::rc::Rc;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::config::{FlightConfig, TimestepPolicy};
use crate::controller::input::InputState;
use crate::controller::physics::{FlightModel, PhysicsWorld};
use crate::model::{BodyShape, Pose, RigidBody, Scene, SceneError};
use crate::view::RenderError;

/// Arranges for the loop to be called once more, after the next display refresh.
pub trait FrameScheduler {
    fn request_frame(&mut self);
}

/// Set by a scheduler when it asks for a frame, taken by the host when the callback arrives.
///
/// Hosts whose redraw callbacks can also fire on their own (window resize, expose)
/// use it to tell a scheduled frame from an unsolicited repaint.
#[derive(Clone, Debug, Default)]
pub struct FrameRequest(Rc<Cell<bool>>);

impl FrameRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.0.set(true);
    }

    pub fn is_pending(&self) -> bool {
        self.0.get()
    }

    /// Clears the flag and returns whether a frame was pending.
    pub fn take(&self) -> bool {
        self.0.replace(false)
    }
}

/// Draws the whole scene once.
pub trait SceneRenderer {
    fn render(&mut self, scene: &Scene) -> Result<(), RenderError>;
}

#[derive(Debug, Error)]
pub enum LoopError {
    #[error("simulation loop was already started")]
    AlreadyStarted,
    #[error(transparent)]
    Scene(#[from] SceneError),
    #[error("render failed: {0}")]
    Render(#[source] RenderError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
    Stopped,
}

/// What one frame did.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameStats {
    pub frame: u64,
    pub steps: u32,
    pub pose: Pose,
}

const STEP_TOLERANCE: f64 = 1e-9;

/// Decides how many fixed steps each frame callback runs.
#[derive(Clone, Debug)]
pub struct StepClock {
    policy: TimestepPolicy,
    fixed_dt: f64,
    max_frame_delta: f64,
    max_steps: u32,
    accumulator: f64,
    last_time: Option<f64>,
}

impl StepClock {
    pub fn new(config: &FlightConfig) -> Self {
        Self {
            policy: config.timestep,
            fixed_dt: config.fixed_dt,
            max_frame_delta: config.max_frame_delta.as_secs_f64(),
            max_steps: config.max_steps_per_frame.max(1),
            accumulator: 0.0,
            last_time: None,
        }
    }

    /// `now` is in seconds on any monotonic clock.
    pub fn steps_for(&mut self, now: f64) -> u32 {
        let elapsed = match self.last_time.replace(now) {
            Some(last) => (now - last).clamp(0.0, self.max_frame_delta),
            None => 0.0,
        };

        match self.policy {
            TimestepPolicy::PerFrame => 1,
            TimestepPolicy::Accumulated => {
                self.accumulator += elapsed;
                // Frame deltas at exactly the step rate land a hair under fixed_dt
                let threshold = self.fixed_dt - STEP_TOLERANCE;
                let mut steps = 0;
                while self.accumulator >= threshold && steps < self.max_steps {
                    self.accumulator = (self.accumulator - self.fixed_dt).max(0.0);
                    steps += 1;
                }
                if self.accumulator >= threshold {
                    debug!(backlog = self.accumulator, "dropping simulation backlog");
                    self.accumulator = 0.0;
                }
                steps
            }
        }
    }
}

/// Main game loop: input → forces → physics step → pose sync → render → reschedule.
pub struct SimulationLoop<R, S> {
    config: FlightConfig,
    input: Rc<RefCell<InputState>>,
    flight: FlightModel,
    physics: PhysicsWorld,
    scene: Scene,
    renderer: R,
    scheduler: S,
    clock: StepClock,
    state: LoopState,
    frames: u64,
}

impl<R: SceneRenderer, S: FrameScheduler> SimulationLoop<R, S> {
    pub fn new(config: FlightConfig, input: Rc<RefCell<InputState>>, renderer: R, scheduler: S) -> Self {
        let (width, height) = config.craft_size;
        let craft = RigidBody::new(config.craft_mass, config.arena.center())
            .with_shape(BodyShape::Box { width, height });

        Self {
            flight: FlightModel::new(config.speed, config.turn_speed),
            physics: PhysicsWorld::new(craft),
            scene: Scene::new(),
            clock: StepClock::new(&config),
            state: LoopState::Idle,
            frames: 0,
            config,
            input,
            renderer,
            scheduler,
        }
    }

    /// Build the scene once and request the first frame.
    pub fn start(&mut self) -> Result<(), LoopError> {
        if self.state != LoopState::Idle {
            return Err(LoopError::AlreadyStarted);
        }

        let seed = self.config.star_seed.unwrap_or_else(rand::random);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let arena = self.config.arena;

        self.scene.build_stars(self.config.star_count, &arena, &mut rng);
        self.scene.build_walls(&arena, self.config.wall_thickness);
        self.scene.build_craft_visual();
        self.scene.sync_craft_visual(self.physics.pose())?;

        info!(
            seed,
            stars = self.scene.stars().len(),
            width = arena.width,
            height = arena.height,
            timestep = ?self.config.timestep,
            "scene built, starting simulation loop"
        );

        self.state = LoopState::Running;
        self.scheduler.request_frame();
        Ok(())
    }

    /// Run one frame callback. Does nothing (and schedules nothing) unless running.
    pub fn frame(&mut self, now: f64) -> Result<Option<FrameStats>, LoopError> {
        self.frame_with(now, |_, _| {})
    }

    /// Like [`SimulationLoop::frame`], calling `before_render` once physics has been
    /// stepped and the pose synced, right before the render pass.
    pub fn frame_with<F>(&mut self, now: f64, before_render: F) -> Result<Option<FrameStats>, LoopError>
    where
        F: FnOnce(&PhysicsWorld, &mut R),
    {
        if self.state != LoopState::Running {
            return Ok(None);
        }

        // Read the controls once; they hold for every step of this frame
        let controls = self.input.borrow().controls();

        let steps = self.clock.steps_for(now);
        for _ in 0..steps {
            self.flight.apply(controls, &mut self.physics);
            self.physics.advance(self.config.fixed_dt);
        }

        let pose = self.physics.pose();
        if let Err(e) = self.scene.sync_craft_visual(pose) {
            self.state = LoopState::Stopped;
            return Err(e.into());
        }

        before_render(&self.physics, &mut self.renderer);
        self.render()?;

        self.frames += 1;
        self.scheduler.request_frame();

        Ok(Some(FrameStats { frame: self.frames, steps, pose }))
    }

    /// Draw the current scene again without stepping or scheduling.
    /// For redraws the host asked for on its own.
    pub fn repaint(&mut self) -> Result<(), LoopError> {
        if self.state != LoopState::Running {
            return Ok(());
        }
        self.render()
    }

    fn render(&mut self) -> Result<(), LoopError> {
        if let Err(e) = self.renderer.render(&self.scene) {
            error!(error = %e, frame = self.frames, "render failed, stopping simulation loop");
            self.state = LoopState::Stopped;
            return Err(LoopError::Render(e));
        }
        Ok(())
    }

    pub fn stop(&mut self) {
        if self.state == LoopState::Running {
            info!(frames = self.frames, "simulation loop stopped");
        }
        self.state = LoopState::Stopped;
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == LoopState::Running
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn config(&self) -> &FlightConfig {
        &self.config
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn physics(&self) -> &PhysicsWorld {
        &self.physics
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }
}

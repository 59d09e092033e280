use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tracing::{error, info};
use winit::application::ApplicationHandler;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use stardrift::config::FlightConfig;
use stardrift::controller::input::native::keyboard_event_to_input;
use stardrift::controller::{
    ControlState, FrameRequest, FrameScheduler, InputEvent, InputState, KeyBindings, LoopError, PhysicsWorld,
    SimulationLoop,
};
use stardrift::logging;
use stardrift::ui::{self, FpsCounter, HudStats};
use stardrift::view::{GpuContext, GpuInitError, Overlay, ShapeRenderer};

#[derive(Debug, Error)]
enum AppError {
    #[error("event loop: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
    #[error("window creation: {0}")]
    Window(#[from] winit::error::OsError),
    #[error(transparent)]
    Gpu(#[from] GpuInitError),
    #[error(transparent)]
    Loop(#[from] LoopError),
}

/// Marks that the loop wants another frame. The redraw itself is requested
/// from `about_to_wait`.
struct WindowScheduler {
    pending: FrameRequest,
}

impl FrameScheduler for WindowScheduler {
    fn request_frame(&mut self) {
        self.pending.set();
    }
}

/// egui debug overlay state.
struct Hud {
    ctx: egui::Context,
    state: egui_winit::State,
    fps: FpsCounter,
}

impl Hud {
    fn new(window: &Window) -> Self {
        let ctx = egui::Context::default();
        let state = egui_winit::State::new(
            ctx.clone(),
            egui::ViewportId::ROOT,
            window,
            None,
            None,
            None,
        );
        Self { ctx, state, fps: FpsCounter::default() }
    }

    fn overlay(&mut self, window: &Window, stats: &HudStats, bindings: &KeyBindings) -> Overlay {
        let raw_input = self.state.take_egui_input(window);
        let mut output = ui::build_hud(&self.ctx, raw_input, stats, bindings);
        let platform_output = std::mem::take(&mut output.platform_output);
        self.state.handle_platform_output(window, platform_output);
        ui::into_overlay(&self.ctx, output)
    }
}

struct Flight {
    window: Arc<Window>,
    input: Rc<RefCell<InputState>>,
    sim: SimulationLoop<ShapeRenderer, WindowScheduler>,
    pending: FrameRequest,
    // set when the next RedrawRequested is the one the loop asked for
    armed: bool,
    hud: Hud,
    epoch: Instant,
}

impl Flight {
    fn new(event_loop: &ActiveEventLoop, config: FlightConfig) -> Result<Self, AppError> {
        let arena = config.arena;
        let attributes = Window::default_attributes()
            .with_title(config.window_title.clone())
            .with_inner_size(winit::dpi::LogicalSize::new(arena.width, arena.height));
        let window = Arc::new(event_loop.create_window(attributes)?);

        let gpu = pollster::block_on(GpuContext::new_native(window.clone()))?;
        let renderer = ShapeRenderer::new(gpu, &arena);
        let hud = Hud::new(&window);

        let input = Rc::new(RefCell::new(InputState::new()));
        let pending = FrameRequest::new();
        let scheduler = WindowScheduler { pending: pending.clone() };
        let mut sim = SimulationLoop::new(config, input.clone(), renderer, scheduler);
        sim.start()?;

        Ok(Self {
            window,
            input,
            sim,
            pending,
            armed: false,
            hud,
            epoch: Instant::now(),
        })
    }

    /// Turns a pending frame request into exactly one redraw.
    fn arm(&mut self) {
        if self.pending.take() {
            self.armed = true;
            self.window.request_redraw();
        }
    }

    /// Returns false once the loop has halted.
    fn redraw(&mut self) -> Result<bool, LoopError> {
        let Flight { window, input, sim, armed, hud, epoch, .. } = self;
        let window: &Window = window.as_ref();
        let input = input.borrow();
        let controls = input.controls();
        let bindings = input.bindings();

        if !std::mem::take(armed) {
            // Sent by the OS (resize, expose): show the same state again
            if sim.is_running() {
                let physics = sim.physics();
                let stats = hud_stats(hud.fps.fps(), sim.frames(), physics, controls);
                let overlay = hud.overlay(window, &stats, bindings);
                sim.renderer_mut().set_overlay(overlay);
            }
            sim.repaint()?;
            return Ok(sim.is_running());
        }

        let now = epoch.elapsed().as_secs_f64();
        let fps = hud.fps.tick(now);
        let frame = sim.frames() + 1;
        sim.frame_with(now, |physics, renderer| {
            let stats = hud_stats(fps, frame, physics, controls);
            renderer.set_overlay(hud.overlay(window, &stats, bindings));
        })?;
        Ok(sim.is_running())
    }
}

fn hud_stats(fps: f32, frames: u64, physics: &PhysicsWorld, controls: ControlState) -> HudStats {
    HudStats {
        fps,
        frames,
        pose: physics.pose(),
        velocity: physics.craft().velocity,
        controls,
    }
}

struct App {
    config: FlightConfig,
    flight: Option<Flight>,
    error: Option<AppError>,
}

impl App {
    fn new(config: FlightConfig) -> Self {
        Self { config, flight: None, error: None }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: AppError) {
        error!(error = %err, "fatal error, exiting");
        self.error = Some(err);
        event_loop.exit();
    }

    fn into_result(self) -> Result<(), AppError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.flight.is_some() {
            return;
        }
        match Flight::new(event_loop, self.config.clone()) {
            Ok(flight) => {
                info!(width = self.config.arena.width, height = self.config.arena.height, "window created");
                self.flight = Some(flight);
            }
            Err(err) => self.fail(event_loop, err),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        let Some(flight) = self.flight.as_mut() else {
            return;
        };

        let egui_consumed = flight.hud.state.on_window_event(&flight.window, &event).consumed;

        match event {
            WindowEvent::CloseRequested => {
                flight.sim.stop();
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                flight.sim.renderer_mut().resize(size.width, size.height);
            }
            WindowEvent::Focused(false) => {
                flight.input.borrow_mut().process_event(&InputEvent::FocusLost);
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Pressed && event.physical_key == PhysicalKey::Code(KeyCode::Escape) {
                    flight.sim.stop();
                    event_loop.exit();
                    return;
                }
                // Releases always go through so a control can't stick
                if egui_consumed && event.state == ElementState::Pressed {
                    return;
                }
                if let Some(input_event) = keyboard_event_to_input(&event) {
                    flight.input.borrow_mut().process_event(&input_event);
                }
            }
            WindowEvent::RedrawRequested => match flight.redraw() {
                Ok(true) => {}
                Ok(false) => event_loop.exit(),
                Err(err) => self.fail(event_loop, err.into()),
            },
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(flight) = self.flight.as_mut() {
            flight.arm();
        }
    }
}

fn main() -> Result<(), AppError> {
    logging::init();

    let config = FlightConfig::from_env();
    let event_loop = EventLoop::new()?;
    // Redraws are requested by the simulation loop itself
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;
    info!("stardrift exited");
    app.into_result()
}

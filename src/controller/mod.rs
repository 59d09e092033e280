// CONTROLLER: Input, flight physics and the update loop
pub mod input;
pub mod physics;
pub mod frame_loop;

pub use input::{Control, ControlState, InputEvent, InputState, KeyBindings};
pub use physics::{FlightModel, PhysicsWorld};
pub use frame_loop::{FrameRequest, FrameScheduler, FrameStats, LoopError, LoopState, SceneRenderer, SimulationLoop, StepClock};

// VIEW: GPU setup and drawing
pub mod render;
pub mod gpu_init;

pub use render::{arena_projection, Overlay, RenderError, ShapeRenderer};
pub use gpu_init::{GpuContext, GpuInitError};

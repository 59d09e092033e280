// MODEL: Arena, craft body and the render tree
pub mod arena;
pub mod craft;
pub mod scene;

pub use arena::Arena;
pub use craft::{BodyShape, Pose, RigidBody};
pub use scene::{Fill, Graphic, Scene, SceneError, Shape, Star, Wall};

use glam::{Mat4, Vec2, Vec3};
use rand::Rng;
use thiserror::Error;

use super::{Arena, Pose};
use crate::utils::{rgba, Mesh};

pub const STAR_COLOR: u32 = 0xffffff;
pub const WALL_COLOR: u32 = 0xffffff;
pub const WALL_ALPHA: f32 = 0.5;
pub const HULL_COLOR: u32 = 0x20d3fe;
pub const ENGINE_COLOR: u32 = 0x1495d1;

/// segments used to approximate a star's circle
const CIRCLE_SEGMENTS: usize = 12;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SceneError {
    #[error("craft visual has not been built")]
    CraftVisualMissing,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Shape {
    Circle { center: Vec2, radius: f32 },
    Rect { origin: Vec2, size: Vec2 },
    Triangle([Vec2; 3]),
}

impl Shape {
    fn outline(&self) -> Vec<Vec2> {
        match *self {
            Shape::Circle { center, radius } => (0..CIRCLE_SEGMENTS)
                .map(|i| {
                    let theta = i as f32 / CIRCLE_SEGMENTS as f32 * std::f32::consts::TAU;
                    center + Vec2::new(theta.cos(), theta.sin()) * radius
                })
                .collect(),
            Shape::Rect { origin, size } => vec![
                origin,
                origin + Vec2::new(size.x, 0.0),
                origin + size,
                origin + Vec2::new(0.0, size.y),
            ],
            Shape::Triangle(points) => points.to_vec(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Fill {
    pub color: u32,
    pub alpha: f32,
}

impl Fill {
    pub const fn new(color: u32, alpha: f32) -> Self {
        Self { color, alpha }
    }
}

/// A drawable group: shapes in local space plus one transform.
#[derive(Clone, Debug, PartialEq)]
pub struct Graphic {
    pub shapes: Vec<(Shape, Fill)>,
    pub position: Vec2,
    pub rotation: f32,
}

impl Graphic {
    pub fn new() -> Self {
        Self { shapes: Vec::new(), position: Vec2::ZERO, rotation: 0.0 }
    }

    pub fn with(mut self, shape: Shape, fill: Fill) -> Self {
        self.shapes.push((shape, fill));
        self
    }

    pub fn transform(&self) -> Mat4 {
        Mat4::from_translation(Vec3::new(self.position.x, self.position.y, 0.0))
            * Mat4::from_rotation_z(self.rotation)
    }

    fn tessellate_into(&self, mesh: &mut Mesh, transform: &Mat4) {
        for (shape, fill) in &self.shapes {
            mesh.push_convex(&shape.outline(), rgba(fill.color, fill.alpha), transform);
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Star {
    pub position: Vec2,
    pub radius: f32,
    pub opacity: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Wall {
    pub origin: Vec2,
    pub size: Vec2,
}

/// The render tree. Everything except the craft is static after construction.
#[derive(Debug, Default)]
pub struct Scene {
    graphics: Vec<Graphic>,
    stars: Vec<Star>,
    walls: Vec<Wall>,
    craft: Option<usize>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn graphics(&self) -> &[Graphic] {
        &self.graphics
    }

    pub fn stars(&self) -> &[Star] {
        &self.stars
    }

    pub fn walls(&self) -> &[Wall] {
        &self.walls
    }

    pub fn craft_visual(&self) -> Option<&Graphic> {
        self.craft.map(|idx| &self.graphics[idx])
    }

    fn add(&mut self, graphic: Graphic) -> usize {
        self.graphics.push(graphic);
        self.graphics.len() - 1
    }

    /// Scatter `count` stars over the arena: whole-pixel positions, radius 1 or 2,
    /// opacity between 0.25 and 1.
    pub fn build_stars<R: Rng + ?Sized>(&mut self, count: usize, arena: &Arena, rng: &mut R) -> &[Star] {
        let first = self.stars.len();
        for _ in 0..count {
            let star = Star {
                position: Vec2::new(
                    (rng.gen::<f32>() * arena.width as f32).round(),
                    (rng.gen::<f32>() * arena.height as f32).round(),
                ),
                radius: rng.gen_range(1..=2) as f32,
                opacity: (rng.gen::<f32>() + 0.25).min(1.0),
            };
            self.add(Graphic::new().with(
                Shape::Circle { center: star.position, radius: star.radius },
                Fill::new(STAR_COLOR, star.opacity),
            ));
            self.stars.push(star);
        }
        &self.stars[first..]
    }

    /// Frame the arena with four rectangles. Top and bottom span the full width,
    /// the sides fit between them.
    pub fn build_walls(&mut self, arena: &Arena, thickness: f32) -> &[Wall] {
        let (w, h) = (arena.width as f32, arena.height as f32);
        let t = thickness;
        let walls = [
            Wall { origin: Vec2::new(0.0, 0.0), size: Vec2::new(w, t) },
            Wall { origin: Vec2::new(w - t, t), size: Vec2::new(t, h - 2.0 * t) },
            Wall { origin: Vec2::new(0.0, h - t), size: Vec2::new(w, t) },
            Wall { origin: Vec2::new(0.0, t), size: Vec2::new(t, h - 2.0 * t) },
        ];

        let mut frame = Graphic::new();
        for wall in &walls {
            frame = frame.with(
                Shape::Rect { origin: wall.origin, size: wall.size },
                Fill::new(WALL_COLOR, WALL_ALPHA),
            );
        }
        self.add(frame);

        let first = self.walls.len();
        self.walls.extend_from_slice(&walls);
        &self.walls[first..]
    }

    /// Triangular hull with its nose at the local origin, engine block behind it.
    pub fn build_craft_visual(&mut self) -> &Graphic {
        let craft = Graphic::new()
            .with(
                Shape::Triangle([Vec2::new(0.0, 0.0), Vec2::new(-26.0, 60.0), Vec2::new(26.0, 60.0)]),
                Fill::new(HULL_COLOR, 1.0),
            )
            .with(
                Shape::Rect { origin: Vec2::new(-15.0, 60.0), size: Vec2::new(30.0, 8.0) },
                Fill::new(ENGINE_COLOR, 1.0),
            );

        let idx = match self.craft {
            Some(idx) => {
                // rebuilding replaces the model but keeps its pose
                let pose = (self.graphics[idx].position, self.graphics[idx].rotation);
                self.graphics[idx] = Graphic { position: pose.0, rotation: pose.1, ..craft };
                idx
            }
            None => self.add(craft),
        };
        self.craft = Some(idx);
        &self.graphics[idx]
    }

    /// Overwrite the craft visual's transform with a physics pose.
    pub fn sync_craft_visual(&mut self, pose: Pose) -> Result<(), SceneError> {
        let idx = self.craft.ok_or(SceneError::CraftVisualMissing)?;
        let craft = &mut self.graphics[idx];
        craft.position = pose.position.as_vec2();
        craft.rotation = pose.angle as f32;
        Ok(())
    }

    /// Every node except the craft, tessellated in arena space.
    pub fn static_mesh(&self) -> Mesh {
        let mut mesh = Mesh::empty();
        for (idx, graphic) in self.graphics.iter().enumerate() {
            if Some(idx) == self.craft {
                continue;
            }
            graphic.tessellate_into(&mut mesh, &graphic.transform());
        }
        mesh
    }

    /// The craft in its local space; place it with [`Scene::craft_transform`].
    pub fn craft_mesh(&self) -> Mesh {
        let mut mesh = Mesh::empty();
        if let Some(craft) = self.craft_visual() {
            craft.tessellate_into(&mut mesh, &Mat4::IDENTITY);
        }
        mesh
    }

    pub fn craft_transform(&self) -> Mat4 {
        self.craft_visual().map(Graphic::transform).unwrap_or(Mat4::IDENTITY)
    }
}

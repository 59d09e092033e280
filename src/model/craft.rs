use glam::DVec2;

/// Position and orientation of the craft at the end of a step.
///
/// This is the only thing that flows from physics to the scene.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pose {
    pub position: DVec2,
    pub angle: f64,
}

impl Pose {
    pub fn new(position: DVec2, angle: f64) -> Self {
        Self { position, angle }
    }
}

/// Collision shape attached to a body. Only used for its mass distribution here.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BodyShape {
    Box { width: f64, height: f64 },
}

impl BodyShape {
    /// Moment of inertia around the centre for a body of the given mass.
    pub fn inertia(&self, mass: f64) -> f64 {
        match *self {
            BodyShape::Box { width, height } => mass * (width * width + height * height) / 12.0,
        }
    }
}

/// The craft's physical state.
#[derive(Clone, Debug, PartialEq)]
pub struct RigidBody {
    pub mass: f64,
    pub inertia: f64,
    pub shape: Option<BodyShape>,

    pub position: DVec2,
    pub velocity: DVec2,
    pub angle: f64,
    pub angular_velocity: f64,

    /// Cleared after every step.
    pub force: DVec2,
    pub torque: f64,

    pub damping: f64,
    pub angular_damping: f64,
}

impl RigidBody {
    pub fn new(mass: f64, position: DVec2) -> Self {
        Self {
            mass,
            inertia: 0.0,
            shape: None,
            position,
            velocity: DVec2::ZERO,
            angle: 0.0,
            angular_velocity: 0.0,
            force: DVec2::ZERO,
            torque: 0.0,
            damping: 0.0,
            angular_damping: 0.0,
        }
    }

    pub fn with_shape(mut self, shape: BodyShape) -> Self {
        self.inertia = shape.inertia(self.mass);
        self.shape = Some(shape);
        self
    }

    pub fn inv_mass(&self) -> f64 {
        if self.mass > 0.0 { 1.0 / self.mass } else { 0.0 }
    }

    pub fn inv_inertia(&self) -> f64 {
        if self.inertia > 0.0 { 1.0 / self.inertia } else { 0.0 }
    }

    pub fn pose(&self) -> Pose {
        Pose::new(self.position, self.angle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn box_inertia() {
        let body = RigidBody::new(1.0, DVec2::ZERO).with_shape(BodyShape::Box { width: 52.0, height: 69.0 });
        assert_relative_eq!(body.inertia, (52.0 * 52.0 + 69.0 * 69.0) / 12.0);
        assert_relative_eq!(body.inv_inertia() * body.inertia, 1.0);
    }

    #[test]
    fn massless_body_has_no_inverse_mass() {
        let body = RigidBody::new(0.0, DVec2::ZERO);
        assert_eq!(body.inv_mass(), 0.0);
        assert_eq!(body.inv_inertia(), 0.0);
    }
}

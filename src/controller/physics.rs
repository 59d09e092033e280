use glam::DVec2;
use std::f64::consts::FRAC_PI_2;

use crate::controller::input::ControlState;
use crate::model::{Pose, RigidBody};

/// Owns the craft's rigid body and integrates it with fixed steps.
///
/// No gravity and no collision handling: the craft is free to leave the arena.
pub struct PhysicsWorld {
    craft: RigidBody,
}

impl PhysicsWorld {
    pub fn new(craft: RigidBody) -> Self {
        Self { craft }
    }

    pub fn craft(&self) -> &RigidBody {
        &self.craft
    }

    pub fn pose(&self) -> Pose {
        self.craft.pose()
    }

    pub fn apply_force(&mut self, force: DVec2) {
        self.craft.force += force;
    }

    pub fn apply_torque(&mut self, torque: f64) {
        self.craft.torque += torque;
    }

    pub fn set_angular_velocity(&mut self, angular_velocity: f64) {
        self.craft.angular_velocity = angular_velocity;
    }

    /// One semi-implicit Euler step: velocities from the accumulated force and torque
    /// first, then position and angle from the new velocities. Accumulators are cleared.
    pub fn advance(&mut self, dt: f64) {
        let body = &mut self.craft;

        body.velocity += body.force * body.inv_mass() * dt;
        body.angular_velocity += body.torque * body.inv_inertia() * dt;

        // (1 - d)^dt is exactly 1 for zero damping
        body.velocity *= (1.0 - body.damping).powf(dt);
        body.angular_velocity *= (1.0 - body.angular_damping).powf(dt);

        body.position += body.velocity * dt;
        body.angle += body.angular_velocity * dt;

        body.force = DVec2::ZERO;
        body.torque = 0.0;
    }
}

/// Turns held controls into angular velocity and thrust for one step.
#[derive(Clone, Copy, Debug)]
pub struct FlightModel {
    pub speed: f64,
    pub turn_speed: f64,
}

impl FlightModel {
    pub fn new(speed: f64, turn_speed: f64) -> Self {
        Self { speed, turn_speed }
    }

    /// Opposite turn keys held together cancel out.
    pub fn angular_velocity(&self, controls: ControlState) -> f64 {
        match (controls.turn_left, controls.turn_right) {
            (true, false) => -self.turn_speed,
            (false, true) => self.turn_speed,
            _ => 0.0,
        }
    }

    /// Thrust along the nose. The hull points towards local -y, which is angle + 90° negated.
    pub fn thrust(&self, angle: f64) -> DVec2 {
        let heading = angle + FRAC_PI_2;
        DVec2::new(-self.speed * heading.cos(), -self.speed * heading.sin())
    }

    /// Feed this step's steering into the world. Must be called before every `advance`.
    pub fn apply(&self, controls: ControlState, world: &mut PhysicsWorld) {
        world.set_angular_velocity(self.angular_velocity(controls));
        if controls.thrust {
            let force = self.thrust(world.craft().angle);
            world.apply_force(force);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BodyShape;
    use approx::assert_abs_diff_eq;

    const DT: f64 = 1.0 / 60.0;

    fn world() -> PhysicsWorld {
        PhysicsWorld::new(
            RigidBody::new(1.0, DVec2::new(640.0, 360.0))
                .with_shape(BodyShape::Box { width: 52.0, height: 69.0 }),
        )
    }

    fn controls(turn_left: bool, turn_right: bool, thrust: bool) -> ControlState {
        ControlState { turn_left, turn_right, thrust }
    }

    #[test]
    fn accumulators_cleared_after_step() {
        let mut world = world();
        world.apply_force(DVec2::new(3.0, -4.0));
        world.apply_torque(12.0);
        world.advance(DT);
        assert_eq!(world.craft().force, DVec2::ZERO);
        assert_eq!(world.craft().torque, 0.0);
    }

    #[test]
    fn forces_accumulate_within_a_step() {
        let mut world = world();
        world.apply_force(DVec2::new(1.0, 0.0));
        world.apply_force(DVec2::new(2.0, 5.0));
        assert_eq!(world.craft().force, DVec2::new(3.0, 5.0));
    }

    #[test]
    fn semi_implicit_euler_step() {
        let mut world = world();
        world.apply_force(DVec2::new(30.0, -60.0));
        world.advance(DT);

        let v = DVec2::new(30.0, -60.0) * DT;
        let p = DVec2::new(640.0, 360.0) + v * DT;
        assert_abs_diff_eq!(world.craft().velocity.x, v.x, epsilon = 1e-9);
        assert_abs_diff_eq!(world.craft().velocity.y, v.y, epsilon = 1e-9);
        assert_abs_diff_eq!(world.craft().position.x, p.x, epsilon = 1e-9);
        assert_abs_diff_eq!(world.craft().position.y, p.y, epsilon = 1e-9);
    }

    #[test]
    fn torque_spins_through_inertia() {
        let mut world = world();
        let inertia = world.craft().inertia;
        world.apply_torque(inertia);
        world.advance(DT);
        assert_abs_diff_eq!(world.craft().angular_velocity, DT, epsilon = 1e-12);
        assert_abs_diff_eq!(world.craft().angle, DT * DT, epsilon = 1e-12);
    }

    #[test]
    fn velocity_persists_without_thrust() {
        let mut world = world();
        world.apply_force(DVec2::new(0.0, -100.0));
        world.advance(DT);
        let v = world.craft().velocity;
        for _ in 0..120 {
            world.advance(DT);
        }
        assert_eq!(world.craft().velocity, v);
    }

    #[test]
    fn turning_rules() {
        let model = FlightModel::new(100.0, 2.0);
        assert_eq!(model.angular_velocity(controls(true, false, false)), -2.0);
        assert_eq!(model.angular_velocity(controls(false, true, false)), 2.0);
        assert_eq!(model.angular_velocity(controls(false, false, false)), 0.0);
        assert_eq!(model.angular_velocity(controls(true, true, true)), 0.0);
    }

    #[test]
    fn thrust_points_along_nose() {
        let model = FlightModel::new(100.0, 2.0);

        let up = model.thrust(0.0);
        assert_abs_diff_eq!(up.x, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(up.y, -100.0, epsilon = 1e-9);

        let right = model.thrust(FRAC_PI_2);
        assert_abs_diff_eq!(right.x, 100.0, epsilon = 1e-9);
        assert_abs_diff_eq!(right.y, 0.0, epsilon = 1e-9);

        for i in 0..16 {
            let angle = i as f64 * 0.4 - 3.0;
            assert_abs_diff_eq!(model.thrust(angle).length(), 100.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn apply_sets_rotation_and_adds_thrust_once() {
        let model = FlightModel::new(100.0, 2.0);
        let mut world = world();
        world.set_angular_velocity(5.0);

        model.apply(controls(false, false, true), &mut world);
        assert_eq!(world.craft().angular_velocity, 0.0);
        assert_abs_diff_eq!(world.craft().force.length(), 100.0, epsilon = 1e-9);

        world.advance(DT);
        model.apply(controls(true, false, false), &mut world);
        assert_eq!(world.craft().force, DVec2::ZERO);
        assert_eq!(world.craft().angular_velocity, -2.0);
    }

    #[test]
    fn idle_craft_does_not_drift() {
        let model = FlightModel::new(100.0, 2.0);
        let mut world = world();
        for _ in 0..1000 {
            model.apply(ControlState::default(), &mut world);
            world.advance(DT);
        }
        assert_eq!(world.pose(), Pose::new(DVec2::new(640.0, 360.0), 0.0));
    }
}

use glam::{DVec2, Vec2};

/// Fixed rectangular play area, in pixels. Immutable for the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Arena {
    pub width: u32,
    pub height: u32,
}

impl Arena {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Centre of the arena rounded to whole pixels, where the craft spawns.
    pub fn center(&self) -> DVec2 {
        DVec2::new(
            (self.width as f64 / 2.0).round(),
            (self.height as f64 / 2.0).round(),
        )
    }

    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= 0.0 && point.y >= 0.0 && point.x <= self.width as f32 && point.y <= self.height as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn center_is_rounded() {
        assert_eq!(Arena::new(1280, 720).center(), DVec2::new(640.0, 360.0));
        assert_eq!(Arena::new(101, 51).center(), DVec2::new(51.0, 26.0));
    }

    #[test]
    fn contains_is_inclusive() {
        let arena = Arena::new(10, 10);
        assert!(arena.contains(Vec2::new(0.0, 10.0)));
        assert!(!arena.contains(Vec2::new(10.5, 3.0)));
    }
}

use egui::Context;
use glam::DVec2;

use crate::controller::{ControlState, KeyBindings};
use crate::model::Pose;
use crate::view::Overlay;

/// Exponentially smoothed frames per second.
#[derive(Debug, Clone, Default)]
pub struct FpsCounter {
    last: Option<f64>,
    fps: f32,
}

impl FpsCounter {
    const SMOOTHING: f32 = 0.1;

    pub fn tick(&mut self, now: f64) -> f32 {
        if let Some(last) = self.last.replace(now) {
            let dt = (now - last) as f32;
            if dt > 0.0 {
                let instant = 1.0 / dt;
                self.fps = if self.fps == 0.0 {
                    instant
                } else {
                    self.fps + (instant - self.fps) * Self::SMOOTHING
                };
            }
        }
        self.fps
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }
}

/// Snapshot shown in the debug window.
#[derive(Debug, Clone, Copy)]
pub struct HudStats {
    pub fps: f32,
    pub frames: u64,
    pub pose: Pose,
    pub velocity: DVec2,
    pub controls: ControlState,
}

/// Raw input for a fixed-size screen, without a windowing backend.
pub fn screen_input(width: u32, height: u32, now: f64) -> egui::RawInput {
    egui::RawInput {
        time: Some(now),
        screen_rect: Some(egui::Rect::from_min_size(
            egui::Pos2::ZERO,
            egui::vec2(width as f32, height as f32),
        )),
        ..Default::default()
    }
}

pub fn build_hud(ctx: &Context, raw_input: egui::RawInput, stats: &HudStats, bindings: &KeyBindings) -> egui::FullOutput {
    ctx.run(raw_input, |ctx| {
        draw_debug_window(ctx, stats, bindings);
    })
}

/// Tessellate a finished egui pass for the renderer.
pub fn into_overlay(ctx: &Context, output: egui::FullOutput) -> Overlay {
    let primitives = ctx.tessellate(output.shapes, output.pixels_per_point);
    Overlay {
        primitives,
        textures_delta: output.textures_delta,
        pixels_per_point: output.pixels_per_point,
    }
}

fn held(label: &str, key: &str, on: bool) -> egui::RichText {
    let text = egui::RichText::new(format!("{key} - {label}")).small();
    if on {
        text.color(egui::Color32::from_rgb(0x20, 0xd3, 0xfe))
    } else {
        text
    }
}

fn draw_debug_window(ctx: &Context, stats: &HudStats, bindings: &KeyBindings) {
    let pose = stats.pose;
    egui::Window::new("Flight")
        .default_pos([8.0, 8.0])
        .resizable(false)
        .show(ctx, |ui| {
            ui.label(egui::RichText::new(format!("FPS: {:.0}  frame {}", stats.fps, stats.frames)).small());
            ui.label(egui::RichText::new(format!("Pos: x: {:.1} y: {:.1}", pose.position.x, pose.position.y)).small());
            ui.label(egui::RichText::new(format!("Vel: x: {:.2} y: {:.2}", stats.velocity.x, stats.velocity.y)).small());
            ui.label(egui::RichText::new(format!("Heading: {:.1}°", pose.angle.to_degrees())).small());
            ui.separator();
            ui.label(egui::RichText::new("Controls:").small());
            ui.label(held("Turn left", &bindings.turn_left.to_uppercase(), stats.controls.turn_left));
            ui.label(held("Turn right", &bindings.turn_right.to_uppercase(), stats.controls.turn_right));
            ui.label(held("Thrust", &bindings.thrust.to_uppercase(), stats.controls.thrust));
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn fps_starts_at_zero_and_tracks_frame_rate() {
        let mut counter = FpsCounter::default();
        assert_eq!(counter.tick(0.0), 0.0);
        assert_abs_diff_eq!(counter.tick(0.02), 50.0, epsilon = 1e-3);
        for i in 2..200 {
            counter.tick(i as f64 * 0.02);
        }
        assert_abs_diff_eq!(counter.fps(), 50.0, epsilon = 1e-2);
    }

    #[test]
    fn fps_ignores_repeated_timestamps() {
        let mut counter = FpsCounter::default();
        counter.tick(1.0);
        counter.tick(1.1);
        let before = counter.fps();
        assert_eq!(counter.tick(1.1), before);
    }

    #[test]
    fn hud_produces_shapes() {
        let ctx = Context::default();
        let stats = HudStats {
            fps: 60.0,
            frames: 10,
            pose: Pose::new(DVec2::new(640.0, 360.0), 0.0),
            velocity: DVec2::ZERO,
            controls: ControlState { turn_left: false, turn_right: false, thrust: true },
        };
        // new windows are measured on their first pass and painted from the second
        build_hud(&ctx, screen_input(1280, 720, 0.0), &stats, &KeyBindings::default());
        let output = build_hud(&ctx, screen_input(1280, 720, 0.1), &stats, &KeyBindings::default());
        assert!(!output.shapes.is_empty());
    }
}

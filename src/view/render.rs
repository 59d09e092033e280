use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use thiserror::Error;
use tracing::{debug, warn};
use wgpu::util::DeviceExt;

use crate::controller::SceneRenderer;
use crate::model::{Arena, Scene};
use crate::utils::{MeshBuffer, Vertex};
use crate::view::gpu_init::GpuContext;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),
}

/// Pixel-space orthographic projection with the origin top-left and y pointing down.
pub fn arena_projection(arena: &Arena) -> Mat4 {
    Mat4::orthographic_rh(0.0, arena.width as f32, arena.height as f32, 0.0, -1.0, 1.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SurfaceRecovery {
    Reconfigure,
    SkipFrame,
    Fail,
}

/// Lost or outdated surfaces get one reconfigure per frame. A timeout skips the
/// frame, including on the retry.
fn surface_recovery(err: &wgpu::SurfaceError, reconfigured: bool) -> SurfaceRecovery {
    match err {
        wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated if !reconfigured => SurfaceRecovery::Reconfigure,
        wgpu::SurfaceError::Timeout => SurfaceRecovery::SkipFrame,
        _ => SurfaceRecovery::Fail,
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct TransformUniform {
    view_proj: [[f32; 4]; 4],
    model: [[f32; 4]; 4],
}

impl TransformUniform {
    fn new(view_proj: Mat4, model: Mat4) -> Self {
        Self {
            view_proj: view_proj.to_cols_array_2d(),
            model: model.to_cols_array_2d(),
        }
    }
}

struct UniformSlot {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl UniformSlot {
    fn new(device: &wgpu::Device, layout: &wgpu::BindGroupLayout, label: &str, value: TransformUniform) -> Self {
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::bytes_of(&value),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout,
            entries: &[wgpu::BindGroupEntry { binding: 0, resource: buffer.as_entire_binding() }],
        });
        Self { buffer, bind_group }
    }
}

/// Tessellated egui output to paint over the scene on the next frame.
pub struct Overlay {
    pub primitives: Vec<egui::ClippedPrimitive>,
    pub textures_delta: egui::TexturesDelta,
    pub pixels_per_point: f32,
}

fn create_shape_pipeline(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    bind_group_layout: &wgpu::BindGroupLayout,
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("shape_shader"),
        source: wgpu::ShaderSource::Wgsl(include_str!("shaders/shapes.wgsl").into()),
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("shape_pipeline_layout"),
        bind_group_layouts: &[bind_group_layout],
        push_constant_ranges: &[],
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("shape_pipeline"),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &[
                    wgpu::VertexAttribute { offset: 0, shader_location: 0, format: wgpu::VertexFormat::Float32x2 },
                    wgpu::VertexAttribute { offset: 8, shader_location: 1, format: wgpu::VertexFormat::Float32x4 },
                ],
            }],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            // Fans come in both windings once the craft rotates
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState { count: 1, mask: !0, alpha_to_coverage_enabled: false },
        multiview: None,
        cache: None,
    })
}

/// Draws the scene graph onto the window surface: static stars and walls,
/// then the craft through its own model transform, then the optional overlay.
pub struct ShapeRenderer {
    gpu: GpuContext,
    pipeline: wgpu::RenderPipeline,
    view_proj: Mat4,
    static_slot: UniformSlot,
    craft_slot: UniformSlot,
    static_mesh: Option<MeshBuffer>,
    craft_mesh: Option<MeshBuffer>,
    clear_color: wgpu::Color,
    egui_renderer: egui_wgpu::Renderer,
    overlay: Option<Overlay>,
}

impl ShapeRenderer {
    pub fn new(gpu: GpuContext, arena: &Arena) -> Self {
        let device = &gpu.device;

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("transform_bind_group_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let pipeline = create_shape_pipeline(device, gpu.format, &bind_group_layout);
        let view_proj = arena_projection(arena);
        let identity = TransformUniform::new(view_proj, Mat4::IDENTITY);
        let static_slot = UniformSlot::new(device, &bind_group_layout, "static_transform", identity);
        let craft_slot = UniformSlot::new(device, &bind_group_layout, "craft_transform", identity);

        let egui_renderer = egui_wgpu::Renderer::new(device, gpu.format, egui_wgpu::RendererOptions::default());

        Self {
            gpu,
            pipeline,
            view_proj,
            static_slot,
            craft_slot,
            static_mesh: None,
            craft_mesh: None,
            clear_color: wgpu::Color::BLACK,
            egui_renderer,
            overlay: None,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.gpu.resize(width, height);
    }

    /// Painted once on the next frame, then dropped.
    pub fn set_overlay(&mut self, overlay: Overlay) {
        self.overlay = Some(overlay);
    }

    fn upload_meshes(&mut self, scene: &Scene) {
        if self.static_mesh.is_none() {
            let mesh = scene.static_mesh();
            debug!(triangles = mesh.triangle_count(), "uploading static scene mesh");
            self.static_mesh = Some(mesh.upload(&self.gpu.device));
        }
        if self.craft_mesh.is_none() && scene.craft_visual().is_some() {
            self.craft_mesh = Some(scene.craft_mesh().upload(&self.gpu.device));
        }
    }

    /// `Ok(None)` means skip this frame.
    fn acquire_frame(&self) -> Result<Option<wgpu::SurfaceTexture>, RenderError> {
        let mut reconfigured = false;
        loop {
            let err = match self.gpu.surface.get_current_texture() {
                Ok(frame) => return Ok(Some(frame)),
                Err(err) => err,
            };
            match surface_recovery(&err, reconfigured) {
                SurfaceRecovery::Reconfigure => {
                    warn!(error = %err, "surface lost or outdated, reconfiguring");
                    self.gpu.reconfigure();
                    reconfigured = true;
                }
                SurfaceRecovery::SkipFrame => {
                    warn!(error = %err, "surface unavailable, skipping frame");
                    return Ok(None);
                }
                SurfaceRecovery::Fail => return Err(err.into()),
            }
        }
    }

    fn draw_overlay(&mut self, encoder: &mut wgpu::CommandEncoder, view: &wgpu::TextureView, overlay: Overlay) {
        let device = &self.gpu.device;
        let queue = &self.gpu.queue;
        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [self.gpu.config.width, self.gpu.config.height],
            pixels_per_point: overlay.pixels_per_point,
        };

        for (id, image_delta) in &overlay.textures_delta.set {
            self.egui_renderer.update_texture(device, queue, *id, image_delta);
        }
        self.egui_renderer
            .update_buffers(device, queue, encoder, &overlay.primitives, &screen_descriptor);

        {
            let egui_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("overlay_render_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations { load: wgpu::LoadOp::Load, store: wgpu::StoreOp::Store },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            self.egui_renderer
                .render(&mut egui_pass.forget_lifetime(), &overlay.primitives, &screen_descriptor);
        }

        for id in &overlay.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }
    }
}

fn draw_mesh(rp: &mut wgpu::RenderPass, mesh: Option<&MeshBuffer>, bind_group: &wgpu::BindGroup) {
    let Some(mesh) = mesh else { return };
    if mesh.index_count == 0 {
        return;
    }
    rp.set_bind_group(0, bind_group, &[]);
    rp.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
    rp.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
    rp.draw_indexed(0..mesh.index_count, 0, 0..1);
}

impl SceneRenderer for ShapeRenderer {
    fn render(&mut self, scene: &Scene) -> Result<(), RenderError> {
        self.upload_meshes(scene);

        let craft = TransformUniform::new(self.view_proj, scene.craft_transform());
        self.gpu.queue.write_buffer(&self.craft_slot.buffer, 0, bytemuck::bytes_of(&craft));

        let Some(frame) = self.acquire_frame()? else {
            return Ok(());
        };

        let view = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self.gpu.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("encoder"),
        });

        {
            let mut rp = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("shape_render_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            rp.set_pipeline(&self.pipeline);
            draw_mesh(&mut rp, self.static_mesh.as_ref(), &self.static_slot.bind_group);
            draw_mesh(&mut rp, self.craft_mesh.as_ref(), &self.craft_slot.bind_group);
        }

        if let Some(overlay) = self.overlay.take() {
            self.draw_overlay(&mut encoder, &view, overlay);
        }

        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn projection_maps_arena_corners_to_clip_space() {
        let proj = arena_projection(&Arena::new(1280, 720));
        let top_left = proj.project_point3(Vec3::ZERO);
        let bottom_right = proj.project_point3(Vec3::new(1280.0, 720.0, 0.0));
        let center = proj.project_point3(Vec3::new(640.0, 360.0, 0.0));

        assert!((top_left.x + 1.0).abs() < 1e-6 && (top_left.y - 1.0).abs() < 1e-6);
        assert!((bottom_right.x - 1.0).abs() < 1e-6 && (bottom_right.y + 1.0).abs() < 1e-6);
        assert!(center.x.abs() < 1e-6 && center.y.abs() < 1e-6);
    }

    #[test]
    fn lost_surface_is_reconfigured_once() {
        use wgpu::SurfaceError::{Lost, Outdated};
        assert_eq!(surface_recovery(&Lost, false), SurfaceRecovery::Reconfigure);
        assert_eq!(surface_recovery(&Outdated, false), SurfaceRecovery::Reconfigure);
        assert_eq!(surface_recovery(&Lost, true), SurfaceRecovery::Fail);
        assert_eq!(surface_recovery(&Outdated, true), SurfaceRecovery::Fail);
    }

    #[test]
    fn timeout_skips_the_frame_even_after_reconfigure() {
        assert_eq!(surface_recovery(&wgpu::SurfaceError::Timeout, false), SurfaceRecovery::SkipFrame);
        assert_eq!(surface_recovery(&wgpu::SurfaceError::Timeout, true), SurfaceRecovery::SkipFrame);
    }

    #[test]
    fn out_of_memory_is_fatal() {
        assert_eq!(surface_recovery(&wgpu::SurfaceError::OutOfMemory, false), SurfaceRecovery::Fail);
    }

    #[test]
    fn uniform_is_two_matrices() {
        assert_eq!(std::mem::size_of::<TransformUniform>(), 128);
    }
}

//! Offscreen wgpu implementation of [`GraphicsContext`].
//!
//! wgpu has no global state machine, so this context keeps the current state itself
//! and records draws into the pending pass. A pass is replayed into a command encoder
//! whenever the render target changes or the device flushes. Pipelines are cached by
//! everything that is baked into a `wgpu::RenderPipeline`.

use crate::context::*;
use crate::state::{
    BlendEquation, BlendFunction, ClearFlags, CullMode, Primitive, Rect, RenderState,
};
use crate::uniform::UniformValue;
use crossbeam_channel::{Receiver, unbounded};
use futures::executor::block_on;
use itertools::Itertools;
use slotmap::SlotMap;
use snafu::{ResultExt, ensure};
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::num::{NonZeroU32, NonZeroU64};
use tracing::{debug, warn};
use wgpu::*;

const BACKBUFFER_FORMAT: TextureFormat = TextureFormat::Rgba8UnormSrgb;
const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;
const MIN_UNIFORM_BLOCK: u64 = 16;

struct GpuBuffer {
    buffer: Buffer,
}

struct GpuTexture {
    texture: wgpu::Texture,
    view: TextureView,
    sampler: Sampler,
    desc: crate::context::TextureDescriptor,
}

struct GpuTarget {
    color: Option<(TextureView, TextureFormat)>,
    depth: Option<(TextureView, TextureFormat)>,
    _depth_buffer: Option<wgpu::Texture>,
    width: u32,
    height: u32,
}

struct GpuProgram {
    name: String,
    module: ShaderModule,
    vertex_entry: String,
    fragment_entry: String,
    uniform_layout: BindGroupLayout,
    texture_layout: Option<BindGroupLayout>,
    layout: PipelineLayout,
    textures: Vec<TextureBindingInfo>,
    sampler_units: HashMap<u32, Vec<u32>>,
    block: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct VertexSlot {
    buffer: BufferKey,
    stride: u64,
    attributes: Vec<VertexAttribute>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PipelineKey {
    program: ProgramKey,
    slots: Vec<(u64, Vec<VertexAttribute>)>,
    topology: PrimitiveTopology,
    strip_index_format: Option<IndexFormat>,
    depth_test: bool,
    depth_write: bool,
    depth_func: CompareFunction,
    blend: Option<(BlendFunction, BlendEquation)>,
    cull_mode: CullMode,
    color_write: ColorWrites,
    color_format: Option<TextureFormat>,
    depth_format: Option<TextureFormat>,
}

struct RecordedDraw {
    pipeline: RenderPipeline,
    program: ProgramKey,
    uniform_offset: u32,
    textures: Option<BindGroup>,
    vertex_buffers: Vec<Buffer>,
    index: Option<(Buffer, IndexFormat)>,
    viewport: Rect,
    scissor: Rect,
    primitive: Primitive,
}

#[derive(Default)]
struct PendingPass {
    target: Option<TargetKey>,
    clear_color: Option<Color>,
    clear_depth: Option<f32>,
    draws: Vec<RecordedDraw>,
}

pub struct WgpuContext {
    device: Device,
    queue: Queue,
    capabilities: Capabilities,
    events: Receiver<ContextEvent>,

    buffers: SlotMap<BufferKey, GpuBuffer>,
    textures: SlotMap<TextureKey, GpuTexture>,
    targets: SlotMap<TargetKey, GpuTarget>,
    programs: SlotMap<ProgramKey, GpuProgram>,
    pipelines: HashMap<PipelineKey, RenderPipeline>,
    backbuffer: GpuTarget,

    state: RenderState,
    viewport: Rect,
    scissor: Rect,
    program: Option<ProgramKey>,
    attributes: BTreeMap<u32, VertexAttributeBinding>,
    index: Option<(BufferKey, IndexFormat)>,
    units: Vec<Option<TextureKey>>,

    pending: PendingPass,
    uniform_staging: Vec<u8>,
    uniform_buffer: Buffer,
    uniform_capacity: u64,
    uniform_alignment: u64,
}

impl WgpuContext {
    /// Creates a context rendering into an offscreen `width` x `height` backbuffer.
    pub fn new(width: u32, height: u32) -> Result<Self, ContextError> {
        let instance = Instance::new(&InstanceDescriptor::from_env_or_default());
        let adapter = block_on(instance.request_adapter(&RequestAdapterOptions {
            power_preference: PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .context(RequestAdapterErr)?;

        let wanted = Features::FLOAT32_FILTERABLE | Features::TEXTURE_BINDING_ARRAY;
        let required_features = adapter.features() & wanted;
        let limits = adapter.limits();

        let (device, queue) = block_on(adapter.request_device(&DeviceDescriptor {
            label: Some("Ignis Device"),
            required_features,
            required_limits: limits.clone(),
            experimental_features: ExperimentalFeatures::disabled(),
            memory_hints: MemoryHints::default(),
            trace: Trace::Off,
        }))
        .context(RequestDeviceErr)?;

        let (sender, events) = unbounded();
        device.set_device_lost_callback(move |reason, message| {
            warn!("Graphics device lost ({reason:?}): {message}");
            let _ = sender.send(ContextEvent::Lost);
        });

        let capabilities = Capabilities {
            depth_textures: true,
            float_textures: required_features.contains(Features::FLOAT32_FILTERABLE),
            texture_arrays: required_features.contains(Features::TEXTURE_BINDING_ARRAY),
            max_texture_units: limits.max_sampled_textures_per_shader_stage,
            max_texture_size: limits.max_texture_dimension_2d,
        };
        debug!("Using adapter {:?} with {capabilities:?}", adapter.get_info().name);

        let backbuffer = create_backbuffer(&device, width, height);
        let uniform_capacity = 64 * 1024;
        let uniform_buffer = create_uniform_buffer(&device, uniform_capacity);

        Ok(Self {
            device,
            queue,
            capabilities,
            events,
            buffers: SlotMap::with_key(),
            textures: SlotMap::with_key(),
            targets: SlotMap::with_key(),
            programs: SlotMap::with_key(),
            pipelines: HashMap::new(),
            backbuffer,
            state: RenderState::default(),
            viewport: Rect::new(0, 0, width, height),
            scissor: Rect::new(0, 0, width, height),
            program: None,
            attributes: BTreeMap::new(),
            index: None,
            units: Vec::new(),
            pending: PendingPass::default(),
            uniform_staging: Vec::new(),
            uniform_buffer,
            uniform_capacity,
            uniform_alignment: limits.min_uniform_buffer_offset_alignment as u64,
        })
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    fn target(&self, key: Option<TargetKey>) -> &GpuTarget {
        key.and_then(|k| self.targets.get(k))
            .unwrap_or(&self.backbuffer)
    }

    fn vertex_slots(&self) -> Vec<VertexSlot> {
        let mut slots: Vec<VertexSlot> = Vec::new();
        for (location, binding) in &self.attributes {
            let attribute = VertexAttribute {
                format: binding.format,
                offset: binding.offset,
                shader_location: *location,
            };
            match slots.iter_mut().find(|s| s.buffer == binding.buffer) {
                Some(slot) => slot.attributes.push(attribute),
                None => slots.push(VertexSlot {
                    buffer: binding.buffer,
                    stride: binding.stride,
                    attributes: vec![attribute],
                }),
            }
        }
        slots
    }

    fn texture_bind_group(&self, program: &GpuProgram) -> Result<Option<BindGroup>, String> {
        let Some(layout) = &program.texture_layout else {
            return Ok(None);
        };

        let mut resolved: Vec<(&TextureBindingInfo, Vec<&GpuTexture>)> = Vec::new();
        for info in &program.textures {
            let units = program
                .sampler_units
                .get(&info.binding)
                .ok_or_else(|| format!("{} has no texture assigned", info.name))?;
            let textures: Vec<&GpuTexture> = units
                .iter()
                .map(|unit| {
                    self.units
                        .get(*unit as usize)
                        .copied()
                        .flatten()
                        .and_then(|key| self.textures.get(key))
                        .ok_or_else(|| format!("texture unit {unit} of {} is empty", info.name))
                })
                .try_collect()?;

            let expected = info.count.unwrap_or(1) as usize;
            if textures.len() != expected {
                return Err(format!(
                    "{} expects {expected} textures, {} bound",
                    info.name,
                    textures.len()
                ));
            }
            for texture in &textures {
                check_texture_compatible(info, &texture.desc)?;
            }
            resolved.push((info, textures));
        }

        let views: Vec<Vec<&TextureView>> = resolved
            .iter()
            .map(|(_, textures)| textures.iter().map(|t| &t.view).collect())
            .collect();

        let mut entries = Vec::with_capacity(resolved.len() * 2);
        for ((info, textures), views) in resolved.iter().zip(&views) {
            let resource = match info.count {
                Some(_) => BindingResource::TextureViewArray(views),
                None => BindingResource::TextureView(views[0]),
            };
            entries.push(BindGroupEntry {
                binding: info.binding,
                resource,
            });
            entries.push(BindGroupEntry {
                binding: info.binding + 1,
                resource: BindingResource::Sampler(&textures[0].sampler),
            });
        }

        Ok(Some(self.device.create_bind_group(&BindGroupDescriptor {
            label: Some(&format!("{} Textures", program.name)),
            layout,
            entries: &entries,
        })))
    }

    fn pipeline(&mut self, key: PipelineKey) -> Option<RenderPipeline> {
        if let Some(pipeline) = self.pipelines.get(&key) {
            return Some(pipeline.clone());
        }

        let program = self.programs.get(key.program)?;
        let layouts: Vec<VertexBufferLayout> = key
            .slots
            .iter()
            .map(|(stride, attributes)| VertexBufferLayout {
                array_stride: *stride,
                step_mode: VertexStepMode::Vertex,
                attributes,
            })
            .collect();

        let depth_stencil = key.depth_format.map(|format| DepthStencilState {
            format,
            depth_write_enabled: key.depth_test && key.depth_write,
            depth_compare: if key.depth_test {
                key.depth_func
            } else {
                CompareFunction::Always
            },
            stencil: StencilState::default(),
            bias: DepthBiasState::default(),
        });

        let blend = key.blend.map(|(function, equation)| BlendState {
            color: BlendComponent {
                src_factor: function.src_color,
                dst_factor: function.dst_color,
                operation: equation.color,
            },
            alpha: BlendComponent {
                src_factor: function.src_alpha,
                dst_factor: function.dst_alpha,
                operation: equation.alpha,
            },
        });
        let color_targets: Vec<Option<ColorTargetState>> = key
            .color_format
            .map(|format| ColorTargetState {
                format,
                blend,
                write_mask: key.color_write,
            })
            .into_iter()
            .map(Some)
            .collect();

        debug!("Creating pipeline for program {:?}", program.name);
        let pipeline = self.device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some(&program.name),
            layout: Some(&program.layout),
            vertex: VertexState {
                module: &program.module,
                entry_point: Some(&program.vertex_entry),
                compilation_options: PipelineCompilationOptions::default(),
                buffers: &layouts,
            },
            primitive: PrimitiveState {
                topology: key.topology,
                strip_index_format: key.strip_index_format,
                front_face: FrontFace::Ccw,
                cull_mode: key.cull_mode.face(),
                ..PrimitiveState::default()
            },
            depth_stencil,
            multisample: MultisampleState::default(),
            fragment: Some(FragmentState {
                module: &program.module,
                entry_point: Some(&program.fragment_entry),
                compilation_options: PipelineCompilationOptions::default(),
                targets: &color_targets,
            }),
            multiview_mask: None,
            cache: None,
        });

        self.pipelines.insert(key, pipeline.clone());
        Some(pipeline)
    }

    fn ensure_uniform_capacity(&mut self) {
        let needed = self.uniform_staging.len() as u64;
        if needed <= self.uniform_capacity {
            return;
        }
        self.uniform_capacity = needed.next_power_of_two();
        self.uniform_buffer = create_uniform_buffer(&self.device, self.uniform_capacity);
    }

    fn flush_pass(&mut self) {
        let pass = std::mem::take(&mut self.pending);
        let target_key = pass.target;
        self.pending.target = target_key;

        if pass.draws.is_empty() && pass.clear_color.is_none() && pass.clear_depth.is_none() {
            return;
        }

        profiling::scope!("wgpu_flush_pass");
        self.ensure_uniform_capacity();
        if !self.uniform_staging.is_empty() {
            self.queue
                .write_buffer(&self.uniform_buffer, 0, &self.uniform_staging);
        }
        self.uniform_staging.clear();

        let uniform_groups: HashMap<ProgramKey, BindGroup> = pass
            .draws
            .iter()
            .map(|d| d.program)
            .unique()
            .filter_map(|key| {
                let program = self.programs.get(key)?;
                let size = (program.block.len() as u64).max(MIN_UNIFORM_BLOCK);
                let group = self.device.create_bind_group(&BindGroupDescriptor {
                    label: Some(&format!("{} Uniforms", program.name)),
                    layout: &program.uniform_layout,
                    entries: &[BindGroupEntry {
                        binding: 0,
                        resource: BindingResource::Buffer(BufferBinding {
                            buffer: &self.uniform_buffer,
                            offset: 0,
                            size: NonZeroU64::new(size),
                        }),
                    }],
                });
                Some((key, group))
            })
            .collect();

        let target = self.target(target_key);
        let color_attachments: Vec<Option<RenderPassColorAttachment>> = target
            .color
            .iter()
            .map(|(view, _)| {
                Some(RenderPassColorAttachment {
                    view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: Operations {
                        load: pass.clear_color.map_or(LoadOp::Load, LoadOp::Clear),
                        store: StoreOp::Store,
                    },
                })
            })
            .collect();
        let depth_stencil_attachment =
            target
                .depth
                .as_ref()
                .map(|(view, _)| RenderPassDepthStencilAttachment {
                    view,
                    depth_ops: Some(Operations {
                        load: pass.clear_depth.map_or(LoadOp::Load, LoadOp::Clear),
                        store: StoreOp::Store,
                    }),
                    stencil_ops: None,
                });

        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("Ignis Pass Encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("Ignis Pass"),
                color_attachments: &color_attachments,
                depth_stencil_attachment,
                ..RenderPassDescriptor::default()
            });

            for draw in &pass.draws {
                let Some(uniforms) = uniform_groups.get(&draw.program) else {
                    continue;
                };
                render_pass.set_pipeline(&draw.pipeline);
                render_pass.set_bind_group(0, uniforms, &[draw.uniform_offset]);
                if let Some(textures) = &draw.textures {
                    render_pass.set_bind_group(1, textures, &[]);
                }
                for (slot, buffer) in draw.vertex_buffers.iter().enumerate() {
                    render_pass.set_vertex_buffer(slot as u32, buffer.slice(..));
                }
                render_pass.set_viewport(
                    draw.viewport.x as f32,
                    draw.viewport.y as f32,
                    draw.viewport.width as f32,
                    draw.viewport.height as f32,
                    0.0,
                    1.0,
                );
                render_pass.set_scissor_rect(
                    draw.scissor.x,
                    draw.scissor.y,
                    draw.scissor.width,
                    draw.scissor.height,
                );

                let range = draw.primitive.base..draw.primitive.base + draw.primitive.count;
                match &draw.index {
                    Some((buffer, format)) => {
                        render_pass.set_index_buffer(buffer.slice(..), *format);
                        render_pass.draw_indexed(range, 0, 0..1);
                    }
                    None => render_pass.draw(range, 0..1),
                }
            }
        }

        self.queue.submit(Some(encoder.finish()));
    }
}

fn create_backbuffer(device: &Device, width: u32, height: u32) -> GpuTarget {
    let size = Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };
    let color = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Ignis Backbuffer"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: TextureDimension::D2,
        format: BACKBUFFER_FORMAT,
        usage: TextureUsages::RENDER_ATTACHMENT | TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let depth = create_depth_buffer(device, "Ignis Backbuffer Depth", width, height);

    GpuTarget {
        color: Some((
            color.create_view(&TextureViewDescriptor::default()),
            BACKBUFFER_FORMAT,
        )),
        depth: Some((
            depth.create_view(&TextureViewDescriptor::default()),
            DEPTH_FORMAT,
        )),
        _depth_buffer: Some(depth),
        width,
        height,
    }
}

fn create_depth_buffer(device: &Device, label: &str, width: u32, height: u32) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    })
}

fn create_uniform_buffer(device: &Device, size: u64) -> Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Ignis Uniform Ring"),
        size,
        usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn check_texture_compatible(
    info: &TextureBindingInfo,
    desc: &crate::context::TextureDescriptor,
) -> Result<(), String> {
    let dimension = if desc.cubemap {
        TextureViewDimension::Cube
    } else {
        TextureViewDimension::D2
    };
    if dimension != info.dimension {
        return Err(format!(
            "{} expects a {:?} texture, {:?} ({dimension:?}) bound",
            info.name, info.dimension, desc.label
        ));
    }

    let is_depth = desc.format.is_depth_stencil_format() && desc.compare.is_some();
    if is_depth != (info.sample == TextureSampleKind::Depth) {
        return Err(format!(
            "{} expects a {:?} texture, {:?} bound",
            info.name, info.sample, desc.label
        ));
    }
    Ok(())
}

fn mipmap_filter(filter: FilterMode) -> MipmapFilterMode {
    match filter {
        FilterMode::Nearest => MipmapFilterMode::Nearest,
        FilterMode::Linear => MipmapFilterMode::Linear,
    }
}

fn align_to(value: usize, alignment: u64) -> usize {
    let alignment = alignment.max(1) as usize;
    value.div_ceil(alignment) * alignment
}

impl GraphicsContext for WgpuContext {
    fn name(&self) -> &str {
        "wgpu"
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn backbuffer_size(&self) -> (u32, u32) {
        (self.backbuffer.width, self.backbuffer.height)
    }

    fn poll_event(&mut self) -> Option<ContextEvent> {
        self.events.try_recv().ok()
    }

    fn create_buffer(
        &mut self,
        desc: &crate::context::BufferDescriptor,
    ) -> Result<BufferKey, ContextError> {
        let usage = match desc.kind {
            BufferKind::Vertex => BufferUsages::VERTEX,
            BufferKind::Index => BufferUsages::INDEX,
        } | BufferUsages::COPY_DST;

        // write_buffer needs 4-byte multiples
        let size = desc.size.max(4).next_multiple_of(COPY_BUFFER_ALIGNMENT);
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(desc.label),
            size,
            usage,
            mapped_at_creation: false,
        });
        Ok(self.buffers.insert(GpuBuffer { buffer }))
    }

    fn write_buffer(&mut self, buffer: BufferKey, data: &[u8]) {
        let Some(gpu) = self.buffers.get(buffer) else {
            warn!("Write to unknown buffer {buffer:?} ignored");
            return;
        };
        let len = data.len() - data.len() % COPY_BUFFER_ALIGNMENT as usize;
        self.queue.write_buffer(&gpu.buffer, 0, &data[..len]);
        if len != data.len() {
            let mut tail = [0u8; COPY_BUFFER_ALIGNMENT as usize];
            tail[..data.len() - len].copy_from_slice(&data[len..]);
            self.queue.write_buffer(&gpu.buffer, len as u64, &tail);
        }
    }

    fn destroy_buffer(&mut self, buffer: BufferKey) {
        if let Some(gpu) = self.buffers.remove(buffer) {
            gpu.buffer.destroy();
        }
    }

    fn create_texture(
        &mut self,
        desc: &crate::context::TextureDescriptor,
    ) -> Result<TextureKey, ContextError> {
        let max = self.capabilities.max_texture_size;
        ensure!(
            desc.width <= max && desc.height <= max,
            TextureTooLargeErr {
                label: desc.label.as_str(),
                width: desc.width,
                height: desc.height,
                max,
            }
        );

        let mut usage = TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST;
        if desc.renderable {
            usage |= TextureUsages::RENDER_ATTACHMENT;
        }

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&desc.label),
            size: Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: desc.faces(),
            },
            mip_level_count: desc.mip_level_count,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: desc.format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&TextureViewDescriptor {
            label: Some(&desc.label),
            dimension: Some(if desc.cubemap {
                TextureViewDimension::Cube
            } else {
                TextureViewDimension::D2
            }),
            ..TextureViewDescriptor::default()
        });
        let sampler = self.device.create_sampler(&SamplerDescriptor {
            label: Some(&desc.label),
            address_mode_u: desc.address_mode,
            address_mode_v: desc.address_mode,
            address_mode_w: desc.address_mode,
            mag_filter: desc.filter,
            min_filter: desc.filter,
            mipmap_filter: mipmap_filter(desc.filter),
            compare: desc.compare,
            ..SamplerDescriptor::default()
        });

        Ok(self.textures.insert(GpuTexture {
            texture,
            view,
            sampler,
            desc: desc.clone(),
        }))
    }

    fn write_texture(&mut self, texture: TextureKey, level: u32, face: u32, data: &[u8]) {
        let Some(gpu) = self.textures.get(texture) else {
            warn!("Write to unknown texture {texture:?} ignored");
            return;
        };
        let Some(block_size) = gpu.desc.format.block_copy_size(None) else {
            warn!("Texture {:?} cannot be written from the CPU", gpu.desc.label);
            return;
        };
        let (width, height) = gpu.desc.level_size(level);

        self.queue.write_texture(
            TexelCopyTextureInfo {
                texture: &gpu.texture,
                mip_level: level,
                origin: Origin3d {
                    x: 0,
                    y: 0,
                    z: face,
                },
                aspect: TextureAspect::All,
            },
            data,
            TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * block_size),
                rows_per_image: Some(height),
            },
            Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
    }

    fn destroy_texture(&mut self, texture: TextureKey) {
        if let Some(gpu) = self.textures.remove(texture) {
            gpu.texture.destroy();
        }
        for unit in self.units.iter_mut() {
            if *unit == Some(texture) {
                *unit = None;
            }
        }
    }

    fn create_render_target(
        &mut self,
        desc: &RenderTargetDescriptor,
    ) -> Result<TargetKey, ContextError> {
        let label = desc.label.as_str();
        ensure!(
            desc.color.is_some() || desc.depth != DepthAttachment::None,
            IncompleteTargetErr {
                label,
                reason: "no attachments"
            }
        );

        let color = match desc.color {
            Some(key) => {
                let gpu = self
                    .textures
                    .get(key)
                    .ok_or(ContextError::UnknownHandle { kind: "texture" })?;
                ensure!(
                    gpu.desc.renderable && desc.face < gpu.desc.faces(),
                    IncompleteTargetErr {
                        label,
                        reason: "color texture is not renderable or the face is out of range"
                    }
                );
                let view = gpu.texture.create_view(&TextureViewDescriptor {
                    label: Some(label),
                    dimension: Some(TextureViewDimension::D2),
                    base_array_layer: desc.face,
                    array_layer_count: Some(1),
                    base_mip_level: 0,
                    mip_level_count: Some(1),
                    ..TextureViewDescriptor::default()
                });
                Some((view, gpu.desc.format))
            }
            None => None,
        };

        let (depth, depth_buffer) = match desc.depth {
            DepthAttachment::None => (None, None),
            DepthAttachment::Buffer => {
                let buffer = create_depth_buffer(&self.device, label, desc.width, desc.height);
                let view = buffer.create_view(&TextureViewDescriptor::default());
                (Some((view, DEPTH_FORMAT)), Some(buffer))
            }
            DepthAttachment::Texture(key) => {
                let gpu = self
                    .textures
                    .get(key)
                    .ok_or(ContextError::UnknownHandle { kind: "texture" })?;
                ensure!(
                    gpu.desc.renderable && gpu.desc.format.is_depth_stencil_format(),
                    IncompleteTargetErr {
                        label,
                        reason: "depth texture is not a renderable depth format"
                    }
                );
                (Some((gpu.view.clone(), gpu.desc.format)), None)
            }
        };

        Ok(self.targets.insert(GpuTarget {
            color,
            depth,
            _depth_buffer: depth_buffer,
            width: desc.width,
            height: desc.height,
        }))
    }

    fn destroy_render_target(&mut self, target: TargetKey) {
        if self.pending.target == Some(target) {
            self.flush_pass();
            self.pending.target = None;
        }
        self.targets.remove(target);
    }

    fn create_program(&mut self, source: &ProgramSource) -> Result<ProgramKey, ContextError> {
        let module = self.device.create_shader_module(ShaderModuleDescriptor {
            label: Some(source.name),
            source: ShaderSource::Wgsl(Cow::Borrowed(source.source)),
        });

        let block_size = (source.uniform_block_size as u64).max(MIN_UNIFORM_BLOCK);
        let uniform_layout = self
            .device
            .create_bind_group_layout(&BindGroupLayoutDescriptor {
                label: Some(&format!("{} Uniform Layout", source.name)),
                entries: &[BindGroupLayoutEntry {
                    binding: 0,
                    visibility: ShaderStages::VERTEX_FRAGMENT,
                    ty: BindingType::Buffer {
                        ty: BufferBindingType::Uniform,
                        has_dynamic_offset: true,
                        min_binding_size: NonZeroU64::new(block_size),
                    },
                    count: None,
                }],
            });

        let texture_layout = (!source.textures.is_empty()).then(|| {
            let entries: Vec<BindGroupLayoutEntry> = source
                .textures
                .iter()
                .flat_map(|info| {
                    let (sample_type, sampler) = match info.sample {
                        TextureSampleKind::Float => (
                            TextureSampleType::Float { filterable: true },
                            SamplerBindingType::Filtering,
                        ),
                        TextureSampleKind::Depth => {
                            (TextureSampleType::Depth, SamplerBindingType::Comparison)
                        }
                    };
                    [
                        BindGroupLayoutEntry {
                            binding: info.binding,
                            visibility: ShaderStages::VERTEX_FRAGMENT,
                            ty: BindingType::Texture {
                                sample_type,
                                view_dimension: info.dimension,
                                multisampled: false,
                            },
                            count: info.count.and_then(NonZeroU32::new),
                        },
                        BindGroupLayoutEntry {
                            binding: info.binding + 1,
                            visibility: ShaderStages::VERTEX_FRAGMENT,
                            ty: BindingType::Sampler(sampler),
                            count: None,
                        },
                    ]
                })
                .collect();
            self.device
                .create_bind_group_layout(&BindGroupLayoutDescriptor {
                    label: Some(&format!("{} Texture Layout", source.name)),
                    entries: &entries,
                })
        });

        let mut group_layouts = vec![&uniform_layout];
        group_layouts.extend(texture_layout.as_ref());
        let layout = self
            .device
            .create_pipeline_layout(&PipelineLayoutDescriptor {
                label: Some(&format!("{} Pipeline Layout", source.name)),
                bind_group_layouts: &group_layouts,
                immediate_size: 0,
            });

        Ok(self.programs.insert(GpuProgram {
            name: source.name.to_string(),
            module,
            vertex_entry: source.vertex_entry.to_string(),
            fragment_entry: source.fragment_entry.to_string(),
            uniform_layout,
            texture_layout,
            layout,
            textures: source.textures.to_vec(),
            sampler_units: HashMap::new(),
            block: vec![0; block_size as usize],
        }))
    }

    fn destroy_program(&mut self, program: ProgramKey) {
        if !self.pending.draws.is_empty() {
            self.flush_pass();
        }
        self.programs.remove(program);
        self.pipelines.retain(|key, _| key.program != program);
        if self.program == Some(program) {
            self.program = None;
        }
    }

    fn apply_depth_test(&mut self, enabled: bool) {
        self.state.depth_test = enabled;
    }

    fn apply_depth_write(&mut self, enabled: bool) {
        self.state.depth_write = enabled;
    }

    fn apply_depth_func(&mut self, func: CompareFunction) {
        self.state.depth_func = func;
    }

    fn apply_blending(&mut self, enabled: bool) {
        self.state.blending = enabled;
    }

    fn apply_blend_function(&mut self, function: BlendFunction) {
        self.state.blend_function = function;
    }

    fn apply_blend_equation(&mut self, equation: BlendEquation) {
        self.state.blend_equation = equation;
    }

    fn apply_cull_mode(&mut self, mode: CullMode) {
        self.state.cull_mode = mode;
    }

    fn apply_color_write(&mut self, mask: ColorWrites) {
        self.state.color_write = mask;
    }

    fn apply_clear_color(&mut self, color: Color) {
        self.state.clear_color = color;
    }

    fn apply_clear_depth(&mut self, depth: f32) {
        self.state.clear_depth = depth;
    }

    fn apply_viewport(&mut self, rect: Rect) {
        self.viewport = rect;
    }

    fn apply_scissor(&mut self, rect: Rect) {
        self.scissor = rect;
    }

    fn bind_render_target(&mut self, target: Option<TargetKey>) {
        if self.pending.target != target {
            self.flush_pass();
            self.pending.target = target;
        }
    }

    fn bind_program(&mut self, program: ProgramKey) {
        self.program = Some(program);
        self.attributes.clear();
    }

    fn bind_vertex_attribute(&mut self, location: u32, attribute: &VertexAttributeBinding) {
        self.attributes.insert(location, *attribute);
    }

    fn bind_index_buffer(&mut self, buffer: Option<(BufferKey, IndexFormat)>) {
        self.index = buffer;
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureKey) {
        let unit = unit as usize;
        if self.units.len() <= unit {
            self.units.resize(unit + 1, None);
        }
        self.units[unit] = Some(texture);
    }

    fn commit_uniform(&mut self, program: ProgramKey, slot: &UniformSlot, value: &UniformValue) {
        let Some(gpu) = self.programs.get_mut(program) else {
            return;
        };
        let Some(out) = gpu.block.get_mut(slot.offset as usize..) else {
            warn!("Uniform {} lies outside the block of {}", slot.name, gpu.name);
            return;
        };
        if !value.write_to(slot.ty, out) {
            warn!("Uniform {} of {} rejected its value", slot.name, gpu.name);
        }
    }

    fn commit_sampler(&mut self, program: ProgramKey, binding: u32, units: &[u32]) {
        if let Some(gpu) = self.programs.get_mut(program) {
            gpu.sampler_units.insert(binding, units.to_vec());
        }
    }

    fn clear(&mut self, flags: ClearFlags) {
        if !self.pending.draws.is_empty() {
            self.flush_pass();
        }
        if flags.contains(ClearFlags::COLOR) {
            self.pending.clear_color = Some(self.state.clear_color);
        }
        if flags.contains(ClearFlags::DEPTH) {
            self.pending.clear_depth = Some(self.state.clear_depth);
        }
    }

    fn draw(&mut self, primitive: &Primitive) {
        profiling::scope!("wgpu_record_draw");
        let Some(program_key) = self.program else {
            warn!("Draw without a bound program ignored");
            return;
        };
        let Some(program) = self.programs.get(program_key) else {
            return;
        };

        let textures = match self.texture_bind_group(program) {
            Ok(textures) => textures,
            Err(reason) => {
                warn!("Skipping draw with {}: {reason}", program.name);
                return;
            }
        };
        let block = program.block.clone();

        let slots = self.vertex_slots();
        let Some(vertex_buffers) = slots
            .iter()
            .map(|slot| self.buffers.get(slot.buffer).map(|b| b.buffer.clone()))
            .collect::<Option<Vec<_>>>()
        else {
            warn!("Skipping draw: a vertex buffer was destroyed");
            return;
        };

        let index = if primitive.indexed {
            let Some((buffer, format)) = self
                .index
                .and_then(|(key, format)| Some((self.buffers.get(key)?.buffer.clone(), format)))
            else {
                warn!("Skipping indexed draw without an index buffer");
                return;
            };
            Some((buffer, format))
        } else {
            None
        };

        let target = self.target(self.pending.target);
        let (width, height) = (target.width, target.height);
        let color_format = target.color.as_ref().map(|(_, format)| *format);
        let depth_format = target.depth.as_ref().map(|(_, format)| *format);

        let viewport = self.viewport.clamped(width, height);
        let scissor = self.scissor.clamped(width, height);
        if viewport.is_empty() || scissor.is_empty() {
            return;
        }

        let strips = matches!(
            primitive.topology,
            PrimitiveTopology::LineStrip | PrimitiveTopology::TriangleStrip
        );
        let key = PipelineKey {
            program: program_key,
            slots: slots
                .into_iter()
                .map(|slot| (slot.stride, slot.attributes))
                .collect(),
            topology: primitive.topology,
            strip_index_format: index.as_ref().filter(|_| strips).map(|(_, f)| *f),
            depth_test: self.state.depth_test,
            depth_write: self.state.depth_write,
            depth_func: self.state.depth_func,
            blend: self
                .state
                .blending
                .then_some((self.state.blend_function, self.state.blend_equation)),
            cull_mode: self.state.cull_mode,
            color_write: self.state.color_write,
            color_format,
            depth_format,
        };
        let Some(pipeline) = self.pipeline(key) else {
            return;
        };

        let offset = align_to(self.uniform_staging.len(), self.uniform_alignment);
        self.uniform_staging.resize(offset, 0);
        self.uniform_staging.extend_from_slice(&block);

        self.pending.draws.push(RecordedDraw {
            pipeline,
            program: program_key,
            uniform_offset: offset as u32,
            textures,
            vertex_buffers,
            index,
            viewport,
            scissor,
            primitive: *primitive,
        });
    }

    fn flush(&mut self) {
        self.flush_pass();
        if let Err(e) = self.device.poll(PollType::wait_indefinitely()) {
            warn!("Waiting for submitted work failed: {e}");
        }
    }
}

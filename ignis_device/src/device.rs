use crate::backend::WgpuContext;
use crate::buffer::{IndexBuffer, VertexBuffer, VertexFormat, index_size};
use crate::context::*;
use crate::program::{
    Program, SamplerInput, ShaderDefinition, UniformInput, compile, numbered_source,
};
use crate::scope::ScopeSpace;
use crate::state::{
    BlendEquation, BlendFunction, ClearFlags, ClearOptions, CullMode, Primitive, Rect,
    RenderState,
};
use crate::texture::{RenderTarget, Texture};
use crate::uniform::UniformValue;
use crate::version::Version;
use crossbeam_channel::{Receiver, Sender, unbounded};
use slotmap::{SlotMap, new_key_type};
use snafu::{ResultExt, Snafu};
use std::sync::Arc;
use tracing::{debug, error, instrument, trace, warn};
use wgpu::{Color, ColorWrites, CompareFunction, IndexFormat};

new_key_type! {
    pub struct ProgramId;
}

#[derive(Debug, Snafu)]
#[snafu(context(suffix(Err)), visibility(pub))]
pub enum DeviceError {
    #[snafu(display("No usable graphics context: {source}"))]
    NoContext { source: ContextError },

    #[snafu(display("Failed to create buffer {label:?}: {source}"))]
    CreateBuffer { label: String, source: ContextError },

    #[snafu(display("Failed to create texture {label:?}: {source}"))]
    CreateTexture { label: String, source: ContextError },

    #[snafu(display("Failed to create render target {label:?}: {source}"))]
    CreateRenderTarget { label: String, source: ContextError },
}

/// Observable changes of the underlying context.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    ContextLost,
    ContextRestored,
}

/// Per-frame counters, reset by [`Device::begin_frame`].
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct DeviceStats {
    pub draw_calls: u32,
    pub skipped_draws: u32,
    pub shader_switches: u32,
    pub uniform_commits: u32,
    pub texture_binds: u32,
}

#[derive(Debug, Clone)]
struct BoundVertexBuffer {
    key: BufferKey,
    format: Arc<VertexFormat>,
}

/// Owns the graphics context and filters every state change through a cache of the
/// last applied value.
///
/// All state must be set through the device. A value equal to the cached one is a
/// field compare and never reaches the context.
pub struct Device {
    context: Box<dyn GraphicsContext>,
    capabilities: Capabilities,
    scope: ScopeSpace,
    programs: SlotMap<ProgramId, Program>,

    state: RenderState,
    viewport: Option<Rect>,
    scissor: Option<Rect>,
    vertex_buffers: Vec<Option<BoundVertexBuffer>>,
    attributes_invalidated: bool,
    index_buffer: Option<(BufferKey, IndexFormat)>,
    shader: Option<ProgramId>,
    render_target: Option<RenderTarget>,
    texture_units: Vec<Option<TextureKey>>,

    subscribers: Vec<Sender<DeviceEvent>>,
    stats: DeviceStats,
    context_lost: bool,
}

impl Device {
    pub fn new(context: Box<dyn GraphicsContext>) -> Self {
        let capabilities = context.capabilities();
        debug!(
            "Created device on {:?} context with {capabilities:?}",
            context.name()
        );

        Self {
            context,
            capabilities,
            scope: ScopeSpace::new(),
            programs: SlotMap::with_key(),
            state: RenderState::default(),
            viewport: None,
            scissor: None,
            vertex_buffers: Vec::new(),
            attributes_invalidated: true,
            index_buffer: None,
            shader: None,
            render_target: None,
            texture_units: vec![None; capabilities.max_texture_units as usize],
            subscribers: Vec::new(),
            stats: DeviceStats::default(),
            context_lost: false,
        }
    }

    /// Creates a device on an offscreen wgpu context.
    pub fn wgpu(width: u32, height: u32) -> Result<Self, DeviceError> {
        let context = WgpuContext::new(width, height).context(NoContextErr)?;
        Ok(Self::new(Box::new(context)))
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn context_name(&self) -> &str {
        self.context.name()
    }

    pub fn scope(&self) -> &ScopeSpace {
        &self.scope
    }

    pub fn scope_mut(&mut self) -> &mut ScopeSpace {
        &mut self.scope
    }

    pub fn stats(&self) -> DeviceStats {
        self.stats
    }

    pub fn state(&self) -> &RenderState {
        &self.state
    }

    pub fn is_context_lost(&self) -> bool {
        self.context_lost
    }

    /// Receives [`DeviceEvent`]s published from [`Device::begin_frame`].
    pub fn subscribe(&mut self) -> Receiver<DeviceEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    fn publish(&mut self, event: DeviceEvent) {
        self.subscribers.retain(|tx| tx.send(event).is_ok());
    }

    /// Polls context events and resets the frame counters.
    #[instrument(skip_all)]
    pub fn begin_frame(&mut self) {
        self.stats = DeviceStats::default();

        while let Some(event) = self.context.poll_event() {
            match event {
                ContextEvent::Lost => {
                    warn!("Graphics context lost");
                    self.context_lost = true;
                    self.publish(DeviceEvent::ContextLost);
                }
                ContextEvent::Restored => {
                    debug!("Graphics context restored");
                    self.context_lost = false;
                    self.reset_state();
                    self.publish(DeviceEvent::ContextRestored);
                }
            }
        }
    }

    pub fn end_frame(&mut self) {
        self.context.flush();
    }

    /// Forgets everything applied to the context, which is back at its power-on state.
    fn reset_state(&mut self) {
        self.state = RenderState::default();
        self.viewport = None;
        self.scissor = None;
        self.vertex_buffers.clear();
        self.attributes_invalidated = true;
        self.index_buffer = None;
        self.shader = None;
        self.render_target = None;
        self.texture_units.fill(None);

        for (_, program) in self.programs.iter_mut() {
            for uniform in &mut program.uniforms {
                uniform.committed = Version::default();
            }
            for sampler in &mut program.samplers {
                sampler.units.clear();
            }
        }
    }

    // Resources

    pub fn create_vertex_buffer(
        &mut self,
        label: &str,
        format: Arc<VertexFormat>,
        num_vertices: u32,
    ) -> Result<VertexBuffer, DeviceError> {
        let key = self
            .context
            .create_buffer(&BufferDescriptor {
                label,
                kind: BufferKind::Vertex,
                size: format.stride() * num_vertices as u64,
            })
            .context(CreateBufferErr { label })?;
        Ok(VertexBuffer::new(key, format, num_vertices))
    }

    pub fn create_index_buffer(
        &mut self,
        label: &str,
        format: IndexFormat,
        num_indices: u32,
    ) -> Result<IndexBuffer, DeviceError> {
        let key = self
            .context
            .create_buffer(&BufferDescriptor {
                label,
                kind: BufferKind::Index,
                size: (index_size(format) * num_indices as usize) as u64,
            })
            .context(CreateBufferErr { label })?;
        Ok(IndexBuffer::new(key, format, num_indices))
    }

    /// Pushes the staging copy written through [`VertexBuffer::lock`] to hardware.
    pub fn upload_vertex_buffer(&mut self, buffer: &VertexBuffer) {
        self.context.write_buffer(buffer.key, buffer.storage());
    }

    pub fn upload_index_buffer(&mut self, buffer: &IndexBuffer) {
        self.context.write_buffer(buffer.key, buffer.storage());
    }

    pub fn destroy_vertex_buffer(&mut self, buffer: VertexBuffer) {
        for slot in &mut self.vertex_buffers {
            if slot.as_ref().is_some_and(|b| b.key == buffer.key) {
                *slot = None;
                self.attributes_invalidated = true;
            }
        }
        self.context.destroy_buffer(buffer.key);
    }

    pub fn destroy_index_buffer(&mut self, buffer: IndexBuffer) {
        if self.index_buffer.is_some_and(|(key, _)| key == buffer.key) {
            self.index_buffer = None;
            self.context.bind_index_buffer(None);
        }
        self.context.destroy_buffer(buffer.key);
    }

    pub fn create_texture(&mut self, desc: TextureDescriptor) -> Result<Texture, DeviceError> {
        let key = self
            .context
            .create_texture(&desc)
            .context(CreateTextureErr {
                label: desc.label.as_str(),
            })?;
        debug!(
            "Created texture {:?} ({}x{}, {:?})",
            desc.label, desc.width, desc.height, desc.format
        );
        Ok(Texture::new(key, desc))
    }

    /// Uploads every stored level and face of the texture.
    pub fn upload_texture(&mut self, texture: &Texture) {
        for (level, face, data) in texture.stored_levels() {
            self.context.write_texture(texture.key, level, face, data);
        }
    }

    pub fn destroy_texture(&mut self, texture: Texture) {
        for unit in &mut self.texture_units {
            if *unit == Some(texture.key) {
                *unit = None;
            }
        }
        self.context.destroy_texture(texture.key);
    }

    /// Creates a render target, validating that its attachments are complete.
    pub fn create_render_target(
        &mut self,
        desc: &RenderTargetDescriptor,
    ) -> Result<RenderTarget, DeviceError> {
        let key = self
            .context
            .create_render_target(desc)
            .context(CreateRenderTargetErr {
                label: desc.label.as_str(),
            })?;

        let depth_texture = match desc.depth {
            DepthAttachment::Texture(texture) => Some(texture),
            _ => None,
        };
        Ok(RenderTarget::new(
            key,
            desc.width,
            desc.height,
            desc.color,
            depth_texture,
        ))
    }

    pub fn destroy_render_target(&mut self, target: RenderTarget) {
        if self.render_target.as_ref().is_some_and(|t| t.key == target.key) {
            self.set_render_target(None);
        }
        self.context.destroy_render_target(target.key);
    }

    // Programs

    /// Compiles and reflects a program.
    ///
    /// Failures are logged with a numbered listing of the source and yield a program
    /// that is never ready, so drawing with it does nothing.
    #[profiling::function]
    pub fn create_program(&mut self, definition: &ShaderDefinition) -> ProgramId {
        let reflection = match compile(definition) {
            Ok(reflection) => reflection,
            Err(e) => {
                error!(
                    "Failed to compile program {:?}: {e}\n{}",
                    definition.name,
                    numbered_source(&definition.source)
                );
                return self.programs.insert(Program::broken(definition.name.clone()));
            }
        };

        let hardware = match self.context.create_program(&ProgramSource {
            name: &definition.name,
            source: &definition.source,
            vertex_entry: &definition.vertex_entry,
            fragment_entry: &definition.fragment_entry,
            uniform_block_size: reflection.uniform_block_size,
            textures: &reflection.textures,
        }) {
            Ok(hardware) => hardware,
            Err(e) => {
                error!("Failed to link program {:?}: {e}", definition.name);
                return self.programs.insert(Program::broken(definition.name.clone()));
            }
        };

        let uniforms = reflection
            .uniforms
            .into_iter()
            .map(|info| UniformInput {
                scope_id: self.scope.resolve(&info.name),
                info,
                committed: Version::default(),
                mismatch_reported: false,
            })
            .collect();
        let samplers = reflection
            .textures
            .into_iter()
            .map(|info| SamplerInput {
                scope_id: self.scope.resolve(&info.name),
                info,
                units: Vec::new(),
            })
            .collect();

        debug!("Created program {:?}", definition.name);
        self.programs.insert(Program::new(
            definition.name.clone(),
            hardware,
            reflection.attributes,
            uniforms,
            samplers,
        ))
    }

    pub fn program(&self, id: ProgramId) -> Option<&Program> {
        self.programs.get(id)
    }

    pub fn destroy_program(&mut self, id: ProgramId) {
        let Some(program) = self.programs.remove(id) else {
            return;
        };
        if self.shader == Some(id) {
            self.shader = None;
        }
        if let Some(hardware) = program.hardware() {
            self.context.destroy_program(hardware);
        }
    }

    /// Binds a program. Returns whether it is ready to draw.
    pub fn set_shader(&mut self, id: ProgramId) -> bool {
        let Some(program) = self.programs.get(id) else {
            warn!("Tried to bind an unknown program");
            return false;
        };

        if self.shader != Some(id) {
            if let Some(hardware) = program.hardware() {
                self.context.bind_program(hardware);
            }
            self.shader = Some(id);
            // attribute locations belong to the program
            self.attributes_invalidated = true;
            self.stats.shader_switches += 1;
        }

        program.is_ready()
    }

    // Fixed-function state

    pub fn set_depth_test(&mut self, enabled: bool) {
        if self.state.depth_test != enabled {
            self.context.apply_depth_test(enabled);
            self.state.depth_test = enabled;
        }
    }

    pub fn set_depth_write(&mut self, enabled: bool) {
        if self.state.depth_write != enabled {
            self.context.apply_depth_write(enabled);
            self.state.depth_write = enabled;
        }
    }

    pub fn set_depth_func(&mut self, func: CompareFunction) {
        if self.state.depth_func != func {
            self.context.apply_depth_func(func);
            self.state.depth_func = func;
        }
    }

    pub fn set_blending(&mut self, enabled: bool) {
        if self.state.blending != enabled {
            self.context.apply_blending(enabled);
            self.state.blending = enabled;
        }
    }

    pub fn set_blend_function(&mut self, function: BlendFunction) {
        if self.state.blend_function != function {
            self.context.apply_blend_function(function);
            self.state.blend_function = function;
        }
    }

    pub fn set_blend_equation(&mut self, equation: BlendEquation) {
        if self.state.blend_equation != equation {
            self.context.apply_blend_equation(equation);
            self.state.blend_equation = equation;
        }
    }

    pub fn set_cull_mode(&mut self, mode: CullMode) {
        if self.state.cull_mode != mode {
            self.context.apply_cull_mode(mode);
            self.state.cull_mode = mode;
        }
    }

    pub fn set_color_write(&mut self, mask: ColorWrites) {
        if self.state.color_write != mask {
            self.context.apply_color_write(mask);
            self.state.color_write = mask;
        }
    }

    pub fn set_clear_color(&mut self, color: Color) {
        if self.state.clear_color != color {
            self.context.apply_clear_color(color);
            self.state.clear_color = color;
        }
    }

    pub fn set_clear_depth(&mut self, depth: f32) {
        if self.state.clear_depth != depth {
            self.context.apply_clear_depth(depth);
            self.state.clear_depth = depth;
        }
    }

    pub fn set_viewport(&mut self, rect: Rect) {
        if self.viewport != Some(rect) {
            self.context.apply_viewport(rect);
            self.viewport = Some(rect);
        }
    }

    pub fn set_scissor(&mut self, rect: Rect) {
        if self.scissor != Some(rect) {
            self.context.apply_scissor(rect);
            self.scissor = Some(rect);
        }
    }

    /// `None` selects the backbuffer.
    pub fn set_render_target(&mut self, target: Option<&RenderTarget>) {
        let key = target.map(RenderTarget::key);
        if self.render_target.as_ref().map(RenderTarget::key) != key {
            self.context.bind_render_target(key);
            self.render_target = target.cloned();
        }
    }

    pub fn render_target(&self) -> Option<&RenderTarget> {
        self.render_target.as_ref()
    }

    /// Pixel size of the bound render target.
    pub fn target_size(&self) -> (u32, u32) {
        match &self.render_target {
            Some(target) => (target.width(), target.height()),
            None => self.context.backbuffer_size(),
        }
    }

    pub fn set_vertex_buffer(&mut self, stream: usize, buffer: Option<&VertexBuffer>) {
        let bound = buffer.map(|b| BoundVertexBuffer {
            key: b.key,
            format: b.format().clone(),
        });

        if self.vertex_buffers.len() <= stream {
            if bound.is_none() {
                return;
            }
            self.vertex_buffers.resize(stream + 1, None);
        }

        let current = self.vertex_buffers[stream].as_ref().map(|b| b.key);
        if current != bound.as_ref().map(|b| b.key) {
            self.vertex_buffers[stream] = bound;
            self.attributes_invalidated = true;
        }
    }

    pub fn set_index_buffer(&mut self, buffer: Option<&IndexBuffer>) {
        let bound = buffer.map(|b| (b.key, b.format()));
        if self.index_buffer != bound {
            self.context.bind_index_buffer(bound);
            self.index_buffer = bound;
        }
    }

    /// Applies the clear color and depth, then clears the bound target.
    pub fn clear(&mut self, options: &ClearOptions) {
        if options.flags.contains(ClearFlags::COLOR) {
            self.set_clear_color(options.color);
            self.set_color_write(ColorWrites::ALL);
        }
        if options.flags.contains(ClearFlags::DEPTH) {
            self.set_clear_depth(options.depth);
            self.set_depth_write(true);
        }
        if !options.flags.is_empty() {
            self.context.clear(options.flags);
        }
    }

    /// Draws with the bound program, committing whatever changed since its last draw.
    ///
    /// Returns `false` if nothing was drawn.
    #[profiling::function]
    pub fn draw(&mut self, primitive: &Primitive) -> bool {
        let drawn = self.draw_inner(primitive);
        if !drawn {
            self.stats.skipped_draws += 1;
        }
        drawn
    }

    fn draw_inner(&mut self, primitive: &Primitive) -> bool {
        if self.context_lost {
            return false;
        }
        let Some(program) = self.shader.and_then(|id| self.programs.get_mut(id)) else {
            return false;
        };
        let Some(hardware) = program.hardware() else {
            return false;
        };

        if self.attributes_invalidated {
            for attribute in program.attributes() {
                let element = self.vertex_buffers.iter().flatten().find_map(|bound| {
                    bound
                        .format
                        .element(attribute.semantic)
                        .map(|element| (bound, element))
                });
                let Some((bound, element)) = element else {
                    error!(
                        "Program {:?} reads {:?} ({:?}) which no bound vertex buffer provides",
                        program.name(),
                        attribute.name,
                        attribute.semantic
                    );
                    return false;
                };
                self.context.bind_vertex_attribute(
                    attribute.location,
                    &VertexAttributeBinding {
                        buffer: bound.key,
                        format: element.format,
                        offset: element.offset,
                        stride: bound.format.stride(),
                    },
                );
            }
            self.attributes_invalidated = false;
        }

        let (name, samplers, uniforms) = program.inputs_mut();
        let mut next_unit = 0u32;
        for sampler in samplers {
            let textures: &[TextureKey] = match self.scope.value(sampler.scope_id) {
                Some(UniformValue::Texture(texture)) => std::slice::from_ref(texture),
                Some(UniformValue::TextureArray(textures)) => textures.as_slice(),
                other => {
                    warn!(
                        "Program {:?} samples {:?} but it holds {other:?}",
                        name,
                        sampler.info.name
                    );
                    return false;
                }
            };

            let mut units = Vec::with_capacity(textures.len());
            for texture in textures {
                let unit = next_unit;
                let Some(slot) = self.texture_units.get_mut(unit as usize) else {
                    warn!(
                        "Program {:?} needs more than {} texture units",
                        name,
                        self.capabilities.max_texture_units
                    );
                    return false;
                };
                if *slot != Some(*texture) {
                    self.context.bind_texture(unit, *texture);
                    *slot = Some(*texture);
                    self.stats.texture_binds += 1;
                }
                units.push(unit);
                next_unit += 1;
            }

            if sampler.units != units {
                self.context
                    .commit_sampler(hardware, sampler.info.binding, &units);
                sampler.units = units;
            }
        }

        for uniform in uniforms {
            let Some(variable) = self.scope.variable(uniform.scope_id) else {
                continue;
            };
            let Some(value) = variable.value() else {
                continue;
            };
            let version = variable.version();
            if version == uniform.committed {
                continue;
            }

            if !value.matches(uniform.info.ty) {
                if !uniform.mismatch_reported {
                    warn!(
                        "Uniform {:?} of {:?} expects {:?}, got {value:?}",
                        uniform.info.name,
                        name,
                        uniform.info.ty
                    );
                    uniform.mismatch_reported = true;
                }
                continue;
            }

            self.context.commit_uniform(
                hardware,
                &UniformSlot {
                    name: &uniform.info.name,
                    ty: uniform.info.ty,
                    offset: uniform.info.offset,
                },
                value,
            );
            uniform.committed = version;
            self.stats.uniform_commits += 1;
        }

        if primitive.indexed && self.index_buffer.is_none() {
            warn!("Indexed draw without an index buffer");
            return false;
        }

        trace!("Draw {} with {name:?}", primitive.count);
        self.context.draw(primitive);
        self.stats.draw_calls += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{HardwareCall, HeadlessContext, HeadlessLog};

    fn device() -> (Device, HeadlessLog) {
        let (context, log) = HeadlessContext::new();
        (Device::new(Box::new(context)), log)
    }

    #[test]
    fn first_setter_call_reaches_the_context() {
        let (mut device, log) = device();
        device.set_cull_mode(CullMode::Back);
        device.set_cull_mode(CullMode::Back);
        device.set_cull_mode(CullMode::None);

        assert_eq!(
            log.calls(),
            vec![
                HardwareCall::CullMode(CullMode::Back),
                HardwareCall::CullMode(CullMode::None)
            ]
        );
    }

    #[test]
    fn power_on_state_is_elided() {
        let (mut device, log) = device();
        device.set_depth_write(true);
        device.set_blending(false);
        device.set_color_write(ColorWrites::ALL);
        device.set_render_target(None);
        assert!(log.is_empty());
    }

    #[test]
    fn restore_resets_cached_state() {
        let (mut device, log) = device();
        let events = device.subscribe();
        device.set_depth_test(true);

        log.lose_context();
        log.restore_context();
        device.begin_frame();
        device.set_depth_test(true);

        assert_eq!(log.count(|c| *c == HardwareCall::DepthTest(true)), 2);
        assert_eq!(
            events.try_iter().collect::<Vec<_>>(),
            vec![DeviceEvent::ContextLost, DeviceEvent::ContextRestored]
        );
    }
}

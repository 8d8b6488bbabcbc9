//! A context that renders nothing and records every call it receives.
//!
//! Used as mock hardware: tests hand the context to a [`crate::Device`] and keep the
//! [`HeadlessLog`] to assert on exactly which hardware transitions happened.

use crate::context::*;
use crate::state::{BlendEquation, BlendFunction, ClearFlags, CullMode, Primitive, Rect};
use crate::uniform::UniformValue;
use slotmap::SlotMap;
use snafu::ensure;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use tracing::debug;
use wgpu::{Color, ColorWrites, CompareFunction, IndexFormat};

#[derive(Debug, Clone, PartialEq)]
pub enum HardwareCall {
    CreateBuffer(BufferKey),
    WriteBuffer { buffer: BufferKey, len: usize },
    DestroyBuffer(BufferKey),
    CreateTexture(TextureKey),
    WriteTexture { texture: TextureKey, level: u32, face: u32 },
    DestroyTexture(TextureKey),
    CreateRenderTarget(TargetKey),
    DestroyRenderTarget(TargetKey),
    CreateProgram { program: ProgramKey, name: String },
    DestroyProgram(ProgramKey),
    DepthTest(bool),
    DepthWrite(bool),
    DepthFunc(CompareFunction),
    Blending(bool),
    BlendFunction(BlendFunction),
    BlendEquation(BlendEquation),
    CullMode(CullMode),
    ColorWrite(ColorWrites),
    ClearColor(Color),
    ClearDepth(f32),
    Viewport(Rect),
    Scissor(Rect),
    BindRenderTarget(Option<TargetKey>),
    BindProgram(ProgramKey),
    VertexAttribute { location: u32, buffer: BufferKey },
    IndexBuffer(Option<BufferKey>),
    BindTexture { unit: u32, texture: TextureKey },
    CommitUniform { program: ProgramKey, name: String },
    CommitSampler { program: ProgramKey, binding: u32, units: Vec<u32> },
    Clear(ClearFlags),
    Draw { program: Option<ProgramKey>, count: u32, indexed: bool },
    Flush,
}

#[derive(Debug, Default)]
struct LogState {
    calls: Vec<HardwareCall>,
    events: VecDeque<ContextEvent>,
}

/// Shared view of everything a [`HeadlessContext`] was asked to do.
#[derive(Debug, Clone, Default)]
pub struct HeadlessLog {
    state: Rc<RefCell<LogState>>,
}

impl HeadlessLog {
    pub fn calls(&self) -> Vec<HardwareCall> {
        self.state.borrow().calls.clone()
    }

    pub fn count(&self, predicate: impl Fn(&HardwareCall) -> bool) -> usize {
        self.state.borrow().calls.iter().filter(|c| predicate(c)).count()
    }

    /// Index of the first call at or after `from` matching the predicate.
    pub fn position_from(&self, from: usize, predicate: impl Fn(&HardwareCall) -> bool) -> Option<usize> {
        self.state
            .borrow()
            .calls
            .iter()
            .skip(from)
            .position(predicate)
            .map(|i| i + from)
    }

    pub fn len(&self) -> usize {
        self.state.borrow().calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.borrow().calls.is_empty()
    }

    pub fn clear(&self) {
        self.state.borrow_mut().calls.clear();
    }

    /// Queues a context loss, picked up on the device's next frame.
    pub fn lose_context(&self) {
        self.state.borrow_mut().events.push_back(ContextEvent::Lost);
    }

    pub fn restore_context(&self) {
        self.state.borrow_mut().events.push_back(ContextEvent::Restored);
    }

    fn record(&self, call: HardwareCall) {
        self.state.borrow_mut().calls.push(call);
    }
}

#[derive(Debug)]
struct HeadlessTexture {
    desc: TextureDescriptor,
}

#[derive(Debug)]
pub struct HeadlessContext {
    log: HeadlessLog,
    capabilities: Capabilities,
    size: (u32, u32),
    fail_render_targets: bool,
    buffers: SlotMap<BufferKey, u64>,
    textures: SlotMap<TextureKey, HeadlessTexture>,
    targets: SlotMap<TargetKey, RenderTargetDescriptor>,
    programs: SlotMap<ProgramKey, String>,
    program: Option<ProgramKey>,
}

impl HeadlessContext {
    pub fn new() -> (Self, HeadlessLog) {
        Self::with_capabilities(Capabilities::default())
    }

    pub fn with_capabilities(capabilities: Capabilities) -> (Self, HeadlessLog) {
        let log = HeadlessLog::default();
        let context = Self {
            log: log.clone(),
            capabilities,
            size: (1280, 720),
            fail_render_targets: false,
            buffers: SlotMap::with_key(),
            textures: SlotMap::with_key(),
            targets: SlotMap::with_key(),
            programs: SlotMap::with_key(),
            program: None,
        };
        (context, log)
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.size = (width, height);
        self
    }

    /// Every render target creation reports an incomplete framebuffer.
    pub fn failing_render_targets(mut self) -> Self {
        self.fail_render_targets = true;
        self
    }

    fn validate_target(&self, desc: &RenderTargetDescriptor) -> Result<(), ContextError> {
        let label = desc.label.as_str();
        ensure!(
            !self.fail_render_targets,
            IncompleteTargetErr {
                label,
                reason: "attachment rejected by hardware"
            }
        );
        ensure!(
            desc.color.is_some() || desc.depth != DepthAttachment::None,
            IncompleteTargetErr {
                label,
                reason: "no attachments"
            }
        );

        if let Some(color) = desc.color {
            let texture = self
                .textures
                .get(color)
                .ok_or(ContextError::UnknownHandle { kind: "texture" })?;
            ensure!(
                desc.face < texture.desc.faces(),
                IncompleteTargetErr {
                    label,
                    reason: format!("face {} out of range", desc.face)
                }
            );
        }
        if let DepthAttachment::Texture(depth) = desc.depth {
            let texture = self
                .textures
                .get(depth)
                .ok_or(ContextError::UnknownHandle { kind: "texture" })?;
            ensure!(
                texture.desc.format.is_depth_stencil_format(),
                IncompleteTargetErr {
                    label,
                    reason: "depth attachment is not a depth format"
                }
            );
        }
        Ok(())
    }
}

impl GraphicsContext for HeadlessContext {
    fn name(&self) -> &str {
        "headless"
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn backbuffer_size(&self) -> (u32, u32) {
        self.size
    }

    fn poll_event(&mut self) -> Option<ContextEvent> {
        self.log.state.borrow_mut().events.pop_front()
    }

    fn create_buffer(&mut self, desc: &BufferDescriptor) -> Result<BufferKey, ContextError> {
        let key = self.buffers.insert(desc.size);
        self.log.record(HardwareCall::CreateBuffer(key));
        Ok(key)
    }

    fn write_buffer(&mut self, buffer: BufferKey, data: &[u8]) {
        self.log.record(HardwareCall::WriteBuffer {
            buffer,
            len: data.len(),
        });
    }

    fn destroy_buffer(&mut self, buffer: BufferKey) {
        self.buffers.remove(buffer);
        self.log.record(HardwareCall::DestroyBuffer(buffer));
    }

    fn create_texture(&mut self, desc: &TextureDescriptor) -> Result<TextureKey, ContextError> {
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
        let key = self.textures.insert(HeadlessTexture { desc: desc.clone() });
        self.log.record(HardwareCall::CreateTexture(key));
        Ok(key)
    }

    fn write_texture(&mut self, texture: TextureKey, level: u32, face: u32, _data: &[u8]) {
        self.log.record(HardwareCall::WriteTexture {
            texture,
            level,
            face,
        });
    }

    fn destroy_texture(&mut self, texture: TextureKey) {
        self.textures.remove(texture);
        self.log.record(HardwareCall::DestroyTexture(texture));
    }

    fn create_render_target(
        &mut self,
        desc: &RenderTargetDescriptor,
    ) -> Result<TargetKey, ContextError> {
        self.validate_target(desc)?;
        let key = self.targets.insert(desc.clone());
        self.log.record(HardwareCall::CreateRenderTarget(key));
        Ok(key)
    }

    fn destroy_render_target(&mut self, target: TargetKey) {
        self.targets.remove(target);
        self.log.record(HardwareCall::DestroyRenderTarget(target));
    }

    fn create_program(&mut self, program: &ProgramSource) -> Result<ProgramKey, ContextError> {
        debug!("Headless program {:?} created", program.name);
        let key = self.programs.insert(program.name.to_string());
        self.log.record(HardwareCall::CreateProgram {
            program: key,
            name: program.name.to_string(),
        });
        Ok(key)
    }

    fn destroy_program(&mut self, program: ProgramKey) {
        self.programs.remove(program);
        self.log.record(HardwareCall::DestroyProgram(program));
    }

    fn apply_depth_test(&mut self, enabled: bool) {
        self.log.record(HardwareCall::DepthTest(enabled));
    }

    fn apply_depth_write(&mut self, enabled: bool) {
        self.log.record(HardwareCall::DepthWrite(enabled));
    }

    fn apply_depth_func(&mut self, func: CompareFunction) {
        self.log.record(HardwareCall::DepthFunc(func));
    }

    fn apply_blending(&mut self, enabled: bool) {
        self.log.record(HardwareCall::Blending(enabled));
    }

    fn apply_blend_function(&mut self, function: BlendFunction) {
        self.log.record(HardwareCall::BlendFunction(function));
    }

    fn apply_blend_equation(&mut self, equation: BlendEquation) {
        self.log.record(HardwareCall::BlendEquation(equation));
    }

    fn apply_cull_mode(&mut self, mode: CullMode) {
        self.log.record(HardwareCall::CullMode(mode));
    }

    fn apply_color_write(&mut self, mask: ColorWrites) {
        self.log.record(HardwareCall::ColorWrite(mask));
    }

    fn apply_clear_color(&mut self, color: Color) {
        self.log.record(HardwareCall::ClearColor(color));
    }

    fn apply_clear_depth(&mut self, depth: f32) {
        self.log.record(HardwareCall::ClearDepth(depth));
    }

    fn apply_viewport(&mut self, rect: Rect) {
        self.log.record(HardwareCall::Viewport(rect));
    }

    fn apply_scissor(&mut self, rect: Rect) {
        self.log.record(HardwareCall::Scissor(rect));
    }

    fn bind_render_target(&mut self, target: Option<TargetKey>) {
        self.log.record(HardwareCall::BindRenderTarget(target));
    }

    fn bind_program(&mut self, program: ProgramKey) {
        self.program = Some(program);
        self.log.record(HardwareCall::BindProgram(program));
    }

    fn bind_vertex_attribute(&mut self, location: u32, attribute: &VertexAttributeBinding) {
        self.log.record(HardwareCall::VertexAttribute {
            location,
            buffer: attribute.buffer,
        });
    }

    fn bind_index_buffer(&mut self, buffer: Option<(BufferKey, IndexFormat)>) {
        self.log
            .record(HardwareCall::IndexBuffer(buffer.map(|(key, _)| key)));
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureKey) {
        self.log.record(HardwareCall::BindTexture { unit, texture });
    }

    fn commit_uniform(&mut self, program: ProgramKey, slot: &UniformSlot, _value: &UniformValue) {
        self.log.record(HardwareCall::CommitUniform {
            program,
            name: slot.name.to_string(),
        });
    }

    fn commit_sampler(&mut self, program: ProgramKey, binding: u32, units: &[u32]) {
        self.log.record(HardwareCall::CommitSampler {
            program,
            binding,
            units: units.to_vec(),
        });
    }

    fn clear(&mut self, flags: ClearFlags) {
        self.log.record(HardwareCall::Clear(flags));
    }

    fn draw(&mut self, primitive: &Primitive) {
        self.log.record(HardwareCall::Draw {
            program: self.program,
            count: primitive.count,
            indexed: primitive.indexed,
        });
    }

    fn flush(&mut self) {
        self.log.record(HardwareCall::Flush);
    }
}

use bitflags::bitflags;
use wgpu::{BlendFactor, BlendOperation, Color, ColorWrites, CompareFunction, PrimitiveTopology};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct BlendFunction {
    pub src_color: BlendFactor,
    pub dst_color: BlendFactor,
    pub src_alpha: BlendFactor,
    pub dst_alpha: BlendFactor,
}

impl BlendFunction {
    pub const REPLACE: BlendFunction = BlendFunction::uniform(BlendFactor::One, BlendFactor::Zero);
    pub const ALPHA: BlendFunction =
        BlendFunction::uniform(BlendFactor::SrcAlpha, BlendFactor::OneMinusSrcAlpha);
    pub const ADDITIVE: BlendFunction = BlendFunction::uniform(BlendFactor::One, BlendFactor::One);
    pub const PREMULTIPLIED: BlendFunction =
        BlendFunction::uniform(BlendFactor::One, BlendFactor::OneMinusSrcAlpha);

    pub const fn uniform(src: BlendFactor, dst: BlendFactor) -> Self {
        Self {
            src_color: src,
            dst_color: dst,
            src_alpha: src,
            dst_alpha: dst,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct BlendEquation {
    pub color: BlendOperation,
    pub alpha: BlendOperation,
}

impl BlendEquation {
    pub const ADD: BlendEquation = BlendEquation {
        color: BlendOperation::Add,
        alpha: BlendOperation::Add,
    };
    pub const REVERSE_SUBTRACT: BlendEquation = BlendEquation {
        color: BlendOperation::ReverseSubtract,
        alpha: BlendOperation::ReverseSubtract,
    };
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CullMode {
    #[default]
    None,
    Back,
    Front,
}

impl CullMode {
    pub fn face(self) -> Option<wgpu::Face> {
        match self {
            CullMode::None => None,
            CullMode::Back => Some(wgpu::Face::Back),
            CullMode::Front => Some(wgpu::Face::Front),
        }
    }
}

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct ClearFlags: u8 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
        const STENCIL = 1 << 2;
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ClearOptions {
    pub color: Color,
    pub depth: f32,
    pub flags: ClearFlags,
}

impl Default for ClearOptions {
    fn default() -> Self {
        Self {
            color: Color::BLACK,
            depth: 1.0,
            flags: ClearFlags::COLOR | ClearFlags::DEPTH,
        }
    }
}

/// Pixel rectangle, origin at the top-left corner of the target.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Maps a normalized rect onto a target of the given size, flooring to pixels.
    pub fn from_normalized(nx: f32, ny: f32, nw: f32, nh: f32, width: u32, height: u32) -> Self {
        let px = |v: f32, size: u32| (v.clamp(0.0, 1.0) * size as f32).floor() as u32;
        Self {
            x: px(nx, width),
            y: px(ny, height),
            width: px(nw, width),
            height: px(nh, height),
        }
    }

    /// Intersection with a `width` x `height` target.
    pub fn clamped(&self, width: u32, height: u32) -> Self {
        let x = self.x.min(width);
        let y = self.y.min(height);
        Self {
            x,
            y,
            width: self.width.min(width - x),
            height: self.height.min(height - y),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// A range of vertices or indices to draw.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Primitive {
    pub topology: PrimitiveTopology,
    pub base: u32,
    pub count: u32,
    pub indexed: bool,
}

impl Primitive {
    pub fn triangles(count: u32, indexed: bool) -> Self {
        Self {
            topology: PrimitiveTopology::TriangleList,
            base: 0,
            count,
            indexed,
        }
    }
}

/// Fixed-function state tracked by the device and mirrored by every context.
///
/// [`RenderState::default`] is the power-on state of a fresh context.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RenderState {
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_func: CompareFunction,
    pub blending: bool,
    pub blend_function: BlendFunction,
    pub blend_equation: BlendEquation,
    pub cull_mode: CullMode,
    pub color_write: ColorWrites,
    pub clear_color: Color,
    pub clear_depth: f32,
}

impl Default for RenderState {
    fn default() -> Self {
        Self {
            depth_test: false,
            depth_write: true,
            depth_func: CompareFunction::Less,
            blending: false,
            blend_function: BlendFunction::REPLACE,
            blend_equation: BlendEquation::ADD,
            cull_mode: CullMode::None,
            color_write: ColorWrites::ALL,
            clear_color: Color::TRANSPARENT,
            clear_depth: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_rect_is_floored() {
        let rect = Rect::from_normalized(0.5, 0.0, 0.5, 1.0, 801, 600);
        assert_eq!(rect, Rect::new(400, 0, 400, 600));
    }

    #[test]
    fn clamped_rect_stays_inside_target() {
        let rect = Rect::new(700, 500, 300, 300).clamped(800, 600);
        assert_eq!(rect, Rect::new(700, 500, 100, 100));
        assert!(Rect::new(900, 0, 10, 10).clamped(800, 600).is_empty());
    }
}

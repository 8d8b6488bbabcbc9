use crate::context::TextureKey;
use glamx::{Mat3, Mat4, Vec2, Vec3, Vec4};

/// Reflected type of a loose uniform in a program's uniform block.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum UniformType {
    Float,
    Int,
    Uint,
    Vec2,
    Vec3,
    Vec4,
    Mat3,
    Mat4,
    Vec4Array(u32),
    Mat4Array(u32),
}

impl UniformType {
    /// Bytes occupied inside a uniform block, including column padding.
    pub fn size(&self) -> usize {
        match self {
            UniformType::Float | UniformType::Int | UniformType::Uint => 4,
            UniformType::Vec2 => 8,
            UniformType::Vec3 => 12,
            UniformType::Vec4 => 16,
            UniformType::Mat3 => 48,
            UniformType::Mat4 => 64,
            UniformType::Vec4Array(len) => 16 * *len as usize,
            UniformType::Mat4Array(len) => 64 * *len as usize,
        }
    }
}

/// A value stored in a scope variable.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    Uint(u32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Mat3([f32; 9]),
    Mat4([f32; 16]),
    Vec4Array(Vec<[f32; 4]>),
    Mat4Array(Vec<[f32; 16]>),
    Texture(TextureKey),
    TextureArray(Vec<TextureKey>),
}

impl UniformValue {
    pub fn is_texture(&self) -> bool {
        matches!(self, UniformValue::Texture(_) | UniformValue::TextureArray(_))
    }

    /// Whether this value can be committed into a uniform of type `ty`.
    pub fn matches(&self, ty: UniformType) -> bool {
        matches!(
            (self, ty),
            (UniformValue::Float(_), UniformType::Float)
                | (UniformValue::Int(_), UniformType::Int)
                | (UniformValue::Uint(_), UniformType::Uint)
                | (UniformValue::Vec2(_), UniformType::Vec2)
                | (UniformValue::Vec3(_), UniformType::Vec3)
                | (UniformValue::Vec4(_), UniformType::Vec4)
                | (UniformValue::Mat3(_), UniformType::Mat3)
                | (UniformValue::Mat4(_), UniformType::Mat4)
                | (UniformValue::Vec4Array(_), UniformType::Vec4Array(_))
                | (UniformValue::Mat4Array(_), UniformType::Mat4Array(_))
        )
    }

    /// Writes the value with uniform-block layout into `out`, which starts at the
    /// uniform's offset. Arrays longer than the declared length are truncated.
    /// Returns `false` without writing if the types do not match.
    pub fn write_to(&self, ty: UniformType, out: &mut [u8]) -> bool {
        if !self.matches(ty) || out.len() < ty.size() {
            return false;
        }

        match self {
            UniformValue::Float(v) => out[..4].copy_from_slice(bytemuck::bytes_of(v)),
            UniformValue::Int(v) => out[..4].copy_from_slice(bytemuck::bytes_of(v)),
            UniformValue::Uint(v) => out[..4].copy_from_slice(bytemuck::bytes_of(v)),
            UniformValue::Vec2(v) => out[..8].copy_from_slice(bytemuck::cast_slice(v)),
            UniformValue::Vec3(v) => out[..12].copy_from_slice(bytemuck::cast_slice(v)),
            UniformValue::Vec4(v) => out[..16].copy_from_slice(bytemuck::cast_slice(v)),
            UniformValue::Mat3(m) => {
                for (column, chunk) in m.chunks_exact(3).enumerate() {
                    let start = column * 16;
                    out[start..start + 12].copy_from_slice(bytemuck::cast_slice(chunk));
                }
            }
            UniformValue::Mat4(m) => out[..64].copy_from_slice(bytemuck::cast_slice(m)),
            UniformValue::Vec4Array(items) => {
                let UniformType::Vec4Array(len) = ty else {
                    return false;
                };
                for (i, item) in items.iter().take(len as usize).enumerate() {
                    out[i * 16..(i + 1) * 16].copy_from_slice(bytemuck::cast_slice(item));
                }
            }
            UniformValue::Mat4Array(items) => {
                let UniformType::Mat4Array(len) = ty else {
                    return false;
                };
                for (i, item) in items.iter().take(len as usize).enumerate() {
                    out[i * 64..(i + 1) * 64].copy_from_slice(bytemuck::cast_slice(item));
                }
            }
            UniformValue::Texture(_) | UniformValue::TextureArray(_) => return false,
        }

        true
    }
}

impl From<f32> for UniformValue {
    fn from(value: f32) -> Self {
        UniformValue::Float(value)
    }
}

impl From<i32> for UniformValue {
    fn from(value: i32) -> Self {
        UniformValue::Int(value)
    }
}

impl From<u32> for UniformValue {
    fn from(value: u32) -> Self {
        UniformValue::Uint(value)
    }
}

impl From<bool> for UniformValue {
    fn from(value: bool) -> Self {
        UniformValue::Int(value as i32)
    }
}

impl From<Vec2> for UniformValue {
    fn from(value: Vec2) -> Self {
        UniformValue::Vec2(value.to_array())
    }
}

impl From<Vec3> for UniformValue {
    fn from(value: Vec3) -> Self {
        UniformValue::Vec3(value.to_array())
    }
}

impl From<Vec4> for UniformValue {
    fn from(value: Vec4) -> Self {
        UniformValue::Vec4(value.to_array())
    }
}

impl From<Mat3> for UniformValue {
    fn from(value: Mat3) -> Self {
        UniformValue::Mat3(value.to_cols_array())
    }
}

impl From<Mat4> for UniformValue {
    fn from(value: Mat4) -> Self {
        UniformValue::Mat4(value.to_cols_array())
    }
}

impl From<&[Mat4]> for UniformValue {
    fn from(value: &[Mat4]) -> Self {
        UniformValue::Mat4Array(value.iter().map(Mat4::to_cols_array).collect())
    }
}

impl From<TextureKey> for UniformValue {
    fn from(value: TextureKey) -> Self {
        UniformValue::Texture(value)
    }
}

use bytemuck::{Pod, Zeroable};
use glamx::{Vec2, Vec3, Vec4};
use ignis_device::wgpu::{IndexFormat, VertexFormat as AttributeFormat};
use ignis_device::{
    Device, DeviceError, IndexBuffer, Primitive, Semantic, VertexBuffer, VertexFormat,
};
use ignis_utils::{BoundingBox, BoundingSphere};
use std::sync::{Arc, LazyLock};
use tracing::debug;

/// The interleaved vertex every mesh is stored with.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct Vertex3D {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv0: [f32; 2],
    pub uv1: [f32; 2],
    pub color: [f32; 4],
    pub bone_weights: [f32; 4],
    pub bone_indices: [u32; 4],
}

static VERTEX_FORMAT: LazyLock<Arc<VertexFormat>> = LazyLock::new(|| {
    Arc::new(VertexFormat::new(&[
        (Semantic::Position, AttributeFormat::Float32x3),
        (Semantic::Normal, AttributeFormat::Float32x3),
        (Semantic::TexCoord0, AttributeFormat::Float32x2),
        (Semantic::TexCoord1, AttributeFormat::Float32x2),
        (Semantic::Color, AttributeFormat::Float32x4),
        (Semantic::BlendWeight, AttributeFormat::Float32x4),
        (Semantic::BlendIndices, AttributeFormat::Uint32x4),
    ]))
});

impl Vertex3D {
    pub fn basic(position: Vec3, uv: Vec2, normal: Vec3) -> Self {
        Self {
            position: position.to_array(),
            normal: normal.to_array(),
            uv0: uv.to_array(),
            uv1: uv.to_array(),
            color: [1.0; 4],
            bone_weights: [0.0; 4],
            bone_indices: [0; 4],
        }
    }

    pub fn with_color(mut self, color: Vec4) -> Self {
        self.color = color.to_array();
        self
    }

    pub fn with_bones(mut self, indices: [u32; 4], weights: [f32; 4]) -> Self {
        self.bone_indices = indices;
        self.bone_weights = weights;
        self
    }

    pub fn format() -> Arc<VertexFormat> {
        VERTEX_FORMAT.clone()
    }
}

/// Vertex and optional index buffer of one drawable range, with its local bounds.
#[derive(Debug)]
pub struct Mesh {
    vertex_buffer: VertexBuffer,
    index_buffer: Option<IndexBuffer>,
    primitive: Primitive,
    bounds: BoundingBox,
    skinned: bool,
}

impl Mesh {
    pub fn new(
        device: &mut Device,
        label: &str,
        vertices: &[Vertex3D],
        indices: Option<&[u32]>,
    ) -> Result<Self, DeviceError> {
        let mut vertex_buffer =
            device.create_vertex_buffer(label, Vertex3D::format(), vertices.len() as u32)?;
        vertex_buffer
            .lock()
            .copy_from_slice(bytemuck::cast_slice(vertices));
        device.upload_vertex_buffer(&vertex_buffer);

        let index_buffer = match indices {
            Some(indices) => {
                let wide = vertices.len() > u16::MAX as usize;
                let format = if wide {
                    IndexFormat::Uint32
                } else {
                    IndexFormat::Uint16
                };
                let mut buffer = device.create_index_buffer(label, format, indices.len() as u32)?;
                if wide {
                    buffer.lock().copy_from_slice(bytemuck::cast_slice(indices));
                } else {
                    let narrow: Vec<u16> = indices.iter().map(|&i| i as u16).collect();
                    buffer.lock().copy_from_slice(bytemuck::cast_slice(&narrow));
                }
                device.upload_index_buffer(&buffer);
                Some(buffer)
            }
            None => None,
        };

        let count = indices.map_or(vertices.len(), <[u32]>::len) as u32;
        let positions: Vec<Vec3> = vertices.iter().map(|v| Vec3::from(v.position)).collect();
        let bounds = BoundingBox::from_points(&positions);
        let skinned = vertices.iter().any(|v| v.bone_weights != [0.0; 4]);

        debug!("Created mesh {label:?} with {} vertices", vertices.len());
        Ok(Self {
            vertex_buffer,
            index_buffer,
            primitive: Primitive::triangles(count, indices.is_some()),
            bounds,
            skinned,
        })
    }

    /// An axis aligned cube centered on the origin with outward normals.
    pub fn cube(device: &mut Device, half_extent: f32) -> Result<Self, DeviceError> {
        const FACES: [(Vec3, Vec3, Vec3); 6] = [
            (Vec3::X, Vec3::NEG_Z, Vec3::Y),
            (Vec3::NEG_X, Vec3::Z, Vec3::Y),
            (Vec3::Y, Vec3::X, Vec3::NEG_Z),
            (Vec3::NEG_Y, Vec3::X, Vec3::Z),
            (Vec3::Z, Vec3::X, Vec3::Y),
            (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
        ];

        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for (normal, right, up) in FACES {
            let base = vertices.len() as u32;
            for (u, v) in [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)] {
                let offset = right * (u * 2.0 - 1.0) + up * (v * 2.0 - 1.0);
                let position = (normal + offset) * half_extent;
                vertices.push(Vertex3D::basic(position, Vec2::new(u, 1.0 - v), normal));
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        Self::new(device, "Cube", &vertices, Some(&indices))
    }

    /// A square in the XZ plane facing up.
    pub fn plane(device: &mut Device, half_extent: f32) -> Result<Self, DeviceError> {
        let corners = [(-1.0, 1.0), (1.0, 1.0), (1.0, -1.0), (-1.0, -1.0)];
        let vertices: Vec<Vertex3D> = corners
            .iter()
            .map(|&(x, z)| {
                Vertex3D::basic(
                    Vec3::new(x, 0.0, z) * half_extent,
                    Vec2::new((x + 1.0) * 0.5, (z + 1.0) * 0.5),
                    Vec3::Y,
                )
            })
            .collect();

        Self::new(device, "Plane", &vertices, Some(&[0, 1, 2, 0, 2, 3]))
    }

    pub fn vertex_buffer(&self) -> &VertexBuffer {
        &self.vertex_buffer
    }

    pub fn index_buffer(&self) -> Option<&IndexBuffer> {
        self.index_buffer.as_ref()
    }

    pub fn primitive(&self) -> &Primitive {
        &self.primitive
    }

    /// Restricts drawing to a sub-range of the indices, or vertices for non-indexed meshes.
    pub fn set_range(&mut self, base: u32, count: u32) {
        self.primitive.base = base;
        self.primitive.count = count;
    }

    pub fn bounds(&self) -> &BoundingBox {
        &self.bounds
    }

    pub fn bounding_sphere(&self) -> BoundingSphere {
        self.bounds.bounding_sphere()
    }

    /// Whether any vertex carries bone weights.
    pub fn is_skinned(&self) -> bool {
        self.skinned
    }

    pub fn destroy(self, device: &mut Device) {
        device.destroy_vertex_buffer(self.vertex_buffer);
        if let Some(index_buffer) = self.index_buffer {
            device.destroy_index_buffer(index_buffer);
        }
    }
}

use crate::context::BufferKey;
use std::sync::Arc;
use wgpu::IndexFormat;

/// What a vertex element means to a program, independent of its attribute location.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Semantic {
    Position,
    Normal,
    Tangent,
    BlendWeight,
    BlendIndices,
    Color,
    TexCoord0,
    TexCoord1,
    Attr0,
    Attr1,
    Attr2,
    Attr3,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct VertexElement {
    pub semantic: Semantic,
    pub format: wgpu::VertexFormat,
    pub offset: u64,
}

/// Interleaved layout of one vertex buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexFormat {
    elements: Vec<VertexElement>,
    stride: u64,
}

impl VertexFormat {
    /// Packs the elements tightly in the given order.
    pub fn new(elements: &[(Semantic, wgpu::VertexFormat)]) -> Self {
        let mut offset = 0;
        let elements = elements
            .iter()
            .map(|(semantic, format)| {
                let element = VertexElement {
                    semantic: *semantic,
                    format: *format,
                    offset,
                };
                offset += format.size();
                element
            })
            .collect();

        Self {
            elements,
            stride: offset,
        }
    }

    pub fn elements(&self) -> &[VertexElement] {
        &self.elements
    }

    pub fn element(&self, semantic: Semantic) -> Option<&VertexElement> {
        self.elements.iter().find(|e| e.semantic == semantic)
    }

    pub fn stride(&self) -> u64 {
        self.stride
    }
}

/// A vertex buffer with its CPU-side staging copy.
///
/// Writes go to [`VertexBuffer::lock`]; [`crate::Device::upload_vertex_buffer`]
/// pushes the staging data to hardware.
#[derive(Debug)]
pub struct VertexBuffer {
    pub(crate) key: BufferKey,
    format: Arc<VertexFormat>,
    num_vertices: u32,
    storage: Vec<u8>,
}

impl VertexBuffer {
    pub(crate) fn new(key: BufferKey, format: Arc<VertexFormat>, num_vertices: u32) -> Self {
        let size = format.stride() as usize * num_vertices as usize;
        Self {
            key,
            format,
            num_vertices,
            storage: vec![0; size],
        }
    }

    pub fn key(&self) -> BufferKey {
        self.key
    }

    pub fn format(&self) -> &Arc<VertexFormat> {
        &self.format
    }

    pub fn num_vertices(&self) -> u32 {
        self.num_vertices
    }

    pub fn lock(&mut self) -> &mut [u8] {
        &mut self.storage
    }

    pub fn storage(&self) -> &[u8] {
        &self.storage
    }
}

#[derive(Debug)]
pub struct IndexBuffer {
    pub(crate) key: BufferKey,
    format: IndexFormat,
    num_indices: u32,
    storage: Vec<u8>,
}

impl IndexBuffer {
    pub(crate) fn new(key: BufferKey, format: IndexFormat, num_indices: u32) -> Self {
        let size = index_size(format) * num_indices as usize;
        Self {
            key,
            format,
            num_indices,
            storage: vec![0; size],
        }
    }

    pub fn key(&self) -> BufferKey {
        self.key
    }

    pub fn format(&self) -> IndexFormat {
        self.format
    }

    pub fn num_indices(&self) -> u32 {
        self.num_indices
    }

    pub fn lock(&mut self) -> &mut [u8] {
        &mut self.storage
    }

    pub fn storage(&self) -> &[u8] {
        &self.storage
    }
}

pub fn index_size(format: IndexFormat) -> usize {
    match format {
        IndexFormat::Uint16 => 2,
        IndexFormat::Uint32 => 4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wgpu::VertexFormat as Vf;

    #[test]
    fn elements_are_packed_in_order() {
        let format = VertexFormat::new(&[
            (Semantic::Position, Vf::Float32x3),
            (Semantic::Normal, Vf::Float32x3),
            (Semantic::TexCoord0, Vf::Float32x2),
        ]);

        assert_eq!(format.stride(), 32);
        assert_eq!(format.element(Semantic::Normal).unwrap().offset, 12);
        assert_eq!(format.element(Semantic::TexCoord0).unwrap().offset, 24);
        assert!(format.element(Semantic::Color).is_none());
    }
}

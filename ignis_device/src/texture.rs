use crate::context::{TargetKey, TextureDescriptor, TextureKey};

/// A texture with per-miplevel, per-face CPU storage.
#[derive(Debug)]
pub struct Texture {
    pub(crate) key: TextureKey,
    desc: TextureDescriptor,
    /// Indexed by `[level][face]`.
    levels: Vec<Vec<Option<Vec<u8>>>>,
}

impl Texture {
    pub(crate) fn new(key: TextureKey, desc: TextureDescriptor) -> Self {
        let faces = desc.faces() as usize;
        let levels = (0..desc.mip_level_count).map(|_| vec![None; faces]).collect();
        Self { key, desc, levels }
    }

    pub fn key(&self) -> TextureKey {
        self.key
    }

    pub fn descriptor(&self) -> &TextureDescriptor {
        &self.desc
    }

    pub fn width(&self) -> u32 {
        self.desc.width
    }

    pub fn height(&self) -> u32 {
        self.desc.height
    }

    /// Replaces one level of one face. Returns `false` if the level or face is out of range.
    pub fn set_level(&mut self, level: u32, face: u32, data: Vec<u8>) -> bool {
        let Some(slot) = self
            .levels
            .get_mut(level as usize)
            .and_then(|faces| faces.get_mut(face as usize))
        else {
            return false;
        };
        *slot = Some(data);
        true
    }

    pub fn level(&self, level: u32, face: u32) -> Option<&[u8]> {
        self.levels
            .get(level as usize)?
            .get(face as usize)?
            .as_deref()
    }

    /// Every stored `(level, face, data)` triple.
    pub fn stored_levels(&self) -> impl Iterator<Item = (u32, u32, &[u8])> {
        self.levels.iter().enumerate().flat_map(|(level, faces)| {
            faces.iter().enumerate().filter_map(move |(face, data)| {
                data.as_deref().map(|data| (level as u32, face as u32, data))
            })
        })
    }
}

/// A color texture (or one of its cube faces) with an optional depth attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderTarget {
    pub(crate) key: TargetKey,
    width: u32,
    height: u32,
    color: Option<TextureKey>,
    depth_texture: Option<TextureKey>,
}

impl RenderTarget {
    pub(crate) fn new(
        key: TargetKey,
        width: u32,
        height: u32,
        color: Option<TextureKey>,
        depth_texture: Option<TextureKey>,
    ) -> Self {
        Self {
            key,
            width,
            height,
            color,
            depth_texture,
        }
    }

    pub fn key(&self) -> TargetKey {
        self.key
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn color(&self) -> Option<TextureKey> {
        self.color
    }

    pub fn depth_texture(&self) -> Option<TextureKey> {
        self.depth_texture
    }
}

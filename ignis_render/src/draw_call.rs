use crate::scene::{MaterialKey, MeshKey, ModelKey};
use glamx::Mat4;
use ignis_device::{Device, Texture};
use ignis_shadergen::BlendType;
use std::cmp::Ordering;
use std::fmt::{self, Debug, Formatter};

/// Coarse draw order bucket. Higher layers draw first.
#[repr(u32)]
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Layer {
    Hud = 0,
    Gizmo = 1,
    Fx = 2,
    #[default]
    World = 3,
}

/// Bone palette of a skinned instance, in world space.
#[derive(Debug, Default)]
pub struct Skin {
    pub bones: Vec<Mat4>,
    pub(crate) texture: Option<Texture>,
}

impl Skin {
    pub fn new(bones: Vec<Mat4>) -> Self {
        Self {
            bones,
            texture: None,
        }
    }
}

/// A mesh drawn with a material at a world transform.
#[derive(Debug)]
pub struct MeshInstance {
    pub mesh: MeshKey,
    pub material: MaterialKey,
    pub transform: Mat4,
    pub layer: Layer,
    pub cast_shadows: bool,
    pub enabled: bool,
    pub skin: Option<Skin>,
}

impl MeshInstance {
    pub fn new(mesh: MeshKey, material: MaterialKey, transform: Mat4) -> Self {
        Self {
            mesh,
            material,
            transform,
            layer: Layer::World,
            cast_shadows: true,
            enabled: true,
            skin: None,
        }
    }

    pub fn with_layer(mut self, layer: Layer) -> Self {
        self.layer = layer;
        self
    }

    pub fn with_skin(mut self, bones: Vec<Mat4>) -> Self {
        self.skin = Some(Skin::new(bones));
        self
    }
}

pub type DrawCommand = Box<dyn FnMut(&mut Device)>;

pub enum DrawKind {
    Mesh(MeshInstance),
    /// Arbitrary device work at a fixed point of the draw order.
    Command(Layer, DrawCommand),
}

impl Debug for DrawKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            DrawKind::Mesh(instance) => f.debug_tuple("Mesh").field(instance).finish(),
            DrawKind::Command(layer, _) => f.debug_tuple("Command").field(layer).finish(),
        }
    }
}

#[derive(Debug)]
pub struct DrawCall {
    pub(crate) owner: Option<ModelKey>,
    pub kind: DrawKind,
}

impl DrawCall {
    pub fn owner(&self) -> Option<ModelKey> {
        self.owner
    }

    pub fn layer(&self) -> Layer {
        match &self.kind {
            DrawKind::Mesh(instance) => instance.layer,
            DrawKind::Command(layer, _) => *layer,
        }
    }

    pub fn instance(&self) -> Option<&MeshInstance> {
        match &self.kind {
            DrawKind::Mesh(instance) => Some(instance),
            DrawKind::Command(..) => None,
        }
    }

    pub fn instance_mut(&mut self) -> Option<&mut MeshInstance> {
        match &mut self.kind {
            DrawKind::Mesh(instance) => Some(instance),
            DrawKind::Command(..) => None,
        }
    }
}

/// `(layer << 28) | (blend << 26) | (command << 25) | material`.
pub fn sort_key(layer: Layer, blend_type: BlendType, is_command: bool, material_id: u32) -> u32 {
    ((layer as u32) << 28)
        | ((blend_type as u32 & 0b11) << 26)
        | ((is_command as u32) << 25)
        | (material_id & 0x01ff_ffff)
}

/// Per-frame ordering data of one draw call.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SortItem {
    pub index: usize,
    pub layer: Layer,
    pub key: u32,
    /// Squared camera distance, only present for blended world geometry.
    pub distance: Option<f32>,
}

fn compare(a: &SortItem, b: &SortItem) -> Ordering {
    b.layer.cmp(&a.layer).then_with(|| match (a.distance, b.distance) {
        (Some(da), Some(db)) => db.total_cmp(&da),
        (None, None) => b.key.cmp(&a.key),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
    })
}

/// Orders items by descending layer, then opaque items by descending key, then
/// distance-sorted items back to front. Ties keep their submission order.
pub fn sort_draw_calls(items: &mut [SortItem]) {
    items.sort_by(compare);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(index: usize, layer: Layer, key: u32, distance: Option<f32>) -> SortItem {
        SortItem {
            index,
            layer,
            key,
            distance,
        }
    }

    #[test]
    fn key_packs_every_field() {
        let key = sort_key(Layer::World, BlendType::Normal, true, 7);
        assert_eq!(key >> 28, 3);
        assert_eq!((key >> 26) & 0b11, 2);
        assert_eq!((key >> 25) & 1, 1);
        assert_eq!(key & 0x01ff_ffff, 7);
    }

    #[test]
    fn blended_items_draw_back_to_front_after_opaque() {
        let mut items = vec![
            item(0, Layer::World, 1, Some(1.0)),
            item(1, Layer::World, 5, None),
            item(2, Layer::World, 1, Some(9.0)),
            item(3, Layer::Hud, 9, None),
        ];
        sort_draw_calls(&mut items);
        let order: Vec<usize> = items.iter().map(|i| i.index).collect();
        assert_eq!(order, [1, 2, 0, 3]);
    }

    #[test]
    fn opaque_order_depends_only_on_the_key() {
        let a = sort_key(Layer::World, BlendType::None, false, 1);
        let b = sort_key(Layer::World, BlendType::None, false, 2);
        let forward = [item(0, Layer::World, a, None), item(1, Layer::World, b, None)];
        let mut reversed = [forward[1], forward[0]];
        let mut forward = forward;

        sort_draw_calls(&mut forward);
        sort_draw_calls(&mut reversed);
        assert_eq!(forward[0].key, reversed[0].key);
        assert_eq!(forward[1].key, reversed[1].key);
    }
}

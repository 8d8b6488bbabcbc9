use crate::draw_call::{DrawCall, DrawCommand, DrawKind, Layer, MeshInstance};
use crate::lighting::{Light, ShadowMap};
use crate::material::Material;
use crate::mesh::Mesh;
use glamx::Vec3;
use ignis_device::{Device, Texture, TextureKey};
use ignis_shadergen::{Encoding, FogMode, Gamma, OutputOptions, Tonemap};
use slotmap::{SlotMap, new_key_type};
use tracing::{debug, trace, warn};

new_key_type! {
    pub struct MeshKey;
    pub struct MaterialKey;
    pub struct ModelKey;
    pub struct LightKey;
}

/// Global look of a scene.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneLook {
    pub ambient: Vec3,
    pub fog: FogMode,
    pub fog_color: Vec3,
    pub fog_start: f32,
    pub fog_end: f32,
    pub fog_density: f32,
    pub gamma: Gamma,
    pub tonemap: Tonemap,
    pub exposure: f32,
    pub skybox: Option<TextureKey>,
    pub skybox_encoding: Encoding,
}

impl Default for SceneLook {
    fn default() -> Self {
        Self {
            ambient: Vec3::ZERO,
            fog: FogMode::None,
            fog_color: Vec3::ZERO,
            fog_start: 1.0,
            fog_end: 1000.0,
            fog_density: 0.0,
            gamma: Gamma::None,
            tonemap: Tonemap::Linear,
            exposure: 1.0,
            skybox: None,
            skybox_encoding: Encoding::Linear,
        }
    }
}

impl SceneLook {
    pub fn output(&self) -> OutputOptions {
        OutputOptions {
            fog: self.fog,
            tonemap: self.tonemap,
            gamma: self.gamma,
        }
    }
}

/// Mesh instances and lights added and removed together.
#[derive(Debug, Default)]
pub struct Model {
    pub instances: Vec<MeshInstance>,
    pub lights: Vec<Light>,
}

impl Model {
    pub fn with_instance(mut self, instance: MeshInstance) -> Self {
        self.instances.push(instance);
        self
    }

    pub fn with_light(mut self, light: Light) -> Self {
        self.lights.push(light);
        self
    }
}

#[derive(Debug, Default)]
struct ModelEntry {
    lights: Vec<LightKey>,
}

/// Resources of removed objects, released by the renderer at the start of the next frame.
#[derive(Debug, Default)]
pub(crate) struct Graveyard {
    pub(crate) textures: Vec<Texture>,
    pub(crate) shadow_maps: Vec<ShadowMap>,
    pub(crate) meshes: Vec<Mesh>,
}

impl Graveyard {
    pub(crate) fn release(&mut self, device: &mut Device) {
        let count = self.textures.len() + self.shadow_maps.len() + self.meshes.len();
        if count == 0 {
            return;
        }
        trace!("Releasing {count} retired resources");
        for texture in self.textures.drain(..) {
            device.destroy_texture(texture);
        }
        for map in self.shadow_maps.drain(..) {
            map.destroy(device);
        }
        for mesh in self.meshes.drain(..) {
            mesh.destroy(device);
        }
    }
}

/// Everything the renderer draws in a frame.
#[derive(Debug, Default)]
pub struct Scene {
    pub(crate) meshes: SlotMap<MeshKey, Mesh>,
    pub(crate) materials: SlotMap<MaterialKey, Material>,
    models: SlotMap<ModelKey, ModelEntry>,
    pub(crate) lights: SlotMap<LightKey, Light>,
    pub(crate) draw_calls: Vec<DrawCall>,
    look: SceneLook,
    next_material_id: u32,

    /// Set by changes that alter shader options. Every material is re-derived before
    /// the next main pass.
    pub update_shaders: bool,
    pub(crate) graveyard: Graveyard,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn look(&self) -> &SceneLook {
        &self.look
    }

    pub fn set_look(&mut self, look: SceneLook) {
        if look.output() != self.look.output() {
            self.update_shaders = true;
        }
        self.look = look;
    }

    pub fn set_ambient(&mut self, ambient: Vec3) {
        self.look.ambient = ambient;
    }

    pub fn set_fog(&mut self, fog: FogMode, color: Vec3) {
        self.update_shaders |= self.look.fog != fog;
        self.look.fog = fog;
        self.look.fog_color = color;
    }

    // Meshes and materials

    pub fn add_mesh(&mut self, mesh: Mesh) -> MeshKey {
        self.meshes.insert(mesh)
    }

    pub fn mesh(&self, key: MeshKey) -> Option<&Mesh> {
        self.meshes.get(key)
    }

    /// Retires a mesh. Draw calls still referencing it are skipped.
    pub fn remove_mesh(&mut self, key: MeshKey) {
        if let Some(mesh) = self.meshes.remove(key) {
            self.graveyard.meshes.push(mesh);
        }
    }

    /// Adds a material and assigns the id its draw calls sort by.
    pub fn add_material(&mut self, mut material: Material) -> MaterialKey {
        self.next_material_id += 1;
        material.id = self.next_material_id;
        self.materials.insert(material)
    }

    pub fn material(&self, key: MaterialKey) -> Option<&Material> {
        self.materials.get(key)
    }

    pub fn material_mut(&mut self, key: MaterialKey) -> Option<&mut Material> {
        self.materials.get_mut(key)
    }

    // Models

    /// Registers every instance and light of the model.
    pub fn add_model(&mut self, model: Model) -> ModelKey {
        let key = self.models.insert(ModelEntry::default());

        let instances = model.instances.len();
        self.draw_calls
            .extend(model.instances.into_iter().map(|instance| DrawCall {
                owner: Some(key),
                kind: DrawKind::Mesh(instance),
            }));

        let lights: Vec<LightKey> = model
            .lights
            .into_iter()
            .map(|light| self.add_light(light))
            .collect();
        if let Some(entry) = self.models.get_mut(key) {
            entry.lights = lights;
        }

        debug!("Added model with {instances} instances");
        key
    }

    /// Unregisters everything the model added.
    pub fn remove_model(&mut self, key: ModelKey) {
        let Some(entry) = self.models.remove(key) else {
            warn!("Tried to remove an unknown model");
            return;
        };

        let graveyard = &mut self.graveyard;
        self.draw_calls.retain_mut(|call| {
            if call.owner != Some(key) {
                return true;
            }
            if let DrawKind::Mesh(instance) = &mut call.kind {
                graveyard
                    .textures
                    .extend(instance.skin.as_mut().and_then(|skin| skin.texture.take()));
            }
            false
        });

        for light in entry.lights {
            self.remove_light(light);
        }
    }

    pub fn model_instances(&self, key: ModelKey) -> impl Iterator<Item = &MeshInstance> {
        self.draw_calls
            .iter()
            .filter(move |call| call.owner == Some(key))
            .filter_map(DrawCall::instance)
    }

    /// Instances of a model, for transform and skin updates.
    pub fn model_instances_mut(
        &mut self,
        key: ModelKey,
    ) -> impl Iterator<Item = &mut MeshInstance> {
        self.draw_calls
            .iter_mut()
            .filter(move |call| call.owner == Some(key))
            .filter_map(DrawCall::instance_mut)
    }

    pub fn model_lights(&self, key: ModelKey) -> &[LightKey] {
        self.models
            .get(key)
            .map(|entry| entry.lights.as_slice())
            .unwrap_or_default()
    }

    /// Adds a callback run at its place in the draw order of `layer`.
    pub fn add_command(&mut self, layer: Layer, command: DrawCommand) {
        self.draw_calls.push(DrawCall {
            owner: None,
            kind: DrawKind::Command(layer, command),
        });
    }

    pub fn draw_calls(&self) -> &[DrawCall] {
        &self.draw_calls
    }

    // Lights

    pub fn add_light(&mut self, light: Light) -> LightKey {
        self.update_shaders = true;
        self.lights.insert(light)
    }

    pub fn remove_light(&mut self, key: LightKey) {
        if let Some(mut light) = self.lights.remove(key) {
            light.release_shadow(&mut self.graveyard.shadow_maps);
            self.update_shaders = true;
        }
    }

    pub fn light(&self, key: LightKey) -> Option<&Light> {
        self.lights.get(key)
    }

    pub fn light_mut(&mut self, key: LightKey) -> Option<&mut Light> {
        self.lights.get_mut(key)
    }

    pub fn lights(&self) -> impl Iterator<Item = (LightKey, &Light)> {
        self.lights.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glamx::{Mat4, Vec4};

    fn instance(scene: &mut Scene) -> MeshInstance {
        let material = scene.add_material(Material::basic("flat", Vec4::ONE));
        MeshInstance::new(MeshKey::default(), material, Mat4::IDENTITY)
    }

    #[test]
    fn models_register_and_unregister_exactly_once() {
        let mut scene = Scene::new();
        let first = instance(&mut scene);
        let second = instance(&mut scene);
        let model = Model::default()
            .with_instance(first)
            .with_instance(second)
            .with_light(Light::point("lamp", Vec3::Y, 5.0));

        let key = scene.add_model(model);
        assert_eq!(scene.draw_calls().len(), 2);
        assert_eq!(scene.lights().count(), 1);
        assert_eq!(scene.model_lights(key).len(), 1);

        scene.remove_model(key);
        assert!(scene.draw_calls().is_empty());
        assert_eq!(scene.lights().count(), 0);

        scene.remove_model(key);
        assert!(scene.draw_calls().is_empty());
    }

    #[test]
    fn removing_a_model_keeps_other_draw_calls() {
        let mut scene = Scene::new();
        let kept = instance(&mut scene);
        let removed = instance(&mut scene);
        let keep = scene.add_model(Model::default().with_instance(kept));
        let drop = scene.add_model(Model::default().with_instance(removed));
        scene.add_command(Layer::Hud, Box::new(|_| {}));

        scene.remove_model(drop);
        assert_eq!(scene.draw_calls().len(), 2);
        assert_eq!(scene.model_instances(keep).count(), 1);
    }

    #[test]
    fn shader_relevant_changes_raise_the_flag() {
        let mut scene = Scene::new();
        scene.set_ambient(Vec3::splat(0.2));
        assert!(!scene.update_shaders);

        scene.set_fog(FogMode::Linear, Vec3::ONE);
        assert!(scene.update_shaders);

        scene.update_shaders = false;
        scene.add_light(Light::directional("sun", Vec3::NEG_Y));
        assert!(scene.update_shaders);
    }

    #[test]
    fn materials_get_increasing_ids() {
        let mut scene = Scene::new();
        let a = scene.add_material(Material::basic("a", Vec4::ONE));
        let b = scene.add_material(Material::basic("b", Vec4::ONE));
        let ids = (scene.material(a).map(Material::id), scene.material(b).map(Material::id));
        assert_eq!(ids, (Some(1), Some(2)));
    }
}

use crate::camera::Camera;
use crate::draw_call::{
    DrawCall, DrawKind, Layer, MeshInstance, SortItem, sort_draw_calls, sort_key,
};
use crate::lighting::shadow::{ShadowCamera, fit_directional, point_face_camera, spot_camera};
use crate::lighting::{Light, ShadowMap};
use crate::material::{Material, ShaderContext};
use crate::mesh::Mesh;
use crate::rendering::RendererSettings;
use crate::scene::{LightKey, MaterialKey, MeshKey, Scene, SceneLook};
use glamx::{Mat3, Mat4, Vec3, Vec4};
use ignis_device::wgpu::{Color, ColorWrites, CompareFunction, FilterMode, TextureFormat};
use ignis_device::{
    ClearFlags, ClearOptions, CullMode, DepthAttachment, Device, ProgramId, Rect, RenderTarget,
    RenderTargetDescriptor, ScopeSpace, Texture, TextureDescriptor,
};
use ignis_shadergen::{
    BlendType, DepthOptions, LightKind, LightOptions, ProgramLibrary, ShadowMode, SkinMode,
    SkyboxOptions,
};
use ignis_utils::{Frustum, debug_panic};
use slotmap::SlotMap;
use std::collections::HashMap;
use tracing::{debug, instrument, trace, warn};

/// Widest row of a bone palette texture, in texels.
const MAX_POSE_WIDTH: usize = 1024;

/// Counters of the last rendered frame.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct RenderStats {
    pub draw_calls: u32,
    pub shadow_draw_calls: u32,
    pub culled: u32,
    pub shadow_maps: u32,
}

#[derive(Debug)]
struct DepthTarget {
    target: RenderTarget,
    texture: Texture,
}

/// How casters are written in a depth-only pass.
#[derive(Debug, Copy, Clone)]
struct DepthPass {
    view_projection: Mat4,
    /// Writes packed distance to `view_position` instead of window depth.
    point: bool,
    /// Writes depth into the color attachment.
    color: bool,
    /// Only casters intersecting this frustum are drawn.
    frustum: Option<Frustum>,
}

/// The parts of a scene depth passes read.
#[derive(Copy, Clone)]
struct Casters<'a> {
    calls: &'a [DrawCall],
    meshes: &'a SlotMap<MeshKey, Mesh>,
    materials: &'a SlotMap<MaterialKey, Material>,
}

/// Renders a [`Scene`] from a [`Camera`] in a single forward pass, after shadow and
/// optional depth-only passes.
pub struct ForwardRenderer {
    settings: RendererSettings,
    library: ProgramLibrary,
    depth_programs: HashMap<DepthOptions, ProgramId>,
    shader_context: ShaderContext,
    depth_target: Option<DepthTarget>,
    skybox_mesh: Option<Mesh>,
    stats: RenderStats,

    // per-frame scratch
    globals: Vec<LightKey>,
    locals: Vec<LightKey>,
    visible: Vec<usize>,
    casters: Vec<usize>,
    sort_items: Vec<SortItem>,
}

impl ForwardRenderer {
    /// Precompiles the depth programs shadow casters are drawn with.
    pub fn new(device: &mut Device, settings: RendererSettings) -> Self {
        let caps = device.capabilities();
        let skin = if caps.float_textures {
            SkinMode::Texture
        } else {
            SkinMode::Uniform {
                bones: settings.max_uniform_bones,
            }
        };

        let mut library = ProgramLibrary::new();
        let depth_programs = DepthOptions::shadow_variants(skin, caps.depth_textures)
            .into_iter()
            .map(|options| (options, library.get_program(device, &options.into())))
            .collect();

        debug!("Forward renderer ready with {settings:?}");
        Self {
            settings,
            library,
            depth_programs,
            shader_context: ShaderContext {
                skin,
                ..ShaderContext::default()
            },
            depth_target: None,
            skybox_mesh: None,
            stats: RenderStats::default(),
            globals: Vec::new(),
            locals: Vec::new(),
            visible: Vec::new(),
            casters: Vec::new(),
            sort_items: Vec::new(),
        }
    }

    pub fn settings(&self) -> &RendererSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut RendererSettings {
        &mut self.settings
    }

    pub fn library(&self) -> &ProgramLibrary {
        &self.library
    }

    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    /// Light layout and output options materials are compiled for.
    pub fn shader_context(&self) -> &ShaderContext {
        &self.shader_context
    }

    /// Renders one frame of `scene` as seen by `camera`.
    #[instrument(skip_all)]
    #[profiling::function]
    pub fn render(
        &mut self,
        device: &mut Device,
        scene: &mut Scene,
        camera: &mut Camera,
    ) -> RenderStats {
        device.begin_frame();
        self.stats = RenderStats::default();
        scene.graveyard.release(device);

        self.setup_camera(device, camera);
        self.cull(scene, camera);
        self.classify_lights(scene);
        self.prepare_skins(device, scene);

        if camera.depth_prepass() && self.settings.depth_prepass {
            self.depth_prepass(device, scene, camera);
        }
        self.render_shadows(device, scene, camera);

        self.update_shader_context(scene);
        if scene.update_shaders {
            self.update_shaders(scene);
        }

        self.sort(scene, camera);
        self.main_pass(device, scene, camera);

        device.end_frame();
        self.stats
    }

    /// Releases every program and GPU resource the renderer owns.
    pub fn destroy(mut self, device: &mut Device) {
        self.library.clear(device);
        if let Some(depth) = self.depth_target.take() {
            device.destroy_render_target(depth.target);
            device.destroy_texture(depth.texture);
        }
        if let Some(mesh) = self.skybox_mesh.take() {
            mesh.destroy(device);
        }
    }

    fn setup_camera(&mut self, device: &mut Device, camera: &mut Camera) {
        device.set_render_target(camera.target());
        let viewport = bind_viewport(device, camera);
        let aspect = if viewport.height > 0 {
            viewport.width as f32 / viewport.height as f32
        } else {
            1.0
        };
        camera.update(aspect);
        device.set_color_write(ColorWrites::ALL);
        device.clear(camera.clear_options());
    }

    #[instrument(skip_all)]
    #[profiling::function]
    fn cull(&mut self, scene: &Scene, camera: &Camera) {
        self.visible.clear();
        self.casters.clear();
        for (index, call) in scene.draw_calls.iter().enumerate() {
            let instance = match &call.kind {
                DrawKind::Command(..) => {
                    self.visible.push(index);
                    continue;
                }
                DrawKind::Mesh(instance) => instance,
            };
            if !instance.enabled {
                continue;
            }
            let Some(mesh) = scene.meshes.get(instance.mesh) else {
                trace!("Skipping an instance of a removed mesh");
                continue;
            };

            if instance.cast_shadows {
                self.casters.push(index);
            }

            // skinned bounds follow the bones, not the transform
            if self.settings.frustum_culling && instance.skin.is_none() {
                let sphere = mesh.bounding_sphere().transformed(&instance.transform);
                if !camera.frustum().intersects_sphere(&sphere) {
                    self.stats.culled += 1;
                    continue;
                }
            }
            self.visible.push(index);
        }
    }

    /// Directional lights go first, matching the uniform order of lit programs.
    fn classify_lights(&mut self, scene: &Scene) {
        self.globals.clear();
        self.locals.clear();
        for (key, light) in scene.lights.iter().filter(|(_, l)| l.enabled) {
            match light.kind {
                LightKind::Directional => self.globals.push(key),
                LightKind::Point | LightKind::Spot => self.locals.push(key),
            }
        }
    }

    fn frame_lights(&self) -> impl Iterator<Item = LightKey> + '_ {
        self.globals.iter().chain(&self.locals).copied()
    }

    /// Uploads bone palettes of enabled skinned instances into their pose textures.
    fn prepare_skins(&mut self, device: &mut Device, scene: &mut Scene) {
        if self.shader_context.skin != SkinMode::Texture {
            return;
        }
        profiling::scope!("upload skins");

        let Scene {
            draw_calls,
            graveyard,
            ..
        } = scene;
        for instance in draw_calls.iter_mut().filter_map(DrawCall::instance_mut) {
            if !instance.enabled {
                continue;
            }
            let Some(skin) = instance.skin.as_mut() else {
                continue;
            };
            if skin.bones.is_empty() {
                graveyard.textures.extend(skin.texture.take());
                continue;
            }

            let texels = skin.bones.len() * 4;
            let width = texels.min(MAX_POSE_WIDTH) as u32;
            let height = texels.div_ceil(MAX_POSE_WIDTH) as u32;
            if skin
                .texture
                .as_ref()
                .is_some_and(|t| t.width() != width || t.height() != height)
            {
                graveyard.textures.extend(skin.texture.take());
            }

            if skin.texture.is_none() {
                let mut desc =
                    TextureDescriptor::new("Pose Map", width, height, TextureFormat::Rgba32Float);
                desc.filter = FilterMode::Nearest;
                match device.create_texture(desc) {
                    Ok(texture) => skin.texture = Some(texture),
                    Err(e) => {
                        warn!("Skinned instance skipped without a palette: {e}");
                        continue;
                    }
                }
            }

            let mut data = vec![0f32; (width * height * 4) as usize];
            for (bone, texels) in skin.bones.iter().zip(data.chunks_exact_mut(16)) {
                texels.copy_from_slice(&bone.to_cols_array());
            }
            if let Some(texture) = skin.texture.as_mut() {
                texture.set_level(0, 0, bytemuck::cast_slice(&data).to_vec());
                device.upload_texture(texture);
            }
        }
    }

    /// Draws opaque world geometry into an auxiliary depth texture and leaves it in scope
    /// as `texture_depthMap`. Generated programs never read it. It is for custom programs
    /// and draw commands that need scene depth.
    #[instrument(skip_all)]
    #[profiling::function]
    fn depth_prepass(&mut self, device: &mut Device, scene: &Scene, camera: &Camera) {
        if !device.capabilities().depth_textures {
            trace!("Depth pre-pass needs depth textures, skipping");
            return;
        }

        let (width, height) = device.target_size();
        let Some(target) = self.depth_target(device, width, height) else {
            return;
        };

        let opaque: Vec<usize> = self
            .visible
            .iter()
            .copied()
            .filter(|&index| {
                scene.draw_calls[index].instance().is_some_and(|instance| {
                    instance.layer == Layer::World
                        && scene
                            .materials
                            .get(instance.material)
                            .is_some_and(|m| !m.blend_type.is_blended() && m.depth_write)
                })
            })
            .collect();

        let casters = Casters {
            calls: &scene.draw_calls,
            meshes: &scene.meshes,
            materials: &scene.materials,
        };
        let pass = DepthPass {
            view_projection: *camera.view_projection(),
            point: false,
            color: false,
            frustum: None,
        };
        begin_depth_pass(device, &target, &pass);
        let drawn = self.draw_depth(device, casters, &opaque, &pass);
        trace!("Depth pre-pass drew {drawn} instances");

        if let Some(texture) = target.depth_texture() {
            device.scope_mut().set("texture_depthMap", texture);
        }
    }

    /// The pre-pass target matching the camera target size, recreated on resize.
    fn depth_target(
        &mut self,
        device: &mut Device,
        width: u32,
        height: u32,
    ) -> Option<RenderTarget> {
        if let Some(existing) = &self.depth_target
            && existing.target.width() == width
            && existing.target.height() == height
        {
            return Some(existing.target.clone());
        }
        if let Some(old) = self.depth_target.take() {
            device.destroy_render_target(old.target);
            device.destroy_texture(old.texture);
        }

        let mut desc =
            TextureDescriptor::new("Depth Map", width, height, TextureFormat::Depth32Float);
        desc.renderable = true;
        desc.filter = FilterMode::Nearest;
        let texture = match device.create_texture(desc) {
            Ok(texture) => texture,
            Err(e) => {
                warn!("Depth pre-pass disabled: {e}");
                return None;
            }
        };

        let desc = RenderTargetDescriptor {
            label: "Depth Pre-Pass".to_string(),
            color: None,
            face: 0,
            depth: DepthAttachment::Texture(texture.key()),
            width,
            height,
        };
        let target = match device.create_render_target(&desc) {
            Ok(target) => target,
            Err(e) => {
                warn!("Depth pre-pass disabled: {e}");
                device.destroy_texture(texture);
                return None;
            }
        };

        self.depth_target = Some(DepthTarget {
            target: target.clone(),
            texture,
        });
        Some(target)
    }

    #[instrument(skip_all)]
    #[profiling::function]
    fn render_shadows(&mut self, device: &mut Device, scene: &mut Scene, camera: &Camera) {
        let Scene {
            lights,
            draw_calls,
            meshes,
            materials,
            graveyard,
            ..
        } = scene;
        let view = Casters {
            calls: draw_calls,
            meshes,
            materials,
        };

        let casters = std::mem::take(&mut self.casters);
        let keys: Vec<LightKey> = self.frame_lights().collect();
        for key in keys {
            let Some(light) = lights.get_mut(key) else {
                debug_panic!("Classified light vanished from the scene");
                continue;
            };
            profiling::scope!("render shadow");
            self.render_light_shadow(
                device,
                light,
                view,
                &casters,
                camera,
                &mut graveyard.shadow_maps,
            );
        }
        self.casters = casters;
    }

    fn render_light_shadow(
        &mut self,
        device: &mut Device,
        light: &mut Light,
        view: Casters<'_>,
        casters: &[usize],
        camera: &Camera,
        retired: &mut Vec<ShadowMap>,
    ) {
        light.shadow_rendered = false;
        if !light.cast_shadows {
            light.release_shadow(retired);
            return;
        }
        if !self.settings.shadows || !light.wants_shadow() {
            return;
        }

        let min_near = self.settings.min_shadow_near;
        let cameras: Vec<ShadowCamera> = match light.kind {
            LightKind::Directional => {
                let distance = light
                    .shadow_distance
                    .unwrap_or(self.settings.shadow_distance);
                if distance <= camera.near() {
                    warn!(
                        "Shadow distance {distance} of light {:?} does not reach past the near plane",
                        light.name
                    );
                    return;
                }
                let corners = camera.frustum_corners(distance);
                let Some(fitted) = fit_directional(&corners, light.direction()) else {
                    warn!("Light {:?} has a degenerate shadow frustum", light.name);
                    return;
                };
                vec![fitted]
            }
            LightKind::Spot => vec![spot_camera(
                light.position(),
                light.direction(),
                light.up(),
                light.outer_cone_angle,
                light.range,
                min_near,
            )],
            LightKind::Point => (0..6)
                .map(|face| point_face_camera(light.position(), face, light.range, min_near))
                .collect(),
        };

        let Some(map) = light.ensure_shadow_map(device, retired) else {
            return;
        };
        let targets = map.targets().to_vec();
        let color = map.mode() == ShadowMode::Packed;

        let point = light.kind == LightKind::Point;
        if point {
            let scope = device.scope_mut();
            scope.set("view_position", light.position());
            scope.set("light_radius", light.range);
        }

        for (target, shadow_camera) in targets.iter().zip(&cameras) {
            let view_projection = shadow_camera.view_projection();
            let pass = DepthPass {
                view_projection,
                point,
                color,
                frustum: self
                    .settings
                    .frustum_culling
                    .then(|| Frustum::from_matrix(&view_projection)),
            };
            begin_depth_pass(device, target, &pass);
            self.stats.shadow_draw_calls += self.draw_depth(device, view, casters, &pass);
        }

        if !point && let Some(shadow_camera) = cameras.first() {
            light.shadow_matrix = shadow_camera.shadow_matrix();
        }
        light.shadow_rendered = true;
        self.stats.shadow_maps += 1;
    }

    fn depth_program(&mut self, device: &mut Device, options: DepthOptions) -> ProgramId {
        if let Some(&program) = self.depth_programs.get(&options) {
            return program;
        }
        let program = self.library.get_program(device, &options.into());
        self.depth_programs.insert(options, program);
        program
    }

    /// Draws the given casters depth-only, returning how many were drawn.
    fn draw_depth(
        &mut self,
        device: &mut Device,
        view: Casters<'_>,
        indices: &[usize],
        pass: &DepthPass,
    ) -> u32 {
        let mut drawn = 0;
        for &index in indices {
            let Some(instance) = view.calls.get(index).and_then(DrawCall::instance) else {
                continue;
            };
            let (Some(mesh), Some(material)) = (
                view.meshes.get(instance.mesh),
                view.materials.get(instance.material),
            ) else {
                continue;
            };
            let sphere = mesh.bounding_sphere().transformed(&instance.transform);
            if let Some(frustum) = &pass.frustum
                && instance.skin.is_none()
                && !frustum.intersects_sphere(&sphere)
            {
                continue;
            }

            let opacity = material.opacity_texture();
            let options = DepthOptions {
                skin: instance.skin.is_some().then_some(self.shader_context.skin),
                opacity_map: opacity.is_some(),
                point: pass.point,
                pack_depth: pass.color && !pass.point,
            };
            let program = self.depth_program(device, options);
            if !device.set_shader(program) {
                continue;
            }

            // flipped point projections invert winding
            device.set_cull_mode(if pass.point {
                CullMode::None
            } else {
                material.cull_mode
            });

            let scope = device.scope_mut();
            if let Some(texture) = opacity {
                scope.set("texture_opacityMap", texture);
                scope.set("alpha_ref", material.alpha_test.unwrap_or_default());
            }
            if !self.set_instance_uniforms(scope, instance, false) {
                continue;
            }
            if draw_mesh(device, mesh) {
                drawn += 1;
            }
        }
        drawn
    }

    /// Returns `false` if the instance has no bone palette its program could read.
    fn set_instance_uniforms(
        &self,
        scope: &mut ScopeSpace,
        instance: &MeshInstance,
        normal: bool,
    ) -> bool {
        scope.set("matrix_model", instance.transform);
        if normal {
            let normal_matrix = Mat3::from_mat4(instance.transform).inverse().transpose();
            scope.set("matrix_normal", normal_matrix);
        }

        let Some(skin) = &instance.skin else {
            return true;
        };
        match (&skin.texture, self.shader_context.skin) {
            (Some(texture), _) => {
                scope.set("texture_poseMap", texture.key());
            }
            // the pose map in scope belongs to another instance
            (None, SkinMode::Texture) => {
                trace!("Skipping skinned instance without a pose map");
                return false;
            }
            (None, _) => {
                let bones = skin.bones.len().min(self.settings.max_uniform_bones as usize);
                scope.set("matrix_pose", &skin.bones[..bones]);
            }
        }
        true
    }

    /// Raises `update_shaders` when the light layout or output options changed.
    fn update_shader_context(&mut self, scene: &mut Scene) {
        let lights: Vec<LightOptions> = self
            .frame_lights()
            .filter_map(|key| scene.lights.get(key))
            .map(Light::options)
            .collect();
        let output = scene.look().output();

        if lights != self.shader_context.lights || output != self.shader_context.output {
            debug!("Shader context changed to {} lights", lights.len());
            self.shader_context.lights = lights;
            self.shader_context.output = output;
            scene.update_shaders = true;
        }
    }

    /// Marks every material referenced by a draw call for regeneration.
    fn update_shaders(&mut self, scene: &mut Scene) {
        profiling::scope!("update shaders");

        let Scene {
            draw_calls,
            materials,
            update_shaders,
            ..
        } = scene;
        for instance in draw_calls.iter().filter_map(DrawCall::instance) {
            if let Some(material) = materials.get_mut(instance.material) {
                material.mark_dirty();
            }
        }
        *update_shaders = false;
    }

    #[instrument(skip_all)]
    #[profiling::function]
    fn sort(&mut self, scene: &Scene, camera: &Camera) {
        let eye = camera.position();
        self.sort_items.clear();
        for &index in &self.visible {
            let item = match &scene.draw_calls[index].kind {
                DrawKind::Command(layer, _) => SortItem {
                    index,
                    layer: *layer,
                    key: sort_key(*layer, BlendType::None, true, 0),
                    distance: None,
                },
                DrawKind::Mesh(instance) => {
                    let Some(material) = scene.materials.get(instance.material) else {
                        trace!("Skipping an instance without material");
                        continue;
                    };
                    let blended = material.blend_type.is_blended();
                    let distance = (blended && instance.layer == Layer::World).then(|| {
                        let center = scene
                            .meshes
                            .get(instance.mesh)
                            .map_or(Vec3::ZERO, |mesh| mesh.bounds().center());
                        instance
                            .transform
                            .transform_point3(center)
                            .distance_squared(eye)
                    });
                    SortItem {
                        index,
                        layer: instance.layer,
                        key: sort_key(instance.layer, material.blend_type, false, material.id()),
                        distance,
                    }
                }
            };
            self.sort_items.push(item);
        }
        sort_draw_calls(&mut self.sort_items);
    }

    #[instrument(skip_all)]
    #[profiling::function]
    fn main_pass(&mut self, device: &mut Device, scene: &mut Scene, camera: &Camera) {
        device.set_render_target(camera.target());
        bind_viewport(device, camera);
        device.set_color_write(ColorWrites::ALL);

        let look = scene.look().clone();
        self.push_globals(device.scope_mut(), scene, &look, camera);

        let Scene {
            draw_calls,
            meshes,
            materials,
            ..
        } = scene;

        let items = std::mem::take(&mut self.sort_items);
        let mut skybox_pending = look.skybox.is_some();
        let mut current_material = None;
        for item in &items {
            if skybox_pending && !is_opaque_world(item) {
                self.draw_skybox(device, &look);
                skybox_pending = false;
                current_material = None;
            }

            let Some(call) = draw_calls.get_mut(item.index) else {
                debug_panic!("Sorted draw call {} out of range", item.index);
                continue;
            };
            let instance = match &mut call.kind {
                DrawKind::Command(_, command) => {
                    command(device);
                    current_material = None;
                    continue;
                }
                DrawKind::Mesh(instance) => instance,
            };

            let Some(mesh) = meshes.get(instance.mesh) else {
                continue;
            };
            let Some(material) = materials.get_mut(instance.material) else {
                continue;
            };

            let skinned = instance.skin.is_some();
            let program =
                material.program(device, &mut self.library, &self.shader_context, skinned);
            if !device.set_shader(program) {
                trace!("Material {:?} has no usable program", material.name);
                continue;
            }

            if current_material != Some(instance.material) {
                material.apply_state(device);
                material.set_parameters(device.scope_mut());
                current_material = Some(instance.material);
            }
            if !self.set_instance_uniforms(device.scope_mut(), instance, true) {
                continue;
            }
            if draw_mesh(device, mesh) {
                self.stats.draw_calls += 1;
            }
        }
        if skybox_pending {
            self.draw_skybox(device, &look);
        }
        self.sort_items = items;
    }

    fn push_globals(
        &self,
        scope: &mut ScopeSpace,
        scene: &Scene,
        look: &SceneLook,
        camera: &Camera,
    ) {
        scope.set("matrix_viewProjection", *camera.view_projection());
        scope.set("matrix_view", *camera.view());
        scope.set("view_position", camera.position());
        scope.set("light_globalAmbient", look.ambient);
        scope.set("exposure", look.exposure);
        scope.set("fog_color", look.fog_color);
        scope.set("fog_start", look.fog_start);
        scope.set("fog_end", look.fog_end);
        scope.set("fog_density", look.fog_density);

        let lights = self.frame_lights().filter_map(|key| scene.lights.get(key));
        for (index, light) in lights.enumerate() {
            self.push_light(scope, index, light);
        }
    }

    fn push_light(&self, scope: &mut ScopeSpace, index: usize, light: &Light) {
        let name = |field: &str| format!("light{index}_{field}");

        scope.set(&name("color"), light.final_color());
        match light.kind {
            LightKind::Directional => {
                scope.set(&name("direction"), light.direction());
            }
            LightKind::Point => {
                scope.set(&name("position"), light.position());
                scope.set(&name("radius"), light.range);
            }
            LightKind::Spot => {
                scope.set(&name("position"), light.position());
                scope.set(&name("direction"), light.direction());
                scope.set(&name("radius"), light.range);
                scope.set(&name("innerConeAngle"), light.inner_cone_angle.cos());
                scope.set(&name("outerConeAngle"), light.outer_cone_angle.cos());
            }
        }

        let Some(map) = light.shadow_map().filter(|_| light.shadow_rendered) else {
            return;
        };
        let reach = match light.kind {
            LightKind::Directional => light
                .shadow_distance
                .unwrap_or(self.settings.shadow_distance),
            LightKind::Point | LightKind::Spot => light.range,
        };
        scope.set(&format!("texture_light{index}_shadowMap"), map.texture());
        scope.set(
            &name("shadowParams"),
            Vec4::new(1.0 / map.resolution() as f32, 0.0, light.shadow_bias, reach),
        );
        if light.kind != LightKind::Point {
            scope.set(&name("shadowMatrix"), *light.shadow_matrix());
        }
    }

    fn draw_skybox(&mut self, device: &mut Device, look: &SceneLook) {
        let Some(cube_map) = look.skybox else {
            return;
        };
        if self.skybox_mesh.is_none() {
            match Mesh::cube(device, 1.0) {
                Ok(mesh) => self.skybox_mesh = Some(mesh),
                Err(e) => {
                    warn!("Skybox disabled: {e}");
                    return;
                }
            }
        }

        let options = SkyboxOptions {
            encoding: look.skybox_encoding,
            tonemap: look.tonemap,
            gamma: look.gamma,
        };
        let program = self.library.get_program(device, &options.into());
        if !device.set_shader(program) {
            return;
        }

        device.set_blending(false);
        device.set_depth_test(true);
        device.set_depth_write(false);
        device.set_depth_func(CompareFunction::LessEqual);
        device.set_cull_mode(CullMode::None);
        device.scope_mut().set("texture_cubeMap", cube_map);

        if let Some(mesh) = &self.skybox_mesh
            && draw_mesh(device, mesh)
        {
            self.stats.draw_calls += 1;
        }
    }
}

fn bind_viewport(device: &mut Device, camera: &Camera) -> Rect {
    let (width, height) = device.target_size();
    let viewport = camera.viewport(width, height);
    device.set_viewport(viewport);
    device.set_scissor(viewport);
    viewport
}

fn begin_depth_pass(device: &mut Device, target: &RenderTarget, pass: &DepthPass) {
    device.set_render_target(Some(target));
    let rect = Rect::new(0, 0, target.width(), target.height());
    device.set_viewport(rect);
    device.set_scissor(rect);

    device.set_blending(false);
    device.set_depth_test(true);
    device.set_depth_func(CompareFunction::LessEqual);
    let (mask, flags) = if pass.color {
        (ColorWrites::ALL, ClearFlags::COLOR | ClearFlags::DEPTH)
    } else {
        (ColorWrites::empty(), ClearFlags::DEPTH)
    };
    device.set_color_write(mask);
    device.clear(&ClearOptions {
        color: Color::WHITE,
        depth: 1.0,
        flags,
    });
    device.set_depth_write(true);
    device
        .scope_mut()
        .set("matrix_viewProjection", pass.view_projection);
}

fn draw_mesh(device: &mut Device, mesh: &Mesh) -> bool {
    device.set_vertex_buffer(0, Some(mesh.vertex_buffer()));
    device.set_index_buffer(mesh.index_buffer());
    device.draw(mesh.primitive())
}

/// Whether the item draws before the skybox.
fn is_opaque_world(item: &SortItem) -> bool {
    item.layer == Layer::World
        && item.distance.is_none()
        && (item.key >> 26) & 0b11 == BlendType::None as u32
}

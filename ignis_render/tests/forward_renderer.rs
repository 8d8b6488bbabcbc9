use glamx::{Mat4, Vec3};
use ignis_device::backend::{HardwareCall, HeadlessContext, HeadlessLog};
use ignis_device::wgpu::TextureFormat;
use ignis_device::{Capabilities, Device, TextureDescriptor};
use ignis_render::*;
use ignis_shadergen::{BlendType, ShadowMode};
use more_asserts::{assert_ge, assert_lt};
use std::cell::RefCell;
use std::rc::Rc;

fn headless() -> (Device, HeadlessLog) {
    let (context, log) = HeadlessContext::new();
    (Device::new(Box::new(context)), log)
}

fn headless_with(capabilities: Capabilities) -> (Device, HeadlessLog) {
    let (context, log) = HeadlessContext::with_capabilities(capabilities);
    (Device::new(Box::new(context)), log)
}

fn camera() -> Camera {
    let mut camera = Camera::perspective(60f32.to_radians(), 0.1, 100.0);
    camera.look_at(Vec3::new(0.0, 3.0, 8.0), Vec3::ZERO, Vec3::Y);
    camera
}

fn phong(scene: &mut Scene, name: &str) -> MaterialKey {
    scene.add_material(Material::phong(name, PhongMaterial::default()))
}

/// A lit cube standing on a floor plane.
fn stage(device: &mut Device, scene: &mut Scene) -> ModelKey {
    let cube = scene.add_mesh(Mesh::cube(device, 0.5).unwrap());
    let floor = scene.add_mesh(Mesh::plane(device, 10.0).unwrap());
    let material = phong(scene, "stone");

    scene.add_model(
        Model::default()
            .with_instance(MeshInstance::new(
                cube,
                material,
                Mat4::from_translation(Vec3::Y * 0.5),
            ))
            .with_instance(MeshInstance::new(floor, material, Mat4::IDENTITY)),
    )
}

/// A cube instance per bone palette, all sharing one material.
fn skinned(device: &mut Device, scene: &mut Scene, palettes: Vec<Vec<Mat4>>) -> ModelKey {
    let cube = scene.add_mesh(Mesh::cube(device, 0.5).unwrap());
    let material = phong(scene, "skin");
    scene.add_model(palettes.into_iter().fold(Model::default(), |model, bones| {
        model.with_instance(MeshInstance::new(cube, material, Mat4::IDENTITY).with_skin(bones))
    }))
}

fn is_draw(call: &HardwareCall) -> bool {
    matches!(call, HardwareCall::Draw { .. })
}

fn created(log: &HeadlessLog, generator: &str) -> usize {
    log.count(|call| matches!(call, HardwareCall::CreateProgram { name, .. } if name == generator))
}

#[test]
fn draws_every_visible_instance() {
    let (mut device, _log) = headless();
    let mut scene = Scene::new();
    stage(&mut device, &mut scene);
    let mut renderer = ForwardRenderer::new(&mut device, RendererSettings::default());

    let stats = renderer.render(&mut device, &mut scene, &mut camera());

    assert_eq!(stats.draw_calls, 2);
    assert_eq!(stats.shadow_maps, 0);
    assert_eq!(stats.culled, 0);
}

#[test]
fn shadow_pass_finishes_before_the_camera_target_is_bound() {
    let (mut device, log) = headless();
    let mut scene = Scene::new();
    stage(&mut device, &mut scene);
    let sun = scene.add_light(
        Light::directional("sun", Vec3::new(-0.3, -1.0, -0.2)).with_shadows(256),
    );
    let mut renderer = ForwardRenderer::new(&mut device, RendererSettings::default());
    log.clear();

    let stats = renderer.render(&mut device, &mut scene, &mut camera());
    assert_eq!(stats.shadow_maps, 1);
    assert_ge!(stats.shadow_draw_calls, 1);
    assert_eq!(stats.draw_calls, 2);

    let shadow = log
        .position_from(0, |call| matches!(call, HardwareCall::BindRenderTarget(Some(_))))
        .expect("shadow target bound");
    let backbuffer = log
        .position_from(shadow, |call| *call == HardwareCall::BindRenderTarget(None))
        .expect("camera target rebound");
    let shadow_draw = log.position_from(shadow, is_draw).expect("caster drawn");
    assert_lt!(shadow_draw, backbuffer);
    assert!(log.position_from(backbuffer, is_draw).is_some());

    let light = scene.light(sun).unwrap();
    assert_eq!(light.options().shadow, Some(ShadowMode::Depth));
    assert_ne!(*light.shadow_matrix(), Mat4::IDENTITY);
}

#[test]
fn failed_shadow_maps_fall_back_to_unshadowed_lighting() {
    let (context, log) = HeadlessContext::new();
    let mut device = Device::new(Box::new(context.failing_render_targets()));
    let mut scene = Scene::new();
    stage(&mut device, &mut scene);
    let sun = scene.add_light(Light::directional("sun", Vec3::NEG_Y).with_shadows(512));
    let mut renderer = ForwardRenderer::new(&mut device, RendererSettings::default());
    let mut camera = camera();

    let stats = renderer.render(&mut device, &mut scene, &mut camera);
    assert_eq!(stats.shadow_maps, 0);
    assert_eq!(stats.draw_calls, 2);
    assert_eq!(scene.light(sun).unwrap().options().shadow, None);

    let textures = log.count(|call| matches!(call, HardwareCall::CreateTexture(_)));
    renderer.render(&mut device, &mut scene, &mut camera);
    assert_eq!(
        log.count(|call| matches!(call, HardwareCall::CreateTexture(_))),
        textures
    );
}

#[test]
fn point_lights_render_six_faces_into_a_packed_cube() {
    let (mut device, log) = headless();
    let mut scene = Scene::new();
    stage(&mut device, &mut scene);
    let lamp = scene.add_light(Light::point("lamp", Vec3::Y * 3.0, 15.0).with_shadows(128));
    let mut renderer = ForwardRenderer::new(&mut device, RendererSettings::default());
    log.clear();

    let stats = renderer.render(&mut device, &mut scene, &mut camera());
    assert_eq!(stats.shadow_maps, 1);

    let faces = log.count(|call| matches!(call, HardwareCall::BindRenderTarget(Some(_))));
    assert_eq!(faces, 6);
    assert_eq!(
        scene.light(lamp).unwrap().options().shadow,
        Some(ShadowMode::Packed)
    );
}

#[test]
fn disabled_shadows_skip_the_shadow_pass() {
    let (mut device, log) = headless();
    let mut scene = Scene::new();
    stage(&mut device, &mut scene);
    scene.add_light(Light::spot("spot", Vec3::Y * 4.0, Vec3::NEG_Y, 10.0).with_shadows(256));
    let settings = RendererSettings::builder().shadows(false).build();
    let mut renderer = ForwardRenderer::new(&mut device, settings);
    log.clear();

    let stats = renderer.render(&mut device, &mut scene, &mut camera());
    assert_eq!(stats.shadow_maps, 0);
    assert_eq!(stats.shadow_draw_calls, 0);
    assert_eq!(
        log.count(|call| matches!(call, HardwareCall::BindRenderTarget(Some(_)))),
        0
    );
}

#[test]
fn instances_outside_the_frustum_are_culled() {
    let (mut device, _log) = headless();
    let mut scene = Scene::new();
    let cube = scene.add_mesh(Mesh::cube(&mut device, 0.5).unwrap());
    let material = phong(&mut scene, "stone");
    scene.add_model(
        Model::default()
            .with_instance(MeshInstance::new(cube, material, Mat4::IDENTITY))
            .with_instance(MeshInstance::new(
                cube,
                material,
                Mat4::from_translation(Vec3::new(0.0, 0.0, 50.0)),
            )),
    );
    let mut camera = camera();

    let mut renderer = ForwardRenderer::new(&mut device, RendererSettings::default());
    let stats = renderer.render(&mut device, &mut scene, &mut camera);
    assert_eq!(stats.culled, 1);
    assert_eq!(stats.draw_calls, 1);

    renderer.settings_mut().frustum_culling = false;
    let stats = renderer.render(&mut device, &mut scene, &mut camera);
    assert_eq!(stats.culled, 0);
    assert_eq!(stats.draw_calls, 2);
}

#[test]
fn equal_materials_share_one_program() {
    let (mut device, log) = headless();
    let mut scene = Scene::new();
    let cube = scene.add_mesh(Mesh::cube(&mut device, 0.5).unwrap());
    let first = phong(&mut scene, "first");
    let second = phong(&mut scene, "second");
    let blended = scene.add_material(
        Material::phong("glass", PhongMaterial::default()).with_blend(BlendType::Normal),
    );
    scene.add_model(
        [first, second, blended]
            .into_iter()
            .fold(Model::default(), |model, material| {
                model.with_instance(MeshInstance::new(cube, material, Mat4::IDENTITY))
            }),
    );

    let mut renderer = ForwardRenderer::new(&mut device, RendererSettings::default());
    let stats = renderer.render(&mut device, &mut scene, &mut camera());

    assert_eq!(stats.draw_calls, 3);
    assert_eq!(created(&log, "phong"), 1);
}

#[test]
fn steady_frames_generate_no_programs() {
    let (mut device, log) = headless();
    let mut scene = Scene::new();
    stage(&mut device, &mut scene);
    scene.add_light(Light::directional("sun", Vec3::NEG_Y).with_shadows(256));
    let mut renderer = ForwardRenderer::new(&mut device, RendererSettings::default());
    let mut camera = camera();

    renderer.render(&mut device, &mut scene, &mut camera);
    log.clear();
    let stats = renderer.render(&mut device, &mut scene, &mut camera);

    assert_eq!(stats.draw_calls, 2);
    assert_eq!(log.count(|call| matches!(call, HardwareCall::CreateProgram { .. })), 0);
    assert!(!scene.update_shaders);
}

#[test]
fn adding_a_light_regenerates_lit_programs() {
    let (mut device, log) = headless();
    let mut scene = Scene::new();
    stage(&mut device, &mut scene);
    scene.add_light(Light::directional("sun", Vec3::NEG_Y));
    let mut renderer = ForwardRenderer::new(&mut device, RendererSettings::default());
    let mut camera = camera();

    renderer.render(&mut device, &mut scene, &mut camera);
    assert_eq!(renderer.shader_context().lights.len(), 1);

    scene.add_light(Light::point("lamp", Vec3::Y * 2.0, 5.0));
    log.clear();
    renderer.render(&mut device, &mut scene, &mut camera);

    assert_eq!(renderer.shader_context().lights.len(), 2);
    assert_eq!(created(&log, "phong"), 1);
}

#[test]
fn hud_commands_run_after_world_geometry() {
    let (mut device, _log) = headless();
    let mut scene = Scene::new();
    stage(&mut device, &mut scene);

    let seen = Rc::new(RefCell::new(Vec::new()));
    let record = seen.clone();
    scene.add_command(
        Layer::Hud,
        Box::new(move |device: &mut Device| record.borrow_mut().push(device.stats().draw_calls)),
    );

    let mut renderer = ForwardRenderer::new(&mut device, RendererSettings::default());
    renderer.render(&mut device, &mut scene, &mut camera());

    assert_eq!(*seen.borrow(), [2]);
}

#[test]
fn skybox_draws_once_with_its_own_program() {
    let (mut device, log) = headless();
    let mut scene = Scene::new();
    stage(&mut device, &mut scene);

    let mut desc = TextureDescriptor::new("sky", 16, 16, TextureFormat::Rgba8Unorm);
    desc.cubemap = true;
    let sky = device.create_texture(desc).unwrap();
    scene.set_look(SceneLook {
        skybox: Some(sky.key()),
        ..SceneLook::default()
    });

    let mut renderer = ForwardRenderer::new(&mut device, RendererSettings::default());
    let stats = renderer.render(&mut device, &mut scene, &mut camera());

    assert_eq!(stats.draw_calls, 3);
    assert_eq!(created(&log, "skybox"), 1);
}

#[test]
fn removed_lights_release_their_shadow_maps() {
    let (mut device, log) = headless();
    let mut scene = Scene::new();
    stage(&mut device, &mut scene);
    let sun = scene.add_light(Light::directional("sun", Vec3::NEG_Y).with_shadows(256));
    let mut renderer = ForwardRenderer::new(&mut device, RendererSettings::default());
    let mut camera = camera();

    renderer.render(&mut device, &mut scene, &mut camera);
    scene.remove_light(sun);
    log.clear();
    renderer.render(&mut device, &mut scene, &mut camera);

    assert_eq!(
        log.count(|call| matches!(call, HardwareCall::DestroyRenderTarget(_))),
        1
    );
    assert_eq!(renderer.shader_context().lights.len(), 0);
}

#[test]
fn depth_prepass_draws_opaque_geometry_before_shading() {
    let (mut device, log) = headless();
    let mut scene = Scene::new();
    stage(&mut device, &mut scene);
    let mut renderer = ForwardRenderer::new(&mut device, RendererSettings::default());
    let mut camera = camera();
    camera.set_depth_prepass(true);
    log.clear();

    let stats = renderer.render(&mut device, &mut scene, &mut camera);
    assert_eq!(stats.draw_calls, 2);
    assert_eq!(log.count(is_draw), 4);
    assert_eq!(
        log.count(|call| matches!(call, HardwareCall::BindRenderTarget(Some(_)))),
        1
    );

    let prepass = log
        .position_from(0, |call| matches!(call, HardwareCall::BindRenderTarget(Some(_))))
        .expect("depth target bound");
    let backbuffer = log
        .position_from(prepass, |call| *call == HardwareCall::BindRenderTarget(None))
        .expect("camera target rebound");
    assert!(log.position_from(prepass, is_draw).is_some_and(|at| at < backbuffer));
    assert!(device.scope().find("texture_depthMap").is_some());

    renderer.settings_mut().depth_prepass = false;
    log.clear();
    renderer.render(&mut device, &mut scene, &mut camera);
    assert_eq!(log.count(is_draw), 2);
}

#[test]
fn skinned_instances_upload_their_palette_into_a_pose_map() {
    let (mut device, log) = headless();
    let mut scene = Scene::new();
    skinned(&mut device, &mut scene, vec![vec![Mat4::IDENTITY; 3]]);
    let mut renderer = ForwardRenderer::new(&mut device, RendererSettings::default());
    let mut camera = camera();
    log.clear();

    let stats = renderer.render(&mut device, &mut scene, &mut camera);
    assert_eq!(stats.draw_calls, 1);
    assert_eq!(log.count(|call| matches!(call, HardwareCall::CreateTexture(_))), 1);
    assert_eq!(log.count(|call| matches!(call, HardwareCall::WriteTexture { .. })), 1);

    log.clear();
    renderer.render(&mut device, &mut scene, &mut camera);
    assert_eq!(log.count(|call| matches!(call, HardwareCall::CreateTexture(_))), 0);
    assert_eq!(log.count(|call| matches!(call, HardwareCall::WriteTexture { .. })), 1);
}

#[test]
fn skinned_instances_without_a_palette_are_skipped() {
    let (mut device, log) = headless();
    let mut scene = Scene::new();
    skinned(&mut device, &mut scene, vec![vec![Mat4::IDENTITY], Vec::new()]);
    let mut renderer = ForwardRenderer::new(&mut device, RendererSettings::default());
    log.clear();

    let stats = renderer.render(&mut device, &mut scene, &mut camera());

    assert_eq!(stats.draw_calls, 1);
    assert_eq!(log.count(is_draw), 1);
    assert_eq!(log.count(|call| matches!(call, HardwareCall::CreateTexture(_))), 1);
}

#[test]
fn skins_fall_back_to_a_uniform_palette_without_float_textures() {
    let (mut device, log) = headless_with(Capabilities {
        float_textures: false,
        ..Capabilities::default()
    });
    let mut scene = Scene::new();
    skinned(&mut device, &mut scene, vec![vec![Mat4::IDENTITY; 2]]);
    let mut renderer = ForwardRenderer::new(&mut device, RendererSettings::default());
    log.clear();

    let stats = renderer.render(&mut device, &mut scene, &mut camera());

    assert_eq!(stats.draw_calls, 1);
    assert_eq!(log.count(|call| matches!(call, HardwareCall::CreateTexture(_))), 0);
    assert_ge!(
        log.count(|call| matches!(
            call,
            HardwareCall::CommitUniform { name, .. } if name.starts_with("matrix_pose")
        )),
        1
    );
}

#[test]
fn shadows_pack_depth_into_color_without_depth_textures() {
    let (mut device, _log) = headless_with(Capabilities {
        depth_textures: false,
        ..Capabilities::default()
    });
    let mut scene = Scene::new();
    stage(&mut device, &mut scene);
    let sun = scene.add_light(Light::directional("sun", Vec3::NEG_Y).with_shadows(256));
    let spot = scene.add_light(
        Light::spot("spot", Vec3::Y * 4.0, Vec3::NEG_Y, 10.0).with_shadows(256),
    );
    let mut renderer = ForwardRenderer::new(&mut device, RendererSettings::default());

    let stats = renderer.render(&mut device, &mut scene, &mut camera());

    assert_eq!(stats.shadow_maps, 2);
    assert_eq!(stats.draw_calls, 2);
    for key in [sun, spot] {
        assert_eq!(
            scene.light(key).unwrap().options().shadow,
            Some(ShadowMode::Packed)
        );
    }
}

//! Scene setup shared by the examples.

use glamx::{Mat4, Quat, Vec3, Vec4};
use ignis_device::{Device, DeviceError};
use ignis_render::{
    Camera, Light, Material, Mesh, MeshInstance, Model, ModelKey, PhongMaterial, Scene,
};
use ignis_render::ignis_shadergen::BlendType;
use snafu::{ResultExt, Snafu};
use tracing::info;
use tracing_subscriber::{EnvFilter, Layer};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Debug, Snafu)]
#[snafu(context(suffix(Err)), visibility(pub))]
pub enum ExampleError {
    #[snafu(display("Failed to create the {what} mesh: {source}"))]
    Mesh { what: &'static str, source: DeviceError },
    #[snafu(display("No graphics device available: {source}"))]
    NoDevice { source: DeviceError },
}

pub fn init_logging() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(EnvFilter::from_default_env()))
        .init();
}

/// A ring of cubes on a floor, with one glass cube in the middle.
pub fn courtyard(device: &mut Device, scene: &mut Scene) -> Result<ModelKey, ExampleError> {
    let cube = scene.add_mesh(Mesh::cube(device, 0.5).context(MeshErr { what: "cube" })?);
    let floor = scene.add_mesh(Mesh::plane(device, 20.0).context(MeshErr { what: "floor" })?);

    let stone = scene.add_material(Material::phong(
        "stone",
        PhongMaterial {
            specular: Vec3::splat(0.3),
            ..PhongMaterial::default()
        },
    ));
    let grass = scene.add_material(Material::phong(
        "grass",
        PhongMaterial {
            diffuse: Vec3::new(0.2, 0.6, 0.2),
            ..PhongMaterial::default()
        },
    ));
    let glass = scene.add_material(
        Material::phong(
            "glass",
            PhongMaterial {
                opacity: 0.4,
                ..PhongMaterial::default()
            },
        )
        .with_blend(BlendType::Normal),
    );
    let marker = scene.add_material(Material::basic("marker", Vec4::new(1.0, 0.8, 0.1, 1.0)));

    let mut model = Model::default()
        .with_instance(MeshInstance::new(floor, grass, Mat4::IDENTITY))
        .with_instance(MeshInstance::new(
            cube,
            glass,
            Mat4::from_scale_rotation_translation(Vec3::splat(1.5), Quat::IDENTITY, Vec3::Y),
        ))
        .with_instance(MeshInstance::new(
            cube,
            marker,
            Mat4::from_translation(Vec3::new(0.0, 4.0, 0.0)),
        ));
    for step in 0..8 {
        let angle = step as f32 * std::f32::consts::TAU / 8.0;
        let position = Vec3::new(angle.cos() * 6.0, 0.5, angle.sin() * 6.0);
        model = model.with_instance(MeshInstance::new(
            cube,
            stone,
            Mat4::from_rotation_translation(Quat::from_rotation_y(angle), position),
        ));
    }

    let model = model
        .with_light(
            Light::directional("sun", Vec3::new(-0.4, -1.0, -0.3))
                .with_color(Vec3::new(1.0, 0.95, 0.85), 1.2)
                .with_shadows(1024),
        )
        .with_light(
            Light::point("lantern", Vec3::new(0.0, 3.0, 0.0), 12.0)
                .with_color(Vec3::new(1.0, 0.6, 0.3), 2.0)
                .with_shadows(256),
        );

    scene.set_ambient(Vec3::splat(0.15));
    let key = scene.add_model(model);
    info!("Courtyard ready");
    Ok(key)
}

pub fn orbit_camera(angle: f32) -> Camera {
    let mut camera = Camera::perspective(60f32.to_radians(), 0.1, 200.0);
    let eye = Vec3::new(angle.cos() * 14.0, 6.0, angle.sin() * 14.0);
    camera.look_at(eye, Vec3::ZERO, Vec3::Y);
    camera
}

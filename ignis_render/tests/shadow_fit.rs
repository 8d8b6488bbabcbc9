use glamx::{Vec3, Vec4};
use ignis_render::Camera;
use ignis_render::lighting::shadow::{fit_directional, point_face_camera, spot_camera};
use more_asserts::{assert_ge, assert_le};

const EPSILON: f32 = 1e-3;

fn assert_in_clip(clip: Vec4) {
    let ndc = clip.truncate() / clip.w;
    assert_le!(ndc.x.abs(), 1.0 + EPSILON, "x of {ndc:?}");
    assert_le!(ndc.y.abs(), 1.0 + EPSILON, "y of {ndc:?}");
    assert_ge!(ndc.z, -EPSILON, "z of {ndc:?}");
    assert_le!(ndc.z, 1.0 + EPSILON, "z of {ndc:?}");
}

fn view_camera(eye: Vec3, target: Vec3) -> Camera {
    let mut camera = Camera::perspective(70f32.to_radians(), 0.1, 500.0);
    camera.look_at(eye, target, Vec3::Y);
    camera.update(16.0 / 9.0);
    camera
}

#[test]
fn directional_fit_contains_the_shadowed_view_volume() {
    let cameras = [
        view_camera(Vec3::new(0.0, 2.0, 10.0), Vec3::ZERO),
        view_camera(Vec3::new(-30.0, 50.0, 4.0), Vec3::new(5.0, 0.0, -3.0)),
    ];
    let directions = [
        Vec3::NEG_Y,
        Vec3::new(0.3, -1.0, 0.1),
        Vec3::new(-1.0, -0.2, 0.5),
        Vec3::X,
    ];

    for camera in &cameras {
        for distance in [5.0, 40.0] {
            let corners = camera.frustum_corners(distance);
            for direction in directions {
                let fitted = fit_directional(&corners, direction).unwrap();
                let view_projection = fitted.view_projection();
                for corner in corners {
                    assert_in_clip(view_projection * corner.extend(1.0));
                }
            }
        }
    }
}

#[test]
fn directional_fit_looks_along_the_light() {
    let camera = view_camera(Vec3::new(0.0, 2.0, 10.0), Vec3::ZERO);
    let direction = Vec3::new(0.2, -1.0, 0.4).normalize();
    let fitted = fit_directional(&camera.frustum_corners(20.0), direction).unwrap();

    let forward = -fitted.view.inverse().z_axis.truncate();
    assert!(forward.abs_diff_eq(direction, 1e-4));
}

#[test]
fn shadow_matrix_lands_in_texture_space() {
    let camera = view_camera(Vec3::new(3.0, 4.0, 12.0), Vec3::ZERO);
    let corners = camera.frustum_corners(25.0);
    let fitted = fit_directional(&corners, Vec3::new(-0.4, -1.0, -0.3)).unwrap();
    let shadow = fitted.shadow_matrix();

    for corner in corners {
        let uv = shadow.project_point3(corner);
        assert!((-EPSILON..=1.0 + EPSILON).contains(&uv.x), "u of {uv:?}");
        assert!((-EPSILON..=1.0 + EPSILON).contains(&uv.y), "v of {uv:?}");
    }
}

#[test]
fn spot_camera_covers_its_cone() {
    let position = Vec3::new(0.0, 6.0, 0.0);
    let outer = 30f32.to_radians();
    let camera = spot_camera(position, Vec3::NEG_Y, Vec3::Z, outer, 20.0, 0.01);
    let view_projection = camera.view_projection();

    let rim = (outer * 0.99).tan() * 5.0;
    for point in [
        Vec3::new(0.0, 1.0, 0.0),
        Vec3::new(rim, 1.0, 0.0),
        Vec3::new(0.0, 1.0, -rim),
    ] {
        assert_in_clip(view_projection * point.extend(1.0));
    }
}

#[test]
fn point_faces_see_their_axis() {
    let position = Vec3::new(1.0, 2.0, 3.0);
    let axes = [Vec3::X, Vec3::NEG_X, Vec3::Y, Vec3::NEG_Y, Vec3::Z, Vec3::NEG_Z];

    for (face, axis) in axes.into_iter().enumerate() {
        let camera = point_face_camera(position, face, 10.0, 0.01);
        let clip = camera.view_projection() * (position + axis * 4.0).extend(1.0);
        assert_in_clip(clip);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < EPSILON && ndc.y.abs() < EPSILON);
    }
}

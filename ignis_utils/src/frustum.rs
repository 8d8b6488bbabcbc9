use crate::BoundingSphere;
use glamx::{Mat4, Vec3, Vec4};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrustumPlane {
    pub normal: Vec3,
    pub d: f32,
}

/// Six clip planes extracted from a zero-to-one depth view-projection matrix.
/// Plane normals point into the frustum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    planes: [FrustumPlane; 6],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrustumSide {
    Left,
    Right,
    Bottom,
    Top,
    Near,
    Far,
}

impl FrustumPlane {
    pub fn signed_distance(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.d
    }

    pub fn distance_to(&self, sphere: &BoundingSphere) -> f32 {
        self.signed_distance(sphere.center)
    }
}

impl Frustum {
    pub fn from_matrix(m: &Mat4) -> Self {
        let row0 = m.row(0);
        let row1 = m.row(1);
        let row2 = m.row(2);
        let row3 = m.row(3);

        let plane_from = |v: Vec4| {
            let normal = Vec3::new(v.x, v.y, v.z);
            let len = normal.length();
            if len > 0.0 {
                FrustumPlane {
                    normal: normal / len,
                    d: v.w / len,
                }
            } else {
                FrustumPlane { normal, d: v.w }
            }
        };

        let planes = [
            plane_from(row3 + row0), // left
            plane_from(row3 - row0), // right
            plane_from(row3 + row1), // bottom
            plane_from(row3 - row1), // top
            plane_from(row2),        // near, depth is 0..1
            plane_from(row3 - row2), // far
        ];

        Frustum { planes }
    }

    pub fn side(&self, side: FrustumSide) -> &FrustumPlane {
        match side {
            FrustumSide::Left => &self.planes[0],
            FrustumSide::Right => &self.planes[1],
            FrustumSide::Bottom => &self.planes[2],
            FrustumSide::Top => &self.planes[3],
            FrustumSide::Near => &self.planes[4],
            FrustumSide::Far => &self.planes[5],
        }
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        self.planes.iter().all(|p| p.signed_distance(point) >= 0.0)
    }

    pub fn intersects_sphere(&self, sphere: &BoundingSphere) -> bool {
        self.planes
            .iter()
            .all(|p| p.distance_to(sphere) >= -sphere.radius)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera_frustum() -> Frustum {
        let proj = Mat4::perspective_rh(60f32.to_radians(), 1.0, 0.1, 100.0);
        let view = Mat4::look_at_rh(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y);
        Frustum::from_matrix(&(proj * view))
    }

    #[test]
    fn points_inside_and_outside() {
        let frustum = camera_frustum();

        assert!(frustum.contains_point(Vec3::new(0.0, 0.0, -10.0)));
        assert!(!frustum.contains_point(Vec3::new(0.0, 0.0, 10.0)));
        assert!(!frustum.contains_point(Vec3::new(0.0, 0.0, -0.05)));
        assert!(!frustum.contains_point(Vec3::new(0.0, 0.0, -150.0)));
    }

    #[test]
    fn sphere_straddling_a_plane_intersects() {
        let frustum = camera_frustum();
        let behind = BoundingSphere {
            center: Vec3::new(0.0, 0.0, 2.0),
            radius: 1.0,
        };
        let straddling = BoundingSphere {
            center: Vec3::new(0.0, 0.0, 0.5),
            radius: 1.0,
        };

        assert!(!frustum.intersects_sphere(&behind));
        assert!(frustum.intersects_sphere(&straddling));
    }

    #[test]
    fn near_plane_faces_forward() {
        let frustum = camera_frustum();
        let near = frustum.side(FrustumSide::Near);
        assert!(near.normal.dot(Vec3::NEG_Z) > 0.99);
        assert!((near.signed_distance(Vec3::new(0.0, 0.0, -0.1))).abs() < 1e-3);
    }
}

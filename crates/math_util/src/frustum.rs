//! View-frustum extraction and AABB visibility tests.
//!
//! Planes are extracted from a combined projection-view matrix with the
//! Gribb-Hartmann row method and normalized, so `distance_to` returns true
//! signed distances. Visibility uses the p-vertex test: a box is outside as
//! soon as its most-positive corner falls behind any plane.

use glam::{Mat4, Vec3, Vec4};

/// A plane `normal · p + d = 0` with the normal pointing into the
/// positive (inside) half-space.
#[derive(Debug, Clone, Copy)]
pub struct Plane {
    pub normal: Vec3,
    pub d: f32,
}

impl Plane {
    /// Build a normalized plane from `(a, b, c, d)` row coefficients.
    pub fn from_coefficients(row: Vec4) -> Self {
        let normal = row.truncate();
        let len = normal.length();
        if len > 0.0 {
            Self {
                normal: normal / len,
                d: row.w / len,
            }
        } else {
            Self { normal: Vec3::Y, d: 0.0 }
        }
    }

    /// Signed distance from `point`; positive means inside.
    pub fn distance_to(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.d
    }
}

/// Six frustum planes in the order left, right, bottom, top, near, far.
#[derive(Debug, Clone)]
pub struct Frustum {
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Extract the six planes from a `projection * view` matrix.
    pub fn from_view_projection(view_proj: Mat4) -> Self {
        let m = view_proj.transpose();
        // Rows of the original matrix; plane i is row3 ± row i.
        let (r0, r1, r2, r3) = (m.x_axis, m.y_axis, m.z_axis, m.w_axis);

        Self {
            planes: [
                Plane::from_coefficients(r3 + r0), // left
                Plane::from_coefficients(r3 - r0), // right
                Plane::from_coefficients(r3 + r1), // bottom
                Plane::from_coefficients(r3 - r1), // top
                Plane::from_coefficients(r3 + r2), // near
                Plane::from_coefficients(r3 - r2), // far
            ],
        }
    }

    /// True if `aabb` is at least partially inside the frustum.
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        for plane in &self.planes {
            // Corner of the box farthest along the plane normal.
            let p_vertex = Vec3::new(
                if plane.normal.x >= 0.0 { aabb.max.x } else { aabb.min.x },
                if plane.normal.y >= 0.0 { aabb.max.y } else { aabb.min.y },
                if plane.normal.z >= 0.0 { aabb.max.z } else { aabb.min.z },
            );
            if plane.distance_to(p_vertex) < 0.0 {
                return false;
            }
        }
        true
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn look_down_neg_z() -> Frustum {
        let proj = Mat4::perspective_rh(std::f32::consts::FRAC_PI_2, 1.0, 0.1, 500.0);
        let view = Mat4::look_at_rh(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y);
        Frustum::from_view_projection(proj * view)
    }

    #[test]
    fn box_in_front_is_visible() {
        let frustum = look_down_neg_z();
        let aabb = Aabb::new(Vec3::new(-8.0, -8.0, -32.0), Vec3::new(8.0, 8.0, -16.0));
        assert!(frustum.intersects_aabb(&aabb));
    }

    #[test]
    fn box_behind_camera_is_culled() {
        let frustum = look_down_neg_z();
        let aabb = Aabb::new(Vec3::new(-8.0, -8.0, 16.0), Vec3::new(8.0, 8.0, 32.0));
        assert!(!frustum.intersects_aabb(&aabb));
    }

    #[test]
    fn box_beyond_far_plane_is_culled() {
        let frustum = look_down_neg_z();
        let aabb = Aabb::new(Vec3::new(-1.0, -1.0, -700.0), Vec3::new(1.0, 1.0, -600.0));
        assert!(!frustum.intersects_aabb(&aabb));
    }

    #[test]
    fn box_straddling_a_plane_is_visible() {
        let frustum = look_down_neg_z();
        // Crosses the left plane: partially inside.
        let aabb = Aabb::new(Vec3::new(-100.0, -1.0, -20.0), Vec3::new(0.0, 1.0, -10.0));
        assert!(frustum.intersects_aabb(&aabb));
    }

    #[test]
    fn plane_distances_are_normalized() {
        let frustum = look_down_neg_z();
        for plane in &frustum.planes {
            assert!((plane.normal.length() - 1.0).abs() < 1e-5);
        }
    }
}

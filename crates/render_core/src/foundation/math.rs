//! Math utilities and types
//!
//! Provides fundamental math types for culling, ray casting and batching.

pub use nalgebra::{
    Vector3, Vector4,
    Matrix3, Matrix4,
    Quaternion,
    Unit,
};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Transform representing position, rotation, and scale
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    /// Position in 3D space
    pub position: Vec3,

    /// Rotation quaternion
    pub rotation: Quat,

    /// Scale factors
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

impl Transform {
    /// Create a new identity transform
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create a transform with only position
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Convert to a transformation matrix (TRS order)
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::new_translation(&self.position)
            * self.rotation.to_homogeneous()
            * Mat4::new_nonuniform_scaling(&self.scale)
    }
}

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// Cosine threshold below which two unit directions count as parallel
    pub const PARALLEL_EPSILON: f32 = 1.0e-6;
}

/// Shortest-arc rotation taking direction `from` onto direction `to`.
///
/// Inputs need not be normalized. Near-parallel inputs (and zero-length
/// inputs) return identity; near-anti-parallel inputs rotate by pi about an
/// axis orthogonal to `from`, since their cross product is too short to
/// normalize.
pub fn from_to_rotation(from: &Vec3, to: &Vec3) -> Quat {
    let (Some(from), Some(to)) = (
        from.try_normalize(f32::EPSILON),
        to.try_normalize(f32::EPSILON),
    ) else {
        return Quat::identity();
    };

    let cos_theta = from.dot(&to);

    if cos_theta >= 1.0 - constants::PARALLEL_EPSILON {
        return Quat::identity();
    }

    if cos_theta <= -1.0 + constants::PARALLEL_EPSILON {
        let axis = Unit::new_normalize(orthogonal_to(&from));
        return Quat::from_axis_angle(&axis, constants::PI);
    }

    // Half-angle construction: q = (1 + cos, from x to), normalized
    let axis = from.cross(&to);
    Quat::new_normalize(Quaternion::new(1.0 + cos_theta, axis.x, axis.y, axis.z))
}

/// Any unit vector orthogonal to `v` (which must be non-zero)
pub fn orthogonal_to(v: &Vec3) -> Vec3 {
    // Cross with the basis axis least aligned with v
    let basis = if v.x.abs() < 0.9 { Vec3::x() } else { Vec3::y() };
    v.cross(&basis).normalize()
}

/// Extension trait for Mat4 with additional convenience methods
pub trait Mat4Ext {
    /// Create a perspective projection matrix (Vulkan depth range 0..1)
    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4;

    /// Create an orthographic projection matrix (Vulkan depth range 0..1)
    ///
    /// Maps the view-space box `[left, right] x [bottom, top] x [near, far]`
    /// onto clip space, so its frustum planes bound exactly that box.
    fn orthographic(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4;

    /// Create a look-at view matrix
    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4;
}

impl Mat4Ext for Mat4 {
    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
        // P = [a⁻¹/tan(φ/2)    0              0                    0           ]
        //     [0               1/tan(φ/2)     0                    0           ]
        //     [0               0              f/(f-n)              -nf/(f-n)   ]
        //     [0               0              1                    0           ]
        let tan_half_fovy = (fov_y * 0.5).tan();

        let mut result = Mat4::zeros();
        result[(0, 0)] = 1.0 / (aspect * tan_half_fovy);
        result[(1, 1)] = 1.0 / tan_half_fovy;
        result[(2, 2)] = far / (far - near);
        result[(2, 3)] = -(near * far) / (far - near);
        result[(3, 2)] = 1.0;

        result
    }

    fn orthographic(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
        let width = right - left;
        let height = top - bottom;
        let depth = far - near;

        Mat4::new(
            2.0 / width, 0.0, 0.0, -(right + left) / width,
            0.0, 2.0 / height, 0.0, -(top + bottom) / height,
            0.0, 0.0, 1.0 / depth, -near / depth,
            0.0, 0.0, 0.0, 1.0,
        )
    }

    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
        // View space looks down +Z so it composes with `perspective` above
        let forward = (target - eye).normalize();
        let right = up.cross(&forward).normalize();
        let camera_up = forward.cross(&right);

        let translation = Mat4::new_translation(&(-eye));

        let rotation = Mat4::new(
            right.x, right.y, right.z, 0.0,
            camera_up.x, camera_up.y, camera_up.z, 0.0,
            forward.x, forward.y, forward.z, 0.0,
            0.0, 0.0, 0.0, 1.0,
        );

        rotation * translation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const EPSILON: f32 = 1e-5;

    #[test]
    fn test_transform_to_matrix_trs_order() {
        let transform = Transform {
            position: Vec3::new(1.0, 2.0, 3.0),
            rotation: Quat::from_axis_angle(&Vec3::z_axis(), constants::PI * 0.5),
            scale: Vec3::new(2.0, 2.0, 2.0),
        };

        let point = transform.to_matrix().transform_point(&Point3::new(1.0, 0.0, 0.0));

        // Scale to (2,0,0), rotate to (0,2,0), translate to (1,4,3)
        assert_relative_eq!(point.coords, Vec3::new(1.0, 4.0, 3.0), epsilon = EPSILON);
    }

    #[test]
    fn test_from_to_rotation_general() {
        let from = Vec3::new(1.0, 0.0, 0.0);
        let to = Vec3::new(0.0, 1.0, 0.0);

        let rotation = from_to_rotation(&from, &to);

        assert_relative_eq!(rotation * from, to, epsilon = EPSILON);
    }

    #[test]
    fn test_from_to_rotation_unnormalized_inputs() {
        let from = Vec3::new(0.0, 0.0, 5.0);
        let to = Vec3::new(3.0, 0.0, 0.0);

        let rotation = from_to_rotation(&from, &to);

        assert_relative_eq!(rotation * Vec3::z(), Vec3::x(), epsilon = EPSILON);
    }

    #[test]
    fn test_from_to_rotation_parallel_is_identity() {
        let dir = Vec3::new(0.3, -0.2, 0.9);

        let rotation = from_to_rotation(&dir, &(dir * 4.0));

        assert_relative_eq!(rotation, Quat::identity(), epsilon = EPSILON);
    }

    #[test]
    fn test_from_to_rotation_anti_parallel_has_no_nan() {
        let from = Vec3::new(0.0, 1.0, 0.0);
        let to = Vec3::new(0.0, -1.0, 0.0);

        let rotation = from_to_rotation(&from, &to);
        let rotated = rotation * from;

        assert!(rotated.iter().all(|c| c.is_finite()));
        assert_relative_eq!(rotated, to, epsilon = EPSILON);
    }

    #[test]
    fn test_from_to_rotation_nearly_anti_parallel() {
        let from = Vec3::new(1.0, 0.0, 0.0);
        let to = Vec3::new(-1.0, 1.0e-7, 0.0);

        let rotated = from_to_rotation(&from, &to) * from;

        assert!(rotated.iter().all(|c| c.is_finite()));
        assert_relative_eq!(rotated, to.normalize(), epsilon = 1e-4);
    }

    #[test]
    fn test_from_to_rotation_zero_input() {
        let rotation = from_to_rotation(&Vec3::zeros(), &Vec3::x());
        assert_relative_eq!(rotation, Quat::identity(), epsilon = EPSILON);
    }

    #[test]
    fn test_orthographic_maps_box_to_clip_volume() {
        let proj = Mat4::orthographic(-2.0, 2.0, 0.0, 4.0, 1.0, 11.0);

        let min = proj.transform_point(&Point3::new(-2.0, 0.0, 1.0));
        let max = proj.transform_point(&Point3::new(2.0, 4.0, 11.0));

        assert_relative_eq!(min.coords, Vec3::new(-1.0, -1.0, 0.0), epsilon = EPSILON);
        assert_relative_eq!(max.coords, Vec3::new(1.0, 1.0, 1.0), epsilon = EPSILON);
    }

    #[test]
    fn test_look_at_puts_target_on_positive_z() {
        let view = Mat4::look_at(
            Vec3::new(0.0, 0.0, -10.0),
            Vec3::zeros(),
            Vec3::new(0.0, 1.0, 0.0),
        );

        let target = view.transform_point(&Point3::origin());

        assert_relative_eq!(target.coords, Vec3::new(0.0, 0.0, 10.0), epsilon = EPSILON);
    }
}

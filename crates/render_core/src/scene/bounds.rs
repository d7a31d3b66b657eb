//! Bounding volumes and rays
//!
//! Axis-aligned boxes are the currency of the whole visibility pipeline:
//! BVH nodes store them, frustum tests consume them and picking rays are
//! clipped against them. Degenerate (zero-volume) boxes are valid inputs to
//! every operation here.

use crate::foundation::math::{Mat4, Point3, Vec3};

/// Axis-Aligned Bounding Box for spatial queries
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AABB {
    /// Minimum corner of the bounding box
    pub min: Vec3,
    /// Maximum corner of the bounding box
    pub max: Vec3,
}

impl AABB {
    /// Create a new AABB from min and max points
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create an AABB centered at a point with given extents
    pub fn from_center_extents(center: Vec3, extents: Vec3) -> Self {
        Self {
            min: center - extents,
            max: center + extents,
        }
    }

    /// Smallest box containing every point, or `None` for an empty slice
    pub fn from_points(points: &[Vec3]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let mut bounds = Self::new(*first, *first);
        for point in rest {
            bounds.expand_to_point(point);
        }
        Some(bounds)
    }

    /// Get the center of the AABB
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Get the extents (half-size) of the AABB
    pub fn extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Whether `min <= max` on every axis
    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }

    /// Volume of the box (zero for degenerate boxes)
    pub fn volume(&self) -> f32 {
        let size = self.max - self.min;
        size.x * size.y * size.z
    }

    /// Half the surface area; cheaper than the full area and orders boxes the same way
    pub fn half_area(&self) -> f32 {
        let size = self.max - self.min;
        size.x * size.y + size.y * size.z + size.z * size.x
    }

    /// Check if this AABB contains a point
    pub fn contains_point(&self, point: Vec3) -> bool {
        point.x >= self.min.x && point.x <= self.max.x &&
        point.y >= self.min.y && point.y <= self.max.y &&
        point.z >= self.min.z && point.z <= self.max.z
    }

    /// Check if this AABB fully contains another
    pub fn contains(&self, other: &AABB) -> bool {
        self.contains_point(other.min) && self.contains_point(other.max)
    }

    /// Check if this AABB intersects another AABB
    pub fn intersects(&self, other: &AABB) -> bool {
        self.min.x <= other.max.x && self.max.x >= other.min.x &&
        self.min.y <= other.max.y && self.max.y >= other.min.y &&
        self.min.z <= other.max.z && self.max.z >= other.min.z
    }

    /// Smallest box containing both boxes
    pub fn union(&self, other: &AABB) -> AABB {
        AABB {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }

    /// Grow this box to include a point
    pub fn expand_to_point(&mut self, point: &Vec3) {
        self.min = self.min.inf(point);
        self.max = self.max.sup(point);
    }

    /// Corner `index` in the 0..8 bit layout: bit 0 selects max X,
    /// bit 1 max Y, bit 2 max Z.
    pub fn corner(&self, index: usize) -> Vec3 {
        Vec3::new(
            if index & 1 != 0 { self.max.x } else { self.min.x },
            if index & 2 != 0 { self.max.y } else { self.min.y },
            if index & 4 != 0 { self.max.z } else { self.min.z },
        )
    }

    /// All eight corners in [`AABB::corner`] order
    pub fn corners(&self) -> [Vec3; 8] {
        std::array::from_fn(|index| self.corner(index))
    }

    /// World-space box enclosing this box after an affine transform.
    ///
    /// Transforms the center and projects the half-extents through the
    /// absolute upper 3x3 (Arvo), which is exact for the AABB of the
    /// transformed box and needs no per-corner loop.
    pub fn transformed(&self, matrix: &Mat4) -> AABB {
        let center = matrix.transform_point(&Point3::from(self.center())).coords;
        let half = self.extents();

        let mut world_half = Vec3::zeros();
        for row in 0..3 {
            world_half[row] = matrix[(row, 0)].abs() * half.x
                + matrix[(row, 1)].abs() * half.y
                + matrix[(row, 2)].abs() * half.z;
        }

        AABB::from_center_extents(center, world_half)
    }

    /// Slab-method ray intersection clipped to `[t_min, t_max]`.
    ///
    /// Returns the entry distance (clamped to `t_min` when the origin is
    /// inside), or `None` when the slab intervals do not overlap inside the
    /// range. Axes the ray runs parallel to are handled explicitly so a zero
    /// direction component never turns into `0 * inf = NaN`.
    pub fn intersect_ray(&self, ray: &Ray, t_min: f32, t_max: f32) -> Option<f32> {
        let mut t_near = t_min;
        let mut t_far = t_max;

        for axis in 0..3 {
            let origin = ray.origin[axis];

            if ray.direction[axis] == 0.0 {
                if origin < self.min[axis] || origin > self.max[axis] {
                    return None;
                }
                continue;
            }

            let inv = ray.inv_direction[axis];
            let mut t0 = (self.min[axis] - origin) * inv;
            let mut t1 = (self.max[axis] - origin) * inv;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }

            // f32::max/min drop a NaN operand, keeping the running interval
            t_near = t_near.max(t0);
            t_far = t_far.min(t1);

            if t_near > t_far {
                return None;
            }
        }

        Some(t_near)
    }
}

/// Ray with precomputed reciprocal direction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    /// Ray origin
    pub origin: Vec3,
    /// Ray direction (not required to be normalized)
    pub direction: Vec3,
    /// Component-wise reciprocal of `direction`; zero components become ±infinity
    pub inv_direction: Vec3,
}

impl Ray {
    /// Create a ray from origin and direction
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction,
            inv_direction: direction.map(|d| 1.0 / d),
        }
    }

    /// Point at parameter `t` along the ray
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

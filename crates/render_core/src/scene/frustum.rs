//! View frustum extraction and visibility tests
//!
//! Planes are extracted from the combined view-projection matrix with the
//! Gribb-Hartmann row combinations, using the Vulkan clip-space depth range
//! `[0, 1]`. Each plane is normalized and oriented so that points inside the
//! frustum have a non-negative signed distance.
//!
//! Three AABB tests are offered, in order of decreasing cost:
//!
//! - [`Frustum::test_exhaustive`] transforms all eight corners (reference only)
//! - [`Frustum::test_lazy`] checks one selected corner of the world box per plane
//! - [`Frustum::test_cached`] is the lazy test reading corners from a [`CullCache`]

use crate::foundation::math::{Mat4, Point3, Vec3, Vec4};
use crate::scene::bounds::AABB;
use log::trace;

/// Plane defined by normal and distance from origin
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Unit normal pointing towards the inside of the frustum
    pub normal: Vec3,
    /// Signed distance term of the plane equation
    pub distance: f32,
}

impl Plane {
    /// Build a plane from `(a, b, c, d)` coefficients, normalizing all four
    /// by the length of the normal. Coefficients with a zero-length normal
    /// are kept as-is.
    pub fn from_coefficients(coefficients: Vec4) -> Self {
        let normal = coefficients.xyz();
        let length = normal.magnitude();

        if length > f32::EPSILON {
            Self {
                normal: normal / length,
                distance: coefficients.w / length,
            }
        } else {
            Self { normal, distance: coefficients.w }
        }
    }

    /// Calculate signed distance from plane to point
    pub fn distance_to_point(&self, point: &Vec3) -> f32 {
        self.normal.dot(point) + self.distance
    }

    /// Index of the box corner furthest along the normal, in [`AABB::corner`]
    /// layout. If that corner is behind the plane, the whole box is.
    pub fn corner_selector(&self) -> usize {
        usize::from(self.normal.x >= 0.0)
            | usize::from(self.normal.y >= 0.0) << 1
            | usize::from(self.normal.z >= 0.0) << 2
    }

    /// Plane as `[a, b, c, d]` for GPU upload
    pub fn as_array(&self) -> [f32; 4] {
        [self.normal.x, self.normal.y, self.normal.z, self.distance]
    }
}

/// Frustum for visibility culling
#[derive(Debug, Clone, PartialEq)]
pub struct Frustum {
    /// Six planes defining the frustum (left, right, bottom, top, near, far)
    pub planes: [Plane; 6],

    /// Per-plane corner index used by the lazy and cached tests
    selectors: [usize; 6],
}

impl Default for Frustum {
    /// A frustum that rejects nothing
    fn default() -> Self {
        let open = Plane { normal: Vec3::zeros(), distance: 0.0 };
        Self {
            planes: [open; 6],
            selectors: [0; 6],
        }
    }
}

impl Frustum {
    /// Left plane index
    pub const LEFT: usize = 0;
    /// Right plane index
    pub const RIGHT: usize = 1;
    /// Bottom plane index
    pub const BOTTOM: usize = 2;
    /// Top plane index
    pub const TOP: usize = 3;
    /// Near plane index
    pub const NEAR: usize = 4;
    /// Far plane index
    pub const FAR: usize = 5;

    /// Create a frustum from six planes
    pub fn new(planes: [Plane; 6]) -> Self {
        let selectors = std::array::from_fn(|i| planes[i].corner_selector());
        Self { planes, selectors }
    }

    /// Extract frustum planes from a view-projection matrix
    pub fn from_matrix(view_projection: &Mat4) -> Self {
        let row = |r: usize| view_projection.row(r).transpose();

        let r0 = row(0);
        let r1 = row(1);
        let r2 = row(2);
        let r3 = row(3);

        Self::new([
            Plane::from_coefficients(r3 + r0),
            Plane::from_coefficients(r3 - r0),
            Plane::from_coefficients(r3 + r1),
            Plane::from_coefficients(r3 - r1),
            // Depth range is [0, 1], so the near plane is row 2 alone
            Plane::from_coefficients(r2),
            Plane::from_coefficients(r3 - r2),
        ])
    }

    /// Planes as `[[a, b, c, d]; 6]` for GPU upload
    pub fn as_arrays(&self) -> [[f32; 4]; 6] {
        std::array::from_fn(|i| self.planes[i].as_array())
    }

    /// Reference test: transforms all eight corners of `local` by `model` and
    /// culls only if every corner is behind a single plane.
    pub fn test_exhaustive(&self, local: &AABB, model: &Mat4) -> bool {
        let corners = local
            .corners()
            .map(|corner| model.transform_point(&Point3::from(corner)).coords);

        self.planes.iter().all(|plane| {
            corners.iter().any(|corner| plane.distance_to_point(corner) >= 0.0)
        })
    }

    /// Lazy test of `local` placed by `model`.
    ///
    /// Builds the world-space box and checks one corner per plane; a box is
    /// only culled when that corner is more than `tolerance` behind a plane.
    pub fn test_lazy(&self, local: &AABB, model: &Mat4, tolerance: f32) -> bool {
        self.test_world_aabb(&local.transformed(model), tolerance)
    }

    /// Lazy test of a box that is already in world space
    pub fn test_world_aabb(&self, world: &AABB, tolerance: f32) -> bool {
        self.planes
            .iter()
            .zip(self.selectors.iter())
            .all(|(plane, &selector)| {
                plane.distance_to_point(&world.corner(selector)) >= -tolerance
            })
    }

    /// Lazy test reading world corners from `cache`, refreshing it first if
    /// `local` or `model` no longer match what it was built from.
    pub fn test_cached(
        &self,
        cache: &mut CullCache,
        local: &AABB,
        model: &Mat4,
        tolerance: f32,
    ) -> bool {
        cache.refresh(local, model);

        self.planes
            .iter()
            .zip(self.selectors.iter())
            .all(|(plane, &selector)| {
                plane.distance_to_point(&cache.corners[selector]) >= -tolerance
            })
    }
}

/// Per-entity cache of world-space box corners for [`Frustum::test_cached`]
#[derive(Debug, Clone)]
pub struct CullCache {
    local: AABB,
    model: Mat4,
    world: AABB,
    corners: [Vec3; 8],
}

impl CullCache {
    /// Build a cache for `local` placed by `model`
    pub fn new(local: &AABB, model: &Mat4) -> Self {
        let world = local.transformed(model);
        Self {
            local: *local,
            model: *model,
            world,
            corners: world.corners(),
        }
    }

    /// Whether the cache was built from exactly this box and matrix
    pub fn is_valid_for(&self, local: &AABB, model: &Mat4) -> bool {
        self.local == *local && bits_equal(&self.model, model)
    }

    /// Rebuild if the inputs changed; returns true when a rebuild happened
    pub fn refresh(&mut self, local: &AABB, model: &Mat4) -> bool {
        if self.is_valid_for(local, model) {
            return false;
        }
        *self = Self::new(local, model);
        true
    }

    /// Cached world-space box
    pub fn world_bounds(&self) -> &AABB {
        &self.world
    }
}

/// Caches the frustum between frames, rebuilding it only when the
/// view-projection matrix changes bit-for-bit.
#[derive(Debug, Clone, Default)]
pub struct FrustumCache {
    view_projection: Option<Mat4>,
    frustum: Frustum,
    rebuilds: u64,
}

impl FrustumCache {
    /// Create an empty cache; its frustum rejects nothing until updated
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed this frame's view-projection matrix. Returns true if the planes
    /// were re-extracted.
    pub fn update(&mut self, view_projection: &Mat4) -> bool {
        if let Some(previous) = &self.view_projection {
            if bits_equal(previous, view_projection) {
                return false;
            }
        }

        self.frustum = Frustum::from_matrix(view_projection);
        self.view_projection = Some(*view_projection);
        self.rebuilds += 1;
        trace!("Frustum planes rebuilt ({} total)", self.rebuilds);
        true
    }

    /// Current frustum
    pub fn frustum(&self) -> &Frustum {
        &self.frustum
    }

    /// Number of times the planes were extracted
    pub fn rebuilds(&self) -> u64 {
        self.rebuilds
    }
}

/// Bitwise matrix comparison; unlike `==`, treats NaN as equal to itself
/// and distinguishes `0.0` from `-0.0`.
fn bits_equal(a: &Mat4, b: &Mat4) -> bool {
    a.iter().zip(b.iter()).all(|(x, y)| x.to_bits() == y.to_bits())
}

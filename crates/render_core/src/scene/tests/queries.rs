//! BVH maintenance and spatial queries through the scene manager

use super::Fixture;
use crate::core::config::{RenderCoreConfig, SpatialConfig};
use crate::ecs::Entity;
use crate::foundation::math::{Mat4, Mat4Ext, Quat, Vec3};
use crate::scene::Ray;
use crate::spatial::BvhError;
use approx::assert_relative_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;

fn spawn_random(
    fixture: &mut Fixture,
    count: usize,
    z_range: std::ops::Range<f32>,
    seed: u64,
) -> Vec<Entity> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mesh = fixture.meshes[0];
    (0..count)
        .map(|_| {
            let position = Vec3::new(
                rng.gen_range(-5.0..5.0),
                rng.gen_range(-5.0..5.0),
                rng.gen_range(z_range.clone()),
            );
            fixture.spawn(position, 0.5, mesh)
        })
        .collect()
}

fn wide_projection() -> Mat4 {
    Mat4::perspective(90f32.to_radians(), 1.0, 0.1, 1000.0)
}

#[test]
fn test_frustum_containing_scene_visits_every_leaf_once() {
    let mut fixture = Fixture::default();
    let entities = spawn_random(&mut fixture, 200, 10.0..60.0, 1);
    fixture.update(0);
    fixture.scene.set_camera(&Mat4::identity(), &wide_projection());

    let mut visits = Vec::new();
    fixture.scene.query_frustum_callback(&fixture.world, |entity| visits.push(entity));

    assert_eq!(visits.len(), entities.len());
    let unique: HashSet<Entity> = visits.into_iter().collect();
    assert_eq!(unique, entities.into_iter().collect());
}

#[test]
fn test_frustum_behind_geometry_visits_nothing() {
    let mut fixture = Fixture::default();
    spawn_random(&mut fixture, 200, -60.0..-10.0, 2);
    fixture.update(0);
    fixture.scene.set_camera(&Mat4::identity(), &wide_projection());

    let mut visits = 0;
    fixture.scene.query_frustum_callback(&fixture.world, |_| visits += 1);

    assert_eq!(visits, 0);
}

#[test]
fn test_destroying_subset_keeps_tree_consistent() {
    let mut fixture = Fixture::default();
    let entities = spawn_random(&mut fixture, 120, 0.0..50.0, 3);
    fixture.update(0);

    let (removed, kept): (Vec<_>, Vec<_>) =
        entities.iter().enumerate().partition(|(i, _)| i % 3 == 0);
    for &(_, &entity) in &removed {
        fixture.world.destroy_entity(entity);
    }
    let ctx = fixture.update(1);

    assert_eq!(ctx.removed, removed.len());
    assert_eq!(fixture.scene.entity_count(), entities.len() - removed.len());
    assert!(fixture.scene.bvh().validate().is_ok());
    for &(_, &entity) in &kept {
        assert!(fixture.scene.has_entity(entity));
    }
    for &(_, &entity) in &removed {
        assert!(!fixture.scene.has_entity(entity));
    }
}

#[test]
fn test_leaf_bounds_match_transformed_local_bounds() {
    let mut fixture = Fixture::default();
    let entities = spawn_random(&mut fixture, 50, 0.0..50.0, 4);
    for (i, &entity) in entities.iter().enumerate() {
        if let Some(transform) = fixture.world.transform_mut(entity) {
            transform.rotation = Quat::from_axis_angle(&Vec3::y_axis(), i as f32 * 0.3);
            transform.scale = Vec3::new(1.0, 2.0, 0.5);
        }
    }
    fixture.update(0);

    for &entity in &entities {
        let local = fixture.world.renderable(entity).unwrap().local_bounds;
        let model = fixture.world.world_matrix(entity).unwrap();
        let expected = local.transformed(model);
        let leaf = fixture.scene.bvh().leaf_bounds(entity).unwrap();

        assert_relative_eq!(leaf.min, expected.min, epsilon = 1e-5);
        assert_relative_eq!(leaf.max, expected.max, epsilon = 1e-5);
    }
}

#[test]
fn test_ray_hits_single_box() {
    let mut fixture = Fixture::default();
    let mesh = fixture.meshes[0];
    let target = fixture.spawn(Vec3::new(10.0, 0.0, 0.0), 0.5, mesh);
    for i in 0..20 {
        fixture.spawn(Vec3::new(i as f32 * 2.0, 5.0, 0.0), 0.5, mesh);
    }
    fixture.update(0);

    let ray = Ray::new(Vec3::zeros(), Vec3::x());
    let (entity, t) = fixture
        .scene
        .ray_cast_closest_hit(&fixture.world, &ray, 0.0, f32::MAX)
        .unwrap()
        .unwrap();
    assert_eq!(entity, target);
    assert!((9.5..=10.5).contains(&t));

    let miss = Ray::new(Vec3::new(0.0, -5.0, 0.0), Vec3::x());
    assert!(fixture
        .scene
        .ray_cast_closest_hit(&fixture.world, &miss, 0.0, f32::MAX)
        .unwrap()
        .is_none());
}

#[test]
fn test_ray_callback_can_stop_early() {
    let mut fixture = Fixture::default();
    let mesh = fixture.meshes[0];
    for i in 0..10 {
        fixture.spawn(Vec3::new(0.0, 0.0, 5.0 + i as f32 * 3.0), 0.5, mesh);
    }
    fixture.update(0);

    let ray = Ray::new(Vec3::zeros(), Vec3::z());
    let mut all = 0;
    fixture
        .scene
        .ray_cast_callback(&fixture.world, &ray, 0.0, f32::MAX, |_, _, _| {
            all += 1;
            true
        })
        .unwrap();
    let mut first_only = 0;
    fixture
        .scene
        .ray_cast_callback(&fixture.world, &ray, 0.0, f32::MAX, |_, _, _| {
            first_only += 1;
            false
        })
        .unwrap();

    assert_eq!(all, 10);
    assert_eq!(first_only, 1);
}

#[test]
fn test_ray_range_excludes_boxes_outside_interval() {
    let mut fixture = Fixture::default();
    let mesh = fixture.meshes[0];
    fixture.spawn(Vec3::new(0.0, 0.0, 5.0), 0.5, mesh);
    let far = fixture.spawn(Vec3::new(0.0, 0.0, 20.0), 0.5, mesh);
    fixture.update(0);

    let ray = Ray::new(Vec3::zeros(), Vec3::z());
    let hit = fixture.scene.ray_cast_closest_hit(&fixture.world, &ray, 10.0, 30.0).unwrap();

    assert_eq!(hit.map(|(entity, _)| entity), Some(far));
}

#[test]
fn test_ray_stack_overflow_is_an_error() {
    let config = RenderCoreConfig {
        spatial: SpatialConfig::default().with_ray_stack_capacity(1),
        ..Default::default()
    };
    let mut fixture = Fixture::new(config);
    let mesh = fixture.meshes[0];
    for i in 0..8 {
        fixture.spawn(Vec3::new(0.0, 0.0, 5.0 + i as f32 * 2.0), 0.5, mesh);
    }
    fixture.update(0);

    let ray = Ray::new(Vec3::zeros(), Vec3::z());
    let result = fixture.scene.ray_cast_closest_hit(&fixture.world, &ray, 0.0, f32::MAX);

    assert_eq!(result, Err(BvhError::TraversalStackOverflow { capacity: 1 }));
}

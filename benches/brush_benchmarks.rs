//! Benchmarks for `brushwork` mesh operations.
//!
//! Run with: `cargo bench --bench brush_benchmarks`
//!
//! Covered:
//! - Canonical cuboid construction
//! - Rebuilding a brush from a plane list (the load-time path)
//! - Repeated half-space cuts with increasing plane counts
//! - Vertex and side dragging (the interactive path)
//! - Deep cloning (the undo-snapshot path)

use divan::{Bencher, black_box};
use glam::DVec3;

use brushwork::math::{BoundingBox, Plane};
use brushwork::{BrushGeometry, Face};

fn main() {
    divan::main();
}

const WORLD: BoundingBox = BoundingBox::new(DVec3::splat(-4096.0), DVec3::splat(4096.0));

/// The six bounding planes of an axis-aligned box of half-extent `r`.
fn box_planes(r: f64) -> Vec<Plane> {
    vec![
        Plane::new(DVec3::X, r),
        Plane::new(-DVec3::X, r),
        Plane::new(DVec3::Y, r),
        Plane::new(-DVec3::Y, r),
        Plane::new(DVec3::Z, r),
        Plane::new(-DVec3::Z, r),
    ]
}

/// Evenly distributed normals for many-sided brushes.
fn fibonacci_sphere_planes(n: usize, r: f64) -> Vec<Plane> {
    let golden = std::f64::consts::PI * (5.0_f64.sqrt() - 1.0);
    (0..n)
        .map(|i| {
            let y = 1.0 - (i as f64 / (n - 1) as f64) * 2.0;
            let radius = (1.0 - y * y).sqrt();
            let theta = golden * i as f64;
            let normal = DVec3::new(theta.cos() * radius, y, theta.sin() * radius).normalize();
            Plane::new(normal, r)
        })
        .collect()
}

fn build_brush(planes: &[Plane]) -> BrushGeometry {
    let mut brush = BrushGeometry::from_bounds(WORLD);
    for &plane in planes {
        brush
            .add_face(Face::from_plane(WORLD, plane))
            .expect("benchmark planes are well-formed");
    }
    brush
}

#[divan::bench]
fn cuboid_construction(bencher: Bencher) {
    bencher.bench(|| {
        black_box(BrushGeometry::from_bounds(black_box(WORLD)));
    });
}

#[divan::bench]
fn rebuild_box_brush(bencher: Bencher) {
    let planes = box_planes(64.0);
    bencher.bench(|| {
        black_box(build_brush(black_box(&planes)));
    });
}

#[divan::bench(args = [8, 16, 32])]
fn rebuild_round_brush(bencher: Bencher, n: usize) {
    let planes = fibonacci_sphere_planes(n, 512.0);
    bencher.bench(|| {
        black_box(build_brush(black_box(&planes)));
    });
}

#[divan::bench]
fn vertex_drag_round_trip(bencher: Bencher) {
    let planes = box_planes(64.0);
    let base = build_brush(&planes);
    bencher.bench(|| {
        let mut brush = base.clone();
        let corner = brush.find_vertex(DVec3::splat(64.0)).unwrap();
        let up = brush.move_vertex(corner, DVec3::new(0.0, 0.0, 32.0));
        assert!(up.moved);
        let brushwork::DragHandle::Vertex(vertex) = up.handle else {
            panic!("expected a vertex handle");
        };
        let down = brush.move_vertex(vertex, DVec3::new(0.0, 0.0, -32.0));
        assert!(down.moved);
        black_box(brush);
    });
}

#[divan::bench]
fn side_translate(bencher: Bencher) {
    let planes = box_planes(64.0);
    let base = build_brush(&planes);
    let top = [
        DVec3::new(64.0, 64.0, 64.0),
        DVec3::new(64.0, -64.0, 64.0),
        DVec3::new(-64.0, -64.0, 64.0),
        DVec3::new(-64.0, 64.0, 64.0),
    ];
    bencher.bench(|| {
        let mut brush = base.clone();
        let side = brush.find_side(&top).unwrap();
        let result = brush.move_side(side, DVec3::new(0.0, 0.0, 16.0));
        assert!(result.moved);
        black_box(brush);
    });
}

#[divan::bench(args = [8, 16, 32])]
fn deep_clone(bencher: Bencher, n: usize) {
    let planes = fibonacci_sphere_planes(n, 512.0);
    let base = build_brush(&planes);
    bencher.bench(|| {
        black_box(base.clone());
    });
}

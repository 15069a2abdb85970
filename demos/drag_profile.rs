//! Profiling binary for the drag pipeline.
//! Run with: cargo flamegraph --profile release-with-debug --example drag_profile

use glam::DVec3;

use brushwork::math::{BoundingBox, Plane};
use brushwork::{BrushGeometry, DragHandle, Face};

fn main() {
    const ITERATIONS: usize = 10_000;

    let world = BoundingBox::new(DVec3::splat(-4096.0), DVec3::splat(4096.0));
    let planes = [
        Plane::new(DVec3::X, 64.0),
        Plane::new(-DVec3::X, 64.0),
        Plane::new(DVec3::Y, 64.0),
        Plane::new(-DVec3::Y, 64.0),
        Plane::new(DVec3::Z, 64.0),
        Plane::new(-DVec3::Z, 64.0),
    ];

    // Build the base brush once.
    let mut base = BrushGeometry::from_bounds(world);
    for plane in planes {
        base.add_face(Face::from_plane(world, plane))
            .expect("box planes are well-formed");
    }

    println!(
        "Built brush with {} vertices, {} sides",
        base.vertex_count(),
        base.side_count()
    );
    println!("Running {ITERATIONS} drag iterations...");

    // Profile a raise-then-flatten drag of one corner.
    for _ in 0..ITERATIONS {
        let mut brush = base.clone();
        let corner = brush.find_vertex(DVec3::splat(64.0)).unwrap();
        let up = brush.move_vertex(corner, DVec3::new(0.0, 0.0, 32.0));
        assert!(up.moved);
        if let DragHandle::Vertex(vertex) = up.handle {
            let down = brush.move_vertex(vertex, DVec3::new(0.0, 0.0, -32.0));
            assert!(down.moved);
        }
    }

    println!("Done.");
}

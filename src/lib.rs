//! # `brushwork`
//!
//! Boundary-representation engine for the convex brushes of a map editor.
//!
//! A brush is defined implicitly as the intersection of oriented
//! half-spaces (its faces). This crate maintains the explicit boundary
//! mesh of that intersection, a closed convex 2-manifold arrangement of
//! vertices, edges and polygonal sides, and keeps it correct under three
//! families of operations:
//!
//! - **Face addition**: cutting the mesh with a new half-space, the step
//!   that turns a plane list into a mesh ([`BrushGeometry::add_face`]).
//! - **Transforms**: translation, exact quarter-turns, arbitrary
//!   rotation, axial flips.
//! - **Dragging**: moving a vertex, an edge midpoint or a side centroid
//!   by a delta, with all the implied surgery: side splitting, coplanar
//!   re-merging, collinear cleanup and vertex welding
//!   ([`BrushGeometry::drag`]).
//!
//! Coordinates are `f64` and integer-snapped after every cut and drag to
//! stop floating-point drift; all tolerance decisions go through the
//! predicates in [`math`].
//!
//! ## Quick start
//!
//! ```
//! use brushwork::math::{BoundingBox, DVec3, Plane};
//! use brushwork::{BrushGeometry, CutResult, Face};
//!
//! // Brushes are carved out of a world-sized cuboid by their plane list.
//! let world = BoundingBox::new(DVec3::splat(-64.0), DVec3::splat(64.0));
//! let mut brush = BrushGeometry::from_bounds(world);
//!
//! let planes = [
//!     Plane::new(DVec3::X, 16.0),
//!     Plane::new(-DVec3::X, 16.0),
//!     Plane::new(DVec3::Y, 16.0),
//!     Plane::new(-DVec3::Y, 16.0),
//!     Plane::new(DVec3::Z, 16.0),
//!     Plane::new(-DVec3::Z, 16.0),
//! ];
//! for plane in planes {
//!     let result = brush.add_face(Face::from_plane(world, plane)).unwrap();
//!     assert!(matches!(result, CutResult::Split { .. }));
//! }
//! assert_eq!(brush.vertex_count(), 8);
//! assert!(brush.closed());
//!
//! // Drag a corner upward; the mesh splits and re-merges as needed.
//! let corner = brush.find_vertex(DVec3::splat(16.0)).unwrap();
//! let result = brush.move_vertex(corner, DVec3::new(0.0, 0.0, 8.0));
//! assert!(result.moved);
//! brush.check().unwrap();
//! ```
//!
//! ## Ownership and handles
//!
//! One [`BrushGeometry`] is exclusively owned by one editor document; the
//! engine is single-threaded and synchronous. Its algorithms repeatedly
//! invalidate their own intermediate state, and no concurrent reader
//! could observe anything coherent mid-operation.
//!
//! Mesh elements live in per-geometry slot pools and are addressed by
//! typed handles ([`VertexIdx`], [`EdgeIdx`], [`SideIdx`], [`FaceIdx`]).
//! Handles are stable while their element lives, but an operation that
//! reports an element deleted invalidates its handle; the drag results
//! carry the handle to keep a selection on.
//!
//! Failure atomicity is the caller's business for vertex drags (clone
//! first via [`Clone`], commit on `moved`); edge and side translations do
//! this internally, and [`BrushGeometry::add_face`] follows
//! catch-and-discard on [`GeometryError`] or [`CutResult::Null`].

#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::module_name_repetitions)]

pub mod math;
pub mod pool;

mod cut;
mod drag;
mod elements;
mod geometry;
mod position_set;

pub use cut::{CutResult, CutSummary};
pub use drag::{DragHandle, DragResult};
pub use elements::{Edge, EdgeIdx, Face, FaceId, FaceIdx, Side, SideIdx, Vertex, VertexIdx};
pub use geometry::{BrushGeometry, GeometryError, TopologyError};
pub use position_set::PositionSet;

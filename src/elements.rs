//! B-rep elements: vertices, edges, sides and faces, addressed by typed
//! pool handles.
//!
//! Orientation is threaded through a per-side convention instead of stored
//! half-edges: for a side `S`, an edge runs from `start_vertex(S)` to
//! `end_vertex(S)`, where the start is the edge's `end` field when `S` is
//! its left neighbour and its `start` field otherwise. A side's vertex and
//! edge cycles are kept aligned under that convention:
//! `edges[i].start_vertex(side) == vertices[i]` for every `i`.

use std::sync::atomic::{AtomicU64, Ordering};

use glam::DVec3;

use crate::math::{BoundingBox, Plane};
use crate::pool::{Pool, SlotIndex};

macro_rules! pool_index {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub usize);

        impl SlotIndex for $name {
            #[inline]
            fn from_slot(slot: usize) -> Self {
                Self(slot)
            }
            #[inline]
            fn slot(self) -> usize {
                self.0
            }
        }
    };
}

pool_index!(
    /// Handle into the vertex pool.
    VertexIdx
);
pool_index!(
    /// Handle into the edge pool.
    EdgeIdx
);
pool_index!(
    /// Handle into the side pool.
    SideIdx
);
pool_index!(
    /// Handle into the face pool.
    FaceIdx
);

/// Next index in a cyclic sequence.
#[inline]
pub(crate) const fn succ(i: usize, count: usize) -> usize {
    (i + 1) % count
}

#[inline]
pub(crate) const fn succ_by(i: usize, count: usize, offset: usize) -> usize {
    (i + offset) % count
}

/// Previous index in a cyclic sequence.
#[inline]
pub(crate) const fn pred(i: usize, count: usize) -> usize {
    (i + count - 1) % count
}

#[inline]
pub(crate) const fn pred_by(i: usize, count: usize, offset: usize) -> usize {
    (i + count - offset % count) % count
}

/// A mesh corner. Nothing but a position; transient algorithm state lives
/// in per-operation mark maps, not on the vertex.
#[derive(Clone, Debug)]
pub struct Vertex {
    pub position: DVec3,
}

impl Vertex {
    #[must_use]
    pub const fn new(position: DVec3) -> Self {
        Self { position }
    }
}

/// An unordered vertex pair separating two sides.
///
/// On a closed mesh both `left` and `right` are set and distinct; they are
/// `None` only transiently, while a cut or split is wiring a new side.
#[derive(Clone, Debug)]
pub struct Edge {
    pub start: VertexIdx,
    pub end: VertexIdx,
    pub left: Option<SideIdx>,
    pub right: Option<SideIdx>,
}

impl Edge {
    #[must_use]
    pub const fn new(start: VertexIdx, end: VertexIdx) -> Self {
        Self {
            start,
            end,
            left: None,
            right: None,
        }
    }

    /// First vertex of this edge when traversing `side`'s boundary.
    ///
    /// # Panics
    /// Panics if `side` is not one of the edge's two neighbours.
    #[must_use]
    pub fn start_vertex(&self, side: SideIdx) -> VertexIdx {
        if self.left == Some(side) {
            self.end
        } else if self.right == Some(side) {
            self.start
        } else {
            panic!("edge {self:?} is not incident to side {side:?}")
        }
    }

    /// Second vertex of this edge when traversing `side`'s boundary.
    ///
    /// # Panics
    /// Panics if `side` is not one of the edge's two neighbours.
    #[must_use]
    pub fn end_vertex(&self, side: SideIdx) -> VertexIdx {
        if self.left == Some(side) {
            self.start
        } else if self.right == Some(side) {
            self.end
        } else {
            panic!("edge {self:?} is not incident to side {side:?}")
        }
    }

    /// The neighbour across from `side`, if any.
    #[must_use]
    pub fn other_side(&self, side: SideIdx) -> Option<SideIdx> {
        if self.left == Some(side) {
            self.right
        } else if self.right == Some(side) {
            self.left
        } else {
            None
        }
    }

    #[inline]
    #[must_use]
    pub fn has_vertex(&self, vertex: VertexIdx) -> bool {
        self.start == vertex || self.end == vertex
    }

    /// Returns the endpoint that is not `vertex`, or `None` if `vertex` is
    /// not an endpoint.
    #[must_use]
    pub fn other_vertex(&self, vertex: VertexIdx) -> Option<VertexIdx> {
        if self.start == vertex {
            Some(self.end)
        } else if self.end == vertex {
            Some(self.start)
        } else {
            None
        }
    }

    /// Do the two edges share an endpoint?
    #[must_use]
    pub fn incident_with(&self, other: &Self) -> bool {
        self.has_vertex(other.start) || self.has_vertex(other.end)
    }

    /// Direction `start -> end` in world space.
    #[must_use]
    pub fn vector(&self, vertices: &Pool<VertexIdx, Vertex>) -> DVec3 {
        vertices[self.end].position - vertices[self.start].position
    }

    /// Direction of traversal along `side`'s boundary.
    #[must_use]
    pub fn vector_for(&self, side: SideIdx, vertices: &Pool<VertexIdx, Vertex>) -> DVec3 {
        vertices[self.end_vertex(side)].position - vertices[self.start_vertex(side)].position
    }

    /// Midpoint of the segment.
    #[must_use]
    pub fn center(&self, vertices: &Pool<VertexIdx, Vertex>) -> DVec3 {
        (vertices[self.start].position + vertices[self.end].position) * 0.5
    }

    /// Reverse the edge: swap endpoints and side links. The traversal
    /// direction relative to either neighbour is unchanged.
    pub fn flip(&mut self) {
        std::mem::swap(&mut self.start, &mut self.end);
        std::mem::swap(&mut self.left, &mut self.right);
    }
}

/// A polygonal side: aligned vertex and edge cycles plus the face realised
/// on it.
#[derive(Clone, Debug, Default)]
pub struct Side {
    pub vertices: Vec<VertexIdx>,
    pub edges: Vec<EdgeIdx>,
    pub face: Option<FaceIdx>,
}

impl Side {
    /// Rotate both cycles so that position `offset` becomes position 0.
    pub fn shift(&mut self, offset: usize) {
        let count = self.edges.len();
        if count == 0 || offset % count == 0 {
            return;
        }
        self.vertices.rotate_left(offset % count);
        self.edges.rotate_left(offset % count);
    }

    /// Reverse the traversal direction of the boundary.
    ///
    /// Assumes every boundary edge already had its endpoints swapped (which
    /// flips its per-side direction); the one-step rotation realigns the
    /// edge cycle with the reversed vertex cycle.
    pub fn flip(&mut self) {
        self.vertices.reverse();
        self.edges.reverse();
        self.edges.rotate_left(1);
    }

    /// Replace the boundary run between `index1` and `index2` (exclusive)
    /// with a single edge. The replacement edge must already have `this` as
    /// one of its neighbours, oriented so that its traversal start follows
    /// `edges[index1]`.
    pub fn replace_edges(
        &mut self,
        index1: usize,
        index2: usize,
        edge_idx: EdgeIdx,
        edges: &Pool<EdgeIdx, Edge>,
        this: SideIdx,
    ) {
        let edge = &edges[edge_idx];
        let start = edge.start_vertex(this);
        let end = edge.end_vertex(this);

        if index2 > index1 {
            self.vertices.drain(index1 + 1..index2 + 1);
            self.edges.drain(index1 + 1..index2);
            self.vertices.insert(index1 + 1, start);
            self.vertices.insert(index1 + 2, end);
            self.edges.insert(index1 + 1, edge_idx);
        } else {
            // The run wraps past position 0: trim both ends instead.
            self.vertices.drain(index1 + 1..);
            self.vertices.drain(..index2 + 1);
            self.edges.drain(index1 + 1..);
            self.edges.drain(..index2);
            self.vertices.push(start);
            self.vertices.insert(0, end);
            self.edges.push(edge_idx);
        }

        debug_assert_eq!(self.vertices.len(), self.edges.len());
    }
}

static NEXT_FACE_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of a face across clones and splits, for editor-side
/// metadata bookkeeping.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FaceId(u64);

impl FaceId {
    fn next() -> Self {
        Self(NEXT_FACE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// The logical surface a side realises: an oriented boundary plane, its
/// defining three points, and the world bounds of the owning document.
///
/// The engine treats faces as attribute carriers: it copies them when a
/// side splits, re-parents them when sides merge, and hands them back by
/// value when their side is dropped. Editor metadata stays outside, keyed
/// by [`FaceId`].
#[derive(Clone, Debug)]
pub struct Face {
    id: FaceId,
    world_bounds: BoundingBox,
    points: [DVec3; 3],
    boundary: Plane,
    pub(crate) side: Option<SideIdx>,
}

impl Face {
    /// Face from three boundary points wound clockwise as seen from
    /// outside. `None` when the points are collinear.
    #[must_use]
    pub fn from_points(world_bounds: BoundingBox, points: [DVec3; 3]) -> Option<Self> {
        let boundary = Plane::from_points(points[0], points[1], points[2])?;
        Some(Self {
            id: FaceId::next(),
            world_bounds,
            points,
            boundary,
            side: None,
        })
    }

    /// Face from an oriented plane; synthesises the three-point form.
    #[must_use]
    pub fn from_plane(world_bounds: BoundingBox, boundary: Plane) -> Self {
        let n = boundary.normal;
        let arbitrary = if n.x.abs() < 0.9 { DVec3::X } else { DVec3::Y };
        let u = n.cross(arbitrary).normalize();
        let v = n.cross(u);
        let p0 = n * boundary.distance;
        Self {
            id: FaceId::next(),
            world_bounds,
            points: [p0, p0 + v, p0 + u],
            boundary,
            side: None,
        }
    }

    /// A detached copy carrying the same geometry under a fresh identity.
    /// Used when a side splits and each fragment needs its own face.
    #[must_use]
    pub fn derived(&self) -> Self {
        Self {
            id: FaceId::next(),
            world_bounds: self.world_bounds,
            points: self.points,
            boundary: self.boundary,
            side: None,
        }
    }

    #[inline]
    #[must_use]
    pub const fn id(&self) -> FaceId {
        self.id
    }

    #[inline]
    #[must_use]
    pub const fn boundary(&self) -> Plane {
        self.boundary
    }

    #[inline]
    #[must_use]
    pub const fn world_bounds(&self) -> BoundingBox {
        self.world_bounds
    }

    #[inline]
    #[must_use]
    pub const fn points(&self) -> [DVec3; 3] {
        self.points
    }

    #[inline]
    #[must_use]
    pub const fn side(&self) -> Option<SideIdx> {
        self.side
    }

    /// Re-derive the stored three-point representation from the current
    /// side polygon. Returns `false` (leaving the face untouched) when the
    /// given points are collinear.
    pub(crate) fn update_points(&mut self, p0: DVec3, p1: DVec3, p2: DVec3) -> bool {
        match Plane::from_points(p0, p1, p2) {
            Some(boundary) => {
                self.points = [p0, p1, p2];
                self.boundary = boundary;
                true
            }
            None => false,
        }
    }
}

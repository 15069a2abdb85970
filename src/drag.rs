//! Vertex, edge and side dragging: incremental mesh surgery.
//!
//! A drag moves one mesh entity by a delta and repairs everything that
//! breaks along the way. The pipeline for a vertex:
//!
//! 1. Split every non-triangle side incident to the vertex, so the
//!    neighbourhood consists of triangles only.
//! 2. Clamp the move distance to the first incident triangle flip or
//!    neighbour-plane crossing along the drag ray.
//! 3. Apply the move, then handle incidence events: landing on a foreign
//!    edge undoes the drag; landing on another vertex merges or undoes.
//! 4. Remove incident triangles that went collinear.
//! 5. Merge coplanar neighbour sides back together, then weld collinear
//!    edge chains.
//! 6. If the clamp consumed only part of the request, recurse with the
//!    remainder; once done, snap every vertex to the grid and let faces
//!    refresh their three-point form.
//!
//! Edge and side handles resolve to a midpoint split and a centroid fan
//! feeding the same vertex pipeline. The rigid `move_edge`/`move_side`
//! translations instead run per-vertex drags on a deep clone and commit
//! it only when every constituent drag succeeds.
//!
//! Drags never error: an impossible drag reports `moved: false` and
//! leaves the mesh as it was.

use glam::DVec3;
use itertools::Itertools;
use tracing::debug;

use crate::elements::{
    Edge, EdgeIdx, Face, FaceIdx, Side, SideIdx, Vertex, VertexIdx, pred, pred_by, succ, succ_by,
};
use crate::geometry::BrushGeometry;
use crate::math::{self, Plane, Ray};

/// A draggable mesh entity. Edge handles drag the edge's midpoint, side
/// handles the side's centroid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DragHandle {
    Vertex(VertexIdx),
    Edge(EdgeIdx),
    Side(SideIdx),
}

/// Outcome of a drag operation.
#[derive(Debug)]
pub struct DragResult {
    /// The mesh changed. `false` means the drag would have violated
    /// convexity or closedness and nothing was touched.
    pub moved: bool,
    /// The dragged entity was absorbed into another (not an error). The
    /// handle then names the entity at the drag's starting geometry when
    /// one could be recovered.
    pub deleted: bool,
    /// Where to keep the selection.
    pub handle: DragHandle,
    /// Faces created by side splits during the drag, still attached.
    pub new_faces: Vec<FaceIdx>,
    /// Pre-existing faces whose sides were dropped, handed back by value.
    pub dropped_faces: Vec<Face>,
}

impl DragResult {
    fn unchanged(handle: DragHandle) -> Self {
        Self {
            moved: false,
            deleted: false,
            handle,
            new_faces: Vec::new(),
            dropped_faces: Vec::new(),
        }
    }
}

/// Face bookkeeping across one drag.
#[derive(Default)]
struct FaceChurn {
    new_faces: Vec<FaceIdx>,
    dropped_faces: Vec<Face>,
}

impl FaceChurn {
    /// Route a face detached from its side: faces born inside this very
    /// operation vanish without a trace, pre-existing ones are reported
    /// to the caller for metadata retirement.
    fn retire(&mut self, face_idx: FaceIdx, face: Face) {
        if let Some(pos) = self.new_faces.iter().position(|&f| f == face_idx) {
            self.new_faces.swap_remove(pos);
        } else {
            self.dropped_faces.push(face);
        }
    }
}

/// Internal outcome of the recursive vertex pipeline.
enum VertexDrag {
    Moved(VertexIdx),
    Deleted,
    Unchanged(VertexIdx),
}

impl BrushGeometry {
    /// Drag `handle` by `delta`.
    ///
    /// Vertices move directly; an edge handle splits the edge at its
    /// midpoint and drags the split vertex; a side handle fans the side
    /// around its centroid and drags the centre.
    pub fn drag(&mut self, handle: DragHandle, delta: DVec3) -> DragResult {
        match handle {
            DragHandle::Vertex(v) => self.move_vertex(v, delta),
            DragHandle::Edge(e) => self.split_and_move_edge(e, delta),
            DragHandle::Side(s) => self.split_and_move_side(s, delta),
        }
    }

    /// Drag one vertex by `delta`, merging it into any vertex it lands on.
    pub fn move_vertex(&mut self, vertex: VertexIdx, delta: DVec3) -> DragResult {
        if !self.vertices.contains(vertex) || delta.length_squared() == 0.0 {
            return DragResult::unchanged(DragHandle::Vertex(vertex));
        }

        let mut churn = FaceChurn::default();
        let outcome = self.drag_vertex(vertex, true, delta, &mut churn);
        let (moved, deleted, handle) = match outcome {
            VertexDrag::Moved(v) => (true, false, DragHandle::Vertex(v)),
            VertexDrag::Deleted => (true, true, DragHandle::Vertex(vertex)),
            VertexDrag::Unchanged(v) => (false, false, DragHandle::Vertex(v)),
        };
        debug!(?handle, moved, deleted, "vertex drag finished");
        DragResult {
            moved,
            deleted,
            handle,
            new_faces: churn.new_faces,
            dropped_faces: churn.dropped_faces,
        }
    }

    /// Split `edge` at its midpoint and drag the new vertex by `delta`.
    ///
    /// Rejected up front when the delta dips below either incident side's
    /// boundary plane, which would fold that neighbour concave.
    pub fn split_and_move_edge(&mut self, edge_idx: EdgeIdx, delta: DVec3) -> DragResult {
        if !self.edges.contains(edge_idx) || delta.length_squared() == 0.0 {
            return DragResult::unchanged(DragHandle::Edge(edge_idx));
        }

        let (left, right, start_v, end_v) = {
            let edge = &self.edges[edge_idx];
            let (Some(left), Some(right)) = (edge.left, edge.right) else {
                return DragResult::unchanged(DragHandle::Edge(edge_idx));
            };
            (left, right, edge.start, edge.end)
        };
        let (Some(left_plane), Some(right_plane)) =
            (self.side_boundary(left), self.side_boundary(right))
        else {
            return DragResult::unchanged(DragHandle::Edge(edge_idx));
        };
        if math::neg(delta.dot(left_plane.normal)) || math::neg(delta.dot(right_plane.normal)) {
            return DragResult::unchanged(DragHandle::Edge(edge_idx));
        }

        let start_pos = self.vertices[start_v].position;
        let end_pos = self.vertices[end_v].position;

        // Rotate both neighbours so the edge sits at the tail of their
        // cycles, then interpose the midpoint vertex and the two half
        // edges.
        for side_idx in [left, right] {
            let pos = self.sides[side_idx]
                .edges
                .iter()
                .position(|&e| e == edge_idx)
                .unwrap();
            self.sides[side_idx].shift(pos + 1);
        }

        let mid = (start_pos + end_pos) * 0.5;
        let vertex = self.vertices.insert(Vertex::new(mid));
        self.sides[left].vertices.push(vertex);
        self.sides[right].vertices.push(vertex);

        let mut first_half = Edge::new(start_v, vertex);
        first_half.left = Some(left);
        first_half.right = Some(right);
        let first_half = self.edges.insert(first_half);

        let mut second_half = Edge::new(vertex, end_v);
        second_half.left = Some(left);
        second_half.right = Some(right);
        let second_half = self.edges.insert(second_half);

        self.sides[left].edges.pop();
        self.sides[right].edges.pop();
        self.sides[left].edges.push(second_half);
        self.sides[left].edges.push(first_half);
        self.sides[right].edges.push(first_half);
        self.sides[right].edges.push(second_half);
        self.edges.remove(edge_idx);

        let mut churn = FaceChurn::default();
        let outcome = self.drag_vertex(vertex, true, delta, &mut churn);
        let (moved, deleted, handle) = match outcome {
            VertexDrag::Moved(v) => (true, false, DragHandle::Vertex(v)),
            VertexDrag::Deleted => {
                // Recover the selection through the old endpoints.
                let handle = self
                    .find_edge(start_pos, end_pos)
                    .map_or(DragHandle::Edge(edge_idx), DragHandle::Edge);
                (true, true, handle)
            }
            VertexDrag::Unchanged(_) => {
                // The split was merged back out; hand back the restored
                // edge.
                let handle = self
                    .find_edge(start_pos, end_pos)
                    .map_or(DragHandle::Edge(edge_idx), DragHandle::Edge);
                (false, false, handle)
            }
        };
        DragResult {
            moved,
            deleted,
            handle,
            new_faces: churn.new_faces,
            dropped_faces: churn.dropped_faces,
        }
    }

    /// Fan `side` into triangles around its centroid and drag the centre
    /// vertex by `delta`.
    ///
    /// Rejected when `delta` is parallel to the side, which could only
    /// shear the face.
    pub fn split_and_move_side(&mut self, side_idx: SideIdx, delta: DVec3) -> DragResult {
        if !self.sides.contains(side_idx) || delta.length_squared() == 0.0 {
            return DragResult::unchanged(DragHandle::Side(side_idx));
        }
        let Some(boundary) = self.side_boundary(side_idx) else {
            return DragResult::unchanged(DragHandle::Side(side_idx));
        };
        if math::zero(delta.dot(boundary.normal)) {
            return DragResult::unchanged(DragHandle::Side(side_idx));
        }

        let old_positions: Vec<DVec3> = self.sides[side_idx]
            .vertices
            .iter()
            .map(|&v| self.vertices[v].position)
            .collect();
        let parent_face = self.sides[side_idx].face;
        let mut churn = FaceChurn::default();

        let centroid = self.side_centroid(side_idx);
        let vertex = self.vertices.insert(Vertex::new(centroid));

        let count = self.sides[side_idx].edges.len();
        let first_start = {
            let e0 = self.sides[side_idx].edges[0];
            self.edges[e0].start_vertex(side_idx)
        };
        let first_spoke = self.edges.insert(Edge::new(vertex, first_start));
        let mut last_spoke = first_spoke;

        for i in 0..count {
            let side_edge = self.sides[side_idx].edges[i];
            let next_spoke = if i == count - 1 {
                first_spoke
            } else {
                let end_v = self.edges[side_edge].end_vertex(side_idx);
                self.edges.insert(Edge::new(vertex, end_v))
            };

            let triangle = self.sides.insert(Side::default());
            let last_end = self.edges[last_spoke].end;
            let next_end = self.edges[next_spoke].end;
            {
                let tri = &mut self.sides[triangle];
                tri.vertices = vec![vertex, last_end, next_end];
                tri.edges = vec![last_spoke, side_edge, next_spoke];
            }
            self.edges[last_spoke].right = Some(triangle);
            {
                let edge = &mut self.edges[side_edge];
                if edge.left == Some(side_idx) {
                    edge.left = Some(triangle);
                } else {
                    edge.right = Some(triangle);
                }
            }
            self.edges[next_spoke].left = Some(triangle);
            self.attach_derived_face(triangle, parent_face, &mut churn);

            last_spoke = next_spoke;
        }

        let side = self
            .sides
            .remove(side_idx)
            .unwrap_or_else(|| unreachable!("side was live"));
        if let Some(face_idx) = side.face
            && let Some(mut face) = self.faces.remove(face_idx)
        {
            face.side = None;
            churn.dropped_faces.push(face);
        }

        let outcome = self.drag_vertex(vertex, true, delta, &mut churn);
        let (moved, deleted, handle) = match outcome {
            VertexDrag::Moved(v) => (true, false, DragHandle::Vertex(v)),
            VertexDrag::Deleted => {
                let handle = self
                    .find_side(&old_positions)
                    .map_or(DragHandle::Side(side_idx), DragHandle::Side);
                (true, true, handle)
            }
            VertexDrag::Unchanged(_) => {
                let handle = self
                    .find_side(&old_positions)
                    .map_or(DragHandle::Side(side_idx), DragHandle::Side);
                (false, false, handle)
            }
        };
        DragResult {
            moved,
            deleted,
            handle,
            new_faces: churn.new_faces,
            dropped_faces: churn.dropped_faces,
        }
    }

    /// Translate an existing edge rigidly by `delta`.
    ///
    /// Runs the two endpoint drags on a deep clone and commits the clone
    /// only when both succeed; on failure the geometry is untouched.
    pub fn move_edge(&mut self, edge_idx: EdgeIdx, delta: DVec3) -> DragResult {
        if !self.edges.contains(edge_idx) || delta.length_squared() == 0.0 {
            return DragResult::unchanged(DragHandle::Edge(edge_idx));
        }

        let mut test = self.clone();
        let mut churn = FaceChurn::default();

        let (start_v, end_v) = {
            let edge = &test.edges[edge_idx];
            (edge.start, edge.end)
        };
        let start_pos = test.vertices[start_v].position;
        let end_pos = test.vertices[end_v].position;

        // Move the leading endpoint first so the edge never collapses
        // through itself.
        let order = if (end_pos - start_pos).dot(delta) > 0.0 {
            [end_v, start_v]
        } else {
            [start_v, end_v]
        };

        for v in order {
            if !test.vertices.contains(v) {
                return DragResult::unchanged(DragHandle::Edge(edge_idx));
            }
            if matches!(
                test.drag_vertex(v, false, delta, &mut churn),
                VertexDrag::Unchanged(_)
            ) {
                return DragResult::unchanged(DragHandle::Edge(edge_idx));
            }
        }

        *self = test;
        debug_assert!(self.check().is_ok());
        let found = self.find_edge(start_pos + delta, end_pos + delta);
        DragResult {
            moved: true,
            deleted: found.is_none(),
            handle: found.map_or(DragHandle::Edge(edge_idx), DragHandle::Edge),
            new_faces: churn.new_faces,
            dropped_faces: churn.dropped_faces,
        }
    }

    /// Translate an existing side rigidly by `delta`, one vertex drag at
    /// a time on a deep clone, committed only when every drag succeeds.
    pub fn move_side(&mut self, side_idx: SideIdx, delta: DVec3) -> DragResult {
        if !self.sides.contains(side_idx) || delta.length_squared() == 0.0 {
            return DragResult::unchanged(DragHandle::Side(side_idx));
        }

        let mut test = self.clone();
        let mut churn = FaceChurn::default();
        let dir = delta / delta.length();
        let side_center = test.side_centroid(side_idx);

        let target_positions: Vec<DVec3> = test.sides[side_idx]
            .vertices
            .iter()
            .map(|&v| test.vertices[v].position + delta)
            .collect();

        // Drag trailing vertices first (ascending projection on the drag
        // direction), so leading ones never collide with them mid-move.
        let mut order: Vec<(VertexIdx, f64)> = test.sides[side_idx]
            .vertices
            .iter()
            .map(|&v| (v, (test.vertices[v].position - side_center).dot(dir)))
            .collect();
        order.sort_by(|a, b| a.1.total_cmp(&b.1));

        for (v, _) in order {
            if !test.vertices.contains(v) {
                return DragResult::unchanged(DragHandle::Side(side_idx));
            }
            if matches!(
                test.drag_vertex(v, false, delta, &mut churn),
                VertexDrag::Unchanged(_)
            ) {
                return DragResult::unchanged(DragHandle::Side(side_idx));
            }
        }

        *self = test;
        debug_assert!(self.check().is_ok());
        let found = self.find_side(&target_positions);
        DragResult {
            moved: true,
            deleted: found.is_none(),
            handle: found.map_or(DragHandle::Side(side_idx), DragHandle::Side),
            new_faces: churn.new_faces,
            dropped_faces: churn.dropped_faces,
        }
    }

    /// Would [`move_vertex`](Self::move_vertex) succeed? Runs the drag on
    /// a throwaway clone.
    #[must_use]
    pub fn can_move_vertex(&self, vertex: VertexIdx, delta: DVec3) -> bool {
        self.clone().move_vertex(vertex, delta).moved
    }

    /// Would [`move_edge`](Self::move_edge) succeed?
    #[must_use]
    pub fn can_move_edge(&self, edge_idx: EdgeIdx, delta: DVec3) -> bool {
        self.clone().move_edge(edge_idx, delta).moved
    }

    /// Would [`move_side`](Self::move_side) succeed?
    #[must_use]
    pub fn can_move_side(&self, side_idx: SideIdx, delta: DVec3) -> bool {
        self.clone().move_side(side_idx, delta).moved
    }

    // The vertex pipeline

    fn drag_vertex(
        &mut self,
        vertex: VertexIdx,
        merge_incident: bool,
        delta: DVec3,
        churn: &mut FaceChurn,
    ) -> VertexDrag {
        let move_dist = delta.length();
        if move_dist == 0.0 {
            return VertexDrag::Unchanged(vertex);
        }
        let origin = self.vertices[vertex].position;
        let ray = Ray::new(origin, delta / move_dist);

        debug_assert!(self.check().is_ok());

        let incident = self.incident_sides(vertex);
        self.split_incident_sides(&incident, &ray, vertex, churn);

        let incident = self.incident_sides(vertex);
        let actual_dist = self.min_vertex_move_dist(&incident, vertex, &ray, move_dist);

        self.vertices[vertex].position = ray.point_at(actual_dist);
        let new_position = self.vertices[vertex].position;

        // Landing exactly on a foreign edge admits no legal mesh: undo.
        if self.vertex_on_foreign_edge(vertex) {
            self.vertices[vertex].position = origin;
            self.merge_sides(churn);
            self.merge_edges();
            return VertexDrag::Unchanged(vertex);
        }

        // Landing on another vertex merges the two or undoes the drag.
        if let Some(candidate) = self.coincident_vertex(vertex, new_position) {
            if merge_incident {
                self.merge_vertices(vertex, candidate, churn);
            } else {
                self.vertices[vertex].position = origin;
                self.merge_sides(churn);
                self.merge_edges();
                return VertexDrag::Unchanged(vertex);
            }
        }

        // The splitting left only triangles around the vertex; the move
        // may have flattened some of them.
        let incident = self.incident_sides(vertex);
        self.delete_collinear_triangles(&incident, churn);

        debug_assert!(self.check().is_ok());

        self.merge_sides(churn);
        self.merge_edges();
        self.recompute_bounds_center();

        let surviving = self.find_vertex(new_position);

        // A clamped move with the vertex still alive continues from the
        // clamp point with the unconsumed distance.
        if let Some(next) = surviving
            && actual_dist < move_dist
        {
            debug!(consumed = actual_dist, requested = move_dist, "drag clamped, continuing");
            let remaining = ray.direction * (move_dist - actual_dist);
            return self.drag_vertex(next, merge_incident, remaining, churn);
        }

        for v_idx in self.vertices.indices() {
            let p = self.vertices[v_idx].position;
            self.vertices[v_idx].position = math::snapped(p);
        }
        self.refresh_face_points();
        self.recompute_bounds_center();

        match surviving {
            Some(v) => VertexDrag::Moved(v),
            None => VertexDrag::Deleted,
        }
    }

    /// Boundary plane of a side: the attached face's plane, or the plane
    /// of the side polygon when no face is attached yet.
    fn side_boundary(&self, side_idx: SideIdx) -> Option<Plane> {
        match self.sides[side_idx].face {
            Some(face_idx) => Some(self.faces[face_idx].boundary()),
            None => self.side_plane(side_idx),
        }
    }

    /// Reduce every non-triangle side around `vertex` to triangles. A
    /// side the drag dives into loses one corner triangle
    /// ([`split_side`](Self::split_side)); a side the drag rises out of
    /// (or runs parallel to) is fanned completely and dropped.
    fn split_incident_sides(
        &mut self,
        incident: &[SideIdx],
        ray: &Ray,
        vertex: VertexIdx,
        churn: &mut FaceChurn,
    ) {
        for &side_idx in incident {
            if self.sides[side_idx].vertices.len() <= 3 {
                continue;
            }
            let normal_dir = {
                let side = &self.sides[side_idx];
                let p0 = self.vertices[side.vertices[0]].position;
                let v1 = self.vertices[*side.vertices.last().unwrap()].position - p0;
                let v2 = self.vertices[side.vertices[1]].position - p0;
                v1.cross(v2)
            };

            if math::neg(normal_dir.dot(ray.direction)) {
                self.split_side(side_idx, vertex, churn);
            } else {
                self.triangulate_side(side_idx, vertex, churn);
                let side = self
                    .sides
                    .remove(side_idx)
                    .unwrap_or_else(|| unreachable!("side was live"));
                if let Some(face_idx) = side.face
                    && let Some(face) = self.faces.remove(face_idx)
                {
                    churn.retire(face_idx, face);
                }
            }
            debug_assert!(self.check().is_ok());
        }
    }

    /// Carve the corner triangle at `vertex` off a side, leaving the side
    /// one vertex shorter. The new triangle carries a copy of the side's
    /// face.
    fn split_side(&mut self, side_idx: SideIdx, vertex: VertexIdx, churn: &mut FaceChurn) {
        let parent_face = self.sides[side_idx].face;
        let (count, at) = {
            let side = &self.sides[side_idx];
            let at = side
                .vertices
                .iter()
                .position(|&v| v == vertex)
                .expect("vertex is on the side");
            (side.vertices.len(), at)
        };

        let edge_in = self.sides[side_idx].edges[pred(at, count)];
        let in_inverted = self.edges[edge_in].left == Some(side_idx);
        let edge_out = self.sides[side_idx].edges[at];
        let out_inverted = self.edges[edge_out].left == Some(side_idx);

        // Shortcut from the vertex's predecessor to its successor; the
        // shortened side keeps it on the right, the new triangle takes
        // the left.
        let start = self.sides[side_idx].vertices[pred(at, count)];
        let end = self.sides[side_idx].vertices[succ(at, count)];
        let mut shortcut = Edge::new(start, end);
        shortcut.right = Some(side_idx);
        let shortcut = self.edges.insert(shortcut);

        self.sides[side_idx].replace_edges(
            pred_by(at, count, 2),
            succ(at, count),
            shortcut,
            &self.edges,
            side_idx,
        );

        let triangle = self.new_side_from_edges(
            &[edge_in, edge_out, shortcut],
            &[in_inverted, out_inverted, true],
        );
        self.attach_derived_face(triangle, parent_face, churn);
    }

    /// Replace a side with a triangle fan around `vertex`. The caller
    /// drops the fanned side afterwards; each fan triangle carries a copy
    /// of its face.
    fn triangulate_side(&mut self, side_idx: SideIdx, vertex: VertexIdx, churn: &mut FaceChurn) {
        let parent_face = self.sides[side_idx].face;
        let count = self.sides[side_idx].edges.len();
        let mut at = self.sides[side_idx]
            .vertices
            .iter()
            .position(|&v| v == vertex)
            .expect("vertex is on the side");

        let mut edge_a = self.sides[side_idx].edges[at];
        let mut a_inverted = self.edges[edge_a].left == Some(side_idx);
        let mut edge_b = self.sides[side_idx].edges[succ(at, count)];
        let mut b_inverted = self.edges[edge_b].left == Some(side_idx);

        for _ in 0..count - 3 {
            let far = self.sides[side_idx].vertices[succ_by(at, count, 2)];
            let spoke = self.edges.insert(Edge::new(far, vertex));

            let triangle =
                self.new_side_from_edges(&[edge_a, edge_b, spoke], &[a_inverted, b_inverted, false]);
            self.attach_derived_face(triangle, parent_face, churn);

            edge_a = spoke;
            a_inverted = true;
            edge_b = self.sides[side_idx].edges[succ_by(at, count, 2)];
            b_inverted = self.edges[edge_b].left == Some(side_idx);
            at = succ(at, count);
        }

        let edge_c = self.sides[side_idx].edges[succ_by(at, count, 2)];
        let c_inverted = self.edges[edge_c].left == Some(side_idx);
        let triangle = self.new_side_from_edges(
            &[edge_a, edge_b, edge_c],
            &[a_inverted, b_inverted, c_inverted],
        );
        self.attach_derived_face(triangle, parent_face, churn);
    }

    /// Give a freshly split-off side a copy of its parent's face (when
    /// the parent has one) and record it as born in this operation.
    fn attach_derived_face(
        &mut self,
        side_idx: SideIdx,
        parent_face: Option<FaceIdx>,
        churn: &mut FaceChurn,
    ) {
        let Some(parent) = parent_face else { return };
        let derived = self.faces[parent].derived();
        let face_idx = self.faces.insert(derived);
        self.faces[face_idx].side = Some(side_idx);
        self.sides[side_idx].face = Some(face_idx);
        churn.new_faces.push(face_idx);
    }

    /// How far along `ray` the vertex may travel before an incident
    /// triangle flips over or a neighbouring side's plane is crossed.
    fn min_vertex_move_dist(
        &mut self,
        incident: &[SideIdx],
        vertex: VertexIdx,
        ray: &Ray,
        max_dist: f64,
    ) -> f64 {
        let mut min_dist = max_dist;
        let count = incident.len();

        for i in 0..count {
            let side_idx = incident[i];
            let next_idx = incident[succ(i, count)];
            debug_assert_eq!(self.sides[side_idx].vertices.len(), 3);
            debug_assert_eq!(self.sides[next_idx].vertices.len(), 3);

            for s in [side_idx, next_idx] {
                let at = self.sides[s]
                    .vertices
                    .iter()
                    .position(|&v| v == vertex)
                    .expect("vertex is on its incident side");
                self.sides[s].shift(at);
            }

            // Plane through the two triangle tips opposite the vertex and
            // the next triangle's far tip: crossing it flips a triangle.
            let p1 = self.vertices[self.sides[side_idx].vertices[1]].position;
            let p2 = self.vertices[self.sides[side_idx].vertices[2]].position;
            let p3 = self.vertices[self.sides[next_idx].vertices[2]].position;
            if let Some(plane) = Plane::from_points(p1, p2, p3)
                && let Some(dist) = plane.intersect_ray(ray)
                && math::pos(dist)
                && math::lt(dist, min_dist)
            {
                min_dist = dist;
            }

            // Crossing the plane of the side beyond the opposite edge
            // would push the vertex through a neighbour.
            let opposite_edge = self.sides[side_idx].edges[1];
            if let Some(neighbour) = self.edges[opposite_edge].other_side(side_idx)
                && let Some(plane) = self.side_boundary(neighbour)
                && let Some(dist) = plane.intersect_ray(ray)
                && math::pos(dist)
                && math::lt(dist, min_dist)
            {
                min_dist = dist;
            }
        }

        min_dist
    }

    /// Is the vertex strictly between the endpoints of an edge it does
    /// not belong to?
    fn vertex_on_foreign_edge(&self, vertex: VertexIdx) -> bool {
        let position = self.vertices[vertex].position;
        for (_, edge) in self.edges.iter() {
            if edge.has_vertex(vertex) {
                continue;
            }
            let v1 = position - self.vertices[edge.start].position;
            let v2 = position - self.vertices[edge.end].position;
            if math::parallel(v1, v2, math::PARALLEL_EPSILON) {
                let along = edge.vector(&self.vertices);
                if (v1.dot(along) > 0.0) != (v2.dot(along) > 0.0) {
                    return true;
                }
            }
        }
        false
    }

    fn coincident_vertex(&self, vertex: VertexIdx, position: DVec3) -> Option<VertexIdx> {
        self.vertices
            .iter()
            .find(|&(i, v)| i != vertex && math::points_equal(v.position, position))
            .map(|(i, _)| i)
    }

    /// Weld `drop` into `keep`. Both must be adjacent, and the two sides
    /// of their shared edge must be triangles (the splitting phase
    /// guarantees this).
    fn merge_vertices(&mut self, keep: VertexIdx, drop: VertexIdx, churn: &mut FaceChurn) {
        let shared = self
            .edges
            .iter()
            .find(|(_, e)| {
                (e.start == keep && e.end == drop) || (e.start == drop && e.end == keep)
            })
            .map(|(i, _)| i)
            .expect("merged vertices are adjacent");

        // Retarget every other edge and side cycle from `drop` to `keep`.
        for edge_idx in self.edges.indices() {
            if edge_idx == shared || !self.edges[edge_idx].has_vertex(drop) {
                continue;
            }
            let (left, right) = {
                let edge = &mut self.edges[edge_idx];
                if edge.start == drop {
                    edge.start = keep;
                } else {
                    edge.end = keep;
                }
                (edge.left, edge.right)
            };
            for side_idx in [left, right].into_iter().flatten() {
                let side = &mut self.sides[side_idx];
                if let Some(pos) = side.vertices.iter().position(|&v| v == drop) {
                    side.vertices[pos] = keep;
                }
            }
        }

        let left = self.edges[shared].left.expect("closed mesh");
        let right = self.edges[shared].right.expect("closed mesh");
        debug_assert_eq!(self.sides[left].vertices.len(), 3);
        debug_assert_eq!(self.sides[right].vertices.len(), 3);
        self.delete_degenerate_triangle(left, shared, churn);
        self.delete_degenerate_triangle(right, shared, churn);

        self.edges.remove(shared);
        self.vertices.remove(drop);
    }

    /// Dissolve a triangle that has collapsed onto `edge`: its other two
    /// edges weld through the side across `edge`'s opposite boundary.
    fn delete_degenerate_triangle(
        &mut self,
        side_idx: SideIdx,
        edge_idx: EdgeIdx,
        churn: &mut FaceChurn,
    ) {
        debug_assert_eq!(self.sides[side_idx].edges.len(), 3);
        let at = self.sides[side_idx]
            .edges
            .iter()
            .position(|&e| e == edge_idx)
            .expect("edge is on the side");
        self.sides[side_idx].shift(at);

        let keep_edge = self.sides[side_idx].edges[1];
        let drop_edge = self.sides[side_idx].edges[2];
        let neighbour = self.edges[drop_edge]
            .other_side(side_idx)
            .expect("closed mesh");

        {
            let edge = &mut self.edges[keep_edge];
            if edge.left == Some(side_idx) {
                edge.left = Some(neighbour);
            } else {
                edge.right = Some(neighbour);
            }
        }

        let delete_at = self.sides[neighbour]
            .edges
            .iter()
            .position(|&e| e == drop_edge)
            .expect("edge is on its neighbour");
        let neighbour_count = self.sides[neighbour].edges.len();
        self.sides[neighbour].replace_edges(
            pred(delete_at, neighbour_count),
            succ(delete_at, neighbour_count),
            keep_edge,
            &self.edges,
            neighbour,
        );

        let side = self
            .sides
            .remove(side_idx)
            .unwrap_or_else(|| unreachable!("side was live"));
        if let Some(face_idx) = side.face
            && let Some(face) = self.faces.remove(face_idx)
        {
            churn.retire(face_idx, face);
        }
        self.edges.remove(drop_edge);
    }

    /// Remove incident triangles whose three vertices went collinear: the
    /// longest edge is dropped and the remaining two are absorbed by the
    /// side across it.
    fn delete_collinear_triangles(&mut self, incident: &[SideIdx], churn: &mut FaceChurn) {
        let mut remaining: Vec<SideIdx> = incident.to_vec();
        let mut i = 0;
        while i < remaining.len() {
            let side_idx = remaining[i];
            if !self.sides.contains(side_idx) {
                remaining.remove(i);
                continue;
            }
            let Some(at) = self.collinear_triangle_longest_edge(side_idx) else {
                i += 1;
                continue;
            };

            let (edge_idx, next, next_next) = {
                let side = &self.sides[side_idx];
                (side.edges[at], side.edges[succ(at, 3)], side.edges[succ_by(at, 3, 2)])
            };
            let interposed = self.edges[next].end_vertex(side_idx);
            debug_assert!(!self.edges[edge_idx].has_vertex(interposed));

            let neighbour = self.edges[edge_idx]
                .other_side(side_idx)
                .expect("closed mesh");
            let delete_at = self.sides[neighbour]
                .edges
                .iter()
                .position(|&e| e == edge_idx)
                .expect("edge is on its neighbour");

            {
                let nb = &mut self.sides[neighbour];
                nb.edges.insert(delete_at + 1, next);
                nb.edges.insert(delete_at + 2, next_next);
                nb.edges.remove(delete_at);
                nb.vertices.insert(delete_at + 1, interposed);
            }
            for e in [next, next_next] {
                let edge = &mut self.edges[e];
                if edge.left == Some(side_idx) {
                    edge.left = Some(neighbour);
                } else {
                    edge.right = Some(neighbour);
                }
            }
            self.edges.remove(edge_idx);

            let side = self
                .sides
                .remove(side_idx)
                .unwrap_or_else(|| unreachable!("side was live"));
            if let Some(face_idx) = side.face
                && let Some(face) = self.faces.remove(face_idx)
            {
                churn.retire(face_idx, face);
            }
            remaining.remove(i);
        }
    }

    /// For a triangle with collinear vertices, the index of its longest
    /// edge; `None` for sound sides.
    fn collinear_triangle_longest_edge(&self, side_idx: SideIdx) -> Option<usize> {
        let side = &self.sides[side_idx];
        if side.edges.len() > 3 {
            return None;
        }
        let v1 = self.edges[side.edges[0]].vector(&self.vertices);
        let v2 = self.edges[side.edges[1]].vector(&self.vertices);
        if !math::parallel(v1, v2, math::PARALLEL_EPSILON) {
            return None;
        }
        let v3 = self.edges[side.edges[2]].vector(&self.vertices);
        let (l1, l2, l3) = (v1.length_squared(), v2.length_squared(), v3.length_squared());
        Some(if l1 > l2 {
            if l1 > l3 { 0 } else { 2 }
        } else if l2 > l3 {
            1
        } else {
            2
        })
    }

    /// Merge every pair of adjacent sides whose boundary planes coincide.
    fn merge_sides(&mut self, churn: &mut FaceChurn) {
        'restart: loop {
            for side_idx in self.sides.indices() {
                let Some(plane) = self.side_plane(side_idx) else {
                    continue;
                };
                let count = self.sides[side_idx].edges.len();
                for j in 0..count {
                    let edge_idx = self.sides[side_idx].edges[j];
                    let Some(neighbour_idx) = self.edges[edge_idx].other_side(side_idx) else {
                        continue;
                    };
                    let Some(neighbour_plane) = self.side_plane(neighbour_idx) else {
                        continue;
                    };
                    if plane.coincident(&neighbour_plane) {
                        if let Some((face_idx, face)) = self.merge_neighbours(side_idx, j) {
                            churn.retire(face_idx, face);
                        }
                        // Each merge removes a side; rescan from scratch.
                        continue 'restart;
                    }
                }
            }
            break;
        }
    }

    /// Absorb the side across `side.edges[edge_index]` into `side`,
    /// dropping the shared edge run and the vertices interior to it.
    /// Returns the neighbour's detached face.
    fn merge_neighbours(
        &mut self,
        side_idx: SideIdx,
        edge_index: usize,
    ) -> Option<(FaceIdx, Face)> {
        let edge_idx = self.sides[side_idx].edges[edge_index];
        let neighbour_idx = self.edges[edge_idx]
            .other_side(side_idx)
            .expect("closed mesh");

        let side_count = self.sides[side_idx].edges.len();
        let neighbour_count = self.sides[neighbour_idx].edges.len();

        let mut si = edge_index;
        let mut ni = self.sides[neighbour_idx]
            .edges
            .iter()
            .position(|&e| e == edge_idx)
            .expect("edge is on its neighbour");

        // Walk forward to the end of the shared run.
        loop {
            si = succ(si, side_count);
            ni = pred(ni, neighbour_count);
            if self.sides[side_idx].edges[si] != self.sides[neighbour_idx].edges[ni] {
                break;
            }
        }
        // Walk back across the run, counting the shared edges; exits with
        // `si` at the first kept edge of the side and `ni` at the last
        // kept edge of the neighbour.
        let mut shared = 0usize;
        loop {
            si = pred(si, side_count);
            ni = succ(ni, neighbour_count);
            if self.sides[side_idx].edges[si] == self.sides[neighbour_idx].edges[ni] {
                shared += 1;
            } else {
                break;
            }
        }

        let total = side_count + neighbour_count - 2 * shared;

        // Rotate both cycles so the shared run sits at their tails.
        self.sides[side_idx].shift(succ_by(si, side_count, shared + 1));
        self.sides[neighbour_idx].shift(ni);

        {
            let side = &mut self.sides[side_idx];
            side.edges.truncate(side_count - shared);
            side.vertices.truncate(side_count - shared);
        }

        // Concatenate the neighbour's kept run, rebinding each edge.
        for i in 0..neighbour_count - shared {
            let (edge_idx, vertex_idx) = {
                let neighbour = &self.sides[neighbour_idx];
                (neighbour.edges[i], neighbour.vertices[i])
            };
            {
                let edge = &mut self.edges[edge_idx];
                if edge.left == Some(neighbour_idx) {
                    edge.left = Some(side_idx);
                } else {
                    edge.right = Some(side_idx);
                }
            }
            let side = &mut self.sides[side_idx];
            side.edges.push(edge_idx);
            side.vertices.push(vertex_idx);
        }

        // Drop the shared edges and the vertices interior to the run.
        for i in neighbour_count - shared..neighbour_count {
            let edge_idx = self.sides[neighbour_idx].edges[i];
            self.edges.remove(edge_idx);
            if i > neighbour_count - shared {
                let vertex_idx = self.sides[neighbour_idx].vertices[i];
                self.vertices.remove(vertex_idx);
            }
        }

        #[cfg(debug_assertions)]
        {
            let side = &self.sides[side_idx];
            debug_assert_eq!(side.vertices.len(), total);
            debug_assert_eq!(side.edges.len(), total);
            for &e in &side.edges {
                debug_assert_ne!(self.edges[e].other_side(side_idx), Some(neighbour_idx));
            }
        }
        let _ = total;

        let neighbour = self
            .sides
            .remove(neighbour_idx)
            .unwrap_or_else(|| unreachable!("side was live"));
        neighbour.face.and_then(|face_idx| {
            let mut face = self.faces.remove(face_idx)?;
            face.side = None;
            Some((face_idx, face))
        })
    }

    /// Weld consecutive collinear edges that share a vertex and both side
    /// neighbours into a single edge spanning their far endpoints.
    fn merge_edges(&mut self) {
        'restart: loop {
            let indices = self.edges.indices();
            for (&a, &b) in indices.iter().tuple_combinations() {
                if !self.edges[a].incident_with(&self.edges[b]) {
                    continue;
                }
                let vec_a = self.edges[a].vector(&self.vertices);
                let vec_b = self.edges[b].vector(&self.vertices);
                if !math::parallel(vec_a, vec_b, math::PARALLEL_EPSILON) {
                    continue;
                }
                if self.weld_collinear_pair(a, b) {
                    continue 'restart;
                }
            }
            break;
        }
    }

    /// Try to weld two parallel incident edges; returns whether the mesh
    /// changed.
    fn weld_collinear_pair(&mut self, a: EdgeIdx, b: EdgeIdx) -> bool {
        if self.edges[a].end == self.edges[b].end {
            self.edges[b].flip();
        }
        if self.edges[a].end == self.edges[b].start {
            // Two identical edges with opposite directions cannot weld.
            if self.edges[a].start == self.edges[b].end {
                return false;
            }
            return self.weld_edges(a, b, true);
        }

        if self.edges[a].start == self.edges[b].start {
            self.edges[b].flip();
        }
        if self.edges[a].start == self.edges[b].end {
            if self.edges[a].end == self.edges[b].start {
                return false;
            }
            return self.weld_edges(a, b, false);
        }
        false
    }

    /// Replace the chain `a` then `b` (`forward`) or `b` then `a` with a
    /// single edge, removing the shared vertex and rewriting both side
    /// cycles. Welding requires the pair to agree on both neighbours and
    /// both neighbours to stay polygons afterwards.
    fn weld_edges(&mut self, a: EdgeIdx, b: EdgeIdx, forward: bool) -> bool {
        let (left, right) = (self.edges[a].left, self.edges[a].right);
        if left != self.edges[b].left || right != self.edges[b].right {
            return false;
        }
        let (Some(left), Some(right)) = (left, right) else {
            return false;
        };
        if left == right
            || self.sides[left].vertices.len() <= 3
            || self.sides[right].vertices.len() <= 3
        {
            return false;
        }

        let (new_start, new_end, shared_vertex) = if forward {
            (self.edges[a].start, self.edges[b].end, self.edges[a].end)
        } else {
            (self.edges[b].start, self.edges[a].end, self.edges[a].start)
        };
        let mut welded = Edge::new(new_start, new_end);
        welded.left = Some(left);
        welded.right = Some(right);
        let welded = self.edges.insert(welded);

        let li = self.sides[left].edges.iter().position(|&e| e == b).unwrap();
        let lc = self.sides[left].edges.len();
        let ri = self.sides[right].edges.iter().position(|&e| e == b).unwrap();
        let rc = self.sides[right].edges.len();

        if forward {
            self.sides[left]
                .replace_edges(pred(li, lc), succ_by(li, lc, 2), welded, &self.edges, left);
            self.sides[right]
                .replace_edges(pred_by(ri, rc, 2), succ(ri, rc), welded, &self.edges, right);
        } else {
            self.sides[left]
                .replace_edges(pred_by(li, lc, 2), succ(li, lc), welded, &self.edges, left);
            self.sides[right]
                .replace_edges(pred(ri, rc), succ_by(ri, rc, 2), welded, &self.edges, right);
        }

        self.vertices.remove(shared_vertex);
        self.edges.remove(b);
        self.edges.remove(a);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;

    use crate::cut::tests::closed_cube;
    use crate::math::{BoundingBox, EPSILON};

    fn unit_cube() -> BrushGeometry {
        BrushGeometry::from_bounds(BoundingBox::new(DVec3::splat(-1.0), DVec3::splat(1.0)))
    }

    fn assert_sound(brush: &BrushGeometry) {
        brush.check().unwrap();
        brush.check_convex(EPSILON).unwrap();
        for (_, v) in brush.vertices() {
            assert!(math::is_snapped(v.position));
        }
    }

    #[test]
    fn test_vertex_drag_raises_apex() {
        let mut cube = closed_cube();
        let corner = cube.find_vertex(DVec3::splat(1.0)).unwrap();
        let result = cube.move_vertex(corner, DVec3::new(0.0, 0.0, 1.0));

        assert!(result.moved);
        assert!(!result.deleted);
        assert_eq!(result.handle, DragHandle::Vertex(corner));
        // The top quad splits into two triangles around the raised corner;
        // the +X and +Y quads survive because the corner stays in their
        // planes.
        assert_eq!(cube.vertex_count(), 8);
        assert_eq!(cube.edge_count(), 13);
        assert_eq!(cube.side_count(), 7);
        assert!(cube.find_vertex(DVec3::new(1.0, 1.0, 2.0)).is_some());
        assert!(cube.closed());
        assert_sound(&cube);
    }

    #[test]
    fn test_vertex_drag_collapses_corner() {
        // Dragging a corner along the body diagonal stops at the plane of
        // its three neighbours, where the corner is absorbed: the result
        // is the corner-cut cube.
        let mut cube = closed_cube();
        let corner = cube.find_vertex(DVec3::splat(1.0)).unwrap();
        let result = cube.move_vertex(corner, DVec3::splat(-2.0));

        assert!(result.moved);
        assert!(result.deleted);
        assert_eq!(cube.vertex_count(), 7);
        assert_eq!(cube.edge_count(), 12);
        assert_eq!(cube.side_count(), 7);
        assert!(cube.find_vertex(DVec3::splat(1.0)).is_none());
        assert!(cube.find_vertex(DVec3::splat(-1.0)).is_some());
        assert!(cube.closed());
        assert_sound(&cube);
        // One derived face survives on the merged cut triangle; nothing
        // pre-existing was dropped.
        assert_eq!(result.new_faces.len(), 1);
        assert!(result.dropped_faces.is_empty());
        assert_eq!(cube.face_count(), 7);
    }

    #[test]
    fn test_vertex_drag_zero_delta_is_noop() {
        let mut cube = closed_cube();
        let corner = cube.find_vertex(DVec3::splat(1.0)).unwrap();
        let result = cube.move_vertex(corner, DVec3::ZERO);
        assert!(!result.moved);
        assert!(!result.deleted);
        assert_eq!(cube.vertex_count(), 8);
        assert_sound(&cube);
    }

    #[test]
    fn test_vertex_drag_down_an_edge() {
        // The corner travels down its own cube edge and welds into the
        // vertex below; the dragged vertex itself survives the weld, so
        // nothing reports as deleted.
        let mut cube = closed_cube();
        let corner = cube.find_vertex(DVec3::splat(1.0)).unwrap();
        let result = cube.move_vertex(corner, DVec3::new(0.0, 0.0, -2.0));
        assert!(result.moved);
        assert!(!result.deleted);
        assert_eq!(cube.vertex_count(), 7);
        assert_eq!(cube.edge_count(), 12);
        assert_eq!(cube.side_count(), 7);
        assert!(cube.find_vertex(DVec3::new(1.0, 1.0, -1.0)).is_some());
        assert!(cube.find_vertex(DVec3::splat(1.0)).is_none());
        assert!(cube.closed());
        assert_sound(&cube);
    }

    #[test]
    fn test_edge_drag_splits_edge() {
        let mut cube = closed_cube();
        let edge = cube
            .find_edge(DVec3::new(-1.0, -1.0, 1.0), DVec3::new(1.0, -1.0, 1.0))
            .unwrap();
        let result = cube.split_and_move_edge(edge, DVec3::new(0.0, 0.0, 1.0));

        assert!(result.moved);
        assert!(!result.deleted);
        // The midpoint rises to a roof ridge vertex: the front side stays
        // planar (a pentagon), the top splits into three triangles.
        assert!(matches!(result.handle, DragHandle::Vertex(_)));
        assert_eq!(cube.vertex_count(), 9);
        assert_eq!(cube.edge_count(), 15);
        assert_eq!(cube.side_count(), 8);
        assert!(cube.find_vertex(DVec3::new(0.0, -1.0, 2.0)).is_some());
        assert!(cube.closed());
        assert_sound(&cube);
    }

    #[test]
    fn test_edge_drag_merges_back() {
        let mut cube = closed_cube();
        let edge = cube
            .find_edge(DVec3::new(-1.0, -1.0, 1.0), DVec3::new(1.0, -1.0, 1.0))
            .unwrap();
        let up = cube.split_and_move_edge(edge, DVec3::new(0.0, 0.0, 1.0));
        let DragHandle::Vertex(ridge) = up.handle else {
            panic!("expected a vertex handle");
        };

        // Dragging the ridge back down flattens the roof; the split edges
        // weld together again and the ridge vertex disappears.
        let down = cube.move_vertex(ridge, DVec3::new(0.0, 0.0, -1.0));
        assert!(down.moved);
        assert!(down.deleted);
        assert_eq!(cube.vertex_count(), 8);
        assert_eq!(cube.edge_count(), 12);
        assert_eq!(cube.side_count(), 6);
        assert!(cube
            .find_edge(DVec3::new(-1.0, -1.0, 1.0), DVec3::new(1.0, -1.0, 1.0))
            .is_some());
        assert!(cube.closed());
        assert_sound(&cube);
    }

    #[test]
    fn test_edge_drag_rejects_concave_fold() {
        let mut cube = closed_cube();
        let edge = cube
            .find_edge(DVec3::new(-1.0, -1.0, 1.0), DVec3::new(1.0, -1.0, 1.0))
            .unwrap();
        // Dipping below the top plane would fold the top side concave.
        let result = cube.split_and_move_edge(edge, DVec3::new(0.0, 0.0, -1.0));
        assert!(!result.moved);
        assert!(!result.deleted);
        assert_eq!(result.handle, DragHandle::Edge(edge));
        assert_eq!(cube.vertex_count(), 8);
        assert_eq!(cube.edge_count(), 12);
        assert_eq!(cube.side_count(), 6);
        assert_sound(&cube);
    }

    #[test]
    fn test_side_drag_pulls_pyramid_tip() {
        let mut cube = closed_cube();
        let top = [
            DVec3::new(1.0, 1.0, 1.0),
            DVec3::new(1.0, -1.0, 1.0),
            DVec3::new(-1.0, -1.0, 1.0),
            DVec3::new(-1.0, 1.0, 1.0),
        ];
        let side = cube.find_side(&top).unwrap();
        let result = cube.split_and_move_side(side, DVec3::new(0.0, 0.0, 1.0));

        assert!(result.moved);
        assert!(!result.deleted);
        // The fan stays a four-triangle pyramid roof.
        assert_eq!(cube.vertex_count(), 9);
        assert_eq!(cube.edge_count(), 16);
        assert_eq!(cube.side_count(), 9);
        assert!(cube.find_vertex(DVec3::new(0.0, 0.0, 2.0)).is_some());
        assert_eq!(result.new_faces.len(), 4);
        assert_eq!(result.dropped_faces.len(), 1);
        assert!(cube.closed());
        assert_sound(&cube);
    }

    #[test]
    fn test_side_drag_rejects_in_plane_delta() {
        let mut cube = closed_cube();
        let side = cube.pick_ray(&crate::math::Ray::new(DVec3::new(0.0, 0.0, 5.0), -DVec3::Z))
            .unwrap()
            .0;
        let result = cube.split_and_move_side(side, DVec3::new(1.0, 0.0, 0.0));
        assert!(!result.moved);
        assert_eq!(cube.vertex_count(), 8);
        assert_eq!(cube.side_count(), 6);
        assert_sound(&cube);
    }

    #[test]
    fn test_move_side_extrudes_box() {
        let mut cube = closed_cube();
        let top = [
            DVec3::new(1.0, 1.0, 1.0),
            DVec3::new(1.0, -1.0, 1.0),
            DVec3::new(-1.0, -1.0, 1.0),
            DVec3::new(-1.0, 1.0, 1.0),
        ];
        let side = cube.find_side(&top).unwrap();
        let result = cube.move_side(side, DVec3::new(0.0, 0.0, 1.0));

        assert!(result.moved);
        assert!(!result.deleted);
        assert!(matches!(result.handle, DragHandle::Side(_)));
        // The face fans apart vertex by vertex and retracts into a single
        // quad at the new height: the box is simply taller.
        assert_eq!(cube.vertex_count(), 8);
        assert_eq!(cube.edge_count(), 12);
        assert_eq!(cube.side_count(), 6);
        assert_eq!(cube.bounds().min.z, -1.0);
        assert_eq!(cube.bounds().max.z, 2.0);
        assert!(cube.closed());
        assert_sound(&cube);

        // The returned handle points at the translated side.
        let DragHandle::Side(new_side) = result.handle else {
            unreachable!()
        };
        let plane = cube.side_plane(new_side).unwrap();
        assert!((plane.normal - DVec3::Z).length() < EPSILON);
        assert!((plane.distance - 2.0).abs() < EPSILON);
    }

    #[test]
    fn test_move_edge_translates_edge() {
        let mut cube = closed_cube();
        let edge = cube
            .find_edge(DVec3::new(-1.0, -1.0, 1.0), DVec3::new(1.0, -1.0, 1.0))
            .unwrap();
        let result = cube.move_edge(edge, DVec3::new(0.0, 0.0, 1.0));

        assert!(result.moved);
        assert!(!result.deleted);
        // The top face turns into a planar slope; counts are unchanged.
        assert_eq!(cube.vertex_count(), 8);
        assert_eq!(cube.edge_count(), 12);
        assert_eq!(cube.side_count(), 6);
        assert!(cube
            .find_edge(DVec3::new(-1.0, -1.0, 2.0), DVec3::new(1.0, -1.0, 2.0))
            .is_some());
        assert!(cube.closed());
        assert_sound(&cube);
    }

    #[test]
    fn test_move_edge_failure_leaves_geometry_untouched() {
        let mut cube = closed_cube();
        let before: Vec<DVec3> = cube.vertices().map(|(_, v)| v.position).collect();
        let edge = cube
            .find_edge(DVec3::new(-1.0, -1.0, 1.0), DVec3::new(1.0, -1.0, 1.0))
            .unwrap();
        // Slamming the top edge two units down drives it through the
        // bottom plane; at least one constituent drag refuses.
        let result = cube.move_edge(edge, DVec3::new(0.0, 0.0, -3.0));
        if !result.moved {
            let after: Vec<DVec3> = cube.vertices().map(|(_, v)| v.position).collect();
            assert_eq!(before, after);
            assert!(result.new_faces.is_empty());
            assert!(result.dropped_faces.is_empty());
        }
        assert_sound(&cube);
    }

    #[test]
    fn test_dry_run_queries_leave_mesh_alone() {
        let cube = closed_cube();
        let corner = cube.find_vertex(DVec3::splat(1.0)).unwrap();
        let edge = cube
            .find_edge(DVec3::new(-1.0, -1.0, 1.0), DVec3::new(1.0, -1.0, 1.0))
            .unwrap();

        assert!(cube.can_move_vertex(corner, DVec3::new(0.0, 0.0, 1.0)));
        assert!(cube.can_move_edge(edge, DVec3::new(0.0, 0.0, 1.0)));

        // Untouched by any of the dry runs.
        assert_eq!(cube.vertex_count(), 8);
        assert_eq!(cube.edge_count(), 12);
        assert_eq!(cube.side_count(), 6);
        cube.check().unwrap();
    }

    #[test]
    fn test_drag_dispatcher_routes_handles() {
        let mut cube = closed_cube();
        let corner = cube.find_vertex(DVec3::splat(1.0)).unwrap();
        let result = cube.drag(DragHandle::Vertex(corner), DVec3::new(0.0, 0.0, 1.0));
        assert!(result.moved);
        assert_sound(&cube);

        let mut cube = closed_cube();
        let edge = cube
            .find_edge(DVec3::new(-1.0, -1.0, 1.0), DVec3::new(1.0, -1.0, 1.0))
            .unwrap();
        let result = cube.drag(DragHandle::Edge(edge), DVec3::new(0.0, 0.0, 1.0));
        assert!(result.moved);
        assert_eq!(cube.vertex_count(), 9);
        assert_sound(&cube);
    }

    #[test]
    fn test_drag_works_without_attached_faces() {
        // Brushes are draggable before their face list is attached; no
        // face churn is reported because there are no faces to churn.
        let mut cube = unit_cube();
        let corner = cube.find_vertex(DVec3::splat(1.0)).unwrap();
        let result = cube.move_vertex(corner, DVec3::splat(-2.0));
        assert!(result.moved);
        assert!(result.deleted);
        assert!(result.new_faces.is_empty());
        assert!(result.dropped_faces.is_empty());
        assert_eq!(cube.vertex_count(), 7);
        assert_eq!(cube.edge_count(), 12);
        assert_eq!(cube.side_count(), 7);
        cube.check().unwrap();
        cube.check_convex(EPSILON).unwrap();
    }
}

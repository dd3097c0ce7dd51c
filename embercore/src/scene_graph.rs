//! Hierarchical transforms keyed by [`UnitId`]. Dense structure-of-arrays
//! storage with swap-on-remove, matching the layout every component system
//! in this crate shares (see the crate-level docs).

use crate::unit::UnitId;
use nalgebra::{Matrix4, UnitQuaternion, Vector3};
use std::collections::HashMap;
use tracing::trace;

const NIL: u32 = u32::MAX;

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct TransformInstance(u32);

impl TransformInstance {
    pub const INVALID: TransformInstance = TransformInstance(NIL);

    pub fn is_valid(self) -> bool {
        self.0 != NIL
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Copy)]
struct Node {
    unit: UnitId,
    local_pos: Vector3<f32>,
    local_rot: UnitQuaternion<f32>,
    local_scale: Vector3<f32>,
    world: Matrix4<f32>,
    parent: u32,
    first_child: u32,
    next_sibling: u32,
    changed: bool,
}

impl Node {
    fn local_matrix(&self) -> Matrix4<f32> {
        Matrix4::new_translation(&self.local_pos)
            * self.local_rot.to_homogeneous()
            * Matrix4::new_nonuniform_scaling(&self.local_scale)
    }
}

/// Bitflags describing which of a unit's root transform to override on spawn.
#[derive(Copy, Clone, Default)]
pub struct TransformOverride {
    pub position: Option<Vector3<f32>>,
    pub rotation: Option<UnitQuaternion<f32>>,
    pub scale: Option<Vector3<f32>>,
}

/// The scene graph: one dense array of [`Node`]s, a `UnitId -> index` map for
/// lookup, and a reverse `index -> UnitId` array so swap-removal can fix up
/// the map in O(1).
#[derive(Default)]
pub struct SceneGraph {
    nodes: Vec<Node>,
    unit_of: Vec<UnitId>,
    index_of: HashMap<UnitId, u32>,
    changed_order: Vec<u32>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bulk-creates transforms for a freshly spawned unit group.
    ///
    /// `parents` holds indices into `units` (`None` = root/world parent).
    /// `TransformOverride` is applied only to index 0 (the resource's
    /// root-most transform), per the spawn-flags contract in the orchestrator.
    pub fn create_instances(
        &mut self,
        units: &[UnitId],
        locals: &[(Vector3<f32>, UnitQuaternion<f32>, Vector3<f32>)],
        parents: &[Option<usize>],
        overrides: TransformOverride,
    ) -> Vec<TransformInstance> {
        assert_eq!(units.len(), locals.len());
        assert_eq!(units.len(), parents.len());

        let mut out = Vec::with_capacity(units.len());
        for (i, &unit) in units.iter().enumerate() {
            let (mut pos, mut rot, mut scale) = locals[i];
            if i == 0 {
                if let Some(p) = overrides.position {
                    pos = p;
                }
                if let Some(r) = overrides.rotation {
                    rot = r;
                }
                if let Some(s) = overrides.scale {
                    scale = s;
                }
            }

            let parent_index = parents[i].map(|p| out[p].0);

            let node = Node {
                unit,
                local_pos: pos,
                local_rot: rot,
                local_scale: scale,
                world: Matrix4::identity(),
                parent: parent_index.unwrap_or(NIL),
                first_child: NIL,
                next_sibling: NIL,
                changed: true,
            };

            let index = self.nodes.len() as u32;
            self.nodes.push(node);
            self.unit_of.push(unit);
            self.index_of.insert(unit, index);
            out.push(TransformInstance(index));

            if let Some(parent_index) = parent_index {
                self.link_child(parent_index, index);
            }

            self.recompute_world(index);
        }

        out
    }

    fn link_child(&mut self, parent: u32, child: u32) {
        let first = self.nodes[parent as usize].first_child;
        self.nodes[child as usize].next_sibling = first;
        self.nodes[parent as usize].first_child = child;
    }

    fn recompute_world(&mut self, index: u32) {
        let local = self.nodes[index as usize].local_matrix();
        let parent = self.nodes[index as usize].parent;
        let world = if parent == NIL {
            local
        } else {
            self.nodes[parent as usize].world * local
        };
        self.nodes[index as usize].world = world;
        self.mark_changed(index);

        let mut child = self.nodes[index as usize].first_child;
        while child != NIL {
            self.recompute_world(child);
            child = self.nodes[child as usize].next_sibling;
        }
    }

    fn mark_changed(&mut self, index: u32) {
        self.nodes[index as usize].changed = true;
    }

    pub fn instance(&self, unit: UnitId) -> TransformInstance {
        self.index_of
            .get(&unit)
            .map(|&i| TransformInstance(i))
            .unwrap_or(TransformInstance::INVALID)
    }

    pub fn owner(&self, ti: TransformInstance) -> UnitId {
        self.nodes[ti.index()].unit
    }

    pub fn parent(&self, ti: TransformInstance) -> TransformInstance {
        TransformInstance(self.nodes[ti.index()].parent)
    }

    pub fn first_child(&self, ti: TransformInstance) -> TransformInstance {
        TransformInstance(self.nodes[ti.index()].first_child)
    }

    pub fn next_sibling(&self, ti: TransformInstance) -> TransformInstance {
        TransformInstance(self.nodes[ti.index()].next_sibling)
    }

    pub fn set_local_position(&mut self, ti: TransformInstance, pos: Vector3<f32>) {
        self.nodes[ti.index()].local_pos = pos;
        self.recompute_world(ti.0);
    }

    pub fn set_local_rotation(&mut self, ti: TransformInstance, rot: UnitQuaternion<f32>) {
        self.nodes[ti.index()].local_rot = rot;
        self.recompute_world(ti.0);
    }

    pub fn set_local_scale(&mut self, ti: TransformInstance, scale: Vector3<f32>) {
        self.nodes[ti.index()].local_scale = scale;
        self.recompute_world(ti.0);
    }

    pub fn local_position(&self, ti: TransformInstance) -> Vector3<f32> {
        self.nodes[ti.index()].local_pos
    }

    pub fn local_rotation(&self, ti: TransformInstance) -> UnitQuaternion<f32> {
        self.nodes[ti.index()].local_rot
    }

    pub fn local_scale(&self, ti: TransformInstance) -> Vector3<f32> {
        self.nodes[ti.index()].local_scale
    }

    /// Directly overwrites the cached world pose (e.g. from a physics
    /// transform event) and re-derives the local transform relative to the
    /// current parent, so descendants stay correctly positioned.
    pub fn set_world_pose(&mut self, ti: TransformInstance, world: Matrix4<f32>) {
        let parent = self.nodes[ti.index()].parent;
        let local = if parent == NIL {
            world
        } else {
            self.nodes[parent as usize]
                .world
                .try_inverse()
                .unwrap_or_else(Matrix4::identity)
                * world
        };

        let (pos, rot, scale) = decompose(&local);
        self.nodes[ti.index()].local_pos = pos;
        self.nodes[ti.index()].local_rot = rot;
        self.nodes[ti.index()].local_scale = scale;
        self.recompute_world(ti.0);
    }

    pub fn world_pose(&self, ti: TransformInstance) -> Matrix4<f32> {
        self.nodes[ti.index()].world
    }

    /// Appends, in stable DFS order, every changed node's `(unit, world)`.
    /// Does not clear the changed set — call [`SceneGraph::clear_changed`]
    /// for that.
    pub fn get_changed(&mut self, out: &mut Vec<(UnitId, Matrix4<f32>)>) {
        self.changed_order.clear();
        for &root_index in &self.root_indices() {
            self.collect_changed_dfs(root_index);
        }
        for &index in &self.changed_order {
            let node = &self.nodes[index as usize];
            out.push((node.unit, node.world));
        }
    }

    fn root_indices(&self) -> Vec<u32> {
        (0..self.nodes.len() as u32)
            .filter(|&i| self.nodes[i as usize].parent == NIL)
            .collect()
    }

    fn collect_changed_dfs(&mut self, index: u32) {
        if self.nodes[index as usize].changed {
            self.changed_order.push(index);
        }
        let mut child = self.nodes[index as usize].first_child;
        while child != NIL {
            self.collect_changed_dfs(child);
            child = self.nodes[child as usize].next_sibling;
        }
    }

    pub fn clear_changed(&mut self) {
        for node in &mut self.nodes {
            node.changed = false;
        }
        trace!("scene graph changed set cleared");
    }

    /// Detaches `ti` and its subtree from the graph, removing them from
    /// storage via swap-remove and fixing up every index the swap disturbs.
    pub fn destroy_subtree(&mut self, ti: TransformInstance) -> Vec<UnitId> {
        let mut subtree = Vec::new();
        self.collect_subtree(ti.0, &mut subtree);

        self.unlink(ti.0);

        // Remove largest index first so earlier indices in `subtree` remain valid.
        let mut indices: Vec<u32> = subtree
            .iter()
            .map(|&u| *self.index_of.get(&u).expect("subtree unit must be mapped"))
            .collect();
        indices.sort_unstable_by(|a, b| b.cmp(a));
        for index in indices {
            self.swap_remove(index);
        }

        subtree
    }

    fn collect_subtree(&self, index: u32, out: &mut Vec<UnitId>) {
        out.push(self.nodes[index as usize].unit);
        let mut child = self.nodes[index as usize].first_child;
        while child != NIL {
            self.collect_subtree(child, out);
            child = self.nodes[child as usize].next_sibling;
        }
    }

    fn unlink(&mut self, index: u32) {
        let parent = self.nodes[index as usize].parent;
        if parent == NIL {
            return;
        }
        let first = self.nodes[parent as usize].first_child;
        if first == index {
            self.nodes[parent as usize].first_child = self.nodes[index as usize].next_sibling;
            return;
        }
        let mut cur = first;
        while cur != NIL {
            let next = self.nodes[cur as usize].next_sibling;
            if next == index {
                self.nodes[cur as usize].next_sibling = self.nodes[index as usize].next_sibling;
                return;
            }
            cur = next;
        }
    }

    fn swap_remove(&mut self, index: u32) {
        let last = self.nodes.len() as u32 - 1;
        let removed_unit = self.nodes[index as usize].unit;
        self.index_of.remove(&removed_unit);

        if index != last {
            self.nodes.swap(index as usize, last as usize);
            self.unit_of.swap(index as usize, last as usize);
            let moved_unit = self.nodes[index as usize].unit;
            self.index_of.insert(moved_unit, index);
            self.retarget_references(last, index);
        }

        self.nodes.pop();
        self.unit_of.pop();
    }

    /// After swapping `old_index` into `new_index`, every node that
    /// referenced `old_index` as parent/child/sibling must point at
    /// `new_index` instead.
    fn retarget_references(&mut self, old_index: u32, new_index: u32) {
        for node in &mut self.nodes {
            if node.parent == old_index {
                node.parent = new_index;
            }
            if node.first_child == old_index {
                node.first_child = new_index;
            }
            if node.next_sibling == old_index {
                node.next_sibling = new_index;
            }
        }
    }

    /// Detaches `ti` from its current parent (if any) and attaches it under
    /// `new_parent` (pass [`TransformInstance::INVALID`] to make it a root),
    /// then recomputes world transforms for the whole moved subtree. Used by
    /// hot reload to reattach a regenerated subtree at its old attachment
    /// point.
    pub fn reparent(&mut self, ti: TransformInstance, new_parent: TransformInstance) {
        self.unlink(ti.0);
        let new_parent_index = if new_parent.is_valid() { new_parent.0 } else { NIL };
        self.nodes[ti.index()].parent = new_parent_index;
        self.nodes[ti.index()].next_sibling = NIL;
        if new_parent_index != NIL {
            self.link_child(new_parent_index, ti.0);
        }
        self.recompute_world(ti.0);
    }

    /// Debug helper: the world matrix as it currently stands, without going
    /// through `TransformInstance` lookup machinery. Equivalent to
    /// `world_pose` but named for test readability.
    pub fn local_to_world(&self, ti: TransformInstance) -> Matrix4<f32> {
        self.world_pose(ti)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

fn column3(m: &Matrix4<f32>, col: usize) -> Vector3<f32> {
    Vector3::new(m[(0, col)], m[(1, col)], m[(2, col)])
}

pub(crate) fn decompose(m: &Matrix4<f32>) -> (Vector3<f32>, UnitQuaternion<f32>, Vector3<f32>) {
    let pos = column3(m, 3);
    let sx = column3(m, 0).norm();
    let sy = column3(m, 1).norm();
    let sz = column3(m, 2).norm();
    let scale = Vector3::new(sx.max(f32::EPSILON), sy.max(f32::EPSILON), sz.max(f32::EPSILON));

    let rot_mat = nalgebra::Matrix3::from_columns(&[
        column3(m, 0) / scale.x,
        column3(m, 1) / scale.y,
        column3(m, 2) / scale.z,
    ]);
    let rot = UnitQuaternion::from_matrix(&rot_mat);

    (pos, rot, scale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::UnitManager;

    fn spawn_pair(graph: &mut SceneGraph, mgr: &mut UnitManager) -> (UnitId, UnitId) {
        let p = mgr.create();
        let c = mgr.create();
        let locals = vec![
            (Vector3::zeros(), UnitQuaternion::identity(), Vector3::new(1.0, 1.0, 1.0)),
            (
                Vector3::new(1.0, 0.0, 0.0),
                UnitQuaternion::identity(),
                Vector3::new(1.0, 1.0, 1.0),
            ),
        ];
        let parents = vec![None, Some(0)];
        graph.create_instances(&[p, c], &locals, &parents, TransformOverride::default());
        (p, c)
    }

    #[test]
    fn world_equals_parent_times_local() {
        let mut graph = SceneGraph::new();
        let mut mgr = UnitManager::new();
        let (p, c) = spawn_pair(&mut graph, &mut mgr);

        let pi = graph.instance(p);
        let ci = graph.instance(c);
        let expected = graph.world_pose(pi) * graph.nodes[ci.index()].local_matrix();
        assert_eq!(graph.world_pose(ci), expected);
    }

    #[test]
    fn dirty_propagation_s2() {
        let mut graph = SceneGraph::new();
        let mut mgr = UnitManager::new();
        let (p, c) = spawn_pair(&mut graph, &mut mgr);
        graph.clear_changed();

        let pi = graph.instance(p);
        graph.set_local_position(pi, Vector3::new(10.0, 0.0, 0.0));

        let mut changed = Vec::new();
        graph.get_changed(&mut changed);

        assert_eq!(changed.len(), 2);
        let p_world = changed.iter().find(|(u, _)| *u == p).unwrap().1;
        let c_world = changed.iter().find(|(u, _)| *u == c).unwrap().1;
        assert_eq!(column3(&p_world, 3), Vector3::new(10.0, 0.0, 0.0));
        assert_eq!(column3(&c_world, 3), Vector3::new(11.0, 0.0, 0.0));
    }

    #[test]
    fn clear_changed_then_get_changed_is_empty() {
        let mut graph = SceneGraph::new();
        let mut mgr = UnitManager::new();
        let (p, _c) = spawn_pair(&mut graph, &mut mgr);
        graph.clear_changed();

        let mut changed = Vec::new();
        graph.get_changed(&mut changed);
        assert!(changed.is_empty());

        let pi = graph.instance(p);
        graph.set_local_position(pi, Vector3::new(1.0, 2.0, 3.0));
        graph.clear_changed();
        changed.clear();
        graph.get_changed(&mut changed);
        assert!(changed.is_empty());
    }

    #[test]
    fn destroy_subtree_detaches_and_swap_fixes_up() {
        let mut graph = SceneGraph::new();
        let mut mgr = UnitManager::new();
        let (p, c) = spawn_pair(&mut graph, &mut mgr);
        let other = mgr.create();
        graph.create_instances(
            &[other],
            &[(Vector3::zeros(), UnitQuaternion::identity(), Vector3::new(1.0, 1.0, 1.0))],
            &[None],
            TransformOverride::default(),
        );

        let pi = graph.instance(p);
        let removed = graph.destroy_subtree(pi);
        assert_eq!(removed.len(), 2);
        assert!(removed.contains(&p));
        assert!(removed.contains(&c));
        assert!(!graph.instance(p).is_valid());
        assert!(!graph.instance(c).is_valid());
        assert!(graph.instance(other).is_valid());
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn override_applies_only_to_root() {
        let mut graph = SceneGraph::new();
        let mut mgr = UnitManager::new();
        let p = mgr.create();
        let c = mgr.create();
        let locals = vec![
            (Vector3::new(5.0, 5.0, 5.0), UnitQuaternion::identity(), Vector3::new(1.0, 1.0, 1.0)),
            (Vector3::new(1.0, 0.0, 0.0), UnitQuaternion::identity(), Vector3::new(1.0, 1.0, 1.0)),
        ];
        let parents = vec![None, Some(0)];
        let overrides = TransformOverride {
            position: Some(Vector3::new(1.0, 2.0, 3.0)),
            ..Default::default()
        };
        let instances = graph.create_instances(&[p, c], &locals, &parents, overrides);

        assert_eq!(graph.local_position(instances[0]), Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(graph.local_position(instances[1]), Vector3::new(1.0, 0.0, 0.0));
    }
}

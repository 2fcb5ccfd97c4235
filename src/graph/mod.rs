//! The workflow graph aggregate: nodes, edges and the operations that keep
//! slot links and edge endpoints consistent with each other.

mod display;
mod edge;
mod node;

pub use display::{EdgeDisplay, ExecutionStatus, NodeDisplay};
pub use edge::{Edge, EdgeRequest};
pub use node::{
    FOOTER_HEIGHT, HEADER_HEIGHT, InputSlot, NODE_WIDTH, NativeInput, NodeInstance, NodeMeta,
    OutputSlot, Position, SLOT_PITCH, Size, SlotOrigin,
};

use crate::error::{GraphError, SlotDirection};
use crate::schema::TypeTree;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

pub type NodeId = u64;
pub type EdgeId = u64;

/// Owns every node and edge of one workflow.
///
/// Ids are assigned from monotonic counters starting at 1 and never reused,
/// so iterating either map yields creation order.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: BTreeMap<NodeId, NodeInstance>,
    edges: BTreeMap<EdgeId, Edge>,
    last_node_id: NodeId,
    last_edge_id: EdgeId,
    /// Document-level sections carried through import and export untouched.
    pub info: Option<Value>,
    pub options: Option<Value>,
    pub variables: Option<Value>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes everything, including the id counters and document sections.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn last_node_id(&self) -> NodeId {
        self.last_node_id
    }

    pub fn last_edge_id(&self) -> EdgeId {
        self.last_edge_id
    }

    /// Adds a node, assigning it the next id.
    pub fn add_node(&mut self, mut node: NodeInstance) -> NodeId {
        self.last_node_id += 1;
        let id = self.last_node_id;
        node.id = id;
        clear_links(&mut node);
        debug!(node_id = id, node_type = %node.workflow_type, "added node");
        self.nodes.insert(id, node);
        id
    }

    /// Inserts a node under the id it already carries.
    /// Returns `false` if the id is taken.
    pub(crate) fn restore_node(&mut self, mut node: NodeInstance) -> bool {
        if node.id == 0 || self.nodes.contains_key(&node.id) {
            return false;
        }
        clear_links(&mut node);
        self.last_node_id = self.last_node_id.max(node.id);
        self.nodes.insert(node.id, node);
        true
    }

    /// Raises the id counters so restored ids are never handed out again.
    pub(crate) fn bump_counters(&mut self, last_node_id: NodeId, last_edge_id: EdgeId) {
        self.last_node_id = self.last_node_id.max(last_node_id);
        self.last_edge_id = self.last_edge_id.max(last_edge_id);
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeInstance> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut NodeInstance> {
        self.nodes.get_mut(&id)
    }

    pub fn try_node(&self, id: NodeId) -> Result<&NodeInstance, GraphError> {
        self.nodes.get(&id).ok_or(GraphError::NodeNotFound(id))
    }

    /// Nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeInstance> {
        self.nodes.values()
    }

    pub fn nodes_mut(&mut self) -> impl Iterator<Item = &mut NodeInstance> {
        self.nodes.values_mut()
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(&id)
    }

    pub fn edge_mut(&mut self, id: EdgeId) -> Option<&mut Edge> {
        self.edges.get_mut(&id)
    }

    /// Edges in id order.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    pub fn edges_mut(&mut self) -> impl Iterator<Item = &mut Edge> {
        self.edges.values_mut()
    }

    /// Live node ids; a node's position in this list is its dense index.
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.keys().copied().collect()
    }

    pub fn node_at_index(&self, index: usize) -> Option<NodeId> {
        self.nodes.keys().nth(index).copied()
    }

    pub fn index_of(&self, id: NodeId) -> Option<usize> {
        self.nodes.keys().position(|k| *k == id)
    }

    pub fn outgoing(&self, id: NodeId) -> impl Iterator<Item = &Edge> {
        self.edges.values().filter(move |e| e.source == id)
    }

    pub fn incoming(&self, id: NodeId) -> impl Iterator<Item = &Edge> {
        self.edges.values().filter(move |e| e.target == id)
    }

    /// Removes a node together with every edge touching it.
    pub fn remove_node(&mut self, id: NodeId) -> Result<NodeInstance, GraphError> {
        if !self.nodes.contains_key(&id) {
            return Err(GraphError::NodeNotFound(id));
        }
        let incident: Vec<EdgeId> = self
            .edges
            .values()
            .filter(|e| e.source == id || e.target == id)
            .map(|e| e.id)
            .collect();
        for edge_id in incident {
            self.detach_edge(edge_id);
        }
        let node = self.nodes.remove(&id).ok_or(GraphError::NodeNotFound(id))?;
        debug!(node_id = id, "removed node");
        Ok(node)
    }

    /// Connects two slots. An existing link into the target input is replaced.
    pub fn connect(&mut self, request: EdgeRequest) -> Result<EdgeId, GraphError> {
        let id = self.last_edge_id + 1;
        self.link(id, request)?;
        Ok(id)
    }

    /// Connects two slots addressed by name.
    pub fn connect_named(
        &mut self,
        source: NodeId,
        source_slot: &str,
        target: NodeId,
        target_slot: &str,
    ) -> Result<EdgeId, GraphError> {
        let source_index = self
            .try_node(source)?
            .output_index(source_slot)
            .ok_or_else(|| GraphError::SlotNameNotFound {
                node_id: source,
                direction: SlotDirection::Output,
                name: source_slot.to_string(),
            })?;
        let target_index = self
            .try_node(target)?
            .input_index(target_slot)
            .ok_or_else(|| GraphError::SlotNameNotFound {
                node_id: target,
                direction: SlotDirection::Input,
                name: target_slot.to_string(),
            })?;
        self.connect(EdgeRequest::new(source, source_index, target, target_index))
    }

    /// Creates an edge under a caller-chosen id.
    pub(crate) fn link(&mut self, id: EdgeId, request: EdgeRequest) -> Result<(), GraphError> {
        if self.edges.contains_key(&id) {
            return Err(GraphError::DuplicateEdge(id));
        }
        if request.source == request.target {
            return Err(GraphError::SelfLoop(request.source));
        }
        let source = self.try_node(request.source)?;
        let type_tag = source
            .outputs
            .get(request.source_slot)
            .map(|slot| slot.type_tree.to_string())
            .ok_or(GraphError::SlotNotFound {
                node_id: request.source,
                direction: SlotDirection::Output,
                index: request.source_slot,
            })?;
        let existing = self
            .try_node(request.target)?
            .inputs
            .get(request.target_slot)
            .ok_or(GraphError::SlotNotFound {
                node_id: request.target,
                direction: SlotDirection::Input,
                index: request.target_slot,
            })?
            .link;
        if let Some(old) = existing {
            self.detach_edge(old);
        }

        if let Some(slot) = self
            .nodes
            .get_mut(&request.source)
            .and_then(|n| n.outputs.get_mut(request.source_slot))
        {
            slot.links.push(id);
        }
        if let Some(slot) = self
            .nodes
            .get_mut(&request.target)
            .and_then(|n| n.inputs.get_mut(request.target_slot))
        {
            slot.link = Some(id);
        }
        self.edges.insert(
            id,
            Edge {
                id,
                source: request.source,
                source_slot: request.source_slot,
                target: request.target,
                target_slot: request.target_slot,
                type_tag,
                condition: request.condition,
                label: request.label,
                extra: request.extra,
                display: EdgeDisplay::default(),
            },
        );
        self.last_edge_id = self.last_edge_id.max(id);
        Ok(())
    }

    pub fn disconnect(&mut self, id: EdgeId) -> Result<Edge, GraphError> {
        self.detach_edge(id).ok_or(GraphError::EdgeNotFound(id))
    }

    /// Removes an edge and clears both slot references to it.
    fn detach_edge(&mut self, id: EdgeId) -> Option<Edge> {
        let edge = self.edges.remove(&id)?;
        if let Some(slot) = self
            .nodes
            .get_mut(&edge.source)
            .and_then(|n| n.outputs.get_mut(edge.source_slot))
        {
            slot.links.retain(|l| *l != id);
        }
        if let Some(slot) = self
            .nodes
            .get_mut(&edge.target)
            .and_then(|n| n.inputs.get_mut(edge.target_slot))
        {
            if slot.link == Some(id) {
                slot.link = None;
            }
        }
        Some(edge)
    }

    /// Deletes every edge whose endpoints or slots no longer exist.
    /// Returns the ids of the removed edges.
    pub fn prune_dangling_edges(&mut self) -> Vec<EdgeId> {
        let dangling: Vec<EdgeId> = self
            .edges
            .values()
            .filter(|e| {
                let source_ok = self
                    .nodes
                    .get(&e.source)
                    .is_some_and(|n| e.source_slot < n.outputs.len());
                let target_ok = self
                    .nodes
                    .get(&e.target)
                    .is_some_and(|n| e.target_slot < n.inputs.len());
                !(source_ok && target_ok)
            })
            .map(|e| e.id)
            .collect();
        for id in &dangling {
            self.detach_edge(*id);
        }
        if !dangling.is_empty() {
            debug!(count = dangling.len(), "pruned dangling edges");
        }
        dangling
    }

    /// Removes an input slot, its edge, and shifts every index recorded
    /// after it.
    pub fn remove_input_slot(
        &mut self,
        node_id: NodeId,
        index: usize,
    ) -> Result<InputSlot, GraphError> {
        let link = self
            .try_node(node_id)?
            .inputs
            .get(index)
            .ok_or(GraphError::SlotNotFound {
                node_id,
                direction: SlotDirection::Input,
                index,
            })?
            .link;
        if let Some(edge_id) = link {
            self.detach_edge(edge_id);
        }
        let node = self
            .nodes
            .get_mut(&node_id)
            .ok_or(GraphError::NodeNotFound(node_id))?;
        let slot = node.inputs.remove(index);
        node.native_inputs = std::mem::take(&mut node.native_inputs)
            .into_iter()
            .filter(|(i, _)| *i != index)
            .map(|(i, native)| (if i > index { i - 1 } else { i }, native))
            .collect();
        remove_from_groups(&mut node.multi_input_slots, index);
        node.refresh_size();
        for edge in self.edges.values_mut() {
            if edge.target == node_id && edge.target_slot > index {
                edge.target_slot -= 1;
            }
        }
        Ok(slot)
    }

    /// Removes an output slot, all of its edges, and shifts every index
    /// recorded after it.
    pub fn remove_output_slot(
        &mut self,
        node_id: NodeId,
        index: usize,
    ) -> Result<OutputSlot, GraphError> {
        let links = self
            .try_node(node_id)?
            .outputs
            .get(index)
            .ok_or(GraphError::SlotNotFound {
                node_id,
                direction: SlotDirection::Output,
                index,
            })?
            .links
            .clone();
        for edge_id in links {
            self.detach_edge(edge_id);
        }
        let node = self
            .nodes
            .get_mut(&node_id)
            .ok_or(GraphError::NodeNotFound(node_id))?;
        let slot = node.outputs.remove(index);
        remove_from_groups(&mut node.multi_output_slots, index);
        node.refresh_size();
        for edge in self.edges.values_mut() {
            if edge.source == node_id && edge.source_slot > index {
                edge.source_slot -= 1;
            }
        }
        Ok(slot)
    }

    fn insert_input_slot(&mut self, node_id: NodeId, index: usize, slot: InputSlot) {
        for edge in self.edges.values_mut() {
            if edge.target == node_id && edge.target_slot >= index {
                edge.target_slot += 1;
            }
        }
        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.inputs.insert(index, slot);
            node.native_inputs = std::mem::take(&mut node.native_inputs)
                .into_iter()
                .map(|(i, native)| (if i >= index { i + 1 } else { i }, native))
                .collect();
            shift_groups(&mut node.multi_input_slots, index);
            node.refresh_size();
        }
    }

    fn insert_output_slot(&mut self, node_id: NodeId, index: usize, slot: OutputSlot) {
        for edge in self.edges.values_mut() {
            if edge.source == node_id && edge.source_slot >= index {
                edge.source_slot += 1;
            }
        }
        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.outputs.insert(index, slot);
            shift_groups(&mut node.multi_output_slots, index);
            node.refresh_size();
        }
    }

    /// Appends a `field.key` slot to a multi-slot field.
    ///
    /// A group still holding only its ungrouped fallback slot has that slot
    /// renamed instead, keeping any edge attached to it. Returns the slot index.
    pub fn add_multi_slot(
        &mut self,
        node_id: NodeId,
        field: &str,
        key: &str,
    ) -> Result<usize, GraphError> {
        let node = self.try_node(node_id)?;
        let name = format!("{}.{}", field, key);
        let (direction, indices) = multi_group(node, field)?;
        let taken = match direction {
            SlotDirection::Input => node.input_index(&name).is_some(),
            SlotDirection::Output => node.output_index(&name).is_some(),
        };
        if taken {
            return Err(GraphError::DuplicateSlot { node_id, name });
        }

        let fallback = indices.iter().copied().find(|i| match direction {
            SlotDirection::Input => node.inputs.get(*i).is_some_and(|s| s.name == field),
            SlotDirection::Output => node.outputs.get(*i).is_some_and(|s| s.name == field),
        });
        if let (Some(index), 1) = (fallback, indices.len()) {
            let node = self
                .nodes
                .get_mut(&node_id)
                .ok_or(GraphError::NodeNotFound(node_id))?;
            match direction {
                SlotDirection::Input => node.inputs[index].name = name,
                SlotDirection::Output => node.outputs[index].name = name,
            }
            return Ok(index);
        }

        let last = indices.iter().copied().max();
        match direction {
            SlotDirection::Input => {
                let type_tree = last
                    .and_then(|i| node.inputs.get(i))
                    .map(|s| s.type_tree.clone())
                    .unwrap_or_else(|| TypeTree::basic("Any"));
                let index = last.map_or(node.inputs.len(), |i| i + 1);
                let origin = last
                    .and_then(|i| node.inputs.get(i))
                    .map(|s| s.origin)
                    .unwrap_or_default();
                self.insert_input_slot(node_id, index, InputSlot::new(name, type_tree, origin));
                self.push_group_index(node_id, SlotDirection::Input, field, index);
                Ok(index)
            }
            SlotDirection::Output => {
                let type_tree = last
                    .and_then(|i| node.outputs.get(i))
                    .map(|s| s.type_tree.clone())
                    .unwrap_or_else(|| TypeTree::basic("Any"));
                let index = last.map_or(node.outputs.len(), |i| i + 1);
                let origin = last
                    .and_then(|i| node.outputs.get(i))
                    .map(|s| s.origin)
                    .unwrap_or_default();
                self.insert_output_slot(node_id, index, OutputSlot::new(name, type_tree, origin));
                self.push_group_index(node_id, SlotDirection::Output, field, index);
                Ok(index)
            }
        }
    }

    fn push_group_index(&mut self, node_id: NodeId, direction: SlotDirection, field: &str, index: usize) {
        if let Some(node) = self.nodes.get_mut(&node_id) {
            let groups = match direction {
                SlotDirection::Input => &mut node.multi_input_slots,
                SlotDirection::Output => &mut node.multi_output_slots,
            };
            groups.entry(field.to_string()).or_default().push(index);
        }
    }

    /// Removes the `field.key` slot of a multi-slot field and its edges.
    ///
    /// Removing the last keyed slot turns it back into the ungrouped
    /// fallback slot, so the field always keeps one connection point.
    pub fn remove_multi_slot(
        &mut self,
        node_id: NodeId,
        field: &str,
        key: &str,
    ) -> Result<(), GraphError> {
        let node = self.try_node(node_id)?;
        let name = format!("{}.{}", field, key);
        let (direction, indices) = multi_group(node, field)?;
        let index = match direction {
            SlotDirection::Input => node.input_index(&name),
            SlotDirection::Output => node.output_index(&name),
        }
        .filter(|i| indices.contains(i))
        .ok_or_else(|| GraphError::SlotNameNotFound {
            node_id,
            direction,
            name: name.clone(),
        })?;

        if indices.len() == 1 {
            let node = self
                .nodes
                .get_mut(&node_id)
                .ok_or(GraphError::NodeNotFound(node_id))?;
            match direction {
                SlotDirection::Input => node.inputs[index].name = field.to_string(),
                SlotDirection::Output => node.outputs[index].name = field.to_string(),
            }
            return Ok(());
        }
        match direction {
            SlotDirection::Input => self.remove_input_slot(node_id, index).map(|_| ()),
            SlotDirection::Output => self.remove_output_slot(node_id, index).map(|_| ()),
        }
    }
}

fn clear_links(node: &mut NodeInstance) {
    node.inputs.iter_mut().for_each(|s| s.link = None);
    node.outputs.iter_mut().for_each(|s| s.links.clear());
}

/// The schema multi-slot group named `field`. Groups made of control slots
/// (a merge node's `wait_for`) follow the node's configuration and cannot be
/// edited slot by slot.
fn multi_group(node: &NodeInstance, field: &str) -> Result<(SlotDirection, Vec<usize>), GraphError> {
    let input_origin = |i: &usize| node.inputs.get(*i).map(|s| s.origin);
    let output_origin = |i: &usize| node.outputs.get(*i).map(|s| s.origin);
    let group = if let Some(indices) = node.multi_input_slots.get(field) {
        Some((
            SlotDirection::Input,
            indices,
            indices.iter().any(|i| input_origin(i) == Some(SlotOrigin::Control)),
        ))
    } else {
        node.multi_output_slots.get(field).map(|indices| {
            (
                SlotDirection::Output,
                indices,
                indices.iter().any(|i| output_origin(i) == Some(SlotOrigin::Control)),
            )
        })
    };
    match group {
        Some((direction, indices, false)) => Ok((direction, indices.clone())),
        _ => Err(GraphError::NotAMultiSlot {
            node_id: node.id,
            field: field.to_string(),
        }),
    }
}

fn remove_from_groups(groups: &mut BTreeMap<String, Vec<usize>>, index: usize) {
    for indices in groups.values_mut() {
        indices.retain(|i| *i != index);
        indices.iter_mut().filter(|i| **i > index).for_each(|i| *i -= 1);
    }
}

fn shift_groups(groups: &mut BTreeMap<String, Vec<usize>>, index: usize) {
    for indices in groups.values_mut() {
        indices.iter_mut().filter(|i| **i >= index).for_each(|i| *i += 1);
    }
}

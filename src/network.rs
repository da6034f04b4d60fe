//! Graph network layers.
//!
//! Two layers operate on [`GraphTuple`] values:
//!
//! - [`GraphIndependent`] transforms nodes, edges, and globals separately,
//!   with no information flow between them. This is the usual encoder or
//!   decoder step around a stack of message-passing blocks.
//! - [`GraphNetwork`] performs one round of message passing with sum
//!   aggregation, following Battaglia et al., "Relational inductive biases,
//!   deep learning, and graph networks" (arXiv:1806.01261).
//!
//! A [`GraphNetwork`] applies its update functions in a fixed order: edges
//! first, then nodes, then globals. Each stage reads the graph as left by
//! the previous stage, so the node update aggregates the freshly computed
//! edges and the global update sees both new nodes and new edges.
//! Connectivity is read-only throughout.
//!
//! Update functions receive every feature group as an `Option`: a group
//! that is absent from the graph arrives as `None`, never as zeros, and the
//! function decides how to combine whatever is present.

use candle_core::Tensor;
use candle_nn::Module;

use crate::aggregate::{
    batched_apply, broadcast_globals_to_nodes, broadcast_globals_to_slots,
    broadcast_outgoing_nodes, gather_incoming_nodes, incoming_edge_sum, masked_edge_sum,
    outgoing_edge_sum, slot_mask,
};
use crate::error::{Error, Result};
use crate::graph::GraphTuple;

/// Edge update function.
///
/// Inputs are shaped `(N, max_degree, ·)`: the current edge features, the
/// features of the node each slot points at, the features of the node that
/// owns the slot, and the broadcast globals. The result must keep the
/// `(N, max_degree, ·)` slot grid; its feature width is free.
///
/// Implementations must treat slots independently. Information crosses
/// instances only through the aggregation step that feeds them.
pub trait EdgeUpdate {
    fn update(
        &self,
        edges: Option<&Tensor>,
        incoming_nodes: Option<&Tensor>,
        outgoing_nodes: Option<&Tensor>,
        globals: Option<&Tensor>,
    ) -> Result<Tensor>;
}

/// Node update function.
///
/// Inputs are shaped `(N, ·)`: the current node features, the summed
/// incoming and outgoing edge features, and the broadcast globals. The
/// result must keep `N` rows. Implementations must treat nodes
/// independently.
pub trait NodeUpdate {
    fn update(
        &self,
        nodes: Option<&Tensor>,
        incoming_edges: Option<&Tensor>,
        outgoing_edges: Option<&Tensor>,
        globals: Option<&Tensor>,
    ) -> Result<Tensor>;
}

/// Global update function, invoked once per graph.
///
/// Inputs are vectors: the sum of all node features, the masked sum of all
/// edge features, and the current globals.
pub trait GlobalUpdate {
    fn update(
        &self,
        node_sum: Option<&Tensor>,
        edge_sum: Option<&Tensor>,
        globals: Option<&Tensor>,
    ) -> Result<Tensor>;
}

impl<F> EdgeUpdate for F
where
    F: Fn(Option<&Tensor>, Option<&Tensor>, Option<&Tensor>, Option<&Tensor>) -> Result<Tensor>,
{
    fn update(
        &self,
        edges: Option<&Tensor>,
        incoming_nodes: Option<&Tensor>,
        outgoing_nodes: Option<&Tensor>,
        globals: Option<&Tensor>,
    ) -> Result<Tensor> {
        self(edges, incoming_nodes, outgoing_nodes, globals)
    }
}

impl<F> NodeUpdate for F
where
    F: Fn(Option<&Tensor>, Option<&Tensor>, Option<&Tensor>, Option<&Tensor>) -> Result<Tensor>,
{
    fn update(
        &self,
        nodes: Option<&Tensor>,
        incoming_edges: Option<&Tensor>,
        outgoing_edges: Option<&Tensor>,
        globals: Option<&Tensor>,
    ) -> Result<Tensor> {
        self(nodes, incoming_edges, outgoing_edges, globals)
    }
}

impl<F> GlobalUpdate for F
where
    F: Fn(Option<&Tensor>, Option<&Tensor>, Option<&Tensor>) -> Result<Tensor>,
{
    fn update(
        &self,
        node_sum: Option<&Tensor>,
        edge_sum: Option<&Tensor>,
        globals: Option<&Tensor>,
    ) -> Result<Tensor> {
        self(node_sum, edge_sum, globals)
    }
}

/// Lifts a function over one node into a batched [`NodeUpdate`].
///
/// The wrapped function sees rank-1 feature vectors for a single node at a
/// time; present inputs are sliced along the node axis and the results are
/// stacked back together.
pub struct PerNode<F>(pub F);

impl<F> NodeUpdate for PerNode<F>
where
    F: Fn(Option<&Tensor>, Option<&Tensor>, Option<&Tensor>, Option<&Tensor>) -> Result<Tensor>,
{
    fn update(
        &self,
        nodes: Option<&Tensor>,
        incoming_edges: Option<&Tensor>,
        outgoing_edges: Option<&Tensor>,
        globals: Option<&Tensor>,
    ) -> Result<Tensor> {
        batched_apply(&[nodes, incoming_edges, outgoing_edges, globals], |row| {
            (self.0)(
                row[0].as_ref(),
                row[1].as_ref(),
                row[2].as_ref(),
                row[3].as_ref(),
            )
        })
    }
}

/// Lifts a function over one edge slot into a batched [`EdgeUpdate`].
///
/// The slot grid is flattened to a single batch axis, the wrapped function
/// is applied per slot, and the output is folded back to
/// `(N, max_degree, ·)`.
pub struct PerEdge<F>(pub F);

impl<F> EdgeUpdate for PerEdge<F>
where
    F: Fn(Option<&Tensor>, Option<&Tensor>, Option<&Tensor>, Option<&Tensor>) -> Result<Tensor>,
{
    fn update(
        &self,
        edges: Option<&Tensor>,
        incoming_nodes: Option<&Tensor>,
        outgoing_nodes: Option<&Tensor>,
        globals: Option<&Tensor>,
    ) -> Result<Tensor> {
        let grid = [edges, incoming_nodes, outgoing_nodes, globals];
        let template = grid
            .iter()
            .copied()
            .flatten()
            .next()
            .ok_or_else(|| Error::InvalidGraph("edge update received no feature groups".into()))?;
        let (n, max_degree, _) = template.dims3()?;
        let flat: Vec<Option<Tensor>> = grid
            .iter()
            .map(|t| t.map(|t| t.flatten(0, 1)).transpose())
            .collect::<candle_core::Result<_>>()?;
        let refs: Vec<Option<&Tensor>> = flat.iter().map(|t| t.as_ref()).collect();
        let out = batched_apply(&refs, |row| {
            (self.0)(
                row[0].as_ref(),
                row[1].as_ref(),
                row[2].as_ref(),
                row[3].as_ref(),
            )
        })?;
        let width = out.dim(1)?;
        Ok(out.reshape((n, max_degree, width))?)
    }
}

/// Runs an edge update over a graph and masks sentinel slots.
///
/// Incoming node features are gathered through `edge_idx` (zeros at
/// sentinel slots), outgoing node features and globals are broadcast over
/// the slot grid, and the update's output is multiplied by the slot mask so
/// empty slots carry exact zeros forward.
pub fn apply_edge_update(graph: &GraphTuple, f: &dyn EdgeUpdate) -> Result<Tensor> {
    let n = graph.node_count()?;
    let max_degree = graph.max_degree()?;
    let (incoming, outgoing) = match &graph.nodes {
        Some(nodes) => (
            Some(gather_incoming_nodes(nodes, &graph.edge_idx)?),
            Some(broadcast_outgoing_nodes(nodes, max_degree)?),
        ),
        None => (None, None),
    };
    let globals = graph
        .globals
        .as_ref()
        .map(|g| broadcast_globals_to_slots(g, n, max_degree))
        .transpose()?;
    let out = f.update(
        graph.edges.as_ref(),
        incoming.as_ref(),
        outgoing.as_ref(),
        globals.as_ref(),
    )?;
    let mask = slot_mask(&graph.edge_idx, n)?.to_dtype(out.dtype())?;
    Ok(out.broadcast_mul(&mask)?)
}

/// Runs a node update over a graph.
///
/// Incoming edges are scatter-summed by destination id and outgoing edges
/// are mask-summed along the degree axis; both stay `None` when the graph
/// has no edge features. Globals are broadcast per node when present.
pub fn apply_node_update(graph: &GraphTuple, f: &dyn NodeUpdate) -> Result<Tensor> {
    let n = graph.node_count()?;
    let (incoming, outgoing) = match &graph.edges {
        Some(edges) => (
            Some(incoming_edge_sum(edges, &graph.edge_idx, n)?),
            Some(outgoing_edge_sum(edges, &graph.edge_idx, n)?),
        ),
        None => (None, None),
    };
    let globals = graph
        .globals
        .as_ref()
        .map(|g| broadcast_globals_to_nodes(g, n))
        .transpose()?;
    f.update(
        graph.nodes.as_ref(),
        incoming.as_ref(),
        outgoing.as_ref(),
        globals.as_ref(),
    )
}

/// Runs a global update over a graph.
pub fn apply_global_update(graph: &GraphTuple, f: &dyn GlobalUpdate) -> Result<Tensor> {
    let n = graph.node_count()?;
    let node_sum = graph.nodes.as_ref().map(|nodes| nodes.sum(0)).transpose()?;
    let edge_sum = graph
        .edges
        .as_ref()
        .map(|edges| masked_edge_sum(edges, &graph.edge_idx, n))
        .transpose()?;
    f.update(node_sum.as_ref(), edge_sum.as_ref(), graph.globals.as_ref())
}

/// Applies independent transforms to nodes, edges, and globals.
///
/// Each configured transform is a [`Module`] applied to its field alone:
/// nodes as `(N, node_dim)`, edges as `(N, max_degree, edge_dim)` with the
/// transform vectorized over both leading axes, globals as `(global_dim,)`.
/// Unconfigured transforms are identities, and absent fields pass through
/// untouched.
#[derive(Default)]
pub struct GraphIndependent {
    edge_fn: Option<Box<dyn Module>>,
    node_fn: Option<Box<dyn Module>>,
    global_fn: Option<Box<dyn Module>>,
}

impl GraphIndependent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_edge_fn(mut self, f: impl Module + 'static) -> Self {
        self.edge_fn = Some(Box::new(f));
        self
    }

    pub fn with_node_fn(mut self, f: impl Module + 'static) -> Self {
        self.node_fn = Some(Box::new(f));
        self
    }

    pub fn with_global_fn(mut self, f: impl Module + 'static) -> Self {
        self.global_fn = Some(Box::new(f));
        self
    }

    pub fn forward(&self, graph: &GraphTuple) -> Result<GraphTuple> {
        let mut out = graph.clone();
        if let (Some(f), Some(nodes)) = (&self.node_fn, &graph.nodes) {
            out.nodes = Some(f.forward(nodes)?);
        }
        if let (Some(f), Some(edges)) = (&self.edge_fn, &graph.edges) {
            out.edges = Some(f.forward(edges)?);
        }
        if let (Some(f), Some(globals)) = (&self.global_fn, &graph.globals) {
            out.globals = Some(f.forward(globals)?);
        }
        Ok(out)
    }
}

/// One round of sum-aggregated message passing.
///
/// Configured update functions run in the order edges, nodes, globals, each
/// over the graph as left by the previous stage. Any unconfigured path
/// leaves its field unchanged, and `edge_idx` is never modified.
#[derive(Default)]
pub struct GraphNetwork {
    edge_fn: Option<Box<dyn EdgeUpdate>>,
    node_fn: Option<Box<dyn NodeUpdate>>,
    global_fn: Option<Box<dyn GlobalUpdate>>,
}

impl GraphNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_edge_fn(mut self, f: impl EdgeUpdate + 'static) -> Self {
        self.edge_fn = Some(Box::new(f));
        self
    }

    pub fn with_node_fn(mut self, f: impl NodeUpdate + 'static) -> Self {
        self.node_fn = Some(Box::new(f));
        self
    }

    pub fn with_global_fn(mut self, f: impl GlobalUpdate + 'static) -> Self {
        self.global_fn = Some(Box::new(f));
        self
    }

    pub fn forward(&self, graph: &GraphTuple) -> Result<GraphTuple> {
        let mut graph = graph.clone();
        if let Some(f) = &self.edge_fn {
            graph.edges = Some(apply_edge_update(&graph, f.as_ref())?);
        }
        if let Some(f) = &self.node_fn {
            graph.nodes = Some(apply_node_update(&graph, f.as_ref())?);
        }
        if let Some(f) = &self.global_fn {
            graph.globals = Some(apply_global_update(&graph, f.as_ref())?);
        }
        Ok(graph)
    }
}

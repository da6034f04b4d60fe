//! Graph data structure for fixed-degree message passing.
//!
//! [`GraphTuple`] holds node, edge, and global features together with a
//! dense connectivity table. The layout is tailored to neighbor-list style
//! simulation pipelines: every node owns `max_degree` outgoing edge slots,
//! and unused slots point at a sentinel id equal to the node count.
//!
//! ```text
//! nodes    : (N, node_dim)
//! edges    : (N, max_degree, edge_dim)   edges[i, j] = j-th edge out of i
//! globals  : (global_dim,)
//! edge_idx : (N, max_degree) u32         destination id, or N if empty
//! ```
//!
//! Feature fields are optional. An absent field means "leave this feature
//! group out of every update and aggregation"; it is never treated as a
//! zero tensor.

use candle_core::{DType, Tensor};

use crate::error::{Error, Result};

/// Immutable container for one fixed-degree graph.
///
/// Values are cheap to clone since tensor storage is shared. Layers never
/// mutate a graph in place; they return a new `GraphTuple` with one or more
/// fields replaced. Connectivity is produced once by an upstream builder
/// (typically a neighbor list) and read-only afterwards.
#[derive(Debug, Clone)]
pub struct GraphTuple {
    /// Per-node features, `(N, node_dim)`.
    pub nodes: Option<Tensor>,
    /// Per-slot edge features, `(N, max_degree, edge_dim)`.
    pub edges: Option<Tensor>,
    /// Whole-graph features, `(global_dim,)`.
    pub globals: Option<Tensor>,
    /// Destination ids, `(N, max_degree)` u32. Entries are node ids in
    /// `[0, N)`, or exactly `N` when the slot holds no edge.
    pub edge_idx: Tensor,
}

impl GraphTuple {
    /// Builds a graph and checks field consistency.
    ///
    /// `edge_idx` fixes `N` and `max_degree`; `nodes` and `edges` must agree
    /// with both, and `globals` must be a vector. Callers that already
    /// uphold the layout may construct the struct directly instead.
    pub fn new(
        nodes: Option<Tensor>,
        edges: Option<Tensor>,
        globals: Option<Tensor>,
        edge_idx: Tensor,
    ) -> Result<Self> {
        let (n, max_degree) = edge_idx.dims2()?;
        if edge_idx.dtype() != DType::U32 {
            return Err(Error::InvalidGraph(format!(
                "edge_idx must be u32, got {:?}",
                edge_idx.dtype()
            )));
        }
        if let Some(nodes) = &nodes {
            let (rows, _) = nodes.dims2()?;
            if rows != n {
                return Err(Error::DimensionMismatch { expected: n, got: rows });
            }
        }
        if let Some(edges) = &edges {
            let (rows, slots, _) = edges.dims3()?;
            if rows != n {
                return Err(Error::DimensionMismatch { expected: n, got: rows });
            }
            if slots != max_degree {
                return Err(Error::DimensionMismatch {
                    expected: max_degree,
                    got: slots,
                });
            }
        }
        if let Some(globals) = &globals {
            globals.dims1()?;
        }
        Ok(Self {
            nodes,
            edges,
            globals,
            edge_idx,
        })
    }

    /// Number of nodes `N`. The sentinel id equals this value.
    pub fn node_count(&self) -> Result<usize> {
        Ok(self.edge_idx.dim(0)?)
    }

    /// Number of outgoing edge slots per node.
    pub fn max_degree(&self) -> Result<usize> {
        Ok(self.edge_idx.dim(1)?)
    }
}

/// Concatenates the feature fields of several graphs along `axis`.
///
/// Each field must be present in every graph or absent from every graph.
/// The connectivity of the result is taken from the first graph; the other
/// graphs' `edge_idx` tables are not compared against it. Callers batching
/// graphs along the node axis must guarantee identical degree structure
/// themselves, or avoid relying on per-graph connectivity after the merge.
pub fn concatenate(graphs: &[GraphTuple], axis: usize) -> Result<GraphTuple> {
    let first = graphs.first().ok_or(Error::EmptyBatch)?;
    Ok(GraphTuple {
        nodes: cat_field(graphs, |g| g.nodes.as_ref(), "nodes", axis)?,
        edges: cat_field(graphs, |g| g.edges.as_ref(), "edges", axis)?,
        globals: cat_field(graphs, |g| g.globals.as_ref(), "globals", axis)?,
        edge_idx: first.edge_idx.clone(),
    })
}

fn cat_field<F>(graphs: &[GraphTuple], field: F, name: &str, axis: usize) -> Result<Option<Tensor>>
where
    F: Fn(&GraphTuple) -> Option<&Tensor>,
{
    let present = graphs.iter().filter(|g| field(g).is_some()).count();
    if present == 0 {
        return Ok(None);
    }
    if present != graphs.len() {
        return Err(Error::InvalidGraph(format!(
            "{name} is present in {present} of {} graphs; presence must be uniform",
            graphs.len()
        )));
    }
    let parts: Vec<&Tensor> = graphs.iter().filter_map(&field).collect();
    Ok(Some(Tensor::cat(&parts, axis)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    fn small_graph(device: &Device) -> GraphTuple {
        let nodes = Tensor::new(&[[1f32, 0.], [0., 1.]], device).unwrap();
        let edges = Tensor::new(&[[[1f32], [2.]], [[3.], [4.]]], device).unwrap();
        let edge_idx = Tensor::new(&[[1u32, 2], [2, 2]], device).unwrap();
        GraphTuple::new(Some(nodes), Some(edges), None, edge_idx).unwrap()
    }

    #[test]
    fn new_rejects_node_count_mismatch() {
        let device = Device::Cpu;
        let nodes = Tensor::new(&[[1f32, 0.]], &device).unwrap();
        let edge_idx = Tensor::new(&[[2u32], [2]], &device).unwrap();
        let err = GraphTuple::new(Some(nodes), None, None, edge_idx).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 2, got: 1 }));
    }

    #[test]
    fn new_rejects_non_u32_indices() {
        let device = Device::Cpu;
        let edge_idx = Tensor::new(&[[1i64, 2], [2, 2]], &device).unwrap();
        let err = GraphTuple::new(None, None, None, edge_idx).unwrap_err();
        assert!(matches!(err, Error::InvalidGraph(_)));
    }

    #[test]
    fn accessors_follow_edge_idx_shape() {
        let device = Device::Cpu;
        let graph = small_graph(&device);
        assert_eq!(graph.node_count().unwrap(), 2);
        assert_eq!(graph.max_degree().unwrap(), 2);
    }

    #[test]
    fn concatenate_doubles_node_axis_and_keeps_first_connectivity() {
        let device = Device::Cpu;
        let graph = small_graph(&device);
        let merged = concatenate(&[graph.clone(), graph.clone()], 0).unwrap();

        assert_eq!(merged.nodes.as_ref().unwrap().dims(), &[4, 2]);
        assert_eq!(merged.edges.as_ref().unwrap().dims(), &[4, 2, 1]);
        // Connectivity comes from the first graph verbatim, even though a
        // truly doubled graph would index nodes past the original range.
        assert_eq!(
            merged.edge_idx.to_vec2::<u32>().unwrap(),
            graph.edge_idx.to_vec2::<u32>().unwrap()
        );
    }

    #[test]
    fn concatenate_keeps_uniformly_absent_fields_absent() {
        let device = Device::Cpu;
        let graph = small_graph(&device);
        let merged = concatenate(&[graph.clone(), graph], 0).unwrap();
        assert!(merged.globals.is_none());
    }

    #[test]
    fn concatenate_rejects_mixed_presence() {
        let device = Device::Cpu;
        let with_globals = {
            let mut g = small_graph(&device);
            g.globals = Some(Tensor::new(&[1f32, 2.], &device).unwrap());
            g
        };
        let err = concatenate(&[small_graph(&device), with_globals], 0).unwrap_err();
        assert!(matches!(err, Error::InvalidGraph(_)));
    }

    #[test]
    fn concatenate_rejects_empty_batch() {
        let err = concatenate(&[], 0).unwrap_err();
        assert!(matches!(err, Error::EmptyBatch));
    }
}

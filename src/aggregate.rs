//! Masked feature reductions over the dense edge layout.
//!
//! These reductions are what make fixed-degree message passing expressible
//! as dense tensor ops:
//!
//! - a scatter-sum keyed by destination id, with one extra bucket that
//!   swallows sentinel entries and is dropped afterwards,
//! - masked sums along the degree axis and over whole edge tables,
//! - gather/broadcast helpers that align node and global features with the
//!   `(N, max_degree)` slot grid.
//!
//! All reductions are sums, never means, and sentinel slots contribute
//! exactly zero to every one of them.

use candle_core::Tensor;

use crate::error::{Error, Result};

/// Sums rows of `values` into `num_buckets` buckets selected by `index`.
///
/// `values` is `(E, d)` and `index` is `(E,)` u32; bucket `b` of the result
/// is the sum of all rows whose index equals `b`. Indices are checked
/// against the bucket count up front, so an out-of-range id is an error
/// rather than a silently dropped row.
pub fn scatter_sum(values: &Tensor, index: &Tensor, num_buckets: usize) -> Result<Tensor> {
    let (len, dim) = values.dims2()?;
    let idx_len = index.dims1()?;
    if idx_len != len {
        return Err(Error::DimensionMismatch {
            expected: len,
            got: idx_len,
        });
    }
    let out = Tensor::zeros((num_buckets, dim), values.dtype(), values.device())?;
    if len == 0 {
        return Ok(out);
    }
    let max = index.max(0)?.to_scalar::<u32>()? as usize;
    if max >= num_buckets {
        return Err(Error::IndexOutOfBounds {
            index: max,
            buckets: num_buckets,
        });
    }
    Ok(out.index_add(index, values, 0)?)
}

/// Mask over the slot grid: 1 where a slot holds a real edge, 0 at
/// sentinel slots. Shape `(N, max_degree, 1)`, u8.
pub fn slot_mask(edge_idx: &Tensor, node_count: usize) -> Result<Tensor> {
    Ok(edge_idx.lt(node_count as u32)?.unsqueeze(2)?)
}

/// Per-node sum of incoming edge features, `(N, edge_dim)`.
///
/// Flattens the slot grid and scatter-sums by destination id into `N + 1`
/// buckets; the last bucket collects every sentinel slot and is dropped.
pub fn incoming_edge_sum(edges: &Tensor, edge_idx: &Tensor, node_count: usize) -> Result<Tensor> {
    let flat_edges = edges.flatten(0, 1)?;
    let flat_idx = edge_idx.flatten(0, 1)?;
    let summed = scatter_sum(&flat_edges, &flat_idx, node_count + 1)?;
    Ok(summed.narrow(0, 0, node_count)?)
}

/// Per-node sum of outgoing edge features, `(N, edge_dim)`. Sentinel slots
/// are masked out before the sum along the degree axis.
pub fn outgoing_edge_sum(edges: &Tensor, edge_idx: &Tensor, node_count: usize) -> Result<Tensor> {
    let mask = slot_mask(edge_idx, node_count)?.to_dtype(edges.dtype())?;
    Ok(edges.broadcast_mul(&mask)?.sum(1)?)
}

/// Masked sum of all edge features in the graph, `(edge_dim,)`.
pub fn masked_edge_sum(edges: &Tensor, edge_idx: &Tensor, node_count: usize) -> Result<Tensor> {
    let mask = slot_mask(edge_idx, node_count)?.to_dtype(edges.dtype())?;
    Ok(edges.broadcast_mul(&mask)?.sum(0)?.sum(0)?)
}

/// Gathers the node features at the far end of every slot,
/// `(N, max_degree, node_dim)`.
///
/// The node table is padded with one zero row at index `N`, so sentinel
/// slots gather zeros. Ids past the sentinel are out of range and fail the
/// underlying index lookup.
pub fn gather_incoming_nodes(nodes: &Tensor, edge_idx: &Tensor) -> Result<Tensor> {
    let (n, feat) = nodes.dims2()?;
    let (idx_rows, max_degree) = edge_idx.dims2()?;
    if idx_rows != n {
        return Err(Error::DimensionMismatch {
            expected: n,
            got: idx_rows,
        });
    }
    let pad = Tensor::zeros((1, feat), nodes.dtype(), nodes.device())?;
    let padded = Tensor::cat(&[nodes, &pad], 0)?;
    let flat_idx = edge_idx.flatten(0, 1)?;
    Ok(padded.index_select(&flat_idx, 0)?.reshape((n, max_degree, feat))?)
}

/// Repeats each node's features across its outgoing slots,
/// `(N, max_degree, node_dim)`.
pub fn broadcast_outgoing_nodes(nodes: &Tensor, max_degree: usize) -> Result<Tensor> {
    let (n, feat) = nodes.dims2()?;
    Ok(nodes
        .unsqueeze(1)?
        .expand((n, max_degree, feat))?
        .contiguous()?)
}

/// Repeats the global features once per node, `(N, global_dim)`.
pub fn broadcast_globals_to_nodes(globals: &Tensor, node_count: usize) -> Result<Tensor> {
    let dim = globals.dims1()?;
    Ok(globals
        .unsqueeze(0)?
        .expand((node_count, dim))?
        .contiguous()?)
}

/// Repeats the global features once per slot, `(N, max_degree, global_dim)`.
pub fn broadcast_globals_to_slots(
    globals: &Tensor,
    node_count: usize,
    max_degree: usize,
) -> Result<Tensor> {
    let dim = globals.dims1()?;
    Ok(globals
        .unsqueeze(0)?
        .unsqueeze(0)?
        .expand((node_count, max_degree, dim))?
        .contiguous()?)
}

/// Applies a single-instance function across the leading batch axis.
///
/// `inputs` are parallel optional tensors sharing their leading dimension.
/// For each batch index the function receives the matching slice of every
/// present input, while absent inputs stay `None` for every instance. The
/// per-instance results are stacked along a new leading axis.
///
/// This is the dense replacement for automatic vectorization: a function
/// written against one node or one edge slot is lifted over the whole
/// batch without the instances ever seeing each other.
pub fn batched_apply<F>(inputs: &[Option<&Tensor>], f: F) -> Result<Tensor>
where
    F: Fn(&[Option<Tensor>]) -> Result<Tensor>,
{
    let template = inputs.iter().copied().flatten().next().ok_or_else(|| {
        Error::InvalidGraph("batched apply needs at least one present input".into())
    })?;
    let batch = template.dim(0)?;
    if batch == 0 {
        return Err(Error::EmptyBatch);
    }
    let mut rows = Vec::with_capacity(batch);
    for i in 0..batch {
        let mut row = Vec::with_capacity(inputs.len());
        for input in inputs {
            row.push(match input {
                Some(t) => Some(t.get(i)?),
                None => None,
            });
        }
        rows.push(f(&row)?);
    }
    Ok(Tensor::stack(&rows, 0)?)
}

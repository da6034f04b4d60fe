//! Graph network building blocks for particle and molecular simulation.
//!
//! `granet` implements the two standard layers of the graph-network
//! formulation (Battaglia et al., 2018) over a fixed-degree graph layout
//! that plugs directly into neighbor-list pipelines:
//!
//! - [`GraphIndependent`]: per-field encoder/decoder, no message passing.
//! - [`GraphNetwork`]: one round of sum-aggregated message passing,
//!   updating edges, then nodes, then globals.
//!
//! Graphs are [`GraphTuple`] values: every node owns `max_degree` outgoing
//! edge slots in a dense `(N, max_degree, ...)` table, and empty slots
//! carry a sentinel destination id equal to the node count. Sentinel slots
//! are masked out of every aggregation, so padding never leaks into the
//! learned updates.
//!
//! # Modules
//!
//! - [`graph`]: the graph container and batch concatenation
//! - [`aggregate`]: masked reductions and the batched-apply combinator
//! - [`network`]: update-function traits and the two layers
//! - [`layers`]: candle-nn backed update functions
//!
//! # Example
//!
//! ```rust,ignore
//! use candle_core::{DType, Device, Tensor};
//! use candle_nn::{VarBuilder, VarMap};
//! use granet::{GraphNetwork, GraphTuple, Mlp};
//!
//! let device = Device::Cpu;
//! let varmap = VarMap::new();
//! let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
//!
//! // 3 nodes with up to 2 outgoing edges each; id 3 marks an empty slot.
//! let graph = GraphTuple::new(
//!     Some(Tensor::randn(0f32, 1f32, (3, 4), &device)?),
//!     Some(Tensor::randn(0f32, 1f32, (3, 2, 8), &device)?),
//!     None,
//!     Tensor::new(&[[1u32, 2], [2, 3], [3, 3]], &device)?,
//! )?;
//!
//! let net = GraphNetwork::new()
//!     .with_edge_fn(Mlp::new(8 + 4 + 4, 32, 8, vb.pp("edge"))?)
//!     .with_node_fn(Mlp::new(4 + 8 + 8, 32, 4, vb.pp("node"))?);
//! let out = net.forward(&graph)?;
//! ```

pub mod aggregate;
pub mod error;
pub mod graph;
pub mod layers;
pub mod network;

pub use error::{Error, Result};
pub use graph::{concatenate, GraphTuple};
pub use layers::Mlp;
pub use network::{
    apply_edge_update, apply_global_update, apply_node_update, EdgeUpdate, GlobalUpdate,
    GraphIndependent, GraphNetwork, NodeUpdate, PerEdge, PerNode,
};

//! Learned update functions built on candle-nn.
//!
//! [`Mlp`] is the workhorse update for graph network blocks: it
//! concatenates whichever feature groups reach it along the feature axis
//! and pushes the result through a two-layer perceptron. One `Mlp` value
//! can serve as an edge, node, or global update; the batching differs per
//! path but the arithmetic is the same.

use candle_core::{Tensor, D};
use candle_nn::{linear, Linear, Module, VarBuilder};

use crate::error::{Error, Result};
use crate::network::{EdgeUpdate, GlobalUpdate, NodeUpdate};

/// Two-layer perceptron with a ReLU in between.
///
/// `in_dim` must equal the summed feature widths of the groups that are
/// actually present at call time; a mismatch surfaces as a tensor error
/// from the first linear layer.
pub struct Mlp {
    hidden: Linear,
    out: Linear,
}

impl Mlp {
    pub fn new(in_dim: usize, hidden_dim: usize, out_dim: usize, vb: VarBuilder) -> Result<Self> {
        let hidden = linear(in_dim, hidden_dim, vb.pp("hidden"))?;
        let out = linear(hidden_dim, out_dim, vb.pp("out"))?;
        Ok(Self { hidden, out })
    }

    fn run(&self, xs: &Tensor) -> Result<Tensor> {
        let h = self.hidden.forward(xs)?.relu()?;
        Ok(self.out.forward(&h)?)
    }
}

fn cat_present(parts: &[Option<&Tensor>]) -> Result<Tensor> {
    let present: Vec<&Tensor> = parts.iter().copied().flatten().collect();
    if present.is_empty() {
        return Err(Error::InvalidGraph(
            "update received no feature groups".into(),
        ));
    }
    Ok(Tensor::cat(&present, D::Minus1)?)
}

impl EdgeUpdate for Mlp {
    fn update(
        &self,
        edges: Option<&Tensor>,
        incoming_nodes: Option<&Tensor>,
        outgoing_nodes: Option<&Tensor>,
        globals: Option<&Tensor>,
    ) -> Result<Tensor> {
        self.run(&cat_present(&[edges, incoming_nodes, outgoing_nodes, globals])?)
    }
}

impl NodeUpdate for Mlp {
    fn update(
        &self,
        nodes: Option<&Tensor>,
        incoming_edges: Option<&Tensor>,
        outgoing_edges: Option<&Tensor>,
        globals: Option<&Tensor>,
    ) -> Result<Tensor> {
        self.run(&cat_present(&[nodes, incoming_edges, outgoing_edges, globals])?)
    }
}

impl GlobalUpdate for Mlp {
    fn update(
        &self,
        node_sum: Option<&Tensor>,
        edge_sum: Option<&Tensor>,
        globals: Option<&Tensor>,
    ) -> Result<Tensor> {
        // The global path works on a single vector; give it a unit batch
        // axis for the matmul and strip it afterwards.
        let x = cat_present(&[node_sum, edge_sum, globals])?;
        Ok(self.run(&x.unsqueeze(0)?)?.squeeze(0)?)
    }
}

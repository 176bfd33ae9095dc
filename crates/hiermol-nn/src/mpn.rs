//! Message passing over the three levels of a hierarchical graph.
//!
//! Each level runs its own network for `neighbor_hops` rounds:
//!
//! ```text
//! h_i^{(l+1)} = UPDATE(h_i^{(l)}, AGGREGATE({MESSAGE(h_j^{(l)}, e_ji) : j in N(i)}))
//! ```
//!
//! - [`RnnMpn`]: MESSAGE = MLP([h_j || e_ji]), AGGREGATE = sum, UPDATE = GRU cell
//! - [`Gcn`]: symmetric-normalized convolution with self-loops plus
//!   degree-normalized edge messages, UPDATE = activation
//!
//! [`HierMessagePassingNet`] chains the levels bottom-up. Atom outputs are
//! summed into their attachment node before the attachment level runs, and
//! attachment outputs into their motif before the motif level runs, so the
//! motif representations see the whole molecule.

use crate::config::{Activation, AutoencoderConfig, MpnModel, MpnOptions};
use crate::layers::{index_tensor, scatter_sum, GruCell, Mlp};
use candle_core::{Result, Tensor};
use candle_nn::{linear, Dropout, Linear, Module, VarBuilder};

/// One level's node features and directed edges.
#[derive(Clone)]
pub struct LevelInput {
    /// Node features `(N, d)`.
    pub nodes: Tensor,
    /// Edge features `(E, d)`, `None` when the level has no edges.
    pub edges: Option<Tensor>,
    src: Option<Tensor>,
    dst: Option<Tensor>,
    src_ids: Vec<u32>,
    dst_ids: Vec<u32>,
    num_nodes: usize,
}

impl LevelInput {
    /// Build from node features, directed edge endpoints and edge features.
    pub fn new(nodes: Tensor, src: &[u32], dst: &[u32], edges: Option<Tensor>) -> Result<Self> {
        let (num_nodes, _) = nodes.dims2()?;
        if src.len() != dst.len() {
            candle_core::bail!("edge endpoints differ in length: {} vs {}", src.len(), dst.len());
        }
        let device = nodes.device().clone();
        let (src_t, dst_t, edges) = match edges {
            Some(edges) if !src.is_empty() => (
                Some(index_tensor(src, &device)?),
                Some(index_tensor(dst, &device)?),
                Some(edges),
            ),
            _ => (None, None, None),
        };
        Ok(Self {
            nodes,
            edges,
            src: src_t,
            dst: dst_t,
            src_ids: src.to_vec(),
            dst_ids: dst.to_vec(),
            num_nodes,
        })
    }

    /// Same structure, different node features.
    pub fn with_nodes(&self, nodes: Tensor) -> Self {
        Self {
            nodes,
            ..self.clone()
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    /// Number of directed edges.
    pub fn num_edges(&self) -> usize {
        match self.edges {
            Some(_) => self.src_ids.len(),
            None => 0,
        }
    }

    /// `(src, dst, edge_features)` when the level has edges.
    pub fn edge_index(&self) -> Option<(&Tensor, &Tensor, &Tensor)> {
        match (&self.src, &self.dst, &self.edges) {
            (Some(src), Some(dst), Some(edges)) => Some((src, dst, edges)),
            _ => None,
        }
    }

    /// Degree of each node counting a self-loop.
    fn degrees(&self) -> Vec<f32> {
        let mut deg = vec![1f32; self.num_nodes];
        if self.num_edges() > 0 {
            for &d in &self.dst_ids {
                deg[d as usize] += 1.0;
            }
        }
        deg
    }

    /// Symmetric normalization `1 / sqrt(deg[src] * deg[dst])` of each
    /// directed edge as an `(E, 1)` column, `None` without edges.
    ///
    /// Together with the self-loop weight `1 / deg[i]` from
    /// [`LevelInput::inverse_degree`] this is `D^{-1/2} (A + I) D^{-1/2}`
    /// restricted to its non-zero entries.
    pub fn edge_weights(&self) -> Result<Option<Tensor>> {
        if self.num_edges() == 0 {
            return Ok(None);
        }
        let deg = self.degrees();
        let weights: Vec<f32> = self
            .src_ids
            .iter()
            .zip(&self.dst_ids)
            .map(|(&s, &d)| 1.0 / (deg[s as usize] * deg[d as usize]).sqrt())
            .collect();
        let len = weights.len();
        Ok(Some(
            Tensor::from_vec(weights, (len, 1), self.nodes.device())?.to_dtype(self.nodes.dtype())?,
        ))
    }

    /// `1 / degree` as an `(N, 1)` column.
    pub fn inverse_degree(&self) -> Result<Tensor> {
        let inv: Vec<f32> = self.degrees().into_iter().map(|d| 1.0 / d).collect();
        Tensor::from_vec(inv, (self.num_nodes, 1), self.nodes.device())?
            .to_dtype(self.nodes.dtype())
    }
}

/// Embedded inputs of all three levels plus the inter-level links.
pub struct HierInputs {
    pub atom: LevelInput,
    pub attachment: LevelInput,
    pub motif: LevelInput,
    /// Attachment node of each atom.
    pub atom_parent: Tensor,
    /// Motif node of each attachment node.
    pub attachment_parent: Tensor,
}

/// Output node representations per level.
pub struct HierReps {
    pub atom: Tensor,
    pub attachment: Tensor,
    pub motif: Tensor,
}

/// A message-passing network over one level.
pub trait MessagePassing {
    /// Node representations `(N, node_rep_size)` after all hops.
    fn forward(&self, input: &LevelInput, train: bool) -> Result<Tensor>;

    /// Short name for logging.
    fn name(&self) -> &'static str;
}

/// Constructor arguments shared by every message-passing network.
#[derive(Debug, Clone, PartialEq)]
pub struct MpnParams {
    pub node_rep_size: usize,
    pub activation: Activation,
    pub neighbor_hops: usize,
    pub dropout: f64,
    pub options: MpnOptions,
}

impl MpnParams {
    pub fn from_config(config: &AutoencoderConfig) -> Self {
        Self {
            node_rep_size: config.node_rep_size,
            activation: config.rep_activation,
            neighbor_hops: config.neighbor_hops,
            dropout: config.dropout,
            options: config.mpn.clone(),
        }
    }

    fn hidden_size(&self) -> usize {
        self.options.hidden_size.unwrap_or(0)
    }
}

/// Builds a message-passing network for one level.
///
/// Implemented by [`MpnModel`]; custom networks plug in by implementing it
/// and passing the factory to `Autoencoder::with_factory`.
pub trait MessagePassingFactory {
    fn build(&self, params: &MpnParams, vb: VarBuilder) -> Result<Box<dyn MessagePassing>>;
}

impl MessagePassingFactory for MpnModel {
    fn build(&self, params: &MpnParams, vb: VarBuilder) -> Result<Box<dyn MessagePassing>> {
        Ok(match self {
            MpnModel::RnnMpn => Box::new(RnnMpn::new(params, vb)?),
            MpnModel::Gcn => Box::new(Gcn::new(params, vb)?),
        })
    }
}

/// Recurrent message passing: summed MLP messages fed through a GRU cell.
pub struct RnnMpn {
    message: Mlp,
    gru: GruCell,
    activation: Activation,
    hops: usize,
    dropout: Dropout,
}

impl RnnMpn {
    pub fn new(params: &MpnParams, vb: VarBuilder) -> Result<Self> {
        let d = params.node_rep_size;
        Ok(Self {
            message: Mlp::new(
                2 * d,
                params.hidden_size(),
                d,
                params.activation,
                params.dropout,
                vb.pp("message"),
            )?,
            gru: GruCell::new(d, vb.pp("gru"))?,
            activation: params.activation,
            hops: params.neighbor_hops,
            dropout: Dropout::new(params.dropout as f32),
        })
    }
}

impl MessagePassing for RnnMpn {
    fn forward(&self, input: &LevelInput, train: bool) -> Result<Tensor> {
        let mut h = input.nodes.clone();
        for _ in 0..self.hops {
            let messages = match input.edge_index() {
                Some((src, dst, edges)) => {
                    let gathered = h.index_select(src, 0)?;
                    let joint = Tensor::cat(&[&gathered, edges], 1)?;
                    let msg = self.activation.apply(&self.message.forward(&joint, train)?)?;
                    scatter_sum(&msg, dst, input.num_nodes())?
                }
                None => h.zeros_like()?,
            };
            h = self.gru.step(&messages, &h)?;
            h = self.dropout.forward(&h, train)?;
        }
        Ok(h)
    }

    fn name(&self) -> &'static str {
        "rnn_mpn"
    }
}

/// Graph convolution layer.
///
/// Implements: H' = D^{-1/2} (A + I) D^{-1/2} H W, plus edge messages
/// `D^{-1} sum_j W_e e_ji` when the level has edges.
///
/// # Reference
///
/// Kipf & Welling, "Semi-Supervised Classification with Graph Convolutional
/// Networks", ICLR 2017.
pub struct GcnConv {
    linear: Linear,
    edge: Linear,
}

impl GcnConv {
    pub fn new(in_features: usize, out_features: usize, vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            linear: linear(in_features, out_features, vb.pp("lin"))?,
            edge: linear(in_features, out_features, vb.pp("edge"))?,
        })
    }

    /// `weights` are the per-edge normalizations from
    /// [`LevelInput::edge_weights`], `inv_deg` the `(N, 1)` inverse degrees.
    pub fn forward(
        &self,
        x: &Tensor,
        weights: Option<&Tensor>,
        inv_deg: &Tensor,
        input: &LevelInput,
    ) -> Result<Tensor> {
        let xw = self.linear.forward(x)?;
        // self loop
        let h = xw.broadcast_mul(inv_deg)?;
        match (input.edge_index(), weights) {
            (Some((src, dst, edges)), Some(weights)) => {
                let neighbors = xw.index_select(src, 0)?.broadcast_mul(weights)?;
                let h = (h + scatter_sum(&neighbors, dst, input.num_nodes())?)?;
                let msg = scatter_sum(&self.edge.forward(edges)?, dst, input.num_nodes())?;
                h + msg.broadcast_mul(inv_deg)?
            }
            _ => Ok(h),
        }
    }
}

/// Stacked graph convolutions, one per hop.
pub struct Gcn {
    layers: Vec<GcnConv>,
    activation: Activation,
    dropout: Dropout,
}

impl Gcn {
    pub fn new(params: &MpnParams, vb: VarBuilder) -> Result<Self> {
        let d = params.node_rep_size;
        let layers = (0..params.neighbor_hops)
            .map(|hop| GcnConv::new(d, d, vb.pp(hop.to_string())))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            layers,
            activation: params.activation,
            dropout: Dropout::new(params.dropout as f32),
        })
    }
}

impl MessagePassing for Gcn {
    fn forward(&self, input: &LevelInput, train: bool) -> Result<Tensor> {
        let weights = input.edge_weights()?;
        let inv_deg = input.inverse_degree()?;
        let mut h = input.nodes.clone();
        for layer in &self.layers {
            h = self
                .activation
                .apply(&layer.forward(&h, weights.as_ref(), &inv_deg, input)?)?;
            h = self.dropout.forward(&h, train)?;
        }
        Ok(h)
    }

    fn name(&self) -> &'static str {
        "gcn"
    }
}

/// One message-passing network per level, run bottom-up.
pub struct HierMessagePassingNet {
    atom: Box<dyn MessagePassing>,
    attachment: Box<dyn MessagePassing>,
    motif: Box<dyn MessagePassing>,
}

impl HierMessagePassingNet {
    pub fn new(params: &MpnParams, factory: &dyn MessagePassingFactory, vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            atom: factory.build(params, vb.pp("atom"))?,
            attachment: factory.build(params, vb.pp("attachment_config"))?,
            motif: factory.build(params, vb.pp("motif"))?,
        })
    }

    /// Name of the per-level network.
    pub fn model_name(&self) -> &'static str {
        self.atom.name()
    }

    pub fn forward(&self, inputs: &HierInputs, train: bool) -> Result<HierReps> {
        let atom = self.atom.forward(&inputs.atom, train)?;

        let pooled_atoms = scatter_sum(&atom, &inputs.atom_parent, inputs.attachment.num_nodes())?;
        let attachment_nodes = (&inputs.attachment.nodes + pooled_atoms)?;
        let attachment = self
            .attachment
            .forward(&inputs.attachment.with_nodes(attachment_nodes), train)?;

        let pooled_attachments =
            scatter_sum(&attachment, &inputs.attachment_parent, inputs.motif.num_nodes())?;
        let motif_nodes = (&inputs.motif.nodes + pooled_attachments)?;
        let motif = self.motif.forward(&inputs.motif.with_nodes(motif_nodes), train)?;

        Ok(HierReps {
            atom,
            attachment,
            motif,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::VarMap;

    fn params(hops: usize) -> MpnParams {
        MpnParams {
            node_rep_size: 4,
            activation: Activation::Tanh,
            neighbor_hops: hops,
            dropout: 0.0,
            options: MpnOptions { hidden_size: Some(6) },
        }
    }

    // Path graph 0 - 1 - 2, both directions.
    fn path(device: &Device) -> LevelInput {
        let nodes = Tensor::randn(0f32, 1f32, (3, 4), device).unwrap();
        let edges = Tensor::randn(0f32, 1f32, (4, 4), device).unwrap();
        LevelInput::new(nodes, &[0, 1, 1, 2], &[1, 0, 2, 1], Some(edges)).unwrap()
    }

    #[test]
    fn test_edge_weights() {
        let device = Device::Cpu;
        let input = path(&device);
        // deg = [2, 3, 2]
        let w = input.edge_weights().unwrap().unwrap().flatten_all().unwrap().to_vec1::<f32>().unwrap();
        let expected = 1.0 / 6f32.sqrt();
        assert_eq!(w.len(), 4);
        assert!(w.iter().all(|x| (x - expected).abs() < 1e-6));
        let inv = input.inverse_degree().unwrap().flatten_all().unwrap().to_vec1::<f32>().unwrap();
        assert_eq!(inv, vec![0.5, 1.0 / 3.0, 0.5]);

        let nodes = Tensor::zeros((2, 4), DType::F32, &device).unwrap();
        let edgeless = LevelInput::new(nodes, &[], &[], None).unwrap();
        assert!(edgeless.edge_weights().unwrap().is_none());
    }

    #[test]
    fn test_gcn_conv_matches_dense_normalization() {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let conv = GcnConv::new(4, 4, vb).unwrap();
        let input = path(&device);
        let weights = input.edge_weights().unwrap();
        let inv_deg = input.inverse_degree().unwrap();
        let sparse = conv
            .forward(&input.nodes, weights.as_ref(), &inv_deg, &input)
            .unwrap();

        // D^{-1/2} (A + I) D^{-1/2} for the path 0 - 1 - 2
        let deg = [2f32, 3.0, 2.0];
        let mut adj = vec![0f32; 9];
        for (i, j) in [(0, 0), (1, 1), (2, 2), (0, 1), (1, 0), (1, 2), (2, 1)] {
            adj[i * 3 + j] = 1.0 / (deg[i] * deg[j]).sqrt();
        }
        let adj = Tensor::from_vec(adj, (3, 3), &device).unwrap();
        let (_, dst, edges) = input.edge_index().unwrap();
        let edge_msg = scatter_sum(&conv.edge.forward(edges).unwrap(), dst, 3)
            .unwrap()
            .broadcast_mul(&inv_deg)
            .unwrap();
        let dense = (adj.matmul(&conv.linear.forward(&input.nodes).unwrap()).unwrap() + edge_msg).unwrap();

        let diff = (sparse - dense)
            .unwrap()
            .abs()
            .unwrap()
            .max_all()
            .unwrap()
            .to_scalar::<f32>()
            .unwrap();
        assert!(diff < 1e-5, "max difference {diff}");
    }

    #[test]
    fn test_gcn_large_batch_is_edge_indexed() {
        // 2000 disjoint 2-node graphs; a dense adjacency would be 4000 x 4000.
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let net = Gcn::new(&params(2), vb).unwrap();
        let pairs = 2000u32;
        let src: Vec<u32> = (0..pairs).flat_map(|p| [2 * p, 2 * p + 1]).collect();
        let dst: Vec<u32> = (0..pairs).flat_map(|p| [2 * p + 1, 2 * p]).collect();
        let n = 2 * pairs as usize;
        let nodes = Tensor::randn(0f32, 1f32, (n, 4), &device).unwrap();
        let edges = Tensor::randn(0f32, 1f32, (src.len(), 4), &device).unwrap();
        let input = LevelInput::new(nodes, &src, &dst, Some(edges)).unwrap();
        assert_eq!(input.edge_weights().unwrap().unwrap().dims(), &[src.len(), 1]);
        assert_eq!(net.forward(&input, false).unwrap().dims(), &[n, 4]);
    }

    #[test]
    fn test_models_keep_shape() {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let input = path(&device);
        for (i, model) in [MpnModel::RnnMpn, MpnModel::Gcn].into_iter().enumerate() {
            let net = model.build(&params(2), vb.pp(i.to_string())).unwrap();
            let out = net.forward(&input, false).unwrap();
            assert_eq!(out.dims(), &[3, 4]);
            assert_eq!(net.name(), model.to_string());
        }
    }

    #[test]
    fn test_edgeless_level() {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let nodes = Tensor::randn(0f32, 1f32, (1, 4), &device).unwrap();
        let input = LevelInput::new(nodes, &[], &[], None).unwrap();
        assert_eq!(input.num_edges(), 0);
        for (i, model) in [MpnModel::RnnMpn, MpnModel::Gcn].into_iter().enumerate() {
            let net = model.build(&params(1), vb.pp(i.to_string())).unwrap();
            assert_eq!(net.forward(&input, true).unwrap().dims(), &[1, 4]);
        }
    }

    #[test]
    fn test_messages_reach_neighbors() {
        // With GCN, changing node 0's features must change node 1's output
        // but not node 2's after a single hop.
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let net = Gcn::new(&params(1), vb).unwrap();

        let input = path(&device);
        let before = net.forward(&input, false).unwrap().to_vec2::<f32>().unwrap();
        let bumped = (input.nodes.clone() + Tensor::new(&[[5f32; 4], [0.0; 4], [0.0; 4]], &device).unwrap())
            .unwrap();
        let after = net
            .forward(&input.with_nodes(bumped), false)
            .unwrap()
            .to_vec2::<f32>()
            .unwrap();
        assert_ne!(before[1], after[1]);
        assert_eq!(before[2], after[2]);
    }
}

//! Small building blocks shared by the networks: MLP heads, a GRU cell,
//! scatter/pool helpers and single-sample losses.

use crate::config::Activation;
use candle_core::{DType, Device, Result, Tensor, D};
use candle_nn::{linear, Dropout, Linear, Module, VarBuilder};

/// Logit added to masked-out classes.
const MASKED_LOGIT: f32 = -1e9;

/// One- or two-layer perceptron.
///
/// With `hidden_size == 0` this is a single linear map; otherwise
/// `linear -> activation -> dropout -> linear`.
pub struct Mlp {
    first: Linear,
    second: Option<Linear>,
    activation: Activation,
    dropout: Dropout,
}

impl Mlp {
    pub fn new(
        in_features: usize,
        hidden_size: usize,
        out_features: usize,
        activation: Activation,
        dropout: f64,
        vb: VarBuilder,
    ) -> Result<Self> {
        let (first, second) = if hidden_size == 0 {
            (linear(in_features, out_features, vb.pp("0"))?, None)
        } else {
            (
                linear(in_features, hidden_size, vb.pp("0"))?,
                Some(linear(hidden_size, out_features, vb.pp("1"))?),
            )
        };
        Ok(Self {
            first,
            second,
            activation,
            dropout: Dropout::new(dropout as f32),
        })
    }

    /// Forward pass on a `(N, in_features)` matrix.
    pub fn forward(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        let h = self.first.forward(xs)?;
        match &self.second {
            None => Ok(h),
            Some(second) => {
                let h = self.activation.apply(&h)?;
                let h = self.dropout.forward(&h, train)?;
                second.forward(&h)
            }
        }
    }
}

/// Gated recurrent unit cell updating node states from aggregated messages.
///
/// ```text
/// z  = sigmoid(W_z [m || h])
/// r  = sigmoid(W_r [m || h])
/// n  = tanh(W_n m + r * (U_n h))
/// h' = (1 - z) * n + z * h
/// ```
pub struct GruCell {
    update: Linear,
    reset: Linear,
    input: Linear,
    hidden: Linear,
}

impl GruCell {
    pub fn new(size: usize, vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            update: linear(2 * size, size, vb.pp("update"))?,
            reset: linear(2 * size, size, vb.pp("reset"))?,
            input: linear(size, size, vb.pp("input"))?,
            hidden: linear(size, size, vb.pp("hidden"))?,
        })
    }

    /// One step: `messages` and `state` are both `(N, size)`.
    pub fn step(&self, messages: &Tensor, state: &Tensor) -> Result<Tensor> {
        let joint = Tensor::cat(&[messages, state], 1)?;
        let z = candle_nn::ops::sigmoid(&self.update.forward(&joint)?)?;
        let r = candle_nn::ops::sigmoid(&self.reset.forward(&joint)?)?;
        let n = (self.input.forward(messages)? + (r * self.hidden.forward(state)?)?)?.tanh()?;
        // (1 - z) * n + z * h  ==  n + z * (h - n)
        let delta = (state - &n)?;
        n + (z * delta)?
    }
}

/// `u32` index tensor.
pub fn index_tensor(ids: &[u32], device: &Device) -> Result<Tensor> {
    Tensor::new(ids, device)
}

/// Sum rows of `source` into `num_rows` buckets given by `ids`.
pub fn scatter_sum(source: &Tensor, ids: &Tensor, num_rows: usize) -> Result<Tensor> {
    let (_, cols) = source.dims2()?;
    Tensor::zeros((num_rows, cols), source.dtype(), source.device())?.index_add(ids, source, 0)
}

/// Mean of the rows belonging to each graph; empty graphs pool to zero.
pub fn mean_pool(xs: &Tensor, graph_ids: &[u32], num_graphs: usize) -> Result<Tensor> {
    let device = xs.device();
    let ids = index_tensor(graph_ids, device)?;
    let sums = scatter_sum(xs, &ids, num_graphs)?;
    let mut counts = vec![0f32; num_graphs];
    for &g in graph_ids {
        counts[g as usize] += 1.0;
    }
    let counts: Vec<f32> = counts.into_iter().map(|c| c.max(1.0)).collect();
    let counts = Tensor::from_vec(counts, (num_graphs, 1), device)?.to_dtype(xs.dtype())?;
    sums.broadcast_div(&counts)
}

/// Negative log-likelihood of `target` under `softmax(logits)`, where
/// `logits` is a vector and `allowed` optionally restricts the classes.
pub fn masked_nll(logits: &Tensor, allowed: Option<&[usize]>, target: usize) -> Result<Tensor> {
    let logits = apply_mask(logits, allowed)?;
    let log_probs = candle_nn::ops::log_softmax(&logits, D::Minus1)?;
    log_probs.get(target)?.neg()
}

/// Binary cross-entropy of a scalar logit, computed stably:
/// `max(x, 0) - x * y + log(1 + exp(-|x|))`.
pub fn bce_with_logit(logit: &Tensor, target: bool) -> Result<Tensor> {
    let y = if target { 1.0 } else { 0.0 };
    let softplus_tail = (logit.abs()?.neg()?.exp()? + 1.0)?.log()?;
    (logit.relu()? - (logit * y)?)? + softplus_tail
}

/// Index of the largest allowed logit.
pub fn masked_argmax(logits: &Tensor, allowed: Option<&[usize]>) -> Result<usize> {
    let values = logits.to_dtype(DType::F32)?.to_vec1::<f32>()?;
    let candidates: Box<dyn Iterator<Item = usize>> = match allowed {
        Some(allowed) => Box::new(allowed.iter().copied()),
        None => Box::new(0..values.len()),
    };
    candidates
        .filter(|&i| i < values.len())
        .max_by(|&a, &b| values[a].total_cmp(&values[b]))
        .ok_or_else(|| candle_core::Error::Msg("argmax over an empty candidate set".to_string()))
}

fn apply_mask(logits: &Tensor, allowed: Option<&[usize]>) -> Result<Tensor> {
    let Some(allowed) = allowed else {
        return Ok(logits.clone());
    };
    let n = logits.dim(0)?;
    let mut mask = vec![MASKED_LOGIT; n];
    for &i in allowed {
        if i < n {
            mask[i] = 0.0;
        }
    }
    let mask = Tensor::from_vec(mask, n, logits.device())?.to_dtype(logits.dtype())?;
    logits + mask
}

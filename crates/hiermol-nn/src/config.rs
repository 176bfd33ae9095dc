//! Model configuration.
//!
//! Everything that shapes the networks lives in [`AutoencoderConfig`], which
//! round-trips through JSON. Options for the per-level message-passing
//! networks are an explicit record ([`MpnOptions`]) rather than a free-form
//! keyword bag; unknown keys are rejected when parsing.
//!
//! ```rust
//! use hiermol_nn::config::{Activation, AttachPrediction, AutoencoderConfig, MpnModel};
//!
//! let config = AutoencoderConfig::default()
//!     .with_node_rep_size(32)
//!     .with_latent_size(8)
//!     .with_variational(true)
//!     .with_mpn_model(MpnModel::Gcn)
//!     .with_hidden_size(16);
//! config.validate().unwrap();
//!
//! assert_eq!(config.hidden_size(), 16);
//! assert_eq!("concat".parse::<AttachPrediction>().unwrap(), AttachPrediction::Concat);
//! assert_eq!("tanh".parse::<Activation>().unwrap(), Activation::Tanh);
//! ```

use crate::error::{Error, Result};
use candle_core::Tensor;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::str::FromStr;

/// Activation function used inside message passing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    #[default]
    Relu,
    Tanh,
    Sigmoid,
    Gelu,
    Silu,
    /// LeakyReLU with slope 0.01.
    LeakyRelu,
}

impl Activation {
    /// Apply elementwise.
    pub fn apply(self, xs: &Tensor) -> candle_core::Result<Tensor> {
        match self {
            Activation::Relu => xs.relu(),
            Activation::Tanh => xs.tanh(),
            Activation::Sigmoid => candle_nn::ops::sigmoid(xs),
            Activation::Gelu => xs.gelu(),
            Activation::Silu => xs.silu(),
            Activation::LeakyRelu => candle_nn::ops::leaky_relu(xs, 0.01),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Activation::Relu => "relu",
            Activation::Tanh => "tanh",
            Activation::Sigmoid => "sigmoid",
            Activation::Gelu => "gelu",
            Activation::Silu => "silu",
            Activation::LeakyRelu => "leaky_relu",
        }
    }
}

impl FromStr for Activation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "relu" => Ok(Activation::Relu),
            "tanh" => Ok(Activation::Tanh),
            "sigmoid" => Ok(Activation::Sigmoid),
            "gelu" => Ok(Activation::Gelu),
            "silu" => Ok(Activation::Silu),
            "leaky_relu" => Ok(Activation::LeakyRelu),
            other => Err(Error::InvalidConfig(format!("unknown activation: {other}"))),
        }
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How the decoder scores a candidate pair of atoms for attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachPrediction {
    /// MLP over the elementwise product of the two atom representations.
    #[default]
    Dot,
    /// MLP over the concatenation of the two atom representations.
    Concat,
}

impl FromStr for AttachPrediction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "dot" => Ok(AttachPrediction::Dot),
            "concat" => Ok(AttachPrediction::Concat),
            other => Err(Error::InvalidConfig(format!(
                "unknown attach prediction method: {other} (expected dot or concat)"
            ))),
        }
    }
}

impl fmt::Display for AttachPrediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttachPrediction::Dot => f.write_str("dot"),
            AttachPrediction::Concat => f.write_str("concat"),
        }
    }
}

/// Message-passing network run at each level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MpnModel {
    /// Gated recurrent message passing.
    #[default]
    RnnMpn,
    /// Graph convolution with edge messages.
    Gcn,
}

impl FromStr for MpnModel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "rnn_mpn" => Ok(MpnModel::RnnMpn),
            "gcn" => Ok(MpnModel::Gcn),
            other => Err(Error::InvalidConfig(format!("unknown mpn model: {other}"))),
        }
    }
}

impl fmt::Display for MpnModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MpnModel::RnnMpn => f.write_str("rnn_mpn"),
            MpnModel::Gcn => f.write_str("gcn"),
        }
    }
}

/// Options forwarded to every message-passing network.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MpnOptions {
    /// Hidden layer width of the MLPs (absent or 0: no hidden layer).
    pub hidden_size: Option<usize>,
}

/// Autoencoder configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AutoencoderConfig {
    /// Embedding and node representation size (default: 64).
    pub node_rep_size: usize,
    /// Latent vector size (default: 32).
    pub latent_size: usize,
    /// Activation inside message passing (default: relu).
    pub rep_activation: Activation,
    /// Message-passing rounds per level (default: 3).
    pub neighbor_hops: usize,
    /// Atom pair scoring (default: dot).
    pub attach_prediction_method: AttachPrediction,
    /// Dropout probability in MLPs and message passing (default: 0.0).
    pub dropout: f64,
    /// Predict mean/log-variance instead of latents directly (default: false).
    pub variational: bool,
    /// Message-passing network (default: rnn_mpn).
    pub mpn_model: MpnModel,
    /// Options for the message-passing networks.
    pub mpn: MpnOptions,
    /// Seed for reparameterization and prior sampling (None: from the OS).
    pub seed: Option<u64>,
}

impl Default for AutoencoderConfig {
    fn default() -> Self {
        Self {
            node_rep_size: 64,
            latent_size: 32,
            rep_activation: Activation::Relu,
            neighbor_hops: 3,
            attach_prediction_method: AttachPrediction::Dot,
            dropout: 0.0,
            variational: false,
            mpn_model: MpnModel::RnnMpn,
            mpn: MpnOptions::default(),
            seed: None,
        }
    }
}

impl AutoencoderConfig {
    pub fn with_node_rep_size(mut self, size: usize) -> Self {
        self.node_rep_size = size;
        self
    }

    pub fn with_latent_size(mut self, size: usize) -> Self {
        self.latent_size = size;
        self
    }

    pub fn with_rep_activation(mut self, activation: Activation) -> Self {
        self.rep_activation = activation;
        self
    }

    pub fn with_neighbor_hops(mut self, hops: usize) -> Self {
        self.neighbor_hops = hops;
        self
    }

    pub fn with_attach_prediction(mut self, method: AttachPrediction) -> Self {
        self.attach_prediction_method = method;
        self
    }

    pub fn with_dropout(mut self, dropout: f64) -> Self {
        self.dropout = dropout;
        self
    }

    pub fn with_variational(mut self, variational: bool) -> Self {
        self.variational = variational;
        self
    }

    pub fn with_mpn_model(mut self, model: MpnModel) -> Self {
        self.mpn_model = model;
        self
    }

    pub fn with_hidden_size(mut self, hidden_size: usize) -> Self {
        self.mpn.hidden_size = Some(hidden_size);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Hidden size handed to encoder and decoder MLPs (0 when unset).
    pub fn hidden_size(&self) -> usize {
        self.mpn.hidden_size.unwrap_or(0)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.node_rep_size == 0 {
            return Err(Error::InvalidConfig("node_rep_size must be positive".to_string()));
        }
        if self.latent_size == 0 {
            return Err(Error::InvalidConfig("latent_size must be positive".to_string()));
        }
        if self.neighbor_hops == 0 {
            return Err(Error::InvalidConfig("neighbor_hops must be at least 1".to_string()));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(Error::InvalidConfig(format!(
                "dropout must be in [0, 1), got {}",
                self.dropout
            )));
        }
        Ok(())
    }

    /// Read from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path).map_err(hiermol_core::Error::from)?;
        serde_json::from_reader(BufReader::new(file))
            .map_err(|e| Error::InvalidConfig(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        AutoencoderConfig::default().validate().unwrap();
        assert_eq!(AutoencoderConfig::default().hidden_size(), 0);
    }

    #[test]
    fn test_range_checks() {
        let base = AutoencoderConfig::default();
        assert!(base.clone().with_neighbor_hops(0).validate().is_err());
        assert!(base.clone().with_dropout(1.0).validate().is_err());
        assert!(base.clone().with_dropout(-0.1).validate().is_err());
        assert!(base.clone().with_latent_size(0).validate().is_err());
        assert!(base.with_node_rep_size(0).validate().is_err());
    }

    #[test]
    fn test_parse_options() {
        assert_eq!("gcn".parse::<MpnModel>().unwrap(), MpnModel::Gcn);
        assert_eq!("rnn_mpn".parse::<MpnModel>().unwrap(), MpnModel::RnnMpn);
        assert!(matches!(
            "cosine".parse::<AttachPrediction>(),
            Err(Error::InvalidConfig(_))
        ));
        assert!("softmax".parse::<Activation>().is_err());
        for activation in [Activation::Relu, Activation::LeakyRelu, Activation::Silu] {
            assert_eq!(activation.to_string().parse::<Activation>().unwrap(), activation);
        }
    }

    #[test]
    fn test_json() {
        let json = r#"{
            "node_rep_size": 4,
            "latent_size": 2,
            "rep_activation": "tanh",
            "neighbor_hops": 1,
            "attach_prediction_method": "concat",
            "variational": true,
            "mpn_model": "gcn",
            "mpn": {"hidden_size": 8}
        }"#;
        let config: AutoencoderConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.node_rep_size, 4);
        assert_eq!(config.rep_activation, Activation::Tanh);
        assert_eq!(config.attach_prediction_method, AttachPrediction::Concat);
        assert_eq!(config.hidden_size(), 8);
        assert_eq!(config.dropout, 0.0);

        let unknown = r#"{"mpn": {"hidden_size": 8, "heads": 2}}"#;
        assert!(serde_json::from_str::<AutoencoderConfig>(unknown).is_err());
        let bad_method = r#"{"attach_prediction_method": "cosine"}"#;
        assert!(serde_json::from_str::<AutoencoderConfig>(bad_method).is_err());
    }

    #[test]
    fn test_activation_apply() {
        let device = candle_core::Device::Cpu;
        let xs = Tensor::new(&[-1f32, 0.0, 2.0], &device).unwrap();
        let relu = Activation::Relu.apply(&xs).unwrap().to_vec1::<f32>().unwrap();
        assert_eq!(relu, vec![0.0, 0.0, 2.0]);
        let leaky = Activation::LeakyRelu.apply(&xs).unwrap().to_vec1::<f32>().unwrap();
        assert!((leaky[0] + 0.01).abs() < 1e-6);
        let sig = Activation::Sigmoid.apply(&xs).unwrap().to_vec1::<f32>().unwrap();
        assert!((sig[1] - 0.5).abs() < 1e-6);
    }
}

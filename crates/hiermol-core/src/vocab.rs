//! Per-level vocabularies.
//!
//! A vocabulary lists the discrete node labels and edge labels of one level.
//! Vocabularies are built by preprocessing and are immutable afterwards; the
//! networks only need their sizes plus two pieces of metadata:
//!
//! - `max_num_atoms` on the motif level sizes the positional embedding.
//! - `parent` on the attachment_config level maps every attachment
//!   configuration to the motif it belongs to.
//!
//! # Example
//!
//! ```rust
//! use hiermol_core::{Level, Vocab, Vocabs};
//!
//! let mut vocabs = Vocabs::new();
//! vocabs.insert(Level::Atom, Vocab::new(["C", "O"], ["single"]));
//! vocabs.insert(
//!     Level::AttachmentConfig,
//!     Vocab::new(["C-O:0"], ["attaches to"]).with_parents(vec![0]),
//! );
//! vocabs.insert(
//!     Level::Motif,
//!     Vocab::new(["C-O"], ["attaches to"]).with_max_num_atoms(2),
//! );
//!
//! vocabs.validate().unwrap();
//! assert_eq!(vocabs.max_num_atoms().unwrap(), 2);
//! ```

use crate::error::{Error, Result};
use crate::level::Level;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Vocabulary of one level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vocab {
    /// Node labels.
    pub node: Vec<String>,
    /// Edge labels.
    pub edge: Vec<String>,
    /// Largest motif size in atoms (motif level only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_num_atoms: Option<usize>,
    /// Motif index of each node label (attachment_config level only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parent: Vec<usize>,
}

impl Vocab {
    /// Create a vocabulary from node and edge labels.
    pub fn new<N, E>(node: N, edge: E) -> Self
    where
        N: IntoIterator,
        N::Item: Into<String>,
        E: IntoIterator,
        E::Item: Into<String>,
    {
        Self {
            node: node.into_iter().map(Into::into).collect(),
            edge: edge.into_iter().map(Into::into).collect(),
            max_num_atoms: None,
            parent: Vec::new(),
        }
    }

    pub fn with_max_num_atoms(mut self, max_num_atoms: usize) -> Self {
        self.max_num_atoms = Some(max_num_atoms);
        self
    }

    pub fn with_parents(mut self, parent: Vec<usize>) -> Self {
        self.parent = parent;
        self
    }

    /// Number of node labels.
    pub fn num_nodes(&self) -> usize {
        self.node.len()
    }

    /// Number of edge labels.
    pub fn num_edges(&self) -> usize {
        self.edge.len()
    }
}

/// Vocabularies keyed by level name.
///
/// Kept as an open mapping (rather than three fields) so that a malformed
/// input with too many or too few entries is representable and rejected by
/// [`Vocabs::validate`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Vocabs(BTreeMap<String, Vocab>);

impl Vocabs {
    /// Create an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert the vocabulary of a level.
    pub fn insert(&mut self, level: Level, vocab: Vocab) -> Option<Vocab> {
        self.0.insert(level.node_type().to_string(), vocab)
    }

    /// Insert under an arbitrary name.
    pub fn insert_named(&mut self, name: impl Into<String>, vocab: Vocab) -> Option<Vocab> {
        self.0.insert(name.into(), vocab)
    }

    /// Number of vocabularies.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over (name, vocab) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Vocab)> {
        self.0.iter().map(|(name, vocab)| (name.as_str(), vocab))
    }

    /// Vocabulary of a level.
    pub fn get(&self, level: Level) -> Result<&Vocab> {
        self.0
            .get(level.node_type())
            .ok_or_else(|| Error::MissingVocab(level.node_type().to_string()))
    }

    /// Number of node labels at a level.
    pub fn num_nodes(&self, level: Level) -> Result<usize> {
        Ok(self.get(level)?.num_nodes())
    }

    /// Number of edge labels at a level.
    pub fn num_edges(&self, level: Level) -> Result<usize> {
        Ok(self.get(level)?.num_edges())
    }

    /// Positional embedding size, read from the motif vocabulary.
    pub fn max_num_atoms(&self) -> Result<usize> {
        self.get(Level::Motif)?
            .max_num_atoms
            .ok_or_else(|| Error::InvalidVocab("motif vocab has no max_num_atoms".to_string()))
    }

    /// Attachment configurations belonging to a motif label.
    pub fn attachments_of_motif(&self, motif: usize) -> Result<Vec<usize>> {
        let vocab = self.get(Level::AttachmentConfig)?;
        Ok(vocab
            .parent
            .iter()
            .enumerate()
            .filter_map(|(config, &parent)| (parent == motif).then_some(config))
            .collect())
    }

    /// Check the mapping against the fixed three-level schema.
    ///
    /// The entry count is checked first, so a mapping of the wrong size is
    /// always reported as [`Error::VocabCountMismatch`].
    pub fn validate(&self) -> Result<()> {
        if self.len() != Level::COUNT {
            return Err(Error::VocabCountMismatch {
                expected: Level::COUNT,
                got: self.len(),
            });
        }

        for level in Level::ALL {
            let vocab = self.get(level)?;
            if vocab.node.is_empty() {
                return Err(Error::InvalidVocab(format!("{level} vocab has no node labels")));
            }
            if vocab.edge.is_empty() {
                return Err(Error::InvalidVocab(format!("{level} vocab has no edge labels")));
            }
        }

        if self.max_num_atoms()? == 0 {
            return Err(Error::InvalidVocab("max_num_atoms must be at least 1".to_string()));
        }

        let num_motifs = self.num_nodes(Level::Motif)?;
        let attachments = self.get(Level::AttachmentConfig)?;
        if attachments.parent.len() != attachments.num_nodes() {
            return Err(Error::InvalidVocab(format!(
                "attachment_config vocab has {} parents for {} entries",
                attachments.parent.len(),
                attachments.num_nodes()
            )));
        }
        if let Some(&bad) = attachments.parent.iter().find(|&&p| p >= num_motifs) {
            return Err(Error::InvalidVocab(format!(
                "attachment_config parent {bad} out of range for {num_motifs} motifs"
            )));
        }

        Ok(())
    }

    /// Read vocabularies from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Write vocabularies to a JSON file.
    pub fn to_json_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> Vocabs {
        let mut vocabs = Vocabs::new();
        vocabs.insert(Level::Atom, Vocab::new(["C", "N"], ["single"]));
        vocabs.insert(
            Level::AttachmentConfig,
            Vocab::new(["C:0"], ["attaches to"]).with_parents(vec![0]),
        );
        vocabs.insert(
            Level::Motif,
            Vocab::new(["C"], ["attaches to"]).with_max_num_atoms(1),
        );
        vocabs
    }

    #[test]
    fn test_minimal_is_valid() {
        let vocabs = minimal();
        vocabs.validate().unwrap();
        assert_eq!(vocabs.num_nodes(Level::Atom).unwrap(), 2);
        assert_eq!(vocabs.num_edges(Level::Atom).unwrap(), 1);
        assert_eq!(vocabs.attachments_of_motif(0).unwrap(), vec![0]);
    }

    #[test]
    fn test_count_mismatch_checked_first() {
        let mut vocabs = minimal();
        vocabs.insert_named("extra", Vocab::default());
        assert!(matches!(
            vocabs.validate(),
            Err(Error::VocabCountMismatch { expected: 3, got: 4 })
        ));

        let mut two = Vocabs::new();
        two.insert(Level::Atom, Vocab::default());
        two.insert(Level::Motif, Vocab::default());
        assert!(matches!(
            two.validate(),
            Err(Error::VocabCountMismatch { expected: 3, got: 2 })
        ));
    }

    #[test]
    fn test_missing_level() {
        let mut vocabs = minimal();
        let motif = vocabs.0.remove("motif").unwrap();
        vocabs.insert_named("motifs", motif);
        assert!(matches!(vocabs.validate(), Err(Error::MissingVocab(name)) if name == "motif"));
    }

    #[test]
    fn test_motif_needs_max_num_atoms() {
        let mut vocabs = minimal();
        vocabs.insert(Level::Motif, Vocab::new(["C"], ["attaches to"]));
        assert!(matches!(vocabs.validate(), Err(Error::InvalidVocab(_))));
    }

    #[test]
    fn test_attachment_parent_out_of_range() {
        let mut vocabs = minimal();
        vocabs.insert(
            Level::AttachmentConfig,
            Vocab::new(["C:0"], ["attaches to"]).with_parents(vec![3]),
        );
        assert!(matches!(vocabs.validate(), Err(Error::InvalidVocab(_))));
    }

    #[test]
    fn test_json_shape() {
        let json = r#"{
            "atom": {"node": ["C", "N"], "edge": ["single"]},
            "attachment_config": {"node": ["C:0"], "edge": ["attaches to"], "parent": [0]},
            "motif": {"node": ["C"], "edge": ["attaches to"], "max_num_atoms": 1}
        }"#;
        let vocabs: Vocabs = serde_json::from_str(json).unwrap();
        assert_eq!(vocabs, minimal());
    }
}

//! The three fixed levels of a hierarchical molecular graph.
//!
//! Each level is a canonical `(node_type, relation, node_type)` triple, the
//! same shape PyG uses for heterogeneous edge types:
//!
//! | Level | Triple |
//! |-------|--------|
//! | [`Level::Atom`] | `atom - bond - atom` |
//! | [`Level::AttachmentConfig`] | `attachment_config - attaches to - attachment_config` |
//! | [`Level::Motif`] | `motif - attaches to - motif` |

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One layer of the hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    /// Atoms joined by bonds.
    Atom,
    /// Attachment configurations (a motif plus the atoms it attaches with).
    AttachmentConfig,
    /// Motifs joined where they attach.
    Motif,
}

impl Level {
    /// All levels, bottom-up.
    pub const ALL: [Level; 3] = [Level::Atom, Level::AttachmentConfig, Level::Motif];

    /// Number of levels.
    pub const COUNT: usize = 3;

    /// Node type name; also the key of this level's vocabulary.
    pub fn node_type(self) -> &'static str {
        match self {
            Level::Atom => "atom",
            Level::AttachmentConfig => "attachment_config",
            Level::Motif => "motif",
        }
    }

    /// Relation name of the level's edges.
    pub fn relation(self) -> &'static str {
        match self {
            Level::Atom => "bond",
            Level::AttachmentConfig | Level::Motif => "attaches to",
        }
    }

    /// Canonical edge type triple.
    pub fn edge_type(self) -> (&'static str, &'static str, &'static str) {
        (self.node_type(), self.relation(), self.node_type())
    }

    /// Position of the level in [`Level::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.node_type())
    }
}

impl FromStr for Level {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Level::ALL
            .into_iter()
            .find(|level| level.node_type() == s)
            .ok_or_else(|| Error::UnknownLevel(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_are_fixed() {
        assert_eq!(Level::ALL.len(), Level::COUNT);
        assert_eq!(Level::Atom.edge_type(), ("atom", "bond", "atom"));
        assert_eq!(
            Level::AttachmentConfig.edge_type(),
            ("attachment_config", "attaches to", "attachment_config")
        );
        assert_eq!(Level::Motif.edge_type(), ("motif", "attaches to", "motif"));
    }

    #[test]
    fn test_parse_level() {
        for level in Level::ALL {
            assert_eq!(level.node_type().parse::<Level>().unwrap(), level);
        }
        assert!(matches!(
            "position".parse::<Level>(),
            Err(Error::UnknownLevel(_))
        ));
    }
}

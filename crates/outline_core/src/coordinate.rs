use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Position of one leaf node in the outline.
///
/// Indices are 0-based and drive ordering; ordinals are 1-based and are what
/// prompts and bounds checks talk about. Simple branches have a single
/// virtual node with both ordinals left at 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeCoordinate {
    pub branch_name: String,
    pub branch_index: usize,
    #[serde(default)]
    pub section_index: usize,
    #[serde(default)]
    pub subsection_index: usize,
    #[serde(default)]
    pub section_ordinal: usize,
    #[serde(default)]
    pub subsection_ordinal: usize,
    #[serde(default)]
    pub is_simple_node: bool,
    /// Current text of a simple node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl NodeCoordinate {
    pub fn complex(
        branch_name: impl Into<String>,
        branch_index: usize,
        section_index: usize,
        subsection_index: usize,
    ) -> Self {
        Self {
            branch_name: branch_name.into(),
            branch_index,
            section_index,
            subsection_index,
            section_ordinal: section_index + 1,
            subsection_ordinal: subsection_index + 1,
            is_simple_node: false,
            content: None,
        }
    }

    pub fn simple(branch_name: impl Into<String>, branch_index: usize, content: impl Into<String>) -> Self {
        Self {
            branch_name: branch_name.into(),
            branch_index,
            section_index: 0,
            subsection_index: 0,
            section_ordinal: 0,
            subsection_ordinal: 0,
            is_simple_node: true,
            content: Some(content.into()),
        }
    }

    pub fn sort_key(&self) -> (usize, usize, usize) {
        (self.branch_index, self.section_index, self.subsection_index)
    }

    /// Whether both coordinates address the same node.
    pub fn same_node(&self, other: &NodeCoordinate) -> bool {
        if self.branch_name != other.branch_name || self.is_simple_node != other.is_simple_node {
            return false;
        }
        self.is_simple_node
            || (self.section_ordinal == other.section_ordinal
                && self.subsection_ordinal == other.subsection_ordinal)
    }

    /// Stable id derived from the node position, identical across runs.
    pub fn detail_id(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.branch_name.as_bytes());
        hasher.update(b"\0");
        if self.is_simple_node {
            hasher.update(b"simple");
        } else {
            hasher.update(format!("{}.{}", self.section_ordinal, self.subsection_ordinal).as_bytes());
        }
        let digest = hasher.finalize();
        hex::encode(&digest[..8])
    }

    /// Short label for logs, e.g. `Plan-2-1`.
    pub fn label(&self) -> String {
        if self.is_simple_node {
            self.branch_name.clone()
        } else {
            format!(
                "{}-{}-{}",
                self.branch_name, self.section_ordinal, self.subsection_ordinal
            )
        }
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            branch_index: self.branch_index,
            section_index: self.section_index,
            subsection_index: self.subsection_index,
        }
    }
}

/// Where a traversal starts (or resumes).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    #[serde(default)]
    pub branch_index: usize,
    #[serde(default)]
    pub section_index: usize,
    #[serde(default)]
    pub subsection_index: usize,
}

impl Checkpoint {
    pub fn new(branch_index: usize, section_index: usize, subsection_index: usize) -> Self {
        Self {
            branch_index,
            section_index,
            subsection_index,
        }
    }

    pub fn is_start(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complex_coordinate_ordinals_follow_indices() {
        let coord = NodeCoordinate::complex("Plan", 2, 1, 0);
        assert_eq!(coord.section_ordinal, 2);
        assert_eq!(coord.subsection_ordinal, 1);
        assert_eq!(coord.sort_key(), (2, 1, 0));
        assert_eq!(coord.label(), "Plan-2-1");
    }

    #[test]
    fn detail_id_is_stable_and_position_specific() {
        let a = NodeCoordinate::complex("Plan", 0, 0, 1);
        let b = NodeCoordinate::complex("Plan", 0, 0, 1);
        let c = NodeCoordinate::complex("Plan", 0, 1, 0);
        assert_eq!(a.detail_id(), b.detail_id());
        assert_ne!(a.detail_id(), c.detail_id());
        assert_eq!(a.detail_id().len(), 16);
    }

    #[test]
    fn simple_nodes_match_by_branch_only() {
        let a = NodeCoordinate::simple("Summary", 3, "old");
        let b = NodeCoordinate::simple("Summary", 3, "new");
        assert!(a.same_node(&b));
        assert!(!a.same_node(&NodeCoordinate::complex("Summary", 3, 0, 0)));
    }

    #[test]
    fn coordinate_serializes_camel_case() {
        let value = serde_json::to_value(NodeCoordinate::complex("Plan", 1, 0, 0)).unwrap();
        assert_eq!(value["branchName"], "Plan");
        assert_eq!(value["sectionOrdinal"], 1);
        assert!(value.get("content").is_none());
    }
}

//! Traversal order over the leaves of an outline.

use outline_core::{BranchValue, Checkpoint, Dialect, NodeCoordinate, OutlineTree};

use crate::error::{EngineError, Result};

/// Yields node coordinates in traversal order starting at a checkpoint.
///
/// Branches follow the dialect's `branchNames`; a complex branch yields its
/// sections and subsections, a simple branch yields one node. Only the first
/// section and subsection visited honour the checkpoint, every later one
/// starts at 0. Branches missing from the tree are skipped.
#[derive(Debug, Clone)]
pub struct CoordinateWalker<'a> {
    tree: &'a OutlineTree,
    dialect: &'a Dialect,
    branch_index: usize,
    section_index: usize,
    subsection_index: usize,
}

impl<'a> CoordinateWalker<'a> {
    /// Fails when the checkpoint points past the end of a complex branch.
    /// A checkpoint past the last branch yields nothing.
    pub fn new(tree: &'a OutlineTree, dialect: &'a Dialect, start: Checkpoint) -> Result<Self> {
        let resumes_inside = start.section_index > 0 || start.subsection_index > 0;
        if let Some((name, sections)) = dialect
            .branch_names
            .get(start.branch_index)
            .and_then(|name| tree.sections(name).map(|sections| (name, sections)))
            .filter(|_| resumes_inside)
        {
            let section = sections.get(start.section_index).ok_or_else(|| {
                EngineError::CoordinateOutOfRange {
                    branch: name.clone(),
                    level: "section",
                    index: start.section_index + 1,
                    bound: sections.len(),
                }
            })?;
            if start.subsection_index > 0 && start.subsection_index >= section.content.len() {
                return Err(EngineError::CoordinateOutOfRange {
                    branch: name.clone(),
                    level: "subsection",
                    index: start.subsection_index + 1,
                    bound: section.content.len(),
                });
            }
        }

        Ok(Self {
            tree,
            dialect,
            branch_index: start.branch_index,
            section_index: start.section_index,
            subsection_index: start.subsection_index,
        })
    }

    fn next_branch(&mut self) {
        self.branch_index += 1;
        self.section_index = 0;
        self.subsection_index = 0;
    }
}

impl Iterator for CoordinateWalker<'_> {
    type Item = NodeCoordinate;

    fn next(&mut self) -> Option<NodeCoordinate> {
        let (tree, dialect) = (self.tree, self.dialect);
        loop {
            let name = dialect.branch_names.get(self.branch_index)?;
            let Some(branch) = tree.branch(name) else {
                self.next_branch();
                continue;
            };

            match &branch.value {
                BranchValue::ComplexSections(sections) => {
                    while let Some(section) = sections.get(self.section_index) {
                        if self.subsection_index < section.content.len() {
                            let coordinate = NodeCoordinate::complex(
                                name.as_str(),
                                self.branch_index,
                                self.section_index,
                                self.subsection_index,
                            );
                            self.subsection_index += 1;
                            return Some(coordinate);
                        }
                        self.section_index += 1;
                        self.subsection_index = 0;
                    }
                    self.next_branch();
                }
                simple => {
                    let coordinate =
                        NodeCoordinate::simple(name.as_str(), self.branch_index, simple.as_text());
                    self.next_branch();
                    return Some(coordinate);
                }
            }
        }
    }
}

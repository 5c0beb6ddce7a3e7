use super::node::{Node, NodeId};
use crate::error::LevelGradError;

/// Computes the height of a new operator from the heights of its operands.
///
/// Leaves sit at height `0`, so an operator is one above its tallest operand. Operators
/// without operands land at height `1`.
pub(crate) fn operator_height(operand_heights: impl IntoIterator<Item = usize>) -> usize {
    1 + operand_heights.into_iter().max().unwrap_or(0)
}

/// Node ids grouped into levels of equal height.
///
/// `groups()[h]` holds every node of height `h` in ascending id order. Nodes in one group
/// have no dependency on each other, so a scheduler may evaluate them concurrently as
/// long as every lower (forward) or higher (backward) group has been completed first.
///
/// The index is derived state: it is built from the heights recorded in the ledger and
/// remembers the ledger length it was built for, so a scheduler can detect a stale
/// cache instead of traversing the wrong groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeightIndex {
    groups: Vec<Vec<NodeId>>,
    indexed_len: usize,
}

impl HeightIndex {
    pub(crate) fn build(ledger: &[Node]) -> Self {
        let max_height = ledger.iter().map(Node::height).max();
        let mut groups: Vec<Vec<NodeId>> = match max_height {
            Some(h) => vec![Vec::new(); h + 1],
            None => Vec::new(),
        };
        // Ledger order keeps ids ascending inside each group.
        for node in ledger {
            groups[node.height()].push(node.id());
        }
        HeightIndex {
            groups,
            indexed_len: ledger.len(),
        }
    }

    pub fn groups(&self) -> &[Vec<NodeId>] {
        &self.groups
    }

    /// Number of levels (highest height + 1).
    pub fn num_levels(&self) -> usize {
        self.groups.len()
    }

    /// Number of ledger entries the index was built from.
    pub fn indexed_len(&self) -> usize {
        self.indexed_len
    }

    /// Fails with `StaleHeightIndex` unless the index covers exactly `ledger_len` nodes.
    pub fn ensure_fresh(&self, ledger_len: usize) -> Result<(), LevelGradError> {
        if self.indexed_len != ledger_len {
            return Err(LevelGradError::StaleHeightIndex {
                indexed: self.indexed_len,
                actual: ledger_len,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "height_test.rs"]
mod tests;

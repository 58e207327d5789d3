use slotmap::{SecondaryMap, SlotMap, new_key_type};
use std::collections::{HashMap, HashSet};
use std::fmt::Write;
use thiserror::Error;

new_key_type! {
    pub struct NodeId;
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum TreeError {
    #[error("Tree leaf '{0}' does not name any sequence in the alignment")]
    LeafNotInAlignment(String),
    #[error("Sequence '{0}' is not a leaf of the tree")]
    SequenceNotInTree(String),
    #[error("Leaf name '{0}' occurs more than once in the tree")]
    DuplicateLeaf(String),
    #[error("Node is not part of this tree")]
    UnknownNode,
    #[error("Node already has a parent")]
    AlreadyAttached,
    #[error("A balanced tree needs at least one leaf")]
    NoLeaves,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    pub name: Option<String>,
    /// Length of the branch leading to this node from its parent.
    pub branch_length: f64,
    pub parent: Option<NodeId>,
    pub children: Option<(NodeId, NodeId)>,
}

impl TreeNode {
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }
}

/// Incrementally assembles a strictly binary tree bottom-up.
#[derive(Debug, Default)]
pub struct PhyloTreeBuilder {
    nodes: SlotMap<NodeId, TreeNode>,
}

impl PhyloTreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_leaf(&mut self, name: impl Into<String>, branch_length: f64) -> NodeId {
        self.nodes.insert(TreeNode {
            name: Some(name.into()),
            branch_length,
            parent: None,
            children: None,
        })
    }

    pub fn join(&mut self, left: NodeId, right: NodeId, branch_length: f64) -> Result<NodeId, TreeError> {
        for child in [left, right] {
            let node = self.nodes.get(child).ok_or(TreeError::UnknownNode)?;
            if node.parent.is_some() {
                return Err(TreeError::AlreadyAttached);
            }
        }
        let id = self.nodes.insert(TreeNode {
            name: None,
            branch_length,
            parent: None,
            children: Some((left, right)),
        });
        self.nodes[left].parent = Some(id);
        self.nodes[right].parent = Some(id);
        Ok(id)
    }

    pub fn set_branch_length(&mut self, node: NodeId, branch_length: f64) -> Result<(), TreeError> {
        self.nodes
            .get_mut(node)
            .ok_or(TreeError::UnknownNode)?
            .branch_length = branch_length;
        Ok(())
    }

    /// Finalizes the tree. The root's own branch length is discarded.
    pub fn build(mut self, root: NodeId) -> Result<PhyloTree, TreeError> {
        let node = self.nodes.get_mut(root).ok_or(TreeError::UnknownNode)?;
        if node.parent.is_some() {
            return Err(TreeError::AlreadyAttached);
        }
        node.branch_length = 0.0;

        let tree = PhyloTree {
            nodes: self.nodes,
            root,
        };
        let mut seen = HashSet::new();
        for leaf in tree.leaves() {
            if let Some(name) = tree.nodes[leaf].name.as_deref() {
                if !seen.insert(name.to_string()) {
                    return Err(TreeError::DuplicateLeaf(name.to_string()));
                }
            }
        }
        Ok(tree)
    }
}

/// A rooted binary phylogeny stored in an arena.
#[derive(Debug, Clone)]
pub struct PhyloTree {
    nodes: SlotMap<NodeId, TreeNode>,
    root: NodeId,
}

impl PhyloTree {
    /// Balanced tree with `leaves` leaves named "1", "2", ... and the total length
    /// spread evenly over all branches.
    pub fn balanced(leaves: usize, total_length: f64) -> Result<Self, TreeError> {
        if leaves == 0 {
            return Err(TreeError::NoLeaves);
        }
        let per_branch = if leaves > 1 {
            total_length / (2 * (leaves - 1)) as f64
        } else {
            0.0
        };
        let mut builder = PhyloTreeBuilder::new();
        let mut counter = 0;
        let root = grow_balanced(&mut builder, leaves, per_branch, &mut counter)?;
        builder.build(root)
    }

    #[inline]
    pub fn root(&self) -> NodeId {
        self.root
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &TreeNode {
        &self.nodes[id]
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &TreeNode)> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Leaves in left-to-right order.
    pub fn leaves(&self) -> Vec<NodeId> {
        let mut leaves = Vec::new();
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            match self.nodes[id].children {
                Some((left, right)) => {
                    stack.push(right);
                    stack.push(left);
                }
                None => leaves.push(id),
            }
        }
        leaves
    }

    pub fn leaf_names(&self) -> Vec<String> {
        self.leaves()
            .into_iter()
            .map(|id| self.nodes[id].name.clone().unwrap_or_default())
            .collect()
    }

    /// Sum of all branch lengths.
    pub fn total_length(&self) -> f64 {
        self.nodes.values().map(|n| n.branch_length).sum()
    }

    /// Maps every leaf to the index of the equally named sequence.
    ///
    /// Fails if a leaf names no sequence or a sequence has no leaf.
    pub fn map_leaves(&self, sequence_names: &[String]) -> Result<SecondaryMap<NodeId, usize>, TreeError> {
        let index: HashMap<&str, usize> = sequence_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect();
        let mut mapping = SecondaryMap::new();
        let mut covered = HashSet::new();
        for leaf in self.leaves() {
            let name = self.nodes[leaf].name.clone().unwrap_or_default();
            let seq = *index
                .get(name.as_str())
                .ok_or_else(|| TreeError::LeafNotInAlignment(name.clone()))?;
            mapping.insert(leaf, seq);
            covered.insert(seq);
        }
        if let Some(missing) = (0..sequence_names.len()).find(|i| !covered.contains(i)) {
            return Err(TreeError::SequenceNotInTree(sequence_names[missing].clone()));
        }
        Ok(mapping)
    }

    pub fn newick_string(&self) -> String {
        let mut out = String::new();
        self.write_newick(self.root, &mut out);
        out
    }

    fn write_newick(&self, id: NodeId, out: &mut String) {
        let node = &self.nodes[id];
        match node.children {
            None => {
                let _ = write!(out, "{}:{}", node.name.as_deref().unwrap_or(""), node.branch_length);
            }
            Some((left, right)) => {
                out.push('(');
                self.write_newick(left, out);
                out.push(',');
                self.write_newick(right, out);
                out.push(')');
                if node.parent.is_some() {
                    let _ = write!(out, ":{}", node.branch_length);
                } else {
                    out.push(';');
                }
            }
        }
    }
}

fn grow_balanced(
    builder: &mut PhyloTreeBuilder,
    leaves: usize,
    per_branch: f64,
    counter: &mut usize,
) -> Result<NodeId, TreeError> {
    if leaves == 1 {
        *counter += 1;
        return Ok(builder.add_leaf(counter.to_string(), per_branch));
    }
    let left_leaves = leaves / 2 + leaves % 2;
    let right_leaves = leaves / 2;
    let left = grow_balanced(builder, left_leaves, per_branch, counter)?;
    let right = grow_balanced(builder, right_leaves, per_branch, counter)?;
    builder.join(left, right, per_branch)
}

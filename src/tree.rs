//! Arena representation of nested records such as categories and menus.
//!
//! Items reference their parent by id. Building the tree checks for
//! duplicate ids and cycles up front, and every traversal afterwards is
//! iterative, so malformed or very deep data cannot overflow the stack.

use std::collections::{HashMap, HashSet};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
  #[error("duplicate node id {0}")]
  DuplicateId(u64),

  #[error("parent chain of node {0} loops back on itself")]
  Cycle(u64),

  #[error("node {0} not found")]
  NotFound(u64),

  #[error("moving node {node} under {parent} would create a cycle")]
  WouldCycle { node: u64, parent: u64 },
}

#[derive(Debug, Clone)]
struct Node<T> {
  id: u64,
  parent: Option<usize>,
  children: Vec<usize>,
  item: T,
}

/// A node visited by [`Tree::flatten`]
#[derive(Debug, Clone, Copy)]
pub struct FlatNode<'a, T> {
  pub id: u64,
  pub depth: usize,
  pub item: &'a T,
}

#[derive(Debug, Clone)]
pub struct Tree<T> {
  nodes: Vec<Node<T>>,
  index: HashMap<u64, usize>,
  roots: Vec<usize>,
}

impl<T> Tree<T> {
  /// Build a tree from items in any order.
  ///
  /// Items whose parent is missing become roots. Children keep the order in
  /// which they appear in `items`.
  pub fn build<I, F, P>(items: I, id_of: F, parent_of: P) -> Result<Self, TreeError>
  where
    I: IntoIterator<Item = T>,
    F: Fn(&T) -> u64,
    P: Fn(&T) -> Option<u64>,
  {
    let mut nodes = Vec::new();
    let mut parent_ids = Vec::new();
    let mut index = HashMap::new();

    for item in items {
      let id = id_of(&item);
      if index.insert(id, nodes.len()).is_some() {
        return Err(TreeError::DuplicateId(id));
      }
      parent_ids.push(parent_of(&item));
      nodes.push(Node {
        id,
        parent: None,
        children: Vec::new(),
        item,
      });
    }

    let mut roots = Vec::new();
    for (slot, parent_id) in parent_ids.into_iter().enumerate() {
      match parent_id.and_then(|pid| index.get(&pid).copied()) {
        Some(parent) if parent == slot => return Err(TreeError::Cycle(nodes[slot].id)),
        Some(parent) => {
          nodes[slot].parent = Some(parent);
          nodes[parent].children.push(slot);
        }
        None => roots.push(slot),
      }
    }

    let tree = Self { nodes, index, roots };
    tree.check_reachable()?;
    Ok(tree)
  }

  /// Every node must be reachable from a root; the ones that are not sit on
  /// a parent cycle.
  fn check_reachable(&self) -> Result<(), TreeError> {
    let mut seen = vec![false; self.nodes.len()];
    let mut stack: Vec<usize> = self.roots.clone();
    while let Some(slot) = stack.pop() {
      if seen[slot] {
        continue;
      }
      seen[slot] = true;
      stack.extend(self.nodes[slot].children.iter().copied());
    }

    match seen.iter().position(|visited| !visited) {
      Some(slot) => Err(TreeError::Cycle(self.nodes[slot].id)),
      None => Ok(()),
    }
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  pub fn contains(&self, id: u64) -> bool {
    self.index.contains_key(&id)
  }

  pub fn get(&self, id: u64) -> Option<&T> {
    self.slot(id).map(|slot| &self.nodes[slot].item)
  }

  pub fn roots(&self) -> Vec<u64> {
    self.roots.iter().map(|&slot| self.nodes[slot].id).collect()
  }

  pub fn parent(&self, id: u64) -> Option<u64> {
    let slot = self.slot(id)?;
    self.nodes[slot].parent.map(|parent| self.nodes[parent].id)
  }

  pub fn children(&self, id: u64) -> Vec<u64> {
    match self.slot(id) {
      Some(slot) => self.nodes[slot]
        .children
        .iter()
        .map(|&child| self.nodes[child].id)
        .collect(),
      None => Vec::new(),
    }
  }

  /// Distance from the root; roots have depth 0.
  pub fn depth(&self, id: u64) -> Result<usize, TreeError> {
    Ok(self.ancestors(id)?.len())
  }

  /// Ids from the parent up to the root.
  pub fn ancestors(&self, id: u64) -> Result<Vec<u64>, TreeError> {
    let mut slot = self.slot(id).ok_or(TreeError::NotFound(id))?;
    let mut ancestors = Vec::new();
    while let Some(parent) = self.nodes[slot].parent {
      ancestors.push(self.nodes[parent].id);
      slot = parent;
    }
    Ok(ancestors)
  }

  /// All ids below `id`, depth-first.
  pub fn descendants(&self, id: u64) -> Result<Vec<u64>, TreeError> {
    let slot = self.slot(id).ok_or(TreeError::NotFound(id))?;
    let mut descendants = Vec::new();
    let mut stack: Vec<usize> = self.nodes[slot].children.iter().rev().copied().collect();
    while let Some(current) = stack.pop() {
      descendants.push(self.nodes[current].id);
      stack.extend(self.nodes[current].children.iter().rev().copied());
    }
    Ok(descendants)
  }

  /// Whether making `new_parent` the parent of `node` would close a loop.
  pub fn would_create_cycle(&self, node: u64, new_parent: u64) -> Result<bool, TreeError> {
    if !self.contains(new_parent) {
      return Err(TreeError::NotFound(new_parent));
    }
    if node == new_parent {
      return Ok(true);
    }
    let descendants: HashSet<u64> = self.descendants(node)?.into_iter().collect();
    Ok(descendants.contains(&new_parent))
  }

  /// Re-parent `node`; `None` makes it a root.
  pub fn move_node(&mut self, node: u64, new_parent: Option<u64>) -> Result<(), TreeError> {
    let slot = self.slot(node).ok_or(TreeError::NotFound(node))?;
    let parent_slot = match new_parent {
      Some(parent) => {
        if self.would_create_cycle(node, parent)? {
          return Err(TreeError::WouldCycle { node, parent });
        }
        self.slot(parent)
      }
      None => None,
    };

    match self.nodes[slot].parent {
      Some(old) => self.nodes[old].children.retain(|&child| child != slot),
      None => self.roots.retain(|&root| root != slot),
    }
    self.nodes[slot].parent = parent_slot;
    match parent_slot {
      Some(parent) => self.nodes[parent].children.push(slot),
      None => self.roots.push(slot),
    }
    Ok(())
  }

  /// Pre-order walk over the whole tree with depths, for indented display.
  pub fn flatten(&self) -> Vec<FlatNode<'_, T>> {
    let mut flat = Vec::with_capacity(self.nodes.len());
    let mut stack: Vec<(usize, usize)> = self.roots.iter().rev().map(|&slot| (slot, 0)).collect();
    while let Some((slot, depth)) = stack.pop() {
      let node = &self.nodes[slot];
      flat.push(FlatNode {
        id: node.id,
        depth,
        item: &node.item,
      });
      stack.extend(node.children.iter().rev().map(|&child| (child, depth + 1)));
    }
    flat
  }

  fn slot(&self, id: u64) -> Option<usize> {
    self.index.get(&id).copied()
  }
}

// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Link hierarchy traversal and cycle detection.
//!
//! Links form a directed graph from a parent (a gadget with `LINK`
//! properties, or a reactive array) to the children it relays changes from.
//! The runtime keeps that graph acyclic: before a new link is committed it
//! checks that the candidate child cannot already reach the parent.

use hashbrown::HashSet;

use crate::array::ReactiveArray;
use crate::error::GadgetError;
use crate::gadget::Gadget;
use crate::value::Value;

/// A participant in the link graph.
#[derive(Clone, Debug)]
pub enum Node {
    /// A gadget.
    Gadget(Gadget),
    /// A reactive array.
    Array(ReactiveArray),
}

impl Node {
    /// Returns the node for a gadget or array value.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Gadget(g) => Some(Self::Gadget(g.clone())),
            Value::Array(a) => Some(Self::Array(a.clone())),
            _ => None,
        }
    }

    /// Returns `true` if both nodes are the same object.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Gadget(a), Self::Gadget(b)) => a.ptr_eq(b),
            (Self::Array(a), Self::Array(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    fn addr(&self) -> usize {
        match self {
            Self::Gadget(g) => g.addr(),
            Self::Array(a) => a.addr(),
        }
    }
}

impl From<Gadget> for Node {
    fn from(gadget: Gadget) -> Self {
        Self::Gadget(gadget)
    }
}

impl From<ReactiveArray> for Node {
    fn from(array: ReactiveArray) -> Self {
        Self::Array(array)
    }
}

/// Returns the children `node` currently holds links to, in slot order.
#[must_use]
pub fn link_children(node: &Node) -> Vec<Node> {
    let values = match node {
        Node::Gadget(g) => g.linked_values(),
        Node::Array(a) => a.linked_values(),
    };
    values.iter().filter_map(Node::from_value).collect()
}

/// Returns `true` if `to` is `from` or is reachable from it through links.
#[must_use]
pub fn reaches(from: &Node, to: &Node) -> bool {
    let target = to.addr();
    let mut seen = HashSet::new();
    let mut stack = vec![from.clone()];
    while let Some(node) = stack.pop() {
        let addr = node.addr();
        if addr == target {
            return true;
        }
        if seen.insert(addr) {
            stack.extend(link_children(&node));
        }
    }
    false
}

/// Fails if linking `candidate` under `owner` would close a cycle.
///
/// Plain lists are checked item by item, since they are wrapped into a fresh
/// array whose only links are to those items.
pub(crate) fn check(owner: &Node, key: &str, candidate: &Value) -> Result<(), GadgetError> {
    let cyclic = match candidate {
        Value::List(items) => items
            .iter()
            .any(|item| check(owner, key, item).is_err()),
        other => Node::from_value(other).is_some_and(|node| reaches(&node, owner)),
    };
    if cyclic {
        Err(GadgetError::HierarchyCycle { key: key.into() })
    } else {
        Ok(())
    }
}

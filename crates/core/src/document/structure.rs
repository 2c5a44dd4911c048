//! Structure-tree traversal.
//!
//! The logical structure tree hangs off the catalog's /StructTreeRoot;
//! each node's /K entry holds one child or an array of children, each
//! a dictionary, a reference, or (at the leaves) a marked-content id.

use super::Document;
use super::page::MAX_TREE_DEPTH;
use crate::error::{Result, ValidationError};
use crate::model::object::PdfObject;
use std::collections::HashSet;

/// One structure-tree node.
#[derive(Debug, Clone, PartialEq)]
pub struct StructNode {
    /// Object number, when the node is an indirect object
    pub id: Option<u32>,
    /// The node's /S structure type, when present
    pub structure_type: Option<String>,
}

/// Restartable pre-order walk over the structure tree.
pub struct StructTreeWalker<'a> {
    doc: &'a Document,
    stack: Vec<(PdfObject, usize)>,
    visited: HashSet<u32>,
    finished: bool,
}

impl<'a> StructTreeWalker<'a> {
    pub fn new(doc: &'a Document) -> Self {
        let mut walker = Self {
            doc,
            stack: Vec::new(),
            visited: HashSet::new(),
            finished: false,
        };
        walker.start_walk();
        walker
    }

    /// Reset traversal state and begin again from the root.
    pub fn start_walk(&mut self) {
        self.stack.clear();
        self.visited.clear();
        self.finished = false;

        if let Some(root) = self.doc.catalog().get("StructTreeRoot") {
            self.stack.push((root.clone(), 1));
        }
    }

    /// Advance to the next structure node.
    pub fn next_node(&mut self) -> Result<Option<StructNode>> {
        if self.finished {
            return Ok(None);
        }

        while let Some((node, depth)) = self.stack.pop() {
            if depth > MAX_TREE_DEPTH {
                self.finished = true;
                return Err(ValidationError::RecursionGuard(format!(
                    "structure tree deeper than {MAX_TREE_DEPTH} levels"
                )));
            }

            let id = match &node {
                PdfObject::Ref(r) => {
                    if !self.visited.insert(r.num) {
                        self.finished = true;
                        return Err(ValidationError::RecursionGuard(format!(
                            "structure tree revisits object {}",
                            r.num
                        )));
                    }
                    Some(r.num)
                }
                _ => None,
            };

            let resolved = self.doc.resolve(&node)?;
            let dict = match resolved.as_dict() {
                Ok(d) => d,
                Err(_) => match &*resolved {
                    // an array groups siblings; marked-content ids and
                    // anything else at a leaf position are skipped
                    PdfObject::Array(items) => {
                        for item in items.iter().rev() {
                            self.stack.push((item.clone(), depth + 1));
                        }
                        continue;
                    }
                    _ => continue,
                },
            };

            if let Some(kids) = dict.get("K") {
                self.stack.push((kids.clone(), depth + 1));
            }

            return Ok(Some(StructNode {
                id,
                structure_type: dict.get("S").and_then(|s| s.as_name().ok()).map(String::from),
            }));
        }

        self.finished = true;
        Ok(None)
    }
}

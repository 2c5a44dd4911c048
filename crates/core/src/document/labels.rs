//! Page-label number-tree traversal.
//!
//! /PageLabels in the catalog is a number tree: interior nodes carry
//! /Kids, leaves carry /Nums as a flat `[index label index label ...]`
//! list mapping page indices to label dictionaries.

use super::Document;
use super::page::MAX_TREE_DEPTH;
use crate::error::{Result, ValidationError};
use crate::model::object::{Dict, PdfObject};
use std::collections::{HashSet, VecDeque};
use tracing::warn;

/// Restartable walk over the page-label tree, yielding
/// `(page index, label dictionary)` pairs in document order.
pub struct PageLabelWalker<'a> {
    doc: &'a Document,
    stack: Vec<(PdfObject, usize)>,
    pending: VecDeque<(i64, Dict)>,
    visited: HashSet<u32>,
    finished: bool,
}

impl<'a> PageLabelWalker<'a> {
    pub fn new(doc: &'a Document) -> Self {
        let mut walker = Self {
            doc,
            stack: Vec::new(),
            pending: VecDeque::new(),
            visited: HashSet::new(),
            finished: false,
        };
        walker.start_walk();
        walker
    }

    /// Reset traversal state and begin again from the root.
    pub fn start_walk(&mut self) {
        self.stack.clear();
        self.pending.clear();
        self.visited.clear();
        self.finished = false;

        if let Some(root) = self.doc.catalog().get("PageLabels") {
            self.stack.push((root.clone(), 1));
        }
    }

    /// Advance to the next `(page index, label dict)` pair.
    pub fn next_label(&mut self) -> Result<Option<(i64, Dict)>> {
        if self.finished {
            return Ok(None);
        }

        loop {
            if let Some(pair) = self.pending.pop_front() {
                return Ok(Some(pair));
            }

            let Some((node, depth)) = self.stack.pop() else {
                self.finished = true;
                return Ok(None);
            };

            if depth > MAX_TREE_DEPTH {
                self.finished = true;
                return Err(ValidationError::RecursionGuard(format!(
                    "page-label tree deeper than {MAX_TREE_DEPTH} levels"
                )));
            }
            if let PdfObject::Ref(r) = &node
                && !self.visited.insert(r.num)
            {
                self.finished = true;
                return Err(ValidationError::RecursionGuard(format!(
                    "page-label tree revisits object {}",
                    r.num
                )));
            }

            let resolved = self.doc.resolve(&node)?;
            let dict = match resolved.as_dict() {
                Ok(d) => d,
                Err(_) => continue,
            };

            if let Some(kids) = dict.get("Kids")
                && let Ok(kids) = self.doc.resolve(kids)
                && let Ok(kids_arr) = kids.as_array()
            {
                for kid in kids_arr.iter().rev() {
                    self.stack.push((kid.clone(), depth + 1));
                }
            }

            if let Some(nums) = dict.get("Nums")
                && let Ok(nums) = self.doc.resolve(nums)
                && let Ok(nums_arr) = nums.as_array()
            {
                let mut i = 0;
                while i + 1 < nums_arr.len() {
                    let index = match nums_arr[i].as_int() {
                        Ok(n) => n,
                        Err(_) => {
                            warn!("page-label key is not an integer, skipping entry");
                            i += 2;
                            continue;
                        }
                    };
                    match self.doc.resolve(&nums_arr[i + 1])?.as_dict() {
                        Ok(label) => self.pending.push_back((index, label.clone())),
                        Err(_) => warn!(index, "page-label value is not a dictionary"),
                    }
                    i += 2;
                }
            }
        }
    }
}

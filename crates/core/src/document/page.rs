//! Page-tree traversal.
//!
//! The page tree hangs off the catalog's /Pages entry: interior
//! `Pages` nodes list children in /Kids, leaf `Page` nodes inherit
//! /Resources, /MediaBox, /CropBox and /Rotate from their ancestors.

use super::Document;
use crate::error::{Result, ValidationError};
use crate::model::object::{Dict, PdfObject};
use std::collections::HashSet;
use std::rc::Rc;

/// Depth budget for page-tree descent; a deeper tree fails closed.
pub const MAX_TREE_DEPTH: usize = 100;

/// One page leaf, with inherited attributes folded in.
#[derive(Debug, Clone, PartialEq)]
pub struct PageNode {
    /// Object number of the page dictionary
    pub id: u32,
    /// Page attributes, inherited keys included
    pub dict: Dict,
}

/// Chain of inheritable attributes from ancestor `Pages` nodes.
#[derive(Debug)]
struct InheritedAttrs {
    parent: Option<Rc<InheritedAttrs>>,
    resources: Option<PdfObject>,
    media_box: Option<PdfObject>,
    crop_box: Option<PdfObject>,
    rotate: Option<PdfObject>,
}

impl InheritedAttrs {
    fn from_dict(parent: Option<Rc<InheritedAttrs>>, dict: &Dict) -> Rc<Self> {
        Rc::new(Self {
            parent,
            resources: dict.get("Resources").cloned(),
            media_box: dict.get("MediaBox").cloned(),
            crop_box: dict.get("CropBox").cloned(),
            rotate: dict.get("Rotate").cloned(),
        })
    }

    fn resolve_resources(&self) -> Option<&PdfObject> {
        self.resources
            .as_ref()
            .or_else(|| self.parent.as_ref().and_then(|p| p.resolve_resources()))
    }

    fn resolve_media_box(&self) -> Option<&PdfObject> {
        self.media_box
            .as_ref()
            .or_else(|| self.parent.as_ref().and_then(|p| p.resolve_media_box()))
    }

    fn resolve_crop_box(&self) -> Option<&PdfObject> {
        self.crop_box
            .as_ref()
            .or_else(|| self.parent.as_ref().and_then(|p| p.resolve_crop_box()))
    }

    fn resolve_rotate(&self) -> Option<&PdfObject> {
        self.rotate
            .as_ref()
            .or_else(|| self.parent.as_ref().and_then(|p| p.resolve_rotate()))
    }

    fn apply_to(&self, dest: &mut Dict) {
        fill(dest, "Resources", self.resolve_resources());
        fill(dest, "MediaBox", self.resolve_media_box());
        fill(dest, "CropBox", self.resolve_crop_box());
        fill(dest, "Rotate", self.resolve_rotate());
    }
}

fn fill(dest: &mut Dict, key: &str, value: Option<&PdfObject>) {
    if !dest.contains_key(key)
        && let Some(value) = value
    {
        dest.insert(key.to_string(), value.clone());
    }
}

/// Restartable depth-first walk over the page tree.
///
/// `start_walk` re-arms the traversal; `next_page` yields one leaf per
/// call and `None` when exhausted. A revisited object number or a
/// depth beyond [`MAX_TREE_DEPTH`] trips the recursion guard. One
/// traversal per walker at a time.
pub struct PageTreeWalker<'a> {
    doc: &'a Document,
    stack: Vec<(u32, Rc<InheritedAttrs>, usize)>,
    visited: HashSet<u32>,
    finished: bool,
}

impl<'a> PageTreeWalker<'a> {
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

        if let Some(pages) = self.doc.catalog().get("Pages")
            && let Ok(root) = pages.as_obj_ref()
        {
            let inherited = InheritedAttrs::from_dict(None, self.doc.catalog());
            self.stack.push((root.num, inherited, 1));
        }
    }

    /// Advance to the next page leaf.
    pub fn next_page(&mut self) -> Result<Option<PageNode>> {
        if self.finished {
            return Ok(None);
        }

        while let Some((id, parent_inherited, depth)) = self.stack.pop() {
            if depth > MAX_TREE_DEPTH {
                self.finished = true;
                return Err(ValidationError::RecursionGuard(format!(
                    "page tree deeper than {MAX_TREE_DEPTH} levels"
                )));
            }
            if !self.visited.insert(id) {
                self.finished = true;
                return Err(ValidationError::RecursionGuard(format!(
                    "page tree revisits object {id}"
                )));
            }

            let obj = self.doc.get_object(id)?;
            let dict = match obj.as_dict() {
                Ok(d) => d,
                Err(_) => continue,
            };

            match dict.get("Type") {
                Some(PdfObject::Name(name)) if name == "Pages" => {
                    let inherited = InheritedAttrs::from_dict(Some(parent_inherited), dict);
                    if let Some(kids) = dict.get("Kids")
                        && let Ok(kids) = self.doc.resolve(kids)
                        && let Ok(kids_arr) = kids.as_array()
                    {
                        for kid in kids_arr.iter().rev() {
                            if let Ok(kid_ref) = kid.as_obj_ref() {
                                self.stack.push((kid_ref.num, Rc::clone(&inherited), depth + 1));
                            }
                        }
                    }
                }
                Some(PdfObject::Name(name)) if name == "Page" => {
                    let mut attrs = dict.clone();
                    parent_inherited.apply_to(&mut attrs);
                    return Ok(Some(PageNode { id, dict: attrs }));
                }
                _ => {}
            }
        }

        self.finished = true;
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inherited_attrs_fill_missing_keys_only() {
        let mut root = Dict::new();
        root.insert("MediaBox".to_string(), PdfObject::Name("root".into()));
        root.insert("Rotate".to_string(), PdfObject::Int(90));

        let mut mid = Dict::new();
        mid.insert("Resources".to_string(), PdfObject::Name("mid".into()));

        let root_node = InheritedAttrs::from_dict(None, &root);
        let mid_node = InheritedAttrs::from_dict(Some(root_node), &mid);

        let mut leaf = Dict::new();
        leaf.insert("Resources".to_string(), PdfObject::Name("leaf".into()));

        mid_node.apply_to(&mut leaf);

        assert_eq!(leaf.get("Resources"), Some(&PdfObject::Name("leaf".into())));
        assert_eq!(leaf.get("MediaBox"), Some(&PdfObject::Name("root".into())));
        assert_eq!(leaf.get("Rotate"), Some(&PdfObject::Int(90)));
    }
}

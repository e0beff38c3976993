use crate::key_value_pair::KeyValuePair;
use crate::node::{InternalNode, LeafNode};
use crate::node_type::NodeType;
use crate::page::Page;

pub trait PageBuilder {
    fn build(self) -> Page;
}

#[derive(Default)]
pub struct LeafNodePageBuilder {
    is_root: bool,
    parent_offset: u32,
    next_leaf: u32,
    key_value_pairs: Vec<KeyValuePair>,
}

impl LeafNodePageBuilder {
    pub fn is_root(mut self, is_root: bool) -> Self {
        self.is_root = is_root;
        self
    }

    pub fn parent_offset(mut self, parent_offset: u32) -> Self {
        self.parent_offset = parent_offset;
        self
    }

    pub fn next_leaf(mut self, next_leaf: u32) -> Self {
        self.next_leaf = next_leaf;
        self
    }

    pub fn key_value_pairs(mut self, key_value_pairs: Vec<KeyValuePair>) -> Self {
        self.key_value_pairs = key_value_pairs;
        self
    }
}

impl From<LeafNode> for LeafNodePageBuilder {
    fn from(leaf: LeafNode) -> LeafNodePageBuilder {
        LeafNodePageBuilder::default()
            .is_root(leaf.is_root)
            .parent_offset(leaf.parent)
            .next_leaf(leaf.next_leaf)
            .key_value_pairs(leaf.cells)
    }
}

impl PageBuilder for LeafNodePageBuilder {
    fn build(self) -> Page {
        let mut page = Page::zeroed();
        page.set_node_type(NodeType::Leaf);
        page.set_root(self.is_root);
        page.set_parent(self.parent_offset);
        page.set_leaf_next_leaf(self.next_leaf);

        page.set_leaf_num_cells(self.key_value_pairs.len());
        for (i, pair) in self.key_value_pairs.iter().enumerate() {
            page.set_leaf_key(i, pair.key);
            page.leaf_value_mut(i).copy_from_slice(&pair.value[..]);
        }
        page
    }
}

#[derive(Default)]
pub struct InternalNodePageBuilder {
    is_root: bool,
    parent_offset: u32,
    keys: Vec<u32>,
    child_pointers: Vec<u32>,
}

impl InternalNodePageBuilder {
    pub fn is_root(mut self, is_root: bool) -> Self {
        self.is_root = is_root;
        self
    }

    pub fn parent_offset(mut self, parent_offset: u32) -> Self {
        self.parent_offset = parent_offset;
        self
    }

    /// One more child pointer than keys; the last one becomes the right child.
    pub fn child_pointers(mut self, child_pointers: Vec<u32>) -> Self {
        self.child_pointers = child_pointers;
        self
    }

    pub fn keys(mut self, keys: Vec<u32>) -> Self {
        self.keys = keys;
        self
    }
}

impl From<InternalNode> for InternalNodePageBuilder {
    fn from(internal: InternalNode) -> InternalNodePageBuilder {
        InternalNodePageBuilder::default()
            .is_root(internal.is_root)
            .parent_offset(internal.parent)
            .keys(internal.keys)
            .child_pointers(internal.children)
    }
}

impl PageBuilder for InternalNodePageBuilder {
    fn build(self) -> Page {
        debug_assert_eq!(self.child_pointers.len(), self.keys.len() + 1);
        let mut page = Page::zeroed();
        page.set_node_type(NodeType::Internal);
        page.set_root(self.is_root);
        page.set_parent(self.parent_offset);

        page.set_internal_num_keys(self.keys.len());
        for (i, (child, key)) in self.child_pointers.iter().zip(self.keys.iter()).enumerate() {
            page.set_internal_child(i, *child);
            page.set_internal_key(i, *key);
        }
        if let Some(right_child) = self.child_pointers.last() {
            page.set_internal_right_child(*right_child);
        }
        page
    }
}

use crate::error::{Error, Result};
use crate::key_value_pair::KeyValuePair;
use crate::node_type::NodeType;
use crate::page::Page;
use crate::page_builder::{InternalNodePageBuilder, LeafNodePageBuilder, PageBuilder};

/// An owned leaf: cells sorted ascending by key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafNode {
    pub is_root: bool,
    pub parent: u32,
    pub next_leaf: u32,
    pub cells: Vec<KeyValuePair>,
}

/// An owned internal node.
///
/// `children` always holds one more entry than `keys`; `keys[i]` is the
/// largest key reachable through `children[i]` and the last child is the
/// page's rightmost child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalNode {
    pub is_root: bool,
    pub parent: u32,
    pub keys: Vec<u32>,
    pub children: Vec<u32>,
}

/// A node decoded from its page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Leaf(LeafNode),
    Internal(InternalNode),
}

impl Node {
    pub fn decode(page: &Page, page_num: u32) -> Result<Node> {
        match page.check(page_num)? {
            NodeType::Leaf => {
                let cells = (0..page.leaf_num_cells())
                    .map(|i| KeyValuePair::new(page.leaf_key(i), page.leaf_value(i)))
                    .collect();
                Ok(Node::Leaf(LeafNode {
                    is_root: page.is_root(),
                    parent: page.parent(),
                    next_leaf: page.leaf_next_leaf(),
                    cells,
                }))
            }
            NodeType::Internal => {
                let num_keys = page.internal_num_keys();
                if num_keys == 0 {
                    return Err(Error::corrupt(page_num, "internal node without keys"));
                }
                Ok(Node::Internal(InternalNode {
                    is_root: page.is_root(),
                    parent: page.parent(),
                    keys: (0..num_keys).map(|i| page.internal_key(i)).collect(),
                    children: (0..=num_keys).map(|i| page.internal_child_at(i)).collect(),
                }))
            }
        }
    }

    pub fn into_page(self) -> Page {
        match self {
            Node::Leaf(leaf) => LeafNodePageBuilder::from(leaf).build(),
            Node::Internal(internal) => InternalNodePageBuilder::from(internal).build(),
        }
    }

    pub fn node_type(&self) -> NodeType {
        match self {
            Node::Leaf(_) => NodeType::Leaf,
            Node::Internal(_) => NodeType::Internal,
        }
    }

    pub fn is_root(&self) -> bool {
        match self {
            Node::Leaf(leaf) => leaf.is_root,
            Node::Internal(internal) => internal.is_root,
        }
    }

    pub fn set_root(&mut self, is_root: bool) {
        match self {
            Node::Leaf(leaf) => leaf.is_root = is_root,
            Node::Internal(internal) => internal.is_root = is_root,
        }
    }

    pub fn set_parent(&mut self, parent: u32) {
        match self {
            Node::Leaf(leaf) => leaf.parent = parent,
            Node::Internal(internal) => internal.parent = parent,
        }
    }
}

impl LeafNode {
    pub fn empty(is_root: bool) -> LeafNode {
        LeafNode {
            is_root,
            parent: 0,
            next_leaf: 0,
            cells: Vec::new(),
        }
    }

    pub fn max_key(&self) -> Option<u32> {
        self.cells.last().map(|cell| cell.key)
    }
}

impl InternalNode {
    /// Position of `child` among this node's children.
    pub fn child_index(&self, child: u32) -> Option<usize> {
        self.children.iter().position(|c| *c == child)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::Row;

    fn cell(key: u32) -> KeyValuePair {
        let row = Row::new(key, format!("user{}", key), format!("user{}@example.com", key)).unwrap();
        KeyValuePair::from_row(&row).unwrap()
    }

    #[test]
    fn leaf_survives_a_page() {
        let leaf = Node::Leaf(LeafNode {
            is_root: false,
            parent: 3,
            next_leaf: 9,
            cells: vec![cell(1), cell(4), cell(6)],
        });
        let page = leaf.clone().into_page();

        assert_eq!(page.leaf_num_cells(), 3);
        assert_eq!(page.leaf_key(1), 4);
        assert_eq!(Node::decode(&page, 5).unwrap(), leaf);
    }

    #[test]
    fn internal_node_survives_a_page() {
        let internal = Node::Internal(InternalNode {
            is_root: true,
            parent: 0,
            keys: vec![7, 14],
            children: vec![2, 3, 1],
        });
        let page = internal.clone().into_page();

        assert_eq!(page.internal_num_keys(), 2);
        assert_eq!(page.internal_right_child(), 1);
        assert_eq!(Node::decode(&page, 0).unwrap(), internal);
    }

    #[test]
    fn internal_node_without_keys_is_corrupt() {
        let mut page = Page::zeroed();
        page.set_node_type(NodeType::Internal);
        assert!(matches!(
            Node::decode(&page, 2),
            Err(Error::CorruptNode { page: 2, .. })
        ));
    }

    #[test]
    fn child_lookup() {
        let internal = InternalNode {
            is_root: false,
            parent: 0,
            keys: vec![10],
            children: vec![4, 8],
        };
        assert_eq!(internal.child_index(8), Some(1));
        assert_eq!(internal.child_index(5), None);
    }
}

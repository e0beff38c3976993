use crate::error::{Error, Result};
use crate::key_value_pair::KeyValuePair;
use crate::node::{InternalNode, LeafNode, Node};
use crate::node_type::NodeType;
use crate::page::Page;
use crate::page_builder::{InternalNodePageBuilder, PageBuilder};
use crate::page_layout::LEAF_NODE_MAX_CELLS;
use crate::pager::Pager;
use crate::cursor::Cursor;
use tracing::{debug, warn};

/// A B+Tree rooted at a fixed page of a [`Pager`].
///
/// Separator keys hold the largest key of the subtree to their left, so a
/// search follows the first separator that is `>=` the target. Growth never
/// moves the root: when the root splits its content is relocated and the
/// root page is rewritten as a fresh internal node.
pub struct BTree<'a> {
    pager: &'a mut Pager,
    root_page_num: u32,
    internal_max_keys: usize,
}

impl<'a> BTree<'a> {
    pub fn new(pager: &'a mut Pager, root_page_num: u32, internal_max_keys: usize) -> BTree<'a> {
        BTree {
            pager,
            root_page_num,
            internal_max_keys,
        }
    }

    pub fn pager(&mut self) -> &mut Pager {
        self.pager
    }

    pub fn root_page_num(&self) -> u32 {
        self.root_page_num
    }

    // A path longer than the number of pages can only come from a cycle.
    fn check_depth(&self, depth: u32, page_num: u32) -> Result<()> {
        if depth > self.pager.num_pages() {
            return Err(Error::corrupt(page_num, "child pointers form a cycle"));
        }
        Ok(())
    }

    /// Descends from the root to the leaf that holds `key` or would hold it.
    ///
    /// The returned cursor points at the matching cell, or at the slot the
    /// key would be inserted into (possibly one past the last cell).
    pub fn find(&mut self, key: u32) -> Result<Cursor> {
        let mut page_num = self.root_page_num;
        let mut depth = 0;
        loop {
            let page = self.pager.get_page(page_num)?;
            match page.check(page_num)? {
                NodeType::Internal => {
                    let child_num = internal_node_find_child(page, key);
                    page_num = page.internal_child_at(child_num);
                }
                NodeType::Leaf => {
                    return Ok(Cursor::new(page_num, leaf_node_find(page, key), false));
                }
            }
            depth += 1;
            self.check_depth(depth, page_num)?;
        }
    }

    /// Page number of the leftmost leaf.
    pub fn first_leaf(&mut self) -> Result<u32> {
        let mut page_num = self.root_page_num;
        let mut depth = 0;
        loop {
            let page = self.pager.get_page(page_num)?;
            match page.check(page_num)? {
                NodeType::Internal => page_num = page.internal_child_at(0),
                NodeType::Leaf => return Ok(page_num),
            }
            depth += 1;
            self.check_depth(depth, page_num)?;
        }
    }

    /// Number of levels, counting the root and the leaves.
    pub fn height(&mut self) -> Result<usize> {
        let mut page_num = self.root_page_num;
        let mut height = 1;
        loop {
            let page = self.pager.get_page(page_num)?;
            match page.check(page_num)? {
                NodeType::Internal => page_num = page.internal_child_at(0),
                NodeType::Leaf => return Ok(height),
            }
            height += 1;
            self.check_depth(height as u32, page_num)?;
        }
    }

    pub fn insert(&mut self, cell: KeyValuePair) -> Result<()> {
        let key = cell.key;
        let cursor = self.find(key)?;
        let page_num = cursor.page_num;
        let cell_num = cursor.cell_num;

        let page = self.pager.get_page(page_num)?;
        let num_cells = page.leaf_num_cells();
        if cell_num < num_cells && page.leaf_key(cell_num) == key {
            return Err(Error::DuplicateKey(key));
        }

        if num_cells < LEAF_NODE_MAX_CELLS {
            let page = self.pager.get_page_mut(page_num)?;
            page.leaf_shift_cells_right(cell_num);
            page.set_leaf_key(cell_num, key);
            page.leaf_value_mut(cell_num).copy_from_slice(&cell.value[..]);
            page.set_leaf_num_cells(num_cells + 1);
            return Ok(());
        }

        self.reserve_split_pages(page_num, key)?;
        self.split_leaf_and_insert(page_num, cell_num, cell)
    }

    /// Fails with `TableFull` unless the pager can supply every page the
    /// split cascade starting at the full leaf `page_num` will allocate.
    fn reserve_split_pages(&mut self, page_num: u32, key: u32) -> Result<()> {
        // The leaf's new right sibling.
        let mut needed = 1;
        let mut page_num = page_num;
        loop {
            if page_num == self.root_page_num {
                // Relocated content of the old root.
                needed += 1;
                break;
            }
            let parent_num = self.pager.get_page(page_num)?.parent();
            let parent = self.pager.get_page(parent_num)?;
            if parent.check(parent_num)? != NodeType::Internal {
                return Err(Error::corrupt(parent_num, "parent of a node is a leaf"));
            }
            if parent.internal_num_keys() < self.internal_max_keys {
                break;
            }
            needed += 1;
            page_num = parent_num;
            self.check_depth(needed, page_num)?;
        }

        if needed > self.pager.free_pages() {
            warn!(
                key,
                needed,
                free = self.pager.free_pages(),
                "refusing insert, table is full"
            );
            return Err(Error::TableFull);
        }
        Ok(())
    }

    fn split_leaf_and_insert(&mut self, page_num: u32, cell_num: usize, cell: KeyValuePair) -> Result<()> {
        let mut leaf = self.read_leaf(page_num)?;
        leaf.cells.insert(cell_num, cell);

        // Ties go left: the left leaf takes the ceiling of half the cells.
        let left_count = (leaf.cells.len() + 1) / 2;
        let right_cells = leaf.cells.split_off(left_count);
        let left_max = leaf
            .max_key()
            .ok_or_else(|| Error::corrupt(page_num, "split produced an empty leaf"))?;

        let right_page_num = self.pager.allocate()?;
        let right = LeafNode {
            is_root: false,
            parent: leaf.parent,
            next_leaf: leaf.next_leaf,
            cells: right_cells,
        };
        leaf.next_leaf = right_page_num;
        debug!(page_num, right_page_num, left_max, "split leaf");
        self.write_node(right_page_num, Node::Leaf(right))?;

        if page_num == self.root_page_num {
            self.promote_root(Node::Leaf(leaf), right_page_num, left_max)
        } else {
            let parent_num = leaf.parent;
            self.write_node(page_num, Node::Leaf(leaf))?;
            self.insert_child(parent_num, page_num, left_max, right_page_num)
        }
    }

    /// Records that child `left_num` of `parent_num` was split and now ends
    /// at `left_max`, with `right_num` holding the rest of its keys.
    fn insert_child(&mut self, parent_num: u32, left_num: u32, left_max: u32, right_num: u32) -> Result<()> {
        let mut parent = self.read_internal(parent_num)?;
        let index = parent.child_index(left_num).ok_or_else(|| {
            Error::corrupt(
                parent_num,
                format!("parent does not reference child page {}", left_num),
            )
        })?;
        // The separator that used to bound `left_num` now bounds `right_num`.
        parent.children.insert(index + 1, right_num);
        parent.keys.insert(index, left_max);
        self.pager.get_page_mut(right_num)?.set_parent(parent_num);

        if parent.keys.len() <= self.internal_max_keys {
            return self.write_node(parent_num, Node::Internal(parent));
        }
        self.split_internal(parent_num, parent)
    }

    fn split_internal(&mut self, page_num: u32, mut node: InternalNode) -> Result<()> {
        let split_at = node.keys.len() / 2;
        let right_keys = node.keys.split_off(split_at + 1);
        let promoted = node
            .keys
            .pop()
            .ok_or_else(|| Error::corrupt(page_num, "split of an internal node without keys"))?;
        let right_children = node.children.split_off(split_at + 1);

        let right_page_num = self.pager.allocate()?;
        for child in &right_children {
            self.pager.get_page_mut(*child)?.set_parent(right_page_num);
        }
        let right = InternalNode {
            is_root: false,
            parent: node.parent,
            keys: right_keys,
            children: right_children,
        };
        debug!(page_num, right_page_num, promoted, "split internal node");
        self.write_node(right_page_num, Node::Internal(right))?;

        if page_num == self.root_page_num {
            self.promote_root(Node::Internal(node), right_page_num, promoted)
        } else {
            let parent_num = node.parent;
            self.write_node(page_num, Node::Internal(node))?;
            self.insert_child(parent_num, page_num, promoted, right_page_num)
        }
    }

    /// Moves the left half of a split root to a new page and rewrites the
    /// root page as an internal node over both halves.
    fn promote_root(&mut self, mut left: Node, right_page_num: u32, left_max: u32) -> Result<()> {
        let root = self.root_page_num;
        let left_page_num = self.pager.allocate()?;
        left.set_root(false);
        left.set_parent(root);
        if let Node::Internal(internal) = &left {
            for child in &internal.children {
                self.pager.get_page_mut(*child)?.set_parent(left_page_num);
            }
        }
        self.write_node(left_page_num, left)?;
        self.pager.get_page_mut(right_page_num)?.set_parent(root);

        let new_root = InternalNodePageBuilder::default()
            .is_root(true)
            .keys(vec![left_max])
            .child_pointers(vec![left_page_num, right_page_num])
            .build();
        self.pager.put_page(root, new_root)?;
        debug!(root, left_page_num, right_page_num, left_max, "promoted root");
        Ok(())
    }

    fn read_node(&mut self, page_num: u32) -> Result<Node> {
        Node::decode(self.pager.get_page(page_num)?, page_num)
    }

    fn read_leaf(&mut self, page_num: u32) -> Result<LeafNode> {
        match self.read_node(page_num)? {
            Node::Leaf(leaf) => Ok(leaf),
            Node::Internal(_) => Err(Error::corrupt(page_num, "expected a leaf node")),
        }
    }

    fn read_internal(&mut self, page_num: u32) -> Result<InternalNode> {
        match self.read_node(page_num)? {
            Node::Internal(internal) => Ok(internal),
            Node::Leaf(_) => Err(Error::corrupt(page_num, "expected an internal node")),
        }
    }

    fn write_node(&mut self, page_num: u32, node: Node) -> Result<()> {
        self.pager.put_page(page_num, node.into_page())
    }

    /// Depth-first dump of every page: its type and key count, then its
    /// entries indented one level deeper.
    pub fn describe(&mut self) -> Result<String> {
        let mut out = String::new();
        self.describe_node(self.root_page_num, 0, &mut out)?;
        Ok(out)
    }

    fn describe_node(&mut self, page_num: u32, level: u32, out: &mut String) -> Result<()> {
        self.check_depth(level, page_num)?;
        let node = self.read_node(page_num)?;
        out.push_str(&format!("page {}; ", page_num));
        if node.is_root() {
            out.push_str("root; ");
        }
        match node {
            Node::Internal(internal) => {
                out.push_str(&format!("internal; {} keys\n", internal.keys.len()));
                for (child, key) in internal.children.iter().zip(internal.keys.iter()) {
                    indent(out, level + 1);
                    out.push_str(&format!("+ key {}; ", key));
                    self.describe_node(*child, level + 1, out)?;
                }
                if let Some(right_child) = internal.children.last() {
                    indent(out, level + 1);
                    out.push_str("+ ");
                    self.describe_node(*right_child, level + 1, out)?;
                }
            }
            Node::Leaf(leaf) => {
                out.push_str(&format!("leaf; {} keys\n", leaf.cells.len()));
                for cell in &leaf.cells {
                    indent(out, level + 1);
                    out.push_str(&format!("- key {}\n", cell.key));
                }
            }
        }
        Ok(())
    }
}

fn indent(out: &mut String, level: u32) {
    for _ in 0..level {
        out.push_str("  ");
    }
}

// Index of the first separator >= key, or num_keys for the rightmost child.
fn internal_node_find_child(page: &Page, key: u32) -> usize {
    let mut min_index = 0;
    let mut max_index = page.internal_num_keys();
    while min_index < max_index {
        let index = (min_index + max_index) / 2;
        if page.internal_key(index) >= key {
            max_index = index;
        } else {
            min_index = index + 1;
        }
    }
    min_index
}

// Index of the cell holding key, or of the slot it would be inserted into.
fn leaf_node_find(page: &Page, key: u32) -> usize {
    let mut min_index = 0;
    let mut one_past_max_index = page.leaf_num_cells();
    while min_index < one_past_max_index {
        let index = (min_index + one_past_max_index) / 2;
        let key_at_index = page.leaf_key(index);
        if key == key_at_index {
            return index;
        }
        if key < key_at_index {
            one_past_max_index = index;
        } else {
            min_index = index + 1;
        }
    }
    min_index
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page_builder::LeafNodePageBuilder;
    use crate::page_layout::{INTERNAL_NODE_MAX_KEYS, TABLE_MAX_PAGES};
    use crate::row::Row;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;
    use tempfile::TempDir;

    fn open_pager(max_pages: u32) -> (TempDir, Pager) {
        let dir = TempDir::new().unwrap();
        let mut pager = Pager::open(&dir.path().join("tree.db"), max_pages).unwrap();
        let root = pager.allocate().unwrap();
        pager
            .put_page(root, LeafNodePageBuilder::default().is_root(true).build())
            .unwrap();
        (dir, pager)
    }

    fn cell(key: u32) -> KeyValuePair {
        let row = Row::new(key, format!("user{}", key), format!("user{}@example.com", key)).unwrap();
        KeyValuePair::from_row(&row).unwrap()
    }

    fn insert_all(tree: &mut BTree, keys: &[u32]) {
        for key in keys {
            tree.insert(cell(*key)).unwrap();
        }
    }

    /// Walks the whole tree checking every structural invariant and returns
    /// the keys in order.
    fn validate(tree: &mut BTree) -> Vec<u32> {
        let root = tree.root_page_num();
        let mut leaves = Vec::new();
        let mut keys = Vec::new();
        validate_node(tree, root, root, 0, &mut leaves, &mut keys);

        let depth = leaves[0].1;
        assert!(leaves.iter().all(|(_, d)| *d == depth), "leaves at uneven depth");
        assert!(keys.windows(2).all(|w| w[0] < w[1]), "keys out of order");

        // The leaf chain visits the leaves in tree order and then stops.
        let mut chain = vec![tree.first_leaf().unwrap()];
        loop {
            let last = *chain.last().unwrap();
            let next = tree.pager().get_page(last).unwrap().leaf_next_leaf();
            if next == 0 {
                break;
            }
            chain.push(next);
        }
        let in_order: Vec<u32> = leaves.iter().map(|(page, _)| *page).collect();
        assert_eq!(chain, in_order);
        keys
    }

    fn validate_node(
        tree: &mut BTree,
        page_num: u32,
        parent: u32,
        depth: usize,
        leaves: &mut Vec<(u32, usize)>,
        keys: &mut Vec<u32>,
    ) -> u32 {
        let node = tree.read_node(page_num).unwrap();
        let root = tree.root_page_num();
        assert_eq!(node.is_root(), page_num == root);
        match node {
            Node::Leaf(leaf) => {
                if page_num != root {
                    assert_eq!(leaf.parent, parent);
                    assert!(!leaf.cells.is_empty());
                }
                assert!(leaf.cells.len() <= LEAF_NODE_MAX_CELLS);
                leaves.push((page_num, depth));
                keys.extend(leaf.cells.iter().map(|c| c.key));
                leaf.max_key().unwrap_or(0)
            }
            Node::Internal(internal) => {
                if page_num != root {
                    assert_eq!(internal.parent, parent);
                }
                assert_eq!(internal.children.len(), internal.keys.len() + 1);
                assert!(internal.keys.len() <= tree.internal_max_keys);
                assert!(internal.keys.windows(2).all(|w| w[0] < w[1]));
                let mut max = 0;
                for (i, child) in internal.children.iter().enumerate() {
                    max = validate_node(tree, *child, page_num, depth + 1, leaves, keys);
                    if i < internal.keys.len() {
                        assert_eq!(internal.keys[i], max, "separator is not the child's max");
                    }
                }
                max
            }
        }
    }

    #[test]
    fn find_in_an_empty_tree() {
        let (_dir, mut pager) = open_pager(TABLE_MAX_PAGES);
        let mut tree = BTree::new(&mut pager, 0, INTERNAL_NODE_MAX_KEYS);

        assert_eq!(tree.find(42).unwrap(), Cursor::new(0, 0, false));
        assert_eq!(tree.height().unwrap(), 1);
    }

    #[test]
    fn find_returns_match_or_insertion_point() {
        let (_dir, mut pager) = open_pager(TABLE_MAX_PAGES);
        let mut tree = BTree::new(&mut pager, 0, INTERNAL_NODE_MAX_KEYS);
        insert_all(&mut tree, &[10, 20, 30]);

        assert_eq!(tree.find(20).unwrap().cell_num, 1);
        assert_eq!(tree.find(25).unwrap().cell_num, 2);
        assert_eq!(tree.find(5).unwrap().cell_num, 0);
        assert_eq!(tree.find(99).unwrap().cell_num, 3);
    }

    #[test]
    fn duplicate_keys_leave_the_page_untouched() {
        let (_dir, mut pager) = open_pager(TABLE_MAX_PAGES);
        let mut tree = BTree::new(&mut pager, 0, INTERNAL_NODE_MAX_KEYS);
        insert_all(&mut tree, &[3, 1, 2]);
        let before = tree.pager().get_page(0).unwrap().get_bytes().to_vec();

        assert!(matches!(tree.insert(cell(2)), Err(Error::DuplicateKey(2))));
        assert_eq!(tree.pager().get_page(0).unwrap().get_bytes(), &before[..]);
        assert_eq!(validate(&mut tree), vec![1, 2, 3]);
    }

    #[test]
    fn one_more_than_a_leaf_holds_splits_the_root() {
        let (_dir, mut pager) = open_pager(TABLE_MAX_PAGES);
        let mut tree = BTree::new(&mut pager, 0, INTERNAL_NODE_MAX_KEYS);
        let keys: Vec<u32> = (1..=LEAF_NODE_MAX_CELLS as u32 + 1).collect();
        insert_all(&mut tree, &keys);

        assert_eq!(tree.height().unwrap(), 2);
        assert_eq!(tree.root_page_num(), 0);
        match tree.read_node(0).unwrap() {
            Node::Internal(root) => {
                assert!(root.is_root);
                assert_eq!(root.keys, vec![7]);
                assert_eq!(root.children, vec![2, 1]);
            }
            Node::Leaf(_) => panic!("root should be internal after a split"),
        }
        assert_eq!(validate(&mut tree), keys);
    }

    #[test]
    fn describe_a_two_level_tree() {
        let (_dir, mut pager) = open_pager(TABLE_MAX_PAGES);
        let mut tree = BTree::new(&mut pager, 0, INTERNAL_NODE_MAX_KEYS);
        insert_all(&mut tree, &(1..=14).collect::<Vec<u32>>());

        let mut expected = String::from("page 0; root; internal; 1 keys\n");
        expected.push_str("  + key 7; page 2; leaf; 7 keys\n");
        for key in 1..=7 {
            expected.push_str(&format!("    - key {}\n", key));
        }
        expected.push_str("  + page 1; leaf; 7 keys\n");
        for key in 8..=14 {
            expected.push_str(&format!("    - key {}\n", key));
        }
        assert_eq!(tree.describe().unwrap(), expected);
    }

    #[test]
    fn describe_a_single_leaf() {
        let (_dir, mut pager) = open_pager(TABLE_MAX_PAGES);
        let mut tree = BTree::new(&mut pager, 0, INTERNAL_NODE_MAX_KEYS);
        insert_all(&mut tree, &[3, 1, 2]);

        assert_eq!(
            tree.describe().unwrap(),
            "page 0; root; leaf; 3 keys\n  - key 1\n  - key 2\n  - key 3\n"
        );
    }

    #[test]
    fn internal_splits_grow_the_tree_from_the_same_root() {
        let (_dir, mut pager) = open_pager(TABLE_MAX_PAGES);
        let mut tree = BTree::new(&mut pager, 0, 3);
        let keys: Vec<u32> = (1..=120).collect();
        insert_all(&mut tree, &keys);

        assert!(tree.height().unwrap() >= 3);
        assert_eq!(tree.root_page_num(), 0);
        assert_eq!(validate(&mut tree), keys);
    }

    #[test]
    fn descending_inserts() {
        let (_dir, mut pager) = open_pager(TABLE_MAX_PAGES);
        let mut tree = BTree::new(&mut pager, 0, 2);
        let keys: Vec<u32> = (1..=100).rev().collect();
        insert_all(&mut tree, &keys);

        assert_eq!(validate(&mut tree), (1..=100).collect::<Vec<u32>>());
    }

    #[test]
    fn random_insertion_orders_keep_every_invariant() {
        for seed in 0..8 {
            let (_dir, mut pager) = open_pager(TABLE_MAX_PAGES);
            let max_keys = 2 + (seed as usize % 3);
            let mut tree = BTree::new(&mut pager, 0, max_keys);
            let mut rng = StdRng::seed_from_u64(seed);
            let mut keys: Vec<u32> = (0..200).map(|k| k * 3).collect();
            keys.shuffle(&mut rng);

            insert_all(&mut tree, &keys);
            keys.sort_unstable();
            assert_eq!(validate(&mut tree), keys, "seed {}", seed);

            for key in keys.iter().step_by(17) {
                let cursor = tree.find(*key).unwrap();
                let page = tree.pager().get_page(cursor.page_num).unwrap();
                assert_eq!(page.leaf_key(cursor.cell_num), *key);
            }
        }
    }

    #[test]
    fn full_table_refuses_before_mutating() {
        let (_dir, mut pager) = open_pager(4);
        let mut tree = BTree::new(&mut pager, 0, INTERNAL_NODE_MAX_KEYS);

        let mut inserted = Vec::new();
        let mut key = 1;
        let err = loop {
            match tree.insert(cell(key)) {
                Ok(()) => inserted.push(key),
                Err(e) => break e,
            }
            key += 1;
        };
        assert!(matches!(err, Error::TableFull));
        assert_eq!(tree.pager().num_pages(), 4);
        assert_eq!(validate(&mut tree), inserted);

        // Still full, and still consistent.
        assert!(matches!(tree.insert(cell(key)), Err(Error::TableFull)));
        assert!(matches!(tree.insert(cell(1)), Err(Error::DuplicateKey(1))));
        assert_eq!(validate(&mut tree), inserted);
    }

    #[test]
    fn full_table_refuses_cascading_splits() {
        let (_dir, mut pager) = open_pager(TABLE_MAX_PAGES);
        let mut tree = BTree::new(&mut pager, 0, 2);
        let mut inserted = Vec::new();
        let mut key = 1;
        loop {
            match tree.insert(cell(key)) {
                Ok(()) => inserted.push(key),
                Err(Error::TableFull) => break,
                Err(e) => panic!("unexpected error {:?}", e),
            }
            key += 1;
        }
        assert!(tree.pager().num_pages() <= TABLE_MAX_PAGES);
        assert_eq!(validate(&mut tree), inserted);
    }

    #[test]
    fn unknown_node_tags_are_reported() {
        let (_dir, mut pager) = open_pager(TABLE_MAX_PAGES);
        let mut tree = BTree::new(&mut pager, 0, INTERNAL_NODE_MAX_KEYS);
        let mut garbage = [0u8; crate::page_layout::PAGE_SIZE];
        garbage[0] = 0x42;
        tree.pager().put_page(0, Page::new(garbage)).unwrap();

        assert!(matches!(tree.find(1), Err(Error::CorruptNode { page: 0, .. })));
        assert!(matches!(tree.insert(cell(1)), Err(Error::CorruptNode { .. })));
        assert!(tree.describe().is_err());
    }

    #[test]
    fn child_pointer_cycles_are_reported() {
        let (_dir, mut pager) = open_pager(TABLE_MAX_PAGES);
        let looped = InternalNodePageBuilder::default()
            .is_root(true)
            .keys(vec![10])
            .child_pointers(vec![0, 0])
            .build();
        pager.put_page(0, looped).unwrap();
        let mut tree = BTree::new(&mut pager, 0, INTERNAL_NODE_MAX_KEYS);

        assert!(matches!(tree.find(5), Err(Error::CorruptNode { .. })));
        assert!(matches!(tree.first_leaf(), Err(Error::CorruptNode { .. })));
    }
}

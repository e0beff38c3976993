use crate::btree::BTree;
use crate::error::{Error, Result};
use crate::node_type::NodeType;
use crate::row::Row;

/// A position within the leaf level of a tree.
///
/// Cursors are plain values: they hold page and cell numbers only and are
/// re-resolved against the pager on every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub page_num: u32,
    pub cell_num: usize,
    pub end_of_table: bool,
    leaves_visited: u32,
}

impl Cursor {
    pub fn new(page_num: u32, cell_num: usize, end_of_table: bool) -> Cursor {
        Cursor {
            page_num,
            cell_num,
            end_of_table,
            leaves_visited: 0,
        }
    }

    /// Positions at the first cell of the leftmost leaf.
    pub fn start(tree: &mut BTree) -> Result<Cursor> {
        let page_num = tree.first_leaf()?;
        let num_cells = tree.pager().get_page(page_num)?.leaf_num_cells();
        Ok(Cursor::new(page_num, 0, num_cells == 0))
    }

    /// Positions at the first cell whose key is `>= key`.
    pub fn at(tree: &mut BTree, key: u32) -> Result<Cursor> {
        let mut cursor = tree.find(key)?;
        let num_cells = tree.pager().get_page(cursor.page_num)?.leaf_num_cells();
        if cursor.cell_num >= num_cells {
            cursor.cell_num = num_cells.saturating_sub(1);
            cursor.advance(tree)?;
        }
        Ok(cursor)
    }

    /// Moves to the next cell, following the leaf chain at the end of a leaf.
    pub fn advance(&mut self, tree: &mut BTree) -> Result<()> {
        if self.end_of_table {
            return Ok(());
        }
        let page = tree.pager().get_page(self.page_num)?;
        let num_cells = page.leaf_num_cells();
        let next_leaf = page.leaf_next_leaf();

        self.cell_num += 1;
        if self.cell_num < num_cells {
            return Ok(());
        }
        if next_leaf == 0 {
            self.end_of_table = true;
            return Ok(());
        }

        self.leaves_visited += 1;
        if self.leaves_visited > tree.pager().num_pages() {
            return Err(Error::corrupt(next_leaf, "leaf chain forms a cycle"));
        }
        let next = tree.pager().get_page(next_leaf)?;
        if next.check(next_leaf)? != NodeType::Leaf {
            return Err(Error::corrupt(next_leaf, "leaf chain points at an internal node"));
        }
        if next.leaf_num_cells() == 0 {
            return Err(Error::corrupt(next_leaf, "empty leaf in the leaf chain"));
        }
        self.page_num = next_leaf;
        self.cell_num = 0;
        Ok(())
    }

    /// Decodes the row under the cursor, or `None` past the end of the table.
    pub fn value(&self, tree: &mut BTree) -> Result<Option<Row>> {
        if self.end_of_table {
            return Ok(None);
        }
        let page = tree.pager().get_page(self.page_num)?;
        if page.check(self.page_num)? != NodeType::Leaf {
            return Err(Error::corrupt(self.page_num, "cursor is not on a leaf"));
        }
        if self.cell_num >= page.leaf_num_cells() {
            return Ok(None);
        }
        Row::deserialize(page.leaf_value(self.cell_num)).map(Some)
    }
}

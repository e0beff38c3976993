use crate::btree::BTree;
use crate::config::TableConfig;
use crate::cursor::Cursor;
use crate::error::{Error, Result};
use crate::key_value_pair::KeyValuePair;
use crate::node_type::NodeType;
use crate::page_builder::{LeafNodePageBuilder, PageBuilder};
use crate::pager::Pager;
use crate::row::Row;
use std::path::Path;
use tracing::info;

// Root Node page is always zero.
pub const ROOT_PAGE_NUM: u32 = 0;

/// The single table stored in one file.
///
/// The table owns its pager; every operation borrows it explicitly through
/// a short lived [`BTree`].
pub struct Table {
    pager: Pager,
    root_page_num: u32,
    config: TableConfig,
}

impl Table {
    pub fn open(path: impl AsRef<Path>) -> Result<Table> {
        Table::open_with(path, TableConfig::default())
    }

    pub fn open_with(path: impl AsRef<Path>, config: TableConfig) -> Result<Table> {
        config.validate()?;
        let path = path.as_ref();
        let mut pager = Pager::open(path, config.max_pages)?;

        if pager.num_pages() == 0 {
            // New file: page zero becomes an empty root leaf.
            let root = pager.allocate()?;
            pager.put_page(root, LeafNodePageBuilder::default().is_root(true).build())?;
        } else {
            let root = pager.get_page(ROOT_PAGE_NUM)?;
            root.check(ROOT_PAGE_NUM)?;
            if !root.is_root() {
                return Err(Error::corrupt(ROOT_PAGE_NUM, "page zero is not marked as root"));
            }
        }
        info!(path = %path.display(), pages = pager.num_pages(), "opened table");

        Ok(Table {
            pager,
            root_page_num: ROOT_PAGE_NUM,
            config,
        })
    }

    fn tree(&mut self) -> BTree<'_> {
        BTree::new(&mut self.pager, self.root_page_num, self.config.internal_max_keys)
    }

    pub fn root_page_num(&self) -> u32 {
        self.root_page_num
    }

    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    pub fn num_pages(&self) -> u32 {
        self.pager.num_pages()
    }

    /// Inserts `row` keyed by its id.
    pub fn execute_insert(&mut self, row: &Row) -> Result<()> {
        let cell = KeyValuePair::from_row(row)?;
        self.tree().insert(cell)
    }

    /// All rows in ascending key order. Each call starts a fresh scan.
    pub fn execute_select(&mut self) -> Rows<'_> {
        Rows {
            tree: self.tree(),
            cursor: None,
            done: false,
        }
    }

    /// Looks up a single row by key.
    pub fn find(&mut self, key: u32) -> Result<Option<Row>> {
        let mut tree = self.tree();
        let cursor = tree.find(key)?;
        let page = tree.pager().get_page(cursor.page_num)?;
        if cursor.cell_num < page.leaf_num_cells() && page.leaf_key(cursor.cell_num) == key {
            return Row::deserialize(page.leaf_value(cursor.cell_num)).map(Some);
        }
        Ok(None)
    }

    /// Number of levels in the tree, one for a lone root leaf.
    pub fn height(&mut self) -> Result<usize> {
        self.tree().height()
    }

    pub fn root_node_type(&mut self) -> Result<NodeType> {
        let root = self.root_page_num;
        self.pager.get_page(root)?.check(root)
    }

    pub fn describe_tree(&mut self) -> Result<String> {
        self.tree().describe()
    }

    pub fn flush(&mut self) -> Result<()> {
        self.pager.flush()
    }

    /// Flushes every page and releases the file.
    pub fn close(self) -> Result<()> {
        info!(pages = self.pager.num_pages(), "closing table");
        self.pager.close()
    }
}

/// Lazy scan over the table. Yields each row once, in ascending key order;
/// stops for good after the first error.
pub struct Rows<'a> {
    tree: BTree<'a>,
    cursor: Option<Cursor>,
    done: bool,
}

impl<'a> Rows<'a> {
    fn step(&mut self) -> Result<Option<Row>> {
        if self.cursor.is_none() {
            self.cursor = Some(Cursor::start(&mut self.tree)?);
        }
        let cursor = match self.cursor.as_mut() {
            Some(cursor) => cursor,
            None => return Ok(None),
        };
        let row = cursor.value(&mut self.tree)?;
        if row.is_some() {
            cursor.advance(&mut self.tree)?;
        }
        Ok(row)
    }
}

impl<'a> Iterator for Rows<'a> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Result<Row>> {
        if self.done {
            return None;
        }
        match self.step() {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

pub fn open_table(path: impl AsRef<Path>) -> Result<Table> {
    Table::open(path)
}

pub fn close_table(table: Table) -> Result<()> {
    table.close()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page_layout::PAGE_SIZE;
    use std::fs;
    use tempfile::TempDir;

    fn row(id: u32) -> Row {
        Row::new(id, format!("user{}", id), format!("user{}@example.com", id)).unwrap()
    }

    #[test]
    fn new_file_gets_a_root_leaf() {
        let dir = TempDir::new().unwrap();
        let mut table = Table::open(dir.path().join("t.db")).unwrap();

        assert_eq!(table.root_page_num(), 0);
        assert_eq!(table.num_pages(), 1);
        assert_eq!(table.root_node_type().unwrap(), NodeType::Leaf);
        assert_eq!(table.execute_select().count(), 0);
    }

    #[test]
    fn point_lookup() {
        let dir = TempDir::new().unwrap();
        let mut table = Table::open(dir.path().join("t.db")).unwrap();
        for id in [5, 1, 9] {
            table.execute_insert(&row(id)).unwrap();
        }

        assert_eq!(table.find(9).unwrap(), Some(row(9)));
        assert_eq!(table.find(4).unwrap(), None);
    }

    #[test]
    fn select_is_restartable() {
        let dir = TempDir::new().unwrap();
        let mut table = Table::open(dir.path().join("t.db")).unwrap();
        for id in 1..=20 {
            table.execute_insert(&row(id)).unwrap();
        }

        let first: Vec<u32> = table.execute_select().take(3).map(|r| r.unwrap().id).collect();
        assert_eq!(first, vec![1, 2, 3]);
        assert_eq!(table.execute_select().count(), 20);
    }

    #[test]
    fn invalid_config_is_rejected_before_touching_the_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.db");
        let config = TableConfig::default().internal_max_keys(1);

        assert!(matches!(Table::open_with(&path, config), Err(Error::InvalidConfig(_))));
        assert!(!path.exists());
    }

    #[test]
    fn corrupt_root_is_reported_at_open() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.db");
        let mut bytes = vec![0u8; PAGE_SIZE];
        bytes[0] = 0x05;
        fs::write(&path, bytes).unwrap();

        assert!(matches!(Table::open(&path), Err(Error::CorruptNode { page: 0, .. })));
    }

    #[test]
    fn dropping_without_close_still_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.db");
        {
            let mut table = Table::open(&path).unwrap();
            table.execute_insert(&row(1)).unwrap();
        }

        let mut table = Table::open(&path).unwrap();
        assert_eq!(table.find(1).unwrap(), Some(row(1)));
    }
}

use crate::error::{Error, Result};
use crate::page_layout::{INTERNAL_NODE_MAX_KEYS, TABLE_MAX_PAGES};

/// Tunables of an open table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableConfig {
    pub max_pages: u32,
    pub internal_max_keys: usize,
}

impl Default for TableConfig {
    fn default() -> TableConfig {
        TableConfig {
            max_pages: TABLE_MAX_PAGES,
            internal_max_keys: INTERNAL_NODE_MAX_KEYS,
        }
    }
}

impl TableConfig {
    /// Caps the number of pages the table file may grow to.
    pub fn max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Caps the fan-out of internal nodes below what fits in a page.
    pub fn internal_max_keys(mut self, internal_max_keys: usize) -> Self {
        self.internal_max_keys = internal_max_keys;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_pages == 0 || self.max_pages > TABLE_MAX_PAGES {
            return Err(Error::InvalidConfig(format!(
                "max_pages must be between 1 and {}, got {}",
                TABLE_MAX_PAGES, self.max_pages
            )));
        }
        if self.internal_max_keys < 2 || self.internal_max_keys > INTERNAL_NODE_MAX_KEYS {
            return Err(Error::InvalidConfig(format!(
                "internal_max_keys must be between 2 and {}, got {}",
                INTERNAL_NODE_MAX_KEYS, self.internal_max_keys
            )));
        }
        Ok(())
    }
}

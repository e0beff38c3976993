//! A single-table storage engine: fixed-width rows keyed by id, kept in a
//! B+Tree whose nodes are 4 KiB pages of one file.
//!
//! ```no_run
//! use tablestore::{open_table, Row};
//!
//! # fn main() -> tablestore::Result<()> {
//! let mut table = open_table("users.db")?;
//! table.execute_insert(&Row::new(1, "user1", "user1@example.com")?)?;
//! for row in table.execute_select() {
//!     println!("{}", row?);
//! }
//! table.close()
//! # }
//! ```

pub mod btree;
pub mod config;
pub mod cursor;
pub mod error;
pub mod key_value_pair;
pub mod node;
pub mod node_type;
pub mod page;
pub mod page_builder;
pub mod page_layout;
pub mod pager;
pub mod row;
pub mod table;

pub use config::TableConfig;
pub use error::{Error, Result};
pub use page_layout::{describe_constants, LayoutConstants};
pub use row::Row;
pub use table::{close_table, open_table, Rows, Table};

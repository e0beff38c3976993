use crate::error::Result;
use crate::page_layout::ROW_SIZE;
use crate::row::Row;

/// A leaf cell: the key and the encoded row stored next to it.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct KeyValuePair {
    pub key: u32,
    pub value: Box<[u8; ROW_SIZE]>,
}

impl KeyValuePair {
    pub fn new(key: u32, value: &[u8]) -> KeyValuePair {
        let mut buf = Box::new([0x00; ROW_SIZE]);
        let len = value.len().min(ROW_SIZE);
        buf[..len].copy_from_slice(&value[..len]);
        KeyValuePair { key, value: buf }
    }

    pub fn from_row(row: &Row) -> Result<KeyValuePair> {
        let mut value = Box::new([0x00; ROW_SIZE]);
        row.serialize(&mut value[..])?;
        Ok(KeyValuePair { key: row.id, value })
    }
}

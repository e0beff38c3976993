use crate::error::{Error, Result};
use crate::page_layout::{
    EMAIL_OFFSET, EMAIL_SIZE, ID_OFFSET, ID_SIZE, ROW_SIZE, USERNAME_OFFSET, USERNAME_SIZE,
};
use byteorder::{ByteOrder, LittleEndian};
use std::fmt;

/// A row of the single table: `id` doubles as the B-tree key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub id: u32,
    pub username: String,
    pub email: String,
}

impl Row {
    pub fn new(id: u32, username: impl Into<String>, email: impl Into<String>) -> Result<Row> {
        let row = Row {
            id,
            username: username.into(),
            email: email.into(),
        };
        row.validate()?;
        Ok(row)
    }

    /// Checks both text columns fit their fixed width.
    ///
    /// Text is stored zero padded, so an embedded NUL byte could not be told
    /// apart from the padding and is rejected as well.
    pub fn validate(&self) -> Result<()> {
        check_column("username", &self.username, USERNAME_SIZE)?;
        check_column("email", &self.email, EMAIL_SIZE)
    }

    /// Encodes the row into exactly `ROW_SIZE` bytes of `destination`.
    pub fn serialize(&self, destination: &mut [u8]) -> Result<()> {
        self.validate()?;
        if destination.len() < ROW_SIZE {
            return Err(Error::RowInvalid(format!(
                "destination holds {} bytes, a row needs {}",
                destination.len(),
                ROW_SIZE
            )));
        }
        let destination = &mut destination[..ROW_SIZE];
        destination.fill(0x00);
        LittleEndian::write_u32(&mut destination[ID_OFFSET..ID_OFFSET + ID_SIZE], self.id);
        destination[USERNAME_OFFSET..USERNAME_OFFSET + self.username.len()]
            .copy_from_slice(self.username.as_bytes());
        destination[EMAIL_OFFSET..EMAIL_OFFSET + self.email.len()]
            .copy_from_slice(self.email.as_bytes());
        Ok(())
    }

    pub fn deserialize(source: &[u8]) -> Result<Row> {
        if source.len() < ROW_SIZE {
            return Err(Error::RowInvalid(format!(
                "source holds {} bytes, a row needs {}",
                source.len(),
                ROW_SIZE
            )));
        }
        Ok(Row {
            id: LittleEndian::read_u32(&source[ID_OFFSET..ID_OFFSET + ID_SIZE]),
            username: read_column(&source[USERNAME_OFFSET..USERNAME_OFFSET + USERNAME_SIZE])?,
            email: read_column(&source[EMAIL_OFFSET..EMAIL_OFFSET + EMAIL_SIZE])?,
        })
    }
}

fn check_column(name: &str, value: &str, max: usize) -> Result<()> {
    if value.len() > max {
        return Err(Error::RowInvalid(format!(
            "{} is {} bytes, at most {} allowed",
            name,
            value.len(),
            max
        )));
    }
    if value.as_bytes().contains(&0x00) {
        return Err(Error::RowInvalid(format!("{} contains a NUL byte", name)));
    }
    Ok(())
}

fn read_column(bytes: &[u8]) -> Result<String> {
    let len = bytes.iter().position(|b| *b == 0x00).unwrap_or(bytes.len());
    Ok(String::from_utf8(bytes[..len].to_vec())?)
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.id, self.username, self.email)
    }
}

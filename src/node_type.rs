use std::fmt;

// NodeType Represents different node types in the BTree.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum NodeType {
    /// Leaf nodes contain key and row cells.
    Leaf,

    /// Internal nodes contain child pointers and separator keys.
    Internal,
}

// Converts a byte to a NodeType, handing the unrecognized byte back on failure.
impl TryFrom<u8> for NodeType {
    type Error = u8;

    fn try_from(orig: u8) -> Result<NodeType, u8> {
        match orig {
            0x00 => Ok(NodeType::Leaf),
            0x01 => Ok(NodeType::Internal),
            other => Err(other),
        }
    }
}

// Converts a NodeType to a byte.
impl From<NodeType> for u8 {
    fn from(orig: NodeType) -> u8 {
        match orig {
            NodeType::Leaf => 0x00,
            NodeType::Internal => 0x01,
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeType::Leaf => write!(f, "leaf"),
            NodeType::Internal => write!(f, "internal"),
        }
    }
}

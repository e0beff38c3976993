use crate::error::{Error, Result};
use crate::node_type::NodeType;
use crate::page_layout::{
    FromByte, ToByte, INTERNAL_NODE_CELL_SIZE, INTERNAL_NODE_CHILD_SIZE, INTERNAL_NODE_HEADER_SIZE,
    INTERNAL_NODE_MAX_KEYS, INTERNAL_NODE_NUM_KEYS_OFFSET, INTERNAL_NODE_RIGHT_CHILD_OFFSET,
    IS_ROOT_OFFSET, LEAF_NODE_CELL_SIZE, LEAF_NODE_HEADER_SIZE, LEAF_NODE_KEY_OFFSET,
    LEAF_NODE_MAX_CELLS, LEAF_NODE_NEXT_LEAF_OFFSET, LEAF_NODE_NUM_CELLS_OFFSET,
    LEAF_NODE_VALUE_OFFSET, LEAF_NODE_VALUE_SIZE, NODE_TYPE_OFFSET, PAGE_SIZE,
    PARENT_POINTER_OFFSET, PTR_SIZE,
};
use byteorder::{ByteOrder, LittleEndian};

/// Page is a wrapper for a single page of memory
/// providing some helpful helpers for quick access.
///
/// All node field accessors are plain offset arithmetic over the buffer;
/// they assume the caller already knows which kind of node the page holds
/// (see [`Page::check`]).
#[derive(Clone)]
pub struct Page {
    data: Box<[u8; PAGE_SIZE]>,
}

impl Page {
    pub fn new(data: [u8; PAGE_SIZE]) -> Page {
        Page {
            data: Box::new(data),
        }
    }

    pub fn zeroed() -> Page {
        Page::new([0x00; PAGE_SIZE])
    }

    /// Copies a page worth of bytes; shorter input is zero padded.
    pub fn from_bytes(bytes: &[u8]) -> Page {
        let mut page = Page::zeroed();
        let len = bytes.len().min(PAGE_SIZE);
        page.data[..len].copy_from_slice(&bytes[..len]);
        page
    }

    pub fn get_bytes(&self) -> &[u8] {
        &self.data[..]
    }

    /// Fetches a little endian u32 stored at `offset`.
    pub fn get_value_from_offset(&self, offset: usize) -> u32 {
        LittleEndian::read_u32(&self.data[offset..offset + PTR_SIZE])
    }

    pub fn set_value_at_offset(&mut self, offset: usize, value: u32) {
        LittleEndian::write_u32(&mut self.data[offset..offset + PTR_SIZE], value)
    }

    // Common node header.

    pub fn node_type_byte(&self) -> u8 {
        self.data[NODE_TYPE_OFFSET]
    }

    pub fn set_node_type(&mut self, node_type: NodeType) {
        self.data[NODE_TYPE_OFFSET] = node_type.into();
    }

    pub fn is_root(&self) -> bool {
        self.data[IS_ROOT_OFFSET].from_byte()
    }

    pub fn set_root(&mut self, is_root: bool) {
        self.data[IS_ROOT_OFFSET] = is_root.to_byte();
    }

    pub fn parent(&self) -> u32 {
        self.get_value_from_offset(PARENT_POINTER_OFFSET)
    }

    pub fn set_parent(&mut self, parent: u32) {
        self.set_value_at_offset(PARENT_POINTER_OFFSET, parent)
    }

    /// Validates the node type tag and the cell/key count of this page.
    ///
    /// Every node reading site goes through here first, so a page holding an
    /// unknown tag or an impossible count is reported instead of being read
    /// past its end.
    pub fn check(&self, page_num: u32) -> Result<NodeType> {
        let node_type = NodeType::try_from(self.node_type_byte()).map_err(|tag| {
            Error::corrupt(page_num, format!("unrecognized node type tag {:#04x}", tag))
        })?;
        match node_type {
            NodeType::Leaf if self.leaf_num_cells() > LEAF_NODE_MAX_CELLS => Err(Error::corrupt(
                page_num,
                format!("leaf claims {} cells", self.leaf_num_cells()),
            )),
            NodeType::Internal if self.internal_num_keys() > INTERNAL_NODE_MAX_KEYS => {
                Err(Error::corrupt(
                    page_num,
                    format!("internal node claims {} keys", self.internal_num_keys()),
                ))
            }
            _ => Ok(node_type),
        }
    }

    // Leaf node layout.

    pub fn leaf_num_cells(&self) -> usize {
        self.get_value_from_offset(LEAF_NODE_NUM_CELLS_OFFSET) as usize
    }

    pub fn set_leaf_num_cells(&mut self, num_cells: usize) {
        self.set_value_at_offset(LEAF_NODE_NUM_CELLS_OFFSET, num_cells as u32)
    }

    /// Page number of the right sibling leaf; zero terminates the chain.
    pub fn leaf_next_leaf(&self) -> u32 {
        self.get_value_from_offset(LEAF_NODE_NEXT_LEAF_OFFSET)
    }

    pub fn set_leaf_next_leaf(&mut self, next_leaf: u32) {
        self.set_value_at_offset(LEAF_NODE_NEXT_LEAF_OFFSET, next_leaf)
    }

    fn leaf_cell_offset(cell_num: usize) -> usize {
        LEAF_NODE_HEADER_SIZE + cell_num * LEAF_NODE_CELL_SIZE
    }

    pub fn leaf_key(&self, cell_num: usize) -> u32 {
        self.get_value_from_offset(Page::leaf_cell_offset(cell_num) + LEAF_NODE_KEY_OFFSET)
    }

    pub fn set_leaf_key(&mut self, cell_num: usize, key: u32) {
        self.set_value_at_offset(Page::leaf_cell_offset(cell_num) + LEAF_NODE_KEY_OFFSET, key)
    }

    pub fn leaf_value(&self, cell_num: usize) -> &[u8] {
        let offset = Page::leaf_cell_offset(cell_num) + LEAF_NODE_VALUE_OFFSET;
        &self.data[offset..offset + LEAF_NODE_VALUE_SIZE]
    }

    pub fn leaf_value_mut(&mut self, cell_num: usize) -> &mut [u8] {
        let offset = Page::leaf_cell_offset(cell_num) + LEAF_NODE_VALUE_OFFSET;
        &mut self.data[offset..offset + LEAF_NODE_VALUE_SIZE]
    }

    /// Moves cells `[from, num_cells)` one slot to the right, opening a gap
    /// at `from`. The caller guarantees there is room for one more cell.
    pub fn leaf_shift_cells_right(&mut self, from: usize) {
        let num_cells = self.leaf_num_cells();
        if from >= num_cells {
            return;
        }
        let start = Page::leaf_cell_offset(from);
        let end = Page::leaf_cell_offset(num_cells);
        self.data.copy_within(start..end, start + LEAF_NODE_CELL_SIZE);
    }

    // Internal node layout.

    pub fn internal_num_keys(&self) -> usize {
        self.get_value_from_offset(INTERNAL_NODE_NUM_KEYS_OFFSET) as usize
    }

    pub fn set_internal_num_keys(&mut self, num_keys: usize) {
        self.set_value_at_offset(INTERNAL_NODE_NUM_KEYS_OFFSET, num_keys as u32)
    }

    pub fn internal_right_child(&self) -> u32 {
        self.get_value_from_offset(INTERNAL_NODE_RIGHT_CHILD_OFFSET)
    }

    pub fn set_internal_right_child(&mut self, right_child: u32) {
        self.set_value_at_offset(INTERNAL_NODE_RIGHT_CHILD_OFFSET, right_child)
    }

    fn internal_cell_offset(cell_num: usize) -> usize {
        INTERNAL_NODE_HEADER_SIZE + cell_num * INTERNAL_NODE_CELL_SIZE
    }

    pub fn internal_child(&self, cell_num: usize) -> u32 {
        self.get_value_from_offset(Page::internal_cell_offset(cell_num))
    }

    pub fn set_internal_child(&mut self, cell_num: usize, child: u32) {
        self.set_value_at_offset(Page::internal_cell_offset(cell_num), child)
    }

    pub fn internal_key(&self, cell_num: usize) -> u32 {
        self.get_value_from_offset(Page::internal_cell_offset(cell_num) + INTERNAL_NODE_CHILD_SIZE)
    }

    pub fn set_internal_key(&mut self, cell_num: usize, key: u32) {
        self.set_value_at_offset(
            Page::internal_cell_offset(cell_num) + INTERNAL_NODE_CHILD_SIZE,
            key,
        )
    }

    /// Child pointer by position, where position `num_keys` is the rightmost child.
    pub fn internal_child_at(&self, child_num: usize) -> u32 {
        if child_num == self.internal_num_keys() {
            self.internal_right_child()
        } else {
            self.internal_child(child_num)
        }
    }
}

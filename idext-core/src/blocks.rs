use std::collections::HashMap;

/// What the storage layer needs to know about a registered block type
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub struct BlockInfo {
    pub air: bool,
    pub ticks_randomly: bool
}

impl BlockInfo {
    pub const AIR: BlockInfo = BlockInfo { air: true, ticks_randomly: false };
    pub const SOLID: BlockInfo = BlockInfo { air: false, ticks_randomly: false };
    pub const TICKING: BlockInfo = BlockInfo { air: false, ticks_randomly: true };
}

/// Block type lookup provided by the host game
pub trait BlockRegistry {
    /// `None` if no block type is registered under `id`
    fn block(&self, id: u16) -> Option<BlockInfo>;
}

impl<F> BlockRegistry for F
    where F: Fn(u16) -> Option<BlockInfo> {

    fn block(&self, id: u16) -> Option<BlockInfo> {
        self(id)
    }
}

/// Registry backed by a plain table
#[derive(Clone, Debug, Default)]
pub struct BlockTable {
    blocks: HashMap<u16, BlockInfo>
}

impl BlockTable {
    pub fn new() -> Self {
        let mut blocks = HashMap::new();
        blocks.insert(0, BlockInfo::AIR);
        BlockTable { blocks }
    }

    pub fn register(&mut self, id: u16, info: BlockInfo) -> &mut Self {
        self.blocks.insert(id, info);
        self
    }
}

impl BlockRegistry for BlockTable {
    fn block(&self, id: u16) -> Option<BlockInfo> {
        self.blocks.get(&id).copied()
    }
}

/// Registers every id as a plain solid block
pub struct AllSolid;

impl BlockRegistry for AllSolid {
    fn block(&self, id: u16) -> Option<BlockInfo> {
        if id == 0 {
            Some(BlockInfo::AIR)
        }
        else {
            Some(BlockInfo::SOLID)
        }
    }
}

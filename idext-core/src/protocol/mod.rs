//! Packets that carry block data

pub mod block_change;
pub mod chunk_data;

pub mod chunk;
pub mod persistence;

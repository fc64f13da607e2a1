pub mod blocks;
pub mod config;
pub mod export;
pub mod generation;
pub mod persistence;
pub mod world_store;

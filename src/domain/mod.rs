pub mod board;
pub mod scoring;
pub mod tile;
pub mod timer;

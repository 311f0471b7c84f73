//! On-disk state shared by every command: the install layout and the JavaFX cache.

pub mod cache;
pub mod paths;

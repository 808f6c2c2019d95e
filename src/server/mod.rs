pub mod config;
pub mod group_broadcaster;

//! # Data Transfer Objects

pub mod sync_config;

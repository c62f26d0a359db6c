//! Application services: cached reads, write commands and recommendations.

pub mod commands;
pub mod error;
pub mod pagination;
pub mod posts;
pub mod recommendations;
pub mod repos;

//! Social feed backend core: cached post reads, invalidation and recommendations.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;

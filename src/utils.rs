pub mod config;
pub mod errors;
pub mod wiki_utils;

pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod fs_util;
pub mod known;
pub mod manager;
pub mod oracle;
pub mod output;
pub mod priority;
pub mod resolver;
pub mod schemes;

pub mod completions;
pub mod config;
pub mod init;
pub mod options;
pub mod query;
pub mod request;

pub mod cli;
pub mod config;
pub mod detect;
pub mod error;
pub mod git;
pub mod ingest;
pub mod model;
pub mod parsers;
pub mod paths;
pub mod upload;

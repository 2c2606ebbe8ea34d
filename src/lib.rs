//! Discography archiver library - page parsing, discovery and output
//! shared by all binaries.

pub mod archive;
pub mod art;
pub mod classify;
pub mod config;
pub mod covers;
pub mod decode;
pub mod discover;
pub mod fetch;
pub mod files;
pub mod locate;
pub mod models;
pub mod progress;
pub mod reconcile;
pub mod release;
pub mod text;
pub mod tracks;

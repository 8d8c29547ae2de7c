//! Blackbird - manage large multi-component media datasets
//!
//! A dataset is a tree of `Artist/Album[/CDn]` directories whose files
//! cluster into tracks by base name and classify into components by
//! file-name pattern. Datasets may span several storage locations and
//! mirror to WebDAV servers; this crate provides the schema discovery,
//! the multi-location index, and the resumable transfer engines.

pub mod dataset;
pub mod error;
pub mod index;
pub mod locations;
pub mod mover;
pub mod operations;
pub mod schema;
pub mod streaming;
pub mod sync;
pub mod utils;
pub mod webdav;

#[cfg(test)]
mod testserver;

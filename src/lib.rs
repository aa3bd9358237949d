//! chatlog-forge library.
//!
//! Formatting engine, coloring palette, overlay transforms and PNG export,
//! driven through [`core::Session`]. The `chatlog-forge` binary is a thin
//! command-line front end over this crate.

pub mod background;
pub mod censor;
pub mod classifier;
pub mod clipboard;
pub mod config;
pub mod core;
pub mod dom;
pub mod events;
pub mod export;
pub mod linebreak;
pub mod markup;
pub mod overlay;
pub mod sanitize;
pub mod selection;
pub mod store;
pub mod theme;
pub mod words;

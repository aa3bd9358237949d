//! Core formatting logic and session state
//!
//! Nothing in here touches a terminal, a window or the clipboard. Frontends
//! feed a [`Session`] and render what it exposes.

pub mod debounce;
pub mod pipeline;
pub mod session;

pub use debounce::{Change, RecomputeScheduler};
pub use pipeline::{ChatFormatter, FormatOptions};
pub use session::Session;

//! Terminal front end for the interactive picker.
//!
//! This module provides:
//! - `picker`, the event loop that drives a `SearchSession`
//! - `draw`, rendering of the input, candidate list and status line
//! - `keys`, matching of configured key bindings against terminal events

mod draw;
pub mod keys;
pub mod picker;

//! Filesystem utilities for nodelocker.
//!
//! The file-backed store relies on these to make every record update
//! all-or-nothing: a reader sees either the previous document or the new one.

pub mod atomic;

pub use atomic::{atomic_write, remove_if_exists, unique_suffix};

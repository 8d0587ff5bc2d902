//! ui
//!
//! User interaction utilities.
//!
//! # Modules
//!
//! - [`output`] - Output formatting and display
//!
//! # Design
//!
//! All status output goes through this module so the quiet flag is honoured
//! in one place. qyt never prompts: apply is driven entirely by flags.

pub mod output;

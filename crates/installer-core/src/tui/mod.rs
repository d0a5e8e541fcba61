//! Terminal prompts and report rendering using cliclack
//!
//! This module is optional and only available when the `tui` feature is enabled.

#[cfg(feature = "tui")]
mod prompts;
#[cfg(feature = "tui")]
mod render;

#[cfg(feature = "tui")]
pub use prompts::PromptDecider;
#[cfg(feature = "tui")]
pub use render::{overview_text, print_report, report_lines};

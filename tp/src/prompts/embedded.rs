//! Embedded prompts
//!
//! These are compiled into the binary from .pmt files at build time.

use tracing::debug;

/// Intent classification prompt
pub const INTENT: &str = include_str!("../../prompts/intent.pmt");

/// Whole-plan revision prompt
pub const REVISE: &str = include_str!("../../prompts/revise.pmt");

/// Get the embedded prompt by name
pub fn get_embedded(name: &str) -> Option<&'static str> {
    debug!(%name, "get_embedded: called");
    match name {
        "intent" => Some(INTENT),
        "revise" => Some(REVISE),
        _ => {
            debug!("get_embedded: no match found");
            None
        }
    }
}

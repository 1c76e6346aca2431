//! Results reporting
//!
//! Everything here except [`persist`] is pure: it takes results and returns
//! text, and the caller decides where the text goes.

pub mod console;
pub mod persist;
pub mod summary;

pub use console::{render_banner, render_comparison, Tone};
pub use persist::{persist, slugify, CombinedReport, PersistError};
pub use summary::{render_summary, summarize, ScoreAverages, SummaryReport, SummaryRow};

/// Format a number the way it reads best in a table: `7`, `7.5`, `-0.33`
pub fn fmt_number(value: f64) -> String {
    format!("{}", crate::cases::round_to(value, 2))
}

/// Leading `+` for positive values
pub fn fmt_signed(value: f64) -> String {
    if value > 0.0 {
        format!("+{}", fmt_number(value))
    } else {
        fmt_number(value)
    }
}

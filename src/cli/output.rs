use std::fmt::Display;

use colored::{ColoredString, Colorize};

fn marked(mark: ColoredString, msg: &str) {
    println!("  {mark} {msg}");
}

/// Print a success message.
pub fn success(msg: &str) {
    marked("✓".green(), msg);
}

/// Print a warning message.
pub fn warning(msg: &str) {
    marked("⚠".yellow(), msg);
}

/// Print a warning to stderr, keeping stdout machine-readable.
pub fn warning_stderr(msg: &str) {
    eprintln!("  {} {msg}", "⚠".yellow());
}

/// Print an error message to stderr.
pub fn error(msg: &str) {
    eprintln!("  {} {msg}", "✗".red());
}

/// Print a header line.
pub fn header(msg: &str) {
    println!("\n{}", msg.bold());
}

/// Print a `Label: value` line with the value highlighted.
pub fn field(label: &str, value: impl Display) {
    println!("  {label}: {}", value.to_string().cyan());
}

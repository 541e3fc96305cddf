//! Terminal output
//!
//! Status lines respect `NO_COLOR`. Entries are rendered in an LDIF-like
//! text form or as JSON.

use serde::Serialize;

use diradmin_connector::operation::DirectoryEntry;

/// Whether to emit ANSI colours
pub fn use_color() -> bool {
    std::env::var("NO_COLOR").is_err()
}

/// Print a success message with green checkmark
pub fn print_success(message: &str) {
    if use_color() {
        println!("\x1b[32m✓\x1b[0m {}", message);
    } else {
        println!("✓ {}", message);
    }
}

/// Print a warning message to stderr
pub fn print_warning(message: &str) {
    if use_color() {
        eprintln!("\x1b[33m!\x1b[0m {}", message);
    } else {
        eprintln!("! {}", message);
    }
}

/// Print an informational message to stderr
pub fn print_info(message: &str) {
    if use_color() {
        eprintln!("\x1b[36mi\x1b[0m {}", message);
    } else {
        eprintln!("i {}", message);
    }
}

/// Print a key-value pair with aligned formatting
pub fn print_key_value(key: &str, value: &str) {
    if use_color() {
        println!("  \x1b[2m{:<12}\x1b[0m {}", key, value);
    } else {
        println!("  {:<12} {}", key, value);
    }
}

/// Render one entry as LDIF-style text, terminated by a blank line.
///
/// Binary values are summarized by size.
pub fn format_entry(entry: &DirectoryEntry) -> String {
    let mut out = format!("dn: {}\n", entry.dn);
    for (name, values) in &entry.attributes {
        for value in values {
            out.push_str(&format!("{}: {}\n", name, value));
        }
    }
    for (name, values) in &entry.binary_attributes {
        for value in values {
            out.push_str(&format!("{}:: <{} bytes>\n", name, value.len()));
        }
    }
    out.push('\n');
    out
}

/// Print entries in text form.
pub fn print_entries(entries: &[DirectoryEntry]) {
    for entry in entries {
        print!("{}", format_entry(entry));
    }
}

/// Print any serializable value as pretty JSON.
pub fn print_json<T: Serialize>(value: &T) -> serde_json::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

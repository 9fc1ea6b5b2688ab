//! Parsing what the engine prints.

use std::sync::OnceLock;

use regex::Regex;

/// Split stdout into a table: one row per non-empty line, one cell per tab
/// field. The first row is the parameter-name header.
pub fn parse_table(stdout: &str) -> Vec<Vec<String>> {
    stdout
        .lines()
        .filter(|line| !line.is_empty())
        .map(|line| line.split('\t').map(str::to_string).collect())
        .collect()
}

/// Classified stderr content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    /// Seed the engine reports having used for randomized generation.
    pub used_seed: Option<i64>,
    /// Warning messages, continuation lines joined with `\n`.
    pub warnings: Vec<String>,
    /// Anything else the engine printed.
    pub errors: Vec<String>,
}

impl Diagnostics {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

fn used_seed_line() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)^\s*used seed:\s*(-?\d+)\s*$").unwrap())
}

fn warning_line() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)\bwarning\s*:").unwrap())
}

#[derive(Clone, Copy)]
enum Current {
    Warning,
    Error,
}

/// Classify stderr lines.
///
/// Lines starting with whitespace continue the previous warning or error.
pub fn parse_diagnostics(stderr: &str) -> Diagnostics {
    let mut diagnostics = Diagnostics::default();
    let mut current: Option<Current> = None;

    for line in stderr.lines() {
        if line.trim().is_empty() {
            current = None;
            continue;
        }

        if line.starts_with(char::is_whitespace) {
            let target = match current {
                Some(Current::Warning) => diagnostics.warnings.last_mut(),
                Some(Current::Error) => diagnostics.errors.last_mut(),
                None => None,
            };
            if let Some(message) = target {
                message.push('\n');
                message.push_str(line.trim());
                continue;
            }
        }

        if let Some(caps) = used_seed_line().captures(line) {
            diagnostics.used_seed = caps[1].parse().ok();
            current = None;
        } else if warning_line().is_match(line) {
            diagnostics.warnings.push(line.trim().to_string());
            current = Some(Current::Warning);
        } else {
            diagnostics.errors.push(line.trim().to_string());
            current = Some(Current::Error);
        }
    }

    diagnostics
}

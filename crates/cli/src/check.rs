use std::path::Path;

use parley_config::{ParleyConfig, Severity, ValidationResult, validate};

/// ANSI color codes.
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Print diagnostics for `config`. Returns `false` when any error was found.
pub fn check(config: &ParleyConfig, path: Option<&Path>) -> bool {
    match path {
        Some(path) => eprintln!("Checking {}\n", path.display()),
        None => eprintln!("Checking discovered configuration and environment\n"),
    }

    let result = validate(config);
    for line in render(&result) {
        eprintln!("  {line}");
    }

    let errors = count(&result, Severity::Error);
    let warnings = count(&result, Severity::Warning);
    if errors == 0 && warnings == 0 {
        eprintln!("No issues found.");
    } else {
        eprintln!("\n{errors} error(s), {warnings} warning(s)");
    }

    !result.has_errors()
}

fn render(result: &ValidationResult) -> Vec<String> {
    result
        .diagnostics
        .iter()
        .map(|d| {
            let color = match d.severity {
                Severity::Error => RED,
                Severity::Warning => YELLOW,
            };
            format!("{BOLD}{color}{}{RESET} {}: {}", d.severity, d.path, d.message)
        })
        .collect()
}

fn count(result: &ValidationResult, severity: Severity) -> usize {
    result
        .diagnostics
        .iter()
        .filter(|d| d.severity == severity)
        .count()
}

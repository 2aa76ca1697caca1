//! Integration Test: Blocking I/O Prohibition
//!
//! **Policy**: async functions in the relay crates MUST NOT block the runtime.
//! **Required**: `tokio::fs`, `tokio::io`, async `reqwest`.
//! Plain functions that run before the runtime matters (config loading) may
//! use `std::fs`.

use std::fs;
use std::path::Path;

use architectural_enforcement::{workspace_path, PRODUCTION_DIRS};

const FORBIDDEN_IN_ASYNC: &[(&str, &str)] = &[
    ("std::fs::", "Blocking file I/O"),
    ("std::net::", "Blocking network I/O"),
    ("std::process::Command", "Blocking process I/O"),
    ("std::io::stdin()", "Blocking stdin"),
    ("std::io::stdout()", "Blocking stdout"),
    ("block_on(", "Nested runtime"),
];

#[test]
fn test_no_blocking_io_in_production_code() {
    let mut violations = Vec::new();
    for dir in PRODUCTION_DIRS {
        let dir = workspace_path(dir);
        if !dir.exists() {
            continue;
        }
        for entry in walkdir::WalkDir::new(&dir).into_iter().filter_map(Result::ok) {
            if entry.path().extension().and_then(|s| s.to_str()) == Some("rs") {
                check_file(entry.path(), &mut violations);
            }
        }
    }

    if !violations.is_empty() {
        eprintln!("\n❌ Blocking I/O found in async production code!\n");
        for violation in &violations {
            eprintln!("  ❌ {violation}");
        }
        eprintln!("\n✅ REQUIRED async I/O:");
        eprintln!("  - tokio::fs, tokio::io::stdout(), reqwest async client");

        panic!("\nFound {} blocking I/O violation(s) in production code.", violations.len());
    }
}

fn check_file(path: &Path, violations: &mut Vec<String>) {
    let Ok(content) = fs::read_to_string(path) else {
        return;
    };
    let lines: Vec<&str> = content.lines().collect();

    for (idx, line) in lines.iter().enumerate() {
        if line.trim() == "#[cfg(test)]" {
            break;
        }
        let code = line.split("//").next().unwrap_or(line);

        if code.contains("reqwest::blocking") {
            violations.push(format!("{}:{} - Blocking HTTP client: {}", path.display(), idx + 1, line.trim()));
            continue;
        }

        if !is_in_async_function(&lines, idx) {
            continue;
        }
        for (pattern, label) in FORBIDDEN_IN_ASYNC {
            if code.contains(pattern) {
                violations.push(format!("{}:{} - {label}: {}", path.display(), idx + 1, line.trim()));
            }
        }
    }
}

/// Whether the nearest enclosing `fn` above the line is async
fn is_in_async_function(lines: &[&str], current_idx: usize) -> bool {
    for line in lines[..=current_idx].iter().rev() {
        let line = line.trim();
        if line.starts_with("//") {
            continue;
        }
        if line.contains("async fn ") {
            return true;
        }
        if line.contains("fn ") {
            return false;
        }
        if line.starts_with("mod ") || (line.starts_with("impl") && line.ends_with('{')) {
            return false;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_async_function_detection() {
        let code = [
            "pub async fn load() {",
            "    let contents = std::fs::read_to_string(\"file.txt\")?;",
            "}",
        ];
        assert!(is_in_async_function(&code, 1));
    }

    #[test]
    fn test_plain_function_is_acceptable() {
        let code = [
            "pub fn load_config_from_path(path: Option<PathBuf>) -> Result<RelayConfig, ConfigError> {",
            "    let content = std::fs::read_to_string(path)?;",
            "}",
        ];
        assert!(!is_in_async_function(&code, 1));
    }

    #[test]
    fn test_impl_boundary_stops_scan() {
        let code = ["async fn before() {}", "impl Store {", "    const X: u8 = 1;"];
        assert!(!is_in_async_function(&code, 2));
    }
}

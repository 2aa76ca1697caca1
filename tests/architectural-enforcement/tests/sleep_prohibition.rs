//! Integration Test: Sleep Prohibition
//!
//! **Policy**: Production code in the relay crates MUST NOT sleep to wait for
//! work. Streams are driven by I/O readiness and channel wakeups.
//! **Exceptions**: retry backoff in the HTTP adapter, scripted latency in the
//! test adapter, test code.

use std::fs;
use std::path::Path;

use architectural_enforcement::{workspace_path, PRODUCTION_DIRS};

/// Files where a timed sleep is the point
const SLEEP_ALLOWED: &[&str] = &["backend/http.rs", "backend/mock.rs"];

#[test]
fn test_no_sleep_in_production_code() {
    let mut violations = Vec::new();
    for dir in PRODUCTION_DIRS {
        check_directory(&workspace_path(dir), &mut violations);
    }

    if !violations.is_empty() {
        eprintln!("\n❌ Sleep calls found in production code!\n");
        for violation in &violations {
            eprintln!("  ❌ {violation}");
        }
        eprintln!("\n✅ ACCEPTABLE sleep uses:");
        eprintln!("  - Exponential backoff between upstream attempts");
        eprintln!("  - Scripted adapter latency");
        eprintln!("  - Test code");
        eprintln!("\n❌ FORBIDDEN:");
        eprintln!("  - Sleep in polling loops");
        eprintln!("  - std::thread::sleep anywhere");

        panic!("\nFound {} sleep violation(s) in production code.", violations.len());
    }
}

fn check_directory(dir: &Path, violations: &mut Vec<String>) {
    if !dir.exists() {
        return;
    }

    for entry in walkdir::WalkDir::new(dir).into_iter().filter_map(Result::ok) {
        if entry.path().extension().and_then(|s| s.to_str()) == Some("rs") {
            check_file(entry.path(), violations);
        }
    }
}

fn check_file(path: &Path, violations: &mut Vec<String>) {
    let Ok(content) = fs::read_to_string(path) else {
        return;
    };
    let allowed = SLEEP_ALLOWED.iter().any(|suffix| path.ends_with(suffix));

    for (idx, line) in production_lines(&content) {
        let code = line.split("//").next().unwrap_or(line);

        if code.contains("thread::sleep") {
            violations.push(format!("{}:{} - Blocking sleep: {}", path.display(), idx + 1, line.trim()));
        } else if code.contains("time::sleep(") && !allowed {
            violations.push(format!("{}:{} - Async sleep: {}", path.display(), idx + 1, line.trim()));
        }
    }
}

/// Lines before the first `#[cfg(test)]` module
fn production_lines(content: &str) -> impl Iterator<Item = (usize, &str)> {
    content
        .lines()
        .enumerate()
        .take_while(|(_, line)| line.trim() != "#[cfg(test)]")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_test_module_is_skipped() {
        let source = "fn run() {}\n#[cfg(test)]\nmod tests {\n    fn t() { std::thread::sleep(d); }\n}\n";
        let lines: Vec<_> = production_lines(source).collect();
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn test_allow_list_matches_path_suffix() {
        let path = Path::new("/work/relay/core/src/backend/http.rs");
        assert!(SLEEP_ALLOWED.iter().any(|suffix| path.ends_with(suffix)));
        let path = Path::new("/work/relay/core/src/bus.rs");
        assert!(!SLEEP_ALLOWED.iter().any(|suffix| path.ends_with(suffix)));
    }
}

//! `chatsync check`: config validation report.

use chatsync_config::{Severity, ValidationResult};

const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const GREEN: &str = "\x1b[32m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

fn color(severity: Severity) -> &'static str {
    match severity {
        Severity::Error => RED,
        Severity::Warning => YELLOW,
        Severity::Info => CYAN,
    }
}

pub fn render_report(report: &ValidationResult) -> String {
    let mut out = String::new();
    let source = report
        .config_path
        .as_ref()
        .map_or_else(|| "defaults".to_string(), |p| p.display().to_string());
    out.push_str(&format!("{BOLD}Config{RESET} {source}\n"));

    let mut diagnostics: Vec<_> = report.diagnostics.iter().collect();
    diagnostics.sort_by_key(|d| d.severity);
    for d in diagnostics {
        let color = color(d.severity);
        let path = if d.path.is_empty() {
            String::new()
        } else {
            format!(" {}:", d.path)
        };
        out.push_str(&format!(
            "  {color}[{}]{RESET}{path} {}\n",
            d.severity, d.message
        ));
    }

    let errors = report.count(Severity::Error);
    let warnings = report.count(Severity::Warning);
    if errors == 0 && warnings == 0 {
        out.push_str(&format!("  {GREEN}[ok]{RESET} no problems found\n"));
    } else {
        out.push_str(&format!("\n{errors} error(s), {warnings} warning(s)\n"));
    }
    out
}

pub fn print_report(report: &ValidationResult) {
    eprint!("{}", render_report(report));
}

pub fn log_warnings(report: &ValidationResult) {
    for d in report
        .diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Warning)
    {
        tracing::warn!(path = %d.path, category = d.category, "{}", d.message);
    }
}

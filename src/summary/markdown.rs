//! Markdown summary

use std::fmt::Write;

use crate::summary::Summary;

/// Keeps fenced bodies from closing the surrounding code fence
const FENCE_ESCAPE: &str = "\u{200b}```";

pub fn render(summary: &Summary) -> String {
    let mut out = String::new();
    let _ = write!(out, "# Summary for set: {}\n\n", summary.set);
    let _ = write!(out, "Generated: {}\n\n", summary.generated);
    let _ = write!(out, "Total fragments: {}\n\n", summary.entries.len());

    for entry in &summary.entries {
        let _ = write!(out, "## {} ({})\n\n", entry.id, entry.category);
        let _ = write!(out, "Fragment: `{}`\n\n", entry.file);

        let _ = writeln!(out, "Occurrences ({}):", entry.occurrences.len());
        if entry.occurrences.is_empty() {
            out.push_str("- none\n");
        }
        for occ in &entry.occurrences {
            let _ = writeln!(out, "- {}:{}", occ.file, occ.line);
        }
        out.push('\n');

        let body = entry.content.trim_end();
        if body.trim().is_empty() {
            out.push_str("Content: (empty)\n\n");
        } else {
            out.push_str("Content:\n\n```markdown\n");
            out.push_str(&body.replace("```", FENCE_ESCAPE));
            out.push_str("\n```\n\n");
        }
    }
    out
}

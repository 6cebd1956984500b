//! Renderer module
//!
//! Renders ResultSet to different output formats: jsonl, json, md, raw

use crate::core::model::{Kind, Range, ResultItem, ResultSet};

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Jsonl,
    Json,
    Markdown,
    Raw,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "jsonl" => Ok(OutputFormat::Jsonl),
            "json" => Ok(OutputFormat::Json),
            "md" | "markdown" => Ok(OutputFormat::Markdown),
            "raw" => Ok(OutputFormat::Raw),
            _ => Err(format!("Unknown format: {}", s)),
        }
    }
}

/// Render configuration combining format and options
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderConfig {
    pub format: OutputFormat,
    pub pretty: bool,
}

impl RenderConfig {
    /// Create a new render config with pretty option
    pub fn with_pretty(format: OutputFormat, pretty: bool) -> Self {
        Self { format, pretty }
    }
}

/// Renderer for result sets
pub struct Renderer {
    config: RenderConfig,
}

impl Renderer {
    /// Create a new renderer with render config
    pub fn with_config(config: RenderConfig) -> Self {
        Self { config }
    }

    /// Render a result set to a string
    pub fn render(&self, result_set: &ResultSet) -> String {
        match self.config.format {
            OutputFormat::Jsonl => self.render_jsonl(result_set),
            OutputFormat::Json => self.render_json(result_set),
            OutputFormat::Markdown => self.render_markdown(result_set),
            OutputFormat::Raw => self.render_raw(result_set),
        }
    }

    /// Render and print to stdout, skipping empty output
    pub fn print(&self, result_set: &ResultSet) {
        let output = self.render(result_set);
        if !output.is_empty() {
            println!("{}", output);
        }
    }

    /// Render as JSON Lines (one JSON object per line)
    fn render_jsonl(&self, result_set: &ResultSet) -> String {
        result_set
            .items
            .iter()
            .filter_map(|item| {
                if self.config.pretty {
                    serde_json::to_string_pretty(item).ok()
                } else {
                    serde_json::to_string(item).ok()
                }
            })
            .collect::<Vec<_>>()
            .join(if self.config.pretty { "\n\n" } else { "\n" })
    }

    /// Render as a single JSON array
    fn render_json(&self, result_set: &ResultSet) -> String {
        if self.config.pretty {
            serde_json::to_string_pretty(&result_set.items).unwrap_or_else(|_| "[]".to_string())
        } else {
            serde_json::to_string(&result_set.items).unwrap_or_else(|_| "[]".to_string())
        }
    }

    /// Render as Markdown, one section per kind
    fn render_markdown(&self, result_set: &ResultSet) -> String {
        const SECTIONS: [(Kind, &str); 7] = [
            (Kind::Marker, "Markers"),
            (Kind::Fragment, "Fragments"),
            (Kind::Occurrence, "Occurrences"),
            (Kind::Set, "Sets"),
            (Kind::Id, "Ids"),
            (Kind::Edit, "Edits"),
            (Kind::Summary, "Summaries"),
        ];

        let mut output = String::new();

        let errors: Vec<_> = result_set
            .items
            .iter()
            .filter(|i| i.kind == Kind::Error)
            .collect();
        if !errors.is_empty() {
            output.push_str("## Errors\n\n");
            for item in errors {
                for error in &item.errors {
                    output.push_str(&format!("- **{}**: {}\n", error.code, error.message));
                }
            }
            output.push('\n');
        }

        for (kind, title) in SECTIONS {
            let items: Vec<_> = result_set.items.iter().filter(|i| i.kind == kind).collect();
            if items.is_empty() {
                continue;
            }
            output.push_str(&format!("## {}\n\n", title));
            for item in items {
                self.render_item_md(&mut output, item);
            }
        }

        output
    }

    fn render_item_md(&self, output: &mut String, item: &ResultItem) {
        output.push_str("### ");
        if let Some(id) = &item.meta.id {
            output.push_str(id);
            if let Some(category) = &item.meta.category {
                output.push_str(&format!(" ({})", category));
            }
            output.push(' ');
        }
        if let Some(path) = &item.path {
            output.push_str(&format!("`{}`", path));
            if let Some(Range::Line(r)) = &item.range {
                output.push_str(&format!(":{}", r.start));
            }
        }
        output.push('\n');

        if let Some(excerpt) = &item.excerpt {
            output.push_str("\n```\n");
            output.push_str(excerpt);
            if !excerpt.ends_with('\n') {
                output.push('\n');
            }
            output.push_str("```\n");
        }

        if item.meta.truncated {
            output.push_str("\n> ⚠️ Content was truncated\n");
        }

        output.push('\n');
    }

    /// Render as raw output (for debugging)
    fn render_raw(&self, result_set: &ResultSet) -> String {
        result_set
            .items
            .iter()
            .filter_map(|item| item.excerpt.clone())
            .collect::<Vec<_>>()
            .join("\n---\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::ItemError;

    fn renderer(format: OutputFormat) -> Renderer {
        Renderer::with_config(RenderConfig::with_pretty(format, false))
    }

    #[test]
    fn test_render_jsonl() {
        let mut result_set = ResultSet::new();
        result_set.push(ResultItem::occurrence("src/a.ts", 3, "42"));
        result_set.push(ResultItem::occurrence("src/b.ts", 9, "42"));

        let output = renderer(OutputFormat::Jsonl).render(&result_set);

        assert!(output.contains("src/a.ts"));
        assert!(output.contains("src/b.ts"));
        assert_eq!(output.lines().count(), 2);
    }

    #[test]
    fn test_render_json() {
        let mut result_set = ResultSet::new();
        result_set.push(ResultItem::id("0"));

        let output = renderer(OutputFormat::Json).render(&result_set);

        assert!(output.starts_with('['));
        assert!(output.ends_with(']'));
    }

    #[test]
    fn test_render_markdown_sections() {
        let mut result_set = ResultSet::new();
        result_set.push(ResultItem::fragment(".cms/default/7.md", "7").with_category("TODO"));
        result_set.push(ResultItem::occurrence("src/a.ts", 3, "7"));
        result_set.push(ResultItem::error(ItemError::new("E", "boom")));

        let output = renderer(OutputFormat::Markdown).render(&result_set);

        assert!(output.starts_with("## Errors"));
        assert!(output.contains("## Fragments"));
        assert!(output.contains("### 7 (TODO) `.cms/default/7.md`"));
        assert!(output.contains("`src/a.ts`:3"));
    }

    #[test]
    fn test_render_raw_uses_excerpts() {
        let mut result_set = ResultSet::new();
        result_set.push(ResultItem::summary("SUMMARY.md", "# one"));
        result_set.push(ResultItem::id("1"));
        assert_eq!(renderer(OutputFormat::Raw).render(&result_set), "# one");
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("jsonl".parse::<OutputFormat>().unwrap(), OutputFormat::Jsonl);
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("MD".parse::<OutputFormat>().unwrap(), OutputFormat::Markdown);
        assert_eq!("raw".parse::<OutputFormat>().unwrap(), OutputFormat::Raw);
        assert!("xml".parse::<OutputFormat>().is_err());
    }
}

//! Summary API

use anyhow::{Context, Result};
use serde_json::json;

use crate::core::model::{ResultItem, ResultSet};
use crate::core::paths::display_relative;
use crate::core::render::{RenderConfig, Renderer};
use crate::core::session::Session;
use crate::summary::{collect, markdown, toml_doc, write_summary, MARKDOWN_FILE, TOML_FILE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryFormat {
    Markdown,
    Toml,
}

/// Summarize the active set, writing the document into the set directory
/// unless `write` is false
pub fn summarize(session: &Session, format: SummaryFormat, write: bool) -> Result<ResultSet> {
    let root = session.require_root("summarize set")?;
    let store = session.store("summarize set")?;
    let set = session.active_set();

    let summary = collect(root, session.config().cms_folder(), store, set);
    let (content, file_name) = match format {
        SummaryFormat::Markdown => (markdown::render(&summary), MARKDOWN_FILE),
        SummaryFormat::Toml => (
            toml_doc::render(&summary).context("Failed to render TOML summary")?,
            TOML_FILE,
        ),
    };

    let path = if write {
        write_summary(store, set, file_name, &content)?
    } else {
        store.set_dir(set).join(file_name)
    };

    let item = ResultItem::summary(display_relative(&path, root), content).with_data(json!({
        "set": set,
        "count": summary.entries.len(),
        "written": write,
    }));
    Ok(ResultSet::from_iter([item]))
}

pub fn run_summary(
    session: &Session,
    format: SummaryFormat,
    write: bool,
    render_config: RenderConfig,
) -> Result<()> {
    Renderer::with_config(render_config).print(&summarize(session, format, write)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_summary_written_to_set_dir() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        let session = Session::open(Some(root.into()), Config::default(), None).unwrap();
        session.store("x").unwrap().ensure("default", "1").unwrap();

        let result = summarize(&session, SummaryFormat::Markdown, true).unwrap();
        assert_eq!(result.items[0].path.as_deref(), Some(".cms/default/SUMMARY.md"));
        let written = fs::read_to_string(root.join(".cms/default/SUMMARY.md")).unwrap();
        assert!(written.starts_with("# Summary for set: default\n"));
        assert!(written.contains("## 1 (INFO)"));

        let dry = summarize(&session, SummaryFormat::Toml, false).unwrap();
        assert!(dry.items[0].excerpt.as_deref().unwrap().contains("count = 1"));
        assert!(!root.join(".cms/default/SUMMARY.toml").exists());
    }
}

//! TOML summary

use serde::{Deserialize, Serialize};

use crate::summary::Summary;

#[derive(Debug, Serialize, Deserialize)]
pub struct SummaryDoc {
    pub set: String,
    pub generated: String,
    pub count: usize,
    #[serde(default)]
    pub fragments: Vec<FragmentDoc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FragmentDoc {
    pub id: String,
    pub category: String,
    pub file: String,
    pub content: String,
    #[serde(default)]
    pub occurrences: Vec<OccurrenceDoc>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct OccurrenceDoc {
    pub file: String,
    pub line: u32,
}

impl From<&Summary> for SummaryDoc {
    fn from(summary: &Summary) -> Self {
        Self {
            set: summary.set.clone(),
            generated: summary.generated.clone(),
            count: summary.entries.len(),
            fragments: summary
                .entries
                .iter()
                .map(|entry| FragmentDoc {
                    id: entry.id.clone(),
                    category: entry.category.clone(),
                    file: entry.file.clone(),
                    content: entry.content.clone(),
                    occurrences: entry
                        .occurrences
                        .iter()
                        .map(|occ| OccurrenceDoc {
                            file: occ.file.clone(),
                            line: occ.line,
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

pub fn render(summary: &Summary) -> Result<String, toml::ser::Error> {
    toml::to_string(&SummaryDoc::from(summary))
}

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;

use crate::app::ports::{EventSource, ListingEntry};
use crate::error::{EngineError, Result};
use crate::types::{DetailFields, FragmentInput};

const UNKNOWN_SOURCE: &str = "unknown";

/// Read a JSON array of fragments, each optionally carrying a `detail`.
pub fn load_fragments(path: &Path) -> Result<Vec<FragmentInput>> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Fragments captured ahead of time, served as if they were a live site.
/// Detail records are addressed by their position in the listing.
#[derive(Debug, Clone)]
pub struct FileSource {
    key: String,
    inputs: Vec<FragmentInput>,
}

impl FileSource {
    pub fn new(key: impl Into<String>, inputs: Vec<FragmentInput>) -> Self {
        Self {
            key: key.into(),
            inputs,
        }
    }

    /// One source per `sourceKey`, in key order. Fragments without a key
    /// are grouped under `unknown`.
    pub fn group(inputs: Vec<FragmentInput>) -> Vec<FileSource> {
        let mut grouped: BTreeMap<String, Vec<FragmentInput>> = BTreeMap::new();
        for input in inputs {
            let key = match input.fragment.source_key.trim() {
                "" => UNKNOWN_SOURCE.to_string(),
                k => k.to_string(),
            };
            grouped.entry(key).or_default().push(input);
        }
        grouped
            .into_iter()
            .map(|(key, inputs)| FileSource::new(key, inputs))
            .collect()
    }
}

#[async_trait]
impl EventSource for FileSource {
    fn source_key(&self) -> &str {
        &self.key
    }

    async fn fetch_listing(&self) -> Result<Vec<ListingEntry>> {
        Ok(self
            .inputs
            .iter()
            .enumerate()
            .map(|(i, input)| ListingEntry {
                fragment: input.fragment.clone(),
                detail_ref: input.detail.as_ref().map(|_| i.to_string()),
            })
            .collect())
    }

    async fn fetch_detail(&self, detail_ref: &str) -> Result<DetailFields> {
        detail_ref
            .parse::<usize>()
            .ok()
            .and_then(|i| self.inputs.get(i))
            .and_then(|input| input.detail.clone())
            .ok_or_else(|| EngineError::Source {
                source_key: self.key.clone(),
                message: format!("no detail record '{detail_ref}'"),
            })
    }
}

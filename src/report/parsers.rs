use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::findings::NormalizedFindings;
use crate::tools::OutputFamily;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("line {line}: {source}")]
    Line {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0}")]
    Document(#[source] serde_json::Error),
}

/// Turns one tool's raw result file into normalized findings
pub trait FindingsParser {
    fn parse(&self, raw: &[u8]) -> Result<NormalizedFindings, ParseError>;
}

#[derive(Deserialize)]
struct LineRecord {
    path: String,
    #[serde(rename = "stringsFound", default)]
    strings_found: Vec<String>,
}

/// One JSON record per line, possibly several per path
#[derive(Debug, Default)]
pub struct LineJsonParser;

impl FindingsParser for LineJsonParser {
    fn parse(&self, raw: &[u8]) -> Result<NormalizedFindings, ParseError> {
        let mut findings = NormalizedFindings::new();
        for (index, line) in raw.split(|b| *b == b'\n').enumerate() {
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            let record: LineRecord = serde_json::from_slice(line).map_err(|source| ParseError::Line {
                line: index + 1,
                source,
            })?;
            findings.add_unique(&record.path, record.strings_found);
        }
        findings.prune();
        Ok(findings)
    }
}

#[derive(Deserialize)]
struct ResultDocument {
    #[serde(default)]
    result: BTreeMap<String, Vec<String>>,
}

/// A single `{"result": {"<absolute path>": [..]}}` object. Paths are made
/// relative to the clone they were found in.
#[derive(Debug, Default)]
pub struct ResultMapParser {
    clone_roots: Vec<PathBuf>,
}

impl ResultMapParser {
    pub fn new(clone_root: Option<&Path>) -> Self {
        let mut clone_roots = Vec::new();
        if let Some(root) = clone_root {
            clone_roots.push(root.to_path_buf());
            // The tool may have reported the resolved path
            match root.canonicalize() {
                Ok(canonical) if canonical != root => clone_roots.push(canonical),
                _ => {}
            }
        }
        Self { clone_roots }
    }

    fn relative_path(&self, reported: &str) -> String {
        let path = Path::new(reported);
        let stripped = self
            .clone_roots
            .iter()
            .find_map(|root| path.strip_prefix(root).ok())
            .map(|relative| relative.to_string_lossy().into_owned())
            .unwrap_or_else(|| reported.to_string());
        stripped.trim_start_matches('/').to_string()
    }
}

impl FindingsParser for ResultMapParser {
    fn parse(&self, raw: &[u8]) -> Result<NormalizedFindings, ParseError> {
        let document: ResultDocument = serde_json::from_slice(raw).map_err(ParseError::Document)?;
        let mut findings = NormalizedFindings::new();
        for (reported, strings) in document.result {
            findings.assign(&self.relative_path(&reported), strings);
        }
        findings.prune();
        Ok(findings)
    }
}

/// Parser for a tool's output family
pub fn parser_for(family: OutputFamily, clone_root: Option<&Path>) -> Box<dyn FindingsParser> {
    match family {
        OutputFamily::LineJson => Box::new(LineJsonParser),
        OutputFamily::ResultMap => Box::new(ResultMapParser::new(clone_root)),
    }
}

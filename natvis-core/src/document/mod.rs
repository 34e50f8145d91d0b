//! Visualizer documents
//!
//! Parsing of Natvis XML into rules, and the [`DocumentStore`] holding every
//! loaded document. The store is filled once and then only read while
//! printing.

mod loader;
mod model;
mod xml;

pub use loader::{StructuralError, VisualizerDocument};
pub use model::{
    DisplayString, DisplayTemplate, ExpandItem, ExpandKind, Expression, IndexSource, Segment,
    VisualizerRule,
};

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("XML error at byte {position}: {message}")]
    Xml { position: u64, message: String },

    #[error("Expected <AutoVisualizer> root element, found <{0}>")]
    UnexpectedRoot(String),

    #[error("<Type> element without a Name attribute")]
    MissingTypeName,

    #[error("Cannot read '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Position of a rule: document in load order, rule in declaration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleId {
    pub document: usize,
    pub rule: usize,
}

/// All loaded documents, in load order
#[derive(Debug, Default)]
pub struct DocumentStore {
    documents: Vec<VisualizerDocument>,
    loaded_paths: HashSet<PathBuf>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and add a document, returning its index
    pub fn load_str(&mut self, xml: &str, source: impl Into<String>) -> Result<usize, DocumentError> {
        let source = source.into();
        match VisualizerDocument::parse(xml, source.clone()) {
            Ok(document) => Ok(self.add(document)),
            Err(e) => {
                warn!("Rejected visualizer document '{}': {}", source, e);
                Err(e)
            }
        }
    }

    /// Load a file by path. A file already loaded is skipped and `None` is
    /// returned.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<Option<usize>, DocumentError> {
        let path = path.as_ref();
        let key = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        if self.loaded_paths.contains(&key) {
            debug!("'{}' is already loaded", path.display());
            return Ok(None);
        }

        let xml = std::fs::read_to_string(path).map_err(|source| DocumentError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let index = self.load_str(&xml, path.display().to_string())?;
        self.loaded_paths.insert(key);
        Ok(Some(index))
    }

    pub fn add(&mut self, document: VisualizerDocument) -> usize {
        self.documents.push(document);
        self.documents.len() - 1
    }

    pub fn documents(&self) -> &[VisualizerDocument] {
        &self.documents
    }

    /// Every rule, in load order then declaration order
    pub fn rules(&self) -> impl Iterator<Item = (RuleId, &VisualizerRule)> {
        self.documents.iter().enumerate().flat_map(|(document, doc)| {
            doc.rules
                .iter()
                .enumerate()
                .map(move |(rule, r)| (RuleId { document, rule }, r))
        })
    }

    pub fn rule(&self, id: RuleId) -> Option<&VisualizerRule> {
        self.documents.get(id.document)?.rules.get(id.rule)
    }

    pub fn rule_count(&self) -> usize {
        self.documents.iter().map(|d| d.rules.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.rule_count() == 0
    }
}

//! Guidance documents
//!
//! Guidance documents are markdown files in the target repository that get
//! embedded verbatim into agent prompts. Every document except the roadmap
//! has a built-in default used when the repository does not provide one.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::GuidanceConfig;
use crate::{Error, Result};

const IMPLEMENTATION_PROCESS: &str = include_str!("docs/implementation-process.md");
const FIX_UNIT_TESTS: &str = include_str!("docs/fix-unit-tests.md");
const FIX_E2E_TESTS: &str = include_str!("docs/fix-e2e-tests.md");
const PRD_TEMPLATE: &str = include_str!("docs/prd-template.md");
const ERD_TEMPLATE: &str = include_str!("docs/erd-template.md");
const TICKET_TEMPLATE: &str = include_str!("docs/ticket-template.md");

/// The named guidance documents a prompt can include
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GuidanceDoc {
    Roadmap,
    PrdTemplate,
    ErdTemplate,
    TicketTemplate,
    ImplementationProcess,
    FixUnitTests,
    FixE2eTests,
}

impl GuidanceDoc {
    /// Get all guidance documents
    pub fn all() -> &'static [GuidanceDoc] {
        &[
            GuidanceDoc::Roadmap,
            GuidanceDoc::PrdTemplate,
            GuidanceDoc::ErdTemplate,
            GuidanceDoc::TicketTemplate,
            GuidanceDoc::ImplementationProcess,
            GuidanceDoc::FixUnitTests,
            GuidanceDoc::FixE2eTests,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            GuidanceDoc::Roadmap => "roadmap",
            GuidanceDoc::PrdTemplate => "prd_template",
            GuidanceDoc::ErdTemplate => "erd_template",
            GuidanceDoc::TicketTemplate => "ticket_template",
            GuidanceDoc::ImplementationProcess => "implementation_process",
            GuidanceDoc::FixUnitTests => "fix_unit_tests",
            GuidanceDoc::FixE2eTests => "fix_e2e_tests",
        }
    }

    /// Text shipped with ticketloop, used when the repository has no copy
    fn builtin(&self) -> Option<&'static str> {
        match self {
            GuidanceDoc::Roadmap => None,
            GuidanceDoc::PrdTemplate => Some(PRD_TEMPLATE),
            GuidanceDoc::ErdTemplate => Some(ERD_TEMPLATE),
            GuidanceDoc::TicketTemplate => Some(TICKET_TEMPLATE),
            GuidanceDoc::ImplementationProcess => Some(IMPLEMENTATION_PROCESS),
            GuidanceDoc::FixUnitTests => Some(FIX_UNIT_TESTS),
            GuidanceDoc::FixE2eTests => Some(FIX_E2E_TESTS),
        }
    }

    fn configured_path<'c>(&self, config: &'c GuidanceConfig) -> &'c str {
        match self {
            GuidanceDoc::Roadmap => &config.roadmap,
            GuidanceDoc::PrdTemplate => &config.prd_template,
            GuidanceDoc::ErdTemplate => &config.erd_template,
            GuidanceDoc::TicketTemplate => &config.ticket_template,
            GuidanceDoc::ImplementationProcess => &config.implementation_process,
            GuidanceDoc::FixUnitTests => &config.fix_unit_tests,
            GuidanceDoc::FixE2eTests => &config.fix_e2e_tests,
        }
    }
}

impl fmt::Display for GuidanceDoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A loaded guidance document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Label rendered in the `ref [label]` marker
    pub label: String,
    /// Full document text
    pub contents: String,
}

/// Resolves guidance documents against a repository
#[derive(Debug, Clone)]
pub struct GuidanceLibrary {
    root: PathBuf,
    paths: GuidanceConfig,
}

impl GuidanceLibrary {
    pub fn new(root: impl Into<PathBuf>, paths: GuidanceConfig) -> Self {
        Self {
            root: root.into(),
            paths,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Load a document, falling back to the built-in copy when the file is absent
    pub fn load(&self, doc: GuidanceDoc) -> Result<Document> {
        let label = doc.configured_path(&self.paths).to_string();
        let path = self.root.join(&label);

        if path.is_file() {
            let contents = std::fs::read_to_string(&path).map_err(|e| {
                Error::Guidance(format!("Failed to read {} ({}): {}", doc, path.display(), e))
            })?;
            debug!(doc = %doc, path = %path.display(), "Loaded guidance document");
            return Ok(Document { label, contents });
        }

        match doc.builtin() {
            Some(contents) => {
                debug!(doc = %doc, "Using built-in guidance document");
                Ok(Document {
                    label,
                    contents: contents.to_string(),
                })
            }
            None => Err(Error::Guidance(format!(
                "The {} document is required but {} does not exist",
                doc,
                path.display()
            ))),
        }
    }
}

//! Workflow reference resolution

use crate::error::{Result, TabreconError};
use crate::model::Workflow;
use uuid::Uuid;

/// Shortest id prefix accepted as a reference
pub const MIN_PREFIX_LEN: usize = 4;

/// Reference to a workflow as typed on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowRef {
    /// Full UUID
    Id(Uuid),
    /// Name or id prefix
    Token(String),
}

impl WorkflowRef {
    pub fn from_string(s: &str) -> Self {
        match Uuid::parse_str(s.trim()) {
            Ok(id) => Self::Id(id),
            Err(_) => Self::Token(s.trim().to_string()),
        }
    }
}

impl std::fmt::Display for WorkflowRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{}", id),
            Self::Token(token) => write!(f, "{}", token),
        }
    }
}

/// Resolves workflow references against the known workflows
#[derive(Debug)]
pub struct WorkflowResolver<'a> {
    workflows: &'a [Workflow],
}

impl<'a> WorkflowResolver<'a> {
    pub fn new(workflows: &'a [Workflow]) -> Self {
        Self { workflows }
    }

    /// Exact id, then exact name, then unique id prefix
    pub fn resolve(&self, reference: &WorkflowRef) -> Result<&'a Workflow> {
        match reference {
            WorkflowRef::Id(id) => self
                .workflows
                .iter()
                .find(|w| w.id == *id)
                .ok_or_else(|| not_found(reference)),
            WorkflowRef::Token(token) => {
                let by_name: Vec<&Workflow> =
                    self.workflows.iter().filter(|w| w.name == *token).collect();
                match by_name.as_slice() {
                    [only] => return Ok(*only),
                    [] => {}
                    many => return Err(ambiguous(reference, many)),
                }

                let prefix = token.to_lowercase();
                if prefix.len() < MIN_PREFIX_LEN {
                    return Err(not_found(reference));
                }
                let by_prefix: Vec<&Workflow> = self
                    .workflows
                    .iter()
                    .filter(|w| w.id.to_string().starts_with(&prefix))
                    .collect();
                match by_prefix.as_slice() {
                    [only] => Ok(*only),
                    [] => Err(not_found(reference)),
                    many => Err(ambiguous(reference, many)),
                }
            }
        }
    }

    /// The most recently updated workflow
    pub fn latest(&self) -> Option<&'a Workflow> {
        self.workflows.iter().max_by_key(|w| w.updated_at)
    }

    /// Resolve a reference, falling back to the latest workflow when none is given
    pub fn resolve_or_latest(&self, reference: Option<&WorkflowRef>) -> Result<&'a Workflow> {
        match reference {
            Some(reference) => self.resolve(reference),
            None => self
                .latest()
                .ok_or_else(|| TabreconError::workspace("No workflows found in workspace")),
        }
    }
}

/// Resolve a full id or a unique id prefix among `ids`
pub fn resolve_id_prefix(ids: &[Uuid], token: &str, kind: &'static str) -> Result<Uuid> {
    let token = token.trim();
    if let Ok(id) = Uuid::parse_str(token) {
        return ids
            .iter()
            .copied()
            .find(|candidate| *candidate == id)
            .ok_or_else(|| TabreconError::not_found(kind, id));
    }

    let prefix = token.to_lowercase();
    if prefix.len() < MIN_PREFIX_LEN {
        return Err(TabreconError::invalid_input(format!(
            "{} id prefix '{}' is too short; use at least {} characters",
            kind, token, MIN_PREFIX_LEN
        )));
    }
    let hits: Vec<Uuid> = ids
        .iter()
        .copied()
        .filter(|id| id.to_string().starts_with(&prefix))
        .collect();
    match hits.as_slice() {
        [only] => Ok(*only),
        [] => Err(TabreconError::invalid_input(format!(
            "No {} with id prefix '{}'",
            kind, token
        ))),
        many => Err(TabreconError::AmbiguousReference {
            reference: token.to_string(),
            candidates: many.iter().map(|id| id.to_string()).collect(),
        }),
    }
}

fn not_found(reference: &WorkflowRef) -> TabreconError {
    TabreconError::WorkflowNotFound {
        reference: reference.to_string(),
    }
}

fn ambiguous(reference: &WorkflowRef, candidates: &[&Workflow]) -> TabreconError {
    TabreconError::AmbiguousReference {
        reference: reference.to_string(),
        candidates: candidates
            .iter()
            .map(|w| format!("{} ({})", w.name, w.id))
            .collect(),
    }
}

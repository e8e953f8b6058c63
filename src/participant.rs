use crate::error::FillError;
use crate::types::Fill;

/// Capability a collaborator hands the engine so it can be told about its
/// fills. Orders only carry the owner id; the engine resolves it to a handler
/// through its participant registry.
///
/// Called synchronously while the engine is processing, after the book and
/// trade history already reflect the fill. Errors and panics are logged and
/// do not stop matching.
pub trait FillHandler: Send + Sync {
    fn on_fill(&self, fill: &Fill) -> Result<(), FillError>;
}

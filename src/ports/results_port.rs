//! Result persistence port trait.

use crate::domain::error::RsitraderError;
use crate::domain::sweep::ResultSet;

/// Port for persisting sweep results. Failures are `Resource` errors; they
/// never invalidate the in-memory result set.
pub trait ResultsPort {
    fn write_results(&self, results: &ResultSet) -> Result<(), RsitraderError>;

    /// Default implementation: summaries are optional for a results sink.
    fn write_summary(&self, _summary: &str) -> Result<(), RsitraderError> {
        Ok(())
    }
}

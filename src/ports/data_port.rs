//! Upstream bar feed port trait.

use crate::domain::error::RsitraderError;
use crate::domain::ohlcv::Bar;

/// Supplies a deduplicated, strictly increasing, fixed-interval bar series.
/// Consumers do not re-check ordering.
pub trait DataPort {
    fn fetch_bars(&self) -> Result<Vec<Bar>, RsitraderError>;

    /// Human-readable origin of the bars, used in logs and errors.
    fn source_name(&self) -> String;
}

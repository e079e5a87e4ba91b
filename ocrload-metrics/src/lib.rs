pub mod counter;
pub mod percentile;
pub mod tally;
pub mod trend;

pub use counter::{Counter, Rate, RateSummary};
pub use percentile::percentile_linear;
pub use tally::Tally;
pub use trend::{LiveQuantiles, Trend, TrendSummary};

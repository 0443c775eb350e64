pub mod formula;
pub mod impact;
pub mod timeline;

pub use formula::{FormulaOutput, FormulaRegistry, PricingFormula, DATA_MONTH_COUNT};
pub use impact::{compute_impact, ImpactReport, PartPriceImpact};
pub use timeline::{compute_timeline, Timeline, TimelineOverride};

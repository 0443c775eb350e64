pub mod config;
pub mod domain;
pub mod errors;
pub mod pricing;

pub use domain::adjustment::{
    AdjustmentDraft, AdjustmentId, AdjustmentStatus, ApplyOutcome, PricingAdjustment,
};
pub use domain::material::{IndexEntryId, Material, MaterialIndexEntry, MonthKey, NewIndexEntry};
pub use domain::part::{Part, PartId};
pub use errors::{ConflictError, EngineError, ValidationError};
pub use pricing::{
    compute_impact, compute_timeline, FormulaOutput, FormulaRegistry, ImpactReport,
    PartPriceImpact, PricingFormula, Timeline, TimelineOverride,
};

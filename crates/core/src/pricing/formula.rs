use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;

/// Number of monthly inputs every formula consumes. The engine works on a
/// fixed three-month window; strategies needing other window sizes are a
/// different product.
pub const DATA_MONTH_COUNT: usize = 3;

/// Multiplier applied on top of the rolling mean by `quarterly_standard`.
/// Fixed contractual constant, not user-configurable.
fn quarterly_compliance_buffer() -> Decimal {
    Decimal::new(1_005, 3)
}

/// Result of one formula evaluation. The breakdown is part of the audit
/// trail, not UI sugar: applied adjustments must remain explainable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormulaOutput {
    pub result: Decimal,
    pub breakdown: String,
}

/// A pure, deterministic price-calculation strategy over exactly three
/// validated monthly prices.
pub trait PricingFormula: Send + Sync {
    fn id(&self) -> &'static str;
    fn calculate(&self, prices: [Decimal; DATA_MONTH_COUNT]) -> FormulaOutput;
}

fn mean(prices: [Decimal; DATA_MONTH_COUNT]) -> Decimal {
    (prices[0] + prices[1] + prices[2]) / Decimal::from(DATA_MONTH_COUNT as i64)
}

// Formula results carry exactly 4 decimal places, padding exact values so
// stored averages compare and render uniformly.
fn to_result_scale(value: Decimal) -> Decimal {
    let mut result = value.round_dp(4);
    result.rescale(4);
    result
}

/// Arithmetic mean of the three inputs, rounded to 4 decimal places.
#[derive(Default)]
pub struct SimpleAverage;

impl PricingFormula for SimpleAverage {
    fn id(&self) -> &'static str {
        "simple_average"
    }

    fn calculate(&self, prices: [Decimal; DATA_MONTH_COUNT]) -> FormulaOutput {
        let result = to_result_scale(mean(prices));
        FormulaOutput {
            result,
            breakdown: format!(
                "({} + {} + {}) / 3 = {result}",
                prices[0], prices[1], prices[2]
            ),
        }
    }
}

/// Arithmetic mean with the fixed 1.005 compliance buffer, rounded to 4
/// decimal places.
#[derive(Default)]
pub struct QuarterlyStandard;

impl PricingFormula for QuarterlyStandard {
    fn id(&self) -> &'static str {
        "quarterly_standard"
    }

    fn calculate(&self, prices: [Decimal; DATA_MONTH_COUNT]) -> FormulaOutput {
        let buffer = quarterly_compliance_buffer();
        let average = mean(prices);
        let result = to_result_scale(average * buffer);
        FormulaOutput {
            result,
            breakdown: format!(
                "({} + {} + {}) / 3 * {buffer} = {result}",
                prices[0], prices[1], prices[2]
            ),
        }
    }
}

/// String-keyed registry of pricing strategies. Explicit and
/// dependency-injected: construct one per process wiring, never a global.
pub struct FormulaRegistry {
    formulas: HashMap<String, Arc<dyn PricingFormula>>,
}

impl FormulaRegistry {
    pub fn empty() -> Self {
        Self { formulas: HashMap::new() }
    }

    /// Registry with the built-in strategies; `3_month_rolling` is an
    /// alias for `simple_average`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        let simple: Arc<dyn PricingFormula> = Arc::new(SimpleAverage);
        registry.formulas.insert("3_month_rolling".to_string(), Arc::clone(&simple));
        registry.register(simple);
        registry.register(Arc::new(QuarterlyStandard));
        registry
    }

    pub fn register(&mut self, formula: Arc<dyn PricingFormula>) {
        self.formulas.insert(formula.id().to_string(), formula);
    }

    pub fn contains(&self, formula_id: &str) -> bool {
        self.formulas.contains_key(formula_id)
    }

    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.formulas.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Validate the inputs and evaluate the named formula.
    pub fn calculate(
        &self,
        formula_id: &str,
        prices: &[Decimal],
    ) -> Result<FormulaOutput, ValidationError> {
        let formula = self.formulas.get(formula_id).ok_or_else(|| {
            ValidationError::UnknownFormula { formula_id: formula_id.to_string() }
        })?;

        let validated = validate_prices(prices)?;
        Ok(formula.calculate(validated))
    }
}

impl Default for FormulaRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Exactly three positive prices; the error names the offending index.
pub fn validate_prices(
    prices: &[Decimal],
) -> Result<[Decimal; DATA_MONTH_COUNT], ValidationError> {
    if prices.len() != DATA_MONTH_COUNT {
        return Err(ValidationError::WrongPriceCount {
            expected: DATA_MONTH_COUNT,
            actual: prices.len(),
        });
    }

    for (index, price) in prices.iter().enumerate() {
        if *price <= Decimal::ZERO {
            return Err(ValidationError::InvalidFormulaInput {
                index,
                reason: format!("price must be positive, got {price}"),
            });
        }
    }

    Ok([prices[0], prices[1], prices[2]])
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rust_decimal::Decimal;

    use crate::errors::ValidationError;

    use super::{FormulaOutput, FormulaRegistry, PricingFormula, DATA_MONTH_COUNT};

    fn usd(value: i64) -> Decimal {
        Decimal::new(value * 100, 2)
    }

    #[test]
    fn simple_average_matches_arithmetic_mean() {
        let registry = FormulaRegistry::with_builtins();
        let output = registry
            .calculate("simple_average", &[usd(2800), usd(2850), usd(2900)])
            .expect("calculate");

        assert_eq!(output.result.to_string(), "2850.0000");
        assert!(output.breakdown.contains("/ 3"));
    }

    #[test]
    fn rolling_alias_matches_simple_average() {
        let registry = FormulaRegistry::with_builtins();
        let prices = [usd(2800), usd(2850), usd(2900)];

        let simple = registry.calculate("simple_average", &prices).expect("simple");
        let rolling = registry.calculate("3_month_rolling", &prices).expect("rolling");
        assert_eq!(simple.result, rolling.result);
    }

    #[test]
    fn quarterly_standard_applies_compliance_buffer() {
        let registry = FormulaRegistry::with_builtins();
        let output = registry
            .calculate("quarterly_standard", &[usd(100), usd(100), usd(100)])
            .expect("calculate");

        assert_eq!(output.result.to_string(), "100.5000");
    }

    #[test]
    fn simple_average_rounds_to_four_decimal_places() {
        let registry = FormulaRegistry::with_builtins();
        let output = registry
            .calculate("simple_average", &[usd(100), usd(100), usd(101)])
            .expect("calculate");

        // 301 / 3 = 100.33333...
        assert_eq!(output.result.to_string(), "100.3333");
    }

    #[test]
    fn rejects_wrong_input_count() {
        let registry = FormulaRegistry::with_builtins();
        let error = registry
            .calculate("simple_average", &[usd(100), usd(100)])
            .expect_err("two prices should fail");

        assert_eq!(error, ValidationError::WrongPriceCount { expected: 3, actual: 2 });
    }

    #[test]
    fn rejects_non_positive_price_naming_index() {
        let registry = FormulaRegistry::with_builtins();
        let error = registry
            .calculate("simple_average", &[usd(100), Decimal::ZERO, usd(100)])
            .expect_err("zero price should fail");

        assert!(matches!(error, ValidationError::InvalidFormulaInput { index: 1, .. }));
    }

    #[test]
    fn rejects_unknown_formula_id() {
        let registry = FormulaRegistry::with_builtins();
        let error = registry
            .calculate("seasonal_weighted", &[usd(100), usd(100), usd(100)])
            .expect_err("unregistered formula should fail");

        assert!(matches!(error, ValidationError::UnknownFormula { .. }));
    }

    #[test]
    fn custom_strategies_register_without_touching_callers() {
        struct HighWaterMark;

        impl PricingFormula for HighWaterMark {
            fn id(&self) -> &'static str {
                "high_water_mark"
            }

            fn calculate(&self, prices: [Decimal; DATA_MONTH_COUNT]) -> FormulaOutput {
                let result = prices.into_iter().max().unwrap_or_default();
                FormulaOutput { result, breakdown: format!("max of 3 inputs = {result}") }
            }
        }

        let mut registry = FormulaRegistry::with_builtins();
        registry.register(Arc::new(HighWaterMark));

        let output = registry
            .calculate("high_water_mark", &[usd(2800), usd(2900), usd(2850)])
            .expect("custom formula");
        assert_eq!(output.result, usd(2900));
    }
}

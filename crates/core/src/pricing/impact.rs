use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::part::{Part, PartId};

/// Kilograms per metric ton; commodity indices quote USD/MT, part weights
/// are kilograms.
const KG_PER_METRIC_TON: i64 = 1000;

/// Projected effect of a price change on one part. Values stay unrounded;
/// rounding is a presentation concern.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PartPriceImpact {
    pub part_id: PartId,
    pub material_weight_kg: Decimal,
    pub price_impact_per_part: Decimal,
    pub old_standard_value: Decimal,
    pub new_standard_value: Decimal,
    pub percent_change: Decimal,
}

/// Aggregate view over a part set for one old -> new price delta.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImpactReport {
    pub old_price_per_mt: Decimal,
    pub new_price_per_mt: Decimal,
    pub delta_per_kg: Decimal,
    pub total_parts: u32,
    pub parts_affected: u32,
    /// Exact sum of unrounded per-part impacts, so the aggregate never
    /// drifts from the per-part figures.
    pub total_cost_impact: Decimal,
    pub average_impact_per_part: Decimal,
    pub parts: Vec<PartPriceImpact>,
}

/// Propagate an old -> new USD/MT delta across a part set. Pure: the input
/// parts are not mutated; the caller decides whether to apply the report.
///
/// Parts without positive material weight are excluded from the affected
/// set but still counted in `total_parts`.
pub fn compute_impact(
    parts: &[Part],
    old_price_per_mt: Decimal,
    new_price_per_mt: Decimal,
) -> ImpactReport {
    let delta_per_kg =
        (new_price_per_mt - old_price_per_mt) / Decimal::from(KG_PER_METRIC_TON);

    let mut impacts = Vec::new();
    let mut total_cost_impact = Decimal::ZERO;

    for part in parts.iter().filter(|part| part.has_material_exposure()) {
        let price_impact_per_part = part.material_weight_kg * delta_per_kg;
        let new_standard_value = part.standard_value + price_impact_per_part;
        let percent_change = if part.standard_value.is_zero() {
            Decimal::ZERO
        } else {
            price_impact_per_part / part.standard_value * Decimal::from(100)
        };

        total_cost_impact += price_impact_per_part;
        impacts.push(PartPriceImpact {
            part_id: part.id.clone(),
            material_weight_kg: part.material_weight_kg,
            price_impact_per_part,
            old_standard_value: part.standard_value,
            new_standard_value,
            percent_change,
        });
    }

    let parts_affected = impacts.len() as u32;
    let average_impact_per_part = if parts_affected == 0 {
        Decimal::ZERO
    } else {
        total_cost_impact / Decimal::from(parts_affected)
    };

    ImpactReport {
        old_price_per_mt,
        new_price_per_mt,
        delta_per_kg,
        total_parts: parts.len() as u32,
        parts_affected,
        total_cost_impact,
        average_impact_per_part,
        parts: impacts,
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use crate::domain::material::Material;
    use crate::domain::part::{Part, PartId};

    use super::compute_impact;

    fn part(id: &str, weight: Decimal, standard_value: Decimal) -> Part {
        Part {
            id: PartId(id.to_string()),
            part_number: format!("FTZ-{id}"),
            material: Material::Aluminum,
            material_weight_kg: weight,
            standard_value,
        }
    }

    fn usd(value: i64) -> Decimal {
        Decimal::new(value * 100, 2)
    }

    #[test]
    fn computes_reference_example() {
        // 2.5 kg part at 45.00, 2800 -> 2850 USD/MT.
        let parts = [part("1", Decimal::new(25, 1), Decimal::new(4_500, 2))];
        let report = compute_impact(&parts, usd(2800), usd(2850));

        assert_eq!(report.delta_per_kg.to_string(), "0.05");
        assert_eq!(report.parts_affected, 1);

        let impact = &report.parts[0];
        assert_eq!(impact.price_impact_per_part.to_string(), "0.125");
        assert_eq!(impact.new_standard_value.to_string(), "45.125");
    }

    #[test]
    fn new_standard_value_is_old_plus_impact() {
        let parts = [
            part("1", Decimal::new(12, 1), usd(30)),
            part("2", Decimal::new(78, 1), usd(120)),
        ];
        let report = compute_impact(&parts, usd(2800), usd(2725));

        for impact in &report.parts {
            assert_eq!(
                impact.new_standard_value,
                impact.old_standard_value + impact.price_impact_per_part
            );
        }
    }

    #[test]
    fn impact_is_linear_in_weight() {
        let single = [part("1", Decimal::new(15, 1), usd(40))];
        let double = [part("1", Decimal::new(30, 1), usd(40))];

        let base = compute_impact(&single, usd(2800), usd(2850));
        let doubled = compute_impact(&double, usd(2800), usd(2850));

        assert_eq!(
            doubled.parts[0].price_impact_per_part,
            base.parts[0].price_impact_per_part * Decimal::from(2)
        );
    }

    #[test]
    fn zero_weight_parts_counted_but_not_affected() {
        let parts = [
            part("1", Decimal::new(25, 1), usd(45)),
            part("2", Decimal::ZERO, usd(10)),
        ];
        let report = compute_impact(&parts, usd(2800), usd(2850));

        assert_eq!(report.total_parts, 2);
        assert_eq!(report.parts_affected, 1);
        assert_eq!(report.parts.len(), 1);
    }

    #[test]
    fn zero_standard_value_yields_zero_percent_change() {
        let parts = [part("1", Decimal::new(25, 1), Decimal::ZERO)];
        let report = compute_impact(&parts, usd(2800), usd(2850));

        assert_eq!(report.parts[0].percent_change, Decimal::ZERO);
        // The absolute impact still applies.
        assert_eq!(report.parts[0].new_standard_value.to_string(), "0.125");
    }

    #[test]
    fn aggregate_equals_exact_sum_of_per_part_impacts() {
        let parts = [
            part("1", Decimal::new(17, 1), usd(30)),
            part("2", Decimal::new(333, 2), usd(55)),
            part("3", Decimal::new(905, 2), usd(210)),
        ];
        let report = compute_impact(&parts, usd(2811), usd(2847));

        let summed: Decimal =
            report.parts.iter().map(|impact| impact.price_impact_per_part).sum();
        assert_eq!(report.total_cost_impact, summed);
    }

    #[test]
    fn negative_delta_produces_negative_impacts() {
        let parts = [part("1", Decimal::new(25, 1), usd(45))];
        let report = compute_impact(&parts, usd(2850), usd(2800));

        assert!(report.total_cost_impact < Decimal::ZERO);
        assert!(report.parts[0].new_standard_value < usd(45));
    }

    #[test]
    fn empty_part_set_reports_zero_averages() {
        let report = compute_impact(&[], usd(2800), usd(2850));

        assert_eq!(report.total_parts, 0);
        assert_eq!(report.parts_affected, 0);
        assert_eq!(report.total_cost_impact, Decimal::ZERO);
        assert_eq!(report.average_impact_per_part, Decimal::ZERO);
    }

    #[test]
    fn does_not_mutate_input_parts() {
        let parts = [part("1", Decimal::new(25, 1), usd(45))];
        let before = parts[0].standard_value;
        let _ = compute_impact(&parts, usd(2800), usd(2850));
        assert_eq!(parts[0].standard_value, before);
    }
}

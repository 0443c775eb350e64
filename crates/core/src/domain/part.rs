use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::material::Material;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartId(pub String);

/// Catalog part as seen by the pricing engine. The engine mutates only
/// `standard_value`; identity and unrelated attributes stay with the
/// catalog owner.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Part {
    pub id: PartId,
    pub part_number: String,
    pub material: Material,
    pub material_weight_kg: Decimal,
    pub standard_value: Decimal,
}

impl Part {
    /// Parts without a positive material weight carry no commodity
    /// exposure and are excluded from impact propagation.
    pub fn has_material_exposure(&self) -> bool {
        self.material_weight_kg > Decimal::ZERO
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use crate::domain::material::Material;

    use super::{Part, PartId};

    fn part(weight: Decimal) -> Part {
        Part {
            id: PartId("part-1".to_string()),
            part_number: "FTZ-1001".to_string(),
            material: Material::Aluminum,
            material_weight_kg: weight,
            standard_value: Decimal::new(4_500, 2),
        }
    }

    #[test]
    fn positive_weight_counts_as_exposure() {
        assert!(part(Decimal::new(25, 1)).has_material_exposure());
    }

    #[test]
    fn zero_weight_is_excluded() {
        assert!(!part(Decimal::ZERO).has_material_exposure());
    }
}

//! SKU candidate generation from selected attribute options

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeSelection { pub attribute_id: Uuid, pub option_ids: Vec<Uuid> }

/// Cartesian product of the selected options, one tuple per SKU candidate.
///
/// Tuples follow the attribute order of `selections`; the first attribute varies slowest.
/// Repeated option ids inside one selection are collapsed so every tuple is distinct.
pub fn generate_combinations(selections: &[AttributeSelection]) -> Result<Vec<Vec<Uuid>>, VariantError> {
    if selections.is_empty() { return Err(VariantError::NoAttributes); }

    let mut axes: Vec<Vec<Uuid>> = Vec::with_capacity(selections.len());
    for (i, sel) in selections.iter().enumerate() {
        if selections[..i].iter().any(|prev| prev.attribute_id == sel.attribute_id) {
            return Err(VariantError::DuplicateAttribute(sel.attribute_id));
        }
        let mut options: Vec<Uuid> = Vec::with_capacity(sel.option_ids.len());
        for id in &sel.option_ids {
            if !options.contains(id) { options.push(*id); }
        }
        if options.is_empty() { return Err(VariantError::EmptyAttribute(sel.attribute_id)); }
        axes.push(options);
    }

    let combos = axes.iter().fold(vec![Vec::new()], |acc: Vec<Vec<Uuid>>, axis| {
        acc.iter().flat_map(|prefix| axis.iter().map(move |opt| {
            let mut next = prefix.clone();
            next.push(*opt);
            next
        })).collect()
    });
    Ok(combos)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariantError { NoAttributes, EmptyAttribute(Uuid), DuplicateAttribute(Uuid) }
impl std::error::Error for VariantError {}
impl fmt::Display for VariantError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoAttributes => write!(f, "Select at least one attribute to generate variants"),
            Self::EmptyAttribute(id) => write!(f, "Attribute {id} has no selected options"),
            Self::DuplicateAttribute(id) => write!(f, "Attribute {id} was selected more than once"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn selection(n: usize) -> AttributeSelection {
        AttributeSelection { attribute_id: Uuid::new_v4(), option_ids: (0..n).map(|_| Uuid::new_v4()).collect() }
    }

    #[test]
    fn test_product_of_option_counts() {
        for counts in [vec![1], vec![3], vec![2, 3], vec![3, 1, 4], vec![2, 2, 2, 2]] {
            let sels: Vec<_> = counts.iter().map(|n| selection(*n)).collect();
            let combos = generate_combinations(&sels).unwrap();
            assert_eq!(combos.len(), counts.iter().product::<usize>());
            let distinct: HashSet<_> = combos.iter().collect();
            assert_eq!(distinct.len(), combos.len());
            for combo in &combos {
                assert_eq!(combo.len(), sels.len());
                for (opt, sel) in combo.iter().zip(&sels) { assert!(sel.option_ids.contains(opt)); }
            }
        }
    }

    #[test]
    fn test_order_is_row_major() {
        let size = selection(2);
        let color = selection(2);
        let combos = generate_combinations(&[size.clone(), color.clone()]).unwrap();
        assert_eq!(combos[0], vec![size.option_ids[0], color.option_ids[0]]);
        assert_eq!(combos[1], vec![size.option_ids[0], color.option_ids[1]]);
        assert_eq!(combos[2], vec![size.option_ids[1], color.option_ids[0]]);
    }

    #[test]
    fn test_rejects_degenerate_input() {
        assert_eq!(generate_combinations(&[]), Err(VariantError::NoAttributes));
        let empty = AttributeSelection { attribute_id: Uuid::new_v4(), option_ids: vec![] };
        assert_eq!(generate_combinations(&[selection(2), empty.clone()]), Err(VariantError::EmptyAttribute(empty.attribute_id)));
        let dup = selection(1);
        assert_eq!(generate_combinations(&[dup.clone(), dup.clone()]), Err(VariantError::DuplicateAttribute(dup.attribute_id)));
    }

    #[test]
    fn test_repeated_option_ids_collapse() {
        let id = Uuid::new_v4();
        let sel = AttributeSelection { attribute_id: Uuid::new_v4(), option_ids: vec![id, id] };
        assert_eq!(generate_combinations(&[sel]).unwrap(), vec![vec![id]]);
    }
}

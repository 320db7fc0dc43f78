//! Zip-key-grouped Cartesian product expansion over a CBC value table, producing one
//! [`Variant`] per point in the build matrix.

use std::collections::{BTreeMap, HashSet};

use indexmap::IndexMap;

use crm_types::{NormalizedKey, Primitive};

/// One fully-resolved point in the build matrix.
pub type Variant = BTreeMap<NormalizedKey, Primitive>;

#[derive(Debug, Clone)]
enum VariantKey {
    Single(NormalizedKey, Vec<Primitive>),
    Zipped(Vec<(NormalizedKey, Vec<Primitive>)>),
}

impl VariantKey {
    fn len(&self) -> usize {
        match self {
            VariantKey::Single(_, values) => values.len(),
            VariantKey::Zipped(group) => group.first().map(|(_, v)| v.len()).unwrap_or(0),
        }
    }

    fn at(&self, index: usize) -> Option<Vec<(NormalizedKey, Primitive)>> {
        match self {
            VariantKey::Single(key, values) => values.get(index).map(|v| vec![(key.clone(), v.clone())]),
            VariantKey::Zipped(group) => {
                let mut out = Vec::with_capacity(group.len());
                for (key, values) in group {
                    out.push((key.clone(), values.get(index)?.clone()));
                }
                Some(out)
            }
        }
    }
}

fn find_combinations(keys: &[VariantKey], index: usize, current: &mut Vec<(NormalizedKey, Primitive)>, out: &mut Vec<Vec<(NormalizedKey, Primitive)>>) {
    if index == keys.len() {
        out.push(current.clone());
        return;
    }
    for i in 0..keys[index].len() {
        if let Some(items) = keys[index].at(i) {
            let added = items.len();
            current.extend(items);
            find_combinations(keys, index + 1, current, out);
            current.truncate(current.len() - added);
        }
    }
}

/// Expands `cbc_values` into every variant permitted by `zip_keys`, grouping zipped keys so they
/// vary together instead of independently.
pub fn generate_variants(cbc_values: &IndexMap<String, Vec<Primitive>>, zip_keys: &[HashSet<String>]) -> Vec<Variant> {
    let mut unzipped: Vec<String> = cbc_values.keys().cloned().collect();
    let mut zipped_groups: Vec<Vec<(NormalizedKey, Vec<Primitive>)>> = Vec::new();

    for group in zip_keys {
        let mut resolved = Vec::new();
        for key in group {
            if let Some(values) = cbc_values.get(key) {
                resolved.push((NormalizedKey::from(key.as_str()), values.clone()));
            }
        }
        unzipped.retain(|k| !group.contains(k));
        if resolved.len() > 1 {
            zipped_groups.push(resolved);
        }
    }

    let mut keys: Vec<VariantKey> = unzipped
        .iter()
        .filter_map(|k| cbc_values.get(k).map(|values| VariantKey::Single(NormalizedKey::from(k.as_str()), values.clone())))
        .collect();
    keys.extend(zipped_groups.into_iter().map(VariantKey::Zipped));

    let mut combos = Vec::new();
    let mut current = Vec::new();
    find_combinations(&keys, 0, &mut current, &mut combos);

    let mut variants: Vec<Variant> = combos.into_iter().map(|combo| combo.into_iter().collect::<BTreeMap<_, _>>()).collect();
    variants.sort_by_cached_key(|v| format!("{v:?}"));
    variants
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unzipped_keys_produce_a_full_cartesian_product() {
        let mut values = IndexMap::new();
        values.insert("python".to_string(), vec![Primitive::from("3.9"), Primitive::from("3.10")]);
        values.insert("numpy".to_string(), vec![Primitive::from("1.20"), Primitive::from("1.21")]);
        let variants = generate_variants(&values, &[]);
        assert_eq!(variants.len(), 4);
    }

    #[test]
    fn zipped_keys_vary_together() {
        let mut values = IndexMap::new();
        values.insert("python".to_string(), vec![Primitive::from("3.9"), Primitive::from("3.10")]);
        values.insert("numpy".to_string(), vec![Primitive::from("1.20"), Primitive::from("1.21")]);
        let mut group = HashSet::new();
        group.insert("python".to_string());
        group.insert("numpy".to_string());
        let variants = generate_variants(&values, &[group]);
        assert_eq!(variants.len(), 2);
    }
}

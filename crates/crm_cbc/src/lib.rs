//! C7: CBC (`conda_build_config.yaml`) parsing and zip-key variant expansion.

pub mod cbc;
pub mod combination;
pub mod error;

pub use cbc::{generate_cbc_values, CbcEntry, CbcFile};
pub use combination::{generate_variants, Variant};
pub use error::CbcError;

use crm_selector::BuildContext;

/// Combines [`generate_cbc_values`] and [`generate_variants`] into the full build matrix for a
/// set of CBC files under one build context.
pub fn generate_cbc_variants(cbc_files: Vec<CbcFile>, context: &BuildContext) -> Result<Vec<Variant>, CbcError> {
    let (values, zip_keys) = generate_cbc_values(cbc_files, context)?;
    Ok(generate_variants(&values, &zip_keys))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crm_selector::Platform;
    use std::collections::HashMap;

    #[test]
    fn end_to_end_variant_generation_includes_default_python() {
        let context = BuildContext::new(Platform::Linux64, HashMap::new()).unwrap();
        let cbc = CbcFile::parse("zlib:\n  - \"1.2\"\n  - \"1.3\"\n").unwrap();
        let variants = generate_cbc_variants(vec![cbc], &context).unwrap();
        assert_eq!(variants.len(), 2);
        assert!(variants[0].contains_key(&"zlib".into()));
        assert!(variants[0].contains_key(&"python".into()));
    }
}

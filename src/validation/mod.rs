/// Input validation shared by every write operation
///
/// Forms are validated again in the core because the HTTP layer's checks
/// can be bypassed by direct calls. Length and range rules live on the input
/// structs as `validator` derives; the helpers here add what the derives
/// can't express.
use crate::error::{CatalogError, CatalogResult};
use validator::Validate;

/// Run the derived rules of an input struct
pub fn validate_input<T: Validate>(input: &T) -> CatalogResult<()> {
    input.validate().map_err(CatalogError::from)
}

/// Reject empty and whitespace-only text
pub fn require_text(field: &str, value: &str) -> CatalogResult<()> {
    if value.trim().is_empty() {
        Err(CatalogError::Validation(format!("{} must not be empty", field)))
    } else {
        Ok(())
    }
}

/// Sort and deduplicate a list of ids
pub fn distinct_ids(ids: &[i64]) -> Vec<i64> {
    let mut ids = ids.to_vec();
    ids.sort_unstable();
    ids.dedup();
    ids
}

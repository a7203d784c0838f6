use graphstate_core::StoreError;

pub(crate) fn require(field: &str, value: &str) -> Result<(), StoreError> {
    if value.trim().is_empty() {
        return Err(StoreError::InvalidIdentity(format!("{field} cannot be empty")));
    }
    Ok(())
}

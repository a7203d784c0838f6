use graphstate_core::{BackendError, GraphExecutor, Params};

/// Outcome of one bootstrap pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchemaReport {
    pub applied: usize,
    pub already_present: usize,
    pub failed: usize,
}

/// Creates constraints and indexes, one statement at a time.
///
/// Never fails: an "already exists" answer is expected when several stores
/// start together, and any other failure leaves the store usable so the real
/// error surfaces on the first read or write.
pub async fn ensure_schema<E>(executor: &E, statements: &[&str]) -> SchemaReport
where
    E: GraphExecutor + ?Sized,
{
    let mut report = SchemaReport::default();

    for statement in statements {
        match executor.execute_write(statement, Params::new()).await {
            Ok(_) => report.applied += 1,
            Err(BackendError::Execution(error)) if error.is_already_exists() => {
                tracing::debug!(statement = %statement, "schema object already exists");
                report.already_present += 1;
            }
            Err(error) => {
                tracing::warn!(
                    statement = %statement,
                    error = %error,
                    "schema bootstrap failed; continuing without it"
                );
                report.failed += 1;
            }
        }
    }

    report
}

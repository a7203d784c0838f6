use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use graphstate_core::format_datetime;

static LAST_MICROS: AtomicI64 = AtomicI64::new(i64::MIN);

/// Write timestamp for this process, strictly increasing across calls.
///
/// Two writes inside the same wall-clock microsecond are pushed one
/// microsecond apart, so string order of the fixed-width output matches the
/// order in which writes were issued.
pub(crate) fn next_timestamp() -> String {
    let wall = Utc::now().timestamp_micros();
    let previous = LAST_MICROS
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(wall.max(last.saturating_add(1)))
        })
        .unwrap_or(wall);
    let issued = wall.max(previous.saturating_add(1));

    let when = DateTime::<Utc>::from_timestamp_micros(issued).unwrap_or_else(Utc::now);
    format_datetime(&when)
}

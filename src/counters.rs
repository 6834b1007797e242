use serde::Serialize;
use tracing::{debug, trace};

use crate::{
    error::{AppError, AppResult},
    models::PerfCounterInfo,
    session::Session,
};

const PERF_COUNTER_PROPERTY: &str = "perfCounter";

/// One line of the output table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct CounterRow {
    /// `group.name.rollup`, e.g. `cpu.usage.average`.
    pub full_name: String,
    pub level: String,
    pub summary: String,
}

impl From<&PerfCounterInfo> for CounterRow {
    fn from(counter: &PerfCounterInfo) -> Self {
        Self {
            full_name: format!(
                "{}.{}.{}",
                counter.group_info.key, counter.name_info.key, counter.rollup_type
            ),
            level: counter.level.unwrap_or_default().to_string(),
            summary: counter.name_info.summary.clone(),
        }
    }
}

/// Read every counter definition the server's performance manager knows about.
///
/// A perf manager whose `perfCounter` property comes back absent, without a fault or a missing
/// set entry, has no counters: vim25 leaves empty arrays out of the property set.
pub(crate) async fn fetch_counters<S: Session>(session: &S) -> AppResult<Vec<PerfCounterInfo>> {
    let perf_manager = session.perf_manager().cloned().ok_or_else(|| {
        AppError::Retrieval("server does not advertise a performance manager".into())
    })?;

    let object = session
        .retrieve_one(&perf_manager, &[PERF_COUNTER_PROPERTY])
        .await?;

    let counters = object
        .prop_set
        .into_iter()
        .find(|prop| prop.name == PERF_COUNTER_PROPERTY)
        .map(|prop| prop.val.perf_counters)
        .unwrap_or_default();

    debug!(count = counters.len(), "retrieved performance counters");

    Ok(counters)
}

/// One row per counter, in the order the server listed them.
pub(crate) fn project_rows(counters: &[PerfCounterInfo]) -> Vec<CounterRow> {
    counters
        .iter()
        .map(|counter| {
            let row = CounterRow::from(counter);
            trace!(key = counter.key, name = %row.full_name, "counter");
            row
        })
        .collect()
}

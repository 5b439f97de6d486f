use crate::calendar::{ShiftFilter, hours};
use crate::error::EngineError;
use crate::ledger::ShiftLedger;
use crate::model::{HoursSummaryRow, WorkerDirectory};
use crate::store::FleetStore;
use chrono::TimeDelta;
use shared::fleet::WorkerId;
use std::collections::BTreeMap;

/// Per-worker totals over the closed shifts matching `filter`, ordered by worker id.
/// Open shifts never contribute.
pub fn summarize<S: FleetStore>(
    ledger: &ShiftLedger<S>,
    directory: &impl WorkerDirectory,
    filter: &ShiftFilter,
) -> Result<Vec<HoursSummaryRow>, EngineError> {
    let shifts = ledger.list_shifts(*filter)?;

    let mut totals: BTreeMap<WorkerId, (u32, TimeDelta)> = BTreeMap::new();
    for shift in shifts.iter() {
        let Some(end) = shift.end else {
            continue;
        };
        let (count, total) = totals
            .entry(shift.worker_id)
            .or_insert((0, TimeDelta::zero()));
        *count += 1;
        *total = *total + (end - shift.start);
    }

    Ok(totals
        .into_iter()
        .map(|(worker_id, (shift_count, total))| {
            let display = directory.display_or_unregistered(worker_id);
            let total_hours = hours(total);
            HoursSummaryRow {
                worker_id,
                full_name: display.full_name,
                worker_number: display.worker_number,
                shift_count,
                total_hours,
                average_hours: total_hours / f64::from(shift_count),
            }
        })
        .collect())
}

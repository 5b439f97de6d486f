use crate::calendar::{Calendar, ShiftFilter};
use crate::error::{Conflict, EngineError, Missing};
use crate::model::Shift;
use crate::store::FleetStore;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use shared::fleet::{GeoPoint, WorkerId};
use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Default)]
struct LedgerState {
    shifts: HashMap<Uuid, Shift>,
    open_by_worker: HashMap<WorkerId, Uuid>,
    /// Workers whose shift open/close is being written to the store.
    in_flight: HashSet<WorkerId>,
}

impl LedgerState {
    fn reserve(&mut self, worker_id: WorkerId) -> Result<(), Conflict> {
        if self.in_flight.insert(worker_id) {
            Ok(())
        } else {
            Err(Conflict::ShiftChangeInFlight(worker_id))
        }
    }
}

/// Marks a worker's shift as being changed until committed or dropped. Dropping
/// without committing (store failure, cancelled future) releases the worker unchanged.
pub(crate) struct Reservation<'a> {
    state: &'a RwLock<LedgerState>,
    worker_id: WorkerId,
    released: bool,
}

impl Reservation<'_> {
    fn commit<T>(mut self, apply: impl FnOnce(&mut LedgerState) -> T) -> T {
        let mut state = self.state.write();
        let result = apply(&mut state);
        state.in_flight.remove(&self.worker_id);
        self.released = true;
        result
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.released {
            self.state.write().in_flight.remove(&self.worker_id);
        }
    }
}

/// Owns every shift record and enforces the open → closed lifecycle.
pub struct ShiftLedger<S> {
    store: Arc<S>,
    state: RwLock<LedgerState>,
    calendar: Calendar,
}

impl<S: FleetStore> ShiftLedger<S> {
    pub fn new(store: Arc<S>, calendar: Calendar) -> Self {
        Self {
            store,
            state: RwLock::new(LedgerState::default()),
            calendar,
        }
    }

    pub fn calendar(&self) -> Calendar {
        self.calendar
    }

    /// Replaces the ledger contents with shifts loaded from the store.
    pub fn hydrate(&self, shifts: Vec<Shift>) {
        let mut state = self.state.write();
        *state = LedgerState::default();

        let mut open: Vec<&Shift> = shifts.iter().filter(|s| s.is_open()).collect();
        open.sort_by_key(|s| (s.start, s.id));
        for shift in open {
            if let Some(previous) = state.open_by_worker.insert(shift.worker_id, shift.id) {
                warn!(
                    worker_id = shift.worker_id,
                    shift_id = %previous,
                    "stored history has several open shifts for one worker, tracking the latest"
                );
            }
        }
        state
            .shifts
            .extend(shifts.into_iter().map(|shift| (shift.id, shift)));
        debug!(
            shifts = state.shifts.len(),
            open = state.open_by_worker.len(),
            "hydrated shift ledger"
        );
    }

    pub async fn open_shift(
        &self,
        worker_id: WorkerId,
        at: DateTime<Utc>,
        position: Option<GeoPoint>,
    ) -> Result<Shift, EngineError> {
        self.open_shift_admitted(worker_id, at, position, || Ok(()))
            .await
    }

    /// Opens a shift once `admit` accepts the worker. `admit` runs under the ledger
    /// lock, so a worker held for removal is refused here, or already removed by the
    /// time `admit` looks it up.
    pub async fn open_shift_admitted(
        &self,
        worker_id: WorkerId,
        at: DateTime<Utc>,
        position: Option<GeoPoint>,
        admit: impl FnOnce() -> Result<(), EngineError>,
    ) -> Result<Shift, EngineError> {
        let reservation = {
            let mut state = self.state.write();
            admit()?;
            if state.open_by_worker.contains_key(&worker_id) {
                return Err(Conflict::ShiftAlreadyOpen(worker_id).into());
            }
            state.reserve(worker_id)?;
            Reservation {
                state: &self.state,
                worker_id,
                released: false,
            }
        };

        let shift = Shift::open(worker_id, at, position);
        self.store.insert_shift(&shift).await?;

        reservation.commit(|state| {
            state.open_by_worker.insert(worker_id, shift.id);
            state.shifts.insert(shift.id, shift.clone());
        });
        info!(worker_id, shift_id = %shift.id, start = %at, "opened shift");
        Ok(shift)
    }

    /// Blocks shift changes for a worker without any shift history until the returned
    /// guard is dropped.
    pub(crate) fn hold_without_history(
        &self,
        worker_id: WorkerId,
    ) -> Result<Reservation<'_>, EngineError> {
        let mut state = self.state.write();
        if state.shifts.values().any(|s| s.worker_id == worker_id) {
            return Err(Conflict::WorkerHasHistory(worker_id).into());
        }
        state.reserve(worker_id)?;
        Ok(Reservation {
            state: &self.state,
            worker_id,
            released: false,
        })
    }

    pub async fn close_shift(
        &self,
        worker_id: WorkerId,
        at: DateTime<Utc>,
        position: Option<GeoPoint>,
    ) -> Result<Shift, EngineError> {
        let shift_id = self
            .state
            .read()
            .open_by_worker
            .get(&worker_id)
            .copied()
            .ok_or(Missing::OpenShift(worker_id))?;
        self.close(shift_id, at, position).await
    }

    /// Administrative close keyed by shift id, for workers whose device cannot report.
    pub async fn force_close(
        &self,
        shift_id: Uuid,
        at: DateTime<Utc>,
        position: Option<GeoPoint>,
    ) -> Result<Shift, EngineError> {
        let shift = self.close(shift_id, at, position).await?;
        info!(worker_id = shift.worker_id, shift_id = %shift_id, "shift force-closed by operator");
        Ok(shift)
    }

    async fn close(
        &self,
        shift_id: Uuid,
        at: DateTime<Utc>,
        position: Option<GeoPoint>,
    ) -> Result<Shift, EngineError> {
        let (reservation, mut shift) = {
            let mut state = self.state.write();
            let shift = match state.shifts.get(&shift_id) {
                Some(shift) if shift.is_open() => shift.clone(),
                _ => return Err(Missing::Shift(shift_id).into()),
            };
            if at < shift.start {
                return Err(EngineError::InvalidTime {
                    start: shift.start,
                    end: at,
                });
            }
            state.reserve(shift.worker_id)?;
            let reservation = Reservation {
                state: &self.state,
                worker_id: shift.worker_id,
                released: false,
            };
            (reservation, shift)
        };

        self.store.close_shift(shift_id, at, position).await?;

        shift.end = Some(at);
        shift.end_position = position;
        reservation.commit(|state| {
            if state.open_by_worker.get(&shift.worker_id) == Some(&shift_id) {
                state.open_by_worker.remove(&shift.worker_id);
            }
            state.shifts.insert(shift_id, shift.clone());
        });
        info!(
            worker_id = shift.worker_id,
            shift_id = %shift_id,
            hours = shift.duration_hours(at),
            "closed shift"
        );
        Ok(shift)
    }

    pub fn get(&self, shift_id: Uuid) -> Option<Shift> {
        self.state.read().shifts.get(&shift_id).cloned()
    }

    pub fn open_shift_of(&self, worker_id: WorkerId) -> Option<Shift> {
        let state = self.state.read();
        state
            .open_by_worker
            .get(&worker_id)
            .and_then(|id| state.shifts.get(id))
            .cloned()
    }

    /// Every open shift, including any extra open shifts left over in stored history.
    pub fn open_shifts(&self) -> Vec<Shift> {
        self.state
            .read()
            .shifts
            .values()
            .filter(|s| s.is_open())
            .cloned()
            .collect()
    }

    pub fn has_history(&self, worker_id: WorkerId) -> bool {
        let state = self.state.read();
        state.in_flight.contains(&worker_id)
            || state.shifts.values().any(|s| s.worker_id == worker_id)
    }

    pub fn list_shifts(&self, filter: ShiftFilter) -> Result<ShiftList, EngineError> {
        filter.validate()?;
        let mut shifts: Vec<Shift> = self.state.read().shifts.values().cloned().collect();
        shifts.sort_by_key(|s| Reverse((s.start, s.id)));
        Ok(ShiftList {
            shifts,
            filter,
            calendar: self.calendar,
        })
    }
}

/// Point-in-time copy of the ledger, newest shift first. Filtering happens while
/// iterating, and [`ShiftList::iter`] can be called any number of times.
#[derive(Debug, Clone)]
pub struct ShiftList {
    shifts: Vec<Shift>,
    filter: ShiftFilter,
    calendar: Calendar,
}

impl ShiftList {
    pub fn iter(&self) -> impl Iterator<Item = &Shift> + '_ {
        self.shifts
            .iter()
            .filter(|s| self.filter.matches(s.worker_id, self.calendar.day_of(s.start)))
    }

    pub fn filter(&self) -> &ShiftFilter {
        &self.filter
    }
}

impl<'a> IntoIterator for &'a ShiftList {
    type Item = &'a Shift;
    type IntoIter = Box<dyn Iterator<Item = &'a Shift> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

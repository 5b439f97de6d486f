pub mod alerts;
pub mod positions;
pub mod reports;
pub mod shifts;
pub mod workers;

#[cfg(test)]
pub(crate) mod test_support {
    use crate::state::SharedFleet;
    use crate::store::ConfiguredStore;
    use chrono::{DateTime, TimeZone, Utc};
    use fleet_engine::model::NewWorker;
    use fleet_engine::store::MemoryStore;
    use fleet_engine::{Fleet, FleetSettings};
    use std::sync::Arc;

    pub fn registered_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    /// A fleet on an in-memory store with workers 1 and 2 registered.
    pub async fn fleet() -> SharedFleet {
        let fleet = Fleet::new(
            Arc::new(ConfiguredStore::Memory(MemoryStore::new())),
            FleetSettings::default(),
        );
        for (id, name) in [(1, "Clara Núñez"), (2, "Óscar Prats")] {
            fleet
                .register_worker(
                    NewWorker {
                        id,
                        full_name: name.to_string(),
                        worker_number: id * 10,
                        vehicle: None,
                    },
                    registered_at(),
                )
                .await
                .unwrap();
        }
        Arc::new(fleet)
    }
}

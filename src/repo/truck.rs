use rusqlite::{Connection, OptionalExtension};
use std::collections::HashMap;
use crate::models::{StageRecord, Truck};
use super::{StoreError, StoreResult, TruckStore};

const KIND: &str = "Truck";

/// Raw `trucks` row before its stages are attached
struct TruckRow {
    tracking_number: String,
    details_json: Option<String>,
    current_stage: i64,
    finished: bool,
    version: i64,
    created_ts: i64,
    modified_ts: i64,
}

/// Truck repository over SQLite
pub struct TruckRepo<'c> {
    conn: &'c Connection,
}

impl<'c> TruckRepo<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    fn get_stages(&self, tracking_number: &str) -> StoreResult<Vec<StageRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT stage_number, name, start_ts, end_ts
             FROM truck_stages
             WHERE tracking_number = ?1
             ORDER BY stage_number"
        )?;

        let rows = stmt.query_map([tracking_number], |row| {
            let mut record = StageRecord::new(&row.get::<_, String>(1)?, row.get::<_, i64>(0)? as usize);
            record.start = row.get(2)?;
            record.end = row.get(3)?;
            Ok(record)
        })?;

        let mut stages = Vec::new();
        for row in rows {
            stages.push(row?);
        }
        Ok(stages)
    }

    fn assemble(&self, row: TruckRow) -> StoreResult<Truck> {
        let details = match row.details_json {
            Some(json) => serde_json::from_str::<HashMap<String, String>>(&json)?,
            None => HashMap::new(),
        };
        let stages = self.get_stages(&row.tracking_number)?;

        let truck = Truck {
            tracking_number: row.tracking_number,
            details,
            stages,
            current_stage: row.current_stage as usize,
            finished: row.finished,
            version: row.version,
            created_ts: row.created_ts,
            modified_ts: row.modified_ts,
        };
        if let Err(problem) = truck.check_consistency() {
            log::warn!("Inconsistent truck record: {}", problem);
        }
        Ok(truck)
    }

    fn details_json(truck: &Truck) -> StoreResult<Option<String>> {
        if truck.details.is_empty() {
            Ok(None)
        } else {
            Ok(Some(serde_json::to_string(&truck.details)?))
        }
    }
}

fn map_truck_row(row: &rusqlite::Row) -> rusqlite::Result<TruckRow> {
    Ok(TruckRow {
        tracking_number: row.get(0)?,
        details_json: row.get(1)?,
        current_stage: row.get(2)?,
        finished: row.get(3)?,
        version: row.get(4)?,
        created_ts: row.get(5)?,
        modified_ts: row.get(6)?,
    })
}

impl TruckStore for TruckRepo<'_> {
    fn load(&self, tracking_number: &str) -> StoreResult<Truck> {
        let row = self.conn
            .query_row(
                "SELECT tracking_number, details_json, current_stage, finished, version,
                        created_ts, modified_ts
                 FROM trucks WHERE tracking_number = ?1",
                [tracking_number],
                map_truck_row,
            )
            .optional()?
            .ok_or_else(|| StoreError::not_found(KIND, tracking_number))?;

        self.assemble(row)
    }

    fn exists(&self, tracking_number: &str) -> StoreResult<bool> {
        let found = self.conn
            .query_row(
                "SELECT 1 FROM trucks WHERE tracking_number = ?1",
                [tracking_number],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Insert a new truck and its stage rows in one transaction
    fn insert(&self, truck: &Truck) -> StoreResult<Truck> {
        let details_json = Self::details_json(truck)?;
        let tx = self.conn.unchecked_transaction()?;

        tx.execute(
            "INSERT INTO trucks (tracking_number, details_json, current_stage, finished, version,
                    created_ts, modified_ts)
             VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6)",
            rusqlite::params![
                truck.tracking_number,
                details_json,
                truck.current_stage as i64,
                truck.finished,
                truck.created_ts,
                truck.modified_ts,
            ],
        )
        .map_err(|e| {
            if e.to_string().contains("UNIQUE constraint") {
                StoreError::already_exists(KIND, &truck.tracking_number)
            } else {
                StoreError::Sqlite(e)
            }
        })?;

        for record in &truck.stages {
            tx.execute(
                "INSERT INTO truck_stages (tracking_number, stage_number, name, start_ts, end_ts)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    truck.tracking_number,
                    record.stage.stage_number as i64,
                    record.stage.name,
                    record.start,
                    record.end,
                ],
            )?;
        }

        tx.commit()?;
        Ok(Truck {
            version: 0,
            ..truck.clone()
        })
    }

    /// Write back position, flag and stage timestamps if nobody else has
    /// saved since `truck.version` was read
    fn save(&self, truck: &Truck) -> StoreResult<Truck> {
        let details_json = Self::details_json(truck)?;
        let tx = self.conn.unchecked_transaction()?;

        let updated = tx.execute(
            "UPDATE trucks
             SET details_json = ?1, current_stage = ?2, finished = ?3,
                 version = version + 1, modified_ts = ?4
             WHERE tracking_number = ?5 AND version = ?6",
            rusqlite::params![
                details_json,
                truck.current_stage as i64,
                truck.finished,
                truck.modified_ts,
                truck.tracking_number,
                truck.version,
            ],
        )?;

        if updated == 0 {
            let exists = tx
                .query_row(
                    "SELECT 1 FROM trucks WHERE tracking_number = ?1",
                    [&truck.tracking_number],
                    |_| Ok(()),
                )
                .optional()?
                .is_some();
            // Dropping tx rolls back
            return Err(if exists {
                StoreError::VersionConflict(truck.tracking_number.clone())
            } else {
                StoreError::not_found(KIND, &truck.tracking_number)
            });
        }

        // Stage names and order are fixed at creation; only timestamps move
        for record in &truck.stages {
            tx.execute(
                "UPDATE truck_stages SET start_ts = ?1, end_ts = ?2
                 WHERE tracking_number = ?3 AND stage_number = ?4",
                rusqlite::params![
                    record.start,
                    record.end,
                    truck.tracking_number,
                    record.stage.stage_number as i64,
                ],
            )?;
        }

        tx.commit()?;
        Ok(Truck {
            version: truck.version + 1,
            ..truck.clone()
        })
    }

    /// All trucks, oldest first
    fn list(&self) -> StoreResult<Vec<Truck>> {
        let mut stmt = self.conn.prepare(
            "SELECT tracking_number, details_json, current_stage, finished, version,
                    created_ts, modified_ts
             FROM trucks ORDER BY created_ts, tracking_number"
        )?;

        let rows = stmt.query_map([], map_truck_row)?;
        let mut raw = Vec::new();
        for row in rows {
            raw.push(row?);
        }

        raw.into_iter().map(|row| self.assemble(row)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbConnection;
    use crate::models::{Role, User};
    use crate::tracker::StageTracker;

    fn new_truck(tracking_number: &str, names: &[&str]) -> Truck {
        let names: Vec<String> = names.iter().map(|s| s.to_string()).collect();
        StageTracker::create_truck(tracking_number, HashMap::new(), &names).unwrap()
    }

    fn admin() -> User {
        User::new("admin@yard", "Admin", Role::Admin)
    }

    #[test]
    fn test_insert_and_load() {
        let conn = DbConnection::connect_in_memory().unwrap();
        let repo = TruckRepo::new(&conn);

        let mut truck = new_truck("TRK-1", &["entry_gate", "weigh_bridge"]);
        truck.details.insert("driver".to_string(), "Sam".to_string());
        repo.insert(&truck).unwrap();

        let loaded = repo.load("TRK-1").unwrap();
        assert_eq!(loaded, truck);
        assert_eq!(loaded.stages[1].name(), "weigh_bridge");
        assert_eq!(loaded.stages[1].stage.stage_number, 1);
    }

    #[test]
    fn test_load_missing() {
        let conn = DbConnection::connect_in_memory().unwrap();
        let repo = TruckRepo::new(&conn);
        let result = repo.load("NOPE");
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
        assert!(!repo.exists("NOPE").unwrap());
    }

    #[test]
    fn test_insert_duplicate() {
        let conn = DbConnection::connect_in_memory().unwrap();
        let repo = TruckRepo::new(&conn);
        repo.insert(&new_truck("TRK-1", &["qc"])).unwrap();

        let result = repo.insert(&new_truck("TRK-1", &["qc"]));
        assert!(matches!(result, Err(StoreError::AlreadyExists { .. })));
        assert!(repo.exists("TRK-1").unwrap());
    }

    #[test]
    fn test_save_bumps_version() {
        let conn = DbConnection::connect_in_memory().unwrap();
        let repo = TruckRepo::new(&conn);
        let truck = repo.insert(&new_truck("TRK-1", &["entry_gate", "qc"])).unwrap();

        let started = StageTracker::record_event_at(&truck, "entry_gate", true, &admin(), 500).unwrap();
        let saved = repo.save(&started).unwrap();
        assert_eq!(saved.version, 1);

        let loaded = repo.load("TRK-1").unwrap();
        assert_eq!(loaded.version, 1);
        assert_eq!(loaded.current_stage, 1);
        assert_eq!(loaded.stages[0].start, Some(500));
        assert_eq!(loaded.stages[0].end, None);
    }

    #[test]
    fn test_save_stale_snapshot_conflicts() {
        let conn = DbConnection::connect_in_memory().unwrap();
        let repo = TruckRepo::new(&conn);
        let truck = repo.insert(&new_truck("TRK-1", &["entry_gate", "qc"])).unwrap();

        // Two writers read the same snapshot
        let first = StageTracker::record_event_at(&truck, "entry_gate", true, &admin(), 500).unwrap();
        let second = StageTracker::record_event_at(&truck, "entry_gate", true, &admin(), 501).unwrap();

        repo.save(&first).unwrap();
        let result = repo.save(&second);
        assert!(matches!(result, Err(StoreError::VersionConflict(_))));

        // The losing write left nothing behind
        let loaded = repo.load("TRK-1").unwrap();
        assert_eq!(loaded.stages[0].start, Some(500));
        assert_eq!(loaded.current_stage, 1);
    }

    #[test]
    fn test_save_missing_truck() {
        let conn = DbConnection::connect_in_memory().unwrap();
        let repo = TruckRepo::new(&conn);
        let result = repo.save(&new_truck("GHOST", &["qc"]));
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[test]
    fn test_list() {
        let conn = DbConnection::connect_in_memory().unwrap();
        let repo = TruckRepo::new(&conn);
        repo.insert(&new_truck("A-1", &["qc"])).unwrap();
        repo.insert(&new_truck("B-2", &["entry_gate", "qc"])).unwrap();

        let trucks = repo.list().unwrap();
        assert_eq!(trucks.len(), 2);
        let b = trucks.iter().find(|t| t.tracking_number == "B-2").unwrap();
        assert_eq!(b.stages.len(), 2);
    }
}

use crate::Database;
use crate::models::{LoadChanges, LoadRow, MessageRow, NewLoad, NewUser, Transition, UserRow};
use anyhow::Result;
use chrono::{DateTime, Utc};
use haul_types::models::{LoadStatus, UserProfile};
use rusqlite::{Connection, OptionalExtension, Row, params};

const USER_COLUMNS: &str = "id, name, email, phone, user_type, password_hash, location, \
     vehicle_info, service_area, license_info, created_at";

// Owner is always present; driver only after a claim.
const LOAD_SELECT: &str = "SELECT l.id, l.owner_id, l.driver_id, l.title, l.description,
            l.pickup_location, l.delivery_location, l.status, l.weight, l.dimensions,
            l.pickup_date, l.special_requirements, l.images, l.created_at, l.updated_at,
            o.name, o.email, o.phone, d.name, d.email, d.phone
     FROM loads l
     JOIN users o ON o.id = l.owner_id
     LEFT JOIN users d ON d.id = l.driver_id";

impl Database {
    // -- Users --

    /// Insert a user. Returns `None` if the email is already registered.
    pub fn create_user(&self, user: &NewUser<'_>, now: DateTime<Utc>) -> Result<Option<UserRow>> {
        let (location, vehicle_info, service_area, license_info) = match user.profile {
            UserProfile::LoadOwner { location } => (location.clone(), None, None, None),
            UserProfile::Driver {
                vehicle_info,
                service_area,
                license_info,
            } => (
                None,
                vehicle_info.as_ref().map(serde_json::to_string).transpose()?,
                service_area.clone(),
                license_info.clone(),
            ),
        };

        self.with_conn_mut(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (name, email, phone, user_type, password_hash, location,
                                    vehicle_info, service_area, license_info, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    user.name,
                    user.email,
                    user.phone,
                    user.profile.role().as_str(),
                    user.password_hash,
                    location,
                    vehicle_info,
                    service_area,
                    license_info,
                    now,
                ],
            );

            match inserted {
                Ok(_) => {}
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
                {
                    return Ok(None);
                }
                Err(e) => return Err(e.into()),
            }

            let id = conn.last_insert_rowid();
            query_user(conn, "id", &id)
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", &email))
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", &id))
    }

    // -- Loads --

    pub fn insert_load(&self, load: &NewLoad, now: DateTime<Utc>) -> Result<LoadRow> {
        let images = load.images.as_ref().map(serde_json::to_string).transpose()?;

        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO loads (owner_id, title, description, pickup_location, delivery_location,
                                    status, weight, dimensions, pickup_date, special_requirements,
                                    images, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)",
                params![
                    load.owner_id,
                    load.title,
                    load.description,
                    load.pickup_location,
                    load.delivery_location,
                    LoadStatus::Posted.as_str(),
                    load.weight,
                    load.dimensions,
                    load.pickup_date,
                    load.special_requirements,
                    images,
                    now,
                ],
            )?;

            let id = conn.last_insert_rowid();
            query_load(conn, id)?.ok_or_else(|| anyhow::anyhow!("Load {} vanished after insert", id))
        })
    }

    pub fn get_load(&self, id: i64) -> Result<Option<LoadRow>> {
        self.with_conn(|conn| query_load(conn, id))
    }

    /// All loads in id order, optionally restricted to one status.
    pub fn list_loads(&self, status: Option<LoadStatus>) -> Result<Vec<LoadRow>> {
        self.with_conn(|conn| {
            let sql = format!("{} WHERE (?1 IS NULL OR l.status = ?1) ORDER BY l.id", LOAD_SELECT);
            query_loads(conn, &sql, params![status.map(|s| s.as_str())])
        })
    }

    pub fn get_loads_by_owner(&self, owner_id: i64) -> Result<Vec<LoadRow>> {
        self.with_conn(|conn| {
            let sql = format!("{} WHERE l.owner_id = ?1 ORDER BY l.id", LOAD_SELECT);
            query_loads(conn, &sql, params![owner_id])
        })
    }

    pub fn get_loads_by_driver(&self, driver_id: i64) -> Result<Vec<LoadRow>> {
        self.with_conn(|conn| {
            let sql = format!("{} WHERE l.driver_id = ?1 ORDER BY l.id", LOAD_SELECT);
            query_loads(conn, &sql, params![driver_id])
        })
    }

    /// Apply the non-`None` columns of `changes` and bump `updated_at`.
    /// Returns the updated load, or `None` if it does not exist.
    pub fn update_load(
        &self,
        id: i64,
        changes: &LoadChanges,
        now: DateTime<Utc>,
    ) -> Result<Option<LoadRow>> {
        let images = changes.images.as_ref().map(serde_json::to_string).transpose()?;

        self.with_conn_mut(|conn| {
            let updated = conn.execute(
                "UPDATE loads SET
                    title = COALESCE(?2, title),
                    description = COALESCE(?3, description),
                    pickup_location = COALESCE(?4, pickup_location),
                    delivery_location = COALESCE(?5, delivery_location),
                    weight = COALESCE(?6, weight),
                    dimensions = COALESCE(?7, dimensions),
                    pickup_date = COALESCE(?8, pickup_date),
                    special_requirements = COALESCE(?9, special_requirements),
                    images = COALESCE(?10, images),
                    updated_at = ?11
                 WHERE id = ?1",
                params![
                    id,
                    changes.title,
                    changes.description,
                    changes.pickup_location,
                    changes.delivery_location,
                    changes.weight,
                    changes.dimensions,
                    changes.pickup_date,
                    changes.special_requirements,
                    images,
                    now,
                ],
            )?;

            if updated == 0 {
                return Ok(None);
            }
            query_load(conn, id)
        })
    }

    /// Delete a load owned by `owner_id`. Its messages cascade.
    pub fn delete_load(&self, id: i64, owner_id: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let deleted = conn.execute(
                "DELETE FROM loads WHERE id = ?1 AND owner_id = ?2",
                params![id, owner_id],
            )?;
            Ok(deleted > 0)
        })
    }

    /// Move a load from `transition.from` to `transition.to` in a single
    /// conditional UPDATE. Returns false if the load was not in `from`
    /// (or does not exist), so concurrent callers see at most one success.
    pub fn transition_load(&self, transition: &Transition, now: DateTime<Utc>) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let updated = conn.execute(
                "UPDATE loads SET
                    status = ?3,
                    driver_id = COALESCE(?4, driver_id),
                    updated_at = ?5
                 WHERE id = ?1 AND status = ?2",
                params![
                    transition.load_id,
                    transition.from.as_str(),
                    transition.to.as_str(),
                    transition.assign_driver,
                    now,
                ],
            )?;
            Ok(updated == 1)
        })
    }

    // -- Messages --

    pub fn insert_message(
        &self,
        load_id: i64,
        sender_id: i64,
        body: &str,
        now: DateTime<Utc>,
    ) -> Result<MessageRow> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO messages (load_id, sender_id, message, timestamp) VALUES (?1, ?2, ?3, ?4)",
                params![load_id, sender_id, body, now],
            )?;

            let id = conn.last_insert_rowid();
            let row = conn.query_row(
                "SELECT m.id, m.load_id, m.sender_id, u.name, m.message, m.timestamp
                 FROM messages m
                 JOIN users u ON u.id = m.sender_id
                 WHERE m.id = ?1",
                [id],
                map_message_row,
            )?;
            Ok(row)
        })
    }

    /// Messages for a load, oldest first.
    pub fn get_messages(&self, load_id: i64) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            // JOIN users to fetch sender_name in a single query
            let mut stmt = conn.prepare(
                "SELECT m.id, m.load_id, m.sender_id, u.name, m.message, m.timestamp
                 FROM messages m
                 JOIN users u ON u.id = m.sender_id
                 WHERE m.load_id = ?1
                 ORDER BY m.timestamp, m.id",
            )?;

            let rows = stmt
                .query_map([load_id], map_message_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Cheap round trip for health checks.
    pub fn ping(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &dyn rusqlite::ToSql) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {} FROM users WHERE {} = ?1", USER_COLUMNS, column);
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                name: row.get(1)?,
                email: row.get(2)?,
                phone: row.get(3)?,
                user_type: row.get(4)?,
                password_hash: row.get(5)?,
                location: row.get(6)?,
                vehicle_info: row.get(7)?,
                service_area: row.get(8)?,
                license_info: row.get(9)?,
                created_at: row.get(10)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_load(conn: &Connection, id: i64) -> Result<Option<LoadRow>> {
    let sql = format!("{} WHERE l.id = ?1", LOAD_SELECT);
    let row = conn.query_row(&sql, [id], map_load_row).optional()?;
    Ok(row)
}

fn query_loads(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> Result<Vec<LoadRow>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, map_load_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn map_load_row(row: &Row<'_>) -> rusqlite::Result<LoadRow> {
    Ok(LoadRow {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        driver_id: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        pickup_location: row.get(5)?,
        delivery_location: row.get(6)?,
        status: row.get(7)?,
        weight: row.get(8)?,
        dimensions: row.get(9)?,
        pickup_date: row.get(10)?,
        special_requirements: row.get(11)?,
        images: row.get(12)?,
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
        owner_name: row.get(15)?,
        owner_email: row.get(16)?,
        owner_phone: row.get(17)?,
        driver_name: row.get(18)?,
        driver_email: row.get(19)?,
        driver_phone: row.get(20)?,
    })
}

fn map_message_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        load_id: row.get(1)?,
        sender_id: row.get(2)?,
        sender_name: row.get(3)?,
        message: row.get(4)?,
        timestamp: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use haul_types::models::VehicleInfo;

    fn owner_profile() -> UserProfile {
        UserProfile::LoadOwner {
            location: Some("Seattle, WA".into()),
        }
    }

    fn driver_profile() -> UserProfile {
        UserProfile::Driver {
            vehicle_info: Some(VehicleInfo {
                vehicle_type: "Pickup Truck".into(),
                capacity: Some("1000 kg".into()),
                dimensions: None,
            }),
            service_area: Some("King County".into()),
            license_info: None,
        }
    }

    fn add_user(db: &Database, email: &str, profile: &UserProfile) -> UserRow {
        db.create_user(
            &NewUser {
                name: "Test User",
                email,
                phone: "555-0100",
                password_hash: "not-a-real-hash",
                profile,
            },
            Utc::now(),
        )
        .unwrap()
        .expect("email should be free")
    }

    fn add_load(db: &Database, owner_id: i64, images: Option<Vec<String>>) -> LoadRow {
        db.insert_load(
            &NewLoad {
                owner_id,
                title: "Piano move".into(),
                description: "Baby grand".into(),
                pickup_location: "A".into(),
                delivery_location: "B".into(),
                weight: Some(300.0),
                dimensions: None,
                pickup_date: None,
                special_requirements: None,
                images,
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn duplicate_email_is_reported_not_raised() {
        let db = Database::open_in_memory().unwrap();
        add_user(&db, "alice@example.com", &owner_profile());

        let again = db
            .create_user(
                &NewUser {
                    name: "Other",
                    email: "alice@example.com",
                    phone: "1",
                    password_hash: "x",
                    profile: &driver_profile(),
                },
                Utc::now(),
            )
            .unwrap();
        assert!(again.is_none());
    }

    #[test]
    fn driver_profile_columns_round_trip() {
        let db = Database::open_in_memory().unwrap();
        let bob = add_user(&db, "bob@example.com", &driver_profile());

        let row = db.get_user_by_email("bob@example.com").unwrap().unwrap();
        assert_eq!(row.id, bob.id);
        assert_eq!(row.user_type, "driver");
        assert!(row.location.is_none());
        assert!(row.vehicle_info.unwrap().contains("Pickup Truck"));
        assert!(db.get_user_by_id(bob.id + 100).unwrap().is_none());
    }

    #[test]
    fn new_load_is_posted_and_enriched() {
        let db = Database::open_in_memory().unwrap();
        let alice = add_user(&db, "alice@example.com", &owner_profile());
        let load = add_load(&db, alice.id, None);

        assert_eq!(load.status, "posted");
        assert_eq!(load.owner_email, "alice@example.com");
        assert!(load.driver_id.is_none());
        assert!(load.driver_name.is_none());
        assert_eq!(load.created_at, load.updated_at);
    }

    #[test]
    fn claim_applies_once() {
        let db = Database::open_in_memory().unwrap();
        let alice = add_user(&db, "alice@example.com", &owner_profile());
        let bob = add_user(&db, "bob@example.com", &driver_profile());
        let carol = add_user(&db, "carol@example.com", &driver_profile());
        let load = add_load(&db, alice.id, None);

        let claim = |driver: i64| Transition {
            load_id: load.id,
            from: LoadStatus::Posted,
            to: LoadStatus::Claimed,
            assign_driver: Some(driver),
        };

        let claimed_at = load.updated_at + Duration::minutes(5);
        assert!(db.transition_load(&claim(bob.id), claimed_at).unwrap());
        assert!(!db.transition_load(&claim(carol.id), claimed_at + Duration::minutes(1)).unwrap());

        let stored = db.get_load(load.id).unwrap().unwrap();
        assert_eq!(stored.status, "claimed");
        assert_eq!(stored.updated_at, claimed_at);
        assert_eq!(stored.created_at, load.created_at);
        assert_eq!(stored.driver_id, Some(bob.id));
        assert_eq!(stored.driver_email.as_deref(), Some("bob@example.com"));
        assert_eq!(db.get_loads_by_driver(bob.id).unwrap().len(), 1);
        assert!(db.get_loads_by_driver(carol.id).unwrap().is_empty());
    }

    #[test]
    fn transition_keeps_driver_when_not_reassigning() {
        let db = Database::open_in_memory().unwrap();
        let alice = add_user(&db, "alice@example.com", &owner_profile());
        let bob = add_user(&db, "bob@example.com", &driver_profile());
        let load = add_load(&db, alice.id, None);

        db.transition_load(
            &Transition {
                load_id: load.id,
                from: LoadStatus::Posted,
                to: LoadStatus::Claimed,
                assign_driver: Some(bob.id),
            },
            Utc::now(),
        )
        .unwrap();
        let accepted = db
            .transition_load(
                &Transition {
                    load_id: load.id,
                    from: LoadStatus::Claimed,
                    to: LoadStatus::Accepted,
                    assign_driver: None,
                },
                Utc::now(),
            )
            .unwrap();
        assert!(accepted);

        let stored = db.get_load(load.id).unwrap().unwrap();
        assert_eq!(stored.status, "accepted");
        assert_eq!(stored.driver_id, Some(bob.id));
    }

    #[test]
    fn status_filter_and_owner_listing() {
        let db = Database::open_in_memory().unwrap();
        let alice = add_user(&db, "alice@example.com", &owner_profile());
        let dave = add_user(&db, "dave@example.com", &owner_profile());
        let bob = add_user(&db, "bob@example.com", &driver_profile());
        let first = add_load(&db, alice.id, None);
        add_load(&db, alice.id, None);
        add_load(&db, dave.id, None);

        db.transition_load(
            &Transition {
                load_id: first.id,
                from: LoadStatus::Posted,
                to: LoadStatus::Claimed,
                assign_driver: Some(bob.id),
            },
            Utc::now(),
        )
        .unwrap();

        assert_eq!(db.list_loads(None).unwrap().len(), 3);
        assert_eq!(db.list_loads(Some(LoadStatus::Posted)).unwrap().len(), 2);
        let claimed = db.list_loads(Some(LoadStatus::Claimed)).unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].id, first.id);
        assert_eq!(db.get_loads_by_owner(alice.id).unwrap().len(), 2);
        assert_eq!(db.get_loads_by_owner(dave.id).unwrap().len(), 1);
    }

    #[test]
    fn update_replaces_only_given_columns() {
        let db = Database::open_in_memory().unwrap();
        let alice = add_user(&db, "alice@example.com", &owner_profile());
        let load = add_load(&db, alice.id, Some(vec!["a.jpg".into(), "b.jpg".into()]));

        let changes = LoadChanges {
            title: Some("Upright piano".into()),
            images: Some(vec!["c.jpg".into()]),
            ..Default::default()
        };
        let edited_at = load.updated_at + Duration::hours(1);
        let updated = db.update_load(load.id, &changes, edited_at).unwrap().unwrap();

        assert_eq!(updated.title, "Upright piano");
        assert_eq!(updated.description, "Baby grand");
        assert_eq!(updated.weight, Some(300.0));
        assert_eq!(updated.images.as_deref(), Some(r#"["c.jpg"]"#));
        assert_eq!(updated.updated_at, edited_at);
        assert!(updated.updated_at > load.updated_at);
        assert_eq!(updated.created_at, load.created_at);

        assert!(db.update_load(9999, &changes, Utc::now()).unwrap().is_none());
    }

    #[test]
    fn delete_requires_owner_and_cascades_messages() {
        let db = Database::open_in_memory().unwrap();
        let alice = add_user(&db, "alice@example.com", &owner_profile());
        let bob = add_user(&db, "bob@example.com", &driver_profile());
        let load = add_load(&db, alice.id, None);

        db.insert_message(load.id, alice.id, "hello", Utc::now()).unwrap();
        db.insert_message(load.id, bob.id, "hi", Utc::now()).unwrap();
        assert_eq!(db.get_messages(load.id).unwrap().len(), 2);

        assert!(!db.delete_load(load.id, bob.id).unwrap());
        assert!(db.delete_load(load.id, alice.id).unwrap());
        assert!(db.get_load(load.id).unwrap().is_none());
        assert!(db.get_messages(load.id).unwrap().is_empty());
    }

    #[test]
    fn messages_come_back_in_order_with_sender_name() {
        let db = Database::open_in_memory().unwrap();
        let alice = add_user(&db, "alice@example.com", &owner_profile());
        let load = add_load(&db, alice.id, None);

        let first = db.insert_message(load.id, alice.id, "one", Utc::now()).unwrap();
        assert_eq!(first.sender_name, "Test User");
        db.insert_message(load.id, alice.id, "two", Utc::now()).unwrap();

        let bodies: Vec<String> = db
            .get_messages(load.id)
            .unwrap()
            .into_iter()
            .map(|m| m.message)
            .collect();
        assert_eq!(bodies, vec!["one", "two"]);
    }

    #[test]
    fn ping_succeeds() {
        let db = Database::open_in_memory().unwrap();
        db.ping().unwrap();
    }
}

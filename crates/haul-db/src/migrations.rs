use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            name            TEXT NOT NULL,
            email           TEXT NOT NULL UNIQUE,
            phone           TEXT NOT NULL,
            user_type       TEXT NOT NULL CHECK (user_type IN ('load_owner', 'driver')),
            password_hash   TEXT NOT NULL,
            location        TEXT,
            vehicle_info    TEXT CHECK (vehicle_info IS NULL OR json_valid(vehicle_info)),
            service_area    TEXT,
            license_info    TEXT,
            created_at      TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS loads (
            id                      INTEGER PRIMARY KEY AUTOINCREMENT,
            owner_id                INTEGER NOT NULL REFERENCES users(id),
            driver_id               INTEGER REFERENCES users(id),
            title                   TEXT NOT NULL,
            description             TEXT NOT NULL,
            pickup_location         TEXT NOT NULL,
            delivery_location       TEXT NOT NULL,
            status                  TEXT NOT NULL DEFAULT 'posted'
                CHECK (status IN ('posted', 'claimed', 'accepted', 'in_transit', 'delivered')),
            weight                  REAL CHECK (weight IS NULL OR weight > 0),
            dimensions              TEXT,
            pickup_date             TEXT,
            special_requirements    TEXT,
            images                  TEXT CHECK (images IS NULL OR json_valid(images)),
            created_at              TEXT NOT NULL,
            updated_at              TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_loads_owner ON loads(owner_id);
        CREATE INDEX IF NOT EXISTS idx_loads_driver ON loads(driver_id);
        CREATE INDEX IF NOT EXISTS idx_loads_status ON loads(status);

        -- Messages go away with their load
        CREATE TABLE IF NOT EXISTS messages (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            load_id     INTEGER NOT NULL REFERENCES loads(id) ON DELETE CASCADE,
            sender_id   INTEGER NOT NULL REFERENCES users(id),
            message     TEXT NOT NULL,
            timestamp   TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_load
            ON messages(load_id, timestamp);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}

use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS connected_accounts (
            id          TEXT PRIMARY KEY,
            user_a      TEXT NOT NULL,
            user_b      TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            UNIQUE(user_a, user_b),
            CHECK(user_a < user_b)
        );

        CREATE INDEX IF NOT EXISTS idx_connected_accounts_user_b
            ON connected_accounts(user_b);

        CREATE TABLE IF NOT EXISTS messages (
            id              TEXT PRIMARY KEY,
            connected_id    TEXT NOT NULL REFERENCES connected_accounts(id) ON DELETE CASCADE,
            sender_id       TEXT NOT NULL,
            receiver_id     TEXT NOT NULL,
            body            TEXT NOT NULL,
            created_at      TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_connected
            ON messages(connected_id, created_at);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}

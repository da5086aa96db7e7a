use rusqlite::Connection;

pub fn migrate(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS outputs (
            txid          TEXT NOT NULL,
            vout          INTEGER NOT NULL,
            value         INTEGER NOT NULL,
            address       TEXT NOT NULL,
            script_type   TEXT NOT NULL,
            is_mine       INTEGER NOT NULL,
            spent         INTEGER NOT NULL,
            simple_change INTEGER NOT NULL,
            labels        TEXT NOT NULL, -- JSON
            PRIMARY KEY (txid, vout)
        );

        CREATE TABLE IF NOT EXISTS tx_inputs (
            txid      TEXT NOT NULL,
            idx       INTEGER NOT NULL,
            prev_txid TEXT NOT NULL,
            prev_vout INTEGER NOT NULL,
            PRIMARY KEY (txid, idx)
        );

        CREATE TABLE IF NOT EXISTS transactions (
            txid     TEXT PRIMARY KEY,
            sent     INTEGER NOT NULL,
            received INTEGER NOT NULL,
            fee      INTEGER NOT NULL,
            height   INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS last_fetch (
            resource   TEXT PRIMARY KEY,
            fetched_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_outputs_value ON outputs(value);
        CREATE INDEX IF NOT EXISTS idx_outputs_address ON outputs(address);
        CREATE INDEX IF NOT EXISTS idx_outputs_change ON outputs(simple_change);
        CREATE INDEX IF NOT EXISTS idx_transactions_height ON transactions(height);
        ",
    )?;
    Ok(())
}

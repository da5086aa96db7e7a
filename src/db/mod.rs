pub mod schema;

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::core::{ResourceKind, TrackedInput, TrackedOutput, TxTotals, WalletTx};
use crate::readers::{FreshnessStore, OutputReader, ReadError, TransactionReader};

/// Sqlite-backed wallet store: outputs, wire-order inputs, per-tx totals,
/// and last-fetch bookkeeping. The analysis engine only reads it; the
/// writers exist for the wallet-sync side and tests.
pub struct WalletStore {
    conn: Connection,
}

impl WalletStore {
    pub fn open(path: &Path) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        schema::migrate(&conn)?;
        Ok(Self { conn })
    }

    /// Insert or replace one output record.
    pub fn upsert_output(&self, output: &TrackedOutput) -> Result<(), ReadError> {
        let labels = serde_json::to_string(&output.labels)
            .map_err(|e| ReadError::Corrupt(e.to_string()))?;
        self.conn.execute(
            "INSERT OR REPLACE INTO outputs
             (txid, vout, value, address, script_type, is_mine, spent, simple_change, labels)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            rusqlite::params![
                output.txid,
                output.vout,
                output.value,
                output.address,
                output.script_type.as_str(),
                output.is_mine as i32,
                output.spent as i32,
                output.simple_change as i32,
                labels,
            ],
        )?;
        Ok(())
    }

    /// Store a transaction's wire view and totals in one sqlite transaction.
    pub fn record_tx(&self, tx: &WalletTx, totals: &TxTotals) -> Result<(), ReadError> {
        let db_tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = db_tx.prepare_cached(
                "INSERT OR REPLACE INTO tx_inputs (txid, idx, prev_txid, prev_vout)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (idx, inp) in tx.inputs.iter().enumerate() {
                stmt.execute(rusqlite::params![
                    tx.txid,
                    idx as i64,
                    inp.prev_txid,
                    inp.prev_vout
                ])?;
            }
        }
        db_tx.execute(
            "INSERT OR REPLACE INTO transactions (txid, sent, received, fee, height)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![totals.txid, totals.sent, totals.received, totals.fee, totals.height],
        )?;
        db_tx.commit()?;
        for out in &tx.outputs {
            self.upsert_output(out)?;
        }
        Ok(())
    }

    /// Flip an output's spent flag.
    pub fn mark_spent(&self, txid: &str, vout: u32) -> Result<(), ReadError> {
        self.conn.execute(
            "UPDATE outputs SET spent = 1 WHERE txid = ?1 AND vout = ?2",
            rusqlite::params![txid, vout],
        )?;
        Ok(())
    }

    fn row_to_output(row: &rusqlite::Row) -> rusqlite::Result<(TrackedOutput, String)> {
        let is_mine: i32 = row.get(5)?;
        let spent: i32 = row.get(6)?;
        let simple_change: i32 = row.get(7)?;
        let labels_json: String = row.get(8)?;
        let script_type: String = row.get(4)?;
        Ok((
            TrackedOutput {
                txid: row.get(0)?,
                vout: row.get(1)?,
                value: row.get::<_, i64>(2)? as u64,
                address: row.get(3)?,
                script_type: crate::core::ScriptType::from_str(&script_type),
                is_mine: is_mine != 0,
                spent: spent != 0,
                simple_change: simple_change != 0,
                labels: Vec::new(),
            },
            labels_json,
        ))
    }

    fn outputs_from_query(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<TrackedOutput>, ReadError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, Self::row_to_output)?;
        let mut outputs = Vec::new();
        for row in rows {
            let (mut output, labels_json) = row?;
            output.labels = serde_json::from_str(&labels_json)
                .map_err(|e| ReadError::Corrupt(format!("labels column: {e}")))?;
            outputs.push(output);
        }
        Ok(outputs)
    }
}

const OUTPUT_COLS: &str =
    "txid, vout, value, address, script_type, is_mine, spent, simple_change, labels";

impl TransactionReader for WalletStore {
    fn transaction(&self, txid: &str) -> Result<Option<WalletTx>, ReadError> {
        let mut stmt = self.conn.prepare(
            "SELECT prev_txid, prev_vout FROM tx_inputs WHERE txid = ?1 ORDER BY idx",
        )?;
        let rows = stmt.query_map(rusqlite::params![txid], |row| {
            Ok(TrackedInput {
                prev_txid: row.get(0)?,
                prev_vout: row.get(1)?,
            })
        })?;
        let inputs: Vec<TrackedInput> = rows.collect::<Result<_, _>>()?;

        let outputs = self.outputs_from_query(
            &format!("SELECT {OUTPUT_COLS} FROM outputs WHERE txid = ?1 ORDER BY vout"),
            rusqlite::params![txid],
        )?;

        if inputs.is_empty() && outputs.is_empty() {
            return Ok(None);
        }
        Ok(Some(WalletTx {
            txid: txid.to_string(),
            inputs,
            outputs,
        }))
    }

    fn totals(&self, txid: &str) -> Result<Option<TxTotals>, ReadError> {
        let mut stmt = self.conn.prepare(
            "SELECT txid, sent, received, fee, height FROM transactions WHERE txid = ?1",
        )?;
        let mut rows = stmt.query(rusqlite::params![txid])?;
        if let Some(row) = rows.next()? {
            Ok(Some(TxTotals {
                txid: row.get(0)?,
                sent: row.get::<_, i64>(1)? as u64,
                received: row.get::<_, i64>(2)? as u64,
                fee: row.get::<_, i64>(3)? as u64,
                height: row.get(4)?,
            }))
        } else {
            Ok(None)
        }
    }
}

impl OutputReader for WalletStore {
    fn output(&self, txid: &str, vout: u32) -> Result<Option<TrackedOutput>, ReadError> {
        let mut outputs = self.outputs_from_query(
            &format!("SELECT {OUTPUT_COLS} FROM outputs WHERE txid = ?1 AND vout = ?2"),
            rusqlite::params![txid, vout],
        )?;
        Ok(outputs.pop())
    }

    fn wallet_inputs(&self, txid: &str) -> Result<Vec<TrackedOutput>, ReadError> {
        self.outputs_from_query(
            "SELECT o.txid, o.vout, o.value, o.address, o.script_type,
                    o.is_mine, o.spent, o.simple_change, o.labels
             FROM tx_inputs i
             JOIN outputs o ON o.txid = i.prev_txid AND o.vout = i.prev_vout
             WHERE i.txid = ?1 AND o.is_mine = 1
             ORDER BY i.idx",
            rusqlite::params![txid],
        )
    }

    fn wallet_outputs(&self, txid: &str) -> Result<Vec<TrackedOutput>, ReadError> {
        self.outputs_from_query(
            &format!(
                "SELECT {OUTPUT_COLS} FROM outputs
                 WHERE txid = ?1 AND is_mine = 1 ORDER BY vout"
            ),
            rusqlite::params![txid],
        )
    }

    fn unspent_outputs_below_height(&self, height: u32) -> Result<Vec<TrackedOutput>, ReadError> {
        self.outputs_from_query(
            "SELECT o.txid, o.vout, o.value, o.address, o.script_type,
                    o.is_mine, o.spent, o.simple_change, o.labels
             FROM outputs o
             JOIN transactions t ON t.txid = o.txid
             WHERE o.is_mine = 1 AND o.spent = 0 AND t.height < ?1",
            rusqlite::params![height],
        )
    }

    fn is_address_reused(&self, address: &str, exclude_txid: &str) -> Result<bool, ReadError> {
        let reused: i64 = self.conn.query_row(
            "SELECT EXISTS(
                 SELECT 1 FROM outputs
                 WHERE address = ?1 AND is_mine = 1 AND txid != ?2
             )",
            rusqlite::params![address, exclude_txid],
            |row| row.get(0),
        )?;
        Ok(reused != 0)
    }

    fn count_change_outputs(&self, vout: Option<u32>) -> Result<u64, ReadError> {
        let count: i64 = match vout {
            Some(v) => self.conn.query_row(
                "SELECT COUNT(*) FROM outputs WHERE simple_change = 1 AND vout = ?1",
                rusqlite::params![v],
                |row| row.get(0),
            )?,
            None => self.conn.query_row(
                "SELECT COUNT(*) FROM outputs WHERE simple_change = 1",
                [],
                |row| row.get(0),
            )?,
        };
        Ok(count as u64)
    }

    fn count_outputs_with_value(&self, value: u64) -> Result<u64, ReadError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM outputs WHERE value = ?1",
            rusqlite::params![value],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

impl FreshnessStore for WalletStore {
    fn last_fetch(&self, kind: ResourceKind) -> Result<Option<DateTime<Utc>>, ReadError> {
        let mut stmt = self
            .conn
            .prepare("SELECT fetched_at FROM last_fetch WHERE resource = ?1")?;
        let mut rows = stmt.query(rusqlite::params![kind.as_str()])?;
        if let Some(row) = rows.next()? {
            let raw: String = row.get(0)?;
            let parsed = DateTime::parse_from_rfc3339(&raw)
                .map_err(|e| ReadError::Corrupt(format!("fetched_at column: {e}")))?;
            Ok(Some(parsed.with_timezone(&Utc)))
        } else {
            Ok(None)
        }
    }

    fn set_last_fetch(&self, kind: ResourceKind, when: DateTime<Utc>) -> Result<(), ReadError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO last_fetch (resource, fetched_at) VALUES (?1, ?2)",
            rusqlite::params![kind.as_str(), when.to_rfc3339()],
        )?;
        Ok(())
    }
}

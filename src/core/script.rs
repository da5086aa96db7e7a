use bitcoin::consensus::deserialize;
use bitcoin::{Address, Network, Script, Transaction, TxOut};

use crate::core::{ScriptType, TrackedInput, TrackedOutput, WalletTx};

/// Parse a raw transaction from bytes.
pub fn parse_raw_tx(raw: &[u8]) -> Result<Transaction, bitcoin::consensus::encode::Error> {
    deserialize(raw)
}

/// Classify a locking script into its output category.
pub fn classify_script(script: &Script) -> ScriptType {
    if script.is_p2pkh() {
        ScriptType::P2pkh
    } else if script.is_p2sh() {
        ScriptType::P2sh
    } else if script.is_p2wpkh() {
        ScriptType::P2wpkh
    } else if script.is_p2wsh() {
        ScriptType::P2wsh
    } else if script.is_p2tr() {
        ScriptType::P2tr
    } else if script.is_op_return() {
        ScriptType::OpReturn
    } else {
        ScriptType::Unknown
    }
}

/// Render a script's address, or empty for scripts with no address form.
pub fn script_address(script: &Script, network: Network) -> String {
    match Address::from_script(script, network) {
        Ok(addr) => addr.to_string(),
        Err(_) => String::new(),
    }
}

impl TrackedOutput {
    /// Build a store record from a parsed output. Ownership, spent state,
    /// change flag, and labels are the wallet engine's to fill in.
    pub fn from_txout(txid: &str, vout: u32, txout: &TxOut, network: Network, is_mine: bool) -> Self {
        Self {
            txid: txid.to_string(),
            vout,
            value: txout.value.to_sat(),
            address: script_address(&txout.script_pubkey, network),
            script_type: classify_script(&txout.script_pubkey),
            is_mine,
            spent: false,
            simple_change: false,
            labels: Vec::new(),
        }
    }
}

impl WalletTx {
    /// Build a wire view from a parsed transaction. `is_mine` decides which
    /// outputs the wallet controls.
    pub fn from_bitcoin(
        tx: &Transaction,
        network: Network,
        is_mine: impl Fn(u32, &TxOut) -> bool,
    ) -> Self {
        let txid = tx.compute_txid().to_string();
        let inputs = tx
            .input
            .iter()
            .map(|inp| TrackedInput {
                prev_txid: inp.previous_output.txid.to_string(),
                prev_vout: inp.previous_output.vout,
            })
            .collect();
        let outputs = tx
            .output
            .iter()
            .enumerate()
            .map(|(i, out)| {
                let vout = i as u32;
                TrackedOutput::from_txout(&txid, vout, out, network, is_mine(vout, out))
            })
            .collect();
        Self { txid, inputs, outputs }
    }
}

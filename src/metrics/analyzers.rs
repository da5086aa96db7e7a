//! One pure function per privacy metric.
//!
//! Every analyzer fails closed: missing wire view or totals yields
//! `Ok(false)`, never an error. `Err` is reserved for collaborator
//! failures, which the engine propagates to its caller.

use crate::core::OutputLabel;
use crate::metrics::thresholds::{
    ratio_threshold, CHANGE_POSITION_MIN_SAMPLE, CHANGE_POSITION_RATIO, ROUND_NUMBER_MOD_SAT,
    SMALL_CHANGE_SAT,
};
use crate::metrics::AnalyzerInput;
use crate::readers::ReadError;

/// Each wallet output's value should be shared by enough other known
/// outputs to blend in. With uneven change allowed, one passing output is
/// enough; otherwise all must pass. No passing output fails either way.
pub fn anonymity_set(input: &AnalyzerInput) -> Result<bool, ReadError> {
    let Some(tx) = input.tx else { return Ok(false) };
    let desired = input.settings.desired_anonymity_set;

    let mut seen_mine = false;
    let mut any_pass = false;
    let mut all_pass = true;
    for out in tx.mine() {
        seen_mine = true;
        // The store count includes the output being scored.
        let others = input.reader.count_outputs_with_value(out.value)?.saturating_sub(1);
        if others >= desired {
            any_pass = true;
        } else {
            all_pass = false;
        }
    }
    if !seen_mine {
        return Ok(false);
    }
    if input.settings.allow_uneven_change {
        Ok(any_pass)
    } else {
        Ok(any_pass && all_pass)
    }
}

/// Fails on the first wallet output whose address already received funds
/// in a different transaction. Short-circuits; one query per address until
/// a reuse is found.
pub fn no_address_reuse(input: &AnalyzerInput) -> Result<bool, ReadError> {
    let Some(tx) = input.tx else { return Ok(false) };
    for out in tx.mine() {
        if input.reader.is_address_reused(&out.address, &tx.txid)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// How much capacity did the payer involuntarily disclose: the change
/// returned must stay below an amount-scaled multiple of what was sent to
/// others.
pub fn minimal_wealth_reveal(input: &AnalyzerInput) -> Result<bool, ReadError> {
    let Some(totals) = input.totals else { return Ok(false) };
    if !totals.has_change() {
        return Ok(true);
    }
    let sent_to_others = totals.sent_to_others();
    if sent_to_others <= 0 {
        return Ok(true);
    }
    let ratio = ratio_threshold(sent_to_others as u64) as i128;
    Ok((totals.received as i128) < sent_to_others * ratio)
}

/// Could the spend have consumed fewer UTXOs? Compares the wallet inputs
/// actually used against a largest-first greedy selection over the UTXO
/// set available below this transaction's confirmation height.
pub fn minimal_tx_history_reveal(input: &AnalyzerInput) -> Result<bool, ReadError> {
    let Some(totals) = input.totals else { return Ok(false) };
    let spent = input.reader.wallet_inputs(&totals.txid)?;
    let k = spent.len();
    if k == 1 {
        return Ok(true);
    }

    let needed = totals.sent_to_others();
    let mut candidates = input.reader.unspent_outputs_below_height(totals.height)?;
    candidates.sort_by(|a, b| b.value.cmp(&a.value));

    let mut acc: i128 = 0;
    let mut used = 0usize;
    for utxo in &candidates {
        if acc >= needed {
            break;
        }
        acc += utxo.value as i128;
        used += 1;
        if used >= k {
            // The greedy needed as many inputs as the user spent.
            return Ok(true);
        }
    }
    if acc >= needed && used < k {
        return Ok(false);
    }
    // Candidate list exhausted without covering the amount.
    Ok(true)
}

/// A transaction that both spends wallet funds and returns wallet funds
/// has change by definition.
pub fn no_change(input: &AnalyzerInput) -> Result<bool, ReadError> {
    let Some(totals) = input.totals else { return Ok(false) };
    Ok(!totals.has_change())
}

/// Fails when `sent − received` exceeds the small-change bound. The
/// compared quantity is the amount not returned as change; kept exactly as
/// the product defines it.
pub fn no_small_change(input: &AnalyzerInput) -> Result<bool, ReadError> {
    let Some(totals) = input.totals else { return Ok(false) };
    Ok(totals.sent_to_others() <= SMALL_CHANGE_SAT as i128)
}

/// A round payment next to a non-round output makes the non-round one
/// trivially identifiable as change.
pub fn no_round_number_payments(input: &AnalyzerInput) -> Result<bool, ReadError> {
    let Some(tx) = input.tx else { return Ok(false) };
    let mut round = false;
    let mut non_round = false;
    for out in &tx.outputs {
        if out.value % ROUND_NUMBER_MOD_SAT == 0 {
            round = true;
        } else {
            non_round = true;
        }
    }
    Ok(!(round && non_round))
}

/// With change present, outputs spanning more than one script type link
/// the change to the sender's wallet type.
pub fn same_script_types(input: &AnalyzerInput) -> Result<bool, ReadError> {
    let Some(tx) = input.tx else { return Ok(false) };
    let Some(totals) = input.totals else { return Ok(false) };
    if totals.sent == 0 || !totals.has_change() {
        return Ok(true);
    }
    let mut first = None;
    for out in &tx.outputs {
        match first {
            None => first = Some(out.script_type),
            Some(t) if t != out.script_type => return Ok(false),
            Some(_) => {}
        }
    }
    Ok(true)
}

/// Accumulates the transaction's own wallet inputs largest-first; if the
/// spend was covered before the last one, the excess inputs leaked history
/// for nothing.
pub fn no_unnecessary_input(input: &AnalyzerInput) -> Result<bool, ReadError> {
    let Some(totals) = input.totals else { return Ok(false) };
    let mut inputs = input.reader.wallet_inputs(&totals.txid)?;
    inputs.sort_by(|a, b| b.value.cmp(&a.value));

    let needed = totals.sent_to_others();
    let mut acc: i128 = 0;
    for (i, inp) in inputs.iter().enumerate() {
        acc += inp.value as i128;
        if acc >= needed {
            return Ok(i + 1 == inputs.len());
        }
    }
    Ok(true)
}

/// A single wallet output is a single traceable change output; two or more
/// break the trail.
pub fn use_multi_change_outputs(input: &AnalyzerInput) -> Result<bool, ReadError> {
    let Some(tx) = input.tx else { return Ok(false) };
    let Some(totals) = input.totals else { return Ok(false) };
    if totals.sent_to_others() == 0 {
        return Ok(true);
    }
    Ok(tx.mine().count() != 1)
}

/// A wallet that habitually places change at one output position is
/// fingerprintable. Gated on a minimum historical sample.
pub fn avoid_common_change_position(input: &AnalyzerInput) -> Result<bool, ReadError> {
    let Some(tx) = input.tx else { return Ok(false) };
    let Some(change) = tx.simple_change() else {
        return Ok(true);
    };
    let total = input.reader.count_change_outputs(None)?;
    if total < CHANGE_POSITION_MIN_SAMPLE {
        return Ok(true);
    }
    let at_position = input.reader.count_change_outputs(Some(change.vout))?;
    Ok((at_position as f64 / total as f64) < CHANGE_POSITION_RATIO)
}

/// Fails on the first input resolving to a wallet output carrying
/// "do not spend".
pub fn no_do_not_spend_utxos(input: &AnalyzerInput) -> Result<bool, ReadError> {
    no_labelled_inputs(input, OutputLabel::DoNotSpend)
}

/// Fails on the first input resolving to a wallet output carrying "kyced".
pub fn no_kyced_utxos(input: &AnalyzerInput) -> Result<bool, ReadError> {
    no_labelled_inputs(input, OutputLabel::Kyced)
}

fn no_labelled_inputs(input: &AnalyzerInput, label: OutputLabel) -> Result<bool, ReadError> {
    let Some(tx) = input.tx else { return Ok(false) };
    for inp in &tx.inputs {
        let Some(out) = input.reader.output(&inp.prev_txid, inp.prev_vout)? else {
            continue;
        };
        if !out.is_mine {
            continue;
        }
        if out.has_label(label) {
            return Ok(false);
        }
    }
    Ok(true)
}

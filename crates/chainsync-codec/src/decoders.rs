//! Per-message decode functions.
//!
//! Each function is deterministic and total over well-formed input: it either
//! returns a [`DomainRecord`] or a [`DecodeError`], never panics.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use chainsync_core::record::{
    ContractExecution, DelegateKeys, Deposit, DomainRecord, FragmentSignature, MintBurn,
    ProgramSubmission, SupplyAction, Transfer, Withdrawal,
};

use crate::error::DecodeError;

// ─── Wire shapes ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Coin {
    denom: String,
    amount: String,
}

#[derive(Debug, Deserialize)]
struct MsgDeposit {
    sender: String,
    receiver: String,
    amount: String,
    denom: String,
    #[serde(deserialize_with = "u64_str_or_num")]
    event_nonce: u64,
}

#[derive(Debug, Deserialize)]
struct MsgWithdraw {
    sender: String,
    destination: String,
    amount: Coin,
    #[serde(default)]
    bridge_fee: Option<Coin>,
}

#[derive(Debug, Deserialize)]
struct MsgSend {
    from_address: String,
    to_address: String,
    #[serde(default)]
    amount: Vec<Coin>,
}

#[derive(Debug, Deserialize)]
struct MsgSupply {
    account: String,
    amount: Coin,
}

#[derive(Debug, Deserialize)]
struct MsgFragmentSignature {
    validator: String,
    #[serde(deserialize_with = "u64_str_or_num")]
    fragment_id: u64,
    #[serde(deserialize_with = "u64_str_or_num")]
    nonce: u64,
    signature: String,
}

#[derive(Debug, Deserialize)]
struct MsgSetDelegateKeys {
    validator_address: String,
    orchestrator_address: String,
    external_address: String,
}

#[derive(Debug, Deserialize)]
struct MsgExecuteContract {
    sender: String,
    contract: String,
    msg: Value,
    #[serde(default)]
    funds: Vec<Coin>,
}

#[derive(Debug, Deserialize)]
struct MsgSubmitProgram {
    sender: String,
    bytecode: String,
}

// ─── Decode functions ─────────────────────────────────────────────────────────

pub fn decode_deposit(bytes: &[u8]) -> Result<DomainRecord, DecodeError> {
    let m: MsgDeposit = serde_json::from_slice(bytes)?;
    require_amount("amount", &m.amount)?;
    require_non_empty("denom", &m.denom)?;
    Ok(DomainRecord::Deposit(Deposit {
        sender: m.sender,
        receiver: m.receiver,
        amount: m.amount,
        denom: m.denom,
        event_nonce: m.event_nonce,
    }))
}

pub fn decode_withdrawal(bytes: &[u8]) -> Result<DomainRecord, DecodeError> {
    let m: MsgWithdraw = serde_json::from_slice(bytes)?;
    require_amount("amount.amount", &m.amount.amount)?;
    require_non_empty("amount.denom", &m.amount.denom)?;
    let fee_amount = match m.bridge_fee {
        Some(fee) => {
            require_amount("bridge_fee.amount", &fee.amount)?;
            fee.amount
        }
        None => "0".to_string(),
    };
    Ok(DomainRecord::Withdrawal(Withdrawal {
        sender: m.sender,
        destination: m.destination,
        amount: m.amount.amount,
        denom: m.amount.denom,
        fee_amount,
    }))
}

pub fn decode_transfer(bytes: &[u8]) -> Result<DomainRecord, DecodeError> {
    let m: MsgSend = serde_json::from_slice(bytes)?;
    let coins = coins_string("amount", &m.amount)?;
    Ok(DomainRecord::Transfer(Transfer {
        from_address: m.from_address,
        to_address: m.to_address,
        coins,
    }))
}

pub fn decode_mint(bytes: &[u8]) -> Result<DomainRecord, DecodeError> {
    decode_supply(bytes, SupplyAction::Mint)
}

pub fn decode_burn(bytes: &[u8]) -> Result<DomainRecord, DecodeError> {
    decode_supply(bytes, SupplyAction::Burn)
}

fn decode_supply(bytes: &[u8], action: SupplyAction) -> Result<DomainRecord, DecodeError> {
    let m: MsgSupply = serde_json::from_slice(bytes)?;
    require_amount("amount.amount", &m.amount.amount)?;
    require_non_empty("amount.denom", &m.amount.denom)?;
    Ok(DomainRecord::MintBurn(MintBurn {
        action,
        account: m.account,
        amount: m.amount.amount,
        denom: m.amount.denom,
    }))
}

pub fn decode_fragment_signature(bytes: &[u8]) -> Result<DomainRecord, DecodeError> {
    let m: MsgFragmentSignature = serde_json::from_slice(bytes)?;
    require_non_empty("signature", &m.signature)?;
    Ok(DomainRecord::FragmentSignature(FragmentSignature {
        validator: m.validator,
        fragment_id: m.fragment_id,
        nonce: m.nonce,
        signature: m.signature,
    }))
}

pub fn decode_delegate_keys(bytes: &[u8]) -> Result<DomainRecord, DecodeError> {
    let m: MsgSetDelegateKeys = serde_json::from_slice(bytes)?;
    Ok(DomainRecord::DelegateKeys(DelegateKeys {
        validator: m.validator_address,
        orchestrator: m.orchestrator_address,
        external_address: m.external_address,
    }))
}

pub fn decode_contract_execution(bytes: &[u8]) -> Result<DomainRecord, DecodeError> {
    let m: MsgExecuteContract = serde_json::from_slice(bytes)?;
    // Some encoders nest the execute message as a JSON string.
    let msg = match m.msg {
        Value::String(s) => serde_json::from_str(&s)?,
        other => other,
    };
    let funds = coins_string("funds", &m.funds)?;
    Ok(DomainRecord::ContractExecution(ContractExecution {
        sender: m.sender,
        contract: m.contract,
        msg,
        funds,
        program_type: None,
    }))
}

pub fn decode_program_submission(bytes: &[u8]) -> Result<DomainRecord, DecodeError> {
    let m: MsgSubmitProgram = serde_json::from_slice(bytes)?;
    let digits = m.bytecode.strip_prefix("0x").unwrap_or(&m.bytecode);
    let bytecode = hex::decode(digits).map_err(|e| DecodeError::InvalidField {
        field: "bytecode".into(),
        reason: e.to_string(),
    })?;
    Ok(DomainRecord::ProgramSubmission(ProgramSubmission {
        sender: m.sender,
        bytecode,
    }))
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

fn require_amount(field: &str, value: &str) -> Result<(), DecodeError> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DecodeError::InvalidAmount {
            field: field.into(),
            value: value.into(),
        });
    }
    Ok(())
}

fn require_non_empty(field: &str, value: &str) -> Result<(), DecodeError> {
    if value.is_empty() {
        return Err(DecodeError::InvalidField {
            field: field.into(),
            reason: "must not be empty".into(),
        });
    }
    Ok(())
}

/// Canonical `"<amount><denom>,…"` form of a coin list.
fn coins_string(field: &str, coins: &[Coin]) -> Result<String, DecodeError> {
    let mut parts = Vec::with_capacity(coins.len());
    for coin in coins {
        require_amount(field, &coin.amount)?;
        require_non_empty(field, &coin.denom)?;
        parts.push(format!("{}{}", coin.amount, coin.denom));
    }
    Ok(parts.join(","))
}

fn u64_str_or_num<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StrOrNum {
        Num(u64),
        Str(String),
    }
    match StrOrNum::deserialize(deserializer)? {
        StrOrNum::Num(n) => Ok(n),
        StrOrNum::Str(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

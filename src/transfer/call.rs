//! Call Building
//!
//! Turns a transfer intent into the contract invocation for its token
//! standard. Every u256 argument is split into two 128-bit felts
//! (`low`, `high`) and hex-encoded:
//!
//! | Token type                   | Entrypoint           | Calldata                                   |
//! |------------------------------|----------------------|--------------------------------------------|
//! | NATIVE / FUNGIBLE            | `transfer`           | to, amount.low, amount.high                |
//! | NON_FUNGIBLE_UNIQUE          | `transfer_from`      | from, to, id.low, id.high                  |
//! | NON_FUNGIBLE_SEMI_FUNGIBLE   | `safe_transfer_from` | from, to, id.low, id.high, amt.low, amt.high, 0 |

use num_bigint::BigUint;

use crate::ledger::LedgerCall;
use crate::tracker::TokenType;

use super::error::TransferError;
use super::initiator::TransferIntent;

/// Longest hex body of a Starknet address (252 bits)
const MAX_ADDRESS_DIGITS: usize = 64;

/// Parse a decimal integer into a u256
pub fn parse_amount(value: &str) -> Result<BigUint, TransferError> {
    let value = value.trim();
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TransferError::InvalidAmount(format!(
            "'{}' is not a non-negative integer",
            value
        )));
    }
    let amount = BigUint::parse_bytes(value.as_bytes(), 10)
        .ok_or_else(|| TransferError::InvalidAmount(value.to_string()))?;
    if amount.bits() == 0 {
        return Err(TransferError::InvalidAmount("amount must be greater than zero".into()));
    }
    if amount.bits() > 256 {
        return Err(TransferError::InvalidAmount("amount exceeds u256".into()));
    }
    Ok(amount)
}

/// Parse a token id, decimal or `0x` hex, into a u256
pub fn parse_token_id(value: &str) -> Result<BigUint, TransferError> {
    let value = value.trim();
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) if !hex.is_empty() && hex.bytes().all(|b| b.is_ascii_hexdigit()) => {
            BigUint::parse_bytes(hex.as_bytes(), 16)
        }
        Some(_) => None,
        None if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) => {
            BigUint::parse_bytes(value.as_bytes(), 10)
        }
        None => None,
    };
    match parsed {
        Some(id) if id.bits() <= 256 => Ok(id),
        Some(_) => Err(TransferError::InvalidToken("token id exceeds u256".into())),
        None => Err(TransferError::InvalidToken(format!(
            "'{}' is not a valid token id",
            value
        ))),
    }
}

/// Split a u256 into hex-encoded (low, high) 128-bit felts
pub fn split_u256(value: &BigUint) -> (String, String) {
    let mask = (BigUint::from(1u8) << 128u32) - 1u8;
    let low = value & &mask;
    let high = value >> 128u32;
    (format!("0x{:x}", low), format!("0x{:x}", high))
}

/// Validate and canonicalise an address to lowercase `0x` hex
pub fn normalize_address(field: &'static str, value: &str) -> Result<String, TransferError> {
    let trimmed = value.trim();
    let invalid = || TransferError::InvalidAddress {
        field,
        value: value.to_string(),
    };
    let hex = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .ok_or_else(invalid)?;
    if hex.is_empty() || hex.len() > MAX_ADDRESS_DIGITS || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    Ok(format!("0x{}", hex.to_ascii_lowercase()))
}

fn wallet(field: &'static str, value: Option<&str>) -> Result<String, TransferError> {
    match value.map(str::trim) {
        Some(address) if !address.is_empty() => normalize_address(field, address),
        _ => Err(TransferError::MissingWallet(field)),
    }
}

fn token_address(intent: &TransferIntent) -> Result<String, TransferError> {
    match intent.token_address.as_deref() {
        Some(address) if !address.trim().is_empty() => normalize_address("token", address),
        _ => Err(TransferError::InvalidToken(format!(
            "token_address is required for {}",
            intent.token_type
        ))),
    }
}

fn token_id(intent: &TransferIntent) -> Result<BigUint, TransferError> {
    match intent.token_id.as_deref() {
        Some(id) if !id.trim().is_empty() => parse_token_id(id),
        _ => Err(TransferError::InvalidToken(format!(
            "token_id is required for {}",
            intent.token_type
        ))),
    }
}

/// Build the ledger call for an intent, validating every parameter
pub fn build_call(
    intent: &TransferIntent,
    native_token_address: &str,
) -> Result<LedgerCall, TransferError> {
    let sender = wallet("Sender", intent.sender_address.as_deref())?;
    let recipient = wallet("Recipient", intent.recipient_address.as_deref())?;
    let amount = parse_amount(&intent.amount)?;

    let (contract_address, entrypoint, calldata) = match intent.token_type {
        TokenType::Native | TokenType::Fungible => {
            let contract = if intent.token_type == TokenType::Native {
                normalize_address("native token", native_token_address)?
            } else {
                token_address(intent)?
            };
            let (low, high) = split_u256(&amount);
            (contract, "transfer", vec![recipient, low, high])
        }
        TokenType::NonFungibleUnique => {
            let contract = token_address(intent)?;
            let id = token_id(intent)?;
            if amount != BigUint::from(1u8) {
                return Err(TransferError::InvalidAmount(
                    "unique token transfers must have amount 1".into(),
                ));
            }
            let (id_low, id_high) = split_u256(&id);
            (
                contract,
                "transfer_from",
                vec![sender.clone(), recipient, id_low, id_high],
            )
        }
        TokenType::NonFungibleSemiFungible => {
            let contract = token_address(intent)?;
            let id = token_id(intent)?;
            let (id_low, id_high) = split_u256(&id);
            let (amount_low, amount_high) = split_u256(&amount);
            (
                contract,
                "safe_transfer_from",
                // Trailing 0x0 is the empty `data` span
                vec![
                    sender.clone(),
                    recipient,
                    id_low,
                    id_high,
                    amount_low,
                    amount_high,
                    "0x0".to_string(),
                ],
            )
        }
    };

    Ok(LedgerCall {
        sender_address: sender,
        contract_address,
        entrypoint: entrypoint.to_string(),
        calldata,
    })
}

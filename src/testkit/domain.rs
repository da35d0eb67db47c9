//! Builders for domain primitives.

use rust_decimal::Decimal;

use crate::domain::balance::WalletBalance;
use crate::domain::wallet::{TokenSpec, Wallet, WalletAddress};

/// A wallet with one expected native token.
#[must_use]
pub fn wallet(address: &str, native_symbol: &str) -> Wallet {
    Wallet::new(address).with_token(TokenSpec::native(native_symbol))
}

/// A native balance observation.
#[must_use]
pub fn native_balance(address: &str, symbol: &str, amount: Decimal) -> WalletBalance {
    WalletBalance {
        address: WalletAddress::new(address),
        symbol: symbol.into(),
        is_native: true,
        token_address: None,
        raw_balance: raw_units(amount),
        formatted_balance: amount,
    }
}

/// A token balance observation.
#[must_use]
pub fn token_balance(
    address: &str,
    symbol: &str,
    token_address: &str,
    amount: Decimal,
) -> WalletBalance {
    WalletBalance {
        address: WalletAddress::new(address),
        symbol: symbol.into(),
        is_native: false,
        token_address: Some(token_address.into()),
        raw_balance: raw_units(amount),
        formatted_balance: amount,
    }
}

/// Scales a human amount into plausible 18-decimal base units.
fn raw_units(amount: Decimal) -> String {
    let scaled = amount * Decimal::from(10u64.pow(9)) * Decimal::from(10u64.pow(9));
    scaled.trunc().to_string()
}

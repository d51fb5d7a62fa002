use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::money::round_half_up;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QrVariant {
    #[default]
    Compact,
    Print,
}

impl QrVariant {
    fn as_str(self) -> &'static str {
        match self {
            QrVariant::Compact => "compact",
            QrVariant::Print => "print",
        }
    }
}

/// QR image for the bill's receiving account, without a preset amount.
pub fn account_qr_url(
    base_url: &str,
    bank_code: &str,
    account_number: &str,
    variant: QrVariant,
) -> String {
    format!(
        "{}/{bank_code}-{account_number}-{}.jpg",
        base_url.trim_end_matches('/'),
        variant.as_str()
    )
}

/// QR image for one person's transfer, prefilled with what they owe.
pub fn transfer_qr_url(
    base_url: &str,
    bank_code: &str,
    account_number: &str,
    amount: Decimal,
    person_name: &str,
    bill_name: &str,
) -> String {
    let info = format!("{person_name} share bill {bill_name}");
    format!(
        "{}/{bank_code}-{account_number}-print.png?amount={}&addInfo={}",
        base_url.trim_end_matches('/'),
        round_half_up(amount.abs()),
        urlencoding::encode(&info)
    )
}

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use freshcart_core::{DomainError, DomainResult, ProductId, StockTransactionId, UserId};

/// Kind of stock movement recorded in the ledger.
///
/// The type, not the sign of the quantity, carries the direction: `sold` and
/// `damaged` store a positive magnitude that is subtracted. Only `adjusted`
/// stores a signed quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Received,
    Sold,
    Adjusted,
    Returned,
    Damaged,
}

impl TransactionType {
    pub const ALL: [TransactionType; 5] = [
        TransactionType::Received,
        TransactionType::Sold,
        TransactionType::Adjusted,
        TransactionType::Returned,
        TransactionType::Damaged,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TransactionType::Received => "received",
            TransactionType::Sold => "sold",
            TransactionType::Adjusted => "adjusted",
            TransactionType::Returned => "returned",
            TransactionType::Damaged => "damaged",
        }
    }

    /// Stock delta implied by recording `quantity` under this type.
    ///
    /// Magnitude-typed movements reject negative quantities.
    pub fn delta(self, quantity: i64) -> DomainResult<i64> {
        match self {
            TransactionType::Adjusted => Ok(quantity),
            _ if quantity < 0 => Err(DomainError::validation(format!(
                "quantity for a {} transaction cannot be negative",
                self.as_str()
            ))),
            TransactionType::Received | TransactionType::Returned => Ok(quantity),
            TransactionType::Sold | TransactionType::Damaged => Ok(-quantity),
        }
    }
}

impl core::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        TransactionType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                DomainError::validation(format!(
                    "unknown transaction type '{s}' (expected one of: received, sold, adjusted, returned, damaged)"
                ))
            })
    }
}

/// One immutable ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockTransaction {
    pub id: StockTransactionId,
    pub product_id: ProductId,
    pub transaction_type: TransactionType,
    pub quantity: i64,
    pub transaction_date: DateTime<Utc>,
    pub notes: Option<String>,
    pub reference: Option<String>,
    pub user_id: Option<UserId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("Received".parse::<TransactionType>().unwrap(), TransactionType::Received);
        assert_eq!(" sold ".parse::<TransactionType>().unwrap(), TransactionType::Sold);
        assert_eq!("DAMAGED".parse::<TransactionType>().unwrap(), TransactionType::Damaged);
    }

    #[test]
    fn unknown_type_is_invalid_input() {
        let err = "stolen".parse::<TransactionType>().unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn direction_comes_from_type() {
        assert_eq!(TransactionType::Received.delta(5).unwrap(), 5);
        assert_eq!(TransactionType::Returned.delta(5).unwrap(), 5);
        assert_eq!(TransactionType::Sold.delta(5).unwrap(), -5);
        assert_eq!(TransactionType::Damaged.delta(5).unwrap(), -5);
        assert_eq!(TransactionType::Adjusted.delta(-5).unwrap(), -5);
        assert_eq!(TransactionType::Adjusted.delta(5).unwrap(), 5);
    }

    #[test]
    fn negative_magnitude_is_rejected() {
        for t in [
            TransactionType::Received,
            TransactionType::Sold,
            TransactionType::Returned,
            TransactionType::Damaged,
        ] {
            assert!(matches!(t.delta(-1), Err(DomainError::Validation(_))));
        }
    }

    #[test]
    fn serializes_with_api_field_names() {
        let tx = StockTransaction {
            id: StockTransactionId::new(),
            product_id: ProductId::new(),
            transaction_type: TransactionType::Returned,
            quantity: 3,
            transaction_date: Utc::now(),
            notes: Some("customer return".to_string()),
            reference: Some("ORD-1042".to_string()),
            user_id: None,
        };
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["transactionType"], "returned");
        assert_eq!(json["quantity"], 3);
        assert_eq!(json["notes"], "customer return");
        assert_eq!(json["reference"], "ORD-1042");
        assert!(json["userId"].is_null());
    }
}

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use freshcart_core::{DomainError, DomainResult, PricingTierId};

/// Input for creating a pricing tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPricingTier {
    pub tier_id: PricingTierId,
    pub name: String,
    pub description: Option<String>,
    pub discount_percentage: Option<Decimal>,
}

/// A named customer segment ("Wholesale", "Staff", ...).
///
/// `discount_percentage == None` means the tier grants no blanket discount and
/// only prices through explicit per-product overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingTier {
    pub id: PricingTierId,
    pub name: String,
    pub description: Option<String>,
    pub discount_percentage: Option<Decimal>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

fn validate_percentage(pct: Option<Decimal>) -> DomainResult<()> {
    match pct {
        Some(p) if p < Decimal::ZERO || p > Decimal::ONE_HUNDRED => Err(DomainError::validation(
            format!("discount percentage must be between 0 and 100, got {p}"),
        )),
        _ => Ok(()),
    }
}

impl PricingTier {
    pub fn create(input: NewPricingTier, created_at: DateTime<Utc>) -> DomainResult<Self> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("tier name cannot be empty"));
        }
        validate_percentage(input.discount_percentage)?;

        Ok(Self {
            id: input.tier_id,
            name: name.to_string(),
            description: input.description,
            discount_percentage: input.discount_percentage,
            is_active: true,
            created_at,
        })
    }

    pub fn set_discount_percentage(&mut self, pct: Option<Decimal>) -> DomainResult<()> {
        validate_percentage(pct)?;
        self.discount_percentage = pct;
        Ok(())
    }

    /// Tiers are retired, never deleted.
    pub fn deactivate(&mut self) {
        self.is_active = false;
    }

    /// `baseline * (1 - pct/100)`, unrounded. Rounding to cents is left to
    /// whoever displays the price.
    ///
    /// Returns `None` when the tier has no blanket discount.
    pub fn discounted(&self, baseline: Decimal) -> Option<Decimal> {
        let pct = self.discount_percentage?;
        Some(baseline * (Decimal::ONE - pct / Decimal::ONE_HUNDRED))
    }
}

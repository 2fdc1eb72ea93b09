use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use freshcart_core::{AssignmentId, DomainError, DomainResult, PricingTierId, UserId};

/// Input for assigning a user to a pricing tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAssignment {
    pub assignment_id: AssignmentId,
    pub user_id: UserId,
    pub pricing_tier_id: PricingTierId,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
}

/// Links a user to a tier for a period. A user may hold several at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPricingTierAssignment {
    pub id: AssignmentId,
    pub user_id: UserId,
    pub pricing_tier_id: PricingTierId,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl UserPricingTierAssignment {
    pub fn create(input: NewAssignment) -> DomainResult<Self> {
        if let Some(end) = input.end_date {
            if end < input.start_date {
                return Err(DomainError::validation("end date cannot precede start date"));
            }
        }

        Ok(Self {
            id: input.assignment_id,
            user_id: input.user_id,
            pricing_tier_id: input.pricing_tier_id,
            start_date: input.start_date,
            end_date: input.end_date,
            is_active: true,
        })
    }

    /// Active and not yet expired. An open-ended assignment never expires.
    /// The start date is informational and does not gate effectiveness.
    pub fn is_effective(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.end_date.is_none_or(|end| end >= now)
    }

    pub fn end(&mut self) {
        self.is_active = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn assignment(end_date: Option<DateTime<Utc>>) -> UserPricingTierAssignment {
        let now = Utc::now();
        UserPricingTierAssignment::create(NewAssignment {
            assignment_id: AssignmentId::new(),
            user_id: UserId::new(),
            pricing_tier_id: PricingTierId::new(),
            start_date: now - Duration::days(30),
            end_date,
        })
        .unwrap()
    }

    #[test]
    fn open_ended_assignment_is_effective() {
        assert!(assignment(None).is_effective(Utc::now()));
    }

    #[test]
    fn expired_assignment_is_not_effective() {
        let now = Utc::now();
        let a = assignment(Some(now - Duration::days(1)));
        assert!(!a.is_effective(now));
    }

    #[test]
    fn assignment_ending_now_is_still_effective() {
        let now = Utc::now();
        let a = assignment(Some(now));
        assert!(a.is_effective(now));
    }

    #[test]
    fn ended_assignment_is_not_effective() {
        let mut a = assignment(None);
        a.end();
        assert!(!a.is_effective(Utc::now()));
    }

    #[test]
    fn end_before_start_is_rejected() {
        let now = Utc::now();
        let err = UserPricingTierAssignment::create(NewAssignment {
            assignment_id: AssignmentId::new(),
            user_id: UserId::new(),
            pricing_tier_id: PricingTierId::new(),
            start_date: now,
            end_date: Some(now - Duration::seconds(1)),
        })
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}

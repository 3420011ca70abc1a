//! Subscription tiers and their fixed prices.

/// Currency every [`Plan::amount`] is expressed in.
pub const PLAN_CURRENCY: &str = "USD";

/// A subscription tier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plan {
    /// Platform plan identifier (`"Prime"`, `"1000"`, ...).
    pub id: &'static str,
    /// Human-readable tier name.
    pub name: &'static str,
    /// Price in [`PLAN_CURRENCY`].
    pub amount: f64,
}

/// Every known plan.
pub const PLANS: &[Plan] = &[
    Plan {
        id: "Prime",
        name: "Twitch Prime Subscription",
        amount: 4.99,
    },
    Plan {
        id: "1000",
        name: "Tier 1 Subscription",
        amount: 4.99,
    },
    Plan {
        id: "2000",
        name: "Tier 2 Subscription",
        amount: 9.99,
    },
    Plan {
        id: "3000",
        name: "Tier 3 Subscription",
        amount: 24.99,
    },
];

/// Look up a plan by identifier.
///
/// # Examples
///
/// ```
/// let plan = alertfold::plans::find("2000").unwrap();
/// assert_eq!(plan.amount, 9.99);
/// assert!(alertfold::plans::find("9999").is_none());
/// ```
pub fn find(id: &str) -> Option<&'static Plan> {
    PLANS.iter().find(|plan| plan.id == id)
}

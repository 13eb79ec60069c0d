use serde::{Deserialize, Serialize};

/// Largest amount a cost record may carry (one trillion currency units).
pub const MAX_COST_AMOUNT_IN_CENTS: i64 = 100_000_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CostType {
    /// Flat amount in cents, independent of the reporting window.
    Value,
    /// Hundredths of a percent of gross revenue (`1550` = 15.50%).
    Percentage,
}

impl CostType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Value => "VALUE",
            Self::Percentage => "PERCENTAGE",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "VALUE" => Some(Self::Value),
            "PERCENTAGE" => Some(Self::Percentage),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CostKind {
    Fixed,
    Variable,
}

impl CostKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "fixed" => Some(Self::Fixed),
            "variable" => Some(Self::Variable),
            _ => None,
        }
    }

    /// Type assumed when a new record omits it.
    pub fn default_type(self) -> CostType {
        match self {
            Self::Fixed => CostType::Value,
            Self::Variable => CostType::Percentage,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostRecord {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    pub amount_in_cents: i64,
    #[serde(rename = "type")]
    pub cost_type: CostType,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CostBreakdown {
    pub name: String,
    pub amount_in_cents: i64,
    pub calculated_in_cents: i64,
    #[serde(rename = "type")]
    pub cost_type: CostType,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfitAndLoss {
    pub gross_revenue_in_cents: i64,
    pub total_fixed_costs_in_cents: i64,
    pub total_variable_costs_in_cents: i64,
    pub gross_profit_in_cents: i64,
    pub real_profit_in_cents: i64,
    pub margin_percent: f64,
    pub fixed_costs_breakdown: Vec<CostBreakdown>,
    pub variable_costs_breakdown: Vec<CostBreakdown>,
}

/// `n / d` rounded half toward +∞, for `d > 0`.
fn div_round_half_up(n: i128, d: i128) -> i128 {
    (2 * n + d).div_euclid(2 * d)
}

/// Effective cost of one record against `gross_revenue`.
pub fn effective_cost(gross_revenue: i64, cost: &CostRecord) -> i64 {
    match cost.cost_type {
        CostType::Value => cost.amount_in_cents,
        CostType::Percentage => {
            let raw = div_round_half_up(
                i128::from(gross_revenue) * i128::from(cost.amount_in_cents),
                10_000,
            );
            saturate(raw)
        }
    }
}

fn saturate(n: i128) -> i64 {
    i64::try_from(n).unwrap_or(if n < 0 { i64::MIN } else { i64::MAX })
}

fn breakdown(gross_revenue: i64, costs: &[CostRecord]) -> Vec<CostBreakdown> {
    costs
        .iter()
        .map(|c| CostBreakdown {
            name: c.name.clone(),
            amount_in_cents: c.amount_in_cents,
            calculated_in_cents: effective_cost(gross_revenue, c),
            cost_type: c.cost_type,
        })
        .collect()
}

pub fn build_profit_and_loss(
    gross_revenue_in_cents: i64,
    fixed_costs: &[CostRecord],
    variable_costs: &[CostRecord],
) -> ProfitAndLoss {
    let fixed = breakdown(gross_revenue_in_cents, fixed_costs);
    let variable = breakdown(gross_revenue_in_cents, variable_costs);

    // Sums run in i128 so a handful of huge records cannot wrap.
    let gross = i128::from(gross_revenue_in_cents);
    let total_fixed: i128 = fixed.iter().map(|c| i128::from(c.calculated_in_cents)).sum();
    let total_variable: i128 = variable.iter().map(|c| i128::from(c.calculated_in_cents)).sum();

    let gross_profit = gross - total_variable;
    let real_profit = gross - total_fixed - total_variable;
    let margin_percent = if gross > 0 {
        ((real_profit as f64 / gross as f64) * 10_000.0 + 0.5).floor() / 100.0
    } else {
        0.0
    };

    ProfitAndLoss {
        gross_revenue_in_cents,
        total_fixed_costs_in_cents: saturate(total_fixed),
        total_variable_costs_in_cents: saturate(total_variable),
        gross_profit_in_cents: saturate(gross_profit),
        real_profit_in_cents: saturate(real_profit),
        margin_percent,
        fixed_costs_breakdown: fixed,
        variable_costs_breakdown: variable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cost(name: &str, amount: i64, cost_type: CostType) -> CostRecord {
        CostRecord {
            id: format!("cost_{name}"),
            organization_id: "org_1".to_string(),
            name: name.to_string(),
            amount_in_cents: amount,
            cost_type,
            description: None,
        }
    }

    #[test]
    fn negative_margin_report() {
        let pl = build_profit_and_loss(
            100_000,
            &[cost("rent", 500_000, CostType::Value)],
            &[cost("tax", 1_000, CostType::Percentage)],
        );
        assert_eq!(pl.total_variable_costs_in_cents, 10_000);
        assert_eq!(pl.total_fixed_costs_in_cents, 500_000);
        assert_eq!(pl.gross_profit_in_cents, 90_000);
        assert_eq!(pl.real_profit_in_cents, -410_000);
        assert_eq!(pl.margin_percent, -410.0);
    }

    #[test]
    fn zero_revenue_has_zero_margin() {
        let pl = build_profit_and_loss(0, &[cost("rent", 1_000, CostType::Value)], &[]);
        assert_eq!(pl.margin_percent, 0.0);
        assert_eq!(pl.real_profit_in_cents, -1_000);
    }

    #[test]
    fn percentage_rounds_half_up_to_the_cent() {
        // 15.50% of 333 cents = 51.615
        assert_eq!(effective_cost(333, &cost("fee", 1_550, CostType::Percentage)), 52);
        // 0.5 cent boundary
        assert_eq!(effective_cost(50, &cost("fee", 100, CostType::Percentage)), 1);
    }

    #[test]
    fn margin_rounds_to_two_decimals() {
        let pl = build_profit_and_loss(30_000, &[cost("tool", 10_000, CostType::Value)], &[]);
        // 20000 / 30000 = 66.666…%
        assert_eq!(pl.margin_percent, 66.67);
    }

    #[test]
    fn breakdown_keeps_configured_and_calculated_amounts() {
        let pl = build_profit_and_loss(200_000, &[], &[cost("gateway", 499, CostType::Percentage)]);
        let row = &pl.variable_costs_breakdown[0];
        assert_eq!(row.amount_in_cents, 499);
        assert_eq!(row.calculated_in_cents, 9_980);
    }

    #[test]
    fn huge_totals_saturate() {
        let pl = build_profit_and_loss(
            100,
            &[cost("a", i64::MAX, CostType::Value), cost("b", 1, CostType::Value)],
            &[cost("c", i64::MAX, CostType::Value)],
        );
        assert_eq!(pl.total_fixed_costs_in_cents, i64::MAX);
        assert_eq!(pl.total_variable_costs_in_cents, i64::MAX);
        assert_eq!(pl.gross_profit_in_cents, 100 - i64::MAX);
        assert_eq!(pl.real_profit_in_cents, i64::MIN);
        assert!(pl.margin_percent < 0.0);
    }

    #[test]
    fn cost_type_wire_format() {
        assert_eq!(
            serde_json::to_string(&CostType::Percentage).unwrap_or_default(),
            "\"PERCENTAGE\""
        );
        assert_eq!(CostType::parse("VALUE"), Some(CostType::Value));
        assert_eq!(CostKind::Variable.default_type(), CostType::Percentage);
    }
}

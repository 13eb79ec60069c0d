use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::analytics::{average_cents, format_rate};
use crate::date_range::DateRange;
use crate::error::CoreError;
use crate::event::{PAYMENT, SIGNUP};

/// One configured funnel stage. Persisted and exchanged in camelCase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunnelStepConfig {
    pub event_type: String,
    pub label: String,
    #[serde(default)]
    pub count_unique: bool,
}

impl FunnelStepConfig {
    pub fn new(event_type: &str, label: &str) -> Self {
        Self {
            event_type: event_type.to_string(),
            label: label.to_string(),
            count_unique: false,
        }
    }
}

/// Default definition for a freshly created organization.
pub fn default_funnel_steps() -> Vec<FunnelStepConfig> {
    vec![
        FunnelStepConfig::new(SIGNUP, "Signups"),
        FunnelStepConfig::new(PAYMENT, "Payments"),
    ]
}

/// Reject empty definitions and blank step fields; trims surrounding
/// whitespace on the way through.
pub fn validate_funnel_steps(steps: Vec<FunnelStepConfig>) -> Result<Vec<FunnelStepConfig>, CoreError> {
    if steps.is_empty() {
        return Err(CoreError::EmptyFunnel);
    }
    steps
        .into_iter()
        .enumerate()
        .map(|(idx, step)| {
            let event_type = step.event_type.trim().to_string();
            let label = step.label.trim().to_string();
            if event_type.is_empty() || label.is_empty() {
                return Err(CoreError::InvalidFunnelStep(idx + 1));
            }
            Ok(FunnelStepConfig {
                event_type,
                label,
                count_unique: step.count_unique,
            })
        })
        .collect()
}

/// Raw and distinct-session counts of one event type within a range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepCounts {
    pub total: i64,
    pub unique_sessions: i64,
}

/// Totals over `payment` events in range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaymentTotals {
    pub gross_revenue: i64,
    pub net_revenue: i64,
    pub payments: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunnelStepValue {
    pub event_type: String,
    pub label: String,
    pub count_unique: bool,
    pub value: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunnelRate {
    pub from: String,
    pub to: String,
    pub rate: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunnelReport {
    pub start_date: String,
    pub end_date: String,
    pub steps: Vec<FunnelStepValue>,
    pub rates: Vec<FunnelRate>,
    /// First-to-last conversion; only present for funnels of three or more
    /// steps (for two steps it equals the single adjacent rate).
    pub total_conversion: Option<String>,
    pub revenue: i64,
    pub net_revenue: i64,
    pub payments: i64,
    pub average_ticket: i64,
}

/// Assemble the funnel report from per-event-type counts.
///
/// Event types missing from `counts` count as zero.
pub fn build_funnel_report(
    steps: &[FunnelStepConfig],
    counts: &HashMap<String, StepCounts>,
    payments: PaymentTotals,
    range: &DateRange,
) -> FunnelReport {
    let values: Vec<FunnelStepValue> = steps
        .iter()
        .map(|step| {
            let c = counts.get(&step.event_type).copied().unwrap_or_default();
            FunnelStepValue {
                event_type: step.event_type.clone(),
                label: step.label.clone(),
                count_unique: step.count_unique,
                value: if step.count_unique { c.unique_sessions } else { c.total },
            }
        })
        .collect();

    let rates = values
        .windows(2)
        .map(|pair| FunnelRate {
            from: pair[0].event_type.clone(),
            to: pair[1].event_type.clone(),
            rate: format_rate(pair[1].value, pair[0].value),
        })
        .collect();

    let total_conversion = match (values.first(), values.last()) {
        (Some(first), Some(last)) if values.len() >= 3 => Some(format_rate(last.value, first.value)),
        _ => None,
    };

    FunnelReport {
        start_date: range.start_date().to_string(),
        end_date: range.end_date().to_string(),
        steps: values,
        rates,
        total_conversion,
        revenue: payments.gross_revenue,
        net_revenue: payments.net_revenue,
        payments: payments.payments,
        average_ticket: average_cents(payments.gross_revenue, payments.payments),
    }
}

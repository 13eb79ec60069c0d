use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("payload must be a JSON object")]
    NotAnObject,

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid {field} (expected YYYY-MM-DD): {value}")]
    InvalidDate { field: &'static str, value: String },

    #[error("end_date must be on or after start_date")]
    InvertedRange,

    #[error("date range may span at most {0} days")]
    RangeTooLarge(i64),

    #[error("funnel must contain at least one step")]
    EmptyFunnel,

    #[error("funnel step {0} needs a non-empty eventType and label")]
    InvalidFunnelStep(usize),
}

//! Repetition periods shared by recurring budgets and recurring expenses.

use chrono::{DateTime, Days, Months, Utc};
use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }

    /// Moves `at` forward by one period. Month arithmetic clamps to the last
    /// day of the target month (Jan 31 + 1 month = Feb 28/29).
    pub fn advance(self, at: DateTime<Utc>) -> ResultEngine<DateTime<Utc>> {
        let next = match self {
            Self::Daily => at.checked_add_days(Days::new(1)),
            Self::Weekly => at.checked_add_days(Days::new(7)),
            Self::Monthly => at.checked_add_months(Months::new(1)),
            Self::Yearly => at.checked_add_months(Months::new(12)),
        };
        next.ok_or_else(|| EngineError::InvalidInput("date out of range".to_string()))
    }
}

impl TryFrom<&str> for Frequency {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_ascii_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "yearly" => Ok(Self::Yearly),
            other => Err(EngineError::InvalidInput(format!(
                "invalid frequency: {other}"
            ))),
        }
    }
}

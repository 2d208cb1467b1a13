use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Structured result returned by every data-fetching tool.
///
/// Serializes flat, with a `status` discriminator, so the model consuming it
/// branches on `status` instead of seeing an exception:
/// `{"status": "success", ...payload}` or `{"status": "error", "message": "..."}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ToolOutcome<T> {
    Success(T),
    Error { message: String },
}

impl<T> ToolOutcome<T> {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn success(self) -> Option<T> {
        match self {
            Self::Success(value) => Some(value),
            Self::Error { .. } => None,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Success(_) => None,
            Self::Error { message } => Some(message),
        }
    }
}

impl<T, E: std::fmt::Display> From<Result<T, E>> for ToolOutcome<T> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(e) => Self::error(e.to_string()),
        }
    }
}

/// Local time in a supported city.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimeReport {
    /// City as the caller spelled it.
    pub city: String,
    /// 12-hour clock, e.g. `03:30 PM`.
    pub time: String,
    /// `YYYY-MM-DD`.
    pub date: String,
    /// IANA timezone identifier.
    pub timezone: String,
    pub day_of_week: String,
    pub utc_offset: String,
}

/// Raw ticker payload from the market-data tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarketData {
    pub symbol: String,
    pub data: serde_json::Value,
}

/// Last traded price for a symbol plus the ticker it came from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceReport {
    pub symbol: String,
    /// `None` when the ticker carried no parseable `lastPrice`.
    pub price: Option<Decimal>,
    pub data: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn success_serializes_flat() {
        let outcome = ToolOutcome::Success(TimeReport {
            city: "Tokyo".to_string(),
            time: "03:30 PM".to_string(),
            date: "2023-10-11".to_string(),
            timezone: "Asia/Tokyo".to_string(),
            day_of_week: "Wednesday".to_string(),
            utc_offset: "+09:00".to_string(),
        });

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["time"], "03:30 PM");
        assert_eq!(json["timezone"], "Asia/Tokyo");
    }

    #[test]
    fn error_serializes_with_message() {
        let outcome: ToolOutcome<PriceReport> = ToolOutcome::error("No price data found for XYZ");
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"status": "error", "message": "No price data found for XYZ"})
        );
        assert_eq!(outcome.message(), Some("No price data found for XYZ"));
    }

    #[test]
    fn price_is_string_encoded() {
        let outcome = ToolOutcome::Success(PriceReport {
            symbol: "BTCUSDT".to_string(),
            price: Some(dec!(67250.5)),
            data: serde_json::json!({"lastPrice": "67250.5"}),
        });
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["price"], "67250.5");

        let back: ToolOutcome<PriceReport> = serde_json::from_value(json).unwrap();
        assert_eq!(back.success().unwrap().price, Some(dec!(67250.5)));
    }

    #[test]
    fn from_result() {
        let ok: ToolOutcome<MarketData> = Ok::<_, String>(MarketData {
            symbol: "ETHUSDT".to_string(),
            data: serde_json::json!({}),
        })
        .into();
        assert!(ok.is_success());

        let err: ToolOutcome<MarketData> = Err::<MarketData, _>("boom".to_string()).into();
        assert_eq!(err.message(), Some("boom"));
    }
}

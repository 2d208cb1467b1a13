use std::time::Duration;

use agency_models::{TimeReport, ToolOutcome};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::ToolError;

pub const PRIMARY_BASE_URL: &str = "https://worldtimeapi.org/api/timezone";
pub const FALLBACK_BASE_URL: &str = "http://worldtimeapi.org/api/timezone";
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Supported cities (lowercase) and their IANA timezones.
pub const CITY_TIMEZONES: &[(&str, &str)] = &[
    ("new york", "America/New_York"),
    ("los angeles", "America/Los_Angeles"),
    ("chicago", "America/Chicago"),
    ("london", "Europe/London"),
    ("paris", "Europe/Paris"),
    ("tokyo", "Asia/Tokyo"),
    ("sydney", "Australia/Sydney"),
    ("melbourne", "Australia/Melbourne"),
    ("brisbane", "Australia/Brisbane"),
    ("perth", "Australia/Perth"),
    ("adelaide", "Australia/Adelaide"),
    ("mumbai", "Asia/Kolkata"),
    ("beijing", "Asia/Shanghai"),
    ("moscow", "Europe/Moscow"),
    ("dubai", "Asia/Dubai"),
    ("singapore", "Asia/Singapore"),
    ("berlin", "Europe/Berlin"),
    ("madrid", "Europe/Madrid"),
    ("rome", "Europe/Rome"),
    ("toronto", "America/Toronto"),
    ("vancouver", "America/Vancouver"),
    ("denver", "America/Denver"),
    ("phoenix", "America/Phoenix"),
    ("seattle", "America/Los_Angeles"),
    ("miami", "America/New_York"),
    ("mexico city", "America/Mexico_City"),
    ("sao paulo", "America/Sao_Paulo"),
    ("buenos aires", "America/Argentina/Buenos_Aires"),
    ("cairo", "Africa/Cairo"),
    ("johannesburg", "Africa/Johannesburg"),
    ("lagos", "Africa/Lagos"),
    ("bangkok", "Asia/Bangkok"),
    ("jakarta", "Asia/Jakarta"),
    ("manila", "Asia/Manila"),
    ("hong kong", "Asia/Hong_Kong"),
    ("seoul", "Asia/Seoul"),
    ("kuala lumpur", "Asia/Kuala_Lumpur"),
];

pub fn timezone_for(city: &str) -> Option<&'static str> {
    let key = city.to_lowercase();
    CITY_TIMEZONES
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, tz)| *tz)
}

pub fn supported_cities() -> String {
    CITY_TIMEZONES
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Transport to the public time service. Mockable for testing.
#[async_trait]
pub trait TimeApi: Send + Sync {
    /// GET `url` and return the body, or a description of the failure.
    async fn fetch(&self, url: &str) -> Result<String, String>;
}

/// [`TimeApi`] over HTTPS with a per-request timeout.
pub struct HttpTimeApi {
    client: reqwest::Client,
}

impl HttpTimeApi {
    pub fn new() -> Result<Self, ToolError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ToolError::ExternalToolFailure(format!("HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl TimeApi for HttpTimeApi {
    async fn fetch(&self, url: &str) -> Result<String, String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| e.to_string())?;
        response.text().await.map_err(|e| e.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct TimeApiBody {
    datetime: String,
    #[serde(default)]
    utc_offset: Option<String>,
}

/// Look up the current local time in `city`.
///
/// Tries HTTPS first and falls back to plain HTTP once on any transport
/// failure.
pub async fn current_time_for(api: &dyn TimeApi, city: &str) -> Result<TimeReport, ToolError> {
    let timezone = timezone_for(city).ok_or_else(|| ToolError::UnknownCity {
        city: city.to_string(),
        supported: supported_cities(),
    })?;

    let mut last_error = String::new();
    let mut body = None;
    for base in [PRIMARY_BASE_URL, FALLBACK_BASE_URL] {
        let url = format!("{base}/{timezone}");
        match api.fetch(&url).await {
            Ok(text) => {
                body = Some(text);
                break;
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Time service request failed");
                last_error = e;
            }
        }
    }

    let body = body.ok_or_else(|| ToolError::Network {
        city: city.to_string(),
        message: last_error,
    })?;

    let parsed: TimeApiBody = serde_json::from_str(&body).map_err(|e| {
        ToolError::ExternalToolFailure(format!("Error getting time for {city}: {e}"))
    })?;
    let local = parse_local_datetime(&parsed.datetime).ok_or_else(|| {
        ToolError::ExternalToolFailure(format!(
            "Error getting time for {city}: invalid datetime '{}'",
            parsed.datetime
        ))
    })?;

    debug!(city, timezone, "Resolved local time");
    Ok(TimeReport {
        city: city.to_string(),
        time: local.format("%I:%M %p").to_string(),
        date: local.format("%Y-%m-%d").to_string(),
        timezone: timezone.to_string(),
        day_of_week: local.format("%A").to_string(),
        utc_offset: parsed.utc_offset.unwrap_or_else(|| "Unknown".to_string()),
    })
}

/// Tool-facing wrapper: never fails, returns a status-tagged outcome.
pub async fn get_current_time(api: &dyn TimeApi, city: &str) -> ToolOutcome<TimeReport> {
    current_time_for(api, city).await.into()
}

/// Wall-clock time as written in the timestamp. A trailing `Z` means UTC.
fn parse_local_datetime(raw: &str) -> Option<NaiveDateTime> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.naive_local())
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, NaiveDate};
    use std::sync::Mutex;

    /// Mock service: fails any URL starting with a listed prefix, otherwise
    /// returns `body`. Records every URL requested.
    struct MockTimeApi {
        body: String,
        failing_prefixes: Vec<&'static str>,
        requested: Mutex<Vec<String>>,
    }

    impl MockTimeApi {
        fn returning(datetime: &str, utc_offset: &str) -> Self {
            Self {
                body: serde_json::json!({"datetime": datetime, "utc_offset": utc_offset})
                    .to_string(),
                failing_prefixes: vec![],
                requested: Mutex::new(vec![]),
            }
        }

        fn failing(mut self, prefix: &'static str) -> Self {
            self.failing_prefixes.push(prefix);
            self
        }

        fn requested(&self) -> Vec<String> {
            self.requested.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TimeApi for MockTimeApi {
        async fn fetch(&self, url: &str) -> Result<String, String> {
            self.requested.lock().unwrap().push(url.to_string());
            if self.failing_prefixes.iter().any(|p| url.starts_with(p)) {
                return Err(format!("connection refused: {url}"));
            }
            Ok(self.body.clone())
        }
    }

    #[tokio::test]
    async fn tokyo_formats_twelve_hour_clock() {
        let api = MockTimeApi::returning("2023-10-11T15:30:45+09:00", "+09:00");
        let report = current_time_for(&api, "Tokyo").await.unwrap();
        assert_eq!(report.city, "Tokyo");
        assert_eq!(report.time, "03:30 PM");
        assert_eq!(report.date, "2023-10-11");
        assert_eq!(report.day_of_week, "Wednesday");
        assert_eq!(report.timezone, "Asia/Tokyo");
        assert_eq!(report.utc_offset, "+09:00");
        assert_eq!(
            api.requested(),
            vec!["https://worldtimeapi.org/api/timezone/Asia/Tokyo"]
        );
    }

    #[tokio::test]
    async fn lookup_is_case_insensitive() {
        let api = MockTimeApi::returning("2024-02-29T09:05:00.123456-05:00", "-05:00");
        let report = current_time_for(&api, "NEW YORK").await.unwrap();
        assert_eq!(report.timezone, "America/New_York");
        assert_eq!(report.time, "09:05 AM");
        assert_eq!(report.day_of_week, "Thursday");
    }

    #[tokio::test]
    async fn zulu_suffix_is_utc() {
        let api = MockTimeApi::returning("2023-10-11T00:15:00Z", "+00:00");
        let report = current_time_for(&api, "london").await.unwrap();
        assert_eq!(report.time, "12:15 AM");
        assert_eq!(report.date, "2023-10-11");
    }

    #[tokio::test]
    async fn unknown_city_lists_supported_set() {
        let api = MockTimeApi::returning("2023-10-11T15:30:45+09:00", "+09:00");
        let err = current_time_for(&api, "Atlantis").await.unwrap_err();
        assert!(matches!(err, ToolError::UnknownCity { .. }));
        let message = err.to_string();
        assert!(message.contains("City 'Atlantis' not supported"));
        for (city, _) in CITY_TIMEZONES {
            assert!(message.contains(city), "missing {city}");
        }
        assert!(api.requested().is_empty());
    }

    #[tokio::test]
    async fn falls_back_to_http_once() {
        let api = MockTimeApi::returning("2023-10-11T08:30:45+02:00", "+02:00").failing("https://");
        let report = current_time_for(&api, "Paris").await.unwrap();
        assert_eq!(report.time, "08:30 AM");
        assert_eq!(
            api.requested(),
            vec![
                "https://worldtimeapi.org/api/timezone/Europe/Paris",
                "http://worldtimeapi.org/api/timezone/Europe/Paris",
            ]
        );
    }

    #[tokio::test]
    async fn both_endpoints_down_is_network_error() {
        let api = MockTimeApi::returning("unused", "unused")
            .failing("https://")
            .failing("http://");
        let err = current_time_for(&api, "Seoul").await.unwrap_err();
        match &err {
            ToolError::Network { city, message } => {
                assert_eq!(city, "Seoul");
                assert!(message.starts_with("connection refused: http://"));
            }
            other => panic!("expected network error, got {other:?}"),
        }
        assert_eq!(api.requested().len(), 2);
    }

    #[tokio::test]
    async fn missing_utc_offset_is_unknown() {
        let api = MockTimeApi {
            body: r#"{"datetime": "2023-10-11T15:30:45+09:00"}"#.to_string(),
            failing_prefixes: vec![],
            requested: Mutex::new(vec![]),
        };
        let report = current_time_for(&api, "Seoul").await.unwrap();
        assert_eq!(report.utc_offset, "Unknown");
    }

    #[tokio::test]
    async fn malformed_body_reports_error_outcome() {
        let api = MockTimeApi {
            body: "<html>maintenance</html>".to_string(),
            failing_prefixes: vec![],
            requested: Mutex::new(vec![]),
        };
        let outcome = get_current_time(&api, "Dubai").await;
        assert!(outcome
            .message()
            .unwrap()
            .starts_with("Error getting time for Dubai"));
    }

    #[tokio::test]
    async fn every_city_resolves_with_consistent_weekday() {
        let api = MockTimeApi::returning("2023-10-15T23:59:00+00:00", "+00:00");
        for (city, tz) in CITY_TIMEZONES {
            let outcome = get_current_time(&api, &city.to_uppercase()).await;
            let report = outcome.success().unwrap();
            assert_eq!(report.timezone, *tz);

            let time_ok = report.time.len() == 8
                && (report.time.ends_with(" AM") || report.time.ends_with(" PM"));
            assert!(time_ok, "bad time {}", report.time);

            let date = NaiveDate::parse_from_str(&report.date, "%Y-%m-%d").unwrap();
            assert_eq!(date.weekday().to_string(), report.day_of_week[..3]);
        }
    }
}

//! Payload exchanged between the supervising process and a job child process.
//!
//! A child is started as `<executable> <id> --json --parameters <json>` and
//! writes exactly one document to stdout:
//!
//! ```json
//! {
//!   "info":   { "id", "name", "expression", "repeatAfterSeconds", "runSecond", "start" },
//!   "result": { "end", "state" }
//! }
//! ```
//!
//! Timestamps are `"<unix seconds>.<microseconds, 6 digits>"`.

use crate::error::ProtocolError;
use crate::expression::CronExpression;
use crate::status::{JobId, JobInfo, JobResult, JobResultState, JobSummary, RunParameters};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Flag selecting machine-readable output in the child.
pub const JSON_FLAG: &str = "--json";

/// Option carrying the encoded [`RunParameters`].
pub const PARAMETERS_OPTION: &str = "--parameters";

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct WireSummary {
    info: WireInfo,
    result: WireResult,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireInfo {
    id: JobId,
    name: String,
    expression: String,
    repeat_after_seconds: Option<u32>,
    run_second: u32,
    #[serde(with = "timestamp")]
    start: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireResult {
    #[serde(with = "timestamp")]
    end: DateTime<Utc>,
    state: JobResultState,
}

impl From<&JobSummary> for WireSummary {
    fn from(summary: &JobSummary) -> Self {
        let info = &summary.info;
        Self {
            info: WireInfo {
                id: info.id.clone(),
                name: info.name.clone(),
                expression: info.expression.clone(),
                repeat_after_seconds: info.repeat_after_seconds,
                run_second: info.run_second,
                start: info.start,
            },
            result: WireResult {
                end: summary.result.end,
                state: summary.result.state,
            },
        }
    }
}

impl WireSummary {
    fn into_summary(self, expression: CronExpression) -> JobSummary {
        JobSummary::new(
            JobInfo {
                id: self.info.id,
                name: self.info.name,
                expression: self.info.expression,
                repeat_after_seconds: self.info.repeat_after_seconds,
                run_second: self.info.run_second,
                start: self.info.start,
            },
            JobResult {
                expression,
                end: self.result.end,
                state: self.result.state,
            },
        )
    }
}

/// Encode a summary as the single-line payload a child prints.
pub fn encode_summary(summary: &JobSummary) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(&WireSummary::from(summary))?)
}

/// Encode several summaries as an indented JSON array, same shape per entry.
pub fn encode_summaries_pretty(summaries: &[JobSummary]) -> Result<String, ProtocolError> {
    let wire: Vec<WireSummary> = summaries.iter().map(WireSummary::from).collect();
    Ok(serde_json::to_string_pretty(&wire)?)
}

/// Decode the complete stdout of a child.
///
/// Surrounding whitespace is ignored; anything else besides one payload is an
/// error. The result is re-attached to `expression`, the parent's own copy.
pub fn decode_summary(output: &str, expression: CronExpression) -> Result<JobSummary, ProtocolError> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Err(ProtocolError::Empty);
    }

    let wire: WireSummary = serde_json::from_str(trimmed)?;
    Ok(wire.into_summary(expression))
}

/// Encode run parameters for the `--parameters` option.
pub fn encode_parameters(parameters: &RunParameters) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(parameters)?)
}

/// Decode the `--parameters` option.
pub fn decode_parameters(raw: &str) -> Result<RunParameters, ProtocolError> {
    Ok(serde_json::from_str(raw.trim())?)
}

/// Format a timestamp as `<unix seconds>.<microseconds>`.
pub fn format_timestamp(time: &DateTime<Utc>) -> String {
    format!("{}.{:06}", time.timestamp(), time.timestamp_subsec_micros())
}

/// Parse a timestamp written by [`format_timestamp`].
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let (seconds, micros) = raw.split_once('.')?;
    if micros.len() != 6 || !micros.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let seconds: i64 = seconds.parse().ok()?;
    let micros: u32 = micros.parse().ok()?;
    DateTime::from_timestamp(seconds, micros * 1_000)
}

mod timestamp {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(time: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_timestamp(time))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_timestamp(&raw)
            .ok_or_else(|| de::Error::custom(format!("invalid timestamp '{}'", raw)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn expression() -> CronExpression {
        CronExpression::parse("* * * * *").unwrap()
    }

    fn sample() -> JobSummary {
        let start = Utc.timestamp_opt(1_760_788_800, 123_456_000).unwrap();
        JobSummary::new(
            JobInfo {
                id: JobId::Name("report".to_string()),
                name: "Daily report".to_string(),
                expression: "* * * * *".to_string(),
                repeat_after_seconds: Some(20),
                run_second: 40,
                start,
            },
            JobResult {
                expression: expression(),
                end: start + chrono::Duration::microseconds(1_500_250),
                state: JobResultState::Fail,
            },
        )
    }

    #[test]
    fn test_payload_shape() {
        let encoded = encode_summary(&sample()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&encoded).unwrap();

        assert_eq!(value["info"]["id"], "report");
        assert_eq!(value["info"]["repeatAfterSeconds"], 20);
        assert_eq!(value["info"]["runSecond"], 40);
        assert_eq!(value["info"]["start"], "1760788800.123456");
        assert_eq!(value["result"]["end"], "1760788801.623706");
        assert_eq!(value["result"]["state"], "fail");
        assert!(!encoded.contains('\n'));
    }

    #[test]
    fn test_decode_keeps_every_field() {
        let original = sample();
        let encoded = encode_summary(&original).unwrap();
        let decoded = decode_summary(&format!("\n{}\n", encoded), expression()).unwrap();

        assert_eq!(decoded.info, original.info);
        assert_eq!(decoded.result.end, original.result.end);
        assert_eq!(decoded.result.state, JobResultState::Fail);
    }

    #[test]
    fn test_decode_integer_id_and_null_repeat() {
        let raw = r#"{"info":{"id":3,"name":"n","expression":"* * * * *","repeatAfterSeconds":null,"runSecond":0,"start":"1.000000"},"result":{"end":"2.500000","state":"done"}}"#;
        let decoded = decode_summary(raw, expression()).unwrap();

        assert_eq!(decoded.info.id, JobId::Int(3));
        assert_eq!(decoded.info.repeat_after_seconds, None);
        assert_eq!(decoded.duration().num_milliseconds(), 1_500);
    }

    #[test]
    fn test_decode_rejects_other_content() {
        assert!(matches!(decode_summary("", expression()), Err(ProtocolError::Empty)));
        assert!(matches!(decode_summary("   \n", expression()), Err(ProtocolError::Empty)));
        assert!(decode_summary("Fatal error: out of memory", expression()).is_err());

        let encoded = encode_summary(&sample()).unwrap();
        assert!(decode_summary(&format!("warning: noise\n{}", encoded), expression()).is_err());
        assert!(decode_summary(&format!("{}\n{}", encoded, encoded), expression()).is_err());
    }

    #[test]
    fn test_decode_rejects_bad_fields() {
        let bad_state = r#"{"info":{"id":1,"name":"n","expression":"","repeatAfterSeconds":null,"runSecond":0,"start":"1.000000"},"result":{"end":"1.000000","state":"lost"}}"#;
        assert!(decode_summary(bad_state, expression()).is_err());

        let bad_time = r#"{"info":{"id":1,"name":"n","expression":"","repeatAfterSeconds":null,"runSecond":0,"start":"yesterday"},"result":{"end":"1.000000","state":"done"}}"#;
        assert!(decode_summary(bad_time, expression()).is_err());
    }

    #[test]
    fn test_parameters() {
        let encoded = encode_parameters(&RunParameters::new(20)).unwrap();
        assert_eq!(encoded, r#"{"second":20}"#);
        assert_eq!(decode_parameters(&encoded).unwrap(), RunParameters::new(20));
        assert!(decode_parameters("{}").is_err());
        assert!(decode_parameters("20").is_err());
    }

    #[test]
    fn test_timestamp_format() {
        let time = Utc.timestamp_opt(1_700_000_000, 5_000).unwrap();
        assert_eq!(format_timestamp(&time), "1700000000.000005");
        assert_eq!(parse_timestamp("1700000000.000005"), Some(time));

        assert_eq!(parse_timestamp("1700000000"), None);
        assert_eq!(parse_timestamp("1700000000.5"), None);
        assert_eq!(parse_timestamp("abc.000000"), None);
    }
}

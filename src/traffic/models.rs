use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Timelike, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

use super::errors::TrafficError;

// ============================================================================
// Traffic Value Objects
// ============================================================================

pub type StoreId = i64;

/// Customer entry/exit record as delivered by the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerMessage {
    pub store_id: StoreId,
    pub customers_in: i64,
    pub customers_out: i64,
    /// ISO-8601 point in time the counts pertain to.
    pub time_stamp: String,
}

/// A `CustomerMessage` whose timestamp has been parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct TrafficEvent {
    pub store_id: StoreId,
    pub customers_in: i64,
    pub customers_out: i64,
    pub timestamp: DateTime<Utc>,
}

impl TrafficEvent {
    /// `customers_in - customers_out`, or `None` if it does not fit in an `i64`.
    pub fn net_change(&self) -> Option<i64> {
        self.customers_in.checked_sub(self.customers_out)
    }
}

impl TryFrom<&CustomerMessage> for TrafficEvent {
    type Error = TrafficError;

    fn try_from(message: &CustomerMessage) -> Result<Self, Self::Error> {
        let timestamp = parse_timestamp(&message.time_stamp)?;
        Ok(Self {
            store_id: message.store_id,
            customers_in: message.customers_in,
            customers_out: message.customers_out,
            timestamp,
        })
    }
}

/// Parse an ISO-8601 timestamp into UTC.
///
/// Accepts RFC 3339 with any offset, offset-less date-times (taken as UTC)
/// and bare dates (midnight UTC).
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, TrafficError> {
    let raw = raw.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc());
        }
    }

    match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        Ok(date) => date
            .and_hms_opt(0, 0, 0)
            .map(|naive| naive.and_utc())
            .ok_or_else(|| TrafficError::malformed(raw, "date out of range")),
        Err(e) => Err(TrafficError::malformed(raw, e.to_string())),
    }
}

/// Running customer count for one store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveSnapshot {
    pub store_id: StoreId,
    pub current_customers: i64,
    #[serde(rename = "timestamp")]
    pub last_update: DateTime<Utc>,
}

/// Calendar hour in UTC, used as the bucket key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HourKey(NaiveDateTime);

impl HourKey {
    /// Truncate a timestamp to the start of its UTC hour.
    pub fn containing(timestamp: DateTime<Utc>) -> Self {
        let naive = timestamp.naive_utc();
        let hour = naive
            .date()
            .and_hms_opt(naive.hour(), 0, 0)
            .unwrap_or(naive);
        Self(hour)
    }

    /// The key `hours` hours before this one, `None` past the calendar range.
    pub fn hours_before(&self, hours: i64) -> Option<Self> {
        self.0.checked_sub_signed(Duration::try_hours(hours)?).map(Self)
    }
}

impl fmt::Display for HourKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d-%H"))
    }
}

impl Serialize for HourKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// In/out totals for one store during one calendar hour.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourBucket {
    pub hour: HourKey,
    #[serde(rename = "customers_in")]
    pub customers_in_total: i64,
    #[serde(rename = "customers_out")]
    pub customers_out_total: i64,
    pub net_change: i64,
}

impl HourBucket {
    pub fn empty(hour: HourKey) -> Self {
        Self {
            hour,
            customers_in_total: 0,
            customers_out_total: 0,
            net_change: 0,
        }
    }

    /// The bucket after adding one event, or `None` if any total overflows.
    pub fn recorded(&self, customers_in: i64, customers_out: i64) -> Option<Self> {
        let customers_in_total = self.customers_in_total.checked_add(customers_in)?;
        let customers_out_total = self.customers_out_total.checked_add(customers_out)?;
        Some(Self {
            hour: self.hour,
            customers_in_total,
            customers_out_total,
            net_change: customers_in_total.checked_sub(customers_out_total)?,
        })
    }
}

/// Rolling 24-hour history for one store, oldest hour first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreTrafficHistory {
    pub store_id: StoreId,
    pub hourly_data: Vec<HourBucket>,
}

use std::fmt::{Display, Formatter};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Milliseconds since the Unix epoch, UTC.
///
/// This is the persisted `lastFetchTime` format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EpochMillis(i64);

impl EpochMillis {
    pub const fn new(millis: i64) -> Self {
        Self(millis)
    }

    pub fn from_offset_datetime(value: OffsetDateTime) -> Self {
        let millis = value.unix_timestamp_nanos() / 1_000_000;
        Self(i64::try_from(millis).unwrap_or(i64::MAX))
    }

    pub const fn as_i64(self) -> i64 {
        self.0
    }

    pub fn saturating_add(self, duration: Duration) -> Self {
        let millis = i64::try_from(duration.as_millis()).unwrap_or(i64::MAX);
        Self(self.0.saturating_add(millis))
    }

    /// Elapsed time from `earlier` to `self`; zero when `earlier` is in the future.
    pub fn saturating_since(self, earlier: Self) -> Duration {
        let delta = self.0.saturating_sub(earlier.0);
        Duration::from_millis(u64::try_from(delta).unwrap_or(0))
    }

    pub fn parse(input: &str) -> Option<Self> {
        input.trim().parse::<i64>().ok().map(Self)
    }

    pub fn format_rfc3339(self) -> String {
        OffsetDateTime::from_unix_timestamp_nanos(i128::from(self.0) * 1_000_000)
            .ok()
            .and_then(|value| value.format(&Rfc3339).ok())
            .unwrap_or_else(|| self.0.to_string())
    }
}

impl Display for EpochMillis {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_from_offset_datetime() {
        let value = OffsetDateTime::from_unix_timestamp(1_704_067_200).expect("valid timestamp");
        let ts = EpochMillis::from_offset_datetime(value);
        assert_eq!(ts.as_i64(), 1_704_067_200_000);
        assert_eq!(ts.format_rfc3339(), "2024-01-01T00:00:00Z");
    }

    #[test]
    fn since_saturates_for_future_timestamps() {
        let now = EpochMillis::new(1_000);
        assert_eq!(now.saturating_since(EpochMillis::new(5_000)), Duration::ZERO);
        assert_eq!(
            now.saturating_since(EpochMillis::new(400)),
            Duration::from_millis(600)
        );
    }

    #[test]
    fn parses_persisted_value() {
        assert_eq!(EpochMillis::parse(" 1700000000000 "), Some(EpochMillis::new(1_700_000_000_000)));
        assert_eq!(EpochMillis::parse("yesterday"), None);
    }
}

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AlarmError {
    #[error("hour must be 0-23, got {0}")]
    InvalidHour(u32),

    #[error("minute must be 0-59, got {0}")]
    InvalidMinute(u32),

    #[error("weekday must be 0 (Sun) to 6 (Sat), got {0}")]
    InvalidWeekday(u8),

    #[error("shift needs at least one work day and one rest day (work={work_days}, rest={rest_days})")]
    InvalidShift { work_days: u32, rest_days: u32 },

    #[error("alarm not found: {0}")]
    NotFound(String),

    #[error("invalid time '{0}', expected HH:MM")]
    InvalidTime(String),

    #[error("invalid repeat rule '{0}'")]
    InvalidRepeat(String),
}

/// Which calendar days an alarm may fire on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RepeatRule {
    Once,
    Daily,
    Workdays,
    MonToSat,
    /// Weekday indexes, 0 = Sunday .. 6 = Saturday.
    Custom { days: BTreeSet<u8> },
    #[serde(rename_all = "camelCase")]
    Shift {
        start_date: NaiveDate,
        work_days: u32,
        rest_days: u32,
    },
}

impl RepeatRule {
    pub fn validate(&self) -> Result<(), AlarmError> {
        match self {
            RepeatRule::Custom { days } => {
                if let Some(bad) = days.iter().find(|d| **d > 6) {
                    return Err(AlarmError::InvalidWeekday(*bad));
                }
                Ok(())
            }
            RepeatRule::Shift {
                work_days,
                rest_days,
                ..
            } => {
                if *work_days < 1 || *rest_days < 1 {
                    return Err(AlarmError::InvalidShift {
                        work_days: *work_days,
                        rest_days: *rest_days,
                    });
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    pub fn is_once(&self) -> bool {
        matches!(self, RepeatRule::Once)
    }
}

impl fmt::Display for RepeatRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepeatRule::Once => write!(f, "once"),
            RepeatRule::Daily => write!(f, "daily"),
            RepeatRule::Workdays => write!(f, "workdays"),
            RepeatRule::MonToSat => write!(f, "mon-sat"),
            RepeatRule::Custom { days } => {
                let list = days
                    .iter()
                    .map(|d| d.to_string())
                    .collect::<Vec<_>>()
                    .join(",");
                write!(f, "custom:{}", list)
            }
            RepeatRule::Shift {
                start_date,
                work_days,
                rest_days,
            } => write!(f, "shift:{}:{}:{}", start_date, work_days, rest_days),
        }
    }
}

/// Parses the CLI syntax: `once`, `daily`, `workdays`, `mon-sat`,
/// `custom:0,6` and `shift:YYYY-MM-DD:WORK:REST`.
impl FromStr for RepeatRule {
    type Err = AlarmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim().to_ascii_lowercase();
        let invalid = || AlarmError::InvalidRepeat(s.to_string());

        let (kind, rest) = match raw.split_once(':') {
            Some((kind, rest)) => (kind, Some(rest)),
            None => (raw.as_str(), None),
        };

        let rule = match (kind, rest) {
            ("once", None) => RepeatRule::Once,
            ("daily", None) => RepeatRule::Daily,
            ("workdays", None) => RepeatRule::Workdays,
            ("mon-sat", None) => RepeatRule::MonToSat,
            ("custom", rest) => {
                let mut days = BTreeSet::new();
                for part in rest.unwrap_or("").split(',') {
                    let part = part.trim();
                    if part.is_empty() {
                        continue;
                    }
                    days.insert(part.parse::<u8>().map_err(|_| invalid())?);
                }
                RepeatRule::Custom { days }
            }
            ("shift", Some(rest)) => {
                let parts: Vec<&str> = rest.split(':').collect();
                if parts.len() != 3 {
                    return Err(invalid());
                }
                RepeatRule::Shift {
                    start_date: NaiveDate::parse_from_str(parts[0], "%Y-%m-%d")
                        .map_err(|_| invalid())?,
                    work_days: parts[1].parse().map_err(|_| invalid())?,
                    rest_days: parts[2].parse().map_err(|_| invalid())?,
                }
            }
            _ => return Err(invalid()),
        };
        rule.validate()?;
        Ok(rule)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alarm {
    pub id: String,
    pub hour: u32,
    pub minute: u32,
    pub label: String,
    pub enabled: bool,
    pub repeat: RepeatRule,
    #[serde(default)]
    pub last_triggered_date: Option<NaiveDate>,
}

impl Alarm {
    pub fn time_label(&self) -> String {
        format!("{:02}:{:02}", self.hour, self.minute)
    }
}

/// Editable fields of an alarm; `id` and `last_triggered_date` are owned by
/// the service.
#[derive(Debug, Clone)]
pub struct AlarmDraft {
    pub hour: u32,
    pub minute: u32,
    pub label: String,
    pub enabled: bool,
    pub repeat: RepeatRule,
}

impl AlarmDraft {
    pub fn validate(&self) -> Result<(), AlarmError> {
        if self.hour > 23 {
            return Err(AlarmError::InvalidHour(self.hour));
        }
        if self.minute > 59 {
            return Err(AlarmError::InvalidMinute(self.minute));
        }
        self.repeat.validate()
    }
}

/// Parses `HH:MM` into (hour, minute).
pub fn parse_time_of_day(s: &str) -> Result<(u32, u32), AlarmError> {
    let invalid = || AlarmError::InvalidTime(s.to_string());
    let (h, m) = s.trim().split_once(':').ok_or_else(invalid)?;
    let hour: u32 = h.parse().map_err(|_| invalid())?;
    let minute: u32 = m.parse().map_err(|_| invalid())?;
    if hour > 23 {
        return Err(AlarmError::InvalidHour(hour));
    }
    if minute > 59 {
        return Err(AlarmError::InvalidMinute(minute));
    }
    Ok((hour, minute))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AlarmStoreData {
    pub version: i32,
    pub alarms: Vec<Alarm>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_repeat_syntax() {
        assert_eq!("once".parse::<RepeatRule>(), Ok(RepeatRule::Once));
        assert_eq!("Mon-Sat".parse::<RepeatRule>(), Ok(RepeatRule::MonToSat));
        assert_eq!(
            "custom:6,0".parse::<RepeatRule>(),
            Ok(RepeatRule::Custom {
                days: BTreeSet::from([0, 6])
            })
        );
        assert_eq!(
            "custom:".parse::<RepeatRule>(),
            Ok(RepeatRule::Custom {
                days: BTreeSet::new()
            })
        );
        assert_eq!(
            "shift:2026-10-01:2:1".parse::<RepeatRule>(),
            Ok(RepeatRule::Shift {
                start_date: NaiveDate::from_ymd_opt(2026, 10, 1).unwrap(),
                work_days: 2,
                rest_days: 1,
            })
        );
    }

    #[test]
    fn rejects_bad_repeat_rules() {
        assert!("weekly".parse::<RepeatRule>().is_err());
        assert!("daily:1".parse::<RepeatRule>().is_err());
        assert_eq!(
            "custom:1,7".parse::<RepeatRule>(),
            Err(AlarmError::InvalidWeekday(7))
        );
        assert_eq!(
            "shift:2026-10-01:0:1".parse::<RepeatRule>(),
            Err(AlarmError::InvalidShift {
                work_days: 0,
                rest_days: 1
            })
        );
        assert!("shift:2026-10-01:2".parse::<RepeatRule>().is_err());
    }

    #[test]
    fn display_matches_parse_syntax() {
        let rule: RepeatRule = "shift:2026-10-01:4:3".parse().unwrap();
        assert_eq!(rule.to_string(), "shift:2026-10-01:4:3");
        let rule: RepeatRule = "custom:0,6".parse().unwrap();
        assert_eq!(rule.to_string(), "custom:0,6");
    }

    #[test]
    fn shift_rule_serializes_with_tag() {
        let rule = RepeatRule::Shift {
            start_date: NaiveDate::from_ymd_opt(2026, 10, 1).unwrap(),
            work_days: 2,
            rest_days: 1,
        };
        let value = serde_json::to_value(&rule).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "type": "shift",
                "startDate": "2026-10-01",
                "workDays": 2,
                "restDays": 1
            })
        );
        let daily = serde_json::to_value(RepeatRule::MonToSat).unwrap();
        assert_eq!(daily, serde_json::json!({ "type": "monToSat" }));
    }

    #[test]
    fn time_of_day_parsing() {
        assert_eq!(parse_time_of_day("07:05"), Ok((7, 5)));
        assert_eq!(parse_time_of_day("24:00"), Err(AlarmError::InvalidHour(24)));
        assert_eq!(
            parse_time_of_day("12:60"),
            Err(AlarmError::InvalidMinute(60))
        );
        assert!(parse_time_of_day("noon").is_err());
    }

    #[test]
    fn draft_validation() {
        let draft = AlarmDraft {
            hour: 25,
            minute: 0,
            label: String::new(),
            enabled: true,
            repeat: RepeatRule::Daily,
        };
        assert_eq!(draft.validate(), Err(AlarmError::InvalidHour(25)));
    }
}

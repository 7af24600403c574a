//! # cron 表达式
//!
//! 五段式：分 时 日 月 周，均按 UTC 计算。支持 `*`、列表、范围、步长、
//! 月份与星期名称，以及 `@hourly` 等简写。日与周同时受限时任一匹配即可

use crate::error::{FleetError, Result};
use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};
use std::fmt;

const MONTH_NAMES: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];
const WEEKDAY_NAMES: [&str; 7] = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

/// 搜索下一次触发时间的上限
const SEARCH_LIMIT_DAYS: i64 = 366 * 5;

#[derive(Debug, Clone, Copy)]
enum Field {
    Minute,
    Hour,
    DayOfMonth,
    Month,
    DayOfWeek,
}

impl Field {
    const fn bounds(self) -> (u32, u32) {
        match self {
            Self::Minute => (0, 59),
            Self::Hour => (0, 23),
            Self::DayOfMonth => (1, 31),
            Self::Month => (1, 12),
            // 7 也表示周日
            Self::DayOfWeek => (0, 7),
        }
    }

    const fn name(self) -> &'static str {
        match self {
            Self::Minute => "minute",
            Self::Hour => "hour",
            Self::DayOfMonth => "day-of-month",
            Self::Month => "month",
            Self::DayOfWeek => "day-of-week",
        }
    }

    fn value(self, token: &str) -> Option<u32> {
        if let Ok(n) = token.parse::<u32>() {
            return Some(n);
        }
        let lower = token.to_ascii_lowercase();
        let names: &[&str] = match self {
            Self::Month => &MONTH_NAMES,
            Self::DayOfWeek => &WEEKDAY_NAMES,
            _ => return None,
        };
        let offset = u32::from(matches!(self, Self::Month));
        names
            .iter()
            .position(|n| *n == lower)
            .and_then(|i| u32::try_from(i).ok())
            .map(|i| i + offset)
    }
}

/// 某一段允许的取值集合
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ValueSet(u64);

impl ValueSet {
    const fn contains(self, value: u32) -> bool {
        value < 64 && self.0 & (1 << value) != 0
    }
}

fn parse_field(field: Field, text: &str) -> Result<ValueSet> {
    let (min, max) = field.bounds();
    let invalid = |part: &str| FleetError::schedule(format!("无效的 {} 字段: {part}", field.name()));
    let mut bits = 0u64;

    for part in text.split(',') {
        let (range, step) = match part.split_once('/') {
            Some((range, step)) => {
                let step = step.parse::<u32>().map_err(|_| invalid(part))?;
                if step == 0 {
                    return Err(invalid(part));
                }
                (range, step)
            }
            None => (part, 1),
        };

        let (start, end) = if range == "*" {
            (min, max)
        } else if let Some((a, b)) = range.split_once('-') {
            let start = field.value(a).ok_or_else(|| invalid(part))?;
            let end = field.value(b).ok_or_else(|| invalid(part))?;
            (start, end)
        } else {
            let start = field.value(range).ok_or_else(|| invalid(part))?;
            // `5/15` 表示从 5 开始直到上限
            (start, if step > 1 { max } else { start })
        };

        if start < min || end > max || start > end {
            return Err(invalid(part));
        }

        for value in (start..=end).step_by(step as usize) {
            bits |= 1 << value;
        }
    }

    if matches!(field, Field::DayOfWeek) && bits & (1 << 7) != 0 {
        bits = (bits & !(1 << 7)) | 1;
    }

    Ok(ValueSet(bits))
}

/// 解析后的 cron 表达式
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpression {
    source: String,
    minutes: ValueSet,
    hours: ValueSet,
    days_of_month: ValueSet,
    months: ValueSet,
    days_of_week: ValueSet,
    dom_restricted: bool,
    dow_restricted: bool,
}

impl CronExpression {
    pub fn parse(expression: &str) -> Result<Self> {
        let trimmed = expression.trim();
        let expanded = match trimmed {
            "@yearly" | "@annually" => "0 0 1 1 *",
            "@monthly" => "0 0 1 * *",
            "@weekly" => "0 0 * * 0",
            "@daily" | "@midnight" => "0 0 * * *",
            "@hourly" => "0 * * * *",
            other => other,
        };

        let fields: Vec<&str> = expanded.split_whitespace().collect();
        let [minute, hour, dom, month, dow] = fields.as_slice() else {
            return Err(FleetError::schedule(format!(
                "cron 表达式需要 5 个字段: {expression}"
            )));
        };

        Ok(Self {
            source: trimmed.to_string(),
            minutes: parse_field(Field::Minute, minute)?,
            hours: parse_field(Field::Hour, hour)?,
            days_of_month: parse_field(Field::DayOfMonth, dom)?,
            months: parse_field(Field::Month, month)?,
            days_of_week: parse_field(Field::DayOfWeek, dow)?,
            dom_restricted: !dom.starts_with('*'),
            dow_restricted: !dow.starts_with('*'),
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    fn day_matches(&self, at: DateTime<Utc>) -> bool {
        let dom = self.days_of_month.contains(at.day());
        let dow = self.days_of_week.contains(at.weekday().num_days_from_sunday());
        match (self.dom_restricted, self.dow_restricted) {
            (true, true) => dom || dow,
            (true, false) => dom,
            (false, true) => dow,
            (false, false) => true,
        }
    }

    /// 严格晚于 `after` 的第一个匹配分钟；五年内无匹配时返回 `None`
    #[must_use]
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let base = after.with_second(0)?.with_nanosecond(0)?;
        let mut at = base + Duration::minutes(1);
        let limit = base + Duration::days(SEARCH_LIMIT_DAYS);

        while at <= limit {
            if !self.months.contains(at.month()) {
                at = start_of_next_month(at)?;
                continue;
            }
            if !self.day_matches(at) {
                at = start_of_day(at)? + Duration::days(1);
                continue;
            }
            if !self.hours.contains(at.hour()) {
                at = at.with_minute(0)? + Duration::hours(1);
                continue;
            }
            if !self.minutes.contains(at.minute()) {
                at += Duration::minutes(1);
                continue;
            }
            return Some(at);
        }
        None
    }
}

impl fmt::Display for CronExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn start_of_day(at: DateTime<Utc>) -> Option<DateTime<Utc>> {
    Utc.with_ymd_and_hms(at.year(), at.month(), at.day(), 0, 0, 0).single()
}

fn start_of_next_month(at: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let (year, month) = if at.month() == 12 {
        (at.year() + 1, 1)
    } else {
        (at.year(), at.month() + 1)
    };
    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).single()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[rstest]
    #[case("0 * * * *", "2024-01-01T00:00:30Z", "2024-01-01T01:00:00Z")]
    #[case("* * * * *", "2024-01-01T00:00:00Z", "2024-01-01T00:01:00Z")]
    #[case("*/15 * * * *", "2024-01-01T00:16:00Z", "2024-01-01T00:30:00Z")]
    #[case("30 2 * * *", "2024-01-01T02:30:00Z", "2024-01-02T02:30:00Z")]
    #[case("0 0 1 * *", "2024-01-15T12:00:00Z", "2024-02-01T00:00:00Z")]
    #[case("0 0 * * mon", "2024-01-01T00:00:00Z", "2024-01-08T00:00:00Z")]
    #[case("0 9-17/4 * * *", "2024-01-01T10:00:00Z", "2024-01-01T13:00:00Z")]
    #[case("0 0 29 2 *", "2024-03-01T00:00:00Z", "2028-02-29T00:00:00Z")]
    #[case("0 12 * dec 7", "2024-01-01T00:00:00Z", "2024-12-01T12:00:00Z")]
    #[case("@daily", "2024-12-31T23:59:00Z", "2025-01-01T00:00:00Z")]
    fn test_next_after(#[case] expr: &str, #[case] base: &str, #[case] expected: &str) {
        let cron = CronExpression::parse(expr).unwrap();
        assert_eq!(cron.next_after(at(base)), Some(at(expected)));
    }

    #[test]
    fn test_day_of_month_or_day_of_week() {
        // 每月 13 日或每个周五
        let cron = CronExpression::parse("0 0 13 * 5").unwrap();
        // 2024-01-05 是周五
        assert_eq!(
            cron.next_after(at("2024-01-01T00:00:00Z")),
            Some(at("2024-01-05T00:00:00Z"))
        );
        assert_eq!(
            cron.next_after(at("2024-01-12T00:00:00Z")),
            Some(at("2024-01-13T00:00:00Z"))
        );
    }

    #[test]
    fn test_lists_and_names() {
        let cron = CronExpression::parse("0,30 8 * jan-mar mon-fri").unwrap();
        assert_eq!(
            cron.next_after(at("2024-03-29T08:30:00Z")),
            Some(at("2025-01-01T08:00:00Z"))
        );
    }

    #[rstest]
    #[case("")]
    #[case("* * * *")]
    #[case("* * * * * *")]
    #[case("60 * * * *")]
    #[case("* 24 * * *")]
    #[case("* * 0 * *")]
    #[case("* * * 13 *")]
    #[case("*/0 * * * *")]
    #[case("5-1 * * * *")]
    #[case("* * * foo *")]
    fn test_invalid_expressions(#[case] expr: &str) {
        assert!(matches!(
            CronExpression::parse(expr),
            Err(FleetError::Schedule { .. })
        ));
    }

    #[test]
    fn test_impossible_date_has_no_next_run() {
        let cron = CronExpression::parse("0 0 31 2 *").unwrap();
        assert_eq!(cron.next_after(at("2024-01-01T00:00:00Z")), None);
    }
}

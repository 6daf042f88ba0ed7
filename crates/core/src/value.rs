use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, Timelike};

/// A MySQL `TIME` value. Unlike a time of day it may be negative and may
/// exceed 24 hours (`-838:59:59` through `838:59:59`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqlTime {
    pub negative: bool,
    pub hours: u32,
    pub minutes: u8,
    pub seconds: u8,
    pub micros: u32,
}

impl SqlTime {
    /// Parses the text form sent by the server, e.g. `-12:30:00.000001`.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let (negative, unsigned) = match raw.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };
        let (clock, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));

        let mut parts = clock.split(':');
        let hours = parts.next()?.parse::<u32>().ok()?;
        let minutes = parts.next()?.parse::<u8>().ok()?;
        let seconds = parts.next()?.parse::<u8>().ok()?;
        if parts.next().is_some() || minutes > 59 || seconds > 59 {
            return None;
        }

        let micros = if fraction.is_empty() {
            0
        } else {
            if fraction.len() > 6 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            format!("{fraction:0<6}").parse::<u32>().ok()?
        };

        Some(Self {
            negative,
            hours,
            minutes,
            seconds,
            micros,
        })
    }
}

impl fmt::Display for SqlTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.negative { "-" } else { "" };
        write!(
            f,
            "{sign}{:02}:{:02}:{:02}",
            self.hours, self.minutes, self.seconds
        )?;
        if self.micros > 0 {
            write!(f, ".{:06}", self.micros)?;
        }
        Ok(())
    }
}

/// A single cell of a result set, decoded at the driver boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Int(i64),
    UInt(u64),
    Float(f64),
    /// Exact numerics keep their textual form to avoid losing precision.
    Decimal(String),
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Time(SqlTime),
    Binary(Vec<u8>),
}

impl SqlValue {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            Self::UInt(value) => i64::try_from(*value).ok(),
            Self::Decimal(raw) | Self::Text(raw) => raw.trim().parse().ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Int(value) => u64::try_from(*value).ok(),
            Self::UInt(value) => Some(*value),
            Self::Decimal(raw) | Self::Text(raw) => raw.trim().parse().ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(value) | Self::Decimal(value) => Some(value),
            _ => None,
        }
    }

    /// Short name of the variant, used when rendering type hints.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Int(_) | Self::UInt(_) => "integer",
            Self::Float(_) => "float",
            Self::Decimal(_) => "decimal",
            Self::Text(_) => "text",
            Self::Date(_) => "date",
            Self::DateTime(_) => "datetime",
            Self::Time(_) => "time",
            Self::Binary(_) => "binary",
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Int(value) => write!(f, "{value}"),
            Self::UInt(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Decimal(value) | Self::Text(value) => f.write_str(value),
            Self::Date(value) => write!(f, "{}", value.format("%Y-%m-%d")),
            Self::DateTime(value) => {
                if value.nanosecond() == 0 {
                    write!(f, "{}", value.format("%Y-%m-%d %H:%M:%S"))
                } else {
                    write!(f, "{}", value.format("%Y-%m-%d %H:%M:%S%.6f"))
                }
            }
            Self::Time(value) => write!(f, "{value}"),
            Self::Binary(bytes) => write!(f, "<binary data: {} bytes>", bytes.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{SqlTime, SqlValue};

    #[test]
    fn time_parses_negative_and_fractional_values() {
        let time = SqlTime::parse("-838:59:59.5").expect("time should parse");
        assert!(time.negative);
        assert_eq!(time.hours, 838);
        assert_eq!(time.micros, 500_000);
        assert_eq!(time.to_string(), "-838:59:59.500000");
    }

    #[test]
    fn time_rejects_out_of_range_components() {
        assert!(SqlTime::parse("10:61:00").is_none());
        assert!(SqlTime::parse("10:00").is_none());
        assert!(SqlTime::parse("10:00:00.1234567").is_none());
    }

    #[test]
    fn display_is_human_readable() {
        assert_eq!(SqlValue::Null.to_string(), "NULL");
        assert_eq!(SqlValue::Int(-8).to_string(), "-8");
        assert_eq!(SqlValue::Decimal("10.50".to_string()).to_string(), "10.50");
        assert_eq!(
            SqlValue::Binary(vec![0, 1, 2]).to_string(),
            "<binary data: 3 bytes>"
        );

        let stamp = NaiveDate::from_ymd_opt(2024, 2, 29)
            .and_then(|date| date.and_hms_opt(13, 5, 0))
            .expect("valid timestamp");
        assert_eq!(
            SqlValue::DateTime(stamp).to_string(),
            "2024-02-29 13:05:00"
        );
    }

    #[test]
    fn numeric_accessors_cross_signedness_when_lossless() {
        assert_eq!(SqlValue::UInt(7).as_i64(), Some(7));
        assert_eq!(SqlValue::Int(-1).as_u64(), None);
        assert_eq!(SqlValue::Text(" 42 ".to_string()).as_u64(), Some(42));
        assert_eq!(SqlValue::Null.as_i64(), None);
    }
}

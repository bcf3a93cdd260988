//! Partition identity and ordering (§3, §4.2).

use crate::error::{Error, Result};
use crate::export_type::ExportType;
use std::cmp::Ordering;
use std::fmt;

/// Partition granularity fixed by the export type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Granularity {
    Monthly,
    Daily,
}

/// A parsed partition value, canonically formatted as `YYYY-MM` (monthly) or
/// `YYYY-MM-DD` (daily). Lexicographic ordering on the canonical string
/// coincides with chronological order for both formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PartitionValue {
    Monthly { year: u16, month: u8 },
    Daily { year: u16, month: u8, day: u8 },
}

impl PartitionValue {
    pub fn granularity(self) -> Granularity {
        match self {
            PartitionValue::Monthly { .. } => Granularity::Monthly,
            PartitionValue::Daily { .. } => Granularity::Daily,
        }
    }

    /// Parses a canonical value for the given granularity. Rejects a
    /// daily-shaped string when `granularity` is monthly and vice versa.
    pub fn parse(s: &str, granularity: Granularity) -> Result<Self> {
        let parts: Vec<&str> = s.split('-').collect();
        match (granularity, parts.as_slice()) {
            (Granularity::Monthly, [y, m]) => {
                let year = y
                    .parse()
                    .map_err(|_| Error::invalid_partition_value(s, granularity))?;
                let month = m
                    .parse()
                    .map_err(|_| Error::invalid_partition_value(s, granularity))?;
                if !(1..=12).contains(&month) || y.len() != 4 {
                    return Err(Error::invalid_partition_value(s, granularity));
                }
                Ok(PartitionValue::Monthly { year, month })
            }
            (Granularity::Daily, [y, m, d]) => {
                let year = y
                    .parse()
                    .map_err(|_| Error::invalid_partition_value(s, granularity))?;
                let month = m
                    .parse()
                    .map_err(|_| Error::invalid_partition_value(s, granularity))?;
                let day = d
                    .parse()
                    .map_err(|_| Error::invalid_partition_value(s, granularity))?;
                if !(1..=12).contains(&month) || !(1..=31).contains(&day) || y.len() != 4 {
                    return Err(Error::invalid_partition_value(s, granularity));
                }
                Ok(PartitionValue::Daily { year, month, day })
            }
            _ => Err(Error::invalid_partition_value(s, granularity)),
        }
    }
}

impl fmt::Display for PartitionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartitionValue::Monthly { year, month } => write!(f, "{year:04}-{month:02}"),
            PartitionValue::Daily { year, month, day } => {
                write!(f, "{year:04}-{month:02}-{day:02}")
            }
        }
    }
}

/// Tuple of (export type, key value, granularity). Equality and ordering are
/// on the tuple; granularity is implied by `export_type` but carried
/// explicitly to keep the type self-describing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Partition {
    pub export_type: ExportType,
    pub value: PartitionValue,
}

impl Partition {
    pub fn new(export_type: ExportType, value: PartitionValue) -> Self {
        Self { export_type, value }
    }

    pub fn granularity(&self) -> Granularity {
        self.value.granularity()
    }

    /// The object-store key prefix segment identifying this partition, e.g.
    /// `billing_period=2025-05`.
    pub fn key_segment(&self) -> String {
        format!("{}={}", self.export_type.partition_token(), self.value)
    }
}

impl PartialOrd for Partition {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Partition {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key_segment())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monthly_round_trip() {
        let v = PartitionValue::parse("2025-05", Granularity::Monthly).unwrap();
        assert_eq!(v.to_string(), "2025-05");
    }

    #[test]
    fn daily_round_trip() {
        let v = PartitionValue::parse("2025-05-07", Granularity::Daily).unwrap();
        assert_eq!(v.to_string(), "2025-05-07");
    }

    #[test]
    fn monthly_window_rejects_daily_shape() {
        assert!(PartitionValue::parse("2025-05-07", Granularity::Monthly).is_err());
    }

    #[test]
    fn daily_window_rejects_monthly_shape() {
        assert!(PartitionValue::parse("2025-05", Granularity::Daily).is_err());
    }

    #[test]
    fn lexicographic_order_is_chronological() {
        let a = PartitionValue::parse("2025-03", Granularity::Monthly).unwrap();
        let b = PartitionValue::parse("2025-11", Granularity::Monthly).unwrap();
        assert!(a < b);
    }
}

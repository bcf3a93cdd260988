//! Closed enumeration of the CUR schema families this engine understands (§3, §4.2).

use crate::partition::Granularity;

/// Columnar or compressed-text content a partition directory is allowed to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentFormat {
    Parquet,
    CsvGz,
}

impl ContentFormat {
    /// File extension (without the leading dot) associated with this format.
    pub fn extension(self) -> &'static str {
        match self {
            ContentFormat::Parquet => "parquet",
            ContentFormat::CsvGz => "csv.gz",
        }
    }

    fn from_file_name(name: &str) -> Option<Self> {
        if name.ends_with(".parquet") {
            Some(ContentFormat::Parquet)
        } else if name.ends_with(".csv.gz") {
            Some(ContentFormat::CsvGz)
        } else {
            None
        }
    }
}

/// A CUR export family. Each variant fixes the partition token, granularity,
/// accepted content formats and default logical table name (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportType {
    /// Legacy CSV-based Cost and Usage Report, partitioned monthly under `BILLING_PERIOD=`.
    CurLegacyCsv,
    /// Parquet-based Cost and Usage Report (CUR 2.0), partitioned monthly under `billing_period=`.
    CurParquet,
    /// FOCUS-aligned daily export, partitioned under `date=`.
    FocusDaily,
}

impl ExportType {
    /// The case-sensitive token used in object keys before the `=`.
    pub fn partition_token(self) -> &'static str {
        match self {
            ExportType::CurLegacyCsv => "BILLING_PERIOD",
            ExportType::CurParquet => "billing_period",
            ExportType::FocusDaily => "date",
        }
    }

    pub fn granularity(self) -> Granularity {
        match self {
            ExportType::CurLegacyCsv | ExportType::CurParquet => Granularity::Monthly,
            ExportType::FocusDaily => Granularity::Daily,
        }
    }

    /// Content formats accepted for objects inside a partition of this export type.
    pub fn accepted_formats(self) -> &'static [ContentFormat] {
        match self {
            ExportType::CurLegacyCsv => &[ContentFormat::CsvGz],
            ExportType::CurParquet | ExportType::FocusDaily => &[ContentFormat::Parquet],
        }
    }

    pub fn default_table_name(self) -> &'static str {
        match self {
            ExportType::CurLegacyCsv => "cur_legacy",
            ExportType::CurParquet => "cur",
            ExportType::FocusDaily => "focus_daily",
        }
    }

    /// Returns the format of `file_name`, if it is one this export type accepts.
    pub fn classify_file(self, file_name: &str) -> Option<ContentFormat> {
        ContentFormat::from_file_name(file_name)
            .filter(|fmt| self.accepted_formats().contains(fmt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_only_its_own_formats() {
        assert_eq!(
            ExportType::CurParquet.classify_file("part-0.parquet"),
            Some(ContentFormat::Parquet)
        );
        assert_eq!(ExportType::CurParquet.classify_file("part-0.csv.gz"), None);
        assert_eq!(
            ExportType::CurLegacyCsv.classify_file("part-0.csv.gz"),
            Some(ContentFormat::CsvGz)
        );
    }

    #[test]
    fn granularity_matches_export_family() {
        assert_eq!(ExportType::FocusDaily.granularity(), Granularity::Daily);
        assert_eq!(ExportType::CurParquet.granularity(), Granularity::Monthly);
    }
}

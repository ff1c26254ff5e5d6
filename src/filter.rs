use crate::error::{Error, Result};
use crate::model::{BroadcastRecord, TRANSCEIVER_COLUMN, TRANSCEIVER_COLUMN_ALT};
use csv::StringRecord;
use std::collections::HashSet;

pub const DEFAULT_MIN_LENGTH: f64 = 150.0;

/// Cargo and tanker codes live in [70, 90).
const CARGO_TANKER_CODES: std::ops::Range<i64> = 70..90;
/// Additional cargo, tanker and passenger codes from the extended code table.
const LISTED_VESSEL_TYPES: [i64; 4] = [1016, 1017, 1024, 61];
/// Single code produced by or-ing the restricted status codes together.
const LEGACY_STATUS_SENTINEL: i64 = 3 | 4;
const MIN_SPEED_KNOTS: f64 = 3.0;

/// Columns the filter reads, all of which must be present in an archive.
const REQUIRED_COLUMNS: [&str; 8] = [
    "MMSI",
    "BaseDateTime",
    "LAT",
    "LON",
    "SOG",
    "VesselType",
    "Status",
    "Length",
];

/// How a slow or stationary vessel can still qualify as moving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusRule {
    /// Status is restricted manoeuvrability or constrained by draught.
    #[default]
    Restricted,
    /// Status equals the or-ed sentinel code, matching historical output bit for bit.
    LegacyParity,
}

/// Column layout of one archive, resolved from its header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schema {
    transceiver: &'static str,
}

impl Schema {
    pub fn resolve(archive: &str, headers: &StringRecord) -> Result<Schema> {
        let has = |column: &str| headers.iter().any(|h| h == column);

        if let Some(missing) = REQUIRED_COLUMNS.iter().find(|c| !has(**c)) {
            return Err(Error::Schema {
                archive: archive.to_string(),
                column: missing.to_string(),
            });
        }

        let transceiver = if has(TRANSCEIVER_COLUMN) {
            TRANSCEIVER_COLUMN
        } else if has(TRANSCEIVER_COLUMN_ALT) {
            TRANSCEIVER_COLUMN_ALT
        } else {
            return Err(Error::Schema {
                archive: archive.to_string(),
                column: format!("{} or {}", TRANSCEIVER_COLUMN, TRANSCEIVER_COLUMN_ALT),
            });
        };

        Ok(Schema { transceiver })
    }

    pub fn transceiver_column(&self) -> &'static str {
        self.transceiver
    }

    /// Header row with the transceiver column under its primary spelling.
    pub fn canonical_headers(&self, headers: &StringRecord) -> StringRecord {
        if self.transceiver == TRANSCEIVER_COLUMN {
            return headers.clone();
        }
        headers
            .iter()
            .map(|h| if h == self.transceiver { TRANSCEIVER_COLUMN } else { h })
            .collect()
    }
}

/// Eligible records of one archive and the distinct vessels among them, in first-seen order.
#[derive(Debug, Default)]
pub struct Eligible {
    pub records: Vec<BroadcastRecord>,
    pub vessels: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct EligibilityFilter {
    min_length: f64,
    status_rule: StatusRule,
}

impl Default for EligibilityFilter {
    fn default() -> Self {
        EligibilityFilter::new(DEFAULT_MIN_LENGTH, StatusRule::default())
    }
}

impl EligibilityFilter {
    pub fn new(min_length: f64, status_rule: StatusRule) -> EligibilityFilter {
        EligibilityFilter {
            min_length,
            status_rule,
        }
    }

    pub fn is_eligible(&self, record: &BroadcastRecord) -> bool {
        self.is_large_or_commercial(record) && self.is_moving(record) && is_class_a(record)
    }

    pub fn apply(&self, records: Vec<BroadcastRecord>) -> Eligible {
        let mut seen = HashSet::new();
        let mut vessels = Vec::new();

        let records: Vec<BroadcastRecord> = records
            .into_iter()
            .filter(|r| self.is_eligible(r))
            .collect();

        for r in &records {
            if seen.insert(r.mmsi.as_str()) {
                vessels.push(r.mmsi.clone());
            }
        }

        Eligible { records, vessels }
    }

    fn is_large_or_commercial(&self, record: &BroadcastRecord) -> bool {
        let by_type = record
            .vessel_type
            .map(|t| CARGO_TANKER_CODES.contains(&t) || LISTED_VESSEL_TYPES.contains(&t))
            .unwrap_or(false);

        by_type || record.length.map(|l| l as f64 >= self.min_length).unwrap_or(false)
    }

    fn is_moving(&self, record: &BroadcastRecord) -> bool {
        let status = record.navigational_status();

        // a blank status cannot show the vessel is neither anchored nor moored
        let free = status.map(|s| !s.is_stationary()).unwrap_or(false);
        let underway = record.sog.map(|s| s > MIN_SPEED_KNOTS).unwrap_or(false) && free;

        let restricted = match self.status_rule {
            StatusRule::Restricted => status.map(|s| s.is_restricted()).unwrap_or(false),
            StatusRule::LegacyParity => {
                status.map(|s| s.code()) == Some(LEGACY_STATUS_SENTINEL)
            }
        };

        underway || restricted
    }
}

fn is_class_a(record: &BroadcastRecord) -> bool {
    record.transceiver_class.as_deref() == Some("A")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record() -> BroadcastRecord {
        BroadcastRecord {
            mmsi: "366998410".to_string(),
            timestamp: NaiveDate::from_ymd_opt(2019, 3, 26)
                .unwrap()
                .and_hms_opt(1, 28, 0)
                .unwrap(),
            lat: 39.21,
            lon: -76.52,
            sog: Some(5.0),
            cog: Some(120.0),
            heading: Some(121.0),
            name: None,
            imo: None,
            callsign: None,
            vessel_type: Some(71),
            status: Some(0),
            length: Some(90),
            width: Some(15),
            draft: Some(6.1),
            cargo: None,
            transceiver_class: Some("A".to_string()),
        }
    }

    #[test]
    fn test_cargo_underway_class_a_passes() {
        assert!(EligibilityFilter::default().is_eligible(&record()));
    }

    #[test]
    fn test_class_b_is_rejected() {
        let mut r = record();
        r.transceiver_class = Some("B".to_string());
        assert!(!EligibilityFilter::default().is_eligible(&r));
    }

    #[test]
    fn test_anchored_is_rejected() {
        let mut r = record();
        r.status = Some(1);
        assert!(!EligibilityFilter::default().is_eligible(&r));
        r.status = Some(5);
        assert!(!EligibilityFilter::default().is_eligible(&r));
    }

    #[test]
    fn test_missing_status_is_rejected() {
        let mut r = record();
        r.sog = Some(10.0);
        r.status = None;
        assert!(!EligibilityFilter::default().is_eligible(&r));
        let legacy = EligibilityFilter::new(DEFAULT_MIN_LENGTH, StatusRule::LegacyParity);
        assert!(!legacy.is_eligible(&r));
    }

    #[test]
    fn test_restricted_status_passes_without_speed() {
        let mut r = record();
        r.sog = Some(0.5);
        r.status = Some(3);
        assert!(EligibilityFilter::default().is_eligible(&r));
        r.status = Some(4);
        assert!(EligibilityFilter::default().is_eligible(&r));
        r.status = Some(7);
        assert!(!EligibilityFilter::default().is_eligible(&r));
    }

    #[test]
    fn test_legacy_parity_compares_against_sentinel() {
        let filter = EligibilityFilter::new(DEFAULT_MIN_LENGTH, StatusRule::LegacyParity);
        let mut r = record();
        r.sog = Some(0.5);
        r.status = Some(3);
        assert!(!filter.is_eligible(&r));
        r.status = Some(7);
        assert!(filter.is_eligible(&r));
    }

    #[test]
    fn test_size_or_class() {
        let filter = EligibilityFilter::default();
        let mut r = record();

        r.vessel_type = Some(90);
        assert!(!filter.is_eligible(&r));
        r.vessel_type = Some(1024);
        assert!(filter.is_eligible(&r));
        r.vessel_type = Some(36);
        r.length = Some(150);
        assert!(filter.is_eligible(&r));
        r.length = None;
        assert!(!filter.is_eligible(&r));

        let short = EligibilityFilter::new(50.0, StatusRule::Restricted);
        r.length = Some(60);
        assert!(short.is_eligible(&r));
    }

    #[test]
    fn test_apply_collects_distinct_vessels() {
        let mut other = record();
        other.mmsi = "X123".to_string();
        let mut slow = record();
        slow.sog = Some(1.0);
        slow.mmsi = "999".to_string();

        let eligible = EligibilityFilter::default().apply(vec![
            record(),
            other.clone(),
            slow,
            record(),
            other,
        ]);

        assert_eq!(eligible.records.len(), 4);
        assert_eq!(eligible.vessels, vec!["366998410", "X123"]);
    }

    #[test]
    fn test_schema_falls_back_to_alternate_spelling() {
        let headers = StringRecord::from(vec![
            "MMSI",
            "BaseDateTime",
            "LAT",
            "LON",
            "SOG",
            "VesselType",
            "Status",
            "Length",
            "TranscieverClass",
        ]);
        let schema = Schema::resolve("AIS_2019_03_26", &headers).unwrap();

        assert_eq!(schema.transceiver_column(), TRANSCEIVER_COLUMN_ALT);
        let canonical = schema.canonical_headers(&headers);
        assert_eq!(canonical.get(8), Some(TRANSCEIVER_COLUMN));
    }

    #[test]
    fn test_schema_missing_both_spellings() {
        let headers = StringRecord::from(vec![
            "MMSI",
            "BaseDateTime",
            "LAT",
            "LON",
            "SOG",
            "VesselType",
            "Status",
            "Length",
        ]);
        match Schema::resolve("AIS_2019_03_26", &headers) {
            Err(Error::Schema { archive, column }) => {
                assert_eq!(archive, "AIS_2019_03_26");
                assert!(column.contains(TRANSCEIVER_COLUMN_ALT));
            }
            other => panic!("expected schema error, got {:?}", other),
        }
    }
}

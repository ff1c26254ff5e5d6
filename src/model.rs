use chrono::NaiveDateTime;
use std::sync::Arc;

/// Primary spelling of the transceiver class column.
pub const TRANSCEIVER_COLUMN: &str = "TransceiverClass";
/// Misspelling found in a number of daily archives.
pub const TRANSCEIVER_COLUMN_ALT: &str = "TranscieverClass";

/// Navigational status as broadcast in AIS message types 1-3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationalStatus {
    UnderWayUsingEngine,
    AtAnchor,
    NotUnderCommand,
    RestrictedManoeuvrability,
    ConstrainedByDraught,
    Moored,
    Aground,
    EngagedInFishing,
    UnderWaySailing,
    Other(i64),
}

impl NavigationalStatus {
    pub fn code(self) -> i64 {
        match self {
            NavigationalStatus::UnderWayUsingEngine => 0,
            NavigationalStatus::AtAnchor => 1,
            NavigationalStatus::NotUnderCommand => 2,
            NavigationalStatus::RestrictedManoeuvrability => 3,
            NavigationalStatus::ConstrainedByDraught => 4,
            NavigationalStatus::Moored => 5,
            NavigationalStatus::Aground => 6,
            NavigationalStatus::EngagedInFishing => 7,
            NavigationalStatus::UnderWaySailing => 8,
            NavigationalStatus::Other(code) => code,
        }
    }

    pub fn is_stationary(self) -> bool {
        matches!(
            self,
            NavigationalStatus::AtAnchor | NavigationalStatus::Moored
        )
    }

    /// Moving, but with limited ability to keep clear of structures.
    pub fn is_restricted(self) -> bool {
        matches!(
            self,
            NavigationalStatus::RestrictedManoeuvrability | NavigationalStatus::ConstrainedByDraught
        )
    }
}

impl From<i64> for NavigationalStatus {
    fn from(code: i64) -> Self {
        match code {
            0 => NavigationalStatus::UnderWayUsingEngine,
            1 => NavigationalStatus::AtAnchor,
            2 => NavigationalStatus::NotUnderCommand,
            3 => NavigationalStatus::RestrictedManoeuvrability,
            4 => NavigationalStatus::ConstrainedByDraught,
            5 => NavigationalStatus::Moored,
            6 => NavigationalStatus::Aground,
            7 => NavigationalStatus::EngagedInFishing,
            8 => NavigationalStatus::UnderWaySailing,
            other => NavigationalStatus::Other(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
// MarineCadastre daily archive layout:
//1.	MMSI			Vessel identifier, usually numeric but not always
//2.	BaseDateTime		Timestamp, format: 2018-01-01T00:00:00
//3.	LAT			Latitude
//4.	LON			Longitude
//5.	SOG			Speed over ground (knots)
//6.	COG			Course over ground (degrees)
//7.	Heading			True heading (511 = not available)
//8.	VesselName
//9.	IMO
//10.	CallSign
//11.	VesselType		Vessel type code (70-89 cargo/tanker, 1016/1017/1024/61 ...)
//12.	Status			Navigational status code
//13.	Length			Metres
//14.	Width			Metres
//15.	Draft			Metres
//16.	Cargo			Cargo type code
//17.	TransceiverClass	"A" or "B", sometimes spelled TranscieverClass
// example: 367153070,2018-01-01T00:00:00,29.92281,-89.97237,0.0,-49.6,511.0,CONTI,,WDF9834,31,15,22,7,,,A
pub struct BroadcastRecord {
    #[serde(rename = "MMSI")]
    pub mmsi: String,
    #[serde(rename = "BaseDateTime")]
    pub timestamp: NaiveDateTime,
    #[serde(rename = "LAT")]
    pub lat: f64,
    #[serde(rename = "LON")]
    pub lon: f64,
    #[serde(rename = "SOG")]
    pub sog: Option<f64>,
    #[serde(rename = "COG")]
    pub cog: Option<f64>,
    #[serde(rename = "Heading")]
    pub heading: Option<f64>,
    #[serde(rename = "VesselName")]
    pub name: Option<String>,
    #[serde(rename = "IMO")]
    pub imo: Option<String>,
    #[serde(rename = "CallSign")]
    pub callsign: Option<String>,
    #[serde(rename = "VesselType")]
    pub vessel_type: Option<i64>,
    #[serde(rename = "Status")]
    pub status: Option<i64>,
    #[serde(rename = "Length")]
    pub length: Option<i64>,
    #[serde(rename = "Width")]
    pub width: Option<i64>,
    #[serde(rename = "Draft")]
    pub draft: Option<f64>,
    #[serde(rename = "Cargo")]
    pub cargo: Option<i64>,
    #[serde(rename = "TransceiverClass")]
    pub transceiver_class: Option<String>,
}

impl BroadcastRecord {
    pub fn navigational_status(&self) -> Option<NavigationalStatus> {
        self.status.map(NavigationalStatus::from)
    }
}

/// A planar (lon, lat) position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(lon: f64, lat: f64) -> Point {
        Point { x: lon, y: lat }
    }
}

impl From<&BroadcastRecord> for Point {
    fn from(record: &BroadcastRecord) -> Self {
        Point::new(record.lon, record.lat)
    }
}

/// Two temporally consecutive broadcasts of one vessel, `from` being the earlier.
#[derive(Debug, Clone, Copy)]
pub struct MovementSegment<'a> {
    pub from: &'a BroadcastRecord,
    pub to: &'a BroadcastRecord,
}

impl MovementSegment<'_> {
    pub fn start(&self) -> Point {
        Point::from(self.from)
    }

    pub fn end(&self) -> Point {
        Point::from(self.to)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossingKind {
    /// Both segments straddle each other.
    Proper,
    /// The later movement endpoint lies on the boundary segment.
    Touching,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CrossingEvent {
    pub boundary: Arc<str>,
    pub kind: CrossingKind,
    pub from: BroadcastRecord,
    pub to: BroadcastRecord,
}

//! One write queue and one consumer per boundary.
//!
//! Workers only ever hold a [`SinkHandles`], a map of queue senders. The
//! receiving side and the writer stay inside [`SinkSet`], which drains every
//! queue with exactly one consumer thread per boundary once a batch is done.

use crate::boundary::BoundaryRegistry;
use crate::error::{Error, Result};
use crate::model::CrossingEvent;
use crossbeam_channel::{Receiver, Sender};
use log::{debug, error};
use std::collections::{BTreeMap, HashMap};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::thread;

/// Events one archive produced for one boundary, written as a unit.
pub type WriteUnit = Vec<CrossingEvent>;

/// Persistent, append-only output for a single boundary.
pub trait EventWriter: Send {
    fn append(&mut self, events: &[CrossingEvent]) -> Result<()>;
}

/// Appends events to a CSV table, two rows per event.
pub struct CsvFileWriter {
    path: PathBuf,
    writer: csv::Writer<File>,
}

impl CsvFileWriter {
    pub fn open(path: impl Into<PathBuf>) -> Result<CsvFileWriter> {
        let path = path.into();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let is_new = file.metadata()?.len() == 0;

        // header rows are only wanted once, at the top of a fresh file
        let writer = csv::WriterBuilder::new()
            .has_headers(is_new)
            .from_writer(file);

        Ok(CsvFileWriter { path, writer })
    }

    /// `<boundary>.csv`, with path separators in the name replaced.
    pub fn file_name(boundary: &str) -> String {
        let stem: String = boundary
            .chars()
            .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
            .collect();
        format!("{}.csv", stem)
    }

    pub fn for_boundary(dir: &Path, boundary: &str) -> Result<CsvFileWriter> {
        Self::open(dir.join(Self::file_name(boundary)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventWriter for CsvFileWriter {
    fn append(&mut self, events: &[CrossingEvent]) -> Result<()> {
        for event in events {
            self.writer.serialize(&event.from)?;
            self.writer.serialize(&event.to)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

pub struct Sink {
    name: String,
    sender: Sender<WriteUnit>,
    receiver: Receiver<WriteUnit>,
    writer: Box<dyn EventWriter>,
}

impl Sink {
    pub fn new(name: &str, writer: Box<dyn EventWriter>) -> Sink {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Sink {
            name: name.to_string(),
            sender,
            receiver,
            writer,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// Writes queued units until the queue is observed empty. Returns the number of events written.
    pub fn drain(&mut self) -> Result<usize> {
        let mut written = 0;
        while let Ok(unit) = self.receiver.try_recv() {
            self.writer.append(&unit)?;
            written += unit.len();
        }
        Ok(written)
    }
}

/// Sender side of every sink, cheap to clone and safe to share between workers.
#[derive(Clone, Default)]
pub struct SinkHandles {
    senders: HashMap<String, Sender<WriteUnit>>,
}

impl SinkHandles {
    pub fn send(&self, boundary: &str, unit: WriteUnit) -> Result<()> {
        let sender = self
            .senders
            .get(boundary)
            .ok_or_else(|| Error::UnknownBoundary {
                boundary: boundary.to_string(),
            })?;
        sender.send(unit).map_err(|_| Error::SinkClosed {
            boundary: boundary.to_string(),
        })
    }
}

pub struct SinkSet {
    sinks: BTreeMap<String, Sink>,
}

impl SinkSet {
    pub fn new(sinks: Vec<Sink>) -> SinkSet {
        SinkSet {
            sinks: sinks.into_iter().map(|s| (s.name.clone(), s)).collect(),
        }
    }

    /// One sink per boundary, with writers produced by `make_writer`.
    pub fn for_registry<F>(registry: &BoundaryRegistry, mut make_writer: F) -> Result<SinkSet>
    where
        F: FnMut(&str) -> Result<Box<dyn EventWriter>>,
    {
        let sinks = registry
            .names()
            .map(|name| Ok(Sink::new(name, make_writer(name)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(SinkSet::new(sinks))
    }

    /// CSV output under `dir`, one file per boundary.
    ///
    /// Fails before opening anything if two boundary names map to the same file.
    pub fn csv_files(registry: &BoundaryRegistry, dir: &Path) -> Result<SinkSet> {
        let mut owners: HashMap<String, &str> = HashMap::new();
        for name in registry.names() {
            let file_name = CsvFileWriter::file_name(name);
            if let Some(other) = owners.insert(file_name.clone(), name) {
                return Err(Error::Boundary {
                    name: name.to_string(),
                    reason: format!("output file {} is already used by {}", file_name, other),
                });
            }
        }

        std::fs::create_dir_all(dir)?;
        Self::for_registry(registry, |name| {
            let writer = CsvFileWriter::for_boundary(dir, name)?;
            debug!("sink {} writes to {}", name, writer.path().display());
            Ok(Box::new(writer) as Box<dyn EventWriter>)
        })
    }

    pub fn contains(&self, boundary: &str) -> bool {
        self.sinks.contains_key(boundary)
    }

    pub fn handles(&self) -> SinkHandles {
        SinkHandles {
            senders: self
                .sinks
                .iter()
                .map(|(name, sink)| (name.clone(), sink.sender.clone()))
                .collect(),
        }
    }

    pub fn pending(&self) -> usize {
        self.sinks.values().map(Sink::pending).sum()
    }

    /// Starts one consumer per sink and waits for all of them to empty their queues.
    pub fn flush(&mut self) -> Result<BTreeMap<String, usize>> {
        let results: Vec<(String, Result<usize>)> = thread::scope(|scope| {
            let consumers: Vec<_> = self
                .sinks
                .values_mut()
                .map(|sink| {
                    let name = sink.name().to_string();
                    let handle = thread::Builder::new()
                        .name(format!("sink-{}", name))
                        .spawn_scoped(scope, move || sink.drain());
                    (name, handle)
                })
                .collect();

            consumers
                .into_iter()
                .map(|(name, handle)| {
                    let result = match handle {
                        Ok(h) => h.join().unwrap_or_else(|_| {
                            Err(Error::SinkClosed {
                                boundary: name.clone(),
                            })
                        }),
                        Err(e) => Err(Error::Io(e)),
                    };
                    (name, result)
                })
                .collect()
        });

        let mut written = BTreeMap::new();
        let mut first_error = None;
        for (name, result) in results {
            match result {
                Ok(n) => {
                    debug!("sink {} flushed {} events", name, n);
                    written.insert(name, n);
                }
                Err(e) => {
                    error!("sink {} failed to write: {}", name, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(written),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::Boundary;
    use crate::model::{BroadcastRecord, CrossingKind, Point};
    use chrono::NaiveDate;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    fn event(boundary: &str, mmsi: &str) -> CrossingEvent {
        let record = |minute: u32, lon: f64| BroadcastRecord {
            mmsi: mmsi.to_string(),
            timestamp: NaiveDate::from_ymd_opt(2020, 2, 29)
                .unwrap()
                .and_hms_opt(8, minute, 0)
                .unwrap(),
            lat: 37.8,
            lon,
            sog: Some(12.0),
            cog: Some(90.0),
            heading: Some(90.0),
            name: None,
            imo: None,
            callsign: None,
            vessel_type: Some(80),
            status: Some(0),
            length: Some(180),
            width: None,
            draft: None,
            cargo: None,
            transceiver_class: Some("A".to_string()),
        };
        CrossingEvent {
            boundary: boundary.into(),
            kind: CrossingKind::Proper,
            from: record(0, -122.48),
            to: record(1, -122.46),
        }
    }

    #[derive(Clone, Default)]
    struct Collect(Arc<Mutex<Vec<CrossingEvent>>>);

    impl EventWriter for Collect {
        fn append(&mut self, events: &[CrossingEvent]) -> Result<()> {
            self.0.lock().unwrap().extend_from_slice(events);
            Ok(())
        }
    }

    #[test]
    fn test_drain_empties_queue_in_fifo_order() {
        let out = Collect::default();
        let mut sink = Sink::new("Golden Gate", Box::new(out.clone()));
        let handles = SinkHandles {
            senders: HashMap::from([("Golden Gate".to_string(), sink.sender.clone())]),
        };

        handles.send("Golden Gate", vec![event("Golden Gate", "1")]).unwrap();
        handles
            .send("Golden Gate", vec![event("Golden Gate", "2"), event("Golden Gate", "3")])
            .unwrap();

        assert_eq!(sink.pending(), 2);
        assert_eq!(sink.drain().unwrap(), 3);
        assert_eq!(sink.pending(), 0);
        let mmsis: Vec<_> = out.0.lock().unwrap().iter().map(|e| e.from.mmsi.clone()).collect();
        assert_eq!(mmsis, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_unknown_boundary_is_rejected() {
        let sinks = SinkSet::new(vec![Sink::new("a", Box::new(Collect::default()))]);
        assert!(matches!(
            sinks.handles().send("b", vec![]),
            Err(Error::UnknownBoundary { .. })
        ));
    }

    #[test]
    fn test_flush_drains_every_sink() {
        let a = Collect::default();
        let b = Collect::default();
        let mut sinks = SinkSet::new(vec![
            Sink::new("a", Box::new(a.clone())),
            Sink::new("b", Box::new(b.clone())),
        ]);
        let handles = sinks.handles();

        let producers: Vec<_> = (0..4)
            .map(|i| {
                let handles = handles.clone();
                thread::spawn(move || {
                    handles.send("a", vec![event("a", &i.to_string())]).unwrap();
                    handles.send("b", vec![event("b", &i.to_string())]).unwrap();
                })
            })
            .collect();
        for p in producers {
            p.join().unwrap();
        }

        let written = sinks.flush().unwrap();

        assert_eq!(written.get("a"), Some(&4));
        assert_eq!(written.get("b"), Some(&4));
        assert_eq!(sinks.pending(), 0);
        assert_eq!(a.0.lock().unwrap().len(), 4);
    }

    #[test]
    fn test_colliding_file_names_are_rejected() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("out");
        let registry = BoundaryRegistry::new(vec![
            Boundary::bridge("A/B", &[Point::new(0.0, 0.0), Point::new(0.0, 1.0)]).unwrap(),
            Boundary::bridge("A_B", &[Point::new(1.0, 0.0), Point::new(1.0, 1.0)]).unwrap(),
        ])
        .unwrap();

        match SinkSet::csv_files(&registry, &out) {
            Err(Error::Boundary { reason, .. }) => assert!(reason.contains("A_B.csv")),
            Err(e) => panic!("expected boundary error, got {}", e),
            Ok(_) => panic!("expected boundary error"),
        }
        assert!(!out.exists());
    }

    #[test]
    fn test_csv_writer_appends_two_rows_per_event() {
        let dir = tempdir().unwrap();

        let mut writer = CsvFileWriter::for_boundary(dir.path(), "Bay/Bridge").unwrap();
        writer.append(&[event("Bay/Bridge", "1")]).unwrap();
        drop(writer);
        // reopening must not repeat the header
        let mut writer = CsvFileWriter::for_boundary(dir.path(), "Bay/Bridge").unwrap();
        writer.append(&[event("Bay/Bridge", "2")]).unwrap();
        drop(writer);

        let contents = std::fs::read_to_string(dir.path().join("Bay_Bridge.csv")).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("MMSI,BaseDateTime,LAT,LON"));
        assert!(lines[0].ends_with("TransceiverClass"));
        assert!(lines[1].starts_with("1,2020-02-29T08:00:00,"));
        // integer columns are written back without a fractional part
        assert!(lines[1].contains(",80,0,180,,"));
        assert!(lines[2].starts_with("1,2020-02-29T08:01:00,"));
        assert!(lines[3].starts_with("2,"));
        assert!(lines[4].starts_with("2,"));
    }
}

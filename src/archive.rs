use crate::error::{Error, Result};
use crate::filter::Schema;
use crate::model::BroadcastRecord;
use log::debug;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Provides the raw table behind an archive identifier.
///
/// Download and extraction live behind this seam; the pipeline only sees a reader.
pub trait ArchiveSource: Sync {
    fn fetch(&self, id: &str) -> Result<Box<dyn Read + Send>>;
}

/// Reads `<root>/<id>.csv` from local disk.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> DirectorySource {
        DirectorySource { root: root.into() }
    }

    pub fn path_of(&self, id: &str) -> PathBuf {
        self.root.join(format!("{}.csv", id))
    }

    /// Every `*.csv` stem in the directory, sorted.
    pub fn list(&self) -> Result<Vec<String>> {
        list_archives(&self.root)
    }
}

impl ArchiveSource for DirectorySource {
    fn fetch(&self, id: &str) -> Result<Box<dyn Read + Send>> {
        let file = File::open(self.path_of(id)).map_err(|e| Error::Fetch {
            archive: id.to_string(),
            source: e,
        })?;
        Ok(Box::new(std::io::BufReader::new(file)))
    }
}

fn list_archives(root: &Path) -> Result<Vec<String>> {
    let mut ids = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let path = entry?.path();
        if path.extension().map(|e| e == "csv").unwrap_or(false) {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }
    }
    ids.sort();
    Ok(ids)
}

#[derive(Debug, Default)]
pub struct ParsedArchive {
    pub records: Vec<BroadcastRecord>,
    pub malformed: usize,
}

/// Parses one archive table. Rows that do not deserialize are counted and skipped.
pub fn parse<R: Read>(id: &str, reader: R) -> Result<ParsedArchive> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(reader);

    let headers = rdr.headers().map_err(|e| read_error(id, e))?.clone();
    let schema = Schema::resolve(id, &headers)?;
    rdr.set_headers(schema.canonical_headers(&headers));

    let mut parsed = ParsedArchive::default();
    for result in rdr.deserialize::<BroadcastRecord>() {
        match result {
            Ok(record) => parsed.records.push(record),
            Err(e) if e.is_io_error() => return Err(read_error(id, e)),
            Err(e) => {
                if parsed.malformed == 0 {
                    debug!("{}: skipping malformed row: {}", id, e);
                }
                parsed.malformed += 1;
            }
        }
    }

    Ok(parsed)
}

fn read_error(id: &str, e: csv::Error) -> Error {
    if e.is_io_error() {
        Error::Fetch {
            archive: id.to_string(),
            source: e.into(),
        }
    } else {
        Error::Csv(e)
    }
}

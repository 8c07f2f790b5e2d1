//! Source loading: archive extraction and tab-delimited readers for the
//! three extracts (`sub.txt`, `num.txt`, `tag.txt`).

use serde::de::DeserializeOwned;
use std::fs::{self, File};
use std::io::{self, BufReader, Cursor, Read};
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, Result};
use crate::model::{Fact, Submission, TagDefinition};

pub const SUBMISSIONS_FILE: &str = "sub.txt";
pub const FACTS_FILE: &str = "num.txt";
pub const TAGS_FILE: &str = "tag.txt";

/// Unpacks a ZIP archive into `dest`, returning the extracted file paths.
/// Entries whose names would resolve outside `dest` are rejected.
pub fn extract_archive(bytes: &[u8], dest: &Path) -> Result<Vec<PathBuf>> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    fs::create_dir_all(dest)?;
    let mut written = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let rel = entry.enclosed_name().ok_or_else(|| {
            PipelineError::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("archive entry '{}' escapes extraction directory", entry.name()),
            ))
        })?;
        let out_path = dest.join(rel);
        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&out_path)?;
        io::copy(&mut entry, &mut out)?;
        written.push(out_path);
    }
    Ok(written)
}

/// The three extracts of one period inside a raw directory.
#[derive(Debug, Clone)]
pub struct RawPeriodFiles {
    pub submissions: PathBuf,
    pub facts: PathBuf,
    pub tags: PathBuf,
}

impl RawPeriodFiles {
    pub fn locate(dir: &Path) -> Result<Self> {
        let find = |name: &str| {
            let path = dir.join(name);
            if path.is_file() {
                Ok(path)
            } else {
                Err(PipelineError::MissingSource(path.display().to_string()))
            }
        };
        Ok(Self { submissions: find(SUBMISSIONS_FILE)?, facts: find(FACTS_FILE)?, tags: find(TAGS_FILE)? })
    }

    /// Marker used by the fetch stage to decide a period is already on disk.
    pub fn present(dir: &Path) -> bool {
        dir.join(SUBMISSIONS_FILE).is_file()
    }
}

fn tsv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .quoting(false)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader)
}

fn read_rows<T: DeserializeOwned, R: Read>(reader: R) -> Result<Vec<T>> {
    let mut rdr = tsv_reader(reader);
    let mut rows = Vec::new();
    for row in rdr.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

fn open(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            PipelineError::MissingSource(path.display().to_string())
        } else {
            PipelineError::Io(e)
        }
    })?;
    Ok(BufReader::new(file))
}

pub fn read_submissions_from<R: Read>(reader: R) -> Result<Vec<Submission>> {
    read_rows(reader)
}

pub fn read_tags_from<R: Read>(reader: R) -> Result<Vec<TagDefinition>> {
    read_rows(reader)
}

pub fn read_facts_from<R: Read>(reader: R) -> Result<Vec<Fact>> {
    read_rows(reader)
}

pub fn read_submissions(path: &Path) -> Result<Vec<Submission>> {
    read_submissions_from(open(path)?)
}

pub fn read_tags(path: &Path) -> Result<Vec<TagDefinition>> {
    read_tags_from(open(path)?)
}

pub fn read_facts(path: &Path) -> Result<Vec<Fact>> {
    read_facts_from(open(path)?)
}

/// Streams `num.txt` as consecutive batches of at most `batch_rows` facts.
pub struct FactBatches<R: Read> {
    rows: csv::DeserializeRecordsIntoIter<R, Fact>,
    batch_rows: usize,
    done: bool,
}

impl<R: Read> FactBatches<R> {
    pub fn new(reader: R, batch_rows: usize) -> Self {
        Self { rows: tsv_reader(reader).into_deserialize(), batch_rows: batch_rows.max(1), done: false }
    }
}

impl FactBatches<BufReader<File>> {
    pub fn open(path: &Path, batch_rows: usize) -> Result<Self> {
        Ok(Self::new(open(path)?, batch_rows))
    }
}

impl<R: Read> Iterator for FactBatches<R> {
    type Item = Result<Vec<Fact>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut batch = Vec::with_capacity(self.batch_rows.min(65_536));
        while batch.len() < self.batch_rows {
            match self.rows.next() {
                Some(Ok(fact)) => batch.push(fact),
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
                None => {
                    self.done = true;
                    break;
                }
            }
        }
        if batch.is_empty() {
            None
        } else {
            Some(Ok(batch))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    const NUM: &str = "adsh\ttag\tversion\tcoreg\tddate\tqtrs\tuom\tvalue\tfootnote\n\
        A1\tRevenue\tus-gaap/2022\t\t20221231\t4\tUSD\t1000.0\t\n\
        A1\tRevenue\tus-gaap/2022\t\t20221231\t4\tEUR\t5.0\t\n\
        A1\tAssets\tus-gaap/2022\t\t20221231\t0\tUSD\t\t\n";

    #[test]
    fn reads_facts_with_missing_values() {
        let facts = read_facts_from(NUM.as_bytes()).unwrap();
        assert_eq!(facts.len(), 3);
        assert_eq!(facts[0].value, Some(1000.0));
        assert_eq!(facts[1].uom, "EUR");
        assert_eq!(facts[2].value, None);
        assert_eq!(facts[2].coreg, None);
    }

    #[test]
    fn reads_submissions_ignoring_extra_columns() {
        let sub = "adsh\tcik\tname\tsic\tform\tfiled\n\
            A1\t1\tAcme \"Holdings\"\t1000\t10-K\t20230101\n";
        let subs = read_submissions_from(sub.as_bytes()).unwrap();
        assert_eq!(subs[0].name.as_deref(), Some("Acme \"Holdings\""));
        assert_eq!(subs[0].filed, "20230101");
    }

    #[test]
    fn batches_cover_every_row() {
        let sizes: Vec<usize> =
            FactBatches::new(NUM.as_bytes(), 2).map(|b| b.unwrap().len()).collect();
        assert_eq!(sizes, vec![2, 1]);
        assert_eq!(FactBatches::new("adsh\ttag\n".as_bytes(), 2).count(), 0);
    }

    #[test]
    fn extracts_archive_and_locates_files() {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut buf);
            for name in [SUBMISSIONS_FILE, FACTS_FILE, TAGS_FILE] {
                zip.start_file(name, SimpleFileOptions::default()).unwrap();
                zip.write_all(b"adsh\n").unwrap();
            }
            zip.finish().unwrap();
        }
        let dir = tempfile::tempdir().unwrap();
        let written = extract_archive(buf.get_ref(), dir.path()).unwrap();
        assert_eq!(written.len(), 3);
        assert!(RawPeriodFiles::present(dir.path()));
        assert!(RawPeriodFiles::locate(dir.path()).is_ok());
    }

    #[test]
    fn missing_extract_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(SUBMISSIONS_FILE), "adsh\n").unwrap();
        let err = RawPeriodFiles::locate(dir.path()).unwrap_err();
        assert!(matches!(err, PipelineError::MissingSource(p) if p.ends_with(FACTS_FILE)));
    }
}

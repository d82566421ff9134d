//! CSV sinks: one file per job, or one cumulative file.

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fd_lock::RwLock;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{OutputError, RecordSink};
use crate::models::{JobResult, Record};

/// Column that ties every row back to its job.
const JOB_ID_COLUMN: &str = "data_source_id";

/// Serialize records to CSV bytes, optionally preceded by the header row.
///
/// The header is written explicitly so a job with no records still yields a
/// well-formed table.
fn encode(records: &[Record], header: bool, path: &Path) -> Result<Vec<u8>, OutputError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    if header {
        writer
            .write_record(Record::COLUMNS)
            .map_err(|e| OutputError::csv(path, e))?;
    }
    for record in records {
        writer
            .serialize(record)
            .map_err(|e| OutputError::csv(path, e))?;
    }
    writer
        .into_inner()
        .map_err(|e| OutputError::csv(path, e.error()))
}

/// Writes `<dir>/<job_id>.csv` for each completed job.
pub struct CsvDirectorySink {
    dir: PathBuf,
}

impl CsvDirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, job_id: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", job_id))
    }

    fn temp_path_for(&self, job_id: &str) -> PathBuf {
        self.dir.join(format!(".{}.csv.partial", job_id))
    }
}

#[async_trait]
impl RecordSink for CsvDirectorySink {
    async fn completed_jobs(&self) -> Result<HashSet<String>, OutputError> {
        let mut done = HashSet::new();
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(done),
            Err(e) => return Err(OutputError::io(&self.dir, e)),
        };

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| OutputError::io(&self.dir, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("csv") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if !stem.starts_with('.') {
                    done.insert(stem.to_string());
                }
            }
        }
        debug!("{} completed job(s) in {}", done.len(), self.dir.display());
        Ok(done)
    }

    async fn write_job(&self, result: &JobResult) -> Result<PathBuf, OutputError> {
        super::validate_job_id(&result.job_id)?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| OutputError::io(&self.dir, e))?;

        let path = self.path_for(&result.job_id);
        let temp = self.temp_path_for(&result.job_id);
        let bytes = encode(&result.records, true, &path)?;

        // The final name only ever appears complete.
        tokio::fs::write(&temp, &bytes)
            .await
            .map_err(|e| OutputError::io(&temp, e))?;
        tokio::fs::rename(&temp, &path)
            .await
            .map_err(|e| OutputError::io(&path, e))?;

        info!(
            "Wrote {} record(s) for {} to {}",
            result.len(),
            result.job_id,
            path.display()
        );
        Ok(path)
    }
}

/// Read `path` under a shared lock. `None` when the file does not exist.
fn read_locked(path: &Path) -> std::io::Result<Option<Vec<u8>>> {
    let file = match OpenOptions::new().read(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    let lock = RwLock::new(file);
    let guard = lock.read()?;
    let mut contents = Vec::new();
    (&*guard).read_to_end(&mut contents)?;
    drop(guard);
    Ok(Some(contents))
}

/// Append `rows` to `path` under an exclusive lock, writing `header` first
/// when the locked file is still empty. Returns whether the header went out.
fn append_locked(path: &Path, header: &[u8], rows: &[u8]) -> std::io::Result<bool> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut lock = RwLock::new(file);
    let mut guard = lock.write()?;
    let needs_header = guard.metadata()?.len() == 0;
    if needs_header {
        guard.write_all(header)?;
    }
    guard.write_all(rows)?;
    guard.flush()?;
    Ok(needs_header)
}

/// Appends every completed job to one cumulative CSV.
///
/// Writers in this process queue on a mutex; writers in other processes (or
/// other sinks on the same file) are held off by an advisory file lock.
pub struct CsvAppendSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl CsvAppendSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RecordSink for CsvAppendSink {
    async fn completed_jobs(&self) -> Result<HashSet<String>, OutputError> {
        let path = self.path.clone();
        let contents = tokio::task::spawn_blocking(move || read_locked(&path))
            .await
            .map_err(|e| OutputError::io(&self.path, std::io::Error::other(e)))?
            .map_err(|e| OutputError::io(&self.path, e))?;
        let Some(contents) = contents else {
            return Ok(HashSet::new());
        };
        if contents.is_empty() {
            return Ok(HashSet::new());
        }

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(contents.as_slice());
        let headers = reader
            .headers()
            .map_err(|e| OutputError::csv(&self.path, e))?;
        let column = headers
            .iter()
            .position(|h| h == JOB_ID_COLUMN)
            .ok_or_else(|| OutputError::MissingColumn {
                path: self.path.clone(),
                column: JOB_ID_COLUMN.to_string(),
            })?;

        let mut done = HashSet::new();
        for row in reader.records() {
            let row = row.map_err(|e| OutputError::csv(&self.path, e))?;
            if let Some(id) = row.get(column) {
                if !id.is_empty() {
                    done.insert(id.to_string());
                }
            }
        }
        Ok(done)
    }

    async fn write_job(&self, result: &JobResult) -> Result<PathBuf, OutputError> {
        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| OutputError::io(parent, e))?;
        }

        let header = encode(&[], true, &self.path)?;
        let rows = encode(&result.records, false, &self.path)?;
        let path = self.path.clone();
        let wrote_header = tokio::task::spawn_blocking(move || append_locked(&path, &header, &rows))
            .await
            .map_err(|e| OutputError::io(&self.path, std::io::Error::other(e)))?
            .map_err(|e| OutputError::io(&self.path, e))?;
        if wrote_header {
            debug!("Started {} with a header row", self.path.display());
        }

        info!(
            "Appended {} record(s) for {} to {}",
            result.len(),
            result.job_id,
            self.path.display()
        );
        Ok(self.path.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn record(job_id: &str, name: &str) -> Record {
        Record {
            name: name.to_string(),
            ..Record::for_job(job_id)
        }
    }

    fn job(job_id: &str, names: &[&str]) -> JobResult {
        JobResult {
            job_id: job_id.to_string(),
            records: names.iter().map(|n| record(job_id, n)).collect(),
        }
    }

    fn read_rows(path: &Path) -> Vec<csv::StringRecord> {
        let mut reader = csv::Reader::from_path(path).unwrap();
        reader.records().map(|r| r.unwrap()).collect()
    }

    #[tokio::test]
    async fn directory_sink_writes_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let sink = CsvDirectorySink::new(dir.path());

        let path = sink.write_job(&job("abc123", &["Ann", "Bob"])).await.unwrap();

        assert_eq!(path, dir.path().join("abc123.csv"));
        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
        assert_eq!(headers, Record::COLUMNS.to_vec());
        let rows = read_rows(&path);
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][0], "abc123");
        assert_eq!(&rows[1][1], "Bob");
        assert_eq!(&rows[1][25], "false");
    }

    #[tokio::test]
    async fn empty_job_still_marks_completion() {
        let dir = tempfile::tempdir().unwrap();
        let sink = CsvDirectorySink::new(dir.path());

        sink.write_job(&job("empty", &[])).await.unwrap();

        let done = sink.completed_jobs().await.unwrap();
        assert!(done.contains("empty"));
        let contents = std::fs::read_to_string(dir.path().join("empty.csv")).unwrap();
        assert_eq!(contents.lines().count(), 1);
    }

    #[tokio::test]
    async fn partial_and_foreign_files_are_not_completions() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".abc123.csv.partial"), "x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();
        std::fs::write(dir.path().join("def456.csv"), "x").unwrap();

        let done = CsvDirectorySink::new(dir.path()).completed_jobs().await.unwrap();

        assert_eq!(done, HashSet::from(["def456".to_string()]));
    }

    #[tokio::test]
    async fn missing_directory_has_no_completions() {
        let dir = tempfile::tempdir().unwrap();
        let sink = CsvDirectorySink::new(dir.path().join("not-yet"));

        assert!(sink.completed_jobs().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn append_sink_writes_header_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("all.csv");
        let sink = CsvAppendSink::new(&path);

        sink.write_job(&job("abc123", &["Ann"])).await.unwrap();
        sink.write_job(&job("def456", &["Cy", "Di"])).await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.matches("data_source_id").count(), 1);
        assert_eq!(read_rows(&path).len(), 3);

        let done = sink.completed_jobs().await.unwrap();
        assert_eq!(
            done,
            HashSet::from(["abc123".to_string(), "def456".to_string()])
        );
    }

    #[tokio::test]
    async fn concurrent_appends_do_not_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("all.csv");
        let sink = Arc::new(CsvAppendSink::new(&path));

        let mut handles = Vec::new();
        for i in 0..8 {
            let sink = sink.clone();
            handles.push(tokio::spawn(async move {
                let id = format!("job{}", i);
                let names: Vec<String> = (0..20).map(|n| format!("{}-{}", id, n)).collect();
                let names: Vec<&str> = names.iter().map(String::as_str).collect();
                sink.write_job(&job(&id, &names)).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let rows = read_rows(&path);
        assert_eq!(rows.len(), 160);
        for chunk in rows.chunks(20) {
            let first = &chunk[0][0];
            assert!(chunk.iter().all(|r| &r[0] == first));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn separate_sinks_share_one_header() {
        for round in 0..20 {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("all.csv");
            let first = CsvAppendSink::new(&path);
            let second = CsvAppendSink::new(&path);

            let a = job("abc123", &["Ann", "Bob"]);
            let b = job("def456", &["Cy"]);
            let (ra, rb) = tokio::join!(first.write_job(&a), second.write_job(&b));
            ra.unwrap();
            rb.unwrap();

            let contents = std::fs::read_to_string(&path).unwrap();
            assert_eq!(
                contents.matches("data_source_id").count(),
                1,
                "round {round}: {contents}"
            );
            assert_eq!(read_rows(&path).len(), 3, "round {round}");
            assert_eq!(first.completed_jobs().await.unwrap().len(), 2);
        }
    }

    #[tokio::test]
    async fn append_file_without_id_column_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("all.csv");
        std::fs::write(&path, "Name,Bib\nAnn,101\n").unwrap();

        let err = CsvAppendSink::new(&path).completed_jobs().await.unwrap_err();

        assert!(matches!(err, OutputError::MissingColumn { .. }));
    }
}

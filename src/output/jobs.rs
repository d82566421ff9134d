//! Loading job ids from a file.
//!
//! A `.csv` file is read by header, taking the configured id column. Any
//! other file holds one id per line; blank lines and `#` comments are ignored.

use std::path::Path;

use super::OutputError;

pub async fn load_job_ids(path: &Path, id_column: &str) -> Result<Vec<String>, OutputError> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| OutputError::io(path, e))?;

    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));

    if is_csv {
        parse_csv(path, &contents, id_column)
    } else {
        Ok(parse_lines(&contents))
    }
}

fn parse_lines(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect()
}

fn parse_csv(path: &Path, contents: &str, id_column: &str) -> Result<Vec<String>, OutputError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(contents.as_bytes());
    let column = reader
        .headers()
        .map_err(|e| OutputError::csv(path, e))?
        .iter()
        .position(|h| h == id_column)
        .ok_or_else(|| OutputError::MissingColumn {
            path: path.to_path_buf(),
            column: id_column.to_string(),
        })?;

    let mut ids = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|e| OutputError::csv(path, e))?;
        if let Some(id) = row.get(column).filter(|id| !id.is_empty()) {
            ids.push(id.to_string());
        }
    }
    Ok(ids)
}

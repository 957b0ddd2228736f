//! Destinations for tabular output, written atomically.

use std::{
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
};

use serde::Serialize;
use snafu::{Backtrace, ResultExt, Snafu};

/// Errors raised while writing a table.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SinkError {
    /// Filesystem error while creating, writing or renaming the output.
    #[snafu(display("I/O error on {}: {source}", path.display()))]
    Io {
        path: PathBuf,
        source: std::io::Error,
        backtrace: Backtrace,
    },

    /// A record could not be serialized into the destination format.
    #[snafu(display("failed to encode record for {}: {source}", path.display()))]
    Encode {
        path: PathBuf,
        source: csv::Error,
        backtrace: Backtrace,
    },
}

/// A destination for a slice of records.
pub trait DataSink<R> {
    /// The type of output returned after a successful write operation.
    ///
    /// A file sink returns the number of rows written; other sinks may return
    /// identifiers of what they created.
    type Output;

    /// Writes `data` to the destination, replacing whatever was there before.
    fn write(&self, data: &[R]) -> Result<Self::Output, SinkError>;
}

/// Writes records as CSV with a header row.
///
/// The file is first written next to its destination under a `.tmp` name and
/// then renamed over it, so readers never observe a half-written table.
#[derive(Debug, Clone)]
pub struct CsvFileSink {
    path: PathBuf,
}

impl CsvFileSink {
    /// Sink targeting `path`. Parent directories are created on write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Final destination of the table.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<R: Serialize> DataSink<R> for CsvFileSink {
    type Output = usize;

    fn write(&self, data: &[R]) -> Result<usize, SinkError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).context(IoSnafu { path: parent })?;
        }
        let tmp = temp_path_for(&self.path);
        let written = write_csv(&tmp, data);
        if written.is_err() {
            let _ = fs::remove_file(&tmp);
            return written;
        }
        fs::rename(&tmp, &self.path).context(IoSnafu { path: &self.path })?;
        written
    }
}

fn write_csv<R: Serialize>(path: &Path, data: &[R]) -> Result<usize, SinkError> {
    let mut wtr = csv::Writer::from_path(path).context(EncodeSnafu { path })?;
    for row in data {
        wtr.serialize(row).context(EncodeSnafu { path })?;
    }
    wtr.flush().context(IoSnafu { path })?;
    Ok(data.len())
}

/// `dir/name.ext` -> `dir/name.ext.tmp`
pub fn temp_path_for(path: &Path) -> PathBuf {
    let mut name: OsString = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Row {
        #[serde(rename = "Stock")]
        stock: &'static str,
        #[serde(rename = "Close")]
        close: f64,
    }

    #[test]
    fn writes_header_and_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.csv");
        let sink = CsvFileSink::new(&path);
        let n = sink
            .write(&[
                Row { stock: "TCS.NS", close: 1.5 },
                Row { stock: "ITC.NS", close: 2.0 },
            ])
            .unwrap();
        assert_eq!(n, 2);
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "Stock,Close\nTCS.NS,1.5\nITC.NS,2.0\n");
        assert!(!temp_path_for(&path).exists());
    }

    #[test]
    fn temp_path_keeps_extension() {
        let p = temp_path_for(Path::new("/a/b/model.json"));
        assert_eq!(p, PathBuf::from("/a/b/model.json.tmp"));
    }
}

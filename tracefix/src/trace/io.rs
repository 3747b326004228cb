//! JSON Lines trace reading and atomic trace writing.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use super::{Trace, TransactionTrace};
use crate::error::{Result, TraceError};

/// Lazily decodes one transaction per non-blank line.
pub struct TraceReader<R: BufRead> {
    lines: Lines<R>,
    line: usize,
}

impl TraceReader<BufReader<File>> {
    pub fn open(path: &Path) -> std::result::Result<Self, TraceError> {
        let file = File::open(path).map_err(|source| TraceError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> TraceReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line: 0,
        }
    }
}

impl<R: BufRead> Iterator for TraceReader<R> {
    type Item = std::result::Result<TransactionTrace, TraceError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let raw = self.lines.next()?;
            self.line += 1;
            let line = self.line;
            let text = match raw {
                Ok(text) => text,
                Err(source) => return Some(Err(TraceError::Read { line, source })),
            };
            if text.trim().is_empty() {
                continue;
            }
            return Some(
                serde_json::from_str(&text).map_err(|source| TraceError::Parse { line, source }),
            );
        }
    }
}

/// Read a whole trace into memory.
pub fn load_trace(path: &Path) -> std::result::Result<Trace, TraceError> {
    let transactions = TraceReader::open(path)?.collect::<std::result::Result<Vec<_>, _>>()?;
    debug!(path = %path.display(), transactions = transactions.len(), "loaded trace");
    Ok(Trace::new(transactions))
}

/// Destination for rewritten transactions.
pub trait TraceSink {
    fn write_transaction(&mut self, txn: &TransactionTrace) -> Result<()>;
}

impl TraceSink for Vec<TransactionTrace> {
    fn write_transaction(&mut self, txn: &TransactionTrace) -> Result<()> {
        self.push(txn.clone());
        Ok(())
    }
}

/// Streams transactions into a temporary file beside `path` and renames it
/// into place on [`TraceWriter::finish`]. Dropping the writer without
/// finishing removes the temporary file and leaves `path` untouched.
pub struct TraceWriter {
    path: PathBuf,
    out: BufWriter<NamedTempFile>,
    written: usize,
}

impl TraceWriter {
    pub fn create(path: &Path) -> std::result::Result<Self, TraceError> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let tmp = NamedTempFile::new_in(&dir).map_err(|source| TraceError::Open {
            path: dir.clone(),
            source,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            out: BufWriter::new(tmp),
            written: 0,
        })
    }

    pub fn written(&self) -> usize {
        self.written
    }

    /// Flush and publish the output. Returns the number of transactions.
    pub fn finish(self) -> std::result::Result<usize, TraceError> {
        let path = self.path;
        let persist_err = |source: std::io::Error| TraceError::Persist {
            path: path.clone(),
            source,
        };
        let tmp = self
            .out
            .into_inner()
            .map_err(|e| persist_err(e.into_error()))?;
        tmp.as_file().sync_all().map_err(persist_err)?;
        tmp.persist(&path).map_err(|e| persist_err(e.error))?;
        debug!(path = %path.display(), transactions = self.written, "published trace");
        Ok(self.written)
    }
}

impl TraceSink for TraceWriter {
    fn write_transaction(&mut self, txn: &TransactionTrace) -> Result<()> {
        serde_json::to_writer(&mut self.out, txn).map_err(|source| TraceError::Encode {
            txn_id: txn.id,
            source,
        })?;
        self.out.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }
}

/// Write an in-memory trace to `path` atomically.
pub fn write_trace(path: &Path, trace: &Trace) -> Result<usize> {
    let mut writer = TraceWriter::create(path)?;
    for txn in trace.iter() {
        writer.write_transaction(txn)?;
    }
    Ok(writer.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::{ParamValue, QueryTrace};
    use std::io::Cursor;
    use tempfile::tempdir;

    #[test]
    fn reader_skips_blank_lines_and_reports_line_numbers() {
        let input = "{\"id\":1,\"procedure\":\"a\",\"params\":[1]}\n\n{\"id\":2,\"procedure\":\"b\"}\nnot json\n";
        let mut reader = TraceReader::new(Cursor::new(input));

        let first = reader.next().unwrap().unwrap();
        assert_eq!(first.params, vec![ParamValue::Int(1)]);
        let second = reader.next().unwrap().unwrap();
        assert_eq!(second.procedure, "b");
        assert!(second.queries.is_empty());

        match reader.next().unwrap() {
            Err(TraceError::Parse { line, .. }) => assert_eq!(line, 4),
            other => panic!("expected parse error, got {:?}", other),
        }
        assert!(reader.next().is_none());
    }

    #[test]
    fn writer_publishes_on_finish() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.trace");
        let trace = Trace::new(vec![TransactionTrace::new(1, "p", vec![ParamValue::Int(3)])
            .with_query(QueryTrace::new(2, "s", vec![]))]);

        assert_eq!(write_trace(&path, &trace).unwrap(), 1);
        assert_eq!(load_trace(&path).unwrap(), trace);
    }

    #[test]
    fn unfinished_writer_leaves_no_output() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.trace");
        {
            let mut writer = TraceWriter::create(&path).unwrap();
            writer
                .write_transaction(&TransactionTrace::new(1, "p", vec![]))
                .unwrap();
            assert_eq!(writer.written(), 1);
        }
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}

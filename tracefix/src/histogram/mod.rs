use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

pub mod reporter;
pub use reporter::HistogramReporter;

/// Frequency counter over integer values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Histogram {
    counts: BTreeMap<i64, u64>,
    total: u64,
}

impl Histogram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, value: i64) {
        *self.counts.entry(value).or_insert(0) += 1;
        self.total += 1;
    }

    pub fn count(&self, value: i64) -> u64 {
        self.counts.get(&value).copied().unwrap_or(0)
    }

    /// Sum of all counts.
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Number of distinct values seen.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (i64, u64)> + '_ {
        self.counts.iter().map(|(&v, &c)| (v, c))
    }

    /// Write raw counts, one `value count` pair per line, preceded by an
    /// optional `# min` header.
    pub fn save(&self, path: &Path, minimum: Option<i64>) -> std::io::Result<()> {
        let mut out = BufWriter::new(fs::File::create(path)?);
        if let Some(min) = minimum {
            writeln!(out, "# min {}", min)?;
        }
        for (value, count) in self.iter() {
            writeln!(out, "{} {}", value, count)?;
        }
        out.flush()
    }
}

impl fmt::Display for Histogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "<empty>");
        }
        let width = self.counts.keys().map(|v| v.to_string().len()).max().unwrap_or(1);
        for (value, count) in self.iter() {
            writeln!(f, "{:>width$}: {}", value, count, width = width)?;
        }
        Ok(())
    }
}

/// One histogram per origin key (warehouse or partition).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HistogramSet {
    histograms: BTreeMap<i64, Histogram>,
    minimums: BTreeMap<i64, i64>,
}

impl HistogramSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure `origin` has a histogram, even if nothing is recorded.
    pub fn ensure(&mut self, origin: i64) -> &mut Histogram {
        self.histograms.entry(origin).or_default()
    }

    pub fn record(&mut self, origin: i64, value: i64) {
        self.ensure(origin).record(value);
    }

    /// Attach the lower bound of the distribution that fed `origin`.
    pub fn set_minimum(&mut self, origin: i64, minimum: i64) {
        self.minimums.insert(origin, minimum);
    }

    pub fn minimum(&self, origin: i64) -> Option<i64> {
        self.minimums.get(&origin).copied()
    }

    pub fn get(&self, origin: i64) -> Option<&Histogram> {
        self.histograms.get(&origin)
    }

    pub fn len(&self) -> usize {
        self.histograms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.histograms.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (i64, &Histogram)> + '_ {
        self.histograms.iter().map(|(&k, h)| (k, h))
    }

    /// Write `<dir>/<origin>.hist` for every origin key.
    pub fn persist(&self, dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        fs::create_dir_all(dir)?;
        let mut written = Vec::with_capacity(self.histograms.len());
        for (origin, histogram) in self.iter() {
            let path = dir.join(format!("{}.hist", origin));
            histogram.save(&path, self.minimum(origin))?;
            written.push(path);
        }
        Ok(written)
    }
}

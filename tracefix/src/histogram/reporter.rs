use std::fmt::Write as _;
use std::path::Path;

use tracing::{debug, info};

use super::{Histogram, HistogramSet};

/// Formats histograms for logs and CSV export.
pub struct HistogramReporter;

impl HistogramReporter {
    /// Render every origin with its distribution minimum, as a single block.
    pub fn render(title: &str, set: &HistogramSet) -> String {
        let mut buffer = String::new();
        let _ = writeln!(buffer, "{}:", title);
        for (origin, histogram) in set.iter() {
            match set.minimum(origin) {
                Some(min) => {
                    let _ = writeln!(buffer, "Origin: {} [{}] total={}", origin, min, histogram.total());
                }
                None => {
                    let _ = writeln!(buffer, "Origin: {} total={}", origin, histogram.total());
                }
            }
            let _ = writeln!(buffer, "{}", histogram);
        }
        buffer
    }

    pub fn log_set(title: &str, set: &HistogramSet) {
        info!(origins = set.len(), "{}", title);
        debug!("\n{}", Self::render(title, set));
    }

    pub fn log_single(title: &str, histogram: &Histogram) {
        info!(distinct = histogram.len(), total = histogram.total(), "{}", title);
        debug!("\n{}", histogram);
    }

    /// Export as `origin,value,count` rows. `label` names the origin column
    /// for a standalone histogram.
    pub fn write_csv(
        path: &Path,
        set: Option<&HistogramSet>,
        single: Option<(&str, &Histogram)>,
    ) -> Result<(), csv::Error> {
        let mut wtr = csv::Writer::from_path(path)?;
        wtr.write_record(["origin", "value", "count"])?;

        if let Some(set) = set {
            for (origin, histogram) in set.iter() {
                for (value, count) in histogram.iter() {
                    wtr.write_record(&[origin.to_string(), value.to_string(), count.to_string()])?;
                }
            }
        }
        if let Some((label, histogram)) = single {
            for (value, count) in histogram.iter() {
                wtr.write_record(&[label.to_string(), value.to_string(), count.to_string()])?;
            }
        }
        wtr.flush()?;
        Ok(())
    }
}

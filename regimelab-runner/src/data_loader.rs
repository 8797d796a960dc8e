//! Bar loading for the runner.
//!
//! Each instrument lives in its own CSV file with a
//! `date,open,high,low,close,volume` header and ISO-8601 dates. Files are
//! either named by `[[instruments]]` entries in the config (`<symbol>.csv`)
//! or discovered from a directory, in which case the file stem becomes the
//! symbol and ids are assigned in sorted file order.
//!
//! Synthetic series are a developer-only mode for trying the pipeline
//! without data; they are deterministic per symbol.

use std::path::{Path, PathBuf};

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use regimelab_core::domain::{Bar, Instrument, PriceSeries, SeriesError};

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("{path}: row {row}: {reason}")]
    InvalidRow {
        path: String,
        row: usize,
        reason: String,
    },

    #[error("{path} contains no bars")]
    Empty { path: String },

    #[error("{path}: {source}")]
    Series {
        path: String,
        #[source]
        source: SeriesError,
    },

    #[error("no CSV files in {0}")]
    NoFiles(String),
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    date: NaiveDate,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    /// Some exports write volume with a decimal point.
    volume: f64,
}

/// Load one instrument's bars from a CSV file.
pub fn load_series(path: &Path, instrument: Instrument) -> Result<PriceSeries, LoadError> {
    let shown = path.display().to_string();
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: shown.clone(),
        source,
    })?;
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(file);

    let mut bars = Vec::new();
    for (i, row) in reader.deserialize::<CsvRow>().enumerate() {
        let row = row.map_err(|source| LoadError::Csv {
            path: shown.clone(),
            source,
        })?;
        if !(row.close.is_finite() && row.close > 0.0) {
            return Err(LoadError::InvalidRow {
                path: shown,
                // header is line 1
                row: i + 2,
                reason: format!("close must be a positive number, got {}", row.close),
            });
        }
        bars.push(Bar {
            date: row.date,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume.max(0.0) as u64,
        });
    }
    if bars.is_empty() {
        return Err(LoadError::Empty { path: shown });
    }

    debug!(symbol = %instrument.symbol, bars = bars.len(), path = %shown, "loaded bars");
    PriceSeries::new(instrument, bars).map_err(|source| LoadError::Series {
        path: shown,
        source,
    })
}

/// CSV files directly inside `dir`, sorted by name.
pub fn discover_csv_files(dir: &Path) -> Result<Vec<PathBuf>, LoadError> {
    let io_err = |source| LoadError::Io {
        path: dir.display().to_string(),
        source,
    };
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        let is_csv = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
        if path.is_file() && is_csv {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Load every instrument's series from `dir`.
///
/// With `instruments` empty, every CSV file in `dir` is loaded and named by
/// its stem. Otherwise each instrument is read from `<dir>/<symbol>.csv`.
pub fn load_universe(dir: &Path, instruments: &[Instrument]) -> Result<Vec<PriceSeries>, LoadError> {
    if !instruments.is_empty() {
        return instruments
            .iter()
            .map(|instrument| {
                let path = dir.join(format!("{}.csv", instrument.symbol));
                load_series(&path, instrument.clone())
            })
            .collect();
    }

    let files = discover_csv_files(dir)?;
    if files.is_empty() {
        return Err(LoadError::NoFiles(dir.display().to_string()));
    }
    files
        .iter()
        .enumerate()
        .map(|(i, path)| {
            let symbol = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            load_series(path, Instrument::new(i as u32, symbol))
        })
        .collect()
}

/// BLAKE3 hex digest over every instrument's bars.
///
/// Instruments are hashed in symbol order, so the digest does not depend on
/// load order.
pub fn dataset_hash(universe: &[PriceSeries]) -> String {
    let mut hasher = blake3::Hasher::new();

    let mut ordered: Vec<&PriceSeries> = universe.iter().collect();
    ordered.sort_by(|a, b| a.instrument.symbol.cmp(&b.instrument.symbol));

    for series in ordered {
        hasher.update(series.instrument.symbol.as_bytes());
        for bar in series.bars() {
            hasher.update(bar.date.to_string().as_bytes());
            hasher.update(&bar.open.to_le_bytes());
            hasher.update(&bar.high.to_le_bytes());
            hasher.update(&bar.low.to_le_bytes());
            hasher.update(&bar.close.to_le_bytes());
            hasher.update(&bar.volume.to_le_bytes());
        }
    }

    hasher.finalize().to_hex().to_string()
}

/// A deterministic random-walk series of `days` weekdays starting at `start`.
///
/// The generator is seeded from the symbol, so the same symbol always
/// yields the same bars.
pub fn synthetic_series(
    instrument: Instrument,
    start: NaiveDate,
    days: usize,
) -> Result<PriceSeries, SeriesError> {
    let seed: [u8; 32] = *blake3::hash(instrument.symbol.as_bytes()).as_bytes();
    let mut rng = StdRng::from_seed(seed);

    let mut bars = Vec::with_capacity(days);
    let mut price = 100.0_f64;
    let mut current = start;
    while bars.len() < days {
        if matches!(current.weekday(), Weekday::Sat | Weekday::Sun) {
            current += Duration::days(1);
            continue;
        }
        let daily_return: f64 = rng.gen_range(-0.03..0.03);
        let open = price;
        let close = price * (1.0 + daily_return);
        bars.push(Bar {
            date: current,
            open,
            high: open.max(close) * (1.0 + rng.gen_range(0.0..0.01)),
            low: open.min(close) * (1.0 - rng.gen_range(0.0..0.01)),
            close,
            volume: rng.gen_range(100_000..10_000_000),
        });
        price = close;
        current += Duration::days(1);
    }

    PriceSeries::new(instrument, bars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        path
    }

    const GOOD: &str = "date,open,high,low,close,volume\n\
        2024-01-02,100,101,99,100.5,1000\n\
        2024-01-03,100.5,102,100,101.5,1200.0\n\
        2024-01-04, 101.5 , 103 , 101 , 102 , 900\n";

    #[test]
    fn loads_bars_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "AAA.csv", GOOD);
        let series = load_series(&path, Instrument::new(0, "AAA")).unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.closes(), vec![100.5, 101.5, 102.0]);
        assert_eq!(series.bars()[1].volume, 1200);
        assert_eq!(series.dates()[0], NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
    }

    #[test]
    fn loads_under_debug_subscriber_and_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "AAA.csv", GOOD);
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .finish();
        let series = tracing::subscriber::with_default(subscriber, || {
            load_series(&path, Instrument::new(0, "AAA"))
        })
        .unwrap();
        assert_eq!(series.len(), 3);

        let missing = dir.path().join("NOPE.csv");
        match load_series(&missing, Instrument::new(1, "NOPE")).unwrap_err() {
            LoadError::Io { path: shown, .. } => assert_eq!(shown, missing.display().to_string()),
            other => panic!("unexpected {other}"),
        }
    }

    #[test]
    fn rejects_unsorted_dates() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            dir.path(),
            "BAD.csv",
            "date,open,high,low,close,volume\n2024-01-03,1,1,1,1,1\n2024-01-02,1,1,1,1,1\n",
        );
        let err = load_series(&path, Instrument::new(0, "BAD")).unwrap_err();
        assert!(matches!(err, LoadError::Series { .. }), "{err}");
    }

    #[test]
    fn rejects_non_positive_close() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            dir.path(),
            "Z.csv",
            "date,open,high,low,close,volume\n2024-01-02,1,1,1,1,1\n2024-01-03,1,1,1,0,1\n",
        );
        match load_series(&path, Instrument::new(0, "Z")).unwrap_err() {
            LoadError::InvalidRow { row, .. } => assert_eq!(row, 3),
            other => panic!("unexpected {other}"),
        }
    }

    #[test]
    fn empty_and_malformed_files() {
        let dir = tempfile::tempdir().unwrap();
        let empty = write_csv(dir.path(), "E.csv", "date,open,high,low,close,volume\n");
        assert!(matches!(
            load_series(&empty, Instrument::new(0, "E")),
            Err(LoadError::Empty { .. })
        ));
        let malformed = write_csv(dir.path(), "M.csv", "date,open,high,low,close,volume\nyesterday,1,1,1,1,1\n");
        assert!(matches!(
            load_series(&malformed, Instrument::new(0, "M")),
            Err(LoadError::Csv { .. })
        ));
    }

    #[test]
    fn discovers_csv_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(dir.path(), "bbb.csv", GOOD);
        write_csv(dir.path(), "aaa.CSV", GOOD);
        write_csv(dir.path(), "notes.txt", "ignore me");
        let universe = load_universe(dir.path(), &[]).unwrap();
        let symbols: Vec<_> = universe.iter().map(|s| s.instrument.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["aaa", "bbb"]);
        assert_eq!(universe[1].instrument.id, 1);
    }

    #[test]
    fn configured_instruments_keep_metadata() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(dir.path(), "AAA.csv", GOOD);
        let instrument = Instrument {
            sector: "Energy".into(),
            fund: "Fund A".into(),
            ..Instrument::new(42, "AAA")
        };
        let universe = load_universe(dir.path(), &[instrument.clone()]).unwrap();
        assert_eq!(universe[0].instrument, instrument);

        let err = load_universe(dir.path(), &[Instrument::new(1, "MISSING")]).unwrap_err();
        assert!(err.to_string().contains("MISSING.csv"));
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(load_universe(dir.path(), &[]), Err(LoadError::NoFiles(_))));
    }

    #[test]
    fn dataset_hash_ignores_load_order() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let a = synthetic_series(Instrument::new(0, "A"), start, 30).unwrap();
        let b = synthetic_series(Instrument::new(1, "B"), start, 30).unwrap();
        let h1 = dataset_hash(&[a.clone(), b.clone()]);
        let h2 = dataset_hash(&[b, a.clone()]);
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
        assert_ne!(h1, dataset_hash(&[a]));
    }

    #[test]
    fn synthetic_series_is_deterministic_weekday_only() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 6).unwrap(); // a Saturday
        let a = synthetic_series(Instrument::new(0, "SYN"), start, 40).unwrap();
        let b = synthetic_series(Instrument::new(0, "SYN"), start, 40).unwrap();
        assert_eq!(a.closes(), b.closes());
        assert_eq!(a.len(), 40);
        assert!(a
            .dates()
            .iter()
            .all(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun)));
        let other = synthetic_series(Instrument::new(0, "OTHER"), start, 40).unwrap();
        assert_ne!(a.closes(), other.closes());
    }
}

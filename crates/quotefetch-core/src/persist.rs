//! Flat-file dumps of series, collections and symbol lists.
//!
//! Every writer takes an optional path and falls back to the conventional
//! file name in the working directory. The path actually written is returned.

use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{debug, warn};

use crate::codec::{
    decode_collection_json, decode_delimited, decode_delimited_multi, decode_json,
    encode_charting_json, encode_charting_json_collection, encode_collection_json, encode_json,
    Decoded, DelimitedFormat,
};
use crate::data_source::{SourceError, SymbolDirectory};
use crate::{BarSeries, CoreError, Market, SeriesCollection, ValidationError};

/// Serialization used for a dump file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    Csv,
    Json,
    /// Charting-library array dialect.
    Highstock,
}

impl OutputFormat {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
            Self::Highstock => "highstock",
        }
    }

    pub const fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json | Self::Highstock => "json",
        }
    }
}

impl Display for OutputFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            "highstock" | "hs" => Ok(Self::Highstock),
            _ => Err(ValidationError::InvalidFormat {
                value: value.to_owned(),
            }),
        }
    }
}

/// Layout knobs that do not change the format itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DumpLayout {
    pub json_indent: bool,
    pub fractional_volume: bool,
}

pub fn write_series(
    path: Option<&Path>,
    series: &BarSeries,
    format: OutputFormat,
) -> Result<PathBuf, CoreError> {
    write_series_with(path, series, format, DumpLayout::default())
}

/// Writes one series. The default name is `{symbol}.{ext}`, or `quote.{ext}`
/// when the series has no symbol.
pub fn write_series_with(
    path: Option<&Path>,
    series: &BarSeries,
    format: OutputFormat,
    layout: DumpLayout,
) -> Result<PathBuf, CoreError> {
    let target = path.map_or_else(|| default_series_path(series, format), Path::to_path_buf);
    let text = match format {
        OutputFormat::Csv => delimited(layout).encode(series),
        OutputFormat::Json => encode_json(series, layout.json_indent)?,
        OutputFormat::Highstock => encode_charting_json(series),
    };
    write_text(&target, &text)?;
    Ok(target)
}

pub fn write_collection(
    path: Option<&Path>,
    collection: &SeriesCollection,
    format: OutputFormat,
) -> Result<PathBuf, CoreError> {
    write_collection_with(path, collection, format, DumpLayout::default())
}

/// Writes a collection. The default name is `quotes.{ext}`; delimited output
/// carries a leading symbol column.
pub fn write_collection_with(
    path: Option<&Path>,
    collection: &SeriesCollection,
    format: OutputFormat,
    layout: DumpLayout,
) -> Result<PathBuf, CoreError> {
    let target = path.map_or_else(
        || PathBuf::from(format!("quotes.{}", format.extension())),
        Path::to_path_buf,
    );
    let text = match format {
        OutputFormat::Csv => delimited(layout).encode_collection(collection),
        OutputFormat::Json => encode_collection_json(collection, layout.json_indent)?,
        OutputFormat::Highstock => encode_charting_json_collection(collection),
    };
    write_text(&target, &text)?;
    Ok(target)
}

pub fn read_series_csv(symbol: &str, path: &Path) -> Result<Decoded<BarSeries>, CoreError> {
    Ok(decode_delimited(symbol, &fs::read_to_string(path)?)?)
}

pub fn read_series_json(path: &Path) -> Result<Decoded<BarSeries>, CoreError> {
    Ok(decode_json(&fs::read_to_string(path)?)?)
}

pub fn read_collection_csv(path: &Path) -> Result<Decoded<SeriesCollection>, CoreError> {
    Ok(decode_delimited_multi(&fs::read_to_string(path)?)?)
}

pub fn read_collection_json(path: &Path) -> Result<Decoded<SeriesCollection>, CoreError> {
    Ok(decode_collection_json(&fs::read_to_string(path)?)?)
}

/// Newline-joined tickers, no trailing newline.
pub fn write_symbols<S: AsRef<str>>(path: &Path, symbols: &[S]) -> Result<(), CoreError> {
    let text = symbols
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join("\n");
    write_text(path, &text)
}

/// Lower-cased, trimmed tickers with blank lines skipped.
pub fn read_symbols(path: &Path) -> Result<Vec<String>, CoreError> {
    let text = fs::read_to_string(path)?;
    Ok(text
        .lines()
        .map(|line| line.trim().to_ascii_lowercase())
        .filter(|line| !line.is_empty())
        .collect())
}

/// Lists `market` and writes it as a symbols file, `{market}.txt` by default.
pub async fn write_market_file(
    directory: &dyn SymbolDirectory,
    market: Market,
    path: Option<&Path>,
) -> Result<PathBuf, CoreError> {
    let target = path.map_or_else(|| PathBuf::from(market.default_file_name()), Path::to_path_buf);
    let symbols = directory.list(market).await?;
    write_symbols(&target, &symbols)?;
    Ok(target)
}

/// Result of dumping every market into one directory.
#[derive(Debug, Default)]
pub struct MarketDump {
    pub written: Vec<PathBuf>,
    pub failures: Vec<(Market, SourceError)>,
}

/// Writes `{market}.txt` under `out_dir` for every market the directory
/// serves. A market that fails to list is logged and skipped.
pub async fn write_all_market_files(
    directory: &dyn SymbolDirectory,
    out_dir: &Path,
) -> Result<MarketDump, CoreError> {
    let mut dump = MarketDump::default();
    for &market in directory.markets() {
        match directory.list(market).await {
            Ok(symbols) => {
                let target = out_dir.join(market.default_file_name());
                write_symbols(&target, &symbols)?;
                dump.written.push(target);
            }
            Err(error) => {
                warn!(%market, code = error.code(), error = %error.message(), "market listing failed");
                dump.failures.push((market, error));
            }
        }
    }
    Ok(dump)
}

fn delimited(layout: DumpLayout) -> DelimitedFormat {
    let format = DelimitedFormat::default();
    if layout.fractional_volume {
        format.fractional_volume()
    } else {
        format
    }
}

fn default_series_path(series: &BarSeries, format: OutputFormat) -> PathBuf {
    let stem = if series.symbol.is_empty() {
        "quote"
    } else {
        series.symbol.as_str()
    };
    PathBuf::from(format!("{stem}.{}", format.extension()))
}

fn write_text(path: &Path, text: &str) -> Result<(), CoreError> {
    debug!(path = %path.display(), bytes = text.len(), "writing dump");
    fs::write(path, text)?;
    Ok(())
}

use std::fmt::Write as _;

use csv::{ReaderBuilder, StringRecord, Trim};
use indexmap::IndexMap;

use super::{CodecError, Decoded, FieldReader, ParseMode};
use crate::{Bar, BarSeries, SeriesCollection};

const HEADER: &str = "datetime,open,high,low,close,volume";
const BAR_FIELDS: usize = 6;
const SYMBOL_ROW_FIELDS: usize = BAR_FIELDS + 1;
const HEADER_MARKERS: [&str; 3] = ["datetime", "date", "symbol"];

/// Layout options for delimited output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelimitedFormat {
    pub include_header: bool,
    pub include_symbol_column: bool,
    /// Write volume with six decimals instead of as a whole number.
    pub fractional_volume: bool,
}

impl Default for DelimitedFormat {
    fn default() -> Self {
        Self {
            include_header: true,
            include_symbol_column: false,
            fractional_volume: false,
        }
    }
}

impl DelimitedFormat {
    pub fn new(include_header: bool, include_symbol_column: bool) -> Self {
        Self {
            include_header,
            include_symbol_column,
            fractional_volume: false,
        }
    }

    pub fn fractional_volume(mut self) -> Self {
        self.fractional_volume = true;
        self
    }

    pub fn encode(&self, series: &BarSeries) -> String {
        let mut out = String::with_capacity(64 * (series.len() + 1));
        self.write_header(&mut out);
        self.write_rows(&mut out, series);
        out
    }

    /// Encodes every series under a single header. The symbol column is
    /// always written so the output can be regrouped.
    pub fn encode_collection(&self, collection: &SeriesCollection) -> String {
        let format = Self {
            include_symbol_column: true,
            ..*self
        };
        let rows: usize = collection.iter().map(BarSeries::len).sum();
        let mut out = String::with_capacity(72 * (rows + 1));
        format.write_header(&mut out);
        for series in collection {
            format.write_rows(&mut out, series);
        }
        out
    }

    fn write_header(&self, out: &mut String) {
        if !self.include_header {
            return;
        }
        if self.include_symbol_column {
            out.push_str("symbol,");
        }
        out.push_str(HEADER);
        out.push('\n');
    }

    fn write_rows(&self, out: &mut String, series: &BarSeries) {
        for bar in &series.bars {
            if self.include_symbol_column {
                out.push_str(&series.symbol);
                out.push(',');
            }
            // Writing into a String cannot fail.
            let _ = write!(
                out,
                "{},{:.2},{:.2},{:.2},{:.2},",
                bar.timestamp.format_minutes(),
                bar.open,
                bar.high,
                bar.low,
                bar.close
            );
            let _ = if self.fractional_volume {
                writeln!(out, "{:.6}", bar.volume)
            } else {
                writeln!(out, "{:.0}", bar.volume)
            };
        }
    }
}

/// One line per bar as `[symbol,]datetime,open,high,low,close,volume`.
pub fn encode_delimited(
    series: &BarSeries,
    include_header: bool,
    include_symbol_column: bool,
) -> String {
    DelimitedFormat::new(include_header, include_symbol_column).encode(series)
}

/// Decodes one series, ignoring a leading symbol column when present.
pub fn decode_delimited(symbol: &str, text: &str) -> Result<Decoded<BarSeries>, CodecError> {
    decode_delimited_with(symbol, text, ParseMode::Lenient)
}

pub fn decode_delimited_with(
    symbol: &str,
    text: &str,
    mode: ParseMode,
) -> Result<Decoded<BarSeries>, CodecError> {
    let records = read_records(text)?;
    let mut reader = FieldReader::new(mode);
    let mut series = BarSeries::with_capacity(symbol, records.len());

    for (row, record) in records {
        let offset = match record.len() {
            BAR_FIELDS => 0,
            SYMBOL_ROW_FIELDS => 1,
            found if found > SYMBOL_ROW_FIELDS => {
                return Err(CodecError::WideRecord {
                    row,
                    expected: SYMBOL_ROW_FIELDS,
                    found,
                })
            }
            found => {
                return Err(CodecError::ShortRecord {
                    row,
                    expected: BAR_FIELDS,
                    found,
                })
            }
        };
        reader.set_row(row);
        series.bars.push(read_bar(&mut reader, &record, offset)?);
    }

    Ok(Decoded {
        value: series,
        diagnostics: reader.finish(),
    })
}

/// Decodes symbol-prefixed rows into one series per distinct symbol, in
/// first-seen order.
pub fn decode_delimited_multi(text: &str) -> Result<Decoded<SeriesCollection>, CodecError> {
    decode_delimited_multi_with(text, ParseMode::Lenient)
}

pub fn decode_delimited_multi_with(
    text: &str,
    mode: ParseMode,
) -> Result<Decoded<SeriesCollection>, CodecError> {
    let records = read_records(text)?;
    let mut reader = FieldReader::new(mode);
    let mut groups: IndexMap<String, Vec<Bar>> = IndexMap::new();

    for (row, record) in records {
        if record.len() < SYMBOL_ROW_FIELDS {
            return Err(CodecError::ShortRecord {
                row,
                expected: SYMBOL_ROW_FIELDS,
                found: record.len(),
            });
        }
        if record.len() > SYMBOL_ROW_FIELDS {
            return Err(CodecError::WideRecord {
                row,
                expected: SYMBOL_ROW_FIELDS,
                found: record.len(),
            });
        }
        reader.set_row(row);
        let bar = read_bar(&mut reader, &record, 1)?;
        groups.entry(record[0].to_owned()).or_default().push(bar);
    }

    let value = groups
        .into_iter()
        .map(|(symbol, bars)| BarSeries::new(symbol, bars))
        .collect();

    Ok(Decoded {
        value,
        diagnostics: reader.finish(),
    })
}

/// Data records with their 1-based record numbers. A header is skipped.
fn read_records(text: &str) -> Result<Vec<(usize, StringRecord)>, CodecError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let mut records = Vec::new();
    for (index, result) in reader.records().enumerate() {
        let record = result?;
        if index == 0 && is_header(&record) {
            continue;
        }
        if record.iter().all(str::is_empty) {
            continue;
        }
        records.push((index + 1, record));
    }
    Ok(records)
}

fn is_header(record: &StringRecord) -> bool {
    record.get(0).is_some_and(|first| {
        HEADER_MARKERS
            .iter()
            .any(|marker| first.eq_ignore_ascii_case(marker))
    })
}

fn read_bar(
    reader: &mut FieldReader,
    record: &StringRecord,
    offset: usize,
) -> Result<Bar, CodecError> {
    let field = |index: usize| record.get(offset + index).unwrap_or_default();
    Ok(Bar::new(
        reader.minutes("datetime", field(0))?,
        reader.number("open", field(1))?,
        reader.number("high", field(2))?,
        reader.number("low", field(3))?,
        reader.number("close", field(4))?,
        reader.number("volume", field(5))?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::UtcDateTime;

    fn series() -> BarSeries {
        let ts = |raw: &str| UtcDateTime::parse_minutes(raw).expect("valid timestamp");
        BarSeries::new(
            "spy",
            vec![
                Bar::new(ts("2017-01-03 00:00"), 225.04, 225.83, 223.88, 225.24, 91_366_500.0),
                Bar::new(ts("2017-01-04 00:00"), 225.62, 226.75, 225.61, 226.58, 78_744_400.0),
            ],
        )
    }

    #[test]
    fn encodes_with_header_and_symbol_column() {
        let text = encode_delimited(&series(), true, true);
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("symbol,datetime,open,high,low,close,volume"));
        assert_eq!(
            lines.next(),
            Some("spy,2017-01-03 00:00,225.04,225.83,223.88,225.24,91366500")
        );
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn fractional_volume_keeps_six_decimals() {
        let mut fractional = series();
        fractional.bars.truncate(1);
        fractional.bars[0].volume = 0.125;

        let text = DelimitedFormat::default().fractional_volume().encode(&fractional);
        assert_eq!(
            text,
            "datetime,open,high,low,close,volume\n2017-01-03 00:00,225.04,225.83,223.88,225.24,0.125000\n"
        );
    }

    #[test]
    fn decode_skips_header_and_preserves_order() {
        let text = "Date,Open,High,Low,Close,Volume\n\
                    2017-01-04 00:00,2,2,2,2,20\n\
                    2017-01-03 00:00,1,1,1,1,10\n\n";
        let decoded = decode_delimited("spy", text).expect("decode");
        assert!(decoded.is_clean());
        let closes: Vec<f64> = decoded.value.bars.iter().map(|bar| bar.close).collect();
        assert_eq!(closes, vec![2.0, 1.0]);
    }

    #[test]
    fn decode_ignores_symbol_column() {
        let text = encode_delimited(&series(), false, true);
        let decoded = decode_delimited("other", &text).expect("decode");
        assert_eq!(decoded.value.symbol, "other");
        assert_eq!(decoded.value.bars, series().bars);
    }

    #[test]
    fn short_record_is_an_error_in_lenient_mode() {
        let err = decode_delimited("spy", "2017-01-03 00:00,1,1,1\n").expect_err("short");
        assert!(matches!(
            err,
            CodecError::ShortRecord {
                row: 1,
                expected: 6,
                found: 4
            }
        ));
    }

    #[test]
    fn extra_columns_are_rejected() {
        let err = decode_delimited("spy", "spy,2017-01-03 00:00,1,1,1,1,10,extra\n")
            .expect_err("eight fields");
        assert!(matches!(
            err,
            CodecError::WideRecord {
                row: 1,
                expected: 7,
                found: 8
            }
        ));

        let err = decode_delimited_multi("spy,2017-01-03 00:00,1,1,1,1,10,extra\n")
            .expect_err("eight fields");
        assert!(matches!(err, CodecError::WideRecord { found: 8, .. }));
    }

    #[test]
    fn strict_mode_rejects_bad_numbers() {
        let text = "2017-01-03 00:00,1,x,1,1,10\n";
        let lenient = decode_delimited("spy", text).expect("lenient");
        assert_eq!(lenient.value.bars[0].high, 0.0);
        assert_eq!(lenient.diagnostics.len(), 1);
        assert_eq!(lenient.diagnostics[0].column, "high");

        let err = decode_delimited_with("spy", text, ParseMode::Strict).expect_err("strict");
        assert!(matches!(err, CodecError::Field { .. }));
    }

    #[test]
    fn multi_decode_groups_by_symbol_in_encounter_order() {
        let text = "symbol,datetime,open,high,low,close,volume\n\
                    spy,2017-01-03 00:00,1,1,1,1,10\n\
                    aapl,2017-01-03 00:00,5,5,5,5,50\n\
                    spy,2017-01-04 00:00,2,2,2,2,20\n";
        let decoded = decode_delimited_multi(text).expect("decode");
        assert_eq!(decoded.value.symbols(), vec!["spy", "aapl"]);
        assert_eq!(decoded.value.get("spy").map(BarSeries::len), Some(2));
    }
}

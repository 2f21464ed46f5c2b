use std::fmt::Write as _;

use crate::{BarSeries, SeriesCollection};

/// Array-of-tuples dialect read by stock charting libraries:
/// `[ms, open, high, low, close, volume]` per bar.
pub fn encode_charting_json(series: &BarSeries) -> String {
    let mut out = String::with_capacity(64 * (series.len() + 1));
    out.push_str("[\n");
    write_tuples(&mut out, series);
    out.push_str("]\n");
    out
}

/// Object keyed by symbol, one tuple array per series.
pub fn encode_charting_json_collection(collection: &SeriesCollection) -> String {
    let mut out = String::from("{");
    let count = collection.len();
    for (index, series) in collection.iter().enumerate() {
        // Symbols are plain tickers; serde handles any quoting they need.
        let key = serde_json::to_string(&series.symbol).unwrap_or_else(|_| String::from("\"\""));
        let _ = writeln!(out, "{key}:[");
        write_tuples(&mut out, series);
        out.push_str(if index + 1 < count { "],\n" } else { "]\n" });
    }
    out.push('}');
    out
}

fn write_tuples(out: &mut String, series: &BarSeries) {
    let last = series.len().saturating_sub(1);
    for (index, bar) in series.bars.iter().enumerate() {
        let _ = writeln!(
            out,
            "[{},{:.2},{:.2},{:.2},{:.2},{:.0}]{}",
            bar.timestamp.unix_millis(),
            bar.open,
            bar.high,
            bar.low,
            bar.close,
            bar.volume,
            if index == last { "" } else { "," }
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Bar, UtcDateTime};

    fn series(symbol: &str) -> BarSeries {
        let bar = |seconds: i64, close: f64| {
            let ts = UtcDateTime::from_unix_timestamp(seconds).expect("valid timestamp");
            Bar::new(ts, close, close, close, close, 1_000.0)
        };
        BarSeries::new(symbol, vec![bar(1_483_401_600, 1.0), bar(1_483_488_000, 2.5)])
    }

    #[test]
    fn single_series_has_no_trailing_comma() {
        assert_eq!(
            encode_charting_json(&series("spy")),
            "[\n[1483401600000,1.00,1.00,1.00,1.00,1000],\n[1483488000000,2.50,2.50,2.50,2.50,1000]\n]\n"
        );
    }

    #[test]
    fn collection_is_keyed_by_symbol() {
        let collection: SeriesCollection = vec![series("spy"), series("aapl")].into();
        let text = encode_charting_json_collection(&collection);
        assert!(text.starts_with("{\"spy\":[\n"));
        assert!(text.contains("],\n\"aapl\":[\n"));
        assert!(text.ends_with("]\n}"));

        let parsed: serde_json::Value = serde_json::from_str(&text).expect("valid json");
        assert_eq!(parsed["aapl"][1][4], serde_json::json!(2.5));
    }

    #[test]
    fn empty_series_renders_empty_array() {
        let empty = BarSeries::new("spy", Vec::new());
        assert_eq!(encode_charting_json(&empty), "[\n]\n");
    }
}

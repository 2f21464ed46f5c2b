use serde::Deserialize;

use super::{CodecError, Decoded, FieldReader, ParseMode};
use crate::{Bar, BarSeries, SeriesCollection};

/// Wire shape with the timestamp left as text so it can be parsed leniently.
#[derive(Debug, Deserialize)]
struct RawBar {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

#[derive(Debug, Deserialize)]
struct RawSeries {
    symbol: String,
    #[serde(default)]
    bars: Vec<RawBar>,
}

impl RawSeries {
    fn into_series(self, reader: &mut FieldReader) -> Result<BarSeries, CodecError> {
        let mut series = BarSeries::with_capacity(self.symbol, self.bars.len());
        for (index, raw) in self.bars.into_iter().enumerate() {
            reader.set_row(index + 1);
            series.bars.push(Bar::new(
                reader.rfc3339("timestamp", &raw.timestamp)?,
                raw.open,
                raw.high,
                raw.low,
                raw.close,
                raw.volume,
            ));
        }
        Ok(series)
    }
}

pub fn encode_json(series: &BarSeries, indent: bool) -> Result<String, CodecError> {
    let text = if indent {
        serde_json::to_string_pretty(series)?
    } else {
        serde_json::to_string(series)?
    };
    Ok(text)
}

pub fn decode_json(text: &str) -> Result<Decoded<BarSeries>, CodecError> {
    decode_json_with(text, ParseMode::Lenient)
}

pub fn decode_json_with(text: &str, mode: ParseMode) -> Result<Decoded<BarSeries>, CodecError> {
    let raw: RawSeries = serde_json::from_str(text)?;
    let mut reader = FieldReader::new(mode);
    let value = raw.into_series(&mut reader)?;
    Ok(Decoded {
        value,
        diagnostics: reader.finish(),
    })
}

pub fn encode_collection_json(
    collection: &SeriesCollection,
    indent: bool,
) -> Result<String, CodecError> {
    let text = if indent {
        serde_json::to_string_pretty(collection)?
    } else {
        serde_json::to_string(collection)?
    };
    Ok(text)
}

pub fn decode_collection_json(text: &str) -> Result<Decoded<SeriesCollection>, CodecError> {
    decode_collection_json_with(text, ParseMode::Lenient)
}

pub fn decode_collection_json_with(
    text: &str,
    mode: ParseMode,
) -> Result<Decoded<SeriesCollection>, CodecError> {
    let raw: Vec<RawSeries> = serde_json::from_str(text)?;
    let mut reader = FieldReader::new(mode);
    let value = raw
        .into_iter()
        .map(|series| series.into_series(&mut reader))
        .collect::<Result<SeriesCollection, _>>()?;
    Ok(Decoded {
        value,
        diagnostics: reader.finish(),
    })
}

//! Parses the daily rates XML document into currency records.

use crate::core::error::{Result, UpdateError};
use crate::core::models::CurrencyRecord;
use encoding_rs::{Encoding, UTF_8};
use quick_xml::Reader;
use quick_xml::events::Event;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashSet;
use std::str::FromStr;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct ValCurs {
    #[serde(rename = "@Date")]
    date: Option<String>,
    #[serde(rename = "Valute", default)]
    entries: Vec<Valute>,
}

#[derive(Debug, Deserialize)]
struct Valute {
    #[serde(rename = "NumCode")]
    num_code: Option<String>,
    #[serde(rename = "CharCode")]
    char_code: Option<String>,
    #[serde(rename = "Nominal")]
    nominal: Option<String>,
    #[serde(rename = "Name")]
    name: Option<String>,
    #[serde(rename = "Value")]
    value: Option<String>,
}

/// Parses a normalized feed. Any schema violation fails the whole document.
pub fn parse(data: &[u8]) -> Result<Vec<CurrencyRecord>> {
    let encoding = declared_encoding(data);
    let (text, _, had_errors) = encoding.decode(data);
    if had_errors {
        return Err(UpdateError::Parse(format!(
            "feed is not valid {}",
            encoding.name()
        )));
    }

    let document: ValCurs =
        quick_xml::de::from_str(&text).map_err(|e| UpdateError::Parse(e.to_string()))?;

    if document.entries.is_empty() {
        return Err(UpdateError::Parse("feed has no currency entries".to_string()));
    }

    let mut num_codes = HashSet::new();
    let mut char_codes = HashSet::new();
    let mut records = Vec::with_capacity(document.entries.len());

    for (position, entry) in document.entries.into_iter().enumerate() {
        let record = to_record(entry).map_err(|reason| {
            UpdateError::Parse(format!("entry #{}: {reason}", position + 1))
        })?;

        if !num_codes.insert(record.num_code.clone()) {
            return Err(UpdateError::Parse(format!(
                "duplicate numeric code {}",
                record.num_code
            )));
        }
        if !char_codes.insert(record.char_code.clone()) {
            return Err(UpdateError::Parse(format!(
                "duplicate character code {}",
                record.char_code
            )));
        }
        records.push(record);
    }

    debug!(feed_date = ?document.date, count = records.len(), "Parsed feed");
    Ok(records)
}

fn to_record(entry: Valute) -> std::result::Result<CurrencyRecord, String> {
    let num_code = required(entry.num_code, "NumCode")?;
    if !num_code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("NumCode '{num_code}' is not numeric"));
    }
    let char_code = required(entry.char_code, "CharCode")?;
    let name = required(entry.name, "Name")?;

    let nominal = required(entry.nominal, "Nominal")?;
    let multiplier: u32 = nominal
        .parse()
        .map_err(|_| format!("Nominal '{nominal}' is not an integer"))?;
    if multiplier == 0 {
        return Err("Nominal must be at least 1".to_string());
    }

    let value = required(entry.value, "Value")?;
    let value = Decimal::from_str(&value).map_err(|_| format!("Value '{value}' is not a number"))?;
    if value <= Decimal::ZERO {
        return Err(format!("Value {value} is not positive"));
    }

    Ok(CurrencyRecord {
        num_code,
        char_code,
        multiplier,
        name,
        value,
    })
}

fn required(field: Option<String>, tag: &str) -> std::result::Result<String, String> {
    field
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| format!("missing {tag}"))
}

/// Encoding named by the XML declaration, UTF-8 when absent or unknown.
fn declared_encoding(data: &[u8]) -> &'static Encoding {
    let mut reader = Reader::from_reader(data);
    let mut buf = Vec::new();
    match reader.read_event_into(&mut buf) {
        Ok(Event::Decl(decl)) => decl
            .encoding()
            .and_then(|label| label.ok())
            .and_then(|label| Encoding::for_label(&label))
            .unwrap_or(UTF_8),
        _ => UTF_8,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::normalize;

    /// A feed shaped like the real one, decimal commas included.
    pub(crate) const SAMPLE_FEED: &str = r#"<?xml version="1.0" encoding="windows-1251"?><ValCurs Date="16.10.2026" name="Foreign Currency Market"><Valute ID="R01010"><NumCode>036</NumCode><CharCode>AUD</CharCode><Nominal>1</Nominal><Name>Australian Dollar</Name><Value>52,1034</Value><VunitRate>52,1034</VunitRate></Valute><Valute ID="R01035"><NumCode>826</NumCode><CharCode>GBP</CharCode><Nominal>1</Nominal><Name>Pound Sterling</Name><Value>104,5521</Value><VunitRate>104,5521</VunitRate></Valute><Valute ID="R01375"><NumCode>156</NumCode><CharCode>CNY</CharCode><Nominal>10</Nominal><Name>Yuan Renminbi</Name><Value>110,9500</Value><VunitRate>11,095</VunitRate></Valute></ValCurs>"#;

    pub(crate) fn normalized(feed: &str) -> Vec<u8> {
        let mut data = feed.as_bytes().to_vec();
        normalize::repair(&mut data).unwrap();
        data
    }

    fn feed_with(entries: &str) -> Vec<u8> {
        let feed = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><ValCurs Date="16.10.2026" name="Foreign Currency Market">{entries}</ValCurs>"#
        );
        feed.into_bytes()
    }

    fn entry(num: &str, chr: &str, nominal: &str, value: &str) -> String {
        format!(
            "<Valute><NumCode>{num}</NumCode><CharCode>{chr}</CharCode><Nominal>{nominal}</Nominal><Name>Test</Name><Value>{value}</Value></Valute>"
        )
    }

    #[test]
    fn test_parse_sample_feed() {
        let records = parse(&normalized(SAMPLE_FEED)).unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].num_code, "036");
        assert_eq!(records[0].char_code, "AUD");
        assert_eq!(records[0].multiplier, 1);
        assert_eq!(records[0].name, "Australian Dollar");
        assert_eq!(records[0].value, Decimal::from_str("52.1034").unwrap());
        assert_eq!(records[2].char_code, "CNY");
        assert_eq!(records[2].multiplier, 10);
    }

    #[test]
    fn test_decimal_commas_are_rejected_without_repair() {
        let result = parse(SAMPLE_FEED.as_bytes());
        assert!(matches!(result, Err(UpdateError::Parse(_))));
    }

    #[test]
    fn test_windows_1251_names_are_decoded() {
        let (name, _, _) = encoding_rs::WINDOWS_1251.encode("Австралийский доллар");
        let mut data = br#"<?xml version="1.0" encoding="windows-1251"?><ValCurs><Valute><NumCode>036</NumCode><CharCode>AUD</CharCode><Nominal>1</Nominal><Name>"#.to_vec();
        data.extend_from_slice(&name);
        data.extend_from_slice(b"</Name><Value>52.1034</Value></Valute></ValCurs>");

        let records = parse(&data).unwrap();
        assert_eq!(records[0].name, "Австралийский доллар");
    }

    #[test]
    fn test_schema_violations_are_parse_errors() {
        let cases = [
            feed_with(""),
            feed_with(&entry("036", "AUD", "1", "abc")),
            feed_with(&entry("036", "AUD", "0", "52.1")),
            feed_with(&entry("036", "AUD", "x", "52.1")),
            feed_with(&entry("036", "AUD", "1", "-1.5")),
            feed_with(&entry("", "AUD", "1", "52.1")),
            feed_with(&entry("03A", "AUD", "1", "52.1")),
            feed_with(&entry("036", "", "1", "52.1")),
            feed_with(&format!(
                "{}{}",
                entry("036", "AUD", "1", "52.1"),
                entry("036", "USD", "1", "80.1")
            )),
            feed_with(&format!(
                "{}{}",
                entry("036", "AUD", "1", "52.1"),
                entry("840", "AUD", "1", "80.1")
            )),
            feed_with("<Valute><NumCode>036</NumCode><CharCode>AUD</CharCode><Nominal>1</Nominal><Name>Test</Name></Valute>"),
            b"<ValCurs><Valute>".to_vec(),
        ];

        for (i, case) in cases.iter().enumerate() {
            assert!(
                matches!(parse(case), Err(UpdateError::Parse(_))),
                "case {i} should fail: {}",
                String::from_utf8_lossy(case)
            );
        }
    }

    #[test]
    fn test_document_order_is_kept() {
        let data = feed_with(&format!(
            "{}{}{}",
            entry("978", "EUR", "1", "90.5"),
            entry("036", "AUD", "1", "52.1"),
            entry("840", "USD", "1", "80.1")
        ));
        let codes: Vec<_> = parse(&data)
            .unwrap()
            .into_iter()
            .map(|r| r.char_code)
            .collect();
        assert_eq!(codes, ["EUR", "AUD", "USD"]);
    }
}

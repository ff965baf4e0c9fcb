//! Line parsers
//!
//! A parser turns one decoded line into either a record for the sink or a
//! skip. Errors returned from [`RecordParser::parse_line`] are the
//! non-recoverable kind and abort the object being read.

use crate::config::{FormatKind, TableConfig};
use crate::error::MalformedRecord;
use crate::sink::Row;
use serde_json::{error::Category, Map, Value};

/// Parsing strategy for one source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordParser {
    /// One JSON object per line, stored verbatim
    JsonLine,
    /// Comma-delimited fields, exactly `width` per line
    Delimited { width: usize },
}

/// Result of parsing one line
#[derive(Debug)]
pub enum LineOutcome {
    Record(ParsedRecord),
    Skipped(SkipReason),
}

/// A decoded line, ready to become a sink row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedRecord {
    /// The original line text
    Raw(String),
    /// Fields aligned to the column schema
    Fields(Vec<String>),
}

impl ParsedRecord {
    /// Empty delimited fields become NULL
    pub fn into_row(self) -> Row {
        match self {
            ParsedRecord::Raw(line) => vec![Some(line)],
            ParsedRecord::Fields(fields) => fields
                .into_iter()
                .map(|field| if field.is_empty() { None } else { Some(field) })
                .collect(),
        }
    }
}

/// Why a line produced no record
#[derive(Debug)]
pub enum SkipReason {
    /// Not well-formed JSON
    MalformedJson(serde_json::Error),
    /// Nothing but whitespace
    Blank,
    /// Wrong number of delimited fields
    FieldCount { expected: usize, found: usize },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::MalformedJson(e) => write!(f, "can't parse line as JSON: {e}"),
            SkipReason::Blank => f.write_str("blank line"),
            SkipReason::FieldCount { expected, found } => {
                write!(f, "expected {expected} fields, found {found}")
            },
        }
    }
}

impl RecordParser {
    /// Pick the parser for a table's source format
    pub fn for_table(table: &TableConfig) -> Self {
        match table.source.format {
            FormatKind::Json => RecordParser::JsonLine,
            FormatKind::Csv => RecordParser::Delimited {
                width: table.columns.len(),
            },
        }
    }

    pub fn parse_line(&self, line: &[u8]) -> Result<LineOutcome, MalformedRecord> {
        match self {
            RecordParser::JsonLine => parse_json(line),
            RecordParser::Delimited { width } => parse_delimited(line, *width),
        }
    }
}

fn parse_json(line: &[u8]) -> Result<LineOutcome, MalformedRecord> {
    let text = std::str::from_utf8(line).map_err(MalformedRecord::Encoding)?;

    if text.trim().is_empty() {
        return Ok(LineOutcome::Skipped(SkipReason::Blank));
    }

    match serde_json::from_str::<Map<String, Value>>(text) {
        Ok(_) => Ok(LineOutcome::Record(ParsedRecord::Raw(text.to_string()))),
        Err(e) => match e.classify() {
            Category::Syntax | Category::Eof => Ok(LineOutcome::Skipped(SkipReason::MalformedJson(e))),
            Category::Data | Category::Io => Err(MalformedRecord::Json(e)),
        },
    }
}

fn parse_delimited(line: &[u8], width: usize) -> Result<LineOutcome, MalformedRecord> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(line);

    let mut record = csv::StringRecord::new();
    match reader.read_record(&mut record) {
        Ok(false) => Ok(LineOutcome::Skipped(SkipReason::Blank)),
        Ok(true) if record.len() != width => Ok(LineOutcome::Skipped(SkipReason::FieldCount {
            expected: width,
            found: record.len(),
        })),
        Ok(true) => Ok(LineOutcome::Record(ParsedRecord::Fields(
            record.iter().map(str::to_string).collect(),
        ))),
        Err(e) => Err(MalformedRecord::Csv(e)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::ColumnConfig;

    fn record(outcome: LineOutcome) -> ParsedRecord {
        match outcome {
            LineOutcome::Record(record) => record,
            LineOutcome::Skipped(reason) => panic!("line was skipped: {reason}"),
        }
    }

    fn skipped(outcome: LineOutcome) -> SkipReason {
        match outcome {
            LineOutcome::Skipped(reason) => reason,
            LineOutcome::Record(record) => panic!("line was parsed: {record:?}"),
        }
    }

    // ========================================================================
    // JSON lines
    // ========================================================================

    #[test]
    fn test_json_keeps_original_text() {
        let line = br#"{ "name":"Ana",  "dob" : "1990-01-01" }"#;
        let parsed = record(RecordParser::JsonLine.parse_line(line).unwrap());
        assert_eq!(
            parsed,
            ParsedRecord::Raw(r#"{ "name":"Ana",  "dob" : "1990-01-01" }"#.to_string())
        );
    }

    #[test]
    fn test_json_syntax_errors_are_skipped() {
        let reason = skipped(RecordParser::JsonLine.parse_line(b"{\"name\": ").unwrap());
        assert!(matches!(reason, SkipReason::MalformedJson(_)));

        let reason = skipped(RecordParser::JsonLine.parse_line(b"{oops}").unwrap());
        assert!(matches!(reason, SkipReason::MalformedJson(_)));

        let reason = skipped(RecordParser::JsonLine.parse_line(b"   ").unwrap());
        assert!(matches!(reason, SkipReason::Blank));
    }

    #[test]
    fn test_json_non_object_is_fatal() {
        let err = RecordParser::JsonLine.parse_line(b"[1, 2, 3]").unwrap_err();
        assert!(matches!(err, MalformedRecord::Json(_)));
    }

    #[test]
    fn test_json_invalid_utf8_is_fatal() {
        let err = RecordParser::JsonLine
            .parse_line(b"{\"name\": \"\xff\xfe\"}")
            .unwrap_err();
        assert!(matches!(err, MalformedRecord::Encoding(_)));
    }

    // ========================================================================
    // Delimited lines
    // ========================================================================

    #[test]
    fn test_delimited_fields_align_to_schema() {
        let parser = RecordParser::Delimited { width: 4 };
        let parsed = record(parser.parse_line(b"695,\"W 52 St, 11 Av\",,40.76").unwrap());
        assert_eq!(
            parsed,
            ParsedRecord::Fields(vec![
                "695".to_string(),
                "W 52 St, 11 Av".to_string(),
                String::new(),
                "40.76".to_string(),
            ])
        );
        assert_eq!(
            parsed.into_row(),
            vec![
                Some("695".to_string()),
                Some("W 52 St, 11 Av".to_string()),
                None,
                Some("40.76".to_string()),
            ]
        );
    }

    #[test]
    fn test_delimited_wrong_width_is_skipped() {
        let parser = RecordParser::Delimited { width: 4 };
        let reason = skipped(parser.parse_line(b"a,b,c").unwrap());
        assert!(matches!(
            reason,
            SkipReason::FieldCount {
                expected: 4,
                found: 3
            }
        ));

        let reason = skipped(parser.parse_line(b"a,b,c,d,e").unwrap());
        assert!(matches!(reason, SkipReason::FieldCount { found: 5, .. }));
    }

    #[test]
    fn test_delimited_empty_line_is_skipped() {
        let parser = RecordParser::Delimited { width: 2 };
        assert!(matches!(
            skipped(parser.parse_line(b"").unwrap()),
            SkipReason::Blank
        ));
    }

    #[test]
    fn test_delimited_invalid_utf8_is_fatal() {
        let parser = RecordParser::Delimited { width: 2 };
        let err = parser.parse_line(b"ok,\xff\xfe").unwrap_err();
        assert!(matches!(err, MalformedRecord::Csv(_)));
    }

    #[test]
    fn test_for_table() {
        let json = TableConfig::json("riders", "r/");
        assert_eq!(RecordParser::for_table(&json), RecordParser::JsonLine);

        let csv = TableConfig::csv(
            "trips",
            "t/",
            vec![ColumnConfig::text("a"), ColumnConfig::text("b")],
        );
        assert_eq!(RecordParser::for_table(&csv), RecordParser::Delimited { width: 2 });
    }

    #[test]
    fn test_raw_record_row() {
        let row = ParsedRecord::Raw("{}".to_string()).into_row();
        assert_eq!(row, vec![Some("{}".to_string())]);
    }
}

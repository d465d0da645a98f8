//! CSV loading: survey export -> response records

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::config::Config;
use crate::error::ParseError;
use crate::types::{clean_answer, ResponseRecord, QUESTIONS};

/// Column positions resolved from the header row
#[derive(Debug, Clone, PartialEq, Eq)]
struct Columns {
    timestamp: Option<usize>,
    name: usize,
    photo: usize,
}

fn find_column(headers: &csv::StringRecord, wanted: &str) -> Option<usize> {
    let wanted = wanted.trim();
    headers
        .iter()
        .position(|h| h.trim().trim_start_matches('\u{feff}').eq_ignore_ascii_case(wanted))
}

fn resolve_columns(headers: &csv::StringRecord, config: &Config) -> Result<Columns, ParseError> {
    let name = find_column(headers, &config.name_column)
        .ok_or_else(|| ParseError::MissingColumn(config.name_column.clone()))?;
    let photo = find_column(headers, &config.photo_column)
        .ok_or_else(|| ParseError::MissingColumn(config.photo_column.clone()))?;
    if photo <= name {
        return Err(ParseError::ColumnOrder {
            name: config.name_column.clone(),
            photo: config.photo_column.clone(),
        });
    }

    let found = photo - name - 1;
    if found != QUESTIONS.len() {
        return Err(ParseError::QuestionCountMismatch {
            expected: QUESTIONS.len(),
            found,
        });
    }

    Ok(Columns {
        timestamp: find_column(headers, &config.timestamp_column),
        name,
        photo,
    })
}

/// Parse responses from any reader. `path` is only used in error messages.
pub fn parse_responses<R: Read>(
    reader: R,
    path: &Path,
    config: &Config,
) -> Result<Vec<ResponseRecord>, ParseError> {
    let csv_err = |source| ParseError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(reader);

    let headers = rdr.headers().map_err(csv_err)?.clone();
    let columns = resolve_columns(&headers, config)?;

    let mut records = Vec::new();
    for (i, row) in rdr.records().enumerate() {
        let row = row.map_err(csv_err)?;
        let index = i + 1;

        if row.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }

        let cell = |col: usize| row.get(col).unwrap_or("").trim().to_string();

        let name = match cell(columns.name) {
            n if n.is_empty() => "Anonymous".to_string(),
            n => n,
        };
        let answers = (columns.name + 1..columns.photo)
            .map(|col| clean_answer(row.get(col).unwrap_or("")))
            .collect();

        records.push(ResponseRecord {
            index,
            timestamp: columns.timestamp.map(cell).unwrap_or_default(),
            name,
            answers,
            photo_url: cell(columns.photo),
        });
    }

    Ok(records)
}

/// Load all response records from the configured CSV file
pub fn load_responses(config: &Config) -> Result<Vec<ResponseRecord>, ParseError> {
    let path = config.csv.as_path();
    let file = File::open(path).map_err(|source| ParseError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_responses(file, path, config)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Header matching the default config
    pub(crate) fn header() -> String {
        let questions: Vec<String> = (1..=QUESTIONS.len()).map(|i| format!("Q{}", i)).collect();
        format!(
            "Timestamp,Full Name,{},Add a selfie or an old photo with him",
            questions.join(",")
        )
    }

    /// A CSV row with the given answers (missing trailing answers are empty)
    pub(crate) fn row(ts: &str, name: &str, answers: &[&str], photo: &str) -> String {
        let mut cells: Vec<String> = vec![ts.to_string(), name.to_string()];
        for i in 0..QUESTIONS.len() {
            let a = answers.get(i).copied().unwrap_or("");
            cells.push(format!("\"{}\"", a.replace('"', "\"\"")));
        }
        cells.push(photo.to_string());
        cells.join(",")
    }

    fn parse(csv: &str) -> Result<Vec<ResponseRecord>, ParseError> {
        parse_responses(csv.as_bytes(), Path::new("slam.csv"), &Config::default())
    }

    #[test]
    fn test_parses_example_row() {
        let csv = format!(
            "{}\n{}\n",
            header(),
            row(
                "2025/07/07 4:02:26 pm GMT+5:30",
                "John Doe",
                &["", "Answer2"],
                "https://drive.google.com/open?id=XYZ"
            )
        );
        let records = parse(&csv).unwrap();
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.index, 1);
        assert_eq!(r.name, "John Doe");
        assert_eq!(r.timestamp, "2025/07/07 4:02:26 pm GMT+5:30");
        assert_eq!(r.answers.len(), QUESTIONS.len());
        assert_eq!(r.answers[0], None);
        assert_eq!(r.answers[1].as_deref(), Some("Answer2"));
        assert_eq!(r.photo_url, "https://drive.google.com/open?id=XYZ");
    }

    #[test]
    fn test_short_rows_are_padded() {
        let csv = format!("{}\n2025/07/07 10:00:00,Jane,first\n", header());
        let records = parse(&csv).unwrap();
        assert_eq!(records[0].answers[0].as_deref(), Some("first"));
        assert!(records[0].answers[1..].iter().all(Option::is_none));
        assert_eq!(records[0].photo_url, "");
    }

    #[test]
    fn test_blank_rows_keep_their_index() {
        let blank = vec![""; QUESTIONS.len() + 3].join(",");
        let csv = format!(
            "{}\n{}\n{}\n",
            header(),
            blank,
            row("t", "Second", &["x"], "")
        );
        let records = parse(&csv).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].index, 2);
    }

    #[test]
    fn test_empty_name_becomes_anonymous() {
        let csv = format!("{}\n{}\n", header(), row("t", "  ", &["x"], ""));
        let records = parse(&csv).unwrap();
        assert_eq!(records[0].name, "Anonymous");
    }

    #[test]
    fn test_missing_photo_column_fails() {
        let csv = "Timestamp,Full Name,Q1\nt,John,a\n";
        match parse(csv) {
            Err(ParseError::MissingColumn(col)) => {
                assert_eq!(col, "Add a selfie or an old photo with him")
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_missing_name_column_fails() {
        let csv = "Timestamp,Name,Add a selfie or an old photo with him\n";
        assert!(matches!(parse(csv), Err(ParseError::MissingColumn(col)) if col == "Full Name"));
    }

    #[test]
    fn test_question_count_is_validated() {
        let csv = "Timestamp,Full Name,Q1,Q2,Add a selfie or an old photo with him\n";
        assert!(matches!(
            parse(csv),
            Err(ParseError::QuestionCountMismatch { expected: 15, found: 2 })
        ));
    }

    #[test]
    fn test_headers_match_case_insensitively() {
        let csv = format!(
            "{}\n{}\n",
            header().replace("Full Name", "full name"),
            row("t", "Jane", &[], "")
        );
        assert_eq!(parse(&csv).unwrap()[0].name, "Jane");
    }
}

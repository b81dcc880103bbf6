// Uploaded plating files come out of whatever spreadsheet the user had at hand, so
// the delimiter and quoting are guessed from the head of the file instead of being
// fixed. Line endings are not sniffed: \r\n and bare \r are rewritten to \n up front.
use std::io::Read;

use super::error::PlatingError;

const SAMPLE_SIZE: usize = 1024; //Bytes inspected when guessing the dialect
const DELIMITERS: [u8; 4] = [b',', b'\t', b';', b'|']; //In order of preference
const DOUBLE_QUOTE: u8 = b'"';
const SINGLE_QUOTE: u8 = b'\'';
const BYTE_ORDER_MARK: char = '\u{feff}';

/// Decode an uploaded file as UTF-8 text with every line ending turned into `\n`.
///
/// A leading byte order mark (as written by some spreadsheet exports) is dropped.
pub fn normalize_text(contents: &[u8]) -> Result<String, PlatingError> {
    let text = std::str::from_utf8(contents).map_err(|e| {
        let valid = std::str::from_utf8(&contents[..e.valid_up_to()]).unwrap_or_default();
        PlatingError::MalformedRow {
            row: normalize_newlines(valid).matches('\n').count() as u64 + 1,
            reason: String::from("the row is not valid UTF-8 text"),
        }
    })?;
    let text = text.strip_prefix(BYTE_ORDER_MARK).unwrap_or(text);
    Ok(normalize_newlines(text))
}

fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// One logical row of a delimited file. A row spans several lines when a quoted field
/// holds a newline. A blank line is a row with no text and no fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawRecord<'a> {
    /// 1-based line the row starts on
    pub line: u64,
    pub text: &'a str,
    field_count: usize,
}

impl RawRecord<'_> {
    pub fn field_count(&self) -> usize {
        self.field_count
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
enum ScanState {
    FieldStart,
    Unquoted,
    Quoted,
    QuoteInQuoted,
}

// Quoting follows the csv reader: a quote only opens a field when it is the first byte
// of the field, and a doubled quote inside a quoted field is a literal quote.
fn split_records(text: &str, delimiter: u8, quote: u8) -> Vec<RawRecord<'_>> {
    let mut records = Vec::new();
    let mut state = ScanState::FieldStart;
    let mut start = 0;
    let mut start_line = 1;
    let mut line = 1;
    let mut field_count = 1;
    for (idx, byte) in text.bytes().enumerate() {
        if byte == b'\n' {
            line += 1;
        }
        state = match (state, byte) {
            (ScanState::Quoted, b) if b == quote => ScanState::QuoteInQuoted,
            (ScanState::Quoted, _) => ScanState::Quoted,
            (_, b'\n') => {
                records.push(RawRecord {
                    line: start_line,
                    text: &text[start..idx],
                    field_count: if idx == start { 0 } else { field_count },
                });
                start = idx + 1;
                start_line = line;
                field_count = 1;
                ScanState::FieldStart
            }
            (_, b) if b == delimiter => {
                field_count += 1;
                ScanState::FieldStart
            }
            (ScanState::FieldStart, b) | (ScanState::QuoteInQuoted, b) if b == quote => {
                ScanState::Quoted
            }
            _ => ScanState::Unquoted,
        };
    }
    // No newline after the last row
    if start < text.len() {
        records.push(RawRecord {
            line: start_line,
            text: &text[start..],
            field_count,
        });
    }
    records
}

/// The field delimiter and quote character of a delimited text file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    pub delimiter: u8,
    pub quote: u8,
}

impl Default for Dialect {
    fn default() -> Self {
        Self {
            delimiter: b',',
            quote: DOUBLE_QUOTE,
        }
    }
}

impl Dialect {
    /// Guess the dialect from the first kilobyte of text produced by [`normalize_text`].
    ///
    /// Rows are judged as whole records, so a quoted field spanning lines counts once. The
    /// first delimiter that splits every sampled row wins. Failing that, the first one that
    /// splits most of them is taken, and the short rows are reported by the parser.
    pub fn sniff(text: &str) -> Result<Self, PlatingError> {
        let truncated = text.len() > SAMPLE_SIZE;
        let mut cut = text.len().min(SAMPLE_SIZE);
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        let sample = &text[..cut];
        if sample.trim().is_empty() {
            return Err(PlatingError::UnparseableDialect(String::from(
                "the file is empty",
            )));
        }

        let quote = if !sample.contains(DOUBLE_QUOTE as char)
            && sample.split('\n').any(opens_single_quote)
        {
            SINGLE_QUOTE
        } else {
            DOUBLE_QUOTE
        };

        let counts: Vec<(u8, Vec<usize>)> = DELIMITERS
            .into_iter()
            .map(|delim| (delim, sampled_field_counts(sample, truncated, delim, quote)))
            .collect();
        let everywhere = counts
            .iter()
            .find(|(_, fields)| fields.iter().all(|n| *n > 1))
            .map(|(delim, _)| *delim);
        let delimiter = match everywhere {
            Some(delim) => delim,
            None => counts
                .iter()
                .find(|(_, fields)| 2 * fields.iter().filter(|n| **n > 1).count() > fields.len())
                .map(|(delim, _)| *delim)
                .ok_or_else(|| {
                    PlatingError::UnparseableDialect(String::from(
                        "could not determine the field delimiter",
                    ))
                })?,
        };

        log::debug!(
            "Sniffed dialect: delimiter {:?}, quote {:?}",
            delimiter as char,
            quote as char
        );
        Ok(Self { delimiter, quote })
    }

    /// Split normalized text into rows, blank lines included
    pub fn records<'a>(&self, text: &'a str) -> Vec<RawRecord<'a>> {
        split_records(text, self.delimiter, self.quote)
    }

    /// Read the fields of one row. A blank row has no fields.
    pub fn fields(&self, record: &RawRecord) -> Result<csv::StringRecord, csv::Error> {
        let mut fields = csv::StringRecord::new();
        self.reader(record.text.as_bytes()).read_record(&mut fields)?;
        Ok(fields)
    }

    /// Create a csv reader for this dialect. Rows may have any number of fields and every
    /// field is trimmed of surrounding whitespace. Header handling is left to the caller.
    pub fn reader<R: Read>(&self, rdr: R) -> csv::Reader<R> {
        csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(self.delimiter)
            .quote(self.quote)
            .trim(csv::Trim::All)
            .from_reader(rdr)
    }
}

/// Field counts of the non-blank sampled rows for one candidate delimiter
fn sampled_field_counts(sample: &str, truncated: bool, delimiter: u8, quote: u8) -> Vec<usize> {
    let mut counts: Vec<usize> = split_records(sample, delimiter, quote)
        .iter()
        .filter(|record| !record.is_blank())
        .map(RawRecord::field_count)
        .collect();
    // The last row of a cut sample is most likely partial
    if truncated && counts.len() > 1 {
        counts.pop();
    }
    counts
}

fn opens_single_quote(line: &str) -> bool {
    line.trim_start().starts_with(SINGLE_QUOTE as char)
        || DELIMITERS.iter().any(|delim| {
            line.as_bytes()
                .windows(2)
                .any(|pair| pair[0] == *delim && pair[1] == SINGLE_QUOTE)
        })
}

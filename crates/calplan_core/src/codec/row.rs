use std::borrow::Cow;

pub const DELIMITER: char = ',';
pub const QUOTE: char = '"';

/// One logical record read from a flat file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// 1-based physical line the record starts on.
    pub line_no: usize,
    /// Record text without its terminating line break.
    pub text: String,
}

impl Record {
    pub fn is_multi_line(&self) -> bool {
        self.text.contains('\n')
    }

    /// Splits a joined record back into one record per physical line.
    pub fn physical_lines(&self) -> Vec<Record> {
        self.text
            .split('\n')
            .enumerate()
            .map(|(offset, line)| Record {
                line_no: self.line_no + offset,
                text: line.strip_suffix('\r').unwrap_or(line).to_string(),
            })
            .collect()
    }
}

fn needs_quoting(value: &str) -> bool {
    value
        .chars()
        .any(|c| c == DELIMITER || c == QUOTE || c == '\n' || c == '\r')
}

/// Encodes one field, quoting it and doubling inner quotes when required.
pub fn encode_field(value: &str) -> Cow<'_, str> {
    if !needs_quoting(value) {
        return Cow::Borrowed(value);
    }

    let mut encoded = String::with_capacity(value.len() + 2);
    encoded.push(QUOTE);
    for c in value.chars() {
        if c == QUOTE {
            encoded.push(QUOTE);
        }
        encoded.push(c);
    }
    encoded.push(QUOTE);
    Cow::Owned(encoded)
}

/// Encodes and joins fields into one row (without line terminator).
pub fn encode_row<S: AsRef<str>>(fields: &[S]) -> String {
    let mut row = String::new();
    for (index, field) in fields.iter().enumerate() {
        if index > 0 {
            row.push(DELIMITER);
        }
        row.push_str(&encode_field(field.as_ref()));
    }
    row
}

/// Decodes one row into fields.
///
/// Quote characters toggle quoted mode; inside quoted mode a doubled quote
/// yields one literal quote and delimiters are kept as text. An empty line
/// decodes to a single empty field.
pub fn decode_row(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == QUOTE {
                if chars.peek() == Some(&QUOTE) {
                    current.push(QUOTE);
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                current.push(c);
            }
        } else if c == QUOTE {
            in_quotes = true;
        } else if c == DELIMITER {
            fields.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    fields.push(current);
    fields
}

/// Returns whether a quoted field is still open after scanning `line`.
///
/// Only a quote at the start of a field opens a quoted field; a quote in
/// the middle of an unquoted field cannot carry the record onto the next
/// line.
fn ends_inside_quotes(line: &str, mut in_quotes: bool) -> bool {
    let mut at_field_start = !in_quotes;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == QUOTE {
                if chars.peek() == Some(&QUOTE) {
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
        } else if c == QUOTE && at_field_start {
            in_quotes = true;
        }
        at_field_start = !in_quotes && c == DELIMITER;
    }
    in_quotes
}

/// Splits file text into logical records.
///
/// A physical line that leaves a quoted field open is joined with the
/// following line(s). A trailing `\r` is dropped from completed records.
pub fn split_records(text: &str) -> Vec<Record> {
    let mut records = Vec::new();
    let mut pending: Option<Record> = None;
    let mut in_quotes = false;

    let mut lines: Vec<&str> = text.split('\n').collect();
    if text.ends_with('\n') {
        lines.pop();
    }

    for (index, line) in lines.into_iter().enumerate() {
        match pending.as_mut() {
            Some(record) => {
                record.text.push('\n');
                record.text.push_str(line);
            }
            None => {
                pending = Some(Record {
                    line_no: index + 1,
                    text: line.to_string(),
                });
            }
        }
        in_quotes = ends_inside_quotes(line, in_quotes);

        if !in_quotes {
            if let Some(mut done) = pending.take() {
                if done.text.ends_with('\r') {
                    done.text.pop();
                }
                records.push(done);
            }
        }
    }

    // Unterminated quote at end of input: keep what was read.
    if let Some(rest) = pending.take() {
        records.push(rest);
    }
    records
}

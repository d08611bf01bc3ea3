use super::{NUMERIC_COLUMNS, Record, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CsvError {
    #[error("CSV input is empty")]
    EmptyInput,
}

/// Parse CSV text into records keyed by the header row.
///
/// Header cells are split on every comma. Every later line, blank ones
/// included, goes through the quote-aware splitter and becomes a record.
/// Short rows are padded with empty values, long rows are cut to the header
/// width.
pub fn parse(text: &str) -> Result<Vec<Record>, CsvError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(CsvError::EmptyInput);
    }

    let mut lines = text.split('\n');
    let Some(header_line) = lines.next() else {
        return Err(CsvError::EmptyInput);
    };
    let headers: Vec<&str> = header_line.split(',').map(str::trim).collect();

    let records = lines
        .map(|line| {
            let values = split_line(line);
            let mut record = Record::default();
            for (index, header) in headers.iter().enumerate() {
                let raw = values.get(index).map(String::as_str).unwrap_or("");
                let value = if NUMERIC_COLUMNS.contains(header) {
                    Value::Number(parse_number(raw))
                } else {
                    Value::Text(raw.to_string())
                };
                record.insert(header, value);
            }
            record
        })
        .collect();

    Ok(records)
}

/// Split one data line into trimmed fields.
///
/// A `"` flips the in-quotes flag and is dropped; commas inside quotes are
/// kept. `""` is not an escape: it flips the flag twice and yields nothing.
fn split_line(line: &str) -> Vec<String> {
    let mut values = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in line.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                values.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    values.push(current.trim().to_string());

    values
}

/// Longest leading decimal number in `field`, or 0 when there is none.
fn parse_number(field: &str) -> f64 {
    let s = field.trim_start();
    let bytes = s.as_bytes();
    let digits_from = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    let int_end = digits_from(end);
    let mut digits = int_end - end;
    end = int_end;

    if bytes.get(end) == Some(&b'.') {
        let frac_end = digits_from(end + 1);
        if frac_end > end + 1 {
            digits += frac_end - end - 1;
            end = frac_end;
        }
    }
    if digits == 0 {
        return 0.0;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_end = digits_from(exp);
        if exp_end > exp {
            end = exp_end;
        }
    }

    s[..end]
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .unwrap_or(0.0)
}

/// Write records as CSV with `columns` as the header.
///
/// Values are joined as-is with no quoting, so a value containing a comma
/// will not survive a round trip.
pub fn serialize(records: &[Record], columns: &[&str]) -> String {
    let mut lines = Vec::with_capacity(records.len() + 1);
    lines.push(columns.join(","));

    for record in records {
        let row: Vec<String> = columns
            .iter()
            .map(|column| {
                record
                    .get(column)
                    .map(Value::to_string)
                    .unwrap_or_default()
            })
            .collect();
        lines.push(row.join(","));
    }

    lines.join("\n")
}

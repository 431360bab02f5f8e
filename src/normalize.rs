use serde_json::Value;

use crate::error::{Result, TrackerError};
use crate::models::{Candidate, RawRow};

/// Period label used for a score that arrives without a `period` column.
pub const LEGACY_PERIOD: &str = "legacy";

const SCORE_COLUMNS: [&str; 2] = ["score", "cgpa"];
const BIO_COLUMNS: [&str; 3] = ["bio", "biography", "resume"];

pub fn normalize_row(row: &RawRow) -> Result<Candidate> {
    let name = text(row, "name").ok_or(TrackerError::MissingField("name"))?;

    let email = match text(row, "email") {
        Some(email) if email.contains('@') => email,
        _ => {
            tracing::warn!(
                row = %serde_json::Value::Object(row.clone()),
                "rejecting row with invalid email"
            );
            return Err(TrackerError::InvalidField("email"));
        }
    };

    let phone = text(row, "phone");
    let bio = first_text(row, &BIO_COLUMNS);
    let score = parse_score(row)?;
    let placed = parse_placed(row)?;
    let period = text(row, "period").filter(|_| score.is_some());

    Ok(Candidate {
        name,
        email,
        phone,
        bio,
        skills: split_tags(text(row, "skills").as_deref()),
        internships: split_tags(text(row, "internships").as_deref()),
        // Nested project records cannot survive a flat cell; they are only
        // ever set through direct edits.
        projects: Vec::new(),
        placed,
        score,
        period,
    })
}

/// Trimmed, non-blank text of a cell. Numbers and booleans are rendered.
fn text(row: &RawRow, column: &str) -> Option<String> {
    let rendered = match row.get(column)? {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    };
    if rendered.is_empty() {
        None
    } else {
        Some(rendered)
    }
}

fn first_text(row: &RawRow, columns: &[&str]) -> Option<String> {
    columns.iter().find_map(|column| text(row, column))
}

fn parse_score(row: &RawRow) -> Result<Option<f64>> {
    for column in SCORE_COLUMNS {
        let parsed = match row.get(column) {
            None | Some(Value::Null) => continue,
            Some(Value::Number(n)) => n.as_f64(),
            Some(_) => match text(row, column) {
                None => continue,
                Some(raw) => raw.parse::<f64>().ok(),
            },
        };
        return match parsed {
            Some(score) if score.is_finite() => Ok(Some(score)),
            _ => Err(TrackerError::InvalidField("score")),
        };
    }
    Ok(None)
}

fn parse_placed(row: &RawRow) -> Result<Option<bool>> {
    let Some(raw) = text(row, "placed") else {
        return Ok(None);
    };
    match raw.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(Some(true)),
        "false" | "0" | "no" => Ok(Some(false)),
        _ => Err(TrackerError::InvalidField("placed")),
    }
}

/// Comma-split tags in input order. Blank tokens are dropped, so an empty
/// cell yields no tags at all.
pub fn split_tags(raw: Option<&str>) -> Vec<String> {
    raw.map(|value| {
        value
            .split(',')
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

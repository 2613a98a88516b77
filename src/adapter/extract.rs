//! Reading license fields out of result pages.
//!
//! Pages are flattened to one text fragment per line (block tags and table
//! cells become line breaks), then each field is located with a label regex.
//! Labels may be followed by the value on the same line or the next one, so
//! both `Status: Active` and `<td>Status</td><td>Active</td>` work.

use crate::error::{Error, Result};
use crate::result::LicenseStatus;
use crate::states::FieldOverrides;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

/// Builds a lazily compiled, known-good regex.
macro_rules! static_regex {
    ($name:ident, $pattern:expr) => {
        #[allow(clippy::expect_used)]
        static $name: Lazy<Regex> =
            Lazy::new(|| Regex::new($pattern).expect(concat!("valid regex: ", stringify!($name))));
    };
}

static_regex!(SCRIPT_STYLE, r"(?is)<script\b.*?</script\s*>|<style\b.*?</style\s*>");
static_regex!(COMMENT, r"(?s)<!--.*?-->");
static_regex!(
    BLOCK_TAG,
    r"(?i)<\s*/?\s*(?:br|p|div|tr|td|th|li|ul|ol|table|tbody|thead|tfoot|h[1-6]|dt|dd|dl|section|article|header|footer|form|fieldset|legend|label|caption)\b[^>]*>"
);
static_regex!(ANY_TAG, r"(?s)<[^>]*>");
static_regex!(NUMERIC_ENTITY, r"&#(x[0-9a-fA-F]+|[0-9]+);");
static_regex!(
    DATE_TEXT,
    r"\d{1,2}/\d{1,2}/\d{4}|\d{1,2}-\d{1,2}-\d{4}|\d{4}-\d{2}-\d{2}|[A-Za-z]{3,9}\.?\s+\d{1,2},\s*\d{4}"
);

// Cells that are column headers rather than values.
static_regex!(
    STATUS_LABEL,
    r"(?i)^(?:(?:license|licence|primary|current)\s+)?status:?$"
);
static_regex!(
    LICENSEE_LABEL,
    r"(?i)^(?:(?:licensee|business|contractor|company|entity|legal|licensed)\s+)?name:?$"
);
static_regex!(
    EXPIRATION_LABEL,
    r"(?i)^(?:expiration|expires|expire|expiry)(?:\s+date)?:?$"
);
static_regex!(
    LICENSE_TYPE_LABEL,
    r"(?i)^(?:(?:license|licence)\s+)?(?:type|class|classification):?$"
);
static_regex!(
    OTHER_LABEL,
    r"(?i)^(?:(?:license|licence)\s*(?:no\.?|number|#)|(?:issue|issued|effective|original)\s+date|address|city|county|zip(?:\s+code)?|phone|dba):?$"
);

static_regex!(REVOKED, r"\brevo(?:ked|cation)\b");
static_regex!(SUSPENDED, r"\bsuspen(?:ded|sion|d)\b");
static_regex!(EXPIRED, r"\b(?:expired|lapsed)\b");
static_regex!(
    INACTIVE,
    r"\b(?:inactive|invalid|cancel(?:l?ed|lation)?|retired|void(?:ed)?|surrender(?:ed)?|closed)\b"
);
static_regex!(ACTIVE, r"\b(?:active|current|clear|valid|good\s+standing|issued|renewed)\b");
static_regex!(
    NEGATED_ACTIVE,
    r"\b(?:not|non|no\s+longer)[\s-]+(?:active|current|clear|valid|licensed|in\s+good\s+standing)\b"
);
static_regex!(NEGATED_WORD, r"\b(?:not|non|no\s+longer)[\s-]+\w+");

// The value sits on the label's line or, at most, the line after it.
const DEFAULT_STATUS: &str = r"(?im)^[^\S\n]*(?:(?:license|licence|primary|current)[^\S\n]+)?status[^\S\n]*:?[^\S\n]*(?:\n[^\S\n]*)?([^\s:][^\n]*)$";
const DEFAULT_LICENSEE: &str = r"(?im)^[^\S\n]*(?:(?:licensee|business|contractor|company|entity|legal|licensed)[^\S\n]+)?name[^\S\n]*:?[^\S\n]*(?:\n[^\S\n]*)?([^\s:][^\n]*)$";
const DEFAULT_EXPIRATION: &str = r"(?im)^[^\S\n]*(?:expiration|expires|expire|expiry)(?:[^\S\n]+date)?[^\S\n]*:?[^\S\n]*(?:\n[^\S\n]*)?([^\s:][^\n]*)$";
const DEFAULT_LICENSE_TYPE: &str = r"(?im)^[^\S\n]*(?:license|licence)[^\S\n]+(?:type|class|classification)[^\S\n]*:?[^\S\n]*(?:\n[^\S\n]*)?([^\s:][^\n]*)$";

/// Phrases that mean the board has no matching record.
const DEFAULT_NOT_FOUND: &[&str] = &[
    "no records found",
    "no record found",
    "no results found",
    "no matching records",
    "no licenses found",
    "no license found",
    "license not found",
    "0 records found",
    "returned 0 results",
    "did not return any results",
];

const DATE_FORMATS: &[&str] = &["%m/%d/%Y", "%m-%d-%Y", "%Y-%m-%d", "%B %d, %Y", "%b %d, %Y"];

/// Compiled field patterns for one state.
#[derive(Debug, Clone)]
pub struct FieldPatterns {
    status: Regex,
    licensee: Regex,
    expiration: Regex,
    license_type: Regex,
    not_found: Vec<String>,
}

impl FieldPatterns {
    /// Default patterns merged with a state's overrides.
    ///
    /// # Errors
    ///
    /// Returns an error naming `state` if an override does not compile.
    pub fn with_overrides(
        overrides: &FieldOverrides,
        extra_not_found: &[String],
        state: &str,
    ) -> Result<Self> {
        let compile = |custom: Option<&String>, default: &str| {
            Regex::new(custom.map_or(default, String::as_str)).map_err(|source| {
                Error::Pattern {
                    state: state.to_string(),
                    source,
                }
            })
        };

        let not_found = DEFAULT_NOT_FOUND
            .iter()
            .map(|m| (*m).to_string())
            .chain(extra_not_found.iter().map(|m| m.to_lowercase()))
            .collect();

        Ok(Self {
            status: compile(overrides.status.as_ref(), DEFAULT_STATUS)?,
            licensee: compile(overrides.licensee.as_ref(), DEFAULT_LICENSEE)?,
            expiration: compile(overrides.expiration.as_ref(), DEFAULT_EXPIRATION)?,
            license_type: compile(overrides.license_type.as_ref(), DEFAULT_LICENSE_TYPE)?,
            not_found,
        })
    }

    /// Default patterns with no overrides.
    ///
    /// # Errors
    ///
    /// Never fails for the built-in patterns; the signature mirrors
    /// [`Self::with_overrides`].
    pub fn defaults() -> Result<Self> {
        Self::with_overrides(&FieldOverrides::default(), &[], "default")
    }
}

/// Fields read from a result page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedRecord {
    /// Status text as shown.
    pub status_text: Option<String>,
    /// Licensee or business name.
    pub licensee_name: Option<String>,
    /// Parsed expiration date.
    pub expiration_date: Option<NaiveDate>,
    /// License type or classification.
    pub license_type: Option<String>,
    /// Page contained a "no such record" phrase.
    pub not_found: bool,
}

/// Flatten HTML into trimmed, non-empty text lines.
#[must_use]
pub fn page_text(html: &str) -> String {
    let text = SCRIPT_STYLE.replace_all(html, "\n");
    let text = COMMENT.replace_all(&text, " ");
    let text = BLOCK_TAG.replace_all(&text, "\n");
    let text = ANY_TAG.replace_all(&text, " ");
    let text = decode_entities(&text);

    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn decode_entities(text: &str) -> String {
    let named = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'");
    let numeric = NUMERIC_ENTITY.replace_all(&named, |caps: &regex::Captures<'_>| {
        let code = &caps[1];
        let value = code
            .strip_prefix('x')
            .map_or_else(|| code.parse().ok(), |hex| u32::from_str_radix(hex, 16).ok());
        value
            .and_then(char::from_u32)
            .map_or_else(|| caps[0].to_string(), String::from)
    });
    // Last, so "&amp;lt;" decodes to "&lt;" rather than "<".
    numeric.replace("&amp;", "&")
}

fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures_iter(text).find_map(|caps| {
        let value = caps
            .get(1)?
            .as_str()
            .trim()
            .trim_end_matches([',', ';'])
            .trim();
        // A label followed by another label is a header row, not a value.
        (!value.is_empty() && column_label(value).is_none()).then(|| value.to_string())
    })
}

/// Field a result-table column holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Column {
    Status,
    Licensee,
    Expiration,
    LicenseType,
    Other,
}

fn column_label(cell: &str) -> Option<Column> {
    let cell = cell.trim();
    if STATUS_LABEL.is_match(cell) {
        Some(Column::Status)
    } else if LICENSEE_LABEL.is_match(cell) {
        Some(Column::Licensee)
    } else if EXPIRATION_LABEL.is_match(cell) {
        Some(Column::Expiration)
    } else if LICENSE_TYPE_LABEL.is_match(cell) {
        Some(Column::LicenseType)
    } else if OTHER_LABEL.is_match(cell) {
        Some(Column::Other)
    } else {
        None
    }
}

fn split_row(line: &str) -> Vec<&str> {
    if !line.contains('|') {
        return vec![line.trim()];
    }
    line.trim().trim_matches('|').split('|').map(str::trim).collect()
}

fn zip_columns(header: &[&str], values: &[&str]) -> BTreeMap<Column, String> {
    let mut columns = BTreeMap::new();
    for (cell, value) in header.iter().zip(values) {
        let Some(column) = column_label(cell).filter(|c| *c != Column::Other) else {
            continue;
        };
        if !value.is_empty() {
            columns.entry(column).or_insert_with(|| (*value).to_string());
        }
    }
    columns
}

/// Values of the first data row under a header row.
///
/// Handles headers flattened to one cell per line (`<th>` rows) as well as
/// pipe-separated rows. Only the first record of a result list is read.
fn column_values(text: &str) -> BTreeMap<Column, String> {
    let lines: Vec<&str> = text.lines().map(str::trim).collect();
    let mut i = 0;
    while i < lines.len() {
        let run = lines[i..]
            .iter()
            .take_while(|line| column_label(line).is_some())
            .count();
        if run >= 2 {
            let header = &lines[i..i + run];
            return lines
                .get(i + run..i + 2 * run)
                .map(|values| zip_columns(header, values))
                .unwrap_or_default();
        }

        let cells = split_row(lines[i]);
        if cells.len() >= 2 && cells.iter().all(|c| column_label(c).is_some()) {
            if let Some(values) = lines.get(i + 1).map(|next| split_row(next)) {
                if values.len() == cells.len() {
                    return zip_columns(&cells, &values);
                }
            }
        }
        i += run.max(1);
    }
    BTreeMap::new()
}

/// Parse the first recognizable date in `text`.
#[must_use]
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let found = DATE_TEXT.find(text)?.as_str().replace('.', "");
    let found = found.split_whitespace().collect::<Vec<_>>().join(" ");
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(&found, fmt).ok())
}

/// Read the license fields from flattened page text.
///
/// When the page is a result table with a header row, the first data row
/// wins over label matches.
#[must_use]
pub fn extract(text: &str, fields: &FieldPatterns) -> ExtractedRecord {
    let lowered = text.to_lowercase();
    let columns = column_values(text);
    let read = |re: &Regex, column: Column| {
        columns
            .get(&column)
            .cloned()
            .or_else(|| capture(re, text))
    };

    ExtractedRecord {
        status_text: read(&fields.status, Column::Status),
        licensee_name: read(&fields.licensee, Column::Licensee),
        expiration_date: read(&fields.expiration, Column::Expiration)
            .and_then(|v| parse_date(&v)),
        license_type: read(&fields.license_type, Column::LicenseType),
        not_found: fields.not_found.iter().any(|m| lowered.contains(m.as_str())),
    }
}

/// Map board status wording onto a [`LicenseStatus`].
///
/// Keywords match whole words only, and negated phrases ("not active",
/// "non-current", "no longer valid") never count as active.
#[must_use]
pub fn classify_status_text(status_text: &str) -> LicenseStatus {
    let lowered = status_text.to_lowercase();
    let negated_active = NEGATED_ACTIVE.is_match(&lowered);
    let s = NEGATED_WORD.replace_all(&lowered, " ");

    if REVOKED.is_match(&s) {
        LicenseStatus::Revoked
    } else if SUSPENDED.is_match(&s) {
        LicenseStatus::Suspended
    } else if EXPIRED.is_match(&s) {
        LicenseStatus::Expired
    } else if negated_active || INACTIVE.is_match(&s) {
        LicenseStatus::Inactive
    } else if ACTIVE.is_match(&s) {
        LicenseStatus::Active
    } else {
        LicenseStatus::Unknown
    }
}

/// Decide the license status for an extracted record as of `today`.
///
/// A "no record" phrase wins over anything else on the page. An active
/// license past its expiration date is reported expired.
#[must_use]
pub fn classify(record: &ExtractedRecord, today: NaiveDate) -> LicenseStatus {
    if record.not_found {
        return LicenseStatus::NotFound;
    }
    let status = record
        .status_text
        .as_deref()
        .map_or(LicenseStatus::Unknown, classify_status_text);

    match (status, record.expiration_date) {
        (LicenseStatus::Active, Some(expires)) if expires < today => LicenseStatus::Expired,
        (status, _) => status,
    }
}

//! Row filtering and coercion from untyped parsed rows into typed questions.
//!
//! Every field has exactly one default (see [`coerce_question`]); a bad value in
//! one field never fails the row. Only the view-count filter drops rows.

use crate::constants::{ROW_ELEMENT, VIEW_COUNT_THRESHOLD};
use crate::parser::MarkupDocument;
use crate::types::{Question, QuestionDocument, RawRow};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

/// Result of transforming one parsed document.
#[derive(Debug, Default)]
pub struct TransformOutcome {
    pub documents: Vec<QuestionDocument>,
    pub stats: TransformStats,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransformStats {
    pub rows_total: usize,
    pub rows_kept: usize,
    pub rows_filtered: usize,
}

/// Filters and coerces every row element under the document root, keeping input order.
pub fn extract_questions(document: &MarkupDocument) -> TransformOutcome {
    let rows = document.root.elements(ROW_ELEMENT);
    info!(
        "Extracting questions from {} <{}> elements under <{}>",
        rows.len(),
        ROW_ELEMENT,
        document.root_name
    );
    transform_rows(rows.iter().map(|node| node.fields()))
}

pub fn transform_rows<'a, I>(rows: I) -> TransformOutcome
where
    I: IntoIterator<Item = &'a RawRow>,
{
    let mut outcome = TransformOutcome::default();

    for row in rows {
        outcome.stats.rows_total += 1;

        if !passes_view_filter(row) {
            outcome.stats.rows_filtered += 1;
            continue;
        }

        outcome.documents.push(QuestionDocument::from(coerce_question(row)));
        outcome.stats.rows_kept += 1;
    }

    debug!(?outcome.stats, "Transform finished");
    outcome
}

/// `ViewCount > 20000`, reading only the leading integer of the raw value.
/// A missing or non-numeric view count fails the filter.
pub fn passes_view_filter(row: &RawRow) -> bool {
    row.get("ViewCount")
        .and_then(parse_leading_int)
        .map_or(false, |views| views > VIEW_COUNT_THRESHOLD)
}

/// Builds a typed question from a raw row.
///
/// | field | when absent or invalid |
/// |---|---|
/// | Id, PostTypeId, AcceptedAnswerId, OwnerUserId | `None` (also for an empty value) |
/// | CreationDate, LastActivityDate | `None` |
/// | Score, ViewCount, AnswerCount, CommentCount, FavoriteCount | `0` |
/// | Body, Title, Tags, ContentLicense | `""` |
pub fn coerce_question(row: &RawRow) -> Question {
    Question {
        id: optional_id(row.get("Id")),
        post_type_id: optional_id(row.get("PostTypeId")),
        accepted_answer_id: optional_id(row.get("AcceptedAnswerId")),
        creation_date: row.get("CreationDate").and_then(parse_timestamp),
        score: int_or_default(row.get("Score")),
        view_count: int_or_default(row.get("ViewCount")),
        body: row.get("Body").map(decode_body).unwrap_or_default(),
        owner_user_id: optional_id(row.get("OwnerUserId")),
        last_activity_date: row.get("LastActivityDate").and_then(parse_timestamp),
        title: row.get("Title").unwrap_or_default().to_string(),
        tags: row.get("Tags").map(reformat_tags).unwrap_or_default(),
        answer_count: int_or_default(row.get("AnswerCount")),
        comment_count: int_or_default(row.get("CommentCount")),
        favorite_count: int_or_default(row.get("FavoriteCount")),
        content_license: row.get("ContentLicense").unwrap_or_default().to_string(),
    }
}

/// Reads an optional sign and the digits that follow leading whitespace.
/// Anything after the digits is ignored; no digits at all gives `None`.
/// Magnitudes beyond `i64` saturate.
pub fn parse_leading_int(raw: &str) -> Option<i64> {
    let s = raw.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let end = digits
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }

    let magnitude = digits[..end].parse::<i64>().unwrap_or(i64::MAX);
    Some(if negative { -magnitude } else { magnitude })
}

pub fn int_or_default(raw: Option<&str>) -> i64 {
    raw.and_then(parse_leading_int).unwrap_or(0)
}

/// Decodes `&lt;`, `&gt;` and `&#xA;`, in that order.
pub fn decode_body(raw: &str) -> String {
    raw.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&#xA;", "\n")
}

/// `tag1><tag2` (or `<tag1><tag2>`) becomes `<tag1><tag2>`. Applying it twice
/// gives the same string as applying it once.
pub fn reformat_tags(raw: &str) -> String {
    raw.split("><")
        .map(|piece| piece.replace(|c: char| c == '<' || c == '>', ""))
        .filter(|tag| !tag.is_empty())
        .map(|tag| format!("<{}>", tag))
        .collect()
}

pub fn optional_id(raw: Option<&str>) -> Option<String> {
    raw.filter(|v| !v.is_empty()).map(str::to_string)
}

/// Accepts the dump format (`2010-07-19T19:12:12.510`, read as UTC) and RFC 3339.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    fn row(pairs: &[(&str, &str)]) -> RawRow {
        pairs.iter().copied().collect()
    }

    fn full_row(id: &str, views: &str) -> RawRow {
        row(&[
            ("Id", id),
            ("PostTypeId", "1"),
            ("CreationDate", "2010-07-19T19:12:12.510"),
            ("LastActivityDate", "2013-01-02T03:04:05.000"),
            ("ViewCount", views),
            ("Title", "A title"),
        ])
    }

    #[test]
    fn test_rows_at_or_below_threshold_are_dropped() {
        let rows = vec![
            full_row("1", "20000"),
            full_row("2", "0"),
            full_row("3", "19999"),
            full_row("4", "20001"),
        ];
        let outcome = transform_rows(&rows);

        assert_eq!(outcome.documents.len(), 1);
        assert_eq!(outcome.documents[0].question.id.as_deref(), Some("4"));
        assert_eq!(outcome.stats.rows_filtered, 3);
        assert_eq!(outcome.stats.rows_total, 4);
    }

    #[test]
    fn test_non_numeric_view_count_fails_filter() {
        assert!(!passes_view_filter(&full_row("1", "lots")));
        assert!(!passes_view_filter(&row(&[("Id", "1")])));
        assert!(passes_view_filter(&full_row("1", "25000 views")));
    }

    #[test]
    fn test_missing_integers_default_to_zero() {
        let mut raw = full_row("10", "30000");
        raw.insert("Score", "not a number");
        let question = coerce_question(&raw);

        assert_eq!(question.view_count, 30000);
        assert_eq!(question.score, 0);
        assert_eq!(question.answer_count, 0);
        assert_eq!(question.comment_count, 0);
        assert_eq!(question.favorite_count, 0);
    }

    #[test]
    fn test_negative_score_is_kept() {
        let mut raw = full_row("10", "30000");
        raw.insert("Score", "-3");
        assert_eq!(coerce_question(&raw).score, -3);
    }

    #[test]
    fn test_absent_and_empty_ids_become_none() {
        let mut raw = full_row("10", "30000");
        raw.insert("AcceptedAnswerId", "");
        let question = coerce_question(&raw);

        assert_eq!(question.accepted_answer_id, None);
        assert_eq!(question.owner_user_id, None);
        assert_eq!(question.body, "");
        assert_eq!(question.tags, "");
        assert_eq!(question.content_license, "");
    }

    #[test]
    fn test_present_ids_are_kept() {
        let mut raw = full_row("10", "30000");
        raw.insert("AcceptedAnswerId", "11");
        raw.insert("OwnerUserId", "5");
        let question = coerce_question(&raw);

        assert_eq!(question.accepted_answer_id.as_deref(), Some("11"));
        assert_eq!(question.owner_user_id.as_deref(), Some("5"));
    }

    #[test]
    fn test_tags_are_bracketed() {
        assert_eq!(reformat_tags("tag1><tag2"), "<tag1><tag2>");
        assert_eq!(reformat_tags("<tag1><tag2>"), "<tag1><tag2>");
        assert_eq!(reformat_tags("solo"), "<solo>");
        assert_eq!(reformat_tags(""), "");
    }

    #[test]
    fn test_tag_reformat_is_idempotent() {
        for raw in ["tag1><tag2", "<a><b><c>", "x", "<<weird>>><y"] {
            let once = reformat_tags(raw);
            assert_eq!(reformat_tags(&once), once);
        }
    }

    #[test]
    fn test_body_entities_are_decoded() {
        assert_eq!(decode_body("a &lt;b&gt; c&#xA;d"), "a <b> c\nd");
        assert_eq!(decode_body("plain"), "plain");
    }

    #[test]
    fn test_leading_int_parsing() {
        assert_eq!(parse_leading_int("42"), Some(42));
        assert_eq!(parse_leading_int("  42abc"), Some(42));
        assert_eq!(parse_leading_int("-7"), Some(-7));
        assert_eq!(parse_leading_int("+7"), Some(7));
        assert_eq!(parse_leading_int("abc"), None);
        assert_eq!(parse_leading_int(""), None);
        assert_eq!(parse_leading_int("-"), None);
        assert_eq!(parse_leading_int("3.9"), Some(3));
    }

    #[test]
    fn test_dump_timestamp_format() {
        let ts = parse_timestamp("2010-07-19T19:12:12.510").unwrap();
        assert_eq!((ts.year(), ts.month(), ts.day()), (2010, 7, 19));
        assert_eq!((ts.hour(), ts.minute(), ts.second()), (19, 12, 12));
        assert!(parse_timestamp("2010-07-19T19:12:12Z").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_popular_row_with_missing_fields_is_kept_with_defaults() {
        let sparse = row(&[
            ("ViewCount", "30000"),
            ("CreationDate", "soon"),
            ("Title", "A pug without a date"),
        ]);
        let outcome = transform_rows(&[sparse]);

        assert_eq!(outcome.stats.rows_kept, 1);
        assert_eq!(outcome.documents.len(), 1);
        let question = &outcome.documents[0].question;
        assert_eq!(question.id, None);
        assert_eq!(question.post_type_id, None);
        assert_eq!(question.creation_date, None);
        assert_eq!(question.last_activity_date, None);
        assert_eq!(question.owner_user_id, None);
        assert_eq!(question.view_count, 30000);
        assert_eq!(question.score, 0);
        assert_eq!(question.answer_count, 0);
        assert_eq!(question.title, "A pug without a date");
        assert_eq!(question.body, "");
        assert_eq!(question.tags, "");
    }

    #[test]
    fn test_oversized_view_count_saturates() {
        assert_eq!(parse_leading_int("99999999999999999999"), Some(i64::MAX));
        assert_eq!(parse_leading_int("-99999999999999999999"), Some(-i64::MAX));
        assert!(passes_view_filter(&full_row("1", "123456789012345678901234")));
    }

    #[test]
    fn test_output_keeps_input_order() {
        let rows: Vec<RawRow> = ["9", "3", "7"].iter().map(|id| full_row(id, "50000")).collect();
        let ids: Vec<String> = transform_rows(&rows)
            .documents
            .into_iter()
            .filter_map(|d| d.question.id)
            .collect();
        assert_eq!(ids, vec!["9", "3", "7"]);
    }
}

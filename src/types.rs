use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Untyped field name -> value mapping for one parsed row.
///
/// Attributes and text-only child elements land here interchangeably.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    fields: BTreeMap<String, String>,
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    /// Keeps the first value seen for a field.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.fields.entry(field.into()).or_insert_with(|| value.into());
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawRow {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = RawRow::new();
        for (k, v) in iter {
            row.insert(k, v);
        }
        row
    }
}

/// A question post after coercion. Field names are kept as they appear in the dump.
///
/// `None` is the absent-marker and is stored as null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Question {
    pub id: Option<String>,
    pub post_type_id: Option<String>,
    pub accepted_answer_id: Option<String>,
    #[serde(default, with = "optional_bson_datetime")]
    pub creation_date: Option<DateTime<Utc>>,
    pub score: i64,
    pub view_count: i64,
    pub body: String,
    pub owner_user_id: Option<String>,
    #[serde(default, with = "optional_bson_datetime")]
    pub last_activity_date: Option<DateTime<Utc>>,
    pub title: String,
    pub tags: String,
    pub answer_count: i64,
    pub comment_count: i64,
    pub favorite_count: i64,
    pub content_license: String,
}

/// Storage envelope: one question under the `question` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionDocument {
    pub question: Question,
}

impl From<Question> for QuestionDocument {
    fn from(question: Question) -> Self {
        Self { question }
    }
}

impl QuestionDocument {
    pub fn title(&self) -> &str {
        &self.question.title
    }

    pub fn view_count(&self) -> i64 {
        self.question.view_count
    }
}

/// Optional chrono timestamps as BSON datetimes, `None` as null.
mod optional_bson_datetime {
    use chrono::{DateTime, Utc};
    use mongodb::bson;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        (*value).map(bson::DateTime::from_chrono).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let value = Option::<bson::DateTime>::deserialize(deserializer)?;
        Ok(value.map(bson::DateTime::to_chrono))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use mongodb::bson::{self, Bson};

    fn sample_question() -> Question {
        Question {
            id: Some("7".to_string()),
            post_type_id: Some("1".to_string()),
            accepted_answer_id: None,
            creation_date: Some(Utc.with_ymd_and_hms(2010, 7, 19, 19, 12, 12).unwrap()),
            score: 3,
            view_count: 25_000,
            body: "<p>hi</p>".to_string(),
            owner_user_id: Some("42".to_string()),
            last_activity_date: None,
            title: "Why use a pug?".to_string(),
            tags: "<dogs><pets>".to_string(),
            answer_count: 1,
            comment_count: 0,
            favorite_count: 0,
            content_license: "CC BY-SA 2.5".to_string(),
        }
    }

    #[test]
    fn test_raw_row_keeps_first_value() {
        let row: RawRow = [("Title", "first"), ("Title", "second")].into_iter().collect();
        assert_eq!(row.get("Title"), Some("first"));
        assert_eq!(row.len(), 1);
    }

    #[test]
    fn test_document_envelope_shape() {
        let doc = QuestionDocument::from(sample_question());
        let stored = bson::to_document(&doc).unwrap();

        let question = stored.get_document("question").unwrap();
        assert_eq!(question.get_str("Id").unwrap(), "7");
        assert_eq!(question.get_i64("ViewCount").unwrap(), 25_000);
        assert_eq!(question.get_str("Tags").unwrap(), "<dogs><pets>");
        assert!(matches!(question.get("CreationDate"), Some(Bson::DateTime(_))));
        // absent-marker is stored as null, never as ""
        assert_eq!(question.get("AcceptedAnswerId"), Some(&Bson::Null));
        assert_eq!(question.get("LastActivityDate"), Some(&Bson::Null));
    }

    #[test]
    fn test_document_round_trips_through_bson() {
        let doc = QuestionDocument::from(sample_question());
        let stored = bson::to_document(&doc).unwrap();
        let back: QuestionDocument = bson::from_document(stored).unwrap();
        assert_eq!(back, doc);
    }
}

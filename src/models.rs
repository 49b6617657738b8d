use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// One of the three independently synchronized hub collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Stream,
    Schedule,
    News,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 3] = [ResourceKind::Stream, ResourceKind::Schedule, ResourceKind::News];

    /// Value of the `resource` query selector
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Stream => "stream",
            ResourceKind::Schedule => "schedule",
            ResourceKind::News => "news",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The stream currently shown on the hub
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamRecord {
    pub id: i64,
    pub title: String,
    /// Embeddable playback URL
    pub url: String,
    pub is_live: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sport: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEvent {
    pub id: i64,
    pub title: String,
    pub event_date: String,
    pub event_time: String,
    pub sport: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ScheduleEvent {
    pub fn date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(self.event_date.trim(), "%Y-%m-%d").ok()
    }

    /// Accepts both `HH:MM` and `HH:MM:SS`
    pub fn time(&self) -> Option<NaiveTime> {
        let raw = self.event_time.trim();
        NaiveTime::parse_from_str(raw, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
            .ok()
    }

    pub fn starts_at(&self) -> Option<NaiveDateTime> {
        Some(self.date()?.and_time(self.time()?))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsPost {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub image_url: String,
    pub published_at: String,
}

impl NewsPost {
    /// Publication time; naive timestamps are read as UTC.
    pub fn published(&self) -> Option<DateTime<FixedOffset>> {
        let raw = self.published_at.trim();
        DateTime::parse_from_rfc3339(raw).ok().or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
                .ok()
                .map(|naive| naive.and_utc().fixed_offset())
        })
    }
}

// Request bodies

/// Body of `PUT ?resource=stream`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamUpdate {
    pub url: String,
    pub title: String,
    pub sport: String,
    pub is_live: bool,
}

/// Body of `POST ?resource=schedule`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewScheduleEvent {
    pub title: String,
    pub event_date: String,
    pub event_time: String,
    pub sport: String,
    pub description: String,
}

/// Body of `POST ?resource=news`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewNewsPost {
    pub title: String,
    pub content: String,
    pub image_url: String,
}

// Response envelopes

#[derive(Debug, Default, Deserialize)]
pub(crate) struct StreamEnvelope {
    #[serde(default)]
    pub stream: Option<StreamRecord>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ScheduleEnvelope {
    #[serde(default)]
    pub events: Option<Vec<ScheduleEvent>>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct NewsEnvelope {
    #[serde(default)]
    pub news: Option<Vec<NewsPost>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_resource_selector_values() {
        let selectors: Vec<String> = ResourceKind::ALL.iter().map(|k| k.to_string()).collect();
        assert_eq!(selectors, ["stream", "schedule", "news"]);
    }

    #[test]
    fn test_stream_envelope_with_missing_and_null_stream() {
        let omitted: StreamEnvelope = serde_json::from_str("{}").unwrap();
        assert!(omitted.stream.is_none());

        let null: StreamEnvelope = serde_json::from_str(r#"{"stream": null}"#).unwrap();
        assert!(null.stream.is_none());
    }

    #[test]
    fn test_stream_record_without_sport() {
        let json = r#"{"stream": {"id": 7, "title": "Sprint", "url": "https://x", "is_live": true}}"#;
        let envelope: StreamEnvelope = serde_json::from_str(json).unwrap();
        let stream = envelope.stream.unwrap();
        assert_eq!(stream.id, 7);
        assert!(stream.sport.is_none());
    }

    #[test]
    fn test_schedule_envelope_ignores_unknown_fields() {
        let json = r#"{"events": [{"id": 1, "title": "Relay", "event_date": "2026-01-10",
            "event_time": "14:30:00", "sport": "Biathlon", "created_at": "x"}]}"#;
        let envelope: ScheduleEnvelope = serde_json::from_str(json).unwrap();
        let events = envelope.events.unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].description.is_none());
    }

    #[test]
    fn test_schedule_event_date_and_time() {
        let event = ScheduleEvent {
            id: 1,
            title: "Pursuit".to_string(),
            event_date: "2026-02-14".to_string(),
            event_time: "18:45".to_string(),
            sport: "Biathlon".to_string(),
            description: None,
        };
        let start = event.starts_at().unwrap();
        assert_eq!(start.month(), 2);
        assert_eq!(start.day(), 14);
        assert_eq!(start.hour(), 18);
        assert_eq!(start.minute(), 45);

        let bad = ScheduleEvent {
            event_date: "tomorrow".to_string(),
            ..event
        };
        assert!(bad.date().is_none());
        assert!(bad.starts_at().is_none());
    }

    #[test]
    fn test_news_post_published_formats() {
        let mut post = NewsPost {
            id: 3,
            title: "t".to_string(),
            content: "c".to_string(),
            image_url: "i".to_string(),
            published_at: "2026-03-01T10:00:00+03:00".to_string(),
        };
        assert_eq!(post.published().unwrap().hour(), 10);

        post.published_at = "2026-03-01T10:00:00.123456".to_string();
        assert_eq!(post.published().unwrap().offset().local_minus_utc(), 0);

        post.published_at = "yesterday".to_string();
        assert!(post.published().is_none());
    }

    #[test]
    fn test_new_schedule_event_serializes_empty_description() {
        let body = NewScheduleEvent {
            title: "Mass start".to_string(),
            event_date: "2026-01-01".to_string(),
            event_time: "12:00".to_string(),
            sport: "Biathlon".to_string(),
            description: String::new(),
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["description"], "");
    }
}

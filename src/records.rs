//! Conversion of decoded feed entities into JSONL ingest records.

use serde::Serialize;
use serde_json::Value;

use crate::projection::{Project, fields_to_json, str_field};

/// One stored line: a single feed entity plus ingestion metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestRecord {
    pub fetch_ts: String,
    pub feed_type: String,
    pub source_header_ts: Option<u64>,
    pub entity_id: Option<String>,
    pub payload: Value,
}

/// Lazily converts `entities` into records, one per entity, in order.
pub fn to_records<'a, E: Project>(
    feed_type: &'a str,
    entities: &'a [E],
    fetch_ts: &'a str,
    source_header_ts: Option<u64>,
) -> impl Iterator<Item = IngestRecord> + 'a {
    entities.iter().map(move |entity| {
        let fields = entity.fields();
        let entity_id = str_field(&fields, "id").map(str::to_string);

        IngestRecord {
            fetch_ts: fetch_ts.to_string(),
            feed_type: feed_type.to_string(),
            source_header_ts,
            entity_id,
            payload: fields_to_json(fields),
        }
    })
}

/// Serializes records as newline-delimited JSON.
///
/// Lines are joined with `\n` and the body always ends with one, so an empty
/// feed produces a single `"\n"` rather than an empty body.
pub fn to_jsonl<I>(records: I) -> Result<Vec<u8>, serde_json::Error>
where
    I: IntoIterator<Item = IngestRecord>,
{
    let mut body = Vec::new();
    for (i, record) in records.into_iter().enumerate() {
        if i > 0 {
            body.push(b'\n');
        }
        serde_json::to_writer(&mut body, &record)?;
    }
    body.push(b'\n');
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gtfs_rt::{FeedEntity, VehicleDescriptor, VehiclePosition};
    use serde_json::json;

    const TS: &str = "2024-05-01T12:30:00Z";

    fn entity(id: &str) -> FeedEntity {
        FeedEntity {
            id: id.to_string(),
            vehicle: Some(VehiclePosition {
                vehicle: Some(VehicleDescriptor {
                    label: Some("Bus".to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_entity_ids_in_order() {
        let entities = vec![entity("V1"), entity("")];
        let records: Vec<_> = to_records("vehicles", &entities, TS, Some(1714566600)).collect();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].entity_id.as_deref(), Some("V1"));
        assert_eq!(records[1].entity_id, None);
        assert_eq!(records[0].payload["id"], "V1");
        assert!(records[1].payload.get("id").is_none());
        assert_eq!(records[1].payload["vehicle"]["vehicle"]["label"], "Bus");
    }

    #[test]
    fn test_record_line_shape() {
        let entities = vec![entity("V1")];
        let body = to_jsonl(to_records("vehicles", &entities, TS, None)).unwrap();
        let line: Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(
            line,
            json!({
                "fetch_ts": TS,
                "feed_type": "vehicles",
                "source_header_ts": null,
                "entity_id": "V1",
                "payload": {"id": "V1", "vehicle": {"vehicle": {"label": "Bus"}}}
            })
        );

        let text = String::from_utf8(body).unwrap();
        assert!(text.starts_with(r#"{"fetch_ts":"2024-05-01T12:30:00Z","feed_type":"vehicles","#));
    }

    #[test]
    fn test_body_has_one_line_per_entity() {
        let entities: Vec<_> = (0..5).map(|i| entity(&format!("V{i}"))).collect();
        let body = to_jsonl(to_records("vehicles", &entities, TS, Some(1))).unwrap();
        let text = String::from_utf8(body).unwrap();

        assert!(text.ends_with('\n'));
        assert!(!text.ends_with("\n\n"));
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 5);
        for (i, line) in lines.iter().enumerate() {
            let value: Value = serde_json::from_str(line).unwrap();
            assert_eq!(value["entity_id"], format!("V{i}"));
            assert_eq!(value["source_header_ts"], 1);
        }
    }

    #[test]
    fn test_empty_feed_is_single_newline() {
        let entities: Vec<FeedEntity> = vec![];
        let body = to_jsonl(to_records("alerts", &entities, TS, None)).unwrap();
        assert_eq!(body, b"\n");
    }
}

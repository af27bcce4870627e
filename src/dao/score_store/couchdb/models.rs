use std::fmt::Write;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::dao::score_store::{CollectionPath, couchdb::error::CouchDaoError};

pub const SEPARATOR: &str = "::";
pub const SLOT_KIND: &str = "slot";
pub const GAME_KIND: &str = "game";
pub const ROSTER_KIND: &str = "roster";
pub const END_SUFFIX: &str = "\u{ffff}";
/// Leading marker of the owner segment. Keeps ids clear of CouchDB's reserved `_` prefix.
const OWNER_TAG: char = 'u';

#[derive(Debug, Deserialize)]
pub struct AllDocsResponse {
    pub rows: Vec<AllDocsRow>,
}

#[derive(Debug, Deserialize)]
pub struct AllDocsRow {
    pub id: String,
    #[serde(default)]
    pub doc: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct ChangesResponse {
    pub results: Vec<ChangeRow>,
    pub last_seq: Value,
}

#[derive(Debug, Deserialize)]
pub struct ChangeRow {
    pub id: String,
}

/// Any entity wrapped with CouchDB's bookkeeping fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchDocument<T> {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub body: T,
}

/// Minimal revision view used for deletions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevisionOnly {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev")]
    pub rev: String,
}

#[derive(Debug, Serialize)]
pub struct BulkDeleteRequest {
    pub docs: Vec<DeletedDocument>,
}

#[derive(Debug, Serialize)]
pub struct DeletedDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev")]
    pub rev: String,
    #[serde(rename = "_deleted")]
    pub deleted: bool,
}

/// Owner segment of a document id: the tag followed by the owner's UTF-8
/// bytes in lowercase hex, so any user handle yields a plain ASCII id.
fn owner_segment(owner: &str) -> String {
    let mut segment = String::with_capacity(1 + owner.len() * 2);
    segment.push(OWNER_TAG);
    for byte in owner.bytes() {
        let _ = write!(segment, "{byte:02x}");
    }
    segment
}

fn owner_from_segment(segment: &str) -> Option<String> {
    let hex = segment.strip_prefix(OWNER_TAG)?;
    if hex.is_empty() || hex.len() % 2 != 0 {
        return None;
    }
    let bytes = (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok())
        .collect::<Option<Vec<u8>>>()?;
    String::from_utf8(bytes).ok()
}

/// `_all_docs` range bounds for every document under `prefix`, as JSON strings.
pub fn key_range(prefix: &str) -> (String, String) {
    (
        Value::String(prefix.to_string()).to_string(),
        Value::String(format!("{prefix}{END_SUFFIX}")).to_string(),
    )
}

pub fn slots_prefix(owner: &str) -> String {
    format!("{}{SEPARATOR}{SLOT_KIND}{SEPARATOR}", owner_segment(owner))
}

pub fn slot_doc_id(owner: &str, id: Uuid) -> String {
    format!("{}{}", slots_prefix(owner), id)
}

pub fn games_prefix(owner: &str, slot_id: Uuid) -> String {
    format!(
        "{}{SEPARATOR}{GAME_KIND}{SEPARATOR}{slot_id}{SEPARATOR}",
        owner_segment(owner)
    )
}

pub fn game_doc_id(owner: &str, slot_id: Uuid, id: Uuid) -> String {
    format!("{}{}", games_prefix(owner, slot_id), id)
}

pub fn roster_prefix(owner: &str) -> String {
    format!("{}{SEPARATOR}{ROSTER_KIND}{SEPARATOR}", owner_segment(owner))
}

pub fn roster_doc_id(owner: &str, id: Uuid) -> String {
    format!("{}{}", roster_prefix(owner), id)
}

/// Map a document identifier back to the collection it belongs to.
pub fn collection_of(doc_id: &str) -> Result<CollectionPath, CouchDaoError> {
    let invalid = |kind| CouchDaoError::InvalidDocId {
        doc_id: doc_id.to_string(),
        kind,
    };

    let mut parts = doc_id.split(SEPARATOR);
    let owner = parts
        .next()
        .and_then(owner_from_segment)
        .ok_or_else(|| invalid("malformed owner"))?;

    match parts.next() {
        Some(SLOT_KIND) => Ok(CollectionPath::Slots { owner }),
        Some(ROSTER_KIND) => Ok(CollectionPath::Roster { owner }),
        Some(GAME_KIND) => {
            let slot_id = parts
                .next()
                .and_then(|raw| Uuid::parse_str(raw).ok())
                .ok_or_else(|| invalid("invalid slot UUID"))?;
            Ok(CollectionPath::Games { owner, slot_id })
        }
        _ => Err(invalid("unknown collection")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_ids_map_back_to_collections() {
        let slot_id = Uuid::new_v4();
        let game_id = Uuid::new_v4();

        assert_eq!(
            collection_of(&slot_doc_id("u1", slot_id)).unwrap(),
            CollectionPath::Slots { owner: "u1".into() }
        );
        assert_eq!(
            collection_of(&game_doc_id("u1", slot_id, game_id)).unwrap(),
            CollectionPath::Games {
                owner: "u1".into(),
                slot_id
            }
        );
        assert_eq!(
            collection_of(&roster_doc_id("u1", Uuid::new_v4())).unwrap(),
            CollectionPath::Roster { owner: "u1".into() }
        );
    }

    #[test]
    fn awkward_owners_produce_plain_ids() {
        for owner in ["a\"b", "_x", "back\\slash", "é::ü"] {
            let slot_id = Uuid::new_v4();
            let doc_id = game_doc_id(owner, slot_id, Uuid::new_v4());
            assert!(!doc_id.starts_with('_'));
            assert!(!doc_id.contains('"') && !doc_id.contains('\\'));
            assert_eq!(
                collection_of(&doc_id).unwrap(),
                CollectionPath::Games {
                    owner: owner.to_string(),
                    slot_id
                }
            );
        }
    }

    #[test]
    fn range_keys_are_valid_json_strings() {
        let prefix = slots_prefix("a\"b");
        let (start, end) = key_range(&prefix);
        assert_eq!(serde_json::from_str::<String>(&start).unwrap(), prefix);
        assert_eq!(
            serde_json::from_str::<String>(&end).unwrap(),
            format!("{prefix}{END_SUFFIX}")
        );
    }

    #[test]
    fn design_documents_are_rejected() {
        assert!(collection_of("_design::views").is_err());
        assert!(collection_of("u1::game::not-a-uuid::x").is_err());
    }
}

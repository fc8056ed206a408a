use crate::domain::entities::{
    ChangeEvent, ChangeKind, ChangeRecord, CommentRecord, EntityTable, Like, PostRecord,
};
use crate::domain::value_objects::{CommentId, PostId, UserId};
use crate::shared::error::AppError;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ChangeDecodeError {
    #[error("{kind} event for {table} carries no record")]
    MissingRecord { kind: &'static str, table: String },

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Invalid field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

impl From<ChangeDecodeError> for AppError {
    fn from(err: ChangeDecodeError) -> Self {
        AppError::DeserializationError(err.to_string())
    }
}

/// 生の変更レコードを型付きイベントへ変換する。
/// 未知の種別・テーブルは `Ok(None)`（呼び出し側でログを出して無視する）
pub(crate) fn decode_change(record: &ChangeRecord) -> Result<Option<ChangeEvent>, ChangeDecodeError> {
    let Some(kind) = ChangeKind::parse(&record.kind) else {
        return Ok(None);
    };
    let Some(table) = EntityTable::parse(&record.table) else {
        return Ok(None);
    };

    let event = match (table, kind) {
        (EntityTable::Posts, ChangeKind::Insert) => {
            ChangeEvent::PostCreated(post_record(new_fields(record, kind)?)?)
        }
        (EntityTable::Posts, ChangeKind::Update) => {
            ChangeEvent::PostUpdated(post_record(new_fields(record, kind)?)?)
        }
        (EntityTable::Posts, ChangeKind::Delete) => {
            let old = old_fields(record, kind)?;
            ChangeEvent::PostDeleted {
                post_id: id_field(old, &["id"], "id").and_then(post_id)?,
            }
        }
        (EntityTable::Comments, ChangeKind::Insert) => {
            ChangeEvent::CommentCreated(comment_record(new_fields(record, kind)?)?)
        }
        // コメント編集は扱わない
        (EntityTable::Comments, ChangeKind::Update) => return Ok(None),
        (EntityTable::Comments, ChangeKind::Delete) => {
            let old = old_fields(record, kind)?;
            ChangeEvent::CommentDeleted {
                post_id: optional_id_field(old, &["postId", "post_id"])
                    .map(post_id)
                    .transpose()?,
                comment_id: id_field(old, &["id"], "id").and_then(comment_id)?,
            }
        }
        (EntityTable::PostLikes, ChangeKind::Insert) => {
            ChangeEvent::LikeAdded(like_record(new_fields(record, kind)?)?)
        }
        (EntityTable::PostLikes, ChangeKind::Update) => return Ok(None),
        (EntityTable::PostLikes, ChangeKind::Delete) => {
            ChangeEvent::LikeRemoved(like_record(old_fields(record, kind)?)?)
        }
    };

    Ok(Some(event))
}

fn non_empty(value: Option<&Value>) -> Option<&Map<String, Value>> {
    value
        .and_then(Value::as_object)
        .filter(|fields| !fields.is_empty())
}

fn new_fields(
    record: &ChangeRecord,
    kind: ChangeKind,
) -> Result<&Map<String, Value>, ChangeDecodeError> {
    non_empty(record.new_record.as_ref()).ok_or_else(|| ChangeDecodeError::MissingRecord {
        kind: kind.as_str(),
        table: record.table.clone(),
    })
}

fn old_fields(
    record: &ChangeRecord,
    kind: ChangeKind,
) -> Result<&Map<String, Value>, ChangeDecodeError> {
    non_empty(record.old_record.as_ref()).ok_or_else(|| ChangeDecodeError::MissingRecord {
        kind: kind.as_str(),
        table: record.table.clone(),
    })
}

/// IDは数値・文字列のどちらでも届く
fn optional_id_field(fields: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| fields.get(*key))
        .and_then(|value| match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

fn id_field(
    fields: &Map<String, Value>,
    keys: &[&str],
    name: &'static str,
) -> Result<String, ChangeDecodeError> {
    optional_id_field(fields, keys).ok_or(ChangeDecodeError::MissingField(name))
}

fn string_field(
    fields: &Map<String, Value>,
    key: &'static str,
) -> Result<String, ChangeDecodeError> {
    match fields.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Null) | None => Err(ChangeDecodeError::MissingField(key)),
        Some(other) => Err(ChangeDecodeError::InvalidField {
            field: key,
            reason: format!("expected string, got {other}"),
        }),
    }
}

fn optional_string_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    fields
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn timestamp_field(
    fields: &Map<String, Value>,
) -> Result<Option<DateTime<Utc>>, ChangeDecodeError> {
    let Some(raw) = ["created_at", "createdAt"]
        .iter()
        .find_map(|key| fields.get(*key).and_then(Value::as_str))
    else {
        return Ok(None);
    };
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(dt.with_timezone(&Utc)));
    }
    // タイムゾーン無しの timestamp 列は UTC とみなす
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| Some(naive.and_utc()))
        .map_err(|err| ChangeDecodeError::InvalidField {
            field: "created_at",
            reason: err.to_string(),
        })
}

fn invalid(field: &'static str) -> impl Fn(String) -> ChangeDecodeError {
    move |reason| ChangeDecodeError::InvalidField { field, reason }
}

fn post_id(value: String) -> Result<PostId, ChangeDecodeError> {
    PostId::new(value).map_err(invalid("postId"))
}

fn comment_id(value: String) -> Result<CommentId, ChangeDecodeError> {
    CommentId::new(value).map_err(invalid("id"))
}

fn user_id(value: String) -> Result<UserId, ChangeDecodeError> {
    UserId::new(value).map_err(invalid("userId"))
}

fn post_record(fields: &Map<String, Value>) -> Result<PostRecord, ChangeDecodeError> {
    Ok(PostRecord {
        id: id_field(fields, &["id"], "id").and_then(post_id)?,
        user_id: id_field(fields, &["userId", "user_id"], "userId").and_then(user_id)?,
        body: optional_string_field(fields, "body").unwrap_or_default(),
        file: optional_string_field(fields, "file"),
        created_at: timestamp_field(fields)?,
    })
}

fn comment_record(fields: &Map<String, Value>) -> Result<CommentRecord, ChangeDecodeError> {
    Ok(CommentRecord {
        id: id_field(fields, &["id"], "id").and_then(comment_id)?,
        post_id: id_field(fields, &["postId", "post_id"], "postId").and_then(post_id)?,
        user_id: id_field(fields, &["userId", "user_id"], "userId").and_then(user_id)?,
        text: string_field(fields, "text")?,
        created_at: timestamp_field(fields)?,
    })
}

fn like_record(fields: &Map<String, Value>) -> Result<Like, ChangeDecodeError> {
    Ok(Like::new(
        id_field(fields, &["postId", "post_id"], "postId").and_then(post_id)?,
        id_field(fields, &["userId", "user_id"], "userId").and_then(user_id)?,
    ))
}

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::error::StorageError;

pub const MAX_KEY_LEN: usize = 1024;
const MAX_SAFE_NAME_LEN: usize = 50;

/// Reduces a client file name to `[A-Za-z0-9._-]`.
///
/// Every run of other characters becomes a single `_`, leading and trailing
/// `_`/`.` are trimmed, and the result is capped at 50 characters. Falls back
/// to `file` when nothing usable is left.
pub fn sanitize_file_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_was_sep = false;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_') {
            if ch == '_' {
                if last_was_sep {
                    continue;
                }
                last_was_sep = true;
            } else {
                last_was_sep = false;
            }
            out.push(ch);
        } else if !last_was_sep {
            out.push('_');
            last_was_sep = true;
        }
    }

    let trimmed = out.trim_matches(|c| c == '_' || c == '.');
    let capped: String = trimmed.chars().take(MAX_SAFE_NAME_LEN).collect();
    let capped = capped.trim_end_matches(|c| c == '_' || c == '.');
    if capped.is_empty() {
        "file".to_string()
    } else {
        capped.to_string()
    }
}

/// Rejects keys that could escape the store root or are too long.
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("key is empty".into()));
    }
    if key.len() > MAX_KEY_LEN {
        return Err(StorageError::InvalidKey(format!(
            "key is {} bytes, limit is {MAX_KEY_LEN}",
            key.len()
        )));
    }
    if key.starts_with('/') || key.contains("//") || key.contains("..") || key.contains('\\') {
        return Err(StorageError::InvalidKey(format!("'{key}' is not a safe path")));
    }
    Ok(())
}

/// Components of an evidence object key:
/// `{owner}/{page_key}/{year}/[{month}/]{unix_ms}_{rand}_{safe_name}`.
#[derive(Debug, Clone)]
pub struct ObjectKey<'a> {
    pub owner_id: Uuid,
    pub page_key: &'a str,
    pub period_year: i32,
    pub month: Option<u8>,
    pub file_name: &'a str,
}

impl ObjectKey<'_> {
    pub fn render(&self, now: DateTime<Utc>) -> Result<String, StorageError> {
        let nonce: u32 = rand::random();
        let safe_name = sanitize_file_name(self.file_name);
        let file_part = format!("{}_{nonce:08x}_{safe_name}", now.timestamp_millis());

        let key = match self.month {
            Some(month) => format!(
                "{}/{}/{}/{month:02}/{file_part}",
                self.owner_id, self.page_key, self.period_year
            ),
            None => format!(
                "{}/{}/{}/{file_part}",
                self.owner_id, self.page_key, self.period_year
            ),
        };
        validate_key(&key)?;
        Ok(key)
    }
}

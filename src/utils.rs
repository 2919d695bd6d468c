use crate::config::ExportMode;
use crate::error::{ExportError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;

const LEGACY_S3_PREFIX: &str = "https://s3-us-west-2.amazonaws.com/www.guilded.gg/";
const CDN_PREFIX: &str = "https://cdn.gldcdn.com/";

/// Serialize `value` as pretty JSON next to `path`, then rename it into place.
///
/// Readers only ever observe the previous file or the complete new one.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(|e| ExportError::io(dir, e))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| ExportError::io(dir, e))?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        serde_json::to_writer_pretty(&mut writer, value).map_err(|e| ExportError::json(path, e))?;
        writer.flush().map_err(|e| ExportError::io(path, e))?;
    }
    tmp.as_file()
        .sync_all()
        .map_err(|e| ExportError::io(path, e))?;
    tmp.persist(path)
        .map_err(|e| ExportError::io(path, e.error))?;
    Ok(())
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).map_err(|e| ExportError::io(path, e))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| ExportError::json(path, e))
}

/// Rewrite legacy S3 asset URLs to the current CDN host, recursively.
pub fn fix_cdn_urls(value: &mut Value) {
    match value {
        Value::String(s) => {
            if let Some(rest) = s.strip_prefix(LEGACY_S3_PREFIX) {
                *s = format!("{CDN_PREFIX}{rest}");
            }
        }
        Value::Array(items) => items.iter_mut().for_each(fix_cdn_urls),
        Value::Object(map) => map.values_mut().for_each(fix_cdn_urls),
        _ => {}
    }
}

/// Extract the asset hash from a CDN URL: the file stem, cut at the first `-`.
///
/// `https://cdn.gldcdn.com/UserAvatar/abc123-Large.png` → `abc123`.
pub fn avatar_hash(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    let path = match url::Url::parse(raw) {
        Ok(u) => u.path().to_string(),
        Err(_) => raw.to_string(),
    };
    let file_name = path.rsplit('/').next().unwrap_or("");
    let stem = match file_name.rfind('.') {
        Some(0) | None => file_name,
        Some(idx) => &file_name[..idx],
    };
    stem.split('-').next().unwrap_or(stem).to_string()
}

/// String field accessor that treats missing and non-string values as absent.
pub fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

pub fn readme_text(
    mode: ExportMode,
    servers: &[(String, String)],
    exported_at: DateTime<Utc>,
) -> String {
    let stamp = exported_at.format("%Y-%m-%d %H:%M:%S");
    let mut server_lines = String::new();
    for (id, name) in servers {
        server_lines.push_str(&format!("Server: {name} ({id})\n"));
    }

    match mode {
        ExportMode::Raw => format!(
            "GUILDED RAW DATA EXPORT

This export contains raw JSON responses from the Guilded API, captured with
cursor-based pagination (beforeId) so the complete message history is kept.

{server_lines}Export Date: {stamp}

Files (raw/):
- user.json - Your user data
- server_*_info.json - Server information
- server_*_channels.json - Complete channel list
- server_*_members.json - Server members
- server_*_groups.json - Server groups
- server_*_roles.json - Server roles and permissions
- server_*_checkpoint.json - Capture progress, used to resume an interrupted run
- channel_*_messages.json - Complete message history per channel
- channel_*_pinned.json - Pinned messages per channel
- channel_*_threads.json - Thread listings per channel
- dm_channels.json - Direct message channels (when requested)

This raw data preserves all Guilded-specific fields and can be used to write
custom importers for Spacebar or other platforms.
"
        ),
        ExportMode::Translated => format!(
            "GUILDED DATA EXPORT (Discord Takeout Format)

This export contains your Guilded server data in Discord takeout format,
compatible with Spacebar import.

{server_lines}Export Date: {stamp}

Export Structure:
- account/          Your user account data
- messages/         All channel messages with full metadata
- servers/          Server/guild information and roles
- raw/              The raw capture the takeout was translated from

For more information about importing this data into Spacebar, please refer
to the Spacebar documentation.
"
        ),
    }
}

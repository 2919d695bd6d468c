use crate::capture::{CaptureOutcome, capture_channel};
use crate::checkpoint::CheckpointStore;
use crate::client::Api;
use crate::config::{ExportConfig, ExportMode};
use crate::error::{ExportError, Result};
use crate::paginate::{FetchOutcome, PaginatedFetcher, Resource};
use crate::schema::{
    DiscordMessage, DiscordRole, content_type, is_supported_channel, map_channels, map_guild,
    map_message, map_role, map_user, role_records,
};
use crate::spool::PageSpool;
use crate::utils::{read_json, readme_text, str_field, write_json_atomic};
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use tracing::{debug, error, info, warn};

/// Server-level resources snapshotted verbatim before any channel is captured.
const SERVER_SNAPSHOTS: [&str; 5] = ["info", "channels", "members", "groups", "roles"];

/// Counts reported at the end of a run. Nothing is counted as captured unless
/// its merged artifact is on disk.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub servers: usize,
    /// Channels captured to completion in this run.
    pub captured: usize,
    /// Channels a previous run had already finished.
    pub already_done: usize,
    /// Channels whose capture stopped early; rerun to resume them.
    pub partial: usize,
    /// Channels with no Discord counterpart, left out of a translated export.
    pub skipped: usize,
    pub messages: usize,
    /// Failed snapshot requests and other non-fatal problems.
    pub errors: usize,
}

impl ExportSummary {
    pub fn is_complete(&self) -> bool {
        self.partial == 0 && self.errors == 0
    }
}

/// What one server's capture produced, kept for the translation pass.
struct ServerCapture {
    id: String,
    name: String,
    info: Option<Value>,
    roles: Option<Value>,
    channels: Vec<Value>,
}

/// Run a complete export: capture every requested server into `<target>/raw`,
/// then, in translated mode, write the Discord takeout next to it.
///
/// Fails before writing anything if the credentials are rejected.
pub fn run<A: Api>(config: &ExportConfig, api: A) -> Result<ExportSummary> {
    let params = [("isLogin", "false".to_string()), ("v2", "true".to_string())];
    let me = match api.get("me", &params) {
        Ok(me) => Some(me),
        Err(e) if e.is_auth() => return Err(ExportError::Auth(e)),
        Err(e) if config.servers.is_empty() => return Err(e.into()),
        Err(e) => {
            warn!("account profile unavailable, continuing with the requested servers: {e}");
            None
        }
    };

    let raw_dir = config.raw_dir();
    fs::create_dir_all(&raw_dir).map_err(|e| ExportError::io(&raw_dir, e))?;
    if let Some(me) = &me {
        write_json_atomic(&raw_dir.join("user.json"), me)?;
    }

    let servers = resolve_servers(config, me.as_ref());
    if servers.is_empty() {
        warn!("no servers to export");
    }

    let fetcher = PaginatedFetcher::new(api, config.page_delay, config.retry);
    let mut summary = ExportSummary::default();
    let mut captures = Vec::new();

    for (server_id, server_name) in &servers {
        info!(server_id = %server_id, server_name = %server_name, "exporting server");
        if let Some(capture) = capture_server(&fetcher, config, server_id, server_name, &mut summary)? {
            summary.servers += 1;
            captures.push(capture);
        }
    }

    if config.include_dms {
        capture_dm_channels(&fetcher, config, me.as_ref(), &mut summary)?;
    }

    if config.mode == ExportMode::Translated {
        translate(config, me.as_ref(), &captures)?;
    }

    let listed: Vec<(String, String)> = captures
        .iter()
        .map(|c| (c.id.clone(), c.name.clone()))
        .collect();
    let readme = config.target_dir.join("README.txt");
    fs::write(&readme, readme_text(config.mode, &listed, Utc::now()))
        .map_err(|e| ExportError::io(&readme, e))?;

    Ok(summary)
}

/// Servers to export as `(id, name)`: the explicit list if one was given,
/// otherwise every team on the account.
fn resolve_servers(config: &ExportConfig, me: Option<&Value>) -> Vec<(String, String)> {
    let teams: Vec<(String, String)> = me
        .and_then(|m| m.get("teams"))
        .and_then(Value::as_array)
        .map(|teams| {
            teams
                .iter()
                .filter_map(|t| {
                    let id = str_field(t, "id")?;
                    Some((id.to_string(), str_field(t, "name").unwrap_or(id).to_string()))
                })
                .collect()
        })
        .unwrap_or_default();

    if config.servers.is_empty() {
        return teams;
    }
    config
        .servers
        .iter()
        .map(|id| {
            let name = teams
                .iter()
                .find(|(team_id, _)| team_id == id)
                .map(|(_, name)| name.clone())
                .unwrap_or_else(|| id.clone());
            (id.clone(), name)
        })
        .collect()
}

fn progress_bar(quiet: bool, len: usize) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(len as u64);
    if let Ok(style) =
        ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        bar.set_style(style.progress_chars("=>-"));
    }
    bar
}

/// GET one server resource and store it as `server_<id>_<resource>.json`.
/// A failed request, including a 403, is logged and counted.
fn snapshot<A: Api>(
    api: &A,
    raw_dir: &Path,
    server_id: &str,
    resource: &str,
    summary: &mut ExportSummary,
) -> Result<Option<Value>> {
    let endpoint = format!("teams/{server_id}/{resource}");
    match api.get(&endpoint, &[]) {
        Ok(body) => {
            let path = raw_dir.join(format!("server_{server_id}_{resource}.json"));
            write_json_atomic(&path, &body)?;
            Ok(Some(body))
        }
        Err(e) => {
            warn!(server_id, resource, "snapshot failed: {e}");
            summary.errors += 1;
            Ok(None)
        }
    }
}

fn capture_server<A: Api>(
    fetcher: &PaginatedFetcher<A>,
    config: &ExportConfig,
    server_id: &str,
    server_name: &str,
    summary: &mut ExportSummary,
) -> Result<Option<ServerCapture>> {
    let raw_dir = config.raw_dir();
    let mut snapshots: BTreeMap<&str, Value> = BTreeMap::new();
    for resource in SERVER_SNAPSHOTS {
        if let Some(body) = snapshot(fetcher.api(), &raw_dir, server_id, resource, summary)? {
            snapshots.insert(resource, body);
        }
    }

    let Some(listing) = snapshots.remove("channels") else {
        error!(server_id, "channel listing unavailable; skipping server");
        return Ok(None);
    };
    let info = snapshots.remove("info");
    let server_name = info
        .as_ref()
        .and_then(|i| i.get("team"))
        .and_then(|t| str_field(t, "name"))
        .unwrap_or(server_name)
        .to_string();

    let channels: Vec<Value> = listing
        .get("channels")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let wanted: Vec<(&str, &Value)> = channels
        .iter()
        .filter(|c| config.mode == ExportMode::Raw || is_supported_channel(c))
        .filter_map(|c| Some((str_field(c, "id")?, c)))
        .collect();
    summary.skipped += channels.len() - wanted.len();

    let mut store = CheckpointStore::open(&raw_dir, server_id, &server_name, config.mode)?;
    store.register_channels(wanted.iter().map(|(id, _)| *id))?;

    let pb = progress_bar(config.quiet, wanted.len());
    pb.println(format!("{server_name}: {} channels.", wanted.len()));

    for (channel_id, channel) in wanted {
        pb.set_message(str_field(channel, "name").unwrap_or(channel_id).to_string());
        let spool = PageSpool::new(&raw_dir, channel_id);
        match capture_channel(fetcher, &spool, &mut store, channel)? {
            CaptureOutcome::AlreadyDone { messages } => {
                summary.already_done += 1;
                summary.messages += messages;
            }
            CaptureOutcome::Complete { pages, messages } => {
                info!(channel_id, pages, messages, "channel captured");
                summary.captured += 1;
                summary.messages += messages;
            }
            CaptureOutcome::Partial {
                pages,
                messages,
                error,
            } => {
                warn!(
                    channel_id,
                    pages, messages, "channel capture incomplete, rerun to resume: {error}"
                );
                summary.partial += 1;
                pb.inc(1);
                continue;
            }
        }
        if !store.extras_captured(channel_id)
            && capture_channel_extras(fetcher, &raw_dir, channel_id, content_type(channel), summary)?
        {
            store.mark_extras_captured(channel_id)?;
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    Ok(Some(ServerCapture {
        id: server_id.to_string(),
        name: server_name,
        info,
        roles: snapshots.remove("roles"),
        channels,
    }))
}

/// Pinned messages and thread listing of a captured channel. Returns whether
/// both were fetched; failures are counted and retried on the next run.
fn capture_channel_extras<A: Api>(
    fetcher: &PaginatedFetcher<A>,
    raw_dir: &Path,
    channel_id: &str,
    kind: &str,
    summary: &mut ExportSummary,
) -> Result<bool> {
    let mut captured = true;
    let endpoint = format!("channels/{channel_id}/messages/pinned");
    match fetcher.api().get(&endpoint, &[]) {
        Ok(body) => {
            let pinned = body
                .get("messages")
                .and_then(Value::as_array)
                .is_some_and(|m| !m.is_empty());
            if pinned {
                write_json_atomic(&raw_dir.join(format!("channel_{channel_id}_pinned.json")), &body)?;
            }
        }
        Err(e) => {
            warn!(channel_id, "pinned messages unavailable: {e}");
            summary.errors += 1;
            captured = false;
        }
    }

    if kind != "chat" {
        return Ok(captured);
    }
    let (threads, outcome) = fetcher.fetch_all(&Resource::channel_threads(channel_id));
    if let FetchOutcome::Partial(e) = outcome {
        warn!(channel_id, captured = threads.len(), "thread listing incomplete: {e}");
        summary.errors += 1;
        captured = false;
    }
    if !threads.is_empty() {
        write_json_atomic(
            &raw_dir.join(format!("channel_{channel_id}_threads.json")),
            &json!({ "threads": threads }),
        )?;
    }
    Ok(captured)
}

fn capture_dm_channels<A: Api>(
    fetcher: &PaginatedFetcher<A>,
    config: &ExportConfig,
    me: Option<&Value>,
    summary: &mut ExportSummary,
) -> Result<()> {
    let Some(user_id) = me.and_then(|m| m.get("user")).and_then(|u| str_field(u, "id")) else {
        warn!("direct messages need the account profile; skipping them");
        summary.errors += 1;
        return Ok(());
    };
    let (channels, outcome) = fetcher.fetch_all(&Resource::dm_channels(user_id));
    if let FetchOutcome::Partial(e) = outcome {
        warn!(captured = channels.len(), "direct message listing incomplete: {e}");
        summary.errors += 1;
    }
    info!(count = channels.len(), "direct message channels captured");
    write_json_atomic(
        &config.raw_dir().join("dm_channels.json"),
        &json!({ "channels": channels }),
    )
}

/// Ids listed in a channel's pinned snapshot, if one was written.
fn pinned_ids(raw_dir: &Path, channel_id: &str) -> Result<HashSet<String>> {
    let path = raw_dir.join(format!("channel_{channel_id}_pinned.json"));
    if !path.exists() {
        return Ok(HashSet::new());
    }
    let body: Value = read_json(&path)?;
    Ok(body
        .get("messages")
        .and_then(Value::as_array)
        .map(|msgs| {
            msgs.iter()
                .filter_map(|m| str_field(m, "id"))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default())
}

/// Write the Discord takeout from the raw capture.
fn translate(config: &ExportConfig, me: Option<&Value>, captures: &[ServerCapture]) -> Result<()> {
    let out = &config.target_dir;
    let raw_dir = config.raw_dir();

    if let Some(me) = me {
        write_json_atomic(&out.join("account").join("user.json"), &map_user(me))?;
    }

    let mut index: BTreeMap<String, String> = BTreeMap::new();
    for capture in captures {
        let server_dir = out.join("servers").join(&capture.id);
        let guild = map_guild(capture.info.as_ref(), &capture.id, &capture.name);
        write_json_atomic(&server_dir.join("guild.json"), &guild)?;
        write_json_atomic(&server_dir.join("audit-log.json"), &Vec::<Value>::new())?;
        if let Some(roles) = &capture.roles {
            let roles: Vec<DiscordRole> = role_records(roles).into_iter().map(map_role).collect();
            write_json_atomic(&server_dir.join("roles.json"), &roles)?;
        }

        for channel in map_channels(&capture.channels, &capture.id) {
            let dir = out.join("messages").join(format!("c{}", channel.id));
            write_json_atomic(&dir.join("channel.json"), &channel)?;
            index.insert(channel.id.clone(), channel.name.clone());

            let spool = PageSpool::new(&raw_dir, &channel.id);
            if !spool.merged_path().exists() {
                warn!(channel_id = %channel.id, "no complete capture; takeout has no messages for this channel yet");
                continue;
            }
            let merged = spool.read_merged()?;
            let pinned = pinned_ids(&raw_dir, &channel.id)?;
            let messages: Vec<DiscordMessage> = merged
                .messages
                .iter()
                .map(|raw| {
                    let mut message = map_message(raw, &channel.id);
                    message.pinned = pinned.contains(&message.id);
                    message
                })
                .collect();

            write_json_atomic(&dir.join("messages.json"), &messages)?;
            debug!(channel_id = %channel.id, messages = messages.len(), "channel translated");
        }
    }

    write_json_atomic(&out.join("messages").join("index.json"), &index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::ChannelStatus;
    use crate::error::ApiError;
    use crate::paginate::testing::FakeApi;
    use std::time::Duration;
    use tempfile::TempDir;

    fn config(dir: &TempDir, mode: ExportMode) -> ExportConfig {
        let mut config = ExportConfig::new(dir.path(), "token", mode);
        config.page_delay = Duration::ZERO;
        config.quiet = true;
        config
    }

    fn server_api() -> FakeApi {
        FakeApi::new(50)
            .with_object(
                "me",
                json!({
                    "user": {"id": "u1", "name": "ann"},
                    "email": "ann@example.com",
                    "teams": [{"id": "s1", "name": "Server One"}]
                }),
            )
            .with_object("teams/s1/info", json!({"team": {"id": "s1", "name": "Server One"}}))
            .with_object(
                "teams/s1/channels",
                json!({"channels": [
                    {"id": "c1", "name": "general", "contentType": "chat"},
                    {"id": "c2", "name": "calendar", "contentType": "scheduling"}
                ]}),
            )
            .with_object("teams/s1/members", json!({"members": []}))
            .with_object("teams/s1/groups", json!({"groups": []}))
            .with_object(
                "teams/s1/roles",
                json!({"roles": [{"id": 7, "name": "Mod", "permissions": {"general": {"CanKickMembers": true}}}]}),
            )
            .with_object("channels/c1/messages/pinned", json!({"messages": [{"id": "m0119"}]}))
            .with_object("channels/c2/messages/pinned", json!({"messages": []}))
            .with_object("channels/c1/threads", json!({"threads": []}))
            .with_messages("c1", 120)
            .with_messages("c2", 5)
    }

    fn read(path: impl AsRef<Path>) -> Value {
        read_json(path.as_ref()).unwrap()
    }

    #[test]
    fn raw_export_captures_every_channel() {
        let dir = TempDir::new().unwrap();
        let summary = run(&config(&dir, ExportMode::Raw), &server_api()).unwrap();
        assert_eq!(summary.servers, 1);
        assert_eq!(summary.captured, 2);
        assert_eq!(summary.messages, 125);
        assert!(summary.is_complete());

        let raw = dir.path().join("raw");
        assert!(raw.join("user.json").exists());
        for resource in SERVER_SNAPSHOTS {
            assert!(raw.join(format!("server_s1_{resource}.json")).exists());
        }
        assert_eq!(read(raw.join("channel_c1_messages.json"))["total_messages"], 120);
        assert_eq!(read(raw.join("channel_c2_messages.json"))["total_messages"], 5);
        assert!(raw.join("channel_c1_pinned.json").exists());
        assert!(!raw.join("channel_c2_pinned.json").exists());
        assert!(!raw.join("channel_c1_threads.json").exists());
        assert!(dir.path().join("README.txt").exists());
        assert!(!dir.path().join("messages").exists());

        let store = CheckpointStore::open(&raw, "s1", "Server One", ExportMode::Raw).unwrap();
        assert_eq!(store.progress("c1").unwrap().status, ChannelStatus::Done);
    }

    #[test]
    fn translated_export_writes_takeout() {
        let dir = TempDir::new().unwrap();
        let summary = run(&config(&dir, ExportMode::Translated), &server_api()).unwrap();
        assert_eq!(summary.captured, 1);
        assert_eq!(summary.skipped, 1);

        let out = dir.path();
        let index = read(out.join("messages/index.json"));
        assert_eq!(index, json!({"c1": "general"}));

        let channels = read(out.join("raw/server_s1_channels.json"));
        assert_eq!(channels["channels"][1]["id"], "c2");
        assert!(!out.join("raw/channel_c2_messages.json").exists());

        let channel = read(out.join("messages/cc1/channel.json"));
        assert_eq!(channel["type"], 0);
        assert_eq!(channel["guild"]["id"], "s1");

        let messages = read(out.join("messages/cc1/messages.json"));
        let messages = messages.as_array().unwrap();
        assert_eq!(messages.len(), 120);
        assert_eq!(messages[0]["id"], "m0119");
        assert_eq!(messages[0]["pinned"], true);
        assert_eq!(messages[1]["pinned"], false);

        assert_eq!(read(out.join("servers/s1/guild.json"))["name"], "Server One");
        assert_eq!(read(out.join("servers/s1/audit-log.json")), json!([]));
        assert_eq!(read(out.join("servers/s1/roles.json"))[0]["permissions"], "6");
        assert_eq!(read(out.join("account/user.json"))["email"], "ann@example.com");
    }

    struct DeniedApi;

    impl Api for DeniedApi {
        fn get(&self, endpoint: &str, _params: &[(&str, String)]) -> Result<Value, ApiError> {
            Err(ApiError::Unauthorized {
                endpoint: endpoint.to_string(),
                status: 401,
            })
        }
    }

    #[test]
    fn rejected_credentials_write_nothing() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("out");
        let mut config = config(&dir, ExportMode::Raw);
        config.target_dir = target.clone();
        let err = run(&config, DeniedApi).unwrap_err();
        assert!(matches!(err, ExportError::Auth(_)));
        assert!(!target.exists());
    }

    #[test]
    fn interrupted_export_resumes() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir, ExportMode::Raw);
        let api = server_api();
        // me, 5 snapshots, then c1 page 1; page 2 fails.
        api.fail_on_call.set(Some(8));
        let first = run(&config, &api).unwrap();
        assert_eq!(first.partial, 1);
        assert!(!first.is_complete());
        assert!(!dir.path().join("raw/channel_c1_messages.json").exists());
        assert!(dir.path().join("raw/channel_c1_page_1.json").exists());

        api.fail_on_call.set(None);
        let second = run(&config, &api).unwrap();
        assert_eq!(second.partial, 0);
        assert_eq!(second.captured, 1);
        assert_eq!(second.already_done, 1);
        let merged = read(dir.path().join("raw/channel_c1_messages.json"));
        assert_eq!(merged["total_messages"], 120);
        assert!(!dir.path().join("raw/channel_c1_page_1.json").exists());
    }

    #[test]
    fn denied_roles_snapshot_is_skipped() {
        let dir = TempDir::new().unwrap();
        let api = server_api().with_denied("teams/s1/roles");
        let summary = run(&config(&dir, ExportMode::Translated), &api).unwrap();
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.captured, 1);
        assert!(!summary.is_complete());

        let out = dir.path();
        assert!(!out.join("raw/server_s1_roles.json").exists());
        assert!(!out.join("servers/s1/roles.json").exists());
        assert!(out.join("servers/s1/guild.json").exists());
        assert!(out.join("messages/cc1/messages.json").exists());
        assert!(out.join("README.txt").exists());
    }

    #[test]
    fn denied_channel_does_not_stop_the_others() {
        let dir = TempDir::new().unwrap();
        let api = server_api().with_denied("channels/c1/messages");
        let summary = run(&config(&dir, ExportMode::Raw), &api).unwrap();
        assert_eq!(summary.partial, 1);
        assert_eq!(summary.captured, 1);

        let raw = dir.path().join("raw");
        assert!(!raw.join("channel_c1_messages.json").exists());
        assert_eq!(read(raw.join("channel_c2_messages.json"))["total_messages"], 5);
        assert!(dir.path().join("README.txt").exists());
    }

    #[test]
    fn credential_failure_mid_capture_resumes() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir, ExportMode::Raw);
        let api = server_api();
        // me, 5 snapshots, then c1 page 1; page 2 is rejected.
        api.fail_on_call.set(Some(8));
        api.fail_status.set(Some(401));
        let first = run(&config, &api).unwrap();
        assert_eq!(first.partial, 1);
        assert_eq!(first.captured, 1);
        assert!(dir.path().join("raw/channel_c1_page_1.json").exists());

        api.fail_on_call.set(None);
        let second = run(&config, &api).unwrap();
        assert!(second.is_complete());
        assert_eq!(second.captured, 1);
        let merged = read(dir.path().join("raw/channel_c1_messages.json"));
        assert_eq!(merged["total_messages"], 120);
    }

    #[test]
    fn failed_pinned_fetch_is_retried_next_run() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir, ExportMode::Translated);
        let api = server_api();
        // me, 5 snapshots, 3 pages of c1, then the pinned request.
        api.fail_on_call.set(Some(10));
        let first = run(&config, &api).unwrap();
        assert_eq!(first.errors, 1);
        assert!(!first.is_complete());
        assert!(!dir.path().join("raw/channel_c1_pinned.json").exists());
        assert_eq!(read(dir.path().join("messages/cc1/messages.json"))[0]["pinned"], false);

        api.fail_on_call.set(None);
        let second = run(&config, &api).unwrap();
        assert!(second.is_complete());
        assert_eq!(second.already_done, 1);
        assert!(dir.path().join("raw/channel_c1_pinned.json").exists());
        assert_eq!(read(dir.path().join("messages/cc1/messages.json"))[0]["pinned"], true);

        let calls = api.calls.get();
        run(&config, &api).unwrap();
        // Profile and snapshots only.
        assert_eq!(api.calls.get(), calls + 6);
    }

    #[test]
    fn failed_thread_listing_is_counted() {
        let dir = TempDir::new().unwrap();
        let mut api = server_api();
        api.objects.remove("channels/c1/threads");
        let summary = run(&config(&dir, ExportMode::Raw), &api).unwrap();
        assert_eq!(summary.errors, 1);
        assert!(!summary.is_complete());
        assert!(!dir.path().join("raw/channel_c1_threads.json").exists());
    }

    #[test]
    fn partial_channel_keeps_descriptor_in_takeout() {
        let dir = TempDir::new().unwrap();
        let api = server_api().with_denied("channels/c1/messages");
        run(&config(&dir, ExportMode::Translated), &api).unwrap();

        let out = dir.path();
        assert_eq!(read(out.join("messages/index.json")), json!({"c1": "general"}));
        assert_eq!(read(out.join("messages/cc1/channel.json"))["name"], "general");
        assert!(!out.join("messages/cc1/messages.json").exists());
    }

    #[test]
    fn explicit_servers_survive_missing_profile() {
        let dir = TempDir::new().unwrap();
        let mut api = server_api();
        api.objects.remove("me");

        assert!(matches!(
            run(&config(&dir, ExportMode::Raw), &api),
            Err(ExportError::Api(ApiError::Status { status: 404, .. }))
        ));

        let mut config = config(&dir, ExportMode::Raw);
        config.servers = vec!["s1".to_string()];
        let summary = run(&config, &api).unwrap();
        assert_eq!(summary.captured, 2);
        assert!(!dir.path().join("raw/user.json").exists());
    }

    #[test]
    fn direct_message_channels_are_listed() {
        let dir = TempDir::new().unwrap();
        let api = server_api().with_collection(
            "users/u1/channels",
            "channels",
            vec![json!({"id": "d1"}), json!({"id": "d2"})],
        );
        let mut config = config(&dir, ExportMode::Raw);
        config.include_dms = true;
        run(&config, &api).unwrap();
        let dms = read(dir.path().join("raw/dm_channels.json"));
        assert_eq!(dms["channels"].as_array().unwrap().len(), 2);
    }
}

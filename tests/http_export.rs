use guilded_chat_export::client::HttpApi;
use guilded_chat_export::{ExportConfig, ExportError, ExportMode, run};
use mockito::{Matcher, Mock, ServerGuard};
use serde_json::{Value, json};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

fn mock_json(server: &mut ServerGuard, path: &str, status: usize, body: Value) -> Mock {
    server
        .mock("GET", path)
        .match_query(Matcher::Any)
        .with_status(status)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .create()
}

fn config(server: &ServerGuard, target: &Path, mode: ExportMode) -> ExportConfig {
    let mut config = ExportConfig::new(target, "tok", mode);
    config.api_url = server.url();
    config.page_delay = Duration::ZERO;
    config.quiet = true;
    config
}

fn api(config: &ExportConfig) -> HttpApi {
    HttpApi::from_config(config).unwrap()
}

fn read(path: impl AsRef<Path>) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

fn paragraph(text: &str, marks: &[&str]) -> Value {
    let marks: Vec<Value> = marks.iter().map(|m| json!({"object": "mark", "type": m})).collect();
    json!({"object": "value", "document": {"object": "document", "nodes": [
        {"object": "block", "type": "paragraph", "nodes": [
            {"object": "text", "leaves": [{"object": "leaf", "text": text, "marks": marks}]}
        ]}
    ]}})
}

/// A single-server account with one chat channel (3 messages) and one
/// scheduling channel. `messages_status` controls the chat channel's history endpoint.
fn guilded(server: &mut ServerGuard, messages_status: usize) -> Vec<Mock> {
    let mut mocks = vec![
        server
            .mock("GET", "/me")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("isLogin".into(), "false".into()),
                Matcher::UrlEncoded("v2".into(), "true".into()),
            ]))
            .match_header("cookie", "hmac_signed_session=tok; authenticated=true")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "user": {
                        "id": "u1",
                        "name": "ann",
                        "profilePicture": "https://s3-us-west-2.amazonaws.com/www.guilded.gg/UserAvatar/abc-Large.png"
                    },
                    "teams": [{"id": "s1", "name": "Server One"}]
                })
                .to_string(),
            )
            .create(),
        mock_json(server, "/teams/s1/info", 200, json!({"team": {"id": "s1", "name": "Server One"}})),
        mock_json(
            server,
            "/teams/s1/channels",
            200,
            json!({"channels": [
                {"id": "c1", "name": "general", "contentType": "chat", "teamName": "Server One"},
                {"id": "c2", "name": "calendar", "contentType": "scheduling"}
            ]}),
        ),
        mock_json(server, "/teams/s1/members", 200, json!({"members": [{"id": "u1"}]})),
        mock_json(server, "/teams/s1/groups", 200, json!({"groups": []})),
        mock_json(server, "/teams/s1/roles", 200, json!({"roles": []})),
        mock_json(server, "/channels/c1/messages/pinned", 200, json!({"messages": [{"id": "m2"}]})),
        mock_json(server, "/channels/c1/threads", 200, json!({"threads": []})),
        mock_json(server, "/channels/c2/messages", 200, json!({"messages": []})),
        mock_json(server, "/channels/c2/messages/pinned", 200, json!({"messages": []})),
    ];
    let history = if messages_status == 200 {
        json!({"messages": [
            {"id": "m3", "channelId": "c1", "createdBy": "u1", "createdAt": "2024-01-03T00:00:00Z", "content": paragraph("hello", &["bold"])},
            {"id": "m2", "channelId": "c1", "createdBy": "u2", "createdAt": "2024-01-02T00:00:00Z", "content": paragraph("pinned", &[])},
            {"id": "m1", "channelId": "c1", "createdBy": "u1", "createdAt": "2024-01-01T00:00:00Z", "content": paragraph("first", &["italic"])}
        ]})
    } else {
        json!({"error": "upstream"})
    };
    mocks.push(mock_json(server, "/channels/c1/messages", messages_status, history));
    mocks
}

#[test]
fn rejected_session_fails_before_writing() {
    let mut server = mockito::Server::new();
    let me = mock_json(&mut server, "/me", 401, json!({"code": "Unauthorized"}));
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("out");

    let config = config(&server, &target, ExportMode::Raw);
    let err = run(&config, api(&config)).unwrap_err();

    assert!(matches!(err, ExportError::Auth(_)));
    assert!(!target.exists());
    me.assert();
}

#[test]
fn raw_export_over_http() {
    let mut server = mockito::Server::new();
    let _mocks = guilded(&mut server, 200);
    let dir = TempDir::new().unwrap();

    let config = config(&server, dir.path(), ExportMode::Raw);
    let summary = run(&config, api(&config)).unwrap();
    assert_eq!(summary.captured, 2);
    assert_eq!(summary.messages, 3);
    assert!(summary.is_complete());

    let raw = dir.path().join("raw");
    let user = read(raw.join("user.json"));
    assert_eq!(
        user["user"]["profilePicture"],
        "https://cdn.gldcdn.com/UserAvatar/abc-Large.png"
    );
    let merged = read(raw.join("channel_c1_messages.json"));
    assert_eq!(merged["total_messages"], 3);
    assert_eq!(merged["channel"]["name"], "general");
    assert_eq!(merged["messages"][0]["id"], "m3");
    assert!(raw.join("channel_c1_pinned.json").exists());
    assert!(raw.join("server_s1_members.json").exists());
    assert!(dir.path().join("README.txt").exists());

    let checkpoint = read(raw.join("server_s1_checkpoint.json"));
    assert_eq!(checkpoint["channels"]["c1"]["status"], "done");
    assert_eq!(checkpoint["channels"]["c1"]["messages_exported"], 3);
}

#[test]
fn translated_export_over_http() {
    let mut server = mockito::Server::new();
    let _mocks = guilded(&mut server, 200);
    let dir = TempDir::new().unwrap();

    let config = config(&server, dir.path(), ExportMode::Translated);
    let summary = run(&config, api(&config)).unwrap();
    assert_eq!(summary.captured, 1);
    assert_eq!(summary.skipped, 1);

    let out = dir.path();
    assert_eq!(read(out.join("messages/index.json")), json!({"c1": "general"}));
    assert!(!out.join("messages/cc2").exists());

    let messages = read(out.join("messages/cc1/messages.json"));
    let contents: Vec<&str> = messages
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["content"].as_str().unwrap())
        .collect();
    assert_eq!(contents, vec!["**hello**", "pinned", "*first*"]);
    assert_eq!(messages[1]["pinned"], true);
    assert_eq!(messages[0]["pinned"], false);
    assert_eq!(messages[0]["author"]["id"], "u1");

    let channel = read(out.join("messages/cc1/channel.json"));
    assert_eq!(channel["guild"]["name"], "Server One");

    let user = read(out.join("account/user.json"));
    assert_eq!(user["avatar_hash"], "abc");
    assert_eq!(user["discriminator"], "0");
}

#[test]
fn failed_history_resumes_on_next_run() {
    let dir = TempDir::new().unwrap();

    {
        let mut server = mockito::Server::new();
        let _mocks = guilded(&mut server, 502);
        let config = config(&server, dir.path(), ExportMode::Raw);
        let summary = run(&config, api(&config)).unwrap();
        assert_eq!(summary.partial, 1);
        assert!(!dir.path().join("raw/channel_c1_messages.json").exists());
        let checkpoint = read(dir.path().join("raw/server_s1_checkpoint.json"));
        assert_eq!(checkpoint["channels"]["c1"]["status"], "pending");
        assert_eq!(checkpoint["channels"]["c2"]["status"], "done");
    }

    let mut server = mockito::Server::new();
    let _mocks = guilded(&mut server, 200);
    let config = config(&server, dir.path(), ExportMode::Raw);
    let summary = run(&config, api(&config)).unwrap();
    assert_eq!(summary.captured, 1);
    assert_eq!(summary.already_done, 1);
    assert_eq!(summary.partial, 0);
    assert_eq!(
        read(dir.path().join("raw/channel_c1_messages.json"))["total_messages"],
        3
    );
}

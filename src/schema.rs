//! Guilded → Discord takeout record mapping.
//!
//! Every `map_*` function is pure. Fields missing from the source become an
//! empty string, zero, `false` or `null`; nothing is invented.

use crate::document::{Document, MentionTarget};
use crate::permissions::to_bitmask;
use crate::renderer::render;
use crate::utils::{avatar_hash, str_field};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

// Discord channel types.
const GUILD_TEXT: u8 = 0;
const GUILD_VOICE: u8 = 2;
const GUILD_ANNOUNCEMENT: u8 = 5;
const GUILD_STAGE_VOICE: u8 = 13;
const GUILD_FORUM: u8 = 15;
const GUILD_MEDIA: u8 = 16;

/// Guilded channel content type → Discord channel type.
///
/// `None` means the channel has no Discord equivalent and is left out of the
/// takeout. Content types this table does not know become plain text channels.
pub fn discord_channel_type(content_type: &str) -> Option<u8> {
    match content_type {
        "scheduling" => None,
        "chat" => Some(GUILD_TEXT),
        "voice" => Some(GUILD_VOICE),
        "stream" => Some(GUILD_STAGE_VOICE),
        "announcement" => Some(GUILD_ANNOUNCEMENT),
        "forum" | "docs" | "list" => Some(GUILD_FORUM),
        "media" => Some(GUILD_MEDIA),
        _ => Some(GUILD_TEXT),
    }
}

/// A channel's Guilded content type, defaulting to `chat`.
pub fn content_type(channel: &Value) -> &str {
    str_field(channel, "contentType").unwrap_or("chat")
}

pub fn is_supported_channel(channel: &Value) -> bool {
    discord_channel_type(content_type(channel)).is_some()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscordUser {
    pub id: String,
    pub username: String,
    pub discriminator: String,
    pub email: String,
    pub verified: bool,
    pub avatar_hash: String,
    pub banner_hash: String,
}

/// Map the `me` response (`{"user": {...}, "email": ...}`, or a bare user).
pub fn map_user(me: &Value) -> DiscordUser {
    let user = me.get("user").unwrap_or(me);
    let owned = |v: &Value, k: &str| str_field(v, k).unwrap_or_default().to_string();
    DiscordUser {
        id: owned(user, "id"),
        username: owned(user, "name"),
        discriminator: "0".to_string(),
        email: str_field(me, "email")
            .or_else(|| str_field(user, "email"))
            .unwrap_or_default()
            .to_string(),
        verified: true,
        avatar_hash: avatar_hash(str_field(user, "profilePicture").unwrap_or_default()),
        banner_hash: avatar_hash(str_field(user, "profileBannerLg").unwrap_or_default()),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscordGuild {
    pub id: String,
    pub name: String,
    pub icon: String,
    pub description: String,
    pub splash: String,
    pub banner: String,
}

/// Map a `teams/<id>/info` response. Without one, only id and name are known.
pub fn map_guild(info: Option<&Value>, server_id: &str, server_name: &str) -> DiscordGuild {
    let team = info.and_then(|i| i.get("team")).unwrap_or(&Value::Null);
    let text = |k: &str| str_field(team, k).unwrap_or_default().to_string();
    DiscordGuild {
        id: str_field(team, "id").unwrap_or(server_id).to_string(),
        name: str_field(team, "name").unwrap_or(server_name).to_string(),
        icon: avatar_hash(str_field(team, "profilePicture").unwrap_or_default()),
        description: text("description"),
        splash: avatar_hash(str_field(team, "teamDashImage").unwrap_or_default()),
        banner: avatar_hash(str_field(team, "homeBannerImageLg").unwrap_or_default()),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuildRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscordChannel {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: u8,
    pub name: String,
    pub topic: String,
    pub guild: GuildRef,
}

/// Map one channel listing entry, or `None` for unsupported content types.
pub fn map_channel(channel: &Value, server_id: &str) -> Option<DiscordChannel> {
    let kind = discord_channel_type(content_type(channel))?;
    let text = |k: &str| str_field(channel, k).unwrap_or_default().to_string();
    Some(DiscordChannel {
        id: text("id"),
        kind,
        name: text("name"),
        topic: text("description"),
        guild: GuildRef {
            id: server_id.to_string(),
            name: text("teamName"),
        },
    })
}

/// Map a server's channel listing in order, logging every channel left out.
pub fn map_channels(listing: &[Value], server_id: &str) -> Vec<DiscordChannel> {
    listing
        .iter()
        .filter_map(|channel| {
            let mapped = map_channel(channel, server_id);
            if mapped.is_none() {
                info!(
                    server_id,
                    channel_id = str_field(channel, "id").unwrap_or_default(),
                    name = str_field(channel, "name").unwrap_or_default(),
                    content_type = content_type(channel),
                    "skipping unsupported channel type"
                );
            }
            mapped
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscordAuthor {
    pub id: String,
    pub username: String,
    pub discriminator: String,
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscordMessage {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: u8,
    pub content: String,
    pub channel_id: String,
    pub author: DiscordAuthor,
    pub attachments: Vec<Value>,
    pub embeds: Vec<DiscordEmbed>,
    pub mentions: Vec<String>,
    pub mention_roles: Vec<String>,
    pub pinned: bool,
    pub timestamp: String,
    pub edited_timestamp: Option<String>,
    pub tts: bool,
    pub mention_everyone: bool,
    pub reactions: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_id: Option<String>,
}

/// Map one raw Guilded message. `pinned` is left `false`; the caller marks
/// pinned messages once the pinned listing is known.
pub fn map_message(message: &Value, channel_id: &str) -> DiscordMessage {
    let content = message.get("content").unwrap_or(&Value::Null);
    let doc = Document::from_content(content);

    let mut mentions: Vec<String> = Vec::new();
    let mut mention_roles: Vec<String> = Vec::new();
    let mut mention_everyone = false;
    for mention in doc.mentions() {
        match &mention.target {
            MentionTarget::Person(id) if !mentions.contains(id) => mentions.push(id.clone()),
            MentionTarget::Role(id) if !mention_roles.contains(id) => {
                mention_roles.push(id.clone())
            }
            _ if mention.is_broadcast() => mention_everyone = true,
            _ => {}
        }
    }

    let author_id = str_field(message, "createdBy").unwrap_or_default().to_string();

    DiscordMessage {
        id: str_field(message, "id").unwrap_or_default().to_string(),
        kind: 0,
        content: render(&doc),
        channel_id: channel_id.to_string(),
        author: DiscordAuthor {
            id: author_id.clone(),
            username: author_id,
            discriminator: "0".to_string(),
            avatar: None,
        },
        attachments: Vec::new(),
        embeds: doc.embeds().map(map_embed).collect(),
        mentions,
        mention_roles,
        pinned: false,
        timestamp: str_field(message, "createdAt").unwrap_or_default().to_string(),
        edited_timestamp: str_field(message, "updatedAt").map(str::to_string),
        tts: false,
        mention_everyone,
        reactions: Vec::new(),
        webhook_id: str_field(message, "webhookId").map(str::to_string),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedFooter {
    pub text: String,
    pub icon_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedMedia {
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedAuthor {
    pub name: String,
    pub url: Option<String>,
    pub icon_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscordEmbed {
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub color: u64,
    pub timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<EmbedMedia>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<EmbedMedia>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<EmbedAuthor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Value>,
}

fn opt_string(value: &Value, key: &str) -> Option<String> {
    str_field(value, key).map(str::to_string)
}

/// A nested embed object; `null` counts as absent.
fn section<'a>(embed: &'a Value, key: &str) -> Option<&'a Value> {
    embed.get(key).filter(|v| v.is_object())
}

/// `icon_url` and `iconUrl` both occur in the wild.
fn icon_url(value: &Value) -> Option<String> {
    opt_string(value, "icon_url").or_else(|| opt_string(value, "iconUrl"))
}

pub fn map_embed(embed: &Value) -> DiscordEmbed {
    DiscordEmbed {
        title: opt_string(embed, "title"),
        description: opt_string(embed, "description"),
        url: opt_string(embed, "url"),
        color: embed.get("color").and_then(Value::as_u64).unwrap_or(0),
        timestamp: opt_string(embed, "timestamp"),
        footer: section(embed, "footer").map(|f| EmbedFooter {
            text: str_field(f, "text").unwrap_or_default().to_string(),
            icon_url: icon_url(f),
        }),
        thumbnail: section(embed, "thumbnail").map(|t| EmbedMedia {
            url: opt_string(t, "url"),
        }),
        image: section(embed, "image").map(|i| EmbedMedia {
            url: opt_string(i, "url"),
        }),
        author: section(embed, "author").map(|a| EmbedAuthor {
            name: str_field(a, "name").unwrap_or_default().to_string(),
            url: opt_string(a, "url"),
            icon_url: icon_url(a),
        }),
        fields: embed.get("fields").cloned(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscordRole {
    pub id: String,
    pub name: String,
    pub color: u64,
    pub position: i64,
    /// Bitmask as a decimal string, the way Discord serializes permissions.
    pub permissions: String,
}

pub fn map_role(role: &Value) -> DiscordRole {
    let id = match role.get("id") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };
    let color = match role.get("color") {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(Value::String(s)) => u64::from_str_radix(s.trim_start_matches('#'), 16).unwrap_or(0),
        _ => 0,
    };
    DiscordRole {
        id,
        name: str_field(role, "name").unwrap_or_default().to_string(),
        color,
        position: role.get("priority").and_then(Value::as_i64).unwrap_or(0),
        permissions: to_bitmask(role.get("permissions").unwrap_or(&Value::Null)).to_string(),
    }
}

/// Role records from a `teams/<id>/roles` response, which carries either a
/// `roles` array or a `rolesById` object.
pub fn role_records(response: &Value) -> Vec<&Value> {
    if let Some(roles) = response.get("roles").and_then(Value::as_array) {
        return roles.iter().collect();
    }
    response
        .get("rolesById")
        .and_then(Value::as_object)
        .map(|by_id| by_id.values().collect())
        .unwrap_or_default()
}

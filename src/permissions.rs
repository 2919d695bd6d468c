//! Guilded → Discord permission translation.
//!
//! Guilded groups boolean flags by category (`{"general": {"CanInviteMembers": true}}`);
//! Discord uses a single bitmask. The table below is many-to-one and lossy:
//! flags without a Discord counterpart are dropped, and several flags fold onto
//! the same bit.

use serde_json::Value;

// Discord permission bits.
const CREATE_INSTANT_INVITE: u64 = 0x0000_0001;
const KICK_AND_BAN_MEMBERS: u64 = 0x0000_0006;
const MANAGE_CHANNELS: u64 = 0x0000_0010;
const MANAGE_GUILD: u64 = 0x0000_0020;
const STREAM: u64 = 0x0000_0200;
const VIEW_CHANNEL: u64 = 0x0000_0400;
const SEND_MESSAGES: u64 = 0x0000_0800;
const MANAGE_MESSAGES: u64 = 0x0000_2000;
const ATTACH_FILES: u64 = 0x0000_8000;
const MENTION_EVERYONE: u64 = 0x0002_0000;
const CONNECT: u64 = 0x0010_0000;
const SPEAK: u64 = 0x0020_0000;
const MUTE_MEMBERS: u64 = 0x0040_0000;
const DEAFEN_MEMBERS: u64 = 0x0080_0000;
const MOVE_MEMBERS: u64 = 0x0100_0000;
const USE_VAD: u64 = 0x0200_0000;
const CHANGE_NICKNAME: u64 = 0x0400_0000;
const MANAGE_NICKNAMES: u64 = 0x0800_0000;
const MANAGE_ROLES: u64 = 0x1000_0000;
const MANAGE_WEBHOOKS: u64 = 0x2000_0000;
const MANAGE_EMOJIS_AND_STICKERS: u64 = 0x4000_0000;
const CREATE_PUBLIC_THREADS: u64 = 0x0000_8000_0000_0000;
const MANAGE_THREADS: u64 = 0x0004_0000_0000_0000;

/// Discord bits for a Guilded flag, or `None` if the flag is not mapped.
///
/// Event flags land on CONNECT's bit; that is what the historical table
/// does and is preserved as-is.
pub fn discord_bits(flag: &str) -> Option<u64> {
    let bits = match flag {
        // general
        "CanUpdateTeam" => MANAGE_GUILD,
        "CanManageRoles" => MANAGE_ROLES,
        "CanInviteMembers" => CREATE_INSTANT_INVITE,
        "CanKickMembers" => KICK_AND_BAN_MEMBERS,
        "CanManageChannels" => MANAGE_CHANNELS,
        "CanManageWebhooks" => MANAGE_WEBHOOKS,
        "CanMentionEveryone" => MENTION_EVERYONE,
        "CanModerateChannels" => MANAGE_MESSAGES,
        "CanBypassSlowMode" => 0,
        "CanManageGroups" => MANAGE_CHANNELS,

        // chat
        "CanReadChats" => VIEW_CHANNEL,
        "CanCreateChats" => SEND_MESSAGES,
        "CanUploadChatMedia" => ATTACH_FILES,
        "CanManageChats" => MANAGE_MESSAGES,
        "CanCreateChatThreads" => CREATE_PUBLIC_THREADS,
        "CanReplyToChatThreads" => CREATE_PUBLIC_THREADS,
        "CanCreatePrivateMessages" => SEND_MESSAGES,
        "CanManageChatThreads" => MANAGE_THREADS,

        // voice
        "CanListenVoice" => CONNECT,
        "CanAddVoice" => SPEAK,
        "CanMuteMembers" => MUTE_MEMBERS,
        "CanDeafenMembers" => DEAFEN_MEMBERS,
        "CanAssignVoiceGroup" => MOVE_MEMBERS,
        "CanBroadcastVoice" => SPEAK,
        "CanDirectVoice" => SPEAK,
        "CanPrioritizeVoice" => SPEAK,
        "CanUseVoiceActivity" => USE_VAD,
        "CanManageVoiceGroups" => MANAGE_CHANNELS,
        "CanSendVoiceMessages" => SEND_MESSAGES,

        // announcements
        "CanReadAnnouncements" => VIEW_CHANNEL,
        "CanCreateAnnouncementsV2" => SEND_MESSAGES,
        "CanManageAnnouncements" => MANAGE_MESSAGES,

        // calendar
        "CanReadEvents" => VIEW_CHANNEL,
        "CanCreateEvents" => CONNECT,
        "CanEditEvents" => CONNECT,
        "CanDeleteEvents" => CONNECT,
        "CanEditEventRsvps" => CONNECT,

        // forums
        "CanReadForums" => VIEW_CHANNEL,
        "CanCreateThreads" => CREATE_PUBLIC_THREADS,
        "CanCreateThreadReplies" => SEND_MESSAGES,
        "CanDeleteOtherPosts" => MANAGE_MESSAGES,
        "CanStickyPosts" => MANAGE_MESSAGES,
        "CanLockThreads" => MANAGE_THREADS,

        // media
        "CanReadMedia" => VIEW_CHANNEL,
        "CanAddMedia" => ATTACH_FILES,
        "CanEditMedia" => MANAGE_MESSAGES,
        "CanDeleteMedia" => MANAGE_MESSAGES,

        // customization
        "CanManageCustomReactions" => MANAGE_EMOJIS_AND_STICKERS,
        "CanChangeNickname" => CHANGE_NICKNAME,
        "CanManageNicknames" => MANAGE_NICKNAMES,

        // streams
        "CanReadStreams" => VIEW_CHANNEL,
        "CanJoinStreamVoice" => CONNECT,
        "CanCreateStreams" => STREAM,
        "CanSendStreamMessages" => SEND_MESSAGES,
        "CanAddStreamVoice" => SPEAK,
        "CanUseVoiceActivityInStream" => USE_VAD,

        _ => return None,
    };
    Some(bits)
}

fn is_granted(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        _ => false,
    }
}

/// OR together the Discord bits of every granted, mapped flag.
///
/// Anything that is not a `category → {flag → bool}` object contributes nothing.
pub fn to_bitmask(permissions: &Value) -> u64 {
    let Some(categories) = permissions.as_object() else {
        return 0;
    };
    categories
        .values()
        .filter_map(Value::as_object)
        .flat_map(|flags| flags.iter())
        .filter(|(_, granted)| is_granted(granted))
        .filter_map(|(flag, _)| discord_bits(flag))
        .fold(0, |acc, bits| acc | bits)
}

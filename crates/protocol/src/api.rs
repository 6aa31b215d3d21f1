//! REST request/response shapes.
//!
//! These mirror the gateway's generated OpenAPI types. All wire fields are
//! camelCase; optional fields in the upstream schema are `Option` here.

use serde::{Deserialize, Serialize};

/// A registered user, as returned by the auth and profile endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub display_id: String,
    pub name: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub icon_url: String,
    #[serde(default)]
    pub created_at: String,
}

/// A guild (chat community) container.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Guild {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub owner_id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon_url: String,
    #[serde(default)]
    pub default_channel_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_count: Option<u32>,
    #[serde(default)]
    pub created_at: String,
}

/// Guild plus its member count, as listed by `GET /api/users/me/guilds`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuildWithMemberCount {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub owner_id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon_url: String,
    #[serde(default)]
    pub default_channel_id: String,
    #[serde(default)]
    pub member_count: u32,
    #[serde(default)]
    pub created_at: String,
}

/// Full guild overview: nested categories, each with its channels.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuildDetail {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub owner_id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon_url: String,
    #[serde(default)]
    pub default_channel_id: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub categories: Vec<CategoryDetail>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    #[serde(default)]
    pub guild_id: String,
    pub name: String,
    #[serde(default)]
    pub created_at: String,
}

/// Category with its channels, nested inside [`GuildDetail`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryDetail {
    pub id: String,
    #[serde(default)]
    pub guild_id: String,
    pub name: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub channels: Vec<Channel>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub id: String,
    #[serde(default)]
    pub category_id: String,
    pub name: String,
    #[serde(default)]
    pub created_at: String,
}

/// A shareable invite code, optionally capped by use count and expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invite {
    pub invite_code: String,
    #[serde(default)]
    pub guild_id: String,
    #[serde(default)]
    pub creator_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_uses: Option<u32>,
    #[serde(default)]
    pub current_uses: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    #[serde(default)]
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub user_id: String,
    pub guild_id: String,
    #[serde(default)]
    pub joined_at: String,
}

/// A chat message within a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    #[serde(default)]
    pub sender_id: String,
    pub channel_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_id: Option<String>,
    pub content: String,
    #[serde(default)]
    pub created_at: String,
}

// ---------------------------------------------------------------------------
// Auth

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub display_id: String,
    pub password: String,
    pub email: String,
    pub name: String,
    pub bio: String,
    pub icon_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterResponse {
    pub user: User,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}

/// Decoded claims of the caller's token, from `GET /api/auth/me`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthMeResponse {
    pub user_id: String,
    #[serde(default)]
    pub exp: Option<String>,
    #[serde(default)]
    pub iat: Option<String>,
}

// ---------------------------------------------------------------------------
// Guilds

#[derive(Debug, Clone, Deserialize)]
pub struct ListMyGuildsResponse {
    #[serde(default)]
    pub guilds: Vec<GuildWithMemberCount>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGuildRequest {
    pub name: String,
    pub description: String,
    pub icon_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateGuildResponse {
    pub guild: Guild,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GuildOverviewResponse {
    pub guild: GuildDetail,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateCategoryRequest {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCategoryResponse {
    pub category: Category,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateChannelRequest {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateChannelResponse {
    pub channel: Channel,
}

// ---------------------------------------------------------------------------
// Invites

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInviteRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_uses: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateInviteResponse {
    pub invite: Invite,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListInvitesResponse {
    #[serde(default)]
    pub invites: Vec<Invite>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetInviteResponse {
    pub invite: Invite,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JoinGuildResponse {
    #[serde(default)]
    pub member: Option<Member>,
}

// ---------------------------------------------------------------------------
// Messages

#[derive(Debug, Clone, Deserialize)]
pub struct ListMessagesResponse {
    #[serde(default)]
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMessageRequest {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateMessageResponse {
    pub message: Message,
}

// ---------------------------------------------------------------------------
// Profile and media

#[derive(Debug, Clone, Deserialize)]
pub struct ProfileResponse {
    pub user: User,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub display_id: String,
    pub name: String,
    pub bio: String,
    pub icon_url: String,
}

/// Media kind for presigned upload URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaType {
    #[serde(rename = "MEDIA_TYPE_UNSPECIFIED")]
    Unspecified,
    #[serde(rename = "MEDIA_TYPE_GUILD_ICON")]
    GuildIcon,
    #[serde(rename = "MEDIA_TYPE_USER_ICON")]
    UserIcon,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadUrlRequest {
    pub media_type: MediaType,
    pub filename: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadUrlResponse {
    pub upload_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn register_request_uses_camel_case() {
        let req = RegisterRequest {
            display_id: "someone".into(),
            password: "hunter2".into(),
            email: "someone@example.com".into(),
            name: "Someone".into(),
            bio: String::new(),
            icon_url: String::new(),
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["displayId"], "someone");
        assert_eq!(value["iconUrl"], "");
        assert!(value.get("display_id").is_none());
    }

    #[test]
    fn guild_overview_parses_nested_categories() {
        let value = json!({
            "guild": {
                "id": "g1",
                "name": "general",
                "ownerId": "u1",
                "description": "",
                "iconUrl": "",
                "defaultChannelId": "c1",
                "createdAt": "2026-01-01T00:00:00Z",
                "categories": [{
                    "id": "cat1",
                    "guildId": "g1",
                    "name": "Text",
                    "createdAt": "2026-01-01T00:00:00Z",
                    "channels": [{
                        "id": "c1",
                        "categoryId": "cat1",
                        "name": "general",
                        "createdAt": "2026-01-01T00:00:00Z"
                    }]
                }]
            }
        });
        let overview: GuildOverviewResponse = serde_json::from_value(value).unwrap();
        assert_eq!(overview.guild.default_channel_id, "c1");
        assert_eq!(overview.guild.categories[0].channels[0].id, "c1");
    }

    #[test]
    fn create_invite_request_omits_unset_fields() {
        let value = serde_json::to_value(CreateInviteRequest::default()).unwrap();
        assert_eq!(value, json!({}));

        let value = serde_json::to_value(CreateInviteRequest {
            max_uses: Some(5),
            expires_at: None,
        })
        .unwrap();
        assert_eq!(value, json!({"maxUses": 5}));
    }

    #[test]
    fn join_response_member_is_optional() {
        let joined: JoinGuildResponse =
            serde_json::from_value(json!({"member": {"userId": "u1", "guildId": "g1"}})).unwrap();
        assert_eq!(joined.member.unwrap().guild_id, "g1");

        let empty: JoinGuildResponse = serde_json::from_value(json!({})).unwrap();
        assert!(empty.member.is_none());
    }
}

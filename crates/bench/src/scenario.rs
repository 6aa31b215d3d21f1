//! The virtual-user flows and the load shapes that run them.
//!
//! Each flow is one VU iteration: a fresh account is registered, logged
//! in, and driven through the REST and WebSocket surface the way the
//! browser client would. Flows share the invite pool so that guilds
//! created by one VU get joined by others.

use std::time::{Duration, Instant};

use anyhow::Context as _;
use chrono::Utc;
use palaver::protocol::api::{CreateInviteRequest, CreateMessageRequest, GuildDetail};
use palaver::protocol::event_type;
use palaver::{ApiClient, Session};
use rand::seq::IndexedRandom as _;
use serde_json::json;

use crate::cli::{Cli, Scenario};
use crate::exec::{self, Stage};
use crate::identity;
use crate::invites::InviteStore;
use crate::metrics::{self, Registry};

/// Everything a VU iteration needs; shared across all executors of a run.
#[derive(Debug, Clone)]
pub struct Context {
    pub api_url: String,
    pub ws_url: String,
    pub metrics: Registry,
    pub invites: InviteStore,
}

impl Context {
    pub fn new(cli: &Cli) -> Self {
        Self {
            api_url: cli.api_url.clone(),
            ws_url: cli.ws_url.clone(),
            metrics: Registry::new(),
            invites: InviteStore::new(),
        }
    }
}

pub async fn run(cli: &Cli, ctx: Context) {
    let duration = cli.duration();
    match cli.scenario {
        Scenario::Bench => {
            exec::constant_vus(cli.vus, duration, body_of(ctx, active_user)).await;
        }
        Scenario::BenchLight => {
            let vus = (cli.vus / 10).max(1);
            exec::constant_vus(vus, duration, body_of(ctx, active_user)).await;
        }
        Scenario::Simple => {
            exec::constant_vus(1, duration, body_of(ctx, simple_probe)).await;
        }
        Scenario::Realistic => realistic(cli, ctx, duration).await,
    }
}

/// The mixed population: 20% active users, 70% lurkers, a 5%-per-second
/// signup trickle, and a visitor spike in the second half of the run.
async fn realistic(cli: &Cli, ctx: Context, duration: Duration) {
    let active = (cli.vus / 5).max(1);
    let lurkers = (cli.vus * 7 / 10).max(1);
    let signups_per_sec = ((cli.vus / 20).max(1)) as u32;
    let signup_pool = (cli.vus / 10).max(2);
    let spike_peak = (cli.vus / 2).max(1);

    let spike_stages = [
        Stage {
            duration: duration / 2,
            target: 0,
        },
        Stage {
            duration: duration / 8,
            target: spike_peak,
        },
        Stage {
            duration: duration / 8,
            target: spike_peak,
        },
        Stage {
            duration: duration / 4,
            target: 0,
        },
    ];

    tokio::join!(
        exec::constant_vus(active, duration, body_of(ctx.clone(), active_user)),
        exec::constant_vus(lurkers, duration, body_of(ctx.clone(), lurker)),
        exec::constant_arrival_rate(
            signups_per_sec,
            duration,
            signup_pool,
            body_of(ctx.clone(), new_user),
        ),
        exec::ramping_vus(&spike_stages, body_of(ctx.clone(), spike_visitor)),
    );
}

/// Wraps a flow into an executor body: iteration metrics plus
/// log-and-continue error handling, so one bad iteration never stops a VU.
fn body_of<F, Fut>(
    ctx: Context,
    flow: F,
) -> impl Fn(usize) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>
+ Clone
+ Send
+ 'static
where
    F: Fn(Context, usize) -> Fut + Clone + Send + 'static,
    Fut: std::future::Future<Output = anyhow::Result<()>> + Send + 'static,
{
    move |vu| {
        let ctx = ctx.clone();
        let flow = flow.clone();
        Box::pin(async move {
            let started = Instant::now();
            let result = flow(ctx.clone(), vu).await;
            ctx.metrics.incr(metrics::ITERATIONS);
            ctx.metrics
                .add_trend(metrics::ITERATION_DURATION, started.elapsed());
            if let Err(err) = result {
                tracing::warn!(vu, "iteration failed: {err:#}");
            }
        })
    }
}

/// The full browser-client flow: sign up, build out a guild, trade
/// invites, then chat over the WebSocket session.
async fn active_user(ctx: Context, vu: usize) -> anyhow::Result<()> {
    let api = ApiClient::new(&ctx.api_url);
    let m = &ctx.metrics;

    let registration = identity::new_user();
    m.timed("POST /api/auth/register", api.register(&registration))
        .await?;
    m.timed(
        "POST /api/auth/login",
        api.login(&registration.email, identity::PASSWORD),
    )
    .await?;
    let who = m.timed("GET /api/auth/me", api.auth_me()).await?;
    m.timed("GET /api/users/me/guilds", api.my_guilds()).await?;

    let guild = m
        .timed("POST /api/guilds", api.create_guild(&identity::new_guild()))
        .await?
        .guild;
    let overview = m
        .timed(
            "GET /api/guilds/:id/overview",
            api.guild_overview(&guild.id),
        )
        .await?
        .guild;

    for c in 0..3 {
        let category = m
            .timed(
                "POST /api/guilds/:id/categories",
                api.create_category(&guild.id, &format!("category-{c}")),
            )
            .await?
            .category;
        for ch in 0..3 {
            m.timed(
                "POST /api/categories/:id/channels",
                api.create_channel(&category.id, &format!("channel-{c}-{ch}")),
            )
            .await?;
        }
    }

    m.timed("GET /api/guilds/:id/invites", api.invites(&guild.id))
        .await?;
    let invite = m
        .timed(
            "POST /api/guilds/:id/invites",
            api.create_invite(
                &guild.id,
                &CreateInviteRequest {
                    max_uses: None,
                    expires_at: Some((Utc::now() + chrono::Duration::hours(24)).to_rfc3339()),
                },
            ),
        )
        .await?
        .invite;
    ctx.invites.add(invite.invite_code);

    // Join a few guilds other VUs have advertised.
    let mut joined = Vec::new();
    for code in ctx.invites.sample(3) {
        let found = m
            .timed("GET /api/invites/:code", api.invite(&code))
            .await?
            .invite;
        if found.guild_id == guild.id {
            continue;
        }
        // Joining can legitimately fail (expired, already a member).
        match m
            .timed("POST /api/invites/:code/join", api.join_guild(&code))
            .await
        {
            Ok(_) => joined.push(found.guild_id),
            Err(err) => tracing::debug!("join via {code} failed: {err}"),
        }
    }

    let channel_id = primary_channel(&overview).context("guild has no channels")?;
    m.timed(
        "GET /api/channels/:id/messages",
        api.messages(&channel_id),
    )
    .await?;

    // WebSocket side: subscribe to the active channel once authenticated,
    // and count broadcasts that come back in.
    let session = Session::connect(ctx.ws_url.clone());
    {
        let ws = session.clone();
        let user_id = who.user_id.clone();
        let channel_id = channel_id.clone();
        session.set_listener(event_type::AUTH_SUCCESS, move |_| {
            ws.send(
                event_type::SUBSCRIBE_CHANNELS,
                json!({ "user_id": user_id, "channel_ids": [channel_id] }),
            );
        });
    }
    let received = ctx.metrics.clone();
    session.set_listener(event_type::MESSAGE_CREATE, move |_| {
        received.incr(metrics::WS_MESSAGES_RECEIVED);
    });
    let token = api.token().context("login did not store a token")?;
    session.authenticate(token);

    // Watch the guilds we joined as well.
    for guild_id in &joined {
        if let Ok(other) = m
            .timed("GET /api/guilds/:id/overview", api.guild_overview(guild_id))
            .await
        {
            let ids = channel_ids(&other.guild);
            if !ids.is_empty() {
                session.send(
                    event_type::SUBSCRIBE_CHANNELS,
                    json!({ "user_id": who.user_id, "channel_ids": ids }),
                );
            }
        }
    }

    tokio::time::sleep(Duration::from_secs(2)).await;
    for seq in 0..10 {
        m.timed(
            "POST /api/channels/:id/messages",
            api.send_message(
                &channel_id,
                &CreateMessageRequest {
                    content: identity::message_body(vu, seq),
                    reply_id: None,
                },
            ),
        )
        .await?;
        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    session.close();
    Ok(())
}

/// A signup that pokes around: register, check the account, follow one
/// invite, and leave.
async fn new_user(ctx: Context, _vu: usize) -> anyhow::Result<()> {
    let api = ApiClient::new(&ctx.api_url);
    let m = &ctx.metrics;

    let registration = identity::new_user();
    m.timed("POST /api/auth/register", api.register(&registration))
        .await?;
    m.timed(
        "POST /api/auth/login",
        api.login(&registration.email, identity::PASSWORD),
    )
    .await?;
    m.timed("GET /api/auth/me", api.auth_me()).await?;

    if let Some(code) = ctx.invites.sample(1).pop() {
        m.timed("GET /api/invites/:code", api.invite(&code)).await?;
        if let Err(err) = m
            .timed("POST /api/invites/:code/join", api.join_guild(&code))
            .await
        {
            tracing::debug!("join via {code} failed: {err}");
        }
    }
    m.timed("GET /api/users/me/guilds", api.my_guilds()).await?;

    tokio::time::sleep(Duration::from_secs(1)).await;
    Ok(())
}

/// Read-only member: joins one guild and keeps re-reading a channel.
async fn lurker(ctx: Context, _vu: usize) -> anyhow::Result<()> {
    let api = ApiClient::new(&ctx.api_url);
    let m = &ctx.metrics;

    let registration = identity::new_user();
    m.timed("POST /api/auth/register", api.register(&registration))
        .await?;
    m.timed(
        "POST /api/auth/login",
        api.login(&registration.email, identity::PASSWORD),
    )
    .await?;

    let Some(code) = ctx.invites.sample(1).pop() else {
        // Nothing published yet; back off rather than hammer signups.
        tokio::time::sleep(Duration::from_secs(3)).await;
        return Ok(());
    };

    let invite = m
        .timed("GET /api/invites/:code", api.invite(&code))
        .await?
        .invite;
    if let Err(err) = m
        .timed("POST /api/invites/:code/join", api.join_guild(&code))
        .await
    {
        tracing::debug!("join via {code} failed: {err}");
    }

    let overview = m
        .timed(
            "GET /api/guilds/:id/overview",
            api.guild_overview(&invite.guild_id),
        )
        .await?
        .guild;
    let channels = channel_ids(&overview);
    let Some(channel_id) = channels.choose(&mut rand::rng()).cloned() else {
        return Ok(());
    };

    for _ in 0..5 {
        m.timed(
            "GET /api/channels/:id/messages",
            api.messages(&channel_id),
        )
        .await?;
        tokio::time::sleep(Duration::from_secs(2)).await;
    }
    Ok(())
}

/// Cheapest realistic hit, used for the traffic spike.
async fn spike_visitor(ctx: Context, _vu: usize) -> anyhow::Result<()> {
    let api = ApiClient::new(&ctx.api_url);
    let m = &ctx.metrics;

    let registration = identity::new_user();
    m.timed("POST /api/auth/register", api.register(&registration))
        .await?;
    m.timed(
        "POST /api/auth/login",
        api.login(&registration.email, identity::PASSWORD),
    )
    .await?;
    m.timed("GET /api/users/me/guilds", api.my_guilds()).await?;

    tokio::time::sleep(Duration::from_millis(500)).await;
    Ok(())
}

/// Health-check probe: the signup path plus one read of everything.
async fn simple_probe(ctx: Context, vu: usize) -> anyhow::Result<()> {
    new_user(ctx, vu).await
}

/// The channel a fresh session should read and post in: the guild's
/// default channel, falling back to the first listed one.
fn primary_channel(guild: &GuildDetail) -> Option<String> {
    if !guild.default_channel_id.is_empty() {
        return Some(guild.default_channel_id.clone());
    }
    channel_ids(guild).into_iter().next()
}

fn channel_ids(guild: &GuildDetail) -> Vec<String> {
    guild
        .categories
        .iter()
        .flat_map(|category| category.channels.iter())
        .map(|channel| channel.id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn overview(default_channel: &str, channels: &[&str]) -> GuildDetail {
        serde_json::from_value(json!({
            "id": "g1",
            "name": "g",
            "ownerId": "u1",
            "defaultChannelId": default_channel,
            "createdAt": "",
            "categories": [{
                "id": "c1",
                "guildId": "g1",
                "name": "general",
                "createdAt": "",
                "channels": channels.iter().map(|id| json!({
                    "id": id,
                    "categoryId": "c1",
                    "name": *id,
                    "createdAt": "",
                })).collect::<Vec<_>>(),
            }],
        }))
        .unwrap()
    }

    #[test]
    fn primary_channel_prefers_the_default() {
        let guild = overview("ch-default", &["ch-a", "ch-b"]);
        assert_eq!(primary_channel(&guild).as_deref(), Some("ch-default"));
    }

    #[test]
    fn primary_channel_falls_back_to_first_listed() {
        let guild = overview("", &["ch-a", "ch-b"]);
        assert_eq!(primary_channel(&guild).as_deref(), Some("ch-a"));
        assert_eq!(channel_ids(&guild), vec!["ch-a", "ch-b"]);

        assert_eq!(primary_channel(&overview("", &[])), None);
    }
}

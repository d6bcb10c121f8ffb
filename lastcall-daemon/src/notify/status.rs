use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

const TITLE: &str = "Server Status";

const COLOR_STARTING: u32 = 0xffff00;
const COLOR_ONLINE: u32 = 0x00ff00;
const COLOR_ENDING: u32 = 0x00ffff;
const COLOR_CLOSED: u32 = 0xff0000;
const COLOR_RESTARTING: u32 = 0xff8800;

/// Discord relative timestamp markup, rendered client-side as "in 1 minute"
pub fn relative_timestamp(at: DateTime<Utc>) -> String {
    format!("<t:{}:R>", at.timestamp())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbedFooter {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Embed {
    pub title: String,
    pub description: String,
    pub color: u32,
    pub fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
}

impl Embed {
    fn new(description: String, color: u32, footer: Option<&str>) -> Self {
        Self {
            title: TITLE.to_string(),
            description,
            color,
            fields: Vec::new(),
            footer: footer.map(|text| EmbedFooter { text: text.to_string() }),
        }
    }

    fn field(mut self, name: &str, value: impl Into<String>) -> Self {
        self.fields.push(EmbedField {
            name: name.to_string(),
            value: value.into(),
            inline: false,
        });
        self
    }
}

/// What every status message says about the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerDetails {
    /// Address players connect to
    pub address: String,
    pub footer: Option<String>,
}

impl ServerDetails {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            footer: None,
        }
    }

    pub fn with_footer(mut self, footer: impl Into<String>) -> Self {
        self.footer = Some(footer.into());
        self
    }
}

/// Rendered content of one status notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusMessage {
    pub content: String,
    pub embed: Embed,
}

impl StatusMessage {
    /// Machine is up, server process is booting
    pub fn starting(details: &ServerDetails, now: DateTime<Utc>) -> Self {
        let embed = Embed::new(
            format!("Server started: {}", relative_timestamp(now)),
            COLOR_STARTING,
            details.footer.as_deref(),
        )
        .field(
            "Server Starting Now...",
            "Give the server a few minutes to start.\n\n\
             This message will turn green when the server is fully online.",
        );

        Self {
            content: "Machine started, starting server!".to_string(),
            embed,
        }
    }

    /// Server is reachable; `players` is `None` when the count is unknown
    pub fn running(details: &ServerDetails, since: DateTime<Utc>, players: Option<u32>) -> Self {
        Self {
            content: "@everyone Server is up!".to_string(),
            embed: online_embed(details, since, players),
        }
    }

    /// Shutdown was called off because a player showed up
    pub fn postponed(details: &ServerDetails, since: DateTime<Utc>, players: u32) -> Self {
        Self {
            content: "Server up!".to_string(),
            embed: online_embed(details, since, Some(players)),
        }
    }

    /// The last-call window is open until `closes_at`
    pub fn ending(details: &ServerDetails, now: DateTime<Utc>, window: Duration) -> Self {
        let closes_at = now + chrono::Duration::from_std(window).unwrap_or(chrono::Duration::zero());
        let embed = Embed::new(
            format!("Server Will Close: {}", relative_timestamp(closes_at)),
            COLOR_ENDING,
            details.footer.as_deref(),
        )
        .field(
            "Server Closing!",
            "Server will be offline soon. Log in again to prevent shutdown",
        );

        Self {
            content: "Server Closing Soon!".to_string(),
            embed,
        }
    }

    pub fn closed(details: &ServerDetails, now: DateTime<Utc>) -> Self {
        let embed = Embed::new(
            format!("Server Closed: {}", relative_timestamp(now)),
            COLOR_CLOSED,
            details.footer.as_deref(),
        )
        .field("Server Closed", "Server is offline. Start it again to play.");

        Self {
            content: "Server Closed.".to_string(),
            embed,
        }
    }

    /// The server never answered; the instance is about to restart
    pub fn restarting(details: &ServerDetails, now: DateTime<Utc>) -> Self {
        let embed = Embed::new(
            format!("Restart requested: {}", relative_timestamp(now)),
            COLOR_RESTARTING,
            details.footer.as_deref(),
        )
        .field(
            "Server Did Not Start",
            "The server did not come online in time. The machine is restarting.",
        );

        Self {
            content: "Server failed to start.".to_string(),
            embed,
        }
    }

    /// Fatal condition reported before the run gives up
    pub fn error(details: &ServerDetails, reason: &str) -> Self {
        let embed = Embed::new(
            "The server supervisor stopped with an error.".to_string(),
            COLOR_CLOSED,
            details.footer.as_deref(),
        )
        .field("Error", reason);

        Self {
            content: "Something went wrong...".to_string(),
            embed,
        }
    }
}

fn online_embed(details: &ServerDetails, since: DateTime<Utc>, players: Option<u32>) -> Embed {
    let count = players
        .map(|n| n.to_string())
        .unwrap_or_else(|| "?".to_string());

    Embed::new(
        format!("Server Online Since: {}", relative_timestamp(since)),
        COLOR_ONLINE,
        details.footer.as_deref(),
    )
    .field("Server Online!", format!("Server IP: `{}`", details.address))
    .field("Players", format!("`{}` Players Online", count))
}

//! Provider implementation for a Supabase project exposing a `bins` table
//! through its PostgREST endpoint.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use binwatch_core::{
    model::{BinId, BinPatch, BinRecord, ChangeEvent, ChangeKind, NewBin},
    ports::{BinRegistryPort, ChangeFeedPort, ChangeSubscription, PortError},
};

const REST_PATH: &str = "rest/v1";
const TABLE: &str = "bins";
const FEED_BUFFER: usize = 32;

/// Interval between change feed polls when none is configured.
pub const DEFAULT_FEED_INTERVAL: Duration = Duration::from_secs(5);

/// Connection details for the Supabase project.
#[derive(Debug, Clone)]
pub struct SupabaseSettings {
    /// Project URL, e.g. `https://xyz.supabase.co`.
    pub url: String,
    /// Publishable (anon) API key.
    pub api_key: String,
    /// How often the change feed checks for modifications.
    pub feed_interval: Duration,
}

impl SupabaseSettings {
    /// Settings with the default feed interval.
    #[must_use]
    pub fn new<U: Into<String>, K: Into<String>>(url: U, api_key: K) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
            feed_interval: DEFAULT_FEED_INTERVAL,
        }
    }

    /// Whether both the URL and the key are present.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.url.trim().is_empty() && !self.api_key.trim().is_empty()
    }

    fn table_url(&self) -> String {
        format!("{}/{REST_PATH}/{TABLE}", self.url.trim().trim_end_matches('/'))
    }
}

/// Shared request plumbing for the registry and the change feed.
#[derive(Clone)]
struct RestTable {
    client: Client,
    settings: SupabaseSettings,
}

impl RestTable {
    fn request(&self, method: Method) -> RequestBuilder {
        self.client
            .request(method, self.settings.table_url())
            .header("apikey", &self.settings.api_key)
            .bearer_auth(&self.settings.api_key)
    }

    fn fetch_all_request(&self) -> RequestBuilder {
        self.request(Method::GET)
            .query(&[("select", "*"), ("order", "fill_level.desc")])
    }

    fn rows_request(&self) -> RequestBuilder {
        self.request(Method::GET).query(&[("select", "*")])
    }

    fn insert_request(&self, bin: &NewBin) -> RequestBuilder {
        self.request(Method::POST)
            .header("Prefer", "return=minimal")
            .json(bin)
    }

    fn update_request(&self, id: &BinId, patch: &BinPatch) -> RequestBuilder {
        self.request(Method::PATCH)
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", "return=minimal")
            .json(patch)
    }

    fn delete_request(&self, id: &BinId) -> RequestBuilder {
        self.request(Method::DELETE)
            .query(&[("id", format!("eq.{id}"))])
    }
}

/// Error body returned by PostgREST.
#[derive(Debug, Deserialize)]
struct PostgrestError {
    message: String,
}

/// Bin registry implementation for Supabase.
pub struct SupabaseRegistry {
    table: RestTable,
}

impl SupabaseRegistry {
    /// Create a new registry bound to the given HTTP client.
    #[must_use]
    pub fn new(client: Client, settings: SupabaseSettings) -> Self {
        Self {
            table: RestTable { client, settings },
        }
    }
}

#[async_trait]
impl BinRegistryPort for SupabaseRegistry {
    async fn fetch_all(&self) -> Result<Vec<BinRecord>, PortError> {
        tracing::debug!("fetching bins");
        fetch_json::<Vec<BinRecord>>(self.table.fetch_all_request()).await
    }

    async fn insert(&self, bin: &NewBin) -> Result<(), PortError> {
        tracing::debug!(location = %bin.location, "inserting bin");
        send_empty(self.table.insert_request(bin)).await
    }

    async fn update(&self, id: &BinId, patch: &BinPatch) -> Result<(), PortError> {
        tracing::debug!(bin_id = %id, "updating bin");
        send_empty(self.table.update_request(id, patch)).await
    }

    async fn delete(&self, id: &BinId) -> Result<(), PortError> {
        tracing::debug!(bin_id = %id, "deleting bin");
        send_empty(self.table.delete_request(id)).await
    }
}

/// Change feed implementation for Supabase.
///
/// Polls the rows of the `bins` table and reports every difference between
/// two consecutive polls.
pub struct SupabaseChangeFeed {
    table: RestTable,
}

impl SupabaseChangeFeed {
    /// Create a new change feed bound to the given HTTP client.
    #[must_use]
    pub fn new(client: Client, settings: SupabaseSettings) -> Self {
        Self {
            table: RestTable { client, settings },
        }
    }
}

#[async_trait]
impl ChangeFeedPort for SupabaseChangeFeed {
    async fn subscribe(&self) -> Result<ChangeSubscription, PortError> {
        let (sender, receiver) = mpsc::channel(FEED_BUFFER);
        let task = tokio::spawn(poll_changes(self.table.clone(), sender));
        tracing::info!(
            interval_secs = self.table.settings.feed_interval.as_secs(),
            "bins change feed started"
        );
        Ok(ChangeSubscription::new(receiver, Some(task)))
    }
}

/// Registry and change feed sharing one set of settings.
pub struct SupabasePorts {
    /// Registry port.
    pub registry: Arc<SupabaseRegistry>,
    /// Change feed port.
    pub change_feed: Arc<SupabaseChangeFeed>,
}

/// Build both Supabase ports.
#[must_use]
pub fn ports(client: Client, settings: SupabaseSettings) -> SupabasePorts {
    if !settings.is_configured() {
        tracing::warn!("Supabase URL or API key missing; registry calls will fail");
    }

    SupabasePorts {
        registry: Arc::new(SupabaseRegistry::new(client.clone(), settings.clone())),
        change_feed: Arc::new(SupabaseChangeFeed::new(client, settings)),
    }
}

async fn poll_changes(table: RestTable, sender: mpsc::Sender<ChangeEvent>) {
    let mut ticker = tokio::time::interval(table.settings.feed_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut known: Option<BTreeMap<BinId, BinRecord>> = None;
    let mut failing = false;

    loop {
        ticker.tick().await;
        if sender.is_closed() {
            break;
        }

        let rows = match fetch_json::<Vec<BinRecord>>(table.rows_request()).await {
            Ok(rows) => rows
                .into_iter()
                .map(|row| (row.id.clone(), row))
                .collect::<BTreeMap<_, _>>(),
            Err(err) => {
                if !failing {
                    tracing::warn!(error = %err, "change feed poll failed");
                    failing = true;
                }
                continue;
            }
        };
        if failing {
            tracing::info!("change feed poll recovered");
            failing = false;
        }

        if let Some(previous) = &known {
            for event in diff_rows(previous, &rows) {
                if sender.send(event).await.is_err() {
                    return;
                }
            }
        }
        known = Some(rows);
    }
}

/// Events turning `previous` into `current`: inserts and updates in id order,
/// then deletes. A row counts as updated when any column differs.
fn diff_rows<R: PartialEq>(
    previous: &BTreeMap<BinId, R>,
    current: &BTreeMap<BinId, R>,
) -> Vec<ChangeEvent> {
    let mut events = Vec::new();

    for (id, row) in current {
        let kind = match previous.get(id) {
            None => ChangeKind::Insert,
            Some(before) if before != row => ChangeKind::Update,
            Some(_) => continue,
        };
        events.push(ChangeEvent {
            kind,
            id: Some(id.clone()),
        });
    }

    events.extend(
        previous
            .keys()
            .filter(|id| !current.contains_key(*id))
            .map(|id| ChangeEvent {
                kind: ChangeKind::Delete,
                id: Some(id.clone()),
            }),
    );

    events
}

async fn check_status(resp: Response) -> Result<Response, PortError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let message = match resp.json::<PostgrestError>().await {
        Ok(body) => body.message,
        Err(_err) => status.canonical_reason().unwrap_or("unknown error").to_owned(),
    };
    Err(PortError::Rejected {
        status: status.as_u16(),
        message,
    })
}

// Small helper to fetch and decode JSON with status handling.
async fn fetch_json<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, PortError> {
    check_status(req.send().await.map_err(PortError::from)?)
        .await?
        .json()
        .await
        .map_err(PortError::from)
}

async fn send_empty(req: RequestBuilder) -> Result<(), PortError> {
    check_status(req.send().await.map_err(PortError::from)?).await?;
    Ok(())
}

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use zonesync_core::articles::{
    ArticlesZone, ArticlesZoneDelegate, MemoryArticleStore, SendStatusOperation,
    ARTICLES_ZONE_NAME,
};
use zonesync_core::db::{
    Database, LibSqlKeyValueStore, LibSqlSyncStatusRepository, SyncStatusRepository,
};
use zonesync_core::models::{Article, ArticleStatus, StatusKey, SyncStatus};
use zonesync_core::remote::{MemoryRemote, MemoryRemoteConfig, RemoteOperation};
use zonesync_core::{
    RecordingScheduler, RemoteError, RemoteErrorCode, SyncConfig, ZoneClient, ZoneIdentity,
};

use crate::commands::common::load_sync_config;
use crate::error::CliError;

const SIMULATED_OWNER: &str = "simulator";
const FEEDS: [&str; 3] = [
    "https://example.com/news.xml",
    "https://example.com/tech.xml",
    "https://example.com/notes.xml",
];

#[derive(Debug, Clone, Copy)]
pub struct SimulationOptions {
    pub articles: usize,
    pub batch_limit: Option<usize>,
    pub faults: bool,
}

#[derive(Debug, Serialize)]
pub struct SimulationReport {
    pub articles: usize,
    pub statuses_sent: usize,
    pub articles_pulled: usize,
    pub converged: bool,
    pub modify_calls: usize,
    pub create_zone_calls: usize,
    pub change_fetch_calls: usize,
    pub retry_delays_secs: Vec<u64>,
}

type SimulatedZone = ArticlesZone<Arc<MemoryRemote>, LibSqlKeyValueStore, RecordingScheduler>;

struct SimulatedClient {
    _db: Database,
    zone: SimulatedZone,
    statuses: LibSqlSyncStatusRepository,
    store: MemoryArticleStore,
}

impl SimulatedClient {
    async fn open(
        remote: &Arc<MemoryRemote>,
        config: &SyncConfig,
        scheduler: &RecordingScheduler,
    ) -> Result<Self, CliError> {
        let db = Database::open_in_memory().await?;
        let client = ZoneClient::new(
            ZoneIdentity::new(ARTICLES_ZONE_NAME, SIMULATED_OWNER),
            Arc::clone(remote),
            LibSqlKeyValueStore::new(db.connection()),
            config.clone(),
        )
        .with_scheduler(scheduler.clone());

        Ok(Self {
            statuses: LibSqlSyncStatusRepository::new(db.connection()),
            zone: ArticlesZone::from_client(client),
            store: MemoryArticleStore::new(),
            _db: db,
        })
    }
}

pub async fn run_simulate(options: SimulationOptions, as_json: bool) -> Result<(), CliError> {
    let report = simulate(options).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for line in format_report_lines(&report) {
        println!("{line}");
    }
    Ok(())
}

pub async fn simulate(options: SimulationOptions) -> Result<SimulationReport, CliError> {
    let mut config = load_sync_config()?;
    let mut remote_config = MemoryRemoteConfig::default();
    if let Some(limit) = options.batch_limit {
        if limit == 0 {
            return Err(CliError::InvalidBatchLimit);
        }
        remote_config.max_batch_size = limit;
        config.chunk_size = config.chunk_size.min(limit);
    }

    let remote = Arc::new(MemoryRemote::with_config(remote_config));
    let scheduler = RecordingScheduler::default();
    if options.faults {
        inject_faults(&remote).await;
    }

    let sender = SimulatedClient::open(&remote, &config, &scheduler).await?;
    let articles = generate_articles(options.articles);
    sender.store.insert(articles.clone()).await;
    sender
        .statuses
        .insert_statuses(&pending_statuses(&articles))
        .await?;

    tracing::info!(articles = articles.len(), "Sending statuses from client A");
    let statuses_sent = SendStatusOperation::new(&sender.zone, &sender.store, &sender.statuses)
        .run()
        .await?;

    let receiver = SimulatedClient::open(&remote, &config, &scheduler).await?;
    let delegate = ArticlesZoneDelegate::new(receiver.store.clone(), receiver.statuses.clone());
    tracing::info!("Pulling changes into client B");
    receiver.zone.refresh_articles(&delegate).await?;

    let pulled = receiver.store.all().await;
    let converged = converged(&articles, &pulled);

    Ok(SimulationReport {
        articles: articles.len(),
        statuses_sent,
        articles_pulled: pulled.len(),
        converged,
        modify_calls: remote.calls(RemoteOperation::ModifyRecords).await,
        create_zone_calls: remote.calls(RemoteOperation::CreateZone).await,
        change_fetch_calls: remote.calls(RemoteOperation::FetchZoneChanges).await,
        retry_delays_secs: scheduler.delays().iter().map(Duration::as_secs).collect(),
    })
}

async fn inject_faults(remote: &MemoryRemote) {
    remote
        .inject(
            RemoteOperation::ModifyRecords,
            RemoteError::new(RemoteErrorCode::RequestRateLimited, "throttled")
                .with_retry_after(Duration::from_secs(3)),
        )
        .await;
    remote
        .inject_after(
            RemoteOperation::ModifyRecords,
            1,
            RemoteError::new(RemoteErrorCode::ServiceUnavailable, "maintenance"),
        )
        .await;
    remote
        .inject(
            RemoteOperation::FetchZoneChanges,
            RemoteError::new(RemoteErrorCode::ZoneBusy, "busy")
                .with_retry_after(Duration::from_secs(1)),
        )
        .await;
}

/// Articles with a deterministic mix of read and starred flags
pub fn generate_articles(count: usize) -> Vec<Article> {
    (0..count)
        .map(|index| {
            let id = format!("article-{index:04}");
            let mut article = Article::new(
                id.clone(),
                FEEDS[index % FEEDS.len()],
                format!("urn:zonesync:{id}"),
            );
            article.feed_external_id = Some(format!("feed-{}", index % FEEDS.len()));
            article.title = Some(format!("Article {index}"));
            article.url = Some(format!("https://example.com/{id}"));
            article.content_html = Some(if index % 5 == 0 {
                format!("<p>Long body of {id}.</p>").repeat(64)
            } else {
                format!("<p>{id}</p>")
            });
            article.status = ArticleStatus {
                read: index % 3 == 0,
                starred: index % 4 == 0,
            };
            article
        })
        .collect()
}

fn pending_statuses(articles: &[Article]) -> Vec<SyncStatus> {
    articles
        .iter()
        .flat_map(|article| {
            let mut statuses = vec![SyncStatus::new(
                article.article_id.clone(),
                StatusKey::Read,
                article.status.read,
            )];
            if article.status.starred {
                statuses.push(SyncStatus::new(
                    article.article_id.clone(),
                    StatusKey::Starred,
                    true,
                ));
            }
            statuses
        })
        .collect()
}

/// Every article worth keeping remotely arrived with matching flags and body
fn converged(sent: &[Article], pulled: &[Article]) -> bool {
    sent.iter()
        .filter(|article| !article.status.read || article.status.starred)
        .all(|article| {
            pulled.iter().any(|received| {
                received.article_id == article.article_id
                    && received.status == article.status
                    && received.content_html == article.content_html
            })
        })
}

pub fn format_report_lines(report: &SimulationReport) -> Vec<String> {
    let delays = if report.retry_delays_secs.is_empty() {
        "none".to_string()
    } else {
        report
            .retry_delays_secs
            .iter()
            .map(|secs| format!("{secs}s"))
            .collect::<Vec<_>>()
            .join(", ")
    };

    vec![
        format!("Articles created:    {}", report.articles),
        format!("Statuses sent:       {}", report.statuses_sent),
        format!("Articles pulled:     {}", report.articles_pulled),
        format!(
            "Converged:           {}",
            if report.converged { "yes" } else { "no" }
        ),
        format!("Modify calls:        {}", report.modify_calls),
        format!("Zone creations:      {}", report.create_zone_calls),
        format!("Change fetches:      {}", report.change_fetch_calls),
        format!("Retry delays:        {delays}"),
    ]
}

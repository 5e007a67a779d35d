//! Crawler Worker (spec §4.6): fetch, redirect handling, link extraction,
//! depth propagation, and delegation to the Indexing Coordinator.

mod html;

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use reqwest::redirect::Policy;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::gate;
use crate::indexer;
use crate::queue::{Msg, WorkQueue};
use crate::storage::Storage;

const USER_AGENT: &str = "Mozilla/5.0 (compatible; BrightwaveBot/1.0; +http://brightwave.io)";

/// A long-lived worker task (spec §4.6). Lifecycle: idle (blocked in
/// `next`), fetching, parsing, indexing, stopped.
pub struct CrawlerWorker {
    id: usize,
    client: reqwest::Client,
    storage: Arc<Storage>,
    queue: Arc<WorkQueue>,
    reindex_duration: Duration,
}

impl CrawlerWorker {
    pub fn new(
        id: usize,
        fetch_timeout: StdDuration,
        storage: Arc<Storage>,
        queue: Arc<WorkQueue>,
        reindex_duration: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(fetch_timeout)
            .redirect(Policy::none())
            .build()?;
        Ok(Self {
            id,
            client,
            storage,
            queue,
            reindex_duration,
        })
    }

    /// Run until `cancel` fires or the queue returns a fatal error.
    pub async fn run(&self, cancel: CancellationToken) {
        loop {
            let msg = match self.queue.next(&cancel).await {
                Ok(msg) => msg,
                Err(Error::Cancelled) => {
                    info!(worker = self.id, "stopping on cancellation");
                    return;
                }
                Err(e) => {
                    warn!(worker = self.id, error = %e, "queue error, stopping");
                    return;
                }
            };

            if let Err(e) = self.handle(msg).await {
                debug!(worker = self.id, error = %e, "message dropped");
            }
        }
    }

    async fn handle(&self, msg: Msg) -> Result<()> {
        if !gate::should_index(&self.storage, msg.url.as_str(), self.reindex_duration).await {
            debug!(worker = self.id, url = %msg.url, "gate rejected, skipping fetch");
            return Ok(());
        }

        let response = self.client.get(msg.url.clone()).send().await?;

        if let Some(location) = response.headers().get(reqwest::header::LOCATION).cloned() {
            return self.handle_redirect(&msg, &location).await;
        }

        let body = response.text().await?;
        let (text, links) = html::extract(&body, &msg.url, msg.depth, msg.max_depth);

        for link in links {
            if let Err(e) = self
                .queue
                .add(
                    link.as_str(),
                    msg.origin.as_str(),
                    msg.depth + 1,
                    msg.max_depth,
                    self.reindex_duration,
                )
                .await
            {
                debug!(worker = self.id, error = %e, url = %link, "failed to enqueue link");
            }
        }

        indexer::index(
            &self.storage,
            msg.url.as_str(),
            msg.origin.as_str(),
            msg.depth,
            text.as_bytes(),
            self.reindex_duration,
        )
        .await
    }

    async fn handle_redirect(
        &self,
        msg: &Msg,
        location: &reqwest::header::HeaderValue,
    ) -> Result<()> {
        let location_str = location.to_str().map_err(|_| Error::Redirect)?;
        let target = msg.url.join(location_str).map_err(|_| Error::Redirect)?;

        if target == msg.url {
            return Err(Error::RedirectLoop);
        }
        if msg.depth >= msg.max_depth {
            return Err(Error::MaxDepthReached);
        }

        self.queue
            .add(
                target.as_str(),
                msg.origin.as_str(),
                msg.depth + 1,
                msg.max_depth,
                self.reindex_duration,
            )
            .await?;
        Err(Error::Redirect)
    }
}

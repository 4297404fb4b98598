use std::rc::Rc;
use tokio::time::{self, Duration};
use url::Url;

use crate::backend::FrontierStore;
use crate::cli::Profile;

use super::boundaries::Boundaries;
use super::counter::Counter;
use super::downloader::{Downloaded, Downloader};
use super::parser::extract_links;
use super::tasks_state::TasksState;
use super::url_data::UrlData;
use super::{PageHandler, STATUS_NOT_HTML, STATUS_NO_RESPONSE};

/// How long a worker naps after finding the frontier empty. Long enough for
/// the other workers' inserts to land, short enough to not be felt.
const IDLE_NAP: Duration = Duration::from_secs(1);

pub(crate) struct CrawlWorker<S: FrontierStore> {
    pub(crate) store: Rc<S>,
    pub(crate) downloader: Rc<dyn Downloader>,
    pub(crate) handler: Rc<dyn PageHandler>,
    pub(crate) boundaries: Rc<Boundaries>,
    pub(crate) tasks_state: Rc<TasksState>,
    pub(crate) counter: Rc<Counter>,
    pub(crate) profile: Rc<Profile>,
    pub(crate) token_id: i64,
}

impl<S: FrontierStore> CrawlWorker<S> {
    /// The worker loop: claim, fetch, extract, persist, repeat, until every
    /// worker in the pool has seen the frontier empty with nothing dequeued
    /// in between.
    pub(crate) async fn run(self, task_idx: usize) -> Result<(), crate::Error> {
        log::debug!("worker {} started", task_idx);

        loop {
            if self.tasks_state.all_idle() {
                break;
            }

            let record = self
                .store
                .next_url(self.token_id)
                .await
                .map_err(Into::into)?;

            let record = match record {
                Some(record) => record,
                None => {
                    self.tasks_state.set_idle(task_idx);
                    time::sleep(IDLE_NAP).await;
                    continue;
                }
            };

            // There is work again; any pending termination consensus is void.
            self.tasks_state.clear_all();

            self.store.mark_fetched(record.id).await.map_err(Into::into)?;

            let status = match Url::parse(&record.url) {
                Ok(page_url) => {
                    let (status, body) = self.fetch(&page_url).await;

                    if !body.is_empty() && (200..=299).contains(&status) {
                        self.process_page(&page_url, &body).await?;
                    }

                    status
                }
                Err(error) => {
                    log::warn!("at {}: stored URL does not parse: {}", record.url, error);
                    STATUS_NO_RESPONSE
                }
            };

            self.store
                .mark_processed(record.id, status)
                .await
                .map_err(Into::into)?;

            if status == STATUS_NO_RESPONSE {
                self.counter.register_error();
            } else {
                self.counter.register_closed();
            }

            log::info!("{} [status: {}]", record.url, status);
        }

        log::debug!("worker {} stopping", task_idx);

        Ok(())
    }

    /// One GET, folded into the outcome the frontier records: the real
    /// status for an HTML response, 13 when the response was not HTML and 0
    /// when there was no usable response at all. Never an error.
    async fn fetch(&self, page_url: &Url) -> (i32, String) {
        let timeout = Duration::from_secs_f64(self.profile.request_timeout);

        match time::timeout(timeout, self.downloader.download(page_url)).await {
            Ok(Ok(Downloaded::Html {
                status_code,
                content,
            })) => (
                i32::from(status_code.as_u16()),
                String::from_utf8_lossy(&content).into_owned(),
            ),
            Ok(Ok(Downloaded::Other { status_code })) => {
                log::debug!("at {}: not HTML ({})", page_url, status_code);
                (STATUS_NOT_HTML, String::new())
            }
            Ok(Err(error)) => {
                log::warn!("while crawling `{}` got: {}", page_url, error);
                (STATUS_NO_RESPONSE, String::new())
            }
            Err(_elapsed) => {
                log::warn!("at {}: request timed out", page_url);
                (STATUS_NO_RESPONSE, String::new())
            }
        }
    }

    /// Feeds every link on the page through the canonicaliser and the
    /// admission pipeline, then hands the page over to the content handler.
    async fn process_page(&self, page_url: &Url, body: &str) -> Result<(), crate::Error> {
        let limit = self.boundaries.urls_limit();

        // The cap is soft: sampled once per page, bumped locally.
        let mut known = match limit {
            Some(_) => self.store.count(self.token_id).await.map_err(Into::into)?,
            None => 0,
        };

        for raw in extract_links(body) {
            let candidate = match UrlData::resolve(raw, Some(page_url)) {
                Ok(candidate) => candidate,
                Err(error) => {
                    log::debug!("at {}: {}", page_url, error);
                    continue;
                }
            };

            let hash_id = candidate.hash_id();
            if self
                .store
                .has_hash(self.token_id, &hash_id)
                .await
                .map_err(Into::into)?
            {
                continue;
            }

            if !self.boundaries.is_allowed(&candidate) {
                log::debug!("at {}: {} is out of bounds", page_url, candidate.as_str());
                continue;
            }

            if let Some(limit) = limit {
                if known >= limit {
                    log::debug!(
                        "at {}: URL limit of {} reached; dropping {}",
                        page_url,
                        limit,
                        candidate.as_str()
                    );
                    continue;
                }
            }

            self.store
                .add_url(self.token_id, candidate.as_str(), &hash_id)
                .await
                .map_err(Into::into)?;
            known += 1;
        }

        if let Err(error) = self.handler.on_page(page_url, body).await {
            log::warn!("at {}: content handler failed: {}", page_url, error);
        }

        Ok(())
    }
}

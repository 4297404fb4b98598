use futures::future;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::backend::{Backend, FrontierStore, TokenSummary};
use crate::cli::Profile;

use super::boundaries::{Boundaries, Filters};
use super::counter::Counter;
use super::downloader::Downloader;
use super::tasks_state::TasksState;
use super::url_data::UrlData;
use super::worker::CrawlWorker;
use super::{CrawlingMode, PageHandler};

/// Owns one backend and runs whole crawl sessions against it, one at a time.
pub struct CrawlMaster<B: Backend> {
    backend: B,
    profile: Rc<Profile>,
    filters: Rc<Filters>,
    downloader: Rc<dyn Downloader>,
    handler: Rc<dyn PageHandler>,
    busy: AtomicBool,
}

impl<B: Backend> CrawlMaster<B> {
    /// Fails on configuration errors: a bad forbidden pattern or a worker
    /// count the tasks state cannot represent.
    pub fn new(
        backend: B,
        profile: Profile,
        downloader: Rc<dyn Downloader>,
        handler: Rc<dyn PageHandler>,
    ) -> Result<CrawlMaster<B>, crate::Error> {
        if !(1..=64).contains(&profile.number_of_tasks) {
            return Err(crate::Error::Custom(format!(
                "number_of_tasks must be in 1..=64, got {}",
                profile.number_of_tasks
            )));
        }

        let filters = Rc::new(Filters::compile(&profile)?);

        Ok(CrawlMaster {
            backend,
            profile: Rc::new(profile),
            filters,
            downloader,
            handler,
            busy: AtomicBool::new(false),
        })
    }

    /// Starts a new crawl session at `initial_url` and drives it until
    /// quiescence. Returns the new token id, or `None` when this master was
    /// already busy crawling.
    pub async fn start(
        &self,
        initial_url: &str,
        mode: CrawlingMode,
    ) -> Result<Option<i64>, anyhow::Error> {
        if self.busy.load(Ordering::Acquire) {
            log::warn!("crawling is already in process");
            return Ok(None);
        }

        let seed = UrlData::parse(initial_url)
            .map_err(|_| crate::Error::InvalidSeedUrl(initial_url.to_owned()))?;

        let token_id = self
            .backend
            .create_token(seed.as_str(), &seed.hash_id(), mode)
            .await
            .map_err(Into::<crate::Error>::into)?;

        log::info!("seeding token {} with {}", token_id, seed.as_str());

        self.resume(token_id).await?;

        Ok(Some(token_id))
    }

    /// Resumes the crawl session `token_id` from its last durable state.
    /// Finished sessions resume into an immediate, clean stop.
    pub async fn resume(&self, token_id: i64) -> Result<(), anyhow::Error> {
        if self.busy.load(Ordering::Acquire) {
            log::warn!("crawling is already in process");
            return Ok(());
        }

        self.run(token_id).await
    }

    pub async fn list_tokens(&self) -> Result<Vec<TokenSummary>, anyhow::Error> {
        Ok(self
            .backend
            .list_tokens()
            .await
            .map_err(Into::<crate::Error>::into)?)
    }

    async fn run(&self, token_id: i64) -> Result<(), anyhow::Error> {
        // Set panics to be logged:
        crate::panic::log_panics();

        let token = self
            .backend
            .load_token(token_id)
            .await
            .map_err(Into::<crate::Error>::into)?
            .ok_or(crate::Error::TokenNotFound(token_id))?;

        let store = Rc::new(
            self.backend
                .build_store()
                .await
                .map_err(Into::<crate::Error>::into)?,
        );

        // Rows claimed by a run that never finished become claimable again:
        store
            .reset_inflight(token_id)
            .await
            .map_err(Into::<crate::Error>::into)?;

        if store
            .pending_count(token_id)
            .await
            .map_err(Into::<crate::Error>::into)?
            == 0
        {
            log::info!("Crawling finished");
            return Ok(());
        }

        let seed = UrlData::parse(&token.url)?;
        let boundaries = Rc::new(Boundaries::new(&seed, token.mode, self.filters.clone()));
        let tasks_state = Rc::new(TasksState::new(self.profile.number_of_tasks));
        let counter = Rc::new(Counter::default());

        self.busy.store(true, Ordering::Release);

        let outcome = future::try_join_all((0..self.profile.number_of_tasks).map(|task_idx| {
            CrawlWorker {
                store: store.clone(),
                downloader: self.downloader.clone(),
                handler: self.handler.clone(),
                boundaries: boundaries.clone(),
                tasks_state: tasks_state.clone(),
                counter: counter.clone(),
                profile: self.profile.clone(),
                token_id,
            }
            .run(task_idx)
        }))
        .await;

        self.busy.store(false, Ordering::Release);
        outcome?;

        log::info!(
            "Crawling finished ({} URLs processed, {} errored)",
            counter.n_closed(),
            counter.n_error()
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use http::StatusCode;
    use std::cell::RefCell;
    use std::collections::{HashMap, HashSet};
    use std::rc::Rc;
    use url::Url;

    use crate::backend::{Backend, FrontierStore, MemoryBackend};
    use crate::cli::Profile;
    use crate::crawler::downloader::{Downloaded, Downloader, DummyDownloader};
    use crate::crawler::{CrawlingMode, NoopHandler, PageHandler, UrlData};

    use super::CrawlMaster;

    /// A scripted site: canonical URL to HTML body. Unknown URLs get a 404
    /// page, like a real server would serve.
    struct FakeSite {
        pages: HashMap<String, String>,
    }

    impl FakeSite {
        fn new(pages: &[(&str, &str)]) -> Rc<FakeSite> {
            Rc::new(FakeSite {
                pages: pages
                    .iter()
                    .map(|(url, body)| (url.to_string(), body.to_string()))
                    .collect(),
            })
        }
    }

    #[async_trait(?Send)]
    impl Downloader for FakeSite {
        async fn download(&self, page_url: &Url) -> Result<Downloaded, crate::Error> {
            match self.pages.get(page_url.as_str()) {
                Some(body) => Ok(Downloaded::Html {
                    status_code: StatusCode::OK,
                    content: body.clone().into_bytes(),
                }),
                None => Ok(Downloaded::Html {
                    status_code: StatusCode::NOT_FOUND,
                    content: b"<html>not here</html>".to_vec(),
                }),
            }
        }
    }

    fn master(
        backend: MemoryBackend,
        profile: Profile,
        downloader: Rc<dyn Downloader>,
    ) -> CrawlMaster<MemoryBackend> {
        CrawlMaster::new(backend, profile, downloader, Rc::new(NoopHandler))
            .expect("test profile is valid")
    }

    #[tokio::test(start_paused = true)]
    async fn crawls_every_reachable_page_exactly_once() {
        let site = FakeSite::new(&[
            (
                "https://h.net/",
                r#"<a href="/a.html">a</a> <a href='/b.html'>b</a>"#,
            ),
            (
                "https://h.net/a.html",
                r#"<a href="/b.html">b</a> <a href="/">home</a>"#,
            ),
            ("https://h.net/b.html", "<p>the end</p>"),
        ]);
        let backend = MemoryBackend::default();
        let master = master(
            backend.clone(),
            Profile {
                number_of_tasks: 2,
                ..Profile::default()
            },
            site,
        );

        let token_id = master
            .start("https://h.net/", CrawlingMode::DomainOnly)
            .await
            .unwrap()
            .expect("master was not busy");

        let urls = backend.urls();
        assert_eq!(urls.len(), 3);
        assert!(urls.iter().all(|record| record.token_id == token_id));
        assert!(urls.iter().all(|record| record.processed && record.fetched));
        assert!(urls.iter().all(|record| record.status == Some(200)));

        let hashes: HashSet<_> = urls.iter().map(|record| record.hash_id.clone()).collect();
        assert_eq!(hashes.len(), urls.len());
    }

    #[tokio::test(start_paused = true)]
    async fn a_missing_page_keeps_its_status_and_feeds_nothing_back() {
        let site = FakeSite::new(&[(
            "https://h.net/",
            r#"<a href="/gone.html">gone</a>"#,
        )]);
        let backend = MemoryBackend::default();
        let master = master(backend.clone(), Profile::default(), site);

        master
            .start("https://h.net/", CrawlingMode::DomainOnly)
            .await
            .unwrap();

        let urls = backend.urls();
        assert_eq!(urls.len(), 2);

        let gone = urls
            .iter()
            .find(|record| record.url.ends_with("/gone.html"))
            .expect("the dead link was recorded");
        assert!(gone.processed);
        assert_eq!(gone.status, Some(404));
    }

    #[tokio::test(start_paused = true)]
    async fn non_html_responses_are_recorded_as_status_13() {
        struct NotHtml;

        #[async_trait(?Send)]
        impl Downloader for NotHtml {
            async fn download(&self, _page_url: &Url) -> Result<Downloaded, crate::Error> {
                Ok(Downloaded::Other {
                    status_code: StatusCode::OK,
                })
            }
        }

        let backend = MemoryBackend::default();
        let master = master(backend.clone(), Profile::default(), Rc::new(NotHtml));

        master
            .start("https://h.net/", CrawlingMode::DomainOnly)
            .await
            .unwrap();

        assert_eq!(backend.urls()[0].status, Some(13));
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_errors_are_recorded_as_status_0() {
        struct Unreachable;

        #[async_trait(?Send)]
        impl Downloader for Unreachable {
            async fn download(&self, _page_url: &Url) -> Result<Downloaded, crate::Error> {
                Err(crate::Error::Custom("connection refused".to_owned()))
            }
        }

        let backend = MemoryBackend::default();
        let master = master(backend.clone(), Profile::default(), Rc::new(Unreachable));

        master
            .start("https://h.net/", CrawlingMode::DomainOnly)
            .await
            .unwrap();

        let urls = backend.urls();
        assert!(urls[0].processed);
        assert_eq!(urls[0].status, Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn a_hanging_server_times_out_into_status_0() {
        struct Hanging;

        #[async_trait(?Send)]
        impl Downloader for Hanging {
            async fn download(&self, _page_url: &Url) -> Result<Downloaded, crate::Error> {
                futures::future::pending::<()>().await;
                unreachable!()
            }
        }

        let backend = MemoryBackend::default();
        let master = master(backend.clone(), Profile::default(), Rc::new(Hanging));

        master
            .start("https://h.net/", CrawlingMode::DomainOnly)
            .await
            .unwrap();

        assert_eq!(backend.urls()[0].status, Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn domain_only_mode_does_not_cross_into_subdomains() {
        let pages = [
            (
                "https://h.net/",
                r#"<a href="https://sub.h.net/a.html">sub</a>"#,
            ),
            ("https://sub.h.net/a.html", "<p>sub</p>"),
        ];

        let backend = MemoryBackend::default();
        let crawler = master(backend.clone(), Profile::default(), FakeSite::new(&pages));
        crawler
            .start("https://h.net/", CrawlingMode::DomainOnly)
            .await
            .unwrap();
        assert_eq!(backend.urls().len(), 1);

        let backend = MemoryBackend::default();
        let crawler = master(backend.clone(), Profile::default(), FakeSite::new(&pages));
        crawler
            .start("https://h.net/", CrawlingMode::DomainAndSubdomains)
            .await
            .unwrap();
        assert_eq!(backend.urls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn the_url_limit_caps_admission() {
        let site = FakeSite::new(&[(
            "https://h.net/",
            r#"
                <a href="/p1.html">1</a>
                <a href="/p2.html">2</a>
                <a href="/p3.html">3</a>
                <a href="/p4.html">4</a>
                <a href="/p5.html">5</a>
            "#,
        )]);
        let backend = MemoryBackend::default();
        let master = master(
            backend.clone(),
            Profile {
                urls_limit: Some(3),
                ..Profile::default()
            },
            site,
        );

        master
            .start("https://h.net/", CrawlingMode::DomainOnly)
            .await
            .unwrap();

        assert_eq!(backend.urls().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn resume_reclaims_inflight_urls_and_finishes_the_run() {
        let backend = MemoryBackend::default();
        let seed = UrlData::parse("https://h.net/").unwrap();
        let token_id = backend
            .create_token(seed.as_str(), &seed.hash_id(), CrawlingMode::DomainOnly)
            .await
            .unwrap();

        let store = backend.build_store().await.unwrap();
        for i in 1..20 {
            store
                .add_url(
                    token_id,
                    &format!("https://h.net/p{}.html", i),
                    &format!("hash-{:02}", i),
                )
                .await
                .unwrap();
        }

        // A previous run processed five rows and died holding three claims:
        for id in 1..=5 {
            store.mark_fetched(id).await.unwrap();
            store.mark_processed(id, 200).await.unwrap();
        }
        for id in 6..=8 {
            store.mark_fetched(id).await.unwrap();
        }

        let master = master(backend.clone(), Profile::default(), FakeSite::new(&[]));
        master.resume(token_id).await.unwrap();

        let urls = backend.urls();
        assert_eq!(urls.len(), 20);
        assert!(urls.iter().all(|record| record.processed));

        // The five finished rows kept their status; everything else went
        // through the (scripted) fetcher again.
        assert!(urls
            .iter()
            .filter(|record| record.id <= 5)
            .all(|record| record.status == Some(200)));
        assert!(urls
            .iter()
            .filter(|record| record.id > 5)
            .all(|record| record.status == Some(404)));

        let hashes: HashSet<_> = urls.iter().map(|record| record.hash_id.clone()).collect();
        assert_eq!(hashes.len(), urls.len());
    }

    #[tokio::test(start_paused = true)]
    async fn resuming_a_finished_token_fetches_nothing() {
        let backend = MemoryBackend::default();
        let seed = UrlData::parse("https://h.net/").unwrap();
        let token_id = backend
            .create_token(seed.as_str(), &seed.hash_id(), CrawlingMode::DomainOnly)
            .await
            .unwrap();

        let store = backend.build_store().await.unwrap();
        store.mark_fetched(1).await.unwrap();
        store.mark_processed(1, 200).await.unwrap();

        // The dummy downloader panics on use, so the clean stop really does
        // stop before any fetch.
        let master = master(backend.clone(), Profile::default(), Rc::new(DummyDownloader));
        master.resume(token_id).await.unwrap();

        assert_eq!(backend.urls().len(), 1);
        assert_eq!(backend.urls()[0].status, Some(200));
    }

    #[tokio::test(start_paused = true)]
    async fn resuming_an_unknown_token_fails() {
        let master = master(
            MemoryBackend::default(),
            Profile::default(),
            Rc::new(DummyDownloader),
        );

        assert!(master.resume(42).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn an_invalid_seed_fails_before_anything_is_written() {
        let backend = MemoryBackend::default();
        let master = master(backend.clone(), Profile::default(), Rc::new(DummyDownloader));

        assert!(master
            .start("not a url", CrawlingMode::DomainOnly)
            .await
            .is_err());
        assert!(backend.urls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn the_handler_sees_each_successful_page_exactly_once() {
        struct Recording {
            seen: Rc<RefCell<Vec<String>>>,
        }

        #[async_trait(?Send)]
        impl PageHandler for Recording {
            async fn on_page(&self, page_url: &Url, _body: &str) -> Result<(), crate::Error> {
                self.seen.borrow_mut().push(page_url.to_string());
                Ok(())
            }
        }

        let site = FakeSite::new(&[
            (
                "https://h.net/",
                r#"<a href="/a.html">a</a> <a href="/gone.html">gone</a>"#,
            ),
            ("https://h.net/a.html", "<p>a</p>"),
        ]);
        let seen = Rc::new(RefCell::new(vec![]));
        let backend = MemoryBackend::default();
        let master = CrawlMaster::new(
            backend.clone(),
            Profile::default(),
            site,
            Rc::new(Recording { seen: seen.clone() }),
        )
        .unwrap();

        master
            .start("https://h.net/", CrawlingMode::DomainOnly)
            .await
            .unwrap();

        let mut seen = seen.borrow().clone();
        seen.sort();
        // The 404 page is processed but never shown to the handler.
        assert_eq!(seen, vec!["https://h.net/", "https://h.net/a.html"]);
    }

    #[tokio::test(start_paused = true)]
    async fn a_failing_handler_does_not_stop_the_crawl() {
        struct Grumpy;

        #[async_trait(?Send)]
        impl PageHandler for Grumpy {
            async fn on_page(&self, _page_url: &Url, _body: &str) -> Result<(), crate::Error> {
                Err(crate::Error::Custom("not today".to_owned()))
            }
        }

        let site = FakeSite::new(&[(
            "https://h.net/",
            r#"<a href="/a.html">a</a>"#,
        )]);
        let backend = MemoryBackend::default();
        let master = CrawlMaster::new(backend.clone(), Profile::default(), site, Rc::new(Grumpy))
            .unwrap();

        master
            .start("https://h.net/", CrawlingMode::DomainOnly)
            .await
            .unwrap();

        assert!(backend.urls().iter().all(|record| record.processed));
    }

    #[tokio::test(start_paused = true)]
    async fn a_wide_pool_settles_a_ring_of_interlinked_pages() {
        let mut pages = vec![];
        for i in 0..200 {
            pages.push((
                format!("https://h.net/p{}.html", i),
                format!(
                    r#"<a href="/p{}.html">next</a> <a href="/p{}.html">skip</a>"#,
                    (i + 1) % 200,
                    (i * 7) % 200,
                ),
            ));
        }
        let page_refs: Vec<(&str, &str)> = pages
            .iter()
            .map(|(url, body)| (url.as_str(), body.as_str()))
            .collect();

        let backend = MemoryBackend::default();
        let master = master(
            backend.clone(),
            Profile {
                number_of_tasks: 10,
                ..Profile::default()
            },
            FakeSite::new(&page_refs),
        );

        master
            .start("https://h.net/p0.html", CrawlingMode::DomainOnly)
            .await
            .unwrap();

        let urls = backend.urls();
        assert_eq!(urls.len(), 200);
        assert!(urls
            .iter()
            .all(|record| record.processed && record.fetched && record.status == Some(200)));
    }
}

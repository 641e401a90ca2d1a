use std::sync::Arc;
use std::time::Duration;

use camino::Utf8Path;
use serde::Serialize;
use tracing::info;

use crate::config::{FailurePolicy, ResolvedConfig};
use crate::crawler::{BatchOutcome, TreeCrawler};
use crate::domain::{City, CityCounts, Plate, RemoteNode};
use crate::endpoints::ApiEndpoints;
use crate::error::CrawlError;
use crate::fetcher::{HttpFetcher, JsonFetcher};
use crate::output::DocumentWriter;
use crate::registry::SeedRegistry;
use crate::submission::SubmissionHarvester;

#[derive(Debug, Clone, Serialize)]
pub struct CityReport {
    pub id: u64,
    pub name: String,
    pub plate: Option<Plate>,
    pub counts: CityCounts,
    pub path: String,
    pub crawled_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailureReport {
    pub id: u64,
    pub url: Option<String>,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub cities: Vec<CityReport>,
    pub tree_path: String,
    pub failures: Vec<FailureReport>,
}

impl BatchReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HarvestReport {
    pub city: String,
    pub schools: usize,
    pub written: Vec<String>,
    pub failures: Vec<FailureReport>,
    pub harvested_at: String,
}

impl HarvestReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SchoolReport {
    pub school_id: u64,
    pub ballot_boxes: usize,
    pub reported: usize,
    pub path: String,
}

/// `Detail` events are only shown when the sink runs verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressLevel {
    Info,
    Detail,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub level: ProgressLevel,
    pub message: String,
    pub elapsed: Option<Duration>,
}

impl ProgressEvent {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: ProgressLevel::Info,
            message: message.into(),
            elapsed: None,
        }
    }

    pub fn detail(message: impl Into<String>) -> Self {
        Self {
            level: ProgressLevel::Detail,
            message: message.into(),
            elapsed: None,
        }
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = Some(elapsed);
        self
    }
}

pub trait ProgressSink: Send + Sync {
    fn event(&self, event: ProgressEvent);
}

pub struct App<F: JsonFetcher> {
    registry: SeedRegistry,
    crawler: TreeCrawler<F>,
    harvester: SubmissionHarvester<F>,
    writer: DocumentWriter,
    policy: FailurePolicy,
    sink: Arc<dyn ProgressSink>,
}

impl App<HttpFetcher> {
    pub fn from_config(
        config: &ResolvedConfig,
        registry: SeedRegistry,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<Self, CrawlError> {
        let endpoints = ApiEndpoints::new(config.api_base_url.clone());
        let crawler = TreeCrawler::new(
            HttpFetcher::new(config)?.with_sink(sink.clone()),
            endpoints.clone(),
            sink.clone(),
        );
        let harvester = SubmissionHarvester::new(
            HttpFetcher::for_submissions(config)?.with_sink(sink.clone()),
            endpoints,
            config.max_concurrent_requests,
            sink.clone(),
        );
        Ok(Self::new(
            registry,
            crawler,
            harvester,
            DocumentWriter::new(config.output_dir.clone()),
            config.failure_policy,
            sink,
        ))
    }
}

impl<F: JsonFetcher> App<F> {
    pub fn new(
        registry: SeedRegistry,
        crawler: TreeCrawler<F>,
        harvester: SubmissionHarvester<F>,
        writer: DocumentWriter,
        policy: FailurePolicy,
        sink: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            registry,
            crawler,
            harvester,
            writer,
            policy,
            sink,
        }
    }

    pub fn registry(&self) -> &SeedRegistry {
        &self.registry
    }

    /// Crawl one city by plate and write its document. Nothing is written on failure.
    pub async fn crawl_city(&self, plate: Plate) -> Result<CityReport, CrawlError> {
        let seed = self.registry.lookup(plate)?;
        self.sink.event(ProgressEvent::info(format!(
            "phase=Crawl; city {} ({})",
            seed.name, plate
        )));
        let city = self.crawler.crawl_city(seed).await?;
        self.write_city(&city)
    }

    /// Crawl every registry city, then write per-city documents and `tree.json`.
    pub async fn crawl_all(&self) -> Result<BatchReport, CrawlError> {
        self.sink.event(ProgressEvent::info(format!(
            "phase=Crawl; {} cities",
            self.registry.len()
        )));
        let BatchOutcome { cities, failures } = self
            .crawler
            .crawl_batch(self.registry.seeds(), self.policy)
            .await?;

        let reports = cities
            .iter()
            .map(|city| self.write_city(city))
            .collect::<Result<Vec<_>, CrawlError>>()?;
        let tree_path = self.writer.write_tree(&cities)?;
        self.sink.event(ProgressEvent::info(format!("Wrote to {tree_path}")));

        Ok(BatchReport {
            cities: reports,
            tree_path: tree_path.to_string(),
            failures: failures
                .into_iter()
                .map(|failure| failure_report(failure.seed.id, &failure.error))
                .collect(),
        })
    }

    pub async fn list_cities(&self) -> Result<Vec<RemoteNode>, CrawlError> {
        self.crawler.list_cities().await
    }

    /// Fetch submissions for every school of a saved city document.
    pub async fn harvest(&self, city_document: &Utf8Path) -> Result<HarvestReport, CrawlError> {
        let city = DocumentWriter::read_city(city_document)?;
        let school_ids = city.school_ids();
        self.sink.event(ProgressEvent::info(format!(
            "phase=Harvest; {} schools in {}",
            school_ids.len(),
            city.name()
        )));

        let outcome = self.harvester.harvest(&school_ids, self.policy).await?;
        let written = outcome
            .schools
            .iter()
            .map(|submissions| {
                self.writer
                    .write_submissions(&city, submissions)
                    .map(|path| path.to_string())
            })
            .collect::<Result<Vec<_>, CrawlError>>()?;

        Ok(HarvestReport {
            city: city.name().to_string(),
            schools: school_ids.len(),
            written,
            failures: outcome
                .failures
                .iter()
                .map(|failure| failure_report(failure.school_id, &failure.error))
                .collect(),
            harvested_at: iso_timestamp(),
        })
    }

    pub async fn fetch_school(&self, school_id: u64) -> Result<SchoolReport, CrawlError> {
        let submissions = self.harvester.fetch_school(school_id).await?;
        let path = self.writer.school_path(school_id);
        DocumentWriter::write_json(&path, &submissions.payload)?;
        self.sink.event(ProgressEvent::info(format!("Wrote to {path}")));
        Ok(SchoolReport {
            school_id,
            ballot_boxes: submissions.ballot_boxes.len(),
            reported: submissions.reported(),
            path: path.to_string(),
        })
    }

    fn write_city(&self, city: &City) -> Result<CityReport, CrawlError> {
        let path = self.writer.write_city(city)?;
        info!(city = city.name(), path = %path, "wrote city document");
        self.sink.event(ProgressEvent::info(format!("Wrote to {path}")));
        Ok(CityReport {
            id: city.id(),
            name: city.name().to_string(),
            plate: city.plate(),
            counts: city.counts(),
            path: path.to_string(),
            crawled_at: iso_timestamp(),
        })
    }
}

fn failure_report(id: u64, error: &CrawlError) -> FailureReport {
    FailureReport {
        id,
        url: error.url().map(|url| url.to_string()),
        error: error.to_string(),
    }
}

fn iso_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

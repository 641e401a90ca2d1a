use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::app::{ProgressEvent, ProgressSink};
use crate::config::FailurePolicy;
use crate::domain::SubmissionResult;
use crate::endpoints::ApiEndpoints;
use crate::error::CrawlError;
use crate::fetcher::JsonFetcher;

/// One school's submissions: the payload exactly as served, plus a typed view of it.
#[derive(Debug, Clone, Serialize)]
pub struct SchoolSubmissions {
    pub school_id: u64,
    pub payload: Value,
    #[serde(skip)]
    pub ballot_boxes: Vec<SubmissionResult>,
}

impl SchoolSubmissions {
    /// Ballot boxes that already carry a result sheet.
    pub fn reported(&self) -> usize {
        self.ballot_boxes
            .iter()
            .filter(|ballot_box| ballot_box.has_results())
            .count()
    }
}

#[derive(Debug)]
pub struct SchoolFailure {
    pub school_id: u64,
    pub error: CrawlError,
}

#[derive(Debug, Default)]
pub struct HarvestOutcome {
    pub schools: Vec<SchoolSubmissions>,
    pub failures: Vec<SchoolFailure>,
}

/// Fetches ballot-box results for schools of an already crawled city.
pub struct SubmissionHarvester<F: JsonFetcher> {
    fetcher: F,
    endpoints: ApiEndpoints,
    concurrency: usize,
    sink: Arc<dyn ProgressSink>,
}

impl<F: JsonFetcher> SubmissionHarvester<F> {
    pub fn new(
        fetcher: F,
        endpoints: ApiEndpoints,
        concurrency: usize,
        sink: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            fetcher,
            endpoints,
            concurrency: concurrency.max(1),
            sink,
        }
    }

    pub async fn fetch_school(&self, school_id: u64) -> Result<SchoolSubmissions, CrawlError> {
        let url = self.endpoints.submissions(school_id);
        let payload = self.fetcher.fetch(&url).await?;
        let ballot_boxes = parse_submissions(&url, &payload)?;
        debug!(school_id, ballot_boxes = ballot_boxes.len(), "fetched submissions");
        Ok(SchoolSubmissions {
            school_id,
            payload,
            ballot_boxes,
        })
    }

    /// Fetch every school in `school_ids`, keeping their order in the outcome.
    pub async fn harvest(
        &self,
        school_ids: &[u64],
        policy: FailurePolicy,
    ) -> Result<HarvestOutcome, CrawlError> {
        let requests = stream::iter(school_ids.iter().copied())
            .map(|school_id| async move { (school_id, self.fetch_school(school_id).await) })
            .buffered(self.concurrency);

        match policy {
            FailurePolicy::FailFast => {
                let schools = requests
                    .map(|(_, result)| result.map(|submissions| self.record(submissions)))
                    .try_collect::<Vec<_>>()
                    .await?;
                Ok(HarvestOutcome {
                    schools,
                    failures: Vec::new(),
                })
            }
            FailurePolicy::Isolate => {
                let mut outcome = HarvestOutcome::default();
                let results = requests.collect::<Vec<_>>().await;
                for (school_id, result) in results {
                    match result {
                        Ok(submissions) => outcome.schools.push(self.record(submissions)),
                        Err(error) => {
                            warn!(school_id, error = %error, "school submissions failed");
                            outcome.failures.push(SchoolFailure { school_id, error });
                        }
                    }
                }
                Ok(outcome)
            }
        }
    }

    fn record(&self, submissions: SchoolSubmissions) -> SchoolSubmissions {
        self.sink.event(ProgressEvent::info(format!(
            "school {}: {} ballot boxes",
            submissions.school_id,
            submissions.ballot_boxes.len()
        )));
        submissions
    }
}

/// Typed view of a submissions payload: a list of ballot boxes, a single one,
/// or `null`. Other top-level shapes are refused; list elements that are not
/// objects are left out of the view.
pub fn parse_submissions(url: &str, payload: &Value) -> Result<Vec<SubmissionResult>, CrawlError> {
    match payload {
        Value::Array(items) => Ok(items
            .iter()
            .filter_map(|item| SubmissionResult::from_value(item.clone()))
            .collect()),
        Value::Object(_) => Ok(SubmissionResult::from_value(payload.clone())
            .into_iter()
            .collect()),
        Value::Null => Ok(Vec::new()),
        _ => Err(CrawlError::Payload {
            url: url.to_string(),
            message: "expected a JSON array of submissions".to_string(),
        }),
    }
}

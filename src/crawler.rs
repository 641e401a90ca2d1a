use std::sync::Arc;
use std::time::Instant;

use futures::future::{join_all, try_join_all};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::app::{ProgressEvent, ProgressSink};
use crate::config::FailurePolicy;
use crate::domain::{City, CitySeed, District, Neighborhood, RemoteNode, School};
use crate::endpoints::ApiEndpoints;
use crate::error::CrawlError;
use crate::fetcher::JsonFetcher;

#[derive(Debug)]
pub struct CityFailure {
    pub seed: CitySeed,
    pub error: CrawlError,
}

/// Result of crawling several roots. Both lists keep seed order.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub cities: Vec<City>,
    pub failures: Vec<CityFailure>,
}

impl BatchOutcome {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Crawls city → districts → neighborhoods → schools.
///
/// Every level fetches its child collection once, then crawls the children
/// concurrently and only builds the parent when all of them succeeded. The
/// children keep the order the API returned them in.
pub struct TreeCrawler<F: JsonFetcher> {
    fetcher: F,
    endpoints: ApiEndpoints,
    sink: Arc<dyn ProgressSink>,
}

impl<F: JsonFetcher> TreeCrawler<F> {
    pub fn new(fetcher: F, endpoints: ApiEndpoints, sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            fetcher,
            endpoints,
            sink,
        }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn endpoints(&self) -> &ApiEndpoints {
        &self.endpoints
    }

    /// Cities as listed by the remote `/cities` collection.
    pub async fn list_cities(&self) -> Result<Vec<RemoteNode>, CrawlError> {
        self.fetch_nodes(&self.endpoints.cities()).await
    }

    pub async fn crawl_city(&self, seed: &CitySeed) -> Result<City, CrawlError> {
        let start = Instant::now();
        let nodes = self.fetch_nodes(&self.endpoints.districts(seed.id)).await?;
        debug!(city = %seed.name, districts = nodes.len(), "expanding city");

        let districts = try_join_all(
            nodes
                .into_iter()
                .map(|node| self.crawl_district(seed.id, node)),
        )
        .await?;

        let city = City::from_seed(seed, districts);
        let counts = city.counts();
        info!(
            city = %seed.name,
            districts = counts.districts,
            neighborhoods = counts.neighborhoods,
            schools = counts.schools,
            "crawled city"
        );
        self.sink.event(
            ProgressEvent::info(format!(
                "city {}: {} districts, {} neighborhoods, {} schools",
                seed.name, counts.districts, counts.neighborhoods, counts.schools
            ))
            .with_elapsed(start.elapsed()),
        );
        Ok(city)
    }

    pub async fn crawl_district(
        &self,
        city_id: u64,
        node: RemoteNode,
    ) -> Result<District, CrawlError> {
        let start = Instant::now();
        let url = self.endpoints.neighborhoods(city_id, node.id);
        let children = self.fetch_nodes(&url).await?;

        let neighborhoods = try_join_all(
            children
                .into_iter()
                .map(|child| self.crawl_neighborhood(city_id, node.id, child)),
        )
        .await?;

        self.sink.event(
            ProgressEvent::info(format!(
                "district {}: {} neighborhoods",
                node.name,
                neighborhoods.len()
            ))
            .with_elapsed(start.elapsed()),
        );
        Ok(District::new(city_id, node, neighborhoods))
    }

    pub async fn crawl_neighborhood(
        &self,
        city_id: u64,
        district_id: u64,
        node: RemoteNode,
    ) -> Result<Neighborhood, CrawlError> {
        let url = self.endpoints.schools(city_id, district_id, node.id);
        let schools = self
            .fetch_nodes(&url)
            .await?
            .into_iter()
            .map(|child| School::new(city_id, district_id, node.id, child))
            .collect::<Vec<_>>();

        debug!(neighborhood = %node.name, schools = schools.len(), "crawled neighborhood");
        self.sink.event(ProgressEvent::detail(format!(
            "neighborhood {}: {} schools",
            node.name,
            schools.len()
        )));
        Ok(Neighborhood::new(city_id, district_id, node, schools))
    }

    /// Crawl every seed concurrently.
    ///
    /// With [`FailurePolicy::FailFast`] the first failing city aborts the
    /// whole batch and the error is returned. With [`FailurePolicy::Isolate`]
    /// each city stands alone and failures are reported in the outcome.
    pub async fn crawl_batch(
        &self,
        seeds: &[CitySeed],
        policy: FailurePolicy,
    ) -> Result<BatchOutcome, CrawlError> {
        match policy {
            FailurePolicy::FailFast => {
                let cities = try_join_all(seeds.iter().map(|seed| self.crawl_city(seed))).await?;
                Ok(BatchOutcome {
                    cities,
                    failures: Vec::new(),
                })
            }
            FailurePolicy::Isolate => {
                let results = join_all(seeds.iter().map(|seed| self.crawl_city(seed))).await;
                let mut outcome = BatchOutcome::default();
                for (seed, result) in seeds.iter().zip(results) {
                    match result {
                        Ok(city) => outcome.cities.push(city),
                        Err(error) => {
                            warn!(city = %seed.name, error = %error, "city crawl failed");
                            outcome.failures.push(CityFailure {
                                seed: seed.clone(),
                                error,
                            });
                        }
                    }
                }
                Ok(outcome)
            }
        }
    }

    async fn fetch_nodes(&self, url: &str) -> Result<Vec<RemoteNode>, CrawlError> {
        let value = self.fetcher.fetch(url).await?;
        parse_nodes(url, value)
    }
}

/// Interpret a collection payload as a list of `{id, name}` records.
pub fn parse_nodes(url: &str, value: Value) -> Result<Vec<RemoteNode>, CrawlError> {
    let Value::Array(items) = value else {
        return Err(CrawlError::Payload {
            url: url.to_string(),
            message: "expected a JSON array".to_string(),
        });
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            serde_json::from_value::<RemoteNode>(item).map_err(|err| CrawlError::Payload {
                url: url.to_string(),
                message: format!("element {index}: {err}"),
            })
        })
        .collect()
}

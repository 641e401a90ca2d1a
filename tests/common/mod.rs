#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use serde_json::{Value, json};

use sonuc_crawler::app::{ProgressEvent, ProgressSink};
use sonuc_crawler::domain::{CitySeed, Plate};
use sonuc_crawler::endpoints::ApiEndpoints;
use sonuc_crawler::error::CrawlError;
use sonuc_crawler::fetcher::JsonFetcher;

pub const BASE: &str = "http://mock.test/api/v1";

pub fn endpoints() -> ApiEndpoints {
    ApiEndpoints::new(BASE)
}

/// In-memory "GET JSON by URL". Unknown URLs answer 404.
#[derive(Default)]
pub struct MockFetcher {
    routes: HashMap<String, Value>,
    failures: HashMap<String, u16>,
    delays: HashMap<String, Duration>,
    calls: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub fn route(mut self, url: impl Into<String>, value: Value) -> Self {
        self.routes.insert(url.into(), value);
        self
    }

    pub fn fail(mut self, url: impl Into<String>, status: u16) -> Self {
        self.failures.insert(url.into(), status);
        self
    }

    pub fn delay(mut self, url: impl Into<String>, delay: Duration) -> Self {
        self.delays.insert(url.into(), delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl JsonFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<Value, CrawlError> {
        self.calls.lock().unwrap().push(url.to_string());
        if let Some(delay) = self.delays.get(url) {
            tokio::time::sleep(*delay).await;
        }
        if let Some(status) = self.failures.get(url) {
            return Err(CrawlError::Status {
                url: url.to_string(),
                status: *status,
                message: "mock failure".to_string(),
            });
        }
        self.routes
            .get(url)
            .cloned()
            .ok_or_else(|| CrawlError::Status {
                url: url.to_string(),
                status: 404,
                message: "no such route".to_string(),
            })
    }
}

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn messages(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl ProgressSink for RecordingSink {
    fn event(&self, event: ProgressEvent) {
        self.events.lock().unwrap().push(event.message);
    }
}

pub fn istanbul() -> CitySeed {
    CitySeed {
        id: 1,
        name: "Istanbul".to_string(),
        plate: Some(Plate::new(34)),
    }
}

pub fn ankara() -> CitySeed {
    CitySeed {
        id: 2,
        name: "Ankara".to_string(),
        plate: Some(Plate::new(6)),
    }
}

/// Istanbul → Kadikoy → Moda → Moda Primary.
pub fn single_path_fixture() -> MockFetcher {
    let api = endpoints();
    MockFetcher::default()
        .route(api.districts(1), json!([{"id": 10, "name": "Kadikoy"}]))
        .route(api.neighborhoods(1, 10), json!([{"id": 100, "name": "Moda"}]))
        .route(
            api.schools(1, 10, 100),
            json!([{"id": 1000, "name": "Moda Primary"}]),
        )
}

/// Two cities; Istanbul has two districts with several neighborhoods and schools.
pub fn wide_fixture() -> MockFetcher {
    let api = endpoints();
    MockFetcher::default()
        .route(
            api.districts(1),
            json!([{"id": 10, "name": "Kadikoy"}, {"id": 11, "name": "Besiktas"}]),
        )
        .route(
            api.neighborhoods(1, 10),
            json!([{"id": 100, "name": "Moda"}, {"id": 101, "name": "Fenerbahce"}]),
        )
        .route(
            api.neighborhoods(1, 11),
            json!([{"id": 110, "name": "Levent"}]),
        )
        .route(
            api.schools(1, 10, 100),
            json!([{"id": 1000, "name": "Moda Primary"}, {"id": 1001, "name": "Moda High"}]),
        )
        .route(api.schools(1, 10, 101), json!([]))
        .route(
            api.schools(1, 11, 110),
            json!([{"id": 1100, "name": "Levent College"}]),
        )
        .route(api.districts(2), json!([{"id": 20, "name": "Cankaya"}]))
        .route(api.neighborhoods(2, 20), json!([{"id": 200, "name": "Kizilay"}]))
        .route(
            api.schools(2, 20, 200),
            json!([{"id": 2000, "name": "Kizilay Primary"}]),
        )
}

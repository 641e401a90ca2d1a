pub const DEFAULT_BASE_URL: &str = "https://api-sonuc.oyveotesi.org/api/v1";

/// Canonical collection URLs of the results API.
#[derive(Debug, Clone)]
pub struct ApiEndpoints {
    base_url: String,
}

impl ApiEndpoints {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn cities(&self) -> String {
        format!("{}/cities", self.base_url)
    }

    pub fn districts(&self, city_id: u64) -> String {
        format!("{}/cities/{city_id}/districts", self.base_url)
    }

    pub fn neighborhoods(&self, city_id: u64, district_id: u64) -> String {
        format!(
            "{}/cities/{city_id}/districts/{district_id}/neighborhoods",
            self.base_url
        )
    }

    pub fn schools(&self, city_id: u64, district_id: u64, neighborhood_id: u64) -> String {
        format!(
            "{}/cities/{city_id}/districts/{district_id}/neighborhoods/{neighborhood_id}/schools",
            self.base_url
        )
    }

    pub fn submissions(&self, school_id: u64) -> String {
        format!("{}/submission/school/{school_id}", self.base_url)
    }
}

impl Default for ApiEndpoints {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::CrawlError;

/// External region code used to look a city up in the seed registry.
/// Leading zeros are insignificant: `06` and `6` are the same plate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Plate(u32);

impl Plate {
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Plate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Plate {
    type Err = CrawlError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let is_valid = !trimmed.is_empty() && trimmed.chars().all(|ch| ch.is_ascii_digit());
        if !is_valid {
            return Err(CrawlError::InvalidPlate(value.to_string()));
        }
        trimmed
            .parse::<u32>()
            .map(Self)
            .map_err(|_| CrawlError::InvalidPlate(value.to_string()))
    }
}

/// Caller-supplied root of a crawl.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitySeed {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub plate: Option<Plate>,
}

/// One element of a remote collection endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteNode {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct City {
    id: u64,
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    plate: Option<Plate>,
    districts: Vec<District>,
}

impl City {
    pub(crate) fn from_seed(seed: &CitySeed, districts: Vec<District>) -> Self {
        Self {
            id: seed.id,
            name: seed.name.clone(),
            plate: seed.plate,
            districts,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn plate(&self) -> Option<Plate> {
        self.plate
    }

    pub fn districts(&self) -> &[District] {
        &self.districts
    }

    /// School ids in document order.
    pub fn school_ids(&self) -> Vec<u64> {
        self.districts
            .iter()
            .flat_map(|district| district.neighborhoods())
            .flat_map(|neighborhood| neighborhood.schools())
            .map(|school| school.id())
            .collect()
    }

    pub fn counts(&self) -> CityCounts {
        let neighborhoods = self
            .districts
            .iter()
            .map(|district| district.neighborhoods().len())
            .sum();
        let schools = self
            .districts
            .iter()
            .flat_map(|district| district.neighborhoods())
            .map(|neighborhood| neighborhood.schools().len())
            .sum();
        CityCounts {
            districts: self.districts.len(),
            neighborhoods,
            schools,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CityCounts {
    pub districts: usize,
    pub neighborhoods: usize,
    pub schools: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct District {
    id: u64,
    name: String,
    city_id: u64,
    neighborhoods: Vec<Neighborhood>,
}

impl District {
    pub(crate) fn new(city_id: u64, node: RemoteNode, neighborhoods: Vec<Neighborhood>) -> Self {
        Self {
            id: node.id,
            name: node.name,
            city_id,
            neighborhoods,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn city_id(&self) -> u64 {
        self.city_id
    }

    pub fn neighborhoods(&self) -> &[Neighborhood] {
        &self.neighborhoods
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Neighborhood {
    id: u64,
    name: String,
    city_id: u64,
    district_id: u64,
    schools: Vec<School>,
}

impl Neighborhood {
    pub(crate) fn new(
        city_id: u64,
        district_id: u64,
        node: RemoteNode,
        schools: Vec<School>,
    ) -> Self {
        Self {
            id: node.id,
            name: node.name,
            city_id,
            district_id,
            schools,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn city_id(&self) -> u64 {
        self.city_id
    }

    pub fn district_id(&self) -> u64 {
        self.district_id
    }

    pub fn schools(&self) -> &[School] {
        &self.schools
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct School {
    id: u64,
    name: String,
    city_id: u64,
    district_id: u64,
    neighborhood_id: u64,
}

impl School {
    pub(crate) fn new(
        city_id: u64,
        district_id: u64,
        neighborhood_id: u64,
        node: RemoteNode,
    ) -> Self {
        Self {
            id: node.id,
            name: node.name,
            city_id,
            district_id,
            neighborhood_id,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn city_id(&self) -> u64 {
        self.city_id
    }

    pub fn district_id(&self) -> u64 {
        self.district_id
    }

    pub fn neighborhood_id(&self) -> u64 {
        self.neighborhood_id
    }
}

/// Read-only view of one ballot box in a submissions payload.
///
/// Never rejects an object: numbers may arrive as strings or `null`, and
/// fields this view does not name are kept in `extra`. Documents on disk are
/// written from the raw payload, not from this view.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SubmissionResult {
    #[serde(default, deserialize_with = "lenient_u64")]
    pub ballot_box_number: Option<u64>,
    #[serde(default, deserialize_with = "lenient_group")]
    pub cm_result: Option<ResultGroup>,
    #[serde(default, deserialize_with = "lenient_group")]
    pub mv_result: Option<ResultGroup>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub school_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SubmissionResult {
    /// Interpret one payload element. Only non-objects are refused.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(_) => serde_json::from_value(value).ok(),
            _ => None,
        }
    }

    pub fn has_results(&self) -> bool {
        self.cm_result.is_some() || self.mv_result.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResultGroup {
    #[serde(default, deserialize_with = "lenient_string")]
    pub image_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub submission_id: Option<u64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub total_vote: Option<u64>,
    #[serde(default, deserialize_with = "lenient_votes")]
    pub votes: BTreeMap<String, Option<u64>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn lenient_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(as_u64(&Value::deserialize(deserializer)?))
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => Some(text),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    })
}

fn lenient_group<'de, D>(deserializer: D) -> Result<Option<ResultGroup>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        value @ Value::Object(_) => serde_json::from_value(value).ok(),
        _ => None,
    })
}

fn lenient_votes<'de, D>(deserializer: D) -> Result<BTreeMap<String, Option<u64>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Object(votes) => votes
            .into_iter()
            .map(|(candidate, count)| (candidate, as_u64(&count)))
            .collect(),
        _ => BTreeMap::new(),
    })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn node(id: u64, name: &str) -> RemoteNode {
        RemoteNode {
            id,
            name: name.to_string(),
        }
    }

    #[test]
    fn parse_plate_valid() {
        let plate: Plate = " 34 ".parse().unwrap();
        assert_eq!(plate.get(), 34);
    }

    #[test]
    fn parse_plate_invalid() {
        assert_matches!("3a".parse::<Plate>(), Err(CrawlError::InvalidPlate(_)));
        assert_matches!("".parse::<Plate>(), Err(CrawlError::InvalidPlate(_)));
        assert_matches!("-1".parse::<Plate>(), Err(CrawlError::InvalidPlate(_)));
    }

    #[test]
    fn school_ids_follow_document_order() {
        let seed = CitySeed {
            id: 1,
            name: "Istanbul".to_string(),
            plate: Some(Plate::new(34)),
        };
        let schools_a = vec![
            School::new(1, 10, 100, node(1000, "A")),
            School::new(1, 10, 100, node(1001, "B")),
        ];
        let schools_b = vec![School::new(1, 11, 110, node(1100, "C"))];
        let city = City::from_seed(
            &seed,
            vec![
                District::new(1, node(10, "Kadikoy"), vec![Neighborhood::new(
                    1,
                    10,
                    node(100, "Moda"),
                    schools_a,
                )]),
                District::new(1, node(11, "Besiktas"), vec![Neighborhood::new(
                    1,
                    11,
                    node(110, "Levent"),
                    schools_b,
                )]),
            ],
        );

        assert_eq!(city.school_ids(), vec![1000, 1001, 1100]);
        assert_eq!(
            city.counts(),
            CityCounts {
                districts: 2,
                neighborhoods: 2,
                schools: 3,
            }
        );
    }

    #[test]
    fn submission_tolerates_nulls() {
        let raw = serde_json::json!({
            "ballot_box_number": 1203,
            "cm_result": {
                "image_url": "https://cdn.example/1.jpg",
                "submission_id": 77,
                "total_vote": 210,
                "votes": {"A": 120, "B": 90}
            },
            "mv_result": {"votes": null},
            "school_name": "Moda Primary"
        });
        let result: SubmissionResult = serde_json::from_value(raw).unwrap();
        assert_eq!(result.ballot_box_number, Some(1203));
        assert_eq!(result.cm_result.unwrap().votes["A"], Some(120));
        assert!(result.mv_result.unwrap().votes.is_empty());
    }

    #[test]
    fn submission_accepts_odd_numbers_and_keeps_unknown_fields() {
        let raw = serde_json::json!({
            "ballot_box_number": "1203",
            "cm_result": {"votes": {"A": null, "B": "15"}, "turnout": 0.8},
            "mv_result": "pending",
            "city_name": "Istanbul"
        });
        let result = SubmissionResult::from_value(raw).unwrap();
        assert_eq!(result.ballot_box_number, Some(1203));
        let cm = result.cm_result.as_ref().unwrap();
        assert_eq!(cm.votes["A"], None);
        assert_eq!(cm.votes["B"], Some(15));
        assert_eq!(cm.extra["turnout"], serde_json::json!(0.8));
        assert_eq!(result.mv_result, None);
        assert_eq!(result.extra["city_name"], serde_json::json!("Istanbul"));
        assert!(result.has_results());
    }

    #[test]
    fn non_object_is_not_a_ballot_box() {
        assert_eq!(SubmissionResult::from_value(serde_json::json!(7)), None);
    }
}

use std::collections::BTreeMap;
use std::fs;

use camino::Utf8Path;
use serde::Deserialize;
use serde_json::Value;

use crate::domain::{CitySeed, Plate};
use crate::error::CrawlError;

/// On-disk shapes accepted for the city registry.
#[derive(Debug)]
pub enum RegistryFile {
    Keyed(BTreeMap<String, KeyedEntry>),
    Sequential(Vec<CitySeed>),
}

#[derive(Debug, Deserialize)]
pub struct KeyedEntry {
    pub id: u64,
    pub name: String,
}

/// Crawl roots, ordered by plate for keyed files and by position otherwise.
#[derive(Debug, Clone, Default)]
pub struct SeedRegistry {
    seeds: Vec<CitySeed>,
}

impl SeedRegistry {
    pub fn load(path: &Utf8Path) -> Result<Self, CrawlError> {
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|_| CrawlError::RegistryRead(path.as_std_path().to_path_buf()))?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, CrawlError> {
        let parse_error = |err: serde_json::Error| CrawlError::RegistryParse(err.to_string());
        let file = match serde_json::from_str::<Value>(content).map_err(parse_error)? {
            value @ Value::Object(_) => {
                RegistryFile::Keyed(serde_json::from_value(value).map_err(parse_error)?)
            }
            value @ Value::Array(_) => {
                RegistryFile::Sequential(serde_json::from_value(value).map_err(parse_error)?)
            }
            _ => {
                return Err(CrawlError::RegistryParse(
                    "expected an object keyed by plate or an array of cities".to_string(),
                ));
            }
        };
        Self::from_file(file)
    }

    pub fn from_file(file: RegistryFile) -> Result<Self, CrawlError> {
        let seeds = match file {
            RegistryFile::Keyed(entries) => {
                let mut seeds = entries
                    .into_iter()
                    .map(|(key, entry)| {
                        Ok(CitySeed {
                            id: entry.id,
                            name: entry.name,
                            plate: Some(key.parse::<Plate>()?),
                        })
                    })
                    .collect::<Result<Vec<_>, CrawlError>>()?;
                seeds.sort_by_key(|seed| seed.plate);
                seeds
            }
            RegistryFile::Sequential(seeds) => seeds,
        };
        Ok(Self { seeds })
    }

    pub fn seeds(&self) -> &[CitySeed] {
        &self.seeds
    }

    pub fn len(&self) -> usize {
        self.seeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seeds.is_empty()
    }

    pub fn lookup(&self, plate: Plate) -> Result<&CitySeed, CrawlError> {
        self.seeds
            .iter()
            .find(|seed| seed.plate == Some(plate))
            .ok_or_else(|| CrawlError::CityNotFound(plate.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn keyed_registry_is_ordered_by_plate() {
        let registry = SeedRegistry::from_json(
            r#"{"34": {"id": 1, "name": "Istanbul"}, "6": {"id": 2, "name": "Ankara"}}"#,
        )
        .unwrap();
        let plates = registry
            .seeds()
            .iter()
            .map(|seed| seed.plate.unwrap().get())
            .collect::<Vec<_>>();
        assert_eq!(plates, vec![6, 34]);
    }

    #[test]
    fn non_numeric_key_is_rejected() {
        let err = SeedRegistry::from_json(r#"{"IST": {"id": 1, "name": "Istanbul"}}"#).unwrap_err();
        assert_matches!(err, CrawlError::InvalidPlate(_));
    }
}

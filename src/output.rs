use std::fs;
use std::io::{self, Write};

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;

use crate::app::{
    BatchReport, CityReport, HarvestReport, ProgressEvent, ProgressLevel, ProgressSink,
    SchoolReport,
};
use crate::domain::{City, RemoteNode};
use crate::error::CrawlError;
use crate::submission::SchoolSubmissions;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

/// Writes crawl results as pretty-printed JSON documents under one root.
#[derive(Debug, Clone)]
pub struct DocumentWriter {
    root: Utf8PathBuf,
}

impl DocumentWriter {
    pub fn new(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn city_path(&self, city: &City) -> Utf8PathBuf {
        self.root.join(format!("{}.json", file_stem(city.name())))
    }

    pub fn tree_path(&self) -> Utf8PathBuf {
        self.root.join("tree.json")
    }

    pub fn submissions_path(&self, city: &City, school_id: u64) -> Utf8PathBuf {
        let key = city
            .plate()
            .map(|plate| plate.to_string())
            .unwrap_or_else(|| city.id().to_string());
        self.root
            .join("data")
            .join(key)
            .join(format!("school_{school_id}.json"))
    }

    pub fn school_path(&self, school_id: u64) -> Utf8PathBuf {
        self.root.join(format!("school_{school_id}.json"))
    }

    pub fn write_city(&self, city: &City) -> Result<Utf8PathBuf, CrawlError> {
        let path = self.city_path(city);
        Self::write_json(&path, city)?;
        Ok(path)
    }

    pub fn write_tree(&self, cities: &[City]) -> Result<Utf8PathBuf, CrawlError> {
        let path = self.tree_path();
        Self::write_json(&path, cities)?;
        Ok(path)
    }

    pub fn write_submissions(
        &self,
        city: &City,
        submissions: &SchoolSubmissions,
    ) -> Result<Utf8PathBuf, CrawlError> {
        let path = self.submissions_path(city, submissions.school_id);
        Self::write_json(&path, &submissions.payload)?;
        Ok(path)
    }

    pub fn read_city(path: &Utf8Path) -> Result<City, CrawlError> {
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|err| CrawlError::Filesystem(format!("read {path}: {err}")))?;
        serde_json::from_str(&content)
            .map_err(|err| CrawlError::Filesystem(format!("parse {path}: {err}")))
    }

    /// Replace `dest` in one step so readers never see a half-written file.
    pub fn write_json<T: Serialize + ?Sized>(dest: &Utf8Path, value: &T) -> Result<(), CrawlError> {
        let parent = dest
            .parent()
            .map(|parent| {
                if parent.as_str().is_empty() {
                    Utf8Path::new(".")
                } else {
                    parent
                }
            })
            .ok_or_else(|| CrawlError::Filesystem("invalid destination path".to_string()))?;
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| CrawlError::Filesystem(err.to_string()))?;

        let mut bytes =
            serde_json::to_vec_pretty(value).map_err(|err| CrawlError::Filesystem(err.to_string()))?;
        bytes.push(b'\n');

        let mut temp = tempfile::Builder::new()
            .prefix(".sonuc-doc")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| CrawlError::Filesystem(err.to_string()))?;
        temp.write_all(&bytes)
            .map_err(|err| CrawlError::Filesystem(err.to_string()))?;
        temp.persist(dest.as_std_path())
            .map_err(|err| CrawlError::Filesystem(err.to_string()))?;
        Ok(())
    }
}

fn file_stem(name: &str) -> String {
    let stem = name
        .trim()
        .chars()
        .map(|ch| match ch {
            '/' | '\\' | '\0' => '_',
            other => other,
        })
        .collect::<String>();
    if stem.is_empty() || stem == "." || stem == ".." {
        "city".to_string()
    } else {
        stem
    }
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_city(result: &CityReport) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_batch(result: &BatchReport) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_harvest(result: &HarvestReport) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_school(result: &SchoolReport) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_cities(result: &[RemoteNode]) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize + ?Sized>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Human-readable progress lines on stderr.
pub struct ConsoleOutput {
    verbose: bool,
}

impl ConsoleOutput {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    pub fn shows(&self, level: ProgressLevel) -> bool {
        self.verbose || level == ProgressLevel::Info
    }
}

impl ProgressSink for ConsoleOutput {
    fn event(&self, event: ProgressEvent) {
        if !self.shows(event.level) {
            return;
        }
        let mut stderr = io::stderr().lock();
        let _ = match event.elapsed {
            Some(elapsed) => writeln!(
                stderr,
                "{} ({:.1}s)",
                event.message,
                elapsed.as_secs_f64()
            ),
            None => writeln!(stderr, "{}", event.message),
        };
    }
}

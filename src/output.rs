use std::path::PathBuf;

use chrono::{Local, NaiveDateTime};
use serde_json::{Map, Value};
use tokio::fs;

use crate::{browser::SearchQuery, error::Result, record::Record};

/// Capitalizes the first letter of every run of letters and lowercases the rest.
#[must_use]
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_word = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }
    out
}

fn file_component(s: &str) -> String {
    s.trim().replace(['/', '\\'], "-")
}

/// Where per-location result files go.
#[derive(Debug, Clone)]
pub struct OutputDir {
    dir: PathBuf,
}

impl OutputDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `<city>_<state>_<YYYYmmdd_HHMMSS>.csv`
    #[must_use]
    pub fn file_name(query: &SearchQuery, at: NaiveDateTime) -> String {
        format!(
            "{}_{}_{}.csv",
            file_component(&query.city),
            file_component(&query.state),
            at.format("%Y%m%d_%H%M%S")
        )
    }

    /// `State`, `City`, then one column per record field.
    pub fn encode(query: &SearchQuery, records: &[Record]) -> Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        let mut header = vec!["State", "City"];
        header.extend(Record::headers());
        writer.write_record(&header)?;

        let city = title_case(&query.city);
        for record in records {
            let mut row = vec![query.state.clone(), city.clone()];
            row.extend(record.flatten());
            writer.write_record(&row)?;
        }
        writer
            .into_inner()
            .map_err(|e| crate::error::Error::Io(e.into_error()))
    }

    pub async fn write(&self, query: &SearchQuery, records: &[Record]) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir).await?;
        let path = self
            .dir
            .join(Self::file_name(query, Local::now().naive_local()));
        fs::write(&path, Self::encode(query, records)?).await?;
        tracing::info!("Data saved to {}", path.display());
        Ok(path)
    }
}

/// Raw location arrays from every successful search, keyed `<city>_<state>`.
#[derive(Debug)]
pub struct LocationsDump {
    path: PathBuf,
    entries: Map<String, Value>,
}

impl LocationsDump {
    /// Picks up where an earlier run's dump left off.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = if fs::try_exists(&path).await? {
            serde_json::from_slice(&fs::read(&path).await?)?
        } else {
            Map::new()
        };
        Ok(Self { path, entries })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Stores `locations` under the query's key and rewrites the file.
    pub async fn record(&mut self, query: &SearchQuery, locations: &[Value]) -> Result<()> {
        self.entries
            .insert(query.key(), Value::Array(locations.to_vec()));
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&self.path, serde_json::to_vec_pretty(&self.entries)?).await?;
        Ok(())
    }
}

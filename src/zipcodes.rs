//! Turns the raw postal code downloads into one ledger per country.
use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use tokio::fs;

use crate::{
    config::Config,
    error::{Error, Result},
    ledger::{Country, FileStore, Layout, LocationRow},
};

/// A raw postal code file and the columns holding city and state.
#[derive(Debug, Clone)]
pub struct ZipSource {
    path: PathBuf,
    city_column: &'static str,
    state_column: &'static str,
    country: Country,
}

impl ZipSource {
    pub fn us(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            city_column: "City",
            state_column: "State",
            country: Country::UnitedStates,
        }
    }

    pub fn canada(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            city_column: "CITY",
            state_column: "PROVINCE_ABBR",
            country: Country::Canada,
        }
    }

    /// `<stem>_Processed.csv` beside the source.
    #[must_use]
    pub fn processed_path(&self) -> PathBuf {
        let stem = self
            .path
            .file_stem()
            .map_or_else(|| "zipcodes".into(), |s| s.to_string_lossy());
        self.path.with_file_name(format!("{stem}_Processed.csv"))
    }

    async fn read_pairs(&self) -> Result<Vec<(String, String)>> {
        let bytes = fs::read(&self.path).await?;
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(bytes.as_slice());
        let headers = reader.headers()?.clone();
        let column = |name: &str| {
            headers.iter().position(|h| h.trim() == name).ok_or_else(|| {
                Error::Format(format!("{} has no {name} column", self.path.display()))
            })
        };
        let city = column(self.city_column)?;
        let state = column(self.state_column)?;

        let mut pairs = Vec::new();
        for record in reader.records() {
            let record = record?;
            if let (Some(c), Some(s)) = (record.get(city), record.get(state)) {
                pairs.push((c.to_owned(), s.to_owned()));
            }
        }
        Ok(pairs)
    }
}

/// Trims, drops blanks, de-duplicates on the case-insensitive (city, state)
/// pair keeping the first spelling, then stable-sorts by state and city.
pub fn normalize(pairs: impl IntoIterator<Item = (String, String)>, country: Country) -> Vec<LocationRow> {
    let mut seen = HashSet::new();
    let mut rows: Vec<LocationRow> = pairs
        .into_iter()
        .map(|(city, state)| (city.trim().to_owned(), state.trim().to_owned()))
        .filter(|(city, state)| !city.is_empty() && !state.is_empty())
        .filter(|(city, state)| seen.insert((city.to_lowercase(), state.to_lowercase())))
        .map(|(city, state)| LocationRow::new(city, state, country))
        .collect();
    rows.sort_by(|a, b| (&a.state, &a.city).cmp(&(&b.state, &b.city)));
    rows
}

/// A ledger file to work through, with the country to assume for its rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub path: PathBuf,
    pub country: Option<Country>,
}

/// Normalizes a source into its processed ledger unless that already exists.
pub async fn process(source: &ZipSource) -> Result<Option<Job>> {
    let processed = source.processed_path();
    let job = Job {
        path: processed.clone(),
        country: Some(source.country),
    };
    if fs::try_exists(&processed).await? {
        tracing::info!("City/State data loaded from {}", processed.display());
        return Ok(Some(job));
    }
    if !fs::try_exists(&source.path).await? {
        tracing::warn!("{} not found, skipping {}", source.path.display(), source.country);
        return Ok(None);
    }
    let rows = normalize(source.read_pairs().await?, source.country);
    FileStore::open(&processed)
        .await?
        .save(&Layout::default(), &rows)
        .await?;
    tracing::info!(
        "City/State data processed: {} locations saved to {}",
        rows.len(),
        processed.display()
    );
    Ok(Some(job))
}

/// Files ending in `input.csv` anywhere under `root`. Unreadable directories are skipped.
pub async fn find_input_files(root: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut dirs = vec![root.to_owned()];
    while let Some(dir) = dirs.pop() {
        let Ok(mut entries) = fs::read_dir(&dir).await else {
            continue;
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if fs::metadata(&path).await.is_ok_and(|m| m.is_dir()) {
                dirs.push(path);
            } else if path
                .file_name()
                .is_some_and(|n| n.to_string_lossy().ends_with("input.csv"))
            {
                found.push(path);
            }
        }
    }
    found.sort();
    found
}

/// Every ledger this run should work through: the two processed postal code
/// lists, then any hand-made `*input.csv` files.
pub async fn prepare(config: &Config) -> Result<Vec<Job>> {
    let sources = [
        ZipSource::us(config.zipcode_source(&config.us_zip_csv)),
        ZipSource::canada(config.zipcode_source(&config.can_zip_csv)),
    ];
    let mut jobs = Vec::new();
    for source in &sources {
        if let Some(job) = process(source).await? {
            jobs.push(job);
        }
    }
    let inputs = find_input_files(&config.input_dir).await;
    if !inputs.is_empty() {
        tracing::info!("City/State input files found: {inputs:?}");
    }
    jobs.extend(inputs.into_iter().map(|path| Job {
        path,
        country: None,
    }));
    if jobs.is_empty() {
        return Err(Error::Format(format!(
            "no location lists found in {} or {}",
            config.zipcodes_dir.display(),
            config.input_dir.display()
        )));
    }
    Ok(jobs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{Ledger, Status, Store};

    fn tmp_dir(name: &str) -> PathBuf {
        let p = std::env::temp_dir().join(format!("aaha_zip_{name}"));
        let _ = std::fs::remove_dir_all(&p);
        std::fs::create_dir_all(&p).unwrap();
        p
    }

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter()
            .map(|(c, s)| ((*c).to_owned(), (*s).to_owned()))
            .collect()
    }

    #[test]
    fn test_normalize_dedups_and_sorts() {
        let rows = normalize(
            pairs(&[
                ("Springfield", "IL"),
                ("Springfield", "MO"),
                ("springfield", "IL"),
                ("Albany", "NY"),
                ("Albany", "GA"),
                ("  Austin ", "TX"),
                ("", "TX"),
                ("Springfield", "IL"),
            ]),
            Country::UnitedStates,
        );
        let got: Vec<(&str, &str)> = rows
            .iter()
            .map(|r| (r.city.as_str(), r.state.as_str()))
            .collect();
        assert_eq!(
            got,
            vec![
                ("Albany", "GA"),
                ("Springfield", "IL"),
                ("Springfield", "MO"),
                ("Albany", "NY"),
                ("Austin", "TX"),
            ]
        );
        assert!(rows.iter().all(|r| r.status == Status::Pending));
    }

    #[test]
    fn test_normalize_keeps_first_spelling() {
        let first = normalize(pairs(&[("McAllen", "TX"), ("MCALLEN", "TX")]), Country::UnitedStates);
        let reversed =
            normalize(pairs(&[("MCALLEN", "TX"), ("McAllen", "TX")]), Country::UnitedStates);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].city, "McAllen");
        assert_eq!(reversed[0].city, "MCALLEN");
    }

    #[tokio::test]
    async fn test_process_canada() {
        let dir = tmp_dir("canada");
        let source_path = dir.join("CanadianPostalCodes202403.csv");
        std::fs::write(
            &source_path,
            "POSTAL_CODE,CITY,PROVINCE_ABBR,TIME_ZONE\n\
             T2P 1J9,CALGARY,AB,7\n\
             T2P 2B5,CALGARY,AB,7\n\
             R3C 0A5,WINNIPEG,MB,6\n",
        )
        .unwrap();
        let source = ZipSource::canada(&source_path);
        let job = process(&source).await.unwrap().unwrap();
        assert_eq!(job.path, dir.join("CanadianPostalCodes202403_Processed.csv"));
        assert_eq!(job.country, Some(Country::Canada));

        let ledger = Ledger::load(Store::local(&job.path).await.unwrap(), job.country)
            .await
            .unwrap();
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.row(0).unwrap().city, "CALGARY");
        assert_eq!(ledger.row(1).unwrap().country, Country::Canada);

        // a second run reuses the processed file, including its progress
        std::fs::write(&source_path, "garbage").unwrap();
        assert_eq!(process(&source).await.unwrap(), Some(job));
    }

    #[tokio::test]
    async fn test_process_missing_column() {
        let dir = tmp_dir("bad_columns");
        let source_path = dir.join("USZIPCodes.csv");
        std::fs::write(&source_path, "ZIP,Town\n55401,Minneapolis\n").unwrap();
        let err = process(&ZipSource::us(&source_path)).await.unwrap_err();
        assert!(matches!(err, Error::Format(_)));
    }

    #[tokio::test]
    async fn test_process_missing_source() {
        let dir = tmp_dir("missing_source");
        assert_eq!(process(&ZipSource::us(dir.join("nope.csv"))).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_find_input_files() {
        let dir = tmp_dir("inputs");
        std::fs::create_dir_all(dir.join("west")).unwrap();
        std::fs::write(dir.join("east_input.csv"), "City,State\n").unwrap();
        std::fs::write(dir.join("west/ca_input.csv"), "City,State\n").unwrap();
        std::fs::write(dir.join("notes.csv"), "").unwrap();
        let found = find_input_files(&dir).await;
        assert_eq!(
            found,
            vec![dir.join("east_input.csv"), dir.join("west/ca_input.csv")]
        );
        assert!(find_input_files(&dir.join("absent")).await.is_empty());
    }
}

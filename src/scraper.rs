use tracing::instrument;

use crate::{
    browser::{Launcher, SearchQuery, Session},
    config::RetryPolicy,
    error::{Error, Result},
    ledger::{Ledger, Status, Tally},
    output::{LocationsDump, OutputDir},
    pacing::{Pacer, Pause},
    parse::{HospitalDetails, SearchResults, SearchStatus},
};

/// Works through ledgers one location at a time, keeping a single browser
/// session alive between steps.
pub struct Scraper<L: Launcher> {
    launcher: L,
    session: Option<L::Session>,
    pacer: Pacer,
    retries: RetryPolicy,
    radius: u32,
    output: OutputDir,
    dump: Option<LocationsDump>,
}

impl<L: Launcher> Scraper<L> {
    pub fn new(launcher: L, pacer: Pacer, retries: RetryPolicy, radius: u32, output: OutputDir) -> Self {
        Self {
            launcher,
            session: None,
            pacer,
            retries,
            radius,
            output,
            dump: None,
        }
    }

    #[must_use]
    pub fn with_dump(mut self, dump: LocationsDump) -> Self {
        self.dump = Some(dump);
        self
    }

    /// The current session, relaunched if there is none or it stopped answering.
    async fn session(&mut self) -> Result<&mut L::Session> {
        let alive = match self.session.as_mut() {
            Some(session) => session.is_alive().await,
            None => false,
        };
        if !alive {
            self.recycle().await;
            let session = self.launcher.launch().await?;
            return Ok(self.session.insert(session));
        }
        self.session
            .as_mut()
            .ok_or_else(|| Error::exhausted("browser session vanished"))
    }

    async fn recycle(&mut self) {
        if let Some(session) = self.session.take() {
            if let Err(e) = session.close().await {
                tracing::warn!("Error closing browser: {e}");
            }
        }
    }

    /// Searches every pending row, saving the ledger after each one.
    pub async fn run_ledger(&mut self, ledger: &mut Ledger) -> Result<Tally> {
        let pending: Vec<usize> = ledger.pending().collect();
        tracing::info!(
            "{} of {} locations left to search",
            pending.len(),
            ledger.len()
        );
        for (done, index) in pending.into_iter().enumerate() {
            ledger.backup().await?;
            let Some(row) = ledger.row(index) else {
                continue;
            };
            let query = SearchQuery::from_row(row, self.radius);
            let status = match self.scrape_location(&query).await {
                Ok(status) => status,
                Err(e) => {
                    tracing::error!("Error processing {}, {}: {e}", query.city, query.state);
                    Status::Error
                }
            };
            ledger.record_outcome(index, status).await?;
            tracing::info!("{}, {} --> {status}", query.city, query.state);

            if (done + 1) % self.retries.recycle_every == 0 {
                self.recycle().await;
            }
            self.pacer.pause(Pause::LEDGER_FLUSH).await;
        }
        self.recycle().await;
        let tally = ledger.tally();
        tracing::info!("Ledger done: {tally}");
        Ok(tally)
    }

    /// Searches one location and, when it has facilities, visits each of them
    /// and writes the results file.
    #[instrument(skip(self), fields(key = %query.key()))]
    pub async fn scrape_location(&mut self, query: &SearchQuery) -> Result<Status> {
        let Some(mut results) = self.search(query).await? else {
            return Ok(Status::NotFound);
        };
        if results.is_empty() {
            tracing::info!("No facilities listed for {}, {}", query.city, query.state);
            return Ok(Status::NotFound);
        }
        tracing::info!("{} facilities found", results.len());
        if let (Some(dump), Some(raw)) = (self.dump.as_mut(), results.raw_locations()) {
            dump.record(query, raw).await?;
        }

        self.collect_details(query, &mut results).await;
        let records = results.into_records();
        self.output.write(query, &records).await?;
        Ok(Status::Added)
    }

    /// `None` when the locator has nothing within the radius.
    async fn search(&mut self, query: &SearchQuery) -> Result<Option<SearchResults>> {
        let attempts = self.retries.max_search_attempts;
        for attempt in 1..=attempts {
            let session = self.session().await?;
            match session.submit_search(query).await {
                Ok(text) => match SearchStatus::classify(&text) {
                    SearchStatus::NoResults => {
                        tracing::info!(
                            "No results found for {}, {}, {}",
                            query.city,
                            query.state,
                            query.country
                        );
                        return Ok(None);
                    }
                    SearchStatus::Found => match session.results_page().await {
                        Ok(page) => {
                            let results = SearchResults::from_page(&page);
                            self.pacer.pause(Pause::PARSE).await;
                            if results.has_locations() {
                                return Ok(Some(results));
                            }
                            tracing::warn!("Results page had no locations array");
                        }
                        Err(e) => tracing::error!("Error reading results page: {e}"),
                    },
                    status => tracing::info!(
                        "Couldn't search for {}, {} ({status:?}), retrying...",
                        query.city,
                        query.state
                    ),
                },
                Err(e) => tracing::error!(
                    "Failed!! while searching for {}, {}: {e}",
                    query.city,
                    query.state
                ),
            }
            tracing::debug!("search attempt {attempt}/{attempts} failed");
            self.recycle().await;
            self.pacer.pause(Pause::REFRESH).await;
        }
        Err(Error::exhausted(format!(
            "search for {}, {} after {attempts} attempts",
            query.city, query.state
        )))
    }

    /// Starts a fresh browser and re-runs the search so the result list is
    /// on screen again.
    async fn refresh_search(&mut self, query: &SearchQuery) -> Result<()> {
        self.recycle().await;
        self.pacer.pause(Pause::SETTLE).await;
        let attempts = self.retries.max_search_attempts;
        for _ in 0..attempts {
            self.pacer.pause(Pause::REFRESH).await;
            let session = self.session().await?;
            match session.submit_search(query).await {
                Ok(text) if SearchStatus::classify(&text) == SearchStatus::Found => {
                    tracing::debug!("refreshed!");
                    return Ok(());
                }
                Ok(_) => tracing::info!("Refresh for {}, {} came back empty", query.city, query.state),
                Err(e) => tracing::error!("Error refreshing search: {e}"),
            }
            self.recycle().await;
        }
        Err(Error::exhausted(format!(
            "refresh for {}, {} after {attempts} attempts",
            query.city, query.state
        )))
    }

    async fn visit_details(
        &mut self,
        query: &SearchQuery,
        name: &str,
        position: usize,
    ) -> Result<HospitalDetails> {
        let session = self.session().await?;
        let page = session.open_details(name, position).await?;
        let details = HospitalDetails::from_page(&page)?;
        if let Err(e) = session.back_to_results().await {
            tracing::warn!("Could not go back to the result list: {e}");
            if let Err(e) = self.refresh_search(query).await {
                tracing::error!("{e}");
            }
        }
        Ok(details)
    }

    /// Fills detail fields into `results`. A hospital whose page never loads
    /// keeps only what the result list gave.
    async fn collect_details(&mut self, query: &SearchQuery, results: &mut SearchResults) {
        let names = results.names().to_vec();
        for (i, name) in names.iter().enumerate() {
            if results.record_for(i).is_none() {
                tracing::warn!("{name} is listed but not in the locations array");
                continue;
            }
            let refresh_every = self.retries.refresh_every;
            if refresh_every > 0 && (i + 1) % refresh_every == 0 {
                if let Err(e) = self.refresh_search(query).await {
                    tracing::error!("{e}");
                }
            }

            tracing::info!("Extracting details for --> {name}...");
            let position = results.link_position(i);
            let mut details = None;
            for _ in 0..=self.retries.detail_retries {
                match self.visit_details(query, name, position).await {
                    Ok(found) => {
                        details = Some(found);
                        break;
                    }
                    Err(e) => {
                        tracing::error!("Error visiting hospital details page: {e}");
                        tracing::info!("re-trying to fetch {name} details...");
                        if let Err(e) = self.refresh_search(query).await {
                            tracing::error!("{e}");
                        }
                    }
                }
            }
            match (details, results.record_for(i)) {
                (Some(details), Some(record)) => details.apply_to(record),
                _ => tracing::warn!("Keeping result list fields only for {name}"),
            }
            self.pacer.pause(Pause::BETWEEN_DETAILS).await;
        }
    }
}

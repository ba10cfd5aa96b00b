use std::time::{Duration, Instant};

use reqwest::Client;
use serde::Deserialize;
use thirtyfour::{prelude::ElementQueryable, By, DesiredCapabilities, WebDriver};
use tracing::{instrument, Level};
use url::Url;

use crate::{
    error::{Error, Result},
    ledger::{Country, LocationRow},
    pacing::{Pacer, Pause},
    parse::result_link_xpath,
};

const SEARCH_CONTAINER_TIMEOUT: Duration = Duration::from_secs(15);
const FIELD_TIMEOUT: Duration = Duration::from_secs(10);
const LOCATOR_TIMEOUT: Duration = Duration::from_secs(20);
const RESULTS_LIST_TIMEOUT: Duration = Duration::from_secs(20);
const LINK_TIMEOUT: Duration = Duration::from_secs(10);
const DETAIL_TIMEOUT: Duration = Duration::from_secs(10);
const POLL_INTERVAL: Duration = Duration::from_millis(500);

const LAUNCH_ATTEMPTS: u32 = 3;

const CHROME_FLAGS: [&str; 15] = [
    "--no-sandbox",
    "--disable-gpu",
    "--start-maximized",
    "--disable-infobars",
    "--enable-javascript",
    "--disable-extensions",
    "--window-size=800,450",
    "--disable-notifications",
    "--disable-dev-shm-usage",
    "--disable-popup-blocking",
    "--disable-ipc-flooding-protection",
    "--js-flags=--max-old-space-size=1024",
    "--disable-background-timer-throttling",
    "--disable-blink-features=AutomationControlled",
    "--lang=en-US",
];

const USER_AGENTS: [&str; 5] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/134.0.6998.88 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/134.0.6998.88 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/134.0.6998.88 Safari/537.36",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/134.0.6998.88 Mobile Safari/537.36",
    "Mozilla/5.0 (iPad; CPU OS 16_5 like Mac OS X) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/134.0.6998.88 Mobile Safari/537.36",
];

/// User agent for the n-th browser launched by this process.
#[must_use]
pub fn user_agent(launch: usize) -> &'static str {
    USER_AGENTS[launch % USER_AGENTS.len()]
}

/// Id of the locator form's country radio button.
#[must_use]
pub const fn country_radio_id(country: Country) -> &'static str {
    match country {
        Country::UnitedStates => "__BVID__87",
        Country::Canada => "__BVID__88",
    }
}

pub fn make_client() -> Result<Client> {
    Ok(Client::builder()
        .gzip(true)
        .timeout(Duration::from_secs(10))
        .build()?)
}

#[derive(Deserialize)]
struct DriverStatus {
    value: DriverStatusValue,
}

#[derive(Deserialize)]
struct DriverStatusValue {
    ready: bool,
}

fn status_url(webdriver_url: &Url) -> Result<Url> {
    webdriver_url
        .join("status")
        .map_err(|e| Error::config_error(format!("bad WebDriver url {webdriver_url}: {e}")))
}

/// Asks the WebDriver server whether it can take a new session.
#[instrument(skip(client), level = Level::DEBUG)]
pub async fn driver_ready(client: &Client, webdriver_url: &Url) -> Result<bool> {
    let status: DriverStatus = client
        .get(status_url(webdriver_url)?)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    Ok(status.value.ready)
}

/// One location search as typed into the locator form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub city: String,
    pub state: String,
    pub country: Country,
    pub radius: u32,
}

impl SearchQuery {
    #[must_use]
    pub fn from_row(row: &LocationRow, radius: u32) -> Self {
        Self {
            city: row.city.clone(),
            state: row.state.clone(),
            country: row.country,
            radius,
        }
    }

    /// `<city>_<state>`, used to key output.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}_{}", self.city, self.state)
    }
}

/// A live browser pointed at the hospital locator.
#[allow(async_fn_in_trait)]
pub trait Session {
    /// Fills in and submits the search form, returning the text of the
    /// locator widget once it renders.
    async fn submit_search(&mut self, query: &SearchQuery) -> Result<String>;

    /// Source of the current result list page.
    async fn results_page(&mut self) -> Result<String>;

    /// Clicks through to a hospital from the result list and returns the
    /// detail page source.
    /// Clicks the `position`-th result link carrying `hospital_name`.
    async fn open_details(&mut self, hospital_name: &str, position: usize) -> Result<String>;

    async fn back_to_results(&mut self) -> Result<()>;

    async fn is_alive(&mut self) -> bool;

    async fn close(self) -> Result<()>;
}

#[allow(async_fn_in_trait)]
pub trait Launcher {
    type Session: Session;

    async fn launch(&mut self) -> Result<Self::Session>;
}

/// Starts Chrome sessions through a running chromedriver.
#[derive(Debug)]
pub struct WebDriverLauncher {
    client: Client,
    webdriver_url: Url,
    search_url: Url,
    headless: bool,
    pacer: Pacer,
    launches: usize,
}

impl WebDriverLauncher {
    pub fn new(webdriver_url: Url, search_url: Url, headless: bool, pacer: Pacer) -> Result<Self> {
        Ok(Self {
            client: make_client()?,
            webdriver_url,
            search_url,
            headless,
            pacer,
            launches: 0,
        })
    }

    async fn try_launch(&mut self) -> Result<WebDriverSession> {
        if !driver_ready(&self.client, &self.webdriver_url).await? {
            return Err(Error::exhausted(format!(
                "WebDriver at {} is not ready for a session",
                self.webdriver_url
            )));
        }
        let agent = user_agent(self.launches);
        self.launches += 1;

        let mut caps = DesiredCapabilities::chrome();
        for flag in CHROME_FLAGS {
            caps.add_chrome_arg(flag)?;
        }
        caps.add_chrome_arg(&format!("--user-agent={agent}"))?;
        if self.headless {
            caps.set_headless()?;
        }
        let driver = WebDriver::new(self.webdriver_url.as_str(), caps).await?;
        driver.maximize_window().await?;
        driver.execute("window.focus();", Vec::new()).await?;
        tracing::debug!("Browser launched with user agent {agent}");
        Ok(WebDriverSession {
            driver,
            search_url: self.search_url.clone(),
            pacer: self.pacer.clone(),
        })
    }
}

impl Launcher for WebDriverLauncher {
    type Session = WebDriverSession;

    async fn launch(&mut self) -> Result<WebDriverSession> {
        for attempt in 1..=LAUNCH_ATTEMPTS {
            match self.try_launch().await {
                Ok(session) => return Ok(session),
                Err(e) => {
                    tracing::error!("Error launching browser ({attempt}/{LAUNCH_ATTEMPTS}): {e}");
                    self.pacer.pause(Pause::LAUNCH_RETRY).await;
                }
            }
        }
        Err(Error::exhausted(format!(
            "no browser session after {LAUNCH_ATTEMPTS} attempts"
        )))
    }
}

pub struct WebDriverSession {
    driver: WebDriver,
    search_url: Url,
    pacer: Pacer,
}

impl Session for WebDriverSession {
    #[instrument(skip(self, query), fields(city = %query.city, state = %query.state), level = Level::DEBUG)]
    async fn submit_search(&mut self, query: &SearchQuery) -> Result<String> {
        tracing::info!(
            "Searching for: {}, {}, {}...",
            query.city,
            query.state,
            query.country
        );
        self.pacer.before_navigation().await;
        self.driver.goto(self.search_url.as_str()).await?;
        self.pacer.pause(Pause::PAGE_LOAD).await;

        let container = self
            .driver
            .query(By::Id("hospitalLocatorSearchCriteria"))
            .wait(SEARCH_CONTAINER_TIMEOUT, POLL_INTERVAL)
            .first()
            .await?;
        container.scroll_into_view().await?;

        let radius = query.radius.to_string();
        for (field, value, pause) in [
            ("radius", radius.as_str(), Pause::FIELD),
            ("city", query.city.as_str(), Pause::FIELD_SHORT),
            ("stateProvince", query.state.as_str(), Pause::FIELD),
        ] {
            self.pacer.pause(pause).await;
            let input = self
                .driver
                .query(By::Name(field))
                .wait(FIELD_TIMEOUT, POLL_INTERVAL)
                .first()
                .await?;
            input.clear().await?;
            input.send_keys(value).await?;
        }

        self.pacer.pause(Pause::RADIO).await;
        self.driver
            .query(By::Id(country_radio_id(query.country)))
            .wait(FIELD_TIMEOUT, POLL_INTERVAL)
            .first()
            .await?
            .click()
            .await?;

        self.pacer.pause(Pause::BEFORE_SUBMIT).await;
        self.pacer.before_navigation().await;
        self.driver
            .query(By::Id("locator-search"))
            .wait(FIELD_TIMEOUT, POLL_INTERVAL)
            .first()
            .await?
            .click()
            .await?;

        self.pacer.pause(Pause::AFTER_SUBMIT).await;
        let locator = self
            .driver
            .query(By::ClassName("hospital-locator"))
            .wait(LOCATOR_TIMEOUT, POLL_INTERVAL)
            .first()
            .await?;
        Ok(locator.text().await?.trim().to_owned())
    }

    #[instrument(skip(self), level = Level::DEBUG)]
    async fn results_page(&mut self) -> Result<String> {
        self.driver
            .query(By::Id("hospitalLocatorResultsList"))
            .wait(RESULTS_LIST_TIMEOUT, POLL_INTERVAL)
            .first()
            .await?;
        self.pacer.pause(Pause::RESULTS).await;
        let start = Instant::now();
        let source = self.driver.source().await?;
        log::trace!("Got result list source in \t {:?}", start.elapsed());
        Ok(source)
    }

    #[instrument(skip(self), level = Level::DEBUG)]
    async fn open_details(&mut self, hospital_name: &str, position: usize) -> Result<String> {
        self.pacer.pause(Pause::SETTLE).await;
        self.driver
            .query(By::Id("hospitalLocatorResultsList"))
            .wait(LINK_TIMEOUT, POLL_INTERVAL)
            .first()
            .await?;

        self.pacer.pause(Pause::BEFORE_CLICK).await;
        let xpath = result_link_xpath(hospital_name, position);
        let link = self
            .driver
            .query(By::XPath(xpath.as_str()))
            .wait(LINK_TIMEOUT, POLL_INTERVAL)
            .first()
            .await?;
        link.scroll_into_view().await?;

        self.pacer.pause(Pause::BEFORE_CLICK).await;
        self.pacer.before_navigation().await;
        self.driver
            .execute("arguments[0].click();", vec![link.to_json()?])
            .await?;

        self.pacer.pause(Pause::DETAIL_LOAD).await;
        self.driver
            .query(By::Id("hospitalLocatorDetailsAboveMap"))
            .wait(DETAIL_TIMEOUT, POLL_INTERVAL)
            .first()
            .await?;
        let start = Instant::now();
        let source = self.driver.source().await?;
        log::trace!("Got detail page source in \t {:?}", start.elapsed());
        Ok(source)
    }

    #[instrument(skip(self), level = Level::DEBUG)]
    async fn back_to_results(&mut self) -> Result<()> {
        self.driver.back().await?;
        self.driver
            .query(By::Id("hospitalLocatorResults"))
            .wait(DETAIL_TIMEOUT, POLL_INTERVAL)
            .first()
            .await?;
        self.pacer.pause(Pause::SETTLE).await;
        Ok(())
    }

    async fn is_alive(&mut self) -> bool {
        self.driver.current_url().await.is_ok()
    }

    async fn close(self) -> Result<()> {
        self.driver.quit().await?;
        Ok(())
    }
}

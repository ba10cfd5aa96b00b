mod local;

use std::{
    fmt::{self, Display, Formatter},
    path::Path,
};

use crate::error::{Error, Result};

pub use local::FileStore;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Country {
    UnitedStates,
    Canada,
}

/// Province and territory codes as they appear in the Canadian postal code file.
const CANADIAN_PROVINCES: [&str; 13] = [
    "AB", "BC", "MB", "NB", "NL", "NS", "NT", "NU", "ON", "PE", "QC", "SK", "YT",
];

impl Country {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::UnitedStates => "United States",
            Self::Canada => "Canada",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "united states" | "us" | "usa" => Some(Self::UnitedStates),
            "canada" | "ca" | "can" => Some(Self::Canada),
            _ => None,
        }
    }

    /// Guesses the country from a two-letter state or province code.
    #[must_use]
    pub fn infer(state: &str) -> Self {
        let state = state.trim().to_ascii_uppercase();
        if CANADIAN_PROVINCES.contains(&state.as_str()) {
            Self::Canada
        } else {
            Self::UnitedStates
        }
    }
}

impl Display for Country {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-row scrape progress, stored in the `Data` column.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Status {
    #[default]
    Pending,
    Added,
    NotFound,
    Error,
}

impl Status {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "",
            Self::Added => "added",
            Self::NotFound => "not found",
            Self::Error => "error",
        }
    }

    /// Rows with a definitive answer are never searched again.
    #[must_use]
    pub const fn is_done(self) -> bool {
        matches!(self, Self::Added | Self::NotFound)
    }
}

impl From<&str> for Status {
    fn from(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "added" => Self::Added,
            "not found" => Self::NotFound,
            "error" => Self::Error,
            _ => Self::Pending,
        }
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocationRow {
    pub city: String,
    pub state: String,
    pub country: Country,
    pub status: Status,
    /// Values of the file's other columns, in [`Layout`] order.
    pub extra: Vec<String>,
}

impl LocationRow {
    pub fn new(city: impl Into<String>, state: impl Into<String>, country: Country) -> Self {
        Self {
            city: city.into(),
            state: state.into(),
            country,
            status: Status::Pending,
            extra: Vec::new(),
        }
    }
}

const CITY: &str = "City";
const STATE: &str = "State";
const COUNTRY: &str = "Country";
const DATA: &str = "Data";

/// Column order of a ledger file. `Country` and `Data` are appended when the
/// file lacks them; any column the scraper does not own is written back as read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Layout(Vec<String>);

impl Default for Layout {
    fn default() -> Self {
        Self([CITY, STATE, COUNTRY, DATA].map(str::to_owned).to_vec())
    }
}

impl Layout {
    fn from_header(header: &csv::StringRecord) -> Self {
        let mut columns: Vec<String> = header.iter().map(str::to_owned).collect();
        for owned in [COUNTRY, DATA] {
            if !columns.iter().any(|c| c.trim() == owned) {
                columns.push(owned.to_owned());
            }
        }
        Self(columns)
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.0
    }
}

fn is_owned_column(name: &str) -> bool {
    [CITY, STATE, COUNTRY, DATA].contains(&name.trim())
}

/// Reads ledger rows. Without a `Country` column the country is `default`,
/// or inferred from the state code when there is no default.
pub(crate) fn decode_rows(
    bytes: &[u8],
    default: Option<Country>,
) -> Result<(Layout, Vec<LocationRow>)> {
    let mut reader = csv::Reader::from_reader(bytes);
    let header = reader.headers()?.clone();
    let position = |name: &str| header.iter().position(|h| h.trim() == name);
    let missing = |name: &str| Error::Format(format!("ledger has no {name} column"));
    let city = position(CITY).ok_or_else(|| missing(CITY))?;
    let state = position(STATE).ok_or_else(|| missing(STATE))?;
    let country = position(COUNTRY);
    let data = position(DATA);
    let extra: Vec<usize> = header
        .iter()
        .enumerate()
        .filter(|(_, h)| !is_owned_column(h))
        .map(|(i, _)| i)
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let field = |i: usize| record.get(i).unwrap_or_default();
        let state = field(state).to_owned();
        let country = country
            .map(field)
            .and_then(Country::from_name)
            .or(default)
            .unwrap_or_else(|| Country::infer(&state));
        rows.push(LocationRow {
            city: field(city).to_owned(),
            status: data.map(field).map(Status::from).unwrap_or_default(),
            extra: extra.iter().map(|&i| field(i).to_owned()).collect(),
            state,
            country,
        });
    }
    Ok((Layout::from_header(&header), rows))
}

pub(crate) fn encode_rows(layout: &Layout, rows: &[LocationRow]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(layout.columns())?;
    for row in rows {
        let mut extra = row.extra.iter();
        let fields: Vec<&str> = layout
            .columns()
            .iter()
            .map(|column| match column.trim() {
                CITY => row.city.as_str(),
                STATE => row.state.as_str(),
                COUNTRY => row.country.name(),
                DATA => row.status.as_str(),
                _ => extra.next().map_or("", String::as_str),
            })
            .collect();
        writer.write_record(&fields)?;
    }
    writer.into_inner().map_err(|e| Error::Io(e.into_error()))
}

#[derive(Debug)]
#[non_exhaustive]
pub enum Store {
    Local(FileStore),
    /// Keeps progress in memory only.
    AdHoc,
}

impl Store {
    #[inline]
    pub async fn local(p: impl AsRef<Path>) -> Result<Self> {
        FileStore::open(p).await.map(Self::Local)
    }

    async fn load(&self, default: Option<Country>) -> Result<Option<(Layout, Vec<LocationRow>)>> {
        match self {
            Self::Local(f) => f.load(default).await,
            Self::AdHoc => Ok(None),
        }
    }

    async fn save(&self, layout: &Layout, rows: &[LocationRow]) -> Result<()> {
        match self {
            Self::Local(f) => f.save(layout, rows).await,
            Self::AdHoc => Ok(()),
        }
    }

    async fn backup(&self, layout: &Layout, rows: &[LocationRow]) -> Result<()> {
        match self {
            Self::Local(f) => f.backup(layout, rows).await,
            Self::AdHoc => Ok(()),
        }
    }
}

/// Counts of rows per status.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Tally {
    pub pending: usize,
    pub added: usize,
    pub not_found: usize,
    pub error: usize,
}

impl Display for Tally {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} added, {} not found, {} error, {} pending",
            self.added, self.not_found, self.error, self.pending
        )
    }
}

/// The list of locations to search and how far the scrape got with each.
#[derive(Debug)]
pub struct Ledger {
    layout: Layout,
    rows: Vec<LocationRow>,
    store: Store,
}

impl Ledger {
    pub async fn load(store: Store, default: Option<Country>) -> Result<Self> {
        let (layout, rows) = store.load(default).await?.unwrap_or_default();
        Ok(Self {
            layout,
            rows,
            store,
        })
    }

    #[must_use]
    pub fn from_rows(rows: Vec<LocationRow>, store: Store) -> Self {
        Self {
            layout: Layout::default(),
            rows,
            store,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn row(&self, index: usize) -> Option<&LocationRow> {
        self.rows.get(index)
    }

    /// False for rows already added or known to have no results, and for
    /// indices past the end.
    #[must_use]
    pub fn is_pending(&self, index: usize) -> bool {
        self.rows.get(index).is_some_and(|row| !row.status.is_done())
    }

    pub fn pending(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.rows.len()).filter(|&i| self.is_pending(i))
    }

    /// Sets the row's status and writes the whole ledger out.
    pub async fn record_outcome(&mut self, index: usize, status: Status) -> Result<()> {
        let row = self
            .rows
            .get_mut(index)
            .ok_or_else(|| Error::Format(format!("no ledger row {index}")))?;
        row.status = status;
        self.store.save(&self.layout, &self.rows).await
    }

    pub async fn backup(&self) -> Result<()> {
        self.store.backup(&self.layout, &self.rows).await
    }

    #[must_use]
    pub fn tally(&self) -> Tally {
        self.rows.iter().fold(Tally::default(), |mut t, row| {
            match row.status {
                Status::Pending => t.pending += 1,
                Status::Added => t.added += 1,
                Status::NotFound => t.not_found += 1,
                Status::Error => t.error += 1,
            }
            t
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_rows() -> Vec<LocationRow> {
        let mut rows = vec![
            LocationRow::new("Minneapolis", "MN", Country::UnitedStates),
            LocationRow::new("Saint Paul", "MN", Country::UnitedStates),
            LocationRow::new("Toronto", "ON", Country::Canada),
            LocationRow::new("Duluth", "MN", Country::UnitedStates),
        ];
        rows[0].status = Status::Added;
        rows[1].status = Status::NotFound;
        rows[2].status = Status::Error;
        rows
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(Status::from(" added "), Status::Added);
        assert_eq!(Status::from("Not Found"), Status::NotFound);
        assert_eq!(Status::from("error"), Status::Error);
        assert_eq!(Status::from(""), Status::Pending);
        assert_eq!(Status::from("in progress"), Status::Pending);
    }

    #[test]
    fn test_is_pending_skips_finished_rows() {
        let ledger = Ledger::from_rows(sample_rows(), Store::AdHoc);
        assert!(!ledger.is_pending(0));
        assert!(!ledger.is_pending(1));
        assert!(ledger.is_pending(2));
        assert!(ledger.is_pending(3));
        assert!(!ledger.is_pending(99));
        assert_eq!(ledger.pending().collect::<Vec<_>>(), vec![2, 3]);
    }

    #[tokio::test]
    async fn test_record_outcome() {
        let mut ledger = Ledger::from_rows(sample_rows(), Store::AdHoc);
        ledger.record_outcome(3, Status::Added).await.unwrap();
        assert!(!ledger.is_pending(3));
        assert!(ledger.record_outcome(4, Status::Added).await.is_err());
        assert_eq!(
            ledger.tally(),
            Tally {
                pending: 0,
                added: 2,
                not_found: 1,
                error: 1
            }
        );
    }

    #[test]
    fn test_country() {
        assert_eq!(Country::infer("on"), Country::Canada);
        assert_eq!(Country::infer("MN"), Country::UnitedStates);
        assert_eq!(Country::from_name("United States"), Some(Country::UnitedStates));
        assert_eq!(Country::from_name("CANADA"), Some(Country::Canada));
        assert_eq!(Country::from_name("Mexico"), None);
    }

    #[test]
    fn test_csv_roundtrip_keeps_status() {
        let rows = sample_rows();
        let bytes = encode_rows(&Layout::default(), &rows).unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert_eq!(text.lines().next(), Some("City,State,Country,Data"));
        assert!(text
            .lines()
            .any(|line| line == "Saint Paul,MN,United States,not found"));
        assert_eq!(
            decode_rows(&bytes, None).unwrap(),
            (Layout::default(), rows)
        );
    }

    #[test]
    fn test_decode_without_optional_columns() {
        let input = "City,State,Population\nWinnipeg,MB,700000\nFargo,ND,120000\n";
        let (layout, rows) = decode_rows(input.as_bytes(), None).unwrap();
        assert_eq!(rows[0].country, Country::Canada);
        assert_eq!(rows[1].country, Country::UnitedStates);
        assert!(rows.iter().all(|r| r.status == Status::Pending));
        assert_eq!(rows[0].extra, ["700000"]);
        assert_eq!(
            layout.columns(),
            ["City", "State", "Population", "Country", "Data"]
        );

        let (_, rows) = decode_rows(input.as_bytes(), Some(Country::Canada)).unwrap();
        assert!(rows.iter().all(|r| r.country == Country::Canada));
    }

    #[test]
    fn test_other_columns_are_written_back_in_place() {
        let input = "Notes,City,State,Data,Population\ncapital,Austin,TX,,960000\n";
        let (layout, mut rows) = decode_rows(input.as_bytes(), None).unwrap();
        rows[0].status = Status::Added;
        let text = String::from_utf8(encode_rows(&layout, &rows).unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            [
                "Notes,City,State,Data,Population,Country",
                "capital,Austin,TX,added,960000,United States",
            ]
        );
    }

    #[test]
    fn test_decode_requires_city_and_state() {
        assert!(matches!(
            decode_rows(b"Town,Data\nX,\n", None),
            Err(Error::Format(_))
        ));
    }

    #[test]
    fn test_encode_empty_has_header() {
        let bytes = encode_rows(&Layout::default(), &[]).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text.trim_end(), "City,State,Country,Data");
    }
}

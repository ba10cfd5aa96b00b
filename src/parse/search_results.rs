use scraper::Html;
use serde_json::Value;

use super::text_from_selection::element_text;
use crate::record::{Column, Record, NOT_AVAILABLE};
use crate::{static_regex, static_selector};

/// Entry the locator adds for the searcher's own position.
const OWN_LOCATION: &str = "Your Location";

/// Pulls the `var locations = [...]` array out of an inline script.
///
/// A page without the array, or with one that is not valid JSON, gives `None`.
pub fn extract_locations(page: &str) -> Option<Vec<Value>> {
    static_regex!(LOCATIONS_RE <- r"var locations\s*=\s*(\[[\s\S]*?\]);");
    let Some(captures) = LOCATIONS_RE.captures(page) else {
        tracing::error!("No location data found in page source.");
        return None;
    };
    match serde_json::from_str::<Vec<Value>>(&captures[1]) {
        Ok(locations) => {
            tracing::debug!("JS match found --> {} entries", locations.len());
            Some(locations)
        }
        Err(e) => {
            tracing::error!("Location data is not valid JSON: {e}");
            None
        }
    }
}

fn value_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => NOT_AVAILABLE.to_owned(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn location_record(location: &Value) -> Record {
    let mut record = Record::new();
    record.set(Column::Name, value_text(location.get("name")).trim());
    for (key, column) in [
        ("address", Column::Address),
        ("phone", Column::Phone),
        ("lat", Column::Latitude),
        ("lng", Column::Longitude),
        ("distance", Column::Distance),
        ("icon", Column::Practice),
    ] {
        record.set(column, value_text(location.get(key)));
    }
    record
}

/// Everything the result list page tells us before any detail page is opened.
#[derive(Debug, Default)]
pub struct SearchResults {
    records: Vec<Record>,
    names: Vec<String>,
    raw: Option<Vec<Value>>,
}

impl SearchResults {
    #[must_use]
    pub fn from_page(page: &str) -> Self {
        let Some(raw) = extract_locations(page) else {
            return Self::default();
        };
        let records = raw
            .iter()
            .filter(|loc| {
                !loc.get("name")
                    .and_then(Value::as_str)
                    .is_some_and(|name| name.contains(OWN_LOCATION))
            })
            .map(location_record)
            .collect();

        static_selector!(RESULT_NAME_SELECTOR <- "#hospitalLocatorResultsList .recno-lookup");
        let document = Html::parse_document(page);
        let names = document
            .select(&RESULT_NAME_SELECTOR)
            .map(element_text)
            .filter(|name| !name.is_empty())
            .collect();

        Self {
            records,
            names,
            raw: Some(raw),
        }
    }

    /// Whether the locations array was present and parsed at all.
    #[must_use]
    pub const fn has_locations(&self) -> bool {
        self.raw.is_some()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Result names as listed on the page, in click order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn raw_locations(&self) -> Option<&[Value]> {
        self.raw.as_deref()
    }

    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// The record behind the `i`-th listed name. Chain clinics can share a
    /// name, so repeats pair up with same-named records in list order.
    pub fn record_for(&mut self, i: usize) -> Option<&mut Record> {
        let name = self.names.get(i)?.trim();
        let nth = self.names[..i].iter().filter(|n| n.trim() == name).count();
        self.records
            .iter_mut()
            .filter(|r| r.name().trim() == name)
            .nth(nth)
    }

    /// Which of the page's links to click for the `i`-th listed name. Links
    /// are looked up by substring, so earlier names containing it count too.
    #[must_use]
    pub fn link_position(&self, i: usize) -> usize {
        let Some(name) = self.names.get(i) else {
            return 0;
        };
        let name = name.trim();
        self.names[..i].iter().filter(|n| n.contains(name)).count()
    }

    /// Consumes the results, standardizing every record.
    #[must_use]
    pub fn into_records(self) -> Vec<Record> {
        self.records.into_iter().map(Record::standardized).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FieldValue;
    use std::fs;

    fn results_page() -> String {
        fs::read_to_string("./src/parse/html_examples/search_results/results.html").unwrap()
    }

    const CHAIN_PAGE: &str = r#"<div id="hospitalLocatorResultsList">
        <a class="recno-lookup"><strong>Banfield Pet Hospital North</strong></a>
        <a class="recno-lookup"><strong>Banfield Pet Hospital</strong></a>
        <a class="recno-lookup"><strong>Banfield Pet Hospital</strong></a>
        </div>
        <script>var locations = [
            {"name": "Banfield Pet Hospital North", "address": "5 North Rd"},
            {"name": "Banfield Pet Hospital", "address": "1 Main St"},
            {"name": "Banfield Pet Hospital", "address": "9 Elm St"}
        ];</script>"#;

    #[test]
    fn test_repeated_names_pair_up_in_order() {
        let mut results = SearchResults::from_page(CHAIN_PAGE);
        let address = |r: &mut SearchResults, i| {
            r.record_for(i).unwrap().get(Column::Address).cloned()
        };
        assert_eq!(address(&mut results, 1), Some(FieldValue::text("1 Main St")));
        assert_eq!(address(&mut results, 2), Some(FieldValue::text("9 Elm St")));
        assert_eq!(address(&mut results, 0), Some(FieldValue::text("5 North Rd")));
        assert!(results.record_for(3).is_none());

        // the "North" link also contains the shorter name
        assert_eq!(results.link_position(0), 0);
        assert_eq!(results.link_position(1), 1);
        assert_eq!(results.link_position(2), 2);
    }

    #[test]
    fn test_extract_locations() {
        let locations = extract_locations(&results_page()).expect("array should be present");
        assert_eq!(locations.len(), 3);
        assert_eq!(locations[0]["name"], "Your Location");
    }

    #[test]
    fn test_from_page() {
        let results = SearchResults::from_page(&results_page());
        assert!(results.has_locations());
        assert_eq!(results.len(), 2);
        assert_eq!(
            results.names(),
            ["Lakeside Animal Hospital", "Oak Ridge Veterinary Clinic"]
        );
        let first = &results.records()[0];
        assert_eq!(first.name(), "Lakeside Animal Hospital");
        assert_eq!(
            first.get(Column::Latitude),
            Some(&FieldValue::text("44.9778"))
        );
        assert_eq!(first.get(Column::Distance), Some(&FieldValue::text("1.2")));
        assert_eq!(
            first.get(Column::Practice),
            Some(&FieldValue::text("small-animal"))
        );
        // no phone key in the second entry
        let second = &results.records()[1];
        assert_eq!(second.get(Column::Phone), Some(&FieldValue::text("N/A")));
    }

    #[test]
    fn test_malformed_page_is_empty() {
        let page =
            fs::read_to_string("./src/parse/html_examples/search_results/no_locations.html")
                .unwrap();
        let results = SearchResults::from_page(&page);
        assert!(results.is_empty());
        assert!(!results.has_locations());
        assert!(results.names().is_empty());
        assert!(results.into_records().is_empty());
    }

    #[test]
    fn test_invalid_json_is_empty() {
        let page = "<script>var locations = [{name: 'unquoted'}];</script>";
        assert!(extract_locations(page).is_none());
        assert!(SearchResults::from_page(page).is_empty());
    }

    #[test]
    fn test_record_for_matches_trimmed_name() {
        let mut results = SearchResults::from_page(&results_page());
        let record = results.record_for(1).expect("record should match");
        record.set(Column::Email, "front@oakridge.example");
        assert!(results.record_for(2).is_none());
        let records = results.into_records();
        assert_eq!(
            records[1].get(Column::Email),
            Some(&FieldValue::text("front@oakridge.example"))
        );
        assert_eq!(records[1].len(), 14);
    }
}

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

use serde::ser::{Serialize, SerializeMap, Serializer};

/// The fixed output columns, in file order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Column {
    Name,
    Address,
    Phone,
    Latitude,
    Longitude,
    Distance,
    Practice,
    Website,
    Email,
    SocialMedia,
    Veterinarians,
    SpeciesTreated,
    HospitalHours,
    Mission,
}

impl Column {
    pub const ALL: [Self; 14] = [
        Self::Name,
        Self::Address,
        Self::Phone,
        Self::Latitude,
        Self::Longitude,
        Self::Distance,
        Self::Practice,
        Self::Website,
        Self::Email,
        Self::SocialMedia,
        Self::Veterinarians,
        Self::SpeciesTreated,
        Self::HospitalHours,
        Self::Mission,
    ];

    #[must_use]
    pub const fn header(self) -> &'static str {
        match self {
            Self::Name => "Name",
            Self::Address => "Address",
            Self::Phone => "Phone",
            Self::Latitude => "Latitude",
            Self::Longitude => "Longitude",
            Self::Distance => "Distance",
            Self::Practice => "Practice",
            Self::Website => "Website",
            Self::Email => "Email",
            Self::SocialMedia => "Social Media",
            Self::Veterinarians => "Veterinarians",
            Self::SpeciesTreated => "Species Treated",
            Self::HospitalHours => "Hospital Hours",
            Self::Mission => "Mission",
        }
    }

    /// Maps a detail-page card title to its column.
    #[must_use]
    pub fn from_header(title: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.header() == title)
    }

    /// Value used when a column could not be scraped.
    #[must_use]
    pub fn default_value(self) -> FieldValue {
        match self {
            Self::SocialMedia | Self::Veterinarians | Self::SpeciesTreated => {
                FieldValue::List(Vec::new())
            }
            Self::HospitalHours => FieldValue::Map(FieldMap::default()),
            _ => FieldValue::Text(NOT_AVAILABLE.to_owned()),
        }
    }
}

impl Display for Column {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.header())
    }
}

pub const NOT_AVAILABLE: &str = "N/A";

/// Key/value pairs that keep the order they were scraped in.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldMap(Vec<(String, String)>);

impl FieldMap {
    /// Replaces the value of an existing key in place, otherwise appends.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FieldMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::default();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl Serialize for FieldMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
    Map(FieldMap),
}

impl FieldValue {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Cell contents for a spreadsheet row. Lists are joined with `"; "`,
    /// maps become a JSON object in scrape order.
    #[must_use]
    pub fn flatten(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::List(items) => items.join("; "),
            Self::Map(map) => serde_json::to_string(map).unwrap_or_else(|_| String::from("{}")),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(items: Vec<String>) -> Self {
        Self::List(items)
    }
}

impl From<FieldMap> for FieldValue {
    fn from(map: FieldMap) -> Self {
        Self::Map(map)
    }
}

/// One facility, possibly partial until [`Record::standardized`] is called.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Record(BTreeMap<Column, FieldValue>);

impl Record {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, column: Column, value: impl Into<FieldValue>) {
        self.0.insert(column, value.into());
    }

    #[must_use]
    pub fn get(&self, column: Column) -> Option<&FieldValue> {
        self.0.get(&column)
    }

    /// The facility name, or an empty string before one is set.
    #[must_use]
    pub fn name(&self) -> &str {
        match self.0.get(&Column::Name) {
            Some(FieldValue::Text(name)) => name,
            _ => "",
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = Column> + '_ {
        self.0.keys().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Fills every missing column with its default.
    #[must_use]
    pub fn standardized(mut self) -> Self {
        for column in Column::ALL {
            self.0.entry(column).or_insert_with(|| column.default_value());
        }
        self
    }

    /// One cell per column, in [`Column::ALL`] order.
    #[must_use]
    pub fn flatten(&self) -> Vec<String> {
        Column::ALL
            .iter()
            .map(|column| {
                self.0
                    .get(column)
                    .map_or_else(|| column.default_value().flatten(), FieldValue::flatten)
            })
            .collect()
    }

    #[must_use]
    pub fn headers() -> Vec<&'static str> {
        Column::ALL.iter().map(|c| c.header()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standardized_fills_typed_defaults() {
        let mut record = Record::new();
        record.set(Column::Name, "Lakeside Animal Hospital");
        record.set(Column::Phone, "(555) 010-2000");
        let record = record.standardized();

        assert_eq!(record.len(), Column::ALL.len());
        assert_eq!(record.columns().collect::<Vec<_>>(), Column::ALL.to_vec());
        assert_eq!(record.name(), "Lakeside Animal Hospital");
        assert_eq!(record.get(Column::Address), Some(&FieldValue::text("N/A")));
        assert_eq!(record.get(Column::Mission), Some(&FieldValue::text("N/A")));
        for column in [
            Column::SocialMedia,
            Column::Veterinarians,
            Column::SpeciesTreated,
        ] {
            assert_eq!(record.get(column), Some(&FieldValue::List(vec![])));
        }
        assert_eq!(
            record.get(Column::HospitalHours),
            Some(&FieldValue::Map(FieldMap::default()))
        );
    }

    #[test]
    fn test_standardized_keeps_scraped_values() {
        let mut record = Record::new();
        record.set(Column::Veterinarians, vec!["Dr. A".to_owned()]);
        let record = record.standardized();
        assert_eq!(
            record.get(Column::Veterinarians),
            Some(&FieldValue::List(vec!["Dr. A".to_owned()]))
        );
    }

    #[test]
    fn test_standardized_empty_record() {
        let record = Record::new().standardized();
        assert_eq!(record.len(), 14);
        assert_eq!(record.name(), "N/A");
    }

    #[test]
    fn test_flatten_lists_and_maps() {
        let mut record = Record::new();
        record.set(
            Column::SpeciesTreated,
            vec!["Dogs".to_owned(), "Cats".to_owned(), "Birds".to_owned()],
        );
        let hours: FieldMap = [("Monday", "8:00 AM - 6:00 PM"), ("Sunday", "Closed")]
            .into_iter()
            .collect();
        record.set(Column::HospitalHours, hours);
        let row = record.flatten();

        assert_eq!(row.len(), 14);
        assert_eq!(row[11], "Dogs; Cats; Birds");
        assert_eq!(
            row[12],
            r#"{"Monday":"8:00 AM - 6:00 PM","Sunday":"Closed"}"#
        );
        assert_eq!(row[0], "N/A");
        assert_eq!(row[9], "");
    }

    #[test]
    fn test_flatten_map_is_lossless() {
        let map: FieldMap = [("Facebook", "https://facebook.com/x?a=1; b")]
            .into_iter()
            .collect();
        let flat = FieldValue::Map(map).flatten();
        let back: serde_json::Value = serde_json::from_str(&flat).unwrap();
        assert_eq!(back["Facebook"], "https://facebook.com/x?a=1; b");
        assert_eq!(FieldValue::Map(FieldMap::default()).flatten(), "{}");
    }

    #[test]
    fn test_field_map_insert_replaces() {
        let mut map = FieldMap::default();
        map.insert("Monday", "9-5");
        map.insert("Tuesday", "9-5");
        map.insert("Monday", "Closed");
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("Monday"), Some("Closed"));
        assert_eq!(map.iter().next(), Some(("Monday", "Closed")));
    }

    #[test]
    fn test_column_from_header() {
        assert_eq!(Column::from_header("Species Treated"), Some(Column::SpeciesTreated));
        assert_eq!(Column::from_header("Parking"), None);
        assert_eq!(Record::headers()[9], "Social Media");
    }
}

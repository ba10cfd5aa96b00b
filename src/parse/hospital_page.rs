use scraper::{ElementRef, Html};

use super::text_from_selection::{element_text, get_inner_text, text_from_selection};
use super::Error;
use crate::record::{Column, FieldMap, FieldValue, Record, NOT_AVAILABLE};
use crate::static_selector;

const ABOVE_MAP_ID: &str = "hospitalLocatorDetailsAboveMap";
const BELOW_MAP_ID: &str = "HospitalLocatorDetailsBelowMap";

/// Fields scraped from a single hospital's detail page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HospitalDetails {
    website: String,
    phone: String,
    email: String,
    social_media: FieldMap,
    sections: Vec<(Column, FieldValue)>,
}

impl HospitalDetails {
    /// Both the contact card and the below-map section must exist; inside them
    /// every field falls back to its default on its own.
    pub fn from_html(document: &Html) -> Result<Self, Error> {
        static_selector!(ABOVE_MAP_SELECTOR <- "div#hospitalLocatorDetailsAboveMap");
        static_selector!(BELOW_MAP_SELECTOR <- "div#HospitalLocatorDetailsBelowMap");
        static_selector!(CARD_BODY_SELECTOR <- "div.card-body");

        let contact_card = document
            .select(&ABOVE_MAP_SELECTOR)
            .next()
            .and_then(|above| above.select(&CARD_BODY_SELECTOR).last())
            .ok_or_else(|| Error::missing_section(ABOVE_MAP_ID))?;

        let below_map = document
            .select(&BELOW_MAP_SELECTOR)
            .next()
            .ok_or_else(|| Error::missing_section(BELOW_MAP_ID))?;

        Ok(Self {
            website: website(contact_card).unwrap_or_else(|| NOT_AVAILABLE.to_owned()),
            phone: phone(contact_card).unwrap_or_else(|| NOT_AVAILABLE.to_owned()),
            email: email(contact_card).unwrap_or_else(|| NOT_AVAILABLE.to_owned()),
            social_media: social_media(contact_card),
            sections: below_map_sections(below_map),
        })
    }

    pub fn from_page(page: &str) -> Result<Self, Error> {
        Self::from_html(&Html::parse_document(page))
    }

    #[must_use]
    pub fn website(&self) -> &str {
        &self.website
    }

    #[must_use]
    pub fn phone(&self) -> &str {
        &self.phone
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Copies every scraped field onto `record`, replacing search-list values.
    pub fn apply_to(self, record: &mut Record) {
        record.set(Column::Website, self.website);
        record.set(Column::Phone, self.phone);
        record.set(Column::Email, self.email);
        record.set(Column::SocialMedia, self.social_media);
        for (column, value) in self.sections {
            record.set(column, value);
        }
    }
}

fn website(card: ElementRef<'_>) -> Option<String> {
    static_selector!(LINK_SELECTOR <- "a[href]");
    card.select(&LINK_SELECTOR)
        .find(|a| element_text(*a).contains(':'))
        .and_then(|a| a.value().attr("href"))
        .map(|href| href.trim().to_owned())
}

fn phone(card: ElementRef<'_>) -> Option<String> {
    static_selector!(DIV_SELECTOR <- "div");
    card.select(&DIV_SELECTOR)
        .filter_map(|div| get_inner_text(div, "phone").ok())
        .find(|text| text.contains("Phone"))
        .and_then(|text| text.trim().rsplit(':').next())
        .map(|number| number.trim().to_owned())
}

fn email(card: ElementRef<'_>) -> Option<String> {
    static_selector!(MAILTO_SELECTOR <- r#"a[href*="mailto:"]"#);
    card.select(&MAILTO_SELECTOR)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(|href| href.replace("mailto:", "").trim().to_owned())
}

fn social_media(card: ElementRef<'_>) -> FieldMap {
    static_selector!(SOCIAL_SELECTOR <- "ul.socials1-items a");
    card.select(&SOCIAL_SELECTOR)
        .filter_map(|a| {
            let href = a.value().attr("href")?;
            Some((element_text(a), href.trim().to_owned()))
        })
        .collect()
}

fn below_map_sections(below_map: ElementRef<'_>) -> Vec<(Column, FieldValue)> {
    static_selector!(CARD_SELECTOR <- ".card");
    static_selector!(HEADER_SELECTOR <- ".card-header");

    let mut sections = Vec::new();
    for card in below_map.select(&CARD_SELECTOR) {
        let Ok(title) = text_from_selection(&HEADER_SELECTOR, card, "card", "header") else {
            continue;
        };
        let Some(column) = Column::from_header(&title) else {
            continue;
        };
        let value = match column {
            Column::Veterinarians | Column::SpeciesTreated => list_items(card),
            Column::HospitalHours => hours_table(card),
            Column::Mission => mission(card),
            _ => continue,
        };
        sections.push((column, value));
    }
    sections
}

fn list_items(card: ElementRef<'_>) -> FieldValue {
    static_selector!(UL_SELECTOR <- "ul");
    static_selector!(LI_SELECTOR <- "li");
    let items = card
        .select(&UL_SELECTOR)
        .next()
        .map(|ul| ul.select(&LI_SELECTOR).map(element_text).collect())
        .unwrap_or_default();
    FieldValue::List(items)
}

fn hours_table(card: ElementRef<'_>) -> FieldValue {
    static_selector!(TABLE_SELECTOR <- "table");
    static_selector!(ROW_SELECTOR <- "tr");
    static_selector!(CELL_SELECTOR <- "td");
    let Some(table) = card.select(&TABLE_SELECTOR).next() else {
        return FieldValue::Map(FieldMap::default());
    };
    let hours = table
        .select(&ROW_SELECTOR)
        .filter_map(|row| {
            let mut cells = row.select(&CELL_SELECTOR).map(element_text);
            Some((cells.next()?, cells.next()?))
        })
        .collect();
    FieldValue::Map(hours)
}

fn mission(card: ElementRef<'_>) -> FieldValue {
    static_selector!(P_SELECTOR <- "p");
    card.select(&P_SELECTOR)
        .next()
        .map_or_else(|| FieldValue::text(NOT_AVAILABLE), |p| FieldValue::Text(element_text(p)))
}

/// Quotes `s` as an XPath 1.0 string literal.
#[must_use]
pub fn xpath_literal(s: &str) -> String {
    if !s.contains('\'') {
        format!("'{s}'")
    } else if !s.contains('"') {
        format!("\"{s}\"")
    } else {
        let parts: Vec<String> = s.split('\'').map(|part| format!("'{part}'")).collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}

/// XPath of the clickable name in the result list. `position` counts from 0
/// among the links whose text contains the name.
#[must_use]
pub fn result_link_xpath(hospital_name: &str, position: usize) -> String {
    format!(
        "(//a[contains(@class, 'recno-lookup')]/strong[contains(text(), {})])[{}]",
        xpath_literal(hospital_name.trim()),
        position + 1
    )
}

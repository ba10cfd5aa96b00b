use std::borrow::Cow;

use super::Error;
use crate::static_regex;
use scraper::{ElementRef, Selector};

/// Replaces every run of two or more whitespace characters with one space.
pub fn collapse_whitespace(s: &str) -> Cow<'_, str> {
    static_regex!(WHITESPACE_RUN <- r"\s\s+");
    WHITESPACE_RUN.replace_all(s, " ")
}

/// Text of the first element matching `selector`, whitespace collapsed and trimmed.
pub fn text_from_selection(
    selector: &Selector,
    element: ElementRef<'_>,
    parent_label: &str,
    child_label: &str,
) -> Result<String, Error> {
    let child = element
        .select(selector)
        .next() // first match
        .ok_or_else(|| {
            Error::HtmlParse(format!(
                "Every {parent_label} element should have a {child_label}."
            ))
        })?;
    Ok(element_text(child))
}

/// All descendant text of `element` joined, whitespace collapsed and trimmed.
pub fn element_text(element: ElementRef<'_>) -> String {
    let joined: String = element.text().collect();
    collapse_whitespace(joined.trim()).into_owned()
}

/// errors if there is not exactly one text node inside the element
pub fn get_inner_text<'a>(element: ElementRef<'a>, text_label: &str) -> Result<&'a str, Error> {
    let mut text_iter = element.text();
    let text_node = text_iter.next().ok_or_else(|| {
        Error::TextNodeParse(format!("{text_label} should have text inside."))
    })?;

    if text_iter.next().is_some() {
        let mut text_label = text_label.to_string();
        text_label[..1].make_ascii_uppercase();
        return Err(Error::TextNodeParse(format!(
            "{text_label} element should only have one text node inside of it."
        )));
    }
    Ok(text_node)
}

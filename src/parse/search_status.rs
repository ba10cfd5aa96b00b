/// What the locator widget showed after a search was submitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchStatus {
    /// Results were rendered (the map shows the searcher's own pin).
    Found,
    /// The site answered and there is nothing within the radius.
    NoResults,
    /// Bot detection or a transient failure page.
    Blocked,
    /// None of the known markers were present.
    Unrecognized,
}

const FOUND_MARKER: &str = "You are here";
const NO_RESULTS_MARKER: &str = "Please refine your search criteria";
const BLOCKED_MARKERS: [&str; 2] = ["we could not verify your request", "try again"];

impl SearchStatus {
    #[must_use]
    pub fn classify(locator_text: &str) -> Self {
        if locator_text.contains(FOUND_MARKER) {
            Self::Found
        } else if locator_text.contains(NO_RESULTS_MARKER) {
            Self::NoResults
        } else if BLOCKED_MARKERS.iter().any(|m| locator_text.contains(m)) {
            Self::Blocked
        } else {
            Self::Unrecognized
        }
    }
}

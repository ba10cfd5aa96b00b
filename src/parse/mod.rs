mod error;
pub mod hospital_page;
pub mod search_results;
pub mod search_status;
pub mod static_pattern;
mod text_from_selection;

pub use error::Error;
pub use hospital_page::{result_link_xpath, HospitalDetails};
pub use search_results::SearchResults;
pub use search_status::SearchStatus;

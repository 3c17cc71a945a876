/// Summary and description building
pub mod description;
pub mod preprocess;

pub use description::{
    search_string, truncate_summary, DescriptionFormatter, StringFormatter, ELLIPSIS,
    SUMMARY_MAX_CHARS,
};
pub use preprocess::SummaryPreprocessors;

pub mod chunker;
pub mod cleaner;
pub mod sanitize;

use regex::Regex;
use std::sync::OnceLock;

pub(crate) fn cached_regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static regex pattern"))
}

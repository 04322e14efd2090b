// services/mod.rs - Shared document plumbing used by every framework
//
// dates:     lenient ISO 8601 parsing and month arithmetic
// ids:       sequential business keys (EMP000001, PROJ000001, DQM0000001)
// documents: audit stamping and dotted-path updates on JSON documents
// query:     list/search request parsing into filter documents
// search:    term-hit ranking for the /search endpoints

pub mod dates;
pub mod documents;
pub mod ids;
pub mod query;
pub mod search;

pub use documents::{get_path, set_path, stamp_created, stamp_updated, text_at};
pub use ids::IdSequence;
pub use query::{bracket_filters, FilterBuilder, PageRequest};

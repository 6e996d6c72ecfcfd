pub mod deadlines;

pub use deadlines::{days_until, deadline_dedupe_key};

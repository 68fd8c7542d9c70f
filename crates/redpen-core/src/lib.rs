pub mod check;
pub mod error;
pub mod record;
pub mod suggestion;

pub use check::{ChangeRegion, CheckOptions, CheckTrigger, Edit, EditKind};
pub use error::CheckError;
pub use record::OutcomeRecord;
pub use suggestion::{Origin, Severity, Suggestion, SuggestionKind};

// Entity Models
// Records read from the three input tables, plus the party alias table.

pub mod party;
pub mod records;

pub use party::{PartyAliases, UNKNOWN_PARTY};
pub use records::{AnalysisRecord, Filing, MpRecord};

pub mod base_wallet;
pub mod in_memory;
pub mod record;
pub mod record_category;
pub mod record_tags;
pub mod tag_filter;

use crate::{
    errors::error::{RevocationErrorKind, RevocationResult},
    wallet::{
        base_wallet::RecordWallet, record::Record, record_category::RecordCategory,
        tag_filter::TagFilter,
    },
};

/// Outcome of a lookup that is expected to match at most one record.
///
/// A `Duplicate` outcome means the uniqueness invariant of the queried tag set
/// has been violated and the store needs operator attention; callers must
/// match on it rather than silently picking one of the matches.
#[derive(Debug)]
pub enum RecordLookup<T> {
    Found(T),
    NotFound,
    Duplicate,
}

impl<T> RecordLookup<T> {
    /// Unwraps the lookup, mapping `NotFound` to the given error kind and
    /// `Duplicate` to a data-integrity error.
    pub fn require(
        self,
        not_found_kind: RevocationErrorKind,
        what: &str,
    ) -> RevocationResult<T> {
        use crate::errors::error::err_msg;
        match self {
            Self::Found(value) => Ok(value),
            Self::NotFound => Err(err_msg(not_found_kind, format!("{} not found", what))),
            Self::Duplicate => Err(err_msg(
                RevocationErrorKind::DuplicateWalletRecord,
                format!("More than one record matched unique lookup for {}", what),
            )),
        }
    }

    pub fn found(self) -> Option<T> {
        match self {
            Self::Found(value) => Some(value),
            _ => None,
        }
    }
}

/// Runs a tag-filter search expected to yield at most one record.
pub async fn find_unique_record(
    wallet: &dyn RecordWallet,
    category: RecordCategory,
    filter: &TagFilter,
) -> RevocationResult<RecordLookup<Record>> {
    let mut records = wallet.search_record(category, Some(filter)).await?;
    Ok(match records.len() {
        0 => RecordLookup::NotFound,
        1 => RecordLookup::Found(records.remove(0)),
        _ => RecordLookup::Duplicate,
    })
}

//! Batching cursors
//!
//! A cursor walks not-yet-merged records in creation order, one batch at a
//! time, remembering the newest `created` it has returned. Claiming a record
//! for a merged file is a compare-and-set in the repository, so separate
//! cursor instances may race over the same rows and each row is still claimed
//! once. A single cursor instance is not meant to be shared.
//!
//! The watermark only moves forward after a fully successful `next`. A caller
//! that could not finish with a returned record moves it back with
//! `retry_from`, so the record is returned again by a later call.

pub mod micro_deposit;
pub mod transfer;

pub use micro_deposit::{MicroDepositCursor, UploadableMicroDeposit};
pub use transfer::{GroupableTransfer, TransferCursor};

use chrono::{DateTime, Duration, NaiveTime, Utc};

pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Midnight UTC of the day containing `now`.
pub fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(NaiveTime::MIN).and_utc()
}

/// Watermark after a batch: the newest `created` seen, or unchanged when the
/// batch was empty.
pub(crate) fn advance<'a>(
    current: DateTime<Utc>,
    created: impl Iterator<Item = &'a DateTime<Utc>>,
) -> DateTime<Utc> {
    created.fold(current, |w, c| w.max(*c))
}

/// Watermark under which a record created at `created` is visible again.
/// Stored timestamps have microsecond precision.
pub(crate) fn just_before(created: DateTime<Utc>) -> DateTime<Utc> {
    created - Duration::microseconds(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_start_of_day() {
        let now = Utc.with_ymd_and_hms(2024, 3, 12, 15, 4, 5).unwrap();
        assert_eq!(
            start_of_day(now),
            Utc.with_ymd_and_hms(2024, 3, 12, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_advance_keeps_watermark_on_empty_batch() {
        let w = Utc.with_ymd_and_hms(2024, 3, 12, 0, 0, 0).unwrap();
        assert_eq!(advance(w, std::iter::empty()), w);

        let later = [
            Utc.with_ymd_and_hms(2024, 3, 12, 9, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 12, 8, 0, 0).unwrap(),
        ];
        assert_eq!(advance(w, later.iter()), later[0]);
    }

    #[test]
    fn test_just_before_is_strictly_older() {
        let created = Utc.with_ymd_and_hms(2024, 3, 12, 9, 0, 0).unwrap();
        assert!(just_before(created) < created);
        assert_eq!(created - just_before(created), Duration::microseconds(1));
    }
}

//! Rolling soft limits on transfer volume
//!
//! Each window sums the user's transfers created inside it plus the pending
//! amount. Reaching the cap rejects the transfer. Windows without a cap are
//! skipped.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use thiserror::Error;

use crate::config::TransferConfig;
use crate::cursor::start_of_day;
use crate::error::ErrorKind;
use crate::model::{Transfer, UserId};
use crate::money::{Amount, AmountError};
use crate::repository::{RepositoryError, TransferRepository};

#[derive(Debug, Error)]
pub enum LimitError {
    #[error("over limit by {overage}")]
    OverLimit {
        window: &'static str,
        overage: Amount,
    },

    #[error("{0}")]
    Amount(#[from] AmountError),

    #[error("{0}")]
    Repository(#[from] RepositoryError),
}

impl LimitError {
    pub fn code(&self) -> &'static str {
        match self {
            LimitError::OverLimit { .. } => "OVER_LIMIT",
            LimitError::Amount(e) => e.code(),
            LimitError::Repository(e) => e.code(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            LimitError::OverLimit { .. } => ErrorKind::Validation,
            LimitError::Amount(e) => e.kind(),
            LimitError::Repository(e) => e.kind(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Limits {
    pub current_day: Option<Amount>,
    pub previous_seven_days: Option<Amount>,
    pub previous_thirty_days: Option<Amount>,
}

pub fn parse_limits(config: &TransferConfig) -> Result<Limits, AmountError> {
    let parse = |v: &Option<String>| {
        v.as_deref()
            .map(|s| Amount::parse(&config.symbol, s))
            .transpose()
    };
    Ok(Limits {
        current_day: parse(&config.current_day_limit)?,
        previous_seven_days: parse(&config.seven_day_limit)?,
        previous_thirty_days: parse(&config.thirty_day_limit)?,
    })
}

/// Check `pending` against every configured window.
pub fn under_limits(
    existing: &[Transfer],
    pending: &Amount,
    limits: &Limits,
    now: DateTime<Utc>,
) -> Result<(), LimitError> {
    let windows = [
        ("daily", limits.current_day, start_of_day(now)),
        ("7 day", limits.previous_seven_days, now - Duration::days(7)),
        ("30 day", limits.previous_thirty_days, now - Duration::days(30)),
    ];
    for (window, cap, since) in windows {
        let Some(cap) = cap else { continue };
        let total = existing
            .iter()
            .filter(|t| t.created >= since)
            .try_fold(*pending, |sum, t| sum.plus(&t.amount))?;
        if total.symbol() != cap.symbol() {
            return Err(AmountError::DifferentCurrencies(total.symbol(), cap.symbol()).into());
        }
        if total >= cap {
            let overage = total.checked_sub(&cap).unwrap_or_else(Amount::empty);
            return Err(LimitError::OverLimit { window, overage });
        }
    }
    Ok(())
}

/// [`under_limits`] against a user's stored transfers.
pub struct LimitChecker {
    transfers: Arc<dyn TransferRepository>,
    limits: Limits,
}

impl LimitChecker {
    pub fn new(transfers: Arc<dyn TransferRepository>, limits: Limits) -> Self {
        Self { transfers, limits }
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    pub async fn check(&self, user_id: &UserId, pending: &Amount) -> Result<(), LimitError> {
        let now = Utc::now();
        let since = (now - Duration::days(30)).min(start_of_day(now));
        let existing = self.transfers.get_user_transfers_since(user_id, since).await?;
        under_limits(&existing, pending, &self.limits, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SecCode;
    use crate::model::transfer::tests::transfer;
    use crate::repository::MemoryRepository;

    fn usd(s: &str) -> Amount {
        Amount::parse("USD", s).unwrap()
    }

    fn existing(amount: &str, age: Duration, now: DateTime<Utc>) -> Transfer {
        let mut t = transfer(SecCode::Ppd, None);
        t.amount = usd(amount);
        t.created = now - age;
        t
    }

    fn seven_day(cap: &str) -> Limits {
        Limits {
            previous_seven_days: Some(usd(cap)),
            ..Limits::default()
        }
    }

    #[test]
    fn test_over_seven_day_limit() {
        let now = Utc::now();
        let err = under_limits(
            &[existing("450.00", Duration::days(2), now)],
            &usd("100.00"),
            &seven_day("500.00"),
            now,
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "over limit by USD 50.00");
        match err {
            LimitError::OverLimit { window, overage } => {
                assert_eq!(window, "7 day");
                assert_eq!(overage, usd("50.00"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_reaching_the_cap_is_rejected() {
        let now = Utc::now();
        let err = under_limits(
            &[existing("400.00", Duration::days(1), now)],
            &usd("100.00"),
            &seven_day("500.00"),
            now,
        )
        .unwrap_err();
        assert_eq!(err.code(), "OVER_LIMIT");
    }

    #[test]
    fn test_old_transfers_fall_out_of_window() {
        let now = Utc::now();
        let old = [existing("450.00", Duration::days(8), now)];
        assert!(under_limits(&old, &usd("100.00"), &seven_day("500.00"), now).is_ok());

        let limits = Limits {
            previous_thirty_days: Some(usd("500.00")),
            ..Limits::default()
        };
        assert!(under_limits(&old, &usd("100.00"), &limits, now).is_err());
    }

    #[test]
    fn test_no_limits_configured() {
        let now = Utc::now();
        let big = [existing("1000000.00", Duration::hours(1), now)];
        assert!(under_limits(&big, &usd("1.00"), &Limits::default(), now).is_ok());
    }

    #[test]
    fn test_parse_limits() {
        let limits = parse_limits(&TransferConfig::default()).unwrap();
        assert_eq!(limits.current_day, None);
        assert_eq!(limits.previous_seven_days, Some(usd("10000.00")));
        assert_eq!(limits.previous_thirty_days, Some(usd("25000.00")));

        let bad = TransferConfig {
            seven_day_limit: Some("ten".to_string()),
            ..TransferConfig::default()
        };
        assert!(parse_limits(&bad).is_err());
    }

    #[tokio::test]
    async fn test_checker_reads_repository() {
        let repo = Arc::new(MemoryRepository::new());
        let now = Utc::now();
        repo.create_transfer(&existing("450.00", Duration::days(1), now))
            .await
            .unwrap();
        let checker = LimitChecker::new(repo, seven_day("500.00"));
        assert!(checker.check(&UserId::from("user"), &usd("10.00")).await.is_ok());
        assert!(checker.check(&UserId::from("user"), &usd("100.00")).await.is_err());
        assert!(checker.check(&UserId::from("other"), &usd("100.00")).await.is_ok());
    }
}

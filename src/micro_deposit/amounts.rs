//! Verification amount generation

use crate::money::{Amount, AmountError, Currency};
use crate::rng::RandomSource;

/// Inclusive bounds, in cents.
pub const MIN_CENTS: u64 = 1;
pub const MAX_CENTS: u64 = 49;

/// Two independent credits in `[$0.01, $0.49]`.
pub fn generate_amounts(rng: &dyn RandomSource) -> Result<[Amount; 2], AmountError> {
    let draw = || Amount::from_cents(Currency::USD, rng.range(MIN_CENTS, MAX_CENTS + 1) as i64);
    Ok([draw()?, draw()?])
}

/// Withdrawal offsetting every credit.
pub fn withdrawal_amount(amounts: &[Amount]) -> Result<Amount, AmountError> {
    amounts
        .iter()
        .try_fold(Amount::empty(), |sum, amount| sum.plus(amount))
}

/// `"USD 0.12,USD 0.37"`, the form recorded with each attempt.
pub fn describe(amounts: &[Amount]) -> String {
    amounts
        .iter()
        .map(Amount::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::{ScriptedRandom, SeededRandom, ThreadRandom};
    use proptest::prelude::*;

    #[test]
    fn test_amounts_in_range() {
        let rng = SeededRandom::new(1);
        for _ in 0..500 {
            let [a, b] = generate_amounts(&rng).unwrap();
            for x in [a, b] {
                assert!((1..=49).contains(&x.cents()), "{}", x);
                assert_eq!(x.symbol(), Currency::USD);
            }
        }
        let [a, _] = generate_amounts(&ThreadRandom).unwrap();
        assert!(a.cents() > 0);
    }

    #[test]
    fn test_bounds_reachable() {
        // range(1, 50) maps 0 -> 1 and 48 -> 49
        let rng = ScriptedRandom::new(vec![0, 48]);
        let [a, b] = generate_amounts(&rng).unwrap();
        assert_eq!(a.to_string(), "USD 0.01");
        assert_eq!(b.to_string(), "USD 0.49");
    }

    #[test]
    fn test_withdrawal_and_description() {
        let amounts = [
            Amount::parse("USD", "0.12").unwrap(),
            Amount::parse("USD", "0.37").unwrap(),
        ];
        assert_eq!(withdrawal_amount(&amounts).unwrap().to_string(), "USD 0.49");
        assert_eq!(describe(&amounts), "USD 0.12,USD 0.37");
    }

    proptest! {
        #[test]
        fn prop_withdrawal_is_exact_sum(seed in any::<u64>()) {
            let rng = SeededRandom::new(seed);
            let [a, b] = generate_amounts(&rng).unwrap();
            let sum = withdrawal_amount(&[a, b]).unwrap();
            prop_assert_eq!(sum, a.plus(&b).unwrap());
            prop_assert_eq!(sum.cents(), a.cents() + b.cents());
            prop_assert!(sum.cents() < 100);
        }
    }
}

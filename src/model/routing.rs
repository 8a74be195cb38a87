//! ABA routing number helpers

use super::ModelError;

/// Validate a nine digit ABA routing number (3-7-1 weighted checksum).
pub fn validate_routing_number(routing_number: &str) -> Result<(), ModelError> {
    let digits = digits(routing_number)
        .filter(|d| d.len() == 9)
        .ok_or_else(|| ModelError::InvalidRoutingNumber(routing_number.to_string()))?;

    let sum = 3 * (digits[0] + digits[3] + digits[6])
        + 7 * (digits[1] + digits[4] + digits[7])
        + (digits[2] + digits[5] + digits[8]);
    if sum % 10 != 0 {
        return Err(ModelError::InvalidRoutingNumber(routing_number.to_string()));
    }
    Ok(())
}

/// First eight digits of a routing number (the institution identifier).
pub fn aba8(routing_number: &str) -> &str {
    routing_number.get(..8).unwrap_or(routing_number)
}

/// Check digit of a routing number: the ninth digit when present, otherwise
/// computed from the first eight.
pub fn aba_check_digit(routing_number: &str) -> String {
    if let Some(d) = routing_number.get(8..9) {
        return d.to_string();
    }
    match digits(routing_number).filter(|d| d.len() == 8) {
        Some(d) => {
            let sum = 3 * (d[0] + d[3] + d[6]) + 7 * (d[1] + d[4] + d[7]) + (d[2] + d[5]);
            ((10 - sum % 10) % 10).to_string()
        }
        None => String::new(),
    }
}

fn digits(s: &str) -> Option<Vec<u32>> {
    s.chars().map(|c| c.to_digit(10)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_routing_numbers() {
        for rtn in ["121042882", "231380104", "987654320"] {
            assert!(validate_routing_number(rtn).is_ok(), "{}", rtn);
        }
    }

    #[test]
    fn test_invalid_routing_numbers() {
        for rtn in ["121042881", "12104288", "12104288a", "", "1210428820"] {
            assert!(validate_routing_number(rtn).is_err(), "{}", rtn);
        }
    }

    #[test]
    fn test_aba8_and_check_digit() {
        assert_eq!(aba8("121042882"), "12104288");
        assert_eq!(aba_check_digit("121042882"), "2");
        assert_eq!(aba_check_digit("12104288"), "2");
        assert_eq!(aba_check_digit("98765432"), "0");
        assert_eq!(aba8("123"), "123");
        assert_eq!(aba_check_digit("123"), "");
    }
}

//! Owner-name heuristic separating municipal from private parcels.
//!
//! Owner names in county parcel data are inconsistently formatted, so this is a
//! deliberately simple token match: tokens come from splitting on the literal
//! space character, matching is case-sensitive, punctuation is left in place.

/// Business-entity markers; any of these makes the owner private
pub const BUSINESS_TOKENS: [&str; 6] = ["INC", "CO", "CORP", "LLC", "LTD", "COMPANY"];

/// Public-body keywords
pub const MUNICIPAL_TOKENS: [&str; 5] = ["CITY", "COUNTY", "STATE", "DEPT", "BUREAU"];

/// True when the owner name reads as a municipal/public body.
///
/// Rules, first match wins:
/// 1. empty name: private
/// 2. any business token: private, even next to a municipal keyword
/// 3. any municipal keyword: municipal
/// 4. otherwise private
pub fn is_municipal(owner: &str) -> bool {
    if owner.is_empty() {
        return false;
    }
    let tokens: Vec<&str> = owner.split(' ').collect();
    if tokens.iter().any(|t| BUSINESS_TOKENS.contains(t)) {
        return false;
    }
    tokens.iter().any(|t| MUNICIPAL_TOKENS.contains(t))
}

/// 0/1 flag as written to the `muni` attribute
pub fn muni_flag(owner: &str) -> u8 {
    u8::from(is_municipal(owner))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_documented_examples() {
        assert_eq!(muni_flag("CITY OF SPRINGFIELD"), 1);
        assert_eq!(muni_flag("JOHN SMITH"), 0);
        assert_eq!(muni_flag("COUNTY ROAD DEPT"), 1);
    }

    #[test]
    fn test_empty_owner_is_private() {
        assert!(!is_municipal(""));
    }

    #[test]
    fn test_business_token_wins_over_municipal_keyword() {
        assert!(!is_municipal("CITY FARMS LLC"));
        assert!(!is_municipal("STATE GRAIN CO"));
        assert!(!is_municipal("COUNTY LINE COMPANY"));
        assert!(!is_municipal("BUREAU INC"));
        for business in BUSINESS_TOKENS {
            for muni in MUNICIPAL_TOKENS {
                assert!(!is_municipal(&format!("{} X {}", muni, business)));
            }
        }
    }

    #[test]
    fn test_exact_tokens_only() {
        // case-sensitive
        assert!(!is_municipal("city of springfield"));
        // punctuation is not stripped
        assert!(!is_municipal("CITY, OF SPRINGFIELD"));
        assert!(is_municipal("SMITH, INC. CITY"));
        // substrings do not count
        assert!(!is_municipal("CITYVIEW FARMS"));
        assert!(!is_municipal("MCCOY FAMILY TRUST"));
        // tabs are not separators
        assert!(!is_municipal("STATE\tOF ILLINOIS"));
        // repeated spaces leave empty tokens behind, which match nothing
        assert!(is_municipal("STATE  OF ILLINOIS"));
    }
}

use crate::models::MacroCategory;

/// Legacy asset codes and the code they are reported under today.
const ALIASES: &[(&str, &str)] = &[("10007", "1007"), ("1015", "1115")];

const FIXED_INCOME: &[&str] = &["1000", "1001"];
const VARIABLE_INCOME: &[&str] = &[
    "1002", "1003", "1004", "1005", "1011", "1012", "1014", "1115", "1016", "1017",
];
const STRUCTURED_FUNDS: &[&str] = &["1009", "1010", "1007", "1008", "1018", "1019", "1020"];

// Precedence order for membership tests.
const TAXONOMY: &[(MacroCategory, &[&str])] = &[
    (MacroCategory::FixedIncome, FIXED_INCOME),
    (MacroCategory::VariableIncome, VARIABLE_INCOME),
    (MacroCategory::StructuredFunds, STRUCTURED_FUNDS),
];

/// Rewrite a legacy code to its current equivalent; other codes pass through.
pub fn canonical_code(code: &str) -> &str {
    ALIASES
        .iter()
        .find(|(old, _)| *old == code)
        .map(|(_, new)| *new)
        .unwrap_or(code)
}

/// Macro-category of an asset code, `None` when unclassified.
pub fn classify(code: Option<&str>) -> Option<MacroCategory> {
    let code = canonical_code(code?.trim());
    TAXONOMY
        .iter()
        .find(|(_, codes)| codes.contains(&code))
        .map(|(category, _)| *category)
}

pub struct Classification {
    pub asset_code: Option<String>,
    pub macro_category: Option<MacroCategory>,
}

/// Alias then classify, returning the code as it should be stored.
pub fn classify_asset(code: Option<&str>) -> Classification {
    let asset_code = code.map(|c| canonical_code(c).to_string());
    let macro_category = classify(asset_code.as_deref());
    Classification {
        asset_code,
        macro_category,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_sets_are_disjoint() {
        for (i, (_, a)) in TAXONOMY.iter().enumerate() {
            for (_, b) in &TAXONOMY[i + 1..] {
                assert!(a.iter().all(|code| !b.contains(code)), "overlap between code sets");
            }
        }
    }

    #[test]
    fn test_classify_each_bucket() {
        assert_eq!(classify(Some("1000")), Some(MacroCategory::FixedIncome));
        assert_eq!(classify(Some("1002")), Some(MacroCategory::VariableIncome));
        assert_eq!(classify(Some("1020")), Some(MacroCategory::StructuredFunds));
    }

    #[test]
    fn test_classify_unknown_and_absent() {
        assert_eq!(classify(Some("9999")), None);
        assert_eq!(classify(Some("1022")), None);
        assert_eq!(classify(Some("")), None);
        assert_eq!(classify(None), None);
    }

    #[test]
    fn test_classify_trims_whitespace() {
        assert_eq!(classify(Some(" 1001 ")), Some(MacroCategory::FixedIncome));
    }

    #[test]
    fn test_aliases_classify_like_canonical_code() {
        for (old, new) in ALIASES {
            assert_eq!(canonical_code(old), *new);
            assert_eq!(classify(Some(*old)), classify(Some(*new)));
        }
        assert_eq!(classify(Some("10007")), Some(MacroCategory::StructuredFunds));
        assert_eq!(classify(Some("1015")), Some(MacroCategory::VariableIncome));
    }

    #[test]
    fn test_classify_asset_stores_canonical_code() {
        let c = classify_asset(Some("10007"));
        assert_eq!(c.asset_code.as_deref(), Some("1007"));
        assert_eq!(c.macro_category, Some(MacroCategory::StructuredFunds));

        let c = classify_asset(None);
        assert!(c.asset_code.is_none());
        assert!(c.macro_category.is_none());
    }
}

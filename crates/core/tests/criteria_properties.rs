//! Property tests for structural criteria
//!
//! 1. **Conjunction** - criteria match iff every field matches
//! 2. **Nesting** - dotted and indexed paths reach nested values
//! 3. **Raw bytes** - raw and decoded evaluation agree

use duet_core::SearchCriteria;
use proptest::prelude::*;
use serde_json::json;

proptest! {
    #[test]
    fn all_criteria_must_hold(a in "[a-z]{0,8}", b in any::<i64>(), flip in any::<bool>()) {
        let payload = json!({ "a": a, "b": b });
        let expected_b = if flip { (b.wrapping_add(1)).to_string() } else { b.to_string() };
        let criteria = SearchCriteria::new()
            .with("a", a.clone())
            .unwrap()
            .with("b", expected_b)
            .unwrap();
        prop_assert_eq!(criteria.matches(&payload), !flip);
    }

    #[test]
    fn nested_paths_reach_values(values in prop::collection::vec("[A-Z]{1,4}", 1..6), pick in any::<prop::sample::Index>()) {
        let index = pick.index(values.len());
        let payload = json!({ "outer": { "items": values.iter().map(|v| json!({ "v": v })).collect::<Vec<_>>() } });
        let criteria = SearchCriteria::new()
            .with(&format!("outer.items[{index}].v"), values[index].clone())
            .unwrap();
        prop_assert!(criteria.matches(&payload));

        let beyond = SearchCriteria::new()
            .with(&format!("outer.items[{}].v", values.len()), values[index].clone())
            .unwrap();
        prop_assert!(!beyond.matches(&payload));
    }

    #[test]
    fn raw_and_decoded_agree(n in any::<u32>(), s in "[a-z ]{0,12}", expected in "[a-z0-9 ]{0,12}") {
        let payload = json!({ "n": n, "s": s });
        let bytes = serde_json::to_vec(&payload).unwrap();
        for path in ["n", "s", "missing"] {
            let criteria = SearchCriteria::new().with(path, expected.clone()).unwrap();
            prop_assert_eq!(criteria.matches_raw(&bytes), criteria.matches(&payload));
        }
    }
}

#[test]
fn empty_criteria_match_anything_even_garbage() {
    let criteria = SearchCriteria::new();
    assert!(criteria.matches(&json!(null)));
    assert!(criteria.matches_raw(b"\x00 not json"));
    assert!(!SearchCriteria::new().with("a", "1").unwrap().matches_raw(b"not json"));
}

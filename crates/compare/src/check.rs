//! Field-by-field comparison with mismatch logging
//!
//! [`FieldChecks`] accumulates the result of comparing one log payload
//! against one push payload. Every check runs and logs; the caller decides
//! how to combine them (usually [`FieldChecks::finish`]).

use crate::decimal::{compare_decimals, DecimalComparison};
use rust_decimal::Decimal;
use std::fmt::Debug;
use tracing::{debug, warn};

/// Running comparison of two payloads
#[derive(Debug)]
pub struct FieldChecks<'a> {
    sequence: u64,
    type_tag: &'a str,
    mismatched: Vec<String>,
}

impl<'a> FieldChecks<'a> {
    /// Start comparing the payloads of event `sequence`
    pub fn new(sequence: u64, type_tag: &'a str) -> Self {
        Self {
            sequence,
            type_tag,
            mismatched: Vec::new(),
        }
    }

    /// Compare two values with `PartialEq`
    pub fn eq<V>(&mut self, field: &str, log: &V, push: &V) -> bool
    where
        V: PartialEq + Debug + ?Sized,
    {
        if log == push {
            return true;
        }
        self.mismatch(field, log, push);
        false
    }

    /// Compare two decimals by value
    pub fn decimal(&mut self, field: &str, log: &Decimal, push: &Decimal) -> bool {
        match compare_decimals(log, push) {
            DecimalComparison::Equal => true,
            DecimalComparison::ScaleDiffers {
                log_scale,
                push_scale,
            } => {
                debug!(
                    sequence = self.sequence,
                    type_tag = self.type_tag,
                    field,
                    log = %log,
                    push = %push,
                    log_scale,
                    push_scale,
                    "scale differs"
                );
                true
            }
            DecimalComparison::Differs => {
                self.mismatch(field, log, push);
                false
            }
        }
    }

    /// Compare two optional decimals; both absent is equal
    pub fn optional_decimal(
        &mut self,
        field: &str,
        log: Option<&Decimal>,
        push: Option<&Decimal>,
    ) -> bool {
        match (log, push) {
            (None, None) => true,
            (Some(l), Some(p)) => self.decimal(field, l, p),
            _ => {
                self.mismatch(field, &log, &push);
                false
            }
        }
    }

    /// Compare two lists element-wise in stored order
    ///
    /// `each` compares one pair of elements, given the element's field name
    /// (`legs[2]`). A length difference is a mismatch; the common prefix is
    /// still compared so every difference is logged.
    pub fn list<T, F>(&mut self, field: &str, log: &[T], push: &[T], mut each: F) -> bool
    where
        F: FnMut(&mut Self, &str, &T, &T) -> bool,
    {
        let mut equal = true;
        if log.len() != push.len() {
            self.mismatch(&format!("{field}.len"), &log.len(), &push.len());
            equal = false;
        }
        for (index, (l, p)) in log.iter().zip(push).enumerate() {
            let element = format!("{field}[{index}]");
            if !each(self, &element, l, p) {
                equal = false;
            }
        }
        equal
    }

    /// Number of mismatched fields so far
    pub fn mismatches(&self) -> usize {
        self.mismatched.len()
    }

    /// Names of the mismatched fields, in check order
    pub fn mismatched_fields(&self) -> &[String] {
        &self.mismatched
    }

    /// `true` when no check failed
    pub fn finish(self) -> bool {
        if !self.mismatched.is_empty() {
            debug!(
                sequence = self.sequence,
                type_tag = self.type_tag,
                fields = ?self.mismatched,
                "payloads differ"
            );
        }
        self.mismatched.is_empty()
    }

    fn mismatch<V: Debug + ?Sized>(&mut self, field: &str, log: &V, push: &V) {
        warn!(
            sequence = self.sequence,
            type_tag = self.type_tag,
            field,
            log = ?log,
            push = ?push,
            "field mismatch"
        );
        self.mismatched.push(field.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_every_check_runs() {
        let mut checks = FieldChecks::new(7, "X");
        assert!(!checks.eq("a", "x", "y"));
        assert!(checks.eq("b", &1, &1));
        assert!(!checks.decimal("c", &dec("1.0"), &dec("1.1")));
        assert_eq!(checks.mismatched_fields(), ["a".to_string(), "c".to_string()]);
        assert!(!checks.finish());
    }

    #[test]
    fn test_scale_only_is_not_a_mismatch() {
        let mut checks = FieldChecks::new(1, "X");
        assert!(checks.decimal("amount", &dec("10.00"), &dec("10.0")));
        assert!(checks.optional_decimal("fee", None, None));
        assert!(!checks.optional_decimal("tax", Some(&dec("1")), None));
        assert_eq!(checks.mismatches(), 1);
    }

    #[test]
    fn test_list_semantics() {
        let mut checks = FieldChecks::new(1, "X");
        let empty: [u8; 0] = [];
        assert!(checks.list("legs", &empty, &empty, |c, f, l, p| c.eq(f, l, p)));
        assert!(checks.list("legs", &[1, 2], &[1, 2], |c, f, l, p| c.eq(f, l, p)));
        assert!(checks.finish());

        let mut checks = FieldChecks::new(1, "X");
        assert!(!checks.list("legs", &[1, 9], &[1, 2, 3], |c, f, l, p| c.eq(f, l, p)));
        assert_eq!(
            checks.mismatched_fields(),
            ["legs.len".to_string(), "legs[1]".to_string()]
        );
    }
}

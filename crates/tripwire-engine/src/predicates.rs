//! Set predicates over small unordered value lists.
//!
//! `haystack` is what was observed, `needles` what was configured. Callers
//! holding a single value pass it with [`std::slice::from_ref`].

/// Every needle appears in the haystack.
pub fn contains_all<T: PartialEq>(haystack: &[T], needles: &[T]) -> bool {
    needles.iter().all(|n| haystack.contains(n))
}

/// Both lists hold the same elements, regardless of order.
pub fn exact_match<T: PartialEq>(haystack: &[T], needles: &[T]) -> bool {
    contains_all(haystack, needles) && contains_all(needles, haystack)
}

/// At least one needle appears in the haystack.
pub fn contains_any<T: PartialEq>(haystack: &[T], needles: &[T]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// No needle appears in the haystack.
pub fn contains_none<T: PartialEq>(haystack: &[T], needles: &[T]) -> bool {
    !contains_any(haystack, needles)
}

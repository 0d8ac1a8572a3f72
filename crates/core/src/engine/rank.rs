use rust_decimal::Decimal;
use std::cmp::Reverse;

/// Sorts by `score` descending and keeps the first `limit` items.
///
/// The sort is stable, so items with equal scores stay in encounter order and repeated runs
/// over unchanged input give the same output.
pub fn rank<T, F>(mut items: Vec<T>, score: F, limit: usize) -> Vec<T>
where
    F: Fn(&T) -> Decimal,
{
    items.sort_by_key(|item| Reverse(score(item)));
    items.truncate(limit);
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn sorts_descending_and_truncates() {
        let items = vec![("a", dec!(1)), ("b", dec!(3)), ("c", dec!(2))];
        let out = rank(items, |(_, s)| *s, 2);
        assert_eq!(out, vec![("b", dec!(3)), ("c", dec!(2))]);
    }

    #[test]
    fn ties_keep_encounter_order() {
        let items = vec![("first", dec!(5)), ("x", dec!(9)), ("second", dec!(5)), ("third", dec!(5.0))];
        let out = rank(items, |(_, s)| *s, 10);
        let names: Vec<_> = out.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["x", "first", "second", "third"]);
    }

    #[test]
    fn returns_everything_when_under_limit() {
        let out = rank(vec![dec!(1), dec!(2)], |d| *d, 50);
        assert_eq!(out, vec![dec!(2), dec!(1)]);
        assert!(rank(Vec::<Decimal>::new(), |d| *d, 50).is_empty());
    }

    #[test]
    fn idempotent() {
        let items: Vec<(usize, Decimal)> = (0..20)
            .map(|i| (i, Decimal::from((i * 7) % 5)))
            .collect();
        let once = rank(items, |(_, s)| *s, 8);
        let twice = rank(once.clone(), |(_, s)| *s, 8);
        assert_eq!(once, twice);
    }
}

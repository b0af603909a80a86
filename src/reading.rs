use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use crate::models::{Card, DrawnCard, GroupOrder};

/// Number of cards in a spread
pub const DRAW_COUNT: usize = 8;

const REVERSED_PROBABILITY: f64 = 0.5;

#[derive(Error, Debug, PartialEq)]
pub enum ReadingError {
    #[error("not enough cards in deck: need {needed}, have {available}")]
    NotEnoughCards { needed: usize, available: usize },
}

/// Splits the deck into three piles of `len / 3` cards
///
/// The last pile keeps the remainder, so no card is lost for deck sizes that
/// are not a multiple of three.
pub fn split_into_three_groups<T: Clone>(cards: &[T]) -> Result<[Vec<T>; 3], ReadingError> {
    if cards.len() < GroupOrder::ALL.len() {
        return Err(ReadingError::NotEnoughCards {
            needed: GroupOrder::ALL.len(),
            available: cards.len(),
        });
    }

    let size = cards.len() / 3;
    Ok([
        cards[..size].to_vec(),
        cards[size..size * 2].to_vec(),
        cards[size * 2..].to_vec(),
    ])
}

/// Stacks the piles back together in the order the querent picked
pub fn merge_by_order<T: Clone>(groups: &[Vec<T>; 3], order: &[GroupOrder]) -> Vec<T> {
    order
        .iter()
        .flat_map(|group| groups[group.index()].iter().cloned())
        .collect()
}

/// In-place Fisher–Yates shuffle
pub fn fisher_yates<T, R: Rng + ?Sized>(items: &mut [T], rng: &mut R) {
    for i in (1..items.len()).rev() {
        let j = rng.random_range(0..=i);
        items.swap(i, j);
    }
}

/// Shuffles the cards `times` times with the same generator
pub fn shuffle_n_times<T, R: Rng + ?Sized>(cards: &mut [T], times: u32, rng: &mut R) {
    for _ in 0..times {
        fisher_yates(cards, rng);
    }
}

/// Takes the top eight cards, flipping each with probability one half when allowed
pub fn draw_eight<R: Rng + ?Sized>(
    cards: &[Card],
    rng: &mut R,
    allow_reversed: bool,
) -> Result<Vec<DrawnCard>, ReadingError> {
    if cards.len() < DRAW_COUNT {
        return Err(ReadingError::NotEnoughCards {
            needed: DRAW_COUNT,
            available: cards.len(),
        });
    }

    Ok(cards[..DRAW_COUNT]
        .iter()
        .enumerate()
        .map(|(idx, card)| DrawnCard {
            position: idx as i32 + 1,
            is_reversed: allow_reversed && rng.random::<f64>() < REVERSED_PROBABILITY,
            card: card.clone(),
        })
        .collect())
}

/// Builds a generator from an optional seed, using OS entropy without one
pub fn rng_from_seed(seed: Option<i64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed as u64),
        None => StdRng::from_os_rng(),
    }
}

/// Runs the split, merge, shuffle and draw ritual
///
/// The same `seed` with the same deck and options always yields the same
/// spread.
pub fn create_reading(
    cards: &[Card],
    order: &[GroupOrder],
    shuffle_times: u32,
    seed: Option<i64>,
    allow_reversed: bool,
) -> Result<Vec<DrawnCard>, ReadingError> {
    if cards.len() < DRAW_COUNT {
        return Err(ReadingError::NotEnoughCards {
            needed: DRAW_COUNT,
            available: cards.len(),
        });
    }

    let mut rng = rng_from_seed(seed);
    let groups = split_into_three_groups(cards)?;
    let mut merged = merge_by_order(&groups, order);
    shuffle_n_times(&mut merged, shuffle_times, &mut rng);
    draw_eight(&merged, &mut rng, allow_reversed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::sample_cards;

    #[test]
    fn test_split_equal_thirds() {
        let cards: Vec<i32> = (0..78).collect();
        let [a, b, c] = split_into_three_groups(&cards).unwrap();
        assert_eq!((a.len(), b.len(), c.len()), (26, 26, 26));
        assert_eq!(a[0], 0);
        assert_eq!(b[0], 26);
        assert_eq!(c[0], 52);
    }

    #[test]
    fn test_split_remainder_goes_last() {
        let cards: Vec<i32> = (0..10).collect();
        let [a, b, c] = split_into_three_groups(&cards).unwrap();
        assert_eq!((a.len(), b.len(), c.len()), (3, 3, 4));
    }

    #[test]
    fn test_split_too_small() {
        assert_eq!(
            split_into_three_groups(&[1, 2][..]),
            Err(ReadingError::NotEnoughCards { needed: 3, available: 2 })
        );
    }

    #[test]
    fn test_merge_by_order() {
        let groups = [vec![1, 2], vec![3, 4], vec![5, 6]];
        let merged = merge_by_order(&groups, &[GroupOrder::C, GroupOrder::A, GroupOrder::B]);
        assert_eq!(merged, vec![5, 6, 1, 2, 3, 4]);
    }

    #[test]
    fn test_create_reading_needs_eight_cards() {
        let cards = sample_cards(7);
        assert_eq!(
            create_reading(&cards, &GroupOrder::ALL, 1, Some(1), true),
            Err(ReadingError::NotEnoughCards { needed: 8, available: 7 })
        );
    }

    #[test]
    fn test_create_reading_positions() {
        let cards = sample_cards(78);
        let drawn = create_reading(&cards, &GroupOrder::ALL, 3, Some(42), true).unwrap();
        let positions: Vec<i32> = drawn.iter().map(|d| d.position).collect();
        assert_eq!(positions, (1..=8).collect::<Vec<_>>());
    }

    #[test]
    fn test_seeded_reading_is_deterministic() {
        let cards = sample_cards(78);
        let order = [GroupOrder::B, GroupOrder::C, GroupOrder::A];
        let first = create_reading(&cards, &order, 5, Some(7), true).unwrap();
        let second = create_reading(&cards, &order, 5, Some(7), true).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_no_reversal_when_disallowed() {
        let cards = sample_cards(78);
        for seed in 0..20 {
            let drawn = create_reading(&cards, &GroupOrder::ALL, 2, Some(seed), false).unwrap();
            assert!(drawn.iter().all(|d| !d.is_reversed));
        }
    }

    #[test]
    fn test_negative_seed_is_accepted() {
        let cards = sample_cards(20);
        let a = create_reading(&cards, &GroupOrder::ALL, 1, Some(-5), true).unwrap();
        let b = create_reading(&cards, &GroupOrder::ALL, 1, Some(-5), true).unwrap();
        assert_eq!(a, b);
    }
}

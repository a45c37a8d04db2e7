//! Static round-robin assignment of pictures to ranks.

/// Picture indices owned by `rank`: `rank, rank + size, rank + 2 * size, ...`
/// below `count`.
pub fn assigned_indices(rank: usize, size: usize, count: usize) -> impl Iterator<Item = usize> {
    // A zero-sized group owns nothing rather than looping forever.
    let step = size.max(1);
    let start = if size == 0 { count } else { rank };
    (start..count).step_by(step)
}

/// Rank owning picture `index`, or `None` for an empty group.
pub fn owner_of(index: usize, size: usize) -> Option<usize> {
    index.checked_rem(size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_robin_assignment() {
        assert_eq!(assigned_indices(1, 3, 8).collect::<Vec<_>>(), vec![1, 4, 7]);
        assert_eq!(assigned_indices(0, 1, 3).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(assigned_indices(5, 8, 3).count(), 0);
    }

    #[test]
    fn test_empty_group_owns_nothing() {
        assert_eq!(assigned_indices(0, 0, 5).count(), 0);
        assert_eq!(owner_of(3, 0), None);
        assert_eq!(owner_of(7, 3), Some(1));
    }

    #[test]
    fn test_assignments_are_disjoint_and_cover_every_picture() {
        for size in 1..=6 {
            for count in 0..=20 {
                let mut seen = vec![0usize; count];
                for rank in 0..size {
                    for index in assigned_indices(rank, size, count) {
                        assert_eq!(owner_of(index, size), Some(rank));
                        seen[index] += 1;
                    }
                }
                assert!(seen.iter().all(|&hits| hits == 1), "size {size}, count {count}");
            }
        }
    }
}

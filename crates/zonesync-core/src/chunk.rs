//! Batch partitioning

/// Default ceiling for one sub-batch.
pub const DEFAULT_CHUNK_SIZE: usize = 200;

/// Split `items` into consecutive chunks of at most `max_size` items.
///
/// Order is preserved and empty input yields no chunks. A `max_size` of zero
/// is treated as one.
pub fn chunk<T>(items: Vec<T>, max_size: usize) -> Vec<Vec<T>> {
    let max_size = max_size.max(1);
    let mut chunks = Vec::with_capacity(items.len().div_ceil(max_size));
    let mut current = Vec::with_capacity(max_size.min(items.len()));

    for item in items {
        current.push(item);
        if current.len() == max_size {
            chunks.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn splits_at_the_ceiling() {
        let items = (1..=450).collect::<Vec<_>>();
        let chunks = chunk(items, 200);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], (1..=200).collect::<Vec<_>>());
        assert_eq!(chunks[1], (201..=400).collect::<Vec<_>>());
        assert_eq!(chunks[2], (401..=450).collect::<Vec<_>>());
    }

    #[test]
    fn empty_input_has_no_chunks() {
        assert!(chunk(Vec::<u8>::new(), 200).is_empty());
    }

    #[test]
    fn exact_multiple_has_no_trailing_chunk() {
        let chunks = chunk((0..400).collect(), 200);
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|chunk| chunk.len() == 200));
    }

    #[test]
    fn zero_ceiling_behaves_as_one() {
        assert_eq!(chunk(vec!['a', 'b'], 0), vec![vec!['a'], vec!['b']]);
    }
}

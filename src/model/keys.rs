//! Key generation for seeding the initial region layout, and split key synthesis.

use bytes::Bytes;
use rand::Rng;
use std::collections::BTreeSet;

const KEY_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
pub const KEY_LEN: usize = 10;

// An open end key behaves like an infinite run of this char.
const HIGH_SENTINEL: u8 = b'z';
// An exhausted start key is treated as this char where possible.
const LOW_SENTINEL: u8 = b'a';
const MID_CHAR: u8 = (b'a' + b'z') / 2;

/// Generate `count` unique keys of `KEY_LEN` chars from a 26 char alphabet, sorted ascending.
pub fn generate_keys<R: Rng>(count: usize, rng: &mut R) -> Vec<Bytes> {
    let mut keys = BTreeSet::new();
    while keys.len() < count {
        let key: Vec<u8> = (0..KEY_LEN)
            .map(|_| KEY_CHARS[rng.gen_range(0..KEY_CHARS.len())])
            .collect();
        keys.insert(key);
    }

    keys.into_iter().map(Bytes::from).collect()
}

/// Turn N sorted split keys into the N+1 ranges that partition the whole key space. The first
/// range has an empty start, the last an empty end.
pub fn partition(sorted_keys: &[Bytes]) -> Vec<(Bytes, Bytes)> {
    let mut ranges = Vec::with_capacity(sorted_keys.len() + 1);
    let mut start = Bytes::new();
    for key in sorted_keys {
        ranges.push((start, key.clone()));
        start = key.clone();
    }
    ranges.push((start, Bytes::new()));

    ranges
}

/// Synthesize a key strictly inside `(start, end)` by char-wise midpoint. An empty `end` is
/// unbounded. Returns None when no key exists between the two (e.g. `end == start + [0]`) or when
/// the range is empty.
pub fn split_key(start: &[u8], end: &[u8]) -> Option<Bytes> {
    if end.is_empty() {
        return Some(Bytes::from(above(start)));
    }
    if start >= end {
        return None;
    }

    let mut key = Vec::with_capacity(start.len() + 1);
    let mut i = 0;
    while i < start.len() && start[i] == end[i] {
        key.push(start[i]);
        i += 1;
    }
    // `start < end`, so `end` is strictly longer than the shared prefix.
    let e = end[i];

    match start.get(i) {
        None => {
            let low = if e > LOW_SENTINEL { LOW_SENTINEL } else { 0 };
            let c = midpoint(low, e);
            key.push(c);
            if c < e || end.len() > i + 1 {
                Some(Bytes::from(key))
            } else {
                None
            }
        }
        Some(&s) => {
            let c = midpoint(s, e);
            if c > s {
                key.push(c);
            } else {
                // Adjacent chars: keep `s`, anything after it stays below `end`.
                key.push(s);
                key.extend(above(&start[i + 1..]));
            }
            Some(Bytes::from(key))
        }
    }
}

/// Smallest-effort key strictly greater than `tail`, with no upper bound.
fn above(tail: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(tail.len() + 1);
    for &s in tail {
        let c = midpoint(s, HIGH_SENTINEL);
        if c > s {
            key.push(c);
            return key;
        }
        key.push(s);
    }
    key.push(MID_CHAR);

    key
}

fn midpoint(a: u8, b: u8) -> u8 {
    ((a as u16 + b as u16) / 2) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn assert_strictly_inside(start: &[u8], end: &[u8]) {
        let key = split_key(start, end).expect("Non-degenerate range must yield a split key");
        assert!(key.as_ref() > start, "{:?} <= start {:?}", key, start);
        if !end.is_empty() {
            assert!(key.as_ref() < end, "{:?} >= end {:?}", key, end);
        }
    }

    #[test]
    fn generated_keys_are_sorted_unique_and_alphabetic() {
        let mut rng = StdRng::seed_from_u64(7);
        let keys = generate_keys(500, &mut rng);

        assert_eq!(500, keys.len());
        for pair in keys.windows(2) {
            assert!(pair[0] < pair[1]);
        }
        for key in &keys {
            assert_eq!(KEY_LEN, key.len());
            assert!(key.iter().all(|c| KEY_CHARS.contains(c)));
        }
    }

    #[test]
    fn key_generation_is_reproducible() {
        let a = generate_keys(20, &mut StdRng::seed_from_u64(1));
        let b = generate_keys(20, &mut StdRng::seed_from_u64(1));
        assert_eq!(a, b);
    }

    #[test]
    fn zero_keys_partition_into_one_unbounded_range() {
        let ranges = partition(&[]);
        assert_eq!(vec![(Bytes::new(), Bytes::new())], ranges);
    }

    #[test]
    fn partition_chains_keys() {
        let keys = vec![Bytes::from_static(b"c"), Bytes::from_static(b"m")];
        let ranges = partition(&keys);

        assert_eq!(3, ranges.len());
        assert_eq!((Bytes::new(), Bytes::from_static(b"c")), ranges[0]);
        assert_eq!((Bytes::from_static(b"c"), Bytes::from_static(b"m")), ranges[1]);
        assert_eq!((Bytes::from_static(b"m"), Bytes::new()), ranges[2]);
    }

    #[test]
    fn split_key_edge_cases() {
        assert_strictly_inside(b"", b"");
        assert_strictly_inside(b"", b"b");
        assert_strictly_inside(b"", b"a");
        assert_strictly_inside(b"a", b"b");
        assert_strictly_inside(b"ay", b"b");
        assert_strictly_inside(b"azzz", b"b");
        assert_strictly_inside(b"abc", b"abd");
        assert_strictly_inside(b"abc", b"abcd");
        assert_strictly_inside(b"zzzz", b"");
        assert_strictly_inside(b"", &[0, 0]);
        assert_strictly_inside(&[0xff, 0xff], b"");
    }

    #[test]
    fn split_key_midpoints_alphabet_chars() {
        assert_eq!(Bytes::from_static(b"m"), split_key(b"", b"").unwrap());
        assert_eq!(Bytes::from_static(b"c"), split_key(b"a", b"e").unwrap());
        // Open end uses 'z' as sentinel.
        assert_eq!(Bytes::from_static(b"m"), split_key(b"a", b"").unwrap());
    }

    #[test]
    fn split_key_degenerate_ranges() {
        assert_eq!(None, split_key(b"b", b"a"));
        assert_eq!(None, split_key(b"a", b"a"));
        assert_eq!(None, split_key(b"a", &[b'a', 0]));
    }

    #[test]
    fn split_key_is_strictly_inside_random_ranges() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..5_000 {
            let a = random_key(&mut rng);
            let b = random_key(&mut rng);
            let (start, end) = if a < b { (a, b) } else { (b, a) };
            if start == end {
                continue;
            }
            if let Some(key) = split_key(&start, &end) {
                assert!(key.as_ref() > start.as_slice());
                assert!(key.as_ref() < end.as_slice());
            } else {
                // Only possible when end is start followed by a single zero byte.
                let mut next = start.clone();
                next.push(0);
                assert_eq!(next, end);
            }
            assert_strictly_inside(&start, b"");
        }
    }

    fn random_key(rng: &mut StdRng) -> Vec<u8> {
        let len = rng.gen_range(0..6);
        (0..len)
            .map(|_| {
                if rng.gen_bool(0.8) {
                    KEY_CHARS[rng.gen_range(0..KEY_CHARS.len())]
                } else {
                    rng.gen()
                }
            })
            .collect()
    }
}

// ============================================================
// Layer 5 - Relative Position Buckets
// ============================================================
// T5 has no absolute position embeddings. Instead each
// attention head learns one scalar bias per "bucket" of
// key-minus-query offset:
//
//   - small offsets (< max_exact) each get their own bucket
//   - larger offsets share log-spaced buckets up to max_distance
//   - everything beyond max_distance lands in the last bucket
//
// The encoder is bidirectional: half the buckets are for keys
// after the query. The decoder is causal: only offsets into
// the past are distinguished, future offsets map to bucket 0.
//
// Reference: Raffel et al. (2020) T5 paper, §2.1

/// Bucket index for a single `key_pos - query_pos` offset.
pub fn relative_position_bucket(
    relative_position: i64,
    bidirectional:     bool,
    num_buckets:       usize,
    max_distance:      usize,
) -> i64 {
    let mut num_buckets = num_buckets as i64;
    let mut bucket = 0i64;

    let distance = if bidirectional {
        num_buckets /= 2;
        if relative_position > 0 {
            bucket += num_buckets;
        }
        relative_position.abs()
    } else {
        (-relative_position).max(0)
    };

    let max_exact = num_buckets / 2;
    if distance < max_exact {
        return bucket + distance;
    }

    // Log-spaced region, computed in f32 so bucket edges match the pretrained weights.
    let log_ratio = (distance as f32 / max_exact as f32).ln()
        / (max_distance as f32 / max_exact as f32).ln();
    let large = max_exact + (log_ratio * (num_buckets - max_exact) as f32) as i64;
    bucket + large.min(num_buckets - 1)
}

/// Row-major `[query_len, key_len]` bucket grid for one attention call.
pub fn relative_position_buckets(
    query_len:     usize,
    key_len:       usize,
    bidirectional: bool,
    num_buckets:   usize,
    max_distance:  usize,
) -> Vec<i64> {
    let mut out = Vec::with_capacity(query_len * key_len);
    for q in 0..query_len as i64 {
        for k in 0..key_len as i64 {
            out.push(relative_position_bucket(k - q, bidirectional, num_buckets, max_distance));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enc(rel: i64) -> i64 { relative_position_bucket(rel, true, 32, 128) }
    fn dec(rel: i64) -> i64 { relative_position_bucket(rel, false, 32, 128) }

    #[test]
    fn test_bidirectional_exact_region() {
        assert_eq!(enc(0), 0);
        assert_eq!(enc(-1), 1);
        assert_eq!(enc(-7), 7);
        assert_eq!(enc(1), 17);
        assert_eq!(enc(7), 23);
    }

    #[test]
    fn test_bidirectional_log_region() {
        assert_eq!(enc(8), 24);
        assert_eq!(enc(-8), 8);
        // ln(200/8) / ln(128/8) * 8 = 9.28 → 17, clamped to 15
        assert_eq!(enc(-200), 15);
        assert_eq!(enc(200), 31);
    }

    #[test]
    fn test_causal_ignores_future_offsets() {
        assert_eq!(dec(0), 0);
        assert_eq!(dec(5), 0);
        assert_eq!(dec(-3), 3);
        assert_eq!(dec(-15), 15);
        // 16 + ln(20/16) / ln(128/16) * 16 = 17.7 → 17
        assert_eq!(dec(-20), 17);
        assert_eq!(dec(-1000), 31);
    }

    #[test]
    fn test_buckets_are_monotone_with_distance() {
        let mut last = 0;
        for d in 0..300 {
            let b = dec(-d);
            assert!(b >= last);
            last = b;
        }
    }

    #[test]
    fn test_grid_layout_is_row_major() {
        let grid = relative_position_buckets(2, 3, true, 32, 128);
        // query 0: keys at offsets 0, +1, +2; query 1: offsets -1, 0, +1
        assert_eq!(grid, vec![0, 17, 18, 1, 0, 17]);
    }
}

use topichub_core::types::Document;

/// Sizes of `k` contiguous groups covering `n` items; the first `n % k`
/// groups take one extra item.
pub fn split_sizes(n: usize, k: usize) -> Vec<usize> {
    if k == 0 {
        return Vec::new();
    }
    let (base, extra) = (n / k, n % k);
    (0..k).map(|i| base + usize::from(i < extra)).collect()
}

/// Orders `members` (indices into `docs`) by ascending `x`, then cuts the
/// ordering into `k` near-equal contiguous groups. Ties on `x` fall back to
/// `y`, then document id, so the outcome never depends on input order.
pub fn partition_by_x(docs: &[Document], mut members: Vec<usize>, k: usize) -> Vec<Vec<usize>> {
    members.sort_by(|a, b| {
        let (da, db) = (&docs[*a], &docs[*b]);
        da.x.total_cmp(&db.x)
            .then_with(|| da.y.total_cmp(&db.y))
            .then_with(|| da.id.cmp(&db.id))
    });
    let mut groups = Vec::with_capacity(k);
    let mut rest = members.as_slice();
    for size in split_sizes(rest.len(), k) {
        let (head, tail) = rest.split_at(size);
        groups.push(head.to_vec());
        rest = tail;
    }
    groups
}

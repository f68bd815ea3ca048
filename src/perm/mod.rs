//! Permutation and axis algebra
//!
//! Pure, total functions on integer permutations and axis lists. Everything
//! the rewrite engine does to `perm`/`axes` attributes is expressed here;
//! the functions never touch the graph.

/// Returns whether `perm` contains each value in `[0, perm.len())` exactly once.
pub fn is_valid_perm(perm: &[i64]) -> bool {
    let rank = perm.len();
    let mut used = vec![false; rank];
    for &p in perm {
        if p < 0 || p >= rank as i64 || used[p as usize] {
            return false;
        }
        used[p as usize] = true;
    }
    true
}

/// Computes the inverse permutation: `invert(p)[p[i]] = i`.
/// Unsafe if `perm` is not a valid permutation.
pub fn invert(perm: &[i64]) -> Vec<i64> {
    let mut inv = vec![0i64; perm.len()];
    for (i, &p) in perm.iter().enumerate() {
        inv[p as usize] = i as i64;
    }
    inv
}

/// Composes two permutations: `compose(a, b)[i] = a[b[i]]`.
/// Unsafe if either argument is not a valid permutation.
pub fn compose(a: &[i64], b: &[i64]) -> Vec<i64> {
    b.iter().map(|&i| a[i as usize]).collect()
}

/// Returns true if `perm[i] == i` everywhere.
pub fn is_identity(perm: &[i64]) -> bool {
    perm.iter().enumerate().all(|(i, &p)| p == i as i64)
}

/// Permutation from channel-last to channel-first ordering of the given rank:
/// `[0, r-1, 1, 2, ..., r-2]`. Rank must be >= 1.
pub fn channel_last_to_first(rank: usize) -> Vec<i64> {
    let mut p = Vec::with_capacity(rank);
    p.push(0);
    if rank > 1 {
        p.push(rank as i64 - 1);
        for i in 2..rank {
            p.push(i as i64 - 1);
        }
    }
    p
}

/// Adds `rank` to a negative axis and checks the result is in `[0, rank)`.
pub fn normalize_axis(axis: i64, rank: usize) -> Option<i64> {
    let rank = rank as i64;
    let axis = if axis < 0 { axis + rank } else { axis };
    (axis >= 0 && axis < rank).then_some(axis)
}

/// Adds `rank` to negative axes and checks that all axes are unique and
/// within `[0, rank)`. Returns the normalized list or `None` if invalid.
pub fn normalize_axes(axes: &[i64], rank: usize) -> Option<Vec<i64>> {
    let mut used = vec![false; rank];
    let mut out = Vec::with_capacity(axes.len());
    for &a in axes {
        let a = normalize_axis(a, rank)?;
        if used[a as usize] {
            return None;
        }
        used[a as usize] = true;
        out.push(a);
    }
    Some(out)
}

/// Inserts 1s into `shape` at the positions listed in `axes`. Axes index the
/// *output* shape. Unsafe if axes are negative, duplicated, or out of range.
pub fn unsqueeze_shape(shape: &[i64], axes: &[i64]) -> Vec<i64> {
    let new_rank = shape.len() + axes.len();
    let mut inserted = vec![false; new_rank];
    for &a in axes {
        inserted[a as usize] = true;
    }
    let mut out = Vec::with_capacity(new_rank);
    let mut old = shape.iter();
    for flag in inserted {
        if flag {
            out.push(1);
        } else if let Some(&d) = old.next() {
            out.push(d);
        }
    }
    out
}

/// Computes the permutation of the unsqueezed tensor: inserted 1-axes stay in
/// place and the remaining axes are reordered the way `perm` reordered the
/// original axes.
///
/// Ex: perm = [2, 0, 1] maps [A, B, C] -> [C, A, B]. With axes = [0, 3] the
/// result is [0, 4, 1, 3, 2], mapping [1, A, B, 1, C] -> [1, C, A, 1, B].
pub fn unsqueeze_perm(axes: &[i64], perm: &[i64]) -> Vec<i64> {
    let new_rank = perm.len() + axes.len();
    let mut is_added = vec![false; new_rank];
    for &a in axes {
        is_added[a as usize] = true;
    }

    // Map old axis indices to their new positions.
    let mut axes_map = Vec::with_capacity(perm.len());
    for (i, added) in is_added.iter().enumerate() {
        if !added {
            axes_map.push(i as i64);
        }
    }

    let mut new_perm = Vec::with_capacity(new_rank);
    let mut j = 0;
    for (i, added) in is_added.iter().enumerate() {
        if *added {
            new_perm.push(i as i64);
        } else {
            new_perm.push(axes_map[perm[j] as usize]);
            j += 1;
        }
    }
    new_perm
}

/// Computes the permutation of the squeezed tensor: entries of `perm` whose
/// axis is removed disappear and the remainder is re-indexed monotonically.
/// Result has length `perm.len() - axes.len()`.
pub fn squeeze_perm(axes: &[i64], perm: &[i64]) -> Vec<i64> {
    let mut is_removed = vec![false; perm.len()];
    for &a in axes {
        is_removed[a as usize] = true;
    }

    let mut axes_map = vec![0i64; perm.len()];
    let mut j = 0;
    for (i, removed) in is_removed.iter().enumerate() {
        if !removed {
            axes_map[i] = j;
            j += 1;
        }
    }

    let mut new_perm = Vec::with_capacity(perm.len() - axes.len());
    for &p in perm {
        if !is_removed[p as usize] {
            new_perm.push(axes_map[p as usize]);
        }
    }
    new_perm
}

/// New `axes` list for an input permuted by `perm`, order preserved:
/// `axes'[k] = perm[axes[k]]`.
///
/// Ex: perm = [2, 0, 1], axes = [0, 1] -> [2, 0]
pub fn axes_for_transposed_input(axes: &[i64], perm: &[i64]) -> Vec<i64> {
    axes.iter().map(|&a| perm[a as usize]).collect()
}

/// Same set of axes as [`axes_for_transposed_input`] but sorted ascending,
/// for operators that treat axes as a set (reductions, squeeze).
///
/// Ex: perm = [2, 0, 1], axes = [0, 1] -> [0, 2]
pub fn sorted_axes_for_transposed_input(axes: &[i64], perm: &[i64]) -> Vec<i64> {
    let rank = perm.len();
    let mut include = vec![false; rank];
    for &a in axes {
        include[perm[a as usize] as usize] = true;
    }
    (0..rank as i64).filter(|&a| include[a as usize]).collect()
}

/// Reorders a `Pad`-style pads list (`[start_0..start_{r-1}, end_0..end_{r-1}]`)
/// so both halves follow `perm`.
pub fn permute_pads(pads: &[i64], perm: &[i64]) -> Vec<i64> {
    let rank = perm.len();
    let mut out = Vec::with_capacity(rank * 2);
    for &i in perm {
        out.push(pads[i as usize]);
    }
    for &i in perm {
        out.push(pads[i as usize + rank]);
    }
    out
}

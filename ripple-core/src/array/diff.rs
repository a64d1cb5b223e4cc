//! Edit scripts between ordered collections
//!
//! [`diff`] computes a shortest edit script with Myers' O(ND) algorithm,
//! after trimming the common prefix and suffix, which covers the usual
//! single insert or single delete without touching the quadratic part.
//!
//! Items are compared with a caller-supplied equality. There is no move
//! operation: an item that changes position is removed and added again.
//!
//! The script lists all removals first, in ascending order with indices
//! valid when applied one after the other, then all additions, in ascending
//! order of their final position. [`apply_patch`] applies it to a shadow
//! vector kept parallel to the collection.

use serde::{Deserialize, Serialize};

/// One step of an edit script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PatchOp<T> {
    /// Remove `count` entries starting at `index`.
    Remove { index: usize, count: usize },
    /// Insert `items` so the first lands at `index`.
    Add { index: usize, items: Vec<T> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edit {
    Keep,
    Delete(usize),
    Insert(usize),
}

/// Compute the edit script turning `old` into `new`.
///
/// # Example
///
/// ```rust
/// use ripple_core::array::{diff, PatchOp};
///
/// let patch = diff(&["a", "b", "c"], &["a", "c", "d"], |x, y| x == y);
/// assert_eq!(
///     patch,
///     vec![
///         PatchOp::Remove { index: 1, count: 1 },
///         PatchOp::Add { index: 2, items: vec!["d"] },
///     ]
/// );
/// ```
pub fn diff<T, E>(old: &[T], new: &[T], eq: E) -> Vec<PatchOp<T>>
where
    T: Clone,
    E: Fn(&T, &T) -> bool,
{
    let prefix = old
        .iter()
        .zip(new)
        .take_while(|(a, b)| eq(*a, *b))
        .count();
    let suffix = old[prefix..]
        .iter()
        .rev()
        .zip(new[prefix..].iter().rev())
        .take_while(|(a, b)| eq(*a, *b))
        .count();

    let a = &old[prefix..old.len() - suffix];
    let b = &new[prefix..new.len() - suffix];

    let mut removed = Vec::new();
    let mut added = Vec::new();
    for edit in shortest_edit(a, b, &eq) {
        match edit {
            Edit::Keep => {}
            Edit::Delete(i) => removed.push(prefix + i),
            Edit::Insert(j) => added.push(prefix + j),
        }
    }

    let mut patch = Vec::new();
    let mut shift = 0;
    for (start, count) in runs(&removed) {
        patch.push(PatchOp::Remove {
            index: start - shift,
            count,
        });
        shift += count;
    }
    for (start, count) in runs(&added) {
        patch.push(PatchOp::Add {
            index: start,
            items: new[start..start + count].to_vec(),
        });
    }
    patch
}

/// Apply `patch` to `shadow`, creating entries for added items with
/// `on_add`. Removed entries are dropped in patch order.
///
/// # Panics
///
/// Panics if an index in `patch` is out of range for `shadow`, which cannot
/// happen for a script produced by [`diff`] from the collection `shadow`
/// mirrors.
pub fn apply_patch<T, S>(shadow: &mut Vec<S>, patch: &[PatchOp<T>], mut on_add: impl FnMut(&T) -> S) {
    for op in patch {
        match op {
            PatchOp::Remove { index, count } => {
                shadow.drain(*index..*index + *count).for_each(drop);
            }
            PatchOp::Add { index, items } => {
                let tail = shadow.split_off(*index);
                shadow.extend(items.iter().map(&mut on_add));
                shadow.extend(tail);
            }
        }
    }
}

/// Group ascending indices into `(start, len)` runs of consecutive values.
fn runs(indices: &[usize]) -> Vec<(usize, usize)> {
    let mut out: Vec<(usize, usize)> = Vec::new();
    for &i in indices {
        match out.last_mut() {
            Some((start, len)) if *start + *len == i => *len += 1,
            _ => out.push((i, 1)),
        }
    }
    out
}

fn shortest_edit<T, E>(a: &[T], b: &[T], eq: &E) -> Vec<Edit>
where
    E: Fn(&T, &T) -> bool,
{
    let n = a.len() as isize;
    let m = b.len() as isize;
    let max = n + m;
    if max == 0 {
        return Vec::new();
    }

    // Furthest x reached on each diagonal k = x - y, one snapshot per d
    let idx = |k: isize| (k + max) as usize;
    let mut v = vec![0isize; 2 * max as usize + 2];
    let mut trace = Vec::new();

    'search: for d in 0..=max {
        trace.push(v.clone());
        let mut k = -d;
        while k <= d {
            let mut x = if k == -d || (k != d && v[idx(k - 1)] < v[idx(k + 1)]) {
                v[idx(k + 1)]
            } else {
                v[idx(k - 1)] + 1
            };
            let mut y = x - k;
            while x < n && y < m && eq(&a[x as usize], &b[y as usize]) {
                x += 1;
                y += 1;
            }
            v[idx(k)] = x;
            if x >= n && y >= m {
                break 'search;
            }
            k += 2;
        }
    }

    let mut edits = Vec::new();
    let (mut x, mut y) = (n, m);
    for (d, v) in trace.iter().enumerate().rev() {
        let d = d as isize;
        let k = x - y;
        let prev_k = if k == -d || (k != d && v[idx(k - 1)] < v[idx(k + 1)]) {
            k + 1
        } else {
            k - 1
        };
        let prev_x = v[idx(prev_k)];
        let prev_y = prev_x - prev_k;

        while x > prev_x && y > prev_y {
            edits.push(Edit::Keep);
            x -= 1;
            y -= 1;
        }
        if d > 0 {
            if x == prev_x {
                edits.push(Edit::Insert((y - 1) as usize));
            } else {
                edits.push(Edit::Delete((x - 1) as usize));
            }
        }
        x = prev_x;
        y = prev_y;
    }
    edits.reverse();
    edits
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eq(a: &char, b: &char) -> bool {
        a == b
    }

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    fn patched(old: &str, new: &str) -> String {
        let (old, new) = (chars(old), chars(new));
        let mut shadow = old.clone();
        apply_patch(&mut shadow, &diff(&old, &new, eq), |c| *c);
        shadow.into_iter().collect()
    }

    #[test]
    fn identical_inputs_give_empty_patch() {
        assert!(diff(&chars("abc"), &chars("abc"), eq).is_empty());
        assert!(diff::<char, _>(&[], &[], eq).is_empty());
    }

    #[test]
    fn single_removal_in_the_middle() {
        assert_eq!(
            diff(&chars("abc"), &chars("ac"), eq),
            vec![PatchOp::Remove { index: 1, count: 1 }]
        );
    }

    #[test]
    fn from_and_to_empty() {
        assert_eq!(
            diff(&[], &chars("xy"), eq),
            vec![PatchOp::Add {
                index: 0,
                items: chars("xy")
            }]
        );
        assert_eq!(
            diff(&chars("xy"), &[], eq),
            vec![PatchOp::Remove { index: 0, count: 2 }]
        );
    }

    #[test]
    fn reorder_is_remove_plus_add() {
        assert_eq!(
            diff(&chars("abc"), &chars("cab"), eq),
            vec![
                PatchOp::Remove { index: 2, count: 1 },
                PatchOp::Add {
                    index: 0,
                    items: vec!['c']
                },
            ]
        );
    }

    #[test]
    fn disjoint_replacement_removes_everything() {
        assert_eq!(
            diff(&chars("abc"), &chars("xyz"), eq),
            vec![
                PatchOp::Remove { index: 0, count: 3 },
                PatchOp::Add {
                    index: 0,
                    items: chars("xyz")
                },
            ]
        );
    }

    #[test]
    fn removal_indices_account_for_earlier_removals() {
        assert_eq!(
            diff(&chars("abcde"), &chars("bd"), eq),
            vec![
                PatchOp::Remove { index: 0, count: 1 },
                PatchOp::Remove { index: 1, count: 1 },
                PatchOp::Remove { index: 2, count: 1 },
            ]
        );
    }

    #[test]
    fn script_is_minimal() {
        let patch = diff(&chars("abcabba"), &chars("cbabac"), eq);
        let removed: usize = patch
            .iter()
            .map(|op| match op {
                PatchOp::Remove { count, .. } => *count,
                PatchOp::Add { .. } => 0,
            })
            .sum();
        let added: usize = patch
            .iter()
            .map(|op| match op {
                PatchOp::Add { items, .. } => items.len(),
                PatchOp::Remove { .. } => 0,
            })
            .sum();
        assert_eq!(removed + added, 5);
    }

    #[test]
    fn applying_the_patch_reproduces_the_target() {
        let cases = [
            ("abcabba", "cbabac"),
            ("kitten", "sitting"),
            ("abc", ""),
            ("", "abc"),
            ("aaaa", "aa"),
            ("abcdef", "fedcba"),
            ("xaxbxc", "abc"),
        ];
        for (old, new) in cases {
            assert_eq!(patched(old, new), new, "{old} -> {new}");
        }
    }

    #[test]
    fn custom_equality_keeps_matching_entries() {
        let old = vec![(1, "one"), (2, "two")];
        let new = vec![(1, "uno"), (2, "dos"), (3, "tres")];
        let patch = diff(&old, &new, |a, b| a.0 == b.0);
        assert_eq!(
            patch,
            vec![PatchOp::Add {
                index: 2,
                items: vec![(3, "tres")]
            }]
        );
    }

    #[test]
    fn patch_serializes_with_an_op_tag() {
        let op: PatchOp<u8> = PatchOp::Remove { index: 1, count: 2 };
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json, serde_json::json!({"op": "remove", "index": 1, "count": 2}));

        let op: PatchOp<u8> = serde_json::from_str(r#"{"op":"add","index":0,"items":[7]}"#).unwrap();
        assert_eq!(
            op,
            PatchOp::Add {
                index: 0,
                items: vec![7]
            }
        );
    }
}

//! Line-oriented text differencing
//!
//! Lines are aligned with the linear-space variant of Myers' algorithm. Every
//! maximal run of non-matching lines becomes a hunk printed removals first,
//! then additions, the same shape a zero-context unified diff has. Each hunk
//! is then read with a one-line lookahead: a removal directly followed by an
//! addition is a modification, any other removal is a deletion.
//!
//! Regions too far apart to align cheaply are reported as a single hunk.

use crate::core::ChangeEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edit<'a> {
    Equal,
    Delete(&'a str),
    Insert(&'a str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HunkLine<'a> {
    Removed(&'a str),
    Added(&'a str),
}

/// Half of the edit distance searched before a region is given up on and
/// reported as one removal run followed by one addition run.
const MAX_EDIT_COST: usize = 4096;

/// Compare two texts line by line. Entry contents are trimmed.
pub fn diff_lines(original: &str, new: &str) -> Vec<ChangeEntry> {
    let original_lines: Vec<&str> = original.lines().collect();
    let new_lines: Vec<&str> = new.lines().collect();

    hunks(&shortest_edit_script(&original_lines, &new_lines))
        .iter()
        .flat_map(|hunk| pair_hunk_lines(hunk))
        .collect()
}

/// Split the edit script into hunks, one per run of changes. Within a hunk
/// all removed lines precede all added lines.
fn hunks<'a>(edits: &[Edit<'a>]) -> Vec<Vec<HunkLine<'a>>> {
    let mut hunks = Vec::new();
    let mut removed = Vec::new();
    let mut added = Vec::new();

    for edit in edits.iter().chain(std::iter::once(&Edit::Equal)) {
        match edit {
            Edit::Delete(line) => removed.push(HunkLine::Removed(*line)),
            Edit::Insert(line) => added.push(HunkLine::Added(*line)),
            Edit::Equal if removed.is_empty() && added.is_empty() => {}
            Edit::Equal => {
                let mut hunk = std::mem::take(&mut removed);
                hunk.append(&mut added);
                hunks.push(hunk);
            }
        }
    }

    hunks
}

/// Pair the lines of a single hunk. Lines of different hunks never pair.
fn pair_hunk_lines(lines: &[HunkLine<'_>]) -> Vec<ChangeEntry> {
    let mut entries = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        match lines[i] {
            HunkLine::Added(content) => entries.push(ChangeEntry::Addition {
                content: content.trim().to_string(),
            }),
            HunkLine::Removed(old) => match lines.get(i + 1) {
                Some(HunkLine::Added(new)) => {
                    entries.push(ChangeEntry::Modification {
                        old: old.trim().to_string(),
                        new: new.trim().to_string(),
                    });
                    i += 1;
                }
                _ => entries.push(ChangeEntry::Deletion {
                    content: old.trim().to_string(),
                }),
            },
        }
        i += 1;
    }

    entries
}

/// Minimal edit script turning `a` into `b`, computed in linear space
fn shortest_edit_script<'a>(a: &[&'a str], b: &[&'a str]) -> Vec<Edit<'a>> {
    let mut edits = Vec::with_capacity(a.len().max(b.len()));
    diff_region(a, b, &mut edits);
    edits
}

fn diff_region<'a>(a: &[&'a str], b: &[&'a str], edits: &mut Vec<Edit<'a>>) {
    let prefix = common_prefix(a, b);
    edits.extend(std::iter::repeat(Edit::Equal).take(prefix));
    let (a, b) = (&a[prefix..], &b[prefix..]);

    let suffix = common_suffix(a, b);
    let (a, b) = (&a[..a.len() - suffix], &b[..b.len() - suffix]);

    if a.is_empty() {
        edits.extend(b.iter().map(|&line| Edit::Insert(line)));
    } else if b.is_empty() {
        edits.extend(a.iter().map(|&line| Edit::Delete(line)));
    } else {
        match middle_snake(a, b) {
            Some((x, y)) if (x, y) != (0, 0) && (x, y) != (a.len(), b.len()) => {
                diff_region(&a[..x], &b[..y], edits);
                diff_region(&a[x..], &b[y..], edits);
            }
            _ => {
                edits.extend(a.iter().map(|&line| Edit::Delete(line)));
                edits.extend(b.iter().map(|&line| Edit::Insert(line)));
            }
        }
    }

    edits.extend(std::iter::repeat(Edit::Equal).take(suffix));
}

fn common_prefix(a: &[&str], b: &[&str]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

fn common_suffix(a: &[&str], b: &[&str]) -> usize {
    a.iter().rev().zip(b.iter().rev()).take_while(|(x, y)| x == y).count()
}

/// Furthest x reached on each diagonal k = x - y, indexed by k
struct Frontier {
    offset: isize,
    x: Vec<usize>,
}

impl Frontier {
    fn new(max_d: usize) -> Self {
        Self {
            offset: max_d as isize,
            x: vec![0; 2 * max_d + 1],
        }
    }
}

impl std::ops::Index<isize> for Frontier {
    type Output = usize;

    fn index(&self, k: isize) -> &usize {
        &self.x[(k + self.offset) as usize]
    }
}

impl std::ops::IndexMut<isize> for Frontier {
    fn index_mut(&mut self, k: isize) -> &mut usize {
        &mut self.x[(k + self.offset) as usize]
    }
}

/// Search forward from the start and backward from the end until the two
/// frontiers overlap. Returns the point where an optimal path crosses the
/// middle, or `None` once the search passes `MAX_EDIT_COST`. Both inputs
/// must be non-empty and differ in their first and last lines.
fn middle_snake(a: &[&str], b: &[&str]) -> Option<(usize, usize)> {
    let n = a.len();
    let m = b.len();
    let delta = n as isize - m as isize;
    let odd = delta & 1 != 0;
    let max_d = (n + m + 1) / 2 + 1;

    let mut forward = Frontier::new(max_d);
    // Measured from the end of both inputs
    let mut backward = Frontier::new(max_d);

    for d in 0..max_d.min(MAX_EDIT_COST) as isize {
        for k in (-d..=d).step_by(2) {
            let start = if k == -d || (k != d && forward[k - 1] < forward[k + 1]) {
                forward[k + 1]
            } else {
                forward[k - 1] + 1
            };
            let start_y = start as isize - k;
            let mut x = start;
            if x < n && start_y >= 0 && (start_y as usize) < m {
                x += common_prefix(&a[x..], &b[start_y as usize..]);
            }
            forward[k] = x;

            if odd
                && (k - delta).abs() < d
                && forward[k] + backward[delta - k] >= n
                && start <= n
                && (0..=m as isize).contains(&start_y)
            {
                return Some((start, start_y as usize));
            }
        }

        for k in (-d..=d).step_by(2) {
            let mut x = if k == -d || (k != d && backward[k - 1] < backward[k + 1]) {
                backward[k + 1]
            } else {
                backward[k - 1] + 1
            };
            let mut y = x as isize - k;
            if x < n && y >= 0 && (y as usize) < m {
                let slide = common_suffix(&a[..n - x], &b[..m - y as usize]);
                x += slide;
                y += slide as isize;
            }
            backward[k] = x;

            if !odd
                && (k - delta).abs() <= d
                && backward[k] + forward[delta - k] >= n
                && x <= n
                && (0..=m as isize).contains(&y)
            {
                return Some((n - x, m - y as usize));
            }
        }
    }

    None
}

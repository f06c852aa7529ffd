//! Random reviewer selection for new pull requests.

use crate::models::User;
use rand::seq::SliceRandom;
use rand::Rng;

/// Maximum number of reviewers assigned when a pull request is created.
pub const MAX_REVIEWERS: usize = 2;

/// Pick up to `max` distinct reviewer ids from `candidates`.
///
/// The candidates are shuffled (every permutation equally likely) and the
/// first `max` ids are kept. Repeated ids in the input count once. An empty
/// candidate list yields an empty selection.
///
/// The caller is expected to pass active team members other than the author;
/// no filtering happens here.
pub fn select_reviewers<R: Rng + ?Sized>(
    candidates: &[User],
    max: usize,
    rng: &mut R,
) -> Vec<String> {
    let mut ids: Vec<&str> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if !ids.contains(&candidate.id.as_str()) {
            ids.push(&candidate.id);
        }
    }

    ids.shuffle(rng);
    ids.truncate(max);

    ids.into_iter().map(str::to_owned).collect()
}

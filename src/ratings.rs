//! Feedback tallies per cluster.

use serde::{Deserialize, Serialize};

use crate::event::Rating;

/// Counts of each rating over a set of cluster members.
///
/// Serialized with the report's wire names: `good`, `bad`, `none`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingTally {
    /// Members rated helpful.
    #[serde(rename = "good")]
    pub helpful: usize,
    /// Members rated not helpful.
    #[serde(rename = "bad")]
    pub not_helpful: usize,
    /// Members without a rating.
    pub none: usize,
}

impl RatingTally {
    /// Count one rating.
    pub fn add(&mut self, rating: Rating) {
        match rating {
            Rating::Helpful => self.helpful += 1,
            Rating::NotHelpful => self.not_helpful += 1,
            Rating::Unrated => self.none += 1,
        }
    }

    /// Total number of members counted.
    pub fn total(&self) -> usize {
        self.helpful + self.not_helpful + self.none
    }
}

impl FromIterator<Rating> for RatingTally {
    fn from_iter<I: IntoIterator<Item = Rating>>(iter: I) -> Self {
        let mut tally = RatingTally::default();
        for rating in iter {
            tally.add(rating);
        }
        tally
    }
}

/// Tally ratings over all `member_count` members of a cluster.
///
/// `hydrated` holds the ratings of the members whose records could be loaded.
/// Members the store did not return count as unrated, so the tally always
/// sums to `member_count`.
pub fn tally_members(
    hydrated: impl IntoIterator<Item = Rating>,
    member_count: usize,
) -> RatingTally {
    let mut tally: RatingTally = hydrated.into_iter().take(member_count).collect();
    tally.none += member_count - tally.total();
    tally
}

//! Confidence and source filtering of inferred ratings

use super::parser::InferredRating;
use crate::catalog::SourceWhitelist;

/// Keep ratings whose confidence reaches `min_confidence` and whose source
/// is whitelisted. Input order is preserved; duplicates are kept.
pub fn filter_ratings(
    ratings: Vec<InferredRating>,
    min_confidence: f64,
    whitelist: &SourceWhitelist,
) -> Vec<InferredRating> {
    ratings
        .into_iter()
        .filter(|r| r.confidence >= min_confidence && whitelist.contains(&r.source_id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_confident_whitelisted_ratings_only() {
        let ratings = vec![
            InferredRating::new("gambero-rosso", "Tre Bicchieri", 0.9),
            InferredRating::new("unknown", "95", 0.95),
            InferredRating::new("veronelli", "3 stelle", 0.3),
        ];

        let kept = filter_ratings(ratings, 0.4, &SourceWhitelist::builtin());

        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].source_id, "gambero-rosso");
    }

    #[test]
    fn threshold_is_inclusive() {
        let ratings = vec![InferredRating::new("vivino", "4.1", 0.4)];
        assert_eq!(filter_ratings(ratings, 0.4, &SourceWhitelist::builtin()).len(), 1);
    }

    #[test]
    fn duplicates_survive_in_order() {
        let ratings = vec![
            InferredRating::new("decanter", "92", 0.7),
            InferredRating::new("decanter", "93", 0.8),
        ];
        let kept = filter_ratings(ratings.clone(), 0.5, &SourceWhitelist::builtin());
        assert_eq!(kept, ratings);
    }

    #[test]
    fn empty_result_is_valid() {
        let ratings = vec![InferredRating::new("blog", "10/10", 1.0)];
        assert!(filter_ratings(ratings, 0.0, &SourceWhitelist::builtin()).is_empty());
    }
}

use socialetl_core::{EngagementLevel, EngagementThresholds};

/// Bucket the known interaction count of a post.
///
/// Unknown counts add nothing, so a post with neither number known is `Low`.
#[must_use]
pub fn engagement_level(
    likes: Option<u64>,
    comments: Option<u64>,
    thresholds: &EngagementThresholds,
) -> EngagementLevel {
    let total = likes.unwrap_or(0).saturating_add(comments.unwrap_or(0));
    if total >= thresholds.viral {
        EngagementLevel::Viral
    } else if total >= thresholds.high {
        EngagementLevel::High
    } else if total >= thresholds.medium {
        EngagementLevel::Medium
    } else {
        EngagementLevel::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(total: u64) -> EngagementLevel {
        engagement_level(Some(total), None, &EngagementThresholds::default())
    }

    #[test]
    fn default_buckets() {
        assert_eq!(level(5), EngagementLevel::Low);
        assert_eq!(level(50), EngagementLevel::Medium);
        assert_eq!(level(500), EngagementLevel::High);
        assert_eq!(level(5000), EngagementLevel::Viral);
    }

    #[test]
    fn thresholds_are_inclusive_lower_bounds() {
        assert_eq!(level(9), EngagementLevel::Low);
        assert_eq!(level(10), EngagementLevel::Medium);
        assert_eq!(level(999), EngagementLevel::High);
        assert_eq!(level(1000), EngagementLevel::Viral);
    }

    #[test]
    fn likes_and_comments_add_up() {
        let t = EngagementThresholds::default();
        assert_eq!(engagement_level(Some(60), Some(40), &t), EngagementLevel::High);
    }

    #[test]
    fn unknown_counts_contribute_nothing() {
        let t = EngagementThresholds::default();
        assert_eq!(engagement_level(None, None, &t), EngagementLevel::Low);
        assert_eq!(engagement_level(None, Some(20), &t), EngagementLevel::Medium);
    }

    #[test]
    fn level_is_monotone_in_total() {
        let mut previous = EngagementLevel::Low;
        for total in (0..3000).step_by(7) {
            let current = level(total);
            assert!(current >= previous, "{total} dropped to {current}");
            previous = current;
        }
    }

    #[test]
    fn custom_thresholds_apply() {
        let t = EngagementThresholds {
            medium: 2,
            high: 3,
            viral: 4,
        };
        assert_eq!(engagement_level(Some(4), None, &t), EngagementLevel::Viral);
    }

    #[test]
    fn huge_counts_do_not_overflow() {
        let t = EngagementThresholds::default();
        assert_eq!(
            engagement_level(Some(u64::MAX), Some(u64::MAX), &t),
            EngagementLevel::Viral
        );
    }
}

use crate::metrics::domain::ReadinessTier;

/// Lower score bound of each tier, strictly descending. The first bound the score reaches wins.
pub const TIER_THRESHOLDS: [(u8, ReadinessTier); 4] = [
    (86, ReadinessTier::HighlyAttractive),
    (71, ReadinessTier::FundingReady),
    (41, ReadinessTier::Improving),
    (0, ReadinessTier::NotReady),
];

pub fn tier_for(score: u8) -> ReadinessTier {
    TIER_THRESHOLDS
        .iter()
        .find(|(floor, _)| score >= *floor)
        .map(|(_, tier)| *tier)
        .unwrap_or(ReadinessTier::NotReady)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_are_strictly_descending_and_end_at_zero() {
        assert!(TIER_THRESHOLDS
            .windows(2)
            .all(|pair| pair[0].0 > pair[1].0));
        assert_eq!(TIER_THRESHOLDS.last().map(|(floor, _)| *floor), Some(0));
    }

    #[test]
    fn boundaries_map_to_expected_tiers() {
        assert_eq!(tier_for(100), ReadinessTier::HighlyAttractive);
        assert_eq!(tier_for(86), ReadinessTier::HighlyAttractive);
        assert_eq!(tier_for(85), ReadinessTier::FundingReady);
        assert_eq!(tier_for(71), ReadinessTier::FundingReady);
        assert_eq!(tier_for(70), ReadinessTier::Improving);
        assert_eq!(tier_for(41), ReadinessTier::Improving);
        assert_eq!(tier_for(40), ReadinessTier::NotReady);
        assert_eq!(tier_for(0), ReadinessTier::NotReady);
    }

    #[test]
    fn tiers_never_improve_as_score_drops() {
        let rank = |tier: ReadinessTier| {
            TIER_THRESHOLDS
                .iter()
                .position(|(_, candidate)| *candidate == tier)
                .expect("tier listed")
        };
        for score in 1..=100u8 {
            assert!(rank(tier_for(score)) <= rank(tier_for(score - 1)));
        }
    }
}

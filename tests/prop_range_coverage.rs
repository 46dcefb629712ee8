// Property: chunk partition coverage
//
// For any start date, end date and chunk length, the generated chunks cover
// every second from the start of the first day to the end of the last day
// exactly once, in order, and only the last chunk may be shorter.

use amplify_logs::range_generator::{end_of_day, start_of_day, RangeGenerator};
use chrono::{Duration, NaiveDate};
use proptest::prelude::*;

fn date_strategy() -> impl Strategy<Value = NaiveDate> {
    // 2020-01-01 plus up to ~6 years
    (0i64..2200).prop_map(|offset| {
        NaiveDate::from_ymd_opt(2020, 1, 1).unwrap() + Duration::days(offset)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Chunks start at the first second of `start` and end at the last
    /// second of `end`, with every chunk starting one second after the
    /// previous one ends.
    #[test]
    fn prop_chunks_cover_interval(
        start in date_strategy(),
        length_days in 0i64..400,
        chunk_days in 1u32..60,
    ) {
        let end = start + Duration::days(length_days);
        let generator = RangeGenerator::new(chunk_days).unwrap();
        let chunks = generator.generate(start, end);

        prop_assert!(!chunks.is_empty());
        prop_assert_eq!(chunks[0].start, start_of_day(start));
        prop_assert_eq!(chunks[chunks.len() - 1].end, end_of_day(end));

        for pair in chunks.windows(2) {
            prop_assert_eq!(
                pair[0].end + Duration::seconds(1),
                pair[1].start,
                "Chunks must be adjacent without gaps or overlap"
            );
        }

        let covered: i64 = chunks.iter().map(|c| c.covered_seconds()).sum();
        prop_assert_eq!(covered, (length_days + 1) * 86_400);
    }

    /// Every chunk but the last spans exactly `chunk_days` days.
    #[test]
    fn prop_chunk_lengths(
        start in date_strategy(),
        length_days in 0i64..400,
        chunk_days in 1u32..60,
    ) {
        let end = start + Duration::days(length_days);
        let chunks = RangeGenerator::new(chunk_days).unwrap().generate(start, end);
        let full = i64::from(chunk_days) * 86_400;

        for chunk in &chunks[..chunks.len() - 1] {
            prop_assert_eq!(chunk.covered_seconds(), full);
        }
        prop_assert!(chunks[chunks.len() - 1].covered_seconds() <= full);

        let expected = (length_days + 1 + i64::from(chunk_days) - 1) / i64::from(chunk_days);
        prop_assert_eq!(chunks.len() as i64, expected);
    }

    /// A start date after the end date yields no chunks.
    #[test]
    fn prop_reversed_interval_is_empty(
        end in date_strategy(),
        gap in 1i64..400,
        chunk_days in 1u32..60,
    ) {
        let start = end + Duration::days(gap);
        let chunks = RangeGenerator::new(chunk_days).unwrap().generate(start, end);
        prop_assert!(chunks.is_empty());
    }
}

#[test]
fn test_single_day_single_chunk() {
    let day = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
    let chunks = RangeGenerator::new(14).unwrap().generate(day, day);

    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].api_start(), "2024-02-29T00:00:00Z");
    assert_eq!(chunks[0].api_end(), "2024-02-29T23:59:59Z");
}

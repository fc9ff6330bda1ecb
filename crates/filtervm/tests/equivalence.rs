//! Native standard filters against their interpreted reference programs.

mod common;

use common::{apply, interpreted, Outcome};
use filtervm::{FilterBlock, Program, StandardFilter};
use proptest::prelude::*;

fn both(filter: StandardFilter, block: &FilterBlock) -> (Outcome, Outcome) {
    let native = apply(Program::standard(filter), block);
    let reference = apply(interpreted(filter, true), block);
    (native, reference)
}

fn check(filter: StandardFilter, block: &FilterBlock) -> Result<(), TestCaseError> {
    let (native, reference) = both(filter, block);
    prop_assert_eq!(&native.output, &reference.output, "{} output", filter);
    prop_assert!(native.arena == reference.arena, "{} arena differs", filter);
    prop_assert_eq!(&native.carried, &reference.carried, "{} carried data", filter);
    Ok(())
}

fn x86_bytes() -> impl Strategy<Value = Vec<u8>> {
    let byte = prop_oneof![
        2 => Just(0xE8u8),
        1 => Just(0xE9u8),
        1 => Just(0x00u8),
        1 => Just(0xFFu8),
        6 => any::<u8>(),
    ];
    prop::collection::vec(byte, 0..1500)
}

fn channel_count() -> impl Strategy<Value = u32> {
    prop_oneof![
        8 => 0u32..10,
        1 => Just(u32::MAX),
        1 => any::<u32>(),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_e8_matches_reference(data in x86_bytes(), offset in 0u64..(1 << 32)) {
        let block = FilterBlock::new(data).at_offset(offset);
        check(StandardFilter::E8, &block)?;
    }

    #[test]
    fn prop_e8e9_matches_reference(data in x86_bytes(), offset in 0u64..(1 << 32)) {
        let block = FilterBlock::new(data).at_offset(offset);
        check(StandardFilter::E8E9, &block)?;
    }

    #[test]
    fn prop_itanium_matches_reference(
        data in prop::collection::vec(any::<u8>(), 0..1200),
        offset in any::<u32>(),
    ) {
        let block = FilterBlock::new(data).at_offset(u64::from(offset));
        check(StandardFilter::Itanium, &block)?;
    }

    #[test]
    fn prop_delta_matches_reference(
        data in prop::collection::vec(any::<u8>(), 0..1500),
        channels in channel_count(),
    ) {
        let block = FilterBlock::new(data).with_register(0, channels);
        check(StandardFilter::Delta, &block)?;
    }

    #[test]
    fn prop_rgb_matches_reference(
        data in prop::collection::vec(any::<u8>(), 0..900),
        width in 0u32..960,
        red_pos in 0u32..4,
    ) {
        let block = FilterBlock::new(data)
            .with_register(0, width)
            .with_register(1, red_pos);
        check(StandardFilter::Rgb, &block)?;
    }

    #[test]
    fn prop_audio_matches_reference(
        data in prop::collection::vec(any::<u8>(), 0..800),
        channels in channel_count(),
    ) {
        let block = FilterBlock::new(data).with_register(0, channels);
        check(StandardFilter::Audio, &block)?;
    }

    #[test]
    fn prop_upcase_matches_reference(
        data in prop::collection::vec(
            prop_oneof![2 => Just(2u8), 5 => 0x61u8..0x7B, 3 => any::<u8>()],
            0..1500,
        ),
    ) {
        check(StandardFilter::Upcase, &FilterBlock::new(data))?;
    }

    #[test]
    fn prop_optimizer_preserves_reference_programs(
        data in prop::collection::vec(any::<u8>(), 0..600),
        r0 in 0u32..12,
        r1 in 0u32..3,
        offset in any::<u32>(),
    ) {
        let block = FilterBlock::new(data)
            .with_register(0, r0)
            .with_register(1, r1)
            .at_offset(u64::from(offset));
        for filter in StandardFilter::ALL {
            let plain = apply(interpreted(filter, false), &block);
            let optimized = apply(interpreted(filter, true), &block);
            prop_assert!(plain == optimized, "{} differs after optimization", filter);
        }
    }
}

#[test]
fn test_rgb_realistic_image() {
    // 16x12 pixels, stride 48 bytes.
    let data: Vec<u8> = (0..16 * 12 * 3).map(|i| (i * 7 % 251) as u8).collect();
    for red_pos in 0..3 {
        let block = FilterBlock::new(data.clone())
            .with_register(0, 48 + 3)
            .with_register(1, red_pos);
        let (native, reference) = both(StandardFilter::Rgb, &block);
        assert_eq!(native.output.len(), data.len());
        assert_eq!(native, reference);
    }
}

#[test]
fn test_audio_long_stereo_block() {
    let data: Vec<u8> = (0..4096u32).map(|i| (i.wrapping_mul(2_654_435_761) >> 24) as u8).collect();
    let block = FilterBlock::new(data).with_register(0, 2);
    let (native, reference) = both(StandardFilter::Audio, &block);
    assert_eq!(native.output.len(), 4096);
    assert_eq!(native, reference);
}

#[test]
fn test_oversized_blocks_are_skipped_alike() {
    let data = vec![0x55u8; 0x1E000];
    for filter in [StandardFilter::Delta, StandardFilter::Upcase, StandardFilter::Rgb] {
        let block = FilterBlock::new(data.clone()).with_register(0, 4);
        let (native, reference) = both(filter, &block);
        assert_eq!(native, reference, "{filter}");
    }
}

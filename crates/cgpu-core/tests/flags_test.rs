//! Integration test: abstract flag sets and format encoding
//!
//! Run with: cargo test -p cgpu-core --test flags_test

use cgpu_core::flags::{ImageFormat, ImageUsage, SampleCount, SamplerAddressMode};

#[test]
fn test_format_raw_encoding() {
    assert_eq!(ImageFormat::from_raw(0), ImageFormat::Undefined);
    for format in ImageFormat::ALL {
        assert_eq!(ImageFormat::from_raw(format.raw()), *format);
    }
    assert_eq!(ImageFormat::from_raw(u32::MAX), ImageFormat::Undefined);
    assert_eq!(ImageFormat::from_raw(ImageFormat::ALL.len() as u32), ImageFormat::Undefined);
}

#[test]
fn test_transfer_only_usage() {
    assert!(ImageUsage::TRANSFER_SRC.is_transfer_only());
    assert!(ImageUsage::TRANSFER_DST.is_transfer_only());
    assert!(!(ImageUsage::TRANSFER_SRC | ImageUsage::TRANSFER_DST).is_transfer_only());
    assert!(!(ImageUsage::STORAGE | ImageUsage::TRANSFER_DST).is_transfer_only());
    assert!(!ImageUsage::SAMPLED.is_transfer_only());
}

#[test]
fn test_defaults() {
    assert_eq!(SampleCount::default().samples(), 1);
    assert_eq!(SampleCount::X16.samples(), 16);
    assert_eq!(SamplerAddressMode::default(), SamplerAddressMode::Repeat);
}

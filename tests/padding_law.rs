use proptest::prelude::*;
use update_app::block::{alignment_pad, write_block, BlockHeader, HEADER_LEN_BASE};
use update_app::decoder::{BlockStreamDecoder, Step};
use update_app::leading_pad::write_leading_pad;
use update_app::module_type::MODULE_TYPES;
use update_app::sink::CollectingSink;

fn arb_block() -> impl Strategy<Value = (usize, Vec<u8>, Vec<u8>)> {
    (
        0..MODULE_TYPES.len(),
        proptest::collection::vec(any::<u8>(), 0..16),
        proptest::collection::vec(any::<u8>(), 0..64),
    )
}

proptest! {
    #[test]
    fn pad_is_small_and_aligns(data_len in any::<u32>(), extra in any::<u32>()) {
        let pad = alignment_pad(data_len, extra);
        prop_assert!(pad <= 3);
        prop_assert_eq!((data_len as u64 + extra as u64 + pad as u64) % 4, 0);
    }

    #[test]
    fn every_decoded_block_obeys_padding_law(blocks in proptest::collection::vec(arb_block(), 0..8)) {
        let mut data = Vec::new();
        write_leading_pad(&mut data).unwrap();
        for (idx, extra, payload) in &blocks {
            let mut header = BlockHeader::for_module(MODULE_TYPES[*idx], payload.len() as u32);
            header.header_len = HEADER_LEN_BASE + extra.len() as u32;
            write_block(&mut data, &header, extra, payload).unwrap();
        }

        let mut decoder = BlockStreamDecoder::new(&data[..]);
        let mut sink = CollectingSink::with_payloads();
        let mut seen = 0;
        while let Step::Block(info) = decoder.step(&mut sink).unwrap() {
            prop_assert!(info.pad_len <= 3);
            prop_assert_eq!(
                (info.data_len as u64 + info.extra_header_len as u64 + info.pad_len as u64) % 4,
                0
            );
            seen += 1;
        }
        prop_assert_eq!(seen, blocks.len());
        prop_assert_eq!(decoder.offset(), data.len() as u64);

        for (got, (idx, extra, payload)) in sink.blocks.iter().zip(&blocks) {
            prop_assert_eq!(got.module_id.module_type(), Some(MODULE_TYPES[*idx]));
            prop_assert_eq!(got.extra_header_len, extra.len());
            prop_assert_eq!(got.payload.as_ref(), Some(payload));
        }
    }
}

//! Block read tests: trailer checksum verification across both engines,
//! corruption detection, truncated reads, and perf-counter accounting.

#[cfg(test)]
mod tests {
    use crate::checksum::ChecksumType;
    use crate::encoding::decode_fixed32;
    use crate::format::{BlockHandle, BLOCK_TRAILER_SIZE};
    use crate::options::ReadOptions;
    use crate::perf::{perf_context, reset_perf_context};
    use crate::read::read_block;
    use crate::read::tests::helpers::*;
    use crate::status::Status;

    const NO_COMPRESSION: u8 = 0;

    // ================================================================
    // 1. Verified reads
    // ================================================================

    /// # Scenario
    /// Block handle (0, 4), payload `01 02 03 04`, type byte 0, correct
    /// masked-CRC32C trailer.
    ///
    /// # Expected behavior
    /// The read succeeds and delivers payload + trailer.
    #[test]
    fn verified_read_round_trip() {
        init_tracing();

        let (image, handles) =
            build_table(&[(&[1u8, 2, 3, 4], NO_COMPRESSION)], ChecksumType::Crc32c);
        let reader = MemoryFileReader::new(image.clone());
        let footer = test_footer(ChecksumType::Crc32c);

        let slice = read_block(&reader, &footer, &ReadOptions::default(), &handles[0]).unwrap();
        assert_eq!(slice.len(), 4 + BLOCK_TRAILER_SIZE);
        assert_eq!(&slice.as_bytes()[..4], &[1, 2, 3, 4]);
        assert_eq!(slice.as_bytes(), &image[..4 + BLOCK_TRAILER_SIZE]);
    }

    #[test]
    fn xxhash_trailer_verifies() {
        init_tracing();

        let (image, handles) =
            build_table(&[(b"hello world", NO_COMPRESSION)], ChecksumType::XxHash32);
        let reader = MemoryFileReader::new(image);
        let footer = test_footer(ChecksumType::XxHash32);

        let slice = read_block(&reader, &footer, &ReadOptions::default(), &handles[0]).unwrap();
        assert_eq!(&slice.as_bytes()[..11], b"hello world");
    }

    #[test]
    fn second_block_in_file_is_addressable() {
        init_tracing();

        let (image, handles) = build_table(
            &[(b"first block", NO_COMPRESSION), (b"second block", NO_COMPRESSION)],
            ChecksumType::Crc32c,
        );
        let reader = MemoryFileReader::new(image);
        let footer = test_footer(ChecksumType::Crc32c);

        let slice = read_block(&reader, &footer, &ReadOptions::default(), &handles[1]).unwrap();
        assert_eq!(&slice.as_bytes()[..12], b"second block");
    }

    // ================================================================
    // 2. Corruption detection
    // ================================================================

    /// # Scenario
    /// Flip one bit of the payload while leaving the stored checksum
    /// intact; read twice, with and without verification.
    ///
    /// # Expected behavior
    /// Verified read fails with "block checksum mismatch"; unverified read
    /// returns the (corrupt) bytes successfully.
    #[test]
    fn bit_flip_detected_only_when_verifying() {
        init_tracing();

        let (mut image, handles) =
            build_table(&[(&[1u8, 2, 3, 4], NO_COMPRESSION)], ChecksumType::Crc32c);
        image[2] ^= 0x01;
        let reader = MemoryFileReader::new(image);
        let footer = test_footer(ChecksumType::Crc32c);

        let err = read_block(&reader, &footer, &ReadOptions::default(), &handles[0])
            .unwrap_err();
        assert!(err.is_corruption());
        assert_eq!(err.message(), Some("block checksum mismatch"));

        let relaxed = ReadOptions {
            verify_checksums: false,
            ..ReadOptions::default()
        };
        let slice = read_block(&reader, &footer, &relaxed, &handles[0]).unwrap();
        assert_eq!(&slice.as_bytes()[..4], &[1, 2, 3 ^ 1, 4]);
    }

    #[test]
    fn flipped_compression_type_byte_is_detected() {
        init_tracing();

        let (mut image, handles) =
            build_table(&[(b"payload", NO_COMPRESSION)], ChecksumType::Crc32c);
        image[7] ^= 0x04; // the type byte sits right after the payload
        let reader = MemoryFileReader::new(image);
        let footer = test_footer(ChecksumType::Crc32c);

        let err = read_block(&reader, &footer, &ReadOptions::default(), &handles[0])
            .unwrap_err();
        assert_eq!(err.message(), Some("block checksum mismatch"));
    }

    /// The footer may carry a checksum tag this build cannot verify.
    #[test]
    fn unknown_checksum_type_fails_verification() {
        init_tracing();

        let (image, handles) =
            build_table(&[(b"payload", NO_COMPRESSION)], ChecksumType::Crc32c);
        let reader = MemoryFileReader::new(image);
        let footer = test_footer(ChecksumType::NoChecksum);

        let err = read_block(&reader, &footer, &ReadOptions::default(), &handles[0])
            .unwrap_err();
        assert!(err.is_corruption());
        assert_eq!(err.message(), Some("unknown checksum type"));
    }

    // ================================================================
    // 3. Truncated reads
    // ================================================================

    /// A handle pointing past end-of-file yields fewer bytes than
    /// requested.
    #[test]
    fn short_delivery_is_truncated_block_read() {
        init_tracing();

        let (image, _) = build_table(&[(b"payload", NO_COMPRESSION)], ChecksumType::Crc32c);
        let reader = MemoryFileReader::new(image);
        let footer = test_footer(ChecksumType::Crc32c);

        let past_eof = BlockHandle::new(0, 4096);
        let err = read_block(&reader, &footer, &ReadOptions::default(), &past_eof)
            .unwrap_err();
        assert!(err.is_corruption());
        assert_eq!(err.message(), Some("truncated block read"));
    }

    #[test]
    fn reader_error_propagates_with_subcode() {
        init_tracing();

        let reader = FailingFileReader::new(Status::io_error_sub(
            crate::status::SubCode::StaleFile,
            "sst_0042",
        ));
        let footer = test_footer(ChecksumType::Crc32c);
        let err = read_block(
            &reader,
            &footer,
            &ReadOptions::default(),
            &BlockHandle::new(0, 4),
        )
        .unwrap_err();
        assert!(err.is_io_error());
        assert_eq!(err.subcode(), crate::status::SubCode::StaleFile);
    }

    // ================================================================
    // 4. Perf counters
    // ================================================================

    /// # Scenario
    /// One successful verified read, then one failing (truncated) read.
    ///
    /// # Expected behavior
    /// `block_read_count` and `block_read_byte` advance on both completion
    /// paths; byte counts reflect what the reader actually delivered.
    #[test]
    fn counters_update_on_every_completion_path() {
        init_tracing();
        reset_perf_context();

        let payload = b"counted payload";
        let (image, handles) =
            build_table(&[(payload, NO_COMPRESSION)], ChecksumType::Crc32c);
        let image_len = image.len();
        let reader = MemoryFileReader::new(image);
        let footer = test_footer(ChecksumType::Crc32c);

        read_block(&reader, &footer, &ReadOptions::default(), &handles[0]).unwrap();
        let after_success = perf_context();
        assert_eq!(after_success.block_read_count, 1);
        assert_eq!(
            after_success.block_read_byte,
            (payload.len() + BLOCK_TRAILER_SIZE) as u64
        );

        let past_eof = BlockHandle::new(0, 4096);
        let _ = read_block(&reader, &footer, &ReadOptions::default(), &past_eof);
        let after_failure = perf_context();
        assert_eq!(after_failure.block_read_count, 2);
        assert_eq!(
            after_failure.block_read_byte,
            after_success.block_read_byte + image_len as u64
        );
    }

    // ================================================================
    // 5. Trailer layout sanity
    // ================================================================

    /// The builder helper produces the exact on-disk trailer shape the
    /// reader consumes: `payload || ctype || fixed32 checksum`.
    #[test]
    fn trailer_layout_matches_reader_expectations() {
        let block = build_block(b"abc", 0x01, ChecksumType::XxHash32);
        assert_eq!(block.len(), 3 + BLOCK_TRAILER_SIZE);
        assert_eq!(block[3], 0x01);
        let stored = decode_fixed32(&block[4..]).unwrap();
        assert_eq!(
            stored,
            crate::checksum::xxhash32(&block[..4], 0),
            "checksum covers payload plus type byte"
        );
    }
}

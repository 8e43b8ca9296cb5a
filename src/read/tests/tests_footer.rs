//! Footer read-pipeline tests: locating the trailer at end-of-file, magic
//! enforcement, legacy files, and short files.

#[cfg(test)]
mod tests {
    use crate::checksum::ChecksumType;
    use crate::format::{
        BlockHandle, Footer, BLOCK_BASED_TABLE_MAGIC_NUMBER,
        LEGACY_BLOCK_BASED_TABLE_MAGIC_NUMBER, PLAIN_TABLE_MAGIC_NUMBER,
    };
    use crate::read::read_footer_from_file;
    use crate::read::tests::helpers::*;

    fn footer_with_handles() -> Footer {
        let mut footer = Footer::new(BLOCK_BASED_TABLE_MAGIC_NUMBER, 2);
        footer.set_metaindex_handle(BlockHandle::new(10, 20));
        footer.set_index_handle(BlockHandle::new(30, 40));
        footer
    }

    /// A file image: `body_len` bytes of filler followed by the footer.
    fn file_with_footer(footer: &Footer, body_len: usize) -> Vec<u8> {
        let mut image = vec![0xAB; body_len];
        footer.encode_to(&mut image);
        image
    }

    // ================================================================
    // 1. Locating and decoding
    // ================================================================

    #[test]
    fn reads_footer_from_end_of_large_file() {
        init_tracing();

        let footer = footer_with_handles();
        let image = file_with_footer(&footer, 4096);
        let reader = MemoryFileReader::new(image);

        let decoded = read_footer_from_file(&reader, reader.file_size(), 0).unwrap();
        assert_eq!(decoded, footer);
        assert_eq!(reader.read_count(), 1);
    }

    /// A file that is nothing but a 53-byte footer.
    #[test]
    fn reads_footer_from_minimal_file() {
        init_tracing();

        let footer = footer_with_handles();
        let image = file_with_footer(&footer, 0);
        let reader = MemoryFileReader::new(image);

        let decoded = read_footer_from_file(&reader, reader.file_size(), 0).unwrap();
        assert_eq!(decoded, footer);
    }

    /// A 48-byte legacy file: shorter than the current footer shape but a
    /// complete table trailer.
    #[test]
    fn reads_legacy_footer_from_48_byte_file() {
        init_tracing();

        let mut footer = Footer::new(LEGACY_BLOCK_BASED_TABLE_MAGIC_NUMBER, 0);
        footer.set_metaindex_handle(BlockHandle::new(1, 2));
        footer.set_index_handle(BlockHandle::new(3, 4));
        let image = file_with_footer(&footer, 0);
        assert_eq!(image.len(), Footer::VERSION0_ENCODED_LENGTH);

        let reader = MemoryFileReader::new(image);
        let decoded = read_footer_from_file(&reader, reader.file_size(), 0).unwrap();
        assert_eq!(decoded.table_magic_number(), BLOCK_BASED_TABLE_MAGIC_NUMBER);
        assert_eq!(decoded.version(), 0);
        assert_eq!(decoded.checksum(), ChecksumType::Crc32c);
    }

    // ================================================================
    // 2. Magic enforcement
    // ================================================================

    #[test]
    fn enforce_matching_magic_succeeds() {
        init_tracing();

        let footer = footer_with_handles();
        let reader = MemoryFileReader::new(file_with_footer(&footer, 100));
        let decoded = read_footer_from_file(
            &reader,
            reader.file_size(),
            BLOCK_BASED_TABLE_MAGIC_NUMBER,
        )
        .unwrap();
        assert_eq!(decoded.table_magic_number(), BLOCK_BASED_TABLE_MAGIC_NUMBER);
    }

    /// # Scenario
    /// The caller expects a plain-table file but the footer is block-based.
    ///
    /// # Expected behavior
    /// Corruption "Bad table magic number".
    #[test]
    fn enforce_mismatched_magic_fails() {
        init_tracing();

        let footer = footer_with_handles();
        let reader = MemoryFileReader::new(file_with_footer(&footer, 100));
        let err = read_footer_from_file(&reader, reader.file_size(), PLAIN_TABLE_MAGIC_NUMBER)
            .unwrap_err();
        assert!(err.is_corruption());
        assert_eq!(err.message(), Some("Bad table magic number"));
    }

    // ================================================================
    // 3. Short files
    // ================================================================

    /// 47 bytes can never hold a footer; the pipeline rejects the file
    /// before issuing any read.
    #[test]
    fn file_shorter_than_min_footer_is_rejected() {
        init_tracing();

        let reader = MemoryFileReader::new(vec![0u8; 47]);
        let err = read_footer_from_file(&reader, 47, 0).unwrap_err();
        assert!(err.is_corruption());
        assert_eq!(err.message(), Some("file is too short to be an sstable"));
        assert_eq!(reader.read_count(), 0);
    }

    /// # Scenario
    /// The caller reports a file size larger than what the reader can
    /// deliver (truncated file, stale metadata).
    ///
    /// # Expected behavior
    /// The completion re-checks the delivered length and reports the same
    /// "too short" corruption.
    #[test]
    fn overstated_file_size_is_detected_at_completion() {
        init_tracing();

        let reader = MemoryFileReader::new(vec![0u8; 10]);
        let err = read_footer_from_file(&reader, 4096, 0).unwrap_err();
        assert!(err.is_corruption());
        assert_eq!(err.message(), Some("file is too short to be an sstable"));
        assert_eq!(reader.read_count(), 1);
    }

    /// Garbage bytes where the footer should be.
    #[test]
    fn garbage_tail_fails_to_decode() {
        init_tracing();

        let reader = MemoryFileReader::new(vec![0x5A; 4096]);
        let err = read_footer_from_file(&reader, 4096, 0).unwrap_err();
        assert!(err.is_corruption());
    }

    // ================================================================
    // 4. I/O failure propagation
    // ================================================================

    #[test]
    fn reader_error_propagates_unchanged() {
        init_tracing();

        let reader = FailingFileReader::new(crate::status::Status::no_space());
        let err = read_footer_from_file(&reader, 4096, 0).unwrap_err();
        assert!(err.is_no_space());
    }
}

//! Size/ref-name thresholds behind the validation-finding flags on
//! `Repository` (spec.md §3). Discovery (out of scope) is the normal writer
//! of these flags; the thresholds are kept here, alongside the rules that
//! consume them, so the two never drift apart.

const GIBIBYTE: u64 = 1024 * 1024 * 1024;
const MEBIBYTE: u64 = 1024 * 1024;

/// Repository total size above which GitHub refuses the import outright.
pub const OVERSIZED_REPOSITORY_THRESHOLD_BYTES: u64 = 40 * GIBIBYTE;

/// Single-commit size above which the import is almost certain to fail.
pub const OVERSIZED_COMMIT_THRESHOLD_BYTES: u64 = 2 * GIBIBYTE;

/// Ref name length above which some destinations reject the ref.
pub const LONG_REF_NAME_THRESHOLD_BYTES: usize = 255;

/// Single blob size above which the import is blocked.
pub const BLOCKING_FILE_THRESHOLD_BYTES: u64 = 400 * MEBIBYTE;

/// Single blob size above which a large-file warning (not a hard block) is
/// raised.
pub const LARGE_FILE_WARNING_THRESHOLD_BYTES: u64 = 100 * MEBIBYTE;

/// Estimated issue/PR/wiki metadata size above which the import may time
/// out or be rejected by the destination's metadata importer.
pub const ESTIMATED_METADATA_SIZE_THRESHOLD_BYTES: u64 = 40 * GIBIBYTE;

pub fn is_oversized_repository(total_size_bytes: u64) -> bool {
    total_size_bytes > OVERSIZED_REPOSITORY_THRESHOLD_BYTES
}

pub fn is_oversized_commit(commit_size_bytes: u64) -> bool {
    commit_size_bytes > OVERSIZED_COMMIT_THRESHOLD_BYTES
}

pub fn is_long_ref_name(ref_name_bytes: usize) -> bool {
    ref_name_bytes > LONG_REF_NAME_THRESHOLD_BYTES
}

/// A single file's size classified against the blocking/warning thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileSizeClass {
    Ok,
    Warning,
    Blocking,
}

pub fn classify_file_size(file_size_bytes: u64) -> FileSizeClass {
    if file_size_bytes > BLOCKING_FILE_THRESHOLD_BYTES {
        FileSizeClass::Blocking
    } else if file_size_bytes > LARGE_FILE_WARNING_THRESHOLD_BYTES {
        FileSizeClass::Warning
    } else {
        FileSizeClass::Ok
    }
}

pub fn is_estimated_metadata_size_exceeded(estimated_metadata_bytes: u64) -> bool {
    estimated_metadata_bytes > ESTIMATED_METADATA_SIZE_THRESHOLD_BYTES
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oversized_repository_threshold_is_exclusive() {
        assert!(!is_oversized_repository(OVERSIZED_REPOSITORY_THRESHOLD_BYTES));
        assert!(is_oversized_repository(
            OVERSIZED_REPOSITORY_THRESHOLD_BYTES + 1
        ));
    }

    #[test]
    fn file_size_classification_buckets_correctly() {
        assert_eq!(classify_file_size(1), FileSizeClass::Ok);
        assert_eq!(
            classify_file_size(LARGE_FILE_WARNING_THRESHOLD_BYTES + 1),
            FileSizeClass::Warning
        );
        assert_eq!(
            classify_file_size(BLOCKING_FILE_THRESHOLD_BYTES + 1),
            FileSizeClass::Blocking
        );
    }

    #[test]
    fn long_ref_name_threshold_is_exclusive() {
        assert!(!is_long_ref_name(LONG_REF_NAME_THRESHOLD_BYTES));
        assert!(is_long_ref_name(LONG_REF_NAME_THRESHOLD_BYTES + 1));
    }
}

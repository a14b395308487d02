//! Segment planning for range-based downloads.
//!
//! A resource of known size is partitioned into contiguous byte ranges,
//! one per worker thread. Each segment downloads into its own part file
//! (`<dest>.part<i>`), and the parts are concatenated in index order
//! once every segment has finished.

use std::path::{Path, PathBuf};

/// One byte range of the remote resource.
///
/// `start` and `end` are inclusive offsets, matching the HTTP `Range`
/// header form `bytes=start-end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    /// Zero-based segment index; also the part file suffix.
    pub index: usize,
    /// First byte offset covered by this segment.
    pub start: u64,
    /// Last byte offset covered by this segment, inclusive.
    pub end: u64,
}

impl Segment {
    /// Number of bytes this segment covers.
    pub fn byte_count(&self) -> u64 {
        self.end - self.start + 1
    }

    /// `Range` header value requesting exactly this segment.
    ///
    /// # Example
    ///
    /// ```
    /// use dumpmill::fetch::Segment;
    ///
    /// let segment = Segment { index: 0, start: 0, end: 24 };
    /// assert_eq!(segment.range_header(), "bytes=0-24");
    /// ```
    pub fn range_header(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }
}

/// Split a resource of `total_size` bytes into `count` contiguous segments.
///
/// Segments get equal width except the last, which absorbs the division
/// remainder. `count` is clamped to at least 1 and never exceeds the
/// number of available bytes, so no segment is ever empty. A zero-byte
/// resource yields no segments.
///
/// # Example
///
/// ```
/// use dumpmill::fetch::plan_segments;
///
/// let segments = plan_segments(100, 4);
/// assert_eq!(segments.len(), 4);
/// assert_eq!((segments[0].start, segments[0].end), (0, 24));
/// assert_eq!((segments[3].start, segments[3].end), (75, 99));
/// ```
pub fn plan_segments(total_size: u64, count: usize) -> Vec<Segment> {
    if total_size == 0 {
        return Vec::new();
    }

    let count = (count.max(1) as u64).min(total_size);
    let width = total_size / count;

    (0..count)
        .map(|i| {
            let start = i * width;
            let end = if i == count - 1 {
                total_size - 1
            } else {
                start + width - 1
            };
            Segment {
                index: i as usize,
                start,
                end,
            }
        })
        .collect()
}

/// Part file path for one segment: the destination path with `.part<i>`
/// appended.
///
/// # Example
///
/// ```
/// use std::path::Path;
/// use dumpmill::fetch::part_path;
///
/// let dest = Path::new("/data/dump.xml.gz");
/// assert_eq!(part_path(dest, 2), Path::new("/data/dump.xml.gz.part2"));
/// ```
pub fn part_path(dest: &Path, index: usize) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(format!(".part{}", index));
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_plan_even_split() {
        let segments = plan_segments(100, 4);
        assert_eq!(segments.len(), 4);
        assert_eq!((segments[0].start, segments[0].end), (0, 24));
        assert_eq!((segments[1].start, segments[1].end), (25, 49));
        assert_eq!((segments[2].start, segments[2].end), (50, 74));
        assert_eq!((segments[3].start, segments[3].end), (75, 99));
    }

    #[test]
    fn test_plan_last_segment_absorbs_remainder() {
        let segments = plan_segments(103, 4);
        assert_eq!(segments.len(), 4);
        assert_eq!(segments[0].byte_count(), 25);
        assert_eq!(segments[1].byte_count(), 25);
        assert_eq!(segments[2].byte_count(), 25);
        assert_eq!(segments[3].byte_count(), 28);
        assert_eq!(segments[3].end, 102);
    }

    #[test]
    fn test_plan_single_segment() {
        let segments = plan_segments(1000, 1);
        assert_eq!(segments.len(), 1);
        assert_eq!((segments[0].start, segments[0].end), (0, 999));
    }

    #[test]
    fn test_plan_zero_count_clamps_to_one() {
        let segments = plan_segments(1000, 0);
        assert_eq!(segments.len(), 1);
    }

    #[test]
    fn test_plan_more_segments_than_bytes() {
        let segments = plan_segments(3, 8);
        assert_eq!(segments.len(), 3);
        for segment in &segments {
            assert_eq!(segment.byte_count(), 1);
        }
    }

    #[test]
    fn test_plan_empty_resource() {
        assert!(plan_segments(0, 4).is_empty());
    }

    #[test]
    fn test_range_header() {
        let segments = plan_segments(100, 2);
        assert_eq!(segments[0].range_header(), "bytes=0-49");
        assert_eq!(segments[1].range_header(), "bytes=50-99");
    }

    #[test]
    fn test_part_path_appends_suffix() {
        let dest = Path::new("/data/releases/2024-01/dump.xml.gz");
        assert_eq!(
            part_path(dest, 0),
            Path::new("/data/releases/2024-01/dump.xml.gz.part0")
        );
        assert_eq!(
            part_path(dest, 11),
            Path::new("/data/releases/2024-01/dump.xml.gz.part11")
        );
    }

    // Property-based tests

    proptest! {
        /// Segments tile the resource exactly: contiguous, in order,
        /// covering every byte once.
        #[test]
        fn prop_segments_tile_resource(
            total_size in 1u64..10_000_000,
            count in 1usize..64
        ) {
            let segments = plan_segments(total_size, count);

            prop_assert!(!segments.is_empty());
            prop_assert_eq!(segments[0].start, 0);
            prop_assert_eq!(segments[segments.len() - 1].end, total_size - 1);

            for pair in segments.windows(2) {
                prop_assert_eq!(pair[1].start, pair[0].end + 1);
            }

            let covered: u64 = segments.iter().map(|s| s.byte_count()).sum();
            prop_assert_eq!(covered, total_size);
        }

        /// Indexes are dense and ordered.
        #[test]
        fn prop_segment_indexes_dense(
            total_size in 1u64..1_000_000,
            count in 1usize..32
        ) {
            let segments = plan_segments(total_size, count);
            for (i, segment) in segments.iter().enumerate() {
                prop_assert_eq!(segment.index, i);
            }
        }
    }
}

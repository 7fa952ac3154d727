use crate::core::models::range::FrameRange;

/// The frames one worker is responsible for. `range` is `None` when the split left
/// nothing for this worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    pub worker_id: usize,
    pub range: Option<FrameRange>,
}

impl Assignment {
    pub fn frame_count(&self) -> u64 {
        self.range.map_or(0, |r| r.len())
    }
}

/// Number of workers actually started: never more than there are frames.
pub fn effective_workers(total_frames: u64, nproc: usize) -> usize {
    let cap = usize::try_from(total_frames).unwrap_or(usize::MAX);
    nproc.clamp(1, cap.max(1))
}

/// Splits `range` into contiguous chunks of `ceil(total / n)` frames, one per worker.
///
/// The chunks are pairwise disjoint, cover `range` exactly, and are ordered by worker
/// id. With ceiling-sized chunks the trailing workers can come up empty (9 frames over
/// 4 workers gives 3, 3, 3, 0); those still appear as assignments.
pub fn partition(range: FrameRange, nproc: usize) -> Vec<Assignment> {
    let total = range.len();
    let workers = effective_workers(total, nproc);
    let chunk = total.div_ceil(workers as u64);

    (0..workers)
        .map(|worker_id| {
            let offset = worker_id as u64 * chunk;
            let range = if offset < total {
                let start = range.start() + offset;
                FrameRange::new(start, (start + chunk - 1).min(range.end())).ok()
            } else {
                None
            };
            Assignment { worker_id, range }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranges(assignments: &[Assignment]) -> Vec<Option<(u64, u64)>> {
        assignments
            .iter()
            .map(|a| a.range.map(|r| (r.start(), r.end())))
            .collect()
    }

    #[test]
    fn splits_evenly_divisible_range() {
        let parts = partition(FrameRange::new(1, 100).unwrap(), 4);
        assert_eq!(
            ranges(&parts),
            vec![
                Some((1, 25)),
                Some((26, 50)),
                Some((51, 75)),
                Some((76, 100))
            ]
        );
    }

    #[test]
    fn trailing_worker_may_be_empty() {
        let parts = partition(FrameRange::new(1, 9).unwrap(), 4);
        assert_eq!(
            ranges(&parts),
            vec![Some((1, 3)), Some((4, 6)), Some((7, 9)), None]
        );
        assert_eq!(parts[3].frame_count(), 0);
    }

    #[test]
    fn more_workers_than_frames_is_clamped() {
        let parts = partition(FrameRange::new(10, 12).unwrap(), 8);
        assert_eq!(parts.len(), 3);
        assert_eq!(
            ranges(&parts),
            vec![Some((10, 10)), Some((11, 11)), Some((12, 12))]
        );
    }

    #[test]
    fn zero_workers_is_treated_as_one() {
        let parts = partition(FrameRange::new(5, 7).unwrap(), 0);
        assert_eq!(ranges(&parts), vec![Some((5, 7))]);
    }

    #[test]
    fn partitions_are_disjoint_ordered_and_cover_the_range() {
        for start in 1..=4u64 {
            for len in 1..=40u64 {
                let range = FrameRange::new(start, start + len - 1).unwrap();
                for nproc in 1..=12usize {
                    let parts = partition(range, nproc);
                    assert_eq!(parts.len(), nproc.min(len as usize));

                    let mut next = range.start();
                    for (i, part) in parts.iter().enumerate() {
                        assert_eq!(part.worker_id, i);
                        if let Some(r) = part.range {
                            assert_eq!(r.start(), next, "gap or overlap at worker {}", i);
                            next = r.end() + 1;
                        }
                    }
                    assert_eq!(next, range.end() + 1, "range {} / {} workers", range, nproc);

                    let total: u64 = parts.iter().map(Assignment::frame_count).sum();
                    assert_eq!(total, len);
                }
            }
        }
    }
}

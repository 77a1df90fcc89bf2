//! Pure planning of segment and process counts.

use crate::config::Configuration;

/// Compute the realized configuration for a run.
///
/// When `should_spawn_children` is false the result is a degenerate
/// one-segment in-process configuration. Otherwise the requested process
/// count (defaulting to the number of logical CPUs) is clamped so that no
/// child would sit idle: never more processes than segments.
///
/// The desired segment size is taken as-is; it is the caller's
/// throughput/latency dial and is never silently reduced.
///
/// `desired_segment_size` must be at least 1.
#[must_use]
pub fn plan(
    should_spawn_children: bool,
    total_items: u64,
    requested_processes: Option<usize>,
    desired_segment_size: u64,
) -> Configuration {
    debug_assert!(desired_segment_size >= 1);

    if !should_spawn_children {
        return Configuration {
            should_spawn_children: false,
            number_of_processes: 1,
            segment_size: total_items.max(1),
            number_of_segments: 1,
            total_items,
        };
    }

    let number_of_segments = total_items.div_ceil(desired_segment_size).max(1);
    let requested = requested_processes.unwrap_or_else(num_cpus::get);
    let ceiling = usize::try_from(number_of_segments).unwrap_or(usize::MAX);
    let number_of_processes = requested.clamp(1, ceiling);

    Configuration {
        should_spawn_children: true,
        number_of_processes,
        segment_size: desired_segment_size,
        number_of_segments,
        total_items,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_process_run_is_one_segment() {
        let config = plan(false, 7, Some(4), 2);
        assert_eq!(
            config,
            Configuration {
                should_spawn_children: false,
                number_of_processes: 1,
                segment_size: 7,
                number_of_segments: 1,
                total_items: 7,
            }
        );
    }

    #[test]
    fn test_in_process_run_with_zero_items() {
        let config = plan(false, 0, None, 10);
        assert_eq!(config.segment_size, 1);
        assert_eq!(config.number_of_segments, 1);
        assert_eq!(config.total_items, 0);
    }

    #[test]
    fn test_processes_clamped_to_segment_count() {
        let config = plan(true, 3, Some(8), 10);
        assert_eq!(
            config,
            Configuration {
                should_spawn_children: true,
                number_of_processes: 1,
                segment_size: 10,
                number_of_segments: 1,
                total_items: 3,
            }
        );
    }

    #[test]
    fn test_zero_items_keeps_desired_segment_size() {
        let config = plan(true, 0, Some(4), 25);
        assert_eq!(config.number_of_processes, 1);
        assert_eq!(config.segment_size, 25);
        assert_eq!(config.number_of_segments, 1);
        assert_eq!(config.total_items, 0);
    }

    #[test]
    fn test_requested_processes_kept_when_enough_segments() {
        let config = plan(true, 100, Some(2), 10);
        assert_eq!(config.number_of_processes, 2);
        assert_eq!(config.number_of_segments, 10);
    }

    #[test]
    fn test_default_process_count_is_positive_and_clamped() {
        let config = plan(true, 1_000_000, None, 1);
        assert!(config.number_of_processes >= 1);
        assert!(config.number_of_processes as u64 <= config.number_of_segments);
    }

    #[test]
    fn test_partial_tail_segment_counts() {
        let config = plan(true, 5, Some(2), 2);
        assert_eq!(config.number_of_segments, 3);
        assert_eq!(config.number_of_processes, 2);
    }
}

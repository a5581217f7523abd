//! Block planner: turns a target payload size into an ordered sequence of
//! block lengths.

use rand::Rng;

use crate::{
    config::RunConfig,
    error::{BenchError, Result},
    transport::MAX_DATAGRAM_PAYLOAD,
};

/// Draws block lengths uniformly from `[1, max_block]` until the running sum
/// reaches `total_size`, to mimic real-world uneven payloads.
///
/// The sum may overshoot `total_size` by up to `max_block - 1` on the final
/// block. `max_block` must stay below the datagram payload ceiling so the
/// plan is safe on every transport.
pub fn plan_random(total_size: u64, max_block: u64) -> Result<Vec<u64>> {
    if total_size == 0 {
        return Err(BenchError::InvalidConfig(
            "total size must be positive".into(),
        ));
    }
    if max_block == 0 || max_block > MAX_DATAGRAM_PAYLOAD {
        return Err(BenchError::InvalidConfig(format!(
            "maximum block size must be in 1..={MAX_DATAGRAM_PAYLOAD}"
        )));
    }

    let mut rng = rand::thread_rng();
    let mut blocks = Vec::new();
    let mut planned = 0u64;
    while planned < total_size {
        let len = rng.gen_range(1..=max_block);
        blocks.push(len);
        planned += len;
    }
    Ok(blocks)
}

/// Emits `total_size / block_size` blocks of exactly `block_size`, then one
/// remainder block if the division is not exact. Deterministic.
pub fn plan_fixed(total_size: u64, block_size: u64) -> Result<Vec<u64>> {
    if total_size == 0 {
        return Err(BenchError::InvalidConfig(
            "total size must be positive".into(),
        ));
    }
    if block_size == 0 {
        return Err(BenchError::InvalidConfig(
            "block size must be positive".into(),
        ));
    }

    let full_blocks = total_size / block_size;
    let remainder = total_size % block_size;
    let mut blocks = vec![block_size; full_blocks as usize];
    if remainder > 0 {
        blocks.push(remainder);
    }
    Ok(blocks)
}

/// Selects the sizing policy from the run configuration: a block size of 0
/// means random sizing, anything else is fixed.
pub fn plan_for(config: &RunConfig) -> Result<Vec<u64>> {
    if config.block_size == 0 {
        plan_random(config.total_size, MAX_DATAGRAM_PAYLOAD)
    } else {
        plan_fixed(config.total_size, config.block_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_plan_sums_exactly() {
        let plan = plan_fixed(10 * 1024, 1024).unwrap();
        assert_eq!(plan.len(), 10);
        assert!(plan.iter().all(|&len| len == 1024));
        assert_eq!(plan.iter().sum::<u64>(), 10 * 1024);
    }

    #[test]
    fn fixed_plan_appends_the_remainder() {
        let plan = plan_fixed(2_500, 1_000).unwrap();
        assert_eq!(plan, vec![1_000, 1_000, 500]);
    }

    #[test]
    fn fixed_plan_smaller_than_one_block() {
        let plan = plan_fixed(300, 1_000).unwrap();
        assert_eq!(plan, vec![300]);
    }

    #[test]
    fn fixed_plan_is_deterministic() {
        assert_eq!(
            plan_fixed(123_456, 789).unwrap(),
            plan_fixed(123_456, 789).unwrap()
        );
    }

    #[test]
    fn fixed_plan_rejects_degenerate_inputs() {
        assert!(plan_fixed(0, 1_000).is_err());
        assert!(plan_fixed(1_000, 0).is_err());
    }

    #[test]
    fn random_plan_is_valid_on_every_call() {
        let total = 100_000;
        let max_block = MAX_DATAGRAM_PAYLOAD;
        for _ in 0..32 {
            let plan = plan_random(total, max_block).unwrap();
            let sum: u64 = plan.iter().sum();
            assert!(sum >= total);
            assert!(sum - total < max_block);
            assert!(plan.iter().all(|&len| (1..=max_block).contains(&len)));
        }
    }

    #[test]
    fn random_plan_rejects_degenerate_inputs() {
        assert!(plan_random(0, 1_000).is_err());
        assert!(plan_random(1_000, 0).is_err());
        assert!(plan_random(1_000, MAX_DATAGRAM_PAYLOAD + 1).is_err());
    }

    #[test]
    fn block_size_zero_selects_random_sizing() {
        let config = RunConfig {
            transport: crate::config::TransportKind::Udp,
            discipline: crate::config::Discipline::Streaming,
            host: "127.0.0.1".into(),
            port: 9000,
            marker: "FIN".into(),
            total_size: 5_000,
            block_size: 0,
            ack_timeout_ms: 1_000,
        };
        let plan = plan_for(&config).unwrap();
        assert!(plan.iter().sum::<u64>() >= 5_000);

        let fixed = RunConfig {
            block_size: 1_000,
            ..config
        };
        assert_eq!(plan_for(&fixed).unwrap(), vec![1_000; 5]);
    }
}

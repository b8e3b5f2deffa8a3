//! 通用工具函数
//!
//! 雪花算法ID生成器: 41位毫秒时间戳 | 5位数据中心ID | 5位机器ID | 12位序列号

use crate::error::{Result, TcmError};
use chrono::Utc;
use std::sync::Mutex;

/// 起始时间戳 (2023-01-01T00:00:00Z)
pub const ID_EPOCH_MILLIS: i64 = 1_672_531_200_000;

const WORKER_ID_BITS: i64 = 5;
const DATACENTER_ID_BITS: i64 = 5;
const SEQUENCE_BITS: i64 = 12;

pub const MAX_WORKER_ID: i64 = (1 << WORKER_ID_BITS) - 1;
pub const MAX_DATACENTER_ID: i64 = (1 << DATACENTER_ID_BITS) - 1;
const SEQUENCE_MASK: i64 = (1 << SEQUENCE_BITS) - 1;

const WORKER_ID_SHIFT: i64 = SEQUENCE_BITS;
const DATACENTER_ID_SHIFT: i64 = SEQUENCE_BITS + WORKER_ID_BITS;
const TIMESTAMP_SHIFT: i64 = SEQUENCE_BITS + WORKER_ID_BITS + DATACENTER_ID_BITS;

/// 分布式唯一ID生成器
///
/// 同一实例生成的ID严格递增。实例应在进程内共享，而不是每次保存实体时新建。
#[derive(Debug)]
pub struct SnowflakeIdGenerator {
    worker_id: i64,
    datacenter_id: i64,
    state: Mutex<IdState>,
}

#[derive(Debug)]
struct IdState {
    last_timestamp: i64,
    sequence: i64,
}

/// 拆解后的ID各组成部分
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdParts {
    pub timestamp_millis: i64,
    pub datacenter_id: i64,
    pub worker_id: i64,
    pub sequence: i64,
}

impl SnowflakeIdGenerator {
    pub fn new(worker_id: i64, datacenter_id: i64) -> Result<Self> {
        if !(0..=MAX_WORKER_ID).contains(&worker_id) {
            return Err(TcmError::Config(format!(
                "worker Id can't be greater than {} or less than 0",
                MAX_WORKER_ID
            )));
        }
        if !(0..=MAX_DATACENTER_ID).contains(&datacenter_id) {
            return Err(TcmError::Config(format!(
                "datacenter Id can't be greater than {} or less than 0",
                MAX_DATACENTER_ID
            )));
        }

        Ok(Self {
            worker_id,
            datacenter_id,
            state: Mutex::new(IdState {
                last_timestamp: -1,
                sequence: 0,
            }),
        })
    }

    /// 生成下一个ID
    pub fn next_id(&self) -> Result<i64> {
        self.next_id_with(current_millis)
    }

    fn next_id_with(&self, clock: impl Fn() -> i64) -> Result<i64> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| TcmError::Internal("id generator lock poisoned".to_string()))?;

        let mut timestamp = clock();
        if timestamp < state.last_timestamp {
            return Err(TcmError::Internal(format!(
                "Clock moved backwards. Refusing to generate id for {} milliseconds",
                state.last_timestamp - timestamp
            )));
        }

        if timestamp == state.last_timestamp {
            state.sequence = (state.sequence + 1) & SEQUENCE_MASK;
            if state.sequence == 0 {
                // 毫秒内序列溢出，持锁等待下一毫秒，最长约1ms；
                // 期间其他线程阻塞在锁上，让出时间片避免空转占满CPU
                while timestamp <= state.last_timestamp {
                    std::thread::yield_now();
                    timestamp = clock();
                }
            }
        } else {
            state.sequence = 0;
        }

        state.last_timestamp = timestamp;

        Ok(((timestamp - ID_EPOCH_MILLIS) << TIMESTAMP_SHIFT)
            | (self.datacenter_id << DATACENTER_ID_SHIFT)
            | (self.worker_id << WORKER_ID_SHIFT)
            | state.sequence)
    }
}

/// 拆解ID
pub fn decompose_id(id: i64) -> IdParts {
    IdParts {
        timestamp_millis: (id >> TIMESTAMP_SHIFT) + ID_EPOCH_MILLIS,
        datacenter_id: (id >> DATACENTER_ID_SHIFT) & MAX_DATACENTER_ID,
        worker_id: (id >> WORKER_ID_SHIFT) & MAX_WORKER_ID,
        sequence: id & SEQUENCE_MASK,
    }
}

fn current_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_ids_strictly_increase() {
        let generator = SnowflakeIdGenerator::new(1, 1).unwrap();
        let mut last = 0;
        for _ in 0..10_000 {
            let id = generator.next_id().unwrap();
            assert!(id > last);
            last = id;
        }
    }

    #[test]
    fn test_id_layout() {
        let generator = SnowflakeIdGenerator::new(3, 7).unwrap();
        let id = generator.next_id_with(|| ID_EPOCH_MILLIS + 1_000).unwrap();
        let parts = decompose_id(id);

        assert_eq!(parts.timestamp_millis, ID_EPOCH_MILLIS + 1_000);
        assert_eq!(parts.datacenter_id, 7);
        assert_eq!(parts.worker_id, 3);
        assert_eq!(parts.sequence, 0);

        let next = generator.next_id_with(|| ID_EPOCH_MILLIS + 1_000).unwrap();
        assert_eq!(decompose_id(next).sequence, 1);
    }

    #[test]
    fn test_invalid_worker_ids() {
        assert!(SnowflakeIdGenerator::new(32, 0).is_err());
        assert!(SnowflakeIdGenerator::new(0, -1).is_err());
        assert!(SnowflakeIdGenerator::new(31, 31).is_ok());
    }

    #[test]
    fn test_clock_moved_backwards() {
        let generator = SnowflakeIdGenerator::new(1, 1).unwrap();
        generator.next_id_with(|| ID_EPOCH_MILLIS + 5_000).unwrap();
        let result = generator.next_id_with(|| ID_EPOCH_MILLIS + 4_000);
        assert!(matches!(result, Err(TcmError::Internal(_))));
    }

    #[test]
    fn test_sequence_overflow_waits_for_next_millisecond() {
        let generator = SnowflakeIdGenerator::new(0, 0).unwrap();
        let base = ID_EPOCH_MILLIS + 10;
        for _ in 0..=SEQUENCE_MASK {
            generator.next_id_with(|| base).unwrap();
        }

        let calls = Cell::new(0);
        let id = generator
            .next_id_with(|| {
                calls.set(calls.get() + 1);
                if calls.get() < 3 {
                    base
                } else {
                    base + 1
                }
            })
            .unwrap();

        let parts = decompose_id(id);
        assert_eq!(parts.timestamp_millis, base + 1);
        assert_eq!(parts.sequence, 0);
    }

    #[test]
    fn test_concurrent_ids_are_unique_across_overflow() {
        let generator = std::sync::Arc::new(SnowflakeIdGenerator::new(1, 1).unwrap());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let generator = generator.clone();
                std::thread::spawn(move || {
                    (0..10_000)
                        .map(|_| generator.next_id().unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = std::collections::HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id));
            }
        }
        assert_eq!(seen.len(), 40_000);
    }
}

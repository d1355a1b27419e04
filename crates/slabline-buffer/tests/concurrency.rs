//! `concurrency` 集成测试：多线程共享同一个分级池时的租借与归还。
//!
//! # 测试目标（Why）
//! - 前端不持锁，同一分级上的并发全部落在子池的自由链表上；
//!   任何线程拿到的缓冲容量都必须等于其分级尺寸，且结束后没有遗留的借出计数。

use std::{sync::Barrier, thread};

use slabline_buffer::PowerOfTwoBufferPool;

const THREADS: usize = 8;
const ROUNDS: usize = 500;

/// 所有线程反复争用同一个分级。
#[test]
fn same_bucket_under_contention() {
    let pool = PowerOfTwoBufferPool::with_highest_exponent(10).expect("构造分级池");
    let barrier = Barrier::new(THREADS);

    thread::scope(|scope| {
        for worker in 0..THREADS {
            let pool = pool.clone();
            let barrier = &barrier;
            scope.spawn(move || {
                barrier.wait();
                for round in 0..ROUNDS {
                    let size = 65 + (worker + round) % 64;
                    let mut buffer = pool.get(size).expect("并发租借");
                    assert_eq!(buffer.capacity(), 128);
                    assert_eq!(buffer.limit(), size);
                    buffer.write_u8(worker as u8).expect("写入首字节");
                    buffer.close();
                }
            });
        }
    });

    let stats = pool.statistics();
    assert_eq!(stats.active_leases, 0);
    assert!(stats.idle_buffers <= THREADS);
    assert_eq!(
        stats.dimension("pool_hits").unwrap_or(0) + stats.dimension("pool_misses").unwrap_or(0),
        THREADS * ROUNDS
    );
}

/// 并发租借不同分级，同时有线程反复清空。
#[test]
fn mixed_buckets_with_concurrent_clear() {
    let pool = PowerOfTwoBufferPool::with_highest_exponent(12).expect("构造分级池");

    thread::scope(|scope| {
        for worker in 0..THREADS {
            let pool = pool.clone();
            scope.spawn(move || {
                for round in 0..ROUNDS {
                    let size = 1 + (worker * 131 + round * 17) % 4096;
                    let buffer = pool.get(size).expect("并发租借");
                    assert_eq!(buffer.capacity(), size.next_power_of_two());
                    drop(buffer);
                }
            });
        }
        let pool = pool.clone();
        scope.spawn(move || {
            for _ in 0..ROUNDS {
                pool.clear();
                thread::yield_now();
            }
        });
    });

    assert_eq!(pool.statistics().active_leases, 0);
    pool.clear();
    let stats = pool.statistics();
    assert_eq!(stats.idle_buffers, 0);
    assert_eq!(stats.available_bytes, 0, "清空后闲置字节必须归零");
    assert_eq!(stats.resident_bytes, 0);
}

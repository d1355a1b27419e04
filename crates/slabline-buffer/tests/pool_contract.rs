//! `pool_contract` 集成测试：验证 `PowerOfTwoBufferPool` 在公开 API 下的租借、归还与清空契约。
//!
//! # 测试目标（Why）
//! - 调用方只看到自己请求的字节数，真实容量是取整后的分级尺寸；
//! - 关闭后缓冲回到正确的分级，清空后池仍能重新创建缓冲；
//! - 超出最高分级与零字节请求走非池化分配，且关闭时不报错。
//!
//! # 结构安排（How）
//! - 以外部 crate 视角调用，只依赖 `slabline_buffer` 的公开导出；
//! - 自定义子池 `RecordingPool` 用于观察工厂注入与归还路由。

use std::sync::{Arc, Mutex};

use slabline_buffer::{
    BucketSpec, BufferProvider, ByteBuf, ByteOrder, PoolConfig, PoolError, PowerOfTwoBufferPool,
    Result, SimplePool, SizeClassPool,
};

/// 验证可见上限恰为请求尺寸，而容量为取整后的分级尺寸。
#[test]
fn get_limits_visible_window_to_requested_size() {
    let pool = PowerOfTwoBufferPool::new();
    let buffer = pool.get(100).expect("租借 100 字节");
    assert_eq!(buffer.capacity(), 128);
    assert_eq!(buffer.limit(), 100);
    assert_eq!(buffer.position(), 0);
    assert!(buffer.is_pooled());
}

/// 每个尺寸都落入最小的能容纳它的分级。
#[test]
fn requests_land_in_smallest_fitting_bucket() {
    let pool = PowerOfTwoBufferPool::with_highest_exponent(12).expect("构造分级池");
    for (size, bucket) in [(1, 1), (2, 2), (3, 4), (1024, 1024), (1025, 2048), (4096, 4096)] {
        let buffer = pool.get(size).expect("租借");
        assert_eq!(buffer.capacity(), bucket, "size = {size}");
        assert_eq!(buffer.limit(), size);
    }
}

/// 关闭后再次租借同一分级：不要求复用同一块内存，但容量与上限必须正确。
///
/// 默认子池是后进先出，这里额外确认统计中出现了命中。
#[test]
fn closed_buffer_is_reused_for_same_bucket() {
    let pool = PowerOfTwoBufferPool::new();
    let mut first = pool.get(100).expect("首次租借");
    first.write_bytes(b"stale").expect("写入数据");
    first.close();

    let second = pool.get(120).expect("同分级再次租借");
    assert_eq!(second.capacity(), 128);
    assert_eq!(second.limit(), 120);
    assert_eq!(second.position(), 0, "复用缓冲的游标应被复位");

    let stats = pool.statistics();
    assert_eq!(stats.dimension("pool_hits"), Some(1));
    assert_eq!(stats.dimension("pool_misses"), Some(1));
}

/// 复用的缓冲不清零：上一位租借者写入的数据仍然可见。
#[test]
fn reused_buffer_keeps_previous_contents() {
    let pool = PowerOfTwoBufferPool::with_highest_exponent(6).expect("构造分级池");
    let mut first = pool.get(8).expect("首次租借");
    first.write_bytes(b"leftover").expect("写入数据");
    first.close();

    let second = pool.get(8).expect("复用租借");
    assert_eq!(second.as_slice(), b"leftover");
}

/// 清空后租借必须成功，且分级容量与上限正确。
#[test]
fn clear_then_get_recreates_buffers() {
    let pool = PowerOfTwoBufferPool::new();
    for size in [10, 100, 1000] {
        pool.get(size).expect("预热").close();
    }
    assert!(pool.clear() > 0);
    assert_eq!(pool.statistics().idle_buffers, 0);

    let buffer = pool.get(100).expect("清空后租借");
    assert_eq!(buffer.capacity(), 128);
    assert_eq!(buffer.limit(), 100);
}

/// 清空不影响已借出的缓冲，关闭时它们会重新填充被清空的分级。
#[test]
fn outstanding_buffers_survive_clear() {
    let pool = PowerOfTwoBufferPool::new();
    let mut outstanding = pool.get(64).expect("租借");
    pool.clear();
    outstanding.write_i32(7).expect("清空后仍可写入");
    outstanding.close();
    let sub_pool = pool.sub_pool(64).expect("分级应存在");
    assert_eq!(sub_pool.statistics().idle_buffers, 1);
}

/// 清空是幂等的。
#[test]
fn clear_is_idempotent() {
    let pool = PowerOfTwoBufferPool::with_highest_exponent(4).expect("构造分级池");
    pool.get(16).expect("租借").close();
    assert_eq!(pool.clear(), 16);
    assert_eq!(pool.clear(), 0);
    assert_eq!(pool.clear(), 0);
}

/// 超出最高分级的请求返回非池化缓冲，容量不小于请求，关闭时静默丢弃。
#[test]
fn oversized_request_falls_back_to_unpooled_buffer() {
    let pool = PowerOfTwoBufferPool::with_highest_exponent(4).expect("构造分级池");
    assert_eq!(pool.max_bucket_size(), 16);

    let mut buffer = pool.get(100).expect("超出最高分级仍应成功");
    assert!(buffer.capacity() >= 100);
    assert_eq!(buffer.limit(), 100);
    assert!(!buffer.is_pooled());
    buffer.close();
    buffer.close();

    let stats = pool.statistics();
    assert_eq!(stats.idle_buffers, 0, "非池化缓冲不得进入任何分级");
    assert_eq!(stats.dimension("unpooled_allocations"), Some(1));
}

/// 零字节请求取整为 0，不在分级表中，走非池化分配。
#[test]
fn zero_sized_request_is_served_unpooled() {
    let pool = PowerOfTwoBufferPool::new();
    let mut buffer = pool.get(0).expect("零字节请求");
    assert_eq!(buffer.capacity(), 0);
    assert_eq!(buffer.limit(), 0);
    assert!(!buffer.is_pooled());
    buffer.close();
}

/// 超出 32 位取整定义域的请求被显式拒绝。
#[test]
fn request_beyond_rounding_domain_is_rejected() {
    let pool = PowerOfTwoBufferPool::with_highest_exponent(4).expect("构造分级池");
    let err = pool.get((1usize << 31) + 1).expect_err("应拒绝");
    assert!(matches!(err, PoolError::RequestTooLarge { .. }));
}

/// 无论复用、新分配还是非池化分配，缓冲都是小端字节序。
#[test]
fn every_buffer_is_little_endian() {
    let pool = PowerOfTwoBufferPool::with_highest_exponent(4).expect("构造分级池");

    let mut fresh = pool.get(8).expect("新分配");
    assert_eq!(fresh.order(), ByteOrder::LittleEndian);
    fresh.write_i32(1).expect("写入");
    assert_eq!(&fresh.as_slice()[..4], &[1, 0, 0, 0]);
    fresh.close();

    let reused = pool.get(8).expect("复用");
    assert_eq!(reused.order(), ByteOrder::LittleEndian);

    let unpooled = pool.get(64).expect("非池化");
    assert_eq!(unpooled.order(), ByteOrder::LittleEndian);
}

/// 作为 `BufferProvider` 使用时行为一致。
#[test]
fn buffer_provider_delegates_to_pool() {
    fn lease<P: BufferProvider>(provider: &P, size: usize) -> Result<P::Buffer> {
        provider.get(size)
    }

    let pool = PowerOfTwoBufferPool::new();
    let buffer = lease(&pool, 33).expect("经由 trait 租借");
    assert_eq!(buffer.capacity(), 64);
    assert_eq!(buffer.limit(), 33);
}

/// 克隆句柄共享同一组分级。
#[test]
fn clones_share_buckets() {
    let pool = PowerOfTwoBufferPool::with_highest_exponent(6).expect("构造分级池");
    let handle = pool.clone();
    handle.get(32).expect("经由克隆租借").close();
    assert_eq!(pool.statistics().idle_buffers, 1);
}

/// 闲置上限生效后，多余的归还被丢弃。
#[test]
fn idle_cap_limits_each_bucket() {
    let config = PoolConfig::new()
        .with_highest_power_of_two_exponent(6)
        .with_max_idle_per_bucket(Some(2));
    let pool = PowerOfTwoBufferPool::with_config(&config).expect("构造分级池");
    let buffers: Vec<_> = (0..5).map(|_| pool.get(32).expect("租借")).collect();
    drop(buffers);

    let (_, bucket_stats) = pool
        .bucket_statistics()
        .into_iter()
        .find(|(size, _)| *size == 32)
        .expect("分级 32 应存在");
    assert_eq!(bucket_stats.idle_buffers, 2);
    assert_eq!(bucket_stats.dimension("pool_discards"), Some(3));
}

/// 记录归还事件的子池，用于观察工厂注入与归还路由。
struct RecordingPool {
    inner: SimplePool,
    released: Arc<Mutex<Vec<usize>>>,
}

impl SizeClassPool for RecordingPool {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn buffer_size(&self) -> usize {
        self.inner.buffer_size()
    }

    fn acquire(&self) -> Result<ByteBuf> {
        self.inner.acquire()
    }

    fn release(&self, buffer: ByteBuf) {
        self.released
            .lock()
            .expect("mutex poisoned")
            .push(buffer.capacity());
        self.inner.release(buffer);
    }

    fn clear(&self) -> usize {
        self.inner.clear()
    }
}

/// 注入的子池按指数顺序构造，并接收归还到其分级的缓冲。
#[test]
fn custom_sub_pool_factory_receives_releases() {
    let released = Arc::new(Mutex::new(Vec::new()));
    let mut seen = Vec::new();
    let config = PoolConfig::new().with_highest_power_of_two_exponent(5);
    let pool = PowerOfTwoBufferPool::with_sub_pool_factory(&config, |spec: BucketSpec| {
        seen.push((spec.exponent(), spec.size(), spec.name()));
        RecordingPool {
            inner: spec.into_simple_pool(),
            released: Arc::clone(&released),
        }
    })
    .expect("构造分级池");

    assert_eq!(seen.len(), 6);
    assert_eq!(seen[5], (5, 32, "ByteBufferPool-2^5".to_owned()));

    pool.get(20).expect("租借").close();
    pool.get(100).expect("非池化租借").close();
    assert_eq!(*released.lock().expect("mutex poisoned"), vec![32]);
}

/// 工厂返回尺寸不符的子池时，构造失败。
#[test]
fn mismatched_sub_pool_size_is_rejected() {
    let config = PoolConfig::new().with_highest_power_of_two_exponent(3);
    let err = PowerOfTwoBufferPool::with_sub_pool_factory(&config, |spec: BucketSpec| {
        SimplePool::new(spec.name(), spec.size() + 1, None, spec.allocator())
    })
    .expect_err("尺寸不一致应被拒绝");
    assert!(matches!(err, PoolError::InvalidConfig { .. }));
}

/// 创建回调的分配错误经 `get` 原样返回，不重试，也不留下借出计数。
#[test]
fn allocation_failure_propagates_through_get() {
    let expected = ByteBuf::allocate(usize::MAX, ByteOrder::LittleEndian)
        .expect_err("超出地址空间的分配必然失败");
    let config = PoolConfig::new().with_highest_power_of_two_exponent(6);
    let pool = PowerOfTwoBufferPool::with_sub_pool_factory(&config, |spec: BucketSpec| {
        SimplePool::new(spec.name(), spec.size(), None, || {
            ByteBuf::allocate(usize::MAX, ByteOrder::LittleEndian)
        })
    })
    .expect("构造分级池");

    let err = pool.get(40).expect_err("创建回调失败时租借应失败");
    assert_eq!(err, expected);
    assert!(matches!(err, PoolError::AllocationFailed { .. }));

    let stats = pool.statistics();
    assert_eq!(stats.failed_acquisitions, 1);
    assert_eq!(stats.active_leases, 0);
    assert_eq!(stats.dimension("pool_misses"), Some(1));
}

/// 取走底层缓冲后，子池不再把这次租借计为借出。
#[test]
fn detached_lease_is_no_longer_outstanding() {
    let pool = PowerOfTwoBufferPool::with_highest_exponent(6).expect("构造分级池");
    let raw = pool.get(20).expect("租借").detach().expect("未关闭时可取走");
    assert_eq!(raw.capacity(), 32);

    let stats = pool.statistics();
    assert_eq!(stats.active_leases, 0);
    assert_eq!(stats.resident_bytes, 0);
    assert_eq!(stats.dimension("lost_leases"), Some(1));
}

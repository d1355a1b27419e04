use std::{
    collections::BTreeMap,
    fmt,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use slabline_core::{
    BufferProvider, ByteBuf, ByteOrder, PoolError, PoolStats, Result, SizeClassPool,
};
use tracing::{debug, trace};

use crate::{
    PoolConfig, PooledBuffer, SimplePool,
    size_class::{self, MAX_REQUEST_SIZE},
};

/// `PowerOfTwoBufferPool` 将任意尺寸的请求取整到 2 的幂，并从对应分级的子池复用缓冲。
///
/// # 模块角色（Why）
/// - 摊薄短生命周期、尺寸多变的 I/O 缓冲的分配成本：尺寸相近的请求落入同一分级，共享一条自由链表；
/// - 以显式构造、显式传递（`Clone` 共享同一组子池）的方式使用，生命周期完全由持有者决定。
///
/// # 核心机制（How）
/// - 构造时为每个指数 `i ∈ 0..=H` 创建一个尺寸为 `2^i` 的子池，名称为 `ByteBufferPool-2^i`，
///   创建回调分配恰为 `2^i` 字节的小端缓冲；分级表此后只读，`get` 查表无需加锁；
/// - `get(size)`：取整得到分级；命中分级表则从子池租借，否则（`size == 0` 或超过 `2^H`）
///   直接分配恰为 `size` 字节的非池化缓冲；随后复位游标并把 `limit` 设为 `size`；
/// - 归还由 [`PooledBuffer`] 负责：它在租借时记下所属子池，关闭时直接放回。
///
/// # 契约说明（What）
/// - **后置条件**：`get(size)` 返回的缓冲 `limit() == size`、`position() == 0`、字节序为小端；
///   池化缓冲的容量等于取整后的分级尺寸；
/// - **错误**：分配失败原样返回，不重试；`size > 2^31` 超出取整算法定义域，返回
///   [`PoolError::RequestTooLarge`]；
/// - **并发**：同一分级上的互斥完全交由子池实现；`clear` 与租借、归还并发调用的安全性取决于子池，
///   默认的 [`SimplePool`] 保证其安全。
///
/// # 设计取舍（Trade-offs）
/// - 复用的缓冲不清零，调用方只能依赖自己写入过的字节；
/// - 默认每个分级的闲置数量不设上限，可通过 [`PoolConfig::with_max_idle_per_bucket`] 限制。
#[derive(Clone)]
pub struct PowerOfTwoBufferPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    highest_exponent: u32,
    buckets: BTreeMap<usize, Arc<dyn SizeClassPool>>,
    unpooled_allocations: AtomicUsize,
}

/// 构造某个分级子池所需的参数，交给子池工厂使用。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BucketSpec {
    exponent: u32,
    size: usize,
    max_idle: Option<usize>,
}

impl BucketSpec {
    pub fn exponent(&self) -> u32 {
        self.exponent
    }

    /// 分级尺寸，即 `2^exponent`。
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn max_idle(&self) -> Option<usize> {
        self.max_idle
    }

    /// 诊断用名称，形如 `ByteBufferPool-2^10`。
    pub fn name(&self) -> String {
        format!("ByteBufferPool-2^{}", self.exponent)
    }

    /// 该分级的创建回调：每次调用分配一块恰为分级尺寸的小端缓冲。
    pub fn allocator(&self) -> impl Fn() -> Result<ByteBuf> + Send + Sync + use<> {
        let size = self.size;
        move || allocate_little_endian(size)
    }

    /// 默认子池工厂：基于自由链表的 [`SimplePool`]。
    pub fn into_simple_pool(self) -> SimplePool {
        SimplePool::new(self.name(), self.size, self.max_idle, self.allocator())
    }
}

/// 分级池产出的每一块新缓冲都固定为小端字节序。
fn allocate_little_endian(size: usize) -> Result<ByteBuf> {
    ByteBuf::allocate(size, ByteOrder::LittleEndian)
}

impl PowerOfTwoBufferPool {
    /// 以默认配置（最高分级 `2^24`，闲置不设上限）创建分级池。
    pub fn new() -> Self {
        Self::assemble(&PoolConfig::new(), BucketSpec::into_simple_pool)
    }

    /// 指定最高分级指数创建分级池，指数允许范围为 `0..=31`。
    pub fn with_highest_exponent(exponent: u32) -> Result<Self> {
        Self::with_config(&PoolConfig::new().with_highest_power_of_two_exponent(exponent))
    }

    pub fn with_config(config: &PoolConfig) -> Result<Self> {
        Self::with_sub_pool_factory(config, BucketSpec::into_simple_pool)
    }

    /// 使用自定义子池工厂创建分级池。
    ///
    /// # 契约
    /// - `factory` 对每个分级各调用一次，按指数从小到大；
    /// - 工厂返回的子池 `buffer_size()` 必须等于 [`BucketSpec::size`]，否则返回
    ///   [`PoolError::InvalidConfig`]，保证“子池中的缓冲容量恒等于分级尺寸”。
    pub fn with_sub_pool_factory<F, P>(config: &PoolConfig, factory: F) -> Result<Self>
    where
        F: FnMut(BucketSpec) -> P,
        P: SizeClassPool,
    {
        config.validate()?;
        let pool = Self::assemble(config, factory);
        if let Some((size, sub_pool)) = pool
            .inner
            .buckets
            .iter()
            .find(|(size, sub_pool)| sub_pool.buffer_size() != **size)
        {
            return Err(PoolError::InvalidConfig {
                detail: format!(
                    "子池 `{}` 的缓冲尺寸 {} 与分级尺寸 {size} 不一致",
                    sub_pool.name(),
                    sub_pool.buffer_size()
                ),
            });
        }
        Ok(pool)
    }

    fn assemble<F, P>(config: &PoolConfig, mut factory: F) -> Self
    where
        F: FnMut(BucketSpec) -> P,
        P: SizeClassPool,
    {
        let highest_exponent = config.highest_power_of_two_exponent();
        let max_idle = config.max_idle_per_bucket();
        let buckets: BTreeMap<usize, Arc<dyn SizeClassPool>> =
            size_class::bucket_sizes(highest_exponent)
                .map(|(exponent, size)| {
                    let sub_pool: Arc<dyn SizeClassPool> = Arc::new(factory(BucketSpec {
                        exponent,
                        size,
                        max_idle,
                    }));
                    (size, sub_pool)
                })
                .collect();
        debug!(
            buckets = buckets.len(),
            highest_exponent,
            max_idle = ?max_idle,
            "power-of-two buffer pool created"
        );
        Self {
            inner: Arc::new(PoolInner {
                highest_exponent,
                buckets,
                unpooled_allocations: AtomicUsize::new(0),
            }),
        }
    }

    /// 租借一块可见上限恰为 `size` 字节的缓冲。
    ///
    /// # 执行步骤（How）
    /// 1. 将 `size` 取整到 2 的幂得到分级；
    /// 2. 分级在表中：从子池租借（复用或由创建回调新分配），并记下子池用于归还；
    /// 3. 分级不在表中（零字节或超过最高分级）：分配恰为 `size` 字节的非池化缓冲，关闭时直接丢弃；
    /// 4. 复位游标，把 `limit` 设为 `size`。
    ///
    /// # 错误
    /// - [`PoolError::RequestTooLarge`]：`size` 超过 `2^31`；
    /// - [`PoolError::AllocationFailed`]：平台无法提供内存，原样传播。
    pub fn get(&self, size: usize) -> Result<PooledBuffer> {
        let bucket = size_class::bucket_for(size).ok_or(PoolError::RequestTooLarge {
            requested: size,
            max: MAX_REQUEST_SIZE,
        })?;
        let mut pooled = match self.inner.buckets.get(&bucket) {
            Some(sub_pool) => {
                trace!(size, bucket, "serving request from bucket");
                PooledBuffer::new(sub_pool.acquire()?, Some(Arc::clone(sub_pool)))
            }
            None => {
                self.inner
                    .unpooled_allocations
                    .fetch_add(1, Ordering::Relaxed);
                debug!(
                    size,
                    max_bucket = self.max_bucket_size(),
                    "request outside bucket table, allocating unpooled buffer"
                );
                PooledBuffer::unpooled(allocate_little_endian(size)?)
            }
        };
        pooled.clear();
        pooled.set_limit(size)?;
        Ok(pooled)
    }

    /// 清空所有分级的自由链表，返回被丢弃的字节数。
    ///
    /// 已借出的缓冲不受影响，它们关闭时会照常归还到（已被清空的）子池。重复调用是安全的。
    pub fn clear(&self) -> usize {
        let reclaimed: usize = self
            .inner
            .buckets
            .values()
            .map(|sub_pool| sub_pool.clear())
            .sum();
        debug!(reclaimed_bytes = reclaimed, "drained all buckets");
        reclaimed
    }

    pub fn highest_power_of_two_exponent(&self) -> u32 {
        self.inner.highest_exponent
    }

    /// 最大分级尺寸 `2^H`。
    pub fn max_bucket_size(&self) -> usize {
        1usize << self.inner.highest_exponent
    }

    /// 分级尺寸，按从小到大排列。
    pub fn bucket_sizes(&self) -> impl Iterator<Item = usize> + '_ {
        self.inner.buckets.keys().copied()
    }

    /// 指定分级尺寸的子池；`bucket_size` 不是表中的 2 的幂时返回 `None`。
    pub fn sub_pool(&self, bucket_size: usize) -> Option<Arc<dyn SizeClassPool>> {
        self.inner.buckets.get(&bucket_size).cloned()
    }

    /// 所有分级汇总后的指标快照。
    ///
    /// 额外维度：`bucket_count`（分级数量）、`unpooled_allocations`（非池化分配次数），
    /// 以及各子池自带维度的求和（默认子池提供 `pool_hits`、`pool_misses` 等）。
    pub fn statistics(&self) -> PoolStats {
        let mut total = PoolStats::default();
        for sub_pool in self.inner.buckets.values() {
            total.merge(&sub_pool.statistics());
        }
        total.add_dimension("bucket_count", self.inner.buckets.len());
        total.add_dimension(
            "unpooled_allocations",
            self.inner.unpooled_allocations.load(Ordering::Relaxed),
        );
        total
    }

    /// 逐分级的指标快照，按分级尺寸从小到大排列。
    pub fn bucket_statistics(&self) -> Vec<(usize, PoolStats)> {
        self.inner
            .buckets
            .iter()
            .map(|(size, sub_pool)| (*size, sub_pool.statistics()))
            .collect()
    }
}

impl Default for PowerOfTwoBufferPool {
    fn default() -> Self {
        Self::new()
    }
}

impl BufferProvider for PowerOfTwoBufferPool {
    type Buffer = PooledBuffer;

    fn get(&self, size: usize) -> Result<PooledBuffer> {
        PowerOfTwoBufferPool::get(self, size)
    }
}

impl fmt::Debug for PowerOfTwoBufferPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PowerOfTwoBufferPool")
            .field("highest_exponent", &self.inner.highest_exponent)
            .field("buckets", &self.inner.buckets.len())
            .finish()
    }
}

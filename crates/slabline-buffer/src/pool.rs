use std::{
    borrow::Cow,
    sync::atomic::{AtomicU64, AtomicUsize, Ordering},
};

use slabline_core::{ByteBuf, PoolStats, Result, SizeClassPool};
use spin::Mutex;

/// 子池的缓冲创建回调。
pub type BufferFactory = Box<dyn Fn() -> Result<ByteBuf> + Send + Sync>;

/// `SimplePool` 是单一尺寸的自由链表（Free List）子池，分级池为每个分级各持有一个。
///
/// # 模块角色（Why）
/// - 分级前端不持有任何锁，同一分级上的并发租借与归还全部在这里串行化；
/// - 自由链表为空时调用构造时注入的创建回调，调用方因此可以决定新缓冲的字节序与分配方式。
///
/// # 核心机制（How）
/// - 内部维护 `spin::Mutex<Vec<ByteBuf>>`，租借与归还都只在锁内做一次 `pop`/`push`，临界区极短；
///   后进先出，最近归还的缓冲最先被复用；
/// - `PoolMetrics` 以原子计数跟踪命中、未命中、丢弃与字节数，支撑 `statistics` 快照；
///   闲置字节数在锁内随 `push`/`pop`/`drain` 一起更新；
/// - 可选的 `max_idle` 限制自由链表长度，超出时归还的缓冲直接丢弃。`None` 表示不设上限。
///
/// # 契约说明（What）
/// - **前置条件**：`release` 的缓冲容量必须等于 `buffer_size`，分级前端在归还前已经校验；
/// - **后置条件**：`acquire` 成功返回的缓冲要么来自自由链表，要么由创建回调新分配；
///   创建回调失败时错误原样返回，并计入 `failed_acquisitions`；
/// - `clear` 与租借、归还并发调用是安全的，已借出的缓冲在归还时会重新填充被清空的链表。
pub struct SimplePool {
    name: Cow<'static, str>,
    buffer_size: usize,
    max_idle: Option<usize>,
    create: BufferFactory,
    free_list: Mutex<Vec<ByteBuf>>,
    metrics: PoolMetrics,
}

impl SimplePool {
    /// 创建子池。
    ///
    /// # 参数
    /// - `name`：诊断用名称；
    /// - `buffer_size`：子池管理的缓冲容量；
    /// - `max_idle`：自由链表长度上限，`None` 表示不设上限；
    /// - `create`：自由链表为空时调用的创建回调，返回的缓冲容量应等于 `buffer_size`。
    pub fn new<F>(
        name: impl Into<Cow<'static, str>>,
        buffer_size: usize,
        max_idle: Option<usize>,
        create: F,
    ) -> Self
    where
        F: Fn() -> Result<ByteBuf> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            buffer_size,
            max_idle,
            create: Box::new(create),
            free_list: Mutex::new(Vec::new()),
            metrics: PoolMetrics::default(),
        }
    }

    /// 自由链表长度上限。
    pub fn max_idle(&self) -> Option<usize> {
        self.max_idle
    }

    /// 自由链表中当前闲置的缓冲数量。
    pub fn idle_count(&self) -> usize {
        self.free_list.lock().len()
    }
}

impl SizeClassPool for SimplePool {
    fn name(&self) -> &str {
        &self.name
    }

    fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    fn acquire(&self) -> Result<ByteBuf> {
        let reused = {
            let mut list = self.free_list.lock();
            let reused = list.pop();
            if let Some(buf) = &reused {
                self.metrics.on_reused(buf.capacity());
            }
            reused
        };
        let buffer = match reused {
            Some(buf) => buf,
            None => {
                self.metrics.misses.fetch_add(1, Ordering::Relaxed);
                let buf = (self.create)().inspect_err(|_| {
                    self.metrics
                        .failed_acquisitions
                        .fetch_add(1, Ordering::Relaxed);
                })?;
                self.metrics.on_created(buf.capacity());
                buf
            }
        };
        self.metrics.active_leases.fetch_add(1, Ordering::Relaxed);
        Ok(buffer)
    }

    fn release(&self, buffer: ByteBuf) {
        sub_floor(&self.metrics.active_leases, 1);
        let capacity = buffer.capacity();
        let mut list = self.free_list.lock();
        if self.max_idle.is_none_or(|max| list.len() < max) {
            // 计数与入链同在锁内，`clear` 不会在两者之间抽走这块缓冲。
            self.metrics.on_parked(capacity);
            list.push(buffer);
            return;
        }
        drop(list);
        self.metrics.on_discarded(capacity);
    }

    fn clear(&self) -> usize {
        let mut list = self.free_list.lock();
        let reclaimed: usize = list.drain(..).map(|buf| buf.capacity()).sum();
        self.metrics.on_drained(reclaimed);
        reclaimed
    }

    fn forget_lease(&self) {
        sub_floor(&self.metrics.active_leases, 1);
        sub_floor(&self.metrics.resident_bytes, self.buffer_size);
        self.metrics.forgotten.fetch_add(1, Ordering::Relaxed);
    }

    fn statistics(&self) -> PoolStats {
        let (idle_buffers, available_bytes) = {
            let list = self.free_list.lock();
            (
                list.len(),
                self.metrics.available_bytes.load(Ordering::Relaxed),
            )
        };
        let load = |counter: &AtomicUsize| counter.load(Ordering::Relaxed);
        let mut stats = PoolStats {
            allocated_bytes: load(&self.metrics.allocated_bytes),
            resident_bytes: load(&self.metrics.resident_bytes),
            active_leases: load(&self.metrics.active_leases),
            available_bytes,
            idle_buffers,
            failed_acquisitions: self.metrics.failed_acquisitions.load(Ordering::Relaxed),
            custom_dimensions: Vec::new(),
        };
        stats.add_dimension("pool_hits", load(&self.metrics.hits));
        stats.add_dimension("pool_misses", load(&self.metrics.misses));
        stats.add_dimension("pool_releases", load(&self.metrics.releases));
        stats.add_dimension("pool_discards", load(&self.metrics.discards));
        stats.add_dimension("lost_leases", load(&self.metrics.forgotten));
        stats
    }
}

impl core::fmt::Debug for SimplePool {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SimplePool")
            .field("name", &self.name)
            .field("buffer_size", &self.buffer_size)
            .field("max_idle", &self.max_idle)
            .field("idle", &self.idle_count())
            .finish()
    }
}

/// 子池计数器。`available_bytes` 只在持有自由链表锁时修改，与链表内容保持一致。
#[derive(Default)]
struct PoolMetrics {
    allocated_bytes: AtomicUsize,
    resident_bytes: AtomicUsize,
    available_bytes: AtomicUsize,
    active_leases: AtomicUsize,
    hits: AtomicUsize,
    misses: AtomicUsize,
    releases: AtomicUsize,
    discards: AtomicUsize,
    forgotten: AtomicUsize,
    failed_acquisitions: AtomicU64,
}

impl PoolMetrics {
    fn on_created(&self, capacity: usize) {
        self.allocated_bytes.fetch_add(capacity, Ordering::Relaxed);
        self.resident_bytes.fetch_add(capacity, Ordering::Relaxed);
    }

    fn on_reused(&self, capacity: usize) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        sub_floor(&self.available_bytes, capacity);
    }

    fn on_parked(&self, capacity: usize) {
        self.releases.fetch_add(1, Ordering::Relaxed);
        self.available_bytes.fetch_add(capacity, Ordering::Relaxed);
    }

    fn on_discarded(&self, capacity: usize) {
        self.discards.fetch_add(1, Ordering::Relaxed);
        sub_floor(&self.resident_bytes, capacity);
    }

    fn on_drained(&self, bytes: usize) {
        sub_floor(&self.available_bytes, bytes);
        sub_floor(&self.resident_bytes, bytes);
    }
}

/// 原子地减去 `value`，结果不低于 0。
fn sub_floor(counter: &AtomicUsize, value: usize) {
    let _ = counter.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
        Some(current.saturating_sub(value))
    });
}

use std::borrow::Cow;

use super::ByteBuf;
use crate::error::Result;

/// `SizeClassPool` 规定单一尺寸自由链表（子池）的接口。
///
/// # 设计背景（Why）
/// - 分级池前端为每个 2 的幂尺寸持有一个子池；前端本身不加锁，
///   同一分级上并发 `acquire`/`release` 的互斥完全交由子池负责；
/// - 以 trait 形式暴露，调用方可以注入带容量上限、带监控或基于其它同步原语的实现。
///
/// # 契约说明（What）
/// - `buffer_size`：该子池管理的缓冲容量，构造后不变；
/// - `acquire`：优先返回自由链表中的缓冲，否则调用创建回调分配一块恰为 `buffer_size` 字节的新缓冲；
///   分配失败原样返回错误；
/// - `release`：将缓冲放回自由链表。**前置条件**：`buffer.capacity() == buffer_size()`；
///   子池不清零内容，下一位租借者看到的是上一位留下的数据；
/// - `clear`：清空自由链表并返回被丢弃的字节数，已借出的缓冲不受影响；
/// - 实现必须线程安全；`acquire` 与 `release` 之间的先后顺序（LIFO/FIFO）由实现自行决定。
pub trait SizeClassPool: Send + Sync + 'static {
    /// 诊断用名称，例如 `ByteBufferPool-2^10`。
    fn name(&self) -> &str;

    fn buffer_size(&self) -> usize;

    fn acquire(&self) -> Result<ByteBuf>;

    fn release(&self, buffer: ByteBuf);

    fn clear(&self) -> usize;

    /// 一次租借不会再归还：缓冲被调用方取走，或因容量不符被丢弃。
    ///
    /// 子池据此结束该租借的计数；默认实现什么也不做。
    fn forget_lease(&self) {}

    /// 子池当前指标快照；默认返回空快照。
    fn statistics(&self) -> PoolStats {
        PoolStats::default()
    }
}

/// 面向调用方的租借入口：按任意字节数取得一块缓冲。
///
/// - `get` 返回的缓冲可见上限恰为 `size`，真实容量由实现决定（分级池中为取整后的 2 的幂）；
/// - `Buffer` 通常是一个在关闭/析构时把底层内存归还池的包装类型。
pub trait BufferProvider: Send + Sync {
    type Buffer;

    fn get(&self, size: usize) -> Result<Self::Buffer>;
}

/// 池统计快照，帮助调用方观测内存行为。
///
/// # 字段含义（What）
/// - `allocated_bytes`：累计通过创建回调分配的字节数，只增不减；
/// - `resident_bytes`：池当前负责的字节数（已借出 + 闲置），清空、丢弃或租借被放弃时下降；
/// - `active_leases`：尚未归还的缓冲数量；被取走或被丢弃的租借经 `forget_lease` 结束，不再计入；
/// - `available_bytes`：自由链表中闲置、可直接复用的字节数；
/// - `idle_buffers`：自由链表中的缓冲数量；
/// - `failed_acquisitions`：创建回调返回错误的累计次数；
/// - `custom_dimensions`：实现自定义指标，键使用稳定的蛇形命名。
///
/// 快照为值语义，代表调用瞬间的状态，各字段之间不保证原子一致。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub allocated_bytes: usize,
    pub resident_bytes: usize,
    pub active_leases: usize,
    pub available_bytes: usize,
    pub idle_buffers: usize,
    pub failed_acquisitions: u64,
    pub custom_dimensions: Vec<PoolStatDimension>,
}

impl PoolStats {
    /// 按键查找自定义维度。
    pub fn dimension(&self, key: &str) -> Option<usize> {
        self.custom_dimensions
            .iter()
            .find(|dim| dim.key == key)
            .map(|dim| dim.value)
    }

    /// 将另一份快照累加进来；同名维度求和，新维度按出现顺序追加。
    pub fn merge(&mut self, other: &PoolStats) {
        self.allocated_bytes += other.allocated_bytes;
        self.resident_bytes += other.resident_bytes;
        self.active_leases += other.active_leases;
        self.available_bytes += other.available_bytes;
        self.idle_buffers += other.idle_buffers;
        self.failed_acquisitions += other.failed_acquisitions;
        for dim in &other.custom_dimensions {
            self.add_dimension(dim.key.clone(), dim.value);
        }
    }

    /// 对指定维度累加 `value`，不存在时新建。
    pub fn add_dimension(&mut self, key: impl Into<Cow<'static, str>>, value: usize) {
        let key = key.into();
        match self.custom_dimensions.iter_mut().find(|dim| dim.key == key) {
            Some(existing) => existing.value += value,
            None => self.custom_dimensions.push(PoolStatDimension { key, value }),
        }
    }
}

/// 扩展指标维度。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolStatDimension {
    pub key: Cow<'static, str>,
    pub value: usize,
}

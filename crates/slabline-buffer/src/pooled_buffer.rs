use core::{
    fmt,
    ops::{Deref, DerefMut},
};
use std::sync::Arc;

use bytes::{Buf, BufMut, buf::UninitSlice};
use slabline_core::{ByteBuf, SizeClassPool};
use tracing::{trace, warn};

/// `PooledBuffer` 是分级池交给调用方的缓冲包装，关闭时把底层 [`ByteBuf`] 归还给所属子池。
///
/// # 设计动机（Why）
/// - 调用方只关心“拿到一块至少 `size` 字节的缓冲，用完交还”，不应关心它来自哪个分级；
/// - 租借时即记下所属子池的句柄，归还时直接路由，无需再按容量查表，
///   也就不依赖“容量总能映射回原分级”这一隐含假设。
///
/// # 状态机（How）
/// - `Open → Closed`，单向且终态；
/// - [`PooledBuffer::close`] 在 `Open` 时取出底层缓冲执行一次归还，随后置为 `Closed`；
///   再次调用是安全的空操作，杜绝重复归还；
/// - `Drop` 同样执行 `close`，忘记显式关闭的缓冲也会回到池中。
///
/// # 契约说明（What）
/// - 归还路由：
///   - 存在所属子池且容量等于其分级尺寸：放回该子池的自由链表，内容不清零；
///   - 存在所属子池但容量不匹配：丢弃并记录告警，保证子池中的缓冲容量恒等于分级尺寸，
///     同时通知子池该租借已结束；
///   - 无所属子池（超出最高分级或零字节请求的非池化分配）：静默丢弃，不报错；
/// - 读写通过 `Deref`/`DerefMut` 委派给 [`ByteBuf`]，也可作为 `bytes::Buf`/`bytes::BufMut` 使用；
/// - **关闭后访问是调用方违约**：任何读写都会 panic，池不把它当作可恢复的错误。
pub struct PooledBuffer {
    buffer: Option<ByteBuf>,
    owner: Option<Arc<dyn SizeClassPool>>,
}

impl PooledBuffer {
    /// 包装一块缓冲。`owner` 为 `None` 时该缓冲不会被回收。
    pub fn new(buffer: ByteBuf, owner: Option<Arc<dyn SizeClassPool>>) -> Self {
        Self {
            buffer: Some(buffer),
            owner,
        }
    }

    /// 包装一块不属于任何子池的缓冲，关闭时直接丢弃。
    pub fn unpooled(buffer: ByteBuf) -> Self {
        Self::new(buffer, None)
    }

    pub fn is_closed(&self) -> bool {
        self.buffer.is_none()
    }

    /// 是否会在关闭时归还给某个子池。
    pub fn is_pooled(&self) -> bool {
        self.owner.is_some()
    }

    /// 关闭缓冲并归还底层内存；重复调用为空操作。
    pub fn close(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            release(buffer, self.owner.take());
        }
    }

    /// 在未关闭时返回底层缓冲的引用。
    pub fn try_get(&self) -> Option<&ByteBuf> {
        self.buffer.as_ref()
    }

    /// 取走底层缓冲，使其脱离池的管理；已关闭时返回 `None`。
    ///
    /// 所属子池经 [`SizeClassPool::forget_lease`] 得知该租借不会归还。
    pub fn detach(mut self) -> Option<ByteBuf> {
        let buffer = self.buffer.take()?;
        if let Some(pool) = self.owner.take() {
            pool.forget_lease();
        }
        Some(buffer)
    }

    fn open(&self) -> &ByteBuf {
        match &self.buffer {
            Some(buffer) => buffer,
            None => panic!("PooledBuffer 已关闭，禁止继续访问底层缓冲"),
        }
    }

    fn open_mut(&mut self) -> &mut ByteBuf {
        match &mut self.buffer {
            Some(buffer) => buffer,
            None => panic!("PooledBuffer 已关闭，禁止继续访问底层缓冲"),
        }
    }
}

fn release(buffer: ByteBuf, owner: Option<Arc<dyn SizeClassPool>>) {
    match owner {
        Some(pool) if buffer.capacity() == pool.buffer_size() => {
            trace!(pool = pool.name(), capacity = buffer.capacity(), "buffer returned to bucket");
            pool.release(buffer);
        }
        Some(pool) => {
            warn!(
                pool = pool.name(),
                bucket = pool.buffer_size(),
                capacity = buffer.capacity(),
                "buffer capacity does not match its bucket, dropping instead of recycling"
            );
            pool.forget_lease();
        }
        None => {
            trace!(capacity = buffer.capacity(), "unpooled buffer dropped");
        }
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        self.close();
    }
}

impl Deref for PooledBuffer {
    type Target = ByteBuf;

    fn deref(&self) -> &ByteBuf {
        self.open()
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut ByteBuf {
        self.open_mut()
    }
}

impl Buf for PooledBuffer {
    fn remaining(&self) -> usize {
        Buf::remaining(self.open())
    }

    fn chunk(&self) -> &[u8] {
        Buf::chunk(self.open())
    }

    fn advance(&mut self, cnt: usize) {
        Buf::advance(self.open_mut(), cnt);
    }
}

// 所有操作原样委派给内部 `ByteBuf`，其 `BufMut` 实现已满足安全约束。
unsafe impl BufMut for PooledBuffer {
    fn remaining_mut(&self) -> usize {
        BufMut::remaining_mut(self.open())
    }

    unsafe fn advance_mut(&mut self, cnt: usize) {
        unsafe { BufMut::advance_mut(self.open_mut(), cnt) }
    }

    fn chunk_mut(&mut self) -> &mut UninitSlice {
        BufMut::chunk_mut(self.open_mut())
    }
}

impl fmt::Debug for PooledBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledBuffer")
            .field("buffer", &self.buffer)
            .field("owner", &self.owner.as_ref().map(|pool| pool.name()))
            .finish()
    }
}

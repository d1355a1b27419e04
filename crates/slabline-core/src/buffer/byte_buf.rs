use core::fmt;

use bytes::{Buf, BufMut, Bytes, buf::UninitSlice};

use super::ByteOrder;
use crate::error::{PoolError, Result};

/// `ByteBuf` 是分级池管理的原始缓冲：固定容量、零初始化，并以游标描述可见区间。
///
/// # 设计动机（Why）
/// - 分级池复用的是“某个 2 的幂容量的内存块”，调用方却只应看到自己请求的字节数，
///   因此缓冲需要区分真实容量 `capacity` 与对外可见的上限 `limit`；
/// - 网络读写缓冲需要顺序读写与重置，`position`/`limit` 游标模型足以覆盖，
///   同时与 `bytes::Buf`/`bytes::BufMut` 的“剩余区间”语义一一对应。
///
/// # 结构设计（How）
/// - `storage`：长度恒等于容量的零初始化字节；分配通过 `try_reserve_exact` 完成，失败时返回错误而非中止进程；
/// - `position`：下一次读写的起点；`limit`：可见区间的终点，满足 `position <= limit <= capacity`；
/// - `order`：分配时确定的字节序，类型化读写（`write_i32`/`read_i32` 等）均遵循该字节序。
///
/// # 契约说明（What）
/// - `clear` 将游标复位为 `position = 0, limit = capacity`，不会擦除内容；
/// - `Buf` 读取与 `BufMut` 写入共享同一个 `position`，写完后调用 [`ByteBuf::flip`] 切换为读取；
/// - 类型化读写越界返回 [`PoolError::BufferOverflow`]/[`PoolError::BufferUnderflow`]；
///   经由 `bytes` trait 的越界访问遵循 `bytes` 的约定直接 panic。
pub struct ByteBuf {
    storage: Vec<u8>,
    position: usize,
    limit: usize,
    order: ByteOrder,
}

macro_rules! typed_io {
    ($($ty:ty => $write:ident, $read:ident;)*) => {
        $(
            #[doc = concat!("按缓冲字节序写入一个 `", stringify!($ty), "`，并推进 `position`。")]
            pub fn $write(&mut self, value: $ty) -> Result<()> {
                let raw = match self.order {
                    ByteOrder::LittleEndian => value.to_le_bytes(),
                    ByteOrder::BigEndian => value.to_be_bytes(),
                };
                self.write_bytes(&raw)
            }

            #[doc = concat!("按缓冲字节序读取一个 `", stringify!($ty), "`，并推进 `position`。")]
            pub fn $read(&mut self) -> Result<$ty> {
                let mut raw = [0u8; core::mem::size_of::<$ty>()];
                self.read_into(&mut raw)?;
                Ok(match self.order {
                    ByteOrder::LittleEndian => <$ty>::from_le_bytes(raw),
                    ByteOrder::BigEndian => <$ty>::from_be_bytes(raw),
                })
            }
        )*
    };
}

impl ByteBuf {
    /// 分配一块容量恰为 `capacity` 字节的零初始化缓冲。
    ///
    /// # 契约
    /// - **后置条件**：返回的缓冲 `position = 0`、`limit = capacity`，字节序为 `order`；
    /// - **错误**：平台无法提供内存时返回 [`PoolError::AllocationFailed`]，调用方不应重试。
    pub fn allocate(capacity: usize, order: ByteOrder) -> Result<Self> {
        let mut storage = Vec::new();
        storage
            .try_reserve_exact(capacity)
            .map_err(|source| PoolError::AllocationFailed {
                size: capacity,
                source,
            })?;
        storage.resize(capacity, 0);
        Ok(Self {
            storage,
            position: 0,
            limit: capacity,
            order,
        })
    }

    /// 底层内存块的真实容量，复用期间保持不变。
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    pub fn order(&self) -> ByteOrder {
        self.order
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// `position` 与 `limit` 之间的字节数。
    pub fn remaining(&self) -> usize {
        self.limit - self.position
    }

    pub fn has_remaining(&self) -> bool {
        self.position < self.limit
    }

    /// 复位游标：`position = 0`，`limit = capacity`。内容保持原样。
    pub fn clear(&mut self) {
        self.position = 0;
        self.limit = self.capacity();
    }

    /// 收窄（或放宽）可见区间。若当前 `position` 超出新上限，则一并截断到新上限。
    pub fn set_limit(&mut self, limit: usize) -> Result<()> {
        if limit > self.capacity() {
            return Err(PoolError::LimitOutOfRange {
                limit,
                capacity: self.capacity(),
            });
        }
        self.limit = limit;
        if self.position > limit {
            self.position = limit;
        }
        Ok(())
    }

    pub fn set_position(&mut self, position: usize) -> Result<()> {
        if position > self.limit {
            return Err(PoolError::PositionOutOfRange {
                position,
                limit: self.limit,
            });
        }
        self.position = position;
        Ok(())
    }

    /// 写入结束后切换为读取：`limit = position`，`position = 0`。
    pub fn flip(&mut self) {
        self.limit = self.position;
        self.position = 0;
    }

    /// `[0, limit)` 区间的只读视图。
    pub fn as_slice(&self) -> &[u8] {
        &self.storage[..self.limit]
    }

    /// `[0, limit)` 区间的可写视图，不移动游标。
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.storage[..self.limit]
    }

    /// 将 `[position, limit)` 的内容复制为独立的 `Bytes`，不移动游标。
    pub fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(&self.storage[self.position..self.limit])
    }

    /// 顺序写入一段字节。
    pub fn write_bytes(&mut self, src: &[u8]) -> Result<()> {
        let remaining = self.remaining();
        if src.len() > remaining {
            return Err(PoolError::BufferOverflow {
                needed: src.len(),
                remaining,
            });
        }
        let end = self.position + src.len();
        self.storage[self.position..end].copy_from_slice(src);
        self.position = end;
        Ok(())
    }

    /// 顺序读取 `dst.len()` 字节到目标切片。
    pub fn read_into(&mut self, dst: &mut [u8]) -> Result<()> {
        let remaining = self.remaining();
        if dst.len() > remaining {
            return Err(PoolError::BufferUnderflow {
                needed: dst.len(),
                remaining,
            });
        }
        let end = self.position + dst.len();
        dst.copy_from_slice(&self.storage[self.position..end]);
        self.position = end;
        Ok(())
    }

    /// 顺序读取 `len` 字节并复制为 `Bytes`。
    pub fn read_bytes(&mut self, len: usize) -> Result<Bytes> {
        let remaining = self.remaining();
        if len > remaining {
            return Err(PoolError::BufferUnderflow {
                needed: len,
                remaining,
            });
        }
        let start = self.position;
        self.position += len;
        Ok(Bytes::copy_from_slice(&self.storage[start..self.position]))
    }

    /// 在绝对下标处按缓冲字节序读取 `i32`，不移动游标。
    ///
    /// 常用于窥视长度前缀（例如 BSON 文档头）而不消费数据。
    pub fn read_i32_at(&self, index: usize) -> Result<i32> {
        let available = self.limit.saturating_sub(index);
        if available < 4 {
            return Err(PoolError::BufferUnderflow {
                needed: 4,
                remaining: available,
            });
        }
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&self.storage[index..index + 4]);
        Ok(match self.order {
            ByteOrder::LittleEndian => i32::from_le_bytes(raw),
            ByteOrder::BigEndian => i32::from_be_bytes(raw),
        })
    }

    typed_io! {
        u8 => write_u8, read_u8;
        i32 => write_i32, read_i32;
        u32 => write_u32, read_u32;
        i64 => write_i64, read_i64;
        f64 => write_f64, read_f64;
    }
}

impl fmt::Debug for ByteBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteBuf")
            .field("capacity", &self.capacity())
            .field("position", &self.position)
            .field("limit", &self.limit)
            .field("order", &self.order)
            .finish()
    }
}

impl Buf for ByteBuf {
    fn remaining(&self) -> usize {
        self.limit - self.position
    }

    fn chunk(&self) -> &[u8] {
        &self.storage[self.position..self.limit]
    }

    fn advance(&mut self, cnt: usize) {
        assert!(
            cnt <= self.limit - self.position,
            "ByteBuf::advance 超出剩余可读字节：请求 {cnt}，剩余 {}",
            self.limit - self.position
        );
        self.position += cnt;
    }
}

// `storage` 在分配时已全部初始化，`chunk_mut` 暴露的区间不含未初始化内存；
// `advance_mut` 只推进不超过 `limit` 的游标。
unsafe impl BufMut for ByteBuf {
    fn remaining_mut(&self) -> usize {
        self.limit - self.position
    }

    unsafe fn advance_mut(&mut self, cnt: usize) {
        assert!(
            cnt <= self.limit - self.position,
            "ByteBuf::advance_mut 超出剩余可写空间：请求 {cnt}，剩余 {}",
            self.limit - self.position
        );
        self.position += cnt;
    }

    fn chunk_mut(&mut self) -> &mut UninitSlice {
        UninitSlice::new(&mut self.storage[self.position..self.limit])
    }
}

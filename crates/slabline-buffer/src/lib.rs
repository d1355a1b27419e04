//! `slabline-buffer` 提供按 2 的幂分级复用 I/O 缓冲的缓冲池实现。
//!
//! # 模块定位（Why）
//! - 网络读写缓冲尺寸多变、生命周期短，逐次分配的成本不可忽视；
//!   将每个请求向上取整到最近的 2 的幂，再从对应分级的自由链表复用，即可摊薄分配开销。
//! - `slabline-core` 只定义契约，本 crate 落地分级前端、默认子池与包装类型。
//!
//! # 设计概要（How）
//! - [`size_class`]：32 位位运算取整算法与分级常量；
//! - `pool` 模块实现 [`SimplePool`]，即单尺寸自由链表，负责并发互斥与指标统计；
//! - `power_of_two` 模块实现 [`PowerOfTwoBufferPool`]，构造时为 `2^0..=2^H` 各建一个子池，
//!   构造后分级表只读，`get` 的查表路径无需加锁；
//! - `pooled_buffer` 模块实现 [`PooledBuffer`]，在租借时记住所属子池，关闭（或析构）时恰好归还一次；
//! - `config` 模块实现 [`PoolConfig`]，支持代码构造或（启用 `toml` 特性时）从 TOML 解析。
//!
//! # 使用方式
//! 池以显式构造、显式传递的方式使用，不提供进程级单例：
//!
//! ```
//! use slabline_buffer::PowerOfTwoBufferPool;
//!
//! let pool = PowerOfTwoBufferPool::new();
//! let mut buffer = pool.get(100)?;
//! assert_eq!(buffer.capacity(), 128);
//! assert_eq!(buffer.limit(), 100);
//! buffer.write_i32(42)?;
//! buffer.close();
//! # Ok::<(), slabline_buffer::PoolError>(())
//! ```

mod config;
mod pool;
mod pooled_buffer;
mod power_of_two;
pub mod size_class;

pub use config::PoolConfig;
pub use pool::{BufferFactory, SimplePool};
pub use pooled_buffer::PooledBuffer;
pub use power_of_two::{BucketSpec, PowerOfTwoBufferPool};

pub use slabline_core::{
    BufferProvider, ByteBuf, ByteOrder, PoolError, PoolStatDimension, PoolStats, Result,
    SizeClassPool,
};

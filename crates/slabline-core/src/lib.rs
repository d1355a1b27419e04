//! `slabline-core` 定义分级缓冲池的核心契约。
//!
//! # 模块定位（Why）
//! - 分级池（size-class pool）的前端只关心“按 2 的幂取整后交给哪个子池”，
//!   真正的自由链表、原始缓冲都应以契约形式存在，便于替换与测试注入。
//! - 将这些契约集中在独立 crate，`slabline-buffer` 只依赖接口而非具体实现，
//!   调用方也可以按需提供自定义子池（例如带容量上限或带监控的实现）。
//!
//! # 设计概要（How）
//! - [`buffer::ByteBuf`]：固定容量、带 `position`/`limit` 游标的原始缓冲，字节序在分配时确定；
//! - [`buffer::SizeClassPool`]：单一尺寸的自由链表接口，负责 `acquire`/`release`/`clear`；
//! - [`buffer::BufferProvider`]：面向调用方的“按字节数租借缓冲”入口；
//! - [`buffer::PoolStats`]：池化指标快照；
//! - [`PoolError`]：统一错误域，覆盖分配失败、越界游标与非法配置。

pub mod buffer;
pub mod error;

pub use buffer::{
    BufferProvider, ByteBuf, ByteOrder, PoolStatDimension, PoolStats, SizeClassPool,
};
pub use error::{PoolError, Result};

//! 缓冲区契约模块。
//!
//! # 模块架构（Why）
//! - 原始缓冲（[`ByteBuf`]）、字节序（[`ByteOrder`]）与池化接口（[`pool`]）拆分为独立子模块，
//!   分级池前端只依赖这些契约，不感知具体的自由链表实现。
//!
//! # 设计总览（How）
//! - [`byte_buf`] 提供固定容量、游标式读写的原始缓冲，并实现 `bytes::Buf`/`bytes::BufMut`；
//! - [`byte_order`] 描述缓冲在创建时确定的字节序；
//! - [`pool`] 约束单尺寸子池与面向调用方的租借入口，并定义统计快照。

pub mod byte_buf;
pub mod byte_order;
pub mod pool;

pub use byte_buf::ByteBuf;
pub use byte_order::ByteOrder;
pub use pool::{BufferProvider, PoolStatDimension, PoolStats, SizeClassPool};

//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 为缓冲分配、游标操作与池配置提供集中定义的错误域；
//! - 分配失败必须原样传播给 `get()` 的调用方，不在池内部重试，因此错误需要携带底层原因。
//!
//! ## 设计要求（What）
//! - 全部变体派生 `thiserror::Error`，与 `std::error::Error` 生态兼容；
//! - 变体字段均为 `Clone + Eq`，方便测试直接断言；
//! - 重复关闭、超出最大分级的请求都不是错误，不在此定义。

use std::collections::TryReserveError;

use thiserror::Error;

/// 缓冲池统一错误类型。
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    /// 平台无法提供请求的内存。
    ///
    /// - **契约 (What)**：`size` 为本次申请的字节数，`source` 保留 `try_reserve_exact` 的原始错误；
    /// - **风险 (Trade-offs)**：该错误视为致命，池不会降级或重试，调用方自行决定是否中止连接。
    #[error("分配 {size} 字节缓冲失败: {source}")]
    AllocationFailed {
        size: usize,
        #[source]
        source: TryReserveError,
    },

    /// 请求尺寸超出 32 位取整算法的定义域。
    #[error("请求 {requested} 字节超出可取整上限 {max} 字节")]
    RequestTooLarge { requested: usize, max: usize },

    /// 最高分级指数超出支持范围。
    #[error("最高分级指数 {exponent} 非法，允许范围为 0..={max}")]
    InvalidExponent { exponent: u32, max: u32 },

    /// `set_limit` 的目标值大于缓冲容量。
    #[error("limit {limit} 超出缓冲容量 {capacity}")]
    LimitOutOfRange { limit: usize, capacity: usize },

    /// `set_position` 的目标值大于当前 limit。
    #[error("position {position} 超出当前 limit {limit}")]
    PositionOutOfRange { position: usize, limit: usize },

    /// 写入所需字节数大于剩余可写空间。
    #[error("写入需要 {needed} 字节，剩余可写仅 {remaining} 字节")]
    BufferOverflow { needed: usize, remaining: usize },

    /// 读取所需字节数大于剩余可读数据。
    #[error("读取需要 {needed} 字节，剩余可读仅 {remaining} 字节")]
    BufferUnderflow { needed: usize, remaining: usize },

    /// 配置内容无法解析或语义不合法。
    #[error("缓冲池配置无效: {detail}")]
    InvalidConfig { detail: String },
}

/// 缓冲池操作的结果别名。
pub type Result<T, E = PoolError> = core::result::Result<T, E>;

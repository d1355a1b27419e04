use serde::Deserialize;
use slabline_core::{PoolError, Result};

use crate::size_class::{DEFAULT_HIGHEST_POWER_OF_TWO_EXPONENT, MAX_POWER_OF_TWO_EXPONENT};

/// 分级池的构造配置。
///
/// ## 意图（Why）
/// - 将“最高分级指数”与“每个分级的闲置上限”集中为一个可序列化的值对象，
///   既能在代码中以 `with_*` 链式构造，也能从部署配置中反序列化。
///
/// ## 契约说明（What）
/// - `highest_power_of_two_exponent`：最高分级指数 `H`，分级表覆盖 `2^0..=2^H`，允许范围 `0..=31`，默认 24；
/// - `max_idle_per_bucket`：每个分级自由链表的长度上限，`None`（默认）表示不设上限；
///   `Some(0)` 表示从不保留闲置缓冲，等价于关闭复用；
/// - [`PoolConfig::validate`] 在构造池之前调用，非法指数返回 [`PoolError::InvalidExponent`]。
///
/// ## 注意事项（Trade-offs）
/// - 默认不设闲置上限，流量峰值后各分级会保留峰值数量的缓冲，可通过
///   [`PowerOfTwoBufferPool::clear`](crate::PowerOfTwoBufferPool::clear) 主动归还。
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolConfig {
    highest_power_of_two_exponent: u32,
    max_idle_per_bucket: Option<usize>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl PoolConfig {
    pub const fn new() -> Self {
        Self {
            highest_power_of_two_exponent: DEFAULT_HIGHEST_POWER_OF_TWO_EXPONENT,
            max_idle_per_bucket: None,
        }
    }

    pub fn with_highest_power_of_two_exponent(mut self, exponent: u32) -> Self {
        self.highest_power_of_two_exponent = exponent;
        self
    }

    pub fn with_max_idle_per_bucket(mut self, max_idle: Option<usize>) -> Self {
        self.max_idle_per_bucket = max_idle;
        self
    }

    pub fn highest_power_of_two_exponent(&self) -> u32 {
        self.highest_power_of_two_exponent
    }

    pub fn max_idle_per_bucket(&self) -> Option<usize> {
        self.max_idle_per_bucket
    }

    pub fn validate(&self) -> Result<()> {
        if self.highest_power_of_two_exponent > MAX_POWER_OF_TWO_EXPONENT {
            return Err(PoolError::InvalidExponent {
                exponent: self.highest_power_of_two_exponent,
                max: MAX_POWER_OF_TWO_EXPONENT,
            });
        }
        Ok(())
    }

    /// 从 TOML 文本解析并校验配置。缺省字段取默认值，未知字段视为错误。
    ///
    /// ```toml
    /// highest_power_of_two_exponent = 20
    /// max_idle_per_bucket = 64
    /// ```
    #[cfg(feature = "toml")]
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|err| PoolError::InvalidConfig {
            detail: err.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }
}

//! 分级尺寸计算。
//!
//! 取整算法只覆盖 32 位宽度：`size` 为 0 时结果为 0，超过 `2^31` 时结果回绕为 0。
//! 这两个边界是算法本身的行为，由 [`bucket_for`] 在调用前拦截超出定义域的请求，
//! 而不是在取整函数里“修正”。

/// 默认最高分级指数，对应最大分级 `2^24` = 16 MiB。
pub const DEFAULT_HIGHEST_POWER_OF_TWO_EXPONENT: u32 = 24;

/// 允许配置的最高分级指数；`2^31` 是 32 位取整算法能产出的最大 2 的幂。
pub const MAX_POWER_OF_TWO_EXPONENT: u32 = 31;

/// 分级池可接受的最大请求字节数。
pub const MAX_REQUEST_SIZE: usize = 1 << MAX_POWER_OF_TWO_EXPONENT;

/// 将 `size` 向上取整到不小于它的最小 2 的幂。
///
/// 经典位运算：先减一，再依次与自身右移 1、2、4、8、16 位的结果按位或，把最高位以下全部置 1，
/// 最后加一。
///
/// - `size >= 1` 且 `size <= 2^31`：返回最小的 `2^k >= size`；
/// - `size == 0`：减一回绕为全 1，加一再回绕为 `0`；
/// - `size > 2^31`：同理回绕为 `0`。
pub const fn round_up_to_next_highest_power_of_two(size: u32) -> u32 {
    let mut v = size.wrapping_sub(1);
    v |= v >> 1;
    v |= v >> 2;
    v |= v >> 4;
    v |= v >> 8;
    v |= v >> 16;
    v.wrapping_add(1)
}

/// 请求尺寸对应的分级尺寸；超出 [`MAX_REQUEST_SIZE`] 时返回 `None`。
///
/// 返回的值可能不在某个池的分级表中（例如 `0`，或大于该池的最高分级），
/// 此时由调用方走非池化分配。
pub fn bucket_for(size: usize) -> Option<usize> {
    if size > MAX_REQUEST_SIZE {
        return None;
    }
    let rounded = round_up_to_next_highest_power_of_two(size as u32);
    Some(rounded as usize)
}

/// 依次产出 `(指数, 分级尺寸)`，覆盖 `2^0..=2^highest_exponent`。
///
/// 调用方需保证 `highest_exponent <= MAX_POWER_OF_TWO_EXPONENT`。
pub fn bucket_sizes(highest_exponent: u32) -> impl Iterator<Item = (u32, usize)> {
    (0..=highest_exponent).map(|exponent| (exponent, 1usize << exponent))
}

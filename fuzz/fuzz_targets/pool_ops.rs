#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use slabline_buffer::{PooledBuffer, PowerOfTwoBufferPool};

/// Fuzz 指令：描述一次分级池操作序列。
///
/// - **Why**：租借、关闭、清空与丢弃的任意交错都不应让缓冲进入错误的分级，也不应造成重复归还；
/// - **How**：以索引选择已借出的缓冲，请求尺寸限制在 16 位以内，避免单次分配过大拖慢 Fuzzer；
/// - **What**：每一步之后检查借出计数与容量不变式。
#[derive(Debug, Arbitrary)]
struct PoolCase {
    highest_exponent: u8,
    ops: Vec<PoolOp>,
}

#[derive(Debug, Arbitrary)]
enum PoolOp {
    /// 租借 `size` 字节并写满可见窗口。
    Get { size: u16 },
    /// 显式关闭一块缓冲，可能重复关闭。
    Close { id: u8 },
    /// 丢弃包装，走 `Drop` 归还路径。
    Drop { id: u8 },
    /// 取走底层缓冲，使其脱离池。
    Detach { id: u8 },
    /// 清空所有分级。
    Clear,
}

fuzz_target!(|case: PoolCase| {
    let exponent = u32::from(case.highest_exponent % 17);
    let Ok(pool) = PowerOfTwoBufferPool::with_highest_exponent(exponent) else {
        return;
    };
    let mut leased: Vec<PooledBuffer> = Vec::new();

    for op in case.ops {
        match op {
            PoolOp::Get { size } => {
                let size = usize::from(size);
                let Ok(mut buffer) = pool.get(size) else {
                    return;
                };
                assert_eq!(buffer.limit(), size);
                assert!(buffer.capacity() >= size);
                if buffer.is_pooled() {
                    assert_eq!(buffer.capacity(), size.next_power_of_two());
                }
                let fill = vec![0x5Au8; size];
                assert!(buffer.write_bytes(&fill).is_ok());
                leased.push(buffer);
            }
            PoolOp::Close { id } => {
                if let Some(buffer) = pick(&mut leased, id) {
                    buffer.close();
                    buffer.close();
                }
            }
            PoolOp::Drop { id } => {
                if !leased.is_empty() {
                    let idx = usize::from(id) % leased.len();
                    drop(leased.swap_remove(idx));
                }
            }
            PoolOp::Detach { id } => {
                if !leased.is_empty() {
                    let idx = usize::from(id) % leased.len();
                    let _ = leased.swap_remove(idx).detach();
                }
            }
            PoolOp::Clear => {
                pool.clear();
            }
        }

        let open = leased
            .iter()
            .filter(|buffer| !buffer.is_closed() && buffer.is_pooled())
            .count();
        // 被取走的租借已经通知子池，不再计入借出。
        assert_eq!(pool.statistics().active_leases, open);
    }

    drop(leased);
    pool.clear();
    assert_eq!(pool.statistics().idle_buffers, 0);
});

fn pick(leased: &mut [PooledBuffer], id: u8) -> Option<&mut PooledBuffer> {
    if leased.is_empty() {
        return None;
    }
    let idx = usize::from(id) % leased.len();
    leased.get_mut(idx)
}

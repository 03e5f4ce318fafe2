//! 重组统计
//!
//! 多核并发更新，计数器全部为原子量；读取时取 [`DefragStatsSnapshot`]。

use core::sync::atomic::{AtomicU32, Ordering};

macro_rules! defrag_stats {
    ($($(#[$doc:meta])* $field:ident),* $(,)?) => {
        /// 原子计数器集合
        #[derive(Default)]
        pub struct DefragStats {
            $($(#[$doc])* pub $field: AtomicU32,)*
        }

        /// 某一时刻的计数值
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
        pub struct DefragStatsSnapshot {
            $($(#[$doc])* pub $field: u32,)*
        }

        impl DefragStats {
            pub fn snapshot(&self) -> DefragStatsSnapshot {
                DefragStatsSnapshot {
                    $($field: self.$field.load(Ordering::Relaxed),)*
                }
            }

            pub fn reset(&self) {
                $(self.$field.store(0, Ordering::Relaxed);)*
            }
        }
    };
}

defrag_stats! {
    /// 进入异常路径的分片数
    rx_frags,
    /// 当前在等待队列中的链数
    rx_frag_wait,
    /// 丢弃或重组失败的次数
    rx_frag_err,
    /// 序号切换冲掉旧链的次数
    rx_frag_oor,
    rx_frag_err_len_error,
    rx_frag_err_no_peer,
    /// 回注成功次数
    reo_reinject,
    reo_reinject_fail,
    defrag_peer_uninit,
    defrag_ad1_invalid,
    /// 超时清理的链数
    rx_frag_timeout,
    mic_err,
    pn_err,
    /// 直接递交协议栈的帧数
    rx_frag_delivered,
}

impl DefragStats {
    #[inline]
    pub fn inc(counter: &AtomicU32) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// 用于计量型计数（如 `rx_frag_wait`），不低于 0
    #[inline]
    pub fn dec(counter: &AtomicU32) {
        let _ = counter.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_sub(1));
    }
}

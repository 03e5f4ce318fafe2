//! 回注环历史：最近若干次入口环写入，供故障后排查

use core::sync::atomic::{AtomicUsize, Ordering};

use alloc::vec::Vec;

use crate::desc::BufAddrInfo;

/// 历史深度
pub const REINJECT_HISTORY_SIZE: usize = 64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReinjectRecord {
    pub timestamp_ms: u64,
    pub paddr: u64,
    pub sw_cookie: u32,
    pub rbm: u8,
}

/// 固定长度环形记录
pub struct ReinjectHistory {
    next: AtomicUsize,
    entries: spin::Mutex<[ReinjectRecord; REINJECT_HISTORY_SIZE]>,
}

impl ReinjectHistory {
    pub const fn new() -> Self {
        const EMPTY: ReinjectRecord = ReinjectRecord {
            timestamp_ms: 0,
            paddr: 0,
            sw_cookie: 0,
            rbm: 0,
        };
        Self {
            next: AtomicUsize::new(0),
            entries: spin::Mutex::new([EMPTY; REINJECT_HISTORY_SIZE]),
        }
    }

    pub fn record(&self, now_ms: u64, buf: &BufAddrInfo) {
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % REINJECT_HISTORY_SIZE;
        self.entries.lock()[idx] = ReinjectRecord {
            timestamp_ms: now_ms,
            paddr: buf.paddr,
            sw_cookie: buf.sw_cookie,
            rbm: buf.rbm,
        };
    }

    /// 累计写入次数
    pub fn total(&self) -> usize {
        self.next.load(Ordering::Relaxed)
    }

    /// 按时间先后返回仍保留的记录
    pub fn snapshot(&self) -> Vec<ReinjectRecord> {
        let entries = self.entries.lock();
        let total = self.total();
        let kept = total.min(REINJECT_HISTORY_SIZE);
        (total - kept..total)
            .map(|i| entries[i % REINJECT_HISTORY_SIZE])
            .collect()
    }
}

impl Default for ReinjectHistory {
    fn default() -> Self {
        Self::new()
    }
}

//! 未完成分片链的超时等待队列
//!
//! 全局一条，条目按入队先后排列；超时时长统一，因此队首截止时间最早。
//! 条目只持有 peer 的 `Weak` 与 tid，不拥有 TID 状态。
//! 加锁顺序：TID 锁 → 等待队列锁。

use alloc::collections::VecDeque;
use alloc::sync::{Arc, Weak};
use alloc::vec::Vec;

use crate::peer::{RxTidDefrag, TxRxPeer};

pub struct WaitEntry {
    pub peer_id: u16,
    pub peer: Weak<TxRxPeer>,
    pub tid: u8,
    pub deadline_ms: u64,
}

struct WaitlistInner {
    list: VecDeque<WaitEntry>,
    next_flush_ms: u64,
}

pub struct DefragWaitlist {
    inner: spin::Mutex<WaitlistInner>,
}

impl DefragWaitlist {
    pub const fn new() -> Self {
        Self {
            inner: spin::Mutex::new(WaitlistInner {
                list: VecDeque::new(),
                next_flush_ms: 0,
            }),
        }
    }

    /// 以 `state.defrag_timeout_ms` 为截止时间入队；已在队中则不重复入队，返回 false。
    /// 调用方持有该 TID 的锁。
    pub fn add(&self, peer: &Arc<TxRxPeer>, state: &mut RxTidDefrag) -> bool {
        if state.on_waitlist {
            return false;
        }
        let mut w = self.inner.lock();
        if w.list.is_empty() {
            w.next_flush_ms = state.defrag_timeout_ms;
        }
        w.list.push_back(WaitEntry {
            peer_id: peer.peer_id,
            peer: Arc::downgrade(peer),
            tid: state.tid,
            deadline_ms: state.defrag_timeout_ms,
        });
        state.on_waitlist = true;
        log::trace!(
            target: "wireless::dp::waitlist",
            "add peer {} tid {} deadline {}",
            peer.peer_id, state.tid, state.defrag_timeout_ms
        );
        true
    }

    /// 按 (peer, tid) 摘除，返回队中是否真有条目被摘掉。调用方持有该 TID 的锁。
    pub fn remove(&self, peer: &Arc<TxRxPeer>, state: &mut RxTidDefrag) -> bool {
        if !state.on_waitlist {
            return false;
        }
        state.on_waitlist = false;
        let ptr = Arc::as_ptr(peer);
        let tid = state.tid;
        let mut w = self.inner.lock();
        let before = w.list.len();
        w.list.retain(|e| !(e.tid == tid && e.peer.as_ptr() == ptr));
        w.list.len() != before
    }

    /// 取出截止时间不晚于 `now_ms` 的条目，并重算下次检查时间
    pub fn take_expired(&self, now_ms: u64, timeout_ms: u64) -> Vec<WaitEntry> {
        let mut w = self.inner.lock();
        let mut expired = Vec::new();
        while w.list.front().is_some_and(|e| e.deadline_ms <= now_ms) {
            if let Some(e) = w.list.pop_front() {
                expired.push(e);
            }
        }
        w.next_flush_ms = match w.list.front() {
            Some(e) => e.deadline_ms,
            None => now_ms + timeout_ms,
        };
        expired
    }

    pub fn next_flush_ms(&self) -> u64 {
        self.inner.lock().next_flush_ms
    }

    pub fn len(&self) -> usize {
        self.inner.lock().list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DefragWaitlist {
    fn default() -> Self {
        Self::new()
    }
}

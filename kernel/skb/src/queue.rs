//! SkbQueue：对应 Linux `struct sk_buff_head` 的 FIFO 队列
//!
//! 重组帧在不回注 REO 时经此队列递交协议栈。

use alloc::collections::VecDeque;

use super::SkBuff;

/// skb 的 FIFO 队列，对应 `struct sk_buff_head` + `skb_queue_tail` / `__skb_dequeue`。
pub struct SkbQueue {
    queue: VecDeque<SkBuff>,
}

impl SkbQueue {
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
        }
    }

    /// 队尾入队。对应 `__skb_queue_tail`。
    pub fn push_tail(&mut self, skb: SkBuff) {
        self.queue.push_back(skb);
    }

    /// 队首出队。对应 `__skb_dequeue`。
    pub fn pop_head(&mut self) -> Option<SkBuff> {
        self.queue.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// 队列中所有包的总字节数（含 ext 链）。
    pub fn total_bytes(&self) -> usize {
        self.queue.iter().map(SkBuff::total_len).sum()
    }

    /// 清空并丢弃所有 skb。
    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

impl Default for SkbQueue {
    fn default() -> Self {
        Self::new()
    }
}

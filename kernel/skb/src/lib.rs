//! Socket buffer (skb) 模块：对应 `linux/skbuff.h` 中 RX 数据面用到的部分
//!
//! - **[SkBuff]**：单包缓冲，`data`/`len`/`headroom`/`tailroom`、`put`/`pull`/`push`/`trim_tail`，
//!   以及重组结果使用的 ext 链（frag_list）
//! - **[SkbQueue]**：FIFO 队列（对应 `struct sk_buff_head`），用于向协议栈批量递交

#![cfg_attr(not(test), no_std)]

extern crate alloc;

mod queue;
mod skbuff;

pub use queue::SkbQueue;
pub use skbuff::{RxCb, SkBuff};

//! RX 分片重组数据面
//!
//! REO 把分片 MPDU 送到异常环，由本 crate 按 (peer, tid) 收集、校验、解封装并重组，
//! 再回注 REO 走正常的重排序与去重路径。
//!
//! - **fraglist**：按分片号有序的分片链
//! - **admission**：序号切换与 PN 连续性
//! - **cipher** / **michael**：逐分片安全封装剥离、TKIP Michael 校验
//! - **defrag**：整链重组为 Ethernet II 帧
//! - **waitlist**：未完成链的超时队列
//! - **reinject**：写 REO 入口环（或 `no-reinject` 下直接递交协议栈）
//! - **engine**：[`DefragEngine`]，异常环入口与 peer 生命周期
//! - **cfg** / **stats** / **error** / **notify**：配置、计数、错误、事件上报

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod admission;
pub mod cfg;
pub mod cipher;
pub mod defrag;
pub mod engine;
pub mod error;
pub mod fraglist;
pub mod michael;
pub mod notify;
pub mod peer;
pub mod reinject;
pub mod stats;
pub mod waitlist;

#[cfg(test)]
pub(crate) mod test_util;

pub use cfg::{parse_defrag_cfg, DefragCfg};
pub use cipher::{Cipher, CipherParams};
pub use engine::DefragEngine;
pub use error::{DefragError, ErrorKind};
pub use notify::{DefragNotify, MicErrInfo, NoopNotify};
pub use peer::{PeerTable, TxRxPeer, DP_MAX_TIDS, DP_NON_QOS_TID, SEC_MCAST, SEC_UCAST};
pub use stats::{DefragStats, DefragStatsSnapshot};

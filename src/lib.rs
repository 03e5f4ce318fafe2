//! 802.11 RX 分片重组 crate
//!
//! 整合 REO 异常环上的分片处理：HAL + 重组数据面
//! - hal: RX TLV、REO 描述符、环与描述符池 trait、软件模拟实现
//! - dp: 分片链、序号/PN 接纳、解封装、超时队列、REO 回注
//! - ieee80211 / skb: 帧格式与包缓冲

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub use dp;
pub use hal;
pub use ieee80211;
pub use skb;

use alloc::sync::Arc;

use dp::{parse_defrag_cfg, DefragCfg, DefragEngine, DefragNotify, NoopNotify};
use hal::stub::SoftHal;
use hal::{AxResult, DpHal, ReoDestDesc, RxDesc};

/// SoftHal 入口环深度
pub const SOFT_REO_RING_SIZE: usize = 64;

/// RX 重组上下文：重组引擎 + 平台 HAL
/// 平台初始化时创建，各核的错误环处理循环共享它把分片交给引擎。
/// HAL 的环与池自带锁，不同 (peer, tid) 的分片互不阻塞。
pub struct WirelessRx<H: DpHal> {
    pub engine: DefragEngine,
    pub hal: H,
}

impl<H: DpHal> WirelessRx<H> {
    pub fn new(cfg: DefragCfg, hal: H, notify: Arc<dyn DefragNotify>) -> Self {
        Self {
            engine: DefragEngine::new(cfg, notify),
            hal,
        }
    }

    /// 由 ini 文本（`dp_rx_defrag_timeout=` 等）创建
    pub fn from_cfg_text(file_data: &[u8], hal: H, notify: Arc<dyn DefragNotify>) -> Self {
        Self::new(parse_defrag_cfg(file_data), hal, notify)
    }

    pub fn engine(&self) -> &DefragEngine {
        &self.engine
    }

    /// 异常环上的一个分片，返回需补充的 RX 缓冲数
    pub fn frag_handle(&self, ring_desc: &ReoDestDesc, rx_desc: RxDesc, now_ms: u64) -> u32 {
        self.engine.frag_handle(&self.hal, ring_desc, rx_desc, now_ms)
    }

    /// 错误环处理循环末尾调用
    pub fn poll_timeout(&self, now_ms: u64) -> usize {
        self.engine.poll_timeout(&self.hal, now_ms)
    }

    pub fn delete_peer(&self, peer_id: u16) -> AxResult {
        self.engine.delete_peer(&self.hal, peer_id)
    }
}

/// 使用占位实现的初始化（无 REO 硬件时可用）
///
/// HAL 用 [`SoftHal`]，MIC 失败只记日志。平台接入真实 REO 后改为
/// `WirelessRx::new(cfg, RealHal, notify)`，notify 接到控制面的 MIC failure 上报。
pub fn wireless_rx_init_stub() -> WirelessRx<SoftHal> {
    log::info!(target: "wireless", "wireless: init rx defrag stub (SoftHal)");
    WirelessRx::new(
        DefragCfg::default(),
        SoftHal::new(SOFT_REO_RING_SIZE),
        Arc::new(NoopNotify),
    )
}

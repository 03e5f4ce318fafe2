//! 重组事件上报
//!
//! 控制面实现 [`DefragNotify`]：TKIP MIC 失败上报（触发 countermeasure），
//! 以及不回注 REO 时接收重组帧。

use ieee80211::MacAddr;
use skb::SkbQueue;

/// TSC 长度
pub const MIC_SEQ_CTR_SIZE: usize = 6;

/// MIC 失败信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MicErrInfo {
    pub vdev_id: u8,
    /// 接收地址（addr1）
    pub da_mac_addr: MacAddr,
    /// 发送地址（addr2）
    pub ta_mac_addr: MacAddr,
    pub multicast: bool,
    pub key_id: u8,
    pub tsc: [u8; MIC_SEQ_CTR_SIZE],
}

pub trait DefragNotify: Send + Sync {
    fn rx_mic_error(&self, info: &MicErrInfo);

    /// 重组帧直接递交协议栈（帧已去掉 RX TLV，`cb` 中带 vdev_id 与 tid）
    fn deliver_to_stack(&self, _vdev_id: u8, _peer_id: u16, _frames: SkbQueue) {}
}

/// 不关心事件时使用
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotify;

impl DefragNotify for NoopNotify {
    fn rx_mic_error(&self, info: &MicErrInfo) {
        log::warn!(
            target: "wireless::dp::defrag",
            "mic error vdev {} ta {:02x?} (no listener)",
            info.vdev_id, info.ta_mac_addr
        );
    }
}

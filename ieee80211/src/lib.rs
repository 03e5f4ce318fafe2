//! # ieee80211：IEEE 802.11 帧格式辅助
//!
//! RX 分片重组与解密剥离需要的 802.11 帧格式定义。
//!
//! ## 模块与 Linux 对应
//!
//! | 模块      | Linux 位置                    | 说明 |
//! |-----------|-------------------------------|------|
//! | ieee80211 | include/linux/ieee80211.h     | frame_control、seq_ctrl、DS 方向、头长度 |
//! | header    | struct ieee80211_hdr          | MPDU 头解析、DA/SA 推导 |
//! | crypto    | IEEE80211_*_HDR_LEN / MIC_LEN | WEP/TKIP/CCMP/GCMP 安全头与尾长度、LLC/SNAP |

#![cfg_attr(not(test), no_std)]

pub mod crypto;
pub mod header;
pub mod ieee80211;

pub use header::MacHeader;
pub use ieee80211::{
    fc, frag_num, frame_control, has_a4, has_more_frags, hdr_len, is_broadcast_ether_addr,
    is_data, is_multicast_ether_addr, is_qos_data, seq_num, DsDir, MacAddr, ETH_ALEN, FCS_LEN,
};

//! RX 数据面硬件抽象层
//!
//! - **tlv**：RX 缓冲前缀 TLV 布局与读写
//! - **desc**：REO 目的环/入口环描述符、MSDU link 描述符、驱动侧 RX 描述符
//! - **ops**：[`ReoRing`] / [`RxDescPool`] trait，平台按此接入真实硬件
//! - **history**：回注环写入历史
//! - **stub**：软件模拟实现 [`stub::SoftHal`]

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod desc;
pub mod history;
pub mod ops;
pub mod stub;
pub mod tlv;

pub use axerrno::{AxError, AxResult};
pub use desc::{
    mpdu_flags, peer_meta, BmAction, BufAddrInfo, BufferType, DescOwner, MpduDescInfo,
    MsduDescInfo, MsduLinkDesc, ReoDestDesc, ReoEntranceDesc, RxDesc, REO_DESC_WORDS,
};
pub use history::{ReinjectHistory, ReinjectRecord, REINJECT_HISTORY_SIZE};
pub use ops::{DpHal, ReoRing, RxDescPool};
pub use tlv::{RxPktTlv, RX_PKT_TLV_SIZE};

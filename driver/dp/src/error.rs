//! 重组错误
//!
//! 每个错误只影响一个 (peer, tid, seq)：由存储路径记统计、打日志后就地丢弃，不向上传播。

use core::fmt;

use axerrno::AxError;

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 分片不满足接纳条件，丢弃即可
    TransientAdmission,
    /// MIC 失败、PN 不连续、组播分片
    SecurityViolation,
    /// 内存或描述符不足
    ResourceExhaustion,
    /// 帧格式或分片语义不合法
    ProtocolViolation,
    /// 环访问失败、环满、link 描述符缺失
    HardwareAccessFailure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefragError {
    /// RX 缓冲到达时长度非 0 或 TLV/头不完整
    InvalidLength,
    /// 缓冲被应急池回收
    BufferRecycled,
    /// peer_id 查不到 peer
    NoPeer(u16),
    InvalidTid(u8),
    /// addr1 不是本 VDEV 地址
    InvalidAddr1,
    SeqCtrlInvalid,
    FrameCtrlInvalid,
    /// TID 未完成 RX 初始化
    TidNotSetup(u8),
    /// 未分片帧进入异常路径
    Unfragmented,
    /// 无在途链且首个分片号非 0
    NotFirstFragment(u8),
    /// 在途链序号与末片序号不一致
    StaleSequence(u16),
    /// 链上某分片带组播目的地址
    MulticastFragment,
    /// 相邻分片 PN 差不为 1
    PnDiscontinuity,
    /// TKIP/CCMP/GCMP 缺 ExtIV 位
    MissingExtIv,
    MicMismatch,
    /// 链不完整或缺头部分片
    BrokenChain,
    NoMemory,
    /// 缺少保存的头描述符
    NoHeadDesc,
    LinkDescNotFound,
    Hal(AxError),
}

impl DefragError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DefragError::NoPeer(_)
            | DefragError::InvalidTid(_)
            | DefragError::InvalidAddr1
            | DefragError::TidNotSetup(_)
            | DefragError::NotFirstFragment(_)
            | DefragError::StaleSequence(_)
            | DefragError::BufferRecycled => ErrorKind::TransientAdmission,
            DefragError::MulticastFragment
            | DefragError::PnDiscontinuity
            | DefragError::MissingExtIv
            | DefragError::MicMismatch => ErrorKind::SecurityViolation,
            DefragError::NoMemory => ErrorKind::ResourceExhaustion,
            DefragError::InvalidLength
            | DefragError::SeqCtrlInvalid
            | DefragError::FrameCtrlInvalid
            | DefragError::Unfragmented
            | DefragError::BrokenChain => ErrorKind::ProtocolViolation,
            DefragError::NoHeadDesc | DefragError::LinkDescNotFound | DefragError::Hal(_) => {
                ErrorKind::HardwareAccessFailure
            }
        }
    }
}

impl From<AxError> for DefragError {
    fn from(e: AxError) -> Self {
        match e {
            AxError::NoMemory => DefragError::NoMemory,
            other => DefragError::Hal(other),
        }
    }
}

impl fmt::Display for DefragError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefragError::InvalidLength => write!(f, "invalid rx buffer length"),
            DefragError::BufferRecycled => write!(f, "buffer taken by refill pool"),
            DefragError::NoPeer(id) => write!(f, "no peer for peer_id {}", id),
            DefragError::InvalidTid(tid) => write!(f, "invalid tid {}", tid),
            DefragError::InvalidAddr1 => write!(f, "addr1 is not the vdev address"),
            DefragError::SeqCtrlInvalid => write!(f, "sequence control invalid"),
            DefragError::FrameCtrlInvalid => write!(f, "frame control invalid"),
            DefragError::TidNotSetup(tid) => write!(f, "rx tid {} not set up", tid),
            DefragError::Unfragmented => write!(f, "unfragmented frame on exception path"),
            DefragError::NotFirstFragment(n) => write!(f, "chain must start at frag 0, got {}", n),
            DefragError::StaleSequence(seq) => write!(f, "seq {} does not match pending chain", seq),
            DefragError::MulticastFragment => write!(f, "multicast fragment"),
            DefragError::PnDiscontinuity => write!(f, "pn not contiguous"),
            DefragError::MissingExtIv => write!(f, "ext iv bit not set"),
            DefragError::MicMismatch => write!(f, "michael mic mismatch"),
            DefragError::BrokenChain => write!(f, "fragment chain broken"),
            DefragError::NoMemory => write!(f, "out of memory"),
            DefragError::NoHeadDesc => write!(f, "no saved head descriptor"),
            DefragError::LinkDescNotFound => write!(f, "msdu link descriptor not found"),
            DefragError::Hal(e) => write!(f, "hal error {:?}", e),
        }
    }
}

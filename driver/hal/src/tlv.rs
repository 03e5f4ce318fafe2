//! RX 包前缀 TLV
//!
//! 硬件在每个 RX 缓冲开头写入固定长度的 TLV 元数据，其后紧跟 802.11 MPDU。
//! 布局（小端）：
//!
//! | 偏移 | 长度 | 字段 |
//! |------|------|------|
//! | 0    | 2    | frame_control（`flags.FC_VALID` 置位时有效） |
//! | 2    | 2    | seq_ctrl（`flags.SEQ_CTRL_VALID` 置位时有效） |
//! | 4    | 1    | flags |
//! | 5    | 1    | tid |
//! | 6    | 2    | msdu_len（不含 TLV） |
//! | 8    | 8    | PN[63:0] |
//! | 16   | 8    | PN[127:64] |
//! | 24   | 8    | 保留 |

/// TLV 前缀总长度
pub const RX_PKT_TLV_SIZE: usize = 32;

pub mod flags {
    pub const FC_VALID: u8 = 1 << 0;
    pub const SEQ_CTRL_VALID: u8 = 1 << 1;
    /// 目的地址为组播/广播（硬件按 addr1 I/G 位给出）
    pub const MCAST: u8 = 1 << 2;
    pub const AD4_VALID: u8 = 1 << 3;
}

mod off {
    pub const FC: usize = 0;
    pub const SEQ_CTRL: usize = 2;
    pub const FLAGS: usize = 4;
    pub const TID: usize = 5;
    pub const MSDU_LEN: usize = 6;
    pub const PN_LO: usize = 8;
    pub const PN_HI: usize = 16;
}

/// TLV 解析结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RxPktTlv {
    pub frame_control: u16,
    pub seq_ctrl: u16,
    pub flags: u8,
    pub tid: u8,
    pub msdu_len: u16,
    /// 128 位 PN，`[lo, hi]`
    pub pn: [u64; 2],
}

fn le16(buf: &[u8], off: usize) -> u16 {
    u16::from_le_bytes([buf[off], buf[off + 1]])
}

fn le64(buf: &[u8], off: usize) -> u64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&buf[off..off + 8]);
    u64::from_le_bytes(b)
}

impl RxPktTlv {
    /// 从缓冲开头解析；不足 TLV 长度返回 None。
    pub fn parse(buf: &[u8]) -> Option<Self> {
        if buf.len() < RX_PKT_TLV_SIZE {
            return None;
        }
        Some(Self {
            frame_control: le16(buf, off::FC),
            seq_ctrl: le16(buf, off::SEQ_CTRL),
            flags: buf[off::FLAGS],
            tid: buf[off::TID],
            msdu_len: le16(buf, off::MSDU_LEN),
            pn: [le64(buf, off::PN_LO), le64(buf, off::PN_HI)],
        })
    }

    /// 写回缓冲开头（保留字段清零）。
    pub fn write(&self, buf: &mut [u8]) {
        let t = &mut buf[..RX_PKT_TLV_SIZE];
        t.fill(0);
        t[off::FC..off::FC + 2].copy_from_slice(&self.frame_control.to_le_bytes());
        t[off::SEQ_CTRL..off::SEQ_CTRL + 2].copy_from_slice(&self.seq_ctrl.to_le_bytes());
        t[off::FLAGS] = self.flags;
        t[off::TID] = self.tid;
        t[off::MSDU_LEN..off::MSDU_LEN + 2].copy_from_slice(&self.msdu_len.to_le_bytes());
        t[off::PN_LO..off::PN_LO + 8].copy_from_slice(&self.pn[0].to_le_bytes());
        t[off::PN_HI..off::PN_HI + 8].copy_from_slice(&self.pn[1].to_le_bytes());
    }

    #[inline]
    pub fn fc_valid(&self) -> bool {
        self.flags & flags::FC_VALID != 0
    }

    #[inline]
    pub fn seq_ctrl_valid(&self) -> bool {
        self.flags & flags::SEQ_CTRL_VALID != 0
    }

    #[inline]
    pub fn is_mcast(&self) -> bool {
        self.flags & flags::MCAST != 0
    }
}

/// 只取 msdu_len（不解析整块 TLV）
#[inline]
pub fn msdu_len_get(buf: &[u8]) -> u16 {
    le16(buf, off::MSDU_LEN)
}

/// 改写 TLV 中的 msdu_len（回注前更新为重组后长度）
#[inline]
pub fn msdu_len_set(buf: &mut [u8], len: u16) {
    buf[off::MSDU_LEN..off::MSDU_LEN + 2].copy_from_slice(&len.to_le_bytes());
}

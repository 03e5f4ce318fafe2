//! IEEE 802.11 类型与常量
//!
//! 对应 Linux include/linux/ieee80211.h 中 RX 数据面用到的部分：frame_control、seq_ctrl、
//! DS 方向位、QoS 控制字段与 MPDU 头长度。

/// MAC 地址长度
pub const ETH_ALEN: usize = 6;

/// MAC 地址
pub type MacAddr = [u8; ETH_ALEN];

/// 广播地址
pub const BROADCAST_ADDR: MacAddr = [0xff; ETH_ALEN];

/// frame_control 位定义（小端 u16：低字节 fc0，高字节 fc1）
pub mod fc {
    pub const TYPE_MASK: u16 = 0x000C;
    pub const TYPE_MGMT: u16 = 0x0000;
    pub const TYPE_CTL: u16 = 0x0004;
    pub const TYPE_DATA: u16 = 0x0008;
    pub const SUBTYPE_MASK: u16 = 0x00F0;
    /// QoS 数据子类型位（fc0 bit 7）
    pub const SUBTYPE_QOS: u16 = 0x0080;

    pub const TODS: u16 = 0x0100;
    pub const FROMDS: u16 = 0x0200;
    pub const DIR_MASK: u16 = 0x0300;
    pub const MORE_FRAGS: u16 = 0x0400;
    pub const RETRY: u16 = 0x0800;
    pub const PROTECTED: u16 = 0x4000;
    /// Order 位；QoS 数据帧上表示带 HT Control 字段
    pub const ORDER: u16 = 0x8000;
}

/// seq_ctrl 子域
pub mod sctl {
    pub const FRAG_MASK: u16 = 0x000F;
    pub const SEQ_SHIFT: u16 = 4;
}

/// QoS 控制字段中的 TID 掩码
pub const QOS_CTL_TID_MASK: u16 = 0x000F;

/// 3 地址 MPDU 头长度（fc + dur + a1/a2/a3 + seq）
pub const HDR_LEN_3ADDR: usize = 24;
/// ADDR4 字段长度
pub const ADDR4_LEN: usize = ETH_ALEN;
/// QoS 控制字段长度
pub const QOS_CTL_LEN: usize = 2;
/// HT Control 字段长度
pub const HT_CTL_LEN: usize = 4;
/// 帧尾 FCS 长度
pub const FCS_LEN: usize = 4;

/// DS 方向（frame_control 的 ToDS/FromDS 组合）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DsDir {
    NoDs,
    ToDs,
    FromDs,
    DsToDs,
}

impl DsDir {
    #[inline]
    pub fn from_fc(fc: u16) -> Self {
        match fc & fc::DIR_MASK {
            0 => DsDir::NoDs,
            fc::TODS => DsDir::ToDs,
            fc::FROMDS => DsDir::FromDs,
            _ => DsDir::DsToDs,
        }
    }
}

/// 从帧取 frame_control（前 2 字节，little-endian）
#[inline]
pub fn frame_control(buf: &[u8]) -> u16 {
    if buf.len() >= 2 {
        u16::from_le_bytes([buf[0], buf[1]])
    } else {
        0
    }
}

/// 是否数据帧
#[inline]
pub fn is_data(fc: u16) -> bool {
    (fc & fc::TYPE_MASK) == fc::TYPE_DATA
}

/// 是否带 QoS 控制字段的数据帧（数据类型且子类型 QoS 位置位）
#[inline]
pub fn is_qos_data(fc: u16) -> bool {
    (fc & (fc::TYPE_MASK | fc::SUBTYPE_QOS)) == (fc::TYPE_DATA | fc::SUBTYPE_QOS)
}

/// 是否 4 地址帧
#[inline]
pub fn has_a4(fc: u16) -> bool {
    (fc & fc::DIR_MASK) == fc::DIR_MASK
}

#[inline]
pub fn has_more_frags(fc: u16) -> bool {
    fc & fc::MORE_FRAGS != 0
}

#[inline]
pub fn has_protected(fc: u16) -> bool {
    fc & fc::PROTECTED != 0
}

/// 是否带 HT Control（QoS 数据帧且 Order 位置位）
#[inline]
pub fn has_htc(fc: u16) -> bool {
    is_qos_data(fc) && fc & fc::ORDER != 0
}

/// 由 frame_control 计算 MPDU 头长度
#[inline]
pub fn hdr_len(fc: u16) -> usize {
    let mut size = HDR_LEN_3ADDR;
    if has_a4(fc) {
        size += ADDR4_LEN;
    }
    if is_qos_data(fc) {
        size += QOS_CTL_LEN;
        if fc & fc::ORDER != 0 {
            size += HT_CTL_LEN;
        }
    }
    size
}

/// seq_ctrl 中的分片号
#[inline]
pub fn frag_num(seq_ctrl: u16) -> u8 {
    (seq_ctrl & sctl::FRAG_MASK) as u8
}

/// seq_ctrl 中的序列号（12 bit）
#[inline]
pub fn seq_num(seq_ctrl: u16) -> u16 {
    seq_ctrl >> sctl::SEQ_SHIFT
}

/// 组播/广播地址（I/G 位）
#[inline]
pub fn is_multicast_ether_addr(addr: &MacAddr) -> bool {
    addr[0] & 0x01 != 0
}

#[inline]
pub fn is_broadcast_ether_addr(addr: &MacAddr) -> bool {
    *addr == BROADCAST_ADDR
}

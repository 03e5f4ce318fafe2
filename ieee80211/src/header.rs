//! MPDU 头解析（对应 `struct ieee80211_hdr` / `ieee80211_qos_hdr`）
//!
//! 只读取 RX 重组需要的字段；头长度由 frame_control 推出，见 [`hdr_len`]。

use crate::ieee80211::{
    fc, frag_num, has_a4, has_more_frags, hdr_len, is_qos_data, seq_num, DsDir, MacAddr,
    ETH_ALEN, HDR_LEN_3ADDR, QOS_CTL_TID_MASK,
};

/// 解析后的 MPDU 头
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacHeader {
    pub frame_control: u16,
    pub addr1: MacAddr,
    pub addr2: MacAddr,
    pub addr3: MacAddr,
    pub seq_ctrl: u16,
    pub addr4: Option<MacAddr>,
    pub qos_ctrl: Option<u16>,
}

fn read_addr(buf: &[u8], off: usize) -> MacAddr {
    let mut a = [0u8; ETH_ALEN];
    a.copy_from_slice(&buf[off..off + ETH_ALEN]);
    a
}

impl MacHeader {
    /// 从 `buf` 起始处解析；长度不足返回 None。
    pub fn parse(buf: &[u8]) -> Option<Self> {
        if buf.len() < HDR_LEN_3ADDR {
            return None;
        }
        let frame_control = u16::from_le_bytes([buf[0], buf[1]]);
        if buf.len() < hdr_len(frame_control) {
            return None;
        }
        let mut off = HDR_LEN_3ADDR;
        let addr4 = if has_a4(frame_control) {
            let a = read_addr(buf, off);
            off += ETH_ALEN;
            Some(a)
        } else {
            None
        };
        let qos_ctrl = if is_qos_data(frame_control) {
            Some(u16::from_le_bytes([buf[off], buf[off + 1]]))
        } else {
            None
        };
        Some(Self {
            frame_control,
            addr1: read_addr(buf, 4),
            addr2: read_addr(buf, 10),
            addr3: read_addr(buf, 16),
            seq_ctrl: u16::from_le_bytes([buf[22], buf[23]]),
            addr4,
            qos_ctrl,
        })
    }

    #[inline]
    pub fn hdr_len(&self) -> usize {
        hdr_len(self.frame_control)
    }

    #[inline]
    pub fn ds_dir(&self) -> DsDir {
        DsDir::from_fc(self.frame_control)
    }

    #[inline]
    pub fn frag_num(&self) -> u8 {
        frag_num(self.seq_ctrl)
    }

    #[inline]
    pub fn seq_num(&self) -> u16 {
        seq_num(self.seq_ctrl)
    }

    #[inline]
    pub fn more_frags(&self) -> bool {
        has_more_frags(self.frame_control)
    }

    /// QoS TID（非 QoS 帧为 0）
    #[inline]
    pub fn tid(&self) -> u8 {
        self.qos_ctrl.map_or(0, |q| (q & QOS_CTL_TID_MASK) as u8)
    }

    /// 目的地址：NODS/FROMDS 为 addr1，TODS/DSTODS 为 addr3
    pub fn da(&self) -> MacAddr {
        match self.ds_dir() {
            DsDir::NoDs | DsDir::FromDs => self.addr1,
            DsDir::ToDs | DsDir::DsToDs => self.addr3,
        }
    }

    /// 源地址：NODS/TODS 为 addr2，FROMDS 为 addr3，DSTODS 为 addr4
    pub fn sa(&self) -> MacAddr {
        match self.ds_dir() {
            DsDir::NoDs | DsDir::ToDs => self.addr2,
            DsDir::FromDs => self.addr3,
            DsDir::DsToDs => self.addr4.unwrap_or(self.addr3),
        }
    }

    #[inline]
    pub fn is_protected(&self) -> bool {
        self.frame_control & fc::PROTECTED != 0
    }
}

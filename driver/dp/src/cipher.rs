//! 加密类型与逐分片安全封装剥离
//!
//! | 类型 | 安全头 | 每分片尾部 | Michael MIC |
//! |------|--------|-----------|-------------|
//! | WEP | 4 | ICV 4 | - |
//! | TKIP / TKIP_NoMIC | 8 | ICV 4 | 8（仅 TKIP，位于整帧末尾） |
//! | CCMP | 8 | MIC 8 | - |
//! | GCMP / GCMP-256 | 8 | MIC 16 | - |
//!
//! 安全头不在此处剥离：调用方把 `header_len` 累加到头长度，最终与 802.11 头一起 pull 掉。

use ieee80211::crypto::{
    has_ext_iv, CCMP_HDR_LEN, CCMP_MIC_LEN, GCMP_HDR_LEN, GCMP_MIC_LEN, TKIP_HDR_LEN,
    TKIP_MIC_LEN, WEP_HDR_LEN, WEP_ICV_LEN,
};
use skb::SkBuff;

use crate::error::DefragError;

/// peer 协商的加密类型
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Cipher {
    #[default]
    None,
    Wep,
    Tkip,
    TkipNoMic,
    Ccmp,
    Gcmp,
    Gcmp256,
}

/// 各加密类型的静态长度参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CipherParams {
    /// MPDU 头后的安全头长度
    pub header_len: usize,
    /// 每个分片尾部需去掉的长度（ICV 或 CCMP/GCMP MIC）
    pub trailer_len: usize,
    /// 整帧末尾的 Michael MIC 长度
    pub mic_len: usize,
}

impl Cipher {
    pub const fn params(self) -> CipherParams {
        match self {
            Cipher::None => CipherParams {
                header_len: 0,
                trailer_len: 0,
                mic_len: 0,
            },
            Cipher::Wep => CipherParams {
                header_len: WEP_HDR_LEN,
                trailer_len: WEP_ICV_LEN,
                mic_len: 0,
            },
            Cipher::Tkip => CipherParams {
                header_len: TKIP_HDR_LEN,
                trailer_len: WEP_ICV_LEN,
                mic_len: TKIP_MIC_LEN,
            },
            Cipher::TkipNoMic => CipherParams {
                header_len: TKIP_HDR_LEN,
                trailer_len: WEP_ICV_LEN,
                mic_len: 0,
            },
            Cipher::Ccmp => CipherParams {
                header_len: CCMP_HDR_LEN,
                trailer_len: CCMP_MIC_LEN,
                mic_len: 0,
            },
            Cipher::Gcmp | Cipher::Gcmp256 => CipherParams {
                header_len: GCMP_HDR_LEN,
                trailer_len: GCMP_MIC_LEN,
                mic_len: 0,
            },
        }
    }

    #[inline]
    pub const fn header_len(self) -> usize {
        self.params().header_len
    }

    #[inline]
    pub const fn trailer_len(self) -> usize {
        self.params().trailer_len
    }

    /// 是否需要校验 Michael MIC
    #[inline]
    pub const fn needs_mic(self) -> bool {
        matches!(self, Cipher::Tkip)
    }

    /// 相邻分片是否需要 PN 连续
    #[inline]
    pub const fn needs_pn_check(self) -> bool {
        !matches!(self, Cipher::None | Cipher::Wep)
    }

    #[inline]
    const fn needs_ext_iv(self) -> bool {
        matches!(
            self,
            Cipher::Tkip | Cipher::TkipNoMic | Cipher::Ccmp | Cipher::Gcmp | Cipher::Gcmp256
        )
    }

    /// 剥离单个分片的尾部并检查 ExtIV。
    ///
    /// `tlv_len` 为 RX TLV 前缀长度，`hdr_len` 为 MPDU 头长度；WEP 会把 MPDU 头后移 4 字节
    /// 覆盖 IV，TLV 保持原位。
    pub fn decap(self, frag: &mut SkBuff, tlv_len: usize, hdr_len: usize) -> Result<(), DefragError> {
        let p = self.params();
        let hdr_end = tlv_len + hdr_len;
        if frag.len() < hdr_end + p.header_len + p.trailer_len {
            return Err(DefragError::InvalidLength);
        }
        if self.needs_ext_iv() && !has_ext_iv(&frag.data()[hdr_end..]) {
            return Err(DefragError::MissingExtIv);
        }
        if self == Cipher::Wep {
            frag.data_mut()
                .copy_within(tlv_len..hdr_end, tlv_len + p.header_len);
        }
        frag.trim_tail(p.trailer_len);
        Ok(())
    }
}

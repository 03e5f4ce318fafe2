//! 802.11 安全封装常量：WEP/TKIP/CCMP/GCMP 的 IV、ICV、MIC 长度，以及 LLC/SNAP 与 Ethernet II 头
//!
//! 对应 Linux include/linux/ieee80211.h 的 IEEE80211_*_HDR_LEN / *_MIC_LEN 与 net/llc 相关定义。

/// WEP IV 长度（不含 KeyID 字节）
pub const WEP_IV_LEN: usize = 3;
/// KeyID 字节长度
pub const WEP_KID_LEN: usize = 1;
/// 扩展 IV 长度（TKIP/CCMP/GCMP 的 IV 第二个 dword）
pub const WEP_EXT_IV_LEN: usize = 4;
/// ICV（CRC32）长度
pub const WEP_ICV_LEN: usize = 4;
/// KeyID 字节中的 ExtIV 位
pub const WEP_EXT_IV_BIT: u8 = 0x20;

/// WEP 安全头长度：IV + KeyID
pub const WEP_HDR_LEN: usize = WEP_IV_LEN + WEP_KID_LEN;
/// TKIP 安全头长度：IV + KeyID + ExtIV
pub const TKIP_HDR_LEN: usize = WEP_IV_LEN + WEP_KID_LEN + WEP_EXT_IV_LEN;
/// TKIP Michael MIC 长度
pub const TKIP_MIC_LEN: usize = 8;
/// Michael 密钥长度
pub const MICHAEL_KEY_LEN: usize = 8;
/// CCMP 安全头长度
pub const CCMP_HDR_LEN: usize = 8;
/// CCMP-128 MIC 长度
pub const CCMP_MIC_LEN: usize = 8;
/// GCMP 安全头长度
pub const GCMP_HDR_LEN: usize = 8;
/// GCMP / GCMP-256 MIC 长度
pub const GCMP_MIC_LEN: usize = 16;

/// LLC/SNAP 头长度（AA AA 03 + OUI + EtherType）
pub const LLC_SNAP_HDR_LEN: usize = 8;
/// LLC/SNAP 中 EtherType 偏移
pub const LLC_SNAP_TYPE_OFFSET: usize = 6;
/// Ethernet II 头长度
pub const ETHER_HDR_LEN: usize = 14;

/// RFC 1042 封装头（不含 EtherType）
pub const RFC1042_HEADER: [u8; 6] = [0xaa, 0xaa, 0x03, 0x00, 0x00, 0x00];

/// 安全头中 KeyID 字节是否带 ExtIV；`iv` 为安全头起始。
#[inline]
pub fn has_ext_iv(iv: &[u8]) -> bool {
    iv.get(WEP_IV_LEN).is_some_and(|kid| kid & WEP_EXT_IV_BIT != 0)
}

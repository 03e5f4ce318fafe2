//! REO 环描述符与 MSDU link 描述符
//!
//! REO 目的环（exception ring）与 REO 入口环（reinject ring）条目均为 8 个 u32 字：
//!
//! | 字 | 位域 |
//! |----|------|
//! | w0 | buffer paddr[31:0] |
//! | w1 | paddr[39:32] (7:0)，return buffer manager (10:8)，sw cookie (31:11) |
//! | w2 | msdu_count (7:0)，mpdu_seq (19:8)，mpdu_flags (31:20) |
//! | w3 | peer_meta_data |
//! | w4 | REO 队列描述符地址[31:0] |
//! | w5 | 队列描述符地址[39:32] (7:0)，reo_dest_ind (12:8) |
//! | w6..w7 | 保留 |

use skb::SkBuff;

/// 环条目字数
pub const REO_DESC_WORDS: usize = 8;

const PADDR_HI_MASK: u32 = 0xff;
const RBM_SHIFT: u32 = 8;
const RBM_MASK: u32 = 0x7;
const COOKIE_SHIFT: u32 = 11;
const COOKIE_MASK: u32 = 0x1f_ffff;
const MSDU_COUNT_MASK: u32 = 0xff;
const SEQ_SHIFT: u32 = 8;
const SEQ_MASK: u32 = 0xfff;
const MPDU_FLAGS_SHIFT: u32 = 20;
const MPDU_FLAGS_MASK: u32 = 0xfff;
const REO_DEST_IND_SHIFT: u32 = 8;
const REO_DEST_IND_MASK: u32 = 0x1f;

/// MPDU 标志（w2[31:20]）
pub mod mpdu_flags {
    pub const FRAGMENT: u16 = 1 << 0;
    pub const RETRY: u16 = 1 << 1;
    pub const AMPDU: u16 = 1 << 2;
    pub const RAW: u16 = 1 << 3;
}

/// peer_meta_data 中的 peer_id / vdev_id
pub mod peer_meta {
    pub const PEER_ID_MASK: u32 = 0xffff;
    pub const VDEV_ID_SHIFT: u32 = 16;
    pub const VDEV_ID_MASK: u32 = 0xff;

    #[inline]
    pub fn peer_id(meta: u32) -> u16 {
        (meta & PEER_ID_MASK) as u16
    }

    #[inline]
    pub fn vdev_id(meta: u32) -> u8 {
        ((meta >> VDEV_ID_SHIFT) & VDEV_ID_MASK) as u8
    }

    #[inline]
    pub fn build(peer_id: u16, vdev_id: u8) -> u32 {
        peer_id as u32 | ((vdev_id as u32) << VDEV_ID_SHIFT)
    }
}

/// 缓冲地址信息：物理地址 + sw cookie + return buffer manager
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufAddrInfo {
    pub paddr: u64,
    pub sw_cookie: u32,
    pub rbm: u8,
}

impl BufAddrInfo {
    fn read(w: &[u32]) -> Self {
        Self {
            paddr: w[0] as u64 | (((w[1] & PADDR_HI_MASK) as u64) << 32),
            rbm: ((w[1] >> RBM_SHIFT) & RBM_MASK) as u8,
            sw_cookie: (w[1] >> COOKIE_SHIFT) & COOKIE_MASK,
        }
    }

    fn write(&self, w: &mut [u32]) {
        w[0] = self.paddr as u32;
        w[1] = ((self.paddr >> 32) as u32 & PADDR_HI_MASK)
            | ((self.rbm as u32 & RBM_MASK) << RBM_SHIFT)
            | ((self.sw_cookie & COOKIE_MASK) << COOKIE_SHIFT);
    }
}

/// MPDU 描述信息（w2..w3）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MpduDescInfo {
    pub msdu_count: u8,
    pub mpdu_seq: u16,
    pub mpdu_flags: u16,
    pub peer_meta_data: u32,
}

impl MpduDescInfo {
    fn read(w: &[u32]) -> Self {
        Self {
            msdu_count: (w[2] & MSDU_COUNT_MASK) as u8,
            mpdu_seq: ((w[2] >> SEQ_SHIFT) & SEQ_MASK) as u16,
            mpdu_flags: ((w[2] >> MPDU_FLAGS_SHIFT) & MPDU_FLAGS_MASK) as u16,
            peer_meta_data: w[3],
        }
    }

    fn write(&self, w: &mut [u32]) {
        w[2] = (self.msdu_count as u32 & MSDU_COUNT_MASK)
            | ((self.mpdu_seq as u32 & SEQ_MASK) << SEQ_SHIFT)
            | ((self.mpdu_flags as u32 & MPDU_FLAGS_MASK) << MPDU_FLAGS_SHIFT);
        w[3] = self.peer_meta_data;
    }

    #[inline]
    pub fn peer_id(&self) -> u16 {
        peer_meta::peer_id(self.peer_meta_data)
    }

    #[inline]
    pub fn is_fragment(&self) -> bool {
        self.mpdu_flags & mpdu_flags::FRAGMENT != 0
    }
}

fn qdesc_read(w: &[u32]) -> u64 {
    w[4] as u64 | (((w[5] & PADDR_HI_MASK) as u64) << 32)
}

fn qdesc_write(w: &mut [u32], addr: u64) {
    w[4] = addr as u32;
    w[5] = (w[5] & !PADDR_HI_MASK) | ((addr >> 32) as u32 & PADDR_HI_MASK);
}

fn dest_ind_read(w: &[u32]) -> u8 {
    ((w[5] >> REO_DEST_IND_SHIFT) & REO_DEST_IND_MASK) as u8
}

fn dest_ind_write(w: &mut [u32], ind: u8) {
    w[5] = (w[5] & !(REO_DEST_IND_MASK << REO_DEST_IND_SHIFT))
        | ((ind as u32 & REO_DEST_IND_MASK) << REO_DEST_IND_SHIFT);
}

/// REO 目的环条目（exception ring 上送的分片描述符）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReoDestDesc {
    pub words: [u32; REO_DESC_WORDS],
}

impl ReoDestDesc {
    pub fn new(buf: BufAddrInfo, mpdu: MpduDescInfo, qdesc_addr: u64, reo_dest_ind: u8) -> Self {
        let mut d = Self::default();
        buf.write(&mut d.words);
        mpdu.write(&mut d.words);
        qdesc_write(&mut d.words, qdesc_addr);
        dest_ind_write(&mut d.words, reo_dest_ind);
        d
    }

    /// 由保存的原始字恢复；不足的字补 0。
    pub fn from_words(raw: &[u32]) -> Self {
        let mut d = Self::default();
        let n = raw.len().min(REO_DESC_WORDS);
        d.words[..n].copy_from_slice(&raw[..n]);
        d
    }

    /// 该 MPDU 的 MSDU link 描述符地址
    #[inline]
    pub fn buf_addr_info(&self) -> BufAddrInfo {
        BufAddrInfo::read(&self.words)
    }

    #[inline]
    pub fn mpdu_desc_info(&self) -> MpduDescInfo {
        MpduDescInfo::read(&self.words)
    }

    #[inline]
    pub fn qdesc_addr(&self) -> u64 {
        qdesc_read(&self.words)
    }

    #[inline]
    pub fn reo_dest_ind(&self) -> u8 {
        dest_ind_read(&self.words)
    }
}

/// REO 入口环条目（回注描述符）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReoEntranceDesc {
    pub words: [u32; REO_DESC_WORDS],
}

impl ReoEntranceDesc {
    #[inline]
    pub fn set_buf_addr_info(&mut self, buf: &BufAddrInfo) {
        buf.write(&mut self.words);
    }

    #[inline]
    pub fn buf_addr_info(&self) -> BufAddrInfo {
        BufAddrInfo::read(&self.words)
    }

    #[inline]
    pub fn set_mpdu_desc_info(&mut self, mpdu: &MpduDescInfo) {
        mpdu.write(&mut self.words);
    }

    #[inline]
    pub fn mpdu_desc_info(&self) -> MpduDescInfo {
        MpduDescInfo::read(&self.words)
    }

    #[inline]
    pub fn set_qdesc_addr(&mut self, addr: u64) {
        qdesc_write(&mut self.words, addr);
    }

    #[inline]
    pub fn qdesc_addr(&self) -> u64 {
        qdesc_read(&self.words)
    }

    #[inline]
    pub fn set_reo_dest_ind(&mut self, ind: u8) {
        dest_ind_write(&mut self.words, ind);
    }

    #[inline]
    pub fn reo_dest_ind(&self) -> u8 {
        dest_ind_read(&self.words)
    }
}

/// 描述符归属（uniform header owner）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DescOwner {
    #[default]
    Hw,
    Sw,
}

/// 描述符类型（uniform header buffer type）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BufferType {
    #[default]
    Buffer,
    MsduLink,
    MpduLink,
}

/// MSDU 描述信息
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MsduDescInfo {
    pub first_msdu: bool,
    pub last_msdu: bool,
    pub msdu_len: u16,
    pub reo_dest_ind: u8,
}

/// MSDU link 描述符（只建模 msdu0）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MsduLinkDesc {
    pub owner: DescOwner,
    pub buffer_type: BufferType,
    pub msdu0_buf: BufAddrInfo,
    pub msdu0_info: MsduDescInfo,
}

/// link 描述符归还动作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BmAction {
    /// 放回 idle link 列表
    PutInIdleList,
    /// 连同其 MSDU 缓冲一起释放
    ReleaseMsduList,
}

/// 驱动侧 RX 描述符：cookie 与缓冲一一对应
pub struct RxDesc {
    pub cookie: u32,
    pub pool_id: u8,
    /// 挂在描述符上的缓冲；上送后由 RX 路径取走
    pub nbuf: Option<SkBuff>,
    /// 缓冲是否已解除 DMA 映射
    pub unmapped: bool,
}

impl RxDesc {
    pub fn new(cookie: u32, pool_id: u8, nbuf: SkBuff) -> Self {
        Self {
            cookie,
            pool_id,
            nbuf: Some(nbuf),
            unmapped: false,
        }
    }
}

impl core::fmt::Debug for RxDesc {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RxDesc")
            .field("cookie", &self.cookie)
            .field("pool_id", &self.pool_id)
            .field("nbuf_len", &self.nbuf.as_ref().map(SkBuff::total_len))
            .field("unmapped", &self.unmapped)
            .finish()
    }
}

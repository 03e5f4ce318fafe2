//! 软件模拟 REO 与 RX 描述符池
//!
//! 无真实硬件时使用（联调、单元测试）：link 描述符放在表里，入口环是定长队列，
//! 所有归还/释放动作都记录下来，便于检查描述符生命周期。

use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use axerrno::{AxError, AxResult};
use skb::SkBuff;
use spin::Mutex;

use crate::desc::{
    BmAction, BufAddrInfo, BufferType, DescOwner, MsduDescInfo, MsduLinkDesc, ReoEntranceDesc,
    RxDesc,
};
use crate::ops::{ReoRing, RxDescPool};

/// 默认 RX 缓冲大小
pub const SOFT_RX_BUF_SIZE: usize = 2048;

const LINK_DESC_BASE: u64 = 0x8000_0000;
const LINK_DESC_SIZE: u64 = 0x80;
const DMA_BASE: u64 = 0x4000_0000;

struct LinkDescTable {
    descs: BTreeMap<u64, MsduLinkDesc>,
    next: u64,
}

/// 各资源各自一把锁，只在单次调用内持有
pub struct SoftHal {
    links: Mutex<LinkDescTable>,
    next_dma: AtomicU64,
    ring_size: usize,
    buf_size: usize,
    /// 入口环
    ring: Mutex<Vec<(ReoEntranceDesc, RxDesc)>>,
    idle_returns: Mutex<Vec<BufAddrInfo>>,
    freed_cookies: Mutex<Vec<u32>>,
    fail_ring_access: AtomicBool,
    refill_pool_consume: AtomicBool,
}

impl SoftHal {
    /// `ring_size`：入口环深度
    pub fn new(ring_size: usize) -> Self {
        Self {
            links: Mutex::new(LinkDescTable {
                descs: BTreeMap::new(),
                next: LINK_DESC_BASE,
            }),
            next_dma: AtomicU64::new(DMA_BASE),
            ring_size,
            buf_size: SOFT_RX_BUF_SIZE,
            ring: Mutex::new(Vec::new()),
            idle_returns: Mutex::new(Vec::new()),
            freed_cookies: Mutex::new(Vec::new()),
            fail_ring_access: AtomicBool::new(false),
            refill_pool_consume: AtomicBool::new(false),
        }
    }

    /// 为 true 时入口环访问失败（模拟 srng access 出错）
    pub fn set_fail_ring_access(&self, fail: bool) {
        self.fail_ring_access.store(fail, Ordering::Relaxed);
    }

    /// 为 true 时应急池收回所有送来的缓冲
    pub fn set_refill_pool_consume(&self, consume: bool) {
        self.refill_pool_consume.store(consume, Ordering::Relaxed);
    }

    /// 分配一个 MSDU link 描述符，msdu0 指向 `msdu0_buf`，返回其地址信息。
    pub fn alloc_link_desc(&self, msdu0_buf: BufAddrInfo, reo_dest_ind: u8) -> BufAddrInfo {
        let mut links = self.links.lock();
        let paddr = links.next;
        links.next += LINK_DESC_SIZE;
        links.descs.insert(
            paddr,
            MsduLinkDesc {
                owner: DescOwner::Hw,
                buffer_type: BufferType::MsduLink,
                msdu0_buf,
                msdu0_info: MsduDescInfo {
                    first_msdu: true,
                    last_msdu: true,
                    msdu_len: 0,
                    reo_dest_ind,
                },
            },
        );
        BufAddrInfo {
            paddr,
            sw_cookie: ((paddr - LINK_DESC_BASE) / LINK_DESC_SIZE) as u32,
            rbm: 0,
        }
    }

    /// 入口环上尚未被取走的条目数
    pub fn reinjected_len(&self) -> usize {
        self.ring.lock().len()
    }

    /// 模拟硬件取走入口环条目
    pub fn drain_reinjected(&self) -> Vec<(ReoEntranceDesc, RxDesc)> {
        core::mem::take(&mut *self.ring.lock())
    }

    /// 放回 idle 列表的 link 描述符
    pub fn idle_returns(&self) -> Vec<BufAddrInfo> {
        self.idle_returns.lock().clone()
    }

    /// 放回 free list 的 RX 描述符 cookie
    pub fn freed_cookies(&self) -> Vec<u32> {
        self.freed_cookies.lock().clone()
    }

    /// 某 cookie 被释放的次数
    pub fn freed_count(&self, cookie: u32) -> usize {
        self.freed_cookies.lock().iter().filter(|&&c| c == cookie).count()
    }
}

impl ReoRing for SoftHal {
    fn link_desc_return(&self, buf: &BufAddrInfo, action: BmAction) -> AxResult {
        {
            let mut links = self.links.lock();
            if !links.descs.contains_key(&buf.paddr) {
                log::warn!(target: "wireless::hal", "link_desc_return: unknown link desc 0x{:x}", buf.paddr);
                return Err(AxError::InvalidInput);
            }
            if action == BmAction::ReleaseMsduList {
                links.descs.remove(&buf.paddr);
            }
        }
        self.idle_returns.lock().push(*buf);
        Ok(())
    }

    fn link_desc_read(&self, buf: &BufAddrInfo) -> Option<MsduLinkDesc> {
        self.links.lock().descs.get(&buf.paddr).copied()
    }

    fn link_desc_write(&self, buf: &BufAddrInfo, link: &MsduLinkDesc) -> AxResult {
        let mut links = self.links.lock();
        let slot = links.descs.get_mut(&buf.paddr).ok_or(AxError::NotFound)?;
        *slot = *link;
        Ok(())
    }

    fn nbuf_map(&self, _nbuf: &SkBuff, size: usize) -> AxResult<u64> {
        Ok(self.next_dma.fetch_add(size.max(1) as u64, Ordering::Relaxed))
    }

    fn reinject_ring_space(&self) -> AxResult {
        if self.ring.lock().len() >= self.ring_size {
            return Err(AxError::WouldBlock);
        }
        Ok(())
    }

    fn reinject(&self, ent: ReoEntranceDesc, desc: RxDesc) -> Result<(), (AxError, RxDesc)> {
        if self.fail_ring_access.load(Ordering::Relaxed) {
            return Err((AxError::Io, desc));
        }
        let mut ring = self.ring.lock();
        if ring.len() >= self.ring_size {
            return Err((AxError::WouldBlock, desc));
        }
        ring.push((ent, desc));
        Ok(())
    }
}

impl RxDescPool for SoftHal {
    fn rx_buf_size(&self, _pool_id: u8) -> usize {
        self.buf_size
    }

    fn desc_free(&self, mut desc: RxDesc) {
        desc.nbuf = None;
        self.freed_cookies.lock().push(desc.cookie);
    }

    fn buffer_pool_refill(&self, nbuf: SkBuff, _pool_id: u8) -> Option<SkBuff> {
        if self.refill_pool_consume.load(Ordering::Relaxed) {
            return None;
        }
        Some(nbuf)
    }
}

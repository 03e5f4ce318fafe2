//! 环与描述符池抽象
//!
//! 平台实现 [`ReoRing`]（REO link 描述符、DMA 映射、入口环）与 [`RxDescPool`]（RX 描述符 free list），
//! 重组数据面只通过这两个 trait 访问硬件；无硬件时可用 [`crate::stub::SoftHal`]。
//!
//! 所有方法只取 `&self`：多个 (peer, tid) 同时在不同核上处理分片，
//! 环与池各自在实现内部加锁，锁只覆盖单次调用。

use axerrno::{AxError, AxResult};
use skb::SkBuff;

use crate::desc::{BmAction, BufAddrInfo, MsduLinkDesc, ReoEntranceDesc, RxDesc, REO_DESC_WORDS};

/// REO 相关硬件访问
pub trait ReoRing {
    /// 目的环条目字数（保存描述符副本时按此长度拷贝）
    fn reo_dst_entry_words(&self) -> usize {
        REO_DESC_WORDS
    }

    /// 归还 MSDU link 描述符
    fn link_desc_return(&self, buf: &BufAddrInfo, action: BmAction) -> AxResult;

    /// 读出 link 描述符
    fn link_desc_read(&self, buf: &BufAddrInfo) -> Option<MsduLinkDesc>;

    /// 回写 link 描述符；地址未知时返回 `NotFound`
    fn link_desc_write(&self, buf: &BufAddrInfo, link: &MsduLinkDesc) -> AxResult;

    /// DMA 映射缓冲，返回物理地址
    fn nbuf_map(&self, nbuf: &SkBuff, size: usize) -> AxResult<u64>;

    /// 入口环是否还有空位；满时返回 `WouldBlock`
    fn reinject_ring_space(&self) -> AxResult;

    /// 写入入口环条目并提交。成功后描述符（及其缓冲）归硬件；
    /// 失败时原样交还描述符，环访问失败为 `Io`，环满为 `WouldBlock`。
    fn reinject(&self, ent: ReoEntranceDesc, desc: RxDesc) -> Result<(), (AxError, RxDesc)>;
}

/// RX 描述符池
pub trait RxDescPool {
    /// 池内缓冲大小
    fn rx_buf_size(&self, pool_id: u8) -> usize;

    /// 描述符放回 free list 并补充新缓冲；描述符上残留的缓冲随之释放
    fn desc_free(&self, desc: RxDesc);

    /// 应急池回收：缓冲被池子收回时返回 None
    fn buffer_pool_refill(&self, nbuf: SkBuff, _pool_id: u8) -> Option<SkBuff> {
        Some(nbuf)
    }
}

/// 重组数据面需要的全部硬件能力，可跨核共享
pub trait DpHal: ReoRing + RxDescPool + Sync {}

impl<T: ReoRing + RxDescPool + Sync> DpHal for T {}

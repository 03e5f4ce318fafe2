//! 重组引擎：REO 异常环分片入口
//!
//! 一个 [`DefragEngine`] 对应一个 soc：持有配置、统计、peer 表、等待队列与回注历史。
//! 所有入口同步执行，调用方按 (peer, tid) 并发即可；硬件通过 [`DpHal`] 传入。

use alloc::sync::Arc;

use axerrno::{AxError, AxResult};
use hal::desc::{BmAction, MpduDescInfo, ReoDestDesc, RxDesc};
use hal::history::ReinjectHistory;
use hal::ops::DpHal;
use hal::tlv::{RxPktTlv, RX_PKT_TLV_SIZE};
use ieee80211::crypto::MICHAEL_KEY_LEN;
use ieee80211::{MacAddr, MacHeader};
use skb::SkBuff;

use crate::admission::{admit, Admission};
use crate::cfg::DefragCfg;
use crate::cipher::Cipher;
use crate::defrag::{defrag, ReassembledFrame};
use crate::error::DefragError;
use crate::fraglist::{Fragment, InsertResult};
use crate::notify::DefragNotify;
use crate::peer::{PeerTable, RxTidDefrag, SavedRingDesc, TxRxPeer, DP_MAX_TIDS};
use crate::reinject::return_head_frag_desc;
use crate::stats::DefragStats;
use crate::waitlist::DefragWaitlist;

/// 通过入口检查的分片
struct FragMeta {
    peer: Arc<TxRxPeer>,
    frag_num: u8,
    more_frag: bool,
}

pub struct DefragEngine {
    cfg: DefragCfg,
    stats: DefragStats,
    peers: PeerTable,
    waitlist: DefragWaitlist,
    history: ReinjectHistory,
    notify: Arc<dyn DefragNotify>,
}

impl DefragEngine {
    pub fn new(cfg: DefragCfg, notify: Arc<dyn DefragNotify>) -> Self {
        log::info!(
            target: "wireless::dp",
            "defrag engine: timeout {} ms, timeout check {}, addr1 check {}",
            cfg.rx_defrag_timeout_ms, cfg.defrag_timeout_check, cfg.addr1_check
        );
        Self {
            cfg,
            stats: DefragStats::default(),
            peers: PeerTable::new(),
            waitlist: DefragWaitlist::new(),
            history: ReinjectHistory::new(),
            notify,
        }
    }

    pub fn cfg(&self) -> &DefragCfg {
        &self.cfg
    }

    pub fn stats(&self) -> &DefragStats {
        &self.stats
    }

    pub fn peers(&self) -> &PeerTable {
        &self.peers
    }

    pub fn waitlist(&self) -> &DefragWaitlist {
        &self.waitlist
    }

    pub fn reinject_history(&self) -> &ReinjectHistory {
        &self.history
    }

    #[inline]
    fn timeout_ms(&self) -> u64 {
        self.cfg.rx_defrag_timeout_ms as u64
    }

    // ---------- peer 生命周期 ----------

    /// 登记 peer。TID 需另行 [`TxRxPeer::rx_init`] 或 [`DefragEngine::rx_tid_setup`]。
    pub fn add_peer(
        &self,
        peer_id: u16,
        mac_addr: MacAddr,
        vdev_id: u8,
        vdev_mac_addr: MacAddr,
    ) -> AxResult<Arc<TxRxPeer>> {
        let peer = self
            .peers
            .attach(TxRxPeer::new(peer_id, mac_addr, vdev_id, vdev_mac_addr))
            .ok_or(AxError::AlreadyExists)?;
        log::info!(target: "wireless::dp", "peer {} added, mac {:02x?}", peer_id, mac_addr);
        Ok(peer)
    }

    pub fn rx_tid_setup(&self, peer_id: u16, tid: u8) -> AxResult {
        let peer = self.peers.get_ref_by_id(peer_id).ok_or(AxError::NotFound)?;
        peer.rx_tid_setup(tid).map_err(|_| AxError::InvalidInput)
    }

    pub fn set_security(
        &self,
        peer_id: u16,
        index: usize,
        cipher: Cipher,
        michael_key: [u8; MICHAEL_KEY_LEN],
    ) -> AxResult {
        let peer = self.peers.get_ref_by_id(peer_id).ok_or(AxError::NotFound)?;
        peer.set_security(index, cipher, michael_key);
        Ok(())
    }

    /// 摘除 peer 并清理其全部 TID 的在途分片
    pub fn delete_peer<H: DpHal>(&self, hal: &H, peer_id: u16) -> AxResult {
        let peer = self.peers.detach(peer_id).ok_or(AxError::NotFound)?;
        self.peer_rx_cleanup(hal, &peer);
        log::info!(target: "wireless::dp", "peer {} deleted", peer_id);
        Ok(())
    }

    pub fn peer_rx_cleanup<H: DpHal>(&self, hal: &H, peer: &Arc<TxRxPeer>) {
        for tid in &peer.rx_tid {
            let mut st = tid.lock();
            self.waitlist_remove(peer, &mut st);
            reorder_flush_frag(hal, &mut st);
            st.rx_setup = false;
        }
    }

    // ---------- 异常环入口 ----------

    /// 处理 REO 异常环上送的一个分片，返回需补充的 RX 缓冲数
    pub fn frag_handle<H: DpHal>(
        &self,
        hal: &H,
        ring_desc: &ReoDestDesc,
        mut rx_desc: RxDesc,
        now_ms: u64,
    ) -> u32 {
        let mpdu = ring_desc.mpdu_desc_info();
        log::trace!(target: "wireless::dp::defrag", "num_msdus {}", mpdu.msdu_count);

        if mpdu.msdu_count == 0 {
            log::error!(target: "wireless::dp::defrag", "not sufficient MSDUs to process");
            hal.desc_free(rx_desc);
            return 0;
        }
        if rx_desc.unmapped {
            log::warn!(target: "wireless::dp::defrag", "rx desc {} already unmapped", rx_desc.cookie);
            hal.desc_free(rx_desc);
            return 0;
        }
        rx_desc.unmapped = true;

        // TID 取自 TLV，此时缓冲长度尚为 0
        let tid = rx_desc
            .nbuf
            .as_mut()
            .and_then(|n| RxPktTlv::parse(n.data_mut()))
            .map_or(0, |t| t.tid);

        DefragStats::inc(&self.stats.rx_frags);
        let mut rx_bfs = 0;
        if let Err(e) = self.store_fragment(hal, ring_desc, &mpdu, tid, rx_desc, &mut rx_bfs, now_ms) {
            DefragStats::inc(&self.stats.rx_frag_err);
            log::info!(
                target: "wireless::dp::defrag",
                "rx defrag err seq {} msdu_count {} flags {:#x}: {}",
                mpdu.mpdu_seq, mpdu.msdu_count, mpdu.mpdu_flags, e
            );
        }
        rx_bfs
    }

    #[allow(clippy::too_many_arguments)]
    fn store_fragment<H: DpHal>(
        &self,
        hal: &H,
        ring_desc: &ReoDestDesc,
        mpdu: &MpduDescInfo,
        tid: u8,
        mut rx_desc: RxDesc,
        rx_bfs: &mut u32,
        now_ms: u64,
    ) -> Result<(), DefragError> {
        let meta = match self.check_fragment(hal, mpdu, tid, &mut rx_desc) {
            Ok(meta) => meta,
            Err(e) => {
                discard(hal, ring_desc, rx_desc, rx_bfs);
                return Err(e);
            }
        };
        let peer = meta.peer;
        let rxseq = mpdu.mpdu_seq;

        let mut st = peer.rx_tid[tid as usize].lock();
        if !st.rx_setup {
            log::error!(
                target: "wireless::dp::defrag",
                "fragment before tid {} setup for peer {}",
                tid, peer.peer_id
            );
            DefragStats::inc(&self.stats.defrag_peer_uninit);
            drop(st);
            discard(hal, ring_desc, rx_desc, rx_bfs);
            return Err(DefragError::TidNotSetup(tid));
        }

        match admit(&st, rxseq, meta.frag_num, meta.more_frag) {
            Admission::Reject(e) => {
                if e == DefragError::Unfragmented {
                    log::error!(target: "wireless::dp::defrag", "unfragmented pkt on REO exception ring, dropping");
                }
                drop(st);
                discard(hal, ring_desc, rx_desc, rx_bfs);
                return Err(e);
            }
            Admission::OutOfSequence => {
                log::debug!(
                    target: "wireless::dp::defrag",
                    "seq mismatch: cur {} rx {}, flushing",
                    st.curr_seq_num, rxseq
                );
                reorder_flush_frag(hal, &mut st);
                DefragStats::inc(&self.stats.rx_frag_oor);
                st.curr_seq_num = rxseq;
            }
            Admission::NewChain => {
                st.cleanup();
                st.curr_seq_num = rxseq;
            }
            Admission::Continue => {}
        }

        // 分片 0 必成为链头，先保存目的环描述符副本
        let becomes_head = meta.frag_num == 0 && st.frags.head().map_or(true, |h| h.frag_num != 0);
        let saved = if becomes_head {
            match SavedRingDesc::try_save(ring_desc, hal.reo_dst_entry_words()) {
                Ok(saved) => Some(saved),
                Err(e) => {
                    log::error!(target: "wireless::dp::defrag", "unable to store ring desc");
                    drop(st);
                    discard(hal, ring_desc, rx_desc, rx_bfs);
                    return Err(e);
                }
            }
        } else {
            None
        };

        let Some(nbuf) = rx_desc.nbuf.take() else {
            drop(st);
            discard(hal, ring_desc, rx_desc, rx_bfs);
            return Err(DefragError::BufferRecycled);
        };
        let result = st.insert_frag(Fragment::new(nbuf, meta.frag_num, meta.more_frag));

        match saved {
            Some(saved) if result != InsertResult::Rejected => {
                st.dst_ring_desc = Some(saved);
                st.head_frag_desc = Some(rx_desc);
            }
            _ => {
                hal.desc_free(rx_desc);
                *rx_bfs += 1;
                if let Err(e) = hal.link_desc_return(&ring_desc.buf_addr_info(), BmAction::PutInIdleList) {
                    log::error!(target: "wireless::dp::defrag", "failed to return link desc: {:?}", e);
                }
            }
        }

        self.settle(hal, &peer, &mut st, result == InsertResult::Completed, now_ms, rx_bfs)
    }

    /// 入口检查：缓冲长度、应急池、peer、TID、addr1、seq/fc 有效位。
    /// 通过时缓冲已按 TLV 设置长度并放回 `rx_desc`。
    fn check_fragment<H: DpHal>(
        &self,
        hal: &H,
        mpdu: &MpduDescInfo,
        tid: u8,
        rx_desc: &mut RxDesc,
    ) -> Result<FragMeta, DefragError> {
        let nbuf = rx_desc.nbuf.take().ok_or(DefragError::BufferRecycled)?;
        if !nbuf.is_empty() {
            log::info!(
                target: "wireless::dp::defrag",
                "dropping unexpected packet with len {}, cookie {}",
                nbuf.len(), rx_desc.cookie
            );
            DefragStats::inc(&self.stats.rx_frag_err_len_error);
            return Err(DefragError::InvalidLength);
        }

        let mut nbuf = hal
            .buffer_pool_refill(nbuf, rx_desc.pool_id)
            .ok_or(DefragError::BufferRecycled)?;
        let tlv = RxPktTlv::parse(nbuf.data_mut()).ok_or(DefragError::InvalidLength)?;
        nbuf.set_len(tlv.msdu_len as usize + RX_PKT_TLV_SIZE);

        let peer_id = mpdu.peer_id();
        let Some(peer) = self.peers.get_ref_by_id(peer_id) else {
            log::info!(target: "wireless::dp::defrag", "unknown peer {}, dropping fragment", peer_id);
            DefragStats::inc(&self.stats.rx_frag_err_no_peer);
            return Err(DefragError::NoPeer(peer_id));
        };

        if tid as usize >= DP_MAX_TIDS {
            log::info!(target: "wireless::dp::defrag", "tid out of bounds: {}", tid);
            return Err(DefragError::InvalidTid(tid));
        }

        let wh = MacHeader::parse(&nbuf.data()[RX_PKT_TLV_SIZE..]).ok_or(DefragError::InvalidLength)?;
        if self.cfg.addr1_check && wh.addr1 != peer.vdev_mac_addr {
            log::info!(target: "wireless::dp::defrag", "invalid address 1 {:02x?}", wh.addr1);
            DefragStats::inc(&self.stats.defrag_ad1_invalid);
            return Err(DefragError::InvalidAddr1);
        }
        if !tlv.seq_ctrl_valid() {
            log::error!(target: "wireless::dp::defrag", "invalid MPDU seq control field, dropping MPDU");
            return Err(DefragError::SeqCtrlInvalid);
        }
        if !tlv.fc_valid() {
            log::error!(target: "wireless::dp::defrag", "invalid frame control field, dropping MPDU");
            return Err(DefragError::FrameCtrlInvalid);
        }

        let meta = FragMeta {
            peer,
            frag_num: wh.frag_num(),
            more_frag: wh.more_frags(),
        };
        rx_desc.nbuf = Some(nbuf);
        Ok(meta)
    }

    /// 插入之后：未齐则（重新）挂入等待队列，齐了则重组并回注
    fn settle<H: DpHal>(
        &self,
        hal: &H,
        peer: &Arc<TxRxPeer>,
        st: &mut RxTidDefrag,
        completed: bool,
        now_ms: u64,
        rx_bfs: &mut u32,
    ) -> Result<(), DefragError> {
        self.waitlist_remove(peer, st);

        if !completed {
            if self.cfg.defrag_timeout_check {
                st.defrag_timeout_ms = now_ms + self.timeout_ms();
                self.waitlist_add(peer, st);
            }
            return Ok(());
        }

        log::debug!(
            target: "wireless::dp::defrag",
            "all fragments received for seq {}",
            st.curr_seq_num
        );
        let chain = st.frags.take();
        let frame = match defrag(peer, st, chain, &*self.notify) {
            Ok(frame) => frame,
            Err(e) => {
                log::error!(target: "wireless::dp::defrag", "fragment processing failed: {}", e);
                match e {
                    DefragError::MicMismatch => DefragStats::inc(&self.stats.mic_err),
                    DefragError::PnDiscontinuity => DefragStats::inc(&self.stats.pn_err),
                    _ => {}
                }
                if st.head_frag_desc.is_some() {
                    *rx_bfs += 1;
                }
                return_head_frag_desc(hal, st);
                st.cleanup();
                return Err(e);
            }
        };

        let r = self.forward(hal, peer, st, frame, now_ms);
        st.cleanup();
        r
    }

    #[cfg(not(feature = "no-reinject"))]
    fn forward<H: DpHal>(
        &self,
        hal: &H,
        _peer: &TxRxPeer,
        st: &mut RxTidDefrag,
        frame: ReassembledFrame,
        now_ms: u64,
    ) -> Result<(), DefragError> {
        match crate::reinject::reo_reinject(hal, &self.cfg, &self.history, st, frame, now_ms) {
            Ok(()) => {
                DefragStats::inc(&self.stats.reo_reinject);
                Ok(())
            }
            Err(e) => {
                log::error!(target: "wireless::dp::defrag", "fragmented sequence reinjection failed: {}", e);
                return_head_frag_desc(hal, st);
                DefragStats::inc(&self.stats.reo_reinject_fail);
                Err(e)
            }
        }
    }

    #[cfg(feature = "no-reinject")]
    fn forward<H: DpHal>(
        &self,
        hal: &H,
        peer: &TxRxPeer,
        st: &mut RxTidDefrag,
        frame: ReassembledFrame,
        _now_ms: u64,
    ) -> Result<(), DefragError> {
        crate::reinject::deliver_to_stack(hal, peer, st, frame, &*self.notify);
        DefragStats::inc(&self.stats.rx_frag_delivered);
        Ok(())
    }

    // ---------- 常规 RX 路径上的末片 ----------

    /// 常规 RX 路径收到的末片并入已有分片链
    pub fn add_last_frag<H: DpHal>(
        &self,
        hal: &H,
        peer: &Arc<TxRxPeer>,
        tid: u8,
        rxseq: u16,
        nbuf: SkBuff,
        now_ms: u64,
    ) -> Result<(), DefragError> {
        let tid_lock = peer.rx_tid.get(tid as usize).ok_or(DefragError::InvalidTid(tid))?;
        let mut st = tid_lock.lock();
        let r = self.insert_last_frag(hal, peer, &mut st, rxseq, nbuf, now_ms);
        if r.is_err() {
            DefragStats::inc(&self.stats.rx_frag_err);
        }
        r
    }

    fn insert_last_frag<H: DpHal>(
        &self,
        hal: &H,
        peer: &Arc<TxRxPeer>,
        st: &mut RxTidDefrag,
        rxseq: u16,
        mut nbuf: SkBuff,
        now_ms: u64,
    ) -> Result<(), DefragError> {
        if !st.rx_setup {
            log::debug!(target: "wireless::dp::defrag", "peer {} drop rx frame", peer.peer_id);
            DefragStats::inc(&self.stats.defrag_peer_uninit);
            return Err(DefragError::TidNotSetup(st.tid));
        }
        if !st.frags.is_empty() && rxseq != st.curr_seq_num {
            self.waitlist_remove(peer, st);
            reorder_flush_frag(hal, st);
            log::error!(
                target: "wireless::dp::defrag",
                "no list found for tid {} seq {}",
                st.tid, rxseq
            );
            return Err(DefragError::StaleSequence(rxseq));
        }

        let tlv = RxPktTlv::parse(nbuf.data_mut()).ok_or(DefragError::InvalidLength)?;
        nbuf.set_len(tlv.msdu_len as usize + RX_PKT_TLV_SIZE);
        let wh = MacHeader::parse(&nbuf.data()[RX_PKT_TLV_SIZE..]).ok_or(DefragError::InvalidLength)?;

        if st.frags.is_empty() {
            st.curr_seq_num = rxseq;
        }
        let result = st.insert_frag(Fragment::new(nbuf, wh.frag_num(), wh.more_frags()));
        let mut rx_bfs = 0;
        self.settle(hal, peer, st, result == InsertResult::Completed, now_ms, &mut rx_bfs)
    }

    // ---------- 超时 ----------

    /// 清理已到期的等待链，返回清理的链数
    pub fn waitlist_flush<H: DpHal>(&self, hal: &H, now_ms: u64) -> usize {
        let expired = self.waitlist.take_expired(now_ms, self.timeout_ms());
        let mut flushed = 0;
        for e in expired {
            DefragStats::dec(&self.stats.rx_frag_wait);
            let Some(peer) = e.peer.upgrade() else {
                continue;
            };
            // peer_id 已被新 peer 占用时，旧 peer 的清理由 delete_peer 负责
            match self.peers.get_ref_by_id(e.peer_id) {
                Some(cur) if Arc::ptr_eq(&cur, &peer) => {}
                _ => continue,
            }
            let Some(tid_lock) = peer.rx_tid.get(e.tid as usize) else {
                continue;
            };
            let mut st = tid_lock.lock();
            // 出队后被重新挂入（截止时间已后移）的不清理
            if !st.on_waitlist || st.defrag_timeout_ms > now_ms {
                continue;
            }
            st.on_waitlist = false;
            log::debug!(
                target: "wireless::dp::waitlist",
                "timeout: peer {} tid {} seq {}",
                e.peer_id, e.tid, st.curr_seq_num
            );
            reorder_flush_frag(hal, &mut st);
            DefragStats::inc(&self.stats.rx_frag_timeout);
            flushed += 1;
        }
        flushed
    }

    fn waitlist_add(&self, peer: &Arc<TxRxPeer>, st: &mut RxTidDefrag) {
        if self.waitlist.add(peer, st) {
            DefragStats::inc(&self.stats.rx_frag_wait);
        }
    }

    fn waitlist_remove(&self, peer: &Arc<TxRxPeer>, st: &mut RxTidDefrag) {
        if self.waitlist.remove(peer, st) {
            DefragStats::dec(&self.stats.rx_frag_wait);
        }
    }

    /// 周期调用：启用超时检查且到了下次检查时间才清理
    pub fn poll_timeout<H: DpHal>(&self, hal: &H, now_ms: u64) -> usize {
        if !self.cfg.defrag_timeout_check || now_ms < self.waitlist.next_flush_ms() {
            return 0;
        }
        self.waitlist_flush(hal, now_ms)
    }
}

/// 冲掉在途链：归还头描述符与 link 描述符，释放全部分片
pub fn reorder_flush_frag<H: DpHal>(hal: &H, st: &mut RxTidDefrag) {
    return_head_frag_desc(hal, st);
    st.cleanup();
}

/// 丢弃当前分片：描述符回 free list，link 描述符回 idle 列表
fn discard<H: DpHal>(hal: &H, ring_desc: &ReoDestDesc, rx_desc: RxDesc, rx_bfs: &mut u32) {
    hal.desc_free(rx_desc);
    if let Err(e) = hal.link_desc_return(&ring_desc.buf_addr_info(), BmAction::PutInIdleList) {
        log::error!(target: "wireless::dp::defrag", "failed to return link desc: {:?}", e);
    }
    *rx_bfs += 1;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::SEC_UCAST;
    use crate::test_util::{rx_frag, FragSpec, RecordingNotify, PEER_ID, PEER_MAC, VDEV_MAC};
    use alloc::vec::Vec;
    use hal::desc::{mpdu_flags, peer_meta, BufAddrInfo};
    use hal::stub::SoftHal;

    fn engine(cfg: DefragCfg) -> (DefragEngine, Arc<RecordingNotify>, Arc<TxRxPeer>) {
        let notify = Arc::new(RecordingNotify::default());
        let eng = DefragEngine::new(cfg, notify.clone());
        let peer = eng.add_peer(PEER_ID, PEER_MAC, 0, VDEV_MAC).unwrap();
        peer.rx_init();
        (eng, notify, peer)
    }

    fn ccmp_pair(seq: u16) -> (Vec<u8>, Vec<FragSpec>) {
        let payload: Vec<u8> = (0..250u32).map(|i| i as u8).collect();
        let specs = FragSpec::split(Cipher::Ccmp, seq, &payload, &[200], [0; 8]);
        (payload, specs)
    }

    #[cfg(not(feature = "no-reinject"))]
    #[test]
    fn ccmp_two_fragments_reinjected() {
        let (eng, _, peer) = engine(DefragCfg::default());
        peer.set_security(SEC_UCAST, Cipher::Ccmp, [0; 8]);
        let hal = SoftHal::new(8);
        let (payload, specs) = ccmp_pair(100);
        let (r0, d0) = rx_frag(&hal, &specs[0], 1);
        let (r1, d1) = rx_frag(&hal, &specs[1], 2);

        assert_eq!(eng.frag_handle(&hal, &r0, d0, 1000), 0);
        assert_eq!(eng.waitlist().len(), 1);
        assert_eq!(eng.frag_handle(&hal, &r1, d1, 1010), 1);

        let reinjected = hal.drain_reinjected();
        assert_eq!(reinjected.len(), 1);
        let (ent, desc) = &reinjected[0];
        assert_eq!(desc.cookie, 1);
        assert_eq!(ent.mpdu_desc_info().mpdu_seq, 100);
        let bytes = desc.nbuf.as_ref().unwrap().to_vec();
        let eth = &bytes[RX_PKT_TLV_SIZE..];
        assert_eq!(&eth[0..6], &VDEV_MAC);
        assert_eq!(&eth[6..12], &PEER_MAC);
        assert_eq!(&eth[14..], &payload[..]);

        assert!(eng.waitlist().is_empty());
        assert_eq!(hal.freed_count(2), 1);
        assert_eq!(hal.freed_count(1), 0);
        assert_eq!(hal.idle_returns(), [r1.buf_addr_info()]);
        let st = peer.rx_tid[0].lock();
        assert!(st.frags.is_empty());
        assert!(st.dst_ring_desc.is_none());
        assert!(st.head_frag_desc.is_none());
        let s = eng.stats().snapshot();
        assert_eq!(s.reo_reinject, 1);
        assert_eq!(s.rx_frag_err, 0);
        assert_eq!(s.rx_frags, 2);
        assert_eq!(eng.reinject_history().total(), 1);
    }

    #[test]
    fn lone_second_fragment_dropped() {
        let (eng, _, peer) = engine(DefragCfg::default());
        let hal = SoftHal::new(8);
        let (r, d) = rx_frag(&hal, &FragSpec::plain(5, 1, true, 20, 1), 7);
        assert_eq!(eng.frag_handle(&hal, &r, d, 0), 1);
        assert!(peer.rx_tid[0].lock().frags.is_empty());
        assert!(eng.waitlist().is_empty());
        assert_eq!(hal.freed_count(7), 1);
        assert_eq!(hal.idle_returns().len(), 1);
        assert_eq!(eng.stats().snapshot().rx_frag_err, 1);
    }

    #[cfg(not(feature = "no-reinject"))]
    #[test]
    fn ring_full_returns_head_desc_once() {
        let (eng, _, peer) = engine(DefragCfg::default());
        peer.set_security(SEC_UCAST, Cipher::Ccmp, [0; 8]);
        let hal = SoftHal::new(0);
        let (_, specs) = ccmp_pair(30);
        let (r0, d0) = rx_frag(&hal, &specs[0], 1);
        let (r1, d1) = rx_frag(&hal, &specs[1], 2);
        eng.frag_handle(&hal, &r0, d0, 0);
        eng.frag_handle(&hal, &r1, d1, 0);

        assert_eq!(hal.reinjected_len(), 0);
        assert_eq!(hal.freed_count(1), 1);
        assert_eq!(hal.freed_count(2), 1);
        assert_eq!(hal.idle_returns(), [r1.buf_addr_info(), r0.buf_addr_info()]);
        let s = eng.stats().snapshot();
        assert_eq!(s.rx_frag_err, 1);
        assert_eq!(s.reo_reinject_fail, 1);
        assert!(peer.rx_tid[0].lock().head_frag_desc.is_none());
    }

    #[cfg(not(feature = "no-reinject"))]
    #[test]
    fn new_sequence_flushes_pending_chain() {
        let (eng, _, peer) = engine(DefragCfg::default());
        let hal = SoftHal::new(8);
        let (r0, d0) = rx_frag(&hal, &FragSpec::plain(10, 0, true, 20, 1), 1);
        let (r1, d1) = rx_frag(&hal, &FragSpec::plain(11, 0, true, 20, 2), 2);
        let (r2, d2) = rx_frag(&hal, &FragSpec::plain(11, 1, false, 20, 2), 3);

        eng.frag_handle(&hal, &r0, d0, 0);
        eng.frag_handle(&hal, &r1, d1, 10);
        assert_eq!(hal.freed_count(1), 1);
        assert_eq!(eng.stats().snapshot().rx_frag_oor, 1);
        assert_eq!(eng.waitlist().len(), 1);
        {
            let st = peer.rx_tid[0].lock();
            assert_eq!(st.curr_seq_num, 11);
            assert_eq!(st.frags.len(), 1);
            assert_eq!(st.head_frag_desc.as_ref().map(|d| d.cookie), Some(2));
        }

        eng.frag_handle(&hal, &r2, d2, 20);
        let reinjected = hal.drain_reinjected();
        assert_eq!(reinjected.len(), 1);
        assert_eq!(reinjected[0].1.cookie, 2);
        assert!(eng.waitlist().is_empty());
    }

    #[test]
    fn duplicate_fragment_is_noop() {
        let (eng, _, peer) = engine(DefragCfg::default());
        let hal = SoftHal::new(8);
        let (r0, d0) = rx_frag(&hal, &FragSpec::plain(20, 0, true, 20, 1), 1);
        let (r0b, d0b) = rx_frag(&hal, &FragSpec::plain(20, 0, true, 20, 1), 2);
        eng.frag_handle(&hal, &r0, d0, 0);
        assert_eq!(eng.frag_handle(&hal, &r0b, d0b, 5), 1);
        assert_eq!(hal.freed_count(2), 1);
        let st = peer.rx_tid[0].lock();
        assert_eq!(st.frags.len(), 1);
        assert_eq!(st.head_frag_desc.as_ref().map(|d| d.cookie), Some(1));
        assert_eq!(st.defrag_timeout_ms, 5 + 100);
        let snap = eng.stats().snapshot();
        assert_eq!(snap.rx_frag_err, 0);
        assert_eq!(snap.rx_frag_wait, 1);
        assert_eq!(eng.waitlist().len(), 1);
    }

    #[cfg(not(feature = "no-reinject"))]
    #[test]
    fn out_of_order_fragments_reinjected_from_head() {
        let (eng, _, peer) = engine(DefragCfg::default());
        let hal = SoftHal::new(8);
        let payload: Vec<u8> = (0..90u32).map(|i| (i * 3) as u8).collect();
        let specs = FragSpec::split(Cipher::None, 61, &payload, &[30, 60], [0; 8]);
        let (r0, d0) = rx_frag(&hal, &specs[0], 1);
        let (r1, d1) = rx_frag(&hal, &specs[1], 2);
        let (r2, d2) = rx_frag(&hal, &specs[2], 3);

        assert_eq!(eng.frag_handle(&hal, &r0, d0, 0), 0);
        assert_eq!(eng.frag_handle(&hal, &r2, d2, 1), 1);
        {
            let st = peer.rx_tid[0].lock();
            assert_eq!(st.frags.len(), 2);
            assert_eq!(st.curr_frag_num, 2);
            assert_eq!(st.head_frag_desc.as_ref().map(|d| d.cookie), Some(1));
        }
        assert_eq!(hal.freed_count(3), 1);
        assert_eq!(hal.idle_returns(), [r2.buf_addr_info()]);
        assert_eq!(eng.waitlist().len(), 1);

        assert_eq!(eng.frag_handle(&hal, &r1, d1, 2), 1);
        let reinjected = hal.drain_reinjected();
        assert_eq!(reinjected.len(), 1);
        let (ent, desc) = &reinjected[0];
        assert_eq!(desc.cookie, 1);
        assert_eq!(ent.buf_addr_info().paddr, r0.buf_addr_info().paddr);
        let bytes = desc.nbuf.as_ref().unwrap().to_vec();
        assert_eq!(&bytes[RX_PKT_TLV_SIZE + 14..], &payload[..]);

        assert_eq!(hal.freed_count(1), 0);
        assert_eq!(hal.freed_count(2), 1);
        assert_eq!(hal.idle_returns(), [r2.buf_addr_info(), r1.buf_addr_info()]);
        assert!(eng.waitlist().is_empty());
        let st = peer.rx_tid[0].lock();
        assert!(st.head_frag_desc.is_none());
        assert!(st.frags.is_empty());
        let snap = eng.stats().snapshot();
        assert_eq!(snap.rx_frag_wait, 0);
        assert_eq!(snap.reo_reinject, 1);
    }

    #[test]
    fn independent_peers_progress_concurrently() {
        let (eng, _, peer1) = engine(DefragCfg::default());
        let peer2 = eng.add_peer(2, [0x02, 0x66, 0, 0, 0, 2], 0, VDEV_MAC).unwrap();
        peer2.rx_init();
        let hal = SoftHal::new(8);
        let mut specs = FragSpec::split(Cipher::None, 50, &[9u8; 60], &[30], [0; 8]);
        for spec in specs.iter_mut() {
            spec.peer_id = 2;
        }
        let frags: Vec<_> = specs
            .iter()
            .enumerate()
            .map(|(i, spec)| rx_frag(&hal, spec, 10 + i as u32))
            .collect();

        // peer 1 的分片正在处理中：持有其 TID 锁
        let in_flight = peer1.rx_tid[0].lock();
        std::thread::scope(|s| {
            s.spawn(|| {
                for (r, d) in frags {
                    eng.frag_handle(&hal, &r, d, 0);
                }
            });
        });
        drop(in_flight);

        assert!(peer2.rx_tid[0].lock().frags.is_empty());
        assert!(eng.waitlist().is_empty());
        let snap = eng.stats().snapshot();
        assert_eq!(snap.rx_frags, 2);
        assert_eq!(snap.rx_frag_err, 0);
        assert_eq!(snap.reo_reinject + snap.rx_frag_delivered, 1);
    }

    #[test]
    fn waitlist_flushes_only_after_deadline() {
        let (eng, _, peer) = engine(DefragCfg::default());
        let hal = SoftHal::new(8);
        let (r0, d0) = rx_frag(&hal, &FragSpec::plain(3, 0, true, 20, 1), 1);
        eng.frag_handle(&hal, &r0, d0, 1000);
        assert_eq!(eng.waitlist().next_flush_ms(), 1100);
        assert_eq!(eng.stats().snapshot().rx_frag_wait, 1);

        assert_eq!(eng.poll_timeout(&hal, 1099), 0);
        assert_eq!(peer.rx_tid[0].lock().frags.len(), 1);
        assert_eq!(eng.poll_timeout(&hal, 1100), 1);
        assert_eq!(eng.stats().snapshot().rx_frag_wait, 0);

        let st = peer.rx_tid[0].lock();
        assert!(st.frags.is_empty());
        assert!(!st.on_waitlist);
        assert_eq!(hal.freed_count(1), 1);
        assert_eq!(hal.idle_returns(), [r0.buf_addr_info()]);
        assert!(eng.waitlist().is_empty());
        assert_eq!(eng.stats().snapshot().rx_frag_timeout, 1);
    }

    #[test]
    fn rearmed_tid_survives_expired_entry() {
        let (eng, _, peer) = engine(DefragCfg::default());
        let hal = SoftHal::new(8);
        let (r0, d0) = rx_frag(&hal, &FragSpec::plain(3, 0, true, 20, 1), 1);
        eng.frag_handle(&hal, &r0, d0, 1000);
        peer.rx_tid[0].lock().defrag_timeout_ms = 5000;
        assert_eq!(eng.waitlist_flush(&hal, 1100), 0);
        assert_eq!(peer.rx_tid[0].lock().frags.len(), 1);
        assert_eq!(hal.freed_count(1), 0);
    }

    #[test]
    fn timeout_check_disabled_never_waitlists() {
        let cfg = DefragCfg {
            defrag_timeout_check: false,
            ..DefragCfg::default()
        };
        let (eng, _, peer) = engine(cfg);
        let hal = SoftHal::new(8);
        let (r0, d0) = rx_frag(&hal, &FragSpec::plain(3, 0, true, 20, 1), 1);
        eng.frag_handle(&hal, &r0, d0, 1000);
        assert!(eng.waitlist().is_empty());
        assert_eq!(eng.poll_timeout(&hal, 100_000), 0);
        assert_eq!(peer.rx_tid[0].lock().frags.len(), 1);
    }

    #[test]
    fn delete_peer_flushes_all_tids() {
        let (eng, _, peer) = engine(DefragCfg::default());
        let hal = SoftHal::new(8);
        let (r0, d0) = rx_frag(&hal, &FragSpec::plain(3, 0, true, 20, 1), 1);
        eng.frag_handle(&hal, &r0, d0, 0);
        eng.delete_peer(&hal, PEER_ID).unwrap();

        assert!(eng.peers().is_empty());
        assert!(eng.waitlist().is_empty());
        assert_eq!(hal.freed_count(1), 1);
        assert!(peer.rx_tid[0].lock().frags.is_empty());
        assert!(!peer.rx_tid[0].lock().rx_setup);
        assert_eq!(eng.delete_peer(&hal, PEER_ID), Err(AxError::NotFound));
    }

    #[test]
    fn stale_waitlist_entry_for_replaced_peer_ignored() {
        let (eng, _, old) = engine(DefragCfg::default());
        let hal = SoftHal::new(8);
        let (r0, d0) = rx_frag(&hal, &FragSpec::plain(3, 0, true, 20, 1), 1);
        eng.frag_handle(&hal, &r0, d0, 0);
        eng.peers().detach(PEER_ID);
        let new = eng.add_peer(PEER_ID, PEER_MAC, 0, VDEV_MAC).unwrap();
        assert!(!Arc::ptr_eq(&old, &new));
        assert_eq!(eng.waitlist_flush(&hal, 1000), 0);
        assert_eq!(old.rx_tid[0].lock().frags.len(), 1);
        assert!(eng.add_peer(PEER_ID, PEER_MAC, 0, VDEV_MAC).is_err());
    }

    #[test]
    fn unknown_peer_and_uninit_tid() {
        let (eng, _, _) = engine(DefragCfg::default());
        let hal = SoftHal::new(8);
        let mut spec = FragSpec::plain(3, 0, true, 20, 1);
        spec.peer_id = 9;
        let (r, d) = rx_frag(&hal, &spec, 1);
        assert_eq!(eng.frag_handle(&hal, &r, d, 0), 1);
        assert_eq!(eng.stats().snapshot().rx_frag_err_no_peer, 1);

        eng.add_peer(9, [9; 6], 0, VDEV_MAC).unwrap();
        let (r, d) = rx_frag(&hal, &spec, 2);
        assert_eq!(eng.frag_handle(&hal, &r, d, 0), 1);
        let s = eng.stats().snapshot();
        assert_eq!(s.defrag_peer_uninit, 1);
        assert_eq!(s.rx_frag_err, 2);

        eng.rx_tid_setup(9, 0).unwrap();
        let (r, d) = rx_frag(&hal, &spec, 3);
        assert_eq!(eng.frag_handle(&hal, &r, d, 0), 0);
        assert_eq!(eng.peers().get_ref_by_id(9).unwrap().rx_tid[0].lock().frags.len(), 1);
    }

    #[test]
    fn ingress_checks_drop_bad_buffers() {
        let cfg = DefragCfg {
            addr1_check: true,
            ..DefragCfg::default()
        };
        let (eng, _, _) = engine(cfg);
        let hal = SoftHal::new(8);

        let (r, mut d) = rx_frag(&hal, &FragSpec::plain(3, 0, true, 20, 1), 1);
        if let Some(n) = d.nbuf.as_mut() {
            n.set_len(10);
        }
        assert_eq!(eng.frag_handle(&hal, &r, d, 0), 1);
        assert_eq!(eng.stats().snapshot().rx_frag_err_len_error, 1);

        let mut spec = FragSpec::plain(3, 0, true, 20, 1);
        spec.mcast = true;
        let (r, d) = rx_frag(&hal, &spec, 2);
        eng.frag_handle(&hal, &r, d, 0);
        assert_eq!(eng.stats().snapshot().defrag_ad1_invalid, 1);

        let (r, d) = rx_frag(&hal, &FragSpec::plain(4, 0, false, 20, 1), 3);
        eng.frag_handle(&hal, &r, d, 0);
        assert_eq!(eng.stats().snapshot().rx_frag_err, 3);

        hal.set_refill_pool_consume(true);
        let (r, d) = rx_frag(&hal, &FragSpec::plain(5, 0, true, 20, 1), 4);
        assert_eq!(eng.frag_handle(&hal, &r, d, 0), 1);
        assert_eq!(hal.freed_count(4), 1);
        assert_eq!(eng.stats().snapshot().rx_frag_err, 4);
    }

    #[test]
    fn empty_mpdu_and_unmapped_desc_ignored() {
        let (eng, _, _) = engine(DefragCfg::default());
        let hal = SoftHal::new(8);
        let spec = FragSpec::plain(3, 0, true, 20, 1);
        let link = hal.alloc_link_desc(BufAddrInfo::default(), 0);
        let mpdu = MpduDescInfo {
            msdu_count: 0,
            mpdu_seq: 3,
            mpdu_flags: mpdu_flags::FRAGMENT,
            peer_meta_data: peer_meta::build(PEER_ID, 0),
        };
        let ring = ReoDestDesc::new(link, mpdu, 0, 0);
        assert_eq!(eng.frag_handle(&hal, &ring, RxDesc::new(1, 0, spec.build_rx_buf()), 0), 0);

        let (r, mut d) = rx_frag(&hal, &spec, 2);
        d.unmapped = true;
        assert_eq!(eng.frag_handle(&hal, &r, d, 0), 0);
        assert_eq!(eng.stats().snapshot().rx_frags, 0);
        assert!(hal.idle_returns().is_empty());
    }

    #[test]
    fn pn_gap_drops_chain_through_engine() {
        let (eng, _, peer) = engine(DefragCfg::default());
        peer.set_security(SEC_UCAST, Cipher::Gcmp, [0; 8]);
        let hal = SoftHal::new(8);
        let mut specs = FragSpec::split(Cipher::Gcmp, 9, &[5u8; 90], &[40], [0; 8]);
        specs[1].pn = [specs[0].pn[0] + 2, 0];
        let (r0, d0) = rx_frag(&hal, &specs[0], 1);
        let (r1, d1) = rx_frag(&hal, &specs[1], 2);
        eng.frag_handle(&hal, &r0, d0, 0);
        assert_eq!(eng.frag_handle(&hal, &r1, d1, 0), 2);

        assert_eq!(hal.reinjected_len(), 0);
        assert_eq!(hal.freed_count(1), 1);
        let s = eng.stats().snapshot();
        assert_eq!(s.pn_err, 1);
        assert_eq!(s.rx_frag_err, 1);
        assert!(peer.rx_tid[0].lock().frags.is_empty());
    }

    #[test]
    fn tkip_mic_failure_notifies() {
        let key = [3u8; 8];
        let (eng, notify, peer) = engine(DefragCfg::default());
        peer.set_security(SEC_UCAST, Cipher::Tkip, key);
        let hal = SoftHal::new(8);
        let mut specs = FragSpec::split(Cipher::Tkip, 12, &[0x42u8; 64], &[40], key);
        specs[1].flip_payload_bit = true;
        let (r0, d0) = rx_frag(&hal, &specs[0], 1);
        let (r1, d1) = rx_frag(&hal, &specs[1], 2);
        eng.frag_handle(&hal, &r0, d0, 0);
        eng.frag_handle(&hal, &r1, d1, 0);

        assert_eq!(notify.mic_errors(), 1);
        let info = notify.last_mic_error().unwrap();
        assert_eq!(info.ta_mac_addr, PEER_MAC);
        assert_eq!(info.da_mac_addr, VDEV_MAC);
        assert!(!info.multicast);
        assert_eq!(eng.stats().snapshot().mic_err, 1);
        assert_eq!(hal.reinjected_len(), 0);
    }

    #[cfg(not(feature = "no-reinject"))]
    #[test]
    fn last_fragment_from_regular_rx_path() {
        let (eng, _, peer) = engine(DefragCfg::default());
        let hal = SoftHal::new(8);
        let (r0, d0) = rx_frag(&hal, &FragSpec::plain(40, 0, true, 20, 1), 1);
        eng.frag_handle(&hal, &r0, d0, 0);

        let last = FragSpec::plain(40, 1, false, 20, 1).build_rx_buf();
        eng.add_last_frag(&hal, &peer, 0, 40, last, 5).unwrap();
        assert_eq!(hal.reinjected_len(), 1);
        assert!(eng.waitlist().is_empty());

        let (r0, d0) = rx_frag(&hal, &FragSpec::plain(41, 0, true, 20, 1), 2);
        eng.frag_handle(&hal, &r0, d0, 10);
        let stale = FragSpec::plain(42, 1, false, 20, 1).build_rx_buf();
        assert_eq!(
            eng.add_last_frag(&hal, &peer, 0, 42, stale, 11),
            Err(DefragError::StaleSequence(42))
        );
        assert_eq!(hal.freed_count(2), 1);
        assert!(peer.rx_tid[0].lock().frags.is_empty());
        assert!(eng.waitlist().is_empty());
        assert_eq!(
            eng.add_last_frag(&hal, &peer, 17, 42, SkBuff::alloc(64), 12),
            Err(DefragError::InvalidTid(17))
        );
    }

    #[cfg(feature = "no-reinject")]
    #[test]
    fn reassembled_frame_delivered_to_stack() {
        let (eng, notify, peer) = engine(DefragCfg::default());
        let hal = SoftHal::new(8);
        let payload = [7u8; 40];
        let specs = FragSpec::split(Cipher::None, 40, &payload, &[28], [0; 8]);
        let (r0, d0) = rx_frag(&hal, &specs[0], 1);
        let (r1, d1) = rx_frag(&hal, &specs[1], 2);
        eng.frag_handle(&hal, &r0, d0, 0);
        eng.frag_handle(&hal, &r1, d1, 0);

        let delivered = notify.delivered();
        assert_eq!(delivered.len(), 1);
        let (vdev_id, peer_id, bytes) = &delivered[0];
        assert_eq!((*vdev_id, *peer_id), (0, PEER_ID));
        assert_eq!(&bytes[0..6], &VDEV_MAC);
        assert_eq!(&bytes[14..], &payload[..]);
        assert_eq!(hal.freed_count(1), 1);
        assert_eq!(hal.reinjected_len(), 0);
        assert_eq!(eng.stats().snapshot().rx_frag_delivered, 1);
        assert!(peer.rx_tid[0].lock().frags.is_empty());
    }
}

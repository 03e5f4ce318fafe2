//! peer 与 per-TID 重组状态
//!
//! peer 以 `Arc` 共享，[`PeerTable`] 按 peer_id 索引；每个 TID 的重组状态各自一把 `spin::Mutex`。

use alloc::sync::Arc;
use alloc::vec::Vec;

use hal::desc::{ReoDestDesc, RxDesc};
use ieee80211::crypto::MICHAEL_KEY_LEN;
use ieee80211::MacAddr;

use crate::cipher::Cipher;
use crate::error::DefragError;
use crate::fraglist::{FragList, Fragment, InsertResult};

/// TID 数：0..=15 数据 TID + 1 个非 QoS TID
pub const DP_MAX_TIDS: usize = 17;
/// 非 QoS 帧使用的 TID
pub const DP_NON_QOS_TID: u8 = 16;

/// 安全参数下标
pub const SEC_UCAST: usize = 0;
pub const SEC_MCAST: usize = 1;

/// 单播/组播各一份
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeerSecurity {
    pub cipher: Cipher,
    pub michael_key: [u8; MICHAEL_KEY_LEN],
}

/// 头分片的 REO 目的环描述符副本。按环条目实际字数保存，分配失败可感知。
pub struct SavedRingDesc {
    words: Vec<u32>,
}

impl SavedRingDesc {
    pub fn try_save(desc: &ReoDestDesc, entry_words: usize) -> Result<Self, DefragError> {
        let n = entry_words.min(desc.words.len());
        let mut words = Vec::new();
        words
            .try_reserve_exact(n)
            .map_err(|_| DefragError::NoMemory)?;
        words.extend_from_slice(&desc.words[..n]);
        Ok(Self { words })
    }

    pub fn desc(&self) -> ReoDestDesc {
        ReoDestDesc::from_words(&self.words)
    }
}

/// per-TID 重组状态
pub struct RxTidDefrag {
    pub tid: u8,
    pub curr_seq_num: u16,
    /// 链尾分片号
    pub curr_frag_num: u8,
    pub frags: FragList,
    /// 头分片的目的环描述符副本
    pub dst_ring_desc: Option<SavedRingDesc>,
    /// 头分片的 RX 描述符；回注时随重组缓冲交给硬件
    pub head_frag_desc: Option<RxDesc>,
    /// 头分片 PN
    pub pn128: [u64; 2],
    /// 等待链截止时间（ms）
    pub defrag_timeout_ms: u64,
    pub on_waitlist: bool,
    /// RX TID 已初始化
    pub rx_setup: bool,
}

impl RxTidDefrag {
    pub const fn new(tid: u8) -> Self {
        Self {
            tid,
            curr_seq_num: 0,
            curr_frag_num: 0,
            frags: FragList::new(),
            dst_ring_desc: None,
            head_frag_desc: None,
            pn128: [0, 0],
            defrag_timeout_ms: 0,
            on_waitlist: false,
            rx_setup: false,
        }
    }

    /// 插入分片并跟踪链尾分片号
    pub fn insert_frag(&mut self, frag: Fragment) -> InsertResult {
        let result = self.frags.insert(frag);
        if result != InsertResult::Rejected {
            self.curr_frag_num = self.frags.tail().map_or(0, |t| t.frag_num);
        }
        result
    }

    /// 丢弃在途分片与保存的描述符副本；头描述符须由调用方先行处理
    pub fn cleanup(&mut self) {
        let freed = self.frags.clear();
        if freed > 0 {
            log::debug!(target: "wireless::dp::defrag", "tid {} cleanup: {} frags freed", self.tid, freed);
        }
        self.dst_ring_desc = None;
        self.curr_frag_num = 0;
    }
}

pub struct TxRxPeer {
    pub peer_id: u16,
    pub mac_addr: MacAddr,
    pub vdev_id: u8,
    /// 所属 VDEV 的地址（addr1 校验用）
    pub vdev_mac_addr: MacAddr,
    pub security: spin::RwLock<[PeerSecurity; 2]>,
    pub rx_tid: [spin::Mutex<RxTidDefrag>; DP_MAX_TIDS],
}

impl TxRxPeer {
    pub fn new(peer_id: u16, mac_addr: MacAddr, vdev_id: u8, vdev_mac_addr: MacAddr) -> Self {
        Self {
            peer_id,
            mac_addr,
            vdev_id,
            vdev_mac_addr,
            security: spin::RwLock::new([PeerSecurity::default(); 2]),
            rx_tid: core::array::from_fn(|tid| spin::Mutex::new(RxTidDefrag::new(tid as u8))),
        }
    }

    /// 初始化全部 RX TID
    pub fn rx_init(&self) {
        for tid in &self.rx_tid {
            tid.lock().rx_setup = true;
        }
    }

    pub fn rx_tid_setup(&self, tid: u8) -> Result<(), DefragError> {
        let t = self
            .rx_tid
            .get(tid as usize)
            .ok_or(DefragError::InvalidTid(tid))?;
        t.lock().rx_setup = true;
        Ok(())
    }

    /// 设置单播或组播安全参数
    pub fn set_security(&self, index: usize, cipher: Cipher, michael_key: [u8; MICHAEL_KEY_LEN]) {
        if let Some(sec) = self.security.write().get_mut(index) {
            *sec = PeerSecurity {
                cipher,
                michael_key,
            };
        }
    }

    pub fn security(&self, mcast: bool) -> PeerSecurity {
        self.security.read()[if mcast { SEC_MCAST } else { SEC_UCAST }]
    }
}

/// peer_id → peer
#[derive(Default)]
pub struct PeerTable {
    peers: spin::RwLock<Vec<Option<Arc<TxRxPeer>>>>,
}

impl PeerTable {
    pub const fn new() -> Self {
        Self {
            peers: spin::RwLock::new(Vec::new()),
        }
    }

    /// 登记 peer；id 已被占用时返回 `None`
    pub fn attach(&self, peer: TxRxPeer) -> Option<Arc<TxRxPeer>> {
        let idx = peer.peer_id as usize;
        let mut peers = self.peers.write();
        if peers.len() <= idx {
            peers.resize(idx + 1, None);
        }
        if peers[idx].is_some() {
            return None;
        }
        let peer = Arc::new(peer);
        peers[idx] = Some(peer.clone());
        Some(peer)
    }

    /// 取引用；返回的 `Arc` 丢弃即释放
    pub fn get_ref_by_id(&self, peer_id: u16) -> Option<Arc<TxRxPeer>> {
        self.peers.read().get(peer_id as usize)?.clone()
    }

    pub fn detach(&self, peer_id: u16) -> Option<Arc<TxRxPeer>> {
        self.peers.write().get_mut(peer_id as usize)?.take()
    }

    pub fn len(&self) -> usize {
        self.peers.read().iter().filter(|p| p.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

//! 单元测试用的合成分片

use alloc::vec::Vec;

use hal::desc::{
    mpdu_flags, peer_meta, BufAddrInfo, MpduDescInfo, ReoDestDesc, RxDesc,
};
use hal::stub::{SoftHal, SOFT_RX_BUF_SIZE};
use hal::tlv::{flags, RxPktTlv, RX_PKT_TLV_SIZE};
use ieee80211::{fc, MacAddr, FCS_LEN};
use skb::SkbQueue;
use skb::SkBuff;

use crate::cipher::Cipher;
use crate::michael::{michael_mic, MICHAEL_HDR_LEN};
use crate::notify::{DefragNotify, MicErrInfo};

pub const PEER_MAC: MacAddr = [0x02, 0x11, 0x22, 0x33, 0x44, 0x55];
pub const VDEV_MAC: MacAddr = [0x02, 0xaa, 0xbb, 0xcc, 0xdd, 0xee];
pub const BSSID: MacAddr = [0x02, 0xaa, 0xbb, 0xcc, 0xdd, 0x00];
pub const MCAST_ADDR: MacAddr = [0x01, 0x00, 0x5e, 0x00, 0x00, 0x01];
pub const QDESC_ADDR: u64 = 0x9000_1000;
pub const REO_DEST_IND: u8 = 2;
pub const PEER_ID: u16 = 1;

const LLC_SNAP_IPV4: [u8; 8] = [0xaa, 0xaa, 0x03, 0x00, 0x00, 0x00, 0x08, 0x00];
/// QoS 数据帧头：3 地址 + QoS 控制
const QOS_HDR_LEN: usize = 26;

/// 一个待构造的分片
#[derive(Debug, Clone)]
pub struct FragSpec {
    pub cipher: Cipher,
    pub seq: u16,
    pub frag_num: u8,
    pub more: bool,
    pub tid: u8,
    pub pn: [u64; 2],
    /// 安全头之后、安全尾之前的明文
    pub body: Vec<u8>,
    pub mcast: bool,
    pub ext_iv: bool,
    pub flip_payload_bit: bool,
    pub peer_id: u16,
}

impl FragSpec {
    /// 把 `LLC/SNAP | payload [| Michael MIC]` 在 `cuts` 处切成若干分片
    pub fn split(
        cipher: Cipher,
        seq: u16,
        payload: &[u8],
        cuts: &[usize],
        key: [u8; 8],
    ) -> Vec<FragSpec> {
        let tid = 0;
        let mut stream = LLC_SNAP_IPV4.to_vec();
        stream.extend_from_slice(payload);
        if cipher.needs_mic() {
            let mut hdr = [0u8; MICHAEL_HDR_LEN];
            hdr[0..6].copy_from_slice(&VDEV_MAC);
            hdr[6..12].copy_from_slice(&PEER_MAC);
            hdr[12] = tid;
            let mic = michael_mic(&key, &hdr, &stream);
            stream.extend_from_slice(&mic);
        }

        let mut bounds = Vec::with_capacity(cuts.len() + 2);
        bounds.push(0);
        bounds.extend_from_slice(cuts);
        bounds.push(stream.len());
        let n = bounds.len() - 1;
        (0..n)
            .map(|i| FragSpec {
                cipher,
                seq,
                frag_num: i as u8,
                more: i + 1 < n,
                tid,
                pn: [0x100 + i as u64, 0],
                body: stream[bounds[i]..bounds[i + 1]].to_vec(),
                mcast: false,
                ext_iv: true,
                flip_payload_bit: false,
                peer_id: PEER_ID,
            })
            .collect()
    }

    /// 单个无加密分片，负载为 `len` 个 `fill`
    pub fn plain(seq: u16, frag_num: u8, more: bool, len: usize, fill: u8) -> FragSpec {
        let mut body = LLC_SNAP_IPV4.to_vec();
        body.resize(LLC_SNAP_IPV4.len() + len, fill);
        FragSpec {
            cipher: Cipher::None,
            seq,
            frag_num,
            more,
            tid: 0,
            pn: [0x100 + frag_num as u64, 0],
            body,
            mcast: false,
            ext_iv: true,
            flip_payload_bit: false,
            peer_id: PEER_ID,
        }
    }

    /// `[TLV | 802.11 头 | 安全头 | body | 安全尾 | FCS]`
    pub fn bytes(&self) -> Vec<u8> {
        let p = self.cipher.params();
        let mut frame_control = fc::TYPE_DATA | fc::SUBTYPE_QOS;
        if self.cipher != Cipher::None {
            frame_control |= fc::PROTECTED;
        }
        if self.more {
            frame_control |= fc::MORE_FRAGS;
        }
        let seq_ctrl = (self.seq << 4) | self.frag_num as u16;

        let mut v = std::vec![0u8; RX_PKT_TLV_SIZE];
        v.extend_from_slice(&frame_control.to_le_bytes());
        v.extend_from_slice(&[0, 0]);
        v.extend_from_slice(if self.mcast { &MCAST_ADDR } else { &VDEV_MAC });
        v.extend_from_slice(&PEER_MAC);
        v.extend_from_slice(&BSSID);
        v.extend_from_slice(&seq_ctrl.to_le_bytes());
        v.extend_from_slice(&(self.tid as u16).to_le_bytes());
        debug_assert_eq!(v.len(), RX_PKT_TLV_SIZE + QOS_HDR_LEN);

        let pn = self.pn[0].to_le_bytes();
        match p.header_len {
            0 => {}
            4 => v.extend_from_slice(&[pn[0], pn[1], pn[2], 0]),
            _ => {
                let ext = if self.ext_iv { 0x20 } else { 0 };
                v.extend_from_slice(&[pn[0], pn[1], 0, ext, pn[2], pn[3], pn[4], pn[5]]);
            }
        }
        let body_off = v.len();
        v.extend_from_slice(&self.body);
        if self.flip_payload_bit {
            let i = body_off + self.body.len() / 2;
            v[i] ^= 0x01;
        }
        v.extend(core::iter::repeat(0xcc).take(p.trailer_len));
        v.extend_from_slice(&[0xfc; FCS_LEN]);

        let mut tlv_flags = flags::FC_VALID | flags::SEQ_CTRL_VALID;
        if self.mcast {
            tlv_flags |= flags::MCAST;
        }
        RxPktTlv {
            frame_control,
            seq_ctrl,
            flags: tlv_flags,
            tid: self.tid,
            msdu_len: (v.len() - RX_PKT_TLV_SIZE) as u16,
            pn: self.pn,
        }
        .write(&mut v);
        v
    }

    /// 已设置长度的缓冲（直接交给重组）
    pub fn build_nbuf(&self) -> SkBuff {
        SkBuff::from_slice(&self.bytes(), 0)
    }

    /// 刚由 DMA 写入的 RX 缓冲：内容就位，长度仍为 0
    pub fn build_rx_buf(&self) -> SkBuff {
        let bytes = self.bytes();
        let mut nbuf = SkBuff::alloc(SOFT_RX_BUF_SIZE);
        nbuf.data_mut()[..bytes.len()].copy_from_slice(&bytes);
        nbuf
    }
}

/// 在 `hal` 上登记 link 描述符，构造异常环上送的 (目的环条目, RX 描述符)
pub fn rx_frag(hal: &SoftHal, spec: &FragSpec, cookie: u32) -> (ReoDestDesc, RxDesc) {
    let msdu0 = BufAddrInfo {
        paddr: 0x1000_0000 + cookie as u64 * SOFT_RX_BUF_SIZE as u64,
        sw_cookie: cookie,
        rbm: 1,
    };
    let link = hal.alloc_link_desc(msdu0, REO_DEST_IND);
    let mpdu = MpduDescInfo {
        msdu_count: 1,
        mpdu_seq: spec.seq,
        mpdu_flags: mpdu_flags::FRAGMENT,
        peer_meta_data: peer_meta::build(spec.peer_id, 0),
    };
    (
        ReoDestDesc::new(link, mpdu, QDESC_ADDR, REO_DEST_IND),
        RxDesc::new(cookie, 0, spec.build_rx_buf()),
    )
}

/// 记录所有上报
#[derive(Default)]
pub struct RecordingNotify {
    mic: spin::Mutex<Vec<MicErrInfo>>,
    delivered: spin::Mutex<Vec<(u8, u16, Vec<u8>)>>,
}

impl RecordingNotify {
    pub fn mic_errors(&self) -> usize {
        self.mic.lock().len()
    }

    pub fn last_mic_error(&self) -> Option<MicErrInfo> {
        self.mic.lock().last().copied()
    }

    /// (vdev_id, peer_id, 线性区字节)
    pub fn delivered(&self) -> Vec<(u8, u16, Vec<u8>)> {
        self.delivered.lock().clone()
    }
}

impl DefragNotify for RecordingNotify {
    fn rx_mic_error(&self, info: &MicErrInfo) {
        self.mic.lock().push(*info);
    }

    fn deliver_to_stack(&self, vdev_id: u8, peer_id: u16, mut frames: SkbQueue) {
        while let Some(nbuf) = frames.pop_head() {
            self.delivered.lock().push((vdev_id, peer_id, nbuf.to_vec()));
        }
    }
}

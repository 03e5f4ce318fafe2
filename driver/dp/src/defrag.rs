//! 分片链 → 单个以太网帧
//!
//! 流程：PN/组播检查 → 去 FCS → 逐片剥离安全尾 → TKIP Michael 校验 →
//! 头分片转 Ethernet II（TLV 保留在最前）→ 其余分片去掉 TLV 与头后挂到头包 ext 链。

use alloc::vec::Vec;

use hal::tlv::{RxPktTlv, RX_PKT_TLV_SIZE};
use ieee80211::crypto::{
    ETHER_HDR_LEN, LLC_SNAP_HDR_LEN, LLC_SNAP_TYPE_OFFSET, MICHAEL_KEY_LEN, TKIP_MIC_LEN,
};
use ieee80211::{hdr_len, is_multicast_ether_addr, MacHeader, FCS_LEN};
use skb::SkBuff;

use crate::admission::check_chain_pn;
use crate::error::DefragError;
use crate::fraglist::Fragment;
use crate::michael::{michael_hdr, Michael};
use crate::notify::{DefragNotify, MicErrInfo, MIC_SEQ_CTR_SIZE};
use crate::peer::{RxTidDefrag, TxRxPeer};

/// 重组完成的帧：`nbuf` 为 `[TLV | Ethernet II 头 | 负载]`，后续分片负载在 ext 链上
pub struct ReassembledFrame {
    pub nbuf: SkBuff,
    pub seq: u16,
    pub tid: u8,
}

/// 重组一条完整的分片链（升序）。失败时链上缓冲随之释放。
pub fn defrag(
    peer: &TxRxPeer,
    state: &mut RxTidDefrag,
    chain: Vec<Fragment>,
    notify: &dyn DefragNotify,
) -> Result<ReassembledFrame, DefragError> {
    let mut frags: Vec<SkBuff> = chain.into_iter().map(|f| f.nbuf).collect();
    let head = frags.first().ok_or(DefragError::BrokenChain)?;
    let tlv = RxPktTlv::parse(head.data()).ok_or(DefragError::InvalidLength)?;
    let wh = MacHeader::parse(&head.data()[RX_PKT_TLV_SIZE..]).ok_or(DefragError::InvalidLength)?;
    let fc = if tlv.fc_valid() {
        tlv.frame_control
    } else {
        wh.frame_control
    };
    let mut hdr_space = hdr_len(fc);

    let sec = peer.security(tlv.is_mcast());
    let cipher = sec.cipher;
    log::debug!(
        target: "wireless::dp::defrag",
        "defrag peer {} tid {} seq {}: {} frags, {:?}",
        peer.peer_id, state.tid, state.curr_seq_num, frags.len(), cipher
    );

    // 组播/广播帧不应分片
    for f in &frags {
        let mcast = RxPktTlv::parse(f.data()).is_some_and(|t| t.is_mcast());
        if mcast {
            log::warn!(target: "wireless::dp::defrag", "dropping multicast/broadcast fragments");
            return Err(DefragError::MulticastFragment);
        }
    }

    state.pn128 = tlv.pn;
    if cipher.needs_pn_check() {
        check_chain_pn(&tlv.pn, &frags[1..])?;
    }

    for f in frags.iter_mut() {
        f.trim_tail(FCS_LEN);
    }
    for f in frags.iter_mut() {
        cipher.decap(f, RX_PKT_TLV_SIZE, hdr_space).map_err(|e| {
            log::error!(target: "wireless::dp::defrag", "{:?} decap failed: {}", cipher, e);
            e
        })?;
    }
    hdr_space += cipher.header_len();

    if cipher.needs_mic() {
        if let Err(e) = tkip_demic(&mut frags, &sec.michael_key, RX_PKT_TLV_SIZE + hdr_space, &wh) {
            if e == DefragError::MicMismatch {
                notify.rx_mic_error(&MicErrInfo {
                    vdev_id: peer.vdev_id,
                    da_mac_addr: wh.addr1,
                    ta_mac_addr: wh.addr2,
                    multicast: is_multicast_ether_addr(&wh.addr1),
                    key_id: 0,
                    tsc: [0; MIC_SEQ_CTR_SIZE],
                });
            }
            log::error!(target: "wireless::dp::defrag", "TKIP demic failed: {}", e);
            return Err(e);
        }
    }

    let mut rest = frags.split_off(1);
    let mut head = frags.pop().ok_or(DefragError::BrokenChain)?;
    nwifi_to_8023(&mut head, hdr_space, &wh)?;

    if !rest.is_empty() {
        let mut ext_len = 0;
        for f in rest.iter_mut() {
            if f.len() < RX_PKT_TLV_SIZE + hdr_space {
                return Err(DefragError::InvalidLength);
            }
            f.pull(RX_PKT_TLV_SIZE + hdr_space);
            ext_len += f.len();
        }
        head.append_ext_list(rest, ext_len);
        head.set_is_frag(true);
        log::trace!(
            target: "wireless::dp::defrag",
            "head len {} ext len {}",
            head.len(), ext_len
        );
    }

    Ok(ReassembledFrame {
        nbuf: head,
        seq: state.curr_seq_num,
        tid: state.tid,
    })
}

/// 取出末尾 8 字节 MIC（可能跨最后两片）并校验。`hdrlen` 含 TLV 与安全头。
fn tkip_demic(
    frags: &mut Vec<SkBuff>,
    key: &[u8; MICHAEL_KEY_LEN],
    hdrlen: usize,
    wh: &MacHeader,
) -> Result<(), DefragError> {
    let n = frags.len();
    let last_payload = frags
        .last()
        .ok_or(DefragError::BrokenChain)?
        .len()
        .checked_sub(hdrlen)
        .ok_or(DefragError::InvalidLength)?;

    let mut mic0 = [0u8; TKIP_MIC_LEN];
    let mut len0 = 0;
    if last_payload < TKIP_MIC_LEN {
        if n < 2 {
            log::error!(target: "wireless::dp::defrag", "fragments don't have MIC");
            return Err(DefragError::BrokenChain);
        }
        len0 = TKIP_MIC_LEN - last_payload;
        let prev0 = &mut frags[n - 2];
        if prev0.len() < hdrlen + len0 {
            return Err(DefragError::InvalidLength);
        }
        let off = prev0.len() - len0;
        prev0.copy_bits(&mut mic0[..len0], off, len0);
        prev0.trim_tail(len0);
    }
    let last = &mut frags[n - 1];
    let take = TKIP_MIC_LEN - len0;
    let off = last.len() - take;
    last.copy_bits(&mut mic0[len0..], off, take);
    last.trim_tail(take);
    if n > 1 && last.len() == hdrlen {
        frags.pop();
    }

    let mut m = Michael::new(key);
    m.update(&michael_hdr(wh));
    for f in frags.iter() {
        m.update(&f.data()[hdrlen..]);
    }
    if m.finish() != mic0 {
        return Err(DefragError::MicMismatch);
    }
    Ok(())
}

/// `[TLV | 802.11 头 | 安全头 | LLC/SNAP | 负载]` → `[TLV | DA SA EtherType | 负载]`
fn nwifi_to_8023(head: &mut SkBuff, hdr_space: usize, wh: &MacHeader) -> Result<(), DefragError> {
    let llc_off = RX_PKT_TLV_SIZE + hdr_space;
    if head.len() < llc_off + LLC_SNAP_HDR_LEN {
        return Err(DefragError::InvalidLength);
    }
    let mut tlv = [0u8; RX_PKT_TLV_SIZE];
    tlv.copy_from_slice(&head.data()[..RX_PKT_TLV_SIZE]);
    let et = llc_off + LLC_SNAP_TYPE_OFFSET;
    let ether_type = [head.data()[et], head.data()[et + 1]];

    head.pull(llc_off + LLC_SNAP_HDR_LEN - ETHER_HDR_LEN);
    let eth = head.data_mut();
    eth[0..6].copy_from_slice(&wh.da());
    eth[6..12].copy_from_slice(&wh.sa());
    eth[12..14].copy_from_slice(&ether_type);

    if !head.push(RX_PKT_TLV_SIZE) {
        return Err(DefragError::InvalidLength);
    }
    head.data_mut()[..RX_PKT_TLV_SIZE].copy_from_slice(&tlv);
    Ok(())
}

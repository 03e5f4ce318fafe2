//! 重组帧回注 REO
//!
//! 复用头分片的 MSDU link 描述符：msdu0 改指重组缓冲，入口环条目沿用目的环副本中的
//! MPDU 信息与 reorder queue 地址，硬件据此把帧当作普通 MPDU 重新排序上送。
//! `no-reinject` 构建下改为直接递交协议栈。

use hal::desc::{
    mpdu_flags, BmAction, BufAddrInfo, BufferType, DescOwner, MpduDescInfo, MsduDescInfo,
    ReoEntranceDesc,
};
use hal::history::ReinjectHistory;
use hal::ops::DpHal;
use hal::tlv::{self, RX_PKT_TLV_SIZE};

use crate::cfg::DefragCfg;
use crate::defrag::ReassembledFrame;
use crate::error::DefragError;
use crate::peer::RxTidDefrag;

/// 把重组帧写入 REO 入口环。
///
/// 成功后头分片 RX 描述符连同重组缓冲归硬件；失败时描述符留在 `state.head_frag_desc`，
/// 由调用方经 [`return_head_frag_desc`] 归还。
pub fn reo_reinject<H: DpHal>(
    hal: &H,
    cfg: &DefragCfg,
    history: &ReinjectHistory,
    state: &mut RxTidDefrag,
    frame: ReassembledFrame,
    now_ms: u64,
) -> Result<(), DefragError> {
    let dst = state
        .dst_ring_desc
        .as_ref()
        .ok_or(DefragError::NoHeadDesc)?
        .desc();
    let pool_id = state
        .head_frag_desc
        .as_ref()
        .ok_or(DefragError::NoHeadDesc)?
        .pool_id;

    hal.reinject_ring_space().map_err(|e| {
        log::error!(target: "wireless::dp::reinject", "REO entrance ring not available: {:?}", e);
        DefragError::Hal(e)
    })?;

    let link_buf = dst.buf_addr_info();
    let mut link = hal
        .link_desc_read(&link_buf)
        .ok_or(DefragError::LinkDescNotFound)?;
    let cookie = link.msdu0_buf.sw_cookie;
    let dest_ind = link.msdu0_info.reo_dest_ind;

    let mut nbuf = frame.nbuf;
    let msdu_len = nbuf.total_len().saturating_sub(RX_PKT_TLV_SIZE) as u16;
    tlv::msdu_len_set(nbuf.data_mut(), msdu_len);

    let buf_size = hal.rx_buf_size(pool_id);
    let paddr = hal.nbuf_map(&nbuf, buf_size)?;
    let msdu0_buf = BufAddrInfo {
        paddr,
        sw_cookie: cookie,
        rbm: cfg.defrag_rbm_id,
    };

    link.owner = DescOwner::Sw;
    link.buffer_type = BufferType::MsduLink;
    link.msdu0_buf = msdu0_buf;
    link.msdu0_info = MsduDescInfo {
        first_msdu: true,
        last_msdu: true,
        msdu_len,
        reo_dest_ind: dest_ind,
    };
    hal.link_desc_write(&link_buf, &link)
        .map_err(|_| DefragError::LinkDescNotFound)?;

    let src = dst.mpdu_desc_info();
    let mut ent = ReoEntranceDesc::default();
    ent.set_buf_addr_info(&BufAddrInfo {
        paddr: link_buf.paddr,
        sw_cookie: link_buf.sw_cookie,
        rbm: cfg.idle_link_bm_id,
    });
    ent.set_mpdu_desc_info(&MpduDescInfo {
        msdu_count: 1,
        mpdu_seq: frame.seq,
        mpdu_flags: src.mpdu_flags & !mpdu_flags::FRAGMENT,
        peer_meta_data: src.peer_meta_data,
    });
    ent.set_qdesc_addr(dst.qdesc_addr());
    ent.set_reo_dest_ind(dst.reo_dest_ind());

    let mut desc = state
        .head_frag_desc
        .take()
        .ok_or(DefragError::NoHeadDesc)?;
    desc.nbuf = Some(nbuf);
    desc.unmapped = false;

    match hal.reinject(ent, desc) {
        Ok(()) => {
            history.record(now_ms, &msdu0_buf);
            log::debug!(
                target: "wireless::dp::reinject",
                "reinjected tid {} seq {} len {} paddr 0x{:x}",
                frame.tid, frame.seq, msdu_len, paddr
            );
            Ok(())
        }
        Err((e, mut desc)) => {
            log::error!(target: "wireless::dp::reinject", "REO entrance ring push failed: {:?}", e);
            desc.unmapped = true;
            state.head_frag_desc = Some(desc);
            Err(DefragError::Hal(e))
        }
    }
}

/// 重组帧直接递交协议栈，头分片描述符随即归还
#[cfg(feature = "no-reinject")]
pub fn deliver_to_stack<H: DpHal>(
    hal: &H,
    peer: &crate::peer::TxRxPeer,
    state: &mut RxTidDefrag,
    frame: ReassembledFrame,
    notify: &dyn crate::notify::DefragNotify,
) {
    let mut nbuf = frame.nbuf;
    nbuf.cb = skb::RxCb {
        vdev_id: peer.vdev_id,
        peer_id: peer.peer_id,
        tid: frame.tid,
    };
    nbuf.pull(RX_PKT_TLV_SIZE);
    let mut q = skb::SkbQueue::new();
    q.push_tail(nbuf);
    notify.deliver_to_stack(peer.vdev_id, peer.peer_id, q);
    return_head_frag_desc(hal, state);
}

/// 归还头分片 RX 描述符，并把头分片的 link 描述符放回 idle 列表
pub fn return_head_frag_desc<H: DpHal>(hal: &H, state: &mut RxTidDefrag) {
    if let Some(desc) = state.head_frag_desc.take() {
        hal.desc_free(desc);
    }
    if let Some(saved) = state.dst_ring_desc.as_ref() {
        let buf = saved.desc().buf_addr_info();
        if let Err(e) = hal.link_desc_return(&buf, BmAction::PutInIdleList) {
            log::error!(target: "wireless::dp::reinject", "failed to return link desc: {:?}", e);
        }
    }
}

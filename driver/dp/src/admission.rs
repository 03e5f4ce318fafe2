//! 序号与 PN 接纳
//!
//! 同一 (peer, tid) 同时只重组一个序号：新序号到来时旧链整体作废。
//! PN 在链凑齐后按分片顺序检查，相邻分片必须恰好加 1（128 位带进位）。

use hal::tlv::RxPktTlv;
use skb::SkBuff;

use crate::error::DefragError;
use crate::peer::RxTidDefrag;

/// 接纳结论
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// 无在途链，以此分片开始新链
    NewChain,
    /// 属于当前在途链
    Continue,
    /// 在途链序号不同：先冲掉旧链再以新序号开始
    OutOfSequence,
    Reject(DefragError),
}

/// 根据当前 TID 状态决定分片去向（不修改状态）
pub fn admit(state: &RxTidDefrag, seq: u16, frag_num: u8, more_frag: bool) -> Admission {
    if state.frags.is_empty() {
        if !more_frag && frag_num == 0 {
            return Admission::Reject(DefragError::Unfragmented);
        }
        if frag_num != 0 {
            return Admission::Reject(DefragError::NotFirstFragment(frag_num));
        }
        return Admission::NewChain;
    }
    if seq != state.curr_seq_num {
        Admission::OutOfSequence
    } else {
        Admission::Continue
    }
}

/// `cur` 是否恰为 `prev + 1`（`[lo, hi]` 两段 64 位）
pub fn pn_is_next(prev: &[u64; 2], cur: &[u64; 2]) -> bool {
    let (lo, carry) = prev[0].overflowing_add(1);
    let hi = prev[1].wrapping_add(carry as u64);
    cur[0] == lo && cur[1] == hi
}

/// 自 `head_pn` 起检查链上后续分片的 PN
pub fn check_chain_pn(head_pn: &[u64; 2], rest: &[SkBuff]) -> Result<(), DefragError> {
    let mut prev = *head_pn;
    for frag in rest {
        let cur = RxPktTlv::parse(frag.data())
            .ok_or(DefragError::InvalidLength)?
            .pn;
        if !pn_is_next(&prev, &cur) {
            log::info!(
                target: "wireless::dp::defrag",
                "pn gap: prev 0x{:x}:{:x} cur 0x{:x}:{:x}",
                prev[1], prev[0], cur[1], cur[0]
            );
            return Err(DefragError::PnDiscontinuity);
        }
        prev = cur;
    }
    Ok(())
}

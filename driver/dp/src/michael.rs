//! TKIP Michael MIC
//!
//! 流式计算：按分片依次 `update`，跨分片的半个 32 位字由内部缓冲拼接。

use ieee80211::crypto::{MICHAEL_KEY_LEN, TKIP_MIC_LEN};
use ieee80211::MacHeader;

/// Michael 伪头长度：DA + SA + priority + 3 字节保留
pub const MICHAEL_HDR_LEN: usize = 16;

#[inline]
fn xswap(v: u32) -> u32 {
    ((v & 0x00ff_00ff) << 8) | ((v & 0xff00_ff00) >> 8)
}

#[inline]
fn block(l: &mut u32, r: &mut u32) {
    *r ^= l.rotate_left(17);
    *l = l.wrapping_add(*r);
    *r ^= xswap(*l);
    *l = l.wrapping_add(*r);
    *r ^= l.rotate_left(3);
    *l = l.wrapping_add(*r);
    *r ^= l.rotate_right(2);
    *l = l.wrapping_add(*r);
}

pub struct Michael {
    l: u32,
    r: u32,
    tail: [u8; 4],
    tail_len: usize,
}

impl Michael {
    pub fn new(key: &[u8; MICHAEL_KEY_LEN]) -> Self {
        Self {
            l: u32::from_le_bytes([key[0], key[1], key[2], key[3]]),
            r: u32::from_le_bytes([key[4], key[5], key[6], key[7]]),
            tail: [0; 4],
            tail_len: 0,
        }
    }

    fn word(&mut self, w: u32) {
        self.l ^= w;
        block(&mut self.l, &mut self.r);
    }

    pub fn update(&mut self, mut data: &[u8]) {
        if self.tail_len > 0 {
            let n = (4 - self.tail_len).min(data.len());
            self.tail[self.tail_len..self.tail_len + n].copy_from_slice(&data[..n]);
            self.tail_len += n;
            data = &data[n..];
            if self.tail_len < 4 {
                return;
            }
            self.word(u32::from_le_bytes(self.tail));
            self.tail_len = 0;
        }
        let mut chunks = data.chunks_exact(4);
        for c in &mut chunks {
            self.word(u32::from_le_bytes([c[0], c[1], c[2], c[3]]));
        }
        let rest = chunks.remainder();
        self.tail[..rest.len()].copy_from_slice(rest);
        self.tail_len = rest.len();
    }

    /// 末尾补 0x5a 与 0，再多做一轮 block
    pub fn finish(mut self) -> [u8; TKIP_MIC_LEN] {
        let mut last = [0u8; 4];
        last[..self.tail_len].copy_from_slice(&self.tail[..self.tail_len]);
        last[self.tail_len] = 0x5a;
        self.word(u32::from_le_bytes(last));
        self.word(0);
        let mut mic = [0u8; TKIP_MIC_LEN];
        mic[..4].copy_from_slice(&self.l.to_le_bytes());
        mic[4..].copy_from_slice(&self.r.to_le_bytes());
        mic
    }
}

/// 伪头：DA、SA 按 DS 方向取，priority 为 QoS TID（非 QoS 为 0）
pub fn michael_hdr(wh: &MacHeader) -> [u8; MICHAEL_HDR_LEN] {
    let mut hdr = [0u8; MICHAEL_HDR_LEN];
    hdr[0..6].copy_from_slice(&wh.da());
    hdr[6..12].copy_from_slice(&wh.sa());
    hdr[12] = wh.tid();
    hdr
}

/// 对一段连续数据计算 MIC
pub fn michael_mic(key: &[u8; MICHAEL_KEY_LEN], hdr: &[u8], data: &[u8]) -> [u8; TKIP_MIC_LEN] {
    let mut m = Michael::new(key);
    m.update(hdr);
    m.update(data);
    m.finish()
}

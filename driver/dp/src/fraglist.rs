//! 分片链
//!
//! 每个 (peer, tid) 一条，按分片号升序保存当前序号的分片。链独占其缓冲；
//! 重组时整条取走，清理时整条丢弃。

use alloc::vec::Vec;

use skb::SkBuff;

/// 链上的一个分片
pub struct Fragment {
    pub nbuf: SkBuff,
    pub frag_num: u8,
    pub more_frag: bool,
}

impl Fragment {
    pub fn new(nbuf: SkBuff, frag_num: u8, more_frag: bool) -> Self {
        Self {
            nbuf,
            frag_num,
            more_frag,
        }
    }
}

/// 插入结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertResult {
    /// 已插入，链仍不完整
    Inserted,
    /// 已插入，0..=n 全部到齐且末片 more_frag = 0
    Completed,
    /// 重复分片，已丢弃
    Rejected,
}

#[derive(Default)]
pub struct FragList {
    frags: Vec<Fragment>,
}

impl FragList {
    pub const fn new() -> Self {
        Self { frags: Vec::new() }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frags.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.frags.len()
    }

    pub fn head(&self) -> Option<&Fragment> {
        self.frags.first()
    }

    pub fn tail(&self) -> Option<&Fragment> {
        self.frags.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Fragment> {
        self.frags.iter()
    }

    /// 按分片号插入。末片晚到时走尾部追加；乱序时线性查找插入点。
    pub fn insert(&mut self, frag: Fragment) -> InsertResult {
        let fragno = frag.frag_num;
        match self.frags.last() {
            None => self.frags.push(frag),
            Some(tail) if tail.frag_num < fragno => self.frags.push(frag),
            Some(_) => {
                let pos = self
                    .frags
                    .iter()
                    .position(|f| f.frag_num >= fragno)
                    .unwrap_or(self.frags.len());
                if self.frags[pos].frag_num == fragno {
                    log::debug!(target: "wireless::dp::defrag", "duplicate frag {} dropped", fragno);
                    return InsertResult::Rejected;
                }
                self.frags.insert(pos, frag);
            }
        }

        if self.is_complete() {
            InsertResult::Completed
        } else {
            InsertResult::Inserted
        }
    }

    /// 末片到齐后才逐片检查分片号是否从 0 连续
    fn is_complete(&self) -> bool {
        match self.frags.last() {
            Some(tail) if !tail.more_frag => self
                .frags
                .iter()
                .enumerate()
                .all(|(i, f)| f.frag_num as usize == i),
            _ => false,
        }
    }

    /// 取走整条链（升序）
    pub fn take(&mut self) -> Vec<Fragment> {
        core::mem::take(&mut self.frags)
    }

    /// 丢弃所有分片，返回释放的缓冲数
    pub fn clear(&mut self) -> usize {
        let n = self.frags.len();
        self.frags.clear();
        n
    }
}

//! SkBuff：对应 Linux `struct sk_buff` 的包缓冲
//!
//! 布局：`[ headroom | data (len) | tailroom ]`，`put`/`pull`/`push`/`trim` 语义与 `skb_*` 一致。
//! 另带一条 ext 链（对应 `skb_shinfo(skb)->frag_list`）：重组后的分片不拷贝，直接挂在头包后面。

use alloc::vec::Vec;
use core::ops::{Deref, DerefMut};

/// RX 控制块（对应 `skb->cb` 中 RX 路径使用的字段）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RxCb {
    pub vdev_id: u8,
    pub peer_id: u16,
    pub tid: u8,
}

/// 单包缓冲。
///
/// - `data`：当前有效载荷起始（head 之后）
/// - `len`：线性区有效载荷长度，不含 ext 链
/// - `put(n)` / `pull(n)` / `push(n)` / `trim_tail(n)`：对应 `skb_put` / `skb_pull` / `skb_push` / `skb_trim`
/// - ext 链：`append_ext_list` 挂接，`total_len()` 为线性区 + ext 链总长
#[derive(Clone)]
pub struct SkBuff {
    /// 整块存储： [0..head] = headroom, [head..head+len] = data, [head+len..] = tailroom
    storage: Vec<u8>,
    /// data 区在 storage 中的起始下标
    head: usize,
    /// 当前有效 data 长度
    len: usize,
    /// 挂接的分片（不含本包）
    ext: Vec<SkBuff>,
    /// ext 链中各包 data 长度之和
    ext_len: usize,
    /// 是否为多分片重组结果
    is_frag: bool,
    pub cb: RxCb,
}

impl SkBuff {
    /// 分配指定总容量的缓冲，初始 data 长度 0。对应 `dev_alloc_skb(size)`。
    pub fn alloc(capacity: usize) -> Self {
        Self::alloc_with_headroom(capacity, 0)
    }

    /// 分配容量并在前端预留 headroom 字节。
    pub fn alloc_with_headroom(capacity: usize, headroom: usize) -> Self {
        let head = headroom.min(capacity);
        let mut storage = Vec::with_capacity(capacity);
        storage.resize(capacity, 0);
        SkBuff {
            storage,
            head,
            len: 0,
            ext: Vec::new(),
            ext_len: 0,
            is_frag: false,
            cb: RxCb::default(),
        }
    }

    /// 以 `bytes` 为 data 构造缓冲，前端预留 headroom。
    pub fn from_slice(bytes: &[u8], headroom: usize) -> Self {
        let mut skb = Self::alloc_with_headroom(headroom + bytes.len(), headroom);
        skb.storage[headroom..].copy_from_slice(bytes);
        skb.len = bytes.len();
        skb
    }

    /// 当前有效载荷（data 区）只读视图。
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.storage[self.head..self.head + self.len]
    }

    /// data 起始到缓冲末尾的可写视图（DMA 写入后配合 `set_len`）。
    #[inline]
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.storage[self.head..]
    }

    /// 从 data 起始处起、长度为 `len` 的切片；超出当前 data 长度则返回整个 data。
    #[inline]
    pub fn data_len(&self, len: usize) -> &[u8] {
        let n = len.min(self.len);
        &self.storage[self.head..self.head + n]
    }

    /// 设置当前有效 data 长度（收包后调用）。
    #[inline]
    pub fn set_len(&mut self, len: usize) {
        let max = self.storage.len().saturating_sub(self.head);
        self.len = len.min(max);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// 线性区 + ext 链总长，对应 `qdf_nbuf_len` 对带 frag_list 的包的返回值。
    #[inline]
    pub fn total_len(&self) -> usize {
        self.len + self.ext_len
    }

    /// 缓冲总容量（DMA 映射长度）。
    #[inline]
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// headroom 字节数（data 前的空间）。
    #[inline]
    pub fn headroom(&self) -> usize {
        self.head
    }

    /// tailroom 字节数（data 后的空间）。
    #[inline]
    pub fn tailroom(&self) -> usize {
        self.storage.len().saturating_sub(self.head + self.len)
    }

    /// 在尾部追加 n 字节，返回可写切片；空间不足则返回 None。对应 `skb_put(skb, n)`。
    #[inline]
    pub fn put(&mut self, n: usize) -> Option<&mut [u8]> {
        if self.tailroom() < n {
            return None;
        }
        let start = self.head + self.len;
        self.len += n;
        Some(&mut self.storage[start..start + n])
    }

    /// 从 data 头部消费 n 字节（data 指针前移、len 减少）。对应 `skb_pull(skb, n)`。
    #[inline]
    pub fn pull(&mut self, n: usize) {
        let consume = n.min(self.len);
        self.head += consume;
        self.len -= consume;
    }

    /// 在 data 前预留 n 字节（head 减少、len 增加）。对应 `skb_push(skb, n)`。
    #[inline]
    pub fn push(&mut self, n: usize) -> bool {
        if self.head < n {
            return false;
        }
        self.head -= n;
        self.len += n;
        true
    }

    /// 从 data 尾部去掉 n 字节。对应 `qdf_nbuf_trim_tail`。
    #[inline]
    pub fn trim_tail(&mut self, n: usize) {
        self.len -= n.min(self.len);
    }

    /// 将 data 区从偏移 `off` 起、长度 `n` 复制到 `dst`；若范围越界则复制有效部分。
    #[inline]
    pub fn copy_bits(&self, dst: &mut [u8], off: usize, n: usize) -> usize {
        let data = self.data();
        let start = off.min(data.len());
        let count = (data.len() - start).min(n).min(dst.len());
        dst[..count].copy_from_slice(&data[start..start + count]);
        count
    }

    /// 把 `list` 挂到本包 ext 链尾部，`ext_len` 为这些包 data 长度之和。
    /// 对应 `qdf_nbuf_append_ext_list`。
    pub fn append_ext_list(&mut self, list: Vec<SkBuff>, ext_len: usize) {
        self.ext.extend(list);
        self.ext_len += ext_len;
    }

    /// ext 链只读视图。
    #[inline]
    pub fn ext_list(&self) -> &[SkBuff] {
        &self.ext
    }

    /// 摘下整个 ext 链。
    pub fn take_ext_list(&mut self) -> Vec<SkBuff> {
        self.ext_len = 0;
        core::mem::take(&mut self.ext)
    }

    #[inline]
    pub fn is_frag(&self) -> bool {
        self.is_frag
    }

    #[inline]
    pub fn set_is_frag(&mut self, is_frag: bool) {
        self.is_frag = is_frag;
    }

    /// 线性区与 ext 链拼接后的完整内容（调试/上层非零拷贝路径使用）。
    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.total_len());
        out.extend_from_slice(self.data());
        for frag in &self.ext {
            out.extend_from_slice(frag.data());
        }
        out
    }
}

impl Deref for SkBuff {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        self.data()
    }
}

impl DerefMut for SkBuff {
    fn deref_mut(&mut self) -> &mut [u8] {
        let start = self.head;
        &mut self.storage[start..start + self.len]
    }
}

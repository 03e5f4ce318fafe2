//! 重组配置解析
//!
//! 从 ini 文本中读取 `dp_rx_defrag_timeout=` 等 tag（每行 `KEY=VALUE`），
//! 缺失或无法解析时使用默认值。

/// 重组超时默认值（ms）
pub const DEFRAG_TIMEOUT_MS_DEFAULT: u32 = 100;
pub const DEFRAG_TIMEOUT_MS_MIN: u32 = 10;
pub const DEFRAG_TIMEOUT_MS_MAX: u32 = 10_000;
/// 回注缓冲使用的 return buffer manager
pub const DEFRAG_RBM_ID_DEFAULT: u8 = 3;
/// idle link 描述符所属 buffer manager
pub const IDLE_LINK_BM_ID_DEFAULT: u8 = 0;

/// 重组运行参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefragCfg {
    /// 未完成分片链的最长等待时间
    pub rx_defrag_timeout_ms: u32,
    /// 是否启用等待链超时清理
    pub defrag_timeout_check: bool,
    /// 是否校验 addr1 为本 VDEV 地址
    pub addr1_check: bool,
    pub defrag_rbm_id: u8,
    pub idle_link_bm_id: u8,
}

impl Default for DefragCfg {
    fn default() -> Self {
        Self {
            rx_defrag_timeout_ms: DEFRAG_TIMEOUT_MS_DEFAULT,
            defrag_timeout_check: true,
            addr1_check: false,
            defrag_rbm_id: DEFRAG_RBM_ID_DEFAULT,
            idle_link_bm_id: IDLE_LINK_BM_ID_DEFAULT,
        }
    }
}

/// 在 file_data 中查找 tag_name 开头的行，返回等号后的值（不含换行）
fn find_tag<'a>(file_data: &'a [u8], tag_name: &str) -> Option<&'a [u8]> {
    let tag = tag_name.as_bytes();
    let mut line_start = 0;
    while line_start < file_data.len() {
        let mut curr = line_start;
        while curr < file_data.len() && file_data[curr] != b'\n' {
            curr += 1;
        }
        let line = &file_data[line_start..curr];
        if line.len() >= tag.len() && &line[..tag.len()] == tag {
            let value_start = line_start + tag.len();
            return Some(&file_data[value_start..curr]);
        }
        line_start = curr + 1;
    }
    None
}

/// 十进制无符号数，忽略前后空白与行尾 `\r`
fn parse_dec(s: &[u8]) -> Option<u32> {
    let s = s.trim_ascii();
    if s.is_empty() {
        return None;
    }
    let mut v: u32 = 0;
    for &b in s {
        if !b.is_ascii_digit() {
            return None;
        }
        v = v.checked_mul(10)?.checked_add((b - b'0') as u32)?;
    }
    Some(v)
}

fn parse_bool(s: &[u8]) -> Option<bool> {
    match parse_dec(s)? {
        0 => Some(false),
        1 => Some(true),
        _ => None,
    }
}

/// 解析配置文本；非法值记日志并保留默认
pub fn parse_defrag_cfg(file_data: &[u8]) -> DefragCfg {
    let mut cfg = DefragCfg::default();

    if let Some(v) = find_tag(file_data, "dp_rx_defrag_timeout=") {
        match parse_dec(v) {
            Some(ms) => {
                cfg.rx_defrag_timeout_ms = ms.clamp(DEFRAG_TIMEOUT_MS_MIN, DEFRAG_TIMEOUT_MS_MAX)
            }
            None => log::warn!(target: "wireless::dp", "cfg: bad dp_rx_defrag_timeout, use default"),
        }
    }
    if let Some(v) = find_tag(file_data, "dp_defrag_timeout_check=") {
        cfg.defrag_timeout_check = parse_bool(v).unwrap_or(cfg.defrag_timeout_check);
    }
    if let Some(v) = find_tag(file_data, "dp_defrag_addr1_check=") {
        cfg.addr1_check = parse_bool(v).unwrap_or(cfg.addr1_check);
    }
    if let Some(v) = find_tag(file_data, "dp_defrag_rbm_id=") {
        if let Some(id) = parse_dec(v).filter(|&id| id <= 7) {
            cfg.defrag_rbm_id = id as u8;
        }
    }
    if let Some(v) = find_tag(file_data, "dp_idle_link_bm_id=") {
        if let Some(id) = parse_dec(v).filter(|&id| id <= 7) {
            cfg.idle_link_bm_id = id as u8;
        }
    }

    log::debug!(target: "wireless::dp", "defrag cfg: {:?}", cfg);
    cfg
}

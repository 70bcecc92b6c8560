//! 会话私有的暂存区。
//!
//! 编码、解码和分块操作互斥地共用一块缓冲区。缓冲区只增不减：需要更大的
//! 空间时分配一块新的、清零的缓冲区并替换旧的（旧的在丢弃时擦除）。
//! 调用者永远拿不到缓冲区本身，只能拿到有效部分的副本。

use std::ops::Range;

use zeroize::Zeroizing;

/// 暂存区当前的用途。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ScratchUse {
    Encode,
    Decode,
    Chunk,
}

#[derive(Default)]
pub(crate) struct Scratch {
    buf: Zeroizing<Vec<u8>>,
    usage: Option<ScratchUse>,
}

impl Scratch {
    /// 为 `usage` 取出至少 `bytes` 字节的工作区。
    pub(crate) fn take(&mut self, usage: ScratchUse, bytes: usize) -> &mut [u8] {
        if self.buf.len() < bytes {
            let mut grown = Zeroizing::new(vec![0u8; bytes]);
            std::mem::swap(&mut self.buf, &mut grown);
        }
        self.usage = Some(usage);
        &mut self.buf[..bytes]
    }

    /// 复制出 `usage` 写入的有效部分。
    pub(crate) fn copy_out(&self, usage: ScratchUse, range: Range<usize>) -> Vec<u8> {
        debug_assert_eq!(self.usage, Some(usage));
        self.buf[range].to_vec()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.buf.len()
    }
}

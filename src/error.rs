//! エミュレータのエラー型
//!
//! コア内部の異常（未マップアドレスへのアクセス、未定義命令）はその場で
//! 吸収されるため、ここには呼び出し側へ報告するものだけを定義する

use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmuError {
    /// ディスクイメージのサイズが143,360バイトではない
    #[error("disk image must be 143360 bytes, got {0}")]
    BadDiskImageSize(usize),

    /// ROMイメージが空
    #[error("ROM image is empty")]
    BadRomSize,

    /// セーブステートのマジック不一致や途中でのEOF
    #[error("bad state file: {0}")]
    BadStateFile(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

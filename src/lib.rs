//! Apple II+ エミュレーションコア
//!
//! 6502 CPU、システムバス、ランゲージカード、キーボード、スピーカー、
//! Disk IIコントローラ、ビデオジェネレータを提供する。ホスト側の
//! ウィンドウ・オーディオ出力・キー入力は外部の責務で、このクレートは
//! RGBAフレームバッファとPCMサンプルとスキャンコード変換だけを扱う。

pub mod apple2;
pub mod bus;
pub mod cpu;
pub mod disk;
pub mod error;
pub mod keyboard;
pub mod lang_card;
pub mod memory;
pub mod speaker;
pub mod state;
pub mod video;

pub use apple2::Apple2;
pub use error::EmuError;

/// Apple II+のCPUクロック周波数 (Hz)
pub const CPU_FREQ: u32 = 1_023_000;

//! ビデオ信号ジェネレータ
//!
//! テキスト、Lo-Res、Hi-Res各モードをメインRAMから読み取り、
//! 280x192のRGBAフレームバッファへ毎フレーム描画する。
//! ソフトスイッチは$C050-$C057。

use std::io::{self, Read, Write};

use crate::bus::MemoryMapped;
use crate::memory::Memory;
use crate::state::{self, State};

/// Apple IIのビデオ解像度
pub const VIDEO_WIDTH: usize = 280;
pub const VIDEO_HEIGHT: usize = 192;

/// ビデオソフトスイッチの開始・終了アドレス
pub const VIDEO_START: u16 = 0xC050;
pub const VIDEO_END: u16 = 0xC057;

/// 点滅の周期（60fpsで4Hz → 15フレームごとに反転）
const FRAMES_PER_FLASH: u32 = 15;

/// ピクセルの色。リトルエンディアンでメモリに置くとR,G,B,Aのバイト列になる
pub type Color = u32;

const BLACK: Color = 0xFF000000;
const WHITE: Color = 0xFFFFFFFF;

/// Lo-Res用の16色パレット（NTSCアーティファクトカラー）
pub const COLORS: [Color; 16] = [
    0xFF000000, // 0: Black
    0xFF3300DD, // 1: Magenta
    0xFFBD4E60, // 2: Dark Blue
    0xFFFD44FF, // 3: Purple
    0xFF60A300, // 4: Dark Green
    0xFF9C9C9C, // 5: Gray 1
    0xFFFDCF14, // 6: Medium Blue
    0xFFFFC3D0, // 7: Light Blue
    0xFF037260, // 8: Brown
    0xFF3C6AFF, // 9: Orange
    0xFF9C9C9C, // 10: Gray 2
    0xFFD0A0FF, // 11: Pink
    0xFF3CF514, // 12: Light Green
    0xFF8DDDD0, // 13: Yellow
    0xFFD0FF72, // 14: Aqua
    0xFFFFFFFF, // 15: White
];

/// Hi-Resのアーティファクトカラー
const HIRES_PURPLE: Color = COLORS[3];
const HIRES_GREEN: Color = COLORS[12];
const HIRES_BLUE: Color = COLORS[6];
const HIRES_ORANGE: Color = COLORS[9];

/// 文字ROM（64文字 x 8バイト、Apple II標準文字セット）
static CHAR_ROM: [[u8; 8]; 64] = [
    // $00: @
    [0x1C, 0x22, 0x2A, 0x2E, 0x2C, 0x20, 0x1E, 0x00],
    // $01: A
    [0x08, 0x14, 0x22, 0x22, 0x3E, 0x22, 0x22, 0x00],
    // $02: B
    [0x3C, 0x22, 0x22, 0x3C, 0x22, 0x22, 0x3C, 0x00],
    // $03: C
    [0x1C, 0x22, 0x20, 0x20, 0x20, 0x22, 0x1C, 0x00],
    // $04: D
    [0x3C, 0x22, 0x22, 0x22, 0x22, 0x22, 0x3C, 0x00],
    // $05: E
    [0x3E, 0x20, 0x20, 0x3C, 0x20, 0x20, 0x3E, 0x00],
    // $06: F
    [0x3E, 0x20, 0x20, 0x3C, 0x20, 0x20, 0x20, 0x00],
    // $07: G
    [0x1E, 0x20, 0x20, 0x2E, 0x22, 0x22, 0x1E, 0x00],
    // $08: H
    [0x22, 0x22, 0x22, 0x3E, 0x22, 0x22, 0x22, 0x00],
    // $09: I
    [0x1C, 0x08, 0x08, 0x08, 0x08, 0x08, 0x1C, 0x00],
    // $0A: J
    [0x02, 0x02, 0x02, 0x02, 0x02, 0x22, 0x1C, 0x00],
    // $0B: K
    [0x22, 0x24, 0x28, 0x30, 0x28, 0x24, 0x22, 0x00],
    // $0C: L
    [0x20, 0x20, 0x20, 0x20, 0x20, 0x20, 0x3E, 0x00],
    // $0D: M
    [0x22, 0x36, 0x2A, 0x2A, 0x22, 0x22, 0x22, 0x00],
    // $0E: N
    [0x22, 0x32, 0x2A, 0x26, 0x22, 0x22, 0x22, 0x00],
    // $0F: O
    [0x1C, 0x22, 0x22, 0x22, 0x22, 0x22, 0x1C, 0x00],
    // $10: P
    [0x3C, 0x22, 0x22, 0x3C, 0x20, 0x20, 0x20, 0x00],
    // $11: Q
    [0x1C, 0x22, 0x22, 0x22, 0x2A, 0x24, 0x1A, 0x00],
    // $12: R
    [0x3C, 0x22, 0x22, 0x3C, 0x28, 0x24, 0x22, 0x00],
    // $13: S
    [0x1C, 0x22, 0x20, 0x1C, 0x02, 0x22, 0x1C, 0x00],
    // $14: T
    [0x3E, 0x08, 0x08, 0x08, 0x08, 0x08, 0x08, 0x00],
    // $15: U
    [0x22, 0x22, 0x22, 0x22, 0x22, 0x22, 0x1C, 0x00],
    // $16: V
    [0x22, 0x22, 0x22, 0x22, 0x14, 0x14, 0x08, 0x00],
    // $17: W
    [0x22, 0x22, 0x22, 0x2A, 0x2A, 0x36, 0x22, 0x00],
    // $18: X
    [0x22, 0x22, 0x14, 0x08, 0x14, 0x22, 0x22, 0x00],
    // $19: Y
    [0x22, 0x22, 0x14, 0x08, 0x08, 0x08, 0x08, 0x00],
    // $1A: Z
    [0x3E, 0x02, 0x04, 0x08, 0x10, 0x20, 0x3E, 0x00],
    // $1B: [
    [0x1E, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1E, 0x00],
    // $1C: backslash
    [0x00, 0x20, 0x10, 0x08, 0x04, 0x02, 0x00, 0x00],
    // $1D: ]
    [0x1E, 0x02, 0x02, 0x02, 0x02, 0x02, 0x1E, 0x00],
    // $1E: ^
    [0x08, 0x14, 0x22, 0x00, 0x00, 0x00, 0x00, 0x00],
    // $1F: _
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x3F, 0x00],
    // $20: Space
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
    // $21: !
    [0x08, 0x08, 0x08, 0x08, 0x08, 0x00, 0x08, 0x00],
    // $22: "
    [0x14, 0x14, 0x14, 0x00, 0x00, 0x00, 0x00, 0x00],
    // $23: #
    [0x14, 0x14, 0x3E, 0x14, 0x3E, 0x14, 0x14, 0x00],
    // $24: $
    [0x08, 0x1E, 0x28, 0x1C, 0x0A, 0x3C, 0x08, 0x00],
    // $25: %
    [0x30, 0x32, 0x04, 0x08, 0x10, 0x26, 0x06, 0x00],
    // $26: &
    [0x10, 0x28, 0x28, 0x10, 0x2A, 0x24, 0x1A, 0x00],
    // $27: '
    [0x08, 0x08, 0x10, 0x00, 0x00, 0x00, 0x00, 0x00],
    // $28: (
    [0x04, 0x08, 0x10, 0x10, 0x10, 0x08, 0x04, 0x00],
    // $29: )
    [0x10, 0x08, 0x04, 0x04, 0x04, 0x08, 0x10, 0x00],
    // $2A: *
    [0x00, 0x08, 0x2A, 0x1C, 0x2A, 0x08, 0x00, 0x00],
    // $2B: +
    [0x00, 0x08, 0x08, 0x3E, 0x08, 0x08, 0x00, 0x00],
    // $2C: ,
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x08, 0x08, 0x10],
    // $2D: -
    [0x00, 0x00, 0x00, 0x3E, 0x00, 0x00, 0x00, 0x00],
    // $2E: .
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x08, 0x00],
    // $2F: /
    [0x00, 0x02, 0x04, 0x08, 0x10, 0x20, 0x00, 0x00],
    // $30: 0
    [0x1C, 0x22, 0x26, 0x2A, 0x32, 0x22, 0x1C, 0x00],
    // $31: 1
    [0x08, 0x18, 0x08, 0x08, 0x08, 0x08, 0x1C, 0x00],
    // $32: 2
    [0x1C, 0x22, 0x02, 0x0C, 0x10, 0x20, 0x3E, 0x00],
    // $33: 3
    [0x1C, 0x22, 0x02, 0x0C, 0x02, 0x22, 0x1C, 0x00],
    // $34: 4
    [0x04, 0x0C, 0x14, 0x24, 0x3E, 0x04, 0x04, 0x00],
    // $35: 5
    [0x3E, 0x20, 0x3C, 0x02, 0x02, 0x22, 0x1C, 0x00],
    // $36: 6
    [0x0E, 0x10, 0x20, 0x3C, 0x22, 0x22, 0x1C, 0x00],
    // $37: 7
    [0x3E, 0x02, 0x04, 0x08, 0x10, 0x10, 0x10, 0x00],
    // $38: 8
    [0x1C, 0x22, 0x22, 0x1C, 0x22, 0x22, 0x1C, 0x00],
    // $39: 9
    [0x1C, 0x22, 0x22, 0x1E, 0x02, 0x04, 0x38, 0x00],
    // $3A: :
    [0x00, 0x00, 0x08, 0x00, 0x00, 0x08, 0x00, 0x00],
    // $3B: ;
    [0x00, 0x00, 0x08, 0x00, 0x00, 0x08, 0x08, 0x10],
    // $3C: <
    [0x04, 0x08, 0x10, 0x20, 0x10, 0x08, 0x04, 0x00],
    // $3D: =
    [0x00, 0x00, 0x3E, 0x00, 0x3E, 0x00, 0x00, 0x00],
    // $3E: >
    [0x10, 0x08, 0x04, 0x02, 0x04, 0x08, 0x10, 0x00],
    // $3F: ?
    [0x1C, 0x22, 0x02, 0x04, 0x08, 0x00, 0x08, 0x00],
];

/// ビデオモジュール
pub struct Video {
    /// フレームバッファ（RGBA、リトルエンディアンで0xAABBGGRR）
    pub framebuffer: Vec<Color>,
    /// グラフィックモード（クリアならテキスト）
    use_graphics: bool,
    /// 全画面グラフィック（クリアなら下4行がテキストのミックス表示）
    use_full_screen: bool,
    /// ページ1表示（クリアならページ2）
    use_page1: bool,
    /// Lo-Res表示（クリアならHi-Res）
    use_lo_res: bool,
    /// テキストの前景色
    text_color: Color,
    /// 点滅文字の位相
    flash_phase: bool,
    /// 点滅カウンタ
    flash_counter: u32,
}

impl Default for Video {
    fn default() -> Self {
        Self::new()
    }
}

impl Video {
    pub fn new() -> Self {
        Video {
            framebuffer: vec![BLACK; VIDEO_WIDTH * VIDEO_HEIGHT],
            use_graphics: false,
            use_full_screen: false,
            use_page1: true,
            use_lo_res: false,
            text_color: WHITE,
            flash_phase: false,
            flash_counter: 0,
        }
    }

    /// ソフトスイッチを電源投入時の状態（テキスト、ページ1）に戻す
    pub fn reset(&mut self) {
        self.use_graphics = false;
        self.use_full_screen = false;
        self.use_page1 = true;
        self.use_lo_res = false;
    }

    pub fn text_color(&self) -> Color {
        self.text_color
    }

    pub fn set_text_color(&mut self, color: Color) {
        self.text_color = color;
    }

    /// ソフトスイッチを適用し、対象の変数の現在値を返す
    fn touch_switch(&mut self, addr: u16, apply: bool) -> bool {
        match addr & 0xF {
            0x0 => {
                if apply {
                    self.use_graphics = true;
                }
                self.use_graphics
            }
            0x1 => {
                if apply {
                    self.use_graphics = false;
                }
                self.use_graphics
            }
            0x2 => {
                if apply {
                    self.use_full_screen = true;
                }
                self.use_full_screen
            }
            0x3 => {
                if apply {
                    self.use_full_screen = false;
                }
                self.use_full_screen
            }
            0x4 => {
                if apply {
                    self.use_page1 = true;
                }
                self.use_page1
            }
            0x5 => {
                if apply {
                    self.use_page1 = false;
                }
                self.use_page1
            }
            0x6 => {
                if apply {
                    self.use_lo_res = true;
                }
                self.use_lo_res
            }
            0x7 => {
                if apply {
                    self.use_lo_res = false;
                }
                self.use_lo_res
            }
            _ => false,
        }
    }

    /// 1フレーム分を描画する
    pub fn render(&mut self, ram: &Memory) {
        // 点滅位相の更新（壁時計ではなくフレームカウンタ駆動）
        self.flash_counter += 1;
        if self.flash_counter >= FRAMES_PER_FLASH {
            self.flash_phase = !self.flash_phase;
            self.flash_counter = 0;
        }

        self.framebuffer.fill(BLACK);

        if self.use_graphics {
            if self.use_lo_res {
                self.render_lores(ram);
            } else {
                self.render_hires(ram);
            }
            if !self.use_full_screen {
                self.render_text_rows(ram, 20, 24);
            }
        } else {
            self.render_text_rows(ram, 0, 24);
        }
    }

    /// テキスト画面の行アドレスオフセット
    ///
    /// Apple IIのテキスト画面はインターリーブ構造になっている:
    /// 行0-7:   $000, $080, $100, $180, $200, $280, $300, $380
    /// 行8-15:  $028, $0A8, ...
    /// 行16-23: $050, $0D0, ...
    fn text_row_offset(row: usize) -> usize {
        0x28 * (row / 8) + 0x80 * (row % 8)
    }

    /// Hi-Res画面の行アドレスオフセット
    fn hires_row_offset(row: usize) -> usize {
        let block = row / 8;
        let subrow = row % 8;
        0x28 * (block / 8) + 0x80 * (block % 8) + 0x400 * subrow
    }

    fn text_base(&self) -> usize {
        if self.use_page1 {
            0x0400
        } else {
            0x0800
        }
    }

    fn hires_base(&self) -> usize {
        if self.use_page1 {
            0x2000
        } else {
            0x4000
        }
    }

    /// テキスト行[start_row, end_row)を描画する
    fn render_text_rows(&mut self, ram: &Memory, start_row: usize, end_row: usize) {
        let base = self.text_base();
        for row in start_row..end_row {
            let row_addr = base + Self::text_row_offset(row);
            for col in 0..40 {
                let ch = ram.data[row_addr + col];
                self.draw_char(col, row, ch);
            }
        }
    }

    /// 1文字を描画する
    ///
    /// 文字コードの上位ビット:
    ///   ビット7セット → 通常表示
    ///   ビット7クリア・ビット6クリア → 反転表示
    ///   ビット7クリア・ビット6セット → 点滅表示
    fn draw_char(&mut self, col: usize, row: usize, ch: u8) {
        let inverse = ch & 0xC0 == 0x00;
        let flash = ch & 0xC0 == 0x40;
        let do_inverse = inverse || (flash && self.flash_phase);

        let glyph = &CHAR_ROM[(ch & 0x3F) as usize];
        let fg = self.text_color;

        for (y, &font_byte) in glyph.iter().enumerate() {
            for x in 0..7 {
                // 文字ROMは左右反転して描画する（カラム6→0）
                let pixel_on = font_byte & (0x40 >> x) != 0;
                let color = if pixel_on != do_inverse { fg } else { BLACK };
                self.framebuffer[(row * 8 + y) * VIDEO_WIDTH + col * 7 + x] = color;
            }
        }
    }

    /// Lo-Resグラフィックを描画する
    ///
    /// 各セルは縦に積まれた2つの4x7ブロック。下位ニブルが上ブロック、
    /// 上位ニブルが下ブロックの色になる。
    fn render_lores(&mut self, ram: &Memory) {
        let base = self.text_base();
        let max_row = if self.use_full_screen { 24 } else { 20 };

        for row in 0..max_row {
            let row_addr = base + Self::text_row_offset(row);
            for col in 0..40 {
                let byte = ram.data[row_addr + col];
                let top = COLORS[(byte & 0x0F) as usize];
                let bottom = COLORS[(byte >> 4) as usize];

                for y in 0..4 {
                    for x in 0..7 {
                        self.framebuffer[(row * 8 + y) * VIDEO_WIDTH + col * 7 + x] = top;
                        self.framebuffer[(row * 8 + y + 4) * VIDEO_WIDTH + col * 7 + x] =
                            bottom;
                    }
                }
            }
        }
    }

    /// Hi-Resグラフィックを描画する
    ///
    /// 各バイトが7ピクセルを供給し、ビット7がカラーグループを選ぶ。
    /// 点灯ピクセルは隣接ピクセルがあれば白、孤立していればグループと
    /// 水平位置の偶奇で紫/緑（グループ0）または青/橙（グループ1）になる。
    /// 隣接判定はバイト境界をまたいで前後のバイトも参照する。
    fn render_hires(&mut self, ram: &Memory) {
        let base = self.hires_base();
        let max_row = if self.use_full_screen { 192 } else { 160 };

        for y in 0..max_row {
            let row_addr = base + Self::hires_row_offset(y);

            for byte_x in 0..40 {
                let cur = ram.data[row_addr + byte_x];
                let prev = if byte_x == 0 { 0 } else { ram.data[row_addr + byte_x - 1] };
                let next = if byte_x == 39 { 0 } else { ram.data[row_addr + byte_x + 1] };
                let group1 = cur & 0x80 != 0;

                for i in 0..7 {
                    let pixel = cur >> i & 1 != 0;
                    let left = if i == 0 { prev >> 6 & 1 != 0 } else { cur >> (i - 1) & 1 != 0 };
                    let right = if i == 6 { next & 1 != 0 } else { cur >> (i + 1) & 1 != 0 };

                    let x = byte_x * 7 + i;
                    let color = if !pixel {
                        BLACK
                    } else if left || right {
                        WHITE
                    } else {
                        match (group1, x % 2 == 0) {
                            (false, true) => HIRES_PURPLE,
                            (false, false) => HIRES_GREEN,
                            (true, true) => HIRES_BLUE,
                            (true, false) => HIRES_ORANGE,
                        }
                    };

                    self.framebuffer[y * VIDEO_WIDTH + x] = color;
                }
            }
        }
    }
}

impl MemoryMapped for Video {
    fn read(&mut self, addr: u16, no_side_fx: bool) -> u8 {
        self.touch_switch(addr, !no_side_fx) as u8
    }

    fn write(&mut self, addr: u16, _data: u8) {
        self.touch_switch(addr, true);
    }
}

impl State for Video {
    fn save_state(&self, output: &mut dyn Write) -> io::Result<()> {
        state::write_bool(output, self.use_graphics)?;
        state::write_bool(output, self.use_full_screen)?;
        state::write_bool(output, self.use_page1)?;
        state::write_bool(output, self.use_lo_res)?;
        state::write_u32(output, self.text_color)
    }

    fn load_state(&mut self, input: &mut dyn Read) -> io::Result<()> {
        self.use_graphics = state::read_bool(input)?;
        self.use_full_screen = state::read_bool(input)?;
        self.use_page1 = state::read_bool(input)?;
        self.use_lo_res = state::read_bool(input)?;
        self.text_color = state::read_u32(input)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ram() -> Memory {
        Memory::new(0x0000, 0xBFFF, false)
    }

    #[test]
    fn test_text_row_addressing_is_bijective() {
        let mut offsets: Vec<usize> = (0..24).map(Video::text_row_offset).collect();
        offsets.sort_unstable();
        offsets.dedup();
        assert_eq!(offsets.len(), 24);
    }

    #[test]
    fn test_text_row_known_addresses() {
        assert_eq!(Video::text_row_offset(0), 0x000);
        assert_eq!(Video::text_row_offset(1), 0x080);
        assert_eq!(Video::text_row_offset(8), 0x028);
        assert_eq!(Video::text_row_offset(16), 0x050);
        assert_eq!(Video::text_row_offset(23), 0x3D0);
    }

    #[test]
    fn test_hires_row_known_addresses() {
        assert_eq!(Video::hires_row_offset(0), 0x0000);
        assert_eq!(Video::hires_row_offset(1), 0x0400);
        assert_eq!(Video::hires_row_offset(8), 0x0080);
        assert_eq!(Video::hires_row_offset(64), 0x0028);
        assert_eq!(Video::hires_row_offset(191), 0x3FD0);
    }

    #[test]
    fn test_soft_switch_toggle_and_readback() {
        let mut video = Video::new();
        assert_eq!(video.read(0xC050, false), 1); // グラフィックON
        assert_eq!(video.read(0xC051, false), 0); // テキストへ戻す
        assert_eq!(video.read(0xC055, false), 0); // ページ2
        assert_eq!(video.read(0xC054, false), 1); // ページ1
        assert_eq!(video.read(0xC056, false), 1); // Lo-Res
        assert_eq!(video.read(0xC057, false), 0); // Hi-Res
    }

    #[test]
    fn test_no_side_fx_read_does_not_toggle() {
        let mut video = Video::new();
        assert_eq!(video.read(0xC050, true), 0);
        assert!(!video.use_graphics);
    }

    #[test]
    fn test_text_render_normal_and_inverse() {
        let mut video = Video::new();
        let mut ram = ram();
        // 行0列0に 'A'（通常）、列1に 'A'（反転）
        ram.data[0x400] = 0xC1;
        ram.data[0x401] = 0x01;
        video.render(&ram);

        // 'A'のグリフ1行目は0x08 → ミラー後は中央(x=3)が点灯
        assert_eq!(video.framebuffer[3], WHITE);
        assert_eq!(video.framebuffer[0], BLACK);
        // 反転文字は背景が前景色になる
        assert_eq!(video.framebuffer[7], WHITE);
        assert_eq!(video.framebuffer[7 + 3], BLACK);
    }

    #[test]
    fn test_text_page2() {
        let mut video = Video::new();
        let mut ram = ram();
        ram.data[0x800] = 0xC1;
        video.read(0xC055, false); // ページ2へ
        video.render(&ram);
        assert_eq!(video.framebuffer[3], WHITE);
    }

    #[test]
    fn test_flash_phase_advances_every_15_frames() {
        let mut video = Video::new();
        let ram = ram();
        assert!(!video.flash_phase);
        for _ in 0..15 {
            video.render(&ram);
        }
        assert!(video.flash_phase);
        for _ in 0..15 {
            video.render(&ram);
        }
        assert!(!video.flash_phase);
    }

    #[test]
    fn test_lores_blocks() {
        let mut video = Video::new();
        let mut ram = ram();
        // 下位ニブル=1（マゼンタ）が上、上位ニブル=9（橙）が下
        ram.data[0x400] = 0x91;
        video.read(0xC050, false); // グラフィック
        video.read(0xC056, false); // Lo-Res
        video.render(&ram);

        assert_eq!(video.framebuffer[0], COLORS[1]);
        assert_eq!(video.framebuffer[4 * VIDEO_WIDTH], COLORS[9]);
    }

    #[test]
    fn test_hires_isolated_and_adjacent_pixels() {
        let mut video = Video::new();
        let mut ram = ram();
        // 行0: ビット0（x=0、偶数、グループ0） → 紫
        ram.data[0x2000] = 0x01;
        // 行1: ビット1（x=1、奇数、グループ0） → 緑
        ram.data[0x2400] = 0x02;
        // 行2: 隣接した2ピクセル → 白
        ram.data[0x2800] = 0x03;
        // 行3: グループ1の孤立ピクセル（x=0） → 青
        ram.data[0x2C00] = 0x81;
        video.read(0xC050, false); // グラフィック
        video.read(0xC057, false); // Hi-Res
        video.render(&ram);

        assert_eq!(video.framebuffer[0], HIRES_PURPLE);
        assert_eq!(video.framebuffer[VIDEO_WIDTH + 1], HIRES_GREEN);
        assert_eq!(video.framebuffer[2 * VIDEO_WIDTH], WHITE);
        assert_eq!(video.framebuffer[2 * VIDEO_WIDTH + 1], WHITE);
        assert_eq!(video.framebuffer[3 * VIDEO_WIDTH], HIRES_BLUE);
    }

    #[test]
    fn test_hires_neighbor_across_byte_boundary() {
        let mut video = Video::new();
        let mut ram = ram();
        // バイト0のビット6とバイト1のビット0は隣接している
        ram.data[0x2000] = 0x40;
        ram.data[0x2001] = 0x01;
        video.read(0xC050, false);
        video.read(0xC057, false);
        video.render(&ram);

        assert_eq!(video.framebuffer[6], WHITE);
        assert_eq!(video.framebuffer[7], WHITE);
    }

    #[test]
    fn test_mixed_mode_overpaints_bottom_rows() {
        let mut video = Video::new();
        let mut ram = ram();
        // Lo-Res全面 + テキスト行20に文字
        for row in 0..24 {
            let addr = 0x400 + Video::text_row_offset(row);
            for col in 0..40 {
                ram.data[addr + col] = 0x55; // Lo-Resデータ
            }
        }
        video.read(0xC050, false); // グラフィック
        video.read(0xC056, false); // Lo-Res
        video.read(0xC053, false); // ミックス表示
        video.render(&ram);

        // 上部はLo-Resブロック
        assert_eq!(video.framebuffer[0], COLORS[5]);
        // 下4行はテキストとして描画される（0x55は'U'の反転表示ではなく
        // flash扱い: 0x55 & 0xC0 == 0x40）
        let y = 20 * 8;
        let row_pixel = video.framebuffer[y * VIDEO_WIDTH];
        assert!(row_pixel == BLACK || row_pixel == WHITE);
    }

    #[test]
    fn test_full_screen_graphics_has_no_text_rows() {
        let mut video = Video::new();
        let mut ram = ram();
        for row in 20..24 {
            let addr = 0x400 + Video::text_row_offset(row);
            for col in 0..40 {
                ram.data[addr + col] = 0x00;
            }
        }
        video.read(0xC050, false);
        video.read(0xC056, false);
        video.read(0xC052, false); // 全画面
        video.render(&ram);

        // 下端までLo-Resブロック（0x00 → 黒）だが、テキストではない
        assert_eq!(video.framebuffer[(VIDEO_HEIGHT - 1) * VIDEO_WIDTH], COLORS[0]);
    }

    #[test]
    fn test_state_roundtrip() {
        let mut video = Video::new();
        video.read(0xC050, false);
        video.read(0xC055, false);
        video.set_text_color(0xFF00FF00);

        let mut blob = Vec::new();
        video.save_state(&mut blob).unwrap();
        assert_eq!(blob.len(), 8);

        let mut restored = Video::new();
        restored.load_state(&mut &blob[..]).unwrap();
        assert!(restored.use_graphics);
        assert!(!restored.use_page1);
        assert_eq!(restored.text_color(), 0xFF00FF00);
    }
}

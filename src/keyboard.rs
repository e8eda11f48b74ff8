//! キーボード
//!
//! ホストから届くシンボリックなキーイベントをApple IIのスキャンコードに
//! 変換してラッチに保持する。$C000でラッチを読み、$C010へのアクセス
//! （読み書きどちらでも）で最上位ビット（ストローブ）をクリアする。

use std::collections::HashMap;
use std::io::{self, Read, Write};

use crate::bus::MemoryMapped;
use crate::state::{self, State};

/// キーボードレジスタの開始・終了アドレス
pub const KEYBOARD_START: u16 = 0xC000;
pub const KEYBOARD_END: u16 = 0xC010;

/// ホストのキーを表すシンボル
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    A, B, C, D, E, F, G, H, I, J, K, L, M,
    N, O, P, Q, R, S, T, U, V, W, X, Y, Z,
    Num0, Num1, Num2, Num3, Num4, Num5, Num6, Num7, Num8, Num9,
    Space, Return, Backspace, Left, Right, Escape,
    Minus, Equals, Comma, Period, Slash, Semicolon, Quote,
    LeftBracket, RightBracket, Backslash,
}

/// 修飾キー付きのキーストローク
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyStroke {
    pub key: Key,
    pub ctrl: bool,
    pub shift: bool,
}

impl KeyStroke {
    pub fn plain(key: Key) -> Self {
        KeyStroke { key, ctrl: false, shift: false }
    }

    pub fn shifted(key: Key) -> Self {
        KeyStroke { key, ctrl: false, shift: true }
    }

    pub fn ctrl(key: Key) -> Self {
        KeyStroke { key, ctrl: true, shift: false }
    }
}

/// キーボードモジュール
pub struct Keyboard {
    /// スキャンコードのラッチ（最上位ビットがキー有効フラグ）
    data: u8,
    /// キーストローク → スキャンコードの対応表
    key_map: HashMap<KeyStroke, u8>,
}

impl Default for Keyboard {
    fn default() -> Self {
        Self::new()
    }
}

const LETTERS: [Key; 26] = [
    Key::A, Key::B, Key::C, Key::D, Key::E, Key::F, Key::G, Key::H, Key::I,
    Key::J, Key::K, Key::L, Key::M, Key::N, Key::O, Key::P, Key::Q, Key::R,
    Key::S, Key::T, Key::U, Key::V, Key::W, Key::X, Key::Y, Key::Z,
];

const DIGITS: [Key; 10] = [
    Key::Num0, Key::Num1, Key::Num2, Key::Num3, Key::Num4,
    Key::Num5, Key::Num6, Key::Num7, Key::Num8, Key::Num9,
];

/// シフト時の数字キー（US配列）
const SHIFTED_DIGITS: [u8; 10] = [
    b')', b'!', b'@', b'#', b'$', b'%', b'^', b'&', b'*', b'(',
];

impl Keyboard {
    pub fn new() -> Self {
        Keyboard { data: 0, key_map: Self::default_mappings() }
    }

    /// キーストローブをクリアする
    pub fn reset(&mut self) {
        self.data = 0;
    }

    /// デフォルトのキー対応表を作る
    ///
    /// 印字可能ASCIIはApple IIのコード（$A0-$DF、ビット7セット）に、
    /// Control+英字は$81-$9Aに対応させる。
    fn default_mappings() -> HashMap<KeyStroke, u8> {
        let mut map = HashMap::new();

        for (i, &key) in LETTERS.iter().enumerate() {
            let code = 0xC1 + i as u8;
            map.insert(KeyStroke::plain(key), code);
            map.insert(KeyStroke::shifted(key), code);
            // Control+英字 ($81-$9A)
            let ctrl_code = 0x81 + i as u8;
            map.insert(KeyStroke::ctrl(key), ctrl_code);
            map.insert(KeyStroke { key, ctrl: true, shift: true }, ctrl_code);
        }

        for (i, &key) in DIGITS.iter().enumerate() {
            map.insert(KeyStroke::plain(key), 0x80 | (b'0' + i as u8));
            map.insert(KeyStroke::shifted(key), 0x80 | SHIFTED_DIGITS[i]);
        }

        let punctuation: [(Key, u8, u8); 10] = [
            (Key::Minus, b'-', b'_'),
            (Key::Equals, b'=', b'+'),
            (Key::Comma, b',', b'<'),
            (Key::Period, b'.', b'>'),
            (Key::Slash, b'/', b'?'),
            (Key::Semicolon, b';', b':'),
            (Key::Quote, b'\'', b'"'),
            (Key::LeftBracket, b'[', b'['),
            (Key::RightBracket, b']', b']'),
            (Key::Backslash, b'\\', b'\\'),
        ];
        for (key, plain, shifted) in punctuation {
            map.insert(KeyStroke::plain(key), 0x80 | plain);
            map.insert(KeyStroke::shifted(key), 0x80 | shifted);
        }

        map.insert(KeyStroke::plain(Key::Space), 0xA0);
        map.insert(KeyStroke::shifted(Key::Space), 0xA0);
        map.insert(KeyStroke::plain(Key::Return), 0x8D);
        map.insert(KeyStroke::plain(Key::Backspace), 0x88);
        map.insert(KeyStroke::plain(Key::Left), 0x88);
        map.insert(KeyStroke::plain(Key::Right), 0x95);
        map.insert(KeyStroke::plain(Key::Escape), 0x9B);

        map
    }

    /// キーが押されたときにラッチを更新する
    ///
    /// 対応表にないキーストロークは無視される。
    pub fn update_strobe(&mut self, stroke: KeyStroke) {
        if let Some(&code) = self.key_map.get(&stroke) {
            self.data = code;
        }
    }

    /// キー対応を変更する
    pub fn update_mapping(&mut self, stroke: KeyStroke, scancode: u8) {
        self.key_map.insert(stroke, scancode);
    }

    /// 現在の対応表
    pub fn mappings(&self) -> &HashMap<KeyStroke, u8> {
        &self.key_map
    }
}

impl MemoryMapped for Keyboard {
    fn read(&mut self, addr: u16, no_side_fx: bool) -> u8 {
        match addr {
            0xC000 => self.data,
            0xC010 => {
                if !no_side_fx {
                    self.data &= 0x7F;
                }
                0
            }
            _ => 0,
        }
    }

    fn write(&mut self, addr: u16, _data: u8) {
        if addr == 0xC010 {
            self.data &= 0x7F;
        }
    }
}

impl State for Keyboard {
    fn save_state(&self, output: &mut dyn Write) -> io::Result<()> {
        state::write_u8(output, self.data)
    }

    fn load_state(&mut self, input: &mut dyn Read) -> io::Result<()> {
        self.data = state::read_u8(input)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_sets_latch_with_high_bit() {
        let mut kbd = Keyboard::new();
        kbd.update_strobe(KeyStroke::plain(Key::A));
        assert_eq!(kbd.read(0xC000, false), 0xC1);
        assert_ne!(kbd.read(0xC000, false) & 0x80, 0);
    }

    #[test]
    fn test_strobe_clear_on_read() {
        let mut kbd = Keyboard::new();
        kbd.update_strobe(KeyStroke::plain(Key::Return));
        assert_eq!(kbd.read(0xC000, false), 0x8D);
        kbd.read(0xC010, false);
        // 高位ビットだけが落ちる
        assert_eq!(kbd.read(0xC000, false), 0x0D);
    }

    #[test]
    fn test_strobe_clear_on_write() {
        let mut kbd = Keyboard::new();
        kbd.update_strobe(KeyStroke::plain(Key::Escape));
        kbd.write(0xC010, 0xFF);
        assert_eq!(kbd.read(0xC000, false), 0x1B);
    }

    #[test]
    fn test_no_side_fx_read_keeps_strobe() {
        let mut kbd = Keyboard::new();
        kbd.update_strobe(KeyStroke::plain(Key::A));
        kbd.read(0xC010, true);
        assert_eq!(kbd.read(0xC000, false), 0xC1);
    }

    #[test]
    fn test_control_letter_codes() {
        let mut kbd = Keyboard::new();
        kbd.update_strobe(KeyStroke::ctrl(Key::A));
        assert_eq!(kbd.read(0xC000, false), 0x81);
        kbd.update_strobe(KeyStroke::ctrl(Key::Z));
        assert_eq!(kbd.read(0xC000, false), 0x9A);
    }

    #[test]
    fn test_special_keys() {
        let mut kbd = Keyboard::new();
        for (stroke, code) in [
            (KeyStroke::plain(Key::Return), 0x8D),
            (KeyStroke::plain(Key::Left), 0x88),
            (KeyStroke::plain(Key::Backspace), 0x88),
            (KeyStroke::plain(Key::Right), 0x95),
            (KeyStroke::plain(Key::Escape), 0x9B),
            (KeyStroke::plain(Key::Space), 0xA0),
        ] {
            kbd.update_strobe(stroke);
            assert_eq!(kbd.read(0xC000, false), code);
        }
    }

    #[test]
    fn test_unmapped_stroke_is_ignored() {
        let mut kbd = Keyboard::new();
        kbd.update_strobe(KeyStroke::plain(Key::A));
        // Control+数字はデフォルトでは未定義
        kbd.update_strobe(KeyStroke::ctrl(Key::Num5));
        assert_eq!(kbd.read(0xC000, false), 0xC1);
    }

    #[test]
    fn test_runtime_remap() {
        let mut kbd = Keyboard::new();
        kbd.update_mapping(KeyStroke::plain(Key::A), 0xFF);
        kbd.update_strobe(KeyStroke::plain(Key::A));
        assert_eq!(kbd.read(0xC000, false), 0xFF);
    }

    #[test]
    fn test_state_roundtrip() {
        let mut kbd = Keyboard::new();
        kbd.update_strobe(KeyStroke::plain(Key::B));

        let mut blob = Vec::new();
        kbd.save_state(&mut blob).unwrap();
        assert_eq!(blob.len(), 1);

        let mut restored = Keyboard::new();
        restored.load_state(&mut &blob[..]).unwrap();
        assert_eq!(restored.read(0xC000, false), 0xC2);
    }
}

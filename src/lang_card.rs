//! ランゲージカード
//!
//! スロット0に挿される16KB RAM増設カード。$D000-$FFFFのROM領域に
//! バンク切り替えでRAMを重ね合わせる。上位8KB（$E000-$FFFF）は固定RAM、
//! 下位4KB（$D000-$DFFF）は2つの4KBバンクのどちらかが見える。
//! 制御レジスタは$C080-$C08Fの16アドレス。

use std::io::{self, Read, Write};

use crate::bus::MemoryMapped;
use crate::state::{self, State};

/// 制御レジスタの開始・終了アドレス
pub const LANG_CARD_START: u16 = 0xC080;
pub const LANG_CARD_END: u16 = 0xC08F;

/// ROM/バンクRAM領域の開始・終了アドレス
pub const ROM_START: u16 = 0xD000;
pub const ROM_END: u16 = 0xFFFF;

/// Applesoft ROMのサイズ（12KB）
pub const ROM_SIZE: usize = 12288;

bitflags::bitflags! {
    /// ランゲージカードの状態レジスタ
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct LcStatus: u8 {
        /// セットならバンク1、クリアならバンク2が$D000に見える
        const BANK_SELECT = 0x1;
        /// RAM読み取り有効（クリアならROMが見える）
        const READ_ENABLE = 0x2;
        /// RAM書き込み有効
        const WRITE_ENABLE = 0x4;
        /// 書き込み許可アーミングの1回目のアクセスを記録する
        const NEXT = 0x8;
    }
}

/// ランゲージカード本体
pub struct LanguageCard {
    /// $E000-$FFFFの固定RAM
    static_ram: Box<[u8; 8192]>,
    /// $D000-$DFFFのバンク1
    bank1: Box<[u8; 4096]>,
    /// $D000-$DFFFのバンク2
    bank2: Box<[u8; 4096]>,
    /// 状態レジスタ
    status: LcStatus,
    /// Applesoft ROMイメージ（12KB）
    rom: Box<[u8; ROM_SIZE]>,
}

impl Default for LanguageCard {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageCard {
    pub fn new() -> Self {
        LanguageCard {
            static_ram: Box::new([0; 8192]),
            bank1: Box::new([0; 4096]),
            bank2: Box::new([0; 4096]),
            status: LcStatus::WRITE_ENABLE,
            rom: Box::new([0; ROM_SIZE]),
        }
    }

    /// RAMと状態を電源投入時の状態に戻す（ROMイメージは保持する）
    pub fn reset(&mut self) {
        self.status = LcStatus::WRITE_ENABLE;
        self.static_ram.fill(0);
        self.bank1.fill(0);
        self.bank2.fill(0);
    }

    /// ROMイメージをロードする。12KBを超える分は捨てられる
    pub fn load_rom(&mut self, data: &[u8]) {
        let n = data.len().min(ROM_SIZE);
        self.rom[..n].copy_from_slice(&data[..n]);
        if data.len() != ROM_SIZE {
            log::warn!("ROM image is {} bytes, expected {}", data.len(), ROM_SIZE);
        }
    }

    /// 状態レジスタの現在値
    pub fn status(&self) -> LcStatus {
        self.status
    }

    /// 制御レジスタへのアクセスを処理する
    ///
    /// アドレスの下位2ビットがモードを選ぶ:
    ///   00 → RAM読み取り + 書き込み禁止
    ///   01 → ROM読み取り + 書き込み許可アーミング
    ///   10 → ROM読み取り + 書き込み禁止
    ///   11 → RAM読み取り + 書き込み許可アーミング
    /// アーミングは同種アドレスへの連続2回のアクセスで成立し、NEXTビットが
    /// 1回目のアクセスを記録する。ビット3はバンク選択。
    ///
    /// 戻り値は変更前の状態レジスタの値。
    fn handle_control(&mut self, addr: u16) -> u8 {
        let old_status = self.status;

        match addr & 0x3 {
            0x0 => {
                self.status = LcStatus::READ_ENABLE;
            }
            0x1 => {
                self.status = if self.status.contains(LcStatus::NEXT) {
                    LcStatus::WRITE_ENABLE
                } else {
                    LcStatus::NEXT
                };
            }
            0x2 => {
                self.status = LcStatus::empty();
            }
            0x3 => {
                self.status = if self.status.contains(LcStatus::NEXT) {
                    LcStatus::WRITE_ENABLE
                } else {
                    LcStatus::NEXT
                };
                self.status |= LcStatus::READ_ENABLE;
            }
            _ => unreachable!(),
        }

        if addr & 0x8 != 0 {
            self.status |= LcStatus::BANK_SELECT;
        }

        old_status.bits()
    }
}

impl MemoryMapped for LanguageCard {
    fn read(&mut self, addr: u16, no_side_fx: bool) -> u8 {
        if (LANG_CARD_START..=LANG_CARD_END).contains(&addr) {
            if no_side_fx {
                return 0;
            }
            return self.handle_control(addr);
        }

        if addr < ROM_START {
            return 0;
        }

        if self.status.contains(LcStatus::READ_ENABLE) {
            if addr >= ROM_START + 0x1000 {
                self.static_ram[(addr - (ROM_START + 0x1000)) as usize]
            } else if self.status.contains(LcStatus::BANK_SELECT) {
                self.bank1[(addr - ROM_START) as usize]
            } else {
                self.bank2[(addr - ROM_START) as usize]
            }
        } else {
            self.rom[(addr - ROM_START) as usize]
        }
    }

    fn write(&mut self, addr: u16, data: u8) {
        if (LANG_CARD_START..=LANG_CARD_END).contains(&addr) {
            self.handle_control(addr);
            return;
        }

        if addr < ROM_START || !self.status.contains(LcStatus::WRITE_ENABLE) {
            return;
        }

        if addr >= ROM_START + 0x1000 {
            self.static_ram[(addr - (ROM_START + 0x1000)) as usize] = data;
        } else if self.status.contains(LcStatus::BANK_SELECT) {
            self.bank1[(addr - ROM_START) as usize] = data;
        } else {
            self.bank2[(addr - ROM_START) as usize] = data;
        }
    }
}

impl State for LanguageCard {
    fn save_state(&self, output: &mut dyn Write) -> io::Result<()> {
        output.write_all(&self.static_ram[..])?;
        output.write_all(&self.bank1[..])?;
        output.write_all(&self.bank2[..])?;
        state::write_u8(output, self.status.bits())
    }

    fn load_state(&mut self, input: &mut dyn Read) -> io::Result<()> {
        input.read_exact(&mut self.static_ram[..])?;
        input.read_exact(&mut self.bank1[..])?;
        input.read_exact(&mut self.bank2[..])?;
        self.status = LcStatus::from_bits_truncate(state::read_u8(input)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card_with_rom() -> LanguageCard {
        let mut card = LanguageCard::new();
        let mut rom = vec![0u8; ROM_SIZE];
        rom[0] = 0xA5;
        rom[0x1000] = 0xB6;
        rom[ROM_SIZE - 1] = 0xC7;
        card.load_rom(&rom);
        card
    }

    #[test]
    fn test_rom_visible_after_power_on() {
        let mut card = card_with_rom();
        // 電源投入時はREAD_ENABLEが落ちているのでROMが見える
        assert_eq!(card.read(0xD000, false), 0xA5);
        assert_eq!(card.read(0xE000, false), 0xB6);
        assert_eq!(card.read(0xFFFF, false), 0xC7);
    }

    #[test]
    fn test_write_enabled_at_power_on() {
        let mut card = card_with_rom();
        // 初期状態はWRITE_ENABLE。書き込みはRAMへ入るが読み取りはROM
        card.write(0xE000, 0x11);
        assert_eq!(card.read(0xE000, false), 0xB6);
        // RAM読み取りへ切り替えると書いた値が見える
        card.read(0xC080, false);
        assert_eq!(card.read(0xE000, false), 0x11);
    }

    #[test]
    fn test_write_enable_arming_two_accesses() {
        let mut card = card_with_rom();
        // モード10で書き込み禁止にしてから2回アクセスでアーミング
        card.read(0xC082, false);
        card.write(0xE005, 0x42);
        card.read(0xC08B, false);
        card.read(0xC08B, false);
        card.write(0xE005, 0x42);
        assert_eq!(card.read(0xE005, false), 0x42);
    }

    #[test]
    fn test_single_access_does_not_enable_write() {
        let mut card = card_with_rom();
        card.read(0xC082, false); // 書き込み禁止
        card.read(0xC08B, false); // アーミング1回目のみ
        card.write(0xE005, 0x42);
        card.read(0xC08B, false); // RAM読み取りへ
        assert_eq!(card.read(0xE005, false), 0x00);
    }

    #[test]
    fn test_mode00_clears_write_enable() {
        let mut card = card_with_rom();
        card.read(0xC08B, false);
        card.read(0xC08B, false); // WRITE_ENABLE成立
        card.read(0xC088, false); // モード00 → 書き込み禁止
        card.write(0xE005, 0x42);
        assert_eq!(card.read(0xE005, false), 0x00);
    }

    #[test]
    fn test_bank_routing() {
        let mut card = card_with_rom();
        // バンク1（ビット3セット）に書く
        card.read(0xC08B, false);
        card.read(0xC08B, false);
        card.write(0xD000, 0x11);
        // バンク2（ビット3クリア）に切り替えて書く
        card.read(0xC083, false);
        card.read(0xC083, false);
        card.write(0xD000, 0x22);
        // それぞれのバンクに別の値が残っている
        card.read(0xC088, false);
        assert_eq!(card.read(0xD000, false), 0x11);
        card.read(0xC080, false);
        assert_eq!(card.read(0xD000, false), 0x22);
        // モード00を通った後は書き込みが禁止されている
        card.write(0xE000, 0x33);
        assert_eq!(card.read(0xE000, false), 0x00);
    }

    #[test]
    fn test_control_read_returns_pre_mutation_status() {
        let mut card = card_with_rom();
        // 初期状態はWRITE_ENABLE (0x4)
        assert_eq!(card.read(0xC080, false), 0x04);
        // 直前のアクセスでREAD_ENABLE (0x2)になっている
        assert_eq!(card.read(0xC080, false), 0x02);
    }

    #[test]
    fn test_no_side_fx_read_does_not_mutate() {
        let mut card = card_with_rom();
        let before = card.status();
        card.read(0xC08B, false);
        let armed = card.status();
        assert_ne!(before, armed);
        card.read(0xC08B, true);
        assert_eq!(card.status(), armed);
    }

    #[test]
    fn test_state_roundtrip() {
        let mut card = card_with_rom();
        card.read(0xC08B, false);
        card.read(0xC08B, false);
        card.write(0xD123, 0x77);
        card.write(0xE456, 0x88);

        let mut blob = Vec::new();
        card.save_state(&mut blob).unwrap();
        assert_eq!(blob.len(), 8192 + 4096 + 4096 + 1);

        let mut restored = card_with_rom();
        restored.load_state(&mut &blob[..]).unwrap();
        assert_eq!(restored.status(), card.status());
        assert_eq!(restored.read(0xD123, false), 0x77);
        assert_eq!(restored.read(0xE456, false), 0x88);
    }
}

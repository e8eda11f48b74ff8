//! Apple II+ エミュレータコア
//!
//! CPU、バス、各デバイスを統合し、フレーム単位の実行と状態の保存・復元を
//! 提供する。デバイスの所有権はすべてこの構造体にあり、バスには
//! 非所有ハンドル（Rcのクローン）だけが登録される。

use std::cell::{Ref, RefCell};
use std::io::{Read, Write};
use std::rc::Rc;

use crate::bus::{MemoryMapped, SystemBus};
use crate::cpu::{Cpu, CpuContext, CycleCounter};
use crate::disk::{self, drive::DISK_SIZE, DiskController, DriveId};
use crate::error::EmuError;
use crate::keyboard::{self, Keyboard, KeyStroke};
use crate::lang_card::{self, LanguageCard};
use crate::memory::Memory;
use crate::speaker::{Speaker, SPEAKER_ADDR};
use crate::state::{self, State};
use crate::video::{self, Color, Video};
use crate::CPU_FREQ;

/// セーブステート先頭のマジックナンバー
const STATE_MAGIC: u32 = 0xDEADBEEF;

/// ディスクイメージのサイズ（外部向けの再公開）
pub const DISK_IMAGE_SIZE: usize = DISK_SIZE;

/// Apple II+エミュレータのメイン構造体
pub struct Apple2 {
    /// システムバス
    bus: SystemBus,
    /// 6502 CPU
    cpu: Cpu,
    /// 48KBのメインRAM
    ram: Rc<RefCell<Memory>>,
    /// ランゲージカード（Applesoft ROM + 16KB RAM）
    lang_card: Rc<RefCell<LanguageCard>>,
    /// ビデオモジュール
    video: Rc<RefCell<Video>>,
    /// キーボードモジュール
    keyboard: Rc<RefCell<Keyboard>>,
    /// スピーカーモジュール
    speaker: Rc<RefCell<Speaker>>,
    /// Disk IIコントローラカード
    disk: Rc<RefCell<DiskController>>,
    /// 直近フレームのオーディオサンプル
    audio_buffer: Vec<i16>,
    /// 前フレームで予算を超えて実行したサイクル数。次フレームの
    /// 実行予算から差し引かれる
    leftover_cycles: u32,
    /// 一時停止中か
    paused: bool,
    /// フレームあたりのCPUサイクル数を増やす倍率
    turbo: u8,
}

impl Default for Apple2 {
    fn default() -> Self {
        Self::new()
    }
}

impl Apple2 {
    pub fn new() -> Self {
        let cycles = CycleCounter::default();

        let ram = Rc::new(RefCell::new(Memory::new(0x0000, 0xBFFF, false)));
        let lang_card = Rc::new(RefCell::new(LanguageCard::new()));
        let video = Rc::new(RefCell::new(Video::new()));
        let keyboard = Rc::new(RefCell::new(Keyboard::new()));
        let speaker = Rc::new(RefCell::new(Speaker::new(cycles.clone())));
        let disk = Rc::new(RefCell::new(DiskController::new(cycles.clone())));

        // アクセス頻度の高いデバイスから順に登録する
        let mut bus = SystemBus::new();
        bus.register(0x0000, 0xBFFF, ram.clone());
        bus.register(lang_card::ROM_START, lang_card::ROM_END, lang_card.clone());
        bus.register(
            lang_card::LANG_CARD_START,
            lang_card::LANG_CARD_END,
            lang_card.clone(),
        );
        bus.register(keyboard::KEYBOARD_START, keyboard::KEYBOARD_END, keyboard.clone());
        bus.register(video::VIDEO_START, video::VIDEO_END, video.clone());
        bus.register(SPEAKER_ADDR, SPEAKER_ADDR, speaker.clone());
        bus.register(disk::DISK_START, disk::DISK_END, disk.clone());
        bus.register(disk::DISK_ROM_START, disk::DISK_ROM_END, disk.clone());

        let mut cpu = Cpu::new(cycles);
        cpu.reset(&mut bus);

        Apple2 {
            bus,
            cpu,
            ram,
            lang_card,
            video,
            keyboard,
            speaker,
            disk,
            audio_buffer: Vec::new(),
            leftover_cycles: 0,
            paused: false,
            turbo: 1,
        }
    }

    /// Applesoft ROM（12KB）をロードしてCPUをリセットする
    pub fn load_rom(&mut self, data: &[u8]) -> Result<(), EmuError> {
        if data.is_empty() {
            return Err(EmuError::BadRomSize);
        }

        self.lang_card.borrow_mut().load_rom(data);
        self.cpu.reset(&mut self.bus);
        log::info!("ROM loaded, reset vector = {:04X}", self.cpu.context().pc);
        Ok(())
    }

    /// ディスクイメージ（143,360バイト）をドライブへロードする
    pub fn load_disk(&mut self, drive: DriveId, data: &[u8]) -> Result<(), EmuError> {
        self.disk.borrow_mut().load_disk(drive, data)
    }

    /// ディスクを取り出す
    pub fn unload_disk(&mut self, drive: DriveId) {
        self.disk.borrow_mut().unload_disk(drive);
    }

    /// ディスクのモーターが回っているか
    pub fn disk_busy(&self) -> bool {
        self.disk.borrow().motor_on()
    }

    /// 1フレーム分を実行する
    ///
    /// 1.023MHzのCPUをfpsで割ったサイクル数だけ実行し、フレーム終端で
    /// ビデオの再描画とスピーカーのサンプル生成を行う。最後の命令が
    /// 予算を超えた分は次フレームの予算から差し引く。
    pub fn run_frame(&mut self, fps: u32) {
        if self.paused {
            return;
        }

        let budget =
            (CPU_FREQ / fps * self.turbo as u32).saturating_sub(self.leftover_cycles);

        self.leftover_cycles = self.cpu.execute(&mut self.bus, budget);

        if self.cpu.bp_enabled() && self.cpu.context().pc == self.cpu.bp_addr() {
            self.paused = true;
        }

        self.video.borrow_mut().render(&self.ram.borrow());

        let mut speaker = self.speaker.borrow_mut();
        let samples = speaker.play_audio(budget.saturating_sub(self.leftover_cycles));
        self.audio_buffer.clear();
        self.audio_buffer.extend_from_slice(samples);
    }

    /// 一時停止中に1命令だけ実行する
    ///
    /// 画面は再描画され、スピーカーのキューは捨てられる（溜まった
    /// トグルを後からまとめて鳴らさないため）。
    pub fn single_step(&mut self) {
        if !self.paused {
            return;
        }

        self.cpu.single_step(&mut self.bus);
        self.video.borrow_mut().render(&self.ram.borrow());
        self.speaker.borrow_mut().clear_queue();
    }

    /// CPUだけをリセットする（リセットベクタを読み直す）
    pub fn reset_cpu(&mut self) {
        self.cpu.reset(&mut self.bus);
    }

    /// 全デバイスを電源投入時の状態へ戻す
    pub fn power_cycle(&mut self) {
        self.ram.borrow_mut().reset();
        self.lang_card.borrow_mut().reset();
        self.video.borrow_mut().reset();
        self.keyboard.borrow_mut().reset();
        self.speaker.borrow_mut().reset();
        self.disk.borrow_mut().reset();
        self.cpu.reset(&mut self.bus);
        self.leftover_cycles = 0;
    }

    pub fn paused(&self) -> bool {
        self.paused
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn turbo(&self) -> u8 {
        self.turbo
    }

    pub fn set_turbo(&mut self, turbo: u8) {
        self.turbo = turbo.max(1);
    }

    pub fn cpu_context(&self) -> CpuContext {
        self.cpu.context()
    }

    /// CPUの累積サイクル数
    pub fn total_cycles(&self) -> u32 {
        self.cpu.total_cycles()
    }

    pub fn bp_addr(&self) -> u16 {
        self.cpu.bp_addr()
    }

    pub fn set_bp_addr(&mut self, addr: u16) {
        self.cpu.set_bp_addr(addr);
    }

    pub fn bp_enabled(&self) -> bool {
        self.cpu.bp_enabled()
    }

    pub fn set_bp_enabled(&mut self, enabled: bool) {
        self.cpu.set_bp_enabled(enabled);
    }

    pub fn text_color(&self) -> Color {
        self.video.borrow().text_color()
    }

    pub fn set_text_color(&mut self, color: Color) {
        self.video.borrow_mut().set_text_color(color);
    }

    pub fn speaker_mute(&self) -> bool {
        self.speaker.borrow().muted()
    }

    pub fn set_speaker_mute(&mut self, mute: bool) {
        self.speaker.borrow_mut().set_muted(mute);
    }

    /// キー押下をキーボードラッチへ伝える
    ///
    /// run_frameと同じスレッドから呼ぶこと。
    pub fn key_down(&mut self, stroke: KeyStroke) {
        self.keyboard.borrow_mut().update_strobe(stroke);
    }

    /// キー対応表を変更する
    pub fn update_key_mapping(&mut self, stroke: KeyStroke, scancode: u8) {
        self.keyboard.borrow_mut().update_mapping(stroke, scancode);
    }

    /// フレームバッファ（280x192のRGBA）
    ///
    /// ホストはrun_frameの呼び出しの合間にだけ読むこと。
    pub fn framebuffer(&self) -> Ref<'_, [Color]> {
        Ref::map(self.video.borrow(), |v| v.framebuffer.as_slice())
    }

    /// 直近フレームのオーディオサンプル（44.1kHzモノラル16ビットPCM）
    pub fn audio_buffer(&self) -> &[i16] {
        &self.audio_buffer
    }

    /// メモリの内容を副作用なしで読み出す（メモリビューア用）
    pub fn dump_memory(&mut self, start: u16, end: u16) -> Vec<u8> {
        (start..=end).map(|addr| self.bus.read(addr, true)).collect()
    }

    /// 現在の状態をストリームへ書き出す
    pub fn save_state(&self, output: &mut dyn Write) -> Result<(), EmuError> {
        state::write_u32(output, STATE_MAGIC)?;

        self.cpu.save_state(output)?;
        self.ram.borrow().save_state(output)?;
        self.lang_card.borrow().save_state(output)?;
        self.video.borrow().save_state(output)?;
        self.keyboard.borrow().save_state(output)?;
        self.speaker.borrow().save_state(output)?;
        self.disk.borrow().save_state(output)?;

        state::write_u32(output, self.leftover_cycles)?;
        Ok(())
    }

    /// ストリームから状態を復元する
    ///
    /// マジック不一致や途中のEOFの場合はマシンをパワーサイクルして
    /// エラーを返す。
    pub fn load_state(&mut self, input: &mut dyn Read) -> Result<(), EmuError> {
        match self.try_load_state(input) {
            Ok(()) => Ok(()),
            Err(err) => {
                log::warn!("state load failed, power cycling: {}", err);
                self.power_cycle();
                Err(err)
            }
        }
    }

    fn try_load_state(&mut self, input: &mut dyn Read) -> Result<(), EmuError> {
        let magic = state::read_u32(input)?;
        if magic != STATE_MAGIC {
            return Err(EmuError::BadStateFile(format!("bad magic {:08X}", magic)));
        }

        self.cpu.load_state(input)?;
        self.ram.borrow_mut().load_state(input)?;
        self.lang_card.borrow_mut().load_state(input)?;
        self.video.borrow_mut().load_state(input)?;
        self.keyboard.borrow_mut().load_state(input)?;
        self.speaker.borrow_mut().load_state(input)?;
        self.disk.borrow_mut().load_state(input)?;

        self.leftover_cycles = state::read_u32(input)?;
        Ok(())
    }
}

//! 1ビットスピーカー
//!
//! $C030へのアクセスでトグルするだけの単純な回路。CPUは1フレーム分の
//! サイクルを全速力で実行してから残り時間を眠るので、アクセスの瞬間に
//! クリック音を出すとホストの速度で鳴ってしまう。そこでトグルが起きた
//! CPUサイクルを記録しておき、フレーム終端でApple IIの時間軸に沿った
//! PCM波形として再生する。

use std::collections::VecDeque;
use std::io::{self, Read, Write};

use crate::bus::MemoryMapped;
use crate::cpu::CycleCounter;
use crate::state::{self, State};
use crate::CPU_FREQ;

/// スピーカーのアドレス
pub const SPEAKER_ADDR: u16 = 0xC030;

/// 出力サンプルレート (Hz)
pub const SAMPLE_RATE: u32 = 44100;

/// トグルキューの上限。超えた分は古いものから捨てる
const MAX_QUEUE_LEN: usize = 16384;

/// スピーカーがHIGHのときのPCM振幅
const AMPLITUDE: i16 = 16000;

/// スピーカーモジュール
pub struct Speaker {
    /// トグルが起きたCPUサイクルのFIFO
    toggle_cycles: VecDeque<u32>,
    /// 論理的なスピーカーのピン状態
    speaker_state: bool,
    /// 前フレーム終了時点のサイクル数
    prev_cycle_count: u32,
    /// CPUの累積サイクルカウンタ（共有）
    cycles: CycleCounter,
    /// 生成したサンプルのバッファ（再利用）
    samples: Vec<i16>,
    /// ミュート中はサンプルを捨てる
    muted: bool,
    /// キューの上限を超えてトグルを捨てたか
    saturated: bool,
}

impl Speaker {
    pub fn new(cycles: CycleCounter) -> Self {
        Speaker {
            toggle_cycles: VecDeque::with_capacity(4096),
            speaker_state: false,
            prev_cycle_count: 0,
            cycles,
            samples: Vec::new(),
            muted: false,
            saturated: false,
        }
    }

    /// ピン状態とキューを電源投入時の状態に戻す
    pub fn reset(&mut self) {
        self.prev_cycle_count = 0;
        self.speaker_state = false;
        self.toggle_cycles.clear();
        self.saturated = false;
    }

    pub fn muted(&self) -> bool {
        self.muted
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    /// 直近のフレームでキューあふれが起きたか
    pub fn saturated(&self) -> bool {
        self.saturated
    }

    /// キューを捨てる（シングルステップ時に呼ばれる）
    pub fn clear_queue(&mut self) {
        self.toggle_cycles.clear();
    }

    fn push_toggle(&mut self) {
        if self.toggle_cycles.len() >= MAX_QUEUE_LEN {
            self.toggle_cycles.pop_front();
            self.saturated = true;
        }
        self.toggle_cycles.push_back(self.cycles.get());
    }

    /// num_cycles分のオーディオを生成する
    ///
    /// CPUと同じレート（毎フレーム）で呼ぶこと。呼び出し間隔が狂うと
    /// 音声がCPUとずれていく。戻り値のスライスはミュート中は空。
    pub fn play_audio(&mut self, num_cycles: u32) -> &[i16] {
        const CYCLES_PER_SAMPLE: f32 = CPU_FREQ as f32 / SAMPLE_RATE as f32;
        let num_samples = (num_cycles as f32 / CYCLES_PER_SAMPLE) as usize;

        self.samples.clear();
        self.samples.reserve(num_samples);

        for i in 0..num_samples {
            let sample_cycle =
                self.prev_cycle_count.wrapping_add((i as f32 * CYCLES_PER_SAMPLE) as u32);

            while let Some(&toggle) = self.toggle_cycles.front() {
                if toggle <= sample_cycle {
                    self.toggle_cycles.pop_front();
                    self.speaker_state = !self.speaker_state;
                } else {
                    break;
                }
            }

            self.samples.push(if self.speaker_state { AMPLITUDE } else { 0 });
        }

        self.prev_cycle_count = self.cycles.get();

        if self.muted {
            &[]
        } else {
            &self.samples
        }
    }
}

impl MemoryMapped for Speaker {
    fn read(&mut self, addr: u16, no_side_fx: bool) -> u8 {
        if addr == SPEAKER_ADDR && !no_side_fx {
            self.push_toggle();
        }
        0
    }

    fn write(&mut self, addr: u16, _data: u8) {
        if addr == SPEAKER_ADDR {
            self.push_toggle();
        }
    }
}

impl State for Speaker {
    fn save_state(&self, output: &mut dyn Write) -> io::Result<()> {
        state::write_u32(output, self.prev_cycle_count)?;
        state::write_bool(output, self.speaker_state)
    }

    fn load_state(&mut self, input: &mut dyn Read) -> io::Result<()> {
        self.prev_cycle_count = state::read_u32(input)?;
        self.speaker_state = state::read_bool(input)?;

        // 復元前のトグルが鳴らないようにキューは捨てる
        self.toggle_cycles.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_speaker() -> (Speaker, CycleCounter) {
        let cycles = CycleCounter::default();
        (Speaker::new(cycles.clone()), cycles)
    }

    #[test]
    fn test_access_enqueues_toggle() {
        let (mut speaker, cycles) = new_speaker();
        cycles.set(123);
        speaker.read(SPEAKER_ADDR, false);
        cycles.set(456);
        speaker.write(SPEAKER_ADDR, 0);
        assert_eq!(speaker.toggle_cycles, VecDeque::from([123, 456]));
    }

    #[test]
    fn test_no_side_fx_read_does_not_enqueue() {
        let (mut speaker, _) = new_speaker();
        speaker.read(SPEAKER_ADDR, true);
        assert!(speaker.toggle_cycles.is_empty());
    }

    #[test]
    fn test_sample_count_matches_cycle_budget() {
        let (mut speaker, cycles) = new_speaker();
        cycles.set(23200);
        // 23200 / (1023000 / 44100) ≈ 1000.1 → 1000サンプル
        let samples = speaker.play_audio(23200);
        assert_eq!(samples.len(), 1000);
    }

    #[test]
    fn test_toggle_replay_produces_square_wave() {
        let (mut speaker, cycles) = new_speaker();
        cycles.set(0);
        speaker.read(SPEAKER_ADDR, false); // cycle 0でHIGHへ
        cycles.set(2320);
        speaker.read(SPEAKER_ADDR, false); // cycle 2320でLOWへ
        cycles.set(23200);

        let samples = speaker.play_audio(23200).to_vec();
        assert_eq!(samples[0], AMPLITUDE);
        assert_eq!(samples[50], AMPLITUDE);
        assert_eq!(samples[99], AMPLITUDE);
        assert_eq!(samples[102], 0);
        assert_eq!(*samples.last().unwrap(), 0);
    }

    #[test]
    fn test_mute_discards_samples() {
        let (mut speaker, cycles) = new_speaker();
        speaker.set_muted(true);
        cycles.set(50);
        speaker.read(SPEAKER_ADDR, false);
        cycles.set(2320);
        assert!(speaker.play_audio(2320).is_empty());
        // ミュート中でもピン状態は追従する
        assert!(speaker.speaker_state);
    }

    #[test]
    fn test_queue_is_bounded() {
        let (mut speaker, _) = new_speaker();
        for _ in 0..(MAX_QUEUE_LEN + 10) {
            speaker.read(SPEAKER_ADDR, false);
        }
        assert_eq!(speaker.toggle_cycles.len(), MAX_QUEUE_LEN);
        assert!(speaker.saturated());
    }

    #[test]
    fn test_state_roundtrip_clears_queue() {
        let (mut speaker, cycles) = new_speaker();
        cycles.set(100);
        speaker.read(SPEAKER_ADDR, false);
        speaker.play_audio(100);

        let mut blob = Vec::new();
        speaker.save_state(&mut blob).unwrap();
        assert_eq!(blob.len(), 5);

        let (mut restored, _) = new_speaker();
        restored.read(SPEAKER_ADDR, false);
        restored.load_state(&mut &blob[..]).unwrap();
        assert_eq!(restored.prev_cycle_count, 100);
        assert!(restored.speaker_state);
        assert!(restored.toggle_cycles.is_empty());
    }
}

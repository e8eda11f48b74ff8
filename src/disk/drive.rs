//! フロッピードライブ
//!
//! DOS 3.3のディスクは35トラック x 16セクタ x 256バイト。配布されている
//! ディスクイメージは各セクタの256バイトデータだけを並べたものだが、
//! 実機のファームウェアはアドレスフィールドや同期バイトを含む
//! "6-and-2"エンコード済みのビット列を期待する。このモジュールが
//! イメージをその形式へ再エンコードし、ビット単位の読み書きを提供する。
//! 詳細は"Beneath Apple DOS"を参照。

use std::io::{self, Read, Write};

use crate::state::{self, State};

/// トラック数
pub const NUM_TRACKS: usize = 35;
/// 1トラックあたりのセクタ数
pub const NUM_SECTORS: usize = 16;
/// 1セクタのバイト数
pub const SECTOR_SIZE: usize = 256;
/// ディスクイメージのサイズ（データフィールドのみ、143,360バイト）
pub const DISK_SIZE: usize = NUM_TRACKS * NUM_SECTORS * SECTOR_SIZE;

/// デフォルトのボリューム番号
const DEFAULT_VOLUME: u8 = 254;

/// セクタインターリーブテーブル
///
/// セクタを昇順に隣接配置しないことで、DOSが1セクタを処理する間に
/// 次のセクタが読み出し位置を通り過ぎないようにしている。
const SECTOR_TRANS: [u8; 16] = [0, 13, 11, 9, 7, 5, 3, 1, 14, 12, 10, 8, 6, 4, 2, 15];

/// 8ビットのデータバイトを"6-and-2"ディスクバイトへ変換するテーブル
const TRANS62: [u8; 64] = [
    0x96, 0x97, 0x9A, 0x9B, 0x9D, 0x9E, 0x9F, 0xA6,
    0xA7, 0xAB, 0xAC, 0xAD, 0xAE, 0xAF, 0xB2, 0xB3,
    0xB4, 0xB5, 0xB6, 0xB7, 0xB9, 0xBA, 0xBB, 0xBC,
    0xBD, 0xBE, 0xBF, 0xCB, 0xCD, 0xCE, 0xCF, 0xD3,
    0xD6, 0xD7, 0xD9, 0xDA, 0xDB, 0xDC, 0xDD, 0xDE,
    0xDF, 0xE5, 0xE6, 0xE7, 0xE9, 0xEA, 0xEB, 0xEC,
    0xED, 0xEE, 0xEF, 0xF2, 0xF3, 0xF4, 0xF5, 0xF6,
    0xF7, 0xF9, 0xFA, 0xFB, 0xFC, 0xFD, 0xFE, 0xFF,
];

/// フロッピードライブ1台分
pub struct FloppyDrive {
    /// トラックごとのエンコード済みビット列
    tracks: Vec<Vec<u8>>,
    /// 読み書き対象のビット位置（ディスクの回転位置）
    cur_bit: u32,
    /// ディスクがロードされているか
    disk_loaded: bool,
    /// 書き込みプロテクト
    write_protected: bool,
}

impl Default for FloppyDrive {
    fn default() -> Self {
        Self::new()
    }
}

impl FloppyDrive {
    pub fn new() -> Self {
        FloppyDrive {
            tracks: vec![Vec::new(); NUM_TRACKS],
            cur_bit: 0,
            disk_loaded: false,
            write_protected: false,
        }
    }

    pub fn disk_loaded(&self) -> bool {
        self.disk_loaded
    }

    pub fn write_protected(&self) -> bool {
        self.write_protected
    }

    pub fn set_write_protected(&mut self, protected: bool) {
        self.write_protected = protected;
    }

    /// トラックのエンコード済みビット列（テスト・デバッグ用）
    pub fn track_data(&self, track_num: usize) -> &[u8] {
        &self.tracks[track_num]
    }

    /// ディスクイメージをエンコードしてロードする
    ///
    /// 呼び出し側でサイズ（143,360バイト）を検証しておくこと。
    pub fn load(&mut self, disk: &[u8]) {
        if self.disk_loaded {
            self.unload();
        }

        for track_num in 0..NUM_TRACKS {
            let offset = track_num * NUM_SECTORS * SECTOR_SIZE;
            self.encode_track(track_num, &disk[offset..offset + NUM_SECTORS * SECTOR_SIZE]);
        }

        self.disk_loaded = true;
    }

    /// ディスクを取り出す
    pub fn unload(&mut self) {
        for track in &mut self.tracks {
            track.clear();
        }

        self.cur_bit = 0;
        self.disk_loaded = false;
    }

    /// ドライブを1ビット進める
    pub fn seek_bit(&mut self, track_num: usize) {
        if self.disk_loaded && track_num < NUM_TRACKS {
            self.cur_bit = (self.cur_bit + 1) % (self.tracks[track_num].len() as u32 * 8);
        }
    }

    /// 現在のバイトの先頭ビットまで巻き戻す
    ///
    /// 書き込みをバイト境界に同期させるために使う。実機のコントローラは
    /// 自己同期バイトでこの同期を保っている。
    pub fn seek_prev_byte(&mut self, track_num: usize) {
        if self.disk_loaded && track_num < NUM_TRACKS {
            self.cur_bit = (self.cur_bit / 8) * 8;
        }
    }

    /// 現在位置のビットを読み取る
    pub fn get_bit(&self, track_num: usize) -> u8 {
        if self.disk_loaded && track_num < NUM_TRACKS {
            let byte_index = (self.cur_bit / 8) as usize;
            let bit_index = 7 - (self.cur_bit % 8);

            (self.tracks[track_num][byte_index] >> bit_index) & 1
        } else {
            0
        }
    }

    /// 現在位置のビットを書き換える（最下位ビットのみ使用）
    pub fn set_bit(&mut self, track_num: usize, data: u8) {
        if self.disk_loaded && track_num < NUM_TRACKS {
            let byte_index = (self.cur_bit / 8) as usize;
            let bit_index = 7 - (self.cur_bit % 8);

            self.tracks[track_num][byte_index] &= !(1 << bit_index);
            self.tracks[track_num][byte_index] |= (data & 1) << bit_index;
        }
    }

    /// 1トラック分をエンコードする
    fn encode_track(&mut self, track_num: usize, data: &[u8]) {
        for (i, &phys_sector) in SECTOR_TRANS.iter().enumerate() {
            let offset = i * SECTOR_SIZE;
            self.encode_sector(track_num, phys_sector, &data[offset..offset + SECTOR_SIZE]);
        }
    }

    /// 1セクタ分をエンコードする
    ///
    /// アドレスフィールドと同期バイトを付加し、データ本体を"6-and-2"
    /// エンコードする。apple2jsのexplodeSector()を参考にしている。
    fn encode_sector(&mut self, track_num: usize, sector_num: u8, data: &[u8]) {
        // GAP1は最初のセクタの前で128バイト、GAP3は各セクタの前で40バイト
        let num_gap_bytes = if sector_num == 0 { 128 } else { 40 };
        self.encode_gap(track_num, num_gap_bytes);

        // アドレスフィールド
        let checksum = DEFAULT_VOLUME ^ track_num as u8 ^ sector_num;
        let track = &mut self.tracks[track_num];
        track.push(0xD5);
        track.push(0xAA);
        track.push(0x96);
        Self::encode_44(track, DEFAULT_VOLUME);
        Self::encode_44(track, track_num as u8);
        Self::encode_44(track, sector_num);
        Self::encode_44(track, checksum);
        track.push(0xDE);
        track.push(0xAA);
        track.push(0xEB);

        // GAP2はアドレスフィールドとデータフィールドの間で6バイト
        self.encode_gap(track_num, 6);

        // データフィールド
        let track = &mut self.tracks[track_num];
        track.push(0xD5);
        track.push(0xAA);
        track.push(0xAD);

        // 256バイトを342個の6ビット"ディスクバイト"へ変換する。
        // 先頭86個は各バイトの下位2ビットを集めたもの、残り256個は
        // 上位6ビット。データを逆順に歩きながら2つのインデックスで
        // 書き込んでいく。
        let mut nibbles = [0u8; 342];
        const VAL6_OFFSET: usize = 86;

        let mut idx2: isize = 85;
        for idx6 in (0..=257isize).rev() {
            let mut val6 = data[(idx6 % 256) as usize];
            let mut val2 = nibbles[idx2 as usize];

            val2 = (val2 << 1) | (val6 & 1);
            val6 >>= 1;
            val2 = (val2 << 1) | (val6 & 1);
            val6 >>= 1;

            if (idx6 as usize) < 256 {
                nibbles[VAL6_OFFSET + idx6 as usize] = val6;
            }
            nibbles[idx2 as usize] = val2;

            idx2 -= 1;
            if idx2 < 0 {
                idx2 = 85;
            }
        }

        let track = &mut self.tracks[track_num];
        let mut last = 0u8;
        for &val in nibbles.iter() {
            track.push(TRANS62[(last ^ val) as usize & 0x3F]);
            last = val;
        }
        track.push(TRANS62[last as usize & 0x3F]);

        track.push(0xDE);
        track.push(0xAA);
        track.push(0xEB);

        // 次のGAP3の先頭
        self.encode_gap(track_num, 1);
    }

    /// 同期バイトの並びをエンコードする
    ///
    /// 実機では先頭8ビットが0xFFで末尾2ビットが0の10ビットバイトだが、
    /// エミュレータはバイト境界を知っているので0の尾は省略する。
    fn encode_gap(&mut self, track_num: usize, num_bytes: usize) {
        for _ in 0..num_bytes {
            self.tracks[track_num].push(0xFF);
        }
    }

    /// "4-and-4"エンコード
    ///
    /// D7 D6 D5 D4 D3 D2 D1 D0 が
    ///   1 D7 1 D5 1 D3 1 D1
    ///   1 D6 1 D4 1 D2 1 D0
    /// の2バイトになる。どのバイトも1で始まり0が連続しないという
    /// コントローラの要件を満たす。
    fn encode_44(track: &mut Vec<u8>, data: u8) {
        track.push((data >> 1) | 0xAA);
        track.push(data | 0xAA);
    }
}

impl State for FloppyDrive {
    fn save_state(&self, output: &mut dyn Write) -> io::Result<()> {
        state::write_u32(output, self.cur_bit)?;
        state::write_bool(output, self.disk_loaded)?;
        state::write_bool(output, self.write_protected)?;

        for track in &self.tracks {
            state::write_u32(output, track.len() as u32)?;
            output.write_all(track)?;
        }
        Ok(())
    }

    fn load_state(&mut self, input: &mut dyn Read) -> io::Result<()> {
        self.cur_bit = state::read_u32(input)?;
        self.disk_loaded = state::read_bool(input)?;
        self.write_protected = state::read_bool(input)?;

        for track in &mut self.tracks {
            let len = state::read_u32(input)? as usize;
            track.resize(len, 0);
            input.read_exact(track)?;
        }
        Ok(())
    }
}

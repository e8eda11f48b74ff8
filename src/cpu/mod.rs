//! 6502 CPUコア
//!
//! フェッチ・デコード・実行をデコードテーブル駆動で行う。アドレッシング
//! モードが実効アドレスと実効値を用意し、命令本体がレジスタ・フラグ・
//! メモリ（バス経由）を更新する。サイクル数はテーブルの基本値に、
//! ページ境界・ブランチ・BCDの追加分を加算する。

pub mod optable;

use std::cell::Cell;
use std::io::{self, Read, Write};
use std::rc::Rc;

use crate::bus::MemoryMapped;
use crate::state::{self, State};
use optable::{AddrMode, CpuInstruction, Instr, INSTRUCTION_TABLE};

/// ステータスレジスタのフラグビット
pub mod flags {
    pub const CARRY: u8 = 0x01;
    pub const ZERO: u8 = 0x02;
    pub const IRQ_DISABLE: u8 = 0x04;
    pub const DECIMAL: u8 = 0x08;
    pub const BRK: u8 = 0x10;
    /// 未使用ビット（常に1）
    pub const UNUSED: u8 = 0x20;
    pub const OVERFLOW: u8 = 0x40;
    pub const NEGATIVE: u8 = 0x80;
}

/// CPUの実行コンテキスト（レジスタ一式）
#[derive(Debug, Clone, Copy)]
pub struct CpuContext {
    /// プログラムカウンタ
    pub pc: u16,
    /// アキュムレータ
    pub acc: u8,
    /// Xインデックスレジスタ
    pub x: u8,
    /// Yインデックスレジスタ
    pub y: u8,
    /// スタックポインタ
    pub sp: u8,
    /// ステータスレジスタ
    pub sr: u8,
}

impl Default for CpuContext {
    fn default() -> Self {
        CpuContext { pc: 0, acc: 0, x: 0, y: 0, sp: 0xFD, sr: flags::UNUSED }
    }
}

/// 累積サイクルカウンタ
///
/// SpeakerとDiskControllerはCPUのサイクル数だけを必要とするので、
/// CPU本体ではなくこのカウンタのクローンを渡して所有関係を単純に保つ。
pub type CycleCounter = Rc<Cell<u32>>;

/// スタックのベースアドレス
const STACK_BASE: u16 = 0x0100;

/// 6502 CPU
pub struct Cpu {
    /// 実行コンテキスト
    ctx: CpuContext,
    /// 実行中のオペコード
    cur_opcode: u8,
    /// 実行した命令数
    num_instr: u32,
    /// 累積サイクル数（Speaker・DiskControllerと共有）
    total_cycles: CycleCounter,
    /// アドレッシングモードが生成した実効アドレス
    effective_addr: u16,
    /// アドレッシングモードが解決したオペランド値
    effective_value: u8,
    /// ブレークポイントアドレス
    bp_addr: i32,
    /// ブレークポイントが有効か
    bp_enabled: bool,
}

impl Cpu {
    pub fn new(total_cycles: CycleCounter) -> Self {
        Cpu {
            ctx: CpuContext::default(),
            cur_opcode: 0,
            num_instr: 0,
            total_cycles,
            effective_addr: 0,
            effective_value: 0,
            bp_addr: 0,
            bp_enabled: false,
        }
    }

    /// 電源投入直後の状態に戻し、リセットベクタからPCを読み込む
    pub fn reset<M: MemoryMapped>(&mut self, bus: &mut M) {
        self.total_cycles.set(0);
        self.effective_addr = 0;

        self.ctx = CpuContext {
            pc: self.bus_read16(bus, 0xFFFC),
            ..CpuContext::default()
        };
    }

    /// 指定サイクル数以上実行する
    ///
    /// 最後の命令が予算を超えて消費した分（次回呼び出しへの持ち越し）を
    /// 返す。
    pub fn execute<M: MemoryMapped>(&mut self, bus: &mut M, num_cycles: u32) -> u32 {
        let starting_cycles = self.total_cycles.get();

        while self.total_cycles.get().wrapping_sub(starting_cycles) < num_cycles {
            self.single_step(bus);
        }

        self.total_cycles.get().wrapping_sub(starting_cycles) - num_cycles
    }

    /// 1命令を実行する
    pub fn single_step<M: MemoryMapped>(&mut self, bus: &mut M) {
        self.cur_opcode = bus.read(self.ctx.pc, false);
        self.ctx.pc = self.ctx.pc.wrapping_add(1);

        let entry: &'static CpuInstruction = &INSTRUCTION_TABLE[self.cur_opcode as usize];
        let crossed_page = self.run_addr_mode(entry.addr_mode, bus);
        self.run_instr(entry.instr, bus);

        self.num_instr = self.num_instr.wrapping_add(1);

        self.add_cycles(entry.cycles as u32);
        if crossed_page && entry.page_penalty {
            self.add_cycles(1);
        }
    }

    /// 累積サイクル数
    pub fn total_cycles(&self) -> u32 {
        self.total_cycles.get()
    }

    /// レジスタの現在値
    pub fn context(&self) -> CpuContext {
        self.ctx
    }

    pub fn bp_addr(&self) -> u16 {
        self.bp_addr as u16
    }

    pub fn set_bp_addr(&mut self, addr: u16) {
        self.bp_addr = addr as i32;
    }

    pub fn bp_enabled(&self) -> bool {
        self.bp_enabled
    }

    pub fn set_bp_enabled(&mut self, enabled: bool) {
        self.bp_enabled = enabled;
    }

    fn add_cycles(&self, n: u32) {
        self.total_cycles.set(self.total_cycles.get().wrapping_add(n));
    }

    /// 16ビットのバス読み取り（実際には8ビット読み取り2回）
    fn bus_read16<M: MemoryMapped>(&self, bus: &mut M, addr: u16) -> u16 {
        let low = bus.read(addr, false) as u16;
        let high = bus.read(addr.wrapping_add(1), false) as u16;
        (high << 8) | low
    }

    /// 命令の結果を格納する
    ///
    /// アキュムレータモードならアキュムレータへ、それ以外は実効アドレスへ
    /// バス経由で書き込む。
    fn save_result<M: MemoryMapped>(&mut self, bus: &mut M, result: u16) {
        if INSTRUCTION_TABLE[self.cur_opcode as usize].addr_mode == AddrMode::Accumulator {
            self.ctx.acc = result as u8;
        } else {
            bus.write(self.effective_addr, result as u8);
        }
    }

    /// フラグ値によるブランチ
    ///
    /// 分岐が成立したら1サイクル、さらにページ境界を越えたらもう1サイクル
    /// 追加する。
    fn do_branch(&mut self, flag: u8, value: u8) {
        let old_pc = self.ctx.pc;
        let mut rel = self.effective_value as u16;

        // 8ビット符号拡張
        if rel & 0x80 != 0 {
            rel |= 0xFF00;
        }

        if self.get_flag(flag) == value {
            self.ctx.pc = self.ctx.pc.wrapping_add(rel);

            if (old_pc & 0xFF00) != (self.ctx.pc & 0xFF00) {
                self.add_cycles(2);
            } else {
                self.add_cycles(1);
            }
        }
    }

    //--------------------------------------------------
    // スタック操作
    //--------------------------------------------------

    fn push8<M: MemoryMapped>(&mut self, bus: &mut M, value: u8) {
        bus.write(STACK_BASE + self.ctx.sp as u16, value);
        self.ctx.sp = self.ctx.sp.wrapping_sub(1);
    }

    /// 上位バイトをsp、下位バイトをsp-1に書いてからspを2減らす
    fn push16<M: MemoryMapped>(&mut self, bus: &mut M, value: u16) {
        bus.write(STACK_BASE + self.ctx.sp as u16, (value >> 8) as u8);
        bus.write(STACK_BASE + self.ctx.sp.wrapping_sub(1) as u16, value as u8);

        self.ctx.sp = self.ctx.sp.wrapping_sub(2);
    }

    fn pull8<M: MemoryMapped>(&mut self, bus: &mut M) -> u8 {
        self.ctx.sp = self.ctx.sp.wrapping_add(1);
        bus.read(STACK_BASE + self.ctx.sp as u16, false)
    }

    fn pull16<M: MemoryMapped>(&mut self, bus: &mut M) -> u16 {
        let low = bus.read(STACK_BASE + self.ctx.sp.wrapping_add(1) as u16, false) as u16;
        let high = bus.read(STACK_BASE + self.ctx.sp.wrapping_add(2) as u16, false) as u16;

        self.ctx.sp = self.ctx.sp.wrapping_add(2);

        (high << 8) | low
    }

    //--------------------------------------------------
    // フラグ操作
    //--------------------------------------------------

    fn get_flag(&self, flag: u8) -> u8 {
        self.ctx.sr & flag
    }

    fn set_flag(&mut self, flag: u8, value: bool) {
        if value {
            self.ctx.sr |= flag;
        } else {
            self.ctx.sr &= !flag;
        }
    }

    fn update_carry(&mut self, result: u16) {
        self.set_flag(flags::CARRY, result & 0xFF00 != 0);
    }

    fn update_zero(&mut self, result: u16) {
        self.set_flag(flags::ZERO, result & 0xFF == 0);
    }

    /// オーバーフロー判定: (result ^ acc) & (result ^ operand) & 0x80
    ///
    /// accは命令実行前の値であること。SBCはoperandに値^0xFFを渡す。
    fn update_overflow(&mut self, result: u16, operand: u8) {
        let overflow =
            (result ^ self.ctx.acc as u16) & (result ^ operand as u16) & 0x80 != 0;
        self.set_flag(flags::OVERFLOW, overflow);
    }

    fn update_negative(&mut self, result: u16) {
        self.set_flag(flags::NEGATIVE, result & 0x80 != 0);
    }

    //--------------------------------------------------
    // アドレッシングモード
    //--------------------------------------------------

    /// アドレッシングモードを実行し、実効アドレスと実効値を設定する
    ///
    /// 戻り値はページ境界を越えたかどうか。
    fn run_addr_mode<M: MemoryMapped>(&mut self, mode: AddrMode, bus: &mut M) -> bool {
        match mode {
            AddrMode::Accumulator => {
                self.effective_addr = 0;
                self.effective_value = self.ctx.acc;
                false
            }
            AddrMode::Absolute => {
                self.effective_addr = self.bus_read16(bus, self.ctx.pc);
                self.effective_value = bus.read(self.effective_addr, false);
                self.ctx.pc = self.ctx.pc.wrapping_add(2);
                false
            }
            AddrMode::AbsoluteX => {
                let base = self.bus_read16(bus, self.ctx.pc);
                self.effective_addr = base.wrapping_add(self.ctx.x as u16);
                self.effective_value = bus.read(self.effective_addr, false);
                self.ctx.pc = self.ctx.pc.wrapping_add(2);
                (base & 0xFF00) != (self.effective_addr & 0xFF00)
            }
            AddrMode::AbsoluteY => {
                let base = self.bus_read16(bus, self.ctx.pc);
                self.effective_addr = base.wrapping_add(self.ctx.y as u16);
                self.effective_value = bus.read(self.effective_addr, false);
                self.ctx.pc = self.ctx.pc.wrapping_add(2);
                (base & 0xFF00) != (self.effective_addr & 0xFF00)
            }
            AddrMode::Immediate => {
                self.effective_addr = 0;
                self.effective_value = bus.read(self.ctx.pc, false);
                self.ctx.pc = self.ctx.pc.wrapping_add(1);
                false
            }
            AddrMode::Implied => {
                self.effective_addr = 0;
                self.effective_value = 0;
                false
            }
            AddrMode::Indirect => {
                // 間接JMPのページ境界バグを再現する。ポインタの下位バイトが
                // $FFのとき、上位バイトはポインタ+1ではなく同一ページの
                // 先頭（ptr & $FF00）から読まれる。
                let ptr = self.bus_read16(bus, self.ctx.pc);
                let ptr_high = (ptr & 0xFF00) | (ptr.wrapping_add(1) & 0x00FF);
                self.effective_addr =
                    bus.read(ptr, false) as u16 | ((bus.read(ptr_high, false) as u16) << 8);
                self.effective_value = bus.read(self.effective_addr, false);
                self.ctx.pc = self.ctx.pc.wrapping_add(2);
                false
            }
            AddrMode::IndirectX => {
                let ptr = (bus.read(self.ctx.pc, false).wrapping_add(self.ctx.x)) as u16 & 0xFF;
                self.ctx.pc = self.ctx.pc.wrapping_add(1);
                self.effective_addr = bus.read(ptr, false) as u16
                    | ((bus.read(ptr.wrapping_add(1) & 0xFF, false) as u16) << 8);
                self.effective_value = bus.read(self.effective_addr, false);
                false
            }
            AddrMode::IndirectY => {
                let ptr = bus.read(self.ctx.pc, false) as u16;
                self.ctx.pc = self.ctx.pc.wrapping_add(1);
                let base = bus.read(ptr, false) as u16
                    | ((bus.read(ptr.wrapping_add(1) & 0xFF, false) as u16) << 8);
                self.effective_addr = base.wrapping_add(self.ctx.y as u16);
                self.effective_value = bus.read(self.effective_addr, false);
                (base & 0xFF00) != (self.effective_addr & 0xFF00)
            }
            AddrMode::Relative => {
                self.effective_addr = 0;
                self.effective_value = bus.read(self.ctx.pc, false);
                self.ctx.pc = self.ctx.pc.wrapping_add(1);
                false
            }
            AddrMode::ZeroPage => {
                self.effective_addr = bus.read(self.ctx.pc, false) as u16;
                self.ctx.pc = self.ctx.pc.wrapping_add(1);
                self.effective_value = bus.read(self.effective_addr, false);
                false
            }
            AddrMode::ZeroPageX => {
                self.effective_addr =
                    (bus.read(self.ctx.pc, false).wrapping_add(self.ctx.x)) as u16 & 0xFF;
                self.ctx.pc = self.ctx.pc.wrapping_add(1);
                self.effective_value = bus.read(self.effective_addr, false);
                false
            }
            AddrMode::ZeroPageY => {
                self.effective_addr =
                    (bus.read(self.ctx.pc, false).wrapping_add(self.ctx.y)) as u16 & 0xFF;
                self.ctx.pc = self.ctx.pc.wrapping_add(1);
                self.effective_value = bus.read(self.effective_addr, false);
                false
            }
        }
    }

    //--------------------------------------------------
    // 命令
    //--------------------------------------------------

    fn run_instr<M: MemoryMapped>(&mut self, instr: Instr, bus: &mut M) {
        match instr {
            Instr::Adc => self.instr_adc(),
            Instr::And => self.instr_and(),
            Instr::Asl => self.instr_asl(bus),
            Instr::Bcc => self.do_branch(flags::CARRY, 0),
            Instr::Bcs => self.do_branch(flags::CARRY, flags::CARRY),
            Instr::Beq => self.do_branch(flags::ZERO, flags::ZERO),
            Instr::Bit => self.instr_bit(),
            Instr::Bmi => self.do_branch(flags::NEGATIVE, flags::NEGATIVE),
            Instr::Bne => self.do_branch(flags::ZERO, 0),
            Instr::Bpl => self.do_branch(flags::NEGATIVE, 0),
            Instr::Brk => self.instr_brk(bus),
            Instr::Bvc => self.do_branch(flags::OVERFLOW, 0),
            Instr::Bvs => self.do_branch(flags::OVERFLOW, flags::OVERFLOW),
            Instr::Clc => self.set_flag(flags::CARRY, false),
            Instr::Cld => self.set_flag(flags::DECIMAL, false),
            Instr::Cli => self.set_flag(flags::IRQ_DISABLE, false),
            Instr::Clv => self.set_flag(flags::OVERFLOW, false),
            Instr::Cmp => self.instr_compare(self.ctx.acc),
            Instr::Cpx => self.instr_compare(self.ctx.x),
            Instr::Cpy => self.instr_compare(self.ctx.y),
            Instr::Dec => self.instr_dec(bus),
            Instr::Dex => self.instr_dex(),
            Instr::Dey => self.instr_dey(),
            Instr::Eor => self.instr_eor(),
            Instr::Inc => self.instr_inc(bus),
            Instr::Inx => self.instr_inx(),
            Instr::Iny => self.instr_iny(),
            Instr::Jmp => self.ctx.pc = self.effective_addr,
            Instr::Jsr => self.instr_jsr(bus),
            Instr::Lda => self.instr_lda(),
            Instr::Ldx => self.instr_ldx(),
            Instr::Ldy => self.instr_ldy(),
            Instr::Lsr => self.instr_lsr(bus),
            Instr::Nop => {}
            Instr::Ora => self.instr_ora(),
            Instr::Pha => self.push8(bus, self.ctx.acc),
            Instr::Php => self.push8(bus, self.ctx.sr | flags::BRK),
            Instr::Pla => self.instr_pla(bus),
            Instr::Plp => {
                let pulled = self.pull8(bus);
                self.ctx.sr = pulled | flags::UNUSED;
            }
            Instr::Rol => self.instr_rol(bus),
            Instr::Ror => self.instr_ror(bus),
            Instr::Rti => self.instr_rti(bus),
            Instr::Rts => self.ctx.pc = self.pull16(bus).wrapping_add(1),
            Instr::Sbc => self.instr_sbc(),
            Instr::Sec => self.set_flag(flags::CARRY, true),
            Instr::Sed => self.set_flag(flags::DECIMAL, true),
            Instr::Sei => self.set_flag(flags::IRQ_DISABLE, true),
            Instr::Sta => self.save_result(bus, self.ctx.acc as u16),
            Instr::Stx => self.save_result(bus, self.ctx.x as u16),
            Instr::Sty => self.save_result(bus, self.ctx.y as u16),
            Instr::Tax => self.instr_tax(),
            Instr::Tay => self.instr_tay(),
            Instr::Tsx => self.instr_tsx(),
            Instr::Txa => self.instr_txa(),
            Instr::Txs => self.ctx.sp = self.ctx.x,
            Instr::Tya => self.instr_tya(),
            Instr::Und => {
                log::debug!("undocumented opcode used: {:02X}", self.cur_opcode);
            }
        }
    }

    /// キャリー付き加算（BCDモード対応）
    fn instr_adc(&mut self) {
        let mut result = self.ctx.acc as u16
            + self.effective_value as u16
            + self.get_flag(flags::CARRY) as u16;

        self.update_carry(result);
        self.update_zero(result);
        self.update_overflow(result, self.effective_value);
        self.update_negative(result);

        if self.get_flag(flags::DECIMAL) != 0 {
            self.set_flag(flags::CARRY, false);

            if (result & 0xF) > 0x9 {
                result += 6;
            }

            if (result & 0xF0) > 0x90 {
                result += 0x60;
                self.set_flag(flags::CARRY, true);
            }

            // BCDモードは1サイクル追加
            self.add_cycles(1);
        }

        self.ctx.acc = result as u8;
    }

    fn instr_and(&mut self) {
        let result = (self.ctx.acc & self.effective_value) as u16;

        self.update_zero(result);
        self.update_negative(result);

        self.ctx.acc = result as u8;
    }

    fn instr_asl<M: MemoryMapped>(&mut self, bus: &mut M) {
        let result = (self.effective_value as u16) << 1;

        self.update_carry(result);
        self.update_zero(result);
        self.update_negative(result);

        self.save_result(bus, result);
    }

    fn instr_bit(&mut self) {
        let result = (self.ctx.acc & self.effective_value) as u16;

        self.update_zero(result);
        self.set_flag(flags::OVERFLOW, self.effective_value & flags::OVERFLOW != 0);
        self.set_flag(flags::NEGATIVE, self.effective_value & flags::NEGATIVE != 0);
    }

    /// ソフトウェア割り込み
    fn instr_brk<M: MemoryMapped>(&mut self, bus: &mut M) {
        self.ctx.pc = self.ctx.pc.wrapping_add(1);

        let pc = self.ctx.pc;
        let sr = self.ctx.sr;
        self.push16(bus, pc);
        self.push8(bus, sr | flags::BRK);

        self.set_flag(flags::IRQ_DISABLE, true);

        self.ctx.pc = self.bus_read16(bus, 0xFFFE);
    }

    /// CMP/CPX/CPY共通の比較
    fn instr_compare(&mut self, register: u8) {
        self.update_negative(register.wrapping_sub(self.effective_value) as u16);
        self.set_flag(flags::CARRY, register >= self.effective_value);
        self.set_flag(flags::ZERO, register == self.effective_value);
    }

    fn instr_dec<M: MemoryMapped>(&mut self, bus: &mut M) {
        let result = (self.effective_value.wrapping_sub(1)) as u16;

        self.update_zero(result);
        self.update_negative(result);

        self.save_result(bus, result);
    }

    fn instr_dex(&mut self) {
        self.ctx.x = self.ctx.x.wrapping_sub(1);

        self.update_zero(self.ctx.x as u16);
        self.update_negative(self.ctx.x as u16);
    }

    fn instr_dey(&mut self) {
        self.ctx.y = self.ctx.y.wrapping_sub(1);

        self.update_zero(self.ctx.y as u16);
        self.update_negative(self.ctx.y as u16);
    }

    fn instr_eor(&mut self) {
        let result = (self.ctx.acc ^ self.effective_value) as u16;

        self.update_zero(result);
        self.update_negative(result);

        self.ctx.acc = result as u8;
    }

    fn instr_inc<M: MemoryMapped>(&mut self, bus: &mut M) {
        let result = (self.effective_value.wrapping_add(1)) as u16;

        self.update_zero(result);
        self.update_negative(result);

        self.save_result(bus, result);
    }

    fn instr_inx(&mut self) {
        self.ctx.x = self.ctx.x.wrapping_add(1);

        self.update_zero(self.ctx.x as u16);
        self.update_negative(self.ctx.x as u16);
    }

    fn instr_iny(&mut self) {
        self.ctx.y = self.ctx.y.wrapping_add(1);

        self.update_zero(self.ctx.y as u16);
        self.update_negative(self.ctx.y as u16);
    }

    /// サブルーチンへジャンプ（戻り番地-1をプッシュ）
    fn instr_jsr<M: MemoryMapped>(&mut self, bus: &mut M) {
        let ret = self.ctx.pc.wrapping_sub(1);
        self.push16(bus, ret);
        self.ctx.pc = self.effective_addr;
    }

    fn instr_lda(&mut self) {
        self.ctx.acc = self.effective_value;

        self.update_zero(self.ctx.acc as u16);
        self.update_negative(self.ctx.acc as u16);
    }

    fn instr_ldx(&mut self) {
        self.ctx.x = self.effective_value;

        self.update_zero(self.ctx.x as u16);
        self.update_negative(self.ctx.x as u16);
    }

    fn instr_ldy(&mut self) {
        self.ctx.y = self.effective_value;

        self.update_zero(self.ctx.y as u16);
        self.update_negative(self.ctx.y as u16);
    }

    fn instr_lsr<M: MemoryMapped>(&mut self, bus: &mut M) {
        let result = (self.effective_value >> 1) as u16;

        self.set_flag(flags::CARRY, self.effective_value & 1 != 0);
        self.update_zero(result);
        self.update_negative(result);

        self.save_result(bus, result);
    }

    fn instr_ora(&mut self) {
        let result = (self.ctx.acc | self.effective_value) as u16;

        self.update_zero(result);
        self.update_negative(result);

        self.ctx.acc = result as u8;
    }

    fn instr_pla<M: MemoryMapped>(&mut self, bus: &mut M) {
        self.ctx.acc = self.pull8(bus);

        self.update_zero(self.ctx.acc as u16);
        self.update_negative(self.ctx.acc as u16);
    }

    fn instr_rol<M: MemoryMapped>(&mut self, bus: &mut M) {
        let result = ((self.effective_value as u16) << 1) | self.get_flag(flags::CARRY) as u16;

        self.update_carry(result);
        self.update_zero(result);
        self.update_negative(result);

        self.save_result(bus, result);
    }

    fn instr_ror<M: MemoryMapped>(&mut self, bus: &mut M) {
        let result =
            ((self.effective_value >> 1) | (self.get_flag(flags::CARRY) << 7)) as u16;

        self.set_flag(flags::CARRY, self.effective_value & 1 != 0);
        self.update_zero(result);
        self.update_negative(result);

        self.save_result(bus, result);
    }

    fn instr_rti<M: MemoryMapped>(&mut self, bus: &mut M) {
        let pulled = self.pull8(bus);
        self.ctx.sr = pulled | flags::UNUSED;
        self.ctx.pc = self.pull16(bus);
    }

    /// ボロー付き減算（BCDモード対応）
    ///
    /// BCD補正はリファレンス実装の-0x66方式をそのまま使う。既存のApple II
    /// ソフトウェアの観測可能な挙動を優先する。
    fn instr_sbc(&mut self) {
        let mut result = self.ctx.acc as u16
            + (self.effective_value ^ 0xFF) as u16
            + self.get_flag(flags::CARRY) as u16;

        self.update_carry(result);
        self.update_zero(result);
        self.update_overflow(result, self.effective_value ^ 0xFF);
        self.update_negative(result);

        if self.get_flag(flags::DECIMAL) != 0 {
            self.set_flag(flags::CARRY, false);

            result = result.wrapping_sub(0x66);
            if (result & 0xF) > 0x9 {
                result += 6;
            }

            if (result & 0xF0) > 0x90 {
                result += 0x60;
                self.set_flag(flags::CARRY, true);
            }

            // BCDモードは1サイクル追加
            self.add_cycles(1);
        }

        self.ctx.acc = result as u8;
    }

    fn instr_tax(&mut self) {
        self.ctx.x = self.ctx.acc;

        self.update_zero(self.ctx.x as u16);
        self.update_negative(self.ctx.x as u16);
    }

    fn instr_tay(&mut self) {
        self.ctx.y = self.ctx.acc;

        self.update_zero(self.ctx.y as u16);
        self.update_negative(self.ctx.y as u16);
    }

    fn instr_tsx(&mut self) {
        self.ctx.x = self.ctx.sp;

        self.update_zero(self.ctx.x as u16);
        self.update_negative(self.ctx.x as u16);
    }

    fn instr_txa(&mut self) {
        self.ctx.acc = self.ctx.x;

        self.update_zero(self.ctx.acc as u16);
        self.update_negative(self.ctx.acc as u16);
    }

    fn instr_tya(&mut self) {
        self.ctx.acc = self.ctx.y;

        self.update_zero(self.ctx.acc as u16);
        self.update_negative(self.ctx.acc as u16);
    }
}

impl State for Cpu {
    fn save_state(&self, output: &mut dyn Write) -> io::Result<()> {
        state::write_u16(output, self.ctx.pc)?;
        state::write_u8(output, self.ctx.acc)?;
        state::write_u8(output, self.ctx.x)?;
        state::write_u8(output, self.ctx.y)?;
        state::write_u8(output, self.ctx.sp)?;
        state::write_u8(output, self.ctx.sr)?;
        state::write_u32(output, self.num_instr)?;
        state::write_u32(output, self.total_cycles.get())?;
        state::write_u16(output, self.effective_addr)?;
        state::write_u8(output, self.cur_opcode)?;
        state::write_i32(output, self.bp_addr)?;
        state::write_bool(output, self.bp_enabled)
    }

    fn load_state(&mut self, input: &mut dyn Read) -> io::Result<()> {
        self.ctx.pc = state::read_u16(input)?;
        self.ctx.acc = state::read_u8(input)?;
        self.ctx.x = state::read_u8(input)?;
        self.ctx.y = state::read_u8(input)?;
        self.ctx.sp = state::read_u8(input)?;
        self.ctx.sr = state::read_u8(input)?;
        self.num_instr = state::read_u32(input)?;
        self.total_cycles.set(state::read_u32(input)?);
        self.effective_addr = state::read_u16(input)?;
        self.cur_opcode = state::read_u8(input)?;
        self.bp_addr = state::read_i32(input)?;
        self.bp_enabled = state::read_bool(input)?;
        Ok(())
    }
}

//! 6502 命令デコードテーブル
//!
//! オペコード1バイトごとに、ニーモニック・アドレッシングモード・命令・
//! ページ境界ペナルティの有無・基本サイクル数・命令長を静的に持つ。
//! 未定義オペコードは2サイクルのUNDエントリになっている。

/// アドレッシングモードの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddrMode {
    /// アキュムレータ
    Accumulator,
    /// 絶対 - $nnnn
    Absolute,
    /// 絶対,X - $nnnn,X
    AbsoluteX,
    /// 絶対,Y - $nnnn,Y
    AbsoluteY,
    /// 即値 - #$nn
    Immediate,
    /// 暗黙
    Implied,
    /// 間接 - ($nnnn)（JMP専用、ページ境界バグあり）
    Indirect,
    /// 間接,X（プリインデックス） - ($nn,X)
    IndirectX,
    /// 間接,Y（ポストインデックス） - ($nn),Y
    IndirectY,
    /// 相対（ブランチ命令用）
    Relative,
    /// ゼロページ - $nn
    ZeroPage,
    /// ゼロページ,X - $nn,X
    ZeroPageX,
    /// ゼロページ,Y - $nn,Y
    ZeroPageY,
}

/// 命令の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instr {
    Adc, And, Asl, Bcc, Bcs, Beq, Bit, Bmi, Bne, Bpl, Brk, Bvc, Bvs,
    Clc, Cld, Cli, Clv, Cmp, Cpx, Cpy, Dec, Dex, Dey, Eor, Inc, Inx,
    Iny, Jmp, Jsr, Lda, Ldx, Ldy, Lsr, Nop, Ora, Pha, Php, Pla, Plp,
    Rol, Ror, Rti, Rts, Sbc, Sec, Sed, Sei, Sta, Stx, Sty, Tax, Tay,
    Tsx, Txa, Txs, Tya,
    /// 未定義オペコード（2サイクルのNOPとして動く）
    Und,
}

/// デコードテーブルの1エントリ
pub struct CpuInstruction {
    /// 3文字のニーモニック
    pub mnemonic: &'static str,
    /// アドレッシングモード
    pub addr_mode: AddrMode,
    /// 命令本体
    pub instr: Instr,
    /// ページ境界を越えると1サイクル追加される
    pub page_penalty: bool,
    /// 基本サイクル数（ページ境界の追加分は含まない）
    pub cycles: u8,
    /// 命令長（オペコードを含むバイト数）
    pub size: u8,
}

const fn op(
    mnemonic: &'static str,
    addr_mode: AddrMode,
    instr: Instr,
    page_penalty: bool,
    cycles: u8,
    size: u8,
) -> CpuInstruction {
    CpuInstruction { mnemonic, addr_mode, instr, page_penalty, cycles, size }
}

use AddrMode::*;
use Instr::*;

/// CPU命令テーブル（全256命令）
pub static INSTRUCTION_TABLE: [CpuInstruction; 256] = [
    /* 00 */ op("BRK", Implied, Brk, false, 7, 1),
    /* 01 */ op("ORA", IndirectX, Ora, false, 6, 2),
    /* 02 */ op("UND", Implied, Und, false, 2, 1),
    /* 03 */ op("UND", Implied, Und, false, 2, 1),
    /* 04 */ op("UND", Implied, Und, false, 2, 1),
    /* 05 */ op("ORA", ZeroPage, Ora, false, 3, 2),
    /* 06 */ op("ASL", ZeroPage, Asl, false, 5, 2),
    /* 07 */ op("UND", Implied, Und, false, 2, 1),
    /* 08 */ op("PHP", Implied, Php, false, 3, 1),
    /* 09 */ op("ORA", Immediate, Ora, false, 2, 2),
    /* 0A */ op("ASL", Accumulator, Asl, false, 2, 1),
    /* 0B */ op("UND", Implied, Und, false, 2, 1),
    /* 0C */ op("UND", Implied, Und, false, 2, 1),
    /* 0D */ op("ORA", Absolute, Ora, false, 4, 3),
    /* 0E */ op("ASL", Absolute, Asl, false, 6, 3),
    /* 0F */ op("UND", Implied, Und, false, 2, 1),
    /* 10 */ op("BPL", Relative, Bpl, true, 2, 2),
    /* 11 */ op("ORA", IndirectY, Ora, true, 5, 2),
    /* 12 */ op("UND", Implied, Und, false, 2, 1),
    /* 13 */ op("UND", Implied, Und, false, 2, 1),
    /* 14 */ op("UND", Implied, Und, false, 2, 1),
    /* 15 */ op("ORA", ZeroPageX, Ora, false, 4, 2),
    /* 16 */ op("ASL", ZeroPageX, Asl, false, 6, 2),
    /* 17 */ op("UND", Implied, Und, false, 2, 1),
    /* 18 */ op("CLC", Implied, Clc, false, 2, 1),
    /* 19 */ op("ORA", AbsoluteY, Ora, true, 4, 3),
    /* 1A */ op("UND", Implied, Und, false, 2, 1),
    /* 1B */ op("UND", Implied, Und, false, 2, 1),
    /* 1C */ op("UND", Implied, Und, false, 2, 1),
    /* 1D */ op("ORA", AbsoluteX, Ora, true, 4, 3),
    /* 1E */ op("ASL", AbsoluteX, Asl, false, 7, 3),
    /* 1F */ op("UND", Implied, Und, false, 2, 1),
    /* 20 */ op("JSR", Absolute, Jsr, false, 6, 3),
    /* 21 */ op("AND", IndirectX, And, false, 6, 2),
    /* 22 */ op("UND", Implied, Und, false, 2, 1),
    /* 23 */ op("UND", Implied, Und, false, 2, 1),
    /* 24 */ op("BIT", ZeroPage, Bit, false, 3, 2),
    /* 25 */ op("AND", ZeroPage, And, false, 3, 2),
    /* 26 */ op("ROL", ZeroPage, Rol, false, 5, 2),
    /* 27 */ op("UND", Implied, Und, false, 2, 1),
    /* 28 */ op("PLP", Implied, Plp, false, 4, 1),
    /* 29 */ op("AND", Immediate, And, false, 2, 2),
    /* 2A */ op("ROL", Accumulator, Rol, false, 2, 1),
    /* 2B */ op("UND", Implied, Und, false, 2, 1),
    /* 2C */ op("BIT", Absolute, Bit, false, 4, 3),
    /* 2D */ op("AND", Absolute, And, false, 4, 3),
    /* 2E */ op("ROL", Absolute, Rol, false, 6, 3),
    /* 2F */ op("UND", Implied, Und, false, 2, 1),
    /* 30 */ op("BMI", Relative, Bmi, true, 2, 2),
    /* 31 */ op("AND", IndirectY, And, true, 5, 2),
    /* 32 */ op("UND", Implied, Und, false, 2, 1),
    /* 33 */ op("UND", Implied, Und, false, 2, 1),
    /* 34 */ op("UND", Implied, Und, false, 2, 1),
    /* 35 */ op("AND", ZeroPageX, And, false, 4, 2),
    /* 36 */ op("ROL", ZeroPageX, Rol, false, 6, 2),
    /* 37 */ op("UND", Implied, Und, false, 2, 1),
    /* 38 */ op("SEC", Implied, Sec, false, 2, 1),
    /* 39 */ op("AND", AbsoluteY, And, true, 4, 3),
    /* 3A */ op("UND", Implied, Und, false, 2, 1),
    /* 3B */ op("UND", Implied, Und, false, 2, 1),
    /* 3C */ op("UND", Implied, Und, false, 2, 1),
    /* 3D */ op("AND", AbsoluteX, And, true, 4, 3),
    /* 3E */ op("ROL", AbsoluteX, Rol, false, 7, 3),
    /* 3F */ op("UND", Implied, Und, false, 2, 1),
    /* 40 */ op("RTI", Implied, Rti, false, 6, 1),
    /* 41 */ op("EOR", IndirectX, Eor, false, 6, 2),
    /* 42 */ op("UND", Implied, Und, false, 2, 1),
    /* 43 */ op("UND", Implied, Und, false, 2, 1),
    /* 44 */ op("UND", Implied, Und, false, 2, 1),
    /* 45 */ op("EOR", ZeroPage, Eor, false, 3, 2),
    /* 46 */ op("LSR", ZeroPage, Lsr, false, 5, 2),
    /* 47 */ op("UND", Implied, Und, false, 2, 1),
    /* 48 */ op("PHA", Implied, Pha, false, 3, 1),
    /* 49 */ op("EOR", Immediate, Eor, false, 2, 2),
    /* 4A */ op("LSR", Accumulator, Lsr, false, 2, 1),
    /* 4B */ op("UND", Implied, Und, false, 2, 1),
    /* 4C */ op("JMP", Absolute, Jmp, false, 3, 3),
    /* 4D */ op("EOR", Absolute, Eor, false, 4, 3),
    /* 4E */ op("LSR", Absolute, Lsr, false, 6, 3),
    /* 4F */ op("UND", Implied, Und, false, 2, 1),
    /* 50 */ op("BVC", Relative, Bvc, true, 2, 2),
    /* 51 */ op("EOR", IndirectY, Eor, true, 5, 2),
    /* 52 */ op("UND", Implied, Und, false, 2, 1),
    /* 53 */ op("UND", Implied, Und, false, 2, 1),
    /* 54 */ op("UND", Implied, Und, false, 2, 1),
    /* 55 */ op("EOR", ZeroPageX, Eor, false, 4, 2),
    /* 56 */ op("LSR", ZeroPageX, Lsr, false, 6, 2),
    /* 57 */ op("UND", Implied, Und, false, 2, 1),
    /* 58 */ op("CLI", Implied, Cli, false, 2, 1),
    /* 59 */ op("EOR", AbsoluteY, Eor, true, 4, 3),
    /* 5A */ op("UND", Implied, Und, false, 2, 1),
    /* 5B */ op("UND", Implied, Und, false, 2, 1),
    /* 5C */ op("UND", Implied, Und, false, 2, 1),
    /* 5D */ op("EOR", AbsoluteX, Eor, true, 4, 3),
    /* 5E */ op("LSR", AbsoluteX, Lsr, false, 7, 3),
    /* 5F */ op("UND", Implied, Und, false, 2, 1),
    /* 60 */ op("RTS", Implied, Rts, false, 6, 1),
    /* 61 */ op("ADC", IndirectX, Adc, false, 6, 2),
    /* 62 */ op("UND", Implied, Und, false, 2, 1),
    /* 63 */ op("UND", Implied, Und, false, 2, 1),
    /* 64 */ op("UND", Implied, Und, false, 2, 1),
    /* 65 */ op("ADC", ZeroPage, Adc, false, 3, 2),
    /* 66 */ op("ROR", ZeroPage, Ror, false, 5, 2),
    /* 67 */ op("UND", Implied, Und, false, 2, 1),
    /* 68 */ op("PLA", Implied, Pla, false, 4, 1),
    /* 69 */ op("ADC", Immediate, Adc, false, 2, 2),
    /* 6A */ op("ROR", Accumulator, Ror, false, 2, 1),
    /* 6B */ op("UND", Implied, Und, false, 2, 1),
    /* 6C */ op("JMP", Indirect, Jmp, false, 5, 3),
    /* 6D */ op("ADC", Absolute, Adc, false, 4, 3),
    /* 6E */ op("ROR", Absolute, Ror, false, 6, 3),
    /* 6F */ op("UND", Implied, Und, false, 2, 1),
    /* 70 */ op("BVS", Relative, Bvs, true, 2, 2),
    /* 71 */ op("ADC", IndirectY, Adc, true, 5, 2),
    /* 72 */ op("UND", Implied, Und, false, 2, 1),
    /* 73 */ op("UND", Implied, Und, false, 2, 1),
    /* 74 */ op("UND", Implied, Und, false, 2, 1),
    /* 75 */ op("ADC", ZeroPageX, Adc, false, 4, 2),
    /* 76 */ op("ROR", ZeroPageX, Ror, false, 6, 2),
    /* 77 */ op("UND", Implied, Und, false, 2, 1),
    /* 78 */ op("SEI", Implied, Sei, false, 2, 1),
    /* 79 */ op("ADC", AbsoluteY, Adc, true, 4, 3),
    /* 7A */ op("UND", Implied, Und, false, 2, 1),
    /* 7B */ op("UND", Implied, Und, false, 2, 1),
    /* 7C */ op("UND", Implied, Und, false, 2, 1),
    /* 7D */ op("ADC", AbsoluteX, Adc, true, 4, 3),
    /* 7E */ op("ROR", AbsoluteX, Ror, false, 7, 3),
    /* 7F */ op("UND", Implied, Und, false, 2, 1),
    /* 80 */ op("UND", Implied, Und, false, 2, 1),
    /* 81 */ op("STA", IndirectX, Sta, false, 6, 2),
    /* 82 */ op("UND", Implied, Und, false, 2, 1),
    /* 83 */ op("UND", Implied, Und, false, 2, 1),
    /* 84 */ op("STY", ZeroPage, Sty, false, 3, 2),
    /* 85 */ op("STA", ZeroPage, Sta, false, 3, 2),
    /* 86 */ op("STX", ZeroPage, Stx, false, 3, 2),
    /* 87 */ op("UND", Implied, Und, false, 2, 1),
    /* 88 */ op("DEY", Implied, Dey, false, 2, 1),
    /* 89 */ op("UND", Implied, Und, false, 2, 1),
    /* 8A */ op("TXA", Implied, Txa, false, 2, 1),
    /* 8B */ op("UND", Implied, Und, false, 2, 1),
    /* 8C */ op("STY", Absolute, Sty, false, 4, 3),
    /* 8D */ op("STA", Absolute, Sta, false, 4, 3),
    /* 8E */ op("STX", Absolute, Stx, false, 4, 3),
    /* 8F */ op("UND", Implied, Und, false, 2, 1),
    /* 90 */ op("BCC", Relative, Bcc, true, 2, 2),
    /* 91 */ op("STA", IndirectY, Sta, false, 6, 2),
    /* 92 */ op("UND", Implied, Und, false, 2, 1),
    /* 93 */ op("UND", Implied, Und, false, 2, 1),
    /* 94 */ op("STY", ZeroPageX, Sty, false, 4, 2),
    /* 95 */ op("STA", ZeroPageX, Sta, false, 4, 2),
    /* 96 */ op("STX", ZeroPageY, Stx, false, 4, 2),
    /* 97 */ op("UND", Implied, Und, false, 2, 1),
    /* 98 */ op("TYA", Implied, Tya, false, 2, 1),
    /* 99 */ op("STA", AbsoluteY, Sta, false, 5, 3),
    /* 9A */ op("TXS", Implied, Txs, false, 2, 1),
    /* 9B */ op("UND", Implied, Und, false, 2, 1),
    /* 9C */ op("UND", Implied, Und, false, 2, 1),
    /* 9D */ op("STA", AbsoluteX, Sta, false, 5, 3),
    /* 9E */ op("UND", Implied, Und, false, 2, 1),
    /* 9F */ op("UND", Implied, Und, false, 2, 1),
    /* A0 */ op("LDY", Immediate, Ldy, false, 2, 2),
    /* A1 */ op("LDA", IndirectX, Lda, false, 6, 2),
    /* A2 */ op("LDX", Immediate, Ldx, false, 2, 2),
    /* A3 */ op("UND", Implied, Und, false, 2, 1),
    /* A4 */ op("LDY", ZeroPage, Ldy, false, 3, 2),
    /* A5 */ op("LDA", ZeroPage, Lda, false, 3, 2),
    /* A6 */ op("LDX", ZeroPage, Ldx, false, 3, 2),
    /* A7 */ op("UND", Implied, Und, false, 2, 1),
    /* A8 */ op("TAY", Implied, Tay, false, 2, 1),
    /* A9 */ op("LDA", Immediate, Lda, false, 2, 2),
    /* AA */ op("TAX", Implied, Tax, false, 2, 1),
    /* AB */ op("UND", Implied, Und, false, 2, 1),
    /* AC */ op("LDY", Absolute, Ldy, false, 4, 3),
    /* AD */ op("LDA", Absolute, Lda, false, 4, 3),
    /* AE */ op("LDX", Absolute, Ldx, false, 4, 3),
    /* AF */ op("UND", Implied, Und, false, 2, 1),
    /* B0 */ op("BCS", Relative, Bcs, true, 2, 2),
    /* B1 */ op("LDA", IndirectY, Lda, true, 5, 2),
    /* B2 */ op("UND", Implied, Und, false, 2, 1),
    /* B3 */ op("UND", Implied, Und, false, 2, 1),
    /* B4 */ op("LDY", ZeroPageX, Ldy, false, 4, 2),
    /* B5 */ op("LDA", ZeroPageX, Lda, false, 4, 2),
    /* B6 */ op("LDX", ZeroPageY, Ldx, false, 4, 2),
    /* B7 */ op("UND", Implied, Und, false, 2, 1),
    /* B8 */ op("CLV", Implied, Clv, false, 2, 1),
    /* B9 */ op("LDA", AbsoluteY, Lda, true, 4, 3),
    /* BA */ op("TSX", Implied, Tsx, false, 2, 1),
    /* BB */ op("UND", Implied, Und, false, 2, 1),
    /* BC */ op("LDY", AbsoluteX, Ldy, true, 4, 3),
    /* BD */ op("LDA", AbsoluteX, Lda, true, 4, 3),
    /* BE */ op("LDX", AbsoluteY, Ldx, true, 4, 3),
    /* BF */ op("UND", Implied, Und, false, 2, 1),
    /* C0 */ op("CPY", Immediate, Cpy, false, 2, 2),
    /* C1 */ op("CMP", IndirectX, Cmp, false, 6, 2),
    /* C2 */ op("UND", Implied, Und, false, 2, 1),
    /* C3 */ op("UND", Implied, Und, false, 2, 1),
    /* C4 */ op("CPY", ZeroPage, Cpy, false, 3, 2),
    /* C5 */ op("CMP", ZeroPage, Cmp, false, 3, 2),
    /* C6 */ op("DEC", ZeroPage, Dec, false, 5, 2),
    /* C7 */ op("UND", Implied, Und, false, 2, 1),
    /* C8 */ op("INY", Implied, Iny, false, 2, 1),
    /* C9 */ op("CMP", Immediate, Cmp, false, 2, 2),
    /* CA */ op("DEX", Implied, Dex, false, 2, 1),
    /* CB */ op("UND", Implied, Und, false, 2, 1),
    /* CC */ op("CPY", Absolute, Cpy, false, 4, 3),
    /* CD */ op("CMP", Absolute, Cmp, false, 4, 3),
    /* CE */ op("DEC", Absolute, Dec, false, 6, 3),
    /* CF */ op("UND", Implied, Und, false, 2, 1),
    /* D0 */ op("BNE", Relative, Bne, true, 2, 2),
    /* D1 */ op("CMP", IndirectY, Cmp, true, 5, 2),
    /* D2 */ op("UND", Implied, Und, false, 2, 1),
    /* D3 */ op("UND", Implied, Und, false, 2, 1),
    /* D4 */ op("UND", Implied, Und, false, 2, 1),
    /* D5 */ op("CMP", ZeroPageX, Cmp, false, 4, 2),
    /* D6 */ op("DEC", ZeroPageX, Dec, false, 6, 2),
    /* D7 */ op("UND", Implied, Und, false, 2, 1),
    /* D8 */ op("CLD", Implied, Cld, false, 2, 1),
    /* D9 */ op("CMP", AbsoluteY, Cmp, true, 4, 3),
    /* DA */ op("UND", Implied, Und, false, 2, 1),
    /* DB */ op("UND", Implied, Und, false, 2, 1),
    /* DC */ op("UND", Implied, Und, false, 2, 1),
    /* DD */ op("CMP", AbsoluteX, Cmp, true, 4, 3),
    /* DE */ op("DEC", AbsoluteX, Dec, false, 7, 3),
    /* DF */ op("UND", Implied, Und, false, 2, 1),
    /* E0 */ op("CPX", Immediate, Cpx, false, 2, 2),
    /* E1 */ op("SBC", IndirectX, Sbc, false, 6, 2),
    /* E2 */ op("UND", Implied, Und, false, 2, 1),
    /* E3 */ op("UND", Implied, Und, false, 2, 1),
    /* E4 */ op("CPX", ZeroPage, Cpx, false, 3, 2),
    /* E5 */ op("SBC", ZeroPage, Sbc, false, 3, 2),
    /* E6 */ op("INC", ZeroPage, Inc, false, 5, 2),
    /* E7 */ op("UND", Implied, Und, false, 2, 1),
    /* E8 */ op("INX", Implied, Inx, false, 2, 1),
    /* E9 */ op("SBC", Immediate, Sbc, false, 2, 2),
    /* EA */ op("NOP", Implied, Nop, false, 2, 1),
    /* EB */ op("UND", Implied, Und, false, 2, 1),
    /* EC */ op("CPX", Absolute, Cpx, false, 4, 3),
    /* ED */ op("SBC", Absolute, Sbc, false, 4, 3),
    /* EE */ op("INC", Absolute, Inc, false, 6, 3),
    /* EF */ op("UND", Implied, Und, false, 2, 1),
    /* F0 */ op("BEQ", Relative, Beq, true, 2, 2),
    /* F1 */ op("SBC", IndirectY, Sbc, true, 5, 2),
    /* F2 */ op("UND", Implied, Und, false, 2, 1),
    /* F3 */ op("UND", Implied, Und, false, 2, 1),
    /* F4 */ op("UND", Implied, Und, false, 2, 1),
    /* F5 */ op("SBC", ZeroPageX, Sbc, false, 4, 2),
    /* F6 */ op("INC", ZeroPageX, Inc, false, 6, 2),
    /* F7 */ op("UND", Implied, Und, false, 2, 1),
    /* F8 */ op("SED", Implied, Sed, false, 2, 1),
    /* F9 */ op("SBC", AbsoluteY, Sbc, true, 4, 3),
    /* FA */ op("UND", Implied, Und, false, 2, 1),
    /* FB */ op("UND", Implied, Und, false, 2, 1),
    /* FC */ op("UND", Implied, Und, false, 2, 1),
    /* FD */ op("SBC", AbsoluteX, Sbc, true, 4, 3),
    /* FE */ op("INC", AbsoluteX, Inc, false, 7, 3),
    /* FF */ op("UND", Implied, Und, false, 2, 1),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_has_256_entries() {
        assert_eq!(INSTRUCTION_TABLE.len(), 256);
    }

    #[test]
    fn test_every_entry_has_nonzero_cycles_and_size() {
        for (opcode, entry) in INSTRUCTION_TABLE.iter().enumerate() {
            assert!(entry.cycles > 0, "opcode {:02X} has zero cycles", opcode);
            assert!(entry.size > 0, "opcode {:02X} has zero size", opcode);
        }
    }

    #[test]
    fn test_undocumented_entries_are_two_cycle_implied() {
        for entry in INSTRUCTION_TABLE.iter().filter(|e| e.instr == Instr::Und) {
            assert_eq!(entry.mnemonic, "UND");
            assert_eq!(entry.addr_mode, AddrMode::Implied);
            assert_eq!(entry.cycles, 2);
            assert_eq!(entry.size, 1);
            assert!(!entry.page_penalty);
        }
    }

    #[test]
    fn test_page_penalty_only_on_read_and_branch_ops() {
        // ストアとRMWはペナルティなし
        for opcode in [0x9Du8, 0x99, 0x91, 0x1E, 0x3E, 0x5E, 0x7E, 0xDE, 0xFE] {
            assert!(!INSTRUCTION_TABLE[opcode as usize].page_penalty);
        }
        for opcode in [0xBDu8, 0xB9, 0xB1, 0xBC, 0xBE, 0xD0, 0xF0, 0x90, 0xB0] {
            assert!(INSTRUCTION_TABLE[opcode as usize].page_penalty);
        }
    }
}

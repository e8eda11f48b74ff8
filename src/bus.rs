//! システムバス
//!
//! CPUの読み書き要求をアドレス範囲で登録されたデバイスへ振り分ける。
//! どのデバイスにもマップされていないアドレスの読み取りは0x00を返し、
//! 書き込みは黙って捨てられる。

use std::cell::RefCell;
use std::rc::Rc;

/// メモリマップドデバイスの共通インターフェース
///
/// `no_side_fx`がtrueの読み取りでは、デバイスは観測可能な状態を変化させては
/// ならない（メモリダンプや逆アセンブル表示から使われる）。
pub trait MemoryMapped {
    /// アドレスから1バイト読み取る
    fn read(&mut self, addr: u16, no_side_fx: bool) -> u8;
    /// アドレスに1バイト書き込む
    fn write(&mut self, addr: u16, data: u8);
}

/// デバイスハンドル（所有権はエミュレータコア側にある）
pub type DeviceHandle = Rc<RefCell<dyn MemoryMapped>>;

/// アドレス範囲とデバイスの対応
///
/// 範囲は両端を含む。同じデバイスを複数の範囲に登録してもよい
/// （Disk IIのレジスタとブートROMなど）。
struct MemoryRegion {
    start: u16,
    end: u16,
    device: DeviceHandle,
}

/// システムバス
///
/// 登録順にデバイスを検索し、最初にアドレスを含む範囲が要求を処理する。
/// 範囲の重複チェックは行わない。頻繁にアクセスされるデバイスを先に
/// 登録すると検索が速くなる。
#[derive(Default)]
pub struct SystemBus {
    regions: Vec<MemoryRegion>,
}

impl SystemBus {
    pub fn new() -> Self {
        SystemBus { regions: Vec::new() }
    }

    /// デバイスをアドレス範囲に登録する
    pub fn register(&mut self, start: u16, end: u16, device: DeviceHandle) {
        self.regions.push(MemoryRegion { start, end, device });
    }

    fn find(&self, addr: u16) -> Option<&MemoryRegion> {
        self.regions
            .iter()
            .find(|region| addr >= region.start && addr <= region.end)
    }
}

impl MemoryMapped for SystemBus {
    fn read(&mut self, addr: u16, no_side_fx: bool) -> u8 {
        match self.find(addr) {
            Some(region) => region.device.borrow_mut().read(addr, no_side_fx),
            None => 0x00,
        }
    }

    fn write(&mut self, addr: u16, data: u8) {
        if let Some(region) = self.find(addr) {
            region.device.borrow_mut().write(addr, data);
        }
    }
}

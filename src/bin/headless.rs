//! ヘッドレス実行ツール
//!
//! GUIなしでROM（と任意のディスクイメージ）をロードして指定フレーム数を
//! 実行し、テキスト画面をASCIIでダンプする。動作確認とデバッグ用。
//!
//! 実行例:
//! cargo run --bin headless -- --rom roms/apple2plus.rom --frames 120

use std::fs;
use std::process;

use clap::Parser;

use a2core::apple2::Apple2;
use a2core::disk::DriveId;

#[derive(Parser)]
#[command(name = "headless")]
#[command(about = "Run the Apple II+ core without a GUI", long_about = None)]
struct Args {
    /// Applesoft ROMファイル（12KB）
    #[arg(short, long)]
    rom: String,

    /// ディスクイメージファイル（ドライブ0、143360バイト）
    #[arg(short, long)]
    disk: Option<String>,

    /// 実行するフレーム数（60fps換算）
    #[arg(short, long, default_value = "60")]
    frames: u32,

    /// フレームごとにCPUレジスタを表示
    #[arg(long)]
    trace: bool,
}

/// テキストページ1をASCIIへ変換して表示する
fn dump_text_screen(core: &mut Apple2) {
    for row in 0u16..24 {
        let offset = 0x28 * (row / 8) + 0x80 * (row % 8);
        let bytes = core.dump_memory(0x0400 + offset, 0x0400 + offset + 39);
        let line: String = bytes
            .iter()
            .map(|&ch| {
                let ascii = ch & 0x7F;
                if (0x20..0x7F).contains(&ascii) {
                    ascii as char
                } else {
                    ' '
                }
            })
            .collect();
        println!("|{}|", line);
    }
}

fn main() {
    env_logger::init();

    let args = Args::parse();

    let mut core = Apple2::new();

    let rom_data = match fs::read(&args.rom) {
        Ok(data) => data,
        Err(err) => {
            eprintln!("failed to read ROM {}: {}", args.rom, err);
            process::exit(1);
        }
    };
    if let Err(err) = core.load_rom(&rom_data) {
        eprintln!("failed to load ROM: {}", err);
        process::exit(1);
    }

    if let Some(path) = &args.disk {
        let disk_data = match fs::read(path) {
            Ok(data) => data,
            Err(err) => {
                eprintln!("failed to read disk image {}: {}", path, err);
                process::exit(1);
            }
        };
        if let Err(err) = core.load_disk(DriveId::Drive0, &disk_data) {
            eprintln!("failed to load disk image: {}", err);
            process::exit(1);
        }
    }

    for frame in 0..args.frames {
        core.run_frame(60);

        if args.trace {
            let ctx = core.cpu_context();
            println!(
                "frame {:5}  PC={:04X} A={:02X} X={:02X} Y={:02X} SP={:02X} SR={:02X} cycles={}",
                frame,
                ctx.pc,
                ctx.acc,
                ctx.x,
                ctx.y,
                ctx.sp,
                ctx.sr,
                core.total_cycles()
            );
        }
    }

    println!(
        "ran {} frames ({} cycles), disk {}",
        args.frames,
        core.total_cycles(),
        if core.disk_busy() { "busy" } else { "idle" }
    );
    dump_text_screen(&mut core);
}

use std::env;
use std::fs::File;
use std::io::BufReader;

use anyhow::bail;
use anyhow::Context;
use anyhow::Result;

use scmp_rust::srec;
use scmp_rust::ArrayMemory;
use scmp_rust::CpuStatus;
use scmp_rust::Monitor;
use scmp_rust::CPU;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();
    match args.as_slice() {
        [] => {
            Monitor::new().run();
            Ok(())
        }
        [filename] => run_program(filename),
        _ => bail!("usage: scmp-rust [program.srec]"),
    }
}

/// Loads the S-record file and runs it to completion, raising Sense-B
/// first when the file is the NIBL BASIC ROM (it polls SB at startup).
fn run_program(filename: &str) -> Result<()> {
    let mut memory = ArrayMemory::default();

    let file = File::open(filename).with_context(|| format!("File not found!({})", filename))?;
    let summary = srec::load(BufReader::new(file), &mut memory)
        .with_context(|| format!("loading {}", filename))?;
    println!("{}({}:{})", filename, summary.first, summary.last);

    let mut cpu = CPU::with_memory(memory);
    if filename.eq_ignore_ascii_case("nibl.srec") {
        cpu.set_sense_b(true);
    }

    let status = loop {
        match cpu.clock() {
            CpuStatus::Success => {}
            status => break status,
        }
    };

    match status {
        CpuStatus::Halt => println!("HALT!"),
        CpuStatus::Undefined => println!("UNDEFINED INSTRUCTION!"),
        _ => {}
    }
    Ok(())
}

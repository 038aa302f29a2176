//! Interactive machine-level monitor: a line-oriented REPL over the CPU,
//! the memory image, the S-record codec and the disassembler.

use std::fs::File;
use std::io;
use std::io::BufReader;
use std::io::BufWriter;
use std::io::Write;

use anyhow::anyhow;
use anyhow::bail;
use anyhow::Result;

use crate::cpu::is_double_byte;
use crate::cpu::CpuStatus;
use crate::cpu::Pointer;
use crate::cpu::RunMode;
use crate::cpu::CPU;
use crate::disasm;
use crate::disasm::Disassembler;
use crate::memory::hex_dump;
use crate::srec;
use crate::Address;
use crate::ArrayMemory;
use crate::Memory;

/// At most one breakpoint; disabling remembers the address so `BE` can
/// re-arm it.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Breakpoint {
    None,
    Enabled(Address),
    Disabled(Address),
}

pub struct Monitor {
    cpu: CPU<ArrayMemory>,
    disasm: Disassembler,
    breakpoint: Breakpoint,
}

impl Default for Monitor {
    fn default() -> Self {
        Monitor::new()
    }
}

impl Monitor {
    pub fn new() -> Self {
        Monitor {
            cpu: CPU::with_memory(ArrayMemory::default()),
            disasm: Disassembler::new(),
            breakpoint: Breakpoint::None,
        }
    }

    pub fn run(&mut self) {
        loop {
            let Some(line) = prompt(">>") else { break };
            let line = line.to_uppercase();
            let mut tokens = line.split_whitespace();
            let Some(command) = tokens.next() else { continue };

            if command == "Q" {
                break;
            }

            let result = match command {
                "H" | "?" => self.help(&mut tokens),
                "D" => self.dump(&mut tokens),
                "RESET" => self.reset(&mut tokens),
                "INIT" => self.init(&mut tokens),
                "L" => self.load(&mut tokens),
                "S" => self.save(&mut tokens),
                "E" => self.edit(&mut tokens),
                "R" => self.registers(&mut tokens),
                "U" => self.unassemble(&mut tokens),
                "T" => self.trace(&mut tokens),
                "G" => self.go(&mut tokens),
                "BP" => self.breakpoint_set(&mut tokens),
                "BC" => self.breakpoint_clear(&mut tokens),
                "BD" => self.breakpoint_disable(&mut tokens),
                "BE" => self.breakpoint_enable(&mut tokens),
                "BL" => self.breakpoint_list(&mut tokens),
                _ => Err(anyhow!("unknown command")),
            };

            if result.is_err() {
                println!("Error!");
            }
        }
    }

    fn help<'a>(&mut self, args: &mut impl Iterator<Item = &'a str>) -> Result<()> {
        no_more_args(args)?;

        println!("Reset CPU  : RESET");
        println!("Init System: INIT");
        println!("Trace      : T [steps]");
        println!("Go         : G [addr]");
        println!("Dump       : D [saddr] [eaddr]");
        println!("Edit       : E <addr> [data]");
        println!("Register   : R [reg-name]");
        println!("Unassemble : U [addr] [steps]");
        println!("Break Point: BP <addr>");
        println!("Clear BP   : BC");
        println!("Disable BP : BD");
        println!("Enable BP  : BE");
        println!("List BP    : BL");
        println!("Load       : L <filename>");
        println!("Save       : S <filename> <saddr> <eaddr>");
        println!("Help       : H or ?");

        Ok(())
    }

    fn dump<'a>(&mut self, args: &mut impl Iterator<Item = &'a str>) -> Result<()> {
        let start = hex_arg(args, Some(self.cpu.program_counter().value()))?;
        let end = hex_arg(args, Some(start.wrapping_add(15)))?;
        no_more_args(args)?;

        if end < start {
            bail!("end before start");
        }

        print!(
            "{}",
            hex_dump(self.cpu.memory(), Address::new(start), Address::new(end))
        );
        Ok(())
    }

    fn reset<'a>(&mut self, args: &mut impl Iterator<Item = &'a str>) -> Result<()> {
        no_more_args(args)?;

        self.cpu.reset();
        println!("{}", self.register_line());
        Ok(())
    }

    fn init<'a>(&mut self, args: &mut impl Iterator<Item = &'a str>) -> Result<()> {
        no_more_args(args)?;

        self.cpu.memory().clear();
        self.cpu.reset();
        println!("{}", self.register_line());
        Ok(())
    }

    fn load<'a>(&mut self, args: &mut impl Iterator<Item = &'a str>) -> Result<()> {
        let filename = args.next().ok_or_else(|| anyhow!("missing file name"))?.to_string();
        no_more_args(args)?;

        let file = match File::open(&filename) {
            Ok(file) => file,
            Err(_) => {
                println!("File not found!({})", filename);
                bail!("open failed");
            }
        };

        match srec::load(BufReader::new(file), self.cpu.memory()) {
            Ok(summary) => println!("{}({}:{})", filename, summary.first, summary.last),
            Err(error) => {
                println!("{}", error);
                bail!("load failed");
            }
        }

        if filename == "NIBL.SREC" {
            self.cpu.set_sense_b(true);
        }
        Ok(())
    }

    fn save<'a>(&mut self, args: &mut impl Iterator<Item = &'a str>) -> Result<()> {
        let filename = args.next().ok_or_else(|| anyhow!("missing file name"))?.to_string();
        let start = hex_arg(args, None)?;
        let end = hex_arg(args, None)?;
        no_more_args(args)?;

        if end < start {
            bail!("end before start");
        }

        let file = match File::create(&filename) {
            Ok(file) => file,
            Err(_) => {
                println!("OPEN ERROR!!({})", filename);
                bail!("open failed");
            }
        };

        let start = Address::new(start);
        let end = Address::new(end);
        if srec::save(BufWriter::new(file), self.cpu.memory(), &filename, start, end).is_err() {
            println!("Write ERROR!!");
            bail!("write failed");
        }

        println!("{}({}:{})", filename, start, end);
        Ok(())
    }

    fn edit<'a>(&mut self, args: &mut impl Iterator<Item = &'a str>) -> Result<()> {
        let mut addr = Address::new(hex_arg(args, None)?);
        let data = opt_hex_arg(args)?;
        no_more_args(args)?;

        if let Some(data) = data {
            let data = data as u8;
            println!("{} {:02x}:{:02x}", addr, self.cpu.memory().read(addr), data);
            self.cpu.memory().write(addr, data);
            return Ok(());
        }

        loop {
            let current = self.cpu.memory().read(addr);
            let Some(input) = prompt(&format!("{} {:02x}:", addr, current)) else {
                break;
            };
            if input == "." {
                break;
            }
            if let Ok(value) = u16::from_str_radix(&input, 16) {
                self.cpu.memory().write(addr, value as u8);
                addr = addr + 1u16;
            }
        }
        Ok(())
    }

    fn registers<'a>(&mut self, args: &mut impl Iterator<Item = &'a str>) -> Result<()> {
        let Some(name) = args.next() else {
            println!("{}", self.register_line());
            return Ok(());
        };
        let name = name.to_string();
        no_more_args(args)?;

        let (current, width) = match name.as_str() {
            "AC" => (u16::from(self.cpu.accumulator()), 2),
            "ER" => (u16::from(self.cpu.extension()), 2),
            "SR" => (u16::from(self.cpu.status().bits()), 2),
            "PC" => (self.cpu.program_counter().value(), 4),
            "P1" => (self.cpu.pointer(Pointer::P1).value(), 4),
            "P2" => (self.cpu.pointer(Pointer::P2).value(), 4),
            "P3" => (self.cpu.pointer(Pointer::P3).value(), 4),
            _ => bail!("unknown register"),
        };

        loop {
            let Some(input) = prompt(&format!("{} {:0width$x}:", name, current, width = width))
            else {
                break;
            };
            if input == "." {
                break;
            }
            let Ok(value) = u16::from_str_radix(&input, 16) else {
                continue;
            };

            match name.as_str() {
                "AC" => self.cpu.set_accumulator(value as u8),
                "ER" => self.cpu.set_extension(value as u8),
                "SR" => self.cpu.set_status(value as u8),
                "PC" => self.cpu.set_program_counter(Address::new(value)),
                "P1" => self.cpu.set_pointer(Pointer::P1, Address::new(value)),
                "P2" => self.cpu.set_pointer(Pointer::P2, Address::new(value)),
                "P3" => self.cpu.set_pointer(Pointer::P3, Address::new(value)),
                _ => unreachable!(),
            }
            break;
        }
        Ok(())
    }

    fn unassemble<'a>(&mut self, args: &mut impl Iterator<Item = &'a str>) -> Result<()> {
        let default_addr = (self.cpu.program_counter() + 1u16).value();
        let mut addr = Address::new(hex_arg(args, Some(default_addr))?);
        let steps = dec_arg(args, Some(8))?;
        no_more_args(args)?;

        self.disasm.save_registers(&self.cpu);

        for _ in 0..steps {
            let marker = self.marker(addr);
            let bytes = disasm::raw_bytes(self.cpu.memory(), addr);
            let line = self.disasm.disassemble(self.cpu.memory(), addr);
            println!("{}{:<13}{}", marker, bytes, line.assembly);

            let width = if is_double_byte(self.cpu.memory().read(addr)) {
                2u16
            } else {
                1u16
            };
            addr = addr + width;
        }
        Ok(())
    }

    fn trace<'a>(&mut self, args: &mut impl Iterator<Item = &'a str>) -> Result<()> {
        let steps = dec_arg(args, Some(1))?;
        no_more_args(args)?;

        self.cpu.set_run_mode(RunMode::Trace);

        for _ in 0..steps {
            let addr = self.cpu.program_counter() + 1u16;
            self.disasm.save_registers(&self.cpu);

            let marker = self.marker(addr);
            let bytes = disasm::raw_bytes(self.cpu.memory(), addr);
            let line = self.disasm.disassemble(self.cpu.memory(), addr);
            println!(
                "{}{:<13}{:<16}{:<11} : {}",
                marker,
                bytes,
                line.assembly,
                line.effective_address,
                self.register_line()
            );

            match self.cpu.clock() {
                CpuStatus::Success => {}
                CpuStatus::Interrupt => {
                    println!(
                        "Interrupt!: PC({})<->P3({})",
                        self.cpu.pointer(Pointer::P3),
                        self.cpu.program_counter()
                    );
                }
                CpuStatus::Halt => {
                    println!("HALT!");
                    break;
                }
                CpuStatus::Undefined => {
                    println!("UNDEFINED INSTRUCTION!");
                    break;
                }
            }

            if self.is_breakpoint(addr) {
                println!("Break at {}", addr);
            }
        }
        Ok(())
    }

    fn go<'a>(&mut self, args: &mut impl Iterator<Item = &'a str>) -> Result<()> {
        let addr = opt_hex_arg(args)?;
        no_more_args(args)?;

        if let Some(addr) = addr {
            self.cpu.set_program_counter(Address::new(addr));
        }

        self.cpu.set_run_mode(RunMode::Run);

        let status = loop {
            let addr = self.cpu.program_counter() + 1u16;
            let status = self.cpu.clock();
            if self.is_breakpoint(addr) {
                println!("Break at {}", addr);
                break status;
            }
            if status != CpuStatus::Success {
                break status;
            }
        };

        match status {
            CpuStatus::Halt => println!("HALT!"),
            CpuStatus::Undefined => println!("UNDEFINED INSTRUCTION!"),
            _ => {}
        }
        Ok(())
    }

    fn breakpoint_set<'a>(&mut self, args: &mut impl Iterator<Item = &'a str>) -> Result<()> {
        let addr = hex_arg(args, None)?;
        no_more_args(args)?;

        self.breakpoint = Breakpoint::Enabled(Address::new(addr));
        println!("{}", self.breakpoint_line());
        Ok(())
    }

    fn breakpoint_clear<'a>(&mut self, args: &mut impl Iterator<Item = &'a str>) -> Result<()> {
        no_more_args(args)?;

        self.breakpoint = Breakpoint::None;
        println!("{}", self.breakpoint_line());
        Ok(())
    }

    fn breakpoint_disable<'a>(&mut self, args: &mut impl Iterator<Item = &'a str>) -> Result<()> {
        no_more_args(args)?;

        if let Breakpoint::Enabled(addr) = self.breakpoint {
            self.breakpoint = Breakpoint::Disabled(addr);
        }
        println!("{}", self.breakpoint_line());
        Ok(())
    }

    fn breakpoint_enable<'a>(&mut self, args: &mut impl Iterator<Item = &'a str>) -> Result<()> {
        no_more_args(args)?;

        if let Breakpoint::Disabled(addr) = self.breakpoint {
            self.breakpoint = Breakpoint::Enabled(addr);
        }
        println!("{}", self.breakpoint_line());
        Ok(())
    }

    fn breakpoint_list<'a>(&mut self, args: &mut impl Iterator<Item = &'a str>) -> Result<()> {
        no_more_args(args)?;

        println!("{}", self.breakpoint_line());
        Ok(())
    }

    fn breakpoint_line(&self) -> String {
        match self.breakpoint {
            Breakpoint::None => "No Break Point".to_string(),
            Breakpoint::Enabled(addr) => format!("BP={}:Enable", addr),
            Breakpoint::Disabled(addr) => format!("BP={}:Disable", addr),
        }
    }

    /// A breakpoint hits on the fetch address, or on the second byte of a
    /// two-byte instruction. Disabled breakpoints never hit.
    fn is_breakpoint(&mut self, addr: Address) -> bool {
        let Breakpoint::Enabled(target) = self.breakpoint else {
            return false;
        };
        self.covers(target, addr)
    }

    fn marker(&mut self, addr: Address) -> &'static str {
        let (target, enabled) = match self.breakpoint {
            Breakpoint::None => return "   ",
            Breakpoint::Enabled(target) => (target, true),
            Breakpoint::Disabled(target) => (target, false),
        };

        if !self.covers(target, addr) {
            "   "
        } else if enabled {
            "[*]"
        } else {
            "[+]"
        }
    }

    fn covers(&mut self, target: Address, addr: Address) -> bool {
        target == addr || (is_double_byte(self.cpu.memory().read(addr)) && addr + 1u16 == target)
    }

    fn register_line(&self) -> String {
        format!(
            "{} PC:{} AC:{:02x} ER:{:02x} P1:{} P2:{} P3:{}",
            self.status_string(),
            self.cpu.program_counter(),
            self.cpu.accumulator(),
            self.cpu.extension(),
            self.cpu.pointer(Pointer::P1),
            self.cpu.pointer(Pointer::P2),
            self.cpu.pointer(Pointer::P3),
        )
    }

    /// `COBAI210` with cleared bits shown as `-`.
    fn status_string(&self) -> String {
        "COBAI210"
            .chars()
            .enumerate()
            .map(|(i, name)| {
                if self.cpu.status().bits() & (0x80 >> i) != 0 {
                    name
                } else {
                    '-'
                }
            })
            .collect()
    }
}

fn prompt(text: &str) -> Option<String> {
    print!("{}", text);
    let _ = io::stdout().flush();

    let mut line = String::new();
    match io::stdin().read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.trim().to_string()),
    }
}

fn parse_hex(token: &str) -> Result<u16> {
    u16::from_str_radix(token, 16).map_err(|_| anyhow!("bad hex value: {}", token))
}

fn opt_hex_arg<'a>(tokens: &mut impl Iterator<Item = &'a str>) -> Result<Option<u16>> {
    tokens.next().map(parse_hex).transpose()
}

fn hex_arg<'a>(tokens: &mut impl Iterator<Item = &'a str>, default: Option<u16>) -> Result<u16> {
    match opt_hex_arg(tokens)? {
        Some(value) => Ok(value),
        None => default.ok_or_else(|| anyhow!("missing argument")),
    }
}

fn dec_arg<'a>(tokens: &mut impl Iterator<Item = &'a str>, default: Option<u32>) -> Result<u32> {
    match tokens.next() {
        Some(token) => token
            .parse()
            .map_err(|_| anyhow!("bad decimal value: {}", token)),
        None => default.ok_or_else(|| anyhow!("missing argument")),
    }
}

fn no_more_args<'a>(tokens: &mut impl Iterator<Item = &'a str>) -> Result<()> {
    if tokens.next().is_some() {
        bail!("trailing arguments");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use yare::parameterized;

    use super::*;
    use crate::cpu::opcodes::*;
    use crate::cpu::Status;

    fn monitor() -> Monitor {
        Monitor::new()
    }

    #[test]
    fn hex_arg_parses_case_insensitively() {
        assert_eq!(parse_hex("1a2F").unwrap(), 0x1A2F);
        assert!(parse_hex("wxyz").is_err());
        assert!(parse_hex("10000").is_err());
    }

    #[test]
    fn hex_arg_falls_back_to_the_default() {
        let mut empty = "".split_whitespace();
        assert_eq!(hex_arg(&mut empty, Some(0x1234)).unwrap(), 0x1234);
        assert!(hex_arg(&mut empty, None).is_err());

        let mut given = "ff".split_whitespace();
        assert_eq!(hex_arg(&mut given, Some(0)).unwrap(), 0xFF);
    }

    #[test]
    fn dec_arg_parses_decimal_only() {
        let mut tokens = "12".split_whitespace();
        assert_eq!(dec_arg(&mut tokens, None).unwrap(), 12);

        let mut bad = "0x12".split_whitespace();
        assert!(dec_arg(&mut bad, None).is_err());
    }

    #[test]
    fn no_more_args_rejects_leftover_tokens() {
        let mut tokens = "extra".split_whitespace();
        assert!(no_more_args(&mut tokens).is_err());

        let mut empty = "".split_whitespace();
        assert!(no_more_args(&mut empty).is_ok());
    }

    #[test]
    fn register_line_shows_cleared_flags_as_dashes() {
        let mut monitor = monitor();
        monitor.cpu.set_status((Status::CARRY | Status::SENSE_A).bits());
        monitor.cpu.set_accumulator(0xAB);
        monitor.cpu.set_pointer(Pointer::P1, Address::new(0x1234));

        assert_eq!(
            monitor.register_line(),
            "C--A---- PC:0000 AC:ab ER:00 P1:1234 P2:0000 P3:0000"
        );
    }

    #[test]
    fn status_string_shows_every_set_flag() {
        let mut monitor = monitor();
        monitor.cpu.set_status(0xFF);
        assert_eq!(monitor.status_string(), "COBAI210");

        monitor.cpu.set_status(0x00);
        assert_eq!(monitor.status_string(), "--------");
    }

    #[parameterized(
        none     = { Breakpoint::None, "No Break Point" },
        enabled  = { Breakpoint::Enabled(Address::new(0x0123)), "BP=0123:Enable" },
        disabled = { Breakpoint::Disabled(Address::new(0x0123)), "BP=0123:Disable" },
    )]
    fn breakpoint_line_reports_state(breakpoint: Breakpoint, expected: &str) {
        let mut monitor = monitor();
        monitor.breakpoint = breakpoint;
        assert_eq!(monitor.breakpoint_line(), expected);
    }

    #[test]
    fn breakpoint_hits_on_the_fetch_address() {
        let mut monitor = monitor();
        monitor.breakpoint = Breakpoint::Enabled(Address::new(0x0100));

        assert!(monitor.is_breakpoint(Address::new(0x0100)));
        assert!(!monitor.is_breakpoint(Address::new(0x0101)));
    }

    #[test]
    fn breakpoint_hits_on_the_second_byte_of_a_double_byte_instruction() {
        let mut monitor = monitor();
        monitor.cpu.memory().write(Address::new(0x0100), LDI);
        monitor.breakpoint = Breakpoint::Enabled(Address::new(0x0101));

        assert!(monitor.is_breakpoint(Address::new(0x0100)));
    }

    #[test]
    fn single_byte_instruction_does_not_cover_the_next_address() {
        let mut monitor = monitor();
        monitor.cpu.memory().write(Address::new(0x0100), NOP);
        monitor.breakpoint = Breakpoint::Enabled(Address::new(0x0101));

        assert!(!monitor.is_breakpoint(Address::new(0x0100)));
    }

    #[test]
    fn disabled_breakpoints_mark_but_do_not_hit() {
        let mut monitor = monitor();
        monitor.breakpoint = Breakpoint::Disabled(Address::new(0x0100));

        assert!(!monitor.is_breakpoint(Address::new(0x0100)));
        assert_eq!(monitor.marker(Address::new(0x0100)), "[+]");
    }

    #[test]
    fn enabled_breakpoints_mark_with_a_star() {
        let mut monitor = monitor();
        monitor.breakpoint = Breakpoint::Enabled(Address::new(0x0100));

        assert_eq!(monitor.marker(Address::new(0x0100)), "[*]");
        assert_eq!(monitor.marker(Address::new(0x0200)), "   ");
    }

    #[test]
    fn disable_and_enable_keep_the_address() {
        let mut monitor = monitor();
        let mut none = "".split_whitespace();

        monitor.breakpoint = Breakpoint::Enabled(Address::new(0x0042));
        monitor.breakpoint_disable(&mut none).unwrap();
        assert_eq!(monitor.breakpoint, Breakpoint::Disabled(Address::new(0x0042)));

        let mut none = "".split_whitespace();
        monitor.breakpoint_enable(&mut none).unwrap();
        assert_eq!(monitor.breakpoint, Breakpoint::Enabled(Address::new(0x0042)));
    }

    #[test]
    fn disable_without_a_breakpoint_stays_none() {
        let mut monitor = monitor();
        let mut none = "".split_whitespace();

        monitor.breakpoint_disable(&mut none).unwrap();
        assert_eq!(monitor.breakpoint, Breakpoint::None);
    }
}

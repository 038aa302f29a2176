//! Emulates the SC/MP-II (INS8060) microprocessor.
//!
//! The SC/MP has:
//! - An 8-bit accumulator (AC) and extension register (ER)
//! - An 8-bit status register (SR) holding carry, overflow, the sense
//!   pins, interrupt enable and three user flags
//! - Four 16-bit pointer registers; pointer 0 is the program counter
//!
//! Pointer arithmetic never carries across the 4 KiB page boundary, and a
//! fetch increments the program counter *before* reading, so the program
//! counter always addresses the last byte fetched.

use std::thread;
use std::time::Duration;

use bitflags::bitflags;
use log::trace;

use crate::address::Address;
use crate::console::{Console, StdConsole};
use crate::memory::Memory;

pub use self::addressing_modes::AddressingMode;
pub use self::addressing_modes::Pointer;
pub use self::instruction::is_double_byte;
pub use self::instruction::opcodes;
pub use self::instruction::Instruction;

mod addressing_modes;
mod instruction;

/// Outcome of one `clock()` call.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CpuStatus {
    /// An instruction executed; keep going.
    Success,
    /// The HALT opcode executed.
    Halt,
    /// Interrupt enable and Sense-A were both high; the program counter
    /// was exchanged with P3 and no instruction was fetched.
    Interrupt,
    /// An undefined opcode, or ST with immediate addressing.
    Undefined,
}

/// RUN performs character I/O transparently; TRACE reports PUTC/GETC as
/// events and skips DLY's busy-wait so traces stay responsive.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RunMode {
    Run,
    Trace,
}

#[derive(Debug)]
pub struct CPU<M, C = StdConsole> {
    memory: M,
    console: C,
    /// AC - 8-bit accumulator register.
    accumulator: u8,
    /// ER - 8-bit extension register.
    extension: u8,
    /// SR - 8-bit status register.
    status: Status,
    /// The four 16-bit pointer registers; `pointers[0]` is the program
    /// counter.
    pointers: [Address; 4],
    run_mode: RunMode,
}

impl<M: Memory> CPU<M> {
    pub fn with_memory(memory: M) -> Self {
        CPU::new(memory, StdConsole)
    }
}

impl<M: Memory, C: Console> CPU<M, C> {
    pub fn new(memory: M, console: C) -> Self {
        CPU {
            memory,
            console,
            accumulator: 0,
            extension: 0,
            status: Status::empty(),
            pointers: [Address::default(); 4],
            run_mode: RunMode::Run,
        }
    }

    /// Clears every register. Memory is left alone.
    pub fn reset(&mut self) {
        self.accumulator = 0;
        self.extension = 0;
        self.status = Status::empty();
        self.pointers = [Address::default(); 4];
    }

    pub fn memory(&mut self) -> &mut M {
        &mut self.memory
    }

    pub fn console(&mut self) -> &mut C {
        &mut self.console
    }

    pub fn accumulator(&self) -> u8 {
        self.accumulator
    }

    pub fn set_accumulator(&mut self, byte: u8) {
        self.accumulator = byte;
    }

    pub fn extension(&self) -> u8 {
        self.extension
    }

    pub fn set_extension(&mut self, byte: u8) {
        self.extension = byte;
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn set_status(&mut self, byte: u8) {
        self.status = Status::from_bits_retain(byte);
    }

    pub fn set_sense_a(&mut self, high: bool) {
        self.status.set(Status::SENSE_A, high);
    }

    pub fn set_sense_b(&mut self, high: bool) {
        self.status.set(Status::SENSE_B, high);
    }

    pub fn program_counter(&self) -> Address {
        self.pointers[0]
    }

    pub fn set_program_counter(&mut self, address: Address) {
        self.pointers[0] = address;
    }

    pub fn pointer(&self, pointer: Pointer) -> Address {
        self.pointers[pointer.index()]
    }

    pub fn set_pointer(&mut self, pointer: Pointer, address: Address) {
        self.pointers[pointer.index()] = address;
    }

    pub fn run_mode(&self) -> RunMode {
        self.run_mode
    }

    pub fn set_run_mode(&mut self, mode: RunMode) {
        self.run_mode = mode;
    }

    /// Performs one tick: either the interrupt exchange, or the fetch and
    /// execution of exactly one instruction.
    pub fn clock(&mut self) -> CpuStatus {
        if self.status.contains(Status::INTERRUPT_ENABLE | Status::SENSE_A) {
            self.status.remove(Status::INTERRUPT_ENABLE);
            self.exchange_pc(Pointer::P3);
            return CpuStatus::Interrupt;
        }

        let opcode = self.fetch();
        let displacement = if is_double_byte(opcode) {
            self.fetch() as i8
        } else {
            0
        };

        match Instruction::from_opcode(opcode) {
            Some(instruction) => {
                trace!("        {:?}", instruction);
                self.execute(instruction, displacement)
            }
            None => CpuStatus::Undefined,
        }
    }

    /// Pre-increments the program counter within its page, then reads.
    fn fetch(&mut self) -> u8 {
        let pc = self.pointers[0].paged_add(1);
        self.pointers[0] = pc;
        let byte = self.memory.read(pc);
        trace!("{}  {:#04x}", pc, byte);
        byte
    }

    fn execute(&mut self, instruction: Instruction, displacement: i8) -> CpuStatus {
        use Instruction::*;

        match instruction {
            HALT => return CpuStatus::Halt,
            XAE => std::mem::swap(&mut self.accumulator, &mut self.extension),
            CCL => self.status.remove(Status::CARRY),
            SCL => self.status.insert(Status::CARRY),
            DINT => self.status.remove(Status::INTERRUPT_ENABLE),
            IEN => self.status.insert(Status::INTERRUPT_ENABLE),
            CSA => self.accumulator = self.status.bits(),
            CAS => {
                let sense = Status::SENSE_A | Status::SENSE_B;
                let copied = Status::from_bits_retain(self.accumulator) & !sense;
                self.status = (self.status & sense) | copied;
            }
            NOP => {}
            SIO => self.extension >>= 1,
            SR => self.accumulator >>= 1,
            SRL => {
                // Carry sits in bit 7 of SR, and the hardware ORs it
                // straight into bit 7 of AC.
                self.accumulator = (self.accumulator >> 1) | self.carry_bit();
            }
            RR => self.accumulator = self.accumulator.rotate_right(1),
            RRL => {
                let lsb = self.accumulator & 1;
                self.accumulator = (self.accumulator >> 1) | self.carry_bit();
                self.status.set(Status::CARRY, lsb != 0);
            }
            PUTC => self.put_char(),
            GETC => self.get_char(),
            XPAL(pointer) => {
                let value = self.pointer(pointer);
                self.set_pointer(pointer, Address::from_bytes(value.higher(), self.accumulator));
                self.accumulator = value.lower();
            }
            XPAH(pointer) => {
                let value = self.pointer(pointer);
                self.set_pointer(pointer, Address::from_bytes(self.accumulator, value.lower()));
                self.accumulator = value.higher();
            }
            XPPC(pointer) => self.exchange_pc(pointer),
            LDE => self.accumulator = self.extension,
            ANE => self.accumulator &= self.extension,
            ORE => self.accumulator |= self.extension,
            XRE => self.accumulator ^= self.extension,
            DAE => self.accumulator = self.add_bcd(self.accumulator, self.extension),
            ADE => self.accumulator = self.add_byte(self.accumulator, self.extension),
            CAE => self.accumulator = self.add_byte(self.accumulator, !self.extension),
            DLY => self.delay(displacement),
            JMP(pointer) => self.jump(pointer, displacement),
            JP(pointer) => {
                if self.accumulator & 0x80 == 0 {
                    self.jump(pointer, displacement);
                }
            }
            JZ(pointer) => {
                if self.accumulator == 0 {
                    self.jump(pointer, displacement);
                }
            }
            JNZ(pointer) => {
                if self.accumulator != 0 {
                    self.jump(pointer, displacement);
                }
            }
            ILD(pointer) => self.modify_and_load(pointer, displacement, 1),
            DLD(pointer) => self.modify_and_load(pointer, displacement, -1),
            LD(mode) => self.accumulator = self.data(mode, displacement),
            ST(mode) => {
                if mode == AddressingMode::Immediate {
                    return CpuStatus::Undefined;
                }
                let address = self.effective_address(mode, displacement);
                self.memory.write(address, self.accumulator);
            }
            AND(mode) => {
                let data = self.data(mode, displacement);
                self.accumulator &= data;
            }
            OR(mode) => {
                let data = self.data(mode, displacement);
                self.accumulator |= data;
            }
            XOR(mode) => {
                let data = self.data(mode, displacement);
                self.accumulator ^= data;
            }
            DAD(mode) => {
                let data = self.data(mode, displacement);
                self.accumulator = self.add_bcd(self.accumulator, data);
            }
            ADD(mode) => {
                let data = self.data(mode, displacement);
                self.accumulator = self.add_byte(self.accumulator, data);
            }
            CAD(mode) => {
                let data = self.data(mode, displacement);
                self.accumulator = self.add_byte(self.accumulator, !data);
            }
        }

        CpuStatus::Success
    }

    fn carry_bit(&self) -> u8 {
        (self.status & Status::CARRY).bits()
    }

    fn exchange_pc(&mut self, pointer: Pointer) {
        self.pointers.swap(0, pointer.index());
    }

    /// Jumps and ILD/DLD address with the plain indexed formula on the raw
    /// displacement; the ER substitution does not apply to them.
    fn jump(&mut self, pointer: Pointer, displacement: i8) {
        self.pointers[0] = self.pointer(pointer).paged_add(displacement);
    }

    fn modify_and_load(&mut self, pointer: Pointer, displacement: i8, delta: i8) {
        let address = self.pointer(pointer).paged_add(displacement);
        let value = self.memory.read(address).wrapping_add_signed(delta);
        self.memory.write(address, value);
        self.accumulator = value;
    }

    /// A displacement of -128 stands for "use ER", read as a signed byte.
    fn substitute_extension(&self, displacement: i8) -> i8 {
        if displacement == -128 {
            self.extension as i8
        } else {
            displacement
        }
    }

    fn effective_address(&mut self, mode: AddressingMode, displacement: i8) -> Address {
        let displacement = self.substitute_extension(displacement);
        match mode {
            AddressingMode::Indexed(pointer) => self.pointer(pointer).paged_add(displacement),
            AddressingMode::AutoIndexed(pointer) => {
                if displacement < 0 {
                    // Pre-decrement: the access uses the new pointer value.
                    let address = self.pointer(pointer).paged_add(displacement);
                    self.set_pointer(pointer, address);
                    address
                } else {
                    // Post-increment: the access uses the old pointer value.
                    let address = self.pointer(pointer);
                    self.set_pointer(pointer, address.paged_add(displacement));
                    address
                }
            }
            AddressingMode::Immediate => panic!("immediate form has no effective address"),
        }
    }

    fn data(&mut self, mode: AddressingMode, displacement: i8) -> u8 {
        match mode {
            AddressingMode::Immediate => displacement as u8,
            _ => {
                let address = self.effective_address(mode, displacement);
                self.memory.read(address)
            }
        }
    }

    fn add_byte(&mut self, a: u8, b: u8) -> u8 {
        let carry_in = u16::from(self.status.contains(Status::CARRY));
        let sum = u16::from(a) + u16::from(b) + carry_in;
        let result = sum as u8;

        self.status.set(Status::CARRY, sum & 0x100 != 0);

        // Overflow: the operands agree in sign and the result does not.
        let overflow = (a ^ b) & 0x80 == 0 && (a ^ result) & 0x80 != 0;
        self.status.set(Status::OVERFLOW, overflow);

        result
    }

    fn add_bcd(&mut self, a: u8, b: u8) -> u8 {
        let carry_in = u16::from(self.status.contains(Status::CARRY));
        let mut sum = u16::from(a) + u16::from(b) + carry_in;

        if sum % 16 >= 0x0A {
            sum += 6;
        }
        if sum >= 0xA0 {
            sum += 0x60;
        }

        self.status.set(Status::CARRY, sum & 0x100 != 0);

        sum as u8
    }

    fn delay(&mut self, displacement: i8) {
        let disp = u32::from(displacement as u8);
        let microcycles = 13 + 2 * u32::from(self.accumulator) + 2 * disp + (disp << 9);

        // 1000 microcycles to the microsecond at the reference clock rate.
        if self.run_mode == RunMode::Run {
            thread::sleep(Duration::from_micros(u64::from(microcycles / 1000)));
        }
    }

    fn put_char(&mut self) {
        match self.run_mode {
            RunMode::Run => self.console.put_char(self.accumulator & 0x7F),
            RunMode::Trace => {
                println!(
                    "\nPUTC(0x{:02x}):{}\n",
                    self.accumulator,
                    (self.accumulator & 0x7F) as char
                );
            }
        }
    }

    fn get_char(&mut self) {
        if self.run_mode == RunMode::Trace {
            print!("\nGETC():");
        }

        let mut byte = self.console.get_char().to_ascii_uppercase();
        if byte == b'\n' {
            byte = b'\r';
        }

        self.accumulator = byte;
        self.extension = byte;
    }
}

bitflags! {
    /// The status register. Carry lives in bit 7; the sense bits reflect
    /// external pins and are preserved by CAS.
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    pub struct Status: u8 {
        const CARRY            = 0b1000_0000;
        const OVERFLOW         = 0b0100_0000;
        const SENSE_B          = 0b0010_0000;
        const SENSE_A          = 0b0001_0000;
        const INTERRUPT_ENABLE = 0b0000_1000;
        const FLAG_2           = 0b0000_0100;
        const FLAG_1           = 0b0000_0010;
        const FLAG_0           = 0b0000_0001;
    }
}

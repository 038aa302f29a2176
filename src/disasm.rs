//! Pure instruction decoder for the monitor's listing and trace output.
//!
//! Effective addresses are rendered from a snapshot of the pointer
//! registers taken with [`Disassembler::save_registers`] at the moment of
//! the user command, so the text stays stable no matter what the traced
//! instruction does to the live registers. Decoding itself is shared with
//! the execution engine through [`Instruction::from_opcode`].

use crate::console::Console;
use crate::cpu::is_double_byte;
use crate::cpu::AddressingMode;
use crate::cpu::Instruction;
use crate::cpu::Pointer;
use crate::cpu::CPU;
use crate::Address;
use crate::Memory;

#[derive(Debug, Default)]
pub struct Disassembler {
    pointers: [Address; 4],
    extension: u8,
}

/// One decoded line: the assembly text and the effective-address column
/// (empty where the instruction has none).
#[derive(Debug, Eq, PartialEq)]
pub struct Disassembly {
    pub assembly: String,
    pub effective_address: String,
}

impl Disassembler {
    pub fn new() -> Self {
        Disassembler::default()
    }

    /// Snapshots PC+1 (the address of the next instruction), P1..P3 and ER.
    pub fn save_registers<M: Memory, C: Console>(&mut self, cpu: &CPU<M, C>) {
        self.pointers = [
            cpu.program_counter() + 1u16,
            cpu.pointer(Pointer::P1),
            cpu.pointer(Pointer::P2),
            cpu.pointer(Pointer::P3),
        ];
        self.extension = cpu.extension();
    }

    pub fn disassemble<M: Memory>(&self, memory: &mut M, address: Address) -> Disassembly {
        use Instruction::*;

        let opcode = memory.read(address);

        if !is_double_byte(opcode) {
            let assembly = match Instruction::from_opcode(opcode) {
                Some(instruction @ (XPAL(pointer) | XPAH(pointer) | XPPC(pointer))) => {
                    format!("{:<4} {}", instruction.mnemonic(), pointer.name())
                }
                Some(instruction) => instruction.mnemonic().to_string(),
                None => "UND".to_string(),
            };
            return Disassembly {
                assembly,
                effective_address: String::new(),
            };
        }

        let displacement = memory.read(address + 1) as i8;

        let (assembly, effective_address) = match Instruction::from_opcode(opcode) {
            Some(DLY) => (format!("{:<4} {}", "DLY", displacement), String::new()),
            Some(instruction @ (JMP(pointer) | JP(pointer) | JZ(pointer) | JNZ(pointer))) => {
                let mode = AddressingMode::Indexed(pointer);
                (
                    format!("{:<4} {}", instruction.mnemonic(), operand(mode, displacement)),
                    self.jump_target(pointer, displacement),
                )
            }
            Some(instruction @ (ILD(pointer) | DLD(pointer))) => {
                let mode = AddressingMode::Indexed(pointer);
                (
                    format!("{:<4} {}", instruction.mnemonic(), operand(mode, displacement)),
                    self.memory_target(memory, mode, displacement),
                )
            }
            Some(ST(AddressingMode::Immediate)) => ("UND".to_string(), String::new()),
            Some(
                instruction @ (LD(mode) | ST(mode) | AND(mode) | OR(mode) | XOR(mode) | DAD(mode)
                | ADD(mode) | CAD(mode)),
            ) => {
                let assembly =
                    format!("{:<4} {}", instruction.mnemonic(), operand(mode, displacement));
                let effective_address = if mode == AddressingMode::Immediate {
                    String::new()
                } else {
                    self.memory_target(memory, mode, displacement)
                };
                (assembly, effective_address)
            }
            _ => ("UND".to_string(), String::new()),
        };

        Disassembly {
            assembly,
            effective_address,
        }
    }

    fn jump_target(&self, pointer: Pointer, displacement: i8) -> String {
        let target = self.effective_address(AddressingMode::Indexed(pointer), displacement);
        format!("JUMP={}", target)
    }

    fn memory_target<M: Memory>(
        &self,
        memory: &mut M,
        mode: AddressingMode,
        displacement: i8,
    ) -> String {
        let target = self.effective_address(mode, displacement);
        format!("EA={}({:02x})", target, memory.read(target))
    }

    /// Same page-wrap algebra as the engine, over the saved registers. The
    /// pre-decrement form shows the address one past the one the engine
    /// will use, reflecting the pointer as it stands before execution.
    fn effective_address(&self, mode: AddressingMode, displacement: i8) -> Address {
        let displacement = if displacement == -128 {
            self.extension as i8
        } else {
            displacement
        };

        match mode {
            AddressingMode::Indexed(pointer) => {
                self.pointers[pointer.index()].paged_add(displacement)
            }
            AddressingMode::AutoIndexed(pointer) => {
                let pointer = self.pointers[pointer.index()];
                if displacement < 0 {
                    pointer.paged_add(displacement + 1)
                } else {
                    pointer
                }
            }
            AddressingMode::Immediate => unreachable!("immediate operands have no address"),
        }
    }
}

/// The raw bytes column: `xxxx:oo` for one-byte instructions, `xxxx:oo dd`
/// for two.
pub fn raw_bytes<M: Memory>(memory: &mut M, address: Address) -> String {
    let opcode = memory.read(address);
    let mut out = format!("{}:{:02x}", address, opcode);
    if is_double_byte(opcode) {
        out.push_str(&format!(" {:02x}", memory.read(address + 1)));
    }
    out
}

fn operand(mode: AddressingMode, displacement: i8) -> String {
    match mode {
        AddressingMode::Immediate => format!("0x{:02x}", displacement as u8),
        AddressingMode::Indexed(Pointer::PC) => displacement.to_string(),
        AddressingMode::Indexed(pointer) => format!("{}({})", displacement, pointer.name()),
        AddressingMode::AutoIndexed(Pointer::PC) => format!("@{}", displacement),
        AddressingMode::AutoIndexed(pointer) => format!("@{}({})", displacement, pointer.name()),
    }
}

#[cfg(test)]
mod tests {
    use yare::parameterized;

    use super::*;
    use crate::console::BufferConsole;
    use crate::cpu::opcodes::*;
    use crate::mem;
    use crate::ArrayMemory;

    fn snapshot(pc: u16, p1: u16, extension: u8) -> Disassembler {
        Disassembler {
            pointers: [
                Address::new(pc),
                Address::new(p1),
                Address::new(0),
                Address::new(0),
            ],
            extension,
        }
    }

    fn disassemble_at_one(memory: &mut ArrayMemory) -> Disassembly {
        snapshot(1, 0x2010, 0).disassemble(memory, Address::new(1))
    }

    #[parameterized(
        halt = { HALT, "HALT" },
        nop  = { NOP, "NOP" },
        csa  = { CSA, "CSA" },
        sio  = { SIO, "SIO" },
        lde  = { LDE, "LDE" },
        cae  = { CAE, "CAE" },
        putc = { PUTC, "PUTC" },
        getc = { GETC, "GETC" },
    )]
    fn single_byte_instructions_render_bare_mnemonics(opcode: u8, expected: &str) {
        let mut memory = mem!(1 => { opcode });
        let line = disassemble_at_one(&mut memory);

        assert_eq!(line.assembly, expected);
        assert_eq!(line.effective_address, "");
    }

    #[parameterized(
        xpal_pc = { XPAL_PC, "XPAL PC" },
        xpal_p1 = { XPAL_P1, "XPAL P1" },
        xpah_p2 = { XPAH_P2, "XPAH P2" },
        xppc_p3 = { XPPC_P3, "XPPC P3" },
    )]
    fn pointer_exchanges_name_their_pointer(opcode: u8, expected: &str) {
        let mut memory = mem!(1 => { opcode });
        assert_eq!(disassemble_at_one(&mut memory).assembly, expected);
    }

    #[test]
    fn undefined_single_byte_renders_und() {
        let mut memory = mem!(1 => { 0x09u8 });
        assert_eq!(disassemble_at_one(&mut memory).assembly, "UND");
    }

    #[test]
    fn immediate_operands_render_as_hex() {
        let mut memory = mem!(1 => { LDI, 0x7Fu8 });
        let line = disassemble_at_one(&mut memory);

        assert_eq!(line.assembly, "LDI  0x7f");
        assert_eq!(line.effective_address, "");
    }

    #[test]
    fn indexed_operands_render_as_signed_decimal() {
        let mut memory = mem!(
            1 => { LD_P1, 0xFEu8 }
            0x200E => { 0x42u8 }
        );
        let line = disassemble_at_one(&mut memory);

        assert_eq!(line.assembly, "LD   -2(P1)");
        assert_eq!(line.effective_address, "EA=200e(42)");
    }

    #[test]
    fn pc_relative_operands_have_no_pointer_suffix() {
        let mut memory = mem!(1 => { LD, 5u8 });
        let line = disassemble_at_one(&mut memory);

        assert_eq!(line.assembly, "LD   5");
        assert_eq!(line.effective_address, "EA=0006(00)");
    }

    #[test]
    fn auto_indexed_post_increment_shows_the_raw_pointer() {
        let mut memory = mem!(
            1 => { LD_AUTO_P1, 3u8 }
            0x2010 => { 0x55u8 }
        );
        let line = disassemble_at_one(&mut memory);

        assert_eq!(line.assembly, "LD   @3(P1)");
        assert_eq!(line.effective_address, "EA=2010(55)");
    }

    #[test]
    fn auto_indexed_pre_decrement_shows_one_past_the_target() {
        let mut memory = mem!(1 => { LD_AUTO_P1, 0xFEu8 });
        let line = disassemble_at_one(&mut memory);

        assert_eq!(line.assembly, "LD   @-2(P1)");
        assert_eq!(line.effective_address, "EA=200f(00)");
    }

    #[test]
    fn displacement_of_minus_128_renders_with_the_saved_extension() {
        let mut memory = mem!(1 => { LD_AUTO_P1, 0x80u8 });
        let line = snapshot(1, 0x2010, 0xFE).disassemble(&mut memory, Address::new(1));

        // ER = -2: rendered like a pre-decrement.
        assert_eq!(line.assembly, "LD   @-128(P1)");
        assert_eq!(line.effective_address, "EA=200f(00)");
    }

    #[test]
    fn jumps_render_their_target() {
        let mut memory = mem!(1 => { JMP_P1, 5u8 });
        let line = disassemble_at_one(&mut memory);

        assert_eq!(line.assembly, "JMP  5(P1)");
        assert_eq!(line.effective_address, "JUMP=2015");
    }

    #[test]
    fn ild_renders_like_an_indexed_memory_reference() {
        let mut memory = mem!(
            1 => { ILD_P1, 1u8 }
            0x2011 => { 0x10u8 }
        );
        let line = disassemble_at_one(&mut memory);

        assert_eq!(line.assembly, "ILD  1(P1)");
        assert_eq!(line.effective_address, "EA=2011(10)");
    }

    #[test]
    fn dly_renders_its_operand_in_decimal() {
        let mut memory = mem!(1 => { DLY, 0xFDu8 });
        assert_eq!(disassemble_at_one(&mut memory).assembly, "DLY  -3");
    }

    #[test]
    fn store_immediate_renders_und() {
        let mut memory = mem!(1 => { ST_IMMEDIATE, 0x10u8 });
        let line = disassemble_at_one(&mut memory);

        assert_eq!(line.assembly, "UND");
        assert_eq!(line.effective_address, "");
    }

    #[test]
    fn undefined_double_byte_renders_und() {
        let mut memory = mem!(1 => { 0x80u8, 0x00u8 });
        assert_eq!(disassemble_at_one(&mut memory).assembly, "UND");
    }

    #[test]
    fn raw_bytes_shows_one_or_two_bytes() {
        let mut memory = mem!(1 => { NOP, LDI, 0x7Fu8 });

        assert_eq!(raw_bytes(&mut memory, Address::new(1)), "0001:08");
        assert_eq!(raw_bytes(&mut memory, Address::new(2)), "0002:c4 7f");
    }

    #[test]
    fn jump_target_matches_where_the_engine_lands() {
        let memory = mem!(0x1001 => { JMP_P1, 5u8 });
        let mut cpu = CPU::new(memory, BufferConsole::default());
        cpu.set_program_counter(Address::new(0x1000));
        cpu.set_pointer(Pointer::P1, Address::new(0x2010));

        let mut disasm = Disassembler::new();
        disasm.save_registers(&cpu);
        let line = disasm.disassemble(cpu.memory(), Address::new(0x1001));

        cpu.clock();

        assert_eq!(
            line.effective_address,
            format!("JUMP={}", cpu.program_counter())
        );
    }
}

use super::addressing_modes::AddressingMode;
use super::addressing_modes::Pointer;

/// One decoded SC/MP-II instruction. Opcodes with bit 7 clear are a single
/// byte; the rest carry a signed displacement in a second byte.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Instruction {
    /// Halt
    ///
    /// Stops the processor; the monitor regains control.
    HALT,

    /// Exchange AC and Extension
    ///
    /// AC <-> ER
    XAE,

    /// Clear Carry/Link
    ///
    /// CY = 0
    CCL,

    /// Set Carry/Link
    ///
    /// CY = 1
    SCL,

    /// Disable Interrupt
    ///
    /// IE = 0
    DINT,

    /// Enable Interrupt
    ///
    /// IE = 1. With Sense-A high, the next clock performs the interrupt
    /// exchange instead of fetching.
    IEN,

    /// Copy Status to AC
    ///
    /// AC = SR
    CSA,

    /// Copy AC to Status
    ///
    /// SR = AC, except that the Sense-A and Sense-B bits are external pins
    /// and keep their current values.
    CAS,

    /// No Operation
    NOP,

    /// Serial Input/Output
    ///
    /// Shifts ER right one bit. The serial input pin is not emulated, so a
    /// zero shifts in at bit 7.
    SIO,

    /// Shift Right
    ///
    /// AC >>= 1; bit 7 becomes 0.
    SR,

    /// Shift Right with Link
    ///
    /// AC is shifted right one bit and the carry is copied into bit 7 of
    /// AC. Carry occupies bit 7 of SR, so the copy is a direct OR; the
    /// carry itself is not changed.
    SRL,

    /// Rotate Right
    ///
    /// AC rotates right one bit; bit 0 moves to bit 7.
    RR,

    /// Rotate Right with Link
    ///
    /// AC rotates right through carry: the old carry enters bit 7 of AC
    /// and the old bit 0 of AC becomes the new carry.
    RRL,

    /// Put Character (NIBL extension)
    ///
    /// Writes the low seven bits of AC to the console.
    PUTC,

    /// Get Character (NIBL extension)
    ///
    /// Reads one character, uppercases it, maps LF to CR, and stores it
    /// into both AC and ER.
    GETC,

    /// Exchange Pointer Low
    ///
    /// AC <-> low byte of the pointer.
    XPAL(Pointer),

    /// Exchange Pointer High
    ///
    /// AC <-> high byte of the pointer.
    XPAH(Pointer),

    /// Exchange Pointer with PC
    ///
    /// PC <-> pointer. The hardware call/return primitive, and the
    /// interrupt entry when combined with P3.
    XPPC(Pointer),

    /// Load AC from Extension
    ///
    /// AC = ER
    LDE,

    /// AND Extension
    ///
    /// AC &= ER
    ANE,

    /// OR Extension
    ///
    /// AC |= ER
    ORE,

    /// Exclusive-OR Extension
    ///
    /// AC ^= ER
    XRE,

    /// Decimal Add Extension
    ///
    /// AC = BCD sum of AC, ER and carry.
    DAE,

    /// Add Extension
    ///
    /// AC = AC + ER + carry; sets carry and overflow.
    ADE,

    /// Complement and Add Extension
    ///
    /// AC = AC + !ER + carry; a two's-complement subtraction when carry is
    /// set beforehand.
    CAE,

    /// Delay
    ///
    /// Busy-waits for 13 + 2*AC + 2*disp + (disp << 9) microcycles.
    DLY,

    /// Jump
    ///
    /// PC = EA. The next opcode is fetched from EA + 1.
    JMP(Pointer),

    /// Jump if Positive
    ///
    /// PC = EA when bit 7 of AC is clear.
    JP(Pointer),

    /// Jump if Zero
    ///
    /// PC = EA when AC is zero.
    JZ(Pointer),

    /// Jump if Not Zero
    ///
    /// PC = EA when AC is non-zero.
    JNZ(Pointer),

    /// Increment and Load
    ///
    /// mem[EA] += 1; AC = mem[EA]. Flags are not touched.
    ILD(Pointer),

    /// Decrement and Load
    ///
    /// mem[EA] -= 1; AC = mem[EA]. Flags are not touched.
    DLD(Pointer),

    /// Load
    ///
    /// AC = data. The immediate form is LDI.
    LD(AddressingMode),

    /// Store
    ///
    /// mem[EA] = AC. There is no immediate form; that encoding is
    /// undefined.
    ST(AddressingMode),

    /// AND
    ///
    /// AC &= data. The immediate form is ANI.
    AND(AddressingMode),

    /// OR
    ///
    /// AC |= data. The immediate form is ORI.
    OR(AddressingMode),

    /// Exclusive-OR
    ///
    /// AC ^= data. The immediate form is XRI.
    XOR(AddressingMode),

    /// Decimal Add
    ///
    /// AC = BCD sum of AC, data and carry. The immediate form is DAI.
    DAD(AddressingMode),

    /// Add
    ///
    /// AC = AC + data + carry; sets carry and overflow. The immediate form
    /// is ADI.
    ADD(AddressingMode),

    /// Complement and Add
    ///
    /// AC = AC + !data + carry. The immediate form is CAI.
    CAD(AddressingMode),
}

impl Instruction {
    /// Decodes one opcode byte; `None` is an undefined instruction.
    pub fn from_opcode(opcode: u8) -> Option<Self> {
        use Instruction::*;

        let pointer = Pointer::from_opcode(opcode);
        let mode = AddressingMode::from_opcode(opcode);

        let instruction = match opcode {
            0x00 => HALT,
            0x01 => XAE,
            0x02 => CCL,
            0x03 => SCL,
            0x04 => DINT,
            0x05 => IEN,
            0x06 => CSA,
            0x07 => CAS,
            0x08 => NOP,
            0x19 => SIO,
            0x1C => SR,
            0x1D => SRL,
            0x1E => RR,
            0x1F => RRL,
            0x20 => PUTC,
            0x21 => GETC,
            0x30..=0x33 => XPAL(pointer),
            0x34..=0x37 => XPAH(pointer),
            0x3C..=0x3F => XPPC(pointer),
            0x40 => LDE,
            0x50 => ANE,
            0x58 => ORE,
            0x60 => XRE,
            0x68 => DAE,
            0x70 => ADE,
            0x78 => CAE,
            0x8F => DLY,
            0x90..=0x93 => JMP(pointer),
            0x94..=0x97 => JP(pointer),
            0x98..=0x9B => JZ(pointer),
            0x9C..=0x9F => JNZ(pointer),
            0xA8..=0xAB => ILD(pointer),
            0xB8..=0xBB => DLD(pointer),
            0xC0..=0xC7 => LD(mode),
            0xC8..=0xCF => ST(mode),
            0xD0..=0xD7 => AND(mode),
            0xD8..=0xDF => OR(mode),
            0xE0..=0xE7 => XOR(mode),
            0xE8..=0xEF => DAD(mode),
            0xF0..=0xF7 => ADD(mode),
            0xF8..=0xFF => CAD(mode),
            _ => return None,
        };
        Some(instruction)
    }

    /// The assembler mnemonic, with the immediate forms under their own
    /// names.
    pub fn mnemonic(self) -> &'static str {
        use Instruction::*;

        match self {
            HALT => "HALT",
            XAE => "XAE",
            CCL => "CCL",
            SCL => "SCL",
            DINT => "DINT",
            IEN => "IEN",
            CSA => "CSA",
            CAS => "CAS",
            NOP => "NOP",
            SIO => "SIO",
            SR => "SR",
            SRL => "SRL",
            RR => "RR",
            RRL => "RRL",
            PUTC => "PUTC",
            GETC => "GETC",
            XPAL(_) => "XPAL",
            XPAH(_) => "XPAH",
            XPPC(_) => "XPPC",
            LDE => "LDE",
            ANE => "ANE",
            ORE => "ORE",
            XRE => "XRE",
            DAE => "DAE",
            ADE => "ADE",
            CAE => "CAE",
            DLY => "DLY",
            JMP(_) => "JMP",
            JP(_) => "JP",
            JZ(_) => "JZ",
            JNZ(_) => "JNZ",
            ILD(_) => "ILD",
            DLD(_) => "DLD",
            LD(AddressingMode::Immediate) => "LDI",
            LD(_) => "LD",
            ST(_) => "ST",
            AND(AddressingMode::Immediate) => "ANI",
            AND(_) => "AND",
            OR(AddressingMode::Immediate) => "ORI",
            OR(_) => "OR",
            XOR(AddressingMode::Immediate) => "XRI",
            XOR(_) => "XOR",
            DAD(AddressingMode::Immediate) => "DAI",
            DAD(_) => "DAD",
            ADD(AddressingMode::Immediate) => "ADI",
            ADD(_) => "ADD",
            CAD(AddressingMode::Immediate) => "CAI",
            CAD(_) => "CAD",
        }
    }
}

/// True when the opcode carries a displacement byte.
pub fn is_double_byte(opcode: u8) -> bool {
    opcode & 0x80 != 0
}

/// Raw opcode bytes, for assembling test programs with `mem!`.
pub mod opcodes {
    pub const HALT: u8 = 0x00;
    pub const XAE: u8 = 0x01;
    pub const CCL: u8 = 0x02;
    pub const SCL: u8 = 0x03;
    pub const DINT: u8 = 0x04;
    pub const IEN: u8 = 0x05;
    pub const CSA: u8 = 0x06;
    pub const CAS: u8 = 0x07;
    pub const NOP: u8 = 0x08;
    pub const SIO: u8 = 0x19;
    pub const SR: u8 = 0x1C;
    pub const SRL: u8 = 0x1D;
    pub const RR: u8 = 0x1E;
    pub const RRL: u8 = 0x1F;
    pub const PUTC: u8 = 0x20;
    pub const GETC: u8 = 0x21;

    pub const XPAL_PC: u8 = 0x30;
    pub const XPAL_P1: u8 = 0x31;
    pub const XPAL_P2: u8 = 0x32;
    pub const XPAL_P3: u8 = 0x33;
    pub const XPAH_PC: u8 = 0x34;
    pub const XPAH_P1: u8 = 0x35;
    pub const XPAH_P2: u8 = 0x36;
    pub const XPAH_P3: u8 = 0x37;
    pub const XPPC_PC: u8 = 0x3C;
    pub const XPPC_P1: u8 = 0x3D;
    pub const XPPC_P2: u8 = 0x3E;
    pub const XPPC_P3: u8 = 0x3F;

    pub const LDE: u8 = 0x40;
    pub const ANE: u8 = 0x50;
    pub const ORE: u8 = 0x58;
    pub const XRE: u8 = 0x60;
    pub const DAE: u8 = 0x68;
    pub const ADE: u8 = 0x70;
    pub const CAE: u8 = 0x78;

    pub const DLY: u8 = 0x8F;

    pub const JMP: u8 = 0x90;
    pub const JMP_P1: u8 = 0x91;
    pub const JMP_P2: u8 = 0x92;
    pub const JMP_P3: u8 = 0x93;
    pub const JP: u8 = 0x94;
    pub const JP_P1: u8 = 0x95;
    pub const JZ: u8 = 0x98;
    pub const JZ_P1: u8 = 0x99;
    pub const JNZ: u8 = 0x9C;
    pub const JNZ_P1: u8 = 0x9D;

    pub const ILD: u8 = 0xA8;
    pub const ILD_P1: u8 = 0xA9;
    pub const ILD_P2: u8 = 0xAA;
    pub const ILD_P3: u8 = 0xAB;
    pub const DLD: u8 = 0xB8;
    pub const DLD_P1: u8 = 0xB9;
    pub const DLD_P2: u8 = 0xBA;
    pub const DLD_P3: u8 = 0xBB;

    pub const LD: u8 = 0xC0;
    pub const LD_P1: u8 = 0xC1;
    pub const LD_P2: u8 = 0xC2;
    pub const LD_P3: u8 = 0xC3;
    pub const LDI: u8 = 0xC4;
    pub const LD_AUTO_P1: u8 = 0xC5;
    pub const LD_AUTO_P2: u8 = 0xC6;
    pub const LD_AUTO_P3: u8 = 0xC7;

    pub const ST: u8 = 0xC8;
    pub const ST_P1: u8 = 0xC9;
    pub const ST_P2: u8 = 0xCA;
    pub const ST_P3: u8 = 0xCB;
    pub const ST_IMMEDIATE: u8 = 0xCC;
    pub const ST_AUTO_P1: u8 = 0xCD;
    pub const ST_AUTO_P2: u8 = 0xCE;
    pub const ST_AUTO_P3: u8 = 0xCF;

    pub const AND: u8 = 0xD0;
    pub const AND_P1: u8 = 0xD1;
    pub const ANI: u8 = 0xD4;
    pub const AND_AUTO_P1: u8 = 0xD5;

    pub const OR: u8 = 0xD8;
    pub const OR_P1: u8 = 0xD9;
    pub const ORI: u8 = 0xDC;
    pub const OR_AUTO_P1: u8 = 0xDD;

    pub const XOR: u8 = 0xE0;
    pub const XOR_P1: u8 = 0xE1;
    pub const XRI: u8 = 0xE4;
    pub const XOR_AUTO_P1: u8 = 0xE5;

    pub const DAD: u8 = 0xE8;
    pub const DAD_P1: u8 = 0xE9;
    pub const DAI: u8 = 0xEC;
    pub const DAD_AUTO_P1: u8 = 0xED;

    pub const ADD: u8 = 0xF0;
    pub const ADD_P1: u8 = 0xF1;
    pub const ADI: u8 = 0xF4;
    pub const ADD_AUTO_P1: u8 = 0xF5;

    pub const CAD: u8 = 0xF8;
    pub const CAD_P1: u8 = 0xF9;
    pub const CAI: u8 = 0xFC;
    pub const CAD_AUTO_P1: u8 = 0xFD;
}

#[cfg(test)]
mod tests {
    use yare::parameterized;

    use super::Instruction::*;
    use super::*;
    use crate::cpu::addressing_modes::{AddressingMode, Pointer};

    #[parameterized(
        halt    = { 0x00, HALT },
        cas     = { 0x07, CAS },
        sio     = { 0x19, SIO },
        getc    = { 0x21, GETC },
        xpal_p2 = { 0x32, XPAL(Pointer::P2) },
        xpah_pc = { 0x34, XPAH(Pointer::PC) },
        xppc_p3 = { 0x3F, XPPC(Pointer::P3) },
        cae     = { 0x78, CAE },
        dly     = { 0x8F, DLY },
        jmp     = { 0x90, JMP(Pointer::PC) },
        jnz_p3  = { 0x9F, JNZ(Pointer::P3) },
        ild_p1  = { 0xA9, ILD(Pointer::P1) },
        dld_p3  = { 0xBB, DLD(Pointer::P3) },
        ld_p1   = { 0xC1, LD(AddressingMode::Indexed(Pointer::P1)) },
        ldi     = { 0xC4, LD(AddressingMode::Immediate) },
        ld_auto = { 0xC5, LD(AddressingMode::AutoIndexed(Pointer::P1)) },
        st_imm  = { 0xCC, ST(AddressingMode::Immediate) },
        cai     = { 0xFC, CAD(AddressingMode::Immediate) },
        cad_max = { 0xFF, CAD(AddressingMode::AutoIndexed(Pointer::P3)) },
    )]
    fn decodes_defined_opcodes(opcode: u8, expected: Instruction) {
        assert_eq!(Instruction::from_opcode(opcode), Some(expected));
    }

    #[parameterized(
        gap_after_nop   = { 0x09 },
        gap_before_sio  = { 0x18 },
        gap_after_getc  = { 0x22 },
        gap_before_xppc = { 0x38 },
        gap_after_lde   = { 0x41 },
        lowest_double   = { 0x80 },
        gap_before_ild  = { 0xA0 },
        gap_after_ild   = { 0xAC },
        gap_before_dld  = { 0xB7 },
        gap_after_dld   = { 0xBC },
    )]
    fn rejects_undefined_opcodes(opcode: u8) {
        assert_eq!(Instruction::from_opcode(opcode), None);
    }

    #[test]
    fn immediate_forms_take_their_own_mnemonics() {
        assert_eq!(Instruction::from_opcode(0xC4).unwrap().mnemonic(), "LDI");
        assert_eq!(Instruction::from_opcode(0xC1).unwrap().mnemonic(), "LD");
        assert_eq!(Instruction::from_opcode(0xF4).unwrap().mnemonic(), "ADI");
        assert_eq!(Instruction::from_opcode(0xEC).unwrap().mnemonic(), "DAI");
    }

    #[test]
    fn width_is_decided_by_bit_7() {
        assert!(!is_double_byte(0x00));
        assert!(!is_double_byte(0x7F));
        assert!(is_double_byte(0x80));
        assert!(is_double_byte(0xC4));
    }
}

/// Pointer register selected by the low two bits of an opcode. `PC` is
/// pointer 0, the program counter.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Pointer {
    PC,
    P1,
    P2,
    P3,
}

impl Pointer {
    pub fn from_opcode(opcode: u8) -> Self {
        match opcode & 0x03 {
            0 => Pointer::PC,
            1 => Pointer::P1,
            2 => Pointer::P2,
            _ => Pointer::P3,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Pointer::PC => "PC",
            Pointer::P1 => "P1",
            Pointer::P2 => "P2",
            Pointer::P3 => "P3",
        }
    }
}

/// Addressing mode of a memory-reference instruction, from the low three
/// bits of the opcode: bit 2 selects auto-indexing, bits 1..0 the pointer.
/// The pattern `100` (auto-indexed on the program counter) is the immediate
/// form instead.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AddressingMode {
    Indexed(Pointer),
    AutoIndexed(Pointer),
    Immediate,
}

impl AddressingMode {
    pub fn from_opcode(opcode: u8) -> Self {
        match opcode & 0x07 {
            0x04 => AddressingMode::Immediate,
            bits if bits & 0x04 != 0 => AddressingMode::AutoIndexed(Pointer::from_opcode(bits)),
            bits => AddressingMode::Indexed(Pointer::from_opcode(bits)),
        }
    }
}

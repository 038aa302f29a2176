#![allow(clippy::upper_case_acronyms)] // CPU and mnemonic names like XPAL read better uppercase

pub use crate::address::Address;
pub use crate::console::BufferConsole;
pub use crate::console::Console;
pub use crate::console::StdConsole;
pub use crate::cpu::is_double_byte;
pub use crate::cpu::opcodes;
pub use crate::cpu::AddressingMode;
pub use crate::cpu::CpuStatus;
pub use crate::cpu::Instruction;
pub use crate::cpu::Pointer;
pub use crate::cpu::RunMode;
pub use crate::cpu::Status;
pub use crate::cpu::CPU;
pub use crate::disasm::Disassembler;
pub use crate::disasm::Disassembly;
pub use crate::memory::hex_dump;
pub use crate::memory::ArrayMemory;
pub use crate::memory::Memory;
pub use crate::monitor::Monitor;
pub use crate::srec::LoadSummary;
pub use crate::srec::SRecReadError;

mod address;
mod console;
mod cpu;
mod disasm;
mod memory;
mod monitor;
pub mod srec;

/// Builds an [`ArrayMemory`] from byte listings, for tests:
///
/// ```
/// use scmp_rust::{mem, opcodes::*};
///
/// let memory = mem!(
///     1 => { LDI, 0x42u8 }
///     0x0F00 => { 0xAAu8 }
/// );
/// ```
#[macro_export]
macro_rules! mem {
    ($( $data: expr ),* $(,)? ) => {
        mem!{0 => { $($data),* }}
    };
    ($( $offset: expr => { $( $data: expr ),* $(,)? } )*) => {
        {
            #[allow(unused_variables, unused_mut)]
            let mut memory = $crate::ArrayMemory::default();
            $(
                #[allow(unused_variables, unused_mut)]
                let mut addr: $crate::Address = $crate::Address::from($offset);
                $(
                    let byte: u8 = $data;
                    $crate::Memory::write(&mut memory, addr, byte);
                    addr += 1u16;
                )*
            )*
            memory
        }
    };
    ($offset: expr => $data: expr) => {
        mem!{$offset => { $data }}
    };
}

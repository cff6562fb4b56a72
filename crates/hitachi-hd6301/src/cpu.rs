//! HD6301 CPU core.
//!
//! Instruction-stepped: each `step()` executes one whole instruction (or
//! enters one interrupt) and returns its cycle count from the HD6301V1
//! datasheet. The caller ticks the on-chip timer and SCI with that count.

use ikbd_core::{Bus, Cpu, Cycles, Observable, Value};

use crate::flags::{C, H, I, N, V, Z};
use crate::{Ccr, Registers};

/// Interrupt and reset vector addresses.
pub mod vectors {
    pub const TRAP: u16 = 0xFFEE;
    pub const SCI: u16 = 0xFFF0;
    pub const TOF: u16 = 0xFFF2;
    pub const OCF: u16 = 0xFFF4;
    pub const ICF: u16 = 0xFFF6;
    pub const IRQ1: u16 = 0xFFF8;
    pub const SWI: u16 = 0xFFFA;
    pub const NMI: u16 = 0xFFFC;
    pub const RESET: u16 = 0xFFFE;
}

/// Cycles to stack the machine state and fetch a vector.
const INTERRUPT_CYCLES: u8 = 12;

/// Cycles to leave `WAI`, whose state is already on the stack.
const WAKE_CYCLES: u8 = 4;

/// Cycle counts per addressing mode: immediate, direct, indexed, extended.
const ALU8_CYCLES: [u8; 4] = [2, 3, 4, 4];
const ALU16_CYCLES: [u8; 4] = [3, 4, 5, 5];
const STORE8_CYCLES: [u8; 4] = [0, 3, 4, 4];
const STORE16_CYCLES: [u8; 4] = [0, 4, 5, 5];
const JSR_CYCLES: [u8; 4] = [0, 5, 5, 6];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Running,
    /// `WAI`: registers are stacked, waiting for an unmasked interrupt.
    Waiting,
    /// `SLP`: nothing stacked, any interrupt request wakes the core.
    Sleeping,
}

/// The HD6301 CPU.
///
/// Runs the 6801 instruction set plus the HD6301 additions (`AIM`, `OIM`,
/// `EIM`, `TIM`, `XGDX`, `SLP`). Undefined opcodes take the TRAP vector.
#[derive(Debug)]
pub struct Hd6301Cpu {
    pub regs: Registers,
    state: State,
    /// External IRQ1 line level.
    irq_line: bool,
    nmi_pending: bool,
    /// Highest-priority on-chip request, supplied by the MCU each step.
    internal_vector: Option<u16>,
    total_cycles: u64,
}

impl Default for Hd6301Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl Hd6301Cpu {
    #[must_use]
    pub fn new() -> Self {
        Self {
            regs: Registers::new(),
            state: State::Running,
            irq_line: false,
            nmi_pending: false,
            internal_vector: None,
            total_cycles: 0,
        }
    }

    /// Post the highest-priority pending on-chip interrupt (timer, SCI).
    pub fn set_internal_interrupt(&mut self, vector: Option<u16>) {
        self.internal_vector = vector;
    }

    #[must_use]
    pub fn total_cycles(&self) -> u64 {
        self.total_cycles
    }

    fn step_inner<B: Bus>(&mut self, bus: &mut B) -> u8 {
        if self.nmi_pending {
            self.nmi_pending = false;
            return self.enter_interrupt(bus, vectors::NMI);
        }

        let request = if self.irq_line {
            Some(vectors::IRQ1)
        } else {
            self.internal_vector
        };
        if let Some(vector) = request {
            if !self.regs.ccr.is_set(I) {
                return self.enter_interrupt(bus, vector);
            }
            // A masked request still ends SLP; execution carries on.
            if self.state == State::Sleeping {
                self.state = State::Running;
            }
        }

        if self.state != State::Running {
            return 1;
        }

        let opcode = self.fetch(bus);
        self.execute(bus, opcode)
    }

    fn enter_interrupt<B: Bus>(&mut self, bus: &mut B, vector: u16) -> u8 {
        let cycles = if self.state == State::Waiting {
            WAKE_CYCLES
        } else {
            self.push_state(bus);
            INTERRUPT_CYCLES
        };
        self.state = State::Running;
        self.regs.ccr.set(I);
        self.regs.pc = bus.read_word(vector);
        cycles
    }

    fn trap<B: Bus>(&mut self, bus: &mut B, opcode: u8) -> u8 {
        log::debug!(
            "HD6301: undefined opcode {opcode:#04X} at {:#06X}, taking TRAP",
            self.regs.pc.wrapping_sub(1)
        );
        self.push_state(bus);
        self.regs.ccr.set(I);
        self.regs.pc = bus.read_word(vectors::TRAP);
        INTERRUPT_CYCLES
    }

    // --- fetch and addressing ---

    fn fetch<B: Bus>(&mut self, bus: &mut B) -> u8 {
        let value = bus.read(self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        value
    }

    fn fetch_word<B: Bus>(&mut self, bus: &mut B) -> u16 {
        let value = bus.read_word(self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(2);
        value
    }

    fn addr_direct<B: Bus>(&mut self, bus: &mut B) -> u16 {
        u16::from(self.fetch(bus))
    }

    fn addr_indexed<B: Bus>(&mut self, bus: &mut B) -> u16 {
        let offset = self.fetch(bus);
        self.regs.x.wrapping_add(u16::from(offset))
    }

    /// Effective address for modes 1 (direct), 2 (indexed), 3 (extended).
    fn operand_addr<B: Bus>(&mut self, bus: &mut B, mode: u8) -> u16 {
        match mode {
            1 => self.addr_direct(bus),
            2 => self.addr_indexed(bus),
            _ => self.fetch_word(bus),
        }
    }

    fn operand8<B: Bus>(&mut self, bus: &mut B, mode: u8) -> u8 {
        if mode == 0 {
            self.fetch(bus)
        } else {
            let addr = self.operand_addr(bus, mode);
            bus.read(addr)
        }
    }

    fn operand16<B: Bus>(&mut self, bus: &mut B, mode: u8) -> u16 {
        if mode == 0 {
            self.fetch_word(bus)
        } else {
            let addr = self.operand_addr(bus, mode);
            bus.read_word(addr)
        }
    }

    // --- stack ---

    fn push8<B: Bus>(&mut self, bus: &mut B, value: u8) {
        bus.write(self.regs.sp, value);
        self.regs.sp = self.regs.sp.wrapping_sub(1);
    }

    fn push16<B: Bus>(&mut self, bus: &mut B, value: u16) {
        let [hi, lo] = value.to_be_bytes();
        self.push8(bus, lo);
        self.push8(bus, hi);
    }

    fn pull8<B: Bus>(&mut self, bus: &mut B) -> u8 {
        self.regs.sp = self.regs.sp.wrapping_add(1);
        bus.read(self.regs.sp)
    }

    fn pull16<B: Bus>(&mut self, bus: &mut B) -> u16 {
        let hi = self.pull8(bus);
        let lo = self.pull8(bus);
        u16::from_be_bytes([hi, lo])
    }

    /// Stack PC, X, A, B and CCR, as for every interrupt.
    fn push_state<B: Bus>(&mut self, bus: &mut B) {
        self.push16(bus, self.regs.pc);
        self.push16(bus, self.regs.x);
        self.push8(bus, self.regs.a);
        self.push8(bus, self.regs.b);
        self.push8(bus, self.regs.ccr.to_byte());
    }

    // --- arithmetic ---

    fn add8(&mut self, a: u8, m: u8, carry_in: bool) -> u8 {
        let c = u8::from(carry_in);
        let wide = u16::from(a) + u16::from(m) + u16::from(c);
        let r = wide as u8;
        let ccr = &mut self.regs.ccr;
        ccr.set_if(H, (a & 0x0F) + (m & 0x0F) + c > 0x0F);
        ccr.set_if(V, !(a ^ m) & (a ^ r) & 0x80 != 0);
        ccr.set_if(C, wide > 0xFF);
        ccr.update_nz(r);
        r
    }

    fn sub8(&mut self, a: u8, m: u8, borrow_in: bool) -> u8 {
        let borrow = u16::from(borrow_in);
        let r = a.wrapping_sub(m).wrapping_sub(borrow_in.into());
        let ccr = &mut self.regs.ccr;
        ccr.set_if(V, (a ^ m) & (a ^ r) & 0x80 != 0);
        ccr.set_if(C, u16::from(m) + borrow > u16::from(a));
        ccr.update_nz(r);
        r
    }

    fn add16(&mut self, a: u16, m: u16) -> u16 {
        let wide = u32::from(a) + u32::from(m);
        let r = wide as u16;
        let ccr = &mut self.regs.ccr;
        ccr.set_if(V, !(a ^ m) & (a ^ r) & 0x8000 != 0);
        ccr.set_if(C, wide > 0xFFFF);
        ccr.update_nz16(r);
        r
    }

    fn sub16(&mut self, a: u16, m: u16) -> u16 {
        let r = a.wrapping_sub(m);
        let ccr = &mut self.regs.ccr;
        ccr.set_if(V, (a ^ m) & (a ^ r) & 0x8000 != 0);
        ccr.set_if(C, m > a);
        ccr.update_nz16(r);
        r
    }

    fn daa(&mut self) {
        let a = self.regs.a;
        let lsn = a & 0x0F;
        let msn = a >> 4;
        let mut correction = 0u8;
        let mut carry = self.regs.ccr.is_set(C);
        if self.regs.ccr.is_set(H) || lsn > 9 {
            correction |= 0x06;
        }
        if carry || msn > 9 || (msn > 8 && lsn > 9) {
            correction |= 0x60;
            carry = true;
        }
        let r = a.wrapping_add(correction);
        self.regs.a = r;
        self.regs.ccr.update_nz(r);
        self.regs.ccr.clear(V);
        self.regs.ccr.set_if(C, carry);
    }

    /// Single-operand operations shared by the accumulator (0x4x/0x5x) and
    /// memory (0x6x/0x7x) rows, selected by the low opcode nibble.
    fn unary(&mut self, op: u8, m: u8) -> u8 {
        let carry_in = self.regs.ccr.is_set(C);
        let ccr = &mut self.regs.ccr;
        match op {
            // NEG
            0x0 => {
                let r = 0u8.wrapping_sub(m);
                ccr.update_nz(r);
                ccr.set_if(V, r == 0x80);
                ccr.set_if(C, r != 0);
                r
            }
            // COM
            0x3 => {
                let r = !m;
                ccr.update_logic(r);
                ccr.set(C);
                r
            }
            // LSR
            0x4 => {
                let r = m >> 1;
                ccr.set_if(C, m & 0x01 != 0);
                ccr.update_nz(r);
                ccr.update_shift_overflow();
                r
            }
            // ROR
            0x6 => {
                let r = (m >> 1) | if carry_in { 0x80 } else { 0 };
                ccr.set_if(C, m & 0x01 != 0);
                ccr.update_nz(r);
                ccr.update_shift_overflow();
                r
            }
            // ASR
            0x7 => {
                let r = (m >> 1) | (m & 0x80);
                ccr.set_if(C, m & 0x01 != 0);
                ccr.update_nz(r);
                ccr.update_shift_overflow();
                r
            }
            // ASL
            0x8 => {
                let r = m << 1;
                ccr.set_if(C, m & 0x80 != 0);
                ccr.update_nz(r);
                ccr.update_shift_overflow();
                r
            }
            // ROL
            0x9 => {
                let r = (m << 1) | u8::from(carry_in);
                ccr.set_if(C, m & 0x80 != 0);
                ccr.update_nz(r);
                ccr.update_shift_overflow();
                r
            }
            // DEC
            0xA => {
                let r = m.wrapping_sub(1);
                ccr.update_nz(r);
                ccr.set_if(V, m == 0x80);
                r
            }
            // INC
            0xC => {
                let r = m.wrapping_add(1);
                ccr.update_nz(r);
                ccr.set_if(V, m == 0x7F);
                r
            }
            // TST
            0xD => {
                ccr.update_logic(m);
                ccr.clear(C);
                m
            }
            // CLR
            _ => {
                ccr.clear(N | V | C);
                ccr.set(Z);
                0
            }
        }
    }

    // --- decode ---

    fn execute<B: Bus>(&mut self, bus: &mut B, opcode: u8) -> u8 {
        match opcode {
            0x00..=0x1F => self.execute_inherent(bus, opcode),
            0x20..=0x2F => self.execute_branch(bus, opcode),
            0x30..=0x3F => self.execute_stack(bus, opcode),
            0x40..=0x5F => self.execute_accumulator(bus, opcode),
            0x60..=0x7F => self.execute_memory(bus, opcode),
            _ => self.execute_alu(bus, opcode),
        }
    }

    fn execute_inherent<B: Bus>(&mut self, bus: &mut B, opcode: u8) -> u8 {
        match opcode {
            // NOP
            0x01 => 1,
            // LSRD
            0x04 => {
                let d = self.regs.d();
                let r = d >> 1;
                self.regs.set_d(r);
                self.regs.ccr.set_if(C, d & 0x0001 != 0);
                self.regs.ccr.update_nz16(r);
                self.regs.ccr.update_shift_overflow();
                1
            }
            // ASLD
            0x05 => {
                let d = self.regs.d();
                let r = d << 1;
                self.regs.set_d(r);
                self.regs.ccr.set_if(C, d & 0x8000 != 0);
                self.regs.ccr.update_nz16(r);
                self.regs.ccr.update_shift_overflow();
                1
            }
            // TAP
            0x06 => {
                self.regs.ccr = Ccr::from_byte(self.regs.a);
                1
            }
            // TPA
            0x07 => {
                self.regs.a = self.regs.ccr.to_byte();
                1
            }
            // INX
            0x08 => {
                self.regs.x = self.regs.x.wrapping_add(1);
                self.regs.ccr.set_if(Z, self.regs.x == 0);
                1
            }
            // DEX
            0x09 => {
                self.regs.x = self.regs.x.wrapping_sub(1);
                self.regs.ccr.set_if(Z, self.regs.x == 0);
                1
            }
            0x0A => {
                self.regs.ccr.clear(V);
                1
            }
            0x0B => {
                self.regs.ccr.set(V);
                1
            }
            0x0C => {
                self.regs.ccr.clear(C);
                1
            }
            0x0D => {
                self.regs.ccr.set(C);
                1
            }
            0x0E => {
                self.regs.ccr.clear(I);
                1
            }
            0x0F => {
                self.regs.ccr.set(I);
                1
            }
            // SBA
            0x10 => {
                self.regs.a = self.sub8(self.regs.a, self.regs.b, false);
                1
            }
            // CBA
            0x11 => {
                self.sub8(self.regs.a, self.regs.b, false);
                1
            }
            // TAB
            0x16 => {
                self.regs.b = self.regs.a;
                self.regs.ccr.update_logic(self.regs.b);
                1
            }
            // TBA
            0x17 => {
                self.regs.a = self.regs.b;
                self.regs.ccr.update_logic(self.regs.a);
                1
            }
            // XGDX
            0x18 => {
                let d = self.regs.d();
                self.regs.set_d(self.regs.x);
                self.regs.x = d;
                2
            }
            0x19 => {
                self.daa();
                2
            }
            // SLP
            0x1A => {
                self.state = State::Sleeping;
                4
            }
            // ABA
            0x1B => {
                self.regs.a = self.add8(self.regs.a, self.regs.b, false);
                1
            }
            _ => self.trap(bus, opcode),
        }
    }

    fn execute_branch<B: Bus>(&mut self, bus: &mut B, opcode: u8) -> u8 {
        let offset = self.fetch(bus) as i8;
        let ccr = self.regs.ccr;
        let n = ccr.is_set(N);
        let z = ccr.is_set(Z);
        let v = ccr.is_set(V);
        let c = ccr.is_set(C);
        let taken = match opcode & 0x0F {
            0x0 => true,         // BRA
            0x1 => false,        // BRN
            0x2 => !(c || z),    // BHI
            0x3 => c || z,       // BLS
            0x4 => !c,           // BCC
            0x5 => c,            // BCS
            0x6 => !z,           // BNE
            0x7 => z,            // BEQ
            0x8 => !v,           // BVC
            0x9 => v,            // BVS
            0xA => !n,           // BPL
            0xB => n,            // BMI
            0xC => n == v,       // BGE
            0xD => n != v,       // BLT
            0xE => !z && n == v, // BGT
            _ => z || n != v,    // BLE
        };
        if taken {
            self.regs.pc = self.regs.pc.wrapping_add_signed(i16::from(offset));
        }
        3
    }

    fn execute_stack<B: Bus>(&mut self, bus: &mut B, opcode: u8) -> u8 {
        match opcode {
            // TSX
            0x30 => {
                self.regs.x = self.regs.sp.wrapping_add(1);
                1
            }
            // INS
            0x31 => {
                self.regs.sp = self.regs.sp.wrapping_add(1);
                1
            }
            0x32 => {
                self.regs.a = self.pull8(bus);
                3
            }
            0x33 => {
                self.regs.b = self.pull8(bus);
                3
            }
            // DES
            0x34 => {
                self.regs.sp = self.regs.sp.wrapping_sub(1);
                1
            }
            // TXS
            0x35 => {
                self.regs.sp = self.regs.x.wrapping_sub(1);
                1
            }
            0x36 => {
                self.push8(bus, self.regs.a);
                4
            }
            0x37 => {
                self.push8(bus, self.regs.b);
                4
            }
            // PULX
            0x38 => {
                self.regs.x = self.pull16(bus);
                4
            }
            // RTS
            0x39 => {
                self.regs.pc = self.pull16(bus);
                5
            }
            // ABX
            0x3A => {
                self.regs.x = self.regs.x.wrapping_add(u16::from(self.regs.b));
                1
            }
            // RTI
            0x3B => {
                self.regs.ccr = Ccr::from_byte(self.pull8(bus));
                self.regs.b = self.pull8(bus);
                self.regs.a = self.pull8(bus);
                self.regs.x = self.pull16(bus);
                self.regs.pc = self.pull16(bus);
                10
            }
            // PSHX
            0x3C => {
                self.push16(bus, self.regs.x);
                5
            }
            // MUL
            0x3D => {
                let r = u16::from(self.regs.a) * u16::from(self.regs.b);
                self.regs.set_d(r);
                self.regs.ccr.set_if(C, r & 0x0080 != 0);
                7
            }
            // WAI
            0x3E => {
                self.push_state(bus);
                self.state = State::Waiting;
                9
            }
            // SWI
            _ => {
                self.push_state(bus);
                self.regs.ccr.set(I);
                self.regs.pc = bus.read_word(vectors::SWI);
                12
            }
        }
    }

    fn execute_accumulator<B: Bus>(&mut self, bus: &mut B, opcode: u8) -> u8 {
        let op = opcode & 0x0F;
        if matches!(op, 0x1 | 0x2 | 0x5 | 0xB | 0xE) {
            return self.trap(bus, opcode);
        }
        let on_b = opcode >= 0x50;
        let value = if on_b { self.regs.b } else { self.regs.a };
        let result = self.unary(op, value);
        if on_b {
            self.regs.b = result;
        } else {
            self.regs.a = result;
        }
        1
    }

    fn execute_memory<B: Bus>(&mut self, bus: &mut B, opcode: u8) -> u8 {
        let op = opcode & 0x0F;
        let indexed = opcode < 0x70;
        match op {
            // AIM, OIM, EIM, TIM: immediate mask, then direct or indexed address.
            0x1 | 0x2 | 0x5 | 0xB => {
                let mask = self.fetch(bus);
                let addr = if indexed {
                    self.addr_indexed(bus)
                } else {
                    self.addr_direct(bus)
                };
                let m = bus.read(addr);
                let r = match op {
                    0x2 => m | mask,
                    0x5 => m ^ mask,
                    _ => m & mask,
                };
                self.regs.ccr.update_logic(r);
                if op != 0xB {
                    bus.write(addr, r);
                }
                match (op, indexed) {
                    (0xB, true) => 5,
                    (0xB, false) => 4,
                    (_, true) => 7,
                    (_, false) => 6,
                }
            }
            // JMP
            0xE => {
                self.regs.pc = self.operand_addr(bus, if indexed { 2 } else { 3 });
                3
            }
            // TST
            0xD => {
                let addr = self.operand_addr(bus, if indexed { 2 } else { 3 });
                let m = bus.read(addr);
                self.unary(op, m);
                4
            }
            // CLR
            0xF => {
                let addr = self.operand_addr(bus, if indexed { 2 } else { 3 });
                self.unary(op, 0);
                bus.write(addr, 0);
                5
            }
            _ => {
                let addr = self.operand_addr(bus, if indexed { 2 } else { 3 });
                let m = bus.read(addr);
                let r = self.unary(op, m);
                bus.write(addr, r);
                6
            }
        }
    }

    fn execute_alu<B: Bus>(&mut self, bus: &mut B, opcode: u8) -> u8 {
        let mode = (opcode >> 4) & 0x03;
        let on_b = opcode >= 0xC0;
        let op = opcode & 0x0F;
        let index = usize::from(mode);

        match (op, on_b, mode) {
            // BSR
            (0xD, false, 0) => {
                let offset = self.fetch(bus) as i8;
                self.push16(bus, self.regs.pc);
                self.regs.pc = self.regs.pc.wrapping_add_signed(i16::from(offset));
                5
            }
            // JSR
            (0xD, false, _) => {
                let addr = self.operand_addr(bus, mode);
                self.push16(bus, self.regs.pc);
                self.regs.pc = addr;
                JSR_CYCLES[index]
            }
            // No immediate form for stores.
            (0x7 | 0xD | 0xF, _, 0) => self.trap(bus, opcode),
            // STAA / STAB
            (0x7, _, _) => {
                let addr = self.operand_addr(bus, mode);
                let value = if on_b { self.regs.b } else { self.regs.a };
                self.regs.ccr.update_logic(value);
                bus.write(addr, value);
                STORE8_CYCLES[index]
            }
            // STD, STS, STX
            (0xD | 0xF, _, _) => {
                let addr = self.operand_addr(bus, mode);
                let value = match (op, on_b) {
                    (0xD, _) => self.regs.d(),
                    (_, false) => self.regs.sp,
                    (_, true) => self.regs.x,
                };
                self.regs.ccr.update_nz16(value);
                self.regs.ccr.clear(V);
                bus.write_word(addr, value);
                STORE16_CYCLES[index]
            }
            // SUBD, ADDD, CPX, LDD, LDS, LDX
            (0x3 | 0xC | 0xE, _, _) => {
                let m = self.operand16(bus, mode);
                match (op, on_b) {
                    (0x3, false) => {
                        let r = self.sub16(self.regs.d(), m);
                        self.regs.set_d(r);
                    }
                    (0x3, true) => {
                        let r = self.add16(self.regs.d(), m);
                        self.regs.set_d(r);
                    }
                    (0xC, false) => {
                        self.sub16(self.regs.x, m);
                    }
                    (0xC, true) => {
                        self.regs.set_d(m);
                        self.regs.ccr.update_nz16(m);
                        self.regs.ccr.clear(V);
                    }
                    (_, false) => {
                        self.regs.sp = m;
                        self.regs.ccr.update_nz16(m);
                        self.regs.ccr.clear(V);
                    }
                    (_, true) => {
                        self.regs.x = m;
                        self.regs.ccr.update_nz16(m);
                        self.regs.ccr.clear(V);
                    }
                }
                ALU16_CYCLES[index]
            }
            _ => {
                let m = self.operand8(bus, mode);
                let acc = if on_b { self.regs.b } else { self.regs.a };
                let carry = self.regs.ccr.is_set(C);
                let result = match op {
                    0x0 => Some(self.sub8(acc, m, false)),
                    0x1 => {
                        self.sub8(acc, m, false);
                        None
                    }
                    0x2 => Some(self.sub8(acc, m, carry)),
                    0x5 => {
                        self.regs.ccr.update_logic(acc & m);
                        None
                    }
                    0x9 => Some(self.add8(acc, m, carry)),
                    0xB => Some(self.add8(acc, m, false)),
                    _ => {
                        let r = match op {
                            0x4 => acc & m,
                            0x8 => acc ^ m,
                            0xA => acc | m,
                            _ => m,
                        };
                        self.regs.ccr.update_logic(r);
                        Some(r)
                    }
                };
                if let Some(r) = result {
                    if on_b {
                        self.regs.b = r;
                    } else {
                        self.regs.a = r;
                    }
                }
                ALU8_CYCLES[index]
            }
        }
    }
}

impl Cpu for Hd6301Cpu {
    type Registers = Registers;

    fn step<B: Bus>(&mut self, bus: &mut B) -> Cycles {
        let cycles = self.step_inner(bus);
        self.total_cycles += u64::from(cycles);
        Cycles::from(cycles)
    }

    fn pc(&self) -> u16 {
        self.regs.pc
    }

    fn registers(&self) -> Registers {
        self.regs
    }

    fn is_halted(&self) -> bool {
        self.state != State::Running
    }

    fn set_irq(&mut self, asserted: bool) {
        self.irq_line = asserted;
    }

    fn nmi(&mut self) {
        self.nmi_pending = true;
    }

    fn reset<B: Bus>(&mut self, bus: &mut B) {
        self.regs = Registers::new();
        self.state = State::Running;
        self.irq_line = false;
        self.nmi_pending = false;
        self.internal_vector = None;
        self.regs.pc = bus.read_word(vectors::RESET);
    }
}

const CPU_QUERY_PATHS: &[&str] = &[
    "pc",
    "a",
    "b",
    "d",
    "x",
    "sp",
    "ccr",
    "flags.h",
    "flags.i",
    "flags.n",
    "flags.z",
    "flags.v",
    "flags.c",
    "cycles",
    "halted",
];

impl Observable for Hd6301Cpu {
    fn query(&self, path: &str) -> Option<Value> {
        let ccr = self.regs.ccr;
        match path {
            "pc" => Some(self.regs.pc.into()),
            "a" => Some(self.regs.a.into()),
            "b" => Some(self.regs.b.into()),
            "d" => Some(self.regs.d().into()),
            "x" => Some(self.regs.x.into()),
            "sp" => Some(self.regs.sp.into()),
            "ccr" => Some(ccr.to_byte().into()),
            "flags.h" => Some(ccr.is_set(H).into()),
            "flags.i" => Some(ccr.is_set(I).into()),
            "flags.n" => Some(ccr.is_set(N).into()),
            "flags.z" => Some(ccr.is_set(Z).into()),
            "flags.v" => Some(ccr.is_set(V).into()),
            "flags.c" => Some(ccr.is_set(C).into()),
            "cycles" => Some(self.total_cycles.into()),
            "halted" => Some(self.is_halted().into()),
            _ => None,
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        CPU_QUERY_PATHS
    }
}

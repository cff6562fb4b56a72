//! Instruction-level tests for the HD6301 CPU against a flat 64 KB bus.

use hitachi_hd6301::{Hd6301Cpu, vectors};
use ikbd_core::{Cpu, FlatBus, Observable, Value};

const ORIGIN: u16 = 0xF000;

/// Load `program` at the origin, point the reset vector at it and reset.
fn boot(program: &[u8]) -> (Hd6301Cpu, FlatBus) {
    let mut bus = FlatBus::new();
    bus.load(ORIGIN, program);
    bus.load(vectors::RESET, &ORIGIN.to_be_bytes());
    let mut cpu = Hd6301Cpu::new();
    cpu.reset(&mut bus);
    cpu.regs.sp = 0x00FF;
    (cpu, bus)
}

fn run(cpu: &mut Hd6301Cpu, bus: &mut FlatBus, instructions: usize) -> u64 {
    (0..instructions).map(|_| cpu.step(bus).get()).sum()
}

#[test]
fn add_sets_overflow_and_negative() {
    // LDAA #$7F; ADDA #$01
    let (mut cpu, mut bus) = boot(&[0x86, 0x7F, 0x8B, 0x01]);
    let cycles = run(&mut cpu, &mut bus, 2);
    assert_eq!(cpu.regs.a, 0x80);
    assert_eq!(cpu.query("flags.v"), Some(Value::Bool(true)));
    assert_eq!(cpu.query("flags.n"), Some(Value::Bool(true)));
    assert_eq!(cpu.query("flags.c"), Some(Value::Bool(false)));
    assert_eq!(cycles, 4);
}

#[test]
fn subtract_borrow_sets_carry() {
    // LDAB #$10; SUBB #$20
    let (mut cpu, mut bus) = boot(&[0xC6, 0x10, 0xC0, 0x20]);
    run(&mut cpu, &mut bus, 2);
    assert_eq!(cpu.regs.b, 0xF0);
    assert_eq!(cpu.query("flags.c"), Some(Value::Bool(true)));
}

#[test]
fn mul_fills_d() {
    // LDAA #$0C; LDAB #$10; MUL
    let (mut cpu, mut bus) = boot(&[0x86, 0x0C, 0xC6, 0x10, 0x3D]);
    let cycles = run(&mut cpu, &mut bus, 3);
    assert_eq!(cpu.regs.d(), 0x00C0);
    assert_eq!(cpu.query("flags.c"), Some(Value::Bool(true)));
    assert_eq!(cycles, 2 + 2 + 7);
}

#[test]
fn xgdx_swaps() {
    // LDD #$1234; LDX #$ABCD; XGDX
    let (mut cpu, mut bus) = boot(&[0xCC, 0x12, 0x34, 0xCE, 0xAB, 0xCD, 0x18]);
    run(&mut cpu, &mut bus, 3);
    assert_eq!(cpu.regs.d(), 0xABCD);
    assert_eq!(cpu.regs.x, 0x1234);
}

#[test]
fn aim_and_oim_modify_memory() {
    // AIM #$0F,$80; OIM #$80,$81
    let (mut cpu, mut bus) = boot(&[0x71, 0x0F, 0x80, 0x72, 0x80, 0x81]);
    bus.load(0x0080, &[0xFF, 0x01]);
    let cycles = run(&mut cpu, &mut bus, 2);
    assert_eq!(bus.peek(0x0080), 0x0F);
    assert_eq!(bus.peek(0x0081), 0x81);
    assert_eq!(cycles, 12);
}

#[test]
fn tim_only_sets_flags() {
    // TIM #$01,$80
    let (mut cpu, mut bus) = boot(&[0x7B, 0x01, 0x80]);
    bus.load(0x0080, &[0xFE]);
    run(&mut cpu, &mut bus, 1);
    assert_eq!(bus.peek(0x0080), 0xFE);
    assert_eq!(cpu.query("flags.z"), Some(Value::Bool(true)));
}

#[test]
fn jsr_and_rts_use_the_stack() {
    // JSR $F010 ... at $F010: LDAA #$42; RTS
    let mut program = vec![0xBD, 0xF0, 0x10, 0x01];
    program.resize(0x10, 0x01);
    program.extend_from_slice(&[0x86, 0x42, 0x39]);
    let (mut cpu, mut bus) = boot(&program);

    run(&mut cpu, &mut bus, 1);
    assert_eq!(cpu.regs.pc, 0xF010);
    assert_eq!(cpu.regs.sp, 0x00FD);
    assert_eq!(bus.peek(0x00FE), 0xF0);
    assert_eq!(bus.peek(0x00FF), 0x03);

    run(&mut cpu, &mut bus, 2);
    assert_eq!(cpu.regs.pc, 0xF003);
    assert_eq!(cpu.regs.sp, 0x00FF);
    assert_eq!(cpu.regs.a, 0x42);
}

#[test]
fn daa_corrects_bcd_add() {
    // LDAA #$09; ADDA #$01; DAA
    let (mut cpu, mut bus) = boot(&[0x86, 0x09, 0x8B, 0x01, 0x19]);
    run(&mut cpu, &mut bus, 3);
    assert_eq!(cpu.regs.a, 0x10);
}

#[test]
fn countdown_loop_exits_on_zero() {
    // LDX #3; loop: DEX; BNE loop; LDAA #$AA
    let (mut cpu, mut bus) = boot(&[0xCE, 0x00, 0x03, 0x09, 0x26, 0xFD, 0x86, 0xAA]);
    run(&mut cpu, &mut bus, 1 + 3 * 2 + 1);
    assert_eq!(cpu.regs.x, 0);
    assert_eq!(cpu.regs.a, 0xAA);
}

#[test]
fn undefined_opcode_takes_trap() {
    let (mut cpu, mut bus) = boot(&[0x02]);
    bus.load(vectors::TRAP, &[0xF1, 0x23]);
    let cycles = cpu.step(&mut bus).get();
    assert_eq!(cpu.regs.pc, 0xF123);
    assert_eq!(cycles, 12);
    assert_eq!(cpu.regs.sp, 0x00FF - 7);
}

#[test]
fn swi_and_rti_round_trip() {
    // SWI; NOP    handler: LDAB #$55; RTI
    let (mut cpu, mut bus) = boot(&[0x3F, 0x01]);
    bus.load(0xF100, &[0xC6, 0x55, 0x3B]);
    bus.load(vectors::SWI, &[0xF1, 0x00]);
    cpu.regs.a = 0x11;

    run(&mut cpu, &mut bus, 1);
    assert_eq!(cpu.regs.pc, 0xF100);
    assert_eq!(cpu.query("flags.i"), Some(Value::Bool(true)));

    run(&mut cpu, &mut bus, 2);
    assert_eq!(cpu.regs.pc, 0xF001);
    assert_eq!(cpu.regs.a, 0x11);
    // B comes back from the stack too.
    assert_eq!(cpu.regs.b, 0x00);
}

#[test]
fn irq_is_taken_once_unmasked() {
    // CLI; NOP; NOP
    let (mut cpu, mut bus) = boot(&[0x0E, 0x01, 0x01]);
    bus.load(vectors::IRQ1, &[0xF2, 0x00]);
    cpu.set_irq(true);

    // I is set out of reset, so CLI runs first.
    run(&mut cpu, &mut bus, 1);
    assert_eq!(cpu.regs.pc, 0xF001);

    run(&mut cpu, &mut bus, 1);
    assert_eq!(cpu.regs.pc, 0xF200);
}

#[test]
fn std_writes_big_endian() {
    // LDD #$BEEF; STD $90
    let (mut cpu, mut bus) = boot(&[0xCC, 0xBE, 0xEF, 0xDD, 0x90]);
    run(&mut cpu, &mut bus, 2);
    assert_eq!(bus.peek(0x0090), 0xBE);
    assert_eq!(bus.peek(0x0091), 0xEF);
}

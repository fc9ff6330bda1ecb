use super::*;
use crate::asm::{addr, imm, mem, mem_at, reg, write_data, Assembler};
use crate::bits::BitWriter;

const PLAIN: PrepareOptions = PrepareOptions {
    recognize_standard: false,
    optimize: false,
};

fn decode(asm: &Assembler) -> Program {
    prepare_with(&asm.assemble().unwrap(), &PLAIN)
}

/// Commands before the first `RET`.
fn body(program: &Program) -> Vec<Command> {
    program
        .commands()
        .iter()
        .copied()
        .take_while(|command| command.opcode != Opcode::Ret)
        .collect()
}

#[test]
fn test_read_data_classes() {
    let values = [
        0u32,
        15,
        16,
        255,
        256,
        0xFFFF,
        0x1_0000,
        0xFFFF_FF00,
        0xFFFF_FFFF,
        0x1234_5678,
    ];
    for value in values {
        let mut writer = BitWriter::new();
        write_data(&mut writer, value);
        writer.write(0b1011, 4);
        let bytes = writer.into_bytes();
        let mut reader = BitReader::new(&bytes);
        assert_eq!(read_data(&mut reader), value, "{value:#x}");
        assert_eq!(reader.read(4), 0b1011, "{value:#x} consumed wrong width");
    }
}

#[test]
fn test_read_data_negative_byte() {
    // 01 0000 then 0xFE
    let bytes = [0b0100_0011, 0b1111_1000];
    let mut reader = BitReader::new(&bytes);
    assert_eq!(read_data(&mut reader), 0xFFFF_FFFE);
}

#[test]
fn test_resolve_jump() {
    assert_eq!(resolve_jump(300, 5), 44);
    assert_eq!(resolve_jump(136, 200), 72);
    assert_eq!(resolve_jump(255, 200), 191);
    assert_eq!(resolve_jump(16, 10), 18);
    assert_eq!(resolve_jump(135, 10), 137);
    assert_eq!(resolve_jump(8, 10), 2);
    assert_eq!(resolve_jump(15, 10), 9);
    assert_eq!(resolve_jump(3, 10), 13);
    assert_eq!(resolve_jump(0xFFFF_FFFF, 10), 9);
}

#[test]
fn test_empty_blob() {
    let program = prepare(&[]);
    assert_eq!(program.origin(), ProgramOrigin::Empty);
    assert_eq!(program.commands(), &[Command::ret()]);
}

#[test]
fn test_checksum_mismatch_is_trivial() {
    let mut asm = Assembler::new();
    asm.emit(Opcode::Mov, &[reg(0), imm(1)]);
    let mut code = asm.assemble().unwrap();
    code[0] ^= 0x55;
    let program = prepare(&code);
    assert_eq!(program.origin(), ProgramOrigin::ChecksumMismatch);
    assert_eq!(program.commands(), &[Command::ret()]);
    assert!(program.static_data().is_empty());
}

#[test]
fn test_single_checksum_byte() {
    // Checksum of nothing is zero; the program is just the appended RET.
    let program = prepare(&[0]);
    assert_eq!(program.origin(), ProgramOrigin::Decoded);
    assert_eq!(program.commands(), &[Command::ret()]);
}

#[test]
fn test_operand_forms() {
    let mut asm = Assembler::new();
    asm.emit(Opcode::Mov, &[reg(3), imm(0x1234)])
        .emit(Opcode::Add, &[mem(2), mem_at(5, 0x3C000)])
        .emit(Opcode::Xor, &[addr(0x20), imm(7)])
        .emit_byte(Opcode::Sub, &[reg(1), imm(0xFE)])
        .emit(Opcode::Not, &[mem_at(7, 0xFFFF_FFFC)])
        .emit(Opcode::Pusha, &[])
        .emit(Opcode::Ret, &[]);
    let commands = body(&decode(&asm));

    let memory = |base, disp| Operand::Memory { base, disp };
    assert_eq!(
        commands,
        vec![
            Command::new(Opcode::Mov, false, Operand::Register(3), Operand::Immediate(0x1234)),
            Command::new(Opcode::Add, false, memory(Some(2), 0), memory(Some(5), 0x3C000)),
            Command::new(Opcode::Xor, false, memory(None, 0x20), Operand::Immediate(7)),
            Command::new(Opcode::Sub, true, Operand::Register(1), Operand::Immediate(0xFE)),
            Command::new(Opcode::Not, false, memory(Some(7), 0xFFFF_FFFC), Operand::None),
            Command::bare(Opcode::Pusha),
        ]
    );
}

#[test]
fn test_opcodes_without_byte_mode_bit() {
    let mut asm = Assembler::new();
    asm.emit(Opcode::Movzx, &[reg(0), mem(1)])
        .emit(Opcode::Movsx, &[reg(2), reg(3)])
        .emit(Opcode::Push, &[reg(4)])
        .emit(Opcode::Popf, &[])
        .emit(Opcode::Ret, &[]);
    let opcodes: Vec<Opcode> = body(&decode(&asm)).iter().map(|c| c.opcode).collect();
    assert_eq!(
        opcodes,
        vec![Opcode::Movzx, Opcode::Movsx, Opcode::Push, Opcode::Popf]
    );
}

#[test]
fn test_jump_targets_are_absolute() {
    let mut asm = Assembler::new();
    let (back, forward) = (asm.label(), asm.label());
    asm.bind(back).emit(Opcode::Inc, &[reg(0)]);
    for _ in 0..20 {
        asm.emit(Opcode::Dec, &[reg(1)]);
    }
    asm.jump(Opcode::Jnz, back)
        .jump(Opcode::Call, forward)
        .emit(Opcode::Jmp, &[imm(500)]);
    for _ in 0..200 {
        asm.emit(Opcode::Print, &[]);
    }
    asm.bind(forward).emit(Opcode::Ret, &[]);

    let program = decode(&asm);
    let commands = program.commands();
    assert_eq!(commands[21].op1, Operand::Immediate(0));
    assert_eq!(commands[22].op1, Operand::Immediate(224));
    assert_eq!(commands[23].op1, Operand::Immediate(500));
    assert_eq!(commands[224].opcode, Opcode::Ret);
}

#[test]
fn test_register_jump_operand_is_kept() {
    let mut asm = Assembler::new();
    asm.emit(Opcode::Jmp, &[reg(2)]);
    assert_eq!(body(&decode(&asm))[0].op1, Operand::Register(2));
}

#[test]
fn test_static_data() {
    let mut asm = Assembler::new();
    asm.static_data(&[1, 2, 3, 0xFF])
        .emit(Opcode::Mov, &[reg(0), reg(1)]);
    let program = decode(&asm);
    assert_eq!(program.static_data(), &[1, 2, 3, 0xFF]);
    assert_eq!(program.commands()[0].opcode, Opcode::Mov);
}

#[test]
fn test_static_data_truncated_by_blob_end() {
    let mut asm = Assembler::new();
    asm.static_data(&[7; 40]);
    let mut code = asm.assemble().unwrap();
    code.truncate(12);
    code[0] = code[1..].iter().fold(0, |acc, byte| acc ^ byte);
    let program = prepare_with(&code, &PLAIN);
    assert!(program.static_data().len() < 40);
    assert!(program.static_data()[..8].iter().all(|&byte| byte == 7));
    assert_eq!(program.commands().last(), Some(&Command::ret()));
}

#[test]
fn test_ret_always_appended() {
    let mut asm = Assembler::new();
    asm.emit(Opcode::Mov, &[reg(0), imm(1)]);
    let program = decode(&asm);
    assert_eq!(program.commands().last(), Some(&Command::ret()));
    // Any padding decodes to harmless moves between immediates.
    for command in &program.commands()[1..program.len() - 1] {
        assert_eq!(command.opcode, Opcode::Mov);
        assert!(matches!(command.op1, Operand::Immediate(_)));
    }
}

#[test]
fn test_garbage_decodes_totally() {
    let mut code: Vec<u8> = (0u8..=255).map(|b| b.wrapping_mul(37)).collect();
    code[0] = code[1..].iter().fold(0, |acc, byte| acc ^ byte);
    let program = prepare_with(&code, &PLAIN);
    assert_eq!(program.origin(), ProgramOrigin::Decoded);
    assert_eq!(program.commands().last(), Some(&Command::ret()));
}

#[test]
fn test_optimize_option() {
    let mut asm = Assembler::new();
    asm.emit(Opcode::Mov, &[reg(0), imm(1)]);
    let code = asm.assemble().unwrap();
    let options = PrepareOptions {
        optimize: true,
        ..PLAIN
    };
    let optimized = prepare_with(&code, &options);
    assert_eq!(optimized.commands()[0].opcode, Opcode::MovD);
    assert_eq!(prepare_with(&code, &PLAIN).commands()[0].opcode, Opcode::Mov);
}

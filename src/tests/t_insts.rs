use crate::codegen::assemble_function;
use crate::diag::Position;
use crate::ssa::{
    BasicBlock, BinOp, Inst, InstKind, LocalDecl, Operand, Param, SsaFunction, UnOp,
};
use crate::types::StaticType;
use crate::vector::VectorRegistry;

fn i64t() -> StaticType {
    StaticType::int(true, 64)
}

fn u64t() -> StaticType {
    StaticType::int(false, 64)
}

fn param(name: &str, ty: StaticType) -> Param {
    Param {
        name: name.to_string(),
        ty,
        pos: Position::default(),
    }
}

fn var(name: &str, ty: StaticType) -> Operand {
    Operand::Var {
        name: name.to_string(),
        ty,
    }
}

fn konst(value: i64, ty: StaticType) -> Operand {
    Operand::Const { value, ty }
}

fn inst(kind: InstKind) -> Inst {
    Inst {
        kind,
        pos: Position::default(),
    }
}

/// Single-block function around one instruction, with `x`/`y` parameters of
/// the given type.
fn one_op(ty: StaticType, kind: InstKind) -> SsaFunction {
    SsaFunction {
        name: "f".to_string(),
        params: vec![param("x", ty.clone()), param("y", ty)],
        locals: vec![],
        blocks: vec![BasicBlock {
            index: 0,
            preds: vec![],
            succs: vec![],
            insts: vec![inst(kind), inst(InstKind::Return { values: vec![] })],
        }],
        ret: None,
    }
}

fn binop(op: BinOp, ty: StaticType, rhs: Operand) -> SsaFunction {
    let lhs = var("x", ty.clone());
    one_op(
        ty.clone(),
        InstKind::BinOp {
            name: "t0".to_string(),
            op,
            ty,
            lhs,
            rhs,
        },
    )
}

fn compile(func: &SsaFunction) -> String {
    assemble_function(func, &VectorRegistry::with_defaults()).unwrap()
}

#[test]
fn test_signed_division_widens_through_cqo() {
    let out = compile(&binop(BinOp::Div, i64t(), var("y", i64t())));
    assert!(out.contains("MOVQ  x+0(FP), AX"));
    assert!(out.contains("MOVQ  y+8(FP), CX"));
    assert!(out.contains("CQO"));
    assert!(out.contains("IDIVQ  CX"));
    assert!(out.contains("MOVQ  AX, t0+0(SP)"));
}

#[test]
fn test_unsigned_remainder_zeroes_dx() {
    let out = compile(&binop(BinOp::Rem, u64t(), var("y", u64t())));
    assert!(out.contains("MOVQ  $0, DX"));
    assert!(out.contains("DIVQ  CX"));
    // The remainder comes out of DX.
    assert!(out.contains("MOVQ  DX, t0+0(SP)"));
}

#[test]
fn test_constant_shift_encodes_an_immediate() {
    let out = compile(&binop(BinOp::Shl, u64t(), konst(3, u64t())));
    assert!(out.contains("SHLQ  $3, AX"));
}

#[test]
fn test_variable_shift_count_goes_through_cx() {
    let out = compile(&binop(BinOp::Shr, i64t(), var("y", i64t())));
    assert!(out.contains("MOVQ  y+8(FP), CX"));
    assert!(out.contains("SARQ  CX, AX"));
}

#[test]
fn test_unsigned_shift_right_is_logical() {
    let out = compile(&binop(BinOp::Shr, u64t(), var("y", u64t())));
    assert!(out.contains("SHRQ  CX, AX"));
}

#[test]
fn test_and_not_complements_then_masks() {
    let out = compile(&binop(BinOp::AndNot, u64t(), var("y", u64t())));
    assert!(out.contains("NOTQ  CX"));
    assert!(out.contains("ANDQ  CX, AX"));
}

fn cmp(op: BinOp, operand_ty: StaticType) -> SsaFunction {
    one_op(
        operand_ty.clone(),
        InstKind::BinOp {
            name: "t0".to_string(),
            op,
            ty: StaticType::Bool,
            lhs: var("x", operand_ty.clone()),
            rhs: var("y", operand_ty),
        },
    )
}

#[test]
fn test_signed_comparison_stores_a_canonical_word() {
    let out = compile(&cmp(BinOp::Lt, i64t()));
    assert!(out.contains("CMPQ  AX, CX"));
    assert!(out.contains("SETLT  AX"));
    assert!(out.contains("MOVBQZX  AX, AX"));
    assert!(out.contains("MOVQ  AX, t0+0(SP)"));
}

#[test]
fn test_unsigned_comparison_uses_carry_conditions() {
    let out = compile(&cmp(BinOp::Lt, u64t()));
    assert!(out.contains("SETCS  AX"));
}

#[test]
fn test_sub_word_operands_extend_on_load() {
    let out = compile(&binop(BinOp::Add, StaticType::int(false, 16), var("y", StaticType::int(false, 16))));
    assert!(out.contains("MOVWQZX  x+0(FP), AX"));
    assert!(out.contains("MOVWQZX  y+2(FP), CX"));
    assert!(out.contains("ADDQ  CX, AX"));
    // The store truncates back to the result width.
    assert!(out.contains("MOVW  AX, t0+0(SP)"));
}

#[test]
fn test_logical_not_flips_the_low_bit() {
    let out = compile(&one_op(
        StaticType::Bool,
        InstKind::UnOp {
            name: "t0".to_string(),
            op: UnOp::Not,
            ty: StaticType::Bool,
            operand: var("x", StaticType::Bool),
        },
    ));
    assert!(out.contains("MOVBQZX  x+0(FP), AX"));
    assert!(out.contains("XORQ  $1, AX"));
    assert!(out.contains("MOVQ  AX, t0+0(SP)"));
}

#[test]
fn test_arithmetic_negation() {
    let out = compile(&one_op(
        i64t(),
        InstKind::UnOp {
            name: "t0".to_string(),
            op: UnOp::Neg,
            ty: i64t(),
            operand: var("x", i64t()),
        },
    ));
    assert!(out.contains("NEGQ  AX"));
}

#[test]
fn test_deref_loads_through_an_address_register() {
    let out = compile(&one_op(
        StaticType::ptr(i64t()),
        InstKind::UnOp {
            name: "t0".to_string(),
            op: UnOp::Deref,
            ty: i64t(),
            operand: var("x", StaticType::ptr(i64t())),
        },
    ));
    assert!(out.contains("MOVQ  x+0(FP), BX"));
    assert!(out.contains("MOVQ  (BX), AX"));
    assert!(out.contains("MOVQ  AX, t0+0(SP)"));
}

#[test]
#[should_panic(expected = "dereference of non-pointer")]
fn test_deref_of_non_pointer_is_fatal() {
    let _ = assemble_function(
        &one_op(
            i64t(),
            InstKind::UnOp {
                name: "t0".to_string(),
                op: UnOp::Deref,
                ty: i64t(),
                operand: var("x", i64t()),
            },
        ),
        &VectorRegistry::with_defaults(),
    );
}

#[test]
fn test_store_through_pointer_binding_is_indirect() {
    let out = compile(&one_op(
        StaticType::ptr(i64t()),
        InstKind::Store {
            addr: "x".to_string(),
            value: konst(42, i64t()),
        },
    ));
    assert!(out.contains("MOVQ  x+0(FP), BX"));
    assert!(out.contains("MOVQ  $42, AX"));
    assert!(out.contains("MOVQ  AX, (BX)"));
}

#[test]
fn test_store_to_local_binding_is_direct() {
    let func = SsaFunction {
        name: "f".to_string(),
        params: vec![param("x", i64t())],
        locals: vec![LocalDecl {
            name: "a".to_string(),
            ty: i64t(),
            heap: false,
            pos: Position::default(),
        }],
        blocks: vec![BasicBlock {
            index: 0,
            preds: vec![],
            succs: vec![],
            insts: vec![
                inst(InstKind::Store {
                    addr: "a".to_string(),
                    value: var("x", i64t()),
                }),
                inst(InstKind::Return { values: vec![] }),
            ],
        }],
        ret: None,
    };
    let out = compile(&func);
    assert!(out.contains("MOVQ  x+0(FP), AX"));
    assert!(out.contains("MOVQ  AX, a+0(SP)"));
}

#[test]
fn test_nested_index_addr_loads_the_pointer_base() {
    let row = StaticType::Array {
        elem: Box::new(i64t()),
        len: 2,
    };
    let grid = StaticType::Array {
        elem: Box::new(row.clone()),
        len: 2,
    };
    let func = SsaFunction {
        name: "f".to_string(),
        params: vec![],
        locals: vec![LocalDecl {
            name: "a".to_string(),
            ty: grid,
            heap: false,
            pos: Position::default(),
        }],
        blocks: vec![BasicBlock {
            index: 0,
            preds: vec![],
            succs: vec![],
            insts: vec![
                inst(InstKind::IndexAddr {
                    name: "t0".to_string(),
                    ty: StaticType::ptr(row.clone()),
                    base: "a".to_string(),
                    index: konst(1, i64t()),
                }),
                inst(InstKind::IndexAddr {
                    name: "t1".to_string(),
                    ty: StaticType::ptr(i64t()),
                    base: "t0".to_string(),
                    index: konst(1, i64t()),
                }),
                inst(InstKind::Return { values: vec![] }),
            ],
        }],
        ret: None,
    };
    let out = compile(&func);
    // The inner row address comes straight off the frame.
    assert!(out.contains("LEAQ  a+16(SP), BX"));
    assert!(out.contains("MOVQ  BX, t0+32(SP)"));
    // The second index must read the stored pointer, not the frame slot
    // that holds it.
    assert!(out.contains("MOVQ  t0+32(SP), BX"));
    assert!(out.contains("ADDQ  $8, BX"));
    assert!(out.contains("MOVQ  BX, t1+40(SP)"));
    assert!(!out.contains("LEAQ  t0+"));
}

fn slice_index(index: Operand) -> SsaFunction {
    let slice = StaticType::Slice(Box::new(i64t()));
    SsaFunction {
        name: "f".to_string(),
        params: vec![param("s", slice), param("i", i64t())],
        locals: vec![],
        blocks: vec![BasicBlock {
            index: 0,
            preds: vec![],
            succs: vec![],
            insts: vec![
                inst(InstKind::IndexAddr {
                    name: "t0".to_string(),
                    ty: StaticType::ptr(i64t()),
                    base: "s".to_string(),
                    index,
                }),
                inst(InstKind::Return { values: vec![] }),
            ],
        }],
        ret: None,
    }
}

#[test]
fn test_slice_constant_index_goes_through_the_data_pointer() {
    let out = compile(&slice_index(konst(1, i64t())));
    assert!(out.contains("MOVQ  s+0(FP), BX"));
    assert!(out.contains("ADDQ  $8, BX"));
    assert!(out.contains("MOVQ  BX, t0+0(SP)"));
    assert!(!out.contains("LEAQ"));
}

#[test]
fn test_slice_variable_index_scales_the_loaded_pointer() {
    let out = compile(&slice_index(var("i", i64t())));
    // The index parameter sits after the 24-byte descriptor.
    assert!(out.contains("MOVQ  i+24(FP), AX"));
    assert!(out.contains("MOVQ  s+0(FP), BX"));
    assert!(out.contains("IMULQ  $8, AX"));
    assert!(out.contains("ADDQ  AX, BX"));
    assert!(out.contains("MOVQ  BX, t0+0(SP)"));
}

#[test]
fn test_variable_index_scales_and_adds() {
    let func = SsaFunction {
        name: "f".to_string(),
        params: vec![param("i", i64t())],
        locals: vec![LocalDecl {
            name: "a".to_string(),
            ty: StaticType::Array {
                elem: Box::new(i64t()),
                len: 4,
            },
            heap: false,
            pos: Position::default(),
        }],
        blocks: vec![BasicBlock {
            index: 0,
            preds: vec![],
            succs: vec![],
            insts: vec![
                inst(InstKind::IndexAddr {
                    name: "t0".to_string(),
                    ty: StaticType::ptr(i64t()),
                    base: "a".to_string(),
                    index: var("i", i64t()),
                }),
                inst(InstKind::Return { values: vec![] }),
            ],
        }],
        ret: None,
    };
    let out = compile(&func);
    assert!(out.contains("MOVQ  i+0(FP), AX"));
    assert!(out.contains("LEAQ  a+0(SP), BX"));
    assert!(out.contains("IMULQ  $8, AX"));
    assert!(out.contains("ADDQ  AX, BX"));
    assert!(out.contains("MOVQ  BX, t0+32(SP)"));
}

//! Property-based tests for the CSE pass on generated functions.
//!
//! Two generators: straight-line blocks, and graphs chaining straight
//! regions, diamonds and counted loops whose blocks store fields and call
//! out. A small interpreter follows the links of either.
//!
//! Invariants that should hold for ALL generated inputs:
//! - Equivalence: the transformed function prints the same values as the
//!   original, whether or not its two object parameters alias
//! - Idempotence: a second run finds nothing and changes nothing
//! - Safety: calls are never rewritten

use std::collections::HashMap;

use cseflow::analysis::{
    ConstValue, FieldRef, MethodRef, Opcode, Operand, SsaBlockBuilder, SsaFunction,
    SsaFunctionBuilder, SsaOperation, SsaType, SsaVarId, TypeRef, WriteAnalyzer,
};
use cseflow::compiler::CsePass;
use proptest::prelude::*;

const FUEL: usize = 10_000;

#[derive(Debug, Clone)]
enum Step {
    Add(usize, usize),
    Mul(usize, usize),
    Load(usize, u32),
    Store(usize, u32, usize),
    Call,
    PureCall(usize),
}

#[derive(Debug, Clone)]
enum Region {
    Straight(Vec<Step>),
    Diamond {
        cond: (usize, usize),
        then: Vec<Step>,
        otherwise: Vec<Step>,
    },
    Loop {
        trips: i64,
        header: Vec<Step>,
        body: Vec<Step>,
    },
}

fn arb_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        (0..4usize, 0..4usize).prop_map(|(a, b)| Step::Add(a, b)),
        (0..4usize, 0..4usize).prop_map(|(a, b)| Step::Mul(a, b)),
        (0..2usize, 0..2u32).prop_map(|(o, f)| Step::Load(o, f)),
        (0..2usize, 0..2u32, 0..4usize).prop_map(|(o, f, v)| Step::Store(o, f, v)),
        Just(Step::Call),
        (0..4usize).prop_map(Step::PureCall),
    ]
}

fn arb_steps(max: usize) -> impl Strategy<Value = Vec<Step>> {
    prop::collection::vec(arb_step(), 0..max)
}

fn arb_region() -> impl Strategy<Value = Region> {
    prop_oneof![
        arb_steps(8).prop_map(Region::Straight),
        ((0..4usize, 0..4usize), arb_steps(6), arb_steps(6)).prop_map(
            |(cond, then, otherwise)| Region::Diamond {
                cond,
                then,
                otherwise
            }
        ),
        (1..3i64, arb_steps(6), arb_steps(6)).prop_map(|(trips, header, body)| Region::Loop {
            trips,
            header,
            body
        }),
    ]
}

fn pick(ints: &[SsaVarId], i: usize) -> SsaVarId {
    ints[i % ints.len()]
}

fn entry_params(b: &mut SsaBlockBuilder<'_>) -> ([SsaVarId; 2], Vec<SsaVarId>) {
    let objects = [
        b.param(SsaType::Object(TypeRef::new(1))),
        b.param(SsaType::Object(TypeRef::new(1))),
    ];
    let ints = vec![b.param(SsaType::I64), b.param(SsaType::I64)];
    (objects, ints)
}

/// Appends `steps` to the block, adding every value produced to `ints`.
fn emit(b: &mut SsaBlockBuilder<'_>, objects: [SsaVarId; 2], ints: &mut Vec<SsaVarId>, steps: &[Step]) {
    for step in steps {
        let produced = match *step {
            Step::Add(x, y) => Some(b.int_add(pick(ints, x), pick(ints, y))),
            Step::Mul(x, y) => Some(b.int_mul(pick(ints, x), pick(ints, y))),
            Step::Load(o, field) => Some(b.getfield(objects[o], FieldRef::new(field), SsaType::I64)),
            Step::Store(o, field, v) => {
                b.setfield(objects[o], FieldRef::new(field), pick(ints, v));
                None
            }
            Step::Call => Some(b.direct_call(MethodRef::new(1), false, vec![], SsaType::I64)),
            Step::PureCall(x) => Some(b.direct_call(
                MethodRef::new(2),
                true,
                vec![pick(ints, x).into()],
                SsaType::I64,
            )),
        };
        ints.extend(produced);
    }
}

fn print(b: &mut SsaBlockBuilder<'_>, vars: &[SsaVarId]) {
    b.debug_print(vars.iter().map(|v| Operand::Var(*v)).collect());
}

fn build(steps: &[Step]) -> SsaFunction {
    SsaFunctionBuilder::new("generated").build_with(|f| {
        f.block(0, |b| {
            let (objects, mut ints) = entry_params(b);
            emit(b, objects, &mut ints, steps);
            print(b, &ints);
        });
    })
}

/// Lays `regions` out after the entry block, each starting where the previous
/// one joins. Values defined inside a diamond branch or a loop stay local to
/// it; the last block prints the values visible along the spine.
fn build_cfg(regions: &[Region]) -> SsaFunction {
    SsaFunctionBuilder::new("generated_cfg").build_with(|f| {
        let (objects, mut spine) = f.block(0, |b| {
            let params = entry_params(b);
            b.jump(1, vec![]);
            params
        });

        let mut start = 1;
        for region in regions {
            match region {
                Region::Straight(steps) => {
                    f.block(start, |b| {
                        emit(b, objects, &mut spine, steps);
                        b.jump(start + 1, vec![]);
                    });
                    start += 1;
                }
                Region::Diamond {
                    cond,
                    then,
                    otherwise,
                } => {
                    f.block(start, |b| {
                        let c = b.int_lt(pick(&spine, cond.0), pick(&spine, cond.1));
                        b.switch(c);
                        b.exit(start + 1, vec![], ConstValue::Bool(true));
                        b.exit(start + 2, vec![], ConstValue::Bool(false));
                    });
                    for (offset, steps) in [(1, then), (2, otherwise)] {
                        f.block(start + offset, |b| {
                            let mut local = spine.clone();
                            emit(b, objects, &mut local, steps);
                            print(b, &local[spine.len()..]);
                            b.jump(start + 3, vec![]);
                        });
                    }
                    start += 3;
                }
                Region::Loop {
                    trips,
                    header,
                    body,
                } => {
                    f.block(start, |b| {
                        b.jump(start + 1, vec![ConstValue::I64(0).into()]);
                    });
                    let mut local = spine.clone();
                    f.block(start + 1, |b| {
                        local.push(b.param(SsaType::I64));
                        emit(b, objects, &mut local, header);
                        print(b, &local[spine.len()..]);
                        b.jump(start + 2, vec![]);
                    });
                    f.block(start + 2, |b| {
                        let counter = local[spine.len()];
                        let mark = local.len();
                        emit(b, objects, &mut local, body);
                        print(b, &local[mark..]);
                        let next = b.int_add(counter, ConstValue::I64(1));
                        let more = b.int_lt(next, ConstValue::I64(*trips));
                        b.switch(more);
                        b.exit(start + 1, vec![next.into()], ConstValue::Bool(true));
                        b.exit(start + 3, vec![], ConstValue::Bool(false));
                    });
                    start += 3;
                }
            }
        }

        f.block(start, |b| print(b, &spine));
    })
}

fn eval(values: &HashMap<SsaVarId, i64>, operand: &Operand) -> i64 {
    match operand {
        Operand::Var(var) => values[var],
        Operand::Const(value) => value.as_i64().unwrap_or(0),
    }
}

fn field(op: &SsaOperation) -> u32 {
    match op.arg(1) {
        Some(Operand::Const(ConstValue::Field(field))) => field.0,
        _ => panic!("no field in {op}"),
    }
}

/// Executes the function from block 0 and returns everything it prints.
fn run(func: &SsaFunction, objects: [i64; 2], inputs: [i64; 2]) -> Vec<i64> {
    let mut values: HashMap<SsaVarId, i64> = HashMap::new();
    let entry = func.block(0).unwrap();
    for (param, value) in entry.params().iter().zip(objects.iter().chain(&inputs)) {
        values.insert(*param, *value);
    }
    let mut heap: HashMap<(i64, u32), i64> = HashMap::new();
    let mut calls = 0;
    let mut printed = Vec::new();

    let mut current = 0;
    for _ in 0..FUEL {
        let block = func.block(current).unwrap();
        for op in block.operations() {
            let args: Vec<i64> = op.args().iter().map(|a| eval(&values, a)).collect();
            let result = match op.opcode() {
                Opcode::IntAdd => Some(args[0].wrapping_add(args[1])),
                Opcode::IntMul => Some(args[0].wrapping_mul(args[1])),
                Opcode::IntLt => Some(i64::from(args[0] < args[1])),
                Opcode::GetField => Some(heap.get(&(args[0], field(op))).copied().unwrap_or(0)),
                Opcode::SetField => {
                    heap.insert((args[0], field(op)), args[2]);
                    None
                }
                Opcode::SameAs => args.first().copied(),
                Opcode::DirectCall if op.is_elidable_call() => {
                    Some(args[1].wrapping_mul(31).wrapping_add(7))
                }
                Opcode::DirectCall => {
                    calls += 1;
                    *heap.entry((objects[0], 0)).or_insert(0) += 1;
                    Some(calls)
                }
                Opcode::DebugPrint => {
                    printed.extend(args);
                    None
                }
                other => panic!("unexpected opcode {other}"),
            };
            if let (Some(var), Some(value)) = (op.result(), result) {
                values.insert(var, value);
            }
        }

        let taken = match block.exit_switch() {
            Some(switch) => {
                let selected = eval(&values, switch);
                func.exits_of(current).find(|link| {
                    link.exit_case.as_ref().and_then(ConstValue::as_i64) == Some(selected)
                })
            }
            None => func.exits_of(current).next(),
        };
        let Some(link) = taken else {
            return printed;
        };
        let args: Vec<i64> = link.args.iter().map(|a| eval(&values, a)).collect();
        for (param, value) in func.block(link.target).unwrap().params().iter().zip(args) {
            values.insert(*param, value);
        }
        current = link.target;
    }
    panic!("{} did not finish", func.name());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_transform_preserves_output(steps in arb_steps(24)) {
        let original = build(&steps);
        let mut transformed = original.clone();
        CsePass::transform(&mut transformed, &WriteAnalyzer::new()).unwrap();
        let mut optimized = original.clone();
        CsePass::optimize(&mut optimized, &WriteAnalyzer::new()).unwrap();

        for objects in [[100, 200], [100, 100]] {
            let expected = run(&original, objects, [3, -5]);
            prop_assert_eq!(&run(&transformed, objects, [3, -5]), &expected);
            prop_assert_eq!(&run(&optimized, objects, [3, -5]), &expected);
        }
    }

    #[test]
    fn prop_second_run_finds_nothing(steps in arb_steps(24)) {
        let mut func = build(&steps);
        CsePass::transform(&mut func, &WriteAnalyzer::new()).unwrap();
        let once = func.clone();
        prop_assert_eq!(CsePass::transform(&mut func, &WriteAnalyzer::new()).unwrap(), 0);
        prop_assert_eq!(func, once);
    }

    #[test]
    fn prop_calls_never_rewritten(steps in arb_steps(24)) {
        let original = build(&steps);
        let mut func = original.clone();
        CsePass::transform(&mut func, &WriteAnalyzer::new()).unwrap();

        let before = original.block(0).unwrap().operations();
        let after = func.block(0).unwrap().operations();
        prop_assert_eq!(before.len(), after.len());
        for (old, new) in before.iter().zip(after) {
            if old.has_side_effects() && old.opcode() != Opcode::SetField {
                prop_assert_eq!(old, new);
            }
        }
    }

    #[test]
    fn prop_cfg_transform_preserves_output(regions in prop::collection::vec(arb_region(), 1..5)) {
        let original = build_cfg(&regions);
        prop_assert!(original.validate().is_ok());
        let mut transformed = original.clone();
        CsePass::transform(&mut transformed, &WriteAnalyzer::new()).unwrap();
        prop_assert!(transformed.validate().is_ok());
        let mut optimized = original.clone();
        CsePass::optimize(&mut optimized, &WriteAnalyzer::new()).unwrap();
        prop_assert!(optimized.validate().is_ok());

        for objects in [[100, 200], [100, 100]] {
            for inputs in [[3, -5], [-5, 3]] {
                let expected = run(&original, objects, inputs);
                prop_assert_eq!(&run(&transformed, objects, inputs), &expected);
                prop_assert_eq!(&run(&optimized, objects, inputs), &expected);
            }
        }
    }

    #[test]
    fn prop_cfg_second_run_finds_nothing(regions in prop::collection::vec(arb_region(), 1..5)) {
        let mut func = build_cfg(&regions);
        CsePass::transform(&mut func, &WriteAnalyzer::new()).unwrap();
        let once = func.clone();
        prop_assert_eq!(CsePass::transform(&mut func, &WriteAnalyzer::new()).unwrap(), 0);
        prop_assert_eq!(func, once);
    }
}

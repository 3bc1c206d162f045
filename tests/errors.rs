use bisaya::console::BufferConsole;
use bisaya::expr::{DataType, EvalErrType};
use bisaya::interpreter::{InterpretErr, Interpreter, Outcome, MAX_CALL_DEPTH};
use bisaya::parser::ParseErrType;
use bisaya::scanner::ScanErrType;
use pretty_assertions::assert_eq;

fn failing_run(code: &str, input: &[&str]) -> (InterpretErr, Interpreter<BufferConsole>) {
    let mut interp = Interpreter::with_console(BufferConsole::new(input.iter().copied()));
    let err = interp
        .run(code)
        .expect_err("program should have failed");
    (err, interp)
}

fn runtime_error(code: &str) -> EvalErrType {
    match failing_run(code, &[]).0 {
        InterpretErr::EvalErr(err) => err.kind,
        x => panic!("{x:?} should not be reported here."),
    }
}

#[test]
fn scan_errors_accumulate() {
    let (err, interp) = failing_run("SUGOD\nIPAKITA: @\nIPAKITA: ^\nKATAPUSAN", &[]);
    match &err {
        InterpretErr::ScanErrs(errs) => {
            let kinds: Vec<_> = errs.iter().map(|e| (e.line, e.kind.clone())).collect();
            assert_eq!(
                kinds,
                vec![
                    (2, ScanErrType::UnexpectedChar('@')),
                    (3, ScanErrType::UnexpectedChar('^'))
                ]
            );
        }
        x => panic!("{x:?} should not be reported here."),
    }
    assert_eq!(
        err.to_string(),
        "[Line 2] Syntax Error : Unexpected character '@'.\n[Line 3] Syntax Error : Unexpected character '^'."
    );
    assert_eq!(err.outcome(), Outcome::SyntaxError);
    assert_eq!(interp.console().output(), "");
}

#[test]
fn parse_error_prevents_execution() {
    let (err, interp) = failing_run("SUGOD\nIPAKITA: \"first\"\nIPAKITA:\nKATAPUSAN", &[]);
    match &err {
        InterpretErr::ParseErr(e) => {
            assert_eq!(e.line, 4);
            assert!(matches!(e.data, ParseErrType::ExpectedExpression(_)));
        }
        x => panic!("{x:?} should not be reported here."),
    }
    assert_eq!(err.outcome(), Outcome::SyntaxError);
    assert_eq!(interp.console().output(), "");
}

#[test]
fn output_before_runtime_error_is_kept() {
    let (err, interp) = failing_run("SUGOD\nIPAKITA: \"a\"\nIPAKITA: 1 / 0\nKATAPUSAN", &[]);
    assert_eq!(err.to_string(), "[Line 3] Runtime Error : Cannot divide by zero.");
    assert_eq!(err.outcome(), Outcome::RuntimeError);
    assert_eq!(interp.console().output(), "a");
}

#[test]
fn modulo_by_zero() {
    assert_eq!(runtime_error("SUGOD IPAKITA: 5 % 0 KATAPUSAN"), EvalErrType::DivideByZero);
    assert_eq!(runtime_error("SUGOD IPAKITA: 5.0 / 0.0 KATAPUSAN"), EvalErrType::DivideByZero);
    assert_eq!(runtime_error("SUGOD IPAKITA: 5.5 % 0.0 KATAPUSAN"), EvalErrType::DivideByZero);
}

#[test]
fn declaration_type_mismatch() {
    let (err, _) = failing_run("SUGOD\nMUGNA NUMERO x = 1.5\nKATAPUSAN", &[]);
    assert_eq!(
        err.to_string(),
        "[Line 2] Runtime Error : Value 1.5 (TIPIK) is not of type NUMERO."
    );
}

#[test]
fn boolean_declared_as_string() {
    let (err, _) = failing_run("SUGOD MUGNA PULONG s = OO KATAPUSAN", &[]);
    assert_eq!(
        err.to_string(),
        "[Line 1] Runtime Error : Value OO (TINUOD) is not of type PULONG."
    );
}

#[test]
fn assignment_type_mismatch() {
    assert_eq!(
        runtime_error("SUGOD MUGNA PULONG s = \"a\" s = 'b' KATAPUSAN"),
        EvalErrType::AssignMismatch {
            name: "s".into(),
            value: "'b'".into(),
            found: "LETRA",
            expected: DataType::String,
        }
    );
}

#[test]
fn no_numeric_promotion() {
    assert_eq!(
        runtime_error("SUGOD IPAKITA: 1 + 1.5 KATAPUSAN"),
        EvalErrType::OperandMismatch {
            op: "+".into(),
            left: "NUMERO",
            right: "TIPIK"
        }
    );
}

#[test]
fn immutable_assignment() {
    assert_eq!(
        runtime_error("SUGOD PIRMI NUMERO k = 1 k = 2 KATAPUSAN"),
        EvalErrType::Immutable("k".into())
    );
}

#[test]
fn undefined_and_unassigned_variables() {
    assert_eq!(
        runtime_error("SUGOD IPAKITA: ghost KATAPUSAN"),
        EvalErrType::UndefinedVariable("ghost".into())
    );
    assert_eq!(
        runtime_error("SUGOD MUGNA NUMERO x IPAKITA: x KATAPUSAN"),
        EvalErrType::Uninitialized("x".into())
    );
}

#[test]
fn redeclaration_in_same_scope() {
    assert_eq!(
        runtime_error("SUGOD MUGNA NUMERO x MUGNA TIPIK x KATAPUSAN"),
        EvalErrType::AlreadyDeclared("x".into())
    );
}

#[test]
fn conditions_must_be_boolean() {
    assert_eq!(
        runtime_error("SUGOD KUNG (1) PUNDOK { } KATAPUSAN"),
        EvalErrType::NonBooleanCondition("NUMERO")
    );
    assert_eq!(
        runtime_error("SUGOD IPAKITA: 1 UG OO KATAPUSAN"),
        EvalErrType::BooleanOperand {
            op: "UG".into(),
            found: "NUMERO"
        }
    );
}

#[test]
fn calling_a_value() {
    assert_eq!(
        runtime_error("SUGOD MUGNA NUMERO x = 1 x() KATAPUSAN"),
        EvalErrType::NotCallable("NUMERO")
    );
}

#[test]
fn function_argument_checks() {
    let fun = "BUHAT TIPIK half(NUMERO n) PUNDOK { IULI n / 2 }\n";
    assert_eq!(
        runtime_error(&format!("{fun}SUGOD half(1, 2) KATAPUSAN")),
        EvalErrType::WrongArgumentCount(1, 2)
    );
    assert_eq!(
        runtime_error(&format!("{fun}SUGOD half(1.0) KATAPUSAN")),
        EvalErrType::ArgumentMismatch {
            function: "half".into(),
            param: "n".into(),
            expected: DataType::Int,
            found: "TIPIK"
        }
    );
    assert_eq!(
        runtime_error(&format!("{fun}SUGOD half(4) KATAPUSAN")),
        EvalErrType::ReturnMismatch {
            function: "half".into(),
            expected: DataType::Float,
            found: "NUMERO"
        }
    );
}

#[test]
fn void_function_cannot_return_a_value() {
    assert_eq!(
        runtime_error("BUHAT f() PUNDOK { IULI 1 }\nSUGOD f() KATAPUSAN"),
        EvalErrType::VoidReturn("f".into())
    );
}

#[test]
fn typed_function_needs_a_value() {
    assert_eq!(
        runtime_error("BUHAT NUMERO f() PUNDOK { IULI }\nSUGOD f() KATAPUSAN"),
        EvalErrType::MissingReturnValue {
            function: "f".into(),
            expected: DataType::Int
        }
    );
}

#[test]
fn functions_do_not_see_caller_locals() {
    let code = "
BUHAT NUMERO peek() PUNDOK { IULI hidden }

SUGOD
PUNDOK {
    MUGNA NUMERO hidden = 1
    IPAKITA: peek()
}
KATAPUSAN";
    let (err, interp) = failing_run(code, &[]);
    match err {
        InterpretErr::EvalErr(e) => {
            assert_eq!(e.kind, EvalErrType::UndefinedVariable("hidden".into()));
            assert_eq!(e.line, 2);
        }
        x => panic!("{x:?} should not be reported here."),
    }
    assert_eq!(interp.scope_depth(), 1);
}

#[test]
fn scopes_are_popped_after_errors() {
    let code = "
SUGOD
ALANG SA (MUGNA NUMERO i = 0, i < 3, i++) PUNDOK {
    PUNDOK {
        IPAKITA: 1 / i
    }
}
KATAPUSAN";
    let (_, mut interp) = failing_run(code, &[]);
    assert_eq!(interp.scope_depth(), 1);

    interp.console_mut().take_output();
    interp.run("SUGOD IPAKITA: \"still usable\" KATAPUSAN").unwrap();
    assert_eq!(interp.console().output(), "still usable");
}

#[test]
fn scan_value_count_must_match() {
    let code = "SUGOD MUGNA NUMERO a, b DAWAT: a, b KATAPUSAN";
    match failing_run(code, &["1, 2, 3"]).0 {
        InterpretErr::EvalErr(e) => assert_eq!(e.kind, EvalErrType::TooManyValues { expected: 2 }),
        x => panic!("{x:?} should not be reported here."),
    }
    match failing_run(code, &["1"]).0 {
        InterpretErr::EvalErr(e) => assert_eq!(
            e.kind,
            EvalErrType::TooFewValues {
                expected: 2,
                received: 1
            }
        ),
        x => panic!("{x:?} should not be reported here."),
    }
    assert_eq!(runtime_error(code), EvalErrType::InputUnavailable);
}

#[test]
fn scan_value_must_fit_declared_type() {
    let code = "SUGOD MUGNA NUMERO a DAWAT: a KATAPUSAN";
    match failing_run(code, &["abc"]).0 {
        InterpretErr::EvalErr(e) => assert!(matches!(
            e.kind,
            EvalErrType::AssignMismatch {
                expected: DataType::Int,
                found: "PULONG",
                ..
            }
        )),
        x => panic!("{x:?} should not be reported here."),
    }
}

#[test]
fn native_argument_count() {
    assert_eq!(
        runtime_error("SUGOD IPAKITA: sqrt() KATAPUSAN"),
        EvalErrType::WrongArgumentCount(1, 0)
    );
    assert_eq!(
        runtime_error("SUGOD IPAKITA: pow(2) KATAPUSAN"),
        EvalErrType::WrongArgumentCount(2, 1)
    );
}

#[test]
fn natives_cannot_be_reassigned() {
    assert_eq!(
        runtime_error("SUGOD sqrt = 1 KATAPUSAN"),
        EvalErrType::Immutable("sqrt".into())
    );
}

#[test]
fn runaway_recursion_is_a_runtime_error() {
    let code = "
BUHAT NUMERO down(NUMERO n) PUNDOK {
    IULI down(n + 1)
}

SUGOD
IPAKITA: down(0)
KATAPUSAN";
    let (err, mut interp) = failing_run(code, &[]);
    match &err {
        InterpretErr::EvalErr(e) => {
            assert_eq!(e.kind, EvalErrType::StackOverflow(MAX_CALL_DEPTH));
            assert_eq!(e.line, 3);
        }
        x => panic!("{x:?} should not be reported here."),
    }
    assert_eq!(err.outcome(), Outcome::RuntimeError);
    assert_eq!(interp.scope_depth(), 1);

    interp.run("SUGOD IPAKITA: \"recovered\" KATAPUSAN").unwrap();
    assert_eq!(interp.console().output(), "recovered");
}

#[test]
fn native_argument_types() {
    assert_eq!(
        runtime_error("SUGOD IPAKITA: sqrt(\"x\") KATAPUSAN"),
        EvalErrType::NativeArgument {
            function: "sqrt",
            found: "PULONG"
        }
    );
}

#[test]
fn exit_codes() {
    assert_eq!(Outcome::Success.exit_code(), 0);
    assert_eq!(Outcome::SyntaxError.exit_code(), 65);
    assert_eq!(Outcome::RuntimeError.exit_code(), 70);
}

#[test]
fn failed_declaration_does_not_bind() {
    let (_, interp) = failing_run("SUGOD MUGNA NUMERO x = 3.5 KATAPUSAN", &[]);
    assert_eq!(interp.get_global("x"), None);
}

#[test]
fn scan_rejects_extra_values() {
    let code = "
SUGOD
MUGNA NUMERO a
MUGNA TIPIK b
MUGNA LETRA c
MUGNA TINUOD d
DAWAT: a, b, c, d
KATAPUSAN";
    let mut interp = Interpreter::with_console(BufferConsole::new(["5, 3.2, a, OO"]));
    interp.run(code).unwrap();

    match failing_run(code, &["5, 3.2, a, OO, 9"]).0 {
        InterpretErr::EvalErr(e) => assert_eq!(e.kind, EvalErrType::TooManyValues { expected: 4 }),
        x => panic!("{x:?} should not be reported here."),
    }
}

// Integration tests for the semantic analyzer

use lunac as luna;

use luna::backend::{Comparison, Event, Operand, VarRef};
use luna::error::CompileError;

fn events(source: &str) -> Vec<Event> {
    match luna::compile(source.as_bytes()) {
        Ok(log) => log.into_events(),
        Err(e) => panic!("Analysis failed: {}", e),
    }
}

fn assert_rejected(source: &str, exit_code: i32) -> CompileError {
    match luna::compile(source.as_bytes()) {
        Ok(_) => panic!("Expected exit code {}, but the program was accepted", exit_code),
        Err(e) => {
            assert_eq!(e.exit_code(), exit_code, "Unexpected error: {}", e);
            e
        }
    }
}

fn position(events: &[Event], wanted: &Event) -> usize {
    events
        .iter()
        .position(|e| e == wanted)
        .unwrap_or_else(|| panic!("Event {} not emitted", wanted))
}

fn var(name: &str, frame: usize) -> VarRef {
    VarRef {
        name: name.to_owned(),
        frame,
    }
}

// ───────────────────────── program structure ─────────────────────────

#[test]
fn test_minimal_program_emits_finalization() {
    let events = events(r#"require "ifj21""#);

    assert_eq!(
        events,
        vec![
            Event::ProgramStart,
            Event::ProgramEnd,
            Event::Builtins(vec![]),
            Event::DivByZeroTrap,
            Event::NilOperandTrap,
            Event::WriteNilTrap,
            Event::Exit,
        ]
    );
}

#[test]
fn test_missing_require_is_syntax_error() {
    assert_rejected("function main() end", 2);
    assert_rejected("require 42", 2);
}

#[test]
fn test_lexical_error_is_reported_first() {
    let err = assert_rejected(
        r#"require "ifj21"
        function main()
            local a : integer = 1 $ 2
        end"#,
        1,
    );

    assert!(err.to_string().contains("line 3"), "got: {}", err);
}

#[test]
fn test_missing_end_is_syntax_error() {
    assert_rejected(
        r#"require "ifj21"
        function main()
            local a : integer = 1"#,
        2,
    );
}

#[test]
fn test_entry_is_emitted_once() {
    let events = events(
        r#"require "ifj21"
        function main()
        end
        main()
        main()"#,
    );

    assert_eq!(events.iter().filter(|e| **e == Event::Entry).count(), 1);
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, Event::Call { function } if function == "main"))
            .count(),
        2
    );
}

#[test]
fn test_functions_after_entry_are_skipped() {
    let events = events(
        r#"require "ifj21"
        function main()
        end
        main()
        function later()
        end"#,
    );

    let skip = position(&events, &Event::FunctionSkip {
        name: "later".to_owned(),
    });
    let start = events
        .iter()
        .position(|e| matches!(e, Event::FunctionStart { name, .. } if name == "later"))
        .unwrap();
    let end = position(&events, &Event::FunctionEnd {
        name: "later".to_owned(),
    });
    let skip_end = position(&events, &Event::FunctionSkipEnd {
        name: "later".to_owned(),
    });

    assert!(skip < start);
    assert!(end < skip_end);
    assert!(!events.iter().any(|e| matches!(e, Event::FunctionSkip { name } if name == "main")));
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, Event::FunctionSkip { .. } | Event::FunctionSkipEnd { .. }))
            .count(),
        2
    );
}

// ───────────────────────── functions ─────────────────────────

#[test]
fn test_forward_declaration_matching_definition() {
    let events = events(
        r#"require "ifj21"
        global f : function(integer) : number
        function f(x : integer) : number
            return x
        end
        f(1)"#,
    );

    let start = Event::FunctionStart {
        name: "f".to_owned(),
        params: vec![var("x", 0)],
        returns: vec![luna::types::Type::Number],
    };
    let widen = position(&events, &Event::IntToNumber { depth: 0 });
    let retval = position(&events, &Event::ReturnValue { index: 0 });

    assert!(position(&events, &start) < widen);
    assert!(widen < retval);
}

#[test]
fn test_forward_declaration_parameter_mismatch() {
    assert_rejected(
        r#"require "ifj21"
        global f : function(integer) : number
        function f(x : number) : number
            return x
        end"#,
        5,
    );
}

#[test]
fn test_forward_declaration_return_mismatch() {
    assert_rejected(
        r#"require "ifj21"
        global f : function(integer) : number, string
        function f(x : integer) : number
        end"#,
        5,
    );
}

#[test]
fn test_declared_but_never_defined() {
    let err = assert_rejected(
        r#"require "ifj21"
        global later : function()"#,
        3,
    );

    assert!(err.to_string().contains("later"), "got: {}", err);
}

#[test]
fn test_redefinition_is_rejected() {
    assert_rejected(
        r#"require "ifj21"
        function f() end
        function f() end"#,
        3,
    );

    assert_rejected(
        r#"require "ifj21"
        function write() end"#,
        3,
    );
}

#[test]
fn test_duplicate_forward_declaration() {
    assert_rejected(
        r#"require "ifj21"
        global f : function()
        global f : function()"#,
        3,
    );
}

#[test]
fn test_recursive_call_is_allowed() {
    let events = events(
        r#"require "ifj21"
        function countdown(n : integer)
            if n > 0 then
                local m : integer = n - 1
                countdown(m)
            end
        end
        countdown(3)"#,
    );

    assert!(events.contains(&Event::Call {
        function: "countdown".to_owned()
    }));
}

#[test]
fn test_call_of_undeclared_function() {
    assert_rejected(
        r#"require "ifj21"
        function main()
        end
        g()"#,
        3,
    );
}

#[test]
fn test_parameter_named_after_function() {
    assert_rejected(
        r#"require "ifj21"
        function f(write : integer)
        end"#,
        3,
    );
}

// ───────────────────────── locals and scopes ─────────────────────────

#[test]
fn test_integer_literal_into_number_slot() {
    let events = events(
        r#"require "ifj21"
        function main()
            local a : number
            a = 5
        end
        main()"#,
    );

    let conversions = events
        .iter()
        .filter(|e| matches!(e, Event::IntToNumber { .. }))
        .count();
    assert_eq!(conversions, 1);

    let widen = position(&events, &Event::IntToNumber { depth: 0 });
    let assign = position(&events, &Event::Assign { target: var("a", 0) });
    assert!(widen < assign);
    assert_eq!(events[widen - 1], Event::PushOperand(Operand::Integer(5)));
}

#[test]
fn test_shadowed_local_is_restored() {
    let events = events(
        r#"require "ifj21"
        function main()
            local x : integer = 1
            if x > 0 then
                local x : string = "inner"
                write(x)
            end
            x = x + 1
        end
        main()"#,
    );

    assert!(events.contains(&Event::Write(Operand::Variable(var("x", 1)))));
    assert!(events.contains(&Event::Assign { target: var("x", 0) }));
}

#[test]
fn test_duplicate_local_in_same_scope() {
    assert_rejected(
        r#"require "ifj21"
        function main()
            local a : integer
            local a : string
        end"#,
        3,
    );
}

#[test]
fn test_local_named_after_function() {
    assert_rejected(
        r#"require "ifj21"
        function main()
            local readi : integer
        end"#,
        3,
    );
}

#[test]
fn test_initializer_type_mismatch() {
    assert_rejected(
        r#"require "ifj21"
        function main()
            local s : string = 1
        end"#,
        4,
    );
}

#[test]
fn test_condition_cannot_initialize() {
    assert_rejected(
        r#"require "ifj21"
        function main()
            local b : integer = 1 < 2
        end"#,
        6,
    );
}

#[test]
fn test_call_result_into_wrong_type() {
    assert_rejected(
        r#"require "ifj21"
        function f() : integer
            return
        end
        function main()
            local x : string = f()
        end
        main()"#,
        4,
    );
}

#[test]
fn test_call_initializer_widens_result() {
    let events = events(
        r#"require "ifj21"
        function main()
            local n : number = readi()
        end
        main()"#,
    );

    let call = position(&events, &Event::Call {
        function: "readi".to_owned(),
    });
    let widen = position(&events, &Event::ResultToNumber { index: 0 });
    let store = position(&events, &Event::AssignCall {
        targets: vec![var("n", 0)],
    });

    assert!(call < widen && widen < store);
}

#[test]
fn test_initializer_from_call_without_results() {
    assert_rejected(
        r#"require "ifj21"
        function nothing()
        end
        function main()
            local n : integer = nothing()
        end"#,
        5,
    );
}

// ───────────────────────── expressions ─────────────────────────

#[test]
fn test_nil_in_arithmetic() {
    for expr in ["1 + nil", "nil * 2", "(3 - 1) // nil", "\"a\" .. nil"] {
        let source = format!(
            "require \"ifj21\"\nfunction main()\nlocal a : integer = {}\nend",
            expr
        );
        assert_rejected(&source, 6);
    }
}

#[test]
fn test_nil_in_ordering_comparison() {
    assert_rejected(
        r#"require "ifj21"
        function main()
            if nil < 1 then
            end
        end"#,
        8,
    );
}

#[test]
fn test_nil_equality_is_allowed() {
    let events = events(
        r#"require "ifj21"
        function main()
            local s : string = reads()
            if s == nil then
                write("none")
            end
        end
        main()"#,
    );

    assert!(events.contains(&Event::PushCompare(Comparison::Eq)));
}

#[test]
fn test_call_inside_expression_is_syntax_error() {
    assert_rejected(
        r#"require "ifj21"
        function main()
            local a : integer = 1 + readi()
        end"#,
        2,
    );
}

#[test]
fn test_undefined_variable_in_expression() {
    assert_rejected(
        r#"require "ifj21"
        function main()
            local a : integer = ghost * 2
        end"#,
        3,
    );
}

#[test]
fn test_string_length_and_concat() {
    let events = events(
        r#"require "ifj21"
        function main()
            local s : string = "ab" .. "cd"
            local n : integer = #s + 1
        end
        main()"#,
    );

    assert!(events.contains(&Event::Assign { target: var("n", 0) }));
}

// ───────────────────────── assignment ─────────────────────────

#[test]
fn test_multi_assignment_with_undeclared_target() {
    let err = assert_rejected(
        r#"require "ifj21"
        function main()
            local a : integer
            a, b = 1, 2
        end"#,
        3,
    );

    assert!(err.to_string().contains('b'), "got: {}", err);
}

#[test]
fn test_multi_assignment_from_values() {
    let events = events(
        r#"require "ifj21"
        function main()
            local a : integer
            local b : number
            a, b = 1, 2
        end
        main()"#,
    );

    let first = position(&events, &Event::Assign { target: var("b", 0) });
    let second = position(&events, &Event::Assign { target: var("a", 0) });

    assert!(first < second, "last value is stored first");
    assert_eq!(events[first - 1], Event::IntToNumber { depth: 0 });
}

#[test]
fn test_multi_assignment_count_mismatch() {
    assert_rejected(
        r#"require "ifj21"
        function main()
            local a : integer
            local b : integer
            a, b = 1
        end"#,
        5,
    );

    assert_rejected(
        r#"require "ifj21"
        function main()
            local a : integer
            a = 1, 2
        end"#,
        5,
    );
}

#[test]
fn test_multi_assignment_type_mismatch() {
    assert_rejected(
        r#"require "ifj21"
        function main()
            local a : integer
            local b : integer
            a, b = "s", 2
        end"#,
        4,
    );
}

#[test]
fn test_multi_assignment_from_call() {
    let events = events(
        r#"require "ifj21"
        function pair() : integer, number
            return 1, 2
        end
        function main()
            local a : integer
            local b : number
            a, b = pair()
        end
        main()"#,
    );

    assert!(events.contains(&Event::AssignCall {
        targets: vec![var("a", 0), var("b", 0)],
    }));
    assert!(events.contains(&Event::ReturnValue { index: 1 }));
}

#[test]
fn test_call_with_too_few_results() {
    let err = assert_rejected(
        r#"require "ifj21"
        function one() : integer
            return 1
        end
        function main()
            local a : integer
            local b : integer
            a, b = one()
        end"#,
        5,
    );

    assert!(err.to_string().contains("'one'"), "Callee not named: {}", err);
}

#[test]
fn test_call_result_type_names_callee() {
    let err = assert_rejected(
        r#"require "ifj21"
        function name() : string
            return "x"
        end
        function main()
            local a : integer
            a = name()
        end"#,
        5,
    );

    assert!(err.to_string().contains("'name'"), "Callee not named: {}", err);
}

// ───────────────────────── calls ─────────────────────────

#[test]
fn test_argument_widening() {
    let events = events(
        r#"require "ifj21"
        function main()
            local s : string = substr("hello", 1, 3)
        end
        main()"#,
    );

    assert!(events.contains(&Event::NumConversion { index: 1 }));
    assert!(events.contains(&Event::NumConversion { index: 2 }));
    assert!(!events.contains(&Event::NumConversion { index: 0 }));
}

#[test]
fn test_argument_mismatch() {
    assert_rejected(
        r#"require "ifj21"
        function main()
            local c : string = chr("x")
        end"#,
        5,
    );

    assert_rejected(
        r#"require "ifj21"
        function main()
            local n : integer = ord("a")
        end"#,
        5,
    );
}

#[test]
fn test_write_is_variadic() {
    let events = events(
        r#"require "ifj21"
        function main()
            local n : number = 1.5
            write("a", 1, n, nil)
            write()
        end
        main()"#,
    );

    let writes = events.iter().filter(|e| matches!(e, Event::Write(_))).count();
    assert_eq!(writes, 4);
    assert!(!events
        .iter()
        .any(|e| matches!(e, Event::CallPrepare { function } if function == "write")));
}

#[test]
fn test_used_builtins_are_reported_sorted() {
    let events = events(
        r#"require "ifj21"
        function main()
            local n : integer = readi()
            write(n)
        end
        main()"#,
    );

    assert!(events.contains(&Event::Builtins(vec![
        "readi".to_owned(),
        "write".to_owned()
    ])));
}

// ───────────────────────── control flow ─────────────────────────

#[test]
fn test_if_else_events() {
    let events = events(
        r#"require "ifj21"
        function main()
            local a : integer = readi()
            if a == 1 then
                write("one")
            else
                write("other")
            end
        end
        main()"#,
    );

    let start = position(&events, &Event::IfStart);
    let other = position(&events, &Event::Else);
    let end = position(&events, &Event::IfEnd);

    assert!(start < other && other < end);
}

#[test]
fn test_else_without_if() {
    assert_rejected(
        r#"require "ifj21"
        function main()
            local i : integer = 0
            while i < 1 do
            else
            end
        end"#,
        2,
    );
}

#[test]
fn test_while_events_and_hoisting() {
    let events = events(
        r#"require "ifj21"
        function main()
            local i : integer = 0
            while i < 3 do
                local j : integer = i
                i = i + 1
            end
        end
        main()"#,
    );

    let start = position(&events, &Event::WhileStart);
    let compare = position(&events, &Event::PushCompare(Comparison::Less));
    let skip = position(&events, &Event::WhileSkip);
    let end = position(&events, &Event::WhileEnd);

    assert!(start < compare && compare < skip && skip < end);
    assert!(events.contains(&Event::DeclareLocal {
        var: var("j", 1),
        hoisted: true,
    }));
    assert!(events.contains(&Event::DeclareLocal {
        var: var("i", 0),
        hoisted: false,
    }));
}

#[test]
fn test_call_as_condition() {
    assert_rejected(
        r#"require "ifj21"
        function main()
            if readi() then
            end
        end"#,
        2,
    );
}

// ───────────────────────── return ─────────────────────────

#[test]
fn test_too_many_return_values() {
    assert_rejected(
        r#"require "ifj21"
        function f() : integer
            return 1, 2
        end"#,
        5,
    );
}

#[test]
fn test_return_type_mismatch() {
    assert_rejected(
        r#"require "ifj21"
        function f() : integer
            return "one"
        end"#,
        5,
    );
}

#[test]
fn test_return_of_call() {
    let events = events(
        r#"require "ifj21"
        function one() : integer
            return 1
        end
        function two() : number
            return one()
        end
        two()"#,
    );

    let widen = position(&events, &Event::ResultToNumber { index: 0 });
    let forward = position(&events, &Event::ReturnCall {
        function: "one".to_owned(),
    });

    assert!(widen < forward);
}

#[test]
fn test_statement_after_return_is_rejected() {
    let err = assert_rejected(
        r#"require "ifj21"
        function f() : integer
            return
            local y : integer
        end"#,
        2,
    );

    assert!(err.to_string().contains("last statement"), "Unexpected message: {}", err);
}

#[test]
fn test_return_does_not_swallow_following_call() {
    let err = assert_rejected(
        r#"require "ifj21"
        function f(x : integer)
            return
            write(x)
        end"#,
        5,
    );

    assert!(err.to_string().contains("'write'"), "Unexpected message: {}", err);
}

#[test]
fn test_bare_return_before_else() {
    let events = events(
        r#"require "ifj21"
        function f(x : integer)
            if x > 0 then
                return
            else
                write(x)
            end
        end"#,
    );

    let ret = position(&events, &Event::FunctionReturn);
    let branch = position(&events, &Event::Else);

    assert!(ret < branch);
}

#[test]
fn test_io_errors_exit_with_internal_code() {
    let err = CompileError::from(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        "no such file",
    ));

    assert_eq!(err.exit_code(), 99);
    assert_ne!(err.exit_code(), CompileError::lex(1, "bad").exit_code());
}

#[test]
fn test_event_log_renders_json() {
    let log = luna::compile(br#"require "ifj21""#).unwrap();
    let json = log.to_json().unwrap();

    assert!(json.contains("ProgramStart"));
    assert!(log.to_string().starts_with("program-start\n"));
}

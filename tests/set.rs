//! SET scenarios: global and session scope, and the missing-parent
//! failure.

mod common;

use common::{int_literal, session_context, text_literal};
use quarry_sql::{
    collect_rows, Config, DataType, Error, Expression, Node, Scope, SetUpdate, Value,
};
use std::sync::Arc;

fn updates() -> Vec<SetUpdate> {
    vec![
        SetUpdate {
            name: "a".into(),
            value: int_literal(1),
        },
        SetUpdate {
            name: "b".into(),
            value: text_literal("foo"),
        },
        SetUpdate {
            name: "c".into(),
            value: Expression::Literal(Value::F64(3.14), DataType::F64),
        },
        SetUpdate {
            name: "d".into(),
            value: Expression::Literal(Value::Bool(true), DataType::Bool),
        },
    ]
}

#[test]
fn set_global_writes_parent_config() {
    let global = Arc::new(Config::new());
    let ctx = session_context(&global);

    let node = Node::Set {
        scope: Scope::Global,
        updates: updates(),
    };

    let mut iter = node.row_iter(&ctx).unwrap();
    let rows = collect_rows(iter.as_mut()).unwrap();
    assert_eq!(
        rows,
        vec![
            vec![Value::Str("a".into()), Value::I64(1)],
            vec![Value::Str("b".into()), Value::Str("foo".into())],
            vec![Value::Str("c".into()), Value::F64(3.14)],
            vec![Value::Str("d".into()), Value::Bool(true)],
        ]
    );

    assert_eq!(global.get_int("a", 0).unwrap(), 1);
    assert_eq!(global.get_string("b", "").unwrap(), "foo");
    assert_eq!(global.get_float("c", 0.0).unwrap(), 3.14);
    assert!(global.get_bool("d", false).unwrap());

    // The session config observes the values via inheritance.
    assert_eq!(ctx.config().get_int("a", 0).unwrap(), 1);
}

#[test]
fn set_session_leaves_global_untouched() {
    let global = Arc::new(Config::new());
    let ctx = session_context(&global);

    let node = Node::Set {
        scope: Scope::Session,
        updates: vec![
            SetUpdate {
                name: "a".into(),
                value: int_literal(3),
            },
            SetUpdate {
                name: "c".into(),
                value: text_literal("foo"),
            },
        ],
    };

    let mut iter = node.row_iter(&ctx).unwrap();
    let rows = collect_rows(iter.as_mut()).unwrap();
    assert_eq!(
        rows,
        vec![
            vec![Value::Str("a".into()), Value::I64(3)],
            vec![Value::Str("c".into()), Value::Str("foo".into())],
        ]
    );

    assert_eq!(global.get_int("a", 0).unwrap(), 0);
    assert_eq!(global.get_string("c", "").unwrap(), "");
    assert_eq!(ctx.config().get_int("a", 0).unwrap(), 3);
    assert_eq!(ctx.config().get_string("c", "").unwrap(), "foo");
}

#[test]
fn set_global_without_parent_fails() {
    let ctx = quarry_sql::Context::empty();

    let node = Node::Set {
        scope: Scope::Global,
        updates: vec![SetUpdate {
            name: "a".into(),
            value: int_literal(1),
        }],
    };

    assert_eq!(
        node.row_iter(&ctx).unwrap_err(),
        Error::UnableToAccessGlobalConfig
    );
}

#[test]
fn set_coerces_by_declared_type() {
    let global = Arc::new(Config::new());
    let ctx = session_context(&global);

    // A float32 literal is stored as float64; an i16 literal as int64.
    let node = Node::Set {
        scope: Scope::Global,
        updates: vec![
            SetUpdate {
                name: "f".into(),
                value: Expression::Literal(Value::F32(1.5), DataType::F32),
            },
            SetUpdate {
                name: "i".into(),
                value: Expression::Literal(Value::I16(7), DataType::I16),
            },
        ],
    };

    let mut iter = node.row_iter(&ctx).unwrap();
    collect_rows(iter.as_mut()).unwrap();

    assert_eq!(global.get_float("f", 0.0).unwrap(), 1.5);
    assert_eq!(global.get_int("i", 0).unwrap(), 7);
}

//! The `math` module: integer arithmetic and comparisons
//!
//! Arithmetic is fixed-width and wraps like the machine's registers.
//! Division is the exception: a zero divisor is a fatal error rather
//! than a trap, and a single operand divides one, so `(/ x)` is `1/x`.

use lone_core::error::{Error, Result};

use crate::heap::Heap;
use crate::interpreter::Interpreter;
use crate::intrinsics::apply_comparator;
use crate::list;
use crate::modules;
use crate::value::{
    Value, integer_is_greater_than, integer_is_greater_than_or_equal_to, integer_is_less_than,
    integer_is_less_than_or_equal_to,
};

pub fn initialize(interpreter: &mut Interpreter) -> Result<()> {
    let name = interpreter.intern_static("math")?;
    let module = modules::for_name(interpreter, name)?;
    let flags = crate::value::FunctionFlags::EVALUATE_ARGUMENTS;

    modules::export_primitive(interpreter, module, "+", "add", add, module, flags)?;
    modules::export_primitive(interpreter, module, "-", "subtract", subtract, module, flags)?;
    modules::export_primitive(interpreter, module, "*", "multiply", multiply, module, flags)?;
    modules::export_primitive(interpreter, module, "/", "divide", divide, module, flags)?;
    modules::export_primitive(
        interpreter,
        module,
        "<",
        "is_less_than",
        less_than,
        module,
        flags,
    )?;
    modules::export_primitive(
        interpreter,
        module,
        "<=",
        "is_less_than_or_equal_to",
        less_than_or_equal,
        module,
        flags,
    )?;
    modules::export_primitive(
        interpreter,
        module,
        ">",
        "is_greater_than",
        greater_than,
        module,
        flags,
    )?;
    modules::export_primitive(
        interpreter,
        module,
        ">=",
        "is_greater_than_or_equal_to",
        greater_than_or_equal,
        module,
        flags,
    )?;
    modules::export_primitive(interpreter, module, "sign", "sign", sign, module, flags)?;
    modules::export_primitive(interpreter, module, "zero?", "is_zero", is_zero, module, flags)?;
    modules::export_primitive(
        interpreter,
        module,
        "positive?",
        "is_positive",
        is_positive,
        module,
        flags,
    )?;
    modules::export_primitive(
        interpreter,
        module,
        "negative?",
        "is_negative",
        is_negative,
        module,
        flags,
    )?;

    modules::bind_exports_to_top_level(interpreter, module)
}

fn integer(value: Value) -> Result<i64> {
    value
        .as_integer()
        .ok_or_else(|| Error::Type("arithmetic requires integers".into()))
}

fn fold(values: &[Value], accumulator: i64, operation: fn(i64, i64) -> i64) -> Result<Value> {
    let mut accumulator = accumulator;
    for &value in values {
        accumulator = operation(accumulator, integer(value)?);
    }
    Ok(Value::Integer(accumulator))
}

/// `(+ n...)`: zero arguments yield 0.
fn add(
    interpreter: &mut Interpreter,
    _module: Value,
    _environment: Value,
    arguments: Value,
    _closure: Value,
) -> Result<Value> {
    let values = list::collect_values(&interpreter.heap, arguments)?;
    fold(&values, 0, i64::wrapping_add)
}

/// `(- n...)`: with two or more operands subtracts from the first,
/// otherwise negates.
fn subtract(
    interpreter: &mut Interpreter,
    _module: Value,
    _environment: Value,
    arguments: Value,
    _closure: Value,
) -> Result<Value> {
    let values = list::collect_values(&interpreter.heap, arguments)?;
    if values.len() >= 2 {
        fold(&values[1..], integer(values[0])?, i64::wrapping_sub)
    } else {
        fold(&values, 0, i64::wrapping_sub)
    }
}

/// `(* n...)`: zero arguments yield 1.
fn multiply(
    interpreter: &mut Interpreter,
    _module: Value,
    _environment: Value,
    arguments: Value,
    _closure: Value,
) -> Result<Value> {
    let values = list::collect_values(&interpreter.heap, arguments)?;
    fold(&values, 1, i64::wrapping_mul)
}

/// `(/ x)` is `1/x`; `(/ x a b ...)` is `x / (a * b * ...)`. A zero
/// divisor is fatal.
fn divide(
    interpreter: &mut Interpreter,
    _module: Value,
    _environment: Value,
    arguments: Value,
    _closure: Value,
) -> Result<Value> {
    let values = list::collect_values(&interpreter.heap, arguments)?;
    if values.is_empty() {
        return Err(Error::Arity("division requires a dividend".into()));
    }

    let dividend = integer(values[0])?;
    let (dividend, divisor) = if values.len() == 1 {
        (1, dividend)
    } else {
        let divisor = fold(&values[1..], 1, i64::wrapping_mul)?;
        (dividend, integer(divisor)?)
    };

    if divisor == 0 {
        return Err(Error::UndefinedOperation("division by zero".into()));
    }
    Ok(Value::Integer(dividend.wrapping_div(divisor)))
}

fn less_than(
    interpreter: &mut Interpreter,
    _module: Value,
    _environment: Value,
    arguments: Value,
    _closure: Value,
) -> Result<Value> {
    apply_comparator(interpreter, arguments, compare_less_than)
}

fn less_than_or_equal(
    interpreter: &mut Interpreter,
    _module: Value,
    _environment: Value,
    arguments: Value,
    _closure: Value,
) -> Result<Value> {
    apply_comparator(interpreter, arguments, compare_less_than_or_equal)
}

fn greater_than(
    interpreter: &mut Interpreter,
    _module: Value,
    _environment: Value,
    arguments: Value,
    _closure: Value,
) -> Result<Value> {
    apply_comparator(interpreter, arguments, compare_greater_than)
}

fn greater_than_or_equal(
    interpreter: &mut Interpreter,
    _module: Value,
    _environment: Value,
    arguments: Value,
    _closure: Value,
) -> Result<Value> {
    apply_comparator(interpreter, arguments, compare_greater_than_or_equal)
}

fn compare_less_than(_: &Heap, x: Value, y: Value) -> Result<bool> {
    integer_is_less_than(x, y)
}

fn compare_less_than_or_equal(_: &Heap, x: Value, y: Value) -> Result<bool> {
    integer_is_less_than_or_equal_to(x, y)
}

fn compare_greater_than(_: &Heap, x: Value, y: Value) -> Result<bool> {
    integer_is_greater_than(x, y)
}

fn compare_greater_than_or_equal(_: &Heap, x: Value, y: Value) -> Result<bool> {
    integer_is_greater_than_or_equal_to(x, y)
}

fn sign_of(interpreter: &Interpreter, arguments: Value) -> Result<i64> {
    let [value] = list::destructure::<1>(&interpreter.heap, arguments)?;
    Ok(integer(value)?.signum())
}

/// `(sign n)`: -1, 0 or 1.
fn sign(
    interpreter: &mut Interpreter,
    _module: Value,
    _environment: Value,
    arguments: Value,
    _closure: Value,
) -> Result<Value> {
    sign_of(interpreter, arguments).map(Value::Integer)
}

/// `(zero? n)`: the sign when zero (which is truthy), nil otherwise.
fn is_zero(
    interpreter: &mut Interpreter,
    _module: Value,
    _environment: Value,
    arguments: Value,
    _closure: Value,
) -> Result<Value> {
    let sign = sign_of(interpreter, arguments)?;
    Ok(if sign == 0 { Value::Integer(sign) } else { Value::Nil })
}

fn is_positive(
    interpreter: &mut Interpreter,
    _module: Value,
    _environment: Value,
    arguments: Value,
    _closure: Value,
) -> Result<Value> {
    let sign = sign_of(interpreter, arguments)?;
    Ok(if sign > 0 { Value::Integer(sign) } else { Value::Nil })
}

fn is_negative(
    interpreter: &mut Interpreter,
    _module: Value,
    _environment: Value,
    arguments: Value,
    _closure: Value,
) -> Result<Value> {
    let sign = sign_of(interpreter, arguments)?;
    Ok(if sign < 0 { Value::Integer(sign) } else { Value::Nil })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn integer_result(source: &str) -> i64 {
        let mut interpreter = Interpreter::new().unwrap();
        interpreter
            .evaluate_str(source)
            .unwrap()
            .as_integer()
            .unwrap()
    }

    fn error(source: &str) -> Error {
        let mut interpreter = Interpreter::new().unwrap();
        interpreter.evaluate_str(source).unwrap_err()
    }

    #[test]
    fn test_addition_and_identity() {
        assert_eq!(integer_result("(+ 1 2 3)"), 6);
        assert_eq!(integer_result("(+)"), 0);
        assert_eq!(integer_result("(+ -5)"), -5);
    }

    #[test]
    fn test_subtraction_negates_single_operands() {
        assert_eq!(integer_result("(- 100 58)"), 42);
        assert_eq!(integer_result("(- 5)"), -5);
        assert_eq!(integer_result("(- 10 1 2)"), 7);
    }

    #[test]
    fn test_multiplication_and_identity() {
        assert_eq!(integer_result("(*)"), 1);
        assert_eq!(integer_result("(* 2 3 4)"), 24);
    }

    #[test]
    fn test_division_semantics() {
        assert_eq!(integer_result("(/ 10 2)"), 5);
        assert_eq!(integer_result("(/ 10 2 2)"), 2);
        // single operand: 1/x in integer division
        assert_eq!(integer_result("(/ 2)"), 0);
        assert_eq!(integer_result("(/ 1)"), 1);
    }

    #[test]
    fn test_division_by_zero_is_fatal() {
        assert!(matches!(error("(/ 1 0)"), Error::UndefinedOperation(_)));
        assert!(matches!(error("(/ 0)"), Error::UndefinedOperation(_)));
    }

    #[test]
    fn test_arithmetic_rejects_non_integers() {
        assert!(matches!(error("(+ 1 \"x\")"), Error::Type(_)));
    }

    #[test]
    fn test_arithmetic_wraps() {
        assert_eq!(
            integer_result(&format!("(+ {} 1)", i64::MAX)),
            i64::MIN
        );
    }

    #[test]
    fn test_comparisons_chain() {
        let mut interpreter = Interpreter::new().unwrap();
        assert!(interpreter.evaluate_str("(< 1 2 3)").unwrap().is_truthy());
        assert!(interpreter.evaluate_str("(< 1 3 2)").unwrap().is_nil());
        assert!(interpreter.evaluate_str("(<= 1 1 2)").unwrap().is_truthy());
        assert!(interpreter.evaluate_str("(> 3 2 1)").unwrap().is_truthy());
        assert!(interpreter.evaluate_str("(>= 3 3)").unwrap().is_truthy());
    }

    #[test]
    fn test_comparing_non_integers_is_fatal() {
        assert!(matches!(
            error("(< 1 \"two\")"),
            Error::UndefinedOperation(_)
        ));
    }

    #[test]
    fn test_sign_family() {
        assert_eq!(integer_result("(sign -9)"), -1);
        assert_eq!(integer_result("(sign 9)"), 1);
        assert_eq!(integer_result("(sign 0)"), 0);

        let mut interpreter = Interpreter::new().unwrap();
        // zero? returns the sign itself, which is truthy because not nil
        assert!(interpreter.evaluate_str("(zero? 0)").unwrap().is_truthy());
        assert!(interpreter.evaluate_str("(zero? 1)").unwrap().is_nil());
        assert!(interpreter.evaluate_str("(positive? 2)").unwrap().is_truthy());
        assert!(interpreter.evaluate_str("(negative? -2)").unwrap().is_truthy());
    }
}

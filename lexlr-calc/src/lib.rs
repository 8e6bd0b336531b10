//! A calculator grammar built on `lexlr`.
//!
//! Accepts integers, decimals and floats with exponents, the constants
//! `nan`, `inf`, `pi` and `e`, the functions `sin cos tan exp ln floor`,
//! unary signs, postfix factorial `!`, right-associative `^`, and the usual
//! left-associative `+ - * /` with `()` grouping.

use lexlr::{CompileError, Grammar, Parser, Strategy, SyntaxError, Terminal, Token, rhs};

/// Value on the parse stack: a raw token for shifted terminals, a number for
/// every reduced expression.
#[derive(Debug, Clone)]
pub enum Value {
    Token(Token),
    Number(f64),
}

impl From<Token> for Value {
    fn from(token: Token) -> Value {
        Value::Token(token)
    }
}

impl Value {
    fn number(&self) -> f64 {
        match self {
            Value::Number(n) => *n,
            Value::Token(t) => t.text.parse().unwrap_or(f64::NAN),
        }
    }
}

/// Factorial extended to doubles the blunt way: NaN below zero, infinity
/// past 200, and no special treatment for non-integers.
fn factorial(n: f64) -> f64 {
    if n < 0.0 {
        return f64::NAN;
    }
    if n > 200.0 {
        return f64::INFINITY;
    }
    let mut result = 1.0;
    let mut n = n;
    while n > 1.0 {
        result *= n;
        n -= 1.0;
    }
    result
}

fn first(mut values: Vec<Value>, _: &Token) -> Value {
    values.swap_remove(0)
}

/// Compiles the calculator parser under the given table strategy.
pub fn make_parser(strategy: Strategy) -> Result<Parser<Value>, CompileError> {
    let integer = Terminal::char('0')
        | (Terminal::range('1', '9') + Terminal::digit().repeat(0..));
    let decimal = integer.clone()
        | (integer.clone() + '.' + Terminal::digit().repeat(0..))
        | (Terminal::char('.') + Terminal::digit().repeat(0..));
    let exponent =
        (Terminal::one_of(['e', 'E']) + Terminal::one_of(['+', '-']).repeat(0..=1) + integer)
            .repeat(0..=1);
    let number = (decimal + exponent).named("num");

    let mut g: Grammar<Value> = Grammar::new();
    let expression = g.symbol("expression");
    let additive = g.symbol("additive");
    let multiplicative = g.symbol("multiplicative");
    let unary = g.symbol("unary");
    let postfix = g.symbol("postfix");
    let primary = g.symbol("primary");

    g.rule(primary, rhs!['(', expression, ')'], |mut v, _| {
        v.swap_remove(1)
    });
    g.rule(primary, rhs![&number], |v, _| {
        Value::Number(v[0].number())
    });
    g.rule(primary, rhs!["nan"], |_, _| Value::Number(f64::NAN));
    g.rule(primary, rhs!["inf"], |_, _| Value::Number(f64::INFINITY));
    g.rule(primary, rhs!["pi"], |_, _| Value::Number(std::f64::consts::PI));
    g.rule(primary, rhs!["e"], |_, _| Value::Number(std::f64::consts::E));

    g.rule(postfix, rhs![primary], first);
    g.rule(postfix, rhs![postfix, '!'], |v, _| {
        Value::Number(factorial(v[0].number()))
    });
    // ^ associates to the right: 2^3^2 is 2^(3^2)
    g.rule(postfix, rhs![primary, '^', postfix], |v, _| {
        Value::Number(v[0].number().powf(v[2].number()))
    });

    g.rule(unary, rhs![postfix], first);
    g.rule(unary, rhs!['+', unary], |v, _| {
        Value::Number(v[1].number())
    });
    g.rule(unary, rhs!['-', unary], |v, _| {
        Value::Number(-v[1].number())
    });
    for (name, f) in [
        ("ln", f64::ln as fn(f64) -> f64),
        ("sin", f64::sin),
        ("cos", f64::cos),
        ("tan", f64::tan),
        ("exp", f64::exp),
        ("floor", f64::floor),
    ] {
        g.rule(unary, rhs![name, unary], move |v, _| {
            Value::Number(f(v[1].number()))
        });
    }

    g.rule(multiplicative, rhs![unary], first);
    g.rule(multiplicative, rhs![multiplicative, '*', unary], |v, _| {
        Value::Number(v[0].number() * v[2].number())
    });
    g.rule(multiplicative, rhs![multiplicative, '/', unary], |v, _| {
        Value::Number(v[0].number() / v[2].number())
    });

    g.rule(additive, rhs![additive, '+', multiplicative], |v, _| {
        Value::Number(v[0].number() + v[2].number())
    });
    g.rule(additive, rhs![additive, '-', multiplicative], |v, _| {
        Value::Number(v[0].number() - v[2].number())
    });
    g.rule(additive, rhs![multiplicative], first);

    g.rule(expression, rhs![additive], first);

    let whitespace = Terminal::one_of([' ', '\t']).repeat(1..).named("ws");
    g.make_parser_with(expression, strategy, &[whitespace])
}

/// Parses and evaluates one expression.
pub fn evaluate(parser: &Parser<Value>, line: &str) -> Result<f64, SyntaxError> {
    parser.parse(line.chars()).map(|v| v.number())
}

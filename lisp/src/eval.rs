use std::cell::Cell;
use std::rc::Rc;

use evaluator::Callbacks;

use crate::env::Env;
use crate::error::LispError;
use crate::value::{Lambda, Value};

const MAX_DEPTH: usize = 256;

/// What evaluated code can reach besides its environment: the host
/// capabilities of the block being evaluated.
#[derive(Clone, Default)]
pub struct Context {
    pub callbacks: Callbacks,
    depth: Cell<usize>,
}

impl Context {
    pub fn new(callbacks: Callbacks) -> Self {
        Context {
            callbacks,
            depth: Cell::new(0),
        }
    }

    fn descend(&self) -> Result<DepthGuard<'_>, LispError> {
        let depth = self.depth.get() + 1;
        if depth > MAX_DEPTH {
            return Err(LispError::StackOverflow);
        }
        self.depth.set(depth);
        Ok(DepthGuard(&self.depth))
    }
}

struct DepthGuard<'a>(&'a Cell<usize>);

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get() - 1);
    }
}

/// Evaluate one form.
pub fn eval(form: &Value, env: &Env, ctx: &Context) -> Result<Value, LispError> {
    let _guard = ctx.descend()?;

    match form {
        Value::Symbol(name) => env
            .get(name)
            .ok_or_else(|| LispError::UndefinedSymbol(name.clone())),

        Value::Vector(items) => Ok(Value::Vector(
            items
                .iter()
                .map(|item| eval(item, env, ctx))
                .collect::<Result<_, _>>()?,
        )),

        Value::Map(entries) => {
            let mut evaluated = Vec::with_capacity(entries.len());
            for (k, v) in entries {
                evaluated.push((eval(k, env, ctx)?, eval(v, env, ctx)?));
            }
            Ok(Value::Map(evaluated))
        }

        Value::List(items) if items.is_empty() => Ok(Value::List(Vec::new())),

        Value::List(items) => {
            if let Value::Symbol(head) = &items[0] {
                if let Some(result) = eval_special_form(head, &items[1..], env, ctx) {
                    return result;
                }
            }

            let f = eval(&items[0], env, ctx)?;
            let args = items[1..]
                .iter()
                .map(|arg| eval(arg, env, ctx))
                .collect::<Result<Vec<_>, _>>()?;
            apply(&f, args, ctx)
        }

        other => Ok(other.clone()),
    }
}

/// Evaluate `forms` in order, returning the last value (nil if none).
pub fn eval_body(forms: &[Value], env: &Env, ctx: &Context) -> Result<Value, LispError> {
    let mut result = Value::Nil;
    for form in forms {
        result = eval(form, env, ctx)?;
    }
    Ok(result)
}

/// Call a function value with already evaluated arguments.
pub fn apply(f: &Value, args: Vec<Value>, ctx: &Context) -> Result<Value, LispError> {
    let _guard = ctx.descend()?;

    match f {
        Value::Builtin(_, func) => func(&args, ctx),

        Value::Lambda(lambda) => {
            let arity_ok = match &lambda.rest {
                Some(_) => args.len() >= lambda.params.len(),
                None => args.len() == lambda.params.len(),
            };
            if !arity_ok {
                return Err(LispError::Arity {
                    name: lambda.name.clone().unwrap_or_else(|| "fn".to_string()),
                    expected: match &lambda.rest {
                        Some(_) => format!("at least {}", lambda.params.len()),
                        None => lambda.params.len().to_string(),
                    },
                    got: args.len(),
                });
            }

            let scope = lambda.env.child();
            let mut args = args.into_iter();
            for param in &lambda.params {
                scope.set(param, args.next().unwrap_or(Value::Nil));
            }
            if let Some(rest) = &lambda.rest {
                let remaining: Vec<Value> = args.collect();
                scope.set(
                    rest,
                    if remaining.is_empty() {
                        Value::Nil
                    } else {
                        Value::List(remaining)
                    },
                );
            }
            eval_body(&lambda.body, &scope, ctx)
        }

        // Keywords look themselves up in a map.
        Value::Keyword(_) => match args.as_slice() {
            [map] => Ok(map.get(f).cloned().unwrap_or(Value::Nil)),
            [map, default] => Ok(map.get(f).cloned().unwrap_or_else(|| default.clone())),
            _ => Err(LispError::Arity {
                name: f.pr_str(),
                expected: "1 or 2".to_string(),
                got: args.len(),
            }),
        },

        other => Err(LispError::NotCallable(other.pr_str())),
    }
}

fn eval_special_form(head: &str, args: &[Value], env: &Env, ctx: &Context) -> Option<Result<Value, LispError>> {
    let result = match head {
        "quote" => expect_args(head, args, 1).map(|_| args[0].clone()),
        "def" => eval_def(args, env, ctx),
        "defn" => eval_defn(args, env),
        "let" => eval_let(args, env, ctx),
        "if" => eval_if(args, env, ctx),
        "when" => match args.split_first() {
            Some((condition, body)) => eval(condition, env, ctx).and_then(|c| {
                if c.is_truthy() {
                    eval_body(body, env, ctx)
                } else {
                    Ok(Value::Nil)
                }
            }),
            None => Err(arity(head, "at least 1", 0)),
        },
        "do" => eval_body(args, env, ctx),
        "fn" => make_lambda(None, args, env),
        "and" => eval_and(args, env, ctx),
        "or" => eval_or(args, env, ctx),
        _ => return None,
    };
    Some(result)
}

fn arity(name: &str, expected: &str, got: usize) -> LispError {
    LispError::Arity {
        name: name.to_string(),
        expected: expected.to_string(),
        got,
    }
}

fn expect_args(name: &str, args: &[Value], count: usize) -> Result<(), LispError> {
    if args.len() == count {
        Ok(())
    } else {
        Err(arity(name, &count.to_string(), args.len()))
    }
}

fn symbol_name<'a>(form: &'a Value, what: &str) -> Result<&'a str, LispError> {
    match form {
        Value::Symbol(name) => Ok(name),
        other => Err(LispError::TypeError {
            expected: format!("a symbol as {}", what),
            got: other.pr_str(),
        }),
    }
}

/// `(def name value)`: bind in the global scope and return the var's name.
fn eval_def(args: &[Value], env: &Env, ctx: &Context) -> Result<Value, LispError> {
    expect_args("def", args, 2)?;
    let name = symbol_name(&args[0], "def name")?;
    let value = eval(&args[1], env, ctx)?;
    env.global().set(name, value);
    Ok(Value::Symbol(format!("#'user/{}", name)))
}

/// `(defn name [params] body...)`.
fn eval_defn(args: &[Value], env: &Env) -> Result<Value, LispError> {
    let Some((name, rest)) = args.split_first() else {
        return Err(arity("defn", "at least 2", 0));
    };
    let name = symbol_name(name, "defn name")?;
    let lambda = make_lambda(Some(name.to_string()), rest, env)?;
    env.global().set(name, lambda);
    Ok(Value::Symbol(format!("#'user/{}", name)))
}

/// `(fn name? [params] body...)`.
fn make_lambda(name: Option<String>, args: &[Value], env: &Env) -> Result<Value, LispError> {
    let (name, args) = match (name, args.first()) {
        (None, Some(Value::Symbol(n))) => (Some(n.clone()), &args[1..]),
        (name, _) => (name, args),
    };
    let Some((Value::Vector(param_forms), body)) = args.split_first() else {
        return Err(LispError::TypeError {
            expected: "a parameter vector".to_string(),
            got: args.first().map_or("nothing".to_string(), Value::pr_str),
        });
    };

    let mut params = Vec::new();
    let mut rest = None;
    let mut forms = param_forms.iter();
    while let Some(form) = forms.next() {
        let param = symbol_name(form, "parameter")?;
        if param == "&" {
            let rest_form = forms
                .next()
                .ok_or_else(|| LispError::Custom("missing name after &".to_string()))?;
            rest = Some(symbol_name(rest_form, "rest parameter")?.to_string());
            break;
        }
        params.push(param.to_string());
    }

    Ok(Value::Lambda(Rc::new(Lambda {
        name,
        params,
        rest,
        body: body.to_vec(),
        env: env.clone(),
    })))
}

/// `(let [name value ...] body...)`: bindings are sequential.
fn eval_let(args: &[Value], env: &Env, ctx: &Context) -> Result<Value, LispError> {
    let Some((Value::Vector(bindings), body)) = args.split_first() else {
        return Err(LispError::TypeError {
            expected: "a binding vector".to_string(),
            got: args.first().map_or("nothing".to_string(), Value::pr_str),
        });
    };
    if bindings.len() % 2 != 0 {
        return Err(LispError::Custom(
            "let requires an even number of forms in its binding vector".to_string(),
        ));
    }

    let scope = env.child();
    for pair in bindings.chunks(2) {
        let name = symbol_name(&pair[0], "let binding")?;
        let value = eval(&pair[1], &scope, ctx)?;
        scope.set(name, value);
    }
    eval_body(body, &scope, ctx)
}

fn eval_if(args: &[Value], env: &Env, ctx: &Context) -> Result<Value, LispError> {
    if !(2..=3).contains(&args.len()) {
        return Err(arity("if", "2 or 3", args.len()));
    }
    if eval(&args[0], env, ctx)?.is_truthy() {
        eval(&args[1], env, ctx)
    } else {
        match args.get(2) {
            Some(otherwise) => eval(otherwise, env, ctx),
            None => Ok(Value::Nil),
        }
    }
}

fn eval_and(args: &[Value], env: &Env, ctx: &Context) -> Result<Value, LispError> {
    let mut result = Value::Boolean(true);
    for form in args {
        result = eval(form, env, ctx)?;
        if !result.is_truthy() {
            break;
        }
    }
    Ok(result)
}

fn eval_or(args: &[Value], env: &Env, ctx: &Context) -> Result<Value, LispError> {
    let mut result = Value::Nil;
    for form in args {
        result = eval(form, env, ctx)?;
        if result.is_truthy() {
            break;
        }
    }
    Ok(result)
}
